//! HTTP/1.1 wire handling.
//!
//! Just enough HTTP to sit in the middle of an exchange: heads are parsed,
//! bodies are left on the socket and read incrementally so they can be
//! relayed without buffering.
//!
//! # Architecture
//!
//! - **`connection`**: Serves one request on an accepted socket
//! - **`parser`**: Parses request and response heads from byte buffers
//! - **`headers`**: Ordered, case-insensitive header list
//! - **`body`**: Body framing and the incremental body reader
//! - **`target`**: Splits a request target into path segments and query pairs
//! - **`request`**: Request head representation
//! - **`response`**: Response head and locally generated responses
//! - **`writer`**: Writes responses to the client and ends them
//!
//! # Connection lifecycle
//!
//! ```text
//!        ┌─────────────┐
//!        │ Read head   │ ← Wait for the request line and headers
//!        └──────┬──────┘
//!               │ malformed → 400, close
//!               ▼
//!        ┌──────────────────┐
//!        │ Interceptor      │ ← Local answer or relay; body read lazily
//!        └──────┬───────────┘
//!               ▼
//!        ┌──────────────────┐
//!        │ End response     │ ← Always, on every path
//!        └──────────────────┘
//! ```

pub mod body;
pub mod connection;
pub mod headers;
pub mod parser;
pub mod request;
pub mod response;
pub mod target;
pub mod writer;
