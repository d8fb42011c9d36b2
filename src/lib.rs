//! Interposer - intercepting HTTP proxy
//!
//! Answers requests from a declarative schema when it can and relays the rest
//! to the origin named by the Host header, optionally beautifying script
//! responses on the way back.

pub mod config;
pub mod http;
pub mod logging;
pub mod prettify;
pub mod proxy;
pub mod schema;
pub mod server;
