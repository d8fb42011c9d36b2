//! Response body beautification.
//!
//! The transform relay hands buffered script bodies to a [`Beautifier`].
//! [`apply`] wraps the call so that a body which is not UTF-8, or a
//! beautifier that panics, leaves the original bytes untouched.

pub mod js;

pub use js::JsBeautifier;

use bytes::Bytes;
use std::panic::{self, AssertUnwindSafe};

/// Text-to-text reformatter. Must be pure and callable from many requests at once.
pub trait Beautifier: Send + Sync {
    fn beautify(&self, source: &str) -> String;
}

/// Beautifies `payload`, falling back to it unchanged on failure.
pub fn apply(beautifier: &dyn Beautifier, payload: Bytes) -> Bytes {
    let text = match std::str::from_utf8(&payload) {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(error = %e, "Body is not valid UTF-8, passing it through unchanged");
            return payload;
        }
    };

    match panic::catch_unwind(AssertUnwindSafe(|| beautifier.beautify(text))) {
        Ok(pretty) => Bytes::from(pretty),
        Err(_) => {
            tracing::error!("Beautifier panicked, passing body through unchanged");
            payload
        }
    }
}
