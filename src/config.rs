use std::time::Duration;

use crate::proxy::Timeouts;

/// Both proxies always listen here.
pub const LISTEN_ADDR: &str = "0.0.0.0:8080";

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Config {
    /// Reads timeouts from `CONNECT_TIMEOUT_SECS` and `REQUEST_TIMEOUT_SECS`.
    pub fn load() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let seconds = |key: &str, default: u64| match lookup(key) {
            None => default,
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(value) if value > 0 => value,
                _ => {
                    tracing::warn!(key, value = %raw, default, "Ignoring invalid timeout");
                    default
                }
            },
        };

        Self {
            listen_addr: LISTEN_ADDR.to_string(),
            connect_timeout: Duration::from_secs(seconds(
                "CONNECT_TIMEOUT_SECS",
                DEFAULT_CONNECT_TIMEOUT_SECS,
            )),
            request_timeout: Duration::from_secs(seconds(
                "REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )),
        }
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            connect: self.connect_timeout,
            request: self.request_timeout,
        }
    }
}
