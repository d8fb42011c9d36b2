use std::collections::HashMap;
use std::time::Duration;

use interposer::config::{Config, LISTEN_ADDR};

fn config_from(vars: &[(&str, &str)]) -> Config {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Config::from_lookup(|key| vars.get(key).cloned())
}

#[test]
fn test_config_defaults() {
    let cfg = config_from(&[]);
    assert_eq!(cfg.listen_addr, "0.0.0.0:8080");
    assert_eq!(cfg.connect_timeout, Duration::from_secs(10));
    assert_eq!(cfg.request_timeout, Duration::from_secs(300));
}

#[test]
fn test_config_listen_address_is_fixed() {
    let cfg = config_from(&[("LISTEN", "127.0.0.1:3000")]);
    assert_eq!(cfg.listen_addr, LISTEN_ADDR);
}

#[test]
fn test_config_timeouts_from_env() {
    let cfg = config_from(&[("CONNECT_TIMEOUT_SECS", "3"), ("REQUEST_TIMEOUT_SECS", " 45 ")]);
    assert_eq!(cfg.connect_timeout, Duration::from_secs(3));
    assert_eq!(cfg.request_timeout, Duration::from_secs(45));
}

#[test]
fn test_config_invalid_timeouts_fall_back() {
    let cfg = config_from(&[("CONNECT_TIMEOUT_SECS", "soon"), ("REQUEST_TIMEOUT_SECS", "0")]);
    assert_eq!(cfg.connect_timeout, Duration::from_secs(10));
    assert_eq!(cfg.request_timeout, Duration::from_secs(300));
}

#[test]
fn test_config_timeouts_pair() {
    let cfg = config_from(&[("CONNECT_TIMEOUT_SECS", "7")]);
    let timeouts = cfg.timeouts();
    assert_eq!(timeouts.connect, Duration::from_secs(7));
    assert_eq!(timeouts.request, cfg.request_timeout);
}

#[test]
fn test_config_clone() {
    let cfg1 = config_from(&[]);
    let cfg2 = cfg1.clone();
    assert_eq!(cfg1.listen_addr, cfg2.listen_addr);
    assert_eq!(cfg1.request_timeout, cfg2.request_timeout);
}
