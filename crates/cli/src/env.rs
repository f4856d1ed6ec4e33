// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Project M Authors

//! Centralized environment variable access for the CLI crate.

/// Protocol/build version (from Cargo.toml + git hash, set by `build.rs`).
pub const PROTOCOL_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "+", env!("BUILD_GIT_HASH"));

/// Daemon base URL: `PM_DAEMON_ADDR` if set, else `http://127.0.0.1:4777`.
pub fn daemon_addr() -> String {
    std::env::var("PM_DAEMON_ADDR")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "http://127.0.0.1:4777".to_string())
}

/// Operator bearer token, if the daemon requires one.
pub fn operator_token() -> Option<String> {
    std::env::var("PM_OPERATOR_TOKEN").ok().filter(|s| !s.is_empty())
}

/// HTTP request timeout: `PM_CLI_TIMEOUT_MS`, default 10s.
pub fn request_timeout() -> std::time::Duration {
    std::env::var("PM_CLI_TIMEOUT_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(std::time::Duration::from_millis)
        .unwrap_or(std::time::Duration::from_secs(10))
}
