//! Runtime configuration for the session router
//!
//! Settings come from the command line (or an embedding host) and control
//! the signalling endpoint, reconnect behaviour, and input routing mode.

use serde::{Deserialize, Serialize};

/// Default signalling server host
pub const DEFAULT_SIGNALLING_HOST: &str = "127.0.0.1";

/// Default signalling server port
pub const DEFAULT_SIGNALLING_PORT: u16 = 8888;

/// Default delay between reconnect attempts in milliseconds
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 2_000;

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Full signalling server URL. Takes precedence over host/port when set.
    pub signalling_url: Option<String>,
    /// Signalling server host, used when no full URL is given
    pub signalling_host: String,
    /// Signalling server port, used when no full URL is given
    pub signalling_port: u16,
    /// Automatically reconnect to the signalling server on disconnect
    pub auto_reconnect: bool,
    /// Delay between reconnect attempts in milliseconds
    pub reconnect_delay_ms: u64,
    /// Route mouse up/down/move to synthesized touch events
    pub use_mouse_for_touch: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            signalling_url: None,
            signalling_host: DEFAULT_SIGNALLING_HOST.to_string(),
            signalling_port: DEFAULT_SIGNALLING_PORT,
            auto_reconnect: true,
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            use_mouse_for_touch: false,
        }
    }
}

impl AppConfig {
    /// Build the signalling server URL.
    ///
    /// An explicit URL wins; otherwise one is assembled from host and port.
    pub fn signalling_server_url(&self) -> String {
        match &self.signalling_url {
            Some(url) if !url.is_empty() => url.clone(),
            _ => format!("ws://{}:{}", self.signalling_host, self.signalling_port),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_from_host_and_port() {
        let config = AppConfig {
            signalling_host: "signalling.example".to_string(),
            signalling_port: 9999,
            ..Default::default()
        };
        assert_eq!(
            config.signalling_server_url(),
            "ws://signalling.example:9999"
        );
    }

    #[test]
    fn test_explicit_url_wins() {
        let config = AppConfig {
            signalling_url: Some("wss://edge.example/ss".to_string()),
            ..Default::default()
        };
        assert_eq!(config.signalling_server_url(), "wss://edge.example/ss");
    }

    #[test]
    fn test_empty_url_falls_back() {
        let config = AppConfig {
            signalling_url: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(
            config.signalling_server_url(),
            format!("ws://{}:{}", DEFAULT_SIGNALLING_HOST, DEFAULT_SIGNALLING_PORT)
        );
    }
}
