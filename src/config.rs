use std::str::FromStr;
use std::time::Duration;

/// Default timeout for Unsplash API requests (30 seconds).
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

pub const DEFAULT_API_BASE_URL: &str = "https://api.unsplash.com";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be a positive integer, got '{value}'")]
    InvalidInteger { name: &'static str, value: String },
    #[error("{name} must not be empty")]
    Empty { name: &'static str },
    #[error("transport '{0}' is not supported by this build (supported: stdio)")]
    UnsupportedTransport(String),
    #[error("invalid transport type '{0}' (supported: stdio)")]
    InvalidTransport(String),
}

/// Wire transport selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Stdio,
}

impl FromStr for TransportKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdio" => Ok(Self::Stdio),
            "sse" => Err(ConfigError::UnsupportedTransport(s.to_string())),
            _ => Err(ConfigError::InvalidTransport(s.to_string())),
        }
    }
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Absent is allowed at startup; tools report it when called.
    pub access_key: Option<String>,
    pub api_base_url: String,
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            access_key: None,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment.
    ///
    /// - `UNSPLASH_ACCESS_KEY` (optional): API access key
    /// - `UNSPLASH_API_BASE_URL` (optional, default `https://api.unsplash.com`)
    /// - `UNSPLASH_TIMEOUT_SECS` (optional, default 30): max seconds per API request
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let access_key = lookup("UNSPLASH_ACCESS_KEY").filter(|k| !k.trim().is_empty());

        let api_base_url = match lookup("UNSPLASH_API_BASE_URL") {
            Some(url) if url.trim().is_empty() => {
                return Err(ConfigError::Empty {
                    name: "UNSPLASH_API_BASE_URL",
                })
            }
            Some(url) => url.trim().trim_end_matches('/').to_string(),
            None => DEFAULT_API_BASE_URL.to_string(),
        };

        let timeout_secs = match lookup("UNSPLASH_TIMEOUT_SECS") {
            Some(val) => val
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError::InvalidInteger {
                    name: "UNSPLASH_TIMEOUT_SECS",
                    value: val,
                })?,
            None => DEFAULT_REQUEST_TIMEOUT_SECS,
        };

        Ok(Self {
            access_key,
            api_base_url,
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = ServerConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, ServerConfig::default());
    }

    #[test]
    fn missing_key_is_not_a_startup_error() {
        let config =
            ServerConfig::from_lookup(lookup_from(&[("UNSPLASH_ACCESS_KEY", "  ")])).unwrap();
        assert!(config.access_key.is_none());
    }

    #[test]
    fn reads_all_variables() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("UNSPLASH_ACCESS_KEY", "abc123"),
            ("UNSPLASH_API_BASE_URL", "http://127.0.0.1:9000/"),
            ("UNSPLASH_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();
        assert_eq!(config.access_key.as_deref(), Some("abc123"));
        assert_eq!(config.api_base_url, "http://127.0.0.1:9000");
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn rejects_bad_timeout() {
        for bad in ["soon", "0", "-3"] {
            let err = ServerConfig::from_lookup(lookup_from(&[("UNSPLASH_TIMEOUT_SECS", bad)]))
                .unwrap_err();
            assert!(matches!(err, ConfigError::InvalidInteger { .. }), "{bad}");
        }
    }

    #[test]
    fn parses_transport_kind() {
        assert_eq!("stdio".parse::<TransportKind>(), Ok(TransportKind::Stdio));
        assert_eq!(" STDIO ".parse::<TransportKind>(), Ok(TransportKind::Stdio));
        assert_eq!(
            "sse".parse::<TransportKind>(),
            Err(ConfigError::UnsupportedTransport("sse".into()))
        );
        assert_eq!(
            "carrier-pigeon".parse::<TransportKind>(),
            Err(ConfigError::InvalidTransport("carrier-pigeon".into()))
        );
    }
}
