use std::{net::SocketAddr, path::PathBuf};

use crate::error::ConfigError;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 5000;

/// Process settings, read from the environment once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    /// Model bundle manifest (`MODEL_PATH`).
    pub model_path: PathBuf,
    pub host: String,
    pub port: u16,
    /// Log a summary of every aligned feature vector (`LOG_PRED=1`).
    pub log_predictions: bool,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let model_path = lookup("MODEL_PATH")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .ok_or(ConfigError::MissingEnv("MODEL_PATH"))?;
        let host = lookup("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string());
        let port = match lookup("PORT") {
            Some(s) => s.trim().parse().map_err(|e| ConfigError::InvalidEnv {
                name: "PORT",
                reason: format!("{s:?}: {e}"),
            })?,
            None => DEFAULT_PORT,
        };
        let log_predictions = lookup("LOG_PRED").as_deref() == Some("1");

        Ok(Self {
            model_path,
            host,
            port,
            log_predictions,
        })
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| ConfigError::InvalidEnv {
                name: "HOST",
                reason: format!("{:?}: {e}", self.host),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_only_model_path_is_set() {
        let cfg = ServiceConfig::from_lookup(lookup(&[("MODEL_PATH", "model/bundle.json")])).unwrap();
        assert_eq!(cfg.model_path, PathBuf::from("model/bundle.json"));
        assert_eq!(cfg.host, DEFAULT_HOST);
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert!(!cfg.log_predictions);
        assert_eq!(cfg.socket_addr().unwrap(), "0.0.0.0:5000".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn overrides_are_read() {
        let cfg = ServiceConfig::from_lookup(lookup(&[
            ("MODEL_PATH", "b.json"),
            ("HOST", "127.0.0.1"),
            ("PORT", "8080"),
            ("LOG_PRED", "1"),
        ]))
        .unwrap();
        assert_eq!(cfg.port, 8080);
        assert!(cfg.log_predictions);
        assert_eq!(cfg.socket_addr().unwrap(), "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn missing_model_path_and_bad_port_are_errors() {
        assert!(matches!(
            ServiceConfig::from_lookup(lookup(&[])),
            Err(ConfigError::MissingEnv("MODEL_PATH"))
        ));
        assert!(matches!(
            ServiceConfig::from_lookup(lookup(&[("MODEL_PATH", "b.json"), ("PORT", "http")])),
            Err(ConfigError::InvalidEnv { name: "PORT", .. })
        ));

        let cfg = ServiceConfig::from_lookup(lookup(&[("MODEL_PATH", "b.json"), ("HOST", "not a host")]))
            .unwrap();
        assert!(cfg.socket_addr().is_err());
    }
}
