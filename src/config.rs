//! Configuration module

use std::env;
use std::path::PathBuf;

use thiserror::Error;

use crate::schema::SchemaVariant;

pub const DEFAULT_MODEL_PATH: &str = "final_avoidable_ed_model.onnx";
pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8080/predict";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("PORT must be a port number, got {0:?}")]
    InvalidPort(String),

    #[error("SCHEMA_VARIANT must be `numeric` or `defaulted`, got {0:?}")]
    InvalidVariant(String),
}

/// Inference service configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,

    /// Server port
    pub port: u16,

    /// ONNX export of the trained pipeline
    pub model_path: PathBuf,

    /// Optional model card describing the artifact's inputs
    pub model_card_path: Option<PathBuf>,

    /// Request shape accepted by `/predict`
    pub variant: SchemaVariant,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup("PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| ConfigError::InvalidPort(raw))?,
            None => 8080,
        };

        let variant = match lookup("SCHEMA_VARIANT") {
            Some(raw) => raw.parse::<SchemaVariant>().map_err(|_| ConfigError::InvalidVariant(raw))?,
            None => SchemaVariant::default(),
        };

        Ok(Self {
            host: lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port,
            model_path: lookup("MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH)),
            model_card_path: lookup("MODEL_CARD_PATH")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            variant,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.model_path, PathBuf::from(DEFAULT_MODEL_PATH));
        assert_eq!(config.model_card_path, None);
        assert_eq!(config.variant, SchemaVariant::Numeric);
    }

    #[test]
    fn test_overrides() {
        let config = ServerConfig::from_lookup(lookup(&[
            ("HOST", "0.0.0.0"),
            ("PORT", "9000"),
            ("MODEL_CARD_PATH", "card.json"),
            ("SCHEMA_VARIANT", "Defaulted"),
        ]))
        .unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9000);
        assert_eq!(config.model_card_path, Some(PathBuf::from("card.json")));
        assert_eq!(config.variant, SchemaVariant::Defaulted);
    }

    #[test]
    fn test_invalid_values() {
        assert_eq!(
            ServerConfig::from_lookup(lookup(&[("PORT", "http")])),
            Err(ConfigError::InvalidPort("http".into()))
        );
        assert_eq!(
            ServerConfig::from_lookup(lookup(&[("SCHEMA_VARIANT", "pydantic")])),
            Err(ConfigError::InvalidVariant("pydantic".into()))
        );
    }
}
