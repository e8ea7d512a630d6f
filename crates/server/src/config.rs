//! Server configuration

use anyhow::{Context, Result};
use serde::Deserialize;
use serving_lib::{catalog, ArtifactStore};
use std::path::Path;

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to bind
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory holding model artifacts
    #[serde(default = "default_model_dir")]
    pub model_dir: String,

    #[serde(default = "default_wine_model")]
    pub wine_model: String,

    #[serde(default = "default_customer_model")]
    pub customer_model: String,

    /// Scaler fitted alongside the customer clusterer
    #[serde(default = "default_customer_scaler")]
    pub customer_scaler: String,

    #[serde(default = "default_house_model")]
    pub house_model: String,

    /// Instance name attached to structured log events
    #[serde(default = "default_instance_name")]
    pub instance_name: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_model_dir() -> String {
    "models".to_string()
}

fn default_wine_model() -> String {
    "rf_winequality_best.json".to_string()
}

fn default_customer_model() -> String {
    "kmeans_mall.json".to_string()
}

fn default_customer_scaler() -> String {
    "scaler_mall.json".to_string()
}

fn default_house_model() -> String {
    "regression.json".to_string()
}

fn default_instance_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "model-server".to_string())
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            model_dir: default_model_dir(),
            wine_model: default_wine_model(),
            customer_model: default_customer_model(),
            customer_scaler: default_customer_scaler(),
            house_model: default_house_model(),
            instance_name: default_instance_name(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from an optional `model-server` file and `SERVING_*` env vars
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("model-server").required(false))
            .add_source(config::Environment::with_prefix("SERVING"))
            .build()
            .context("Failed to read server configuration")?;

        config
            .try_deserialize()
            .context("Invalid server configuration")
    }

    /// Socket address to bind
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Artifact store with every built-in predictor's files registered
    pub fn artifact_store(&self) -> ArtifactStore {
        ArtifactStore::new(&self.model_dir)
            .with_artifact(catalog::WINE, &self.wine_model, None)
            .with_artifact(
                catalog::CUSTOMER,
                &self.customer_model,
                Some(Path::new(&self.customer_scaler)),
            )
            .with_artifact(catalog::HOUSE, &self.house_model, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_source() {
        let config: ServerConfig = config::Config::builder()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 5000);
        assert_eq!(config.model_dir, "models");
        assert_eq!(config.wine_model, "rf_winequality_best.json");
        assert_eq!(config.customer_scaler, "scaler_mall.json");
        assert_eq!(config.bind_addr(), "0.0.0.0:5000");
    }

    #[test]
    fn test_overrides() {
        let config: ServerConfig = config::Config::builder()
            .set_override("port", 8081)
            .unwrap()
            .set_override("model_dir", "/srv/models")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.port, 8081);
        assert_eq!(config.model_dir, "/srv/models");
    }

    #[test]
    fn test_artifact_store_resolves_against_model_dir() {
        let config = ServerConfig {
            model_dir: "/srv/models".to_string(),
            ..ServerConfig::default()
        };
        let store = config.artifact_store();

        let customer = store.location(catalog::CUSTOMER).unwrap();
        assert_eq!(customer.model, Path::new("/srv/models/kmeans_mall.json"));
        assert_eq!(
            customer.scaler.as_deref(),
            Some(Path::new("/srv/models/scaler_mall.json"))
        );
        assert!(store.location(catalog::WINE).unwrap().scaler.is_none());
    }
}
