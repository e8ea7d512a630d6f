//! API client for communicating with the model server

use anyhow::{Context, Result};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use url::Url;

/// API client for the model server
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        Self::parse(response).await
    }

    /// Make a POST request with JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .context("Failed to send request")?;

        Self::parse(response).await
    }

    async fn parse<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error ({}): {}", status, body);
        }

        response.json().await.context("Failed to parse response")
    }

    pub async fn health(&self) -> Result<HealthReport> {
        // 503 still carries a health body
        let url = self.base_url.join("health").context("Invalid path")?;
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        if response.status() == reqwest::StatusCode::SERVICE_UNAVAILABLE {
            return response.json().await.context("Failed to parse response");
        }
        Self::parse(response).await
    }

    pub async fn models_info(&self) -> Result<BTreeMap<String, Option<ModelInfo>>> {
        self.get("models/info").await
    }

    /// Predict one record with the named predictor
    pub async fn predict(&self, predictor: &str, record: &Map<String, Value>) -> Result<Value> {
        self.post(&format!("predict/{}", predictor), record).await
    }

    pub async fn predict_batch(&self, request: &Value) -> Result<BTreeMap<String, Vec<Value>>> {
        self.post("predict/batch", request).await
    }
}

// API response types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    #[serde(flatten)]
    pub models: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_type: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_estimators: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_clusters: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n_coefficients: Option<usize>,
    pub features: Vec<String>,
    pub n_features: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loaded_at: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_health_parses_flattened_flags() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/health")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status": "degraded", "wine": false, "house": true}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let health = client.health().await.unwrap();

        mock.assert_async().await;
        assert_eq!(health.status, "degraded");
        assert_eq!(health.models["house"], true);
        assert_eq!(health.models["wine"], false);
    }

    #[tokio::test]
    async fn test_health_reads_unavailable_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/health")
            .with_status(503)
            .with_body(r#"{"status": "unhealthy", "wine": false}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let health = client.health().await.unwrap();
        assert_eq!(health.status, "unhealthy");
    }

    #[tokio::test]
    async fn test_predict_posts_record() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/predict/house")
            .match_body(mockito::Matcher::Json(json!({"Area": 80.0, "Room": 2.0})))
            .with_status(200)
            .with_body(r#"{"model": "house_price", "prediction": 123.0}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let mut record = Map::new();
        record.insert("Area".into(), json!(80.0));
        record.insert("Room".into(), json!(2.0));
        let result = client.predict("house", &record).await.unwrap();

        mock.assert_async().await;
        assert_eq!(result["prediction"], 123.0);
    }

    #[tokio::test]
    async fn test_error_status_is_reported_with_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/predict/customer")
            .with_status(400)
            .with_body(r#"{"error": "Missing features: [\"spending_score\"]"}"#)
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client.predict("customer", &Map::new()).await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("400"));
        assert!(message.contains("spending_score"));
    }

    #[tokio::test]
    async fn test_models_info_handles_unloaded_entries() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/models/info")
            .with_status(200)
            .with_body(
                r#"{"wine": null, "house": {"model_type": "LinearRegression", "kind": "regressor",
                    "n_coefficients": 2, "features": ["Area", "Room"], "n_features": 2}}"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let info = client.models_info().await.unwrap();
        assert!(info["wine"].is_none());
        assert_eq!(info["house"].as_ref().unwrap().n_coefficients, Some(2));
    }

    #[test]
    fn test_invalid_url_rejected() {
        assert!(ApiClient::new("not a url").is_err());
    }
}
