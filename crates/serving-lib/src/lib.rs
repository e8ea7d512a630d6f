//! Prediction serving library
//!
//! This crate provides the core functionality for:
//! - Loading trained models from the artifact store into an immutable registry
//! - Validating requests against per-model feature contracts
//! - Running inference and formatting results
//! - Batch prediction with per-sample error isolation
//! - Health reporting and observability

pub mod artifacts;
pub mod catalog;
pub mod error;
pub mod health;
pub mod info;
pub mod models;
pub mod observability;
pub mod pipeline;
pub mod predictor;
pub mod registry;

pub use artifacts::ArtifactStore;
pub use error::PredictionError;
pub use health::{ComponentStatus, HealthResponse};
pub use info::{models_info, ModelInfo, ModelsInfo};
pub use models::*;
pub use observability::{ServingMetrics, StructuredLogger};
pub use registry::{ModelRegistry, RegistryEntry};
