//! Health reporting for the prediction service
//!
//! Health is derived from the registry's load state, which is fixed at
//! startup, so reports are computed on demand without any locking.

use crate::registry::ModelRegistry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Overall service status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Every configured predictor is loaded
    Healthy,
    /// Some predictors are unavailable
    Degraded,
    /// No predictor is available
    Unhealthy,
}

impl ComponentStatus {
    /// Returns true if the service can serve at least one predictor
    pub fn is_operational(&self) -> bool {
        matches!(self, ComponentStatus::Healthy | ComponentStatus::Degraded)
    }
}

/// `GET /health` body: status plus one loaded flag per predictor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    #[serde(flatten)]
    pub models: BTreeMap<String, bool>,
}

impl HealthResponse {
    pub fn from_registry(registry: &ModelRegistry) -> Self {
        let models: BTreeMap<String, bool> = registry
            .entries()
            .iter()
            .map(|e| (e.name().to_string(), e.is_loaded()))
            .collect();
        let status = Self::compute_status(&models);
        Self { status, models }
    }

    /// Compute overall status from per-predictor load flags
    pub fn compute_status(models: &BTreeMap<String, bool>) -> ComponentStatus {
        let loaded = models.values().filter(|loaded| **loaded).count();
        if loaded == 0 {
            ComponentStatus::Unhealthy
        } else if loaded == models.len() {
            ComponentStatus::Healthy
        } else {
            ComponentStatus::Degraded
        }
    }
}
