//! Model registry: the immutable set of predictors built at startup
//!
//! The registry is constructed once, then shared read-only (behind an
//! `Arc`) by every request handler. It is never reloaded or mutated.

use crate::artifacts::ArtifactStore;
use crate::error::{PredictionError, Result};
use crate::predictor::{Predictor, PredictorSpec};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

/// One configured predictor and its load outcome
#[derive(Debug)]
pub struct RegistryEntry {
    spec: PredictorSpec,
    predictor: Option<Predictor>,
    load_error: Option<String>,
    loaded_at: Option<DateTime<Utc>>,
}

impl RegistryEntry {
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn spec(&self) -> &PredictorSpec {
        &self.spec
    }

    pub fn predictor(&self) -> Option<&Predictor> {
        self.predictor.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        self.predictor.is_some()
    }

    /// Why the predictor is absent, if loading failed
    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    pub fn loaded_at(&self) -> Option<DateTime<Utc>> {
        self.loaded_at
    }
}

/// Registry of predictors keyed by logical name, in configuration order
#[derive(Debug, Default)]
pub struct ModelRegistry {
    entries: Vec<RegistryEntry>,
}

impl ModelRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Load every spec from the store
    ///
    /// A failed load leaves that predictor unavailable; it never aborts
    /// the remaining loads.
    pub fn load(store: &ArtifactStore, specs: Vec<PredictorSpec>) -> Self {
        let mut builder = Self::builder();
        for spec in specs {
            let loaded = store
                .load(&spec)
                .and_then(|model| Predictor::new(spec.clone(), model));
            builder = match loaded {
                Ok(predictor) => {
                    info!(
                        predictor = %spec.name,
                        model_type = predictor.model().model_type(),
                        "Predictor loaded"
                    );
                    builder.loaded(predictor)
                }
                Err(e) => {
                    warn!(
                        predictor = %spec.name,
                        error = %format!("{:#}", e),
                        "Predictor failed to load"
                    );
                    builder.failed(spec, format!("{:#}", e))
                }
            };
        }
        builder.build()
    }

    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    pub fn entry(&self, name: &str) -> Option<&RegistryEntry> {
        self.entries.iter().find(|e| e.name() == name)
    }

    /// Look up a loaded predictor
    pub fn get(&self, name: &str) -> Result<&Predictor> {
        let entry = self
            .entry(name)
            .ok_or_else(|| PredictionError::UnknownPredictor {
                name: name.to_string(),
            })?;
        entry
            .predictor()
            .ok_or_else(|| PredictionError::UnavailablePredictor {
                name: name.to_string(),
            })
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.entry(name).map(RegistryEntry::is_loaded).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn loaded_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_loaded()).count()
    }
}

/// Builder for assembling a registry from already-built predictors
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    entries: Vec<RegistryEntry>,
}

impl RegistryBuilder {
    /// Add a loaded predictor, replacing any entry with the same name
    pub fn loaded(mut self, predictor: Predictor) -> Self {
        let spec = predictor.spec().clone();
        self.push(RegistryEntry {
            spec,
            predictor: Some(predictor),
            load_error: None,
            loaded_at: Some(Utc::now()),
        });
        self
    }

    /// Add a configured predictor whose artifacts are absent
    pub fn unavailable(self, spec: PredictorSpec) -> Self {
        self.failed(spec, "not loaded")
    }

    pub fn failed(mut self, spec: PredictorSpec, error: impl Into<String>) -> Self {
        self.push(RegistryEntry {
            spec,
            predictor: None,
            load_error: Some(error.into()),
            loaded_at: None,
        });
        self
    }

    fn push(&mut self, entry: RegistryEntry) {
        match self.entries.iter_mut().find(|e| e.name() == entry.name()) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn build(self) -> ModelRegistry {
        ModelRegistry {
            entries: self.entries,
        }
    }
}
