use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{DiagnosisError, Result};
use crate::model::{Classifier, ModelId};
use crate::models::{
    ArchTypeModel, DeformityModel, FootwearModel, GaitModel, PressureModel, PronationModel,
};

/// Confidence threshold applied when a model has no explicit override.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.6;

/// External registry configuration, typically deserialized from JSON.
/// Validated when the registry is built; a bad config never produces a
/// half-working registry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Per-model confidence thresholds, keyed by model id string.
    #[serde(default)]
    pub confidence_thresholds: HashMap<String, f64>,
    /// Model ids to leave out of the run entirely.
    #[serde(default)]
    pub disabled_models: Vec<String>,
    /// Override for [`DEFAULT_CONFIDENCE_THRESHOLD`].
    #[serde(default)]
    pub default_threshold: Option<f64>,
}

/// Immutable set of diagnostic models plus their confidence thresholds.
/// Built once, shared process-wide behind an `Arc`.
pub struct ModelRegistry {
    models: Vec<Arc<dyn Classifier>>,
    thresholds: HashMap<ModelId, f64>,
    default_threshold: f64,
}

impl ModelRegistry {
    /// Registry with all six standard models and default thresholds.
    pub fn standard() -> Self {
        // The builder cannot fail without a config.
        RegistryBuilder::standard()
            .build()
            .unwrap_or_else(|_| unreachable!("standard registry is always valid"))
    }

    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn models(&self) -> &[Arc<dyn Classifier>] {
        &self.models
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Confidence threshold for one model.
    pub fn threshold(&self, id: ModelId) -> f64 {
        self.thresholds
            .get(&id)
            .copied()
            .unwrap_or(self.default_threshold)
    }
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry")
            .field(
                "models",
                &self.models.iter().map(|m| m.id()).collect::<Vec<_>>(),
            )
            .field("default_threshold", &self.default_threshold)
            .finish()
    }
}

/// Builder for [`ModelRegistry`]. Models register in execution order;
/// configuration is validated at `build` time.
pub struct RegistryBuilder {
    models: Vec<Arc<dyn Classifier>>,
    config: RegistryConfig,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self {
            models: Vec::new(),
            config: RegistryConfig::default(),
        }
    }

    /// Builder pre-loaded with the six standard models.
    pub fn standard() -> Self {
        Self::new()
            .add_model(Arc::new(ArchTypeModel::new()))
            .add_model(Arc::new(PronationModel::new()))
            .add_model(Arc::new(PressureModel::new()))
            .add_model(Arc::new(DeformityModel::new()))
            .add_model(Arc::new(GaitModel::new()))
            .add_model(Arc::new(FootwearModel::new()))
    }

    pub fn add_model(mut self, model: Arc<dyn Classifier>) -> Self {
        self.models.push(model);
        self
    }

    pub fn with_config(mut self, config: RegistryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<ModelRegistry> {
        let mut thresholds = HashMap::new();
        for (key, value) in &self.config.confidence_thresholds {
            let id = ModelId::parse(key).ok_or_else(|| {
                DiagnosisError::Configuration(format!("unknown model id in thresholds: {key}"))
            })?;
            validate_threshold(key, *value)?;
            thresholds.insert(id, *value);
        }

        let default_threshold = match self.config.default_threshold {
            Some(value) => {
                validate_threshold("default_threshold", value)?;
                value
            }
            None => DEFAULT_CONFIDENCE_THRESHOLD,
        };

        let mut disabled = Vec::new();
        for key in &self.config.disabled_models {
            let id = ModelId::parse(key).ok_or_else(|| {
                DiagnosisError::Configuration(format!("unknown model id in disabled_models: {key}"))
            })?;
            disabled.push(id);
        }

        let mut seen = Vec::new();
        let mut models = Vec::new();
        for model in self.models {
            let id = model.id();
            if seen.contains(&id) {
                return Err(DiagnosisError::Configuration(format!(
                    "model registered twice: {id}"
                )));
            }
            seen.push(id);
            if !disabled.contains(&id) {
                models.push(model);
            }
        }

        info!(
            model_count = models.len(),
            default_threshold, "model registry built"
        );
        Ok(ModelRegistry {
            models,
            thresholds,
            default_threshold,
        })
    }
}

impl Default for RegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_threshold(key: &str, value: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&value) {
        return Err(DiagnosisError::Configuration(format!(
            "confidence threshold for {key} must be within [0,1], got {value}"
        )));
    }
    Ok(())
}
