//! Character-suffix logistic model
//!
//! The model artifact lives at `<artifact_root>/<version>/model.json`:
//!
//! ```json
//! {
//!   "version": "1",
//!   "max_suffix": 3,
//!   "bias": -0.1,
//!   "suffix_weights": { "a": 2.3, "na": 0.4, "o": -1.8 }
//! }
//! ```
//!
//! The score of a name is `bias` plus the weights of its lowercase suffixes
//! of length 1..=`max_suffix`. A logistic function turns the score into
//! P(Girl); the reported probability is the confidence in the chosen label.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use super::{Label, Prediction, PredictionService};
use crate::error::PredictError;

/// Artifact file name inside a version directory
pub const MODEL_FILE: &str = "model.json";

/// Longest suffix a model may declare
const MAX_SUFFIX_LIMIT: usize = 8;

/// Deserialized model artifact
#[derive(Debug, Clone, Deserialize)]
pub struct SuffixModel {
    #[serde(default)]
    pub version: Option<String>,
    pub max_suffix: usize,
    #[serde(default)]
    pub bias: f64,
    pub suffix_weights: HashMap<String, f64>,
}

impl SuffixModel {
    fn validate(&self) -> Result<(), String> {
        if self.max_suffix == 0 || self.max_suffix > MAX_SUFFIX_LIMIT {
            return Err(format!(
                "max_suffix must be between 1 and {}, got {}",
                MAX_SUFFIX_LIMIT, self.max_suffix
            ));
        }
        if !self.bias.is_finite() {
            return Err("bias is not finite".to_string());
        }
        if let Some((suffix, _)) = self.suffix_weights.iter().find(|(_, w)| !w.is_finite()) {
            return Err(format!("weight for suffix '{}' is not finite", suffix));
        }
        Ok(())
    }

    /// P(Girl) for a lowercase name
    fn girl_probability(&self, lowercase: &str) -> f64 {
        let chars: Vec<char> = lowercase.chars().collect();
        let longest = self.max_suffix.min(chars.len());

        let score = (1..=longest).fold(self.bias, |acc, len| {
            let suffix: String = chars[chars.len() - len..].iter().collect();
            acc + self.suffix_weights.get(&suffix).copied().unwrap_or(0.0)
        });

        1.0 / (1.0 + (-score).exp())
    }
}

/// Predictor backed by a [`SuffixModel`]
///
/// Immutable after loading; concurrent calls need no synchronization.
#[derive(Debug, Clone)]
pub struct SuffixModelPredictor {
    model: SuffixModel,
    version: String,
}

impl SuffixModelPredictor {
    /// Load `<artifact_root>/<version>/model.json`
    pub fn load(artifact_root: &Path, version: &str) -> Result<Self, PredictError> {
        let path = artifact_root.join(version).join(MODEL_FILE);
        info!("Loading suffix model from {}", path.display());

        let load_err = |reason: String| PredictError::ModelLoad {
            path: path.clone(),
            reason,
        };

        let raw = std::fs::read_to_string(&path).map_err(|e| load_err(e.to_string()))?;
        let model: SuffixModel = serde_json::from_str(&raw).map_err(|e| load_err(e.to_string()))?;

        if let Some(declared) = model.version.as_deref() {
            if declared != version {
                return Err(load_err(format!(
                    "artifact declares version '{}' but was loaded as '{}'",
                    declared, version
                )));
            }
        }

        let predictor = Self::from_model(model, version).map_err(|e| match e {
            PredictError::ModelLoad { reason, .. } => load_err(reason),
            other => other,
        })?;

        info!(
            version = %predictor.version,
            suffixes = predictor.model.suffix_weights.len(),
            "Suffix model loaded"
        );
        Ok(predictor)
    }

    /// Build from an in-memory model
    pub fn from_model(model: SuffixModel, version: &str) -> Result<Self, PredictError> {
        model.validate().map_err(|reason| PredictError::ModelLoad {
            path: PathBuf::from(format!("<memory:{}>", version)),
            reason,
        })?;
        let suffix_weights = model
            .suffix_weights
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();
        Ok(Self {
            model: SuffixModel {
                suffix_weights,
                ..model
            },
            version: version.to_string(),
        })
    }

    fn score(&self, name: &str) -> Option<Prediction> {
        let lowercase = name.to_lowercase();
        if !lowercase.chars().any(char::is_alphabetic) {
            debug!("Cannot score '{}': no alphabetic characters", name);
            return None;
        }

        let p_girl = self.model.girl_probability(&lowercase);
        let (label, confidence) = if p_girl >= 0.5 {
            (Label::Girl, p_girl)
        } else {
            (Label::Boy, 1.0 - p_girl)
        };

        Some(Prediction::new(name, label, round4(confidence)))
    }
}

fn round4(p: f64) -> f64 {
    ((p * 10_000.0).round() / 10_000.0).clamp(0.0, 1.0)
}

#[async_trait]
impl PredictionService for SuffixModelPredictor {
    async fn predict(&self, names: &[String]) -> Result<Vec<Prediction>, PredictError> {
        Ok(names.iter().filter_map(|name| self.score(name)).collect())
    }

    fn model_version(&self) -> &str {
        &self.version
    }
}
