//! Prediction types and the predictor abstraction
//!
//! The `PredictionService` trait lets different classifiers be used
//! interchangeably. One instance is loaded at startup and shared by every
//! session, so implementations must be safe for concurrent read-only use.
//!
//! Output order is predictor-defined. Callers correlate rows to submitted
//! names through `Prediction::name`, never by position.

pub mod suffix;

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use async_trait::async_trait;
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::PredictError;

pub use suffix::{SuffixModel, SuffixModelPredictor};

/// Predicted class for a name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Label {
    Boy,
    Girl,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Boy => "Boy",
            Label::Girl => "Girl",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wire name of `Prediction::name`
pub const NAME_FIELD: &str = "Name";
/// Wire name of `Prediction::label`
pub const LABEL_FIELD: &str = "Boy or Girl?";
/// Wire name of `Prediction::probability`
pub const PROBABILITY_FIELD: &str = "Probability";

/// Prefix given to extra keys that clash with a fixed field
pub const EXTRA_PREFIX: &str = "extra.";

/// Pair each extra key with the key it is exposed under.
///
/// A key found in `reserved` is prefixed with `extra.` (repeatedly, until it
/// clashes with nothing) so it can never shadow a fixed field.
pub fn disambiguate_extra_keys<'a, I>(keys: I, reserved: &[&str]) -> Vec<(&'a str, String)>
where
    I: IntoIterator<Item = &'a str>,
{
    let keys: Vec<&str> = keys.into_iter().collect();
    let mut taken: HashSet<String> = reserved.iter().map(|k| k.to_string()).collect();
    taken.extend(keys.iter().map(|k| k.to_string()));

    keys.into_iter()
        .map(|key| {
            if !reserved.contains(&key) {
                return (key, key.to_string());
            }
            let mut exposed = format!("{EXTRA_PREFIX}{key}");
            while taken.contains(&exposed) {
                exposed = format!("{EXTRA_PREFIX}{exposed}");
            }
            taken.insert(exposed.clone());
            (key, exposed)
        })
        .collect()
}

/// A scored name
///
/// Field names on the wire match the table headers. Model-specific fields
/// are kept in `extra` and written next to the fixed ones; an extra key that
/// equals a fixed wire name is written as `extra.<key>`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Prediction {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Boy or Girl?")]
    pub label: Label,
    /// Confidence in `label`, within [0, 1]
    #[serde(rename = "Probability")]
    pub probability: f64,
    #[serde(flatten, default)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Serialize for Prediction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3 + self.extra.len()))?;
        map.serialize_entry(NAME_FIELD, &self.name)?;
        map.serialize_entry(LABEL_FIELD, &self.label)?;
        map.serialize_entry(PROBABILITY_FIELD, &self.probability)?;
        let reserved = [NAME_FIELD, LABEL_FIELD, PROBABILITY_FIELD];
        let keys = disambiguate_extra_keys(self.extra.keys().map(String::as_str), &reserved);
        for (key, exposed) in keys {
            map.serialize_entry(&exposed, &self.extra[key])?;
        }
        map.end()
    }
}

impl Prediction {
    pub fn new(name: impl Into<String>, label: Label, probability: f64) -> Self {
        Self {
            name: name.into(),
            label,
            probability,
            extra: BTreeMap::new(),
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Finite and within [0, 1]
    pub fn has_valid_probability(&self) -> bool {
        self.probability.is_finite() && (0.0..=1.0).contains(&self.probability)
    }
}

/// A name -> gender classifier
///
/// `names` holds at most `crate::input::MAX_CANDIDATES` entries and may
/// contain repeats. Every name that can be scored yields at least one
/// prediction; names that cannot be scored are simply absent from the output.
#[async_trait]
pub trait PredictionService: Send + Sync {
    /// Score a batch of names
    async fn predict(&self, names: &[String]) -> Result<Vec<Prediction>, PredictError>;

    /// Version of the loaded model artifact
    fn model_version(&self) -> &str;
}
