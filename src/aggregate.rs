//! Result aggregation - canonical row order
//!
//! Removes rows that repeat an earlier row on *every* field, keeping the
//! first occurrence. Two predictions for the same name that differ in label,
//! probability or any extra field are both kept.

use std::collections::HashSet;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::prediction::{Label, Prediction};

/// Structural identity of a row. Numbers compare by value, so `-0.0` and
/// `0.0` are the same probability and `1` equals `1.0` in an extra field.
#[derive(Debug, PartialEq, Eq, Hash)]
struct RowKey {
    name: String,
    label: Label,
    probability_bits: u64,
    extra: String,
}

impl RowKey {
    fn of(p: &Prediction) -> Self {
        let extra: serde_json::Map<String, Value> = p
            .extra
            .iter()
            .map(|(k, v)| (k.clone(), numbers_as_f64(v)))
            .collect();
        Self {
            name: p.name.clone(),
            label: p.label,
            probability_bits: unsigned_zero(p.probability).to_bits(),
            // keys serialize sorted, so equal maps give equal strings
            extra: serde_json::to_string(&extra).unwrap_or_default(),
        }
    }
}

fn unsigned_zero(n: f64) -> f64 {
    if n == 0.0 {
        0.0
    } else {
        n
    }
}

/// Rewrite every number as an f64 so integer and float spellings of the
/// same value serialize identically
fn numbers_as_f64(value: &Value) -> Value {
    match value {
        Value::Number(n) => n
            .as_f64()
            .and_then(|f| serde_json::Number::from_f64(unsigned_zero(f)))
            .map(Value::Number)
            .unwrap_or_else(|| value.clone()),
        Value::Array(items) => Value::Array(items.iter().map(numbers_as_f64).collect()),
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), numbers_as_f64(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Canonical prediction set of one cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Aggregated {
    /// Deduplicated rows in first-occurrence order
    pub rows: Vec<Prediction>,
    /// Rows dropped for an out-of-range probability
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rejected: Vec<Prediction>,
}

impl Aggregated {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Submitted names with no canonical row, in submission order, each once
    pub fn unscored(&self, submitted: &[String]) -> Vec<String> {
        let scored: HashSet<&str> = self.rows.iter().map(|p| p.name.as_str()).collect();
        let mut seen = HashSet::new();
        submitted
            .iter()
            .filter(|name| !scored.contains(name.as_str()))
            .filter(|name| seen.insert(name.as_str()))
            .cloned()
            .collect()
    }
}

/// Validate and deduplicate the raw predictor output
pub fn aggregate(raw: Vec<Prediction>) -> Aggregated {
    let total = raw.len();
    let mut seen = HashSet::with_capacity(total);
    let mut rows = Vec::with_capacity(total);
    let mut rejected = Vec::new();

    for prediction in raw {
        if !prediction.has_valid_probability() {
            warn!(
                "Rejecting prediction for '{}': probability {} outside [0, 1]",
                prediction.name, prediction.probability
            );
            rejected.push(prediction);
            continue;
        }
        if seen.insert(RowKey::of(&prediction)) {
            rows.push(prediction);
        }
    }

    debug!(
        total,
        kept = rows.len(),
        rejected = rejected.len(),
        "Aggregated predictions"
    );

    Aggregated { rows, rejected }
}
