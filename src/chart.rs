//! Ranked horizontal bar chart
//!
//! The category (y) axis is ordered by the submission order of the cycle,
//! never by row order, and reversed so the first submitted name sits at the
//! top. Bars encode probability on a fixed [0, 1] x axis and are colored by
//! label.
//!
//! The submission order is taken before deduplication while the rows are
//! taken after, so the two can disagree. Building never fails on that:
//! submitted names without a row keep an empty slot, rows without a
//! submitted name go below the ordered categories.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::warn;

use crate::prediction::{Label, Prediction};

pub const CHART_TITLE: &str = "Confidence in Prediction";

/// Fixed probability axis
pub const X_RANGE: [f64; 2] = [0.0, 1.0];

/// Fixed label palette
pub fn color_for(label: Label) -> &'static str {
    match label {
        Label::Boy => "dodgerblue",
        Label::Girl => "lightcoral",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueAxis {
    pub title: String,
    pub range: [f64; 2],
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategorySlot {
    pub name: String,
    /// False when no canonical row carries this name
    pub scored: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryAxis {
    pub title: String,
    /// Submission order as stored for the cycle
    pub category_array: Vec<String>,
    /// Axis drawn reversed: first entry of `categories` at the top
    pub reversed: bool,
    /// Resolved categories, top to bottom
    pub categories: Vec<CategorySlot>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bar {
    pub category: String,
    pub label: Label,
    pub probability: f64,
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegendEntry {
    pub label: Label,
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    pub title: String,
    pub x_axis: ValueAxis,
    pub y_axis: CategoryAxis,
    /// Bars grouped by category, top to bottom
    pub bars: Vec<Bar>,
    pub legend: Vec<LegendEntry>,
}

impl ChartSpec {
    /// Build from the canonical rows and the stored submission order
    pub fn build(rows: &[Prediction], submission_order: &[String]) -> Self {
        let mut by_name: HashMap<&str, Vec<&Prediction>> = HashMap::new();
        for row in rows {
            by_name.entry(row.name.as_str()).or_default().push(row);
        }

        let ordered = top_to_bottom(submission_order);
        let ordered_set: HashSet<&str> = ordered.iter().map(String::as_str).collect();

        let mut categories: Vec<CategorySlot> = ordered
            .iter()
            .map(|name| CategorySlot {
                name: name.clone(),
                scored: by_name.contains_key(name.as_str()),
            })
            .collect();

        // rows the order does not mention, in row order
        let mut orphans: Vec<&str> = Vec::new();
        for row in rows {
            let name = row.name.as_str();
            if !ordered_set.contains(name) && !orphans.contains(&name) {
                orphans.push(name);
            }
        }
        if !orphans.is_empty() {
            warn!(
                "{} predicted name(s) missing from submission order: {}",
                orphans.len(),
                orphans.join(", ")
            );
            categories.extend(orphans.iter().map(|name| CategorySlot {
                name: name.to_string(),
                scored: true,
            }));
        }

        let bars = categories
            .iter()
            .flat_map(|slot| by_name.get(slot.name.as_str()).into_iter().flatten())
            .map(|p| Bar {
                category: p.name.clone(),
                label: p.label,
                probability: p.probability,
                color: color_for(p.label),
            })
            .collect::<Vec<_>>();

        let mut labels: Vec<Label> = bars.iter().map(|b| b.label).collect();
        labels.sort();
        labels.dedup();
        let legend = labels
            .into_iter()
            .map(|label| LegendEntry {
                label,
                color: color_for(label),
            })
            .collect();

        Self {
            title: CHART_TITLE.to_string(),
            x_axis: ValueAxis {
                title: "Probability".to_string(),
                range: X_RANGE,
            },
            y_axis: CategoryAxis {
                title: "Name".to_string(),
                category_array: submission_order.to_vec(),
                reversed: true,
                categories,
            },
            bars,
            legend,
        }
    }

    /// Chart with no data
    pub fn empty() -> Self {
        Self::build(&[], &[])
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Category names, top to bottom
    pub fn category_order(&self) -> Vec<&str> {
        self.y_axis
            .categories
            .iter()
            .map(|c| c.name.as_str())
            .collect()
    }
}

/// Submission order as displayed on a reversed axis. A repeated name takes
/// the position of its last occurrence.
fn top_to_bottom(order: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out: Vec<String> = order
        .iter()
        .rev()
        .filter(|name| seen.insert(name.as_str()))
        .cloned()
        .collect();
    out.reverse();
    out
}
