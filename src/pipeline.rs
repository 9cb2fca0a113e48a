//! Submission pipeline
//!
//! One submission is one cycle:
//!
//! ```text
//! Idle → Parsed → Predicted → Aggregated → TablePublished → ChartPublished → Idle
//!                    │
//!                    └── error / timeout ──► Failed
//! ```
//!
//! The table stage publishes the submission order to the session's
//! `SubmissionOrderStore`; the chart stage reads it back. Both products are
//! committed to the session in a single write once the chart is built.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::aggregate::{aggregate, Aggregated};
use crate::chart::ChartSpec;
use crate::error::PipelineError;
use crate::input::{parse_names, ParsedInput};
use crate::prediction::{Prediction, PredictionService};
use crate::session::{CompletedCycle, Session};
use crate::table::TableView;

/// Default bound on a predictor call
pub const DEFAULT_PREDICT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleStage {
    Parsed,
    Predicted,
    Aggregated,
    TablePublished,
    ChartPublished,
}

impl fmt::Display for CycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CycleStage::Parsed => "parsed",
            CycleStage::Predicted => "predicted",
            CycleStage::Aggregated => "aggregated",
            CycleStage::TablePublished => "table_published",
            CycleStage::ChartPublished => "chart_published",
        };
        f.write_str(s)
    }
}

/// Runs submission cycles against a shared predictor
#[derive(Clone)]
pub struct SubmissionPipeline {
    predictor: Arc<dyn PredictionService>,
    timeout: Duration,
}

impl SubmissionPipeline {
    pub fn new(predictor: Arc<dyn PredictionService>, timeout: Duration) -> Self {
        Self { predictor, timeout }
    }

    pub fn model_version(&self) -> &str {
        self.predictor.model_version()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run one full cycle for `session`
    ///
    /// On failure the session is left in the `Failed` state (unless a newer
    /// cycle has started meanwhile) and the error is returned.
    #[instrument(skip(self, session, raw), fields(session_id = %session.id()))]
    pub async fn submit(
        &self,
        session: &Session,
        raw: Option<&str>,
    ) -> Result<Arc<CompletedCycle>, PipelineError> {
        let parsed = parse_names(raw);
        if parsed.was_truncated() {
            info!(
                kept = parsed.candidates.len(),
                dropped = parsed.dropped.len(),
                "Submission truncated"
            );
        }

        let cycle = session.begin_cycle(parsed.clone()).await;
        debug!(cycle, stage = %CycleStage::Parsed, candidates = parsed.candidates.len());

        match self.run_cycle(session, cycle, &parsed).await {
            Ok(done) => {
                info!(
                    cycle,
                    rows = done.table.len(),
                    unscored = done.unscored.len(),
                    "Cycle complete"
                );
                Ok(done)
            }
            Err(err) => {
                if !matches!(err, PipelineError::Superseded { .. }) {
                    warn!(cycle, "Cycle failed: {}", err);
                    session.fail(cycle, parsed, &err).await;
                } else {
                    debug!(cycle, "Cycle superseded: {}", err);
                }
                Err(err)
            }
        }
    }

    async fn run_cycle(
        &self,
        session: &Session,
        cycle: u64,
        parsed: &ParsedInput,
    ) -> Result<Arc<CompletedCycle>, PipelineError> {
        let raw = self.predict(&parsed.candidates).await?;
        debug!(cycle, stage = %CycleStage::Predicted, rows = raw.len());

        let aggregated = aggregate(raw);
        debug!(cycle, stage = %CycleStage::Aggregated, rows = aggregated.rows.len());

        let table = run_table_stage(session, cycle, parsed, &aggregated)?;
        debug!(cycle, stage = %CycleStage::TablePublished);

        let chart = run_chart_stage(session, cycle, &aggregated)?;
        debug!(cycle, stage = %CycleStage::ChartPublished, bars = chart.bars.len());

        session
            .complete(CompletedCycle {
                cycle,
                parsed: parsed.clone(),
                unscored: aggregated.unscored(&parsed.candidates),
                table,
                chart,
                model_version: self.predictor.model_version().to_string(),
                completed_at: Utc::now(),
            })
            .await
    }

    /// Call the predictor under the timeout. No names, no call.
    async fn predict(&self, names: &[String]) -> Result<Vec<Prediction>, PipelineError> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        match tokio::time::timeout(self.timeout, self.predictor.predict(names)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(PipelineError::Timeout(self.timeout)),
        }
    }
}

/// Build the table and publish the cycle's submission order
pub fn run_table_stage(
    session: &Session,
    cycle: u64,
    parsed: &ParsedInput,
    aggregated: &Aggregated,
) -> Result<TableView, PipelineError> {
    let table = TableView::from_predictions(&aggregated.rows);
    if !session
        .order_store()
        .publish(cycle, parsed.candidates.clone())
    {
        return Err(PipelineError::Superseded {
            cycle,
            latest: session.order_store().current().cycle,
        });
    }
    Ok(table)
}

/// Build the chart from the rows and the stored submission order
pub fn run_chart_stage(
    session: &Session,
    cycle: u64,
    aggregated: &Aggregated,
) -> Result<ChartSpec, PipelineError> {
    let order = session.order_store().current();
    if order.cycle != cycle {
        return Err(PipelineError::Superseded {
            cycle,
            latest: order.cycle,
        });
    }
    Ok(ChartSpec::build(&aggregated.rows, &order.names))
}
