//! Sessions - per-client cycle state
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  SessionRegistry                                         │
//! │  RwLock<HashMap<Uuid, Arc<Session>>>                     │
//! └──────────────────────────────────────────────────────────┘
//!                           │
//!                           ▼
//! ┌──────────────────────────────────────────────────────────┐
//! │  Session                                                 │
//! │  state: RwLock<SessionInner>  (latest cycle + CycleState)│
//! │  order_store: SubmissionOrderStore (watch channel)       │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! A session is never shared with another client. Starting a cycle replaces
//! the previous state with `Pending` in one write, so results of an older
//! cycle stop being visible the moment a new submission arrives. A cycle
//! that finishes after a newer one started is discarded.
//!
//! Every registry lookup counts as activity. Sessions idle for longer than
//! the configured TTL are dropped by `SessionRegistry::cleanup_expired`,
//! which `spawn_expiry_sweep` runs on an interval.

pub mod order_store;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use uuid::Uuid;

use crate::chart::ChartSpec;
use crate::error::PipelineError;
use crate::input::ParsedInput;
use crate::table::{TablePage, TableView};

pub use order_store::{SubmissionOrderStore, SubmittedOrder};

/// Products of a cycle that reached `ChartPublished`
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedCycle {
    pub cycle: u64,
    pub parsed: ParsedInput,
    pub unscored: Vec<String>,
    pub table: TableView,
    pub chart: ChartSpec,
    pub model_version: String,
    pub completed_at: DateTime<Utc>,
}

/// Failure recorded for a cycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleFailure {
    pub code: String,
    pub message: String,
}

impl From<&PipelineError> for CycleFailure {
    fn from(err: &PipelineError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum CycleState {
    /// No submission yet
    Idle,
    Pending {
        cycle: u64,
        parsed: ParsedInput,
        started_at: DateTime<Utc>,
    },
    Ready(Arc<CompletedCycle>),
    Failed {
        cycle: u64,
        parsed: ParsedInput,
        failure: CycleFailure,
        failed_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleStatus {
    Idle,
    Pending,
    Ready,
    Failed,
}

/// Client-facing snapshot of a session's current cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleView {
    pub cycle: u64,
    pub status: CycleStatus,
    pub submitted: Vec<String>,
    pub dropped: Vec<String>,
    pub unscored: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<TablePage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chart: Option<ChartSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CycleFailure>,
}

impl CycleView {
    fn bare(cycle: u64, status: CycleStatus, parsed: Option<&ParsedInput>) -> Self {
        Self {
            cycle,
            status,
            submitted: parsed.map(|p| p.candidates.clone()).unwrap_or_default(),
            dropped: parsed.map(|p| p.dropped.clone()).unwrap_or_default(),
            unscored: Vec::new(),
            note: parsed.and_then(ParsedInput::truncation_note),
            table: None,
            chart: None,
            model_version: None,
            error: None,
        }
    }
}

impl CycleState {
    pub fn cycle(&self) -> u64 {
        match self {
            CycleState::Idle => 0,
            CycleState::Pending { cycle, .. } | CycleState::Failed { cycle, .. } => *cycle,
            CycleState::Ready(done) => done.cycle,
        }
    }

    pub fn view(&self) -> CycleView {
        match self {
            CycleState::Idle => CycleView::bare(0, CycleStatus::Idle, None),
            CycleState::Pending { cycle, parsed, .. } => {
                CycleView::bare(*cycle, CycleStatus::Pending, Some(parsed))
            }
            CycleState::Failed {
                cycle,
                parsed,
                failure,
                ..
            } => CycleView {
                error: Some(failure.clone()),
                ..CycleView::bare(*cycle, CycleStatus::Failed, Some(parsed))
            },
            CycleState::Ready(done) => CycleView {
                unscored: done.unscored.clone(),
                table: Some(done.table.first_page()),
                chart: Some(done.chart.clone()),
                model_version: Some(done.model_version.clone()),
                ..CycleView::bare(done.cycle, CycleStatus::Ready, Some(&done.parsed))
            },
        }
    }
}

#[derive(Debug)]
struct SessionInner {
    latest_cycle: u64,
    state: CycleState,
}

/// One client's workspace
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    created_at: DateTime<Utc>,
    last_activity: Mutex<Instant>,
    inner: RwLock<SessionInner>,
    order_store: SubmissionOrderStore,
}

impl Session {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            last_activity: Mutex::new(Instant::now()),
            inner: RwLock::new(SessionInner {
                latest_cycle: 0,
                state: CycleState::Idle,
            }),
            order_store: SubmissionOrderStore::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Mark the session as used now
    pub fn touch(&self) {
        *self
            .last_activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    /// Time since the last `touch` (or creation)
    pub fn idle_for(&self) -> Duration {
        self.last_activity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed()
    }

    pub fn order_store(&self) -> &SubmissionOrderStore {
        &self.order_store
    }

    /// Start a new cycle, invalidating everything the previous one produced
    pub async fn begin_cycle(&self, parsed: ParsedInput) -> u64 {
        let mut inner = self.inner.write().await;
        inner.latest_cycle += 1;
        let cycle = inner.latest_cycle;
        inner.state = CycleState::Pending {
            cycle,
            parsed,
            started_at: Utc::now(),
        };
        cycle
    }

    /// Publish table and chart of a cycle together
    pub async fn complete(
        &self,
        done: CompletedCycle,
    ) -> Result<Arc<CompletedCycle>, PipelineError> {
        let mut inner = self.inner.write().await;
        if done.cycle != inner.latest_cycle {
            return Err(PipelineError::Superseded {
                cycle: done.cycle,
                latest: inner.latest_cycle,
            });
        }
        let done = Arc::new(done);
        inner.state = CycleState::Ready(Arc::clone(&done));
        Ok(done)
    }

    /// Record a failed cycle. Ignored when a newer cycle already started.
    pub async fn fail(&self, cycle: u64, parsed: ParsedInput, err: &PipelineError) -> bool {
        let mut inner = self.inner.write().await;
        if cycle != inner.latest_cycle {
            return false;
        }
        inner.state = CycleState::Failed {
            cycle,
            parsed,
            failure: CycleFailure::from(err),
            failed_at: Utc::now(),
        };
        true
    }

    pub async fn state(&self) -> CycleState {
        self.inner.read().await.state.clone()
    }

    /// Completed cycle, if the current state is `Ready`
    pub async fn completed(&self) -> Option<Arc<CompletedCycle>> {
        match &self.inner.read().await.state {
            CycleState::Ready(done) => Some(Arc::clone(done)),
            _ => None,
        }
    }
}

/// All live sessions
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Arc<Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self) -> Arc<Session> {
        let session = Arc::new(Session::new(Uuid::new_v4()));
        self.sessions
            .write()
            .await
            .insert(session.id(), Arc::clone(&session));
        session
    }

    /// Look up a session and record the access as activity
    pub async fn get(&self, id: Uuid) -> Option<Arc<Session>> {
        let session = self.sessions.read().await.get(&id).cloned()?;
        session.touch();
        Some(session)
    }

    pub async fn remove(&self, id: Uuid) -> Option<Arc<Session>> {
        self.sessions.write().await.remove(&id)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop every session idle for at least `ttl`. Returns how many went.
    pub async fn cleanup_expired(&self, ttl: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.idle_for() < ttl);
        let removed = before - sessions.len();
        if removed > 0 {
            tracing::info!(removed, remaining = sessions.len(), "Expired idle sessions");
        }
        removed
    }

    /// Run `cleanup_expired` every `every` until the registry is dropped
    pub fn spawn_expiry_sweep(
        self: &Arc<Self>,
        ttl: Duration,
        every: Duration,
    ) -> JoinHandle<()> {
        let registry: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(registry) = registry.upgrade() else {
                    break;
                };
                registry.cleanup_expired(ttl).await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::parse_names;

    fn completed(cycle: u64, parsed: ParsedInput) -> CompletedCycle {
        CompletedCycle {
            cycle,
            parsed,
            unscored: Vec::new(),
            table: TableView::from_predictions(&[]),
            chart: ChartSpec::empty(),
            model_version: "test".to_string(),
            completed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_new_cycle_invalidates_previous_results() {
        let session = Session::new(Uuid::new_v4());
        let first = session.begin_cycle(parse_names(Some("Ann"))).await;
        session
            .complete(completed(first, parse_names(Some("Ann"))))
            .await
            .unwrap();
        assert_eq!(session.state().await.view().status, CycleStatus::Ready);

        let second = session.begin_cycle(parse_names(Some("Bob"))).await;
        assert_eq!(second, first + 1);
        let view = session.state().await.view();
        assert_eq!(view.status, CycleStatus::Pending);
        assert_eq!(view.submitted, vec!["Bob".to_string()]);
        assert!(view.table.is_none());
        assert!(view.chart.is_none());
        assert!(session.completed().await.is_none());
    }

    #[tokio::test]
    async fn test_late_cycle_is_discarded() {
        let session = Session::new(Uuid::new_v4());
        let old = session.begin_cycle(parse_names(Some("Old"))).await;
        let new = session.begin_cycle(parse_names(Some("New"))).await;

        let err = session
            .complete(completed(old, parse_names(Some("Old"))))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Superseded { cycle, latest } if cycle == old && latest == new
        ));

        let timeout = PipelineError::Timeout(std::time::Duration::from_millis(1));
        assert!(!session.fail(old, parse_names(Some("Old")), &timeout).await);
        assert_eq!(session.state().await.cycle(), new);
    }

    #[tokio::test]
    async fn test_failed_view() {
        let session = Session::new(Uuid::new_v4());
        let cycle = session.begin_cycle(parse_names(Some("Ann"))).await;
        let err = PipelineError::Timeout(std::time::Duration::from_millis(10));
        assert!(session.fail(cycle, parse_names(Some("Ann")), &err).await);

        let view = session.state().await.view();
        assert_eq!(view.status, CycleStatus::Failed);
        assert_eq!(view.error.unwrap().code, "predictor_timeout");
        assert!(view.table.is_none());
    }

    #[tokio::test]
    async fn test_registry() {
        let registry = SessionRegistry::new();
        assert!(registry.is_empty().await);

        let session = registry.create().await;
        assert!(registry.get(session.id()).await.is_some());
        assert_eq!(registry.len().await, 1);

        registry.remove(session.id()).await;
        assert!(registry.get(session.id()).await.is_none());
        assert_eq!(session.state().await.view().status, CycleStatus::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_sessions_expire() {
        let registry = SessionRegistry::new();
        let idle = registry.create().await;
        let active = registry.create().await;

        tokio::time::advance(Duration::from_secs(20)).await;
        assert!(registry.get(active.id()).await.is_some());
        tokio::time::advance(Duration::from_secs(15)).await;

        assert_eq!(registry.cleanup_expired(Duration::from_secs(30)).await, 1);
        assert!(registry.get(idle.id()).await.is_none());
        assert!(registry.get(active.id()).await.is_some());
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_sweep_runs_on_interval() {
        let registry = Arc::new(SessionRegistry::new());
        let ttl = Duration::from_secs(30);
        let sweep = registry.spawn_expiry_sweep(ttl, Duration::from_secs(10));
        registry.create().await;

        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(registry.len().await, 1);

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(registry.is_empty().await);

        drop(registry);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(sweep.is_finished());
    }
}
