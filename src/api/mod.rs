//! HTTP API
//!
//! ## Endpoints
//!
//! | Endpoint | Method | Description |
//! |----------|--------|-------------|
//! | `/api/health` | GET | Liveness and model version |
//! | `/api/sessions` | POST | Create a session |
//! | `/api/sessions/:id` | DELETE | Drop a session |
//! | `/api/sessions/:id/submit` | POST | Run one submission cycle |
//! | `/api/sessions/:id/view` | GET | Current cycle view |
//! | `/api/sessions/:id/table` | GET | Filtered / sorted / paged table |
//! | `/api/sessions/:id/table.csv` | GET | Full table as CSV |
//! | `/api/sessions/:id/chart` | GET | Chart spec |

pub mod handlers;
pub mod router;

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::error::{PipelineError, TableError};
use crate::pipeline::SubmissionPipeline;
use crate::session::{CycleView, SessionRegistry};

pub use router::build_router;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pipeline: SubmissionPipeline,
    pub sessions: Arc<SessionRegistry>,
}

impl AppState {
    pub fn new(pipeline: SubmissionPipeline) -> Self {
        Self {
            pipeline,
            sessions: Arc::new(SessionRegistry::new()),
        }
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Session {0} not found")]
    SessionNotFound(Uuid),

    #[error("Session {0} has no completed cycle")]
    NoResults(Uuid),

    #[error(transparent)]
    Table(#[from] TableError),

    /// A cycle ended without results; the body carries the session's view
    #[error("{error}")]
    Cycle {
        error: PipelineError,
        view: Box<CycleView>,
    },
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::SessionNotFound(_) => StatusCode::NOT_FOUND,
            Self::NoResults(_) => StatusCode::CONFLICT,
            Self::Table(TableError::Export(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Table(_) => StatusCode::BAD_REQUEST,
            Self::Cycle { error, .. } => match error {
                PipelineError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
                PipelineError::Predictor(_) => StatusCode::BAD_GATEWAY,
                PipelineError::Superseded { .. } => StatusCode::CONFLICT,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}", self);
        }
        match self {
            Self::Cycle { view, .. } => (status, Json(*view)).into_response(),
            other => (status, Json(json!({ "error": other.to_string() }))).into_response(),
        }
    }
}
