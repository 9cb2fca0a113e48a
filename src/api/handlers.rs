//! Request handlers

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ApiError, AppState};
use crate::chart::ChartSpec;
use crate::error::PipelineError;
use crate::session::{CompletedCycle, CycleState, CycleView, Session};
use crate::table::{TablePage, TableQuery};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub model_version: String,
    pub predict_timeout_ms: u64,
    pub sessions: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionCreated {
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SubmitRequest {
    /// Free text naming one or more people
    #[serde(default)]
    pub names: Option<String>,
}

async fn session(state: &AppState, id: Uuid) -> Result<Arc<Session>, ApiError> {
    state
        .sessions
        .get(id)
        .await
        .ok_or(ApiError::SessionNotFound(id))
}

async fn completed(state: &AppState, id: Uuid) -> Result<Arc<CompletedCycle>, ApiError> {
    session(state, id)
        .await?
        .completed()
        .await
        .ok_or(ApiError::NoResults(id))
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        model_version: state.pipeline.model_version().to_string(),
        predict_timeout_ms: state.pipeline.timeout().as_millis() as u64,
        sessions: state.sessions.len().await,
    })
}

pub async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<SessionCreated>) {
    let session = state.sessions.create().await;
    tracing::info!(session_id = %session.id(), "Session created");
    (
        StatusCode::CREATED,
        Json(SessionCreated {
            session_id: session.id(),
            created_at: session.created_at(),
        }),
    )
}

pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state
        .sessions
        .remove(id)
        .await
        .ok_or(ApiError::SessionNotFound(id))?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn submit(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SubmitRequest>,
) -> Result<Json<CycleView>, ApiError> {
    let session = session(&state, id).await?;

    match state
        .pipeline
        .submit(&session, request.names.as_deref())
        .await
    {
        Ok(done) => Ok(Json(CycleState::Ready(done).view())),
        Err(error) => {
            let view = session.state().await.view();
            if let PipelineError::Superseded { .. } = error {
                tracing::debug!(session_id = %id, "Submission superseded by a newer one");
            }
            Err(ApiError::Cycle {
                error,
                view: Box::new(view),
            })
        }
    }
}

pub async fn view(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CycleView>, ApiError> {
    let session = session(&state, id).await?;
    Ok(Json(session.state().await.view()))
}

pub async fn table(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<TablePage>, ApiError> {
    let query = TableQuery::from_params(&params)?;
    let done = completed(&state, id).await?;
    Ok(Json(done.table.query(&query)?))
}

pub async fn table_csv(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, ApiError> {
    let done = completed(&state, id).await?;
    let csv = done.table.export_csv()?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"predictions.csv\"",
            ),
        ],
        csv,
    )
        .into_response())
}

pub async fn chart(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ChartSpec>, ApiError> {
    let done = completed(&state, id).await?;
    Ok(Json(done.chart.clone()))
}
