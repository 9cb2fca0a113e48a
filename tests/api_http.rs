//! HTTP-level tests for the prediction API.
//!
//! Drives the axum router in-process with `tower::ServiceExt::oneshot` and a
//! fake predictor, so no model artifact or network is needed.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use boy_or_girl::api::{build_router, AppState};
use boy_or_girl::{Label, PredictError, Prediction, PredictionService, SubmissionPipeline};

// ── Fake predictors ────────────────────────────────────────────

struct TablePredictor {
    scores: HashMap<&'static str, (Label, f64)>,
}

#[async_trait]
impl PredictionService for TablePredictor {
    async fn predict(&self, names: &[String]) -> Result<Vec<Prediction>, PredictError> {
        Ok(names
            .iter()
            .filter_map(|n| {
                self.scores
                    .get(n.as_str())
                    .map(|(l, p)| Prediction::new(n.clone(), *l, *p))
            })
            .collect())
    }

    fn model_version(&self) -> &str {
        "test-1"
    }
}

struct DownPredictor;

#[async_trait]
impl PredictionService for DownPredictor {
    async fn predict(&self, _names: &[String]) -> Result<Vec<Prediction>, PredictError> {
        Err(PredictError::Unavailable("model server unreachable".into()))
    }

    fn model_version(&self) -> &str {
        "down"
    }
}

fn app_with(predictor: Arc<dyn PredictionService>) -> axum::Router {
    build_router(AppState::new(SubmissionPipeline::new(
        predictor,
        Duration::from_secs(5),
    )))
}

fn test_app() -> axum::Router {
    let scores = HashMap::from([
        ("Alice", (Label::Girl, 0.8)),
        ("Bob", (Label::Boy, 0.7)),
        ("Carol", (Label::Girl, 0.9)),
    ]);
    app_with(Arc::new(TablePredictor { scores }))
}

// ── Request helpers ────────────────────────────────────────────

async fn send(
    app: &axum::Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Vec<u8>) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, bytes.to_vec())
}

async fn send_json(
    app: &axum::Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let (status, bytes) = send(app, method, uri, body).await;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn new_session(app: &axum::Router) -> String {
    let (status, body) = send_json(app, Method::POST, "/api/sessions", None).await;
    assert_eq!(status, StatusCode::CREATED);
    body["session_id"].as_str().unwrap().to_string()
}

async fn submit(app: &axum::Router, session: &str, names: Value) -> (StatusCode, Value) {
    send_json(
        app,
        Method::POST,
        &format!("/api/sessions/{session}/submit"),
        Some(json!({ "names": names })),
    )
    .await
}

fn column(rows: &Value, idx: usize) -> Vec<Value> {
    rows.as_array()
        .unwrap()
        .iter()
        .map(|r| r[idx].clone())
        .collect()
}

// ── Tests ──────────────────────────────────────────────────────

#[tokio::test]
async fn health_reports_model_version() {
    let app = test_app();
    let (status, body) = send_json(&app, Method::GET, "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["model_version"], "test-1");
    assert_eq!(body["predict_timeout_ms"], 5000);
}

#[tokio::test]
async fn submit_dedups_rows_and_orders_chart_by_submission() {
    let app = test_app();
    let session = new_session(&app).await;

    let (status, view) = submit(&app, &session, json!("Alice Bob Alice")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["status"], "ready");
    assert_eq!(view["submitted"], json!(["Alice", "Bob", "Alice"]));
    assert_eq!(column(&view["table"]["rows"], 0), vec![json!("Alice"), json!("Bob")]);
    assert_eq!(view["table"]["total_rows"], 2);

    let categories: Vec<_> = view["chart"]["y_axis"]["categories"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].clone())
        .collect();
    assert_eq!(categories, vec![json!("Bob"), json!("Alice")]);
    assert_eq!(view["chart"]["x_axis"]["range"], json!([0.0, 1.0]));
    assert_eq!(view["chart"]["y_axis"]["reversed"], true);
}

#[tokio::test]
async fn empty_input_is_an_empty_cycle() {
    let app = test_app();
    let session = new_session(&app).await;

    for names in [json!(""), json!(" , , "), Value::Null] {
        let (status, view) = submit(&app, &session, names).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(view["status"], "ready");
        assert_eq!(view["table"]["rows"], json!([]));
        assert_eq!(view["chart"]["bars"], json!([]));
    }
}

#[tokio::test]
async fn truncation_and_unscored_names_are_reported() {
    let app = test_app();
    let session = new_session(&app).await;
    let input = "Alice Bob Carol X1 X2 X3 X4 X5 X6 X7 Dropped1 Dropped2";

    let (status, view) = submit(&app, &session, json!(input)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["submitted"].as_array().unwrap().len(), 10);
    assert_eq!(view["dropped"], json!(["Dropped1", "Dropped2"]));
    assert!(view["note"].as_str().unwrap().contains("first 10"));
    assert_eq!(
        view["unscored"],
        json!(["X1", "X2", "X3", "X4", "X5", "X6", "X7"])
    );
    assert_eq!(view["table"]["total_rows"], 3);
}

#[tokio::test]
async fn table_query_filters_sorts_and_pages() {
    let app = test_app();
    let session = new_session(&app).await;
    submit(&app, &session, json!("Alice, Bob, Carol")).await;

    let (status, page) = send_json(
        &app,
        Method::GET,
        &format!("/api/sessions/{session}/table?filter.label=GIRL&sort=probability&dir=desc"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(column(&page["rows"], 0), vec![json!("Carol"), json!("Alice")]);
    assert_eq!(page["filtered_rows"], 2);
    assert_eq!(page["total_rows"], 3);

    let (status, page) = send_json(
        &app,
        Method::GET,
        &format!("/api/sessions/{session}/table?page=1"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["rows"], json!([]));

    let (status, body) = send_json(
        &app,
        Method::GET,
        &format!("/api/sessions/{session}/table?sort=gender"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Unknown column 'gender'");
}

#[tokio::test]
async fn csv_export_covers_full_table() {
    let app = test_app();
    let session = new_session(&app).await;
    submit(&app, &session, json!("Bob Alice")).await;

    let (status, bytes) = send(
        &app,
        Method::GET,
        &format!("/api/sessions/{session}/table.csv"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        String::from_utf8(bytes).unwrap(),
        "Name,Boy or Girl?,Probability\nBob,Boy,0.7\nAlice,Girl,0.8\n"
    );
}

#[tokio::test]
async fn chart_endpoint_matches_cycle_view() {
    let app = test_app();
    let session = new_session(&app).await;
    let (_, view) = submit(&app, &session, json!("Carol Bob")).await;

    let (status, chart) = send_json(
        &app,
        Method::GET,
        &format!("/api/sessions/{session}/chart"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(chart, view["chart"]);
    assert_eq!(chart["bars"][0]["color"], "lightcoral");
    assert_eq!(chart["bars"][1]["color"], "dodgerblue");
}

#[tokio::test]
async fn same_input_twice_gives_identical_artifacts() {
    let app = test_app();
    let session = new_session(&app).await;

    let (_, first) = submit(&app, &session, json!("Alice Bob")).await;
    let (_, second) = submit(&app, &session, json!("Alice Bob")).await;
    assert_eq!(first["table"], second["table"]);
    assert_eq!(first["chart"], second["chart"]);
    assert_eq!(second["cycle"], 2);
}

#[tokio::test]
async fn sessions_are_isolated() {
    let app = test_app();
    let a = new_session(&app).await;
    let b = new_session(&app).await;

    submit(&app, &a, json!("Alice")).await;
    submit(&app, &b, json!("Bob")).await;

    let uri = format!("/api/sessions/{a}/view");
    let (_, view_a) = send_json(&app, Method::GET, &uri, None).await;
    assert_eq!(view_a["submitted"], json!(["Alice"]));
    assert_eq!(view_a["chart"]["y_axis"]["category_array"], json!(["Alice"]));
}

#[tokio::test]
async fn predictor_failure_hides_previous_results() {
    let app = app_with(Arc::new(DownPredictor));
    let session = new_session(&app).await;

    let (status, view) = submit(&app, &session, json!("Alice")).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(view["status"], "failed");
    assert_eq!(view["error"]["code"], "predictor_unavailable");
    assert!(view.get("table").is_none());

    let (status, _) = send_json(
        &app,
        Method::GET,
        &format!("/api/sessions/{session}/chart"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn unknown_and_deleted_sessions() {
    let app = test_app();
    let missing = uuid::Uuid::new_v4();
    let (status, _) = submit(&app, &missing.to_string(), json!("Alice")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let session = new_session(&app).await;
    let uri = format!("/api/sessions/{session}");
    let (status, _) = send(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let uri = format!("/api/sessions/{session}/view");
    let (status, _) = send_json(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let fresh = new_session(&app).await;
    let uri = format!("/api/sessions/{fresh}/view");
    let (status, view) = send_json(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["status"], "idle");
    let uri = format!("/api/sessions/{fresh}/table.csv");
    let (status, _) = send(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}
