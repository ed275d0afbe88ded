// src/api.rs
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;

use crate::error::PipelineError;
use crate::jobs::{process_job, FoodItem, JobOutcome};
use crate::model::{SearchResult, UserProfile};
use crate::pipeline::Pipeline;
use crate::search::SearchOrchestrator;
use crate::store::ReportStore;

#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
    store: Arc<dyn ReportStore>,
    /// Long-lived orchestrator for `/search`; its cache lives as long as the process.
    search: Arc<SearchOrchestrator>,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>, store: Arc<dyn ReportStore>) -> Self {
        let search = Arc::new(pipeline.orchestrator());
        Self {
            pipeline,
            store,
            search,
        }
    }

    pub fn search(&self) -> &SearchOrchestrator {
        &self.search
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", post(search))
        .route("/analyze", post(analyze))
        .route("/jobs", post(submit_job))
        .route("/reports/{id}", get(get_report))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    reason: String,
}

fn error_response(status: StatusCode, error: &'static str, reason: String) -> Response {
    (status, Json(ErrorBody { error, reason })).into_response()
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        error_response(StatusCode::UNPROCESSABLE_ENTITY, self.kind(), self.reason())
    }
}

#[derive(Deserialize)]
struct SearchReq {
    queries: Vec<String>,
}

#[derive(Serialize)]
struct SearchResp {
    count: usize,
    results: Vec<SearchResult>,
}

async fn search(State(state): State<AppState>, Json(body): Json<SearchReq>) -> Json<SearchResp> {
    let results = state.search.search(body.queries.as_slice()).await;
    Json(SearchResp {
        count: results.len(),
        results,
    })
}

#[derive(Deserialize)]
struct AnalyzeReq {
    text: String,
    #[serde(default)]
    profiles: Option<Vec<UserProfile>>,
}

async fn analyze(State(state): State<AppState>, Json(body): Json<AnalyzeReq>) -> Response {
    match state.pipeline.analyze(&body.text, body.profiles).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => e.into_response(),
    }
}

#[derive(Deserialize)]
struct JobReq {
    item: FoodItem,
    #[serde(default = "first_attempt")]
    attempt: u32,
}

fn first_attempt() -> u32 {
    1
}

async fn submit_job(State(state): State<AppState>, Json(body): Json<JobReq>) -> Json<JobOutcome> {
    tracing::info!(target: "api", item_id = %body.item.id, "job submitted");
    let outcome = process_job(&state.pipeline, state.store.as_ref(), &body.item, body.attempt).await;
    Json(outcome)
}

async fn get_report(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.store.load_report(&id).await {
        Ok(Some(r)) => Json(r).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "not_found", format!("no report for {id}")),
        Err(e) => {
            tracing::warn!(target: "api", error = ?e, "store read failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "store", format!("{e:#}"))
        }
    }
}
