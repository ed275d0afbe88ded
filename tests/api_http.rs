// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health
// - POST /search
// - POST /analyze (success + 422 error body)
// - POST /jobs, then GET /reports/{id}

use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value as Json};
use tower::ServiceExt as _; // for `oneshot`

use evidence_auditor::config::EngineConfig;
use evidence_auditor::fetch::StaticFetcher;
use evidence_auditor::generate::ScriptedGenerator;
use evidence_auditor::model::SearchResult;
use evidence_auditor::pipeline::{Pipeline, SharedFetcher};
use evidence_auditor::search::providers::mock::MockSearchProvider;
use evidence_auditor::store::MemoryStore;
use evidence_auditor::{router, AppState};

const BODY_LIMIT: usize = 1024 * 1024;

const REPORT: &str = r#"{"health_score": 62, "scientific_summary": "Moderate fiber.",
  "user_scenario": [{"scenario": "Weight Loss Goal", "verdict": "Caution", "reasoning": "calories"}],
  "evidence": [
    {"notes": "Dietary fiber improves satiety", "source_link": "https://www.who.int/fiber"},
    {"notes": "Fiber lowers cholesterol", "source_link": "https://www.cdc.gov/missing"}
  ]}"#;

fn test_router(generator: ScriptedGenerator) -> Router {
    let provider = MockSearchProvider::new().with_default(vec![SearchResult::new(
        "https://www.who.int/fiber",
        "Fiber",
        "dietary fiber and satiety",
    )]);
    let fetcher = StaticFetcher::new().with_page(
        "https://www.who.int/fiber",
        "<main><p>Dietary fiber improves satiety after meals.</p></main>",
    );
    let pipeline = Pipeline::new(
        EngineConfig::with_builtin_allow_list(),
        Arc::new(provider),
        Arc::new(generator),
        Arc::new(SharedFetcher(Arc::new(fetcher))),
    );
    router(AppState::new(Arc::new(pipeline), Arc::new(MemoryStore::new())))
}

fn post_json(uri: &str, payload: Json) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .expect("build POST")
}

async fn read_json(resp: axum::response::Response) -> Json {
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("parse json")
}

#[tokio::test]
async fn api_health_returns_200_and_ok_body() {
    let app = test_router(ScriptedGenerator::new(REPORT));
    let req = Request::get("/health").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.expect("oneshot /health");
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    assert_eq!(String::from_utf8(bytes.to_vec()).unwrap(), "ok");
}

#[tokio::test]
async fn api_search_returns_unique_results() {
    let app = test_router(ScriptedGenerator::new(REPORT));
    let resp = app
        .oneshot(post_json("/search", json!({ "queries": ["fiber", "satiety"] })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let v = read_json(resp).await;
    assert_eq!(v["count"], 1);
    assert_eq!(v["results"][0]["url"], "https://www.who.int/fiber");
}

#[tokio::test]
async fn api_analyze_returns_audited_report() {
    let app = test_router(ScriptedGenerator::new(REPORT));
    let resp = app
        .oneshot(post_json("/analyze", json!({ "text": "Title: Oat Bar\nIngredients:\n- oats" })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let v = read_json(resp).await;
    assert_eq!(v["health_score"], 62);
    let evidence = v["evidence"].as_array().expect("evidence array");
    assert_eq!(evidence.len(), 1);
    assert_eq!(evidence[0]["link_status"], true);
    assert_eq!(evidence[0]["link_contains_notes_in_content"], true);
    assert_eq!(v["warnings"], json!(["dead link: https://www.cdc.gov/missing"]));
    assert_eq!(v["user_details"].as_array().map(Vec::len), Some(6));
    assert!(v["user_scenarios"].is_array());
}

#[tokio::test]
async fn api_analyze_failure_is_422_with_kind_and_reason() {
    let app = test_router(ScriptedGenerator::empty());
    let resp = app
        .oneshot(post_json("/analyze", json!({ "text": "Title: Oat Bar" })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let v = read_json(resp).await;
    assert_eq!(v["error"], "generation_empty");
    assert_eq!(v["reason"], "generation returned empty content");
}

#[tokio::test]
async fn api_analyze_rejects_duplicate_profile_labels() {
    let app = test_router(ScriptedGenerator::new(REPORT));
    let profile = json!({
        "label": "Runner", "age": 30, "weight": 60.0, "height": 170.0,
        "lifestyle": "active", "conditions": []
    });
    let resp = app
        .oneshot(post_json(
            "/analyze",
            json!({ "text": "Title: Oat Bar", "profiles": [profile.clone(), profile] }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(read_json(resp).await["error"], "invalid_input");
}

#[tokio::test]
async fn api_job_then_report_lookup() {
    let app = test_router(ScriptedGenerator::new(REPORT));
    let item = json!({
        "id": "meal-7",
        "title": "Oat Bar",
        "description": "Baked.",
        "ingredients": ["oats", {"item": "honey"}]
    });
    let resp = app
        .clone()
        .oneshot(post_json("/jobs", json!({ "item": item })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let outcome = read_json(resp).await;
    assert_eq!(outcome["status"], "success");
    assert_eq!(outcome["item_id"], "meal-7");
    assert_eq!(outcome["evidence"], 1);
    assert_eq!(outcome["warnings"], 1);

    let resp = app
        .clone()
        .oneshot(Request::get("/reports/meal-7").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let stored = read_json(resp).await;
    assert_eq!(stored["item_id"], "meal-7");
    assert_eq!(stored["health_score"], 62);

    let resp = app
        .oneshot(Request::get("/reports/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(read_json(resp).await["error"], "not_found");
}

#[tokio::test]
async fn api_failed_job_is_reported_as_data() {
    let app = test_router(ScriptedGenerator::new("no report here"));
    let resp = app
        .clone()
        .oneshot(post_json("/jobs", json!({ "item": {"id": "meal-9", "title": "Soup"}, "attempt": 2 })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let outcome = read_json(resp).await;
    assert_eq!(outcome["status"], "failed");
    assert_eq!(outcome["kind"], "schema_invalid");
    assert_eq!(outcome["retryable"], false);

    let resp = app
        .oneshot(Request::get("/reports/meal-9").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
