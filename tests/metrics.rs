// tests/metrics.rs
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serial_test::serial;
use tower::ServiceExt;

// Full in-process app; mock search + scripted generation, no API keys needed.
async fn build_app() -> Router {
    std::env::set_var("AI_TEST_MODE", "mock");
    evidence_auditor::app()
        .await
        .expect("app() should build Router in tests")
}

async fn scrape(app: Router) -> String {
    let resp = app
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    // axum::body::to_bytes requires an explicit limit
    let body = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap(); // 1 MiB
    String::from_utf8(body.to_vec()).unwrap()
}

#[tokio::test]
#[serial]
async fn metrics_endpoint_exposes_session_gauge() {
    let app = build_app().await;
    let text = scrape(app).await;
    assert!(
        text.contains("pipeline_sessions_open"),
        "metrics exposition missing session gauge\n{text}"
    );
}

#[tokio::test]
#[serial]
async fn analyze_increments_run_counter_and_releases_session() {
    let app = build_app().await;

    let resp = app
        .clone()
        .oneshot(
            Request::post("/analyze")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"text":"Title: Lentil Soup\nIngredients:\n- lentils"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let text = scrape(app).await;
    assert!(text.contains("pipeline_runs_total"), "no runs_total\n{text}");
    assert!(
        text.contains("# TYPE pipeline_runs_total counter"),
        "counter not recorded through the installed exporter\n{text}"
    );
    assert!(
        text.contains("# HELP pipeline_runs_total"),
        "metric description not recorded through the installed exporter\n{text}"
    );
    assert!(
        text.lines()
            .any(|l| l.starts_with("pipeline_sessions_open") && l.trim_end().ends_with(" 0")),
        "session gauge should be back at 0\n{text}"
    );
}
