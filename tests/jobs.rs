// tests/jobs.rs
//
// Job wrapper: reports are persisted on success, failure records carry the
// kind/attempt/snippet, and batch runs skip items that already have a report.

use std::sync::Arc;

use evidence_auditor::config::EngineConfig;
use evidence_auditor::fetch::StaticFetcher;
use evidence_auditor::generate::{ScriptedGenerator, MOCK_REPORT};
use evidence_auditor::jobs::{pending_items, process_job, process_pending, FoodItem, Ingredient, JobOutcome};
use evidence_auditor::pipeline::{Pipeline, SharedFetcher};
use evidence_auditor::search::providers::mock::MockSearchProvider;
use evidence_auditor::store::{MemoryStore, ReportStore};

fn pipeline(generator: ScriptedGenerator) -> Pipeline {
    Pipeline::new(
        EngineConfig::with_builtin_allow_list(),
        Arc::new(MockSearchProvider::new()),
        Arc::new(generator),
        Arc::new(SharedFetcher(Arc::new(StaticFetcher::new()))),
    )
}

fn item(id: &str, title: &str) -> FoodItem {
    FoodItem {
        id: id.into(),
        title: title.into(),
        description: "A".repeat(300),
        ingredients: vec![Ingredient::Plain("salt".into())],
    }
}

#[tokio::test]
async fn success_saves_the_report() {
    let p = pipeline(ScriptedGenerator::new(MOCK_REPORT));
    let store = MemoryStore::new();
    let out = process_job(&p, &store, &item("m1", "Soup"), 1).await;

    assert_eq!(
        out,
        JobOutcome::Success {
            item_id: "m1".into(),
            health_score: 50,
            evidence: 0,
            warnings: 0,
        }
    );
    let stored = store.load_report("m1").await.unwrap().expect("report saved");
    assert_eq!(stored.report.health_score, 50);
    assert_eq!(stored.report.user_details.len(), 6);
    assert!(store.failures().await.unwrap().is_empty());
}

#[tokio::test]
async fn empty_generation_is_recorded_as_retryable_failure() {
    let p = pipeline(ScriptedGenerator::empty());
    let store = MemoryStore::new();
    let out = process_job(&p, &store, &item("m2", "Stew"), 3).await;

    match out {
        JobOutcome::Failed { kind, retryable, .. } => {
            assert_eq!(kind, "generation_empty");
            assert!(retryable);
        }
        other => panic!("expected failure, got {other:?}"),
    }
    assert!(!store.has_report("m2").await.unwrap());

    let failures = store.failures().await.unwrap();
    assert_eq!(failures.len(), 1);
    let f = &failures[0];
    assert_eq!(f.item_id, "m2");
    assert_eq!(f.title, "Stew");
    assert_eq!(f.kind, "generation_empty");
    assert_eq!(f.attempt, 3);
    assert_eq!(f.text_snippet.chars().count(), 200);
    assert!(f.text_snippet.starts_with("Title: Stew\nDescription: AAA"));
    assert_eq!(f.error, "generation returned empty content");
}

#[tokio::test]
async fn schema_failure_is_not_retryable() {
    let p = pipeline(ScriptedGenerator::new("Sorry, I cannot help."));
    let store = MemoryStore::new();
    let out = process_job(&p, &store, &item("m3", "Pie"), 1).await;
    assert!(matches!(
        out,
        JobOutcome::Failed { ref kind, retryable: false, .. } if kind == "schema_invalid"
    ));
    assert_eq!(store.failures().await.unwrap()[0].kind, "schema_invalid");
}

#[tokio::test]
async fn batch_skips_items_with_reports() {
    let p = pipeline(ScriptedGenerator::new(MOCK_REPORT));
    let store = MemoryStore::new();
    let items = vec![item("a", "A"), item("b", "B"), item("c", "C")];

    process_job(&p, &store, &items[1], 1).await;
    let pending = pending_items(&store, &items).await.unwrap();
    let ids: Vec<&str> = pending.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "c"]);

    let outcomes = process_pending(&p, &store, &items).await.unwrap();
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(JobOutcome::is_success));
    assert!(pending_items(&store, &items).await.unwrap().is_empty());
}
