use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use patent_harvest::{
    api::{router, AppState, JobStore},
    config::Settings,
    history::NewHistoryEntry,
    patents::SourceKind,
};
use tower::ServiceExt;

fn test_app(root: &std::path::Path) -> (Router, AppState) {
    let settings = Settings::with_root(root).unwrap();
    let state = AppState::new(settings);
    (router(state.clone()), state)
}

async fn call(app: Router, method: &str, uri: &str, body: Body) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body)
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

fn seed_history(state: &AppState, key: &str) -> u64 {
    state
        .history
        .append(NewHistoryEntry {
            search_key: key.to_string(),
            source_kind: SourceKind::Drugbank,
            display_name: Some(format!("{key} name")),
            export_url: None,
            export_id: None,
            output_location: None,
        })
        .unwrap()
        .id
}

#[tokio::test]
async fn history_can_be_listed_and_deleted() {
    let dir = tempfile::tempdir().unwrap();
    let (app, state) = test_app(dir.path());
    let first = seed_history(&state, "DB00619");
    seed_history(&state, "DB00945");

    let (status, listed) = call(app.clone(), "GET", "/api/v1/history?limit=10", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 2);
    assert_eq!(listed[0]["source_kind"], "drugbank");

    let uri = format!("/api/v1/history/{first}");
    let (status, _) = call(app.clone(), "DELETE", &uri, Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = call(app.clone(), "DELETE", &uri, Body::empty()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, cleared) = call(app, "DELETE", "/api/v1/history/clear", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cleared["deleted"], 1);
}

#[tokio::test]
async fn unknown_job_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _) = test_app(dir.path());

    let (status, _) = call(app.clone(), "GET", "/api/v1/pipeline/nope", Body::empty()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = call(app.clone(), "GET", "/api/v1/pipeline/nope/download", Body::empty()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, jobs) = call(app, "GET", "/api/v1/jobs", Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    assert!(jobs.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn start_without_search_key_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (app, state) = test_app(dir.path());

    let body = Body::from(r#"{ "source": "drugbank", "keyword": "aspirin" }"#);
    let (status, _) = call(app, "POST", "/api/v1/pipeline/start", body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(state.jobs.list().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn jobs_finishing_immediately_leave_no_handles() {
    let store = JobStore::default();
    let finished = Arc::new(AtomicUsize::new(0));
    let total = 200;

    for n in 0..total {
        let job_id = format!("job-{n}");
        let task_store = store.clone();
        let task_finished = finished.clone();
        let task_id = job_id.clone();
        store.spawn(&job_id, async move {
            task_store.untrack(&task_id);
            task_finished.fetch_add(1, Ordering::SeqCst);
        });
    }

    for _ in 0..500 {
        if finished.load(Ordering::SeqCst) == total {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(finished.load(Ordering::SeqCst), total);
    assert_eq!(store.running(), 0);
}
