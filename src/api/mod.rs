//! HTTP layer: background pipeline jobs and search history.

pub mod routes;
pub mod types;

use std::{
    collections::HashMap,
    future::Future,
    net::SocketAddr,
    sync::{Arc, Mutex, RwLock},
};

use anyhow::Result;
use axum::{
    http::Method,
    routing::{delete, get, post},
    Router,
};
use chrono::Utc;
use tokio::{net::TcpListener, task::AbortHandle};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::{config::Settings, history::HistoryStore};

use types::{JobState, JobStatus};

/// Progress is held below this until the job has fully finished.
pub const MAX_RUNNING_PROGRESS: u8 = 95;

#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub jobs: JobStore,
    pub history: HistoryStore,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        let history = HistoryStore::from_settings(&settings);
        Self {
            settings,
            jobs: JobStore::default(),
            history,
        }
    }
}

/// In-memory job table. Jobs live until deleted or the server stops.
#[derive(Clone, Default)]
pub struct JobStore {
    jobs: Arc<RwLock<HashMap<String, JobStatus>>>,
    handles: Arc<Mutex<HashMap<String, AbortHandle>>>,
}

impl JobStore {
    pub fn insert(&self, job: JobStatus) {
        if let Ok(mut jobs) = self.jobs.write() {
            jobs.insert(job.job_id.clone(), job);
        }
    }

    pub fn get(&self, job_id: &str) -> Option<JobStatus> {
        self.jobs.read().ok()?.get(job_id).cloned()
    }

    /// Newest first.
    pub fn list(&self) -> Vec<JobStatus> {
        let mut jobs: Vec<JobStatus> = self
            .jobs
            .read()
            .map(|jobs| jobs.values().cloned().collect())
            .unwrap_or_default();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    /// Apply `f` to a job if it still exists.
    pub fn update<F>(&self, job_id: &str, f: F)
    where
        F: FnOnce(&mut JobStatus),
    {
        if let Ok(mut jobs) = self.jobs.write() {
            if let Some(job) = jobs.get_mut(job_id) {
                f(job);
                job.updated_at = Utc::now();
            }
        }
    }

    /// Record pipeline progress for a running job, capped until completion.
    pub fn report_progress(&self, job_id: &str, percent: u8, message: &str) {
        self.update(job_id, |job| {
            if job.status == JobState::Running {
                job.progress = percent.min(MAX_RUNNING_PROGRESS);
                job.message = message.to_string();
            }
        });
    }

    /// Spawn the task driving `job_id`. The handle is stored under the lock
    /// before the task can reach [`JobStore::untrack`].
    pub fn spawn<F>(&self, job_id: &str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match self.handles.lock() {
            Ok(mut handles) => {
                let handle = tokio::spawn(task);
                handles.insert(job_id.to_string(), handle.abort_handle());
            }
            Err(_) => {
                warn!(%job_id, "job handles poisoned; job cannot be cancelled");
                tokio::spawn(task);
            }
        }
    }

    /// Number of jobs whose task has not finished yet.
    pub fn running(&self) -> usize {
        self.handles.lock().map(|h| h.len()).unwrap_or(0)
    }

    pub fn untrack(&self, job_id: &str) {
        if let Ok(mut handles) = self.handles.lock() {
            handles.remove(job_id);
        }
    }

    /// Forget a job, aborting it when still running.
    pub fn remove(&self, job_id: &str) -> Option<JobStatus> {
        if let Some(handle) = self.handles.lock().ok().and_then(|mut h| h.remove(job_id)) {
            handle.abort();
        }
        self.jobs.write().ok()?.remove(job_id)
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/pipeline/start", post(routes::start_pipeline))
        .route(
            "/api/v1/pipeline/:job_id",
            get(routes::get_job).delete(routes::delete_job),
        )
        .route("/api/v1/pipeline/:job_id/download", get(routes::download_job))
        .route("/api/v1/jobs", get(routes::list_jobs))
        .route("/api/v1/history", get(routes::list_history))
        .route("/api/v1/history/clear", delete(routes::clear_history))
        .route("/api/v1/history/:id", delete(routes::delete_history))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

pub async fn serve(settings: Settings, host: String, port: u16) -> Result<()> {
    let state = AppState::new(settings);
    match state.history.cleanup(state.settings.history_retention_days) {
        Ok(removed) => info!(removed, "history cleanup on startup"),
        Err(err) => warn!(%err, "history cleanup on startup failed"),
    }

    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    info!(%addr, "serving patent-harvest API");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router(state.clone()).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!(running_jobs = state.jobs.running(), "server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(%err, "could not listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
