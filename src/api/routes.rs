//! HTTP route handlers for Axum.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    history::{HistoryEntry, HistoryError, HistoryStore},
    jobs::{self, PipelineRequest},
};

use super::{
    types::{DeletedResponse, HistoryQuery, JobState, JobStatus, StartResponse},
    AppState,
};

type ApiResult<T> = Result<Json<T>, (StatusCode, String)>;

const DEFAULT_HISTORY_LIMIT: usize = 50;

pub async fn start_pipeline(
    State(state): State<AppState>,
    Json(request): Json<PipelineRequest>,
) -> Result<(StatusCode, Json<StartResponse>), (StatusCode, String)> {
    request
        .run_config()
        .map_err(|err| (StatusCode::BAD_REQUEST, err.to_string()))?;

    let job_id = Uuid::new_v4().to_string();
    state
        .jobs
        .insert(JobStatus::queued(job_id.clone(), request.clone()));
    info!(%job_id, source = %request.source, key = %request.search_key(), "queued pipeline job");

    let task_state = state.clone();
    let task_id = job_id.clone();
    state.jobs.spawn(&job_id, async move {
        run_job(task_state, task_id, request).await;
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(StartResponse {
            job_id,
            status: JobState::Queued,
        }),
    ))
}

async fn run_job(state: AppState, job_id: String, request: PipelineRequest) {
    state.jobs.update(&job_id, |job| {
        job.status = JobState::Running;
        job.message = "Starting".to_string();
    });

    let jobs = state.jobs.clone();
    let progress_id = job_id.clone();
    let progress = move |percent: u8, message: &str| {
        jobs.report_progress(&progress_id, percent, message);
    };

    match jobs::execute(&state.settings, &request, &progress).await {
        Ok(outcome) => {
            info!(%job_id, total = outcome.result.summary.total, "pipeline job completed");
            state.jobs.update(&job_id, |job| {
                job.status = JobState::Completed;
                job.progress = 100;
                job.message = "Completed".to_string();
                job.display_name = outcome.result.display_name.clone();
                job.output_path = Some(outcome.output_path.display().to_string());
                job.export_url = outcome.export.as_ref().map(|e| e.url.clone());
                job.summary = Some(outcome.result.summary.clone());
            });
        }
        Err(err) => {
            error!(%job_id, error = %format!("{err:#}"), "pipeline job failed");
            state.jobs.update(&job_id, |job| {
                job.status = JobState::Failed;
                job.message = "Failed".to_string();
                job.error = Some(format!("{err:#}"));
            });
        }
    }
    state.jobs.untrack(&job_id);
}

pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<JobStatus> {
    state
        .jobs
        .get(&job_id)
        .map(Json)
        .ok_or_else(|| job_not_found(&job_id))
}

pub async fn list_jobs(State(state): State<AppState>) -> ApiResult<Vec<JobStatus>> {
    Ok(Json(state.jobs.list()))
}

pub async fn delete_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<JobStatus> {
    let removed = state
        .jobs
        .remove(&job_id)
        .ok_or_else(|| job_not_found(&job_id))?;
    if !removed.status.is_finished() {
        warn!(%job_id, "cancelled running pipeline job");
    }
    Ok(Json(removed))
}

/// Serve the consolidated JSON of a completed job as an attachment.
pub async fn download_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let job = state
        .jobs
        .get(&job_id)
        .ok_or_else(|| job_not_found(&job_id))?;
    if job.status != JobState::Completed {
        return Err((
            StatusCode::CONFLICT,
            format!("job {job_id} has not completed"),
        ));
    }
    let path = job
        .output_path
        .ok_or_else(|| (StatusCode::NOT_FOUND, "job has no output".to_string()))?;
    let body = tokio::fs::read(&path)
        .await
        .map_err(|err| (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()))?;
    let file_name = std::path::Path::new(&path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "patents.json".to_string());
    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        body,
    ))
}

pub async fn list_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Vec<HistoryEntry>> {
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    with_history(&state, move |store| store.list(limit))
        .await
        .map(Json)
}

pub async fn clear_history(State(state): State<AppState>) -> ApiResult<DeletedResponse> {
    let deleted = with_history(&state, |store| store.clear()).await?;
    info!(deleted, "cleared search history");
    Ok(Json(DeletedResponse { deleted }))
}

pub async fn delete_history(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> ApiResult<DeletedResponse> {
    if with_history(&state, move |store| store.delete(id)).await? {
        Ok(Json(DeletedResponse { deleted: 1 }))
    } else {
        Err((
            StatusCode::NOT_FOUND,
            format!("history entry {id} not found"),
        ))
    }
}

/// History is file-backed; run its operations on the blocking pool.
async fn with_history<T, F>(state: &AppState, op: F) -> Result<T, (StatusCode, String)>
where
    F: FnOnce(&HistoryStore) -> Result<T, HistoryError> + Send + 'static,
    T: Send + 'static,
{
    let store = state.history.clone();
    tokio::task::spawn_blocking(move || op(&store))
        .await
        .map_err(internal)?
        .map_err(internal)
}

fn job_not_found(job_id: &str) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, format!("job {job_id} not found"))
}

fn internal<E: std::fmt::Display>(err: E) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
}
