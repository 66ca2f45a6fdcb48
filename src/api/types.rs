//! Shared DTOs for JSON requests and responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{jobs::PipelineRequest, pipeline::RunSummary};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    pub job_id: String,
    pub status: JobState,
    /// 0..=95 while running, 100 once completed.
    pub progress: u8,
    pub message: String,
    pub request: PipelineRequest,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub display_name: Option<String>,
    pub output_path: Option<String>,
    pub export_url: Option<String>,
    pub summary: Option<RunSummary>,
    pub error: Option<String>,
}

impl JobStatus {
    pub fn queued(job_id: String, request: PipelineRequest) -> Self {
        let now = Utc::now();
        Self {
            job_id,
            status: JobState::Queued,
            progress: 0,
            message: "Queued".to_string(),
            request,
            created_at: now,
            updated_at: now,
            display_name: None,
            output_path: None,
            export_url: None,
            summary: None,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StartResponse {
    pub job_id: String,
    pub status: JobState,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeletedResponse {
    pub deleted: usize,
}
