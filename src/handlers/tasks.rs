use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
};
use uuid::Uuid;

use crate::{
    AppState,
    auth::{ActiveUser, SuperUser},
    error::{AppError, ErrorBody},
    models::{
        BatchNotificationRequest, JobAccepted, JobStatusResponse, RecentJobsQuery, ReportRequest,
    },
    tasks::{JobDescriptor, JobRecord, JobStatus, QueueInfo},
};

/// Upper bound on recipients of a single batch notification job.
pub const MAX_BATCH_RECIPIENTS: usize = 100;

pub const DEFAULT_RECENT_JOBS: u32 = 10;
pub const MAX_RECENT_JOBS: u32 = 50;

// Explicitly requested jobs surface dispatch failures as 500s, unlike the side-effect
// jobs fired from the services.
async fn accept(
    state: &AppState,
    descriptor: JobDescriptor,
    message: String,
) -> Result<Json<JobAccepted>, AppError> {
    let job_id = state.jobs.enqueue(descriptor).await?;
    Ok(Json(JobAccepted {
        message,
        job_id,
        status: JobStatus::Queued,
    }))
}

/// generate_report
///
/// [Authenticated Route] Queues a report for the caller. An unknown `report_type` is
/// rejected at deserialization with 422.
#[utoipa::path(
    post,
    path = "/api/v1/tasks/reports/generate",
    request_body = ReportRequest,
    responses(
        (status = 200, description = "Report job queued", body = JobAccepted),
        (status = 422, description = "Invalid report type", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "tasks"
)]
pub async fn generate_report(
    ActiveUser(user): ActiveUser,
    State(state): State<AppState>,
    payload: Result<Json<ReportRequest>, JsonRejection>,
) -> Result<Json<JobAccepted>, AppError> {
    let Json(payload) = payload?;
    let report_type = payload.report_type;

    accept(
        &state,
        JobDescriptor::GenerateReport {
            user_id: user.id,
            report_type,
        },
        format!("Report generation started for {}", report_type.as_str()),
    )
    .await
}

/// send_batch_notifications
///
/// [Admin Route] Queues one notification job for at most `MAX_BATCH_RECIPIENTS` emails.
#[utoipa::path(
    post,
    path = "/api/v1/tasks/notifications/batch",
    request_body = BatchNotificationRequest,
    responses(
        (status = 200, description = "Notification job queued", body = JobAccepted),
        (status = 422, description = "Too many recipients", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "tasks"
)]
pub async fn send_batch_notifications(
    SuperUser(_admin): SuperUser,
    State(state): State<AppState>,
    payload: Result<Json<BatchNotificationRequest>, JsonRejection>,
) -> Result<Json<JobAccepted>, AppError> {
    let Json(payload) = payload?;

    if payload.user_emails.len() > MAX_BATCH_RECIPIENTS {
        return Err(AppError::Validation(format!(
            "Cannot send to more than {MAX_BATCH_RECIPIENTS} users at once"
        )));
    }

    let count = payload.user_emails.len();
    accept(
        &state,
        JobDescriptor::SendBatchNotifications {
            user_emails: payload.user_emails,
            message: payload.message,
        },
        format!("Batch notification started for {count} users"),
    )
    .await
}

#[utoipa::path(
    post,
    path = "/api/v1/tasks/maintenance/cleanup",
    responses(
        (status = 200, description = "Cleanup job queued", body = JobAccepted),
        (status = 403, description = "Not a superuser", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "tasks"
)]
pub async fn trigger_cleanup(
    SuperUser(_admin): SuperUser,
    State(state): State<AppState>,
) -> Result<Json<JobAccepted>, AppError> {
    accept(
        &state,
        JobDescriptor::CleanupOldData,
        "Data cleanup task started".to_string(),
    )
    .await
}

/// job_status
///
/// [Authenticated Route] Reports the worker-side status of a previously queued job.
#[utoipa::path(
    get,
    path = "/api/v1/tasks/jobs/{job_id}/status",
    params(("job_id" = Uuid, Path, description = "Job ID")),
    responses(
        (status = 200, description = "Job status", body = JobStatusResponse),
        (status = 404, description = "Job not found", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "tasks"
)]
pub async fn job_status(
    ActiveUser(_user): ActiveUser,
    State(state): State<AppState>,
    job_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<JobStatusResponse>, AppError> {
    let Path(job_id) = job_id?;
    match state.jobs.status(job_id).await {
        JobStatus::NotFound => Err(AppError::NotFound("Job not found".to_string())),
        status => Ok(Json(JobStatusResponse { job_id, status })),
    }
}

/// recent_jobs
///
/// [Authenticated Route] The latest jobs known to the queue, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/tasks/jobs/recent",
    params(RecentJobsQuery),
    responses(
        (status = 200, description = "Recent jobs", body = [JobRecord]),
        (status = 401, description = "Not authenticated", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "tasks"
)]
pub async fn recent_jobs(
    ActiveUser(_user): ActiveUser,
    State(state): State<AppState>,
    query: Result<Query<RecentJobsQuery>, QueryRejection>,
) -> Result<Json<Vec<JobRecord>>, AppError> {
    let Query(query) = query?;
    let limit = query.limit.unwrap_or(DEFAULT_RECENT_JOBS).min(MAX_RECENT_JOBS);

    Ok(Json(state.jobs.recent(limit as usize).await))
}

#[utoipa::path(
    get,
    path = "/api/v1/tasks/queue/info",
    responses(
        (status = 200, description = "Queue snapshot", body = QueueInfo),
        (status = 401, description = "Not authenticated", body = ErrorBody)
    ),
    security(("bearer" = [])),
    tag = "tasks"
)]
pub async fn queue_info(
    ActiveUser(_user): ActiveUser,
    State(state): State<AppState>,
) -> Json<QueueInfo> {
    Json(state.jobs.info().await)
}
