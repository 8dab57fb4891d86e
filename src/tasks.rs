use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{RwLock, mpsc};
use tokio::task::JoinHandle;
use utoipa::ToSchema;
use uuid::Uuid;

/// ReportType
///
/// The report kinds a user may request. Anything else is rejected at deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    UserActivity,
    ItemsSummary,
    MonthlyReport,
}

impl ReportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::UserActivity => "user_activity",
            ReportType::ItemsSummary => "items_summary",
            ReportType::MonthlyReport => "monthly_report",
        }
    }
}

/// JobDescriptor
///
/// A self-contained description of background work. The API only ever produces these
/// values; the worker consumes them on the other side of the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobDescriptor {
    SendWelcomeEmail {
        email: String,
        name: String,
    },
    ProcessItem {
        item_id: Uuid,
    },
    GenerateReport {
        user_id: Uuid,
        report_type: ReportType,
    },
    SendBatchNotifications {
        user_emails: Vec<String>,
        message: String,
    },
    CleanupOldData,
}

impl JobDescriptor {
    pub fn name(&self) -> &'static str {
        match self {
            JobDescriptor::SendWelcomeEmail { .. } => "send_welcome_email",
            JobDescriptor::ProcessItem { .. } => "process_item",
            JobDescriptor::GenerateReport { .. } => "generate_report",
            JobDescriptor::SendBatchNotifications { .. } => "send_batch_notifications",
            JobDescriptor::CleanupOldData => "cleanup_old_data",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Complete,
    Failed,
    NotFound,
}

impl JobStatus {
    pub fn is_finished(self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Failed)
    }
}

/// Number of jobs whose status is remembered by default.
pub const DEFAULT_JOB_HISTORY: usize = 1000;

/// JobRecord
///
/// What the queue remembers about a job once it has been handed to the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct JobRecord {
    pub job_id: Uuid,
    pub job: String,
    pub status: JobStatus,
    pub enqueued_at: DateTime<Utc>,
}

/// QueueInfo
///
/// A snapshot of the tracked jobs by status.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct QueueInfo {
    pub queued: usize,
    pub running: usize,
    pub complete: usize,
    pub failed: usize,
    pub tracked: usize,
    pub history_capacity: usize,
    pub worker_connected: bool,
}

/// A descriptor stamped with its id at enqueue time.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub descriptor: JobDescriptor,
    pub enqueued_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum JobDispatchError {
    #[error("job queue is unavailable: {0}")]
    Unavailable(String),
}

/// JobQueue
///
/// The producing side of the message-passing boundary. `enqueue` returns as soon as the
/// descriptor is accepted; nothing the worker does can fail the calling request.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, descriptor: JobDescriptor) -> Result<Uuid, JobDispatchError>;

    async fn status(&self, job_id: Uuid) -> JobStatus;

    /// The most recently enqueued jobs, newest first.
    async fn recent(&self, limit: usize) -> Vec<JobRecord>;

    async fn info(&self) -> QueueInfo;
}

pub type JobQueueState = Arc<dyn JobQueue>;

/// JobLog
///
/// Bounded record of enqueued jobs in enqueue order. Once more than `capacity` jobs are
/// tracked, the oldest finished ones are forgotten; queued and running jobs are kept
/// until they finish.
struct JobLog {
    records: HashMap<Uuid, JobRecord>,
    order: VecDeque<Uuid>,
    capacity: usize,
}

impl JobLog {
    fn new(capacity: usize) -> Self {
        Self {
            records: HashMap::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    fn insert(&mut self, record: JobRecord) {
        self.order.push_back(record.job_id);
        self.records.insert(record.job_id, record);
        self.evict();
    }

    fn remove(&mut self, job_id: Uuid) {
        self.records.remove(&job_id);
        self.order.retain(|id| *id != job_id);
    }

    fn set_status(&mut self, job_id: Uuid, status: JobStatus) {
        if let Some(record) = self.records.get_mut(&job_id) {
            record.status = status;
        }
        if status.is_finished() {
            self.evict();
        }
    }

    fn evict(&mut self) {
        while self.records.len() > self.capacity {
            let oldest_finished = self.order.iter().position(|id| {
                self.records
                    .get(id)
                    .is_none_or(|record| record.status.is_finished())
            });
            let Some(position) = oldest_finished else {
                break;
            };
            if let Some(job_id) = self.order.remove(position) {
                self.records.remove(&job_id);
            }
        }
    }

    fn status(&self, job_id: Uuid) -> JobStatus {
        self.records
            .get(&job_id)
            .map(|record| record.status)
            .unwrap_or(JobStatus::NotFound)
    }

    fn recent(&self, limit: usize) -> Vec<JobRecord> {
        self.order
            .iter()
            .rev()
            .filter_map(|id| self.records.get(id))
            .take(limit)
            .cloned()
            .collect()
    }

    fn info(&self) -> QueueInfo {
        let mut info = QueueInfo {
            tracked: self.records.len(),
            history_capacity: self.capacity,
            ..QueueInfo::default()
        };
        for record in self.records.values() {
            match record.status {
                JobStatus::Queued => info.queued += 1,
                JobStatus::Running => info.running += 1,
                JobStatus::Complete => info.complete += 1,
                JobStatus::Failed => info.failed += 1,
                JobStatus::NotFound => {}
            }
        }
        info
    }
}

type SharedLog = Arc<RwLock<JobLog>>;

/// ChannelJobQueue
///
/// In-process queue backed by an unbounded tokio channel. The job log is shared with
/// the consuming [`JobReceiver`] so the API can answer status queries.
#[derive(Clone)]
pub struct ChannelJobQueue {
    sender: mpsc::UnboundedSender<Job>,
    log: SharedLog,
}

impl ChannelJobQueue {
    /// Creates the queue together with the receiver the worker will own.
    pub fn new() -> (Self, JobReceiver) {
        Self::with_history(DEFAULT_JOB_HISTORY)
    }

    /// Like [`ChannelJobQueue::new`], remembering at most `capacity` finished jobs.
    pub fn with_history(capacity: usize) -> (Self, JobReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let log: SharedLog = Arc::new(RwLock::new(JobLog::new(capacity)));

        let queue = Self {
            sender,
            log: log.clone(),
        };
        (queue, JobReceiver { receiver, log })
    }
}

#[async_trait]
impl JobQueue for ChannelJobQueue {
    async fn enqueue(&self, descriptor: JobDescriptor) -> Result<Uuid, JobDispatchError> {
        let job = Job {
            id: Uuid::new_v4(),
            descriptor,
            enqueued_at: Utc::now(),
        };
        let job_id = job.id;
        let name = job.descriptor.name();

        // Record before sending so a fast worker can never observe an unknown id.
        self.log.write().await.insert(JobRecord {
            job_id,
            job: name.to_string(),
            status: JobStatus::Queued,
            enqueued_at: job.enqueued_at,
        });

        if let Err(e) = self.sender.send(job) {
            self.log.write().await.remove(job_id);
            return Err(JobDispatchError::Unavailable(format!(
                "worker has shut down, dropped {}",
                e.0.descriptor.name()
            )));
        }

        tracing::info!(job_id = %job_id, job = name, "job enqueued");
        Ok(job_id)
    }

    async fn status(&self, job_id: Uuid) -> JobStatus {
        self.log.read().await.status(job_id)
    }

    async fn recent(&self, limit: usize) -> Vec<JobRecord> {
        self.log.read().await.recent(limit)
    }

    async fn info(&self) -> QueueInfo {
        QueueInfo {
            worker_connected: !self.sender.is_closed(),
            ..self.log.read().await.info()
        }
    }
}

/// JobHandler
///
/// Executes a single job on the worker side. Failures are recorded in the job status
/// and logged; they never travel back to the producer.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &Job) -> Result<(), String>;
}

/// Default handler: the delivery integrations (SMTP, report storage) live outside this
/// service, so each job is acknowledged with a structured log line.
pub struct LoggingJobHandler;

#[async_trait]
impl JobHandler for LoggingJobHandler {
    async fn handle(&self, job: &Job) -> Result<(), String> {
        match &job.descriptor {
            JobDescriptor::SendWelcomeEmail { email, name } => {
                tracing::info!(job_id = %job.id, %email, %name, "sending welcome email");
            }
            JobDescriptor::ProcessItem { item_id } => {
                tracing::info!(job_id = %job.id, %item_id, "processing item");
            }
            JobDescriptor::GenerateReport {
                user_id,
                report_type,
            } => {
                tracing::info!(job_id = %job.id, %user_id, ?report_type, "generating report");
            }
            JobDescriptor::SendBatchNotifications {
                user_emails,
                message,
            } => {
                if user_emails.is_empty() {
                    return Err("no recipients".to_string());
                }
                tracing::info!(
                    job_id = %job.id,
                    recipients = user_emails.len(),
                    %message,
                    "sending batch notifications"
                );
            }
            JobDescriptor::CleanupOldData => {
                tracing::info!(job_id = %job.id, "cleaning up old data");
            }
        }
        Ok(())
    }
}

/// JobReceiver
///
/// The consuming side of the queue, owned by exactly one worker.
pub struct JobReceiver {
    receiver: mpsc::UnboundedReceiver<Job>,
    log: SharedLog,
}

impl JobReceiver {
    /// Takes the next already-queued job without waiting, if any.
    pub fn try_next(&mut self) -> Option<Job> {
        self.receiver.try_recv().ok()
    }

    /// Processes jobs until every queue handle has been dropped.
    pub async fn run(mut self, handler: Arc<dyn JobHandler>) {
        while let Some(job) = self.receiver.recv().await {
            self.set_status(job.id, JobStatus::Running).await;

            let status = match handler.handle(&job).await {
                Ok(()) => JobStatus::Complete,
                Err(reason) => {
                    tracing::warn!(job_id = %job.id, job = job.descriptor.name(), %reason, "job failed");
                    JobStatus::Failed
                }
            };
            self.set_status(job.id, status).await;
        }
        tracing::info!("job queue closed, worker exiting");
    }

    async fn set_status(&self, job_id: Uuid, status: JobStatus) {
        self.log.write().await.set_status(job_id, status);
    }
}

/// Spawns the worker loop on the tokio runtime.
pub fn spawn_worker(receiver: JobReceiver, handler: Arc<dyn JobHandler>) -> JoinHandle<()> {
    tokio::spawn(receiver.run(handler))
}
