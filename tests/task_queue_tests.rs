use async_trait::async_trait;
use itemdesk::tasks::{
    ChannelJobQueue, Job, JobDescriptor, JobDispatchError, JobHandler, JobQueue, JobStatus,
    LoggingJobHandler, QueueInfo, ReportType, spawn_worker,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

/// Records every job it sees; fails cleanup jobs on purpose.
#[derive(Default)]
struct RecordingHandler {
    seen: Mutex<Vec<&'static str>>,
}

#[async_trait]
impl JobHandler for RecordingHandler {
    async fn handle(&self, job: &Job) -> Result<(), String> {
        self.seen.lock().unwrap().push(job.descriptor.name());
        match job.descriptor {
            JobDescriptor::CleanupOldData => Err("cleanup backend offline".to_string()),
            _ => Ok(()),
        }
    }
}

async fn wait_for(queue: &ChannelJobQueue, job_id: Uuid, expected: JobStatus) {
    for _ in 0..100 {
        if queue.status(job_id).await == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job_id} never reached {expected:?}");
}

#[tokio::test]
async fn test_enqueue_records_queued_status() {
    let (queue, mut receiver) = ChannelJobQueue::new();

    let job_id = queue
        .enqueue(JobDescriptor::ProcessItem {
            item_id: Uuid::new_v4(),
        })
        .await
        .unwrap();

    assert_eq!(queue.status(job_id).await, JobStatus::Queued);
    assert_eq!(queue.status(Uuid::new_v4()).await, JobStatus::NotFound);

    let job = receiver.try_next().expect("job delivered to the receiver");
    assert_eq!(job.id, job_id);
    assert!(receiver.try_next().is_none());
}

#[tokio::test]
async fn test_worker_completes_and_fails_jobs() {
    let (queue, receiver) = ChannelJobQueue::new();
    let handler = Arc::new(RecordingHandler::default());
    spawn_worker(receiver, handler.clone());

    let report = queue
        .enqueue(JobDescriptor::GenerateReport {
            user_id: Uuid::new_v4(),
            report_type: ReportType::MonthlyReport,
        })
        .await
        .unwrap();
    let cleanup = queue.enqueue(JobDescriptor::CleanupOldData).await.unwrap();

    wait_for(&queue, report, JobStatus::Complete).await;
    wait_for(&queue, cleanup, JobStatus::Failed).await;

    assert_eq!(
        *handler.seen.lock().unwrap(),
        vec!["generate_report", "cleanup_old_data"]
    );
}

#[tokio::test]
async fn test_finished_jobs_are_forgotten_past_the_history_size() {
    let (queue, receiver) = ChannelJobQueue::with_history(2);
    spawn_worker(receiver, Arc::new(RecordingHandler::default()));

    let mut ids = Vec::new();
    for _ in 0..4 {
        let job_id = queue
            .enqueue(JobDescriptor::ProcessItem {
                item_id: Uuid::new_v4(),
            })
            .await
            .unwrap();
        wait_for(&queue, job_id, JobStatus::Complete).await;
        ids.push(job_id);
    }

    assert_eq!(queue.status(ids[0]).await, JobStatus::NotFound);
    assert_eq!(queue.status(ids[1]).await, JobStatus::NotFound);
    assert_eq!(queue.status(ids[2]).await, JobStatus::Complete);
    assert_eq!(queue.status(ids[3]).await, JobStatus::Complete);
    assert_eq!(queue.info().await.tracked, 2);
}

#[tokio::test]
async fn test_unfinished_jobs_are_never_evicted() {
    let (queue, _receiver) = ChannelJobQueue::with_history(1);

    let first = queue.enqueue(JobDescriptor::CleanupOldData).await.unwrap();
    let second = queue.enqueue(JobDescriptor::CleanupOldData).await.unwrap();

    assert_eq!(queue.status(first).await, JobStatus::Queued);
    assert_eq!(queue.status(second).await, JobStatus::Queued);
    assert_eq!(
        queue.info().await,
        QueueInfo {
            queued: 2,
            tracked: 2,
            history_capacity: 1,
            worker_connected: true,
            ..QueueInfo::default()
        }
    );
}

#[tokio::test]
async fn test_recent_jobs_are_newest_first() {
    let (queue, receiver) = ChannelJobQueue::new();
    spawn_worker(receiver, Arc::new(RecordingHandler::default()));

    let welcome = queue
        .enqueue(JobDescriptor::SendWelcomeEmail {
            email: "a@example.com".to_string(),
            name: "A".to_string(),
        })
        .await
        .unwrap();
    let report = queue
        .enqueue(JobDescriptor::GenerateReport {
            user_id: Uuid::new_v4(),
            report_type: ReportType::UserActivity,
        })
        .await
        .unwrap();
    let cleanup = queue.enqueue(JobDescriptor::CleanupOldData).await.unwrap();
    wait_for(&queue, cleanup, JobStatus::Failed).await;
    wait_for(&queue, report, JobStatus::Complete).await;

    let recent = queue.recent(2).await;
    let names: Vec<_> = recent.iter().map(|record| record.job.as_str()).collect();
    assert_eq!(names, vec!["cleanup_old_data", "generate_report"]);
    assert_eq!(recent[0].job_id, cleanup);
    assert_eq!(recent[0].status, JobStatus::Failed);
    assert!(recent[0].enqueued_at >= recent[1].enqueued_at);

    assert_eq!(queue.recent(10).await.last().map(|r| r.job_id), Some(welcome));

    let info = queue.info().await;
    assert_eq!(info.tracked, 3);
    assert_eq!(info.failed, 1);
}

#[tokio::test]
async fn test_enqueue_fails_once_the_worker_is_gone() {
    let (queue, receiver) = ChannelJobQueue::new();
    drop(receiver);

    let result = queue.enqueue(JobDescriptor::CleanupOldData).await;
    assert!(matches!(result, Err(JobDispatchError::Unavailable(_))));

    let info = queue.info().await;
    assert!(!info.worker_connected);
    assert_eq!(info.tracked, 0);
}

#[tokio::test]
async fn test_logging_handler_rejects_empty_batches() {
    let handler = LoggingJobHandler;
    let job = |descriptor| Job {
        id: Uuid::new_v4(),
        descriptor,
        enqueued_at: chrono::Utc::now(),
    };

    let empty = job(JobDescriptor::SendBatchNotifications {
        user_emails: vec![],
        message: "hello".to_string(),
    });
    assert!(handler.handle(&empty).await.is_err());

    let welcome = job(JobDescriptor::SendWelcomeEmail {
        email: "a@example.com".to_string(),
        name: "A".to_string(),
    });
    assert!(handler.handle(&welcome).await.is_ok());
}

#[test]
fn test_descriptors_serialize_with_kind_tag() {
    let json = serde_json::to_value(JobDescriptor::GenerateReport {
        user_id: Uuid::nil(),
        report_type: ReportType::ItemsSummary,
    })
    .unwrap();

    assert_eq!(json["kind"], "generate_report");
    assert_eq!(json["report_type"], "items_summary");

    let parsed: Result<ReportType, _> = serde_json::from_str("\"yearly_report\"");
    assert!(parsed.is_err());
}
