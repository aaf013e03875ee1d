//! Bounded background job queue for durable writes.
//!
//! The heartbeat handler never awaits the database. It submits [`Job`]s to
//! a bounded channel drained by a fixed set of worker tasks. When the queue
//! is full the new job is rejected and logged; a failed job is logged and
//! dropped. Nothing is retried.

mod incident;

use std::sync::Arc;
use std::time::Duration;

use edgewind_core::knowledge::FaultKnowledge;
use edgewind_core::snapshot::SnapshotCapture;
use edgewind_db::models::datapoint::CreateDataPoint;
use edgewind_db::models::device::DeviceHeartbeat;
use edgewind_db::models::fault_snapshot::CreateFaultSnapshot;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::store::IngestStore;

pub use incident::{open_incident, IncidentLocks, IncidentRequest};

/// A unit of background work.
#[derive(Debug, Clone)]
pub enum Job {
    SaveSnapshot(SnapshotCapture),
    OpenIncident(IncidentRequest),
    TouchDevice(DeviceHeartbeat),
    StoreDatapoint(CreateDataPoint),
}

impl Job {
    pub fn kind(&self) -> &'static str {
        match self {
            Job::SaveSnapshot(_) => "save_snapshot",
            Job::OpenIncident(_) => "open_incident",
            Job::TouchDevice(_) => "touch_device",
            Job::StoreDatapoint(_) => "store_datapoint",
        }
    }

    pub fn device_id(&self) -> &str {
        match self {
            Job::SaveSnapshot(capture) => &capture.sample.device_id,
            Job::OpenIncident(req) => &req.device_id,
            Job::TouchDevice(beat) => &beat.device_id,
            Job::StoreDatapoint(point) => &point.device_id,
        }
    }
}

#[derive(Debug, Clone)]
pub struct JobSettings {
    pub workers: usize,
    pub capacity: usize,
    /// Window in which a repeated onset does not open a second incident.
    pub incident_dedup_window: Duration,
}

/// Everything a worker needs to execute jobs.
#[derive(Clone)]
pub struct JobContext {
    pub store: Arc<dyn IngestStore>,
    pub knowledge: Arc<dyn FaultKnowledge>,
    pub incident_dedup_window: Duration,
    pub incident_locks: Arc<IncidentLocks>,
}

/// Submission side of the queue. Cheap to clone.
#[derive(Clone)]
pub struct JobQueue {
    sender: mpsc::Sender<Job>,
}

impl JobQueue {
    /// Create the queue and spawn its workers.
    ///
    /// Workers exit once `cancel` fires and the jobs already queued have
    /// been executed.
    pub fn start(
        settings: &JobSettings,
        store: Arc<dyn IngestStore>,
        knowledge: Arc<dyn FaultKnowledge>,
        cancel: CancellationToken,
    ) -> (Self, Vec<JoinHandle<()>>) {
        let (sender, receiver) = mpsc::channel(settings.capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));
        let ctx = JobContext {
            store,
            knowledge,
            incident_dedup_window: settings.incident_dedup_window,
            incident_locks: Arc::default(),
        };

        let handles = (0..settings.workers.max(1))
            .map(|worker| {
                tokio::spawn(run_worker(
                    worker,
                    Arc::clone(&receiver),
                    ctx.clone(),
                    cancel.clone(),
                ))
            })
            .collect();

        tracing::info!(
            workers = settings.workers.max(1),
            capacity = settings.capacity.max(1),
            "Job queue started"
        );
        (Self { sender }, handles)
    }

    /// Enqueue a job without waiting. Returns `false` if it was rejected.
    pub fn submit(&self, job: Job) -> bool {
        match self.sender.try_send(job) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(job)) => {
                tracing::warn!(
                    kind = job.kind(),
                    device_id = %job.device_id(),
                    "Job queue full, dropping job"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(job)) => {
                tracing::warn!(
                    kind = job.kind(),
                    device_id = %job.device_id(),
                    "Job queue closed, dropping job"
                );
                false
            }
        }
    }
}

async fn run_worker(
    worker: usize,
    receiver: Arc<Mutex<mpsc::Receiver<Job>>>,
    ctx: JobContext,
    cancel: CancellationToken,
) {
    loop {
        let next = {
            let mut rx = receiver.lock().await;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                job = rx.recv() => job,
            }
        };
        match next {
            Some(job) => execute(&ctx, job).await,
            None => break,
        }
    }

    // Drain what was accepted before shutdown.
    loop {
        let job = receiver.lock().await.try_recv();
        match job {
            Ok(job) => execute(&ctx, job).await,
            Err(_) => break,
        }
    }
    tracing::debug!(worker, "Job worker stopped");
}

/// Run one job, logging (not propagating) failures.
pub async fn execute(ctx: &JobContext, job: Job) {
    let kind = job.kind();
    let device_id = job.device_id().to_string();

    let result = match job {
        Job::SaveSnapshot(capture) => {
            let rows = CreateFaultSnapshot::rows_for(&capture);
            ctx.store.save_snapshots(&rows).await.map(|()| {
                tracing::info!(
                    device_id = %device_id,
                    fault_code = %capture.fault_code,
                    phase = %capture.phase,
                    channels = rows.len(),
                    "Fault snapshot saved"
                );
            })
        }
        Job::OpenIncident(req) => open_incident(ctx, &req).await.map(|_| ()),
        Job::TouchDevice(beat) => ctx.store.touch_device(&beat).await,
        Job::StoreDatapoint(point) => ctx.store.store_datapoint(&point).await,
    };

    if let Err(e) = result {
        tracing::error!(error = %e, kind, device_id = %device_id, "Background job failed");
    }
}
