use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use fresnel_api::error::BackendError;
use fresnel_api::index::SearchIndex;
use fresnel_api::record::WriteOp;

use crate::config::{OverflowPolicy, PropagationConfig};

// ═══════════════════════════════════════════════════════════════
//  MirrorJob
// ═══════════════════════════════════════════════════════════════

/// One finalized primary-store write queued for index propagation.
#[derive(Debug, Clone)]
pub struct MirrorJob {
    /// Logical index the operation targets.
    pub index: String,
    /// Source collection (logging only).
    pub collection: String,
    pub op: WriteOp,
}

// ═══════════════════════════════════════════════════════════════
//  Propagator — enqueue side
// ═══════════════════════════════════════════════════════════════

/// Hands finalized writes to the propagation worker.
///
/// Enqueueing is fire-and-forget from the caller's point of view: it
/// never blocks the request path and never returns an error to it. The
/// worker applies jobs in submission order, so operations on the same
/// identifier cannot overtake each other.
#[derive(Clone)]
pub struct Propagator {
    tx: mpsc::Sender<MirrorJob>,
    overflow: OverflowPolicy,
}

impl Propagator {
    /// Spawn the worker task; returns the enqueue handle and the worker's
    /// join handle (awaited on shutdown, after cancelling the token).
    pub fn spawn(
        index: Arc<dyn SearchIndex>,
        config: &PropagationConfig,
        token: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(config.buffer);
        let worker = Worker {
            index,
            max_attempts: config.max_attempts.max(1),
            retry_base: Duration::from_millis(config.retry_base_ms),
        };
        let handle = tokio::spawn(worker.run(rx, token));
        (
            Self {
                tx,
                overflow: config.overflow,
            },
            handle,
        )
    }

    pub fn enqueue(&self, job: MirrorJob) {
        match self.overflow {
            OverflowPolicy::Drop => match self.tx.try_send(job) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(job)) => {
                    tracing::warn!(
                        collection = %job.collection,
                        id = %job.op.id(),
                        "propagation queue full, dropping operation"
                    );
                }
                Err(mpsc::error::TrySendError::Closed(job)) => {
                    tracing::warn!(
                        collection = %job.collection,
                        id = %job.op.id(),
                        "propagation worker stopped, dropping operation"
                    );
                }
            },
            OverflowPolicy::BackPressure => {
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    if tx.send(job).await.is_err() {
                        tracing::warn!("propagation worker stopped during backpressure send");
                    }
                });
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Worker — apply side
// ═══════════════════════════════════════════════════════════════

struct Worker {
    index: Arc<dyn SearchIndex>,
    max_attempts: u32,
    retry_base: Duration,
}

impl Worker {
    async fn run(self, mut rx: mpsc::Receiver<MirrorJob>, token: CancellationToken) {
        loop {
            tokio::select! {
                job = rx.recv() => {
                    match job {
                        Some(job) => self.apply_with_retry(job).await,
                        None => break,
                    }
                }
                _ = token.cancelled() => {
                    // Stop accepting new jobs, drain what is already queued.
                    rx.close();
                    while let Some(job) = rx.recv().await {
                        self.apply_with_retry(job).await;
                    }
                    break;
                }
            }
        }
        tracing::info!("propagation worker stopped");
    }

    async fn apply_with_retry(&self, job: MirrorJob) {
        for attempt in 1..=self.max_attempts {
            match self.apply(&job).await {
                Ok(()) => {
                    tracing::debug!(
                        collection = %job.collection,
                        op = job.op.kind(),
                        id = %job.op.id(),
                        "index operation applied"
                    );
                    return;
                }
                Err(e) => {
                    tracing::warn!(
                        collection = %job.collection,
                        op = job.op.kind(),
                        id = %job.op.id(),
                        attempt,
                        error = %e,
                        "index operation failed"
                    );
                }
            }
            if attempt < self.max_attempts {
                tokio::time::sleep(self.retry_base * 2u32.pow(attempt - 1)).await;
            }
        }
        tracing::error!(
            target: "fresnel::dead_letter",
            collection = %job.collection,
            op = job.op.kind(),
            id = %job.op.id(),
            "index operation exhausted retries, giving up"
        );
    }

    async fn apply(&self, job: &MirrorJob) -> Result<(), BackendError> {
        match &job.op {
            WriteOp::Create(record) => {
                self.index.index(&job.index, &record.id, &record.to_doc()).await
            }
            WriteOp::Update(record) => {
                self.index.update(&job.index, &record.id, &record.to_doc()).await
            }
            WriteOp::Delete { id } => self.index.delete(&job.index, id).await,
        }
    }
}
