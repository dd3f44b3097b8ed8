//! Background persistence of conversation turns.
//!
//! Request handlers enqueue finished conversations on a bounded `mpsc`
//! queue and return immediately. A single worker task drains the queue and
//! saves each conversation through a [`Repository`]. Delivery is at most
//! once: a full or closed queue drops the job with a warning, and jobs still
//! queued when the process dies are lost.

use std::sync::Arc;

use chatrelay_types::chat::Conversation;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::repository::Repository;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("persistence queue is full")]
    QueueFull,

    #[error("persistence queue is closed")]
    Closed,
}

/// Sending half of the persistence queue. Cheap to clone.
#[derive(Debug, Clone)]
pub struct PersistQueue {
    tx: mpsc::Sender<Conversation>,
}

impl PersistQueue {
    /// Create a queue and the receiver the worker drains.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Conversation>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Schedule `conversation` for saving without waiting.
    pub fn enqueue(&self, conversation: Conversation) -> Result<(), PersistError> {
        let session_id = conversation.session_id.clone();
        match self.tx.try_send(conversation) {
            Ok(()) => {
                debug!(%session_id, "conversation queued for persistence");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(%session_id, "persistence queue full, dropping conversation");
                Err(PersistError::QueueFull)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(%session_id, "persistence queue closed, dropping conversation");
                Err(PersistError::Closed)
            }
        }
    }
}

/// Outcome counters reported when the worker exits.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PersistStats {
    pub saved: u64,
    pub failed: u64,
}

/// Save queued conversations until every sender is dropped.
pub async fn run_persist_worker<R>(repo: Arc<R>, mut rx: mpsc::Receiver<Conversation>) -> PersistStats
where
    R: Repository<Conversation>,
{
    let mut stats = PersistStats::default();

    while let Some(conversation) = rx.recv().await {
        let session_id = conversation.session_id.clone();
        match repo.save(&conversation).await {
            Ok(saved) => {
                stats.saved += 1;
                debug!(
                    %session_id,
                    id = saved.meta.id.as_deref().unwrap_or_default(),
                    "conversation saved"
                );
            }
            Err(e) => {
                stats.failed += 1;
                error!(%session_id, error = %e, "failed to save conversation");
            }
        }
    }

    info!(saved = stats.saved, failed = stats.failed, "persistence worker drained");
    stats
}

/// Spawn [`run_persist_worker`] on the current runtime.
pub fn spawn_persist_worker<R>(
    repo: Arc<R>,
    rx: mpsc::Receiver<Conversation>,
) -> JoinHandle<PersistStats>
where
    R: Repository<Conversation> + 'static,
{
    tokio::spawn(run_persist_worker(repo, rx))
}
