use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;
use tokio::sync::{Mutex, mpsc};

#[derive(Debug, Error, PartialEq, Eq)]
#[error("update queue is closed")]
pub struct QueueClosed;

/// Unbounded multi-consumer job queue. `get` waits until a job arrives.
///
/// Ordering between jobs is not part of the contract, although jobs are in
/// practice handed out first-in first-out and re-queued jobs go to the back.
pub struct UpdateQueue<J> {
    inner: Arc<QueueInner<J>>,
}

struct QueueInner<J> {
    sender: mpsc::UnboundedSender<J>,
    receiver: Mutex<mpsc::UnboundedReceiver<J>>,
    depth: AtomicUsize,
}

impl<J> Clone for UpdateQueue<J> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<J> Default for UpdateQueue<J> {
    fn default() -> Self {
        Self::new()
    }
}

impl<J> UpdateQueue<J> {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(QueueInner {
                sender,
                receiver: Mutex::new(receiver),
                depth: AtomicUsize::new(0),
            }),
        }
    }

    pub fn add(&self, job: J) -> Result<(), QueueClosed> {
        self.inner.sender.send(job).map_err(|_| QueueClosed)?;
        self.inner.depth.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Waits for the next job. Returns `None` once the queue is closed and drained.
    pub async fn get(&self) -> Option<J> {
        let job = self.inner.receiver.lock().await.recv().await;
        if job.is_some() {
            self.inner.depth.fetch_sub(1, Ordering::Relaxed);
        }
        job
    }

    /// Rejects further `add` calls. Jobs already queued can still be taken.
    pub async fn close(&self) {
        self.inner.receiver.lock().await.close();
    }

    pub fn len(&self) -> usize {
        self.inner.depth.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
