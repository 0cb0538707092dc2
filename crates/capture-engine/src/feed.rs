//! Orientation feed: drains the motion channel into the session's window.
//!
//! The feed task is the only writer. Readers take short locks to copy or
//! query the window and watch a progress channel to learn when new samples
//! land, so no reader ever polls.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use steadystack_processing_core::OrientationWindow;
use steadystack_sample_model::{RotationMatrix, TimedSample};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// How far the motion stream has progressed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStatus {
    /// Samples accepted into the window.
    pub samples: usize,
    /// The motion channel has closed.
    pub ended: bool,
}

/// Background task appending motion samples to a shared window.
pub struct OrientationFeed {
    window: Arc<Mutex<OrientationWindow>>,
    progress: watch::Receiver<FeedStatus>,
    task: JoinHandle<()>,
}

impl OrientationFeed {
    /// Start draining `samples` into a fresh, empty window.
    pub fn spawn(mut samples: mpsc::Receiver<TimedSample<RotationMatrix>>) -> Self {
        let window = Arc::new(Mutex::new(OrientationWindow::new()));
        let (status_tx, progress) = watch::channel(FeedStatus::default());

        let writer = Arc::clone(&window);
        let task = tokio::spawn(async move {
            let mut status = FeedStatus::default();
            while let Some(sample) = samples.recv().await {
                let time = sample.time;
                let pushed = writer
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(sample);
                match pushed {
                    Ok(()) => {
                        status.samples += 1;
                        status_tx.send_replace(status);
                        tracing::trace!(time, samples = status.samples, "Orientation sample");
                    }
                    Err(e) => tracing::debug!(error = %e, "Dropping motion sample"),
                }
            }
            status.ended = true;
            status_tx.send_replace(status);
            tracing::debug!(samples = status.samples, "Motion stream ended");
        });

        Self {
            window,
            progress,
            task,
        }
    }

    /// A feed with no motion stream behind it.
    pub fn empty() -> Self {
        let (_, rx) = mpsc::channel(1);
        Self::spawn(rx)
    }

    fn lock(&self) -> MutexGuard<'_, OrientationWindow> {
        self.window.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current stream progress.
    pub fn status(&self) -> FeedStatus {
        *self.progress.borrow()
    }

    /// Copy of the window as it stands now.
    pub fn snapshot(&self) -> OrientationWindow {
        self.lock().clone()
    }

    /// Wait up to `limit` for `ready` to hold on the window.
    ///
    /// Returns early with the predicate's verdict once the motion stream
    /// ends, since the window can no longer change.
    pub async fn wait_until<F>(&self, limit: Duration, mut ready: F) -> bool
    where
        F: FnMut(&OrientationWindow) -> bool,
    {
        let mut progress = self.progress.clone();
        let check = async {
            loop {
                let ended = progress.borrow_and_update().ended;
                let satisfied = {
                    let window = self.lock();
                    ready(&window)
                };
                if satisfied {
                    return true;
                }
                if ended || progress.changed().await.is_err() {
                    return false;
                }
            }
        };
        tokio::time::timeout(limit, check).await.unwrap_or(false)
    }

    /// Wait up to `limit` for the first sample.
    pub async fn wait_for_first_sample(&self, limit: Duration) -> bool {
        self.wait_until(limit, |window| !window.is_empty()).await
    }

    /// Stop draining. The window keeps whatever it holds.
    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for OrientationFeed {
    fn drop(&mut self) {
        self.task.abort();
    }
}
