//! Shutdown coordination.

use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Broadcasts a single shutdown signal to every background task.
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    pub fn trigger(&self) {
        let notified = self.tx.send(()).unwrap_or(0);
        tracing::info!(tasks = notified, "Shutdown triggered");
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Wait for `tasks` to finish, abandoning any still running after `deadline`.
    pub async fn drain(tasks: Vec<JoinHandle<()>>, deadline: Duration) -> usize {
        let total = tasks.len();
        let joined = async {
            let mut finished = 0;
            for task in tasks {
                if task.await.is_ok() {
                    finished += 1;
                }
            }
            finished
        };

        match tokio::time::timeout(deadline, joined).await {
            Ok(finished) => finished,
            Err(_) => {
                tracing::warn!(total, deadline_secs = deadline.as_secs(), "Background tasks did not stop in time");
                0
            }
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_trigger_reaches_every_subscriber() {
        let shutdown = Shutdown::new();
        let tasks: Vec<_> = (0..3)
            .map(|_| {
                let mut rx = shutdown.subscribe();
                tokio::spawn(async move {
                    let _ = rx.recv().await;
                })
            })
            .collect();
        assert_eq!(shutdown.receiver_count(), 3);

        shutdown.trigger();
        assert_eq!(Shutdown::drain(tasks, Duration::from_secs(1)).await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_gives_up_after_deadline() {
        let stuck = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });
        assert_eq!(Shutdown::drain(vec![stuck], Duration::from_secs(5)).await, 0);
    }
}
