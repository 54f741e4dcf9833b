use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::debug;

/// A repeating job on the tokio runtime with an explicit stop signal.
///
/// The first run happens one `period` after spawning. Dropping the handle
/// closes the stop channel, which also ends the loop.
pub struct ScheduledTask {
    name: String,
    stop_tx: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    /// Must be called from inside a tokio runtime.
    pub fn spawn<F>(name: impl Into<String>, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let name = name.into();
        let period = period.max(Duration::from_millis(1));
        let (stop_tx, mut stop_rx) = broadcast::channel::<()>(1);
        let task_name = name.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = stop_rx.recv() => {
                        debug!(task = %task_name, "Scheduled task stopped");
                        break;
                    }
                    _ = ticker.tick() => tick(),
                }
            }
        });

        debug!(task = %name, period_ms = period.as_millis() as u64, "Scheduled task started");

        Self {
            name,
            stop_tx,
            handle,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Signals the loop and aborts it without waiting.
    pub fn cancel(self) {
        let _ = self.stop_tx.send(());
        self.handle.abort();
    }

    /// Signals the loop and waits for the current tick to finish.
    pub async fn shutdown(self) {
        let _ = self.stop_tx.send(());
        let _ = self.handle.await;
    }
}
