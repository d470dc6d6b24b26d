//! Background polling task
//!
//! The poller is a spawned tokio task that runs a tick function at a fixed
//! interval until stopped. Stopping is explicit through [`PollHandle::stop`]
//! and also happens when the handle is dropped, so a poller never outlives
//! whoever started it.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::debug;

/// Commands sent to the poll task
#[derive(Debug, Clone, Copy)]
enum PollCommand {
    Shutdown,
}

/// What the tick function wants next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollControl {
    Continue,
    Stop,
}

/// Owner of a running poll task
#[derive(Debug)]
pub struct PollHandle {
    command_tx: mpsc::Sender<PollCommand>,
    task: JoinHandle<()>,
}

impl PollHandle {
    /// Stop the task; no tick starts after this returns
    ///
    /// A tick that is mid-flight is cancelled at its next await point.
    pub fn stop(self) {
        drop(self);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        let _ = self.command_tx.try_send(PollCommand::Shutdown);
        self.task.abort();
    }
}

/// Spawn a task calling `tick` every `interval`
///
/// The first tick fires one full interval after spawning. Ticks never
/// overlap; if one runs long, missed ticks are skipped rather than bunched.
pub fn spawn_poller<F, Fut>(interval: Duration, mut tick: F) -> PollHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = PollControl> + Send + 'static,
{
    let (command_tx, mut command_rx) = mpsc::channel(1);

    let task = tokio::spawn(async move {
        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if tick().await == PollControl::Stop {
                        break;
                    }
                }
                cmd = command_rx.recv() => {
                    if matches!(cmd, Some(PollCommand::Shutdown) | None) {
                        break;
                    }
                }
            }
        }
        debug!("Poller stopped");
    });

    PollHandle { command_tx, task }
}
