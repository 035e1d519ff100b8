use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Passed to a poll task on every run. The first run happens immediately on start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTick {
    pub sequence: u64,
}

impl PollTick {
    pub fn is_first(&self) -> bool {
        self.sequence == 0
    }
}

struct ActivePoll {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Named interval tasks. Starting a name that is already running replaces it.
///
/// Stopping cancels the timer only: a run already in progress finishes, and
/// callers are expected to discard results that no longer apply.
#[derive(Clone)]
pub struct Poller {
    active: Arc<Mutex<HashMap<String, ActivePoll>>>,
    shutdown: CancellationToken,
}

impl Poller {
    pub fn new() -> Self {
        Self {
            active: Arc::new(Mutex::new(HashMap::new())),
            shutdown: CancellationToken::new(),
        }
    }

    pub async fn start<F, Fut>(&self, name: &str, period: Duration, mut task: F)
    where
        F: FnMut(PollTick) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut active = self.active.lock().await;

        if let Some(previous) = active.remove(name) {
            tracing::debug!(poll = name, "replacing running poll");
            previous.token.cancel();
        }

        let token = self.shutdown.child_token();
        let task_token = token.clone();
        let poll_name = name.to_string();

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut sequence = 0u64;

            loop {
                tokio::select! {
                    biased;
                    _ = task_token.cancelled() => break,
                    _ = interval.tick() => {}
                }

                task(PollTick { sequence }).await;
                sequence += 1;
            }

            tracing::debug!(poll = %poll_name, runs = sequence, "poll stopped");
        });

        tracing::debug!(poll = name, period_secs = period.as_secs_f64(), "poll started");
        active.insert(name.to_string(), ActivePoll { token, handle });
    }

    /// Returns false when nothing was running under `name`
    pub async fn stop(&self, name: &str) -> bool {
        let mut active = self.active.lock().await;
        match active.remove(name) {
            Some(poll) => {
                poll.token.cancel();
                true
            }
            None => false,
        }
    }

    pub async fn is_running(&self, name: &str) -> bool {
        let active = self.active.lock().await;
        active
            .get(name)
            .map(|poll| !poll.handle.is_finished())
            .unwrap_or(false)
    }

    /// Cancels every poll, including ones started later from clones of this poller
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let mut active = self.active.lock().await;
        for (name, poll) in active.drain() {
            tracing::debug!(poll = %name, "cancelling poll on shutdown");
            poll.token.cancel();
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

impl Default for Poller {
    fn default() -> Self {
        Self::new()
    }
}
