//! Rotation scheduler.
//!
//! Cycles through a fixed token set in a background task, pulls snapshots
//! through the [`PriceCache`] and pushes display name/status to a
//! [`PresenceSink`]. Start/stop is guarded by a lifecycle mutex that is
//! separate from the cache lock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::PriceCache;
use crate::error::LifecycleError;
use crate::presence::{Presence, PresenceSink};
use ticker_presence_types::{Mood, PriceSnapshot};

/// Default time a token stays on display (15 seconds).
pub const DEFAULT_DWELL: Duration = Duration::from_secs(15);

/// Default loop interval (500 milliseconds).
pub const DEFAULT_TICK: Duration = Duration::from_millis(500);

/// Scheduler settings.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Keys to rotate through, in order
    pub token_set: Vec<String>,

    /// Minimum time each token stays on display
    pub dwell: Duration,

    /// Per-key dwell overrides
    pub dwell_overrides: HashMap<String, Duration>,

    /// Sleep between loop iterations
    pub tick: Duration,
}

impl SchedulerConfig {
    fn dwell_for(&self, key: &str) -> Duration {
        self.dwell_overrides.get(key).copied().unwrap_or(self.dwell)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            token_set: Vec::new(),
            dwell: DEFAULT_DWELL,
            dwell_overrides: HashMap::new(),
            tick: DEFAULT_TICK,
        }
    }
}

/// Rotation progress, owned by the loop and published after every tick.
#[derive(Debug, Clone, Default)]
pub struct RotationState {
    pub token_set: Vec<String>,
    pub current_index: usize,
    pub last_advance_at: Option<Instant>,
    pub last_published: Option<PriceSnapshot>,
    /// Completed loop iterations since start
    pub ticks: u64,
}

/// One run of the rotation loop.
struct Rotation {
    cache: Arc<PriceCache>,
    sink: Arc<dyn PresenceSink>,
    config: SchedulerConfig,
    state: RotationState,
    state_tx: Arc<watch::Sender<RotationState>>,
}

impl Rotation {
    fn new(
        cache: Arc<PriceCache>,
        sink: Arc<dyn PresenceSink>,
        config: SchedulerConfig,
        state_tx: Arc<watch::Sender<RotationState>>,
    ) -> Self {
        let state = RotationState {
            token_set: config.token_set.clone(),
            ..Default::default()
        };
        Self {
            cache,
            sink,
            config,
            state,
            state_tx,
        }
    }

    async fn run(mut self, cancel: CancellationToken) {
        info!("Rotation started: {}", self.state.token_set.join(", "));

        loop {
            // An in-flight fetch or publish is abandoned on cancel
            let cancelled = tokio::select! {
                biased;
                _ = cancel.cancelled() => true,
                _ = self.tick() => false,
            };
            if cancelled {
                break;
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.config.tick) => {}
            }
        }

        self.reset().await;

        info!("Rotation stopped after {} ticks", self.state.ticks);
    }

    async fn tick(&mut self) {
        if self.state.token_set.is_empty() {
            return;
        }

        let target = self.state.token_set[self.state.current_index].clone();

        match self.cache.get(&target).await {
            Ok(snapshot) => {
                let changed = self
                    .state
                    .last_published
                    .as_ref()
                    .map(|last| last.created_at != snapshot.created_at)
                    .unwrap_or(true);

                if changed {
                    let presence = Presence::from_snapshot(&snapshot);
                    self.publish(&presence).await;
                    self.state.last_published = Some(snapshot);
                }
            }
            Err(e) => warn!("Rotation tick for {} failed: {}", target, e),
        }

        let due = self
            .state
            .last_advance_at
            .map(|at| at.elapsed() >= self.config.dwell_for(&target))
            .unwrap_or(true);

        if due {
            self.state.current_index = (self.state.current_index + 1) % self.state.token_set.len();
            self.state.last_advance_at = Some(Instant::now());
            debug!("Rotation advanced to index {}", self.state.current_index);
        }

        self.state.ticks += 1;
        self.state_tx.send_replace(self.state.clone());
    }

    async fn publish(&self, presence: &Presence) {
        debug!("Publishing {} | {}", presence.display_name, presence.status);

        for target in self.sink.targets().await {
            let current = self.sink.display_name(&target).await;
            if current.as_deref() == Some(presence.display_name.as_str()) {
                continue;
            }
            if let Err(e) = self
                .sink
                .set_display_name(&target, &presence.display_name)
                .await
            {
                warn!("Failed to set display name on {}: {}", target, e);
            }
        }

        if let Err(e) = self.sink.set_status(&presence.status, presence.mood).await {
            warn!("Failed to set status: {}", e);
        }
    }

    /// Clear name and status everywhere. Failures are logged and skipped.
    async fn reset(&self) {
        for target in self.sink.targets().await {
            if let Err(e) = self.sink.set_display_name(&target, "").await {
                warn!("Failed to reset display name on {}: {}", target, e);
            }
        }

        if let Err(e) = self.sink.set_status("", Mood::Online).await {
            warn!("Failed to reset status: {}", e);
        }
    }
}

#[derive(Default)]
struct Lifecycle {
    task: Option<JoinHandle<()>>,
    cancel: Option<CancellationToken>,
}

impl Lifecycle {
    /// Whether a loop is running and has not been asked to stop.
    fn is_live(&self) -> bool {
        let running = self.task.as_ref().map(|t| !t.is_finished()).unwrap_or(false);
        let cancelled = self.cancel.as_ref().map(|c| c.is_cancelled()).unwrap_or(true);
        running && !cancelled
    }
}

/// Background rotation of token prices onto a presence sink.
pub struct RotationScheduler {
    cache: Arc<PriceCache>,
    sink: Arc<dyn PresenceSink>,
    config: SchedulerConfig,
    lifecycle: Mutex<Lifecycle>,
    state_tx: Arc<watch::Sender<RotationState>>,
}

impl RotationScheduler {
    pub fn new(cache: Arc<PriceCache>, sink: Arc<dyn PresenceSink>, config: SchedulerConfig) -> Self {
        let (state_tx, _) = watch::channel(RotationState::default());
        Self {
            cache,
            sink,
            config,
            lifecycle: Mutex::new(Lifecycle::default()),
            state_tx: Arc::new(state_tx),
        }
    }

    /// Launch the rotation loop.
    ///
    /// If a previous loop was stopped but is still clearing the presence,
    /// waits for that reset before starting the new one.
    pub async fn start(&self) -> Result<(), LifecycleError> {
        let mut lifecycle = self.lifecycle.lock().await;

        if lifecycle.is_live() {
            return Err(LifecycleError::AlreadyRunning);
        }

        if let Some(previous) = lifecycle.task.take() {
            if let Err(e) = previous.await {
                warn!("Previous rotation task ended abnormally: {}", e);
            }
        }

        let cancel = CancellationToken::new();
        let rotation = Rotation::new(
            self.cache.clone(),
            self.sink.clone(),
            self.config.clone(),
            self.state_tx.clone(),
        );
        self.state_tx.send_replace(rotation.state.clone());

        lifecycle.task = Some(tokio::spawn(rotation.run(cancel.clone())));
        lifecycle.cancel = Some(cancel);

        Ok(())
    }

    /// Request the rotation loop to stop. Does not wait for it to exit.
    pub async fn stop(&self) -> Result<(), LifecycleError> {
        let lifecycle = self.lifecycle.lock().await;

        if !lifecycle.is_live() {
            return Err(LifecycleError::NotRunning);
        }

        if let Some(cancel) = &lifecycle.cancel {
            cancel.cancel();
        }
        info!("Rotation stop requested");

        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.lifecycle.lock().await.is_live()
    }

    /// Latest rotation state published by the loop.
    pub fn state(&self) -> RotationState {
        self.state_tx.borrow().clone()
    }

    /// Stop the rotation loop and wait until it has cleared the presence.
    pub async fn shutdown(&self) -> Result<(), LifecycleError> {
        let mut lifecycle = self.lifecycle.lock().await;

        if !lifecycle.is_live() {
            return Err(LifecycleError::NotRunning);
        }

        if let Some(cancel) = &lifecycle.cancel {
            cancel.cancel();
        }
        if let Some(task) = lifecycle.task.take() {
            if let Err(e) = task.await {
                warn!("Rotation task ended abnormally: {}", e);
            }
        }
        info!("Rotation shut down");

        Ok(())
    }
}
