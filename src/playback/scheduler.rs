use parking_lot::{Mutex, RwLock};
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::grouping::{sample_inclusive, SoundTrigger};
use crate::config::PlaybackSettings;
use crate::sound::SoundPool;

/// Where the loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Waiting,
    Triggering,
    Stopped,
}

/// Background loop that waits a random interval, picks a sound and hands it
/// to the [`SoundTrigger`] without waiting for the requests.
pub struct PlaybackScheduler {
    settings: PlaybackSettings,
    pool: Arc<SoundPool>,
    trigger: Arc<SoundTrigger>,
    shutdown: CancellationToken,
    state: RwLock<SchedulerState>,
    /// Most recent grouping task
    last_grouping: Mutex<Option<JoinHandle<()>>>,
}

impl PlaybackScheduler {
    pub fn new(
        settings: PlaybackSettings,
        pool: Arc<SoundPool>,
        trigger: Arc<SoundTrigger>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            settings,
            pool,
            trigger,
            shutdown,
            state: RwLock::new(SchedulerState::Idle),
            last_grouping: Mutex::new(None),
        }
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.read()
    }

    fn set_state(&self, state: SchedulerState) {
        *self.state.write() = state;
    }

    /// Whether the last grouping is still dispatching shots.
    fn grouping_in_flight(&self) -> bool {
        self.last_grouping
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Random wait in whole seconds, uniform over `[min_interval, max_interval]`.
    pub fn next_delay(&self) -> Duration {
        next_delay(&self.settings, &mut rand::thread_rng())
    }

    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    /// Runs until the shutdown token is cancelled.
    pub async fn run(&self) {
        info!(
            "🎲 Starting randomized sound loop ({:?} - {:?})",
            self.settings.min_interval, self.settings.max_interval
        );

        loop {
            let delay = self.next_delay();
            self.set_state(SchedulerState::Waiting);
            debug!("⏳ Next sound in {}", humantime::format_duration(delay));

            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    self.set_state(SchedulerState::Stopped);
                    info!("🛑 Sound loop received the stop signal. Exiting...");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            if self.shutdown.is_cancelled() {
                self.set_state(SchedulerState::Stopped);
                return;
            }

            self.set_state(SchedulerState::Triggering);
            if !self.settings.overlap_groupings && self.grouping_in_flight() {
                info!("⏭️ Previous grouping still firing. Skipping...");
                continue;
            }

            match self.pool.pick_random() {
                Some(sound_id) => {
                    debug!("🔈 Triggering sound {}", sound_id);
                    // Detached: the loop never waits on the requests
                    let handle = self.trigger.spawn_grouping(sound_id);
                    *self.last_grouping.lock() = Some(handle);
                }
                None => info!("🔇 No sounds available to play. Skipping..."),
            }
        }
    }
}

pub fn next_delay<R: Rng + ?Sized>(settings: &PlaybackSettings, rng: &mut R) -> Duration {
    let seconds = sample_inclusive(
        rng,
        settings.min_interval.as_secs(),
        settings.max_interval.as_secs(),
    );
    Duration::from_secs(seconds)
}
