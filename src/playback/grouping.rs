use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::PlaybackSettings;
use crate::platform::PlatformClient;

/// Probabilities below this count as zero, so the single shot is never
/// suppressed by float noise.
pub const RAPID_FIRE_TOLERANCE: f32 = 0.001;

/// What one sound grouping will do, decided before anything is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupingPlan {
    pub single_shot: bool,
    pub burst_count: u32,
    pub burst_interval: Duration,
}

impl GroupingPlan {
    pub fn draw<R: Rng + ?Sized>(settings: &PlaybackSettings, rng: &mut R) -> Self {
        let p = settings.rapid_fire_probability;
        let single_shot = p < RAPID_FIRE_TOLERANCE || rng.gen::<f32>() > p;

        let burst_count = sample_inclusive(
            rng,
            u64::from(settings.rapid_fire_count_min),
            u64::from(settings.rapid_fire_count_max),
        ) as u32;

        let burst_interval = Duration::from_millis(sample_inclusive(
            rng,
            duration_millis(settings.rapid_fire_min_interval),
            duration_millis(settings.rapid_fire_max_interval),
        ));

        Self {
            single_shot,
            burst_count,
            burst_interval,
        }
    }

    /// Total trigger calls this plan issues.
    pub fn shots(&self) -> u32 {
        self.burst_count + u32::from(self.single_shot)
    }
}

/// Uniform integer in `[min, max]`. Swapped bounds are tolerated rather
/// than panicking; the config loader rejects them up front.
pub fn sample_inclusive<R: Rng + ?Sized>(rng: &mut R, min: u64, max: u64) -> u64 {
    let (low, high) = if min <= max { (min, max) } else { (max, min) };
    rng.gen_range(low..=high)
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Fires sound groupings into the configured voice channel.
pub struct SoundTrigger {
    platform: Arc<dyn PlatformClient>,
    channel_id: u64,
    settings: PlaybackSettings,
}

impl SoundTrigger {
    pub fn new(platform: Arc<dyn PlatformClient>, channel_id: u64, settings: PlaybackSettings) -> Self {
        Self {
            platform,
            channel_id,
            settings,
        }
    }

    /// Draws a plan and runs the grouping on its own task.
    ///
    /// The returned handle may be dropped; the grouping keeps running.
    pub fn spawn_grouping(self: &Arc<Self>, sound_id: String) -> JoinHandle<()> {
        let plan = GroupingPlan::draw(&self.settings, &mut rand::thread_rng());
        let trigger = self.clone();
        tokio::spawn(async move {
            trigger.play_grouping(&sound_id, plan).await;
        })
    }

    /// Optional single shot, then the rapid-fire burst.
    ///
    /// Every shot runs on its own task. Returns once the last burst shot has
    /// been dispatched, not when the shots complete.
    pub async fn play_grouping(self: &Arc<Self>, sound_id: &str, plan: GroupingPlan) {
        debug!(
            "🎯 Grouping for {}: {} shots (single={}, burst {}x every {:?})",
            sound_id,
            plan.shots(),
            plan.single_shot,
            plan.burst_count,
            plan.burst_interval
        );

        if plan.single_shot {
            let trigger = self.clone();
            let sound_id = sound_id.to_string();
            tokio::spawn(async move {
                if let Err(e) = trigger.play(&sound_id).await {
                    warn!("⚠️ Single shot sound playback error for {}: {}", sound_id, e);
                }
            });
        }

        self.rapid_fire(sound_id, plan.burst_count, plan.burst_interval)
            .await;
    }

    /// Dispatches `count` shots, `interval` apart, each on its own task so a
    /// slow request never delays the next one.
    async fn rapid_fire(self: &Arc<Self>, sound_id: &str, count: u32, interval: Duration) {
        for shot in 0..count {
            if shot > 0 {
                tokio::time::sleep(interval).await;
            }

            let trigger = self.clone();
            let sound_id = sound_id.to_string();
            tokio::spawn(async move {
                if let Err(e) = trigger.play(&sound_id).await {
                    warn!(
                        "⚠️ Rapid fire burst error ({}/{}) for {}: {}",
                        shot + 1,
                        count,
                        sound_id,
                        e
                    );
                }
            });
        }
    }

    /// One trigger call.
    pub async fn play(&self, sound_id: &str) -> Result<(), crate::platform::ApiError> {
        self.platform
            .send_soundboard_sound(self.channel_id, sound_id)
            .await
    }
}
