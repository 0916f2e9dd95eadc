//! Recording fakes for the platform traits, used by the timing tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

use crate::platform::{ApiError, PlatformClient, Sound, VoiceGateway};

#[derive(Debug, Clone, PartialEq)]
pub struct Shot {
    pub channel_id: u64,
    pub sound_id: String,
    pub at: Instant,
}

/// Records every call; triggers can be made slow or failing.
#[derive(Default)]
pub struct RecordingPlatform {
    pub custom: Mutex<Vec<Sound>>,
    pub defaults: Mutex<Vec<Sound>>,
    pub fail_fetch: Mutex<bool>,
    pub fail_triggers: Mutex<bool>,
    pub trigger_latency: Mutex<Option<Duration>>,
    pub shots: Mutex<Vec<Shot>>,
    pub messages: Mutex<Vec<(u64, String)>>,
    pub fetches: AtomicUsize,
}

impl RecordingPlatform {
    pub fn with_custom(ids: &[&str]) -> Self {
        let platform = Self::default();
        *platform.custom.lock() = ids.iter().map(|id| Sound::new(id)).collect();
        platform
    }

    pub fn shots(&self) -> Vec<Shot> {
        self.shots.lock().clone()
    }

    pub fn shot_count(&self) -> usize {
        self.shots.lock().len()
    }

    fn failure(endpoint: &str) -> ApiError {
        ApiError::Status {
            endpoint: endpoint.to_string(),
            status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            body: "{}".to_string(),
        }
    }
}

#[async_trait]
impl PlatformClient for RecordingPlatform {
    async fn guild_sounds(&self, _guild_id: u64) -> Result<Vec<Sound>, ApiError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if *self.fail_fetch.lock() {
            return Err(Self::failure("guild_sounds"));
        }
        Ok(self.custom.lock().clone())
    }

    async fn default_sounds(&self) -> Result<Vec<Sound>, ApiError> {
        Ok(self.defaults.lock().clone())
    }

    async fn send_soundboard_sound(&self, channel_id: u64, sound_id: &str) -> Result<(), ApiError> {
        self.shots.lock().push(Shot {
            channel_id,
            sound_id: sound_id.to_string(),
            at: Instant::now(),
        });

        let latency = *self.trigger_latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        if *self.fail_triggers.lock() {
            return Err(Self::failure("send-soundboard-sound"));
        }
        Ok(())
    }

    async fn send_message(&self, channel_id: u64, content: &str) -> Result<(), ApiError> {
        self.messages.lock().push((channel_id, content.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingVoice {
    pub joins: Mutex<Vec<(u64, u64, bool, bool)>>,
    pub leaves: AtomicUsize,
    pub fail_join: Mutex<bool>,
}

#[async_trait]
impl VoiceGateway for RecordingVoice {
    async fn join(
        &self,
        guild_id: u64,
        channel_id: u64,
        self_mute: bool,
        self_deaf: bool,
    ) -> anyhow::Result<()> {
        if *self.fail_join.lock() {
            anyhow::bail!("voice join refused");
        }
        self.joins
            .lock()
            .push((guild_id, channel_id, self_mute, self_deaf));
        Ok(())
    }

    async fn leave(&self, _guild_id: u64) -> anyhow::Result<()> {
        self.leaves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
