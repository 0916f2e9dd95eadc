//! # Platform Module
//!
//! Everything the bot needs from Discord beyond the gateway session itself.
//!
//! The rest of the crate talks to Discord only through two traits:
//!
//! - [`PlatformClient`] - REST calls (sound lists, soundboard triggers, text replies)
//! - [`VoiceGateway`] - joining and leaving the voice channel
//!
//! The production implementations live in [`rest`] (reqwest) and [`voice`]
//! (songbird). Keeping them behind traits lets the scheduler, the catalog and
//! the event router run in tests without a live connection.

pub mod rest;
pub mod voice;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use rest::DiscordRest;
pub use voice::SongbirdVoice;

/// A soundboard sound as returned by the Discord API.
///
/// Only `sound_id` feeds the playback pool; the rest is kept for logging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(dead_code)]
pub struct Sound {
    pub sound_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub emoji_id: Option<String>,
    #[serde(default)]
    pub emoji_name: Option<String>,
    #[serde(default)]
    pub guild_id: Option<String>,
    #[serde(default = "default_available")]
    pub available: bool,
}

fn default_available() -> bool {
    true
}

impl Sound {
    #[cfg(test)]
    pub fn new(sound_id: &str) -> Self {
        Self {
            sound_id: sound_id.to_string(),
            name: sound_id.to_string(),
            emoji_id: None,
            emoji_name: None,
            guild_id: None,
            available: true,
        }
    }
}

/// Errors returned by the REST collaborator.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {endpoint} failed: {source}")]
    Request {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} returned HTTP {status}: {body}")]
    Status {
        endpoint: String,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("could not decode response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },
}

/// REST operations consumed by the catalog, the burst trigger and the
/// text-command handler.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Custom sounds uploaded to the guild.
    async fn guild_sounds(&self, guild_id: u64) -> Result<Vec<Sound>, ApiError>;

    /// Sounds Discord ships to every guild.
    async fn default_sounds(&self) -> Result<Vec<Sound>, ApiError>;

    /// Plays `sound_id` in the voice channel. The bot must already be connected.
    async fn send_soundboard_sound(&self, channel_id: u64, sound_id: &str) -> Result<(), ApiError>;

    /// Posts a plain text message.
    async fn send_message(&self, channel_id: u64, content: &str) -> Result<(), ApiError>;
}

/// Voice connection management.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VoiceGateway: Send + Sync {
    async fn join(
        &self,
        guild_id: u64,
        channel_id: u64,
        self_mute: bool,
        self_deaf: bool,
    ) -> anyhow::Result<()>;

    async fn leave(&self, guild_id: u64) -> anyhow::Result<()>;
}
