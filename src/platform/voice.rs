use anyhow::{Context, Result};
use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    events::CoreEvent, Event as VoiceEvent, EventContext, EventHandler as VoiceEventHandler,
    Songbird,
};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use super::VoiceGateway;

/// Someone in the voice channel started or stopped transmitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpeakingUpdate {
    pub user_id: Option<u64>,
    pub speaking: bool,
}

/// Conexión de voz basada en Songbird
pub struct SongbirdVoice {
    manager: Arc<Songbird>,
    speaking_tx: UnboundedSender<SpeakingUpdate>,
}

impl SongbirdVoice {
    /// `manager` must be the same instance registered on the serenity client.
    pub fn new(manager: Arc<Songbird>, speaking_tx: UnboundedSender<SpeakingUpdate>) -> Self {
        Self {
            manager,
            speaking_tx,
        }
    }
}

#[async_trait]
impl VoiceGateway for SongbirdVoice {
    async fn join(
        &self,
        guild_id: u64,
        channel_id: u64,
        self_mute: bool,
        self_deaf: bool,
    ) -> Result<()> {
        let guild = GuildId::new(guild_id);
        let call = self
            .manager
            .join(guild, ChannelId::new(channel_id))
            .await
            .with_context(|| format!("Failed to join voice channel {}", channel_id))?;

        let mut handler = call.lock().await;
        handler
            .mute(self_mute)
            .await
            .context("Failed to set self-mute")?;
        handler
            .deafen(self_deaf)
            .await
            .context("Failed to set self-deaf")?;

        handler.add_global_event(
            VoiceEvent::Core(CoreEvent::SpeakingStateUpdate),
            SpeakingForwarder {
                tx: self.speaking_tx.clone(),
            },
        );
        handler.add_global_event(
            VoiceEvent::Core(CoreEvent::DriverDisconnect),
            DisconnectHandler { guild_id },
        );

        info!(
            "🔊 Conectado al canal de voz {} en guild {} (mute={}, deaf={})",
            channel_id, guild_id, self_mute, self_deaf
        );
        Ok(())
    }

    async fn leave(&self, guild_id: u64) -> Result<()> {
        self.manager
            .remove(GuildId::new(guild_id))
            .await
            .context("Failed to leave voice channel")?;

        info!("👋 Desconectado del canal de voz en guild {}", guild_id);
        Ok(())
    }
}

/// Forwards speaking-state changes to the event router.
struct SpeakingForwarder {
    tx: UnboundedSender<SpeakingUpdate>,
}

#[async_trait]
impl VoiceEventHandler for SpeakingForwarder {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<VoiceEvent> {
        if let EventContext::SpeakingStateUpdate(state) = ctx {
            debug!("📡 Estado de habla cambiado: {:?}", state);

            let update = SpeakingUpdate {
                user_id: state.user_id.map(|user| user.0),
                speaking: state.speaking.microphone(),
            };
            if self.tx.send(update).is_err() {
                // Receiver gone: the bot is shutting down.
                return Some(VoiceEvent::Cancel);
            }
        }

        None
    }
}

struct DisconnectHandler {
    guild_id: u64,
}

#[async_trait]
impl VoiceEventHandler for DisconnectHandler {
    async fn act(&self, _ctx: &EventContext<'_>) -> Option<VoiceEvent> {
        warn!(
            "🔌 Bot desconectado del canal de voz en guild {}",
            self.guild_id
        );
        None
    }
}
