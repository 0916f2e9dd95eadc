use rand::Rng;
use tracing::{debug, info};

use super::{commands, SoundboardBot};
use crate::platform::voice::SpeakingUpdate;

/// Gateway dispatches that mean the guild's soundboard changed.
pub const SOUNDBOARD_EVENTS: [&str; 4] = [
    "GUILD_SOUNDBOARD_SOUND_CREATE",
    "GUILD_SOUNDBOARD_SOUND_UPDATE",
    "GUILD_SOUNDBOARD_SOUND_DELETE",
    "GUILD_SOUNDBOARD_SOUNDS_UPDATE",
];

/// Everything the bot reacts to, stripped of serenity/songbird types.
#[derive(Debug, Clone, PartialEq)]
pub enum PlatformEvent {
    /// Gateway session is up; carries the bot's own user.
    Connected { user_id: u64, name: String },
    /// A guild became available (first connect or reconnect).
    GuildReady { guild_id: u64, name: String },
    /// A text message was posted in a channel the bot can read.
    Message {
        channel_id: u64,
        author_id: u64,
        content: String,
    },
    /// A raw dispatch serenity does not model, by event name.
    GatewayDispatch { kind: String },
    /// Someone started or stopped speaking in the voice channel.
    VoiceSpeaking(SpeakingUpdate),
}

/// Routes one event to its handler.
pub async fn dispatch(bot: &SoundboardBot, event: PlatformEvent) {
    match event {
        PlatformEvent::Connected { user_id, name } => on_connected(bot, user_id, &name),
        PlatformEvent::GuildReady { guild_id, name } => on_guild_ready(bot, guild_id, &name).await,
        PlatformEvent::Message {
            channel_id,
            author_id,
            content,
        } => commands::handle_message(bot, channel_id, author_id, &content).await,
        PlatformEvent::GatewayDispatch { kind } => on_gateway_dispatch(bot, &kind).await,
        PlatformEvent::VoiceSpeaking(update) => {
            on_voice_speaking(bot, update, &mut rand::thread_rng());
        }
    }
}

fn on_connected(bot: &SoundboardBot, user_id: u64, name: &str) {
    info!("🤖 {} is online! (id {})", name, user_id);
    bot.set_bot_user_id(user_id);
}

/// Starts the session the first time the configured guild shows up.
pub async fn on_guild_ready(bot: &SoundboardBot, guild_id: u64, name: &str) {
    if guild_id != bot.config().server_id {
        debug!("Ignoring guild {} ({})", guild_id, name);
        return;
    }
    info!("🏠 Guild available: {}", name);

    match bot.start_session().await {
        Ok(true) => info!("✅ Playback session started"),
        Ok(false) => {}
        Err(e) => bot.fail(e.context("Could not start the playback session")),
    }
}

pub async fn on_gateway_dispatch(bot: &SoundboardBot, kind: &str) {
    if !SOUNDBOARD_EVENTS.contains(&kind) {
        return;
    }

    info!("🔔 Updating sound list due to Discord event {}", kind);
    let _ = bot.refresh_sounds().await;
}

/// Rolls `response_probability` when someone other than the bot starts
/// speaking. Returns whether a response was requested.
pub fn on_voice_speaking<R: Rng + ?Sized>(
    bot: &SoundboardBot,
    update: SpeakingUpdate,
    rng: &mut R,
) -> bool {
    if !update.speaking {
        return false;
    }
    if update.user_id.is_some() && update.user_id == bot.bot_user_id() {
        return false;
    }

    let probability = bot.config().response_probability;
    if probability <= 0.0 || rng.gen::<f32>() >= probability {
        return false;
    }

    respond_to_speech(bot, update.user_id);
    true
}

/// Spoken responses are not implemented yet; `responses` in the config is
/// reserved for them.
fn respond_to_speech(bot: &SoundboardBot, user_id: Option<u64>) {
    debug!(
        "🗣️ Speech response requested for {:?} ({} responses configured), not implemented",
        user_id,
        bot.config().responses.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::test_support::*;
    use crate::config::Config;
    use crate::testing::{RecordingPlatform, RecordingVoice};
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_connected_records_bot_user() {
        let bot = bot_with(
            config(),
            Arc::new(RecordingPlatform::default()),
            Arc::new(RecordingVoice::default()),
        );

        dispatch(
            &bot,
            PlatformEvent::Connected {
                user_id: 42,
                name: "chaos".to_string(),
            },
        )
        .await;
        assert_eq!(bot.bot_user_id(), Some(42));
    }

    #[tokio::test]
    async fn test_other_guild_is_ignored() {
        let voice = Arc::new(RecordingVoice::default());
        let bot = bot_with(config(), Arc::new(RecordingPlatform::default()), voice.clone());

        dispatch(
            &bot,
            PlatformEvent::GuildReady {
                guild_id: GUILD + 1,
                name: "elsewhere".to_string(),
            },
        )
        .await;

        assert!(voice.joins.lock().is_empty());
        assert!(!bot.is_running().await);
    }

    #[tokio::test]
    async fn test_repeated_guild_ready_starts_one_session() {
        let platform = Arc::new(RecordingPlatform::with_custom(&["a"]));
        let voice = Arc::new(RecordingVoice::default());
        let bot = bot_with(config(), platform.clone(), voice.clone());

        let ready = || PlatformEvent::GuildReady {
            guild_id: GUILD,
            name: "home".to_string(),
        };
        tokio::join!(dispatch(&bot, ready()), dispatch(&bot, ready()));
        dispatch(&bot, ready()).await;

        assert_eq!(voice.joins.lock().len(), 1);
        assert_eq!(platform.fetches.load(Ordering::SeqCst), 1);
        assert!(bot.is_running().await);
        bot.close().await;
    }

    #[tokio::test]
    async fn test_guild_ready_join_failure_is_fatal() {
        let voice = Arc::new(RecordingVoice::default());
        *voice.fail_join.lock() = true;
        let bot = bot_with(config(), Arc::new(RecordingPlatform::default()), voice);

        dispatch(
            &bot,
            PlatformEvent::GuildReady {
                guild_id: GUILD,
                name: "home".to_string(),
            },
        )
        .await;

        let err = bot.take_fatal_error().unwrap();
        assert!(format!("{:#}", err).contains("voice join refused"));
        assert!(!bot.is_running().await);
    }

    #[tokio::test]
    async fn test_soundboard_events_refresh() {
        let platform = Arc::new(RecordingPlatform::with_custom(&["a"]));
        let bot = bot_with(config(), platform.clone(), Arc::new(RecordingVoice::default()));

        for kind in SOUNDBOARD_EVENTS {
            dispatch(
                &bot,
                PlatformEvent::GatewayDispatch {
                    kind: kind.to_string(),
                },
            )
            .await;
        }
        dispatch(
            &bot,
            PlatformEvent::GatewayDispatch {
                kind: "GUILD_AUDIT_LOG_ENTRY_CREATE".to_string(),
            },
        )
        .await;

        assert_eq!(platform.fetches.load(Ordering::SeqCst), SOUNDBOARD_EVENTS.len());
        assert_eq!(bot.pool().len(), 1);
    }

    #[tokio::test]
    async fn test_soundboard_event_picks_up_new_sound() {
        let platform = Arc::new(RecordingPlatform::with_custom(&["a"]));
        let bot = bot_with(config(), platform.clone(), Arc::new(RecordingVoice::default()));
        let created = || PlatformEvent::GatewayDispatch {
            kind: "GUILD_SOUNDBOARD_SOUND_CREATE".to_string(),
        };

        dispatch(&bot, created()).await;
        platform.custom.lock().push(crate::platform::Sound::new("b"));
        dispatch(&bot, created()).await;

        let mut ids = bot.pool().snapshot().to_vec();
        ids.sort();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_voice_speaking_respects_probability_and_self() {
        let always = Config {
            response_probability: 1.0,
            ..config()
        };
        let bot = bot_with(
            always,
            Arc::new(RecordingPlatform::default()),
            Arc::new(RecordingVoice::default()),
        );
        let mut rng = StdRng::seed_from_u64(1);

        let user = SpeakingUpdate {
            user_id: Some(1),
            speaking: true,
        };
        assert!(on_voice_speaking(&bot, user, &mut rng));

        let stopped = SpeakingUpdate {
            speaking: false,
            ..user
        };
        assert!(!on_voice_speaking(&bot, stopped, &mut rng));

        let own_voice = SpeakingUpdate {
            user_id: Some(BOT_USER),
            speaking: true,
        };
        assert!(!on_voice_speaking(&bot, own_voice, &mut rng));

        let never = bot_with(
            config(),
            Arc::new(RecordingPlatform::default()),
            Arc::new(RecordingVoice::default()),
        );
        assert!(!(0..100).any(|_| on_voice_speaking(&never, user, &mut rng)));
    }
}
