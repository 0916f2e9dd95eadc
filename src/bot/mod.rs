//! # Bot Module
//!
//! Controller for the soundboard bot.
//!
//! This module contains:
//! - [`SoundboardBot`]: owns the pool, the catalog and the scheduler and
//!   exposes the lifecycle (join voice, start playback, close)
//! - [`Handler`]: serenity adapter that turns gateway events into
//!   [`events::PlatformEvent`]s
//! - [`events`]: the event router
//! - [`commands`]: text commands (`!refresh`)
//!
//! ## Architecture
//!
//! ```text
//! gateway ──> Handler ──> events::dispatch ──> SoundCatalog ──> SoundPool
//!                                                                  ^
//!                                     PlaybackScheduler ───────────┘
//!                                             │
//!                                             └──> SoundTrigger ──> REST
//! ```
//!
//! Event handlers run concurrently with the scheduler task; the only state
//! they share is the pool (swapped atomically), the catalog cache and the
//! session slot, each behind its own lock.

use anyhow::Result;
use parking_lot::{Mutex, RwLock};
use serenity::{
    async_trait,
    client::{Context, EventHandler, RawEventHandler},
    model::{channel::Message, event::Event, gateway::Ready, guild::Guild},
};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub mod commands;
pub mod events;

use crate::{
    config::Config,
    platform::{PlatformClient, VoiceGateway},
    playback::{PlaybackScheduler, SoundTrigger},
    sound::{CatalogFilter, SoundCatalog, SoundPool},
};
use events::PlatformEvent;

/// Soundboard bot state and lifecycle.
///
/// ## Thread Safety
///
/// - The session slot is a [`tokio::sync::Mutex`], held across the whole
///   join/refresh/spawn sequence so overlapping guild-ready events start a
///   single loop
/// - The pool and the catalog synchronize themselves
/// - The bot user id and the fatal error are small [`parking_lot`] cells
pub struct SoundboardBot {
    config: Arc<Config>,
    platform: Arc<dyn PlatformClient>,
    voice: Arc<dyn VoiceGateway>,
    catalog: Arc<SoundCatalog>,
    scheduler: Arc<PlaybackScheduler>,
    /// Running scheduler task, `None` until the first guild-ready event
    session: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    bot_user_id: RwLock<Option<u64>>,
    shutdown: CancellationToken,
    fatal: Mutex<Option<anyhow::Error>>,
}

impl SoundboardBot {
    /// Wires the pool, catalog, trigger and scheduler together.
    ///
    /// Nothing touches the network until a guild-ready event arrives.
    pub fn new(
        config: Config,
        platform: Arc<dyn PlatformClient>,
        voice: Arc<dyn VoiceGateway>,
        shutdown: CancellationToken,
    ) -> Self {
        let config = Arc::new(config);
        let settings = config.playback();
        let pool = Arc::new(SoundPool::new());

        let catalog = Arc::new(SoundCatalog::new(
            platform.clone(),
            pool.clone(),
            config.server_id,
            CatalogFilter {
                excluded: config.excluded_set(),
                use_default_sounds: config.use_default_sounds,
                skip_unavailable: config.skip_unavailable_sounds,
            },
        ));

        let trigger = Arc::new(SoundTrigger::new(
            platform.clone(),
            config.voice_channel_id,
            settings.clone(),
        ));
        let scheduler = Arc::new(PlaybackScheduler::new(
            settings,
            pool,
            trigger,
            shutdown.clone(),
        ));

        Self {
            config,
            platform,
            voice,
            catalog,
            scheduler,
            session: tokio::sync::Mutex::new(None),
            bot_user_id: RwLock::new(None),
            shutdown,
            fatal: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn platform(&self) -> &Arc<dyn PlatformClient> {
        &self.platform
    }

    #[cfg(test)]
    pub fn pool(&self) -> &Arc<SoundPool> {
        self.catalog.pool()
    }

    pub fn scheduler(&self) -> &Arc<PlaybackScheduler> {
        &self.scheduler
    }

    pub fn bot_user_id(&self) -> Option<u64> {
        *self.bot_user_id.read()
    }

    pub fn set_bot_user_id(&self, user_id: u64) {
        *self.bot_user_id.write() = Some(user_id);
    }

    /// Joins the configured voice channel with the configured mute/deaf flags.
    pub async fn join_voice(&self) -> Result<()> {
        self.voice
            .join(
                self.config.server_id,
                self.config.voice_channel_id,
                self.config.self_mute,
                self.config.self_deaf,
            )
            .await
    }

    /// Rebuilds the sound pool. Failures are logged and returned.
    pub async fn refresh_sounds(&self) -> Result<usize> {
        self.catalog.refresh().await.inspect_err(|e| {
            warn!("⚠️ Sound refresh failed, keeping the previous pool: {:#}", e);
        })
    }

    /// Joins voice, refreshes the catalog and starts the scheduler, once.
    ///
    /// Returns `Ok(false)` when a session is already running.
    pub async fn start_session(&self) -> Result<bool> {
        let mut session = self.session.lock().await;
        if session.is_some() {
            debug!("Playback session already running, ignoring");
            return Ok(false);
        }

        self.join_voice().await?;
        // An empty pool is fine: the loop skips cycles until a refresh works
        let _ = self.refresh_sounds().await;

        *session = Some(self.start_playback());
        Ok(true)
    }

    /// Spawns the scheduler loop on its own task.
    pub fn start_playback(&self) -> JoinHandle<()> {
        info!(
            "▶️ Starting playback. Target channel: {}",
            self.config.voice_channel_id
        );
        self.scheduler.clone().spawn()
    }

    #[cfg(test)]
    pub async fn is_running(&self) -> bool {
        self.session.lock().await.is_some()
    }

    /// Records an unrecoverable error and asks the process to stop.
    pub fn fail(&self, err: anyhow::Error) {
        error!("❌ Fatal error: {:#}", err);
        let mut fatal = self.fatal.lock();
        if fatal.is_none() {
            *fatal = Some(err);
        }
        drop(fatal);
        self.shutdown.cancel();
    }

    pub fn take_fatal_error(&self) -> Option<anyhow::Error> {
        self.fatal.lock().take()
    }

    /// Stops the scheduler, waits for it to exit and leaves voice.
    ///
    /// Shots already dispatched are not aborted.
    pub async fn close(&self) {
        info!("⚠️ Shutting down bot session...");
        self.shutdown.cancel();

        let session = self.session.lock().await.take();
        if let Some(handle) = session {
            if let Err(e) = handle.await {
                error!("Scheduler task ended abnormally: {:?}", e);
            }
            debug!("Scheduler finished in state {:?}", self.scheduler().state());

            if let Err(e) = self.voice.leave(self.config.server_id).await {
                warn!("⚠️ Error leaving voice channel: {:#}", e);
            }
        }
    }
}

/// Serenity event handler; forwards everything to [`events::dispatch`].
#[derive(Clone)]
pub struct Handler {
    bot: Arc<SoundboardBot>,
}

impl Handler {
    pub fn new(bot: Arc<SoundboardBot>) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        events::dispatch(
            &self.bot,
            PlatformEvent::Connected {
                user_id: ready.user.id.get(),
                name: ready.user.name.clone(),
            },
        )
        .await;
    }

    async fn guild_create(&self, _ctx: Context, guild: Guild, _is_new: Option<bool>) {
        events::dispatch(
            &self.bot,
            PlatformEvent::GuildReady {
                guild_id: guild.id.get(),
                name: guild.name,
            },
        )
        .await;
    }

    async fn message(&self, _ctx: Context, msg: Message) {
        events::dispatch(
            &self.bot,
            PlatformEvent::Message {
                channel_id: msg.channel_id.get(),
                author_id: msg.author.id.get(),
                content: msg.content,
            },
        )
        .await;
    }
}

#[async_trait]
impl RawEventHandler for Handler {
    /// Soundboard dispatches are not modelled by serenity and only show up here.
    async fn raw_event(&self, _ctx: Context, event: Event) {
        if let Event::Unknown(unknown) = event {
            events::dispatch(&self.bot, PlatformEvent::GatewayDispatch { kind: unknown.kind })
                .await;
        }
    }
}
