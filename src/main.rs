use anyhow::{Context, Result};
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

mod bot;
mod config;
mod platform;
mod playback;
mod sound;
#[cfg(test)]
mod testing;

use crate::bot::events::{self, PlatformEvent};
use crate::bot::{Handler, SoundboardBot};
use crate::config::Config;
use crate::platform::{DiscordRest, SongbirdVoice};

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("soundboard_chaos=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🔊 Iniciando Soundboard Chaos v{}", env!("CARGO_PKG_VERSION"));

    // Cargar configuración
    let config = Config::load()?;
    info!("{}", config.summary());

    // Validar configuración y salir
    if std::env::args().any(|arg| arg == "--check-config") {
        println!("OK");
        return Ok(());
    }

    let shutdown = CancellationToken::new();

    let platform = Arc::new(DiscordRest::new(
        &config.bot_token,
        &config.api_base_url,
        Duration::from_secs(config.request_timeout_seconds),
    )?);

    let songbird = Songbird::serenity();
    let (speaking_tx, mut speaking_rx) = mpsc::unbounded_channel();
    let voice = Arc::new(SongbirdVoice::new(songbird.clone(), speaking_tx));

    let token = config.bot_token.clone();
    let bot = Arc::new(SoundboardBot::new(config, platform, voice, shutdown.clone()));
    let handler = Handler::new(bot.clone());

    // Intents mínimos: canal de voz, eventos del servidor y contenido de mensajes
    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let mut client = Client::builder(&token, intents)
        .event_handler(handler.clone())
        .raw_event_handler(handler)
        .register_songbird_with(songbird)
        .await
        .context("Could not create Discord client")?;

    // Eventos de voz (songbird) hacia el router
    {
        let bot = bot.clone();
        tokio::spawn(async move {
            while let Some(update) = speaking_rx.recv().await {
                events::dispatch(&bot, PlatformEvent::VoiceSpeaking(update)).await;
            }
        });
    }

    // Manejar shutdown graceful
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("⚠️ Señal de shutdown recibida, cerrando...");
                    shutdown.cancel();
                }
                Err(e) => error!("Error al registrar Ctrl+C: {:?}", e),
            }
        });
    }

    let shard_manager = client.shard_manager.clone();

    // Iniciar bot
    info!("🚀 Bot iniciado exitosamente");
    let session = tokio::select! {
        result = client.start() => result.context("Discord session ended"),
        _ = shutdown.cancelled() => Ok(()),
    };

    bot.close().await;
    shard_manager.shutdown_all().await;

    if let Some(err) = bot.take_fatal_error() {
        return Err(err);
    }
    session?;

    info!("👋 Bot detenido");
    Ok(())
}
