use anyhow::Result;
use serenity::http::Http;
use serenity::model::gateway::GatewayIntents;
use serenity::Client;
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info};

mod audio;
mod bot;
mod config;
mod error;
mod sources;
mod ui;
mod voice;

use crate::audio::{FfmpegStreamer, PlayerDeps, PlayerRegistry};
use crate::bot::{ChannelNotifier, NovaBot};
use crate::config::Config;
use crate::sources::Resolver;
use crate::voice::discord::SongbirdGateway;

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("nova_music=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando Nova Music Bot v{}", env!("CARGO_PKG_VERSION"));

    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check().await;
    }

    let config = Arc::new(Config::load()?);
    info!("{}", config.summary());

    // El notificador usa su propio cliente HTTP, independiente del gateway.
    let http = Arc::new(Http::new(&config.discord_token));
    let songbird = Songbird::serenity();

    let registry = PlayerRegistry::new(PlayerDeps {
        config: config.clone(),
        gateway: Arc::new(SongbirdGateway::new(songbird.clone())),
        streamer: Arc::new(FfmpegStreamer::new(config.clone())),
        notifier: Arc::new(ChannelNotifier::new(http)),
    });
    let resolver = Arc::new(Resolver::new(
        config.ytdlp_path.clone(),
        config.resolve_timeout,
    ));

    let handler = NovaBot::new(config.clone(), registry.clone(), resolver);

    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await?;

    // Apagado ordenado: primero los reproductores, después el gateway.
    let shard_manager = client.shard_manager.clone();
    let shutdown_registry = registry.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("⚠️ Señal de apagado recibida, cerrando...");
            shutdown_registry.shutdown_all();
            shard_manager.shutdown_all().await;
        }
    });

    info!("🚀 Bot iniciado");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar el cliente: {why:?}");
    }

    Ok(())
}

/// Comprueba que los binarios externos críticos están disponibles.
async fn health_check() -> Result<()> {
    let yt_dlp = tokio::process::Command::new("yt-dlp")
        .arg("--version")
        .output()
        .await?;

    let ffmpeg = tokio::process::Command::new("ffmpeg")
        .arg("-version")
        .output()
        .await?;

    if yt_dlp.status.success() && ffmpeg.status.success() {
        println!("OK");
        Ok(())
    } else {
        anyhow::bail!("Faltan dependencias externas (yt-dlp / ffmpeg)");
    }
}
