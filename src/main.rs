use anyhow::Result;
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

mod audio;
mod bot;
mod cache;
mod config;
mod sources;
mod ui;

use crate::audio::{songbird_backend::SongbirdConnector, SessionDeps, SessionRegistry};
use crate::bot::{DiscordNotifier, MusicBot};
use crate::cache::ResolveCache;
use crate::config::Config;
use crate::sources::{SourceManager, SpotifyClient, TrackResolver, YtDlpClient};

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mokey_music=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando Mokey Music v{}", env!("CARGO_PKG_VERSION"));

    // Manejar health check si es necesario
    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check().await;
    }

    // Cargar configuración
    let config = Arc::new(Config::load()?);
    info!("{}", config.summary());

    // Fuentes y resolución bajo demanda
    let ytdlp = Arc::new(YtDlpClient::new());
    let spotify = match (&config.spotify_client_id, &config.spotify_client_secret) {
        (Some(id), Some(secret)) => {
            info!("🟢 Spotify habilitado");
            Some(SpotifyClient::new(id.clone(), secret.clone())?)
        }
        _ => None,
    };
    let sources = Arc::new(SourceManager::new(ytdlp.clone(), spotify, config.max_playlist_size));

    let resolve_cache = ResolveCache::new(config.cache_size, config.resolve_cache_ttl);
    let resolver = TrackResolver::new(ytdlp, resolve_cache.clone());

    // Sesiones por guild
    let songbird = Songbird::serenity();
    let (notifier, notifier_worker) = DiscordNotifier::new();
    let notifier = Arc::new(notifier);

    let registry = Arc::new(SessionRegistry::new(SessionDeps {
        resolver,
        connector: Arc::new(SongbirdConnector::new(songbird.clone(), config.default_volume)),
        events: notifier.clone(),
        idle_timeout: config.idle_timeout,
        max_queue_size: config.max_queue_size,
    }));

    // Solo se necesitan guilds y estados de voz
    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;

    let shutdown = CancellationToken::new();
    let handler = MusicBot::new(
        config.clone(),
        registry.clone(),
        sources,
        notifier,
        resolve_cache,
        shutdown.clone(),
    );

    // Construir cliente
    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await?;

    tokio::spawn(notifier_worker.run(client.http.clone()));

    // Manejar shutdown graceful
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Error al registrar Ctrl+C");
        info!("⚠️ Señal de shutdown recibida, cerrando...");

        shutdown.cancel();
        registry.shutdown_all().await;
        shard_manager.shutdown_all().await;
    });

    // Iniciar bot
    info!("🚀 Bot iniciado exitosamente");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar cliente: {:?}", why);
    }

    Ok(())
}

async fn health_check() -> Result<()> {
    // Verificar dependencias críticas
    let yt_dlp = async_process::Command::new("yt-dlp")
        .arg("--version")
        .output()
        .await?;

    let ffmpeg = async_process::Command::new("ffmpeg")
        .arg("-version")
        .output()
        .await?;

    if yt_dlp.status.success() && ffmpeg.status.success() {
        println!("OK");
        Ok(())
    } else {
        anyhow::bail!("Dependencias faltantes");
    }
}
