//! # Bot Module
//!
//! Discord front end for Mokey Music.
//!
//! This module turns gateway events into calls on the session registry:
//! - Slash command registration and dispatch
//! - Button interactions on the now-playing display
//! - Voice state updates (the bot being kicked from its channel)
//! - Guild allow-list enforcement
//! - Background maintenance of the resolution cache
//!
//! ## Architecture
//!
//! [`MusicBot`] implements Serenity's [`EventHandler`]. It owns no playback
//! state itself: every guild's queue and voice connection lives in its
//! session inside [`SessionRegistry`], and user-facing notifications leave
//! through [`DiscordNotifier`].

use serenity::{
    all::{Context, EventHandler, Guild, GuildId, Interaction, Ready, UnavailableGuild, VoiceState},
    async_trait,
};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub mod commands;
pub mod events;
pub mod handlers;

use crate::{audio::SessionRegistry, cache::ResolveCache, config::Config, sources::SourceManager};
pub use events::{DiscordNotifier, NotifierWorker};

/// Main Discord event handler.
///
/// All fields are shared handles; the registry and notifier are also held
/// by `main` so it can shut sessions down on exit.
pub struct MusicBot {
    /// Configuration loaded from environment variables
    config: Arc<Config>,
    /// Per-guild playback sessions
    pub registry: Arc<SessionRegistry>,
    /// Expands user input (links, playlists, searches) into tracks
    pub sources: Arc<SourceManager>,
    /// Routes session events to each guild's text channel
    pub notifier: Arc<DiscordNotifier>,
    /// Resolution cache shared with the track resolver
    resolve_cache: ResolveCache,
    /// Cancels background tasks on shutdown
    shutdown: CancellationToken,
    maintenance_started: AtomicBool,
}

impl MusicBot {
    pub fn new(
        config: Arc<Config>,
        registry: Arc<SessionRegistry>,
        sources: Arc<SourceManager>,
        notifier: Arc<DiscordNotifier>,
        resolve_cache: ResolveCache,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            config,
            registry,
            sources,
            notifier,
            resolve_cache,
            shutdown,
            maintenance_started: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Registers slash commands with Discord.
    ///
    /// With `GUILD_ID` set commands are registered only in that guild, which
    /// propagates almost instantly; otherwise they are registered globally.
    async fn register_commands(&self, ctx: &Context) -> anyhow::Result<()> {
        info!("📝 Registrando comandos slash...");
        info!("🔧 Application ID: {}", self.config.application_id);

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);
                info!("🏠 Registrando comandos para guild específica: {}", guild_id);

                if !ctx.cache.guilds().contains(&guild_id) {
                    warn!("⚠️ El bot no está en la guild especificada: {}", guild_id);
                    return Ok(());
                }

                commands::register_guild_commands(ctx, guild_id).await.map_err(|e| {
                    error!("❌ Error registrando comandos de guild: {:?}", e);
                    anyhow::anyhow!("No se pudieron registrar comandos de guild. Verifica que el bot tenga permisos de 'applications.commands' en la guild.")
                })?;
                info!("✅ Comandos de guild registrados para: {}", guild_id);
            }
            None => {
                info!("🌐 Registrando comandos globalmente");
                commands::register_global_commands(ctx).await.map_err(|e| {
                    error!("❌ Error registrando comandos globales: {:?}", e);
                    anyhow::anyhow!("No se pudieron registrar comandos globales. Verifica que el bot tenga permisos de 'applications.commands'.")
                })?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }

    /// Sale de la guild si no está en la allow-list. `true` si salió.
    async fn enforce_allow_list(&self, ctx: &Context, guild_id: GuildId) -> bool {
        if self.config.is_guild_allowed(guild_id) {
            return false;
        }

        warn!("🚫 Guild {} fuera de la allow-list, saliendo", guild_id);
        if let Err(e) = guild_id.leave(&ctx.http).await {
            error!("❌ No se pudo salir de la guild {}: {:?}", guild_id, e);
        }
        true
    }
}

#[async_trait]
impl EventHandler for MusicBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        for guild in &ready.guilds {
            self.enforce_allow_list(&ctx, guild.id).await;
        }

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }

        // `ready` se repite en cada reconexión
        if !self.maintenance_started.swap(true, Ordering::SeqCst) {
            let cache = self.resolve_cache.clone();
            let interval = self.config.resolve_cache_ttl;
            let shutdown = self.shutdown.clone();

            tokio::spawn(async move {
                maintenance_tasks(cache, interval, shutdown).await;
            });
        }
    }

    async fn guild_create(&self, ctx: Context, guild: Guild, is_new: Option<bool>) {
        if is_new == Some(true) {
            info!("➕ Agregado a la guild {} ({})", guild.name, guild.id);
        }
        self.enforce_allow_list(&ctx, guild.id).await;
    }

    async fn guild_delete(&self, _ctx: Context, incomplete: UnavailableGuild, _full: Option<Guild>) {
        // Una guild no disponible por caída de Discord vuelve sola
        if incomplete.unavailable {
            return;
        }

        info!("➖ Fuera de la guild {}", incomplete.id);
        self.registry.remove(incomplete.id).await;
        self.notifier.forget(incomplete.id);
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        match interaction {
            Interaction::Command(command_interaction) => {
                if let Err(e) = handlers::handle_command(&ctx, command_interaction, self).await {
                    error!("Error manejando comando: {:?}", e);
                }
            }
            Interaction::Component(component_interaction) => {
                if let Err(e) = handlers::handle_component(&ctx, component_interaction, self).await {
                    error!("Error manejando componente: {:?}", e);
                }
            }
            _ => {}
        }
    }

    /// Detecta cuando el bot es desconectado del canal de voz desde fuera.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        if new.user_id != ctx.cache.current_user().id || new.channel_id.is_some() {
            return;
        }

        let (Some(guild_id), Some(channel_id)) = (new.guild_id, old.and_then(|state| state.channel_id)) else {
            return;
        };

        info!("🔌 Bot desconectado del canal {} en guild {}", channel_id, guild_id);
        self.registry.voice_lost(guild_id, channel_id);
    }
}

/// Limpieza periódica del cache de resoluciones hasta que se cancele.
async fn maintenance_tasks(cache: ResolveCache, every: Duration, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval(every.max(Duration::from_secs(60)));

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("🧹 Tareas de mantenimiento detenidas");
                return;
            }
            _ = interval.tick() => {
                cache.cleanup_old_entries();
                debug!("🧹 Tareas de mantenimiento completadas ({} resoluciones en cache)", cache.len());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::PlayableAddress;

    #[tokio::test(start_paused = true)]
    async fn maintenance_purges_expired_resolutions_until_cancelled() {
        let cache = ResolveCache::new(8, Duration::from_secs(600));
        cache.insert("fresh".to_string(), PlayableAddress::new("https://cdn.example.com/a.webm"));
        cache.insert_with_ttl(
            "stale".to_string(),
            PlayableAddress::new("https://cdn.example.com/b.webm"),
            Duration::ZERO,
        );
        let shutdown = CancellationToken::new();

        let task = tokio::spawn(maintenance_tasks(cache.clone(), Duration::from_secs(60), shutdown.clone()));

        // El primer tick del intervalo es inmediato
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&"fresh".to_string()).is_some());

        shutdown.cancel();
        task.await.unwrap();
    }
}
