use dashmap::DashMap;
use futures::future::join_all;
use serenity::model::id::{ChannelId, GuildId};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tracing::{info, warn};

use super::{
    error::PlaybackError,
    events::{NowPlayingDisplay, PlaybackEvent},
    queue::{QueueEntry, QueueSnapshot},
    session::{self, SessionDeps, SessionHandle, SessionSnapshot, SessionToken},
};
use crate::sources::Track;

/// Intentos de `play` cuando la sesión encontrada se cierra en el camino.
const PLAY_ATTEMPTS: usize = 3;

/// Punto de entrada del núcleo: una sesión por guild, creada bajo demanda.
pub struct SessionRegistry {
    sessions: Arc<DashMap<GuildId, SessionHandle>>,
    deps: SessionDeps,
    next_token: AtomicU64,
}

impl SessionRegistry {
    pub fn new(deps: SessionDeps) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            deps,
            next_token: AtomicU64::new(1),
        }
    }

    /// Devuelve la sesión de la guild, creándola si no existe.
    ///
    /// La creación ocurre bajo el lock de la entrada del mapa, así que dos
    /// llamadas simultáneas obtienen la misma sesión.
    pub fn get_or_create(&self, guild_id: GuildId) -> SessionHandle {
        self.sessions
            .entry(guild_id)
            .or_insert_with(|| {
                let token = SessionToken(self.next_token.fetch_add(1, Ordering::Relaxed));
                session::spawn(guild_id, token, &self.deps, self.sessions.clone())
            })
            .clone()
    }

    pub fn get(&self, guild_id: GuildId) -> Option<SessionHandle> {
        self.sessions.get(&guild_id).map(|entry| entry.clone())
    }

    pub fn exists(&self, guild_id: GuildId) -> bool {
        self.sessions.contains_key(&guild_id)
    }

    #[cfg(test)]
    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Apaga la sesión sin notificar y la saca del registro.
    ///
    /// La entrada sigue en el mapa mientras la sesión se apaga: un `play`
    /// que llegue en ese momento recibe `SessionClosed` y reintenta con una
    /// sesión nueva, que ya no comparte la conexión de voz con la vieja.
    pub async fn remove(&self, guild_id: GuildId) -> bool {
        let Some(handle) = self.get(guild_id) else {
            return false;
        };
        if let Err(e) = handle.shutdown().await {
            warn!("⚠️ La sesión de guild {} ya estaba cerrada: {}", guild_id, e);
        }
        self.forget(&handle);
        true
    }

    /// Encola `tracks` en la sesión de la guild y arranca la reproducción si
    /// estaba detenida. Devuelve cuántos entraron a la cola.
    pub async fn play(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        tracks: Vec<Track>,
    ) -> Result<usize, PlaybackError> {
        let mut last_error = PlaybackError::SessionClosed;

        for attempt in 1..=PLAY_ATTEMPTS {
            let handle = self.get_or_create(guild_id);
            match handle.play(channel_id, tracks.clone()).await {
                Err(e) if e.is_retryable() => {
                    warn!(
                        "🔁 Sesión de guild {} cerrada durante play (intento {}/{})",
                        guild_id, attempt, PLAY_ATTEMPTS
                    );
                    self.forget(&handle);
                    last_error = e;
                }
                result => return result,
            }
        }

        Err(last_error)
    }

    pub async fn pause(&self, guild_id: GuildId) {
        if !self.control(guild_id, |handle| async move { handle.pause().await }).await {
            self.emit(guild_id, PlaybackEvent::NothingPlaying);
        }
    }

    pub async fn resume(&self, guild_id: GuildId) {
        if !self.control(guild_id, |handle| async move { handle.resume().await }).await {
            self.emit(guild_id, PlaybackEvent::NothingPaused);
        }
    }

    pub async fn skip(&self, guild_id: GuildId) {
        if !self.control(guild_id, |handle| async move { handle.skip().await }).await {
            self.emit(guild_id, PlaybackEvent::NothingPlaying);
        }
    }

    pub async fn shuffle(&self, guild_id: GuildId) {
        if !self.control(guild_id, |handle| async move { handle.shuffle().await }).await {
            self.emit(guild_id, PlaybackEvent::NothingToShuffle);
        }
    }

    pub async fn stop(&self, guild_id: GuildId) {
        if !self.control(guild_id, |handle| async move { handle.stop().await }).await {
            self.emit(guild_id, PlaybackEvent::NotConnected);
        }
    }

    /// Entradas en cola (sin lo que suena), en orden de reproducción.
    pub async fn list_queue(&self, guild_id: GuildId) -> Vec<QueueEntry> {
        self.queue_snapshot(guild_id).await.entries()
    }

    pub async fn queue_snapshot(&self, guild_id: GuildId) -> QueueSnapshot {
        self.snapshot(guild_id)
            .await
            .map(|snapshot| snapshot.queue_snapshot())
            .unwrap_or_default()
    }

    pub async fn now_playing(&self, guild_id: GuildId) -> Option<NowPlayingDisplay> {
        self.snapshot(guild_id).await.and_then(|snapshot| snapshot.display)
    }

    pub async fn snapshot(&self, guild_id: GuildId) -> Option<SessionSnapshot> {
        let handle = self.get(guild_id)?;
        handle.snapshot().await.ok()
    }

    /// El bot dejó el canal `channel_id` por causas externas.
    pub fn voice_lost(&self, guild_id: GuildId, channel_id: ChannelId) {
        if let Some(handle) = self.get(guild_id) {
            handle.voice_lost(channel_id);
        }
    }

    /// Apaga todas las sesiones; se usa al cerrar el bot.
    pub async fn shutdown_all(&self) {
        let handles: Vec<SessionHandle> = self.sessions.iter().map(|entry| entry.clone()).collect();
        if handles.is_empty() {
            return;
        }

        info!("🛑 Cerrando {} sesiones activas", handles.len());
        join_all(handles.iter().map(|handle| handle.shutdown())).await;
        self.sessions.clear();
    }

    /// Manda un comando a la sesión existente. `false` si no había sesión
    /// (o se cerró antes de procesarlo); nunca crea una.
    async fn control<F, Fut>(&self, guild_id: GuildId, command: F) -> bool
    where
        F: FnOnce(SessionHandle) -> Fut,
        Fut: std::future::Future<Output = Result<(), PlaybackError>>,
    {
        let Some(handle) = self.get(guild_id) else {
            return false;
        };

        match command(handle.clone()).await {
            Ok(()) => true,
            Err(_) => {
                self.forget(&handle);
                false
            }
        }
    }

    /// Quita del mapa un handle cerrado, solo si sigue siendo el registrado.
    fn forget(&self, handle: &SessionHandle) {
        let token = handle.token();
        self.sessions
            .remove_if(&handle.guild_id(), |_, current| current.token() == token);
    }

    fn emit(&self, guild_id: GuildId, event: PlaybackEvent) {
        self.deps.events.emit(guild_id, event);
    }
}
