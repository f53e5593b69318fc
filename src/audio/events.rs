use serenity::model::id::{GuildId, UserId};
use std::time::Duration;

use crate::sources::Track;

/// Lo que se muestra como "sonando ahora".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NowPlayingDisplay {
    pub title: String,
    pub author: String,
    pub thumbnail: Option<String>,
    pub duration: Option<Duration>,
    pub requested_by: UserId,
    /// Canciones que quedan en cola detrás de esta.
    pub up_next: usize,
}

impl NowPlayingDisplay {
    pub fn new(track: &Track, thumbnail: Option<String>, up_next: usize) -> Self {
        Self {
            title: track.title().to_string(),
            author: track.author().to_string(),
            thumbnail: thumbnail.or_else(|| track.thumbnail().map(str::to_string)),
            duration: track.duration(),
            requested_by: track.requested_by(),
            up_next,
        }
    }
}

/// Notificaciones que una sesión emite hacia los usuarios.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    NowPlaying(NowPlayingDisplay),
    /// La entrada no se pudo resolver o no arrancó; se pasó a la siguiente.
    Skipped { title: String, reason: String },
    /// El stream falló a mitad de la canción.
    TrackFailed { title: String, reason: String },
    SkippedByUser { title: String },
    QueueExhausted,
    Paused,
    Resumed,
    NothingPlaying,
    NothingPaused,
    Shuffled { count: usize },
    NothingToShuffle,
    Stopped,
    NotConnected,
    IdleTimeout,
    VoiceLost,
}

impl PlaybackEvent {
    /// Texto para el canal de la guild.
    pub fn message(&self) -> String {
        match self {
            PlaybackEvent::NowPlaying(display) => {
                format!("🎵 Reproduciendo: **{}** - {}", display.title, display.author)
            }
            PlaybackEvent::Skipped { title, reason } => {
                format!("⚠️ No se pudo reproducir **{}** ({}), saltando...", title, reason)
            }
            PlaybackEvent::TrackFailed { title, reason } => {
                format!("❌ Falló la reproducción de **{}**: {}", title, reason)
            }
            PlaybackEvent::SkippedByUser { title } => format!("⏭️ Saltado: **{}**", title),
            PlaybackEvent::QueueExhausted => "✅ No quedan canciones en la cola".to_string(),
            PlaybackEvent::Paused => "⏸️ Pausado".to_string(),
            PlaybackEvent::Resumed => "▶️ Reanudado".to_string(),
            PlaybackEvent::NothingPlaying => "❌ No hay nada reproduciéndose".to_string(),
            PlaybackEvent::NothingPaused => "❌ No hay nada en pausa".to_string(),
            PlaybackEvent::Shuffled { count } => format!("🔀 Cola mezclada ({} canciones)", count),
            PlaybackEvent::NothingToShuffle => "❌ La cola está vacía".to_string(),
            PlaybackEvent::Stopped => "⏹️ Reproducción detenida y cola limpiada".to_string(),
            PlaybackEvent::NotConnected => "❌ No estoy conectado a un canal de voz".to_string(),
            PlaybackEvent::IdleTimeout => "👋 Desconectado por inactividad".to_string(),
            PlaybackEvent::VoiceLost => "🔌 Me desconectaron del canal de voz".to_string(),
        }
    }

    /// Eventos que retiran el display de "sonando ahora".
    pub fn ends_display(&self) -> bool {
        matches!(
            self,
            PlaybackEvent::QueueExhausted
                | PlaybackEvent::Stopped
                | PlaybackEvent::IdleTimeout
                | PlaybackEvent::VoiceLost
        )
    }
}

/// Destino de las notificaciones de todas las sesiones.
///
/// `emit` se llama desde el actor de la sesión y no debe bloquear.
pub trait EventSink: Send + Sync {
    fn emit(&self, guild_id: GuildId, event: PlaybackEvent);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_prefers_resolved_thumbnail() {
        let track = Track::deferred("Song", "song audio", UserId::new(2))
            .with_author("Band")
            .with_thumbnail("https://img.example.com/track.jpg");

        let display = NowPlayingDisplay::new(&track, Some("https://img.example.com/resolved.jpg".into()), 3);
        assert_eq!(display.thumbnail.as_deref(), Some("https://img.example.com/resolved.jpg"));
        assert_eq!(display.up_next, 3);

        let fallback = NowPlayingDisplay::new(&track, None, 0);
        assert_eq!(fallback.thumbnail.as_deref(), Some("https://img.example.com/track.jpg"));
        assert!(PlaybackEvent::NowPlaying(fallback).message().contains("Song"));
    }

    #[test]
    fn terminal_events_end_the_display() {
        assert!(PlaybackEvent::Stopped.ends_display());
        assert!(PlaybackEvent::IdleTimeout.ends_display());
        assert!(!PlaybackEvent::Paused.ends_display());
    }
}
