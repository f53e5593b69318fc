use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};

use super::{bridge::CompletionCallback, error::PlaybackError};
use crate::sources::PlayableAddress;

/// Abre conexiones de voz para una guild.
#[async_trait]
pub trait VoiceConnector: Send + Sync {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Box<dyn VoiceHandle>, PlaybackError>;
}

/// Conexión de voz activa. La sesión es su único dueño.
#[async_trait]
pub trait VoiceHandle: Send + Sync {
    fn channel_id(&self) -> ChannelId;

    /// Mueve la conexión a otro canal de la misma guild.
    async fn move_to(&mut self, channel_id: ChannelId) -> Result<(), PlaybackError>;

    /// Empieza a reproducir `address`.
    ///
    /// `on_complete` se dispara una sola vez cuando el stream termina o falla,
    /// posiblemente desde otro hilo.
    async fn start(
        &mut self,
        address: &PlayableAddress,
        on_complete: CompletionCallback,
    ) -> Result<Box<dyn StreamHandle>, PlaybackError>;

    async fn disconnect(&mut self);
}

/// Control sobre un stream en curso.
pub trait StreamHandle: Send + Sync {
    fn pause(&self) -> Result<(), PlaybackError>;
    fn resume(&self) -> Result<(), PlaybackError>;
    fn stop(&self);
}
