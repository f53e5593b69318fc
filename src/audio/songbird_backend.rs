use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    input::{HttpRequest, Input},
    tracks::{PlayMode, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{
    bridge::{CompletionCallback, StreamEnd},
    error::PlaybackError,
    pipeline::{StreamHandle, VoiceConnector, VoiceHandle},
};
use crate::sources::PlayableAddress;

/// Conexiones de voz reales a través de Songbird.
pub struct SongbirdConnector {
    manager: Arc<Songbird>,
    http: reqwest::Client,
    volume: f32,
}

impl SongbirdConnector {
    pub fn new(manager: Arc<Songbird>, volume: f32) -> Self {
        Self {
            manager,
            http: reqwest::Client::new(),
            volume: volume.clamp(0.0, 2.0),
        }
    }
}

#[async_trait]
impl VoiceConnector for SongbirdConnector {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Box<dyn VoiceHandle>, PlaybackError> {
        let call = match self.manager.join(guild_id, channel_id).await {
            Ok(call) => call,
            Err(e) => {
                // Songbird deja la llamada registrada aunque el join falle
                let _ = self.manager.remove(guild_id).await;
                return Err(PlaybackError::Connection(e.to_string()));
            }
        };

        info!("🔊 Conectado al canal de voz {} en guild {}", channel_id, guild_id);
        Ok(Box::new(SongbirdVoice {
            manager: self.manager.clone(),
            guild_id,
            channel_id,
            call,
            http: self.http.clone(),
            volume: self.volume,
        }))
    }
}

struct SongbirdVoice {
    manager: Arc<Songbird>,
    guild_id: GuildId,
    channel_id: ChannelId,
    call: Arc<Mutex<Call>>,
    http: reqwest::Client,
    volume: f32,
}

#[async_trait]
impl VoiceHandle for SongbirdVoice {
    fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    async fn move_to(&mut self, channel_id: ChannelId) -> Result<(), PlaybackError> {
        self.call = self
            .manager
            .join(self.guild_id, channel_id)
            .await
            .map_err(|e| PlaybackError::Connection(e.to_string()))?;
        self.channel_id = channel_id;
        Ok(())
    }

    async fn start(
        &mut self,
        address: &PlayableAddress,
        on_complete: CompletionCallback,
    ) -> Result<Box<dyn StreamHandle>, PlaybackError> {
        let input: Input = HttpRequest::new(self.http.clone(), address.url.clone()).into();

        let track_handle = {
            let mut call = self.call.lock().await;
            call.play_input(input)
        };

        if let Err(e) = track_handle.set_volume(self.volume) {
            warn!("⚠️ No se pudo ajustar el volumen: {}", e);
        }

        for event in [TrackEvent::End, TrackEvent::Error] {
            let registered = track_handle.add_event(
                Event::Track(event),
                StreamEndNotifier {
                    callback: on_complete.clone(),
                },
            );
            if let Err(e) = registered {
                let _ = track_handle.stop();
                return Err(PlaybackError::Pipeline(format!(
                    "Error al agregar event handler: {}",
                    e
                )));
            }
        }

        debug!("▶️ Stream {:?} iniciado en guild {}", on_complete.stream(), self.guild_id);
        Ok(Box::new(SongbirdStream {
            handle: track_handle,
        }))
    }

    async fn disconnect(&mut self) {
        if let Err(e) = self.manager.remove(self.guild_id).await {
            warn!("⚠️ Error al salir del canal de voz en guild {}: {}", self.guild_id, e);
        } else {
            info!("👋 Desconectado del canal de voz en guild {}", self.guild_id);
        }
    }
}

struct SongbirdStream {
    handle: TrackHandle,
}

impl StreamHandle for SongbirdStream {
    fn pause(&self) -> Result<(), PlaybackError> {
        self.handle
            .pause()
            .map_err(|e| PlaybackError::Pipeline(e.to_string()))
    }

    fn resume(&self) -> Result<(), PlaybackError> {
        self.handle
            .play()
            .map_err(|e| PlaybackError::Pipeline(e.to_string()))
    }

    fn stop(&self) {
        if let Err(e) = self.handle.stop() {
            debug!("Stream ya detenido: {}", e);
        }
    }
}

/// Handler para cuando termina o falla un stream
struct StreamEndNotifier {
    callback: CompletionCallback,
}

#[async_trait]
impl VoiceEventHandler for StreamEndNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let end = match ctx {
            EventContext::Track(tracks) => tracks
                .iter()
                .find_map(|(state, _)| match &state.playing {
                    PlayMode::Errored(e) => Some(StreamEnd::Failed(format!("{:?}", e))),
                    _ => None,
                })
                .unwrap_or(StreamEnd::Finished),
            _ => StreamEnd::Finished,
        };

        self.callback.fire(end);
        None
    }
}
