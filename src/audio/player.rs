use serenity::model::id::{ChannelId, GuildId};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::{
    bridge::{CompletionBridge, StreamEnd, StreamId},
    error::PlaybackError,
    events::{EventSink, NowPlayingDisplay, PlaybackEvent},
    pipeline::{StreamHandle, VoiceConnector, VoiceHandle},
    queue::SessionQueue,
};
use crate::sources::{PlayableAddress, Track, TrackResolver};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Idle,
    Connecting,
    Playing,
    Paused,
    Disconnected,
}

/// Por qué se cierra una sesión.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Teardown {
    Stop,
    IdleTimeout,
    VoiceLost,
    /// Sin aviso: apagado del bot o sesión que ya no tenía nada.
    Quiet,
}

struct ActiveStream {
    id: StreamId,
    handle: Box<dyn StreamHandle>,
}

/// Máquina de estados de reproducción de una guild.
///
/// Vive dentro del actor de la sesión: todos los métodos reciben `&mut self`
/// y la cola por separado, nunca se llaman en paralelo.
pub struct PlaybackController {
    guild_id: GuildId,
    state: PlayerState,
    now_playing: Option<Track>,
    display: Option<NowPlayingDisplay>,
    voice: Option<Box<dyn VoiceHandle>>,
    active: Option<ActiveStream>,
    next_stream: u64,
    resolver: TrackResolver,
    connector: Arc<dyn VoiceConnector>,
    events: Arc<dyn EventSink>,
    bridge: CompletionBridge,
}

impl PlaybackController {
    pub fn new(
        guild_id: GuildId,
        resolver: TrackResolver,
        connector: Arc<dyn VoiceConnector>,
        events: Arc<dyn EventSink>,
        bridge: CompletionBridge,
    ) -> Self {
        Self {
            guild_id,
            state: PlayerState::Idle,
            now_playing: None,
            display: None,
            voice: None,
            active: None,
            next_stream: 0,
            resolver,
            connector,
            events,
            bridge,
        }
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn now_playing(&self) -> Option<&Track> {
        self.now_playing.as_ref()
    }

    pub fn display(&self) -> Option<&NowPlayingDisplay> {
        self.display.as_ref()
    }

    pub fn voice_channel(&self) -> Option<ChannelId> {
        self.voice.as_ref().map(|voice| voice.channel_id())
    }

    /// Encola y, si no hay nada sonando, conecta y arranca la reproducción.
    ///
    /// Devuelve cuántas entradas se encolaron. Si la conexión de voz falla
    /// las entradas quedan en cola y el error vuelve al llamador.
    pub async fn request_play(
        &mut self,
        queue: &mut SessionQueue,
        channel_id: ChannelId,
        tracks: Vec<Track>,
    ) -> Result<usize, PlaybackError> {
        let added = queue.enqueue(tracks);

        match self.state {
            PlayerState::Playing | PlayerState::Paused | PlayerState::Connecting => {
                self.follow_requester(channel_id).await;
            }
            PlayerState::Idle | PlayerState::Disconnected => {
                self.connect(channel_id).await?;
                self.advance(queue).await;
            }
        }

        Ok(added)
    }

    async fn connect(&mut self, channel_id: ChannelId) -> Result<(), PlaybackError> {
        self.state = PlayerState::Connecting;
        info!("🔊 Conectando al canal de voz {} en guild {}", channel_id, self.guild_id);

        match self.connector.connect(self.guild_id, channel_id).await {
            Ok(voice) => {
                self.voice = Some(voice);
                Ok(())
            }
            Err(e) => {
                error!("❌ No se pudo conectar en guild {}: {}", self.guild_id, e);
                self.state = PlayerState::Idle;
                Err(e)
            }
        }
    }

    /// El bot sigue al canal de quien pidió la canción.
    async fn follow_requester(&mut self, channel_id: ChannelId) {
        let Some(voice) = self.voice.as_mut() else {
            return;
        };
        if voice.channel_id() == channel_id {
            return;
        }

        info!("🔀 Moviendo al canal de voz {}", channel_id);
        if let Err(e) = voice.move_to(channel_id).await {
            warn!("⚠️ No se pudo cambiar de canal: {}", e);
        }
    }

    /// Saca entradas de la cola hasta que una arranque o la cola se acabe.
    ///
    /// Cada entrada se intenta como mucho una vez, así que el recorrido está
    /// acotado por el largo de la cola al entrar.
    async fn advance(&mut self, queue: &mut SessionQueue) {
        self.now_playing = None;
        self.display = None;

        for _ in 0..queue.len() {
            let Some(track) = queue.pop_front() else {
                break;
            };

            let address = match self.resolver.resolve(&track).await {
                Ok(address) => address,
                Err(e) => {
                    warn!("⚠️ Saltando '{}': {}", track.title(), e);
                    self.emit(PlaybackEvent::Skipped {
                        title: track.title().to_string(),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            match self.start_stream(&address).await {
                Ok(()) => {
                    info!("🎵 Reproduciendo: {}", track.display_name());
                    let display = NowPlayingDisplay::new(&track, address.thumbnail, queue.len());
                    self.now_playing = Some(track);
                    self.display = Some(display.clone());
                    self.state = PlayerState::Playing;
                    self.emit(PlaybackEvent::NowPlaying(display));
                    return;
                }
                Err(e) => {
                    warn!("⚠️ El stream de '{}' no arrancó: {}", track.title(), e);
                    self.emit(PlaybackEvent::Skipped {
                        title: track.title().to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!("📭 Cola terminada en guild {}", self.guild_id);
        self.release_voice().await;
        self.state = PlayerState::Idle;
        self.emit(PlaybackEvent::QueueExhausted);
    }

    async fn start_stream(&mut self, address: &PlayableAddress) -> Result<(), PlaybackError> {
        let voice = self
            .voice
            .as_mut()
            .ok_or_else(|| PlaybackError::Pipeline("sin conexión de voz".to_string()))?;

        self.next_stream += 1;
        let id = StreamId(self.next_stream);
        let handle = voice.start(address, self.bridge.callback(id)).await?;
        self.active = Some(ActiveStream { id, handle });
        Ok(())
    }

    /// Aviso de fin de stream. Los avisos de streams viejos se rechazan con
    /// [`PlaybackError::StaleSession`] sin tocar el estado.
    pub async fn on_stream_end(
        &mut self,
        queue: &mut SessionQueue,
        stream: StreamId,
        end: StreamEnd,
    ) -> Result<(), PlaybackError> {
        if self.active.as_ref().map(|active| active.id) != Some(stream) {
            return Err(PlaybackError::StaleSession);
        }
        self.active = None;

        if let StreamEnd::Failed(reason) = end {
            let title = self
                .now_playing
                .as_ref()
                .map(|track| track.title().to_string())
                .unwrap_or_default();
            warn!("❌ Falló el stream de '{}': {}", title, reason);
            self.emit(PlaybackEvent::TrackFailed { title, reason });
        }

        self.advance(queue).await;
        Ok(())
    }

    pub fn pause(&mut self) {
        let paused = match (self.state, self.active.as_ref()) {
            (PlayerState::Playing, Some(active)) => active.handle.pause(),
            _ => Err(PlaybackError::Pipeline("nada sonando".to_string())),
        };

        match paused {
            Ok(()) => {
                self.state = PlayerState::Paused;
                info!("⏸️ Reproducción pausada");
                self.emit(PlaybackEvent::Paused);
            }
            Err(e) => {
                debug!("No se pudo pausar: {}", e);
                self.emit(PlaybackEvent::NothingPlaying);
            }
        }
    }

    pub fn resume(&mut self) {
        let resumed = match (self.state, self.active.as_ref()) {
            (PlayerState::Paused, Some(active)) => active.handle.resume(),
            _ => Err(PlaybackError::Pipeline("nada en pausa".to_string())),
        };

        match resumed {
            Ok(()) => {
                self.state = PlayerState::Playing;
                info!("▶️ Reproducción reanudada");
                self.emit(PlaybackEvent::Resumed);
            }
            Err(e) => {
                debug!("No se pudo reanudar: {}", e);
                self.emit(PlaybackEvent::NothingPaused);
            }
        }
    }

    /// Corta lo que suena y pasa a la siguiente entrada.
    pub async fn skip(&mut self, queue: &mut SessionQueue) {
        let Some(current) = self.now_playing.take() else {
            self.emit(PlaybackEvent::NothingPlaying);
            return;
        };

        if let Some(active) = self.active.take() {
            active.handle.stop();
        }
        info!("⏭️ Saltando: {}", current.title());
        self.emit(PlaybackEvent::SkippedByUser {
            title: current.title().to_string(),
        });

        self.advance(queue).await;
    }

    pub fn shuffle(&mut self, queue: &mut SessionQueue) {
        if queue.is_empty() {
            self.emit(PlaybackEvent::NothingToShuffle);
            return;
        }
        queue.shuffle();
        self.emit(PlaybackEvent::Shuffled { count: queue.len() });
    }

    /// Detiene todo, limpia la cola y suelta la conexión de voz.
    pub async fn teardown(&mut self, queue: &mut SessionQueue, reason: Teardown) {
        if let Some(active) = self.active.take() {
            active.handle.stop();
        }
        queue.clear();
        self.now_playing = None;
        self.display = None;
        self.release_voice().await;
        self.state = PlayerState::Disconnected;

        let event = match reason {
            Teardown::Stop => PlaybackEvent::Stopped,
            Teardown::IdleTimeout => PlaybackEvent::IdleTimeout,
            Teardown::VoiceLost => PlaybackEvent::VoiceLost,
            Teardown::Quiet => return,
        };
        info!("⏹️ Sesión cerrada en guild {} ({:?})", self.guild_id, reason);
        self.emit(event);
    }

    async fn release_voice(&mut self) {
        if let Some(mut voice) = self.voice.take() {
            voice.disconnect().await;
        }
    }

    fn emit(&self, event: PlaybackEvent) {
        self.events.emit(self.guild_id, event);
    }
}
