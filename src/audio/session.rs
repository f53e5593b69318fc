use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId};
use std::{ops::ControlFlow, sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc, oneshot},
    time::Instant,
};
use tracing::{debug, info};

use super::{
    bridge::{CompletionBridge, StreamEnd, StreamId},
    error::PlaybackError,
    events::{EventSink, NowPlayingDisplay},
    pipeline::VoiceConnector,
    player::{PlaybackController, PlayerState, Teardown},
    queue::{QueueSnapshot, SessionQueue},
};
use crate::sources::{Track, TrackResolver};

/// Identifica una instancia concreta de sesión, distinta de las que la
/// reemplacen después en la misma guild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionToken(pub u64);

/// Todo lo que entra al actor de una sesión pasa por aquí, en orden.
pub enum SessionMessage {
    Play {
        channel_id: ChannelId,
        tracks: Vec<Track>,
        reply: oneshot::Sender<Result<usize, PlaybackError>>,
    },
    Pause(oneshot::Sender<()>),
    Resume(oneshot::Sender<()>),
    Skip(oneshot::Sender<()>),
    Shuffle(oneshot::Sender<()>),
    Stop(oneshot::Sender<()>),
    Snapshot(oneshot::Sender<SessionSnapshot>),
    StreamEnded {
        stream: StreamId,
        end: StreamEnd,
    },
    /// El bot salió del canal `channel_id` sin que nadie lo pidiera.
    VoiceLost {
        channel_id: ChannelId,
    },
    Shutdown(oneshot::Sender<()>),
}

/// Foto del estado de una sesión para renderizar.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub state: PlayerState,
    pub now_playing: Option<Track>,
    pub display: Option<NowPlayingDisplay>,
    pub queue: Vec<Track>,
    pub voice_channel: Option<ChannelId>,
}

impl SessionSnapshot {
    pub fn queue_snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            now_playing: self.now_playing.clone(),
            items: self.queue.clone(),
        }
    }
}

/// Dependencias compartidas por todas las sesiones.
#[derive(Clone)]
pub struct SessionDeps {
    pub resolver: TrackResolver,
    pub connector: Arc<dyn VoiceConnector>,
    pub events: Arc<dyn EventSink>,
    pub idle_timeout: Duration,
    pub max_queue_size: usize,
}

/// Extremo para hablarle al actor de una sesión.
#[derive(Clone)]
pub struct SessionHandle {
    guild_id: GuildId,
    token: SessionToken,
    tx: mpsc::UnboundedSender<SessionMessage>,
}

impl SessionHandle {
    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn token(&self) -> SessionToken {
        self.token
    }

    #[cfg(test)]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub async fn play(&self, channel_id: ChannelId, tracks: Vec<Track>) -> Result<usize, PlaybackError> {
        self.request(|reply| SessionMessage::Play {
            channel_id,
            tracks,
            reply,
        })
        .await?
    }

    pub async fn pause(&self) -> Result<(), PlaybackError> {
        self.request(SessionMessage::Pause).await
    }

    pub async fn resume(&self) -> Result<(), PlaybackError> {
        self.request(SessionMessage::Resume).await
    }

    pub async fn skip(&self) -> Result<(), PlaybackError> {
        self.request(SessionMessage::Skip).await
    }

    pub async fn shuffle(&self) -> Result<(), PlaybackError> {
        self.request(SessionMessage::Shuffle).await
    }

    pub async fn stop(&self) -> Result<(), PlaybackError> {
        self.request(SessionMessage::Stop).await
    }

    pub async fn shutdown(&self) -> Result<(), PlaybackError> {
        self.request(SessionMessage::Shutdown).await
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, PlaybackError> {
        self.request(SessionMessage::Snapshot).await
    }

    pub fn voice_lost(&self, channel_id: ChannelId) {
        if self.tx.send(SessionMessage::VoiceLost { channel_id }).is_err() {
            debug!("Sesión de guild {} ya cerrada", self.guild_id);
        }
    }

    async fn request<T>(
        &self,
        message: impl FnOnce(oneshot::Sender<T>) -> SessionMessage,
    ) -> Result<T, PlaybackError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(message(reply))
            .map_err(|_| PlaybackError::SessionClosed)?;
        response.await.map_err(|_| PlaybackError::SessionClosed)
    }
}

/// Arranca el actor de una sesión nueva y devuelve su handle.
///
/// `sessions` es el registro donde vive el handle; el actor se borra de él
/// al terminar, solo si la entrada sigue siendo la suya.
pub fn spawn(
    guild_id: GuildId,
    token: SessionToken,
    deps: &SessionDeps,
    sessions: Arc<DashMap<GuildId, SessionHandle>>,
) -> SessionHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let controller = PlaybackController::new(
        guild_id,
        deps.resolver.clone(),
        deps.connector.clone(),
        deps.events.clone(),
        CompletionBridge::new(&tx),
    );

    let actor = SessionActor {
        guild_id,
        token,
        queue: SessionQueue::new(deps.max_queue_size),
        controller,
        rx,
        idle_timeout: deps.idle_timeout,
        sessions,
    };
    tokio::spawn(actor.run());

    info!("🆕 Sesión creada para guild {}", guild_id);
    SessionHandle { guild_id, token, tx }
}

struct SessionActor {
    guild_id: GuildId,
    token: SessionToken,
    queue: SessionQueue,
    controller: PlaybackController,
    rx: mpsc::UnboundedReceiver<SessionMessage>,
    idle_timeout: Duration,
    sessions: Arc<DashMap<GuildId, SessionHandle>>,
}

impl SessionActor {
    async fn run(mut self) {
        let mut deadline = Instant::now() + self.idle_timeout;

        loop {
            let idle = self.controller.now_playing().is_none();

            tokio::select! {
                biased;

                message = self.rx.recv() => {
                    let Some(message) = message else { break };
                    deadline = Instant::now() + self.idle_timeout;
                    if self.handle(message).await.is_break() {
                        break;
                    }
                }
                _ = tokio::time::sleep_until(deadline), if idle => {
                    info!("⏰ Sesión inactiva en guild {}", self.guild_id);
                    let reason = if self.controller.voice_channel().is_some() || !self.queue.is_empty() {
                        Teardown::IdleTimeout
                    } else {
                        Teardown::Quiet
                    };
                    self.controller.teardown(&mut self.queue, reason).await;
                    break;
                }
            }
        }

        self.retire();

        // Lo que quedó en el canal se descarta: al soltar los `oneshot` quien
        // esperaba recibe `SessionClosed` y reintenta con una sesión nueva.
        let mut dropped = 0;
        while self.rx.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            debug!("🗑️ {} mensajes descartados al cerrar guild {}", dropped, self.guild_id);
        }
        info!("👋 Sesión de guild {} terminada", self.guild_id);
    }

    async fn handle(&mut self, message: SessionMessage) -> ControlFlow<()> {
        match message {
            SessionMessage::Play {
                channel_id,
                tracks,
                reply,
            } => {
                let result = self
                    .controller
                    .request_play(&mut self.queue, channel_id, tracks)
                    .await;
                let _ = reply.send(result);
            }
            SessionMessage::Pause(reply) => {
                self.controller.pause();
                let _ = reply.send(());
            }
            SessionMessage::Resume(reply) => {
                self.controller.resume();
                let _ = reply.send(());
            }
            SessionMessage::Skip(reply) => {
                self.controller.skip(&mut self.queue).await;
                let _ = reply.send(());
            }
            SessionMessage::Shuffle(reply) => {
                self.controller.shuffle(&mut self.queue);
                let _ = reply.send(());
            }
            SessionMessage::Stop(reply) => {
                self.controller.teardown(&mut self.queue, Teardown::Stop).await;
                self.retire();
                let _ = reply.send(());
                return ControlFlow::Break(());
            }
            SessionMessage::Shutdown(reply) => {
                self.controller.teardown(&mut self.queue, Teardown::Quiet).await;
                self.retire();
                let _ = reply.send(());
                return ControlFlow::Break(());
            }
            SessionMessage::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
            SessionMessage::StreamEnded { stream, end } => {
                if let Err(e) = self.controller.on_stream_end(&mut self.queue, stream, end).await {
                    debug!("👻 Fin de stream {:?} ignorado en guild {}: {}", stream, self.guild_id, e);
                }
            }
            SessionMessage::VoiceLost { channel_id } => {
                if self.controller.voice_channel() != Some(channel_id) {
                    debug!("Desconexión de {} no corresponde a la sesión actual", channel_id);
                    return ControlFlow::Continue(());
                }
                self.controller.teardown(&mut self.queue, Teardown::VoiceLost).await;
                return ControlFlow::Break(());
            }
        }

        ControlFlow::Continue(())
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.controller.state(),
            now_playing: self.controller.now_playing().cloned(),
            display: self.controller.display().cloned(),
            queue: self.queue.peek_all(),
            voice_channel: self.controller.voice_channel(),
        }
    }

    /// Sale del registro y deja de aceptar mensajes nuevos.
    fn retire(&mut self) {
        let token = self.token;
        self.sessions
            .remove_if(&self.guild_id, |_, handle| handle.token == token);
        self.rx.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{events::PlaybackEvent, testing::*};
    use std::sync::atomic::Ordering;

    const IDLE: Duration = Duration::from_secs(60);

    #[tokio::test(start_paused = true)]
    async fn exhausted_session_is_removed_after_idle_window() {
        let h = harness(empty_provider(), IDLE);
        h.registry.play(GUILD, VOICE, vec![track("a")]).await.unwrap();
        h.audio.current().fire(StreamEnd::Finished);
        assert_eq!(
            h.registry.snapshot(GUILD).await.map(|s| s.state),
            Some(PlayerState::Idle)
        );

        tokio::time::sleep(IDLE + Duration::from_secs(1)).await;

        assert!(!h.registry.exists(GUILD));
        // La voz ya se había soltado al terminar la cola
        assert_eq!(h.audio.disconnects.load(Ordering::SeqCst), 1);
        assert_eq!(h.sink.count(|e| *e == PlaybackEvent::IdleTimeout), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn playing_or_paused_session_never_idles() {
        let h = harness(empty_provider(), IDLE);
        h.registry.play(GUILD, VOICE, vec![track("a")]).await.unwrap();

        tokio::time::sleep(IDLE * 5).await;
        assert!(h.registry.exists(GUILD));

        h.registry.pause(GUILD).await;
        tokio::time::sleep(IDLE * 5).await;
        assert_eq!(
            h.registry.snapshot(GUILD).await.map(|s| s.state),
            Some(PlayerState::Paused)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn activity_pushes_the_idle_deadline_back() {
        let h = harness(empty_provider(), IDLE);
        h.registry.play(GUILD, VOICE, vec![track("a")]).await.unwrap();
        h.audio.current().fire(StreamEnd::Finished);

        tokio::time::sleep(Duration::from_secs(40)).await;
        assert!(h.registry.snapshot(GUILD).await.is_some());

        tokio::time::sleep(Duration::from_secs(40)).await;
        assert!(h.registry.exists(GUILD));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(!h.registry.exists(GUILD));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_queue_after_connection_failure_times_out() {
        let h = harness(empty_provider(), IDLE);
        h.audio.fail_connections(true);

        let result = h.registry.play(GUILD, VOICE, vec![track("a"), track("b")]).await;
        assert!(result.is_err());
        assert!(h.registry.exists(GUILD));

        tokio::time::sleep(IDLE + Duration::from_secs(1)).await;

        assert!(!h.registry.exists(GUILD));
        assert_eq!(h.sink.count(|e| *e == PlaybackEvent::IdleTimeout), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn play_after_idle_teardown_starts_a_new_session() {
        let h = harness(empty_provider(), IDLE);
        h.registry.play(GUILD, VOICE, vec![track("a")]).await.unwrap();
        h.audio.current().fire(StreamEnd::Finished);
        tokio::time::sleep(IDLE * 2).await;
        assert!(!h.registry.exists(GUILD));

        let added = h.registry.play(GUILD, VOICE, vec![track("b")]).await;
        assert_eq!(added, Ok(1));
        assert_eq!(
            h.registry
                .snapshot(GUILD)
                .await
                .and_then(|s| s.now_playing)
                .map(|t| t.title().to_string()),
            Some("b".to_string())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn handle_kept_past_idle_expiry_reports_closed() {
        let h = harness(empty_provider(), IDLE);
        h.registry.play(GUILD, VOICE, vec![track("a")]).await.unwrap();
        h.audio.current().fire(StreamEnd::Finished);
        let stale = h.registry.get(GUILD).unwrap();

        tokio::time::sleep(IDLE * 2).await;

        assert!(stale.is_closed());
        assert_eq!(
            stale.play(VOICE, vec![track("b")]).await,
            Err(PlaybackError::SessionClosed)
        );
        // El registro no reutiliza el handle viejo
        assert_eq!(h.registry.play(GUILD, VOICE, vec![track("b")]).await, Ok(1));
        assert_ne!(h.registry.get(GUILD).map(|s| s.token()), Some(stale.token()));
    }
}
