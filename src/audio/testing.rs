//! Fakes del pipeline de audio y de las notificaciones para los tests del núcleo.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tokio::sync::Notify;

use super::{
    bridge::CompletionCallback,
    error::PlaybackError,
    events::{EventSink, PlaybackEvent},
    pipeline::{StreamHandle, VoiceConnector, VoiceHandle},
    registry::SessionRegistry,
    session::SessionDeps,
};
use crate::{
    cache::ResolveCache,
    sources::{Lookup, MetadataProvider, MockMetadataProvider, PlayableAddress, Track, TrackResolver},
};

pub const GUILD: GuildId = GuildId::new(42);
pub const VOICE: ChannelId = ChannelId::new(100);
pub const OTHER_VOICE: ChannelId = ChannelId::new(200);
pub const USER: UserId = UserId::new(7);

/// Estado compartido entre el conector falso y sus conexiones.
#[derive(Default)]
pub struct FakeAudio {
    pub connects: AtomicUsize,
    pub disconnects: AtomicUsize,
    pub stops: AtomicUsize,
    pub moves: Mutex<Vec<ChannelId>>,
    started: Mutex<Vec<(String, CompletionCallback)>>,
    fail_connect: AtomicBool,
    failing_urls: Mutex<Vec<String>>,
    /// "connect"/"disconnect" en el orden en que terminaron.
    pub log: Mutex<Vec<&'static str>>,
    disconnect_gate: Mutex<Option<Arc<Notify>>>,
}

impl FakeAudio {
    pub fn fail_connections(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub fn fail_stream(&self, url: &str) {
        self.failing_urls.lock().push(url.to_string());
    }

    /// Las desconexiones quedan colgadas hasta que se notifique el `Notify`.
    pub fn hold_disconnects(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.disconnect_gate.lock() = Some(gate.clone());
        gate
    }

    pub fn started_urls(&self) -> Vec<String> {
        self.started.lock().iter().map(|(url, _)| url.clone()).collect()
    }

    pub fn callback(&self, index: usize) -> CompletionCallback {
        self.started.lock()[index].1.clone()
    }

    /// Callback del último stream iniciado.
    pub fn current(&self) -> CompletionCallback {
        let started = self.started.lock();
        started.last().map(|(_, cb)| cb.clone()).expect("ningún stream iniciado")
    }
}

pub struct FakeConnector(pub Arc<FakeAudio>);

#[async_trait]
impl VoiceConnector for FakeConnector {
    async fn connect(
        &self,
        _guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Box<dyn VoiceHandle>, PlaybackError> {
        self.0.connects.fetch_add(1, Ordering::SeqCst);
        // Cede el turno para que otros pedidos lleguen mientras "conecta"
        tokio::task::yield_now().await;

        if self.0.fail_connect.load(Ordering::SeqCst) {
            return Err(PlaybackError::Connection("canal lleno".to_string()));
        }
        self.0.log.lock().push("connect");
        Ok(Box::new(FakeVoice {
            audio: self.0.clone(),
            channel_id,
        }))
    }
}

struct FakeVoice {
    audio: Arc<FakeAudio>,
    channel_id: ChannelId,
}

#[async_trait]
impl VoiceHandle for FakeVoice {
    fn channel_id(&self) -> ChannelId {
        self.channel_id
    }

    async fn move_to(&mut self, channel_id: ChannelId) -> Result<(), PlaybackError> {
        self.audio.moves.lock().push(channel_id);
        self.channel_id = channel_id;
        Ok(())
    }

    async fn start(
        &mut self,
        address: &PlayableAddress,
        on_complete: CompletionCallback,
    ) -> Result<Box<dyn StreamHandle>, PlaybackError> {
        if self.audio.failing_urls.lock().contains(&address.url) {
            return Err(PlaybackError::Pipeline("decoder roto".to_string()));
        }
        self.audio.started.lock().push((address.url.clone(), on_complete));
        Ok(Box::new(FakeStream {
            audio: self.audio.clone(),
        }))
    }

    async fn disconnect(&mut self) {
        self.audio.disconnects.fetch_add(1, Ordering::SeqCst);
        let gate = self.audio.disconnect_gate.lock().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.audio.log.lock().push("disconnect");
    }
}

struct FakeStream {
    audio: Arc<FakeAudio>,
}

impl StreamHandle for FakeStream {
    fn pause(&self) -> Result<(), PlaybackError> {
        Ok(())
    }

    fn resume(&self) -> Result<(), PlaybackError> {
        Ok(())
    }

    fn stop(&self) {
        self.audio.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Guarda todas las notificaciones emitidas.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<(GuildId, PlaybackEvent)>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<PlaybackEvent> {
        self.events.lock().iter().map(|(_, event)| event.clone()).collect()
    }

    pub fn count(&self, matches: impl Fn(&PlaybackEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|(_, event)| matches(event)).count()
    }

    pub fn now_playing_titles(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|(_, event)| match event {
                PlaybackEvent::NowPlaying(display) => Some(display.title.clone()),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, guild_id: GuildId, event: PlaybackEvent) {
        self.events.lock().push((guild_id, event));
    }
}

pub struct Harness {
    pub registry: SessionRegistry,
    pub audio: Arc<FakeAudio>,
    pub sink: Arc<RecordingSink>,
}

/// Proveedor que nunca responde.
pub struct HangingProvider;

#[async_trait]
impl MetadataProvider for HangingProvider {
    async fn lookup(&self, _query: &str) -> anyhow::Result<Option<Lookup>> {
        std::future::pending().await
    }

    fn source_name(&self) -> &'static str {
        "colgado"
    }
}

/// Proveedor que no encuentra nada.
pub fn empty_provider() -> MockMetadataProvider {
    let mut provider = MockMetadataProvider::new();
    provider.expect_source_name().return_const("mock");
    provider.expect_lookup().returning(|_| Ok(None));
    provider
}

pub fn harness(provider: impl MetadataProvider + 'static, idle_timeout: Duration) -> Harness {
    let audio = Arc::new(FakeAudio::default());
    let sink = Arc::new(RecordingSink::default());
    let resolver = TrackResolver::new(
        Arc::new(provider),
        ResolveCache::new(16, Duration::from_secs(60)),
    );

    let registry = SessionRegistry::new(SessionDeps {
        resolver,
        connector: Arc::new(FakeConnector(audio.clone())),
        events: sink.clone(),
        idle_timeout,
        max_queue_size: 100,
    });

    Harness {
        registry,
        audio,
        sink,
    }
}

pub fn track(title: &str) -> Track {
    Track::resolved(title, url(title), USER)
}

pub fn url(title: &str) -> String {
    format!("https://cdn.example.com/{}.webm", title)
}
