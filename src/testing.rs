//! Dobles de prueba compartidos por los tests de cada módulo

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use std::collections::VecDeque;
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};
use url::Url;

use crate::{
    audio::{
        autoplay::AutoplaySettings,
        player::{PlayerEngine, PlayerObserver},
        store::GuildStore,
        voice::{TrackEndCallback, VoiceConnection, VoiceError},
    },
    bot::music::VoiceGateway,
    sources::{MediaCatalog, MockMediaCatalog, Track},
    ui::messages::{DeliveryError, InteractionResponder, MessageTarget, Notice},
};

pub fn track(id: &str) -> Track {
    Track {
        id: id.to_string(),
        title: format!("Title {id}"),
        artist: "Artist".to_string(),
        album: "Album".to_string(),
        duration: 120,
        cover_id: String::new(),
    }
}

pub fn tracks(ids: &[&str]) -> Vec<Track> {
    ids.iter().map(|id| track(id)).collect()
}

pub fn stream_url_for(id: &str) -> String {
    format!("https://music.test/rest/stream.view?id={id}")
}

/// Catálogo que resuelve cualquier stream y no tiene carátulas
pub fn catalog_with_streams() -> MockMediaCatalog {
    let mut catalog = MockMediaCatalog::new();
    catalog
        .expect_stream_url()
        .returning(|id| Ok(Url::parse(&stream_url_for(id)).unwrap()));
    catalog.expect_cover_art().returning(|_| Ok(None));
    catalog
}

pub fn engine_with(catalog: MockMediaCatalog, observer: Arc<dyn PlayerObserver>) -> Arc<PlayerEngine> {
    engine_for(Arc::new(catalog), observer)
}

pub fn engine_for(catalog: Arc<dyn MediaCatalog>, observer: Arc<dyn PlayerObserver>) -> Arc<PlayerEngine> {
    Arc::new(PlayerEngine::new(
        Arc::new(GuildStore::new()),
        catalog,
        observer,
        AutoplaySettings::default(),
    ))
}

/// Conexión de voz en memoria; los fines de canción se disparan a mano
#[derive(Default)]
pub struct FakeVoice {
    played: Mutex<Vec<String>>,
    callbacks: Mutex<Vec<TrackEndCallback>>,
    playing: AtomicBool,
    stops: AtomicUsize,
    ends_on_stop: AtomicBool,
}

impl FakeVoice {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn played(&self) -> Vec<String> {
        self.played.lock().clone()
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// Termina la canción más reciente
    pub async fn finish_latest(&self) {
        let callback = self.callbacks.lock().pop();
        self.playing.store(false, Ordering::SeqCst);
        if let Some(callback) = callback {
            callback().await;
        }
    }

    /// Dispara todos los fines pendientes, incluidos los de canciones detenidas
    pub async fn fire_all(&self) {
        let callbacks: Vec<_> = self.callbacks.lock().drain(..).collect();
        for callback in callbacks {
            callback().await;
        }
    }

    pub fn take_callback(&self, index: usize) -> TrackEndCallback {
        self.callbacks.lock().remove(index)
    }

    /// Al detenerse, dispara los fines pendientes como hace songbird
    pub fn end_tracks_on_stop(&self) {
        self.ends_on_stop.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl VoiceConnection for FakeVoice {
    async fn play(&self, url: &str, on_end: TrackEndCallback) -> Result<(), VoiceError> {
        self.played.lock().push(url.to_string());
        self.callbacks.lock().push(on_end);
        self.playing.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) {
        self.playing.store(false, Ordering::SeqCst);
        self.stops.fetch_add(1, Ordering::SeqCst);

        if self.ends_on_stop.load(Ordering::SeqCst) {
            // En tareas aparte: el motor puede tener tomado el lock del guild
            let callbacks: Vec<_> = self.callbacks.lock().drain(..).collect();
            for callback in callbacks {
                tokio::spawn(callback());
            }
        }
    }

    async fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }
}

/// Gateway de voz con una única conexión falsa
pub struct FakeGateway {
    voice: Arc<FakeVoice>,
    connected: AtomicBool,
    refuse: AtomicBool,
    members: AtomicUsize,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self {
            voice: FakeVoice::new(),
            connected: AtomicBool::new(false),
            refuse: AtomicBool::new(false),
            members: AtomicUsize::new(1),
            connects: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
        }
    }

    pub fn voice(&self) -> Arc<FakeVoice> {
        self.voice.clone()
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn refuse_connections(&self) {
        self.refuse.store(true, Ordering::SeqCst);
    }

    pub fn set_members(&self, members: usize) {
        self.members.store(members, Ordering::SeqCst);
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnect_count(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VoiceGateway for FakeGateway {
    async fn connection(&self, _guild_id: GuildId) -> Option<Arc<dyn VoiceConnection>> {
        if self.is_connected() {
            Some(self.voice.clone())
        } else {
            None
        }
    }

    async fn connect(&self, _guild_id: GuildId, _channel_id: ChannelId) -> Result<Arc<dyn VoiceConnection>, VoiceError> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(VoiceError::Join("missing permissions".to_string()));
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.set_connected(true);
        Ok(self.voice.clone())
    }

    async fn has_connection(&self, _guild_id: GuildId) -> bool {
        self.is_connected()
    }

    async fn disconnect(&self, _guild_id: GuildId) {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        self.set_connected(false);
        self.voice.stop().await;
        tokio::task::yield_now().await;
    }

    async fn members_in_bot_channel(&self, _guild_id: GuildId) -> Option<usize> {
        self.is_connected().then(|| self.members.load(Ordering::SeqCst))
    }
}

/// Observador que anota cada evento como texto
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }
}

#[async_trait]
impl PlayerObserver for RecordingObserver {
    async fn track_started(&self, _guild_id: GuildId, track: &Track) {
        self.events.lock().push(format!("started:{}", track.id));
    }

    async fn playback_ended(&self, _guild_id: GuildId) {
        self.events.lock().push("ended".to_string());
    }
}

/// Destino de mensajes que falla según un guion y guarda lo entregado
#[derive(Default)]
pub struct RecordingTarget {
    failures: Mutex<VecDeque<DeliveryError>>,
    delivered: Mutex<Vec<Notice>>,
    attempts: AtomicUsize,
}

impl RecordingTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_with(failures: Vec<DeliveryError>) -> Self {
        Self {
            failures: Mutex::new(failures.into()),
            ..Self::default()
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn delivered(&self) -> Vec<Notice> {
        self.delivered.lock().clone()
    }
}

#[async_trait]
impl MessageTarget for RecordingTarget {
    async fn deliver(&self, notice: &Notice) -> Result<(), DeliveryError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.failures.lock().pop_front() {
            return Err(error);
        }
        self.delivered.lock().push(notice.clone());
        Ok(())
    }
}

/// Respuestas a interacciones anotadas en orden; los clones comparten el registro
#[derive(Clone, Default)]
pub struct RecordingResponder {
    calls: Arc<Mutex<Vec<String>>>,
}

impl RecordingResponder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn record(&self, call: &str) {
        self.calls.lock().push(call.to_string());
    }
}

#[async_trait]
impl InteractionResponder for RecordingResponder {
    async fn respond(&self, _notice: &Notice) -> Result<(), DeliveryError> {
        self.record("respond");
        Ok(())
    }

    async fn defer(&self) -> Result<(), DeliveryError> {
        self.record("defer");
        Ok(())
    }

    async fn edit_original(&self, _notice: &Notice) -> Result<(), DeliveryError> {
        self.record("edit");
        Ok(())
    }

    async fn delete_original(&self) -> Result<(), DeliveryError> {
        self.record("delete");
        Ok(())
    }

    async fn followup(&self, notice: &Notice) -> Result<(), DeliveryError> {
        self.record(if notice.ephemeral { "followup:ephemeral" } else { "followup" });
        Ok(())
    }
}
