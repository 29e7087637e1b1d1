use async_trait::async_trait;
use serenity::model::id::GuildId;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
    audio::{
        autoplay::{self, AutoplaySettings},
        queue::{AutoplayMode, GuildPlayback, QueueSnapshot},
        store::GuildStore,
        voice::{TrackEndCallback, VoiceConnection, VoiceError},
    },
    sources::{CatalogError, MediaCatalog, Track},
};

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("no track is playing")]
    NotPlaying,

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Voice(#[from] VoiceError),
}

/// Resultado de un intento de iniciar la reproducción
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Started(Track),
    AlreadyPlaying,
    QueueEmpty,
}

/// Recibe los cambios de reproducción que no vienen de un comando
#[async_trait]
pub trait PlayerObserver: Send + Sync {
    async fn track_started(&self, guild_id: GuildId, track: &Track);

    async fn playback_ended(&self, guild_id: GuildId);
}

/// Motor de reproducción: cola, canción actual y autoplay por guild
pub struct PlayerEngine {
    store: Arc<GuildStore>,
    catalog: Arc<dyn MediaCatalog>,
    observer: Arc<dyn PlayerObserver>,
    settings: AutoplaySettings,
}

impl PlayerEngine {
    pub fn new(
        store: Arc<GuildStore>,
        catalog: Arc<dyn MediaCatalog>,
        observer: Arc<dyn PlayerObserver>,
        settings: AutoplaySettings,
    ) -> Self {
        Self {
            store,
            catalog,
            observer,
            settings,
        }
    }

    /// Agrega canciones al final de la cola sin iniciar la reproducción
    pub async fn enqueue(&self, guild_id: GuildId, tracks: Vec<Track>) -> usize {
        let state = self.store.playback(guild_id);
        let mut state = state.lock().await;
        state.enqueue(tracks)
    }

    /// Reproduce el primero de la cola si no hay nada sonando
    pub async fn start_queue_playback(
        self: &Arc<Self>,
        guild_id: GuildId,
        voice: Arc<dyn VoiceConnection>,
    ) -> Result<PlaybackOutcome, PlayerError> {
        let outcome = {
            let state = self.store.playback(guild_id);
            let mut state = state.lock().await;
            self.start_locked(guild_id, &mut state, &voice).await?
        };

        self.announce(guild_id, &outcome).await;
        Ok(outcome)
    }

    /// Avanza la cola cuando termina la canción de `generation`.
    ///
    /// Devuelve `None` si la canción ya había sido detenida o saltada.
    pub async fn on_track_finished(
        self: &Arc<Self>,
        guild_id: GuildId,
        voice: Arc<dyn VoiceConnection>,
        generation: u64,
    ) -> Result<Option<PlaybackOutcome>, PlayerError> {
        let finished = {
            let state = self.store.playback(guild_id);
            let mut state = state.lock().await;
            state.finish(generation)
        };

        let Some(track) = finished else {
            debug!("Fin de canción ignorado en guild {} (generación {})", guild_id, generation);
            return Ok(None);
        };

        debug!("🏁 Terminó {} en guild {}", track.title, guild_id);
        self.start_queue_playback(guild_id, voice).await.map(Some)
    }

    /// Detiene la canción actual y la devuelve al frente de la cola
    pub async fn stop(&self, guild_id: GuildId, voice: &dyn VoiceConnection) -> Result<Track, PlayerError> {
        let state = self.store.playback(guild_id);
        let mut state = state.lock().await;

        let track = state.take_current().ok_or(PlayerError::NotPlaying)?;
        state.requeue_front(track.clone());
        voice.stop().await;

        info!("⏹️ Reproducción detenida en guild {}: {}", guild_id, track.title);
        Ok(track)
    }

    /// Descarta la canción actual y pasa a la siguiente
    pub async fn skip(
        self: &Arc<Self>,
        guild_id: GuildId,
        voice: Arc<dyn VoiceConnection>,
    ) -> Result<(Track, PlaybackOutcome), PlayerError> {
        let (skipped, outcome) = {
            let state = self.store.playback(guild_id);
            let mut state = state.lock().await;

            let skipped = state.take_current().ok_or(PlayerError::NotPlaying)?;
            voice.stop().await;
            info!("⏭️ Saltada en guild {}: {}", guild_id, skipped.title);

            let outcome = self.start_locked(guild_id, &mut state, &voice).await?;
            (skipped, outcome)
        };

        self.announce(guild_id, &outcome).await;
        Ok((skipped, outcome))
    }

    /// Vacía la cola; la canción actual sigue sonando
    pub async fn clear_queue(&self, guild_id: GuildId) -> usize {
        let state = self.store.playback(guild_id);
        let removed = state.lock().await.clear_queue();
        info!("🗑️ Cola limpiada en guild {} ({} canciones)", guild_id, removed);
        removed
    }

    /// Olvida cola y canción actual, usado al salir del canal de voz
    pub async fn reset(&self, guild_id: GuildId) {
        let state = self.store.playback(guild_id);
        state.lock().await.reset();
        info!("🧹 Estado de reproducción reiniciado en guild {}", guild_id);
    }

    pub async fn snapshot(&self, guild_id: GuildId) -> QueueSnapshot {
        let state = self.store.playback(guild_id);
        let snapshot = state.lock().await.snapshot();
        snapshot
    }

    pub fn autoplay_mode(&self, guild_id: GuildId) -> AutoplayMode {
        self.store.properties(guild_id).autoplay_mode
    }

    pub fn set_autoplay_mode(&self, guild_id: GuildId, mode: AutoplayMode) {
        self.store.set_autoplay_mode(guild_id, mode);
        info!("🔁 Autoplay en guild {}: {}", guild_id, mode);
    }

    async fn start_locked(
        self: &Arc<Self>,
        guild_id: GuildId,
        state: &mut GuildPlayback,
        voice: &Arc<dyn VoiceConnection>,
    ) -> Result<PlaybackOutcome, PlayerError> {
        if state.current().is_some() || voice.is_playing().await {
            return Ok(PlaybackOutcome::AlreadyPlaying);
        }

        if state.is_queue_empty() {
            let mode = self.store.properties(guild_id).autoplay_mode;
            if mode.is_enabled() {
                let tracks =
                    autoplay::expand(self.catalog.as_ref(), mode, state.last_played(), self.settings).await?;
                state.enqueue(tracks);
            }
        }

        let Some(track) = state.dequeue() else {
            info!("📭 Cola vacía en guild {}", guild_id);
            return Ok(PlaybackOutcome::QueueEmpty);
        };

        let url = match self.catalog.stream_url(&track.id).await {
            Ok(url) => url,
            // Un fallo de conexión se reintenta; una canción que el servidor rechaza se descarta
            Err(e @ CatalogError::Unavailable(_)) => {
                state.requeue_front(track);
                return Err(e.into());
            }
            Err(e) => {
                warn!("🗑️ Canción descartada en guild {} ({}): {}", guild_id, track.id, e);
                return Err(e.into());
            }
        };

        let generation = state.begin(track.clone());
        let on_end = self.end_callback(guild_id, voice.clone(), generation);

        if let Err(e) = voice.play(url.as_str(), on_end).await {
            state.take_current();
            state.requeue_front(track);
            return Err(e.into());
        }

        info!("🎵 Reproduciendo en guild {}: {} - {}", guild_id, track.title, track.artist);
        Ok(PlaybackOutcome::Started(track))
    }

    fn end_callback(
        self: &Arc<Self>,
        guild_id: GuildId,
        voice: Arc<dyn VoiceConnection>,
        generation: u64,
    ) -> TrackEndCallback {
        let engine = Arc::clone(self);
        Box::new(move || {
            Box::pin(async move {
                engine.handle_track_end(guild_id, voice, generation).await;
            })
        })
    }

    async fn handle_track_end(self: Arc<Self>, guild_id: GuildId, voice: Arc<dyn VoiceConnection>, generation: u64) {
        match self.on_track_finished(guild_id, voice, generation).await {
            Ok(Some(PlaybackOutcome::QueueEmpty)) => self.observer.playback_ended(guild_id).await,
            Ok(_) => {}
            Err(e) => error!("Error al reproducir siguiente canción en guild {}: {:?}", guild_id, e),
        }
    }

    async fn announce(&self, guild_id: GuildId, outcome: &PlaybackOutcome) {
        if let PlaybackOutcome::Started(track) = outcome {
            self.observer.track_started(guild_id, track).await;
        }
    }
}
