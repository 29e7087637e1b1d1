use async_trait::async_trait;
use futures::future::BoxFuture;
use parking_lot::Mutex as SyncMutex;
use songbird::{
    input::HttpRequest,
    tracks::{PlayMode, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, TrackEvent,
};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Acción a ejecutar cuando termina (o falla) la canción que se está reproduciendo
pub type TrackEndCallback = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send + 'static>;

#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("could not join voice channel: {0}")]
    Join(String),

    #[error("voice playback failed: {0}")]
    Playback(String),
}

/// Capacidades del canal de voz que usa el reproductor
#[async_trait]
pub trait VoiceConnection: Send + Sync {
    /// Empieza a reproducir `url`; `on_end` se ejecuta una sola vez al terminar
    async fn play(&self, url: &str, on_end: TrackEndCallback) -> Result<(), VoiceError>;

    async fn stop(&self);

    async fn is_playing(&self) -> bool;
}

/// Conexión de voz respaldada por una llamada de songbird
pub struct SongbirdConnection {
    call: Arc<Mutex<Call>>,
    http: reqwest::Client,
    current: SyncMutex<Option<TrackHandle>>,
}

impl SongbirdConnection {
    pub fn new(call: Arc<Mutex<Call>>, http: reqwest::Client) -> Self {
        Self {
            call,
            http,
            current: SyncMutex::new(None),
        }
    }

    pub fn call(&self) -> Arc<Mutex<Call>> {
        self.call.clone()
    }
}

#[async_trait]
impl VoiceConnection for SongbirdConnection {
    async fn play(&self, url: &str, on_end: TrackEndCallback) -> Result<(), VoiceError> {
        let input = HttpRequest::new(self.http.clone(), url.to_string());

        let track_handle = {
            let mut call = self.call.lock().await;
            call.play_input(input.into())
        };

        // End y Error comparten el mismo callback; solo el primero lo ejecuta
        let notifier = TrackEndNotifier {
            callback: Arc::new(SyncMutex::new(Some(on_end))),
        };

        track_handle
            .add_event(Event::Track(TrackEvent::End), notifier.clone())
            .map_err(|e| VoiceError::Playback(e.to_string()))?;
        track_handle
            .add_event(Event::Track(TrackEvent::Error), notifier)
            .map_err(|e| VoiceError::Playback(e.to_string()))?;

        *self.current.lock() = Some(track_handle);
        Ok(())
    }

    async fn stop(&self) {
        if let Some(track) = self.current.lock().take() {
            if let Err(e) = track.stop() {
                debug!("La canción ya había terminado: {:?}", e);
            }
        }
        self.call.lock().await.stop();
    }

    async fn is_playing(&self) -> bool {
        let track = self.current.lock().clone();
        match track {
            Some(track) => match track.get_info().await {
                Ok(info) => info.playing == PlayMode::Play,
                Err(_) => false,
            },
            None => false,
        }
    }
}

/// Handler de songbird que ejecuta el callback de fin de canción
#[derive(Clone)]
struct TrackEndNotifier {
    callback: Arc<SyncMutex<Option<TrackEndCallback>>>,
}

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::Track(track_list) = ctx {
            for (state, _handle) in *track_list {
                if let PlayMode::Errored(e) = &state.playing {
                    warn!("❌ Error en la canción: {:?}", e);
                }
            }
        }

        let callback = self.callback.lock().take();
        if let Some(callback) = callback {
            callback().await;
        }

        None
    }
}
