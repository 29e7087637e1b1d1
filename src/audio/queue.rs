use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::sources::Track;

/// Política para rellenar la cola cuando se vacía
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutoplayMode {
    #[default]
    None,
    Random,
    Similar,
}

impl AutoplayMode {
    pub fn is_enabled(self) -> bool {
        self != AutoplayMode::None
    }
}

impl FromStr for AutoplayMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "none" => Ok(AutoplayMode::None),
            "random" => Ok(AutoplayMode::Random),
            "similar" => Ok(AutoplayMode::Similar),
            other => Err(format!("unknown autoplay mode: {other}")),
        }
    }
}

impl fmt::Display for AutoplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AutoplayMode::None => "None",
            AutoplayMode::Random => "Random",
            AutoplayMode::Similar => "Similar",
        };
        f.write_str(name)
    }
}

/// Propiedades configurables de un guild
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GuildProperties {
    pub autoplay_mode: AutoplayMode,
}

/// Canción sonando ahora junto con la generación que la identifica
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NowPlaying {
    pub track: Track,
    pub generation: u64,
}

/// Estado de reproducción de un guild
#[derive(Debug, Default)]
pub struct GuildPlayback {
    queue: VecDeque<Track>,
    current: Option<NowPlaying>,
    last_played: Option<Track>,
    generation: u64,
}

impl GuildPlayback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Agrega al final de la cola (FIFO)
    pub fn enqueue<I>(&mut self, tracks: I) -> usize
    where
        I: IntoIterator<Item = Track>,
    {
        let before = self.queue.len();
        self.queue.extend(tracks);
        debug!("➕ {} canciones agregadas a la cola", self.queue.len() - before);
        self.queue_len()
    }

    /// Saca el primero de la cola
    pub fn dequeue(&mut self) -> Option<Track> {
        self.queue.pop_front()
    }

    /// Devuelve una canción al frente de la cola
    pub fn requeue_front(&mut self, track: Track) {
        self.queue.push_front(track);
    }

    pub fn clear_queue(&mut self) -> usize {
        let removed = self.queue.len();
        self.queue.clear();
        removed
    }

    /// Marca una canción como sonando y devuelve su generación
    pub fn begin(&mut self, track: Track) -> u64 {
        self.generation += 1;
        self.last_played = Some(track.clone());
        self.current = Some(NowPlaying {
            track,
            generation: self.generation,
        });
        self.generation
    }

    /// Quita la canción actual sin tocar la cola
    pub fn take_current(&mut self) -> Option<Track> {
        self.current.take().map(|now| now.track)
    }

    /// Quita la canción actual solo si pertenece a `generation`
    pub fn finish(&mut self, generation: u64) -> Option<Track> {
        if self.current_generation() == Some(generation) {
            self.take_current()
        } else {
            None
        }
    }

    /// Vacía cola y canción actual
    pub fn reset(&mut self) {
        self.queue.clear();
        self.current = None;
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.as_ref().map(|now| &now.track)
    }

    pub fn current_generation(&self) -> Option<u64> {
        self.current.as_ref().map(|now| now.generation)
    }

    pub fn last_played(&self) -> Option<&Track> {
        self.last_played.as_ref()
    }

    pub fn is_queue_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            current: self.current().cloned(),
            tracks: self.queue.iter().cloned().collect(),
        }
    }
}

/// Copia de solo lectura de la cola para mostrarla
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueSnapshot {
    pub current: Option<Track>,
    pub tracks: Vec<Track>,
}

impl QueueSnapshot {
    pub fn is_empty(&self) -> bool {
        self.current.is_none() && self.tracks.is_empty()
    }
}
