//! # Sources Module
//!
//! Catálogo musical remoto del bot. Define las entidades que devuelve el
//! servidor ([`Track`], [`Album`], [`Playlist`]) y el trait [`MediaCatalog`]
//! que el reproductor y los comandos consumen. La única implementación real es
//! [`subsonic::SubsonicClient`].

pub mod subsonic;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

pub use subsonic::SubsonicClient;

/// Errores del catálogo. Todos son terminales para la llamada que los produjo.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog unavailable: {0}")]
    Unavailable(String),

    #[error("malformed catalog response: {0}")]
    Malformed(String),

    #[error("catalog error {code}: {message}")]
    Api { code: i64, message: String },
}

/// Límites y desplazamientos para `search3`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchLimits {
    pub artist_count: u32,
    pub artist_offset: u32,
    pub album_count: u32,
    pub album_offset: u32,
    pub song_count: u32,
    pub song_offset: u32,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            artist_count: 20,
            artist_offset: 0,
            album_count: 20,
            album_offset: 0,
            song_count: 20,
            song_offset: 0,
        }
    }
}

impl SearchLimits {
    /// Solo canciones, sin artistas ni álbumes
    pub fn songs(count: u32) -> Self {
        Self {
            artist_count: 0,
            album_count: 0,
            song_count: count,
            ..Self::default()
        }
    }

    /// Solo álbumes, sin artistas ni canciones
    pub fn albums(count: u32) -> Self {
        Self {
            artist_count: 0,
            album_count: count,
            song_count: 0,
            ..Self::default()
        }
    }
}

/// Filtros opcionales de `getRandomSongs`. Los campos en `None` no se envían.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RandomFilter {
    pub size: Option<u32>,
    pub genre: Option<String>,
    pub from_year: Option<u32>,
    pub to_year: Option<u32>,
    pub music_folder_id: Option<String>,
}

impl RandomFilter {
    pub fn with_size(size: u32) -> Self {
        Self {
            size: Some(size),
            ..Self::default()
        }
    }
}

/// Una canción tal como la describe el catálogo
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Track {
    #[serde(default)]
    pub id: String,
    #[serde(default = "unknown_track")]
    pub title: String,
    #[serde(default = "unknown_artist")]
    pub artist: String,
    #[serde(default = "unknown_album")]
    pub album: String,
    #[serde(default)]
    pub duration: u32,
    #[serde(default, rename = "coverArt")]
    pub cover_id: String,
}

fn unknown_track() -> String {
    "Unknown Track".to_string()
}

fn unknown_artist() -> String {
    "Unknown Artist".to_string()
}

fn unknown_album() -> String {
    "Unknown Album".to_string()
}

impl Track {
    /// Duración en formato `mm:ss`
    pub fn duration_printable(&self) -> String {
        format_seconds(self.duration)
    }
}

pub fn format_seconds(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Album {
    pub id: String,
    pub name: String,
    pub artist: String,
    pub tracks: Vec<Track>,
    pub song_count: usize,
    pub duration: u32,
    pub cover_id: String,
}

impl Album {
    /// `song_count` siempre se deriva de las canciones recibidas
    pub fn new(
        id: String,
        name: String,
        artist: String,
        tracks: Vec<Track>,
        duration: u32,
        cover_id: String,
    ) -> Self {
        Self {
            id,
            name,
            artist,
            song_count: tracks.len(),
            tracks,
            duration,
            cover_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    pub tracks: Vec<Track>,
    pub song_count: usize,
    pub duration: u32,
    pub cover_id: String,
}

impl Playlist {
    pub fn new(id: String, name: String, tracks: Vec<Track>, duration: u32, cover_id: String) -> Self {
        Self {
            id,
            name,
            song_count: tracks.len(),
            tracks,
            duration,
            cover_id,
        }
    }
}

/// Operaciones del catálogo que usa el bot
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaCatalog: Send + Sync {
    /// Busca canciones. Cero coincidencias es una lista vacía, no un error.
    async fn search_tracks(&self, query: &str, limits: SearchLimits) -> Result<Vec<Track>, CatalogError>;

    /// Primer álbum que coincide con la búsqueda, con todas sus canciones
    async fn search_album(&self, query: &str) -> Result<Option<Album>, CatalogError>;

    /// Primera playlist cuyo nombre contiene la búsqueda
    async fn search_playlist(&self, query: &str) -> Result<Option<Playlist>, CatalogError>;

    async fn random_tracks(&self, filter: &RandomFilter) -> Result<Vec<Track>, CatalogError>;

    async fn similar_tracks(&self, track_id: &str, count: u32) -> Result<Vec<Track>, CatalogError>;

    /// URL directamente reproducible; no descarga el audio
    async fn stream_url(&self, track_id: &str) -> Result<Url, CatalogError>;

    /// Bytes de la portada, `None` si el id está vacío
    async fn cover_art(&self, cover_id: &str) -> Result<Option<Vec<u8>>, CatalogError>;
}
