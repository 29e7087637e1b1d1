use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use super::{Album, CatalogError, MediaCatalog, Playlist, RandomFilter, SearchLimits, Track};
use crate::config::Config;

/// Versión de la API Subsonic que anunciamos en cada petición
const API_VERSION: &str = "1.15.0";

type Params = Vec<(&'static str, String)>;

/// Cliente REST para servidores compatibles con Subsonic
pub struct SubsonicClient {
    http: reqwest::Client,
    base_url: String,
    auth: Params,
}

/// Algunos servidores devuelven un objeto suelto en lugar de una lista de un elemento
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> Default for OneOrMany<T> {
    fn default() -> Self {
        OneOrMany::Many(Vec::new())
    }
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

#[derive(Debug, Deserialize)]
struct AlbumHit {
    id: String,
}

#[derive(Debug, Deserialize)]
struct AlbumEntry {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default = "super::unknown_artist")]
    artist: String,
    #[serde(default)]
    duration: u32,
    #[serde(default, rename = "coverArt")]
    cover_id: String,
    #[serde(default)]
    song: OneOrMany<Track>,
}

#[derive(Debug, Deserialize)]
struct PlaylistHit {
    id: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct PlaylistEntry {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    duration: u32,
    #[serde(default, rename = "coverArt")]
    cover_id: String,
    #[serde(default)]
    entry: OneOrMany<Track>,
}

impl SubsonicClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;

        info!("🎼 Cliente Subsonic configurado para {}", config.subsonic_server);

        Ok(Self {
            http,
            base_url: config.subsonic_server.trim_end_matches('/').to_string(),
            auth: vec![
                ("u", config.subsonic_user.clone()),
                ("p", config.subsonic_password.clone()),
                ("v", API_VERSION.to_string()),
                ("c", config.subsonic_client_name.clone()),
                ("f", "json".to_string()),
            ],
        })
    }

    fn endpoint(&self, name: &str) -> String {
        format!("{}/rest/{}.view", self.base_url, name)
    }

    fn request(&self, name: &str, params: &[(&'static str, String)]) -> reqwest::RequestBuilder {
        debug!("🔍 Subsonic /rest/{} ({} parámetros)", name, params.len());
        self.http.get(self.endpoint(name)).query(&self.auth).query(params)
    }

    /// Envía la petición y devuelve el contenido de `subsonic-response`
    async fn get_json(&self, name: &str, params: &[(&'static str, String)]) -> Result<Value, CatalogError> {
        let response = self
            .request(name, params)
            .send()
            .await
            .map_err(transport_error)?;

        let body: Value = response.json().await.map_err(|e| {
            if e.is_decode() {
                CatalogError::Malformed(e.to_string())
            } else {
                transport_error(e)
            }
        })?;

        unwrap_envelope(body)
    }
}

#[async_trait]
impl MediaCatalog for SubsonicClient {
    async fn search_tracks(&self, query: &str, limits: SearchLimits) -> Result<Vec<Track>, CatalogError> {
        let response = self.get_json("search3", &search_params(query, limits)).await?;
        list_under(&response, "searchResult3", "song")
    }

    async fn search_album(&self, query: &str) -> Result<Option<Album>, CatalogError> {
        let response = self
            .get_json("search3", &search_params(query, SearchLimits::albums(1)))
            .await?;
        let hits: Vec<AlbumHit> = list_under(&response, "searchResult3", "album")?;

        let Some(hit) = hits.into_iter().next() else {
            return Ok(None);
        };

        let response = self.get_json("getAlbum", &[("id", hit.id)]).await?;
        parse_album(&response).map(Some)
    }

    async fn search_playlist(&self, query: &str) -> Result<Option<Playlist>, CatalogError> {
        let response = self.get_json("getPlaylists", &[]).await?;
        let playlists: Vec<PlaylistHit> = list_under(&response, "playlists", "playlist")?;

        let needle = query.to_lowercase();
        let Some(hit) = playlists
            .into_iter()
            .find(|p| p.name.to_lowercase().contains(&needle))
        else {
            return Ok(None);
        };

        let response = self.get_json("getPlaylist", &[("id", hit.id)]).await?;
        parse_playlist(&response).map(Some)
    }

    async fn random_tracks(&self, filter: &RandomFilter) -> Result<Vec<Track>, CatalogError> {
        let response = self.get_json("getRandomSongs", &random_params(filter)).await?;
        list_under(&response, "randomSongs", "song")
    }

    async fn similar_tracks(&self, track_id: &str, count: u32) -> Result<Vec<Track>, CatalogError> {
        let params = vec![("id", track_id.to_string()), ("count", count.to_string())];
        let response = self.get_json("getSimilarSongs2", &params).await?;
        list_under(&response, "similarSongs2", "song")
    }

    async fn stream_url(&self, track_id: &str) -> Result<Url, CatalogError> {
        let response = self
            .request("stream", &[("id", track_id.to_string())])
            .send()
            .await
            .map_err(transport_error)?;

        // Un error de Subsonic llega como JSON en lugar de audio
        if is_json(&response) {
            let body: Value = response
                .json()
                .await
                .map_err(|e| CatalogError::Malformed(e.to_string()))?;
            unwrap_envelope(body)?;
            return Err(CatalogError::Malformed("stream returned a document instead of audio".into()));
        }

        if !response.status().is_success() {
            return Err(CatalogError::Unavailable(format!("stream returned {}", response.status())));
        }

        // Solo interesa la URL final tras las redirecciones, el cuerpo se descarta
        Ok(response.url().clone())
    }

    async fn cover_art(&self, cover_id: &str) -> Result<Option<Vec<u8>>, CatalogError> {
        if cover_id.is_empty() {
            return Ok(None);
        }

        let response = self
            .request("getCoverArt", &[("id", cover_id.to_string())])
            .send()
            .await
            .map_err(transport_error)?;

        if is_json(&response) || !response.status().is_success() {
            warn!("⚠️ Portada {} no disponible", cover_id);
            return Ok(None);
        }

        let bytes = response.bytes().await.map_err(transport_error)?;
        Ok(Some(bytes.to_vec()))
    }
}

fn transport_error(e: reqwest::Error) -> CatalogError {
    CatalogError::Unavailable(e.to_string())
}

fn is_json(response: &reqwest::Response) -> bool {
    response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("json"))
}

pub(crate) fn search_params(query: &str, limits: SearchLimits) -> Params {
    vec![
        ("query", query.to_string()),
        ("artistCount", limits.artist_count.to_string()),
        ("artistOffset", limits.artist_offset.to_string()),
        ("albumCount", limits.album_count.to_string()),
        ("albumOffset", limits.album_offset.to_string()),
        ("songCount", limits.song_count.to_string()),
        ("songOffset", limits.song_offset.to_string()),
    ]
}

pub(crate) fn random_params(filter: &RandomFilter) -> Params {
    let mut params = Params::new();

    if let Some(size) = filter.size {
        params.push(("size", size.to_string()));
    }
    if let Some(genre) = &filter.genre {
        params.push(("genre", genre.clone()));
    }
    if let Some(from_year) = filter.from_year {
        params.push(("fromYear", from_year.to_string()));
    }
    if let Some(to_year) = filter.to_year {
        params.push(("toYear", to_year.to_string()));
    }
    if let Some(folder) = &filter.music_folder_id {
        params.push(("musicFolderId", folder.clone()));
    }

    params
}

/// Extrae `subsonic-response` y convierte `status: failed` en error
pub(crate) fn unwrap_envelope(body: Value) -> Result<Value, CatalogError> {
    let Value::Object(mut root) = body else {
        return Err(CatalogError::Malformed("response is not an object".into()));
    };

    let response = root
        .remove("subsonic-response")
        .ok_or_else(|| CatalogError::Malformed("missing subsonic-response".into()))?;

    if response.get("status").and_then(Value::as_str) == Some("failed") {
        let error = response.get("error");
        return Err(CatalogError::Api {
            code: error.and_then(|e| e.get("code")).and_then(Value::as_i64).unwrap_or(0),
            message: error
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
                .to_string(),
        });
    }

    Ok(response)
}

/// Lista `response[result_key][list_key]`; la ausencia de cualquiera de las dos es una lista vacía
pub(crate) fn list_under<T>(response: &Value, result_key: &str, list_key: &str) -> Result<Vec<T>, CatalogError>
where
    T: for<'de> Deserialize<'de>,
{
    let items = match response.get(result_key) {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Object(result)) => match result.get(list_key) {
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(items) => items.clone(),
        },
        Some(other) => {
            return Err(CatalogError::Malformed(format!(
                "{result_key} should be an object, got {other}"
            )))
        }
    };

    serde_json::from_value::<OneOrMany<T>>(items)
        .map(OneOrMany::into_vec)
        .map_err(|e| CatalogError::Malformed(format!("{result_key}.{list_key}: {e}")))
}

fn entry_under<T>(response: &Value, key: &str) -> Result<T, CatalogError>
where
    T: for<'de> Deserialize<'de>,
{
    let entry = response
        .get(key)
        .cloned()
        .ok_or_else(|| CatalogError::Malformed(format!("missing {key}")))?;

    serde_json::from_value(entry).map_err(|e| CatalogError::Malformed(format!("{key}: {e}")))
}

pub(crate) fn parse_album(response: &Value) -> Result<Album, CatalogError> {
    let entry: AlbumEntry = entry_under(response, "album")?;

    Ok(Album::new(
        entry.id,
        entry.name,
        entry.artist,
        entry.song.into_vec(),
        entry.duration,
        entry.cover_id,
    ))
}

pub(crate) fn parse_playlist(response: &Value) -> Result<Playlist, CatalogError> {
    let entry: PlaylistEntry = entry_under(response, "playlist")?;

    Ok(Playlist::new(
        entry.id,
        entry.name,
        entry.entry.into_vec(),
        entry.duration,
        entry.cover_id,
    ))
}
