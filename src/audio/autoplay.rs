use tracing::{debug, info};

use super::queue::AutoplayMode;
use crate::sources::{CatalogError, MediaCatalog, RandomFilter, Track};

/// Tamaños de lote para rellenar la cola
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoplaySettings {
    pub random_batch: u32,
    pub similar_count: u32,
}

impl Default for AutoplaySettings {
    fn default() -> Self {
        Self {
            random_batch: 10,
            similar_count: 50,
        }
    }
}

/// Pide al catálogo las canciones con las que rellenar una cola vacía.
///
/// Se ejecuta una sola vez por intento de reproducción; una lista vacía
/// significa que no hay nada que reproducir.
pub async fn expand(
    catalog: &dyn MediaCatalog,
    mode: AutoplayMode,
    last_played: Option<&Track>,
    settings: AutoplaySettings,
) -> Result<Vec<Track>, CatalogError> {
    let tracks = match mode {
        AutoplayMode::None => Vec::new(),
        AutoplayMode::Random => {
            catalog
                .random_tracks(&RandomFilter::with_size(settings.random_batch))
                .await?
        }
        AutoplayMode::Similar => match last_played {
            Some(seed) => catalog.similar_tracks(&seed.id, settings.similar_count).await?,
            None => {
                // Sin historial: una canción aleatoria hace de semilla
                let Some(seed) = catalog
                    .random_tracks(&RandomFilter::with_size(1))
                    .await?
                    .into_iter()
                    .next()
                else {
                    return Ok(Vec::new());
                };

                debug!("🌱 Semilla aleatoria para autoplay: {}", seed.title);
                let similar = catalog.similar_tracks(&seed.id, settings.similar_count).await?;

                let mut tracks = Vec::with_capacity(similar.len() + 1);
                tracks.push(seed);
                tracks.extend(similar);
                tracks
            }
        },
    };

    if !tracks.is_empty() {
        info!("🔁 Autoplay ({}) agregó {} canciones", mode, tracks.len());
    }

    Ok(tracks)
}
