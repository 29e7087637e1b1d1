use dashmap::DashMap;
use serenity::model::id::GuildId;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::queue::{AutoplayMode, GuildPlayback, GuildProperties};

/// Estado por guild: cola, canción actual y propiedades.
///
/// Cada guild tiene su propio `Mutex` asíncrono; quien lo tenga puede
/// mantenerlo a través de llamadas al catálogo o al canal de voz.
#[derive(Default)]
pub struct GuildStore {
    playback: DashMap<GuildId, Arc<Mutex<GuildPlayback>>>,
    properties: DashMap<GuildId, GuildProperties>,
}

impl GuildStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Estado de reproducción del guild, creado si no existe
    pub fn playback(&self, guild_id: GuildId) -> Arc<Mutex<GuildPlayback>> {
        self.playback
            .entry(guild_id)
            .or_insert_with(|| Arc::new(Mutex::new(GuildPlayback::new())))
            .clone()
    }

    /// Propiedades del guild, creadas con valores por defecto si no existen
    pub fn properties(&self, guild_id: GuildId) -> GuildProperties {
        *self.properties.entry(guild_id).or_default()
    }

    pub fn set_autoplay_mode(&self, guild_id: GuildId, mode: AutoplayMode) {
        self.properties.entry(guild_id).or_default().autoplay_mode = mode;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::track;

    #[tokio::test]
    async fn test_entries_are_created_lazily_and_shared() {
        let store = GuildStore::new();
        let guild = GuildId::new(1);

        store.playback(guild).lock().await.enqueue([track("a")]);

        assert_eq!(store.playback(guild).lock().await.queue_len(), 1);
        assert!(Arc::ptr_eq(&store.playback(guild), &store.playback(guild)));
    }

    #[tokio::test]
    async fn test_guilds_are_isolated() {
        let store = GuildStore::new();
        let (first, second) = (GuildId::new(1), GuildId::new(2));

        store.playback(first).lock().await.enqueue([track("a"), track("b")]);
        store.set_autoplay_mode(first, AutoplayMode::Random);

        assert_eq!(store.playback(second).lock().await.queue_len(), 0);
        assert_eq!(store.properties(second).autoplay_mode, AutoplayMode::None);
        assert_eq!(store.properties(first).autoplay_mode, AutoplayMode::Random);
    }
}
