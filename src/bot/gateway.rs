use async_trait::async_trait;
use dashmap::DashMap;
use serenity::{
    cache::Cache,
    model::id::{ChannelId, GuildId},
};
use songbird::{Call, Songbird};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::music::VoiceGateway;
use crate::audio::voice::{SongbirdConnection, VoiceConnection, VoiceError};

/// Conexiones de voz gestionadas por songbird, con miembros leídos de la caché
pub struct SongbirdGateway {
    manager: Arc<Songbird>,
    cache: Arc<Cache>,
    http: reqwest::Client,
    connections: Arc<DashMap<GuildId, Arc<SongbirdConnection>>>,
}

impl SongbirdGateway {
    pub fn new(
        manager: Arc<Songbird>,
        cache: Arc<Cache>,
        http: reqwest::Client,
        connections: Arc<DashMap<GuildId, Arc<SongbirdConnection>>>,
    ) -> Self {
        Self {
            manager,
            cache,
            http,
            connections,
        }
    }

    /// Reutiliza la conexión del guild mientras apunte a la misma llamada
    fn wrap(&self, guild_id: GuildId, call: Arc<Mutex<Call>>) -> Arc<SongbirdConnection> {
        let mut entry = self
            .connections
            .entry(guild_id)
            .or_insert_with(|| Arc::new(SongbirdConnection::new(call.clone(), self.http.clone())));

        if !Arc::ptr_eq(&entry.call(), &call) {
            *entry = Arc::new(SongbirdConnection::new(call, self.http.clone()));
        }

        entry.clone()
    }
}

#[async_trait]
impl VoiceGateway for SongbirdGateway {
    async fn connection(&self, guild_id: GuildId) -> Option<Arc<dyn VoiceConnection>> {
        let call = self.manager.get(guild_id)?;
        if call.lock().await.current_channel().is_none() {
            return None;
        }

        Some(self.wrap(guild_id, call))
    }

    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<Arc<dyn VoiceConnection>, VoiceError> {
        let call = self
            .manager
            .join(guild_id, channel_id)
            .await
            .map_err(|e| VoiceError::Join(e.to_string()))?;

        info!("🔊 Conectado al canal de voz {} en guild {}", channel_id, guild_id);
        Ok(self.wrap(guild_id, call))
    }

    async fn has_connection(&self, guild_id: GuildId) -> bool {
        self.connections.contains_key(&guild_id)
    }

    async fn disconnect(&self, guild_id: GuildId) {
        if let Some((_, connection)) = self.connections.remove(&guild_id) {
            connection.stop().await;
        }

        if let Err(e) = self.manager.remove(guild_id).await {
            warn!("Error al salir del canal de voz en guild {}: {:?}", guild_id, e);
            return;
        }

        info!("👋 Desconectado del canal de voz en guild {}", guild_id);
    }

    async fn members_in_bot_channel(&self, guild_id: GuildId) -> Option<usize> {
        let call = self.manager.get(guild_id)?;
        let channel = call.lock().await.current_channel()?;
        let channel_id = ChannelId::from(channel.0);

        let guild = self.cache.guild(guild_id)?;
        let members = guild
            .voice_states
            .values()
            .filter(|state| state.channel_id == Some(channel_id))
            .count();

        Some(members)
    }
}
