use async_trait::async_trait;
use dashmap::DashMap;
use serenity::{
    http::Http,
    model::id::{ChannelId, GuildId},
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::music::{now_playing_notice, VoiceGateway};
use crate::{
    audio::player::{PlayerEngine, PlayerObserver},
    sources::{MediaCatalog, Track},
    ui::{
        embeds,
        messages::{ChannelTarget, MessageTarget},
        send_message, Notice, RetryPolicy,
    },
};

/// Desconecta al bot cuando se queda solo en el canal de voz
pub struct OccupancyWatcher {
    engine: Arc<PlayerEngine>,
    delay: Duration,
}

impl OccupancyWatcher {
    pub fn new(engine: Arc<PlayerEngine>, delay: Duration) -> Self {
        Self { engine, delay }
    }

    /// Si el bot está solo, espera y vuelve a comprobar antes de salir.
    ///
    /// Devuelve `true` si se desconectó y reinició el guild.
    pub async fn check(&self, gateway: &dyn VoiceGateway, guild_id: GuildId) -> bool {
        if gateway.members_in_bot_channel(guild_id).await != Some(1) {
            return false;
        }

        debug!("Bot solo en el canal de voz de guild {}, esperando {:?}", guild_id, self.delay);
        tokio::time::sleep(self.delay).await;

        if gateway.members_in_bot_channel(guild_id).await != Some(1) {
            debug!("Ya no está solo en guild {}, se cancela la desconexión", guild_id);
            return false;
        }

        // Reiniciar antes de detener el audio: el fin de la canción no debe avanzar la cola
        self.engine.reset(guild_id).await;
        gateway.disconnect(guild_id).await;
        info!("🚪 Desconectado por inactividad en guild {}, cola vaciada", guild_id);
        true
    }

    /// El bot salió del canal por fuera de sus comandos (expulsado o movido).
    ///
    /// Ignora el aviso que provoca su propia desconexión. Devuelve `true` si reinició el guild.
    pub async fn bot_disconnected(&self, gateway: &dyn VoiceGateway, guild_id: GuildId) -> bool {
        if !gateway.has_connection(guild_id).await {
            debug!("Salida propia del canal de voz en guild {}, nada que limpiar", guild_id);
            return false;
        }

        warn!("🔌 Bot desconectado del canal de voz en guild {}", guild_id);
        self.engine.reset(guild_id).await;
        gateway.disconnect(guild_id).await;
        true
    }
}

type TargetFactory = Box<dyn Fn(ChannelId) -> Arc<dyn MessageTarget> + Send + Sync>;

/// Publica "Now Playing" y "Playback ended" en el último canal donde se usó un comando
pub struct ChannelAnnouncer {
    catalog: Arc<dyn MediaCatalog>,
    channels: DashMap<GuildId, ChannelId>,
    target_for: TargetFactory,
    policy: RetryPolicy,
}

impl ChannelAnnouncer {
    pub fn new(catalog: Arc<dyn MediaCatalog>, http: Arc<Http>, policy: RetryPolicy) -> Self {
        Self::with_targets(
            catalog,
            Box::new(move |channel_id: ChannelId| -> Arc<dyn MessageTarget> {
                Arc::new(ChannelTarget::new(http.clone(), channel_id))
            }),
            policy,
        )
    }

    pub fn with_targets(catalog: Arc<dyn MediaCatalog>, target_for: TargetFactory, policy: RetryPolicy) -> Self {
        Self {
            catalog,
            channels: DashMap::new(),
            target_for,
            policy,
        }
    }

    pub fn set_channel(&self, guild_id: GuildId, channel_id: ChannelId) {
        self.channels.insert(guild_id, channel_id);
    }

    pub async fn disconnected(&self, guild_id: GuildId) {
        self.announce(guild_id, embeds::disconnected()).await;
    }

    async fn announce(&self, guild_id: GuildId, notice: Notice) {
        let Some(channel_id) = self.channels.get(&guild_id).map(|entry| *entry) else {
            debug!("Sin canal de anuncios en guild {}", guild_id);
            return;
        };

        let target = (self.target_for)(channel_id);
        send_message(target.as_ref(), &notice, self.policy).await;
    }
}

#[async_trait]
impl PlayerObserver for ChannelAnnouncer {
    async fn track_started(&self, guild_id: GuildId, track: &Track) {
        let notice = now_playing_notice(self.catalog.as_ref(), track).await;
        self.announce(guild_id, notice).await;
    }

    async fn playback_ended(&self, guild_id: GuildId) {
        self.announce(guild_id, embeds::playback_ended()).await;
    }
}
