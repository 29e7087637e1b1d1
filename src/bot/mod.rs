//! # Bot Module
//!
//! Discord side of the jukebox.
//!
//! This module contains:
//! - Slash command registration ([`commands`])
//! - Interaction handling and option parsing ([`handlers`])
//! - Platform-independent command logic ([`music`])
//! - Voice connections through songbird ([`gateway`])
//! - The occupancy watcher and the now-playing announcer ([`events`])
//!
//! ## Architecture
//!
//! [`JukeboxBot`] implements Serenity's [`EventHandler`] trait. Every command
//! runs against the shared [`PlayerEngine`], which owns the per-guild queues,
//! and the Subsonic catalog behind [`MediaCatalog`].

use anyhow::Result;
use dashmap::DashMap;
use serenity::{
    all::{Context, EventHandler, GuildId, Interaction, Ready, VoiceState},
    async_trait,
    http::Http,
};
use songbird::Songbird;
use std::sync::Arc;
use tracing::{error, info};

pub mod commands;
pub mod events;
pub mod gateway;
pub mod handlers;
pub mod music;

use self::{
    events::{ChannelAnnouncer, OccupancyWatcher},
    gateway::SongbirdGateway,
};
use crate::{
    audio::{
        autoplay::AutoplaySettings, player::PlayerEngine, store::GuildStore, voice::SongbirdConnection,
    },
    config::Config,
    sources::MediaCatalog,
    ui::RetryPolicy,
};

/// Discord event handler for the jukebox.
///
/// Holds the playback engine, the catalog client and the songbird voice
/// connections for every guild the bot is in.
pub struct JukeboxBot {
    /// Bot configuration loaded from environment variables
    config: Arc<Config>,
    engine: Arc<PlayerEngine>,
    catalog: Arc<dyn MediaCatalog>,
    announcer: Arc<ChannelAnnouncer>,
    watcher: OccupancyWatcher,
    songbird: Arc<Songbird>,
    /// Voice connections per Discord guild
    connections: Arc<DashMap<GuildId, Arc<SongbirdConnection>>>,
    /// Cliente para el audio; sin timeout global para no cortar canciones largas
    stream_http: reqwest::Client,
    retry_policy: RetryPolicy,
}

impl JukeboxBot {
    pub fn new(config: Config, catalog: Arc<dyn MediaCatalog>, songbird: Arc<Songbird>) -> Self {
        let config = Arc::new(config);
        let retry_policy = RetryPolicy::from_config(&config);

        let announcer = Arc::new(ChannelAnnouncer::new(
            catalog.clone(),
            Arc::new(Http::new(&config.discord_token)),
            retry_policy,
        ));

        let settings = AutoplaySettings {
            random_batch: config.autoplay_random_batch,
            similar_count: config.autoplay_similar_count,
        };
        let engine = Arc::new(PlayerEngine::new(
            Arc::new(GuildStore::new()),
            catalog.clone(),
            announcer.clone(),
            settings,
        ));

        let watcher = OccupancyWatcher::new(engine.clone(), config.auto_leave_delay());

        Self {
            config,
            engine,
            catalog,
            announcer,
            watcher,
            songbird,
            connections: Arc::new(DashMap::new()),
            stream_http: reqwest::Client::new(),
            retry_policy,
        }
    }

    pub fn engine(&self) -> &Arc<PlayerEngine> {
        &self.engine
    }

    pub fn catalog(&self) -> &dyn MediaCatalog {
        self.catalog.as_ref()
    }

    pub fn announcer(&self) -> &ChannelAnnouncer {
        &self.announcer
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry_policy
    }

    /// Gateway de voz ligado a la caché del contexto actual
    pub fn gateway(&self, ctx: &Context) -> SongbirdGateway {
        SongbirdGateway::new(
            self.songbird.clone(),
            ctx.cache.clone(),
            self.stream_http.clone(),
            self.connections.clone(),
        )
    }

    /// Registers slash commands globally or, when `GUILD_ID` is set, for that guild.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);
                info!("🏠 Registrando comandos para guild específica: {}", guild_id);

                commands::register_guild_commands(ctx, guild_id).await.map_err(|e| {
                    error!("❌ Error registrando comandos de guild: {:?}", e);
                    anyhow::anyhow!("No se pudieron registrar comandos de guild. Verifica que el bot tenga permisos de 'applications.commands' en la guild.")
                })?;
                info!("✅ Comandos de guild registrados para: {}", guild_id);
            }
            None => {
                info!("🌐 Registrando comandos globalmente");
                commands::register_global_commands(ctx).await.map_err(|e| {
                    error!("❌ Error registrando comandos globales: {:?}", e);
                    anyhow::anyhow!("No se pudieron registrar comandos globales. Verifica que el bot tenga permisos de 'applications.commands'.")
                })?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl EventHandler for JukeboxBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command_interaction) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command_interaction, self).await {
                error!("Error manejando comando: {:?}", e);
            }
        }
    }

    /// Resets the guild when the bot is disconnected and leaves channels
    /// where it stays alone.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let Some(guild_id) = new.guild_id else {
            return;
        };
        let gateway = self.gateway(&ctx);

        // Detectar si el bot fue desconectado
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id == current_user_id && old.is_some() && new.channel_id.is_none() {
            self.watcher.bot_disconnected(&gateway, guild_id).await;
            return;
        }

        if self.watcher.check(&gateway, guild_id).await {
            self.announcer.disconnected(guild_id).await;
        }
    }
}
