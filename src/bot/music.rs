//! Lógica de los comandos de música, independiente de Discord.
//!
//! Cada comando valida sus precondiciones antes de tocar el estado y
//! devuelve los avisos a mostrar o un [`CommandError`].

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::{
    audio::{
        player::{PlaybackOutcome, PlayerEngine, PlayerError},
        queue::AutoplayMode,
        voice::{VoiceConnection, VoiceError},
    },
    sources::{CatalogError, MediaCatalog, SearchLimits, Track},
    ui::{embeds, Notice},
};

/// Acceso a las conexiones de voz del bot
#[async_trait]
pub trait VoiceGateway: Send + Sync {
    /// Conexión activa del bot en el guild
    async fn connection(&self, guild_id: GuildId) -> Option<Arc<dyn VoiceConnection>>;

    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<Arc<dyn VoiceConnection>, VoiceError>;

    /// Si el bot tiene registrada una conexión propia en el guild
    async fn has_connection(&self, guild_id: GuildId) -> bool;

    async fn disconnect(&self, guild_id: GuildId);

    /// Miembros del canal donde está el bot, incluido el bot
    async fn members_in_bot_channel(&self, guild_id: GuildId) -> Option<usize>;
}

/// Quién ejecutó el comando y desde dónde
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub guild_id: GuildId,
    pub user_name: String,
    pub user_channel: Option<ChannelId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Track,
    Album,
    Playlist,
}

impl FromStr for QueryType {
    type Err = CommandError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "track" => Ok(QueryType::Track),
            "album" => Ok(QueryType::Album),
            "playlist" => Ok(QueryType::Playlist),
            _ => Err(CommandError::MissingQueryType),
        }
    }
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("You are not connected to a voice channel.")]
    UserNotInVoiceChannel,

    #[error("Cannot connect to voice channel.")]
    CannotConnectToVoiceChannel,

    #[error("Not currently connected to a voice channel.")]
    BotNotInVoiceChannel,

    #[error("Already playing.")]
    AlreadyPlaying,

    #[error("Queue is empty.")]
    QueueEmpty,

    #[error("No track is playing.")]
    NotPlaying,

    #[error("Please provide a query type.")]
    MissingQueryType,

    #[error("No track found for **{0}**.")]
    NoTrackFound(String),

    #[error("No album found for **{0}**.")]
    NoAlbumFound(String),

    #[error("No playlist found for **{0}**.")]
    NoPlaylistFound(String),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Player(PlayerError),
}

impl From<PlayerError> for CommandError {
    fn from(error: PlayerError) -> Self {
        match error {
            PlayerError::NotPlaying => CommandError::NotPlaying,
            PlayerError::Catalog(e) => CommandError::Catalog(e),
            other => CommandError::Player(other),
        }
    }
}

impl CommandError {
    /// Texto para el usuario; los fallos internos no se detallan
    pub fn user_message(&self) -> String {
        match self {
            CommandError::Catalog(_) | CommandError::Player(_) => "Could not complete request.".to_string(),
            other => other.to_string(),
        }
    }

    pub fn is_internal(&self) -> bool {
        matches!(self, CommandError::Catalog(_) | CommandError::Player(_))
    }
}

pub type CommandResult = Result<Vec<Notice>, CommandError>;

/// Comandos de música sobre un motor, un catálogo y un gateway de voz
pub struct MusicCommands<'a> {
    engine: &'a Arc<PlayerEngine>,
    catalog: &'a dyn MediaCatalog,
    gateway: &'a dyn VoiceGateway,
}

impl<'a> MusicCommands<'a> {
    pub fn new(engine: &'a Arc<PlayerEngine>, catalog: &'a dyn MediaCatalog, gateway: &'a dyn VoiceGateway) -> Self {
        Self {
            engine,
            catalog,
            gateway,
        }
    }

    /// `/play`: sin consulta reanuda la cola; con consulta agrega y reproduce
    pub async fn play(&self, invocation: &Invocation, query_type: Option<&str>, query: Option<&str>) -> CommandResult {
        let guild_id = invocation.guild_id;
        let channel_id = invocation
            .user_channel
            .ok_or(CommandError::UserNotInVoiceChannel)?;

        let Some(query) = query else {
            return self.resume_queue(guild_id, channel_id).await;
        };

        let query_type: QueryType = query_type.ok_or(CommandError::MissingQueryType)?.parse()?;
        info!("🔍 Búsqueda ({:?}) en guild {}: {}", query_type, guild_id, query);

        let (tracks, notice) = match query_type {
            QueryType::Track => {
                let track = self
                    .catalog
                    .search_tracks(query, SearchLimits::songs(1))
                    .await?
                    .into_iter()
                    .next()
                    .ok_or_else(|| CommandError::NoTrackFound(query.to_string()))?;
                let cover = self.cover(&track.cover_id).await;
                let notice = embeds::added_track(&invocation.user_name, &track, cover);
                (vec![track], notice)
            }
            QueryType::Album => {
                let album = self
                    .catalog
                    .search_album(query)
                    .await?
                    .ok_or_else(|| CommandError::NoAlbumFound(query.to_string()))?;
                let cover = self.cover(&album.cover_id).await;
                let notice = embeds::added_album(&invocation.user_name, &album, cover);
                (album.tracks, notice)
            }
            QueryType::Playlist => {
                let playlist = self
                    .catalog
                    .search_playlist(query)
                    .await?
                    .ok_or_else(|| CommandError::NoPlaylistFound(query.to_string()))?;
                let cover = self.cover(&playlist.cover_id).await;
                let notice = embeds::added_playlist(&invocation.user_name, &playlist, cover);
                (playlist.tracks, notice)
            }
        };

        let voice = self.connect(guild_id, channel_id).await?;
        self.engine.enqueue(guild_id, tracks).await;

        let mut notices = vec![notice];
        let outcome = self.engine.start_queue_playback(guild_id, voice).await?;
        if outcome == PlaybackOutcome::QueueEmpty {
            notices.push(embeds::playback_ended());
        }

        Ok(notices)
    }

    /// `/stop`: detiene la canción actual y la deja al frente de la cola
    pub async fn stop(&self, invocation: &Invocation) -> CommandResult {
        let voice = self
            .gateway
            .connection(invocation.guild_id)
            .await
            .ok_or(CommandError::BotNotInVoiceChannel)?;

        self.engine.stop(invocation.guild_id, voice.as_ref()).await?;
        Ok(vec![embeds::stopping_queue_playback()])
    }

    /// `/queue`
    pub async fn queue(&self, invocation: &Invocation) -> CommandResult {
        let snapshot = self.engine.snapshot(invocation.guild_id).await;
        Ok(vec![embeds::queue_listing(&snapshot)])
    }

    /// `/clear`
    pub async fn clear(&self, invocation: &Invocation) -> CommandResult {
        self.engine.clear_queue(invocation.guild_id).await;
        Ok(vec![embeds::queue_cleared(&invocation.user_name)])
    }

    /// `/skip`: descarta la canción actual y pasa a la siguiente
    pub async fn skip(&self, invocation: &Invocation) -> CommandResult {
        let guild_id = invocation.guild_id;
        let voice = self
            .gateway
            .connection(guild_id)
            .await
            .ok_or(CommandError::BotNotInVoiceChannel)?;

        if !voice.is_playing().await {
            return Err(CommandError::NotPlaying);
        }

        let (_skipped, outcome) = self.engine.skip(guild_id, voice).await?;

        let mut notices = vec![embeds::skipping()];
        if outcome == PlaybackOutcome::QueueEmpty {
            notices.push(embeds::playback_ended());
        }
        Ok(notices)
    }

    /// `/autoplay`: cambia el modo y, si el bot está libre, arranca la cola
    pub async fn autoplay(&self, invocation: &Invocation, mode: AutoplayMode) -> CommandResult {
        let guild_id = invocation.guild_id;
        self.engine.set_autoplay_mode(guild_id, mode);

        let notices = vec![embeds::autoplay_changed(&invocation.user_name, mode)];

        if let Some(voice) = self.gateway.connection(guild_id).await {
            if !voice.is_playing().await {
                if let Err(e) = self.engine.start_queue_playback(guild_id, voice).await {
                    error!("Error al iniciar autoplay en guild {}: {:?}", guild_id, e);
                }
            }
        }

        Ok(notices)
    }

    async fn resume_queue(&self, guild_id: GuildId, channel_id: ChannelId) -> CommandResult {
        if let Some(voice) = self.gateway.connection(guild_id).await {
            if voice.is_playing().await {
                return Err(CommandError::AlreadyPlaying);
            }
        }

        let snapshot = self.engine.snapshot(guild_id).await;
        if snapshot.tracks.is_empty() && !self.engine.autoplay_mode(guild_id).is_enabled() {
            return Err(CommandError::QueueEmpty);
        }

        let voice = self.connect(guild_id, channel_id).await?;

        let mut notices = vec![embeds::starting_queue_playback()];
        match self.engine.start_queue_playback(guild_id, voice).await? {
            PlaybackOutcome::Started(_) => {}
            PlaybackOutcome::AlreadyPlaying => return Err(CommandError::AlreadyPlaying),
            PlaybackOutcome::QueueEmpty => notices.push(embeds::playback_ended()),
        }

        Ok(notices)
    }

    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<Arc<dyn VoiceConnection>, CommandError> {
        if let Some(voice) = self.gateway.connection(guild_id).await {
            return Ok(voice);
        }

        self.gateway.connect(guild_id, channel_id).await.map_err(|e| {
            warn!("No se pudo conectar al canal {} en guild {}: {}", channel_id, guild_id, e);
            CommandError::CannotConnectToVoiceChannel
        })
    }

    async fn cover(&self, cover_id: &str) -> Option<Vec<u8>> {
        match self.catalog.cover_art(cover_id).await {
            Ok(cover) => cover,
            Err(e) => {
                warn!("No se pudo obtener la carátula {}: {}", cover_id, e);
                None
            }
        }
    }
}

/// Canción que se anuncia en "Now Playing", con su carátula
pub async fn now_playing_notice(catalog: &dyn MediaCatalog, track: &Track) -> Notice {
    let cover = match catalog.cover_art(&track.cover_id).await {
        Ok(cover) => cover,
        Err(e) => {
            warn!("No se pudo obtener la carátula {}: {}", track.cover_id, e);
            None
        }
    };
    embeds::now_playing(track, cover)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{Album, MockMediaCatalog};
    use crate::testing::{
        catalog_with_streams, engine_for, stream_url_for, track, tracks, FakeGateway, RecordingObserver,
    };
    use pretty_assertions::assert_eq;

    fn invocation(in_voice: bool) -> Invocation {
        Invocation {
            guild_id: GuildId::new(7),
            user_name: "ana".to_string(),
            user_channel: in_voice.then(|| ChannelId::new(99)),
        }
    }

    struct Harness {
        engine: Arc<PlayerEngine>,
        catalog: Arc<MockMediaCatalog>,
        gateway: FakeGateway,
    }

    impl Harness {
        fn new(catalog: MockMediaCatalog) -> Self {
            let catalog = Arc::new(catalog);
            Self {
                engine: engine_for(catalog.clone(), RecordingObserver::new()),
                catalog,
                gateway: FakeGateway::new(),
            }
        }

        fn commands(&self) -> MusicCommands<'_> {
            MusicCommands::new(&self.engine, self.catalog.as_ref(), &self.gateway)
        }

        async fn queued_ids(&self) -> Vec<String> {
            let snapshot = self.engine.snapshot(GuildId::new(7)).await;
            snapshot.tracks.into_iter().map(|t| t.id).collect()
        }
    }

    #[tokio::test]
    async fn test_play_requires_user_in_voice_channel() {
        let harness = Harness::new(MockMediaCatalog::new());

        let result = harness.commands().play(&invocation(false), Some("track"), Some("x")).await;

        assert!(matches!(result, Err(CommandError::UserNotInVoiceChannel)));
        assert_eq!(harness.gateway.connect_count(), 0);
    }

    #[tokio::test]
    async fn test_track_search_without_results_leaves_queue_unchanged() {
        let mut catalog = MockMediaCatalog::new();
        catalog.expect_search_tracks().returning(|_, _| Ok(Vec::new()));
        let harness = Harness::new(catalog);

        let error = harness
            .commands()
            .play(&invocation(true), Some("track"), Some("nothing"))
            .await
            .unwrap_err();

        assert_eq!(error.user_message(), "No track found for **nothing**.");
        assert!(harness.queued_ids().await.is_empty());
        assert_eq!(harness.gateway.connect_count(), 0);
    }

    #[tokio::test]
    async fn test_album_enqueues_every_track_in_order() {
        let mut catalog = catalog_with_streams();
        catalog.expect_search_album().returning(|_| {
            Ok(Some(Album::new(
                "al".into(),
                "Kind of Blue".into(),
                "Miles Davis".into(),
                tracks(&["a", "b", "c"]),
                2760,
                "al-cover".into(),
            )))
        });
        let harness = Harness::new(catalog);

        let notices = harness
            .commands()
            .play(&invocation(true), Some("album"), Some("kind of blue"))
            .await
            .unwrap();

        assert_eq!(notices[0].header, "ana added album to queue");
        assert_eq!(harness.gateway.connect_count(), 1);
        assert_eq!(harness.engine.snapshot(GuildId::new(7)).await.current, Some(track("a")));
        assert_eq!(harness.queued_ids().await, vec!["b", "c"]);
        assert_eq!(harness.gateway.voice().played(), vec![stream_url_for("a")]);
    }

    #[tokio::test]
    async fn test_play_without_query_type_is_rejected() {
        let harness = Harness::new(MockMediaCatalog::new());

        let result = harness.commands().play(&invocation(true), None, Some("x")).await;

        assert!(matches!(result, Err(CommandError::MissingQueryType)));
    }

    #[tokio::test]
    async fn test_resume_with_empty_queue_and_no_autoplay() {
        let harness = Harness::new(MockMediaCatalog::new());

        let result = harness.commands().play(&invocation(true), None, None).await;

        assert!(matches!(result, Err(CommandError::QueueEmpty)));
        assert_eq!(harness.gateway.connect_count(), 0);
    }

    #[tokio::test]
    async fn test_resume_while_playing_is_rejected() {
        let harness = Harness::new(catalog_with_streams());
        harness.engine.enqueue(GuildId::new(7), tracks(&["a", "b"])).await;
        harness.commands().play(&invocation(true), None, None).await.unwrap();

        let result = harness.commands().play(&invocation(true), None, None).await;

        assert!(matches!(result, Err(CommandError::AlreadyPlaying)));
        assert_eq!(harness.queued_ids().await, vec!["b"]);
    }

    #[tokio::test]
    async fn test_stop_and_skip_need_bot_in_voice() {
        let harness = Harness::new(MockMediaCatalog::new());

        let stop = harness.commands().stop(&invocation(true)).await;
        let skip = harness.commands().skip(&invocation(true)).await;

        assert!(matches!(stop, Err(CommandError::BotNotInVoiceChannel)));
        assert!(matches!(skip, Err(CommandError::BotNotInVoiceChannel)));
    }

    #[tokio::test]
    async fn test_stop_without_current_track_does_not_touch_voice() {
        let harness = Harness::new(MockMediaCatalog::new());
        harness.gateway.set_connected(true);

        let result = harness.commands().stop(&invocation(true)).await;

        assert!(matches!(result, Err(CommandError::NotPlaying)));
        assert_eq!(harness.gateway.voice().stop_count(), 0);
    }

    #[tokio::test]
    async fn test_stop_then_play_resumes_stopped_track() {
        let harness = Harness::new(catalog_with_streams());
        harness.engine.enqueue(GuildId::new(7), tracks(&["a", "b"])).await;
        harness.commands().play(&invocation(true), None, None).await.unwrap();

        let notices = harness.commands().stop(&invocation(true)).await.unwrap();
        assert_eq!(notices[0].header, "Stopped queue playback");

        harness.commands().play(&invocation(true), None, None).await.unwrap();
        assert_eq!(
            harness.gateway.voice().played(),
            vec![stream_url_for("a"), stream_url_for("a")]
        );
    }

    #[tokio::test]
    async fn test_skip_when_idle_reports_not_playing() {
        let harness = Harness::new(MockMediaCatalog::new());
        harness.gateway.set_connected(true);

        let result = harness.commands().skip(&invocation(true)).await;

        assert!(matches!(result, Err(CommandError::NotPlaying)));
    }

    #[tokio::test]
    async fn test_catalog_failure_is_reported_generically() {
        let mut catalog = MockMediaCatalog::new();
        catalog
            .expect_search_album()
            .returning(|_| Err(CatalogError::Unavailable("timeout".into())));
        let harness = Harness::new(catalog);

        let error = harness
            .commands()
            .play(&invocation(true), Some("album"), Some("x"))
            .await
            .unwrap_err();

        assert!(error.is_internal());
        assert_eq!(error.user_message(), "Could not complete request.");
        assert_eq!(harness.gateway.connect_count(), 0);
    }

    #[tokio::test]
    async fn test_refused_connection_leaves_queue_unchanged() {
        let mut catalog = MockMediaCatalog::new();
        catalog.expect_search_tracks().returning(|_, _| Ok(tracks(&["a"])));
        catalog.expect_cover_art().returning(|_| Ok(None));
        let harness = Harness::new(catalog);
        harness.gateway.refuse_connections();

        let result = harness.commands().play(&invocation(true), Some("track"), Some("a")).await;

        assert!(matches!(result, Err(CommandError::CannotConnectToVoiceChannel)));
        assert!(harness.queued_ids().await.is_empty());
    }

    #[tokio::test]
    async fn test_enabling_autoplay_starts_idle_connection() {
        let mut catalog = catalog_with_streams();
        catalog.expect_random_tracks().returning(|_| Ok(tracks(&["r1"])));
        let harness = Harness::new(catalog);
        harness.gateway.set_connected(true);

        let notices = harness
            .commands()
            .autoplay(&invocation(true), AutoplayMode::Random)
            .await
            .unwrap();

        assert_eq!(notices[0].header, "Autoplay enabled by ana");
        assert_eq!(harness.gateway.voice().played(), vec![stream_url_for("r1")]);
    }

    #[tokio::test]
    async fn test_clear_and_queue_listing() {
        let harness = Harness::new(MockMediaCatalog::new());
        harness.engine.enqueue(GuildId::new(7), tracks(&["a"])).await;

        let listing = harness.commands().queue(&invocation(false)).await.unwrap();
        assert!(listing[0].body.as_deref().unwrap_or_default().starts_with("1. **Title a**"));

        let cleared = harness.commands().clear(&invocation(false)).await.unwrap();
        assert_eq!(cleared[0].header, "ana cleared the queue");
        assert!(harness.queued_ids().await.is_empty());
    }
}
