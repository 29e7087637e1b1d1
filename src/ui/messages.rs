use async_trait::async_trait;
use serenity::{
    builder::{
        CreateAttachment, CreateInteractionResponse, CreateInteractionResponseFollowup,
        CreateInteractionResponseMessage, CreateMessage, EditInteractionResponse,
    },
    http::{Http, HttpError},
    model::{application::CommandInteraction, id::ChannelId},
    Error as SerenityError,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, warn};

use super::embeds::{create_embed, THUMBNAIL_NAME};
use crate::config::Config;

/// Límite de caracteres de la descripción de un embed
const MAX_BODY_CHARS: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

/// Mensaje listo para enviar al usuario
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub header: String,
    pub body: Option<String>,
    pub thumbnail: Option<Vec<u8>>,
    pub ephemeral: bool,
}

impl Notice {
    pub fn success(header: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            header: header.into(),
            body: None,
            thumbnail: None,
            ephemeral: false,
        }
    }

    /// Los errores siempre se titulan "Error" y solo los ve quien ejecutó el comando
    pub fn error(body: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            header: "Error".to_string(),
            body: Some(body.into()),
            thumbnail: None,
            ephemeral: true,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: Option<Vec<u8>>) -> Self {
        self.thumbnail = thumbnail;
        self
    }

    pub fn ephemeral(mut self) -> Self {
        self.ephemeral = true;
        self
    }
}

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("message target not found")]
    NotFound,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("message rejected: {0}")]
    Rejected(String),
}

impl DeliveryError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, DeliveryError::Rejected(_))
    }

    fn from_status(status: u16, detail: String) -> Self {
        match status {
            404 => DeliveryError::NotFound,
            429 | 500..=599 => DeliveryError::Transport(detail),
            _ => DeliveryError::Rejected(detail),
        }
    }
}

impl From<SerenityError> for DeliveryError {
    fn from(error: SerenityError) -> Self {
        match &error {
            SerenityError::Http(HttpError::UnsuccessfulRequest(response)) => {
                Self::from_status(response.status_code.as_u16(), error.to_string())
            }
            _ => DeliveryError::Transport(error.to_string()),
        }
    }
}

/// Destino donde se puede publicar un aviso
#[async_trait]
pub trait MessageTarget: Send + Sync {
    async fn deliver(&self, notice: &Notice) -> Result<(), DeliveryError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.message_retry_attempts,
            delay: config.message_retry_delay(),
        }
    }
}

/// Envía un aviso reintentando los fallos transitorios.
///
/// Nunca devuelve error: tras agotar los intentos registra el fallo y
/// devuelve `false`.
pub async fn send_message(target: &dyn MessageTarget, notice: &Notice, policy: RetryPolicy) -> bool {
    let mut notice = notice.clone();
    notice.body = notice.body.as_deref().map(truncate_body);

    let attempts = policy.max_attempts.max(1);
    for attempt in 1..=attempts {
        match target.deliver(&notice).await {
            Ok(()) => return true,
            Err(e) if e.is_retryable() => {
                warn!("Intento {} de enviar mensaje falló: {}", attempt, e);
                if attempt < attempts {
                    tokio::time::sleep(policy.delay).await;
                }
            }
            Err(e) => {
                error!("Mensaje rechazado ({}): {}", notice.header, e);
                return false;
            }
        }
    }

    error!("No se pudo enviar el mensaje tras {} intentos. Header: {}", attempts, notice.header);
    false
}

/// Recorta el texto al máximo de un embed, terminando en "..."
pub fn truncate_body(body: &str) -> String {
    if body.chars().count() <= MAX_BODY_CHARS {
        return body.to_string();
    }

    let mut truncated: String = body.chars().take(MAX_BODY_CHARS - 3).collect();
    truncated.push_str("...");
    truncated
}

/// Operaciones de Discord sobre la respuesta a un slash command
#[async_trait]
pub trait InteractionResponder: Send + Sync {
    async fn respond(&self, notice: &Notice) -> Result<(), DeliveryError>;

    async fn defer(&self) -> Result<(), DeliveryError>;

    /// Sustituye el "pensando..." de una respuesta pospuesta
    async fn edit_original(&self, notice: &Notice) -> Result<(), DeliveryError>;

    async fn delete_original(&self) -> Result<(), DeliveryError>;

    async fn followup(&self, notice: &Notice) -> Result<(), DeliveryError>;
}

/// Respuestas reales a través de la API HTTP de Discord
pub struct SerenityResponder {
    http: Arc<Http>,
    interaction: CommandInteraction,
}

impl SerenityResponder {
    pub fn new(http: Arc<Http>, interaction: CommandInteraction) -> Self {
        Self { http, interaction }
    }
}

#[async_trait]
impl InteractionResponder for SerenityResponder {
    async fn respond(&self, notice: &Notice) -> Result<(), DeliveryError> {
        let mut message = CreateInteractionResponseMessage::new()
            .embed(create_embed(notice))
            .ephemeral(notice.ephemeral);
        if let Some(bytes) = &notice.thumbnail {
            message = message.add_file(CreateAttachment::bytes(bytes.clone(), THUMBNAIL_NAME));
        }
        self.interaction
            .create_response(&self.http, CreateInteractionResponse::Message(message))
            .await?;
        Ok(())
    }

    async fn defer(&self) -> Result<(), DeliveryError> {
        self.interaction.defer(&self.http).await?;
        Ok(())
    }

    async fn edit_original(&self, notice: &Notice) -> Result<(), DeliveryError> {
        let mut edit = EditInteractionResponse::new().embed(create_embed(notice));
        if let Some(bytes) = &notice.thumbnail {
            edit = edit.new_attachment(CreateAttachment::bytes(bytes.clone(), THUMBNAIL_NAME));
        }
        self.interaction.edit_response(&self.http, edit).await?;
        Ok(())
    }

    async fn delete_original(&self) -> Result<(), DeliveryError> {
        self.interaction.delete_response(&self.http).await?;
        Ok(())
    }

    async fn followup(&self, notice: &Notice) -> Result<(), DeliveryError> {
        let mut followup = CreateInteractionResponseFollowup::new()
            .embed(create_embed(notice))
            .ephemeral(notice.ephemeral);
        if let Some(bytes) = &notice.thumbnail {
            followup = followup.add_file(CreateAttachment::bytes(bytes.clone(), THUMBNAIL_NAME));
        }
        self.interaction.create_followup(&self.http, followup).await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResponseState {
    Pending,
    Deferred,
    Responded,
}

/// Responde a un slash command: respuesta inicial, edición de la pospuesta o follow-up.
///
/// La respuesta pospuesta es pública, así que un aviso efímero la borra y sale
/// como follow-up para que solo lo vea quien ejecutó el comando.
pub struct InteractionTarget {
    responder: Box<dyn InteractionResponder>,
    state: Mutex<ResponseState>,
}

impl InteractionTarget {
    pub fn new(http: Arc<Http>, interaction: CommandInteraction) -> Self {
        Self::with_responder(Box::new(SerenityResponder::new(http, interaction)))
    }

    pub fn with_responder(responder: Box<dyn InteractionResponder>) -> Self {
        Self {
            responder,
            state: Mutex::new(ResponseState::Pending),
        }
    }

    /// Pospone la respuesta para operaciones lentas
    pub async fn defer(&self) -> Result<(), DeliveryError> {
        self.responder.defer().await?;
        *self.state.lock() = ResponseState::Deferred;
        Ok(())
    }
}

#[async_trait]
impl MessageTarget for InteractionTarget {
    async fn deliver(&self, notice: &Notice) -> Result<(), DeliveryError> {
        let state = *self.state.lock();

        match state {
            ResponseState::Pending => self.responder.respond(notice).await?,
            ResponseState::Deferred if !notice.ephemeral => self.responder.edit_original(notice).await?,
            ResponseState::Deferred => {
                self.responder.delete_original().await?;
                *self.state.lock() = ResponseState::Responded;
                self.responder.followup(notice).await?;
            }
            ResponseState::Responded => self.responder.followup(notice).await?,
        }

        *self.state.lock() = ResponseState::Responded;
        Ok(())
    }
}

/// Publica en un canal de texto; los avisos efímeros se envían como normales
pub struct ChannelTarget {
    http: Arc<Http>,
    channel_id: ChannelId,
}

impl ChannelTarget {
    pub fn new(http: Arc<Http>, channel_id: ChannelId) -> Self {
        Self { http, channel_id }
    }
}

#[async_trait]
impl MessageTarget for ChannelTarget {
    async fn deliver(&self, notice: &Notice) -> Result<(), DeliveryError> {
        let mut message = CreateMessage::new().embed(create_embed(notice));
        if let Some(bytes) = &notice.thumbnail {
            message = message.add_file(CreateAttachment::bytes(bytes.clone(), THUMBNAIL_NAME));
        }
        self.channel_id.send_message(&self.http, message).await?;
        Ok(())
    }
}
