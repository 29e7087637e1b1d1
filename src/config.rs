use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub guild_id: Option<u64>, // Para comandos de desarrollo

    // Subsonic
    pub subsonic_server: String,
    pub subsonic_user: String,
    pub subsonic_password: String,
    pub subsonic_client_name: String,
    pub http_timeout_secs: u64,

    // Autoplay
    pub autoplay_random_batch: u32,
    pub autoplay_similar_count: u32,

    // Canal de voz
    pub auto_leave_delay_secs: u64,

    // Mensajes
    pub message_retry_attempts: u32,
    pub message_retry_delay_ms: u64,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self::from_lookup(|key| std::env::var(key).ok())?;

        // Validate configuration before returning
        config.validate()?;

        Ok(config)
    }

    /// Construye la configuración a partir de una función de búsqueda de variables
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let required = |key: &str| -> Result<String> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("Missing required environment variable {key}"))
        };

        let parsed = |key: &str, default: String| -> Result<String> {
            Ok(lookup(key).unwrap_or(default))
        };

        Ok(Self {
            // Discord
            discord_token: required("DISCORD_TOKEN")?,
            guild_id: lookup("GUILD_ID")
                .and_then(|s| s.parse().ok())
                .filter(|id| *id != 0),

            // Subsonic
            subsonic_server: required("SUBSONIC_SERVER")?,
            subsonic_user: required("SUBSONIC_USER")?,
            subsonic_password: required("SUBSONIC_PASSWORD")?,
            subsonic_client_name: parsed("SUBSONIC_CLIENT_NAME", defaults.subsonic_client_name)?,
            http_timeout_secs: parsed("HTTP_TIMEOUT_SECS", defaults.http_timeout_secs.to_string())?
                .parse()
                .context("HTTP_TIMEOUT_SECS must be a number of seconds")?,

            // Autoplay
            autoplay_random_batch: parsed("AUTOPLAY_RANDOM_BATCH", defaults.autoplay_random_batch.to_string())?
                .parse()
                .context("AUTOPLAY_RANDOM_BATCH must be a number")?,
            autoplay_similar_count: parsed("AUTOPLAY_SIMILAR_COUNT", defaults.autoplay_similar_count.to_string())?
                .parse()
                .context("AUTOPLAY_SIMILAR_COUNT must be a number")?,

            // Canal de voz
            auto_leave_delay_secs: parsed("AUTO_LEAVE_DELAY_SECS", defaults.auto_leave_delay_secs.to_string())?
                .parse()
                .context("AUTO_LEAVE_DELAY_SECS must be a number of seconds")?,

            // Mensajes
            message_retry_attempts: parsed("MESSAGE_RETRY_ATTEMPTS", defaults.message_retry_attempts.to_string())?
                .parse()
                .context("MESSAGE_RETRY_ATTEMPTS must be a number")?,
            message_retry_delay_ms: parsed("MESSAGE_RETRY_DELAY_MS", defaults.message_retry_delay_ms.to_string())?
                .parse()
                .context("MESSAGE_RETRY_DELAY_MS must be a number of milliseconds")?,
        })
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - The Subsonic server must be an absolute http(s) URL
    /// - Autoplay batch sizes must be greater than 0
    /// - At least one delivery attempt must be allowed
    pub fn validate(&self) -> Result<()> {
        let server = url::Url::parse(&self.subsonic_server)
            .with_context(|| format!("SUBSONIC_SERVER is not a valid URL: {}", self.subsonic_server))?;

        if server.scheme() != "http" && server.scheme() != "https" {
            anyhow::bail!("SUBSONIC_SERVER must use http or https, got: {}", server.scheme());
        }

        if self.autoplay_random_batch == 0 {
            anyhow::bail!("Autoplay random batch must be greater than 0");
        }

        if self.autoplay_similar_count == 0 {
            anyhow::bail!("Autoplay similar count must be greater than 0");
        }

        if self.message_retry_attempts == 0 {
            anyhow::bail!("Message retry attempts must be at least 1");
        }

        Ok(())
    }

    pub fn auto_leave_delay(&self) -> Duration {
        Duration::from_secs(self.auto_leave_delay_secs)
    }

    pub fn message_retry_delay(&self) -> Duration {
        Duration::from_millis(self.message_retry_delay_ms)
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// Excludes the Discord token and the Subsonic password.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: commands {}\n  \
            Subsonic: {} as {} (client {}, timeout {}s)\n  \
            Autoplay: {} random, {} similar\n  \
            Voice: leave after {}s alone\n  \
            Messages: {} attempts, {}ms apart",
            self.guild_id.map_or("global".to_string(), |id| format!("guild {}", id)),
            self.subsonic_server,
            self.subsonic_user,
            self.subsonic_client_name,
            self.http_timeout_secs,
            self.autoplay_random_batch,
            self.autoplay_similar_count,
            self.auto_leave_delay_secs,
            self.message_retry_attempts,
            self.message_retry_delay_ms
        )
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (no defaults - must be provided)
            discord_token: String::new(),
            guild_id: None,

            // Subsonic (credenciales obligatorias)
            subsonic_server: String::new(),
            subsonic_user: String::new(),
            subsonic_password: String::new(),
            subsonic_client_name: "subsonic-jukebox".to_string(),
            http_timeout_secs: 15,

            // Autoplay
            autoplay_random_batch: 10,
            autoplay_similar_count: 50,

            // Voice
            auto_leave_delay_secs: 10,

            // Messages
            message_retry_attempts: 3,
            message_retry_delay_ms: 500,
        }
    }
}
