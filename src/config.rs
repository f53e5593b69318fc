use anyhow::{Context, Result};
use serenity::model::id::GuildId;
use std::{str::FromStr, time::Duration};

#[derive(Debug, Clone)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: Option<u64>, // Para comandos de desarrollo
    /// Guilds donde el bot puede quedarse; vacío significa todas.
    pub allowed_guilds: Vec<u64>,

    // Spotify (opcional)
    pub spotify_client_id: Option<String>,
    pub spotify_client_secret: Option<String>,

    // Audio
    pub default_volume: f32,
    pub max_queue_size: usize,
    pub max_playlist_size: usize,
    pub idle_timeout: Duration,

    // Cache de resoluciones
    pub cache_size: usize,
    pub resolve_cache_ttl: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN").context("DISCORD_TOKEN no configurado")?,
            application_id: std::env::var("APPLICATION_ID")
                .context("APPLICATION_ID no configurado")?
                .parse()?,
            guild_id: std::env::var("GUILD_ID").ok().and_then(|s| s.parse().ok()),
            allowed_guilds: parse_guild_list(&std::env::var("ALLOWED_GUILDS").unwrap_or_default())?,

            spotify_client_id: optional_var("SPOTIFY_CLIENT_ID"),
            spotify_client_secret: optional_var("SPOTIFY_CLIENT_SECRET"),

            default_volume: env_or("DEFAULT_VOLUME", 0.5)?,
            max_queue_size: env_or("MAX_QUEUE_SIZE", 1000)?,
            max_playlist_size: env_or("MAX_PLAYLIST_SIZE", 100)?,
            idle_timeout: env_duration("IDLE_TIMEOUT", Duration::from_secs(300))?,

            cache_size: env_or("CACHE_SIZE", 100)?,
            resolve_cache_ttl: env_duration("RESOLVE_CACHE_TTL", Duration::from_secs(600))?,
        };

        // Validate configuration before returning
        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    pub fn validate(&self) -> Result<()> {
        if self.default_volume < 0.0 || self.default_volume > 2.0 {
            anyhow::bail!("Default volume must be between 0.0 and 2.0, got: {}", self.default_volume);
        }

        if self.cache_size == 0 {
            anyhow::bail!("Cache size must be greater than 0");
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("Max queue size must be greater than 0");
        }

        if self.max_playlist_size == 0 {
            anyhow::bail!("Max playlist size must be greater than 0");
        }

        if self.idle_timeout.is_zero() {
            anyhow::bail!("Idle timeout must be greater than 0");
        }

        if self.spotify_client_id.is_some() != self.spotify_client_secret.is_some() {
            anyhow::bail!("SPOTIFY_CLIENT_ID and SPOTIFY_CLIENT_SECRET must be set together");
        }

        Ok(())
    }

    pub fn spotify_enabled(&self) -> bool {
        self.spotify_client_id.is_some() && self.spotify_client_secret.is_some()
    }

    /// `true` si el bot puede quedarse en la guild.
    pub fn is_guild_allowed(&self, guild_id: GuildId) -> bool {
        self.allowed_guilds.is_empty() || self.allowed_guilds.contains(&guild_id.get())
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// Tokens and secrets are never included.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: App ID {} (Guild: {}, allow-list: {})\n  \
            Audio: {}% vol, {} queue, {} playlist, idle {}\n  \
            Cache: {} resolutions, ttl {}\n  \
            Spotify: {}",
            self.application_id,
            self.guild_id.map_or("global".to_string(), |id| id.to_string()),
            if self.allowed_guilds.is_empty() {
                "off".to_string()
            } else {
                format!("{} guilds", self.allowed_guilds.len())
            },
            (self.default_volume * 100.0) as u32,
            self.max_queue_size,
            self.max_playlist_size,
            humantime::format_duration(self.idle_timeout),
            self.cache_size,
            humantime::format_duration(self.resolve_cache_ttl),
            if self.spotify_enabled() { "enabled" } else { "disabled" },
        )
    }
}

/// Default configuration values.
impl Default for Config {
    fn default() -> Self {
        Self {
            // Discord (no defaults - must be provided)
            discord_token: String::new(),
            application_id: 0,
            guild_id: None,
            allowed_guilds: Vec::new(),

            spotify_client_id: None,
            spotify_client_secret: None,

            default_volume: 0.5,
            max_queue_size: 1000,
            max_playlist_size: 100,
            idle_timeout: Duration::from_secs(300),

            cache_size: 100,
            resolve_cache_ttl: Duration::from_secs(600),
        }
    }
}

fn optional_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_var(key) {
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| format!("{} inválido: {}", key, value)),
        None => Ok(default),
    }
}

fn env_duration(key: &str, default: Duration) -> Result<Duration> {
    match optional_var(key) {
        Some(value) => humantime::parse_duration(value.trim())
            .with_context(|| format!("{} inválido: {}", key, value)),
        None => Ok(default),
    }
}

/// Lista separada por comas de IDs de guild.
fn parse_guild_list(raw: &str) -> Result<Vec<u64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| id.parse().with_context(|| format!("ID de guild inválido: {}", id)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guild_list_parsing() {
        assert_eq!(parse_guild_list("").unwrap(), Vec::<u64>::new());
        assert_eq!(parse_guild_list(" 1, 2 ,,3").unwrap(), vec![1, 2, 3]);
        assert!(parse_guild_list("1,abc").is_err());
    }

    #[test]
    fn allow_list_is_open_when_empty() {
        let mut config = Config::default();
        assert!(config.is_guild_allowed(GuildId::new(5)));

        config.allowed_guilds = vec![1, 2];
        assert!(config.is_guild_allowed(GuildId::new(2)));
        assert!(!config.is_guild_allowed(GuildId::new(5)));
    }

    #[test]
    fn validation_rejects_bad_values() {
        assert!(Config::default().validate().is_ok());

        let config = Config {
            default_volume: 3.0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            idle_timeout: Duration::ZERO,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            spotify_client_id: Some("id".to_string()),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn summary_hides_the_token() {
        let config = Config {
            discord_token: "super-secret".to_string(),
            ..Config::default()
        };
        let summary = config.summary();
        assert!(!summary.contains("super-secret"));
        assert!(summary.contains("idle 5m"));
    }
}
