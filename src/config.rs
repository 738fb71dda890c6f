use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;

pub const SESSION_COOKIE: &str = "scribe_session";
pub const MIN_USERNAME_LENGTH: usize = 3;
pub const MAX_USERNAME_LENGTH: usize = 150;
pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const POST_PREVIEW_CHARS: usize = 15;
pub const INDEX_CACHE_CAPACITY: usize = 64;
/// Ten years; anything longer overflows cookie and chrono durations.
pub const MAX_SESSION_EXPIRATION_HOURS: i64 = 24 * 365 * 10;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub database_url: String,
    pub posts_per_page: usize,
    pub session_expiration_hours: i64,
    pub index_cache_seconds: u64,
    pub media_root: PathBuf,
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            database_url: "sqlite://scribe.db".to_string(),
            posts_per_page: 10,
            session_expiration_hours: 24,
            index_cache_seconds: 20,
            media_root: PathBuf::from("media"),
            max_upload_bytes: 5 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Reads `SCRIBE_*` variables, falling back to the defaults for anything unset.
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();
        let config = Self {
            bind_addr: env_or("SCRIBE_BIND_ADDR", defaults.bind_addr)?,
            database_url: env_or("SCRIBE_DATABASE_URL", defaults.database_url)?,
            posts_per_page: env_or("SCRIBE_POSTS_PER_PAGE", defaults.posts_per_page)?,
            session_expiration_hours: env_or(
                "SCRIBE_SESSION_EXPIRATION_HOURS",
                defaults.session_expiration_hours,
            )?,
            index_cache_seconds: env_or(
                "SCRIBE_INDEX_CACHE_SECONDS",
                defaults.index_cache_seconds,
            )?,
            media_root: env_or("SCRIBE_MEDIA_ROOT", defaults.media_root)?,
            max_upload_bytes: env_or("SCRIBE_MAX_UPLOAD_BYTES", defaults.max_upload_bytes)?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.posts_per_page == 0 {
            anyhow::bail!("SCRIBE_POSTS_PER_PAGE must be at least 1");
        }
        if !(1..=MAX_SESSION_EXPIRATION_HOURS).contains(&self.session_expiration_hours) {
            anyhow::bail!(
                "SCRIBE_SESSION_EXPIRATION_HOURS must be between 1 and {}",
                MAX_SESSION_EXPIRATION_HOURS
            );
        }
        Ok(())
    }
}

fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("invalid value for {}: {:?}", key, raw)),
        _ => Ok(default),
    }
}
