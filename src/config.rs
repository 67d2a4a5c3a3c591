use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use anyhow::{Context, Result, anyhow};
use axum::http::HeaderValue;

use crate::shuffle::SystemClock;
use crate::state::StateOptions;
use crate::storage::DurabilityMode;
use crate::web::rate_limit::RateLimitPolicy;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// `None` keeps everything in memory.
    pub data_dir: Option<PathBuf>,
    pub durability: DurabilityMode,
    pub checkpoint_every: usize,
    pub session_ttl_secs: i64,
    pub admin_username: String,
    pub admin_password: String,
    pub rate_limit_window_secs: u64,
    pub rate_limit_max: u32,
    pub manager_rate_limit_max: u32,
    pub cors_allow_origin: Option<String>,
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parsed<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    var_or(key, default)
        .trim()
        .parse::<T>()
        .with_context(|| format!("{key} must be a valid {}", std::any::type_name::<T>()))
}

fn non_blank(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let durability = DurabilityMode::from_str(&var_or("DURABILITY", "async"))
            .map_err(|err| anyhow!(err))
            .context("DURABILITY must be one of: sync, async, none")?;

        let config = Self {
            host: var_or("APP_HOST", "0.0.0.0"),
            port: parsed("APP_PORT", "8080")?,
            data_dir: non_blank("DATA_DIR").map(PathBuf::from),
            durability,
            checkpoint_every: parsed("CHECKPOINT_EVERY", "1000")?,
            session_ttl_secs: parsed("SESSION_TTL_SECS", "86400")?,
            admin_username: var_or("BOOTSTRAP_ADMIN_USERNAME", "admin"),
            admin_password: var_or("BOOTSTRAP_ADMIN_PASSWORD", "adminpass"),
            rate_limit_window_secs: parsed("RATE_LIMIT_WINDOW_SECS", "900")?,
            rate_limit_max: parsed("RATE_LIMIT_MAX", "100")?,
            manager_rate_limit_max: parsed("MANAGER_RATE_LIMIT_MAX", "200")?,
            cors_allow_origin: non_blank("CORS_ALLOW_ORIGIN"),
        };
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<()> {
        if self.session_ttl_secs <= 0 {
            return Err(anyhow!("SESSION_TTL_SECS must be positive"));
        }
        if self.rate_limit_window_secs == 0 {
            return Err(anyhow!("RATE_LIMIT_WINDOW_SECS must be positive"));
        }
        if self.checkpoint_every == 0 {
            return Err(anyhow!("CHECKPOINT_EVERY must be positive"));
        }
        Ok(())
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn state_options(&self) -> Result<StateOptions> {
        let window = StdDuration::from_secs(self.rate_limit_window_secs);
        let cors_origin = self
            .cors_allow_origin
            .as_deref()
            .map(HeaderValue::from_str)
            .transpose()
            .context("CORS_ALLOW_ORIGIN must be a valid header value")?;

        Ok(StateOptions {
            session_ttl: chrono::Duration::seconds(self.session_ttl_secs),
            bcrypt_cost: bcrypt::DEFAULT_COST,
            default_limit: RateLimitPolicy::new(window, self.rate_limit_max),
            manager_limit: RateLimitPolicy::new(window, self.manager_rate_limit_max),
            clock: Arc::new(SystemClock),
            cors_origin,
        })
    }
}
