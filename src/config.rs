use {
    crate::adapters::vulndb_client::VulnDbConfig,
    crate::domain::id::LockId,
    crate::services::dispatcher::DispatchConfig,
    reqwest::Url,
    std::{env, net::SocketAddr, time::Duration},
    thiserror::Error,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{key}: invalid value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub listen_addr: SocketAddr,
    pub vulndb: VulnDbConfig,
    pub dispatch: DispatchConfig,
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = DispatchConfig::default();

        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let vulndb_url = lookup("VULNDB_URL").ok_or(ConfigError::Missing("VULNDB_URL"))?;
        let base_url = Url::parse(&vulndb_url).map_err(|e| ConfigError::Invalid {
            key: "VULNDB_URL",
            value: vulndb_url.clone(),
            reason: e.to_string(),
        })?;

        let listen_addr = parse_or(&lookup, "LISTEN_ADDR", SocketAddr::from(([0, 0, 0, 0], 3000)))?;
        let timeout_secs = parse_or(&lookup, "VULNDB_TIMEOUT_SECS", 30u64)?;
        let lock_id = parse_or(&lookup, "OUTBOX_LOCK_ID", defaults.lock_id.as_i64())?;
        let startup_ms = parse_or(
            &lookup,
            "OUTBOX_STARTUP_DELAY_MS",
            defaults.startup_delay.as_millis() as u64,
        )?;
        let retry_ms = parse_or(
            &lookup,
            "OUTBOX_RETRY_DELAY_MS",
            defaults.retry_delay.as_millis() as u64,
        )?;
        let max_attempts = parse_opt::<i32>(&lookup, "OUTBOX_MAX_ATTEMPTS")?;
        if let Some(max) = max_attempts.filter(|max| *max < 1) {
            return Err(ConfigError::Invalid {
                key: "OUTBOX_MAX_ATTEMPTS",
                value: max.to_string(),
                reason: "must be at least 1".into(),
            });
        }

        Ok(Self {
            database_url,
            listen_addr,
            vulndb: VulnDbConfig {
                base_url,
                timeout: Duration::from_secs(timeout_secs),
            },
            dispatch: DispatchConfig {
                lock_id: LockId::new(lock_id),
                startup_delay: Duration::from_millis(startup_ms),
                retry_delay: Duration::from_millis(retry_ms),
                max_attempts,
            },
        })
    }
}

fn parse_opt<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|value| {
            value.parse().map_err(|e: T::Err| ConfigError::Invalid {
                key,
                reason: e.to_string(),
                value,
            })
        })
        .transpose()
}

fn parse_or<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    Ok(parse_opt(lookup, key)?.unwrap_or(default))
}
