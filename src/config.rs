use anyhow::{Context, Result};
use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::ai::client::{DEFAULT_API_BASE, DEFAULT_MODEL};
use crate::ai::RetryPolicy;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub bind_addr: SocketAddr,
    pub gemini_api_key: Option<String>,
    pub gemini_api_base: String,
    pub gemini_model: String,
    pub ai_retry: RetryPolicy,
}

impl Config {
    /// Read settings from the process environment (after `.env` is loaded).
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let defaults = RetryPolicy::default();

        Ok(Self {
            database_url,
            database_max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 5)?,
            bind_addr: parse_or("BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 3050)))?,
            gemini_api_key: env::var("GEMINI_API_KEY").ok().filter(|k| !k.trim().is_empty()),
            gemini_api_base: env::var("GEMINI_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string()),
            gemini_model: env::var("GEMINI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            ai_retry: RetryPolicy {
                max_retries: parse_or("AI_MAX_RETRIES", defaults.max_retries)?,
                base_delay: Duration::from_millis(parse_or(
                    "AI_RETRY_BASE_MS",
                    defaults.base_delay.as_millis() as u64,
                )?),
            },
        })
    }
}

fn parse_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {:?}", key, raw)),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEYS: [&str; 7] = [
        "DATABASE_MAX_CONNECTIONS",
        "BIND_ADDR",
        "GEMINI_API_KEY",
        "GEMINI_API_BASE",
        "GEMINI_MODEL",
        "AI_MAX_RETRIES",
        "AI_RETRY_BASE_MS",
    ];

    fn cleared(extra: &[(&'static str, Option<&'static str>)]) -> Vec<(&'static str, Option<&'static str>)> {
        let mut vars: Vec<_> = KEYS.iter().map(|k| (*k, None)).collect();
        vars.extend_from_slice(extra);
        vars
    }

    #[test]
    fn defaults_apply_when_unset() {
        temp_env::with_vars(cleared(&[("DATABASE_URL", Some("postgres://localhost/test"))]), || {
            let config = Config::from_env().unwrap();
            assert_eq!(config.database_max_connections, 5);
            assert_eq!(config.bind_addr.port(), 3050);
            assert_eq!(config.gemini_model, DEFAULT_MODEL);
            assert!(config.gemini_api_key.is_none());
            assert_eq!(config.ai_retry, RetryPolicy::default());
        });
    }

    #[test]
    fn overrides_are_parsed() {
        temp_env::with_vars(
            cleared(&[
                ("DATABASE_URL", Some("postgres://localhost/test")),
                ("BIND_ADDR", Some("127.0.0.1:8080")),
                ("GEMINI_API_KEY", Some("secret")),
                ("AI_MAX_RETRIES", Some("1")),
                ("AI_RETRY_BASE_MS", Some("250")),
            ]),
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(config.bind_addr, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
                assert_eq!(config.gemini_api_key.as_deref(), Some("secret"));
                assert_eq!(config.ai_retry.max_retries, 1);
                assert_eq!(config.ai_retry.base_delay, Duration::from_millis(250));
            },
        );
    }

    #[test]
    fn missing_database_url_and_bad_numbers_fail() {
        temp_env::with_vars(cleared(&[("DATABASE_URL", None)]), || {
            assert!(Config::from_env().is_err());
        });
        temp_env::with_vars(
            cleared(&[
                ("DATABASE_URL", Some("postgres://localhost/test")),
                ("AI_MAX_RETRIES", Some("lots")),
            ]),
            || {
                assert!(Config::from_env().is_err());
            },
        );
    }
}
