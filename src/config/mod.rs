//! Configuration module for the Aliment backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use axum::http::{HeaderValue, StatusCode};

use crate::db::SeedMode;

/// Signing secret used when none is configured.
pub const DEV_TOKEN_SECRET: &str = "aliment-dev-secret";

/// Which origins may call the API from a browser.
#[derive(Debug, Clone, PartialEq)]
pub enum CorsPolicy {
    /// Any origin
    Any,
    /// Only the listed origins
    Origins(Vec<HeaderValue>),
    /// No CORS headers at all
    Disabled,
}

impl FromStr for CorsPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" | "*" | "any" => Ok(CorsPolicy::Any),
            "none" | "off" => Ok(CorsPolicy::Disabled),
            list => list
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(|o| HeaderValue::from_str(o).map_err(|e| format!("{}: {}", o, e)))
                .collect::<Result<Vec<_>, _>>()
                .map(CorsPolicy::Origins),
        }
    }
}

/// A malformed configuration value.
#[derive(Debug)]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
    pub reason: String,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Invalid {} value '{}': {}",
            self.var, self.value, self.reason
        )
    }
}

impl std::error::Error for ConfigError {}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address to bind to
    pub host: IpAddr,
    /// Listening port
    pub port: u16,
    /// Path to the item collection file
    pub item_store_path: PathBuf,
    /// Path to the user collection file
    pub user_store_path: PathBuf,
    /// HMAC secret for bearer tokens
    pub token_secret: String,
    /// Lifetime of issued tokens
    pub token_expiry: Duration,
    /// Cross-origin policy
    pub cors: CorsPolicy,
    /// Mount the signup and login routes
    pub auth_enabled: bool,
    /// Require a bearer token on item create, update and delete
    pub protect_item_writes: bool,
    /// Status returned by a successful login
    pub login_status: StatusCode,
    /// Startup action on the item collection
    pub item_seed: SeedMode,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 3000,
            item_store_path: "./data/aliments.json".into(),
            user_store_path: "./data/users.json".into(),
            token_secret: DEV_TOKEN_SECRET.to_string(),
            token_expiry: Duration::from_secs(7 * 24 * 60 * 60),
            cors: CorsPolicy::Any,
            auth_enabled: true,
            protect_item_writes: false,
            login_status: StatusCode::OK,
            item_seed: SeedMode::Reseed,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let login_status = parse_var("ALIMENT_LOGIN_STATUS", defaults.login_status.as_u16())?;
        let login_status = StatusCode::from_u16(login_status)
            .ok()
            .filter(|s| s.is_success())
            .ok_or_else(|| ConfigError {
                var: "ALIMENT_LOGIN_STATUS",
                value: login_status.to_string(),
                reason: "must be a 2xx status".to_string(),
            })?;

        Ok(Self {
            host: parse_var("ALIMENT_HOST", defaults.host)?,
            port: parse_var("ALIMENT_PORT", defaults.port)?,
            item_store_path: parse_var("ALIMENT_ITEM_STORE_PATH", defaults.item_store_path)?,
            user_store_path: parse_var("ALIMENT_USER_STORE_PATH", defaults.user_store_path)?,
            token_secret: parse_var("ALIMENT_TOKEN_SECRET", defaults.token_secret)?,
            token_expiry: Duration::from_secs(parse_var(
                "ALIMENT_TOKEN_EXPIRY_SECS",
                defaults.token_expiry.as_secs(),
            )?),
            cors: parse_var("ALIMENT_CORS", defaults.cors)?,
            auth_enabled: parse_var("ALIMENT_AUTH_ENABLED", defaults.auth_enabled)?,
            protect_item_writes: parse_var(
                "ALIMENT_PROTECT_ITEM_WRITES",
                defaults.protect_item_writes,
            )?,
            login_status,
            item_seed: parse_var("ALIMENT_ITEM_SEED", defaults.item_seed)?,
            log_level: parse_var("ALIMENT_LOG_LEVEL", defaults.log_level)?,
        })
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_var<T>(var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(value) => value.parse().map_err(|e: T::Err| ConfigError {
            var,
            reason: e.to_string(),
            value,
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VARS: [&str; 12] = [
        "ALIMENT_HOST",
        "ALIMENT_PORT",
        "ALIMENT_ITEM_STORE_PATH",
        "ALIMENT_USER_STORE_PATH",
        "ALIMENT_TOKEN_SECRET",
        "ALIMENT_TOKEN_EXPIRY_SECS",
        "ALIMENT_CORS",
        "ALIMENT_AUTH_ENABLED",
        "ALIMENT_PROTECT_ITEM_WRITES",
        "ALIMENT_LOGIN_STATUS",
        "ALIMENT_ITEM_SEED",
        "ALIMENT_LOG_LEVEL",
    ];

    #[test]
    fn test_default_config() {
        // Clear any existing env vars
        for var in VARS {
            env::remove_var(var);
        }

        let config = Config::from_env().unwrap();

        assert_eq!(config.bind_addr().to_string(), "0.0.0.0:3000");
        assert_eq!(config.item_store_path, PathBuf::from("./data/aliments.json"));
        assert_eq!(config.user_store_path, PathBuf::from("./data/users.json"));
        assert_eq!(config.token_expiry, Duration::from_secs(604_800));
        assert_eq!(config.cors, CorsPolicy::Any);
        assert!(config.auth_enabled);
        assert!(!config.protect_item_writes);
        assert_eq!(config.login_status, StatusCode::OK);
        assert_eq!(config.item_seed, SeedMode::Reseed);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_cors_policy_parsing() {
        assert_eq!("*".parse::<CorsPolicy>().unwrap(), CorsPolicy::Any);
        assert_eq!("none".parse::<CorsPolicy>().unwrap(), CorsPolicy::Disabled);
        assert_eq!(
            "http://a.test, http://b.test".parse::<CorsPolicy>().unwrap(),
            CorsPolicy::Origins(vec![
                HeaderValue::from_static("http://a.test"),
                HeaderValue::from_static("http://b.test"),
            ])
        );
    }
}
