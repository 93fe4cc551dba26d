//! Environment-sourced configuration for the CLI. Library consumers build
//! [`auth::Credentials`](crate::auth::Credentials) directly; this module is
//! the `.env`/env-var wiring for `src/bin/cdsetool.rs`.

use std::path::PathBuf;

use thiserror::Error;

use crate::auth::DEFAULT_DISCOVERY_URL;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {0} value")]
    Invalid(&'static str),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub username: Option<String>,
    pub password: Option<String>,
    pub discovery_url: String,
    pub credentials_file: Option<PathBuf>,
    pub concurrency: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let concurrency = std::env::var("CDSETOOL_CONCURRENCY")
            .ok()
            .map(|v| v.parse::<usize>())
            .transpose()
            .map_err(|_| ConfigError::Invalid("CDSETOOL_CONCURRENCY"))?
            .unwrap_or(1);

        Ok(Config {
            username: std::env::var("CDSETOOL_USERNAME").ok(),
            password: std::env::var("CDSETOOL_PASSWORD").ok(),
            discovery_url: std::env::var("CDSETOOL_DISCOVERY_URL")
                .unwrap_or_else(|_| DEFAULT_DISCOVERY_URL.to_string()),
            credentials_file: std::env::var("CDSETOOL_CREDENTIALS_FILE").ok().map(PathBuf::from),
            concurrency,
        })
    }
}
