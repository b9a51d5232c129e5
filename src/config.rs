use std::env;
use std::time::Duration;

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub frontend_url: String,

    pub remote: RemoteConfig,

    pub cache_expiry_secs: u64,
    pub sync_interval_secs: u64,
}

/// Endpoints and credentials for the remote snapshot pair
/// (Edge Config metadata + Blob bulk storage).
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// Read connection string: `https://edge-config.vercel.com/<id>?token=<read token>`
    pub edge_config: String,
    pub edge_config_id: String,
    pub api_token: String,
    pub edge_config_api_url: String,

    pub blob_token: String,
    pub blob_api_url: String,

    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://moodlog.db?mode=rwc".into()),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()
                .unwrap_or(8080),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".into()),

            remote: RemoteConfig::from_env(),

            cache_expiry_secs: env::var("CACHE_EXPIRY_SECS")
                .unwrap_or_else(|_| "600".into()) // 10 minutes
                .parse()
                .unwrap_or(600),
            sync_interval_secs: env::var("SYNC_INTERVAL_SECS")
                .unwrap_or_else(|_| "300".into()) // 5 minutes
                .parse()
                .unwrap_or(300),
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn cache_expiry(&self) -> Duration {
        Duration::from_secs(self.cache_expiry_secs)
    }

    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }
}

impl RemoteConfig {
    pub fn from_env() -> Self {
        Self {
            edge_config: env::var("EDGE_CONFIG").unwrap_or_default(),
            edge_config_id: env::var("EDGE_CONFIG_ID").unwrap_or_default(),
            api_token: env::var("VERCEL_API_TOKEN").unwrap_or_default(),
            edge_config_api_url: env::var("EDGE_CONFIG_API_URL")
                .unwrap_or_else(|_| "https://api.vercel.com".into()),

            blob_token: env::var("BLOB_READ_WRITE_TOKEN").unwrap_or_default(),
            blob_api_url: env::var("BLOB_API_URL")
                .unwrap_or_else(|_| "https://blob.vercel-storage.com".into()),

            retry_attempts: env::var("REMOTE_RETRY_ATTEMPTS")
                .unwrap_or_else(|_| "3".into())
                .parse()
                .unwrap_or(3),
            retry_delay_ms: env::var("REMOTE_RETRY_DELAY_MS")
                .unwrap_or_else(|_| "1000".into())
                .parse()
                .unwrap_or(1000),
        }
    }

    /// Store id and bearer token required for metadata writes.
    pub fn write_credentials(&self) -> AppResult<(&str, &str)> {
        if self.edge_config_id.is_empty() || self.api_token.is_empty() {
            return Err(AppError::Configuration(
                "EDGE_CONFIG_ID and VERCEL_API_TOKEN must be set to publish metadata".into(),
            ));
        }
        Ok((&self.edge_config_id, &self.api_token))
    }

    pub fn blob_credentials(&self) -> AppResult<&str> {
        if self.blob_token.is_empty() {
            return Err(AppError::Configuration(
                "BLOB_READ_WRITE_TOKEN must be set to publish entries".into(),
            ));
        }
        Ok(&self.blob_token)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[cfg(test)]
impl RemoteConfig {
    /// Points every remote endpoint at a single mock server.
    pub fn for_mock_server(base: &str) -> Self {
        Self {
            edge_config: format!("{base}/ecfg_test?token=read-token"),
            edge_config_id: "ecfg_test".into(),
            api_token: "api-token".into(),
            edge_config_api_url: base.to_string(),
            blob_token: "blob-token".into(),
            blob_api_url: base.to_string(),
            retry_attempts: 3,
            retry_delay_ms: 1,
        }
    }
}
