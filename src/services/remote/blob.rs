use serde::Deserialize;
use serde_json::Value;

use crate::config::RemoteConfig;
use crate::error::{AppError, AppResult};

/// Bulk object storage addressed by public URL.
#[derive(Clone)]
pub struct BlobClient {
    http: reqwest::Client,
    config: RemoteConfig,
}

#[derive(Debug, Deserialize)]
struct PutBlobResponse {
    url: String,
}

impl BlobClient {
    pub fn new(http: reqwest::Client, config: RemoteConfig) -> Self {
        Self { http, config }
    }

    /// Uploads `body` at a fixed `pathname`, overwriting any previous object,
    /// and returns its public URL.
    pub async fn put(&self, pathname: &str, body: String, content_type: &str) -> AppResult<String> {
        let token = self.config.blob_credentials()?;
        let url = format!(
            "{}/{}",
            self.config.blob_api_url.trim_end_matches('/'),
            pathname
        );

        let response = self
            .http
            .put(&url)
            .bearer_auth(token)
            .header("x-api-version", "7")
            .header("x-content-type", content_type)
            .header("x-add-random-suffix", "0")
            .header("x-allow-overwrite", "1")
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Remote(format!("Blob upload failed {}: {}", status, text)));
        }

        let uploaded: PutBlobResponse = response.json().await?;
        Ok(uploaded.url)
    }

    pub async fn fetch_json(&self, url: &str) -> AppResult<Value> {
        let response = self.http.get(url).send().await?;

        if !response.status().is_success() {
            return Err(AppError::Remote(format!(
                "Blob fetch {} returned {}",
                url,
                response.status()
            )));
        }

        Ok(response.json::<Value>().await?)
    }
}
