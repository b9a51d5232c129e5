use reqwest::{StatusCode, Url};
use serde_json::{json, Map, Value};

use crate::config::RemoteConfig;
use crate::error::{AppError, AppResult};

/// Low-latency key-value metadata store. Reads go through the connection
/// string's read token; writes go through the management API and need the
/// store id plus a bearer token.
#[derive(Clone)]
pub struct EdgeConfigClient {
    http: reqwest::Client,
    read_base: Option<String>,
    read_token: Option<String>,
    config: RemoteConfig,
}

/// Splits `https://host/<id>?token=<t>` into its base URL and read token.
fn parse_connection_string(raw: &str) -> Option<(String, Option<String>)> {
    if raw.is_empty() {
        return None;
    }
    let mut url = Url::parse(raw).ok()?;
    let token = url
        .query_pairs()
        .find(|(k, _)| k == "token")
        .map(|(_, v)| v.into_owned());
    url.set_query(None);
    Some((url.as_str().trim_end_matches('/').to_string(), token))
}

impl EdgeConfigClient {
    pub fn new(http: reqwest::Client, config: RemoteConfig) -> Self {
        let (read_base, read_token) = match parse_connection_string(&config.edge_config) {
            Some((base, token)) => (Some(base), token),
            None => (None, None),
        };
        Self {
            http,
            read_base,
            read_token,
            config,
        }
    }

    fn read_url(&self, suffix: &str) -> AppResult<String> {
        let base = self
            .read_base
            .as_ref()
            .ok_or_else(|| AppError::Configuration("EDGE_CONFIG is not set".into()))?;
        Ok(format!("{}/{}", base, suffix))
    }

    fn authorized(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.read_token {
            Some(token) => req.query(&[("token", token)]),
            None => req,
        }
    }

    pub async fn get_all_items(&self) -> AppResult<Map<String, Value>> {
        let url = self.read_url("items")?;
        let response = self.authorized(self.http.get(&url)).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Remote(format!("Edge Config read {}: {}", status, body)));
        }

        match response.json::<Value>().await? {
            Value::Object(items) => Ok(items),
            other => Err(AppError::Remote(format!(
                "Edge Config items response is not an object: {}",
                other
            ))),
        }
    }

    pub async fn get_item(&self, key: &str) -> AppResult<Option<Value>> {
        let url = self.read_url(&format!("item/{}", key))?;
        let response = self.authorized(self.http.get(&url)).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            return Err(AppError::Remote(format!("Edge Config read {}: {}", key, status)));
        }
        Ok(Some(response.json::<Value>().await?))
    }

    pub async fn has_item(&self, key: &str) -> AppResult<bool> {
        Ok(self.get_item(key).await?.is_some())
    }

    /// Upserts all `items` in one PATCH. Credentials are checked before any
    /// request is built.
    pub async fn upsert_items(&self, items: Vec<(&str, Value)>) -> AppResult<()> {
        let (store_id, token) = self.config.write_credentials()?;

        let operations: Vec<Value> = items
            .into_iter()
            .map(|(key, value)| {
                json!({
                    "operation": "upsert",
                    "key": key,
                    "value": value,
                })
            })
            .collect();

        let url = format!(
            "{}/v1/edge-config/{}/items",
            self.config.edge_config_api_url.trim_end_matches('/'),
            store_id
        );
        let response = self
            .http
            .patch(&url)
            .bearer_auth(token)
            .json(&json!({ "items": operations }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Remote(format!(
                "Edge Config update failed {}: {}",
                status, body
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_parse_connection_string() {
        let (base, token) =
            parse_connection_string("https://edge-config.vercel.com/ecfg_abc?token=xyz").unwrap();
        assert_eq!(base, "https://edge-config.vercel.com/ecfg_abc");
        assert_eq!(token.as_deref(), Some("xyz"));

        assert!(parse_connection_string("").is_none());
        assert!(parse_connection_string("not a url").is_none());
    }

    #[tokio::test]
    async fn test_get_item_absent_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ecfg_test/item/missing"))
            .and(query_param("token", "read-token"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = EdgeConfigClient::new(
            reqwest::Client::new(),
            RemoteConfig::for_mock_server(&server.uri()),
        );
        assert_eq!(client.get_item("missing").await.unwrap(), None);
        assert!(!client.has_item("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_upsert_sends_single_batched_patch() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/v1/edge-config/ecfg_test/items"))
            .and(header("authorization", "Bearer api-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
            .expect(1)
            .mount(&server)
            .await;

        let client = EdgeConfigClient::new(
            reqwest::Client::new(),
            RemoteConfig::for_mock_server(&server.uri()),
        );
        client
            .upsert_items(vec![("a", json!(1)), ("b", json!("two"))])
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: Value = requests[0].body_json().unwrap();
        let items = body["items"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["operation"], "upsert");
        assert_eq!(items[1]["key"], "b");
    }

    #[tokio::test]
    async fn test_unconfigured_read_is_configuration_error() {
        let mut config = RemoteConfig::for_mock_server("http://localhost");
        config.edge_config.clear();

        let client = EdgeConfigClient::new(reqwest::Client::new(), config);
        let result = client.get_all_items().await;
        assert!(matches!(result, Err(AppError::Configuration(_))));
    }
}
