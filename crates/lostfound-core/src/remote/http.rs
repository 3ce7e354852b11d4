use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde_json::Value;
use tracing::debug;

use crate::model::{Item, ItemPatch, NewItem};
use crate::remote::{ItemBackend, ItemFilter, RemoteError, envelope};

/// REST backend for the item catalog.
///
/// Endpoints, relative to `base_url`:
///
/// | call   | method | path               |
/// |--------|--------|--------------------|
/// | list   | GET    | `items?search=..`  |
/// | create | POST   | `items`            |
/// | claim  | PUT    | `items/{id}/claim` |
/// | update | PUT    | `items/{id}`       |
/// | delete | DELETE | `items/{id}`       |
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base: Url,
    token: Option<String>,
    timeout: Duration,
}

impl HttpBackend {
    /// # Errors
    ///
    /// Fails when `base_url` is not an absolute URL that can carry path
    /// segments, or when the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let mut base = Url::parse(base_url.trim())
            .map_err(|e| anyhow::anyhow!("invalid API URL '{base_url}': {e}"))?;
        if base.cannot_be_a_base() {
            anyhow::bail!("API URL '{base_url}' cannot carry a path");
        }
        if let Ok(mut segments) = base.path_segments_mut() {
            segments.pop_if_empty();
        }
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("lostfound/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base,
            token: None,
            timeout,
        })
    }

    #[must_use]
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.trim().is_empty());
        self
    }

    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.extend(segments);
        }
        url
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, RemoteError> {
        let response = builder.send().await.map_err(|e| self.transport_error(&e))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(RemoteError::Status {
            status: status.as_u16(),
            message: error_message(&body),
        })
    }

    fn transport_error(&self, err: &reqwest::Error) -> RemoteError {
        if err.is_timeout() {
            RemoteError::Timeout(self.timeout)
        } else if err.is_decode() {
            RemoteError::Decode(err.to_string())
        } else {
            RemoteError::Connect(err.to_string())
        }
    }

    async fn body(&self, response: Response) -> Result<Option<Value>, RemoteError> {
        let bytes = response.bytes().await.map_err(|e| self.transport_error(&e))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| RemoteError::Decode(e.to_string()))
    }
}

/// Pull a human-readable message out of an error body.
///
/// Prefers a JSON `message` or `error` field, then the raw text.
fn error_message(body: &str) -> String {
    let from_json = serde_json::from_str::<Value>(body).ok().and_then(|value| {
        let value = envelope::unwrap_data(value);
        ["message", "error"]
            .iter()
            .find_map(|key| value.get(key).and_then(Value::as_str).map(str::to_string))
    });
    from_json.unwrap_or_else(|| body.trim().chars().take(200).collect())
}

#[async_trait]
impl ItemBackend for HttpBackend {
    async fn list_items(&self, filter: &ItemFilter) -> Result<Vec<Item>, RemoteError> {
        let mut url = self.url(&["items"]);
        {
            let pairs = filter.query_pairs();
            if !pairs.is_empty() {
                url.query_pairs_mut().extend_pairs(pairs);
            }
        }
        debug!(url = %url, "listing items");
        let response = self.send(self.request(Method::GET, url)).await?;
        let body = self
            .body(response)
            .await?
            .ok_or_else(|| RemoteError::Decode("empty list response".to_string()))?;
        envelope::decode_list(body)
    }

    async fn create_item(&self, draft: &NewItem) -> Result<Option<Item>, RemoteError> {
        let url = self.url(&["items"]);
        let response = self
            .send(self.request(Method::POST, url).json(draft))
            .await?;
        // A 2xx with an unreadable body still created the item.
        Ok(self.body(response).await.ok().flatten().and_then(envelope::decode_one))
    }

    async fn claim_item(&self, id: &str) -> Result<(), RemoteError> {
        let url = self.url(&["items", id, "claim"]);
        self.send(self.request(Method::PUT, url)).await.map(drop)
    }

    async fn update_item(&self, id: &str, patch: &ItemPatch) -> Result<(), RemoteError> {
        let url = self.url(&["items", id]);
        self.send(self.request(Method::PUT, url).json(patch))
            .await
            .map(drop)
    }

    async fn delete_item(&self, id: &str) -> Result<(), RemoteError> {
        let url = self.url(&["items", id]);
        self.send(self.request(Method::DELETE, url)).await.map(drop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(base: &str) -> HttpBackend {
        HttpBackend::new(base, Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn urls_are_built_from_segments() {
        let http = backend("http://example.test/api/");
        assert_eq!(
            http.url(&["items", "a/b", "claim"]).as_str(),
            "http://example.test/api/items/a%2Fb/claim"
        );
        assert_eq!(
            backend("http://example.test/api").url(&["items"]).as_str(),
            "http://example.test/api/items"
        );
    }

    #[test]
    fn rejects_unusable_base_urls() {
        assert!(HttpBackend::new("not a url", Duration::from_secs(1)).is_err());
        assert!(HttpBackend::new("mailto:me@example.test", Duration::from_secs(1)).is_err());
    }

    #[test]
    fn blank_tokens_are_dropped() {
        let http = backend("http://example.test").with_token(Some("  ".into()));
        assert!(http.token.is_none());
    }

    #[test]
    fn error_messages_prefer_json_fields() {
        assert_eq!(error_message(r#"{"message":"already claimed"}"#), "already claimed");
        assert_eq!(error_message(r#"{"data":{"error":"nope"}}"#), "nope");
        assert_eq!(error_message("  Bad Gateway \n"), "Bad Gateway");
    }

    #[tokio::test]
    async fn unreachable_host_is_a_network_failure() {
        // Port 9 (discard) is not expected to accept connections locally.
        let http = backend("http://127.0.0.1:9/api");
        let err = http.list_items(&ItemFilter::default()).await.unwrap_err();
        assert!(err.is_network(), "{err:?}");
    }
}
