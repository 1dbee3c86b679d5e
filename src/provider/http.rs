use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{EventEmitter, Eip1193Provider, ProviderError, ProviderResult};

const JSONRPC_VERSION: &str = "2.0";

#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

/// Provider backed by a node's JSON-RPC endpoint.
///
/// A node has no approval prompt, so `eth_requestAccounts` is served from
/// `eth_accounts`. Nodes push no notifications; the emitter stays silent.
#[derive(Clone)]
pub struct HttpProvider {
    inner: Client,
    url: Url,
    auth_token: Option<String>,
    next_id: Arc<AtomicU64>,
    events: Arc<EventEmitter>,
}

impl HttpProvider {
    pub fn from_endpoint(
        endpoint: &str,
        auth_token: Option<String>,
        timeout: Duration,
    ) -> ProviderResult<Self> {
        let url = Url::parse(endpoint)
            .map_err(|err| ProviderError::Transport(format!("invalid endpoint: {err}")))?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| ProviderError::Transport(err.to_string()))?;
        Ok(Self {
            inner: client,
            url,
            auth_token,
            next_id: Arc::new(AtomicU64::new(1)),
            events: EventEmitter::new(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl Eip1193Provider for HttpProvider {
    async fn request(&self, method: &str, params: Value) -> ProviderResult<Value> {
        let method = match method {
            "eth_requestAccounts" => "eth_accounts",
            other => other,
        };
        let payload = JsonRpcRequest {
            jsonrpc: JSONRPC_VERSION,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        debug!(method, endpoint = %self.url, "json-rpc request");

        let mut request = self.inner.post(self.url.clone()).json(&payload);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|err| ProviderError::Transport(err.to_string()))?;
        if !response.status().is_success() {
            return Err(ProviderError::Transport(format!(
                "HTTP status {}",
                response.status()
            )));
        }

        let response: JsonRpcResponse = response
            .json()
            .await
            .map_err(|err| ProviderError::Transport(err.to_string()))?;
        if let Some(error) = response.error {
            return Err(ProviderError::Rpc {
                code: error.code,
                message: error.message,
                data: error.data,
            });
        }
        Ok(response.result.unwrap_or(Value::Null))
    }

    fn events(&self) -> &Arc<EventEmitter> {
        &self.events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_endpoint() {
        let result = HttpProvider::from_endpoint("not a url", None, Duration::from_secs(1));
        assert!(matches!(result, Err(ProviderError::Transport(_))));
    }

    #[test]
    fn keeps_endpoint_verbatim() {
        let provider =
            HttpProvider::from_endpoint("http://127.0.0.1:8545", None, Duration::from_secs(1))
                .expect("provider");
        assert_eq!(provider.endpoint().as_str(), "http://127.0.0.1:8545/");
        assert_eq!(provider.events().listener_count(), 0);
    }
}
