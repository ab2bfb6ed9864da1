//! Faucet and node-service backend.
//!
//! The faucet issues wallets and claims chains over GraphQL/HTTP. Each
//! application is served by the node service at
//! `{node}/chains/{chain}/applications/{app}`. Chain notifications arrive
//! through a `graphql-transport-ws` subscription on `{node}/ws`, kept alive
//! by a background task that reconnects with capped exponential backoff.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, info, warn};

use super::traits::*;
use crate::adapter::{GraphQlRequest, GraphQlResponse};
use crate::config::AdapterConfig;
use crate::error::{AdapterError, Result};

const INITIAL_RECONNECT_DELAY: Duration = Duration::from_millis(500);
const MAX_RECONNECT_DELAY: Duration = Duration::from_secs(30);
const SUBSCRIPTION_ID: &str = "1";

/// Treats the runtime as ready once the node service answers.
pub struct HttpRuntimeLoader {
    node_service_url: String,
    http: reqwest::Client,
}

impl HttpRuntimeLoader {
    pub fn new(config: &AdapterConfig) -> Self {
        Self {
            node_service_url: trim_url(&config.node_service_url),
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl RuntimeLoader for HttpRuntimeLoader {
    async fn initialize(&self) -> Result<()> {
        let response = self
            .http
            .get(&self.node_service_url)
            .send()
            .await
            .map_err(|e| AdapterError::Initialization(format!("node service unreachable: {}", e)))?;

        debug!(
            url = %self.node_service_url,
            status = response.status().as_u16(),
            "Node service reachable"
        );
        Ok(())
    }
}

/// Client factory talking to a faucet and a node service.
pub struct HttpClientFactory {
    node_service_url: String,
    http: reqwest::Client,
}

impl HttpClientFactory {
    pub fn new(config: &AdapterConfig) -> Self {
        Self::with_client(config, reqwest::Client::new())
    }

    pub fn with_client(config: &AdapterConfig, http: reqwest::Client) -> Self {
        Self {
            node_service_url: trim_url(&config.node_service_url),
            http,
        }
    }
}

#[async_trait]
impl ClientFactory for HttpClientFactory {
    async fn open_session_service(&self, endpoint: &str) -> Result<Arc<dyn SessionService>> {
        reqwest::Url::parse(endpoint)
            .map_err(|e| AdapterError::Config(format!("invalid faucet url {}: {}", endpoint, e)))?;

        Ok(Arc::new(FaucetService {
            url: trim_url(endpoint),
            http: self.http.clone(),
        }))
    }

    async fn create_client(&self, _wallet: Wallet) -> Result<Arc<dyn SessionHandle>> {
        Ok(Arc::new(NodeServiceClient {
            node_service_url: self.node_service_url.clone(),
            http: self.http.clone(),
        }))
    }
}

/// Faucet GraphQL endpoint
pub struct FaucetService {
    url: String,
    http: reqwest::Client,
}

#[async_trait]
impl SessionService for FaucetService {
    async fn create_wallet(&self) -> Result<Wallet> {
        let data = post_graphql(&self.http, &self.url, "query { genesisConfig }", None).await?;
        Ok(Wallet(data.get("genesisConfig").cloned().unwrap_or(Value::Null)))
    }

    async fn claim_chain(&self, _wallet: &Wallet, identity: &str) -> Result<ChainId> {
        let query = format!("mutation {{ claim(owner: {}) }}", serde_json::to_string(identity)?);
        let data = post_graphql(&self.http, &self.url, &query, None).await?;

        data.get("claim")
            .and_then(extract_chain_id)
            .map(ChainId)
            .ok_or_else(|| AdapterError::Network(format!("unexpected claim response: {}", data)))
    }
}

/// Node service client for one wallet
pub struct NodeServiceClient {
    node_service_url: String,
    http: reqwest::Client,
}

#[async_trait]
impl SessionHandle for NodeServiceClient {
    async fn chain(&self, chain_id: &ChainId) -> Result<Arc<dyn ChainHandle>> {
        Ok(Arc::new(NodeChain {
            node_service_url: self.node_service_url.clone(),
            chain_id: chain_id.clone(),
            http: self.http.clone(),
        }))
    }
}

pub struct NodeChain {
    node_service_url: String,
    chain_id: ChainId,
    http: reqwest::Client,
}

#[async_trait]
impl ChainHandle for NodeChain {
    fn chain_id(&self) -> &ChainId {
        &self.chain_id
    }

    async fn application(
        &self,
        application_id: &ApplicationId,
    ) -> Result<Arc<dyn ApplicationHandle>> {
        Ok(Arc::new(NodeApplication {
            url: format!(
                "{}/chains/{}/applications/{}",
                self.node_service_url, self.chain_id, application_id
            ),
            application_id: application_id.clone(),
            http: self.http.clone(),
        }))
    }

    async fn on_notification(
        &self,
        callback: NotificationCallback,
    ) -> Result<NotificationSubscription> {
        let ws_url = websocket_url(&self.node_service_url)?;
        let chain_id = self.chain_id.clone();

        let task = tokio::spawn(async move {
            notification_loop(ws_url, chain_id, callback).await;
        });

        Ok(NotificationSubscription::new(move || task.abort()))
    }
}

pub struct NodeApplication {
    url: String,
    application_id: ApplicationId,
    http: reqwest::Client,
}

#[async_trait]
impl ApplicationHandle for NodeApplication {
    fn application_id(&self) -> &ApplicationId {
        &self.application_id
    }

    async fn query(&self, payload: &str) -> Result<String> {
        let response = self
            .http
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(payload.to_string())
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::Application(format!("HTTP {} - {}", status, body)));
        }

        Ok(response.text().await?)
    }
}

/// POST a GraphQL request and return its `data`
async fn post_graphql(
    http: &reqwest::Client,
    url: &str,
    query: &str,
    variables: Option<&Value>,
) -> Result<Value> {
    let response = http
        .post(url)
        .json(&GraphQlRequest { query, variables })
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(AdapterError::Network(format!("HTTP {} - {}", status, body)));
    }

    let body: GraphQlResponse = response.json().await?;
    body.into_data()
}

/// Chain id from a claim result: either the id itself or an object carrying it
fn extract_chain_id(claim: &Value) -> Option<String> {
    match claim {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Object(map) => ["chainId", "chain_id", "id"]
            .iter()
            .find_map(|key| map.get(*key))
            .and_then(extract_chain_id),
        _ => None,
    }
}

fn trim_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// `http(s)://host` → `ws(s)://host/ws`
fn websocket_url(node_service_url: &str) -> Result<String> {
    let rest = if let Some(rest) = node_service_url.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = node_service_url.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        return Err(AdapterError::Config(format!(
            "node service url must be http(s): {}",
            node_service_url
        )));
    };
    Ok(format!("{}/ws", rest))
}

/// Keep a notification subscription alive until the task is aborted
async fn notification_loop(ws_url: String, chain_id: ChainId, callback: NotificationCallback) {
    let mut reconnect_delay = INITIAL_RECONNECT_DELAY;

    loop {
        match run_subscription(&ws_url, &chain_id, &callback, &mut reconnect_delay).await {
            Ok(()) => info!(chain = %chain_id, "Notification stream closed"),
            Err(e) => warn!(chain = %chain_id, error = %e, "Notification stream failed"),
        }

        warn!(chain = %chain_id, "Resubscribing to notifications in {:?}...", reconnect_delay);
        tokio::time::sleep(reconnect_delay).await;
        reconnect_delay = (reconnect_delay * 2).min(MAX_RECONNECT_DELAY);
    }
}

async fn run_subscription(
    ws_url: &str,
    chain_id: &ChainId,
    callback: &NotificationCallback,
    reconnect_delay: &mut Duration,
) -> Result<()> {
    let mut request = ws_url
        .into_client_request()
        .map_err(|e| AdapterError::Network(format!("invalid websocket url: {}", e)))?;
    request.headers_mut().insert(
        "Sec-WebSocket-Protocol",
        HeaderValue::from_static("graphql-transport-ws"),
    );

    let (ws, _) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| AdapterError::Network(format!("WebSocket connect failed: {}", e)))?;
    let (mut sink, mut stream) = ws.split();

    send_json(&mut sink, json!({ "type": "connection_init" })).await?;

    while let Some(message) = stream.next().await {
        let message =
            message.map_err(|e| AdapterError::Network(format!("WebSocket error: {}", e)))?;

        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => return Ok(()),
            _ => continue,
        };

        let frame: Value = serde_json::from_str(&text)?;
        match frame.get("type").and_then(Value::as_str) {
            Some("connection_ack") => {
                *reconnect_delay = INITIAL_RECONNECT_DELAY;
                let query = format!(
                    "subscription {{ notifications(chainId: {}) }}",
                    serde_json::to_string(&chain_id.0)?
                );
                send_json(
                    &mut sink,
                    json!({ "id": SUBSCRIPTION_ID, "type": "subscribe", "payload": { "query": query } }),
                )
                .await?;
                info!(chain = %chain_id, "Subscribed to chain notifications");
            }
            Some("ping") => send_json(&mut sink, json!({ "type": "pong" })).await?,
            Some("next") => {
                if let Some(notification) = frame.get("payload").and_then(parse_notification) {
                    callback(notification);
                }
            }
            Some("error") => {
                return Err(AdapterError::Network(format!("subscription rejected: {}", frame)));
            }
            Some("complete") => return Ok(()),
            _ => debug!(frame = %frame, "Ignoring notification frame"),
        }
    }

    Ok(())
}

async fn send_json<S>(sink: &mut S, value: Value) -> Result<()>
where
    S: futures_util::Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    sink.send(Message::Text(value.to_string()))
        .await
        .map_err(|e| AdapterError::Network(format!("WebSocket send failed: {}", e)))
}

/// Decode `{"data": {"notifications": {"reason": ...}}}`
pub(crate) fn parse_notification(payload: &Value) -> Option<Notification> {
    let reason = payload.get("data")?.get("notifications")?.get("reason")?;

    if let Some(block) = reason.get("NewBlock") {
        return Some(Notification::NewBlock {
            height: block.get("height").and_then(Value::as_u64),
            hash: block.get("hash").and_then(Value::as_str).map(str::to_string),
        });
    }

    match reason {
        Value::String(other) => Some(Notification::Other(other.clone())),
        Value::Object(map) => map.keys().next().map(|k| Notification::Other(k.clone())),
        _ => None,
    }
}
