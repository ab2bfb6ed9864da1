//! HTTP backend against a wiremock faucet and node service

#![cfg(feature = "http")]

use serde_json::{json, Value};
use std::sync::Arc;

use job_market_adapter::backend::http::{HttpClientFactory, HttpRuntimeLoader};
use job_market_adapter::backend::RuntimeLoader;
use job_market_adapter::queries::GET_JOBS;
use job_market_adapter::{AdapterConfig, AdapterError, ConnectionAdapter, ErrorKind};
use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CHAIN: &str = "e476187f6ddfeb9d588c7b45d3df334d5501d6499b3f9ad5595cae86cce16a65";
const APP: &str = "58e1c0a4f7d2";

fn config_for(server: &MockServer) -> AdapterConfig {
    AdapterConfig {
        faucet_url: server.uri(),
        node_service_url: format!("{}/", server.uri()),
        ..AdapterConfig::default()
    }
    .with_application_id(APP)
}

fn adapter_for(config: &AdapterConfig) -> ConnectionAdapter {
    ConnectionAdapter::new(
        config.clone(),
        Arc::new(HttpClientFactory::new(config)),
        Arc::new(HttpRuntimeLoader::new(config)),
    )
}

async fn mount_faucet(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_string_contains("genesisConfig"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "genesisConfig": { "network": "local" } }
        })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/"))
        .and(body_string_contains("claim(owner:"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "claim": { "chainId": CHAIN } }
        })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_connect_bind_and_query_over_http() {
    let server = MockServer::start().await;
    mount_faucet(&server).await;

    Mock::given(method("POST"))
        .and(path(format!("/chains/{}/applications/{}", CHAIN, APP)))
        .and(body_partial_json(json!({ "query": GET_JOBS })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "jobs": [] }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = adapter_for(&config_for(&server));

    let session = adapter.connect("0xD23E5B1C").await.unwrap();
    assert_eq!(session.chain_id().0, CHAIN);
    assert_eq!(session.identity(), "0xd23e5b1c");

    adapter.connect_configured_application().await.unwrap();
    let jobs: Value = adapter.query(GET_JOBS, None, None).await.unwrap();
    assert_eq!(jobs, json!({ "jobs": [] }));

    adapter.disconnect();
}

#[tokio::test]
async fn test_application_http_error_is_application_error() {
    let server = MockServer::start().await;
    mount_faucet(&server).await;

    Mock::given(method("POST"))
        .and(path(format!("/chains/{}/applications/{}", CHAIN, APP)))
        .respond_with(ResponseTemplate::new(500).set_body_string("node exploded"))
        .mount(&server)
        .await;

    let adapter = adapter_for(&config_for(&server));
    adapter.connect("0xabc").await.unwrap();
    adapter.connect_configured_application().await.unwrap();

    let err = adapter.query::<Value>(GET_JOBS, None, None).await.unwrap_err();
    assert_eq!(err, AdapterError::Application("HTTP 500 - node exploded".into()));
    adapter.disconnect();
}

#[tokio::test]
async fn test_unexpected_claim_response_fails_connect() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("genesisConfig"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "genesisConfig": {} }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains("claim(owner:"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "claim": 42 }
        })))
        .mount(&server)
        .await;

    let adapter = adapter_for(&config_for(&server));

    let err = adapter.connect("0xabc").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Network);
    assert!(!adapter.is_connected());
}

#[tokio::test]
async fn test_faucet_graphql_error_is_query_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": null,
            "errors": [{ "message": "faucet is out of tokens" }]
        })))
        .mount(&server)
        .await;

    let adapter = adapter_for(&config_for(&server));

    let err = adapter.connect("0xabc").await.unwrap_err();
    assert_eq!(err, AdapterError::Query("faucet is out of tokens".into()));
}

#[tokio::test]
async fn test_invalid_faucet_url_is_config_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let adapter = adapter_for(&config_for(&server));

    let err = adapter
        .connect_with_endpoint("0xabc", Some("not a url"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[tokio::test]
async fn test_runtime_loader_reports_unreachable_node() {
    let config = AdapterConfig {
        node_service_url: "http://127.0.0.1:1".into(),
        ..AdapterConfig::default()
    };

    let err = HttpRuntimeLoader::new(&config).initialize().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Initialization);
}

#[tokio::test]
async fn test_runtime_loader_accepts_any_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let config = AdapterConfig {
        node_service_url: server.uri(),
        ..AdapterConfig::default()
    };

    HttpRuntimeLoader::new(&config).initialize().await.unwrap();
}
