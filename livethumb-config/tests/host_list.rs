use std::net::SocketAddr;

use axum::{Json, Router, http::StatusCode, routing::get};
use livethumb_config::{ConfigLoadError, HostListError, HostSource};
use tokio::net::TcpListener;
use url::Url;

async fn hosts() -> Json<Vec<&'static str>> {
    Json(vec!["edge-1", "", "  edge-2 "])
}

async fn missing() -> StatusCode {
    StatusCode::NOT_FOUND
}

async fn not_a_list() -> &'static str {
    "{\"hosts\": []}"
}

async fn serve() -> SocketAddr {
    let app = Router::new()
        .route("/hosts.json", get(hosts))
        .route("/missing.json", get(missing))
        .route("/object.json", get(not_a_list));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn source(addr: SocketAddr, path: &str) -> HostSource {
    HostSource::ListUrl(Url::parse(&format!("http://{addr}{path}")).unwrap())
}

#[tokio::test]
async fn list_url_resolves_to_trimmed_hosts() {
    let addr = serve().await;
    let client = reqwest::Client::new();

    let hosts = source(addr, "/hosts.json").resolve(&client).await.unwrap();
    assert_eq!(hosts, vec!["edge-1".to_string(), "edge-2".to_string()]);
}

#[tokio::test]
async fn non_success_status_is_reported() {
    let addr = serve().await;
    let client = reqwest::Client::new();

    let err = source(addr, "/missing.json")
        .resolve(&client)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ConfigLoadError::HostList {
            source: HostListError::Status(status),
            ..
        } if status == reqwest::StatusCode::NOT_FOUND
    ));
}

#[tokio::test]
async fn body_must_be_a_json_array() {
    let addr = serve().await;
    let client = reqwest::Client::new();

    let err = source(addr, "/object.json")
        .resolve(&client)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ConfigLoadError::HostList {
            source: HostListError::Body(_),
            ..
        }
    ));
}

#[tokio::test]
async fn static_hosts_resolve_without_network() {
    let client = reqwest::Client::new();
    let hosts = HostSource::Static(vec!["a".into(), " ".into()])
        .resolve(&client)
        .await
        .unwrap();
    assert_eq!(hosts, vec!["a".to_string()]);
}
