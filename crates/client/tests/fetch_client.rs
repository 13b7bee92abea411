//! Integration tests for FetchClient and the worker over real HTTP.
//!
//! Uses wiremock for HTTP mocking and the SQLite store in memory.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use tether_client::{
    FetchClient, FetchConfig, FetchOutcome, FetchRequest, HeadlessHost, Network, OFFLINE_BODY, ResponseType,
    ServiceWorker,
};
use tether_core::{CacheDb, CacheStore, Error};
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn create_test_client(origin: &str) -> FetchClient {
    let config = FetchConfig {
        origin: Url::parse(origin).unwrap(),
        timeout: Duration::from_secs(5),
        ..Default::default()
    };
    FetchClient::new(config).expect("failed to create client")
}

fn page(server: &MockServer, p: &str) -> Url {
    Url::parse(&server.uri()).unwrap().join(p).unwrap()
}

#[tokio::test]
async fn test_same_origin_response_is_basic() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/programs"))
        .and(header("user-agent", "tether/0.1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html>programs</html>")
                .insert_header("content-type", "text/html")
                .insert_header("etag", "\"abc123\""),
        )
        .mount(&server)
        .await;

    let client = create_test_client(&server.uri());
    let response = client.fetch(&FetchRequest::navigate(page(&server, "/programs"))).await.unwrap();

    assert_eq!(response.status.as_u16(), 200);
    assert_eq!(response.response_type, ResponseType::Basic);
    assert!(response.is_cacheable());
    assert_eq!(response.content_type(), Some("text/html"));
    assert_eq!(response.headers.get("etag").unwrap(), "\"abc123\"");
    assert_eq!(response.body_text(), "<html>programs</html>");
}

#[tokio::test]
async fn test_error_status_is_a_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("nope"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = create_test_client(&server.uri());

    let missing = client.fetch(&FetchRequest::get(page(&server, "/missing"))).await.unwrap();
    assert_eq!(missing.status.as_u16(), 404);
    assert_eq!(missing.status_text, "Not Found");
    assert!(!missing.is_cacheable());

    let broken = client.fetch(&FetchRequest::get(page(&server, "/broken"))).await.unwrap();
    assert_eq!(broken.status.as_u16(), 500);
}

#[tokio::test]
async fn test_other_origin_response_is_cors() {
    let app = MockServer::start().await;
    let cdn = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/lib.js"))
        .respond_with(ResponseTemplate::new(200).set_body_string("lib"))
        .mount(&cdn)
        .await;

    let client = create_test_client(&app.uri());
    let response = client.fetch(&FetchRequest::get(page(&cdn, "/lib.js"))).await.unwrap();

    assert_eq!(response.status.as_u16(), 200);
    assert_eq!(response.response_type, ResponseType::Cors);
    assert!(!response.is_cacheable());
}

#[tokio::test]
async fn test_redirect_off_origin_is_cors() {
    let app = MockServer::start().await;
    let elsewhere = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/landing"))
        .respond_with(ResponseTemplate::new(200).set_body_string("landed"))
        .mount(&elsewhere)
        .await;
    Mock::given(method("GET"))
        .and(path("/moved"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", page(&elsewhere, "/landing").as_str()))
        .mount(&app)
        .await;

    let client = create_test_client(&app.uri());
    let response = client.fetch(&FetchRequest::get(page(&app, "/moved"))).await.unwrap();

    assert_eq!(response.url.as_ref().unwrap().path(), "/landing");
    assert_eq!(response.response_type, ResponseType::Cors);
}

#[tokio::test]
async fn test_non_get_methods_are_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/programs"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let client = create_test_client(&server.uri());
    let request = FetchRequest::new(Method::POST, page(&server, "/api/programs"));
    let response = client.fetch(&request).await.unwrap();
    assert_eq!(response.status.as_u16(), 201);
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/big"))
        .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(64)))
        .mount(&server)
        .await;

    let config = FetchConfig { origin: Url::parse(&server.uri()).unwrap(), max_bytes: 16, ..Default::default() };
    let client = FetchClient::new(config).unwrap();
    let err = client.fetch(&FetchRequest::get(page(&server, "/big"))).await.unwrap_err();

    assert!(matches!(err, Error::Network(ref m) if m.contains("exceeds")));
}

#[tokio::test]
async fn test_unreachable_server_is_an_error() {
    let server = MockServer::start().await;
    let origin = server.uri();
    let target = page(&server, "/programs");
    drop(server);

    let client = create_test_client(&origin);
    let err = client.fetch(&FetchRequest::get(target)).await.unwrap_err();
    assert!(matches!(err, Error::Network(_)));
}

#[tokio::test]
async fn test_extension_scheme_is_an_error() {
    let client = create_test_client("http://localhost:3000");
    let target = Url::parse("chrome-extension://abcdef/inject.js").unwrap();
    assert!(matches!(client.fetch(&FetchRequest::get(target)).await, Err(Error::Network(_))));
}

#[tokio::test]
async fn test_worker_survives_server_going_away() {
    let server = MockServer::start().await;
    for (p, body) in [("/", "<html>home</html>"), ("/app.css", "body{}"), ("/programs", "<html>programs</html>")] {
        Mock::given(method("GET"))
            .and(path(p))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;
    }

    let origin = Url::parse(&server.uri()).unwrap();
    let db = CacheDb::open_in_memory().await.unwrap();
    let store: Arc<dyn CacheStore> = Arc::new(db.clone());
    let network = Arc::new(create_test_client(origin.as_str()));
    let worker = ServiceWorker::new("1.2.4", origin.clone(), store.clone(), network, Arc::new(HeadlessHost))
        .with_manifest(vec!["/".into(), "/app.css".into()]);

    worker.install().await.unwrap();
    worker.activate().await.unwrap();

    let programs = FetchRequest::navigate(page(&server, "/programs"));
    assert!(matches!(worker.handle_fetch(&programs).await, FetchOutcome::Network(_)));
    worker.settle().await;
    assert_eq!(store.generations().await.unwrap(), vec!["1.2.4"]);

    drop(server);

    match worker.handle_fetch(&programs).await {
        FetchOutcome::Cache(response) => assert_eq!(response.body_text(), "<html>programs</html>"),
        other => panic!("expected cache hit, got {other:?}"),
    }

    let css = FetchRequest::get(origin.join("/app.css").unwrap());
    assert!(matches!(worker.handle_fetch(&css).await, FetchOutcome::Cache(ref r) if r.body_text() == "body{}"));

    let unseen = FetchRequest::navigate(origin.join("/settings").unwrap());
    match worker.handle_fetch(&unseen).await {
        FetchOutcome::Offline(response) => {
            assert_eq!(response.status.as_u16(), 503);
            assert_eq!(response.body_text(), OFFLINE_BODY);
        }
        other => panic!("expected offline placeholder, got {other:?}"),
    }

    let script = FetchRequest::get(origin.join("/chunk.js").unwrap());
    assert!(matches!(worker.handle_fetch(&script).await, FetchOutcome::NoResponse(_)));
}
