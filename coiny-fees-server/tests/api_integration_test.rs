use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use coiny_fees_server::config::{AppConfig, PublisherKind, SourceConfig, SourceKind, StoreKind};
use coiny_fees_server::server::create_app;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Providers {
    bitgo: MockServer,
    esplora: MockServer,
    webhook: MockServer,
}

impl Providers {
    async fn start() -> Self {
        Self {
            bitgo: MockServer::start().await,
            esplora: MockServer::start().await,
            webhook: MockServer::start().await,
        }
    }

    /// BitGo in sat/kB, Esplora in sat/vB
    async fn mount_fees(&self, expected_calls: u64) {
        Mock::given(method("GET"))
            .and(path("/api/v1/tx/fee"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "feePerKb": 10000,
                "feeByBlockTarget": {"2": 10000, "6": 5000, "144": 1000}
            })))
            .expect(expected_calls)
            .mount(&self.bitgo)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/fee-estimates"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"2": 12.0, "6": 4.0, "144": 2.0})),
            )
            .expect(expected_calls)
            .mount(&self.esplora)
            .await;
    }

    fn config(&self, data_dir: &TempDir) -> AppConfig {
        let mut config = AppConfig::default();
        config.sources.primary = SourceConfig {
            url: self.bitgo.uri(),
            ..SourceConfig::of_kind(SourceKind::Bitgo)
        };
        config.sources.secondary = SourceConfig {
            url: self.esplora.uri(),
            ..SourceConfig::of_kind(SourceKind::Esplora)
        };
        config.sources.timeout_ms = 2_000;
        config.persistence.backend = StoreKind::File;
        config.persistence.data_directory = data_dir.path().to_string_lossy().into_owned();
        config.price.fixed_usd = Some(60_000.0);
        config.publisher.kind = PublisherKind::Webhook;
        config.publisher.webhook_url = Some(format!("{}/hook", self.webhook.uri()));
        config
    }
}

fn create_test_app(config: &AppConfig) -> anyhow::Result<axum::Router> {
    Ok(create_app(Arc::new(config.build_service()?)))
}

async fn send(app: &axum::Router, method: Method, uri: &str) -> anyhow::Result<(StatusCode, Value)> {
    let response = app
        .clone()
        .oneshot(Request::builder().method(method).uri(uri).body(Body::empty())?)
        .await?;

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    let value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    Ok((status, value))
}

#[tokio::test]
async fn test_health_endpoint() -> anyhow::Result<()> {
    let providers = Providers::start().await;
    let dir = TempDir::new()?;
    let app = create_test_app(&providers.config(&dir))?;

    let (status, _) = send(&app, Method::GET, "/health").await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_full_cycle() -> anyhow::Result<()> {
    let providers = Providers::start().await;
    providers.mount_fees(1).await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&providers.webhook)
        .await;

    let dir = TempDir::new()?;
    let app = create_test_app(&providers.config(&dir))?;

    // Nothing computed yet
    let (status, _) = send(&app, Method::GET, "/fees").await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    // Cold start queries both providers and blends them
    let (status, body) = send(&app, Method::POST, "/fees/update").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "updated");
    assert_eq!(
        body["fees"],
        json!({
            "2": 10.0, "4": 10.0, "6": 4.0, "12": 4.0, "24": 4.0,
            "48": 4.0, "144": 1.0, "504": 1.0, "1008": 1.0
        })
    );
    assert_eq!(body["diagnostics"], json!([]));

    // Reads never touch the providers and resolve extra targets
    let (status, body) = send(&app, Method::GET, "/fees?targets=3,2000").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["fees"]["3"], 10.0);
    assert_eq!(body["fees"]["2000"], 1.0);
    assert!(body["computed_at"].is_string());

    let (status, body) = send(&app, Method::GET, "/fees/raw").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().map(Vec::len), Some(2));
    assert_eq!(body[0]["source"], "bitgo");
    assert_eq!(body[0]["fees"]["2"], 10.0);

    // First publication is unconditional
    let (status, body) = send(&app, Method::POST, "/publish").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "published");
    let text = body["text"].as_str().unwrap_or_default();
    assert_eq!(text.lines().count(), 9);
    assert_eq!(text.lines().next(), Some("20 min 10 sat/vB ($1.58)"));

    // Within the refresh interval nothing is refetched or republished
    let (status, body) = send(&app, Method::GET, "/fees/update").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "wait");
    let secs = body["remaining_secs"].as_i64().unwrap_or_default();
    assert!(secs > 590 && secs <= 600);
    assert_eq!(
        body["message"],
        format!("Wait {} minutes and {} seconds", secs / 60, secs % 60)
    );

    let (status, body) = send(&app, Method::POST, "/publish").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "unchanged");

    // The record lives on disk under one file per key
    for file in ["fees.json", "fees_raw.json", "fees_time.json", "lastPublishedTable.json"] {
        assert!(dir.path().join(file).exists(), "{file} missing");
    }

    Ok(())
}

#[tokio::test]
async fn test_cache_survives_restart() -> anyhow::Result<()> {
    let providers = Providers::start().await;
    providers.mount_fees(1).await;

    let dir = TempDir::new()?;
    let config = providers.config(&dir);

    let app = create_test_app(&config)?;
    let (status, _) = send(&app, Method::POST, "/fees/update").await?;
    assert_eq!(status, StatusCode::OK);
    drop(app);

    // A fresh service over the same directory serves the stored table
    let app = create_test_app(&config)?;
    let (status, body) = send(&app, Method::GET, "/fees").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["fees"]["6"], 4.0);

    let (_, body) = send(&app, Method::POST, "/fees/update").await?;
    assert_eq!(body["status"], "wait");
    Ok(())
}

#[tokio::test]
async fn test_one_provider_down() -> anyhow::Result<()> {
    let providers = Providers::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&providers.bitgo)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/fee-estimates"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"2": 12.0, "144": 2.0})))
        .mount(&providers.esplora)
        .await;

    let dir = TempDir::new()?;
    let app = create_test_app(&providers.config(&dir))?;

    let (status, body) = send(&app, Method::POST, "/fees/update").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["fees"]["2"], 12.0);
    assert_eq!(body["fees"]["1008"], 2.0);
    assert_eq!(body["diagnostics"].as_array().map(Vec::len), Some(9));
    Ok(())
}

#[tokio::test]
async fn test_all_providers_down() -> anyhow::Result<()> {
    let providers = Providers::start().await;
    for server in [&providers.bitgo, &providers.esplora] {
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(server)
            .await;
    }

    let dir = TempDir::new()?;
    let app = create_test_app(&providers.config(&dir))?;

    let (status, _) = send(&app, Method::POST, "/fees/update").await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    // Nothing was stored, so reads still have nothing to serve
    let (status, _) = send(&app, Method::GET, "/fees").await?;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(!dir.path().join("fees_time.json").exists());
    Ok(())
}

#[tokio::test]
async fn test_rejected_webhook() -> anyhow::Result<()> {
    let providers = Providers::start().await;
    providers.mount_fees(1).await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&providers.webhook)
        .await;

    let dir = TempDir::new()?;
    let app = create_test_app(&providers.config(&dir))?;

    let (status, _) = send(&app, Method::POST, "/publish").await?;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(!dir.path().join("lastPublishedTable.json").exists());
    Ok(())
}

#[tokio::test]
async fn test_invalid_targets() -> anyhow::Result<()> {
    let providers = Providers::start().await;
    providers.mount_fees(1).await;

    let dir = TempDir::new()?;
    let app = create_test_app(&providers.config(&dir))?;
    send(&app, Method::POST, "/fees/update").await?;

    let (status, _) = send(&app, Method::GET, "/fees?targets=abc").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}
