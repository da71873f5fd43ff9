//! End-to-end offline behavior: the store, the tiers and the arbitrator
//! sharing one on-disk database, with the network scripted in-process.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use fairweather_client::{
    Arbitrator, Classifier, FetchError, Fetcher, OfflineContentType, Request, RequestClass, Response, ResponseSource,
};
use fairweather_core::{AppConfig, BackendKind, CacheDb, Location, Store, StoreConfig, TierKind, TierManager};
use serde_json::json;
use tempfile::TempDir;
use url::Url;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Default)]
struct Network {
    routes: Mutex<HashMap<String, (u16, String)>>,
    down: AtomicBool,
    calls: AtomicUsize,
}

impl Network {
    fn serve(&self, url: &str, status: u16, body: &str) {
        self.routes.lock().unwrap().insert(url.to_string(), (status, body.to_string()));
    }

    fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for Network {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.down.load(Ordering::SeqCst) {
            return Err(FetchError::Network("network unreachable".into()));
        }
        let route = self.routes.lock().unwrap().get(request.url.as_str()).cloned();
        let (status, body) = route.ok_or_else(|| FetchError::Network("connection refused".into()))?;
        Ok(Response {
            status,
            content_type: Some("application/json".into()),
            headers: vec![("content-type".into(), "application/json".into())],
            body: Bytes::from(body),
        })
    }
}

struct Harness {
    _dir: TempDir,
    config: AppConfig,
    store: Store,
    arbitrator: Arbitrator<Arc<Network>>,
    network: Arc<Network>,
}

async fn harness(cache_version: &str) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    harness_in(dir, cache_version).await
}

async fn harness_in(dir: TempDir, cache_version: &str) -> Harness {
    init_tracing();
    let config = AppConfig {
        db_path: dir.path().join("cache.sqlite"),
        cache_version: cache_version.into(),
        ..AppConfig::default()
    };

    let store = Store::new(StoreConfig::from(&config));
    let db = CacheDb::open(&config.db_path).await.unwrap();
    let tiers = TierManager::new(db).activate(config.tier_names()).await.unwrap();
    let network = Arc::new(Network::default());
    let arbitrator =
        Arbitrator::new(network.clone(), tiers, Classifier::from_config(&config), config.fetch_timeout());

    Harness { _dir: dir, config, store, arbitrator, network }
}

const WEATHER_URL: &str = "https://api.openweathermap.org/data/2.5/weather?lat=59.91&lon=10.75&units=metric";

async fn get(h: &Harness, url: &str, accept: Option<&str>) -> fairweather_client::Served {
    let mut request = Request::get(url).unwrap();
    if let Some(accept) = accept {
        request = request.with_accept(accept);
    }
    h.arbitrator.handle(&request).await.served().unwrap()
}

#[tokio::test]
async fn store_round_trip_on_durable_backend() {
    let h = harness("v1").await;
    assert_eq!(h.store.backend_kind().await, BackendKind::PrimaryDurable);

    h.store.set("weather_59.91_10.75", &json!({"temp": 4.5}), None).await.unwrap();
    assert_eq!(h.store.get("weather_59.91_10.75").await, Some(json!({"temp": 4.5})));
}

#[tokio::test]
async fn store_entry_expires_without_sweep() {
    let h = harness("v1").await;
    h.store.set("short", &"lived", Some(Duration::from_millis(20))).await.unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(h.store.get("short").await, None);
}

#[tokio::test]
async fn store_remove_is_idempotent() {
    let h = harness("v1").await;
    h.store.remove("never-set").await.unwrap();
    h.store.remove("never-set").await.unwrap();
}

#[tokio::test]
async fn store_last_completed_set_wins() {
    let h = harness("v1").await;
    let a = Location { lat: 59.91, lon: 10.75, name: Some("Oslo".into()), country: Some("NO".into()) };
    let b = Location { lat: 60.39, lon: 5.32, name: Some("Bergen".into()), country: Some("NO".into()) };

    h.store.set("loc", &a, None).await.unwrap();
    h.store.set("loc", &b, None).await.unwrap();
    assert_eq!(h.store.get_as::<Location>("loc").await, Some(b));
}

#[tokio::test]
async fn store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.sqlite");
    let config = StoreConfig { db_path: Some(path.clone()), default_ttl: Duration::from_secs(3600) };

    let location = Location { lat: 51.51, lon: -0.13, name: Some("London".into()), country: Some("GB".into()) };
    Store::new(config.clone()).set_last_location(&location).await.unwrap();

    let reopened = Store::new(config);
    assert_eq!(reopened.get_last_location().await, Some(location));
}

#[tokio::test]
async fn version_upgrade_evicts_previous_tiers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.sqlite");

    let v1 = harness_in(dir, "v1").await;
    v1.network.serve("https://app.example/src/main.js", 200, "main");
    v1.network.serve(WEATHER_URL, 200, r#"{"temp":3}"#);
    get(&v1, "https://app.example/src/main.js", None).await;
    get(&v1, WEATHER_URL, None).await;
    assert_eq!(v1.arbitrator.tiers().unwrap().existing().await.unwrap().len(), 2);

    let db = CacheDb::open(&path).await.unwrap();
    let v2_config = AppConfig { cache_version: "v2".into(), ..AppConfig::default() };
    let v2 = TierManager::new(db).activate(v2_config.tier_names()).await.unwrap();

    assert!(v2.existing().await.unwrap().is_empty());
    assert_eq!(v2.entry_count(TierKind::Static).await.unwrap(), 0);
    assert_eq!(v2.entry_count(TierKind::Dynamic).await.unwrap(), 0);
}

#[tokio::test]
async fn precached_static_asset_never_hits_network() {
    let h = harness("v1").await;
    h.network.serve("https://app.example/", 200, "<html></html>");
    h.network.serve("https://app.example/src/main.js", 200, "main");

    let base = Url::parse("https://app.example/").unwrap();
    let report = h.arbitrator.install(&base, &["/", "/src/main.js"]).await;
    assert_eq!(report.cached, 2);
    let after_install = h.network.calls();

    let served = get(&h, "https://app.example/src/main.js", None).await;
    assert_eq!(served.class, RequestClass::StaticAsset);
    assert_eq!(served.source, ResponseSource::Cache(TierKind::Static));
    assert_eq!(h.network.calls(), after_install);
}

#[tokio::test]
async fn install_tolerates_missing_assets() {
    let h = harness("v1").await;
    h.network.serve("https://app.example/", 200, "<html></html>");

    let base = Url::parse("https://app.example/").unwrap();
    let report = h.arbitrator.install(&base, h.config.static_assets.as_slice()).await;
    assert_eq!(report.cached, 1);
    assert_eq!(report.failed.len(), h.config.static_assets.len() - 1);
}

#[tokio::test]
async fn remote_api_fresh_then_stale() {
    let h = harness("v1").await;
    h.network.serve(WEATHER_URL, 200, r#"{"temp":3}"#);

    let fresh = get(&h, WEATHER_URL, Some("application/json")).await;
    assert_eq!(fresh.class, RequestClass::RemoteApi);
    assert_eq!(fresh.source, ResponseSource::Network);
    assert_eq!(h.arbitrator.tiers().unwrap().entry_count(TierKind::Dynamic).await.unwrap(), 1);

    h.network.set_down(true);
    let stale = get(&h, WEATHER_URL, Some("application/json")).await;
    assert_eq!(stale.source, ResponseSource::Cache(TierKind::Dynamic));
    assert_eq!(stale.response.status, 200);
    assert_eq!(stale.response.json::<serde_json::Value>().unwrap(), json!({"temp": 3}));
}

#[tokio::test]
async fn remote_api_total_failure_is_typed_json() {
    let h = harness("v1").await;
    h.network.set_down(true);

    let served = get(&h, WEATHER_URL, Some("application/json")).await;
    assert_eq!(served.source, ResponseSource::Offline);
    assert_eq!(served.response.status, 503);
    assert_eq!(served.response.content_type.as_deref(), Some(OfflineContentType::Json.mime()));
    assert_eq!(
        served.response.json::<serde_json::Value>().unwrap(),
        json!({"error": "Offline", "message": "This request is not available offline"})
    );
}

#[tokio::test]
async fn navigation_offline_gets_html_page() {
    let h = harness("v1").await;
    h.network.set_down(true);

    let served = get(&h, "https://app.example/about", Some("text/html,application/xhtml+xml")).await;
    assert_eq!(served.class, RequestClass::Other);
    assert_eq!(served.source, ResponseSource::Offline);
    assert_eq!(served.response.content_type.as_deref(), Some("text/html"));
    assert!(String::from_utf8_lossy(&served.response.body).contains("Retry"));
}

#[tokio::test]
async fn tiers_survive_restart_within_version() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.sqlite");

    let first = harness_in(dir, "v1").await;
    first.network.serve(WEATHER_URL, 200, r#"{"temp":8}"#);
    get(&first, WEATHER_URL, None).await;

    let db = CacheDb::open(&path).await.unwrap();
    let tiers = TierManager::new(db).activate(first.config.tier_names()).await.unwrap();
    let network = Arc::new(Network::default());
    network.set_down(true);
    let restarted = Arbitrator::new(network, tiers, Classifier::from_config(&first.config), Duration::from_secs(1));

    let served = restarted.handle(&Request::get(WEATHER_URL).unwrap()).await.served().unwrap();
    assert_eq!(served.source, ResponseSource::Cache(TierKind::Dynamic));
}

#[tokio::test]
async fn unopenable_database_degrades_store_and_arbitrator() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let config = AppConfig { db_path: dir.path().to_path_buf(), ..AppConfig::default() };

    let store = Store::new(StoreConfig::from(&config));
    store.set("lastLocation", &json!({"lat": 1.0}), None).await.unwrap();
    assert_eq!(store.backend_kind().await, BackendKind::SecondaryFlat);

    let arbitrator = Arbitrator::open(&config).await.unwrap();
    assert!(arbitrator.tiers().is_none());
}
