//! Integration tests for the worker over real HTTP.
//!
//! Uses wiremock as the origin. Covers install/activate, the three fetch
//! strategies, offline fallbacks, and version eviction on disk.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use kl_timetable_sw::{
    CacheStorage, Config, Destination, DiskStorage, Event, HttpNetwork, LogNotifier,
    MemoryStorage, Network, Outcome, Request, Response, Route, ServiceWorker, WorkerError,
    WorkerState,
};
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_static_files(server: &MockServer) {
    for (p, body) in [
        ("/", "<html>root</html>"),
        ("/index.html", "<html>shell</html>"),
        ("/manifest.json", "{\"name\":\"KL Timetable\"}"),
    ] {
        Mock::given(method("GET"))
            .and(path(p))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }
}

/// Real HTTP client with a switch that makes every request fail like a
/// dropped connection.
struct SwitchableNetwork {
    inner: HttpNetwork,
    offline: AtomicBool,
}

impl SwitchableNetwork {
    fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl Network for SwitchableNetwork {
    async fn fetch(&self, request: &Request) -> kl_timetable_sw::Result<Response> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(WorkerError::Offline {
                url: request.url.to_string(),
            });
        }
        self.inner.fetch(request).await
    }
}

fn create_worker_with_network(
    origin: &str,
    version: &str,
    storage: Arc<dyn CacheStorage>,
) -> (ServiceWorker, Arc<SwitchableNetwork>) {
    let config = Config {
        origin: Url::parse(origin).expect("valid origin"),
        cache_version: version.to_string(),
        ..Config::default()
    };
    let network = Arc::new(SwitchableNetwork {
        inner: HttpNetwork::new(&config.user_agent).expect("failed to create client"),
        offline: AtomicBool::new(false),
    });
    let worker = ServiceWorker::new(
        config,
        storage,
        Arc::clone(&network) as Arc<dyn Network>,
        Arc::new(LogNotifier),
    )
    .expect("worker");
    (worker, network)
}

fn create_worker(origin: &str, version: &str, storage: Arc<dyn CacheStorage>) -> ServiceWorker {
    create_worker_with_network(origin, version, storage).0
}

async fn activate(worker: &ServiceWorker) {
    worker.handle(Event::Install).await.expect("install failed");
    worker.handle(Event::Activate).await.expect("activate failed");
}

#[tokio::test]
async fn test_install_and_activate_against_origin() {
    let server = MockServer::start().await;
    mount_static_files(&server).await;

    let worker = create_worker(&server.uri(), "v7", Arc::new(MemoryStorage::new()));
    let outcome = worker.handle(Event::Install).await.expect("install failed");
    assert!(matches!(outcome, Outcome::Installed { cached: 3 }));
    assert!(worker.skipped_waiting());

    worker.handle(Event::Activate).await.expect("activate failed");
    assert_eq!(worker.state().await, WorkerState::Activated);
}

#[tokio::test]
async fn test_install_fails_when_critical_file_missing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("root"))
        .mount(&server)
        .await;
    // /index.html and /manifest.json are unmounted: wiremock answers 404.

    let worker = create_worker(&server.uri(), "v7", Arc::new(MemoryStorage::new()));
    let err = worker.handle(Event::Install).await.unwrap_err();

    assert!(matches!(err, WorkerError::InstallFailed { .. }));
    assert_eq!(worker.state().await, WorkerState::Redundant);
}

#[tokio::test]
async fn test_api_response_cached_then_served_offline() {
    let server = MockServer::start().await;
    mount_static_files(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/timetable"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("{\"monday\":[\"DBMS\",\"OS\"]}", "application/json"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (worker, network) =
        create_worker_with_network(&server.uri(), "v7", Arc::new(MemoryStorage::new()));
    activate(&worker).await;

    let url = format!("{}/api/timetable", server.uri());
    let request = Request::get(&url).unwrap();
    let Outcome::Responded { route, mut response } =
        worker.handle(Event::Fetch(request.clone())).await.unwrap()
    else {
        panic!("expected a response");
    };
    assert_eq!(route, Route::Api);
    assert!(!response.is_from_cache());
    assert_eq!(response.text().unwrap(), "{\"monday\":[\"DBMS\",\"OS\"]}");

    network.go_offline();

    let Outcome::Responded { mut response, .. } =
        worker.handle(Event::Fetch(request)).await.unwrap()
    else {
        panic!("expected a response");
    };
    assert!(response.is_from_cache());
    assert_eq!(
        response.headers.get("content-type").map(String::as_str),
        Some("application/json")
    );
    assert_eq!(response.text().unwrap(), "{\"monday\":[\"DBMS\",\"OS\"]}");
}

#[tokio::test]
async fn test_static_asset_served_from_cache_without_network() {
    let server = MockServer::start().await;
    mount_static_files(&server).await;
    Mock::given(method("GET"))
        .and(path("/assets/app.js"))
        .respond_with(ResponseTemplate::new(200).set_body_string("console.log(1)"))
        .expect(1)
        .mount(&server)
        .await;

    let worker = create_worker(&server.uri(), "v7", Arc::new(MemoryStorage::new()));
    activate(&worker).await;

    let request = Request::get(&format!("{}/assets/app.js", server.uri()))
        .unwrap()
        .with_destination(Destination::Script);

    for _ in 0..3 {
        let Outcome::Responded { route, mut response } =
            worker.handle(Event::Fetch(request.clone())).await.unwrap()
        else {
            panic!("expected a response");
        };
        assert_eq!(route, Route::StaticAsset);
        assert_eq!(response.text().unwrap(), "console.log(1)");
    }
    // MockServer verifies `expect(1)` on drop.
}

#[tokio::test]
async fn test_script_404_not_cached() {
    let server = MockServer::start().await;
    mount_static_files(&server).await;
    Mock::given(method("GET"))
        .and(path("/app.js"))
        .respond_with(ResponseTemplate::new(404))
        .expect(2)
        .mount(&server)
        .await;

    let worker = create_worker(&server.uri(), "v7", Arc::new(MemoryStorage::new()));
    activate(&worker).await;

    let request = Request::get(&format!("{}/app.js", server.uri()))
        .unwrap()
        .with_destination(Destination::Script);
    for _ in 0..2 {
        let Outcome::Responded { response, .. } =
            worker.handle(Event::Fetch(request.clone())).await.unwrap()
        else {
            panic!("expected a response");
        };
        assert_eq!(response.status, 404);
    }

    let dynamic = worker.cache().dynamic_partition().await.unwrap();
    assert!(dynamic.is_empty().await.unwrap());
}

#[tokio::test]
async fn test_navigation_prefers_network_then_falls_back_to_shell() {
    let server = MockServer::start().await;
    mount_static_files(&server).await;
    Mock::given(method("GET"))
        .and(path("/timetable"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>live</html>"))
        .mount(&server)
        .await;

    let (worker, network) =
        create_worker_with_network(&server.uri(), "v7", Arc::new(MemoryStorage::new()));
    activate(&worker).await;

    let request = Request::navigate(&format!("{}/timetable", server.uri())).unwrap();
    let Outcome::Responded { route, mut response } =
        worker.handle(Event::Fetch(request.clone())).await.unwrap()
    else {
        panic!("expected a response");
    };
    assert_eq!(route, Route::Navigation);
    assert_eq!(response.text().unwrap(), "<html>live</html>");

    network.go_offline();

    let Outcome::Responded { mut response, .. } =
        worker.handle(Event::Fetch(request)).await.unwrap()
    else {
        panic!("expected a response");
    };
    assert!(response.is_from_cache());
    assert_eq!(response.text().unwrap(), "<html>shell</html>");
}

#[tokio::test]
async fn test_new_version_evicts_old_partitions_on_disk() {
    let server = MockServer::start().await;
    mount_static_files(&server).await;
    let temp_dir = TempDir::new().unwrap();

    let storage: Arc<dyn CacheStorage> = Arc::new(DiskStorage::new(temp_dir.path()));
    let v1 = create_worker(&server.uri(), "v1", Arc::clone(&storage));
    activate(&v1).await;
    v1.cache().dynamic_partition().await.unwrap();
    drop(v1);

    let reopened: Arc<dyn CacheStorage> = Arc::new(DiskStorage::new(temp_dir.path()));
    let v2 = create_worker(&server.uri(), "v2", Arc::clone(&reopened));
    activate(&v2).await;

    let names = reopened.keys().await.unwrap();
    assert_eq!(names, vec!["kl-timetable-static-v2"]);
    assert_eq!(
        reopened.entry_keys("kl-timetable-static-v2").await.unwrap().len(),
        3
    );
}
