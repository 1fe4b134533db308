//! Shared harness for integration tests.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use request_catcher::broadcast::HubHandle;
use request_catcher::storage::HistoryCache;
use request_catcher::{CatcherConfig, HttpServer, Shutdown};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// A running catcher on ephemeral ports.
pub struct TestApp {
    pub capture_addr: SocketAddr,
    pub management_addr: SocketAddr,
    pub history: HistoryCache,
    pub hub: HubHandle,
    pub shutdown: Shutdown,
    pub server: JoinHandle<std::io::Result<()>>,
    pub root: PathBuf,
}

impl TestApp {
    pub fn capture_url(&self, path: &str) -> String {
        format!("http://{}{}", self.capture_addr, path)
    }

    pub fn management_url(&self, path: &str) -> String {
        format!("http://{}{}", self.management_addr, path)
    }

    pub fn records_dir(&self) -> PathBuf {
        self.root.join("requests")
    }

    /// Trigger shutdown and wait for the server to finish.
    pub async fn stop(self) {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(10), self.server)
            .await
            .expect("server stopped in time")
            .expect("server task")
            .expect("server result");
    }

    /// Poll until the hub reports `expected` subscribers.
    pub async fn wait_for_subscribers(&self, expected: usize) {
        for _ in 0..200 {
            if self.hub.subscriber_count().await.ok() == Some(expected) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("subscriber count never reached {expected}");
    }
}

/// Start a catcher whose storage lives under `root`.
pub async fn spawn_app_in(root: &Path) -> TestApp {
    let capture_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let management_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let capture_addr = capture_listener.local_addr().unwrap();
    let management_addr = management_listener.local_addr().unwrap();

    let mut config = CatcherConfig::default();
    config.capture.bind_address = capture_addr.to_string();
    config.capture.public_base_url = format!("http://{capture_addr}");
    config.management.bind_address = management_addr.to_string();
    config.management.keep_alive_secs = 1;
    config.storage.records_dir = root.join("requests").display().to_string();
    config.storage.blobs_dir = root.join("static-files").display().to_string();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, &shutdown).await.unwrap();
    let history = server.history().clone();
    let hub = server.hub().clone();
    let server = tokio::spawn(server.run(capture_listener, management_listener));

    TestApp {
        capture_addr,
        management_addr,
        history,
        hub,
        shutdown,
        server,
        root: root.to_path_buf(),
    }
}

/// Start a catcher in a fresh temporary directory.
pub async fn spawn_app() -> (TestApp, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let app = spawn_app_in(dir.path()).await;
    (app, dir)
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .build()
        .unwrap()
}
