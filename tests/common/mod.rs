//! Shared utilities for lifecycle integration tests.

use axum::{routing::get, Router};
use rendezvous_server::config::{ServerConfig, Version};
use rendezvous_server::credentials::{
    CredentialError, CredentialRecord, CredentialSink, CredentialStore,
};
use rendezvous_server::LifecycleState;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::{watch, Notify};

/// Find a port nothing is listening on.
pub fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Config on a free port with the credential file redirected into `dir`.
pub fn test_config(dir: &Path, token: &str) -> ServerConfig {
    let mut config = ServerConfig::new(free_port(), token, Version::new(1, 0, 0));
    config.credentials.directory = dir.to_path_buf();
    config
}

pub fn loopback(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

#[allow(dead_code)]
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Wait for the coordinator to leave `Initialized`.
pub async fn wait_started(state: &mut watch::Receiver<LifecycleState>) -> LifecycleState {
    let started = tokio::time::timeout(
        Duration::from_secs(5),
        state.wait_for(|s| *s != LifecycleState::Initialized),
    )
    .await
    .expect("server did not start in time")
    .expect("coordinator dropped");
    *started
}

/// A `/slow` route that signals `entered` and then sleeps for `delay`.
#[allow(dead_code)]
pub fn slow_route(entered: Arc<Notify>, delay: Duration) -> Router {
    Router::new().route(
        "/slow",
        get(move || {
            let entered = entered.clone();
            async move {
                entered.notify_one();
                tokio::time::sleep(delay).await;
                "finished"
            }
        }),
    )
}

/// Writes through to a real store after blocking for `delay`,
/// recording when the write completed.
#[allow(dead_code)]
pub struct SlowSink {
    inner: CredentialStore,
    delay: Duration,
    finished_at: Arc<Mutex<Option<Instant>>>,
}

#[allow(dead_code)]
impl SlowSink {
    pub fn new(dir: &Path, delay: Duration) -> (Self, Arc<Mutex<Option<Instant>>>) {
        let finished_at = Arc::new(Mutex::new(None));
        let sink = Self {
            inner: CredentialStore::new(dir),
            delay,
            finished_at: finished_at.clone(),
        };
        (sink, finished_at)
    }
}

impl CredentialSink for SlowSink {
    fn save(&self, token: &str) -> Result<CredentialRecord, CredentialError> {
        std::thread::sleep(self.delay);
        let record = self.inner.save(token)?;
        *self.finished_at.lock().unwrap() = Some(Instant::now());
        Ok(record)
    }
}

pub fn auth_file(dir: &Path) -> PathBuf {
    dir.join(rendezvous_server::credentials::AUTH_FILE_NAME)
}
