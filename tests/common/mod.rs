//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use scout_resilience::config::{CacheBackendKind, CoreConfig};
use scout_resilience::{HttpServer, ResilienceCore, Shutdown};

/// A running server on an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub core: Arc<ResilienceCore>,
    pub shutdown: Shutdown,
    pub client: reqwest::Client,
}

#[allow(dead_code)]
impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn stop(self) {
        self.shutdown.trigger();
        self.core.stop().await;
    }
}

/// Config with the in-memory cache, no periodic monitor, and a writable temp dir.
pub fn test_config() -> CoreConfig {
    let mut config = CoreConfig::default();
    config.server.bind_address = "127.0.0.1:0".to_string();
    config.cache.backend = CacheBackendKind::Memory;
    config.health.periodic_enabled = false;
    config.health.writable_dir = std::env::temp_dir().display().to_string();
    config
}

/// Build the core from `config`, start it, and serve until the returned handle stops.
pub async fn spawn_server(config: CoreConfig) -> TestServer {
    let listener = TcpListener::bind(&config.server.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let core = Arc::new(ResilienceCore::build(config).unwrap());
    let shutdown = Shutdown::new();
    core.start(&shutdown).await;

    let server = HttpServer::new(core.clone());
    let mut stop = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server
            .run(listener, async move {
                let _ = stop.recv().await;
            })
            .await;
    });

    let client = reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap();

    TestServer {
        addr,
        core,
        shutdown,
        client,
    }
}
