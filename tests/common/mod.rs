//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use runtime_monitor::config::MonitorConfig;
use runtime_monitor::http::HttpServer;
use runtime_monitor::lifecycle::Shutdown;

/// A monitor server running on an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<Result<(), std::io::Error>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Trigger shutdown and wait for the server task to finish.
    pub async fn stop(self) {
        self.shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("server did not stop in time")
            .expect("server task panicked")
            .expect("server returned an error");
    }
}

/// Start a server with a fast sampling interval.
pub async fn start_server(sample_interval_ms: u64) -> TestServer {
    let mut config = MonitorConfig::default();
    config.sampling.interval_ms = sample_interval_ms;
    config.stream.interval_ms = sample_interval_ms;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    let (_tx, config_rx) = mpsc::unbounded_channel();

    let server = HttpServer::new(config);
    let handle = tokio::spawn(server.run(listener, config_rx, rx));

    // Let the listener start accepting.
    tokio::time::sleep(Duration::from_millis(50)).await;

    TestServer {
        addr,
        shutdown,
        handle,
    }
}

/// Client that never pools connections, so shutdown is not held up.
#[allow(dead_code)]
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}
