//! Test harness: a full backend (thread + runtime + server) on an
//! ephemeral port, the way `main` assembles it.

use std::net::SocketAddr;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use keryx_server::{ServerConfig, ServerRegistry};

pub struct TestBackend {
    pub registry: ServerRegistry,
    thread: Option<JoinHandle<anyhow::Result<()>>>,
}

impl TestBackend {
    /// Spawns the backend on its own thread, bound to `127.0.0.1:0`.
    pub fn spawn() -> Self {
        let registry = ServerRegistry::new();
        let config = ServerConfig::builder()
            .http_addr("127.0.0.1:0")
            .shutdown_timeout(Duration::from_millis(500))
            .build();

        let thread = {
            let registry = registry.clone();
            std::thread::Builder::new()
                .name("keryx-server".to_string())
                .spawn(move || keryx::boot::run_blocking(config, registry))
                .expect("failed to spawn server thread")
        };

        Self {
            registry,
            thread: Some(thread),
        }
    }

    /// Blocks until the registry reports ready, then returns the bound
    /// address. Panics after five seconds.
    pub fn wait_ready(&self) -> SocketAddr {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if self.registry.is_ready() {
                return self
                    .registry
                    .current()
                    .expect("ready implies published")
                    .local_addr();
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("server did not become ready in time");
    }

    /// Full URL for a path on the running backend.
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.wait_ready())
    }

    /// Waits (bounded) for the server thread to end, then joins it.
    pub fn join_within(mut self, limit: Duration) {
        let thread = self.thread.take().expect("thread already joined");
        let deadline = Instant::now() + limit;
        while !thread.is_finished() {
            assert!(
                Instant::now() < deadline,
                "server thread did not stop in time"
            );
            std::thread::sleep(Duration::from_millis(10));
        }
        thread
            .join()
            .expect("server thread panicked")
            .expect("server returned an error");
    }

    /// Requests a stop through the registry and joins the server thread.
    pub fn stop_and_join(self) {
        self.wait_ready();
        if let Some(handle) = self.registry.current() {
            handle.request_stop();
        }
        self.join_within(Duration::from_secs(5));
    }
}
