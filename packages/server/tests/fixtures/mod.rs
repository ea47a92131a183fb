//! Test fixtures shared by the integration tests.

use std::{
    net::TcpStream,
    thread,
    time::{Duration, Instant},
};

use tsunagu_server::{ServerConfig, run_server};

/// A relay server running on a background thread for the lifetime of a test.
pub struct TestServer {
    port: u16,
}

impl TestServer {
    /// Start a relay on `port` with the default room capacity and wait until it accepts connections.
    pub fn start(port: u16) -> Self {
        Self::start_with_capacity(port, tsunagu_server::domain::DEFAULT_PARTICIPANT_CAPACITY)
    }

    /// Start a relay with a custom room capacity.
    pub fn start_with_capacity(port: u16, room_capacity: usize) -> Self {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port,
            room_capacity,
        };

        thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("Failed to build runtime");
            runtime.block_on(async move {
                if let Err(e) = run_server(config).await {
                    eprintln!("test server stopped: {}", e);
                }
            });
        });

        let deadline = Instant::now() + Duration::from_secs(5);
        while TcpStream::connect(("127.0.0.1", port)).is_err() {
            assert!(Instant::now() < deadline, "server did not start on port {port}");
            thread::sleep(Duration::from_millis(20));
        }

        Self { port }
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn ws_url(&self, room_id: &str, client_id: &str) -> String {
        format!(
            "ws://127.0.0.1:{}/ws?room_id={}&client_id={}",
            self.port, room_id, client_id
        )
    }
}
