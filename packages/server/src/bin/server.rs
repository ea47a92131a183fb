//! Signaling relay server for Tsunagu.
//!
//! Forwards every frame a participant sends to the other participant of the
//! same room.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin tsunagu-server -- --port 8080
//! ```

use clap::Parser;
use tsunagu_server::{ServerConfig, domain::DEFAULT_PARTICIPANT_CAPACITY, run_server};
use tsunagu_shared::logger::setup_logger;

#[derive(Debug, Parser)]
#[command(name = "tsunagu-server", version, about = "Tsunagu signaling relay")]
struct Args {
    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to bind to
    #[arg(short, long, default_value_t = 8080)]
    port: u16,

    /// Maximum participants per room
    #[arg(long, default_value_t = DEFAULT_PARTICIPANT_CAPACITY)]
    room_capacity: usize,
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "debug");

    let args = Args::parse();
    let config = ServerConfig {
        host: args.host,
        port: args.port,
        room_capacity: args.room_capacity,
    };

    // Run the server
    if let Err(e) = run_server(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
