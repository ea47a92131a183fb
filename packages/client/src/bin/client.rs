//! Interactive call client for Tsunagu.
//!
//! Joins a room on a `tsunagu-server` relay. Plain lines are sent as chat;
//! slash commands drive the call.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin tsunagu-client -- --room R1 --id alice --name Alice
//! ```

use std::sync::Arc;

use clap::Parser;
use rustyline::{DefaultEditor, error::ReadlineError};
use thiserror::Error;
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tsunagu_client::{
    CallConfig, CallDependencies, SessionCoordinator, SessionEvent,
    domain::{CallError, ParticipantId, RoomSession, ValueObjectError},
    infrastructure::{
        CaptureBehavior, SimulatedMediaCapture, SimulatedTransport, StaticIdentityProvider,
        WebSocketSignalingBus,
    },
};
use tsunagu_shared::{logger::setup_logger, time::timestamp_to_jst_rfc3339};

#[derive(Debug, Parser)]
#[command(name = "tsunagu-client", version, about = "Tsunagu call client")]
struct Args {
    /// Relay server URL
    #[arg(long, default_value = "ws://127.0.0.1:8080")]
    server_url: String,

    /// Room to join
    #[arg(short, long)]
    room: String,

    /// Participant id (unique within the room)
    #[arg(long)]
    id: String,

    /// Display name (defaults to the id)
    #[arg(short, long)]
    name: Option<String>,

    /// Simulate a user who refuses camera/microphone access
    #[arg(long)]
    deny_media: bool,
}

#[derive(Debug, Error)]
enum ClientError {
    #[error("Invalid argument: {0}")]
    Argument(#[from] ValueObjectError),

    #[error("Invalid server URL: {0}")]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Call(#[from] CallError),
}

#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Call,
    Hangup,
    Camera,
    Mic,
    Status,
    Help,
    Quit,
    Chat(&'a str),
    Unknown(&'a str),
}

impl<'a> Command<'a> {
    fn parse(line: &'a str) -> Self {
        match line {
            "/call" => Self::Call,
            "/hangup" => Self::Hangup,
            "/camera" => Self::Camera,
            "/mic" => Self::Mic,
            "/status" => Self::Status,
            "/help" => Self::Help,
            "/quit" | "/exit" => Self::Quit,
            other if other.starts_with('/') => Self::Unknown(other),
            text => Self::Chat(text),
        }
    }
}

#[tokio::main]
async fn main() {
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let args = Args::parse();
    if let Err(e) = run(args).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), ClientError> {
    let display_name = args.name.as_deref().unwrap_or(&args.id);
    let identity = StaticIdentityProvider::from_parts(&args.id, display_name)?;
    let participant_id = ParticipantId::new(args.id.clone())?;
    let behavior = if args.deny_media {
        CaptureBehavior::Deny
    } else {
        CaptureBehavior::Grant
    };

    let dependencies = CallDependencies {
        bus: Arc::new(WebSocketSignalingBus::new(&args.server_url, participant_id)?),
        transport: Arc::new(SimulatedTransport::new()),
        media: Arc::new(SimulatedMediaCapture::new(behavior)),
    };
    let coordinator =
        SessionCoordinator::join(&args.room, &identity, dependencies, CallConfig::default())
            .await?;

    println!("Joined room '{}' as {}", args.room, display_name);
    if !coordinator.signaling_available() {
        println!("! Relay unreachable at {}; chat stays local", args.server_url);
    }
    print_help();

    let mut events = coordinator.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => print_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event printer fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    let mut lines = spawn_prompt();
    while let Some(line) = lines.recv().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match Command::parse(line) {
            Command::Call => {
                if let Err(e) = coordinator.start_call().await {
                    println!("! {e}");
                }
            }
            Command::Hangup => coordinator.end_call().await,
            Command::Camera => {
                let preference = coordinator.toggle_camera().await;
                println!("* camera {}", on_off(preference.video));
            }
            Command::Mic => {
                let preference = coordinator.toggle_microphone().await;
                println!("* microphone {}", on_off(preference.audio));
            }
            Command::Status => print_status(&coordinator.snapshot().await),
            Command::Help => print_help(),
            Command::Quit => break,
            Command::Unknown(command) => println!("! Unknown command: {command}"),
            Command::Chat(text) => {
                if let Err(e) = coordinator.send_chat(text).await {
                    println!("! {e}");
                }
            }
        }
    }

    coordinator.leave().await;
    printer.abort();
    Ok(())
}

/// Read lines on a dedicated thread; rustyline blocks.
fn spawn_prompt() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let mut editor = match DefaultEditor::new() {
            Ok(editor) => editor,
            Err(e) => {
                tracing::error!("Failed to open the terminal: {}", e);
                return;
            }
        };
        loop {
            match editor.readline("> ") {
                Ok(line) => {
                    let _ = editor.add_history_entry(line.as_str());
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
                Err(e) => {
                    tracing::warn!("Failed to read input: {}", e);
                    break;
                }
            }
        }
    });
    rx
}

fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::StateChanged { state, .. } => println!("* call {state}"),
        SessionEvent::ChatMessage(entry) if !entry.is_local => println!(
            "[{}] {}: {}",
            timestamp_to_jst_rfc3339(entry.sent_at.value()),
            entry.sender_display_name,
            entry.text
        ),
        SessionEvent::ChatMessage(_) => {}
        SessionEvent::RemoteMediaAvailable(track) => {
            println!("* receiving remote {} ({})", track.kind, track.id)
        }
        SessionEvent::RemoteMediaEnded => println!("* remote media ended"),
        SessionEvent::RemoteConnectionChanged(true) => println!("* peer connected"),
        SessionEvent::RemoteConnectionChanged(false) => println!("* peer disconnected"),
        SessionEvent::LocalMediaChanged(_) | SessionEvent::CallElapsed(_) => {}
    }
}

fn print_status(session: &RoomSession) {
    println!("room:      {}", session.room_id);
    println!(
        "you:       {} ({})",
        session.local_participant.display_name, session.local_participant.id
    );
    println!("call:      {}", session.state);
    let signaling = if session.signaling_available {
        "available"
    } else {
        "unavailable"
    };
    println!("signaling: {}", signaling);
    let peer = if session.remote_connected {
        "connected"
    } else {
        "not connected"
    };
    println!("peer:      {}", peer);
    println!(
        "media:     camera {}, microphone {}",
        on_off(session.local_media_enabled.video),
        on_off(session.local_media_enabled.audio)
    );
    if session.state.is_in_call() {
        println!("elapsed:   {}s", session.call_elapsed_secs);
    }
    println!("chat:      {} message(s)", session.chat_log().len());
}

fn print_help() {
    println!("Type a message to chat. Commands:");
    println!("  /call    start (or restart) the call");
    println!("  /hangup  end the call");
    println!("  /camera  toggle the camera");
    println!("  /mic     toggle the microphone");
    println!("  /status  show the session");
    println!("  /quit    leave the room");
}

fn on_off(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}
