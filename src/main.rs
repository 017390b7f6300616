//! ragchat - terminal client for a RAG chat backend
//!
//! Reads questions from stdin and prints the conversation to stdout. Logs
//! go to stderr as JSON.

use ragchat::gateway::{HttpGateway, LoggingGateway};
use ragchat::{ClientConfig, SessionError, SessionEvent, SessionManager, Turn, UploadTracker};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// One line of user input
#[derive(Debug, PartialEq, Eq)]
enum Command {
    Ask(String),
    Upload(PathBuf),
    Reset,
    Quit,
    Help,
}

fn parse_command(line: &str) -> Command {
    let line = line.trim();
    let Some(rest) = line.strip_prefix('/') else {
        return Command::Ask(line.to_string());
    };
    let (name, arg) = rest
        .split_once(char::is_whitespace)
        .map_or((rest, ""), |(n, a)| (n, a.trim()));
    match name {
        "upload" if !arg.is_empty() => Command::Upload(PathBuf::from(arg)),
        "reset" => Command::Reset,
        "quit" | "exit" => Command::Quit,
        "help" | "upload" => Command::Help,
        _ => Command::Ask(line.to_string()),
    }
}

const HELP: &str = "Commands: /upload <file.pdf>, /reset, /quit. Anything else is sent as a question.";

fn render_turn(turn: &Turn) -> String {
    let mut out = format!("{}: {}", turn.role().as_str(), turn.content());
    if !turn.citations().is_empty() {
        let sources: Vec<String> = turn
            .citations()
            .iter()
            .map(|c| format!("[{c}]"))
            .collect();
        out.push_str("\n  sources: ");
        out.push_str(&sources.join(" "));
    }
    out
}

async fn print_events(mut rx: broadcast::Receiver<SessionEvent>) {
    loop {
        match rx.recv().await {
            Ok(SessionEvent::TurnAppended { turn }) => println!("{}", render_turn(&turn)),
            Ok(SessionEvent::StateChanged { pending, last_error }) => {
                if pending {
                    println!("  ...thinking");
                }
                if let Some(error) = last_error {
                    println!("! {error}");
                }
            }
            Ok(SessionEvent::Cleared) => println!("-- conversation cleared --"),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event printer lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ragchat=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config = ClientConfig::from_env()?;
    tracing::info!(
        api_base_url = %config.api_base_url,
        timeout_secs = config.request_timeout.as_secs(),
        "Starting ragchat"
    );

    let gateway = Arc::new(LoggingGateway::new(HttpGateway::new(&config)?));
    let session = SessionManager::with_event_capacity(gateway.clone(), config.event_capacity);
    let uploads = Arc::new(UploadTracker::new(gateway));

    let printer = tokio::spawn(print_events(session.subscribe()));

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_command(&line) {
            Command::Ask(text) => {
                let session = session.clone();
                tokio::spawn(async move {
                    match session.submit(&text).await {
                        Ok(_) | Err(SessionError::EmptyQuery) => {}
                        Err(SessionError::Busy) => println!("! {}", SessionError::Busy),
                        Err(e) => tracing::error!(error = %e, "Submission failed"),
                    }
                });
            }
            Command::Upload(path) => {
                let uploads = Arc::clone(&uploads);
                tokio::spawn(async move {
                    match uploads.upload(&path).await {
                        Ok(receipt) => {
                            let note = receipt.message.unwrap_or_default();
                            println!("uploaded {} {note}", receipt.filename);
                        }
                        Err(e) => println!("! {e}"),
                    }
                });
            }
            Command::Reset => session.reset().await,
            Command::Help => println!("{HELP}"),
            Command::Quit => break,
        }
    }

    drop(session);
    printer.abort();
    Ok(())
}
