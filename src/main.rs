//! Assistant Core - Entry Point
//!
//! Line-oriented REPL: each stdin line goes to `process_command`, the reply is
//! printed to stdout. Background loops run until EOF or Ctrl-C.

use assistant_core::{Assistant, Config};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Parse args
    let args: Vec<String> = std::env::args().collect();
    let json_logs = args.iter().any(|a| a == "--json-logs");
    let help_mode = args.iter().any(|a| a == "--help" || a == "-h");
    let conversation_id = args
        .iter()
        .position(|a| a == "--conversation" || a == "-c")
        .and_then(|i| args.get(i + 1))
        .cloned()
        .unwrap_or_else(|| "cli".to_string());

    if help_mode {
        println!("Assistant Core v{}", env!("CARGO_PKG_VERSION"));
        println!();
        println!("Usage: assistant-core [OPTIONS]");
        println!();
        println!("Options:");
        println!("  --conversation, -c <id>  Conversation id for recorded turns (default: cli)");
        println!("  --json-logs              Log to stderr as JSON");
        println!("  --help, -h               Show this help");
        println!();
        println!("Type /help at the prompt for commands.");
        println!();
        println!("Environment variables:");
        println!("  ASSISTANT_DB_PATH                  SQLite database path");
        println!("  OLLAMA_URL                         Ollama server (default: http://localhost:11434)");
        println!("  OLLAMA_MODEL                       Ollama model (default: llama3.2:3b)");
        println!("  ANTHROPIC_API_KEY                  Claude API key (optional)");
        println!("  ASSISTANT_RETENTION_DAYS           Days before low-importance memories archive (default: 30)");
        println!("  ASSISTANT_EXECUTION_INTERVAL_SECS  Scheduler tick (default: 5)");
        println!("  ASSISTANT_THINK_INTERVAL_SECS      Reasoning tick (default: 60)");
        println!("  ASSISTANT_ACTIVE_HOURS             Active hours, e.g. 9-18");
        println!("  ASSISTANT_DEPENDENCY_TIMEOUT_SECS  Fail orphaned actions after N seconds (0: immediately)");
        println!("  ASSISTANT_ACTION_RETENTION_DAYS    Days finished actions stay in history (default: 7)");
        println!("  RUST_LOG                           trace, debug, info, warn or error (default: warn)");
        return Ok(());
    }

    let log_level = log_level(std::env::var("RUST_LOG").ok().as_deref());

    // stdout belongs to the REPL; logs always go to stderr
    if json_logs {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    info!("Assistant Core v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    let assistant = Arc::new(Assistant::from_config(config)?);
    assistant.initialize().await;

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let handles = assistant.spawn_background(shutdown_rx);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };
        if matches!(line.trim(), "/quit" | "/exit") {
            break;
        }

        let reply = assistant.process_command(&line, &conversation_id).await;
        stdout.write_all(reply.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
    }

    info!("Shutting down");
    shutdown_tx.send(true).ok();
    for handle in handles {
        handle.await.ok();
    }

    Ok(())
}

/// Level named by `RUST_LOG`; warn when unset, info when unrecognized
fn log_level(raw: Option<&str>) -> Level {
    match raw.map(|s| s.trim().to_lowercase()) {
        None => Level::WARN,
        Some(s) => match s.as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level() {
        assert_eq!(log_level(None), Level::WARN);
        assert_eq!(log_level(Some("DEBUG")), Level::DEBUG);
        assert_eq!(log_level(Some("error")), Level::ERROR);
        assert_eq!(log_level(Some("info")), Level::INFO);
        assert_eq!(log_level(Some("verbose")), Level::INFO);
    }
}
