//! docchat: Document Chat Main Binary
//!
//! Usage:
//!   docchat                    - Start the interactive chat
//!   docchat --config <path>    - Use a specific docchat.toml
//!   docchat --session <id>     - Resume a specific session
//!   docchat --help             - Show help

mod cli;

use std::path::PathBuf;
use std::sync::Arc;

use dc_core::{ChatEngine, Config, GeminiClient, SessionStore, Uploader, storage};
use tracing_subscriber::EnvFilter;

/// Run mode
enum RunMode {
    /// Interactive chat
    Chat(ChatArgs),
    /// Show help
    Help,
    /// Show version
    Version,
}

#[derive(Default)]
struct ChatArgs {
    config_path: Option<PathBuf>,
    session_id: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = match parse_args(std::env::args().skip(1)) {
        Ok(RunMode::Chat(args)) => args,
        Ok(RunMode::Help) => {
            print_help();
            return Ok(());
        }
        Ok(RunMode::Version) => {
            println!("docchat {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Err(e) => {
            eprintln!("エラー: {}", e);
            eprintln!("docchat --help で使い方を確認してください");
            std::process::exit(2);
        }
    };

    // Load .env file (before logging, so RUST_LOG can come from it)
    dotenvy::dotenv().ok();

    // REPL の表示を邪魔しないよう既定は warn、出力先は stderr
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load(args.config_path.as_deref())
        .map_err(|e| anyhow::anyhow!("Config error: {}", e))?;

    tracing::info!("Starting docchat...");
    tracing::info!("Model: {}", config.llm.model);

    let storage = storage::open(&config.storage)
        .map_err(|e| anyhow::anyhow!("Failed to open storage: {}", e))?;
    let store = SessionStore::load(storage, config.storage.sessions_key.clone());

    let client = Arc::new(
        GeminiClient::new(&config)
            .map_err(|e| anyhow::anyhow!("Failed to create Gemini client: {}", e))?,
    );

    let engine = ChatEngine::new(client.clone(), store, config.chat.clone());
    if let Some(id) = args.session_id.as_deref() {
        engine
            .select(Some(id))
            .await
            .map_err(|e| anyhow::anyhow!("Cannot resume session: {}", e))?;
    }

    let uploader = Uploader::new(client, &config.upload);

    cli::run_cli(engine, uploader).await
}

/// Parse command line arguments
fn parse_args(args: impl IntoIterator<Item = String>) -> Result<RunMode, String> {
    let mut chat = ChatArgs::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => return Ok(RunMode::Help),
            "--version" | "-v" => return Ok(RunMode::Version),
            "--config" | "-c" => {
                let path = args.next().ok_or("--config にはパスが必要です")?;
                chat.config_path = Some(PathBuf::from(path));
            }
            "--session" | "-s" => {
                let id = args.next().ok_or("--session にはセッション ID が必要です")?;
                chat.session_id = Some(id);
            }
            other => return Err(format!("不明な引数: {}", other)),
        }
    }

    Ok(RunMode::Chat(chat))
}

/// Print help message
fn print_help() {
    println!("docchat - Chat with your documents using Gemini");
    println!();
    println!("Usage:");
    println!("  docchat                    Start the interactive chat");
    println!("  docchat --config <path>    Load settings from <path> (default: ./docchat.toml)");
    println!("  docchat --session <id>     Resume the session with the given id");
    println!("  docchat --help             Show this help message");
    println!("  docchat --version          Show version");
    println!();
    println!("Environment Variables:");
    println!("  GEMINI_API_KEY             API key (required)");
    println!("  GEMINI_MODEL               Model name (default: gemini-2.0-flash)");
    println!("  GEMINI_BASE_URL            Custom API endpoint");
    println!("  DOCCHAT_STORAGE            Storage backend: file or sqlite (default: file)");
    println!("  DOCCHAT_DATA_DIR           Data directory (default: data)");
    println!("  RUST_LOG                   Log filter (default: warn)");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<RunMode, String> {
        parse_args(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_parse_defaults() {
        let Ok(RunMode::Chat(args)) = parse(&[]) else {
            panic!("expected chat mode");
        };
        assert!(args.config_path.is_none());
        assert!(args.session_id.is_none());
    }

    #[test]
    fn test_parse_options() {
        let Ok(RunMode::Chat(args)) = parse(&["--config", "my.toml", "-s", "abc"]) else {
            panic!("expected chat mode");
        };
        assert_eq!(args.config_path, Some(PathBuf::from("my.toml")));
        assert_eq!(args.session_id.as_deref(), Some("abc"));
    }

    #[test]
    fn test_parse_help_and_version() {
        assert!(matches!(parse(&["--help"]), Ok(RunMode::Help)));
        assert!(matches!(parse(&["-v"]), Ok(RunMode::Version)));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse(&["--config"]).is_err());
        assert!(parse(&["--bogus"]).is_err());
    }
}
