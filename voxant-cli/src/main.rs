//! Voxant CLI — credential setup, config inspection, and a text-mode
//! chat driver.
//!
//! The chat REPL runs the same turn discipline as the voice pipeline
//! (snapshot, send, append user turn, append assistant turn on success)
//! with typed input standing in for the microphone.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

use voxant_core::{
    load_config, ChatClient, ConversationHistory, CredentialStore, KeyringCredentialStore, Turn,
    API_KEY_ACCOUNT,
};

/// Voxant: push-to-talk voice assistant engine
#[derive(Parser, Debug)]
#[command(name = "voxant", version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Interactive chat (default)
    Chat,
    /// Manage the API credential
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },
    /// Show the effective configuration
    Config,
}

#[derive(clap::Subcommand, Debug)]
enum KeyAction {
    /// Store the API key in the OS credential store
    Set { api_key: String },
    /// Remove the stored API key
    Delete,
    /// Check whether a key is stored
    Status,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(cli.config.as_deref())
        .map_err(|e| anyhow::anyhow!("failed to load configuration: {e}"))?;
    let store = KeyringCredentialStore::new();

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => chat(config, store).await,
        Commands::Key { action } => key(store, action),
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn key(store: KeyringCredentialStore, action: KeyAction) -> anyhow::Result<()> {
    match action {
        KeyAction::Set { api_key } => {
            store.store_key(API_KEY_ACCOUNT, &api_key)?;
            println!("API key stored.");
        }
        KeyAction::Delete => {
            store.delete_key(API_KEY_ACCOUNT)?;
            println!("API key deleted.");
        }
        KeyAction::Status => {
            if store.has_key(API_KEY_ACCOUNT) {
                println!("An API key is configured.");
            } else {
                println!("No API key configured. Run `voxant key set <KEY>`.");
            }
        }
    }
    Ok(())
}

async fn chat(config: voxant_core::AppConfig, store: KeyringCredentialStore) -> anyhow::Result<()> {
    let client = ChatClient::new(config.llm.clone(), Arc::new(store))?;
    let mut history = ConversationHistory::new(config.memory.max_history_length);

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Voxant chat. Type a message, `/clear` to reset, `/quit` to exit.");
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let message = line.trim();
        match message {
            "" => continue,
            "/quit" | "/exit" => break,
            "/clear" => {
                history.clear();
                println!("Conversation cleared.");
                continue;
            }
            _ => {}
        }

        // Same discipline as the voice turn: snapshot first, record the
        // user turn regardless of outcome, assistant turn only on success.
        let window = history.snapshot();
        history.append(Turn::user(message));
        match client.complete(&window, message).await {
            Ok(reply) => {
                history.append(Turn::assistant(reply.clone()));
                println!("{reply}");
            }
            Err(e) => {
                tracing::warn!(error = %e, "completion failed");
                println!("{}", e.user_facing());
            }
        }
    }

    Ok(())
}
