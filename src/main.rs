use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;

use horus_gun::config::HubConfig;
use horus_gun::storage::{Database, DB_FILE, INITIALIZED};
use horus_gun::{logging, server, GunClient};

#[derive(Parser)]
#[command(name = "horus-gun")]
#[command(about = "Append-only JSON node store with live WebSocket fan-out", version)]
#[command(after_help = "Wire frames:
  {\"put\": {...}}            store a node, broadcast {\"put\": {\"<soul>\": {...}}}
  {\"get\": {\"#\": \"<soul>\"}}    read a node, reply {\"get\": {\"<soul>\": {...} | null}}

Environment: HORUS_BIND, HORUS_PORT, HORUS_DATA_DIR, HORUS_LOG_DIR, HORUS_REJECT_FRAMES, RUST_LOG")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server
    Serve {
        /// TOML config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Store a JSON node through a running server
    Put {
        /// Shard endpoint, e.g. ws://localhost:8787/gun/admin
        #[arg(short, long, default_value = "ws://127.0.0.1:8787/gun")]
        url: String,

        /// JSON object or array
        json: String,

        #[arg(long, default_value = "5")]
        timeout_secs: u64,
    },

    /// Read a node by soul through a running server
    Get {
        #[arg(short, long, default_value = "ws://127.0.0.1:8787/gun")]
        url: String,

        soul: String,

        #[arg(long, default_value = "5")]
        timeout_secs: u64,
    },

    /// Show persisted shard flags
    Status {
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, port } => {
            let mut config = HubConfig::load(config.as_deref())?;
            if let Some(port) = port {
                config.port = port;
            }
            let _guard = logging::init(config.log_dir.as_deref())?;

            println!(
                "{}",
                format!("🌐 Starting server on port {}...", config.port)
                    .cyan()
                    .bold()
            );
            server::start(config).await?;
        }

        Commands::Put {
            url,
            json,
            timeout_secs,
        } => {
            let value: serde_json::Value =
                serde_json::from_str(&json).context("argument is not valid JSON")?;
            let mut client = GunClient::connect(&url).await?;
            let soul = client
                .put_and_confirm(value, Duration::from_secs(timeout_secs))
                .await?;
            println!("{} Stored as {}", "✓".green(), soul.to_string().bright_yellow());
            client.close().await?;
        }

        Commands::Get {
            url,
            soul,
            timeout_secs,
        } => {
            let mut client = GunClient::connect(&url).await?;
            match client.fetch(&soul, Duration::from_secs(timeout_secs)).await? {
                Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                None => println!("{} No node with soul {}", "✗".red(), soul.bright_yellow()),
            }
            client.close().await?;
        }

        Commands::Status { config } => {
            let config = HubConfig::load(config.as_deref())?;
            let db = Database::new(&config.data_dir)?;
            db.initialize()?;
            let flags = db.list_flags()?;

            println!("{}", "Shard Flags".cyan().bold());
            println!("{}", "═".repeat(60).bright_black());
            println!(
                "{} {}",
                "→".bright_blue(),
                config.data_dir.join(DB_FILE).display().to_string().bright_black()
            );

            for shard in &config.shards {
                let initialized = flags
                    .iter()
                    .any(|(s, name, value)| s == &shard.name && name == INITIALIZED && *value);
                let state = if initialized {
                    "initialized".green()
                } else {
                    "not seeded".yellow()
                };
                println!("  {} {}", shard.name.bright_white(), state);
            }
        }
    }

    Ok(())
}
