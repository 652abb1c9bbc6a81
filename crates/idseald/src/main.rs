//! idseald: idseal key-derivation authority daemon
//!
//! Usage:
//!   idseald init  [--key-file /etc/idseal/authority.key] [--force]
//!   idseald serve [--key-file ...] [--socket /run/idseald/idseald.sock]
//!
//! `init` runs the master key ceremony and writes the key file (mode 0600).
//! `serve` loads it and answers GetSystemPublicKey / DeriveKeyMaterial over
//! a Unix domain socket, refusing derivations for any identity other than
//! the authenticated caller.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use idseal_authority::{keyfile, serve_unix, LocalAuthority};
use idseal_core::config::IdsealConfig;

#[derive(Parser, Debug)]
#[command(name = "idseald", version, about = "idseal key-derivation authority daemon")]
struct Cli {
    /// Path to idseal.toml configuration file
    #[arg(
        long,
        short = 'c',
        env = "IDSEAL_CONFIG",
        default_value = "/etc/idseal/config.toml"
    )]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "IDSEAL_LOG", default_value = "info")]
    log: String,

    /// Log format (json, text)
    #[arg(long, env = "IDSEAL_LOG_FORMAT", default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the master key ceremony and write the key file
    Init {
        /// Where to write the key file (overrides config)
        #[arg(long)]
        key_file: Option<PathBuf>,
        /// Overwrite an existing key file
        #[arg(long)]
        force: bool,
    },
    /// Serve the authority on a Unix domain socket
    Serve {
        /// Key file to load (overrides config)
        #[arg(long)]
        key_file: Option<PathBuf>,
        /// Socket path to listen on (overrides config)
        #[arg(long)]
        socket: Option<PathBuf>,
    },
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log, &cli.log_format);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "idseald starting"
    );

    let config = load_config(&cli.config).await?;

    match cli.command {
        Commands::Init { key_file, force } => {
            let path = resolve_key_file(key_file, &config)?;
            if path.exists() && !force {
                anyhow::bail!(
                    "key file {} already exists (pass --force to overwrite)",
                    path.display()
                );
            }
            let authority = LocalAuthority::generate();
            keyfile::save(&authority, &path)?;
            info!(key_file = %path.display(), "master key ceremony complete");
            println!("wrote {}", path.display());
            Ok(())
        }
        Commands::Serve { key_file, socket } => {
            let path = resolve_key_file(key_file, &config)?;
            let authority = keyfile::load(&path)
                .with_context(|| format!("loading key file {} (run `idseald init` first)", path.display()))?;
            let socket = socket.unwrap_or_else(|| config.authority.socket.clone());
            serve_unix(authority, &socket).await
        }
    }
}

fn resolve_key_file(flag: Option<PathBuf>, config: &IdsealConfig) -> Result<PathBuf> {
    flag.or_else(|| config.authority.key_file.clone())
        .ok_or_else(|| {
            anyhow::anyhow!("no key file configured (set authority.key_file or pass --key-file)")
        })
}

async fn load_config(path: &PathBuf) -> Result<IdsealConfig> {
    if path.exists() {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| anyhow::anyhow!("reading config {}: {e}", path.display()))?;
        toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("parsing config {}: {e}", path.display()))
    } else {
        tracing::warn!("config file not found: {}  (using defaults)", path.display());
        Ok(IdsealConfig::default())
    }
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json())
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .init();
        }
    }
}
