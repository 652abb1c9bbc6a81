//! idseal: identity-sealed file CLI
//!
//! Commands:
//!   encrypt <file> --to <identity>   - seal a file for a recipient identity
//!   decrypt <file.enc>               - open a container as the caller identity
//!   inspect <file.enc>               - print container metadata without decrypting
//!   config show                      - display current configuration
//!
//! The caller identity token comes from --identity / IDSEAL_IDENTITY; the
//! authentication protocol that would normally produce it is out of scope
//! for this tool. The authority is reached over the daemon's Unix socket,
//! or in-process with --local-key for offline use.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use idseal_authority::{keyfile, LocalAuthority, RemoteAuthority};
use idseal_core::config::IdsealConfig;
use idseal_core::SealResult;
use idseal_crypto::container::has_container_extension;
use idseal_crypto::{sha256_hex, CONTAINER_EXTENSION};
use idseal_engine::{DecryptOutcome, EngineOptions, FileInfo, KeyAuthority, SealEngine};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "idseal",
    version,
    about = "identity-sealed file encryption",
    long_about = "idseal: encrypt files for a recipient identity; only that identity can decrypt"
)]
struct Cli {
    /// Path to idseal.toml configuration file
    #[arg(
        long,
        short = 'c',
        env = "IDSEAL_CONFIG",
        default_value = "/etc/idseal/config.toml"
    )]
    config: PathBuf,

    /// Caller identity token (stand-in for the session layer)
    #[arg(long, env = "IDSEAL_IDENTITY")]
    identity: Option<String>,

    /// Authority daemon socket (overrides config)
    #[arg(long)]
    socket: Option<PathBuf>,

    /// Authority key file for in-process (offline) operation
    #[arg(long)]
    local_key: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Seal a file for a recipient identity
    Encrypt {
        /// File to encrypt
        file: PathBuf,
        /// Recipient identity the container is sealed for
        #[arg(long, short = 't')]
        to: String,
        /// Output path (default: <file>.enc)
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
    },

    /// Open a container as the caller identity
    Decrypt {
        /// Container file (.enc)
        file: PathBuf,
        /// Output path (default: original name from metadata)
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
    },

    /// Print container metadata without decrypting
    Inspect {
        /// Container file (.enc)
        file: PathBuf,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Display the effective configuration
    Show,
}

/// Authority selected by flags: in-process key file or daemon socket.
enum CliAuthority {
    Local(LocalAuthority),
    Remote(RemoteAuthority),
}

impl KeyAuthority for CliAuthority {
    async fn system_public_key(&self) -> SealResult<Vec<u8>> {
        match self {
            Self::Local(a) => a.system_public_key().await,
            Self::Remote(a) => a.system_public_key().await,
        }
    }

    async fn derive_key_material(
        &self,
        identity: &str,
        transport_public_key: &[u8],
    ) -> SealResult<Vec<u8>> {
        match self {
            Self::Local(a) => a.derive_key_material(identity, transport_public_key).await,
            Self::Remote(a) => a.derive_key_material(identity, transport_public_key).await,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let config = load_config(&cli.config)?;

    match &cli.command {
        Commands::Encrypt { file, to, out } => {
            let engine = build_engine(&cli, &config).await?;
            cmd_encrypt(&engine, file, to, out.as_deref()).await
        }
        Commands::Decrypt { file, out } => {
            let caller = require_identity(&cli)?;
            let engine = build_engine(&cli, &config).await?;
            cmd_decrypt(&engine, file, &caller, out.as_deref()).await
        }
        Commands::Inspect { file } => cmd_inspect(file),
        Commands::Config { action: ConfigAction::Show } => cmd_config_show(&config, &cli.config),
    }
}

fn require_identity(cli: &Cli) -> Result<String> {
    cli.identity
        .clone()
        .ok_or_else(|| anyhow::anyhow!("no caller identity (pass --identity or set IDSEAL_IDENTITY)"))
}

async fn build_engine(cli: &Cli, config: &IdsealConfig) -> Result<SealEngine<CliAuthority>> {
    let authority = match &cli.local_key {
        Some(key_path) => {
            let mut authority = keyfile::load(key_path)?;
            // Mirror the daemon's caller enforcement in-process
            if let Some(identity) = &cli.identity {
                authority = authority.with_authenticated_caller(identity.clone());
            }
            CliAuthority::Local(authority)
        }
        None => {
            let socket = cli
                .socket
                .clone()
                .unwrap_or_else(|| config.authority.socket.clone());
            let caller = cli.identity.clone().unwrap_or_default();
            CliAuthority::Remote(RemoteAuthority::connect(&socket, caller).await?)
        }
    };

    let options = EngineOptions {
        integrity_policy: config.engine.integrity_policy.parse()?,
        cache_capacity: config.engine.key_cache_capacity,
        local_identity: cli.identity.clone(),
    };

    Ok(SealEngine::new(authority, options))
}

// ── `idseal encrypt` ──────────────────────────────────────────────────────────

async fn cmd_encrypt(
    engine: &SealEngine<CliAuthority>,
    file: &Path,
    to: &str,
    out: Option<&Path>,
) -> Result<()> {
    let plaintext =
        std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;

    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unnamed".into());

    let info = FileInfo {
        name,
        original_hash: Some(sha256_hex(&plaintext)),
    };

    let sealed = engine.encrypt_file(&plaintext, to, &info).await?;

    let out_path = match out {
        Some(path) => path.to_path_buf(),
        None => {
            let mut path = file.to_path_buf();
            path.as_mut_os_string().push(".");
            path.as_mut_os_string().push(CONTAINER_EXTENSION);
            path
        }
    };
    std::fs::write(&out_path, &sealed.data)
        .with_context(|| format!("writing {}", out_path.display()))?;

    println!("sealed for:      {to}");
    println!("plaintext:       {} bytes", sealed.metadata.original_size);
    println!("ciphertext:      {} bytes", sealed.metadata.encrypted_size);
    println!("container:       {}", out_path.display());
    Ok(())
}

// ── `idseal decrypt` ──────────────────────────────────────────────────────────

async fn cmd_decrypt(
    engine: &SealEngine<CliAuthority>,
    file: &Path,
    caller: &str,
    out: Option<&Path>,
) -> Result<()> {
    // Reject before any bytes are read, let alone parsed
    if !has_container_extension(file) {
        bail!(
            "{} does not carry the .{} extension; refusing to parse",
            file.display(),
            CONTAINER_EXTENSION
        );
    }

    let data = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    let outcome = engine.decrypt_file(&data, caller).await?;

    let out_path = match out {
        Some(path) => path.to_path_buf(),
        None => default_output_name(&outcome),
    };
    std::fs::write(&out_path, &outcome.plaintext)
        .with_context(|| format!("writing {}", out_path.display()))?;

    if !outcome.integrity.verified {
        if let Some(detail) = &outcome.integrity.detail {
            eprintln!("warning: {detail}");
        }
    }
    println!("decrypted:       {} bytes", outcome.plaintext.len());
    println!("original name:   {}", outcome.metadata.original_name);
    println!("output:          {}", out_path.display());
    Ok(())
}

/// Default output name from metadata, stripped to its file-name component
/// so a hostile `originalName` cannot escape the working directory.
fn default_output_name(outcome: &DecryptOutcome) -> PathBuf {
    Path::new(&outcome.metadata.original_name)
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("decrypted.out"))
}

// ── `idseal inspect` ──────────────────────────────────────────────────────────

fn cmd_inspect(file: &Path) -> Result<()> {
    if !has_container_extension(file) {
        bail!(
            "{} does not carry the .{} extension; refusing to parse",
            file.display(),
            CONTAINER_EXTENSION
        );
    }

    let data = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
    let (meta, ciphertext) = idseal_crypto::container::decode(&data)
        .map_err(|e| anyhow::anyhow!("not a valid container: {e}"))?;

    let rendered = serde_json::to_string_pretty(&meta).context("rendering metadata")?;
    println!("{rendered}");

    let actual = sha256_hex(ciphertext);
    if actual == meta.hash {
        println!("integrity:       hash ok");
    } else {
        println!("integrity:       MISMATCH (stored {}, actual {})", meta.hash, actual);
    }
    Ok(())
}

// ── `idseal config show` ──────────────────────────────────────────────────────

fn cmd_config_show(config: &IdsealConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!(
            "# Configuration: defaults (no file at {})",
            config_path.display()
        );
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

// ── plumbing ──────────────────────────────────────────────────────────────────

fn load_config(path: &Path) -> Result<IdsealConfig> {
    if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("parsing config {}: {e}", path.display()))
    } else {
        Ok(IdsealConfig::default())
    }
}

fn init_logging() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}
