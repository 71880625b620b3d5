//! seel: encrypted manifest vault CLI
//!
//! Account:
//!   register                  - create an account on this device (or load the existing one)
//!   status                    - show session, pointer, and backends
//!   logout                    - forget the key pair and pointer
//!
//! Files:
//!   put <local> <path>        - encrypt and store a local file
//!   get <path> [-o out]       - decrypt a stored file
//!   rm <path>                 - remove a file from the manifest
//!   ls [prefix]               - list files, newest first
//!   history [-n N]            - manifest snapshots, newest first
//!
//! Devices:
//!   sync export [--link]      - print this device's credentials
//!   sync import <payload>     - adopt credentials from another device
//!
//! Ops:
//!   config show, health

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use seel_core::config::{expand_tilde, SeelConfig};
use seel_core::SeelError;
use seel_manifest::{SessionState, SyncPayload, Vault};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "seel",
    version,
    about = "Encrypted manifest vault",
    long_about = "seel: store files end-to-end encrypted on a content-addressed backend, \
                  indexed by a per-user manifest"
)]
struct Cli {
    /// Path to config.toml
    #[arg(long, short = 'c', env = "SEEL_CONFIG", default_value = "~/.config/seel/config.toml")]
    config: PathBuf,

    /// Log level or filter directive (overrides [log] level)
    #[arg(long, env = "SEEL_LOG")]
    log: Option<String>,

    /// Log format (overrides [log] format)
    #[arg(long, env = "SEEL_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create an account on this device, or load the one already here
    Register,

    /// Show session and backend status
    Status,

    /// Forget this device's key pair and manifest pointer
    Logout,

    /// Encrypt a local file and store it at <path>
    Put {
        /// Local file to read
        local: PathBuf,
        /// Vault path (e.g. notes/todo.md)
        path: String,
        /// MIME type (default: guessed from the extension)
        #[arg(long)]
        mime: Option<String>,
    },

    /// Decrypt the file at <path>
    Get {
        path: String,
        /// Write to this file instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Remove <path> from the manifest
    Rm { path: String },

    /// List files under a prefix, newest first
    Ls {
        #[arg(default_value = "")]
        prefix: String,
    },

    /// Show manifest snapshots, newest first
    History {
        #[arg(long, short = 'n', default_value_t = 10)]
        limit: usize,
    },

    /// Move the account between devices
    Sync {
        #[command(subcommand)]
        action: SyncAction,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Check that the blob backend is reachable
    Health,
}

#[derive(Subcommand, Debug)]
enum SyncAction {
    /// Print credentials for another device. Anyone holding them has full access.
    Export {
        /// Print a `sync=...` link fragment instead of JSON
        #[arg(long)]
        link: bool,
    },
    /// Adopt credentials exported on another device (`-` reads stdin)
    Import { payload: String },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = expand_tilde(&cli.config);
    let config = SeelConfig::load(&config_path)
        .with_context(|| format!("loading config: {}", config_path.display()))?;

    let level = cli.log.clone().unwrap_or_else(|| config.log.level.clone());
    let format = cli.log_format.clone().unwrap_or(match config.log.format.as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    });
    init_logging(&level, &format);
    tracing::debug!(config = %config_path.display(), backend = ?config.storage.backend, "config loaded");

    match cli.command {
        Commands::Config { action: ConfigAction::Show } => cmd_config_show(&config, &config_path),
        Commands::Health => cmd_health(&config).await,
        Commands::Register => cmd_register(&config).await,
        Commands::Status => cmd_status(&config).await,
        Commands::Logout => cmd_logout(&config).await,
        Commands::Put { local, path, mime } => cmd_put(&config, &local, &path, mime).await,
        Commands::Get { path, output } => cmd_get(&config, &path, output.as_deref()).await,
        Commands::Rm { path } => cmd_rm(&config, &path).await,
        Commands::Ls { prefix } => cmd_ls(&config, &prefix).await,
        Commands::History { limit } => cmd_history(&config, limit).await,
        Commands::Sync { action: SyncAction::Export { link } } => cmd_sync_export(&config, link).await,
        Commands::Sync { action: SyncAction::Import { payload } } => {
            cmd_sync_import(&config, &payload).await
        }
    }
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

async fn open_vault(config: &SeelConfig) -> Result<Vault> {
    Vault::open(config).await.context("opening vault")
}

/// Open the vault and restore the session; fails when logged out.
async fn open_session(config: &SeelConfig) -> Result<Vault> {
    let vault = open_vault(config).await?;
    match vault
        .session()
        .load()
        .await
        .map_err(|e| session_error(config, e, "loading session"))?
    {
        SessionState::Active { .. } => Ok(vault),
        SessionState::LoggedOut => {
            anyhow::bail!("not logged in on this device\n  Try: seel register  or  seel sync import <payload>")
        }
    }
}

/// Wrap a session error, adding the way out when local account data is unreadable.
fn session_error(config: &SeelConfig, err: SeelError, action: &'static str) -> anyhow::Error {
    match err {
        SeelError::CorruptLocalState(_) => anyhow::Error::new(err).context(format!(
            "{action}: local account data is unreadable\n  \
             Check ${} holds the right store passphrase, or run `seel logout` to clear it\n  \
             and then `seel register` or `seel sync import <payload>`",
            config.secrets.passphrase_env
        )),
        other => anyhow::Error::new(other).context(action),
    }
}

fn make_spinner(prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{prefix:.bold} {spinner} {msg}") {
        pb.set_style(style);
    }
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

fn format_age(mtime_ms: u64) -> String {
    let secs = seel_core::now_millis().saturating_sub(mtime_ms) / 1000;
    if secs < 60 {
        format!("{secs}s ago")
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else if secs < 86_400 {
        format!("{}h ago", secs / 3600)
    } else {
        format!("{}d ago", secs / 86_400)
    }
}

fn guess_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "md" | "markdown" => "text/markdown",
        "txt" => "text/plain",
        "json" => "application/json",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

// ── `seel register` / `status` / `logout` ─────────────────────────────────────

async fn cmd_register(config: &SeelConfig) -> Result<()> {
    let vault = open_vault(config).await?;
    let pb = make_spinner("register");
    pb.set_message("generating key pair and publishing manifest");
    let state = vault.session().register().await;
    pb.finish_and_clear();

    match state.map_err(|e| session_error(config, e, "registration failed"))? {
        SessionState::Active { user_id, pointer } => {
            println!("registered");
            println!("  user:     {user_id}");
            println!("  manifest: {pointer}");
        }
        SessionState::LoggedOut => anyhow::bail!("registration did not produce a session"),
    }
    Ok(())
}

async fn cmd_status(config: &SeelConfig) -> Result<()> {
    let vault = open_vault(config).await?;
    println!("secure store: {}", vault.secure_store().describe());
    println!("backend:      {}", vault.backend().describe());

    match vault
        .session()
        .load()
        .await
        .map_err(|e| session_error(config, e, "loading session"))?
    {
        SessionState::LoggedOut => println!("session:      logged out"),
        SessionState::Active { user_id, pointer } => {
            let snapshot = vault
                .manifest()
                .current()
                .await
                .context("fetching current manifest")?;
            println!("session:      active");
            println!("user:         {user_id}");
            println!("manifest:     {pointer}");
            println!("files:        {}", snapshot.manifest.files.len());
        }
    }
    Ok(())
}

async fn cmd_logout(config: &SeelConfig) -> Result<()> {
    let vault = open_vault(config).await?;
    vault.session().logout().await.context("logout failed")?;
    println!("logged out");
    Ok(())
}

// ── `seel put` / `get` / `rm` / `ls` / `history` ──────────────────────────────

async fn cmd_put(config: &SeelConfig, local: &Path, path: &str, mime: Option<String>) -> Result<()> {
    let bytes = tokio::fs::read(local)
        .await
        .with_context(|| format!("reading {}", local.display()))?;
    let name = Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
        .to_string();
    let mime = mime.unwrap_or_else(|| guess_mime(local).to_string());

    let vault = open_session(config).await?;
    let pb = make_spinner("put");
    pb.set_message(format!("{path} ({})", format_bytes(bytes.len() as u64)));
    let entry = vault.files().write_file(path, &name, &mime, &bytes).await;
    pb.finish_and_clear();

    let entry = entry.with_context(|| format!("storing {path}"))?;
    println!("{path}  {}  {}  {}", format_bytes(bytes.len() as u64), entry.mime_type, entry.cid.short());
    Ok(())
}

async fn cmd_get(config: &SeelConfig, path: &str, output: Option<&Path>) -> Result<()> {
    let vault = open_session(config).await?;
    let content = vault
        .files()
        .read_file(path)
        .await
        .with_context(|| format!("reading {path}"))?
        .with_context(|| format!("no file at {path}"))?;

    match output {
        Some(out) => {
            tokio::fs::write(out, &content)
                .await
                .with_context(|| format!("writing {}", out.display()))?;
            eprintln!("{path} -> {} ({})", out.display(), format_bytes(content.len() as u64));
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&content).context("writing to stdout")?;
            stdout.flush().context("flushing stdout")?;
        }
    }
    Ok(())
}

async fn cmd_rm(config: &SeelConfig, path: &str) -> Result<()> {
    let vault = open_session(config).await?;
    if vault
        .files()
        .remove_file(path)
        .await
        .with_context(|| format!("removing {path}"))?
    {
        println!("removed {path}");
    } else {
        println!("{path}: not in manifest");
    }
    Ok(())
}

async fn cmd_ls(config: &SeelConfig, prefix: &str) -> Result<()> {
    let vault = open_session(config).await?;
    let entries = vault.files().list_files(prefix).await.context("listing files")?;

    if entries.is_empty() {
        println!("(no files under '{prefix}')");
        return Ok(());
    }
    for (path, entry) in entries {
        let size = entry
            .size
            .map(format_bytes)
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:>10}  {:>8}  {:<24}  {path}",
            size,
            format_age(entry.mtime),
            entry.mime_type
        );
    }
    Ok(())
}

async fn cmd_history(config: &SeelConfig, limit: usize) -> Result<()> {
    let vault = open_session(config).await?;
    let history = vault
        .manifest()
        .history(limit)
        .await
        .context("walking manifest history")?;
    for (i, cid) in history.iter().enumerate() {
        let marker = if i == 0 { "*" } else { " " };
        println!("{marker} {cid}");
    }
    Ok(())
}

// ── `seel sync` ───────────────────────────────────────────────────────────────

async fn cmd_sync_export(config: &SeelConfig, link: bool) -> Result<()> {
    let vault = open_session(config).await?;
    let payload = vault
        .session()
        .export_credentials()
        .await
        .context("exporting credentials")?;

    eprintln!("warning: this payload grants full access to the account; transfer it privately");
    if link {
        println!("{}", payload.to_link_fragment()?);
    } else {
        println!("{}", payload.to_json()?);
    }
    Ok(())
}

async fn cmd_sync_import(config: &SeelConfig, input: &str) -> Result<()> {
    let raw = if input == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading payload from stdin")?;
        buf
    } else {
        input.to_string()
    };
    let payload = SyncPayload::parse(&raw)?;

    let vault = open_vault(config).await?;
    let pb = make_spinner("sync");
    pb.set_message("verifying manifest");
    let state = vault.session().import_credentials(payload).await;
    pb.finish_and_clear();

    if let SessionState::Active { user_id, pointer } = state.context("importing credentials")? {
        println!("imported");
        println!("  user:     {user_id}");
        println!("  manifest: {pointer}");
    }
    Ok(())
}

// ── `seel config show` / `health` ─────────────────────────────────────────────

fn cmd_config_show(config: &SeelConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

async fn cmd_health(config: &SeelConfig) -> Result<()> {
    let pb = make_spinner("health");
    pb.set_message("contacting storage");
    let result = seel_storage::connect(&config.storage).await;
    pb.finish_and_clear();

    let op = result.context("storage unreachable")?;
    let info = op.info();
    println!("storage ok: {}:{}", info.scheme(), info.name());
    Ok(())
}
