use anyhow::{Context, Result};
use clap::Parser;
use std::{env, str::FromStr};

const DEFAULT_PORT: u16 = 5000;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_ORPHAN_GRACE_SECS: u64 = 3600;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub database_url: String,
    pub public_base_url: String,
    pub max_upload_bytes: usize,
    pub orphan_grace_secs: u64,
}

/// What the process does after configuration is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Serve,
    Migrate,
    SweepOrphans,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Flyer, gallery and contact-form backend")]
pub struct Args {
    /// Host to bind to (overrides FLYER_BOARD_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides FLYER_BOARD_PORT, then PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where blobs are stored (overrides FLYER_BOARD_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Database URL (overrides FLYER_BOARD_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Base URL media links are built on (overrides FLYER_BOARD_PUBLIC_BASE_URL)
    #[arg(long)]
    pub public_base_url: Option<String>,

    /// Upload size ceiling in bytes (overrides FLYER_BOARD_MAX_UPLOAD_BYTES)
    #[arg(long)]
    pub max_upload_bytes: Option<usize>,

    /// Minimum age before an unindexed blob is swept (overrides FLYER_BOARD_ORPHAN_GRACE_SECS)
    #[arg(long)]
    pub orphan_grace_secs: Option<u64>,

    /// Run migrations and exit
    #[arg(long, conflicts_with = "sweep_orphans")]
    pub migrate: bool,

    /// Delete blobs no record references, then exit
    #[arg(long)]
    pub sweep_orphans: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and run mode.
    pub fn from_env_and_args() -> Result<(Self, RunMode)> {
        Self::from_sources(Args::parse(), |name| env::var(name))
    }

    fn from_sources<F>(args: Args, lookup: F) -> Result<(Self, RunMode)>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        // --- Environment fallback ---
        let text = |name: &str, default: &str| lookup(name).unwrap_or_else(|_| default.into());
        let env_host = text("FLYER_BOARD_HOST", "0.0.0.0");
        let env_port = match parse_var(&lookup, "FLYER_BOARD_PORT")? {
            Some(port) => port,
            None => parse_var(&lookup, "PORT")?.unwrap_or(DEFAULT_PORT),
        };
        let env_storage = text("FLYER_BOARD_STORAGE_DIR", "./data/blobs");
        let env_db = text(
            "FLYER_BOARD_DATABASE_URL",
            "sqlite://./data/meta/flyer_board.db",
        );
        let env_public = lookup("FLYER_BOARD_PUBLIC_BASE_URL").ok();
        let env_max = parse_var(&lookup, "FLYER_BOARD_MAX_UPLOAD_BYTES")?
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);
        let env_grace = parse_var(&lookup, "FLYER_BOARD_ORPHAN_GRACE_SECS")?
            .unwrap_or(DEFAULT_ORPHAN_GRACE_SECS);

        // --- Merge ---
        let port = args.port.unwrap_or(env_port);
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port,
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            database_url: args.database_url.unwrap_or(env_db),
            public_base_url: args
                .public_base_url
                .or(env_public)
                .unwrap_or_else(|| format!("http://localhost:{}", port)),
            max_upload_bytes: args.max_upload_bytes.unwrap_or(env_max),
            orphan_grace_secs: args.orphan_grace_secs.unwrap_or(env_grace),
        };

        if cfg.max_upload_bytes == 0 {
            anyhow::bail!("max upload size must be greater than zero");
        }
        cfg.orphan_grace()?;

        let mode = if args.migrate {
            RunMode::Migrate
        } else if args.sweep_orphans {
            RunMode::SweepOrphans
        } else {
            RunMode::Serve
        };

        Ok((cfg, mode))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Orphan grace period as a chrono duration.
    pub fn orphan_grace(&self) -> Result<chrono::Duration> {
        i64::try_from(self.orphan_grace_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .with_context(|| format!("orphan grace of {}s is out of range", self.orphan_grace_secs))
    }
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Result<String, env::VarError>,
{
    match lookup(name) {
        Ok(value) => value
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}
