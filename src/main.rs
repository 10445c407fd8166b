use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use mqstat::config::Config;
use mqstat::decode;
use mqstat::metadata::MetadataCache;
use mqstat::pcf::{self, Command as PcfCommand};
use mqstat::registry::{AttributeRegistry, Capabilities};
use mqstat::store::MetricStore;

/// Queue status collection for IBM MQ queue managers.
#[derive(Parser)]
#[command(name = "mqstat", about)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Logging verbosity level (trace, debug, info, warn, error).
    /// Overrides the configured `log_level`.
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print version information and exit.
    Version,

    /// Decode captured PCF reply messages and print the resulting metric
    /// values as JSON.
    ///
    /// Files are applied in order: queue names and attribute replies update
    /// the metadata cache, status and reset-statistics replies are written to
    /// the metric store.
    Decode {
        /// Files each holding one reply message.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
}

mod version {
    pub const RELEASE: &str = env!("CARGO_PKG_VERSION");

    /// Git commit hash (set at build time via env, or "unknown").
    pub fn git_commit() -> &'static str {
        option_env!("GIT_COMMIT").unwrap_or("unknown")
    }

    pub fn full() -> String {
        format!(
            "{} (commit: {}, {}/{})",
            RELEASE,
            git_commit(),
            std::env::consts::OS,
            std::env::consts::ARCH,
        )
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(Command::Version) = &cli.command {
        println!("mqstat {}", version::full());
        return Ok(());
    }

    let cfg = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::default(),
    };

    let log_level = cli.log_level.as_deref().unwrap_or(&cfg.log_level);
    let filter = EnvFilter::try_new(log_level)
        .with_context(|| format!("invalid log level: {log_level}"))?;

    // Logs go to stderr so decoded output can be piped.
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let capabilities = cfg.capabilities;

    match cli.command {
        Some(Command::Decode { files }) => decode_files(&capabilities, &files),
        Some(Command::Version) => Ok(()),
        None => bail!("no command given (use --help for usage)"),
    }
}

fn decode_files(capabilities: &Capabilities, files: &[PathBuf]) -> Result<()> {
    let registry = AttributeRegistry::new(capabilities);
    let metadata = MetadataCache::new();
    let mut store = MetricStore::new(&registry);
    let now = Local::now();

    for path in files {
        let msg = read_reply(path)?;
        let command = msg.header.command();

        let key = match command {
            Some(PcfCommand::InquireQueueStatus) => {
                decode::parse_status(&msg, &registry, &metadata, &mut store, &now)
            }
            Some(PcfCommand::ResetQueueStats) => {
                decode::parse_reset_stats(&msg, &registry, &mut store)
            }
            Some(PcfCommand::InquireQueue) => decode::parse_attributes(&msg).map(|attrs| {
                metadata.merge(&attrs);
                attrs.name
            }),
            Some(PcfCommand::InquireQueueNames) => {
                let mut names = metadata.known_objects();
                names.extend(decode::parse_names(&msg));
                metadata.sync_inventory(&names);
                None
            }
            None => bail!(
                "{}: unsupported command {} in reply header",
                path.display(),
                msg.header.command
            ),
        };

        tracing::debug!(
            file = %path.display(),
            command = ?command,
            queue = key.as_deref().unwrap_or(""),
            "decoded reply",
        );
    }

    tracing::info!(
        files = files.len(),
        queues = store.object_count(),
        "decode finished",
    );

    let out = serde_json::to_string_pretty(&store).context("serializing metric store")?;
    println!("{out}");

    Ok(())
}

fn read_reply(path: &Path) -> Result<pcf::Message> {
    let data =
        std::fs::read(path).with_context(|| format!("reading reply file {}", path.display()))?;
    pcf::read_message(&data).with_context(|| format!("parsing reply file {}", path.display()))
}
