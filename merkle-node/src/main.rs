//! Merkle Authority Node
//!
//! `serve` runs the proof authority, `check` runs one validity session
//! against it, and `hash` prints the content hash of raw inputs.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use merkle_proof::{hash_text, ContentHasher, Hash, HashAlgorithm, ProofIndex};
use tracing::{error, info, warn};

use merkle_node::config::{self, NodeConfig};
use merkle_node::shutdown::Shutdown;
use merkle_node::{AuthorityService, ClientConfig, ValidityClient};

/// Merkle proof authority and validity client
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "merkle-node.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Authority host (overrides config file)
    #[arg(long, global = true)]
    host: Option<String>,

    /// Authority port (overrides config file)
    #[arg(short, long, global = true)]
    port: Option<u16>,

    /// Content hash algorithm: sha256 or sha3-256 (overrides config file)
    #[arg(long, global = true)]
    algorithm: Option<HashAlgorithm>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve sibling paths from a proof index
    Serve {
        /// Proof index JSON file (overrides config file)
        #[arg(short, long)]
        index: Option<PathBuf>,
    },

    /// Check transactions against a known Merkle root
    Check {
        /// Known Merkle root
        #[arg(short, long)]
        root: String,

        /// Treat root and transactions as raw text and hash them first
        #[arg(long, default_value_t = false)]
        text: bool,

        /// Print the report as JSON
        #[arg(long, default_value_t = false)]
        json: bool,

        /// Transactions to check, in order
        #[arg(required = true)]
        transactions: Vec<String>,
    },

    /// Print the content hash of each input
    Hash {
        #[arg(required = true)]
        inputs: Vec<String>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level)?;

    let mut config = load_configuration(&args)?;
    if let Some(host) = args.host.clone() {
        config.host = host;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(algorithm) = args.algorithm {
        config.hash_algorithm = algorithm;
    }
    config::validate_config(&config).context("Invalid configuration")?;

    match args.command {
        Command::Serve { index } => {
            if index.is_some() {
                config.proof_index_path = index;
            }
            run_authority(config).await
        }
        Command::Check {
            root,
            text,
            json,
            transactions,
        } => {
            config::validate_client_config(&config).context("Invalid configuration")?;
            run_check(config, &root, &transactions, text, json).await
        }
        Command::Hash { inputs } => {
            for input in inputs {
                println!("{}  {}", hash_text(&config.hash_algorithm, &input), input);
            }
            Ok(())
        }
    }
}

/// Initialize logging system
fn init_logging(log_level: &str) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => {
            eprintln!("Unknown log level: {}, using INFO", log_level);
            tracing::Level::INFO
        }
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

/// Load configuration file, falling back to defaults
fn load_configuration(args: &Args) -> Result<NodeConfig> {
    if !args.config.exists() {
        info!(path = %args.config.display(), "Configuration file not found, using defaults");
    }
    config::load_config(&args.config).context("Failed to load configuration")
}

async fn run_authority(config: NodeConfig) -> Result<()> {
    let index = match &config.proof_index_path {
        Some(path) => ProofIndex::load(path)
            .with_context(|| format!("Failed to load proof index {}", path.display()))?,
        None => {
            warn!("No proof index configured, every query will get an empty path");
            ProofIndex::new()
        }
    };

    info!(
        entries = index.len(),
        algorithm = %config.hash_algorithm,
        root = %index.root.as_ref().map(Hash::to_string).unwrap_or_else(|| "-".to_string()),
        "Proof index ready"
    );
    for tx in index.check_consistency(&config.hash_algorithm) {
        warn!(transaction = %tx, "Indexed path does not fold to the advertised root");
    }

    let shutdown = Shutdown::default();
    shutdown.listen_for_signals();

    let authority = AuthorityService::new(Arc::new(index))
        .with_max_sessions(config.max_sessions)
        .bind(config.address())
        .await
        .with_context(|| format!("Failed to bind {}", config.address()))?;

    authority.run(Shutdown::wait(shutdown.subscribe())).await?;
    info!("Authority stopped");
    Ok(())
}

async fn run_check(
    config: NodeConfig,
    root: &str,
    transactions: &[String],
    text: bool,
    json: bool,
) -> Result<()> {
    let algorithm = config.hash_algorithm;
    let parse = |input: &str| -> Result<Hash> {
        if text {
            Ok(hash_text(&algorithm, input))
        } else {
            input
                .parse::<Hash>()
                .with_context(|| format!("{input:?} is not a {} hex digest", algorithm.algorithm_name()))
        }
    };

    let root = parse(root)?;
    let queries = transactions
        .iter()
        .map(|tx| parse(tx.as_str()))
        .collect::<Result<Vec<_>>>()?;

    let shutdown = Shutdown::default();
    shutdown.listen_for_signals();

    let mut client = ValidityClient::new(ClientConfig::from_node_config(&config, root, queries))
        .with_cancellation(shutdown.subscribe());

    match client.check_all().await {
        Ok(report) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{report}");
            }
            Ok(())
        }
        Err(partial) => {
            let (report, cause) = partial.into_parts();
            error!(
                checked = report.verdicts.len(),
                requested = transactions.len(),
                error = %cause,
                "Validity session aborted"
            );
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{report}");
            }
            Err(cause.into())
        }
    }
}
