//! Assetpress - pre-compressed static asset serving
//!
//! This is the main entry point for the Assetpress CLI.

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use assetpress_compress::{Compressor, MatchRule};
use assetpress_core::VERSION;
use assetpress_core::config::{
    AssetpressConfig, CompressConfig, ConfigLoader, LoggingConfig, ServerConfig,
};

/// Assetpress - gzip/brotli pre-compression and a negotiating file server
#[derive(Parser)]
#[command(name = "assetpress")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write .gz and .br siblings for matched files
    Compress {
        /// Directories to walk
        #[arg(required = true)]
        dirs: Vec<String>,

        /// Regular expression matched against file names
        #[arg(long, conflicts_with = "extensions")]
        pattern: Option<String>,

        /// Comma-separated file name suffixes
        #[arg(long, value_delimiter = ',')]
        extensions: Option<Vec<String>>,

        /// Rewrite artifacts older than their source
        #[arg(long)]
        refresh_stale: bool,
    },

    /// Start a negotiating file server
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:8080")]
        listen: String,

        /// Root directory to serve
        #[arg(long, default_value = ".")]
        root: String,

        /// Path prefix to mount the file server under
        #[arg(long, default_value = "/")]
        prefix: String,

        /// File served for `/`
        #[arg(long, default_value = "index.html")]
        index: String,

        /// Compress web assets under the root before serving
        #[arg(long)]
        precompress: bool,
    },

    /// Run the compress and server sections of a configuration file
    Run {
        /// Path to the configuration file (.toml or .json)
        #[arg(default_value = "assetpress.toml")]
        config: String,
    },

    /// Validate a configuration file
    Validate {
        /// Path to the configuration file (.toml or .json)
        #[arg(default_value = "assetpress.toml")]
        config: String,
    },

    /// Show version information
    Version,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.command {
        Commands::Run { config } => Some(
            ConfigLoader::load(config)
                .with_context(|| format!("Failed to load config {}", config))?,
        ),
        _ => None,
    };
    let default_logging = LoggingConfig::default();
    init_logging(config.as_ref().map_or(&default_logging, |c| &c.logging), cli.verbose);

    if cli.verbose {
        tracing::info!("Verbose mode enabled");
    }

    match cli.command {
        Commands::Compress {
            dirs,
            pattern,
            extensions,
            refresh_stale,
        } => {
            let config = CompressConfig {
                roots: dirs,
                extensions,
                pattern,
                refresh_stale,
            };
            run_compress(&config)?;
        }

        Commands::Serve {
            listen,
            root,
            prefix,
            index,
            precompress,
        } => {
            let config = AssetpressConfig {
                server: Some(ServerConfig {
                    listen,
                    root,
                    prefix,
                    index,
                    precompress,
                }),
                ..Default::default()
            };
            config.validate()?;
            run(config)?;
        }

        Commands::Run { config: config_path } => {
            tracing::info!(
                "🚀 Starting Assetpress v{} with config: {}",
                VERSION,
                config_path
            );
            if let Some(config) = config {
                run(config)?;
            }
        }

        Commands::Validate { config } => match ConfigLoader::load(&config) {
            Ok(_) => {
                println!("✅ Configuration '{}' is valid!", config);
            }
            Err(e) => {
                eprintln!("❌ Configuration Error: {}", e);
                std::process::exit(1);
            }
        },

        Commands::Version => {
            println!("Assetpress v{}", VERSION);
        }
    }

    Ok(())
}

/// `RUST_LOG` wins over the configured level; `--verbose` raises the
/// configured level to debug.
fn init_logging(logging: &LoggingConfig, verbose: bool) {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    if logging.format == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn run_compress(config: &CompressConfig) -> anyhow::Result<()> {
    let compressor = Compressor::from_config(config)?;
    for root in &config.roots {
        let matched = compressor
            .run(root)
            .with_context(|| format!("Failed to compress {}", root))?;
        tracing::info!("🗜️ {}: {} file(s) matched", root, matched.len());
    }
    Ok(())
}

fn run(config: AssetpressConfig) -> anyhow::Result<()> {
    if let Some(compress) = &config.compress {
        run_compress(compress)?;
    }

    let Some(server) = config.server else {
        if config.compress.is_none() {
            tracing::warn!("⚠️ Nothing configured: no compress or server section");
        }
        return Ok(());
    };

    if server.precompress {
        Compressor::new(MatchRule::web_assets())
            .run(&server.root)
            .with_context(|| format!("Failed to precompress {}", server.root))?;
    }

    let runtime = tokio::runtime::Runtime::new().context("Failed to create runtime")?;
    runtime.block_on(serve_until_ctrl_c(server))
}

async fn serve_until_ctrl_c(server: ServerConfig) -> anyhow::Result<()> {
    tokio::select! {
        result = assetpress_server::run_server(&server) => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("🛑 Received Ctrl-C, shutting down");
        }
    }
    Ok(())
}
