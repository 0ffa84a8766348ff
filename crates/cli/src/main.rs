mod config;
mod seed;
mod serve;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use config::PortalConfig;

/// eUprava citizen-services portal.
#[derive(Parser)]
#[command(name = "euprava", version, about = "eUprava citizen-services portal")]
struct Cli {
    /// Path to the portal configuration file (TOML)
    #[arg(long, global = true, env = "EUPRAVA_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Port to listen on (overrides server.listen)
        #[arg(long)]
        port: Option<u16>,
        /// Log level or filter directive (overrides logging.level; RUST_LOG wins)
        #[arg(long)]
        log_level: Option<String>,
        /// Emit logs as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate the configuration file and print a summary
    CheckConfig,
}

fn main() {
    let cli = Cli::parse();

    let mut config = match PortalConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    };

    match cli.command {
        Commands::Serve {
            port,
            log_level,
            json,
        } => {
            if let Some(port) = port {
                config.server.listen.set_port(port);
            }
            if let Some(level) = log_level {
                config.logging.level = level;
            }
            if json {
                config.logging.json = true;
            }
            init_tracing(&config.logging.level, config.logging.json);

            let rt = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    eprintln!("error: failed to create tokio runtime: {e}");
                    process::exit(1);
                }
            };
            if let Err(e) = rt.block_on(serve::start_server(config)) {
                tracing::error!(error = %e, "server error");
                eprintln!("Server error: {e}");
                process::exit(1);
            }
        }
        Commands::CheckConfig => cmd_check_config(&config),
    }
}

/// `RUST_LOG` takes precedence; otherwise the configured level applies.
fn init_tracing(level: &str, json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };
    if let Err(e) = result {
        eprintln!("warning: could not install log subscriber: {e}");
    }
}

fn cmd_check_config(config: &PortalConfig) {
    let seed = &config.seed;
    println!("configuration OK");
    println!("  listen:       {}", config.server.listen);
    println!("  rate limit:   {} req/min", config.server.rate_limit_per_minute);
    println!("  body limit:   {} bytes", config.server.max_body_size);
    println!("  cors:         {}", config.server.enable_cors);
    println!("  log level:    {}", config.logging.level);
    println!(
        "  seed:         {} institutions, {} types, {} services, {} users",
        seed.institutions.len(),
        seed.types.len(),
        seed.services.len(),
        seed.users.len()
    );
}
