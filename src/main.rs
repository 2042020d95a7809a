//! atc: module orchestrator.
//!
//! # Architecture Overview
//!
//! ```text
//!   config file + flags
//!          │
//!          ▼
//!   ┌──────────────┐    ┌──────────────┐    ┌──────────────────┐
//!   │ ModuleGraph  │───▶│TargetResolver│───▶│ LifecycleManager │
//!   │ (module      │    │ (closure +   │    │ initialize,      │
//!   │  table)      │    │  topo order) │    │ start_all, ...   │
//!   └──────────────┘    └──────────────┘    └────────┬─────────┘
//!                                                    │ registry
//!          SIGTERM/SIGINT                            ▼
//!   ┌─────────────────────┐  stop_all     ┌──────────────────┐
//!   │ ShutdownCoordinator │──────────────▶│  HealthSurface   │
//!   │ (sets shutdown flag)│               │ /health /ready   │
//!   └─────────────────────┘               │ /services        │
//!                                         └──────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use atc::atc::modules::{self, ALL};
use atc::config::{load_config, validate_config, AtcConfig, ConfigError};
use atc::observability::{logging, metrics};
use atc::Atc;

#[derive(Parser)]
#[command(name = "atc")]
#[command(about = "Boots and supervises the atc modules", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the selected modules until a termination signal
    Server(ServerArgs),
    /// List modules that can be selected as targets
    Modules,
    /// Print the version
    Version,
}

#[derive(Args)]
struct ServerArgs {
    /// TOML configuration file
    #[arg(short, long, env = "ATC_CONFIG")]
    config: Option<PathBuf>,

    /// Listen port, overriding server.bind_address
    #[arg(short, long, env = "ATC_PORT")]
    port: Option<u16>,

    /// Comma-separated modules to run
    #[arg(short, long, env = "ATC_TARGET", value_delimiter = ',')]
    target: Vec<String>,

    /// trace, debug, info, warn or error
    #[arg(long, env = "ATC_LOG_LEVEL")]
    log_level: Option<String>,
}

impl ServerArgs {
    fn load(&self) -> Result<AtcConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => AtcConfig::default(),
        };

        if let Some(port) = self.port {
            let mut addr: SocketAddr = config
                .server
                .bind_address
                .parse()
                .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], port)));
            addr.set_port(port);
            config.server.bind_address = addr.to_string();
        }
        if !self.target.is_empty() {
            config.target = self.target.clone();
        }
        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }

        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Server(args) => serve(args).await,
        Commands::Modules => list_modules(),
        Commands::Version => {
            println!("atc {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn serve(args: ServerArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.load()?;
    logging::init_tracing(&config.observability.log_level)?;

    tracing::info!(
        service = %config.service,
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.server.bind_address,
        target = ?config.target,
        "Configuration loaded"
    );

    let metrics_enabled = config.observability.metrics_enabled;
    let mut app = Atc::new(config)?;
    if metrics_enabled {
        match metrics::install_recorder() {
            Ok(handle) => app = app.with_metrics(handle),
            Err(e) => tracing::error!(error = %e, "Failed to install metrics recorder"),
        }
    }

    app.run().await?;
    Ok(())
}

fn list_modules() -> Result<(), Box<dyn std::error::Error>> {
    let graph = modules::module_graph()?;
    let in_all = graph.dependencies_of(ALL);

    for name in graph.user_visible_module_names() {
        if in_all.contains(name) {
            println!("{name} *");
        } else {
            println!("{name}");
        }
    }

    println!();
    println!("Modules marked with * are included in target \"{ALL}\".");
    Ok(())
}
