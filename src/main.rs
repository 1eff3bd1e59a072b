//! mrkit - Merge-request workflow tools for AI coding agents
//!
//! This is the main entry point for the mrkit binary.

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

mod cli;
mod config;
mod error;
mod logging;
mod server;
mod tools;

use cli::{Args, Commands};
use config::Config;
use tools::ToolRegistry;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.debug);

    info!("Starting mrkit v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = match Config::load(args.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            Config::default()
        }
    };

    let registry = ToolRegistry::new(&config);

    match args.command {
        Commands::List => {
            for def in registry.definitions() {
                println!("{:<14} {}", def.name, def.description);
                for param in &def.parameters {
                    let flag = if param.required { "required" } else { "optional" };
                    println!("    {:<12} {:<8} {}", param.name, flag, param.description);
                }
            }
        }
        Commands::Manifest => {
            println!("{}", serde_json::to_string_pretty(&registry.manifest())?);
        }
        Commands::Call {
            tool,
            args: pairs,
            json,
            dry_run,
        } => {
            let params = match cli::collect_params(json.as_deref(), &pairs) {
                Ok(params) => params,
                Err(e) => {
                    eprintln!("{}", e);
                    std::process::exit(2);
                }
            };

            // Process spawning blocks; keep it off the async workers.
            let registry = Arc::new(registry);
            let result = tokio::task::spawn_blocking(move || {
                if dry_run {
                    registry.dry_run(&tool, &params)
                } else {
                    registry.invoke(&tool, &params)
                }
            })
            .await?;

            let success = result.is_success();
            let text = result.into_text();
            print!("{}", text);
            if !text.ends_with('\n') {
                println!();
            }

            if !success {
                std::process::exit(1);
            }
        }
        Commands::Serve => {
            server::serve_stdio(Arc::new(registry)).await?;
        }
    }

    Ok(())
}

/// Initialize the logging/tracing subsystem
fn init_logging(debug: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}
