//! props-injector command-line resolver
//!
//! Resolves ad-hoc bindings with the built-in providers and prints the
//! result, using the same configuration tiers as the library.

use anyhow::{Context, Result};
use clap::Parser;
use props_injector::Injector;
use props_injector::cli::resolve::run_resolve;
use props_injector::cli::{Cli, Command};
use props_injector::config::{ConfigLoader, ConfigPaths};
use std::fs::OpenOptions;
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn init_logging(cli: &Cli) -> Result<()> {
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match cli.log.as_str() {
        "0" | "off" => {}
        "1" | "stdout" => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stdout)
                .try_init()
                .map_err(|e| anyhow::anyhow!(e))?;
        }
        "2" | "stderr" => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init()
                .map_err(|e| anyhow::anyhow!(e))?;
        }
        filename => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(filename)
                .with_context(|| format!("unable to open log file '{}'", filename))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(file)
                .with_ansi(false)
                .try_init()
                .map_err(|e| anyhow::anyhow!(e))?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    let mut paths = ConfigPaths::discover();
    if let Some(config) = &cli.config {
        paths = paths.with_explicit_file(config);
    }
    let mut loader = ConfigLoader::load_with_paths(paths)?;
    if !cli.resource_roots.is_empty() {
        loader.config_mut().resource_roots = cli.resource_roots.clone();
    }
    let config = loader.into_config();
    debug!(?config, "Configuration loaded");

    let injector = Injector::from_config(config);

    match &cli.command {
        Command::Resolve(args) => {
            let output = run_resolve(&injector, args)?;
            println!("{}", output.render(args.json));
        }
        Command::Kinds => {
            for kind in injector.registry().kinds() {
                println!("{}", kind);
            }
        }
    }

    Ok(())
}
