//! CLI command definitions for the `props-injector` binary.
//!
//! The binary resolves ad-hoc bindings against the built-in providers, which
//! is handy for checking what a binding would inject before wiring it into
//! a type.

pub mod resolve;

use clap::{Parser, Subcommand};
use resolve::ResolveArgs;
use std::path::PathBuf;

/// Resolve configuration bindings from the command line
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (layered above the user config)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Resource root searched for bare locators (repeatable, overrides config)
    #[arg(short, long = "resource-root", global = true, value_name = "DIR")]
    pub resource_roots: Vec<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve a single binding and print its value
    Resolve(ResolveArgs),

    /// List registered provider kinds
    Kinds,
}
