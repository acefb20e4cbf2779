#![forbid(unsafe_code)]
//! ffindex operator tool.
//!
//! Commands:
//! - `info <index>`: store metadata and identifier counts
//! - `get <index> <mode> <id>...`: vectors resolved for each id under a mode
//! - `coalesce <source> <target> <delta>`: compress a store into a new one
//!
//! New stores take their settings from `FFINDEX_*` environment variables.

use std::io::{self, Write};

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod env_utils;

use crate::commands::Command;
use crate::config::ToolConfig;

fn main() -> Result<()> {
    init_tracing();

    let command = Command::parse(std::env::args().skip(1))?;
    let config = ToolConfig::from_env().context("invalid configuration")?;
    tracing::debug!(?command, ?config, "running command");

    let stdout = io::stdout();
    let mut out = stdout.lock();
    command.run(&config, &mut out)?;
    out.flush().context("failed to flush output")?;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if let Err(error) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init()
    {
        eprintln!("failed to initialize tracing subscriber: {error}");
    }
}
