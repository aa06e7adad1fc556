// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # afs5log
//!
//! Obtains AFS tokens from the current Kerberos 5 credential cache without
//! creating a new PAG.
//!
//! - `afs5log` - tokens for the cell of `/afs` and of `$HOME`
//! - `afs5log CELL...` - tokens for the named cells
//! - `afs5log -5` - prefer v5 tokens over 524-translated ones

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use afs5log::{run, RunOptions};
use krb5afs_core::infrastructure::cache_file::current_ids;
use krb5afs_core::infrastructure::kdc_command::DEFAULT_KVNO;
use krb5afs_core::infrastructure::{select_backend, CommandKdcClient};

/// Obtain AFS tokens from Kerberos 5 credentials
#[derive(Parser)]
#[command(name = "afs5log")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (repeatable)
    #[arg(short, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Toggle preferring v5 tokens (repeatable)
    #[arg(short = '5', action = clap::ArgAction::Count)]
    toggle_v5: u8,

    /// Credential cache to read
    #[arg(short, long, env = "KRB5CCNAME", value_name = "CACHE")]
    cache: Option<String>,

    /// Program used to request service tickets
    #[arg(long, env = "AFS5LOG_KVNO", default_value = DEFAULT_KVNO, value_name = "PROGRAM")]
    kvno: PathBuf,

    /// Print per-cell results as JSON
    #[arg(long)]
    json: bool,

    /// Cells to obtain tokens for
    cells: Vec<String>,
}

impl Cli {
    /// Each `-5` flips the preference.
    fn prefers_v5(&self) -> bool {
        self.toggle_v5 % 2 == 1
    }
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    if let Err(e) = init_logging(level) {
        eprintln!("{}", format!("{:#}", e).red());
    }

    match execute(cli) {
        Ok(()) => {}
        Err(e) => {
            eprintln!("{}", format!("{:#}", e).red());
            std::process::exit(1);
        }
    }
}

fn execute(cli: Cli) -> Result<()> {
    let (uid, gid) = current_ids();
    let prefer_v5 = cli.prefers_v5();
    let options = RunOptions {
        cache_name: cli.cache,
        cells: cli.cells,
        prefer_v5,
        home: std::env::var_os("HOME").map(PathBuf::from),
        uid,
        gid,
    };

    let backend = select_backend();
    debug!(backend = backend.name(), "Selected token backend");
    let kdc = Arc::new(CommandKdcClient::new(cli.kvno));

    let lines = run(&options, backend, kdc)?;

    if cli.json {
        let json = serde_json::to_string_pretty(&lines).context("Failed to render report")?;
        println!("{}", json);
        return Ok(());
    }

    for line in &lines {
        match (&line.error, line.route) {
            (Some(error), _) => eprintln!("{}: {}", line.cell, error.yellow()),
            (None, Some(route)) => debug!(cell = %line.cell, route, "Token installed"),
            (None, None) => {}
        }
    }
    Ok(())
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}
