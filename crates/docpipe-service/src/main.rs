// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docpipe: command-line front end.
//
// Initialises logging, opens the service in the data directory and runs one
// subcommand.

mod cli;

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use docpipe_core::Result;
use docpipe_service::data_dir;
use docpipe_service::DocumentService;

use cli::{Cli, Commands};

/// Interval between status polls while following a job.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let dir = cli.data_dir.unwrap_or_else(data_dir::data_dir);
    let service = DocumentService::from_data_dir(&dir)?;

    let outcome = run(&service, cli.command).await;
    service.shutdown().await;
    outcome
}

async fn run(service: &DocumentService, command: Commands) -> Result<()> {
    match command {
        Commands::Process {
            input,
            action,
            output,
        } => {
            let image = std::fs::read(&input)?;
            let bytes = service.process(&image, &action)?;
            let output = output.unwrap_or_else(|| default_output(&input));
            write_output(&output, &bytes)
        }
        Commands::Submit { input, action } => {
            let image = std::fs::read(&input)?;
            let submission = service.submit(image, &action);
            println!("{}", serde_json::to_string_pretty(&submission)?);
            follow(service, submission.job_id.as_str()).await
        }
        Commands::Status { id } => {
            println!("{}", serde_json::to_string_pretty(&service.status(&id)?)?);
            Ok(())
        }
        Commands::Fetch { id, output } => {
            let bytes = service.result(&id)?;
            let output = match output {
                Some(path) => path,
                None => PathBuf::from(service.download_name(&id)?),
            };
            write_output(&output, &bytes)
        }
        Commands::Share { id, host } => {
            let link = service.share(&id, host.as_deref())?;
            println!("{}", link.url);
            Ok(())
        }
        Commands::Open { token, output } => {
            let (id, bytes) = service.open_share(&token)?;
            let output = match output {
                Some(path) => path,
                None => PathBuf::from(service.download_name(id.as_str())?),
            };
            write_output(&output, &bytes)
        }
        Commands::Bundle { ids, output } => {
            let archive = if ids.is_empty() {
                service.bundle_all()?
            } else {
                service.bundle(&ids)?
            };
            write_output(&output, &archive)
        }
        Commands::Clear { ids } => {
            let removed = service.clear(&ids)?;
            println!("removed {removed} result(s)");
            Ok(())
        }
        Commands::Steps => {
            for step in service.supported_steps() {
                println!("{step}");
            }
            Ok(())
        }
    }
}

/// Poll a job until it reaches a terminal state, printing each change.
async fn follow(service: &DocumentService, id: &str) -> Result<()> {
    let mut last = None;
    loop {
        let record = service.status(id)?;
        if last != Some(record.status) {
            println!("{}", serde_json::to_string(&record)?);
            last = Some(record.status);
        }
        if record.status.is_terminal() {
            return Ok(());
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

fn default_output(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("result");
    PathBuf::from(format!("{stem}-clean.jpg"))
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes)?;
    tracing::info!(path = %path.display(), bytes = bytes.len(), "written");
    Ok(())
}
