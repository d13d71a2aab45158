// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "docpipe")]
#[command(author, version, about = "Document image cleanup pipelines")]
pub struct Cli {
    /// Data directory holding config.json and results
    #[arg(short, long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Process an image inline and write the result
    Process {
        /// Image to process
        input: PathBuf,

        /// Steps to run, e.g. "dewarp|orientation|bleach"
        #[arg(short, long)]
        action: String,

        /// Output file (defaults to <input stem>-clean.jpg)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Run an image as a background job and follow it to completion
    Submit {
        /// Image to process
        input: PathBuf,

        /// Steps to run
        #[arg(short, long)]
        action: String,
    },

    /// Show the status of a job
    Status {
        id: String,
    },

    /// Save a finished result
    Fetch {
        id: String,

        /// Output file (defaults to <id>.<ext>)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Create a share link for a result
    Share {
        id: String,

        /// Host the link should point at when no public base URL is set
        #[arg(long)]
        host: Option<String>,
    },

    /// Save the result behind a share token
    Open {
        token: String,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Bundle results into a ZIP (every result when no ids are given)
    Bundle {
        ids: Vec<String>,

        #[arg(short, long, default_value = "results.zip")]
        output: PathBuf,
    },

    /// Delete results and revoke their share links
    Clear {
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// List the recognised step names
    Steps,
}
