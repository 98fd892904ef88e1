// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line interface.
//
// ```text
// lesewerk [global options] ocr <FILE|URL> [--filename NAME]
// lesewerk [global options] batch <FILE>...
// lesewerk [global options] status [--init]
// ```
//
// Results go to stdout as JSON; logs go to stderr.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use lesewerk_core::PipelineConfig;

#[derive(Debug, Clone, Parser)]
#[command(name = "lesewerk")]
#[command(about = "Extract text from scanned PDFs and images")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub overrides: ConfigOverrides,

    /// Give up on the whole command after this many seconds.
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout_secs: Option<u64>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Extract text from one document.
    Ocr {
        /// Local path, or an http(s) URL to download.
        source: String,

        /// Name reported in the result; also decides image vs. PDF handling.
        #[arg(long)]
        filename: Option<String>,
    },

    /// Extract text from several documents; one failure does not stop the rest.
    Batch {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Print the engine health report.
    Status {
        /// Initialise the recognition engine before reporting.
        #[arg(long)]
        init: bool,
    },
}

/// Pipeline settings that override the config file.
#[derive(Debug, Clone, Default, Args)]
pub struct ConfigOverrides {
    /// JSON config file. Defaults to `$XDG_CONFIG_HOME/lesewerk/config.json` when present.
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Rasterization resolution for PDF pages.
    #[arg(long, global = true)]
    pub dpi: Option<u32>,

    /// Longest page side, in pixels, before downscaling.
    #[arg(long, global = true)]
    pub max_dimension: Option<u32>,

    /// Pages processed at the same time within one document.
    #[arg(long, global = true)]
    pub page_workers: Option<usize>,

    /// Documents processed at the same time within one batch.
    #[arg(long, global = true)]
    pub batch_concurrency: Option<usize>,

    /// Run at most one recognition call at a time.
    #[arg(long, global = true)]
    pub serialize_recognition: bool,

    /// Reject files that are not PDF, JPG or PNG.
    #[arg(long, global = true)]
    pub strict_extensions: bool,
}

impl ConfigOverrides {
    pub fn apply(&self, config: &mut PipelineConfig) {
        if let Some(dpi) = self.dpi {
            config.render_dpi = dpi;
        }
        if let Some(max_dimension) = self.max_dimension {
            config.max_dimension = max_dimension;
        }
        if let Some(page_workers) = self.page_workers {
            config.page_workers = page_workers;
        }
        if let Some(batch_concurrency) = self.batch_concurrency {
            config.batch_concurrency = batch_concurrency;
        }
        if self.serialize_recognition {
            config.serialize_recognition = true;
        }
        if self.strict_extensions {
            config.strict_extensions = true;
        }
    }
}
