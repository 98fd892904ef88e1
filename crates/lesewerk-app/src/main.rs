// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Lesewerk — scanned document to text
//
// Entry point. Initialises logging, builds the backend services, runs one
// command and prints its result to stdout as JSON.

mod cli;
mod services;

use std::future::Future;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use lesewerk_core::error::{LesewerkError, Result};
use lesewerk_core::types::{BatchEntry, DocumentFailure};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};
use services::app_services::{AppServices, DocumentSource};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Lesewerk starting");

    match run(cli).await {
        Ok((output, code)) => {
            println!("{output}");
            code
        }
        Err(err) => {
            tracing::error!(
                error = %err,
                fatal = err.is_process_fatal(),
                "Command failed"
            );
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so stdout carries nothing but the JSON result.
fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Run one command. A failed document is still printed, as a JSON failure
/// entry, but exits non-zero.
async fn run(cli: Cli) -> Result<(String, ExitCode)> {
    let services = AppServices::init(&cli.overrides)?;
    let timeout = cli.timeout_secs.map(Duration::from_secs);
    let mut code = ExitCode::SUCCESS;

    let value: Value = match cli.command {
        Command::Ocr { source, filename } => {
            let source = DocumentSource::parse(&source);
            let reported = source.filename(filename.clone());
            let outcome = with_timeout(timeout, services.extract_entry(&source, filename)).await;
            let entry = match outcome {
                Ok(entry) => entry?,
                Err(err) => BatchEntry::Failed(DocumentFailure {
                    filename: reported,
                    error: err.to_string(),
                }),
            };
            if entry.is_failed() {
                code = ExitCode::FAILURE;
            }
            serde_json::to_value(entry)?
        }
        Command::Batch { files } => {
            let result = with_timeout(timeout, services.extract_batch(&files)).await??;
            serde_json::to_value(result)?
        }
        Command::Status { init } => {
            let report = with_timeout(timeout, services.health(init)).await?;
            serde_json::to_value(report)?
        }
    };

    Ok((serde_json::to_string_pretty(&value)?, code))
}

/// Bound `future` by `timeout`, if one is set. The work itself is not
/// cancelled; its result is simply no longer awaited.
async fn with_timeout<F: Future>(timeout: Option<Duration>, future: F) -> Result<F::Output> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, future)
            .await
            .map_err(|_| LesewerkError::Timeout(limit.as_secs())),
        None => Ok(future.await),
    }
}
