// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service layer: wires the lesewerk backend crates together for the CLI.
//
// `AppServices` is the composition root: it loads configuration, builds the
// engine handle, rasterizer, pipeline and batch orchestrator once, and exposes
// async methods that return data ready to be printed as JSON.

pub mod app_services;
pub mod config_dir;
