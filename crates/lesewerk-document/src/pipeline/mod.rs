// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Processing pipeline: page processor, per-document fan-out, and batches.

pub mod batch;
pub mod document;
pub mod page;

pub use batch::BatchOrchestrator;
pub use document::DocumentPipeline;
pub use page::PageProcessor;
