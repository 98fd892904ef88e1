// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image module: page normalization ahead of recognition.

pub mod normalize;

pub use normalize::{ChannelOrder, ImageNormalizer, NormalizedImage};
