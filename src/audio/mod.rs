// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Audio subsystem: turn analysis, PCM utilities, resampling.

pub mod turn;
pub mod utils;

#[cfg(feature = "neural-turn")]
pub mod resampler;
