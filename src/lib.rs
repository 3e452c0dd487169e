// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Turnsense - end-of-turn analysis for real-time voice conversation pipelines.
//!
//! Turnsense sits between a voice-activity detector and a dialogue manager:
//! upstream delivers audio chunks already tagged speech/non-speech, a
//! [`TurnAnalyzer`](crate::audio::turn::TurnAnalyzer) ingests each chunk on
//! the hot path, and the dialogue manager consumes
//! [`EndOfTurnState`](crate::audio::turn::EndOfTurnState) values to decide
//! whether the floor passes to the assistant.
//!
//! Two reference strategies are provided: a fixed-silence-duration analyzer
//! and, behind the `neural-turn` feature, an ONNX endpointing-model analyzer.

pub mod audio;
pub mod metrics;
pub mod prelude;
