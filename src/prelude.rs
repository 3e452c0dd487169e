// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Common re-exports for convenient use of turnsense.
//!
//! ```
//! use turnsense::prelude::*;
//! ```

pub use crate::audio::turn::silence::{SilenceTurnAnalyzer, SilenceTurnParams};
pub use crate::audio::turn::{
    EndOfTurnState, RateConfig, SampleRate, TurnAnalyzer, TurnAnalyzerError,
};
pub use crate::metrics::TurnMetricsData;

#[cfg(feature = "neural-turn")]
pub use crate::audio::resampler::{ModelRateResampler, MODEL_SAMPLE_RATE};
#[cfg(feature = "neural-turn")]
pub use crate::audio::turn::neural::{
    EndpointModel, EndpointModelError, NeuralTurnAnalyzer, NeuralTurnParams,
};
