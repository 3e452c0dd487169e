// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Audio resampling to the endpointing model's input rate.
//!
//! The neural turn strategy runs its model at a fixed 16 kHz; streams
//! negotiated at any other rate go through [`ModelRateResampler`], a wrapper
//! around rubato's `SincFixedIn<f32>` that buffers residual input between
//! calls so arbitrary chunk sizes can be fed incrementally.

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

/// Input sample rate expected by the endpointing model.
pub const MODEL_SAMPLE_RATE: u32 = 16_000;

/// Incremental resampler from an arbitrary input rate to
/// [`MODEL_SAMPLE_RATE`].
pub struct ModelRateResampler {
    inner: SincFixedIn<f32>,
    /// Residual input samples not yet forming a full resampler chunk.
    pending: Vec<f32>,
    input_sample_rate: u32,
}

impl ModelRateResampler {
    /// Create a resampler from `input_rate` Hz to [`MODEL_SAMPLE_RATE`] Hz.
    ///
    /// # Panics
    /// Panics if `input_rate == 0` or `input_rate == MODEL_SAMPLE_RATE`;
    /// check [`needs_resampling`](Self::needs_resampling) first.
    pub fn new(input_rate: u32) -> Self {
        assert_ne!(input_rate, 0, "input sample rate must be > 0");
        assert_ne!(
            input_rate, MODEL_SAMPLE_RATE,
            "no resampling needed for {MODEL_SAMPLE_RATE} Hz input"
        );

        let ratio = MODEL_SAMPLE_RATE as f64 / input_rate as f64;
        let params = SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        };
        // ~10 ms chunks at the input rate.
        let chunk_size = input_rate as usize / 100;
        let inner = SincFixedIn::new(ratio, 2.0, params, chunk_size, 1)
            .expect("failed to create resampler");

        Self {
            inner,
            pending: Vec::new(),
            input_sample_rate: input_rate,
        }
    }

    /// Whether audio at `input_rate` needs resampling before inference.
    pub fn needs_resampling(input_rate: u32) -> bool {
        input_rate != MODEL_SAMPLE_RATE && input_rate > 0
    }

    /// Resample f32 samples from the input rate to [`MODEL_SAMPLE_RATE`].
    ///
    /// Residual samples that do not fill a full resampler chunk are kept for
    /// the next call, so output length varies per call but converges on the
    /// rate ratio over a stream.
    pub fn resample(&mut self, samples: &[f32]) -> Vec<f32> {
        self.pending.extend_from_slice(samples);

        let input_frames = self.inner.input_frames_next();
        let mut output = Vec::new();

        while self.pending.len() >= input_frames {
            let chunk: Vec<f32> = self.pending.drain(..input_frames).collect();
            match self.inner.process(&[&chunk], None) {
                Ok(result) => {
                    if let Some(channel) = result.first() {
                        output.extend_from_slice(channel);
                    }
                }
                Err(e) => {
                    tracing::warn!("ModelRateResampler: resample error: {e}");
                    break;
                }
            }
        }

        output
    }

    /// Drop any buffered residual input.
    pub fn reset(&mut self) {
        self.pending.clear();
    }

    /// The input sample rate this resampler was built for.
    pub fn input_rate(&self) -> u32 {
        self.input_sample_rate
    }
}
