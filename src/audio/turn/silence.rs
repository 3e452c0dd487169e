// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Fixed-silence-duration end-of-turn strategy.
//!
//! Declares the turn complete once a configurable span of contiguous
//! non-speech audio has been ingested after speech triggered. All bookkeeping
//! is a pair of counters, so the fast path and the async judgment agree and
//! the latter never fails and attaches no telemetry.
//!
//! The analyzer does not consume the turn itself: once the silence span is
//! crossed, every assessment reports [`EndOfTurnState::Complete`] until the
//! host resets the turn boundary with [`TurnAnalyzer::clear`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::audio::turn::{EndOfTurnState, SampleRate, TurnAnalyzer, TurnAnalyzerError};
use crate::audio::utils::num_samples;
use crate::metrics::TurnMetricsData;

/// Parameters for silence-based turn analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SilenceTurnParams {
    /// Seconds of contiguous non-speech after triggered speech required to
    /// declare the turn complete.
    pub stop_secs: f64,
}

impl Default for SilenceTurnParams {
    fn default() -> Self {
        Self { stop_secs: 0.8 }
    }
}

/// Silence-timer end-of-turn analyzer.
#[derive(Debug)]
pub struct SilenceTurnAnalyzer {
    params: SilenceTurnParams,
    rate: SampleRate,
    speech_triggered: bool,
    /// Contiguous non-speech samples ingested since the last speech chunk.
    trailing_silence_samples: usize,
}

impl SilenceTurnAnalyzer {
    /// Create an analyzer that adopts the rate offered at negotiation time.
    pub fn new(params: SilenceTurnParams) -> Self {
        Self {
            params,
            rate: SampleRate::new(None),
            speech_triggered: false,
            trailing_silence_samples: 0,
        }
    }

    /// Create an analyzer pinned to `sample_rate` Hz.
    ///
    /// Negotiation will resolve to this rate regardless of the offered one;
    /// supplying audio at a different rate is the caller's configuration
    /// error to detect.
    pub fn with_fixed_rate(params: SilenceTurnParams, sample_rate: u32) -> Self {
        Self {
            params,
            rate: SampleRate::new(Some(sample_rate)),
            speech_triggered: false,
            trailing_silence_samples: 0,
        }
    }

    /// Samples of contiguous silence required to complete the turn at the
    /// resolved rate.
    fn stop_samples(&self) -> usize {
        let samples = (self.params.stop_secs * self.rate.get() as f64).round() as usize;
        samples.max(1)
    }

    fn assess(&self) -> EndOfTurnState {
        if self.speech_triggered && self.trailing_silence_samples >= self.stop_samples() {
            EndOfTurnState::Complete
        } else {
            EndOfTurnState::Incomplete
        }
    }

    fn reset_turn(&mut self) {
        self.speech_triggered = false;
        self.trailing_silence_samples = 0;
    }
}

#[async_trait]
impl TurnAnalyzer for SilenceTurnAnalyzer {
    fn sample_rate(&self) -> u32 {
        self.rate.get()
    }

    fn set_sample_rate(&mut self, sample_rate: u32) {
        let previous = self.rate.get();
        self.rate.negotiate(sample_rate);
        // Sample counts are rate-relative; a mid-stream rate change
        // invalidates the accumulated silence span.
        if previous != 0 && self.rate.get() != previous {
            tracing::debug!(
                previous,
                effective = self.rate.get(),
                "SilenceTurnAnalyzer: rate changed mid-stream, resetting turn state"
            );
            self.reset_turn();
        }
    }

    fn speech_triggered(&self) -> bool {
        self.speech_triggered
    }

    fn params(&self) -> serde_json::Value {
        serde_json::to_value(&self.params).unwrap_or_default()
    }

    fn append_audio(&mut self, buffer: &[u8], is_speech: bool) -> EndOfTurnState {
        if !self.rate.is_negotiated() {
            tracing::warn!(
                "SilenceTurnAnalyzer: audio appended before sample-rate negotiation, ignoring chunk"
            );
            return EndOfTurnState::Incomplete;
        }

        if is_speech {
            if !self.speech_triggered {
                tracing::debug!("SilenceTurnAnalyzer: speech triggered");
            }
            self.speech_triggered = true;
            self.trailing_silence_samples = 0;
        } else if self.speech_triggered {
            self.trailing_silence_samples += num_samples(buffer);
        }

        self.assess()
    }

    async fn analyze_end_of_turn(
        &mut self,
    ) -> Result<(EndOfTurnState, Option<TurnMetricsData>), TurnAnalyzerError> {
        // The counters already hold the full judgment; nothing heavier to
        // run and no telemetry to attach.
        Ok((self.assess(), None))
    }

    fn clear(&mut self) {
        self.reset_turn();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn silence_chunk(samples: usize) -> Vec<u8> {
        vec![0u8; samples * 2]
    }

    fn speech_chunk(samples: usize) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(samples * 2);
        for _ in 0..samples {
            bytes.extend_from_slice(&1000i16.to_le_bytes());
        }
        bytes
    }

    #[test]
    fn test_default_params() {
        let params = SilenceTurnParams::default();
        assert!((params.stop_secs - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn test_negotiation_scenario() {
        // Construct with no fixed rate, negotiate, ingest, clear.
        let mut analyzer = SilenceTurnAnalyzer::new(SilenceTurnParams::default());
        assert_eq!(analyzer.sample_rate(), 0);

        analyzer.set_sample_rate(16000);
        assert_eq!(analyzer.sample_rate(), 16000);

        for _ in 0..3 {
            let state = analyzer.append_audio(&silence_chunk(320), false);
            assert_eq!(state, EndOfTurnState::Incomplete);
            assert!(!analyzer.speech_triggered());
        }

        analyzer.append_audio(&speech_chunk(320), true);
        assert!(analyzer.speech_triggered());

        analyzer.clear();
        assert!(!analyzer.speech_triggered());
        assert_eq!(analyzer.sample_rate(), 16000);
    }

    #[test]
    fn test_fixed_rate_wins_over_negotiated() {
        let mut analyzer =
            SilenceTurnAnalyzer::with_fixed_rate(SilenceTurnParams::default(), 8000);
        analyzer.set_sample_rate(16000);
        assert_eq!(analyzer.sample_rate(), 8000);
        analyzer.set_sample_rate(16000);
        assert_eq!(analyzer.sample_rate(), 8000);
    }

    #[test]
    fn test_silence_never_triggers_before_speech() {
        let mut analyzer = SilenceTurnAnalyzer::new(SilenceTurnParams::default());
        analyzer.set_sample_rate(16000);

        // Minutes of silence must not open or complete a turn.
        for _ in 0..1000 {
            let state = analyzer.append_audio(&silence_chunk(3200), false);
            assert_eq!(state, EndOfTurnState::Incomplete);
        }
        assert!(!analyzer.speech_triggered());
    }

    #[test]
    fn test_completes_after_stop_secs_of_silence() {
        let mut analyzer = SilenceTurnAnalyzer::new(SilenceTurnParams { stop_secs: 0.8 });
        analyzer.set_sample_rate(16000);

        analyzer.append_audio(&speech_chunk(320), true);

        // 0.8 s at 16 kHz = 12800 samples. Feed 200 ms chunks.
        for _ in 0..3 {
            let state = analyzer.append_audio(&silence_chunk(3200), false);
            assert_eq!(state, EndOfTurnState::Incomplete);
        }
        let state = analyzer.append_audio(&silence_chunk(3200), false);
        assert_eq!(state, EndOfTurnState::Complete);

        // Complete persists until the host clears the turn boundary.
        let state = analyzer.append_audio(&silence_chunk(320), false);
        assert_eq!(state, EndOfTurnState::Complete);
        analyzer.clear();
        assert!(!analyzer.speech_triggered());
    }

    #[test]
    fn test_speech_resets_silence_span() {
        let mut analyzer = SilenceTurnAnalyzer::new(SilenceTurnParams { stop_secs: 0.8 });
        analyzer.set_sample_rate(16000);

        analyzer.append_audio(&speech_chunk(320), true);
        for _ in 0..3 {
            analyzer.append_audio(&silence_chunk(3200), false);
        }
        // Speaker resumes just before the threshold; the span starts over.
        analyzer.append_audio(&speech_chunk(320), true);
        for _ in 0..3 {
            let state = analyzer.append_audio(&silence_chunk(3200), false);
            assert_eq!(state, EndOfTurnState::Incomplete);
        }
        let state = analyzer.append_audio(&silence_chunk(3200), false);
        assert_eq!(state, EndOfTurnState::Complete);
    }

    #[test]
    fn test_append_before_negotiation_is_ignored() {
        let mut analyzer = SilenceTurnAnalyzer::new(SilenceTurnParams::default());
        let state = analyzer.append_audio(&speech_chunk(320), true);
        assert_eq!(state, EndOfTurnState::Incomplete);
        assert!(!analyzer.speech_triggered());
    }

    #[test]
    fn test_rate_change_resets_accumulation() {
        let mut analyzer = SilenceTurnAnalyzer::new(SilenceTurnParams { stop_secs: 0.8 });
        analyzer.set_sample_rate(16000);
        analyzer.append_audio(&speech_chunk(320), true);
        analyzer.append_audio(&silence_chunk(3200), false);

        analyzer.set_sample_rate(8000);
        assert_eq!(analyzer.sample_rate(), 8000);
        assert!(!analyzer.speech_triggered());
    }

    #[test]
    fn test_params_snapshot() {
        let analyzer = SilenceTurnAnalyzer::new(SilenceTurnParams { stop_secs: 1.5 });
        let params = analyzer.params();
        assert!((params["stop_secs"].as_f64().unwrap() - 1.5).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_analyze_matches_fast_path() {
        let mut analyzer = SilenceTurnAnalyzer::new(SilenceTurnParams { stop_secs: 0.8 });
        analyzer.set_sample_rate(16000);

        analyzer.append_audio(&speech_chunk(320), true);
        let (state, metrics) = analyzer.analyze_end_of_turn().await.unwrap();
        assert_eq!(state, EndOfTurnState::Incomplete);
        assert!(metrics.is_none());

        for _ in 0..4 {
            analyzer.append_audio(&silence_chunk(3200), false);
        }
        let (state, metrics) = analyzer.analyze_end_of_turn().await.unwrap();
        assert_eq!(state, EndOfTurnState::Complete);
        assert!(metrics.is_none());
    }
}
