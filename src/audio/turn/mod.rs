// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! End-of-turn analysis contract.
//!
//! A [`TurnAnalyzer`] decides, from a live stream of audio chunks already
//! tagged speech/non-speech by an upstream VAD, whether the current speaker
//! has finished their conversational turn. The decision surface is split in
//! two: [`TurnAnalyzer::append_audio`] is the synchronous hot path called
//! once per chunk, and [`TurnAnalyzer::analyze_end_of_turn`] is the
//! suspending, authoritative judgment (e.g. model inference) invoked after
//! assessed silence. The two are independent signals: a fast-path
//! [`EndOfTurnState::Complete`] does not bind a later deeper judgment.
//!
//! Concrete strategies implement the trait as distinct types selected at
//! pipeline construction time:
//!
//! - [`silence::SilenceTurnAnalyzer`]: fixed-silence-duration heuristic.
//! - `neural::NeuralTurnAnalyzer` (feature `neural-turn`): ONNX
//!   endpointing model.

use std::fmt;

use async_trait::async_trait;

use crate::metrics::TurnMetricsData;

pub mod silence;

#[cfg(feature = "neural-turn")]
pub mod neural;

/// Result of an end-of-turn assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndOfTurnState {
    /// The speaker has finished their turn and stopped speaking.
    Complete,
    /// The speaker is still speaking or may continue speaking.
    Incomplete,
}

impl EndOfTurnState {
    /// Whether this state marks the turn as finished.
    pub fn is_complete(&self) -> bool {
        matches!(self, EndOfTurnState::Complete)
    }
}

/// Errors surfaced by [`TurnAnalyzer::analyze_end_of_turn`].
///
/// The fast path ([`TurnAnalyzer::append_audio`]) and
/// [`TurnAnalyzer::clear`] are infallible; only the deeper judgment can
/// fail, and when it does the failure propagates instead of being coerced
/// into a state. Callers must treat an error as "indeterminate", not as
/// [`EndOfTurnState::Incomplete`].
#[derive(Debug, thiserror::Error)]
pub enum TurnAnalyzerError {
    /// The strategy's underlying judgment mechanism failed (e.g. model
    /// inference errored).
    #[error("turn judgment failed: {0}")]
    Judgment(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// The analysis task ended before producing a result (worker panic or
    /// runtime shutdown).
    #[error("analysis task aborted: {0}")]
    Aborted(String),
}

/// Sample-rate configuration: fixed at construction or negotiated later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateConfig {
    /// Rate pinned at construction. Every negotiation resolves to this
    /// value regardless of what rate the audio source offers; feeding audio
    /// at a different rate is a configuration error on the caller's side.
    Fixed(u32),
    /// Rate adopted from the negotiation call.
    Negotiated,
}

/// Resolved sample-rate state shared by analyzer implementations.
///
/// Starts unresolved (`sample_rate() == 0`). [`SampleRate::negotiate`]
/// resolves the effective rate by the [`RateConfig`] rule; repeating the
/// call with the same proposal is idempotent, and the effective rate never
/// changes without an explicit renegotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleRate {
    config: RateConfig,
    effective: u32,
}

impl SampleRate {
    /// Create from an optional fixed rate.
    pub fn new(fixed: Option<u32>) -> Self {
        let config = match fixed {
            Some(rate) => RateConfig::Fixed(rate),
            None => RateConfig::Negotiated,
        };
        Self {
            config,
            effective: 0,
        }
    }

    /// Resolve the effective rate from a proposed rate.
    ///
    /// A fixed configuration always wins over `proposed`; otherwise the
    /// proposed rate is adopted. No audio processing is triggered here.
    pub fn negotiate(&mut self, proposed: u32) {
        self.effective = match self.config {
            RateConfig::Fixed(rate) => rate,
            RateConfig::Negotiated => proposed,
        };
    }

    /// The resolved rate, `0` before the first negotiation.
    pub fn get(&self) -> u32 {
        self.effective
    }

    /// Whether a negotiation call has resolved the rate yet.
    pub fn is_negotiated(&self) -> bool {
        self.effective != 0
    }

    /// The construction-time configuration.
    pub fn config(&self) -> RateConfig {
        self.config
    }
}

/// A stateful end-of-turn analyzer, one instance per audio stream.
///
/// # Call sequencing
///
/// The host pipeline negotiates the sample rate once the input format is
/// known, then feeds `(buffer, is_speech)` chunks in capture order through
/// [`append_audio`](Self::append_audio). After a span of assessed silence
/// (or periodically) it awaits
/// [`analyze_end_of_turn`](Self::analyze_end_of_turn) for the authoritative
/// judgment, and calls [`clear`](Self::clear) at turn boundaries.
///
/// # Serialization
///
/// All operations take `&mut self` or `&self`; a second
/// `analyze_end_of_turn` cannot start while one is pending on the same
/// instance unless the caller wraps the analyzer in its own lock. Keeping
/// at most one in-flight analysis per instance is the caller's
/// responsibility; the exclusive receiver makes the single-owner case hold
/// by construction.
#[async_trait]
pub trait TurnAnalyzer: Send + fmt::Debug {
    /// The resolved sample rate in Hz, `0` before negotiation.
    fn sample_rate(&self) -> u32;

    /// Negotiate the sample rate.
    ///
    /// If a fixed rate was supplied at construction it wins over
    /// `sample_rate`; otherwise the proposed rate is adopted. Legal to call
    /// repeatedly; each call re-resolves by the same rule. Whether a
    /// mid-stream rate change discards accumulated audio is
    /// strategy-defined.
    fn set_sample_rate(&mut self, sample_rate: u32);

    /// Whether the analyzer currently considers the speaker mid-utterance.
    ///
    /// Side-effect-free. `false` before any ingestion and immediately after
    /// [`clear`](Self::clear); only [`append_audio`](Self::append_audio)
    /// and [`clear`](Self::clear) can flip it.
    fn speech_triggered(&self) -> bool;

    /// Strategy-specific configuration snapshot for observability.
    ///
    /// The shape varies per strategy; the only guarantee is that it is
    /// retrievable at any time.
    fn params(&self) -> serde_json::Value;

    /// Ingest one audio chunk with its VAD tag and return an immediate
    /// best-effort assessment.
    ///
    /// `buffer` is PCM16 LE mono at the negotiated rate. This is the hot
    /// path, called once per incoming chunk: cheap local bookkeeping only,
    /// no blocking, no I/O. Calling before negotiation is caller misuse;
    /// strategies log a warning and return
    /// [`EndOfTurnState::Incomplete`] without accumulating.
    fn append_audio(&mut self, buffer: &[u8], is_speech: bool) -> EndOfTurnState;

    /// Run the authoritative, possibly expensive end-of-turn judgment.
    ///
    /// May suspend (model inference runs off the async executor). Returns
    /// the final state plus optional telemetry; `None` means the strategy
    /// produced no telemetry, not a placeholder. Judgment failures
    /// propagate as [`TurnAnalyzerError`] and must never be silently
    /// mapped to a state. Dropping the returned future mid-flight leaves
    /// the analyzer in a sane state: continued ingestion or a
    /// [`clear`](Self::clear) behaves normally afterwards.
    async fn analyze_end_of_turn(
        &mut self,
    ) -> Result<(EndOfTurnState, Option<TurnMetricsData>), TurnAnalyzerError>;

    /// Reset all accumulation (buffers, timers, speech trigger) to the
    /// post-construction condition.
    ///
    /// A turn-boundary reset, not a re-initialization: the resolved sample
    /// rate and fixed configuration survive. Callable at any point,
    /// including mid-ingestion, and always succeeds.
    fn clear(&mut self);
}
