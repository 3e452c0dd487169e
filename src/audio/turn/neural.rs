// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Neural endpointing end-of-turn strategy.
//!
//! Buffers recent audio at the model's 16 kHz input rate and, when asked for
//! the authoritative judgment, runs an ONNX turn-completion model over the
//! window. The fast path stays cheap: PCM conversion, optional resampling
//! and a silence timer; inference happens only inside
//! [`TurnAnalyzer::analyze_end_of_turn`], off the async executor.
//!
//! Before speech triggers, a short rolling pre-roll is retained so the model
//! sees the utterance onset. On a `Complete` judgment the accumulated turn
//! audio is discarded and the analyzer is immediately ready for the next
//! turn.

use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use async_trait::async_trait;
use ndarray::Array2;
use ort::session::Session;
use ort::value::Tensor;
use serde::{Deserialize, Serialize};

use crate::audio::resampler::{ModelRateResampler, MODEL_SAMPLE_RATE};
use crate::audio::turn::{EndOfTurnState, SampleRate, TurnAnalyzer, TurnAnalyzerError};
use crate::audio::utils::{chunk_duration_secs, pcm16_to_f32};
use crate::metrics::TurnMetricsData;

/// Default model filename.
pub const ENDPOINT_MODEL_FILENAME: &str = "endpoint_v1.onnx";

#[derive(Debug, thiserror::Error)]
pub enum EndpointModelError {
    #[error("ONNX Runtime error: {0}")]
    Ort(#[from] ort::Error),
    #[error("Model file not found: {0}")]
    ModelNotFound(PathBuf),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("model worker poisoned by an earlier panic")]
    WorkerPoisoned,
}

impl From<EndpointModelError> for TurnAnalyzerError {
    fn from(e: EndpointModelError) -> Self {
        TurnAnalyzerError::Judgment(Box::new(e))
    }
}

/// ONNX turn-completion model.
///
/// Takes a `[1, N]` f32 waveform at [`MODEL_SAMPLE_RATE`] and emits a
/// completion logit.
pub struct EndpointModel {
    session: Session,
    name: String,
}

impl EndpointModel {
    /// Load the model from a file path.
    pub fn from_path(model_path: &Path) -> Result<Self, EndpointModelError> {
        if !model_path.exists() {
            return Err(EndpointModelError::ModelNotFound(model_path.to_path_buf()));
        }

        let session = Session::builder()?
            .with_intra_threads(1)?
            .commit_from_file(model_path)?;

        let name = model_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "endpoint".to_string());

        Ok(Self { session, name })
    }

    /// Try to load from the default cache directory,
    /// `~/.cache/turnsense/models/endpoint_v1.onnx`.
    pub fn from_cache() -> Result<Self, EndpointModelError> {
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        let path = PathBuf::from(home)
            .join(".cache")
            .join("turnsense")
            .join("models")
            .join(ENDPOINT_MODEL_FILENAME);
        Self::from_path(&path)
    }

    /// The model name, derived from the file stem.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run turn-completion inference on an audio window.
    ///
    /// # Arguments
    /// * `audio` - f32 samples at [`MODEL_SAMPLE_RATE`].
    ///
    /// # Returns
    /// Turn completion probability in [0.0, 1.0].
    pub fn predict(&mut self, audio: &[f32]) -> Result<f32, EndpointModelError> {
        if audio.is_empty() {
            return Err(EndpointModelError::InvalidInput(
                "empty audio window".to_string(),
            ));
        }

        let input = Array2::from_shape_vec((1, audio.len()), audio.to_vec())
            .map_err(|e| EndpointModelError::InvalidInput(format!("Shape error: {}", e)))?;

        let input_value = Tensor::from_array(input).map_err(EndpointModelError::Ort)?;

        let outputs = self.session.run(ort::inputs!["waveform" => input_value])?;

        let output = outputs[0].try_extract_array::<f32>()?;
        let logit = output.iter().next().copied().unwrap_or(0.0);

        // The model outputs a logit; map it to a probability.
        Ok(1.0 / (1.0 + (-logit).exp()))
    }
}

/// Parameters for neural turn analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeuralTurnParams {
    /// Seconds of contiguous non-speech after triggered speech before the
    /// fast path reports a likely turn end.
    pub stop_secs: f64,
    /// Seconds of rolling pre-roll retained before speech triggers, so the
    /// model sees the utterance onset.
    pub pre_speech_secs: f64,
    /// Cap on the buffered model window, in seconds.
    pub max_duration_secs: f64,
    /// Completion probability at or above which the turn is complete.
    pub completion_threshold: f32,
}

impl Default for NeuralTurnParams {
    fn default() -> Self {
        Self {
            stop_secs: 0.8,
            pre_speech_secs: 0.4,
            max_duration_secs: 8.0,
            completion_threshold: 0.5,
        }
    }
}

/// Endpointing-model end-of-turn analyzer.
pub struct NeuralTurnAnalyzer {
    params: NeuralTurnParams,
    rate: SampleRate,
    /// Shared with the blocking inference task. A dropped in-flight
    /// analysis releases the lock when the detached task finishes, so the
    /// model is never lost to cancellation.
    model: Arc<Mutex<EndpointModel>>,
    model_name: String,
    resampler: Option<ModelRateResampler>,
    /// Buffered samples at [`MODEL_SAMPLE_RATE`].
    audio: VecDeque<f32>,
    speech_triggered: bool,
    /// Contiguous non-speech seconds ingested since the last speech chunk.
    trailing_silence_secs: f64,
    /// When the current speech-to-silence transition was observed.
    silence_started: Option<Instant>,
}

impl NeuralTurnAnalyzer {
    /// Create an analyzer that adopts the rate offered at negotiation time.
    pub fn new(model: EndpointModel, params: NeuralTurnParams) -> Self {
        let model_name = model.name().to_string();
        Self {
            params,
            rate: SampleRate::new(None),
            model: Arc::new(Mutex::new(model)),
            model_name,
            resampler: None,
            audio: VecDeque::new(),
            speech_triggered: false,
            trailing_silence_secs: 0.0,
            silence_started: None,
        }
    }

    /// Create an analyzer pinned to `sample_rate` Hz.
    pub fn with_fixed_rate(
        model: EndpointModel,
        params: NeuralTurnParams,
        sample_rate: u32,
    ) -> Self {
        let mut analyzer = Self::new(model, params);
        analyzer.rate = SampleRate::new(Some(sample_rate));
        analyzer
    }

    fn max_buffer_samples(&self) -> usize {
        (self.params.max_duration_secs * MODEL_SAMPLE_RATE as f64) as usize
    }

    fn pre_speech_samples(&self) -> usize {
        (self.params.pre_speech_secs * MODEL_SAMPLE_RATE as f64) as usize
    }

    /// Append samples, evicting from the front past `cap`.
    fn push_samples(&mut self, samples: &[f32], cap: usize) {
        for &s in samples {
            if self.audio.len() >= cap {
                self.audio.pop_front();
            }
            self.audio.push_back(s);
        }
    }

    /// Rebuild or drop the resampler to match the resolved rate.
    fn configure_resampler(&mut self) {
        let rate = self.rate.get();
        if ModelRateResampler::needs_resampling(rate) {
            let current = self.resampler.as_ref().map(ModelRateResampler::input_rate);
            if current != Some(rate) {
                tracing::info!(
                    "NeuralTurnAnalyzer: resampler {} Hz -> {} Hz",
                    rate,
                    MODEL_SAMPLE_RATE
                );
                self.resampler = Some(ModelRateResampler::new(rate));
            }
        } else {
            self.resampler = None;
        }
    }

    fn reset_turn(&mut self) {
        self.audio.clear();
        self.speech_triggered = false;
        self.trailing_silence_secs = 0.0;
        self.silence_started = None;
        if let Some(resampler) = &mut self.resampler {
            resampler.reset();
        }
    }
}

impl fmt::Debug for NeuralTurnAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NeuralTurnAnalyzer")
            .field("model", &self.model_name)
            .field("sample_rate", &self.rate.get())
            .field("speech_triggered", &self.speech_triggered)
            .field("buffered_samples", &self.audio.len())
            .field("trailing_silence_secs", &self.trailing_silence_secs)
            .finish()
    }
}

#[async_trait]
impl TurnAnalyzer for NeuralTurnAnalyzer {
    fn sample_rate(&self) -> u32 {
        self.rate.get()
    }

    fn set_sample_rate(&mut self, sample_rate: u32) {
        let previous = self.rate.get();
        self.rate.negotiate(sample_rate);
        // Buffered audio was resampled from the old rate; it no longer
        // represents the stream.
        if previous != 0 && self.rate.get() != previous {
            tracing::debug!(
                previous,
                effective = self.rate.get(),
                "NeuralTurnAnalyzer: rate changed mid-stream, dropping buffered audio"
            );
            self.reset_turn();
        }
        self.configure_resampler();
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
                "NeuralTurnAnalyzer: audio appended before sample-rate negotiation, ignoring chunk"
            );
            return EndOfTurnState::Incomplete;
        }

        let samples = pcm16_to_f32(buffer);
        let samples = match &mut self.resampler {
            Some(resampler) => resampler.resample(&samples),
            None => samples,
        };

        if is_speech {
            if !self.speech_triggered {
                tracing::debug!("NeuralTurnAnalyzer: speech triggered");
            }
            self.speech_triggered = true;
            self.trailing_silence_secs = 0.0;
            self.silence_started = None;
            let cap = self.max_buffer_samples();
            self.push_samples(&samples, cap);
        } else if self.speech_triggered {
            // Silence inside an open turn is context for the model.
            if self.silence_started.is_none() {
                self.silence_started = Some(Instant::now());
            }
            self.trailing_silence_secs += chunk_duration_secs(buffer, self.rate.get());
            let cap = self.max_buffer_samples();
            self.push_samples(&samples, cap);
        } else {
            let cap = self.pre_speech_samples();
            self.push_samples(&samples, cap);
        }

        // Fast heuristic signal only; the model judgment is independent and
        // does not consume the turn here.
        if self.speech_triggered && self.trailing_silence_secs >= self.params.stop_secs {
            EndOfTurnState::Complete
        } else {
            EndOfTurnState::Incomplete
        }
    }

    async fn analyze_end_of_turn(
        &mut self,
    ) -> Result<(EndOfTurnState, Option<TurnMetricsData>), TurnAnalyzerError> {
        if !self.speech_triggered || self.audio.is_empty() {
            return Ok((EndOfTurnState::Incomplete, None));
        }

        let audio: Vec<f32> = self.audio.iter().copied().collect();
        let model = Arc::clone(&self.model);
        let inference_started = Instant::now();

        let result = tokio::task::spawn_blocking(move || {
            let mut guard = model.lock().map_err(|_| EndpointModelError::WorkerPoisoned)?;
            guard.predict(&audio)
        })
        .await;

        let probability = match result {
            Ok(Ok(probability)) => probability,
            Ok(Err(e)) => return Err(e.into()),
            Err(e) => return Err(TurnAnalyzerError::Aborted(e.to_string())),
        };

        let inference_time_ms = inference_started.elapsed().as_secs_f64() * 1000.0;
        let state = if probability >= self.params.completion_threshold {
            EndOfTurnState::Complete
        } else {
            EndOfTurnState::Incomplete
        };

        tracing::debug!(
            probability,
            inference_time_ms,
            complete = state.is_complete(),
            "NeuralTurnAnalyzer: judgment"
        );

        let e2e_processing_time_ms = self
            .silence_started
            .map(|t| t.elapsed().as_secs_f64() * 1000.0)
            .unwrap_or(0.0);

        let metrics = TurnMetricsData {
            processor: "NeuralTurnAnalyzer".to_string(),
            model: Some(self.model_name.clone()),
            is_complete: state.is_complete(),
            probability: probability as f64,
            inference_time_ms,
            e2e_processing_time_ms,
        };

        if state.is_complete() {
            self.reset_turn();
        }

        Ok((state, Some(metrics)))
    }

    fn clear(&mut self) {
        self.reset_turn();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params() {
        let params = NeuralTurnParams::default();
        assert!((params.stop_secs - 0.8).abs() < f64::EPSILON);
        assert!((params.pre_speech_secs - 0.4).abs() < f64::EPSILON);
        assert!((params.max_duration_secs - 8.0).abs() < f64::EPSILON);
        assert!((params.completion_threshold - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_params_roundtrip() {
        let params = NeuralTurnParams {
            stop_secs: 0.5,
            pre_speech_secs: 0.2,
            max_duration_secs: 4.0,
            completion_threshold: 0.7,
        };
        let json = serde_json::to_string(&params).expect("serialization failed");
        let back: NeuralTurnParams = serde_json::from_str(&json).expect("deserialization failed");
        assert!((back.completion_threshold - 0.7).abs() < f32::EPSILON);
        assert!((back.max_duration_secs - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_model_not_found() {
        let err = EndpointModel::from_path(Path::new("/nonexistent/endpoint_v1.onnx"))
            .expect_err("missing file must not load");
        assert!(matches!(err, EndpointModelError::ModelNotFound(_)));
        assert!(err.to_string().contains("/nonexistent/endpoint_v1.onnx"));
    }

    #[test]
    fn test_judgment_error_conversion() {
        let err: TurnAnalyzerError =
            EndpointModelError::InvalidInput("empty audio window".to_string()).into();
        assert!(matches!(err, TurnAnalyzerError::Judgment(_)));
        assert!(err.to_string().contains("turn judgment failed"));
    }
}
