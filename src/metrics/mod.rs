// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! Metrics data models for turn analysis.
//!
//! A turn analyzer may attach telemetry to its authoritative judgment so an
//! observability sink can track endpointing latency and confidence. When a
//! strategy produces no telemetry the value is simply absent.

use serde::{Deserialize, Serialize};

/// Telemetry attached to an end-of-turn judgment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnMetricsData {
    /// Name of the analyzer generating the metrics.
    pub processor: String,
    /// Optional model name associated with the judgment.
    pub model: Option<String>,
    /// Whether the turn was judged complete.
    pub is_complete: bool,
    /// Confidence probability of the completion judgment.
    pub probability: f64,
    /// Wall-clock inference time in milliseconds.
    pub inference_time_ms: f64,
    /// End-to-end time in milliseconds, measured from the speech-to-silence
    /// transition to the completion judgment. Zero when the transition was
    /// not observed (e.g. analysis ran mid-speech).
    pub e2e_processing_time_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_metrics_serialization() {
        let metrics = TurnMetricsData {
            processor: "NeuralTurnAnalyzer".to_string(),
            model: Some("endpoint_v1".to_string()),
            is_complete: true,
            probability: 0.93,
            inference_time_ms: 41.5,
            e2e_processing_time_ms: 212.0,
        };
        let json = serde_json::to_string(&metrics).expect("serialization failed");
        assert!(json.contains("\"processor\":\"NeuralTurnAnalyzer\""));
        assert!(json.contains("\"model\":\"endpoint_v1\""));

        let deserialized: TurnMetricsData =
            serde_json::from_str(&json).expect("deserialization failed");
        assert!(deserialized.is_complete);
        assert!((deserialized.probability - 0.93).abs() < f64::EPSILON);
        assert!((deserialized.inference_time_ms - 41.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_turn_metrics_no_model() {
        let metrics = TurnMetricsData {
            processor: "SilenceTurnAnalyzer".to_string(),
            model: None,
            is_complete: false,
            probability: 0.0,
            inference_time_ms: 0.0,
            e2e_processing_time_ms: 0.0,
        };
        let json = serde_json::to_string(&metrics).expect("serialization failed");
        assert!(json.contains("\"model\":null"));
    }
}
