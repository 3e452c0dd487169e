// Copyright (c) 2024-2026, Daily
// SPDX-License-Identifier: BSD-2-Clause

//! PCM16 audio helpers shared by the turn-analysis strategies.
//!
//! Audio chunks arrive as raw PCM16 little-endian mono bytes at the
//! negotiated sample rate; these helpers convert between bytes, sample
//! counts, durations and f32 samples.

/// Number of whole PCM16 samples in a byte buffer.
///
/// A trailing odd byte does not form a sample and is not counted.
pub fn num_samples(buffer: &[u8]) -> usize {
    buffer.len() / 2
}

/// Duration in seconds of a PCM16 mono byte buffer at `sample_rate` Hz.
///
/// Returns `0.0` for an unresolved (zero) sample rate.
pub fn chunk_duration_secs(buffer: &[u8], sample_rate: u32) -> f64 {
    if sample_rate == 0 {
        return 0.0;
    }
    num_samples(buffer) as f64 / sample_rate as f64
}

/// Convert PCM16 LE bytes to f32 samples normalized to [-1.0, 1.0].
pub fn pcm16_to_f32(buffer: &[u8]) -> Vec<f32> {
    let count = num_samples(buffer);
    let mut samples = Vec::with_capacity(count);
    for i in 0..count {
        let offset = i * 2;
        let sample = i16::from_le_bytes([buffer[offset], buffer[offset + 1]]);
        samples.push(sample as f32 / 32768.0);
    }
    samples
}
