//! Built-in spectral voice encoder.
//!
//! Computes a fixed-length embedding from band energies of the waveform:
//! the signal is cut into short windows, each window's power at a set of
//! log-spaced frequencies is measured with the Goertzel algorithm, and the
//! log-compressed band energies are averaged and unit-normalized. Crude
//! next to a neural speaker model, but deterministic, dependency-free, and
//! good enough to separate voices with different spectral balance.

use crate::error::{EchogateError, Result};
use crate::gate::verifier::VoiceEncoder;

/// Analysis window length in milliseconds.
const WINDOW_MS: u32 = 100;

/// Log-spaced band center frequencies in Hz. Covers the voiced-speech
/// range up to well below the 16kHz Nyquist limit.
const BAND_HZ: [f32; 16] = [
    100.0, 150.0, 220.0, 320.0, 450.0, 620.0, 850.0, 1150.0, 1500.0, 1900.0, 2350.0, 2850.0,
    3400.0, 4000.0, 4700.0, 5500.0,
];

/// Filterbank-energy voice encoder.
#[derive(Debug, Clone)]
pub struct SpectralEncoder {
    sample_rate: u32,
}

impl SpectralEncoder {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }
}

impl VoiceEncoder for SpectralEncoder {
    fn embed(&self, waveform: &[f32]) -> Result<Vec<f32>> {
        if waveform.is_empty() {
            return Err(EchogateError::Embedding {
                message: "empty waveform".to_string(),
            });
        }

        let window_len = (self.sample_rate * WINDOW_MS / 1000) as usize;
        let mut sums = [0.0f64; BAND_HZ.len()];
        let mut windows = 0u32;

        for window in waveform.chunks(window_len) {
            for (i, &freq) in BAND_HZ.iter().enumerate() {
                let power = goertzel_power(window, freq, self.sample_rate as f32);
                sums[i] += f64::from((1.0 + power).ln());
            }
            windows += 1;
        }

        let mut embedding: Vec<f32> = sums
            .iter()
            .map(|&s| (s / f64::from(windows)) as f32)
            .collect();

        let norm = embedding.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm <= f32::EPSILON {
            return Err(EchogateError::Embedding {
                message: "waveform has no spectral energy".to_string(),
            });
        }
        for v in &mut embedding {
            *v /= norm;
        }

        Ok(embedding)
    }
}

/// Normalized signal power at one frequency (Goertzel algorithm).
fn goertzel_power(window: &[f32], freq: f32, sample_rate: f32) -> f32 {
    let omega = 2.0 * std::f32::consts::PI * freq / sample_rate;
    let coeff = 2.0 * omega.cos();

    let mut s1 = 0.0f32;
    let mut s2 = 0.0f32;
    for &x in window {
        let s0 = x + coeff * s1 - s2;
        s2 = s1;
        s1 = s0;
    }

    (s1 * s1 + s2 * s2 - coeff * s1 * s2) / window.len() as f32
}
