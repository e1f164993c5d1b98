//! WAV loading for voice enrollment.
//!
//! Reads the enrolled voice sample from disk and normalizes it to the
//! capture format: f32 mono at the configured rate. Arbitrary source
//! rates and channel counts are mixed down and resampled.

use crate::error::{EchogateError, Result};
use std::io::Read;
use std::path::Path;

/// Loads a WAV file as normalized f32 mono samples at `target_rate`.
pub fn load_waveform(path: &Path, target_rate: u32) -> Result<Vec<f32>> {
    if !path.exists() {
        return Err(EchogateError::EnrollmentNotFound {
            path: path.display().to_string(),
        });
    }
    let file = std::fs::File::open(path)?;
    from_reader(Box::new(std::io::BufReader::new(file)), target_rate)
}

/// Loads WAV data from any reader (for testing/flexibility).
pub fn from_reader(reader: Box<dyn Read + Send>, target_rate: u32) -> Result<Vec<f32>> {
    let mut wav_reader =
        hound::WavReader::new(reader).map_err(|e| EchogateError::EnrollmentInvalid {
            message: format!("Failed to parse WAV file: {}", e),
        })?;

    let spec = wav_reader.spec();
    let source_rate = spec.sample_rate;
    let source_channels = spec.channels as usize;

    let raw_samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let scale = 1.0 / f32::from(i16::MAX);
            wav_reader
                .samples::<i16>()
                .map(|s| s.map(|v| f32::from(v) * scale))
                .collect::<std::result::Result<Vec<_>, _>>()
        }
        hound::SampleFormat::Float => wav_reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>(),
    }
    .map_err(|e| EchogateError::EnrollmentInvalid {
        message: format!("Failed to read WAV samples: {}", e),
    })?;

    if source_channels == 0 {
        return Err(EchogateError::EnrollmentInvalid {
            message: "WAV file reports zero channels".to_string(),
        });
    }

    // Mix to mono by averaging channels
    let mono: Vec<f32> = if source_channels == 1 {
        raw_samples
    } else {
        raw_samples
            .chunks_exact(source_channels)
            .map(|frame| frame.iter().sum::<f32>() / source_channels as f32)
            .collect()
    };

    if source_rate == target_rate {
        Ok(mono)
    } else {
        Ok(resample(&mono, source_rate, target_rate))
    }
}

/// Simple linear interpolation resampling.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = source_pos.floor() as usize;
            let fraction = source_pos - source_idx as f64;

            if source_idx + 1 >= samples.len() {
                samples[source_idx]
            } else {
                let left = f64::from(samples[source_idx]);
                let right = f64::from(samples[source_idx + 1]);
                (left + (right - left) * fraction) as f32
            }
        })
        .collect()
}
