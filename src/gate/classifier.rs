//! Per-frame speech/silence classification.
//!
//! Wraps an external VAD capability behind a cheap energy pre-filter and the
//! VAD's granularity rules. Stateless and safe to call from the audio path.

use crate::defaults;
use crate::error::{EchogateError, Result};
use crate::gate::pcm;

/// Trait for the external voice-activity-detection capability.
///
/// This trait allows swapping implementations (real VAD vs mock).
/// Implementations require frame lengths corresponding to 10/20/30ms at the
/// given sample rate; the most aggressive classifier tier is assumed.
pub trait VadCapability: Send + Sync {
    /// Classify a frame of 16-bit little-endian PCM as speech or not.
    fn is_speech(&self, pcm16: &[u8], sample_rate: u32) -> Result<bool>;
}

/// Mock VAD for testing.
#[derive(Debug, Clone)]
pub struct MockVad {
    response: bool,
    should_fail: bool,
    calls: std::sync::Arc<std::sync::atomic::AtomicUsize>,
}

impl MockVad {
    /// Creates a mock that classifies everything as not-speech.
    pub fn new() -> Self {
        Self {
            response: false,
            should_fail: false,
            calls: std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0)),
        }
    }

    /// Configure the mock's classification result.
    pub fn with_response(mut self, response: bool) -> Self {
        self.response = response;
        self
    }

    /// Configure the mock to fail on every call.
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Number of times `is_speech` was invoked.
    pub fn call_count(&self) -> usize {
        self.calls.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl Default for MockVad {
    fn default() -> Self {
        Self::new()
    }
}

impl VadCapability for MockVad {
    fn is_speech(&self, _pcm16: &[u8], _sample_rate: u32) -> Result<bool> {
        self.calls
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        if self.should_fail {
            Err(EchogateError::Vad {
                message: "mock vad failure".to_string(),
            })
        } else {
            Ok(self.response)
        }
    }
}

/// Built-in VAD: RMS energy plus zero-crossing rate.
///
/// Voiced speech sits in a characteristic band of crossing rates; steady
/// tones and DC hum fall below it, broadband hiss above it. Not a match
/// for a trained model, but it needs no external runtime.
#[derive(Debug, Clone)]
pub struct EnergyVad {
    rms_threshold: f32,
}

/// Zero-crossing-rate band (crossings per sample) accepted as speech.
const SPEECH_ZCR_RANGE: std::ops::RangeInclusive<f32> = 0.005..=0.5;

impl EnergyVad {
    pub fn new() -> Self {
        Self {
            rms_threshold: 0.01,
        }
    }

    /// Overrides the RMS threshold (normalized amplitude).
    pub fn with_rms_threshold(mut self, threshold: f32) -> Self {
        self.rms_threshold = threshold;
        self
    }
}

impl Default for EnergyVad {
    fn default() -> Self {
        Self::new()
    }
}

impl VadCapability for EnergyVad {
    fn is_speech(&self, pcm16: &[u8], _sample_rate: u32) -> Result<bool> {
        if pcm16.len() % 2 != 0 {
            return Err(EchogateError::Vad {
                message: format!("odd PCM byte length: {}", pcm16.len()),
            });
        }
        let samples: Vec<f32> = pcm16
            .chunks_exact(2)
            .map(|b| f32::from(i16::from_le_bytes([b[0], b[1]])) / f32::from(i16::MAX))
            .collect();
        if samples.len() < 2 {
            return Ok(false);
        }

        let rms = (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt();
        if rms < self.rms_threshold {
            return Ok(false);
        }

        let crossings = samples
            .windows(2)
            .filter(|pair| (pair[0] >= 0.0) != (pair[1] >= 0.0))
            .count();
        let zcr = crossings as f32 / (samples.len() - 1) as f32;

        Ok(SPEECH_ZCR_RANGE.contains(&zcr))
    }
}

/// Stateless per-frame speech/silence decision.
///
/// Enforces the external VAD's granularity: frames longer than 30ms are
/// trimmed to their trailing 30ms, and anything shorter than 320 bytes of
/// 16-bit PCM is insufficient data and classified as not-speech. A mean
/// absolute amplitude below the energy floor short-circuits without invoking
/// the VAD at all.
pub struct FrameClassifier<V: VadCapability> {
    vad: V,
    sample_rate: u32,
    energy_floor: f32,
}

impl<V: VadCapability> FrameClassifier<V> {
    /// Creates a classifier for the given VAD and sample rate.
    pub fn new(vad: V, sample_rate: u32) -> Self {
        Self {
            vad,
            sample_rate,
            energy_floor: defaults::ENERGY_FLOOR,
        }
    }

    /// Overrides the energy pre-filter floor.
    pub fn with_energy_floor(mut self, floor: f32) -> Self {
        self.energy_floor = floor;
        self
    }

    /// Classifies a frame of normalized f32 samples as speech or not.
    ///
    /// VAD failures are treated as "not speech": unclassified noise must
    /// never pass through the gate (fail-closed).
    pub fn classify(&self, frame: &[f32]) -> bool {
        if mean_abs_amplitude(frame) < self.energy_floor {
            return false;
        }

        // The VAD accepts at most 30ms; use the trailing window.
        let samples_30ms = (self.sample_rate as usize * 30) / 1000;
        let trimmed = if frame.len() > samples_30ms {
            &frame[frame.len() - samples_30ms..]
        } else {
            frame
        };

        let pcm16 = pcm::f32_to_pcm16_bytes(trimmed);
        if pcm16.len() < defaults::MIN_VAD_BYTES {
            return false;
        }

        self.vad.is_speech(&pcm16, self.sample_rate).unwrap_or(false)
    }
}

/// Mean absolute amplitude of normalized samples.
pub fn mean_abs_amplitude(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(|s| s.abs()).sum::<f32>() / samples.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loud_frame(len: usize) -> Vec<f32> {
        vec![0.1f32; len]
    }

    #[test]
    fn test_mean_abs_amplitude_empty_is_zero() {
        assert_eq!(mean_abs_amplitude(&[]), 0.0);
    }

    #[test]
    fn test_mean_abs_amplitude_mixed_signs() {
        let amplitude = mean_abs_amplitude(&[0.5, -0.5, 0.5, -0.5]);
        assert!((amplitude - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_quiet_frame_short_circuits_without_vad() {
        let vad = MockVad::new().with_response(true);
        let classifier = FrameClassifier::new(vad.clone(), 16000);

        // Well below the 0.005 floor: must be silence even though the VAD
        // would say speech.
        let quiet = vec![0.001f32; 480];
        assert!(!classifier.classify(&quiet));
        assert_eq!(vad.call_count(), 0);
    }

    #[test]
    fn test_short_frame_returns_false_without_vad() {
        let vad = MockVad::new().with_response(true);
        let classifier = FrameClassifier::new(vad.clone(), 16000);

        // 100 samples -> 200 bytes < 320: insufficient data.
        let short = loud_frame(100);
        assert!(!classifier.classify(&short));
        assert_eq!(vad.call_count(), 0);
    }

    #[test]
    fn test_full_frame_consults_vad() {
        let vad = MockVad::new().with_response(true);
        let classifier = FrameClassifier::new(vad.clone(), 16000);

        assert!(classifier.classify(&loud_frame(480)));
        assert_eq!(vad.call_count(), 1);
    }

    #[test]
    fn test_vad_negative_is_respected() {
        let vad = MockVad::new().with_response(false);
        let classifier = FrameClassifier::new(vad, 16000);

        assert!(!classifier.classify(&loud_frame(480)));
    }

    #[test]
    fn test_long_frame_trimmed_to_trailing_30ms() {
        struct LengthAssertingVad;
        impl VadCapability for LengthAssertingVad {
            fn is_speech(&self, pcm16: &[u8], sample_rate: u32) -> Result<bool> {
                let samples_30ms = (sample_rate as usize * 30) / 1000;
                assert_eq!(pcm16.len(), samples_30ms * 2);
                Ok(true)
            }
        }

        let classifier = FrameClassifier::new(LengthAssertingVad, 16000);
        // 2 seconds of audio: only the trailing 480 samples reach the VAD.
        assert!(classifier.classify(&loud_frame(32000)));
    }

    #[test]
    fn test_vad_failure_is_treated_as_silence() {
        let vad = MockVad::new().with_failure();
        let classifier = FrameClassifier::new(vad, 16000);

        // Fail-closed: a broken VAD must not pass noise through.
        assert!(!classifier.classify(&loud_frame(480)));
    }

    #[test]
    fn test_energy_vad_accepts_speech_like_signal() {
        let vad = EnergyVad::new();
        // 300Hz-ish oscillation at healthy amplitude.
        let samples: Vec<f32> = (0..480)
            .map(|i| (2.0 * std::f32::consts::PI * 300.0 * i as f32 / 16000.0).sin() * 0.3)
            .collect();
        let pcm16 = pcm::f32_to_pcm16_bytes(&samples);
        assert!(vad.is_speech(&pcm16, 16000).unwrap());
    }

    #[test]
    fn test_energy_vad_rejects_silence() {
        let vad = EnergyVad::new();
        let pcm16 = pcm::f32_to_pcm16_bytes(&vec![0.0f32; 480]);
        assert!(!vad.is_speech(&pcm16, 16000).unwrap());
    }

    #[test]
    fn test_energy_vad_rejects_dc_offset() {
        let vad = EnergyVad::new();
        // Loud but never crosses zero: hum, not speech.
        let pcm16 = pcm::f32_to_pcm16_bytes(&vec![0.3f32; 480]);
        assert!(!vad.is_speech(&pcm16, 16000).unwrap());
    }

    #[test]
    fn test_energy_vad_rejects_odd_byte_length() {
        let vad = EnergyVad::new();
        assert!(vad.is_speech(&[0u8; 321], 16000).is_err());
    }

    #[test]
    fn test_custom_energy_floor() {
        let vad = MockVad::new().with_response(true);
        let classifier = FrameClassifier::new(vad, 16000).with_energy_floor(0.2);

        // 0.1 amplitude is below the raised floor.
        assert!(!classifier.classify(&loud_frame(480)));
    }
}
