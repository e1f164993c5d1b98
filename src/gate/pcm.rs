//! Sample-format conversions at the capability boundary.
//!
//! The engine works in normalized f32 mono; the VAD and recognizer consume
//! 16-bit little-endian PCM bytes.

/// Converts normalized f32 samples to 16-bit PCM, clamping to [-1, 1].
pub fn f32_to_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
        .collect()
}

/// Converts normalized f32 samples to 16-bit little-endian PCM bytes.
pub fn f32_to_pcm16_bytes(samples: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for &s in samples {
        let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Converts 16-bit PCM samples to normalized f32 in [-1, 1].
pub fn i16_to_f32(samples: &[i16]) -> Vec<f32> {
    samples
        .iter()
        .map(|&s| s as f32 / i16::MAX as f32)
        .collect()
}
