//! Default configuration constants for echogate.
//!
//! This module provides shared constants used across different configuration
//! types to ensure consistency and eliminate duplication.

/// Default audio sample rate in Hz.
///
/// 16kHz is required by the WebRTC-style VAD granularity and is the standard
/// rate for speaker-embedding and speech-recognition models.
pub const SAMPLE_RATE: u32 = 16000;

/// Default frame duration in milliseconds.
///
/// The VAD accepts 10/20/30ms frames; 30ms is the largest supported frame and
/// gives the lowest per-frame overhead.
pub const FRAME_DURATION_MS: u32 = 30;

/// Mean-absolute-amplitude floor below which a frame is treated as silence
/// without invoking the VAD.
///
/// This is a cost-saving pre-filter, not a correctness gate. Tuned empirically
/// for typical microphone input levels.
pub const ENERGY_FLOOR: f32 = 0.005;

/// Minimum byte length of 16-bit PCM the VAD will accept.
///
/// Shorter input is "insufficient data" and classified as not-speech rather
/// than an error.
pub const MIN_VAD_BYTES: usize = 320;

/// Default speaker-similarity threshold (0.0 to 1.0).
///
/// Dot product of unit-normalized embeddings must exceed this for a window to
/// count as the enrolled speaker. Higher is stricter.
pub const VERIFY_THRESHOLD: f32 = 0.5;

/// Minimum window duration in seconds for a reliable speaker embedding.
///
/// Windows shorter than this fail verification fast instead of producing a
/// meaningless similarity score.
pub const MIN_VERIFY_SECS: f32 = 0.3;

/// Utterance (verification) window capacity in seconds.
///
/// The verifier always sees the last N seconds of audio, not a single frame.
pub const UTTERANCE_WINDOW_SECS: u32 = 2;

/// Frames between verification requests.
///
/// Embedding inference is far too expensive to run per frame; at 30ms frames
/// this evaluates roughly every 300ms, and only when no request is in flight.
pub const VERIFY_INTERVAL_FRAMES: u32 = 10;

/// Wake-word (recognition) window capacity in seconds.
pub const WAKE_WINDOW_SECS: u32 = 5;

/// New audio accumulated between recognizer submissions, in seconds.
///
/// The streaming recognizer is fed the rolling window every time this much
/// new audio has arrived since the last submission.
pub const WAKE_CHUNK_SECS: u32 = 2;

/// Default wake phrases, scanned in order against finalized recognizer text.
pub const WAKE_PHRASES: &[&str] = &["thayaa", "excuse me", "hey echo", "wake up"];

/// Default ambient-mode duration in seconds before reverting to
/// noise cancellation.
pub const AMBIENT_DURATION_SECS: u64 = 5;

/// Default directory for session recordings.
pub const RECORDINGS_DIR: &str = "recordings";

/// Default enrollment voice sample path.
pub const VOICE_SAMPLE_PATH: &str = "audio_samples/my_voice.wav";

/// Derived frame size in samples for a given rate and duration.
pub const fn frame_size(sample_rate: u32, frame_duration_ms: u32) -> usize {
    (sample_rate * frame_duration_ms / 1000) as usize
}
