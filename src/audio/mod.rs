//! Audio I/O: duplex capture/playback and WAV loading for enrollment.

pub mod capture;
pub mod wav;

pub use capture::{DuplexAudio, list_devices, suppress_audio_warnings};
pub use wav::load_waveform;
