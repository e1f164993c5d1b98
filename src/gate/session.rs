//! Session recording: accumulate raw audio while active, flush to WAV on stop.

use crate::error::{EchogateError, Result};
use crate::gate::pcm;
use hound::{WavSpec, WavWriter};
use std::path::{Path, PathBuf};

/// Accumulates raw audio while a session is active and persists it as a
/// timestamped 16-bit PCM WAV on stop.
pub struct SessionRecorder {
    running: bool,
    samples: Vec<f32>,
    sample_rate: u32,
    dir: PathBuf,
}

impl SessionRecorder {
    /// Creates a recorder writing into `dir` at the given sample rate.
    pub fn new(dir: impl Into<PathBuf>, sample_rate: u32) -> Self {
        Self {
            running: false,
            samples: Vec::new(),
            sample_rate,
            dir: dir.into(),
        }
    }

    /// Starts a recording session.
    ///
    /// Idempotent: a second start while running is a no-op and must not
    /// reset the buffer (re-entrant ambient triggers rely on this).
    pub fn start(&mut self) {
        if self.running {
            return;
        }
        self.running = true;
    }

    /// Appends a frame. Ignored unless a session is running.
    pub fn append(&mut self, frame: &[f32]) {
        if self.running {
            self.samples.extend_from_slice(frame);
        }
    }

    /// True while a session is active.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Number of samples accumulated so far.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True when no samples have been accumulated.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Stops the session, persisting accumulated audio.
    ///
    /// Returns the written path, or `None` when nothing was recorded.
    /// The buffer is cleared and the recorder flips to not-running either
    /// way.
    pub fn stop(&mut self) -> Result<Option<PathBuf>> {
        if !self.running {
            return Ok(None);
        }
        self.running = false;

        if self.samples.is_empty() {
            return Ok(None);
        }

        std::fs::create_dir_all(&self.dir)?;
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let path = self.dir.join(format!("echogate_session_{}.wav", timestamp));

        write_wav(&path, &self.samples, self.sample_rate)?;
        self.samples.clear();

        Ok(Some(path))
    }
}

/// Writes mono 16-bit PCM WAV from normalized f32 samples.
fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec).map_err(|e| EchogateError::Recording {
        message: format!("Failed to create {}: {}", path.display(), e),
    })?;

    for sample in pcm::f32_to_i16(samples) {
        writer
            .write_sample(sample)
            .map_err(|e| EchogateError::Recording {
                message: format!("Failed to write sample: {}", e),
            })?;
    }

    writer.finalize().map_err(|e| EchogateError::Recording {
        message: format!("Failed to finalize {}: {}", path.display(), e),
    })?;

    Ok(())
}
