//! Per-frame orchestration of the audio gate.
//!
//! For every captured frame the engine feeds the session recorder and
//! the wake-phrase detector, classifies the frame, and gates the output:
//! speech passes only while the latest speaker verification says the
//! enrolled voice is talking. Verification runs on its own worker so the
//! audio path never blocks on an embedding.

use crate::defaults;
use crate::gate::ambient::AmbientModeController;
use crate::gate::classifier::{FrameClassifier, VadCapability};
use crate::gate::rolling::RollingBuffer;
use crate::gate::session::SessionRecorder;
use crate::gate::verifier::{Verification, VerifierHandle};
use crate::gate::wake::{StreamingRecognizer, WakeWordDetector};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Engine tuning knobs.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Capture sample rate in Hz.
    pub sample_rate: u32,
    /// Speech frames between verification requests.
    pub verify_interval_frames: u32,
    /// Rolling utterance window handed to the verifier, in seconds.
    pub utterance_window_secs: u32,
    /// False when no voice profile is enrolled; speech passes unverified.
    pub verification_enabled: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
            verify_interval_frames: defaults::VERIFY_INTERVAL_FRAMES,
            utterance_window_secs: defaults::UTTERANCE_WINDOW_SECS,
            verification_enabled: true,
        }
    }
}

/// The streaming gate: classify, verify, detect wake phrases, record.
pub struct StreamEngine<V: VadCapability, R: StreamingRecognizer> {
    config: EngineConfig,
    classifier: FrameClassifier<V>,
    verifier: VerifierHandle,
    wake: WakeWordDetector<R>,
    ambient: AmbientModeController,
    recorder: Arc<Mutex<SessionRecorder>>,
    utterance: RollingBuffer<f32>,
    speech_frames: u64,
    last_verification: Option<Verification>,
}

impl<V: VadCapability, R: StreamingRecognizer> StreamEngine<V, R> {
    pub fn new(
        config: EngineConfig,
        classifier: FrameClassifier<V>,
        verifier: VerifierHandle,
        wake: WakeWordDetector<R>,
        ambient: AmbientModeController,
        recorder: Arc<Mutex<SessionRecorder>>,
    ) -> Self {
        let utterance =
            RollingBuffer::with_duration(config.utterance_window_secs, config.sample_rate);
        Self {
            config,
            classifier,
            verifier,
            wake,
            ambient,
            recorder,
            utterance,
            speech_frames: 0,
            last_verification: None,
        }
    }

    /// Processes one captured frame and returns the gated output frame.
    ///
    /// Order matters: the recorder sees every frame of an open session
    /// (including gated audio), the wake detector runs independently of
    /// the gate, then classification decides whether the frame can pass
    /// at all.
    pub fn process_frame(&mut self, frame: &[f32]) -> Vec<f32> {
        if let Ok(mut recorder) = self.recorder.lock() {
            recorder.append(frame);
        }

        if let Some(m) = self.wake.push_frame(frame) {
            self.ambient.on_wake_phrase(&m.phrase, &m.text);
        }

        // The utterance window keeps every frame so the verifier sees
        // recent context, not just isolated speech frames.
        self.utterance.extend(frame);

        if !self.classifier.classify(frame) {
            return silence(frame.len());
        }

        self.speech_frames += 1;

        if self.config.verification_enabled {
            if self.speech_frames % u64::from(self.config.verify_interval_frames) == 0
                && !self.verifier.is_busy()
            {
                self.verifier.request(self.utterance.snapshot());
            }
            if let Some(outcome) = self.verifier.latest() {
                self.last_verification = Some(outcome);
            }
        }

        if self.speech_passes() {
            frame.to_vec()
        } else {
            silence(frame.len())
        }
    }

    /// Whether a speech frame may pass right now.
    ///
    /// With verification enabled, speech is held back until the first
    /// result arrives, then the latest result sticks until the next one.
    fn speech_passes(&self) -> bool {
        if !self.config.verification_enabled {
            return true;
        }
        self.last_verification
            .as_ref()
            .is_some_and(|v| v.is_match)
    }

    /// True while an ambient window is open.
    pub fn is_ambient_active(&self) -> bool {
        self.ambient.is_active()
    }

    /// Most recent verification outcome, if any has arrived.
    pub fn last_verification(&self) -> Option<&Verification> {
        self.last_verification.as_ref()
    }

    /// Stops the verifier worker and closes any open ambient window.
    ///
    /// Returns the session recording path when one was flushed.
    pub fn shutdown(&mut self) -> Option<PathBuf> {
        self.verifier.stop();
        self.ambient.shutdown()
    }
}

fn silence(len: usize) -> Vec<f32> {
    vec![0.0; len]
}
