//! Speaker verification against an enrolled voice profile.
//!
//! Wraps an external speaker-embedding capability. Verification is expensive
//! model inference, so it never runs inline per frame: the engine hands
//! window snapshots to a single-slot background worker and reads the latest
//! outcome without blocking.

use crate::defaults;
use crate::error::{EchogateError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

/// Trait for the external speaker-embedding capability.
///
/// This trait allows swapping implementations (real encoder vs mock).
/// Returned vectors are assumed pre-normalized to unit length, so similarity
/// between two embeddings is their dot product.
pub trait VoiceEncoder: Send + Sync {
    /// Compute a fixed-length embedding for a waveform of normalized f32
    /// mono samples.
    fn embed(&self, waveform: &[f32]) -> Result<Vec<f32>>;
}

/// Mock encoder for testing.
#[derive(Debug, Clone)]
pub struct MockEncoder {
    embedding: Vec<f32>,
    should_fail: bool,
}

impl MockEncoder {
    /// Creates a mock returning a fixed unit vector.
    pub fn new() -> Self {
        Self {
            embedding: vec![1.0, 0.0, 0.0],
            should_fail: false,
        }
    }

    /// Configure the embedding the mock returns.
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = embedding;
        self
    }

    /// Configure the mock to fail on every call.
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }
}

impl Default for MockEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl VoiceEncoder for MockEncoder {
    fn embed(&self, _waveform: &[f32]) -> Result<Vec<f32>> {
        if self.should_fail {
            Err(EchogateError::Embedding {
                message: "mock embedding failure".to_string(),
            })
        } else {
            Ok(self.embedding.clone())
        }
    }
}

/// An enrolled speaker's embedding, immutable after load.
#[derive(Debug, Clone)]
pub struct SpeakerProfile {
    embedding: Vec<f32>,
}

impl SpeakerProfile {
    /// Wraps an embedding vector, normalizing it to unit length.
    pub fn new(embedding: Vec<f32>) -> Self {
        let norm = embedding.iter().map(|v| v * v).sum::<f32>().sqrt();
        let embedding = if norm > 0.0 {
            embedding.iter().map(|v| v / norm).collect()
        } else {
            embedding
        };
        Self { embedding }
    }

    /// Computes a profile from an enrollment waveform.
    pub fn enroll<E: VoiceEncoder>(encoder: &E, waveform: &[f32]) -> Result<Self> {
        Ok(Self::new(encoder.embed(waveform)?))
    }

    /// Dot-product similarity with a candidate embedding.
    pub fn similarity(&self, candidate: &[f32]) -> f32 {
        self.embedding
            .iter()
            .zip(candidate.iter())
            .map(|(a, b)| a * b)
            .sum()
    }
}

/// Outcome of a verification call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verification {
    /// Whether the window is accepted as the enrolled speaker.
    pub is_match: bool,
    /// Similarity score, absent when verification is disabled or degraded.
    pub score: Option<f32>,
}

impl Verification {
    fn pass(score: Option<f32>) -> Self {
        Self {
            is_match: true,
            score,
        }
    }

    fn block(score: Option<f32>) -> Self {
        Self {
            is_match: false,
            score,
        }
    }
}

/// Scores audio windows against an enrolled profile.
pub struct SpeakerVerifier<E: VoiceEncoder> {
    encoder: E,
    profile: Option<SpeakerProfile>,
    threshold: f32,
    sample_rate: u32,
}

impl<E: VoiceEncoder> SpeakerVerifier<E> {
    /// Creates a verifier. `profile = None` means verification is disabled
    /// and every window is authorized.
    pub fn new(encoder: E, profile: Option<SpeakerProfile>, sample_rate: u32) -> Self {
        Self {
            encoder,
            profile,
            threshold: defaults::VERIFY_THRESHOLD,
            sample_rate,
        }
    }

    /// Overrides the similarity threshold.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// True when no profile is loaded.
    pub fn is_disabled(&self) -> bool {
        self.profile.is_none()
    }

    /// Verifies a window of normalized f32 samples.
    ///
    /// Windows shorter than 0.3s fail fast (insufficient data for a reliable
    /// embedding). Encoder failures fail open: a broken model degrades to
    /// "everyone passes" rather than silencing the legitimate user. That
    /// trade-off is deliberate and must survive refactors.
    pub fn verify(&self, window: &[f32]) -> Verification {
        let Some(profile) = &self.profile else {
            return Verification::pass(None);
        };

        let min_samples = (self.sample_rate as f32 * defaults::MIN_VERIFY_SECS) as usize;
        if window.len() < min_samples {
            return Verification::block(None);
        }

        match self.encoder.embed(window) {
            Ok(embedding) => {
                let score = profile.similarity(&embedding);
                Verification {
                    is_match: score > self.threshold,
                    score: Some(score),
                }
            }
            Err(_) => Verification::pass(None),
        }
    }
}

/// Handle to a background verification worker.
///
/// Requests go through a bounded single-slot mailbox: at most one
/// verification is ever in flight, and a busy worker means the request is
/// simply skipped until the next cadence tick. Results apply with one
/// window's latency.
pub struct VerifierHandle {
    request_tx: Option<crossbeam_channel::Sender<Vec<f32>>>,
    latest: Arc<Mutex<Option<Verification>>>,
    in_flight: Arc<AtomicBool>,
    worker: Option<thread::JoinHandle<()>>,
}

impl<E: VoiceEncoder + 'static> SpeakerVerifier<E> {
    /// Moves the verifier onto a worker thread and returns a handle.
    pub fn spawn(self) -> VerifierHandle {
        let (request_tx, request_rx) = crossbeam_channel::bounded::<Vec<f32>>(1);
        let latest = Arc::new(Mutex::new(None));
        let in_flight = Arc::new(AtomicBool::new(false));

        let worker_latest = latest.clone();
        let worker_in_flight = in_flight.clone();
        let worker = thread::spawn(move || {
            while let Ok(window) = request_rx.recv() {
                let outcome = self.verify(&window);
                if let Ok(mut slot) = worker_latest.lock() {
                    *slot = Some(outcome);
                }
                worker_in_flight.store(false, Ordering::SeqCst);
            }
        });

        VerifierHandle {
            request_tx: Some(request_tx),
            latest,
            in_flight,
            worker: Some(worker),
        }
    }
}

impl VerifierHandle {
    /// Submits a window snapshot unless a verification is already in flight.
    ///
    /// Returns true if the request was accepted. Never blocks.
    pub fn request(&self, window: Vec<f32>) -> bool {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return false;
        }
        match self
            .request_tx
            .as_ref()
            .map(|tx| tx.try_send(window))
        {
            Some(Ok(())) => true,
            _ => {
                self.in_flight.store(false, Ordering::SeqCst);
                false
            }
        }
    }

    /// Latest completed verification outcome, if any.
    pub fn latest(&self) -> Option<Verification> {
        self.latest.lock().ok().and_then(|slot| *slot)
    }

    /// True while a submitted request has not completed.
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Stops the worker and waits for it to finish.
    pub fn stop(&mut self) {
        self.request_tx.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for VerifierHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
