//! Wake-phrase detection over a streaming recognizer.
//!
//! A rolling recognition window collects samples independently of the
//! verification path; every time enough new audio has accumulated, the window
//! is pushed through the external streaming recognizer and any finalized text
//! is scanned for the configured wake phrases.

use crate::defaults;
use crate::error::{EchogateError, Result};
use crate::gate::pcm;
use crate::gate::rolling::RollingBuffer;
use serde::Deserialize;

/// Finalized output of the streaming recognizer.
///
/// Derives `Deserialize` so engines that emit JSON (`{"text": "..."}`) plug
/// in without an adapter layer.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct RecognizerResult {
    /// Recognized text; may be empty when the decoder finalized silence.
    #[serde(default)]
    pub text: String,
}

impl RecognizerResult {
    /// Parses a JSON result string of the form `{"text": "..."}`.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| EchogateError::Recognition {
            message: format!("invalid recognizer result: {}", e),
        })
    }
}

/// Trait for the external streaming speech recognizer.
///
/// Implementations are stateful decoders: partial audio and hypotheses
/// persist across `accept_chunk` calls and are discarded only by an explicit
/// `reset`, never implicitly.
pub trait StreamingRecognizer: Send {
    /// Feed a chunk of 16-bit little-endian PCM. Returns true when the
    /// decoder has finalized a result.
    fn accept_chunk(&mut self, pcm16: &[u8]) -> Result<bool>;

    /// The finalized result for the most recent utterance.
    fn result(&mut self) -> Result<RecognizerResult>;

    /// Discard all accumulated decoder state.
    fn reset(&mut self);
}

/// Mock recognizer for testing.
///
/// Plays back a script of finalized texts: each processed chunk consumes the
/// next entry, `None` meaning "no final result yet".
pub struct MockRecognizer {
    script: Vec<Option<String>>,
    position: usize,
    pending: Option<String>,
    should_fail: bool,
    resets: usize,
    chunks_accepted: usize,
}

impl MockRecognizer {
    /// Creates a mock that never finalizes.
    pub fn new() -> Self {
        Self {
            script: Vec::new(),
            position: 0,
            pending: None,
            should_fail: false,
            resets: 0,
            chunks_accepted: 0,
        }
    }

    /// Appends a finalized text to the playback script.
    pub fn with_final(mut self, text: &str) -> Self {
        self.script.push(Some(text.to_string()));
        self
    }

    /// Appends a "no result yet" step to the playback script.
    pub fn with_silence(mut self) -> Self {
        self.script.push(None);
        self
    }

    /// Configure the mock to fail on every call.
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Number of chunks the mock has accepted.
    pub fn chunks_accepted(&self) -> usize {
        self.chunks_accepted
    }

    /// Number of times reset was called.
    pub fn resets(&self) -> usize {
        self.resets
    }
}

impl Default for MockRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamingRecognizer for MockRecognizer {
    fn accept_chunk(&mut self, _pcm16: &[u8]) -> Result<bool> {
        if self.should_fail {
            return Err(EchogateError::Recognition {
                message: "mock recognizer failure".to_string(),
            });
        }
        self.chunks_accepted += 1;
        let step = self.script.get(self.position).cloned().flatten();
        if self.position < self.script.len() {
            self.position += 1;
        }
        match step {
            Some(text) => {
                self.pending = Some(text);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn result(&mut self) -> Result<RecognizerResult> {
        Ok(RecognizerResult {
            text: self.pending.take().unwrap_or_default(),
        })
    }

    fn reset(&mut self) {
        self.resets += 1;
        self.pending = None;
    }
}

/// Recognizer that never produces text; stands in when wake detection
/// is disabled or unconfigured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRecognizer;

impl StreamingRecognizer for NullRecognizer {
    fn accept_chunk(&mut self, _pcm16: &[u8]) -> Result<bool> {
        Ok(false)
    }

    fn result(&mut self) -> Result<RecognizerResult> {
        Ok(RecognizerResult {
            text: String::new(),
        })
    }

    fn reset(&mut self) {}
}

impl StreamingRecognizer for Box<dyn StreamingRecognizer> {
    fn accept_chunk(&mut self, pcm16: &[u8]) -> Result<bool> {
        (**self).accept_chunk(pcm16)
    }

    fn result(&mut self) -> Result<RecognizerResult> {
        (**self).result()
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}

/// A wake phrase found in finalized recognizer text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WakeMatch {
    /// The configured phrase that matched.
    pub phrase: String,
    /// The full finalized text it was found in.
    pub text: String,
}

/// Configuration for wake-phrase detection.
#[derive(Debug, Clone)]
pub struct WakeConfig {
    /// Rolling recognition window capacity in seconds.
    pub window_secs: u32,
    /// New audio accumulated between recognizer submissions, in seconds.
    pub chunk_secs: u32,
    /// Phrases scanned in order; first match wins.
    pub phrases: Vec<String>,
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self {
            window_secs: defaults::WAKE_WINDOW_SECS,
            chunk_secs: defaults::WAKE_CHUNK_SECS,
            phrases: defaults::WAKE_PHRASES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Rolling recognition window plus wake-phrase scanning.
///
/// Owns the recognizer session exclusively; decoder state persists across
/// chunks and is reset only through [`WakeWordDetector::reset`].
pub struct WakeWordDetector<R: StreamingRecognizer> {
    recognizer: R,
    buffer: RollingBuffer<f32>,
    phrases: Vec<String>,
    chunk_samples: usize,
    accumulated: usize,
}

impl<R: StreamingRecognizer> WakeWordDetector<R> {
    /// Creates a detector over the given recognizer session.
    pub fn new(recognizer: R, config: WakeConfig, sample_rate: u32) -> Self {
        Self {
            recognizer,
            buffer: RollingBuffer::with_duration(config.window_secs, sample_rate),
            phrases: config.phrases,
            chunk_samples: (config.chunk_secs * sample_rate) as usize,
            accumulated: 0,
        }
    }

    /// Appends a frame and, when a full chunk has accumulated, runs the
    /// recognizer over the current window.
    ///
    /// Returns the first configured phrase contained in finalized text,
    /// if any. Recognizer errors are swallowed into "no match": wake
    /// detection is best-effort and must not take down the stream.
    pub fn push_frame(&mut self, frame: &[f32]) -> Option<WakeMatch> {
        self.buffer.extend(frame);
        self.accumulated += frame.len();

        if self.accumulated < self.chunk_samples {
            return None;
        }
        self.accumulated = 0;

        let pcm16 = pcm::f32_to_pcm16_bytes(&self.buffer.snapshot());
        match self.recognizer.accept_chunk(&pcm16) {
            Ok(true) => {}
            Ok(false) | Err(_) => return None,
        }

        let text = match self.recognizer.result() {
            Ok(result) => result.text.to_lowercase(),
            Err(_) => return None,
        };
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        self.scan(text)
    }

    /// Scans text for the configured phrases in configuration order.
    fn scan(&self, text: &str) -> Option<WakeMatch> {
        self.phrases
            .iter()
            .find(|phrase| text.contains(&phrase.to_lowercase()))
            .map(|phrase| WakeMatch {
                phrase: phrase.clone(),
                text: text.to_string(),
            })
    }

    /// Explicitly resets the recognizer session.
    pub fn reset(&mut self) {
        self.recognizer.reset();
        self.buffer.clear();
        self.accumulated = 0;
    }

    /// Access to the underlying recognizer (tests and diagnostics).
    pub fn recognizer(&self) -> &R {
        &self.recognizer
    }
}
