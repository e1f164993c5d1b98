//! The audio gate: decide, frame by frame, whether captured audio may pass.
//!
//! ```text
//! ┌─────────┐    ┌────────────┐    ┌───────────┐    ┌────────┐
//! │ Capture │───▶│   Frame    │───▶│  Speaker  │───▶│ Gated  │
//! │ (frames)│    │ Classifier │    │ Verifier  │    │ Output │
//! └─────────┘    └────────────┘    │  (async)  │    └────────┘
//!      │                           └───────────┘
//!      ▼
//! ┌───────────┐    ┌──────────────┐    ┌──────────┐
//! │ Wake-word │───▶│ Ambient mode │───▶│ Session  │
//! │ detector  │    │  controller  │    │ recorder │
//! └───────────┘    └──────────────┘    └──────────┘
//! ```
//!
//! Speech only passes while the latest verification accepts the enrolled
//! speaker; everything else leaves as silence. A wake phrase opens a timed
//! ambient window on the earbuds and records the session to disk.

pub mod ambient;
pub mod classifier;
pub mod device;
pub mod embed;
pub mod engine;
pub mod pcm;
pub mod recognizer;
pub mod rolling;
pub mod session;
pub mod verifier;
pub mod wake;

pub use ambient::{AmbientModeController, AmbientState};
pub use classifier::{EnergyVad, FrameClassifier, MockVad, VadCapability};
pub use device::{CommandDeviceControl, DeviceControl, MockDevice, SystemCommandExecutor};
pub use embed::SpectralEncoder;
pub use engine::{EngineConfig, StreamEngine};
pub use recognizer::PipeRecognizer;
pub use rolling::RollingBuffer;
pub use session::SessionRecorder;
pub use verifier::{
    MockEncoder, SpeakerProfile, SpeakerVerifier, Verification, VerifierHandle, VoiceEncoder,
};
pub use wake::{
    MockRecognizer, NullRecognizer, StreamingRecognizer, WakeConfig, WakeMatch, WakeWordDetector,
};
