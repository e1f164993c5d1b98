//! End-to-end gate scenarios driven through the public API with mock
//! capabilities: wake phrases opening ambient windows, session recording
//! across the window, and the verification gate on the output path.

use echogate::gate::device::DeviceCall;
use echogate::gate::{
    AmbientModeController, EngineConfig, FrameClassifier, MockDevice, MockRecognizer, MockVad,
    SessionRecorder, SpeakerProfile, SpeakerVerifier, StreamEngine, WakeConfig, WakeWordDetector,
};
use echogate::gate::verifier::MockEncoder;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

const SAMPLE_RATE: u32 = 16000;
const FRAME: usize = 480; // 30ms at 16kHz

struct Gate {
    engine: StreamEngine<MockVad, MockRecognizer>,
    device: Arc<MockDevice>,
    recorder: Arc<Mutex<SessionRecorder>>,
    dir: tempfile::TempDir,
}

fn gate(
    vad: MockVad,
    recognizer: MockRecognizer,
    profile: Option<SpeakerProfile>,
    ambient_duration: Duration,
) -> Gate {
    let dir = tempfile::tempdir().unwrap();
    let device = Arc::new(MockDevice::new());
    let recorder = Arc::new(Mutex::new(SessionRecorder::new(dir.path(), SAMPLE_RATE)));

    let config = EngineConfig {
        verification_enabled: profile.is_some(),
        ..EngineConfig::default()
    };
    let classifier = FrameClassifier::new(vad, SAMPLE_RATE);
    let encoder = MockEncoder::new().with_embedding(vec![1.0, 0.0]);
    let verifier = SpeakerVerifier::new(encoder, profile, SAMPLE_RATE).spawn();
    let wake = WakeWordDetector::new(recognizer, WakeConfig::default(), SAMPLE_RATE);
    let ambient = AmbientModeController::new(device.clone(), recorder.clone(), ambient_duration);

    Gate {
        engine: StreamEngine::new(config, classifier, verifier, wake, ambient, recorder.clone()),
        device,
        recorder,
        dir,
    }
}

/// Frames needed to fill one wake-recognition chunk (2s of audio).
fn chunk_frames() -> usize {
    (2 * SAMPLE_RATE as usize).div_ceil(FRAME)
}

fn speech_frame() -> Vec<f32> {
    vec![0.5; FRAME]
}

fn quiet_frame() -> Vec<f32> {
    vec![0.0; FRAME]
}

fn is_silent(frame: &[f32]) -> bool {
    frame.iter().all(|&s| s == 0.0)
}

fn wav_count(dir: &tempfile::TempDir) -> usize {
    std::fs::read_dir(dir.path())
        .map(|entries| entries.filter_map(|e| e.ok()).count())
        .unwrap_or(0)
}

#[test]
fn silence_passes_through_untouched() {
    let mut g = gate(
        MockVad::new().with_response(false),
        MockRecognizer::new(),
        None,
        Duration::from_secs(60),
    );

    // Two seconds of quiet: silent output, no wake, no session.
    for _ in 0..chunk_frames() {
        let out = g.engine.process_frame(&quiet_frame());
        assert_eq!(out.len(), FRAME);
        assert!(is_silent(&out));
    }
    assert!(!g.engine.is_ambient_active());
    assert!(g.device.calls().is_empty());
    assert!(g.recorder.lock().unwrap().is_empty());
    assert_eq!(g.engine.shutdown(), None);
    assert_eq!(wav_count(&g.dir), 0);
}

#[test]
fn wake_phrase_opens_window_in_same_step() {
    let recognizer = MockRecognizer::new().with_final("hey echo are you there");
    let mut g = gate(
        MockVad::new().with_response(false),
        recognizer,
        None,
        Duration::from_secs(60),
    );

    for i in 0..chunk_frames() {
        g.engine.process_frame(&quiet_frame());
        if i + 1 < chunk_frames() {
            assert!(!g.engine.is_ambient_active());
        }
    }

    // The frame that completed the chunk already switched the device
    // and started the session.
    assert!(g.engine.is_ambient_active());
    assert_eq!(g.device.calls(), vec![DeviceCall::Ambient]);
    assert!(g.recorder.lock().unwrap().is_running());
}

#[test]
fn repeated_wake_extends_window_past_first_deadline() {
    let recognizer = MockRecognizer::new()
        .with_final("wake up")
        .with_final("wake up");
    let mut g = gate(
        MockVad::new().with_response(false),
        recognizer,
        None,
        Duration::from_secs(1),
    );

    for _ in 0..chunk_frames() {
        g.engine.process_frame(&quiet_frame());
    }
    assert!(g.engine.is_ambient_active());
    let first_wake = Instant::now();

    thread::sleep(Duration::from_millis(700));
    for _ in 0..chunk_frames() {
        g.engine.process_frame(&quiet_frame());
    }
    assert!(g.engine.is_ambient_active());

    // Past the first wake's deadline but within the second's.
    thread::sleep(Duration::from_millis(700));
    assert!(first_wake.elapsed() > Duration::from_secs(1));
    assert!(g.engine.is_ambient_active());
    assert_eq!(g.device.calls(), vec![DeviceCall::Ambient]);

    // Let the extended deadline elapse.
    let deadline = Instant::now() + Duration::from_secs(5);
    while g.engine.is_ambient_active() && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(50));
    }
    assert!(!g.engine.is_ambient_active());
    assert_eq!(
        g.device.calls(),
        vec![DeviceCall::Ambient, DeviceCall::NoiseCancellation]
    );

    // The deadline closes the window but leaves the session open; only
    // shutdown writes it out.
    assert!(g.recorder.lock().unwrap().is_running());
    assert_eq!(wav_count(&g.dir), 0);
    assert!(g.engine.shutdown().is_some());
    assert_eq!(wav_count(&g.dir), 1);
}

#[test]
fn two_wakes_in_one_window_flush_one_file() {
    let recognizer = MockRecognizer::new()
        .with_final("excuse me")
        .with_final("excuse me");
    let mut g = gate(
        MockVad::new().with_response(false),
        recognizer,
        None,
        Duration::from_secs(60),
    );

    for _ in 0..2 * chunk_frames() {
        g.engine.process_frame(&quiet_frame());
    }
    assert!(g.engine.is_ambient_active());
    // One session holds every frame since the first wake fired.
    let recorded = g.recorder.lock().unwrap().len();
    assert_eq!(recorded, chunk_frames() * FRAME);

    let path = g.engine.shutdown().expect("no recording flushed");
    assert!(path.exists());
    assert_eq!(wav_count(&g.dir), 1);
}

#[test]
fn blocked_speech_is_still_recorded_in_open_session() {
    // Enrolled profile is orthogonal to the encoder's embedding, so
    // speech never passes the gate.
    let recognizer = MockRecognizer::new().with_final("hey echo");
    let mut g = gate(
        MockVad::new().with_response(true),
        recognizer,
        Some(SpeakerProfile::new(vec![0.0, 1.0])),
        Duration::from_secs(60),
    );

    for _ in 0..chunk_frames() {
        let out = g.engine.process_frame(&speech_frame());
        assert!(is_silent(&out));
    }
    assert!(g.engine.is_ambient_active());

    // The recorder sees the raw input even though the output is gated.
    let before = g.recorder.lock().unwrap().len();
    let out = g.engine.process_frame(&speech_frame());
    assert!(is_silent(&out));
    assert_eq!(g.recorder.lock().unwrap().len() - before, FRAME);
}

#[test]
fn matching_speaker_passes_after_first_result() {
    let mut g = gate(
        MockVad::new().with_response(true),
        MockRecognizer::new(),
        Some(SpeakerProfile::new(vec![1.0, 0.0])),
        Duration::from_secs(60),
    );

    // Held back until the async verifier reports a match.
    assert!(is_silent(&g.engine.process_frame(&speech_frame())));

    let mut passed = false;
    for _ in 0..200 {
        if !is_silent(&g.engine.process_frame(&speech_frame())) {
            passed = true;
            break;
        }
        thread::sleep(Duration::from_millis(2));
    }
    assert!(passed, "verified speech never passed the gate");
}

#[test]
fn engines_in_one_process_stay_independent() {
    let woken = MockRecognizer::new().with_final("thayaa");
    let mut a = gate(
        MockVad::new().with_response(false),
        woken,
        None,
        Duration::from_secs(60),
    );
    let mut b = gate(
        MockVad::new().with_response(false),
        MockRecognizer::new(),
        None,
        Duration::from_secs(60),
    );

    for _ in 0..chunk_frames() {
        a.engine.process_frame(&quiet_frame());
        b.engine.process_frame(&quiet_frame());
    }

    assert!(a.engine.is_ambient_active());
    assert!(!b.engine.is_ambient_active());
    assert!(b.device.calls().is_empty());

    assert!(a.engine.shutdown().is_some());
    assert_eq!(b.engine.shutdown(), None);
}
