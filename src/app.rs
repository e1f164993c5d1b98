//! Audio gate application entry point.
//!
//! Wires the full streaming path together:
//! capture → classify → verify → gate → playback
//! with wake-phrase detection and ambient-mode control on the side.

use crate::audio::capture::{DuplexAudio, suppress_audio_warnings};
use crate::audio::wav::load_waveform;
use crate::config::Config;
use crate::defaults;
use crate::error::{EchogateError, Result};
use crate::gate::ambient::AmbientModeController;
use crate::gate::classifier::{EnergyVad, FrameClassifier};
use crate::gate::device::{CommandDeviceControl, DeviceControl, SystemCommandExecutor};
use crate::gate::embed::SpectralEncoder;
use crate::gate::engine::{EngineConfig, StreamEngine};
use crate::gate::recognizer::PipeRecognizer;
use crate::gate::session::SessionRecorder;
use crate::gate::verifier::{SpeakerProfile, SpeakerVerifier, VerifierHandle};
use crate::gate::wake::{NullRecognizer, StreamingRecognizer, WakeConfig, WakeWordDetector};
use owo_colors::OwoColorize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How long the frame loop blocks on the capture channel before
/// re-checking the shutdown flag.
const FRAME_POLL: Duration = Duration::from_millis(200);

/// Run the gate: capture audio, pass only the enrolled voice, watch for
/// wake phrases, drive ambient mode.
///
/// # Arguments
/// * `config` - Fully resolved configuration (CLI overrides applied)
/// * `quiet` - Suppress status messages
/// * `verbosity` - Verbosity level (0=default, 1=gate decisions + detail)
///
/// # Returns
/// Ok(()) once the gate has shut down cleanly after Ctrl+C
pub async fn run_gate(config: Config, quiet: bool, verbosity: u8) -> Result<()> {
    // Suppress noisy JACK/ALSA warnings before audio init
    suppress_audio_warnings();

    config.validate()?;

    let sample_rate = config.audio.sample_rate;
    let frame_size = defaults::frame_size(sample_rate, config.audio.frame_duration_ms);

    // Load the enrollment sample ONCE before the loop (this is the slow part)
    let profile = if config.verification.enabled {
        load_profile(&config, sample_rate, quiet)?
    } else {
        if !quiet {
            eprintln!("Speaker verification disabled; all speech passes.");
        }
        None
    };
    let verification_enabled = profile.is_some();

    let verifier: VerifierHandle =
        SpeakerVerifier::new(SpectralEncoder::new(sample_rate), profile, sample_rate)
            .with_threshold(config.verification.threshold)
            .spawn();

    let recognizer = create_recognizer(&config, quiet);
    let wake = WakeWordDetector::new(
        recognizer,
        WakeConfig {
            window_secs: config.wake.window_secs,
            chunk_secs: config.wake.chunk_secs,
            phrases: config.wake.phrases.clone(),
        },
        sample_rate,
    );

    let device: Arc<dyn DeviceControl> = Arc::new(CommandDeviceControl::new(
        SystemCommandExecutor::new(),
        config.device.name.clone(),
        config.device.ambient_command.clone(),
        config.device.noise_cancel_command.clone(),
        config.device.probe_command.clone(),
    ));
    if !device.check_connected() {
        eprintln!(
            "Warning: device '{}' not detected; mode switches may fail.",
            config.device.name
        );
    }

    let recorder = Arc::new(Mutex::new(SessionRecorder::new(
        config.recording.dir.clone(),
        sample_rate,
    )));
    let ambient = AmbientModeController::new(
        device,
        recorder.clone(),
        Duration::from_secs(config.ambient.duration_secs),
    );

    let classifier = FrameClassifier::new(EnergyVad::new(), sample_rate)
        .with_energy_floor(config.audio.energy_floor);

    let mut engine = StreamEngine::new(
        EngineConfig {
            sample_rate,
            verify_interval_frames: config.verification.interval_frames,
            utterance_window_secs: config.verification.window_secs,
            verification_enabled,
        },
        classifier,
        verifier,
        wake,
        ambient,
        recorder,
    );

    let mut audio = DuplexAudio::new(config.audio.device.as_deref(), sample_rate, frame_size)?;
    let frames = audio.start()?;

    if !quiet {
        eprintln!("Gate running at {} Hz, {} samples/frame.", sample_rate, frame_size);
        let verification = if verification_enabled {
            "on".green().to_string()
        } else {
            "off".dimmed().to_string()
        };
        let wake_state = if config.wake.enabled && !config.wake.recognizer_command.is_empty() {
            "on".green().to_string()
        } else {
            "off".dimmed().to_string()
        };
        eprintln!("  {} {}", "verification:".dimmed(), verification);
        eprintln!("  {}          {}", "wake:".dimmed(), wake_state);
        if verbosity >= 1 {
            eprintln!("  {}       {:?}", "phrases:".dimmed(), config.wake.phrases);
            eprintln!(
                "  {}        {}s",
                "window:".dimmed(),
                config.ambient.duration_secs
            );
        }
        eprintln!("Press Ctrl+C to stop.");
    }

    let running = Arc::new(AtomicBool::new(true));
    let loop_flag = running.clone();

    // Frame loop lives on a blocking thread; the capture callback only
    // ever touches the channel, never the engine.
    let worker = tokio::task::spawn_blocking(move || {
        let mut was_open = false;
        let mut was_ambient = false;
        loop {
            if !loop_flag.load(Ordering::SeqCst) {
                break;
            }
            match frames.recv_timeout(FRAME_POLL) {
                Ok(frame) => {
                    let out = engine.process_frame(&frame);
                    audio.push_playback(&out);

                    if verbosity >= 1 {
                        let open = out.iter().any(|&s| s != 0.0);
                        if open != was_open {
                            if open {
                                eprintln!("{}", "gate open".green());
                            } else {
                                eprintln!("{}", "gate closed".dimmed());
                            }
                            was_open = open;
                        }
                        let ambient = engine.is_ambient_active();
                        if ambient != was_ambient {
                            if ambient {
                                eprintln!("{}", "ambient window open".green());
                            } else {
                                eprintln!("{}", "ambient window closed".dimmed());
                            }
                            was_ambient = ambient;
                        }
                    }
                }
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
                Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
            }
        }
        audio.stop();
        engine.shutdown()
    });

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| EchogateError::Other(format!("Failed to wait for Ctrl+C: {}", e)))?;

    if !quiet {
        eprintln!("\nShutting down...");
    }

    running.store(false, Ordering::SeqCst);
    let saved = worker
        .await
        .map_err(|e| EchogateError::Other(format!("Frame loop panicked: {}", e)))?;

    if let Some(path) = saved
        && !quiet
    {
        eprintln!("Session recording saved to {}", path.display());
    }

    Ok(())
}

/// Load and embed the enrollment sample.
///
/// A missing sample degrades to a warning and an open gate rather than a
/// startup failure; any other error is fatal.
fn load_profile(config: &Config, sample_rate: u32, quiet: bool) -> Result<Option<SpeakerProfile>> {
    let path = &config.verification.voice_sample;
    match load_waveform(path, sample_rate) {
        Ok(waveform) => {
            let encoder = SpectralEncoder::new(sample_rate);
            let profile = SpeakerProfile::enroll(&encoder, &waveform)?;
            if !quiet {
                eprintln!("Enrolled voice profile from {}", path.display());
            }
            Ok(Some(profile))
        }
        Err(EchogateError::EnrollmentNotFound { path }) => {
            eprintln!("Warning: enrollment sample not found at {}; speech passes unverified.", path);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Build the wake recognizer session, degrading to a disabled detector
/// when the configured command is missing or fails to spawn.
fn create_recognizer(config: &Config, quiet: bool) -> Box<dyn StreamingRecognizer> {
    if !config.wake.enabled {
        return Box::new(NullRecognizer);
    }
    if config.wake.recognizer_command.is_empty() {
        eprintln!("Warning: wake detection enabled but no recognizer command configured.");
        return Box::new(NullRecognizer);
    }
    match PipeRecognizer::spawn(&config.wake.recognizer_command) {
        Ok(recognizer) => {
            if !quiet {
                eprintln!(
                    "Wake recognizer started: {}",
                    config.wake.recognizer_command.join(" ")
                );
            }
            Box::new(recognizer)
        }
        Err(e) => {
            eprintln!("Warning: wake recognizer failed to start ({}); wake detection disabled.", e);
            Box::new(NullRecognizer)
        }
    }
}
