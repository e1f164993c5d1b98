//! Duplex audio I/O using CPAL (Cross-Platform Audio Library).
//!
//! The input stream chops captured audio into fixed 30ms frames and
//! hands them to the processing loop over a bounded channel; the output
//! stream drains a playback queue of gated frames, filling silence on
//! underrun so the output never glitches while speech is blocked.

use crate::error::{EchogateError, Result};
use crate::gate::pcm;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender, bounded};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Run a closure with stderr temporarily redirected to /dev/null.
///
/// This suppresses noisy ALSA/JACK/PipeWire messages that CPAL triggers
/// when probing audio backends. The messages are harmless but confusing to users.
///
/// # Safety
/// Uses `libc::dup`/`libc::dup2` to save and restore file descriptor 2 (stderr).
/// Safe as long as no other thread is concurrently manipulating fd 2.
fn with_suppressed_stderr<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    unsafe {
        let saved_fd = libc::dup(2);
        let devnull = libc::open(c"/dev/null".as_ptr(), libc::O_WRONLY);
        if saved_fd >= 0 && devnull >= 0 {
            libc::dup2(devnull, 2);
            libc::close(devnull);
        }

        let result = f();

        if saved_fd >= 0 {
            libc::dup2(saved_fd, 2);
            libc::close(saved_fd);
        }

        result
    }
}

/// Suppress noisy JACK/ALSA error messages that occur during audio backend probing.
///
/// # Safety
/// This modifies environment variables which is safe when called before spawning threads.
pub fn suppress_audio_warnings() {
    // SAFETY: Called at startup before any threads are spawned
    unsafe {
        std::env::set_var("JACK_NO_START_SERVER", "1");
        std::env::set_var("JACK_NO_AUDIO_RESERVATION", "1");
        std::env::set_var("PIPEWIRE_DEBUG", "0");
        std::env::set_var("ALSA_DEBUG", "0");
        std::env::set_var("PW_LOG", "0");
    }
}

/// Preferred device names for GNOME/PipeWire environments.
const PREFERRED_DEVICES: &[&str] = &["pipewire", "pulse", "PulseAudio"];

/// Device name patterns to filter out (not useful for voice input).
const FILTERED_PATTERNS: &[&str] = &[
    "surround",
    "front:",
    "rear:",
    "center:",
    "side:",
    "Digital Output",
    "HDMI",
    "S/PDIF",
];

/// Number of 30ms frames buffered between the capture callback and the
/// processing loop. Overflow drops the newest frame rather than blocking
/// the audio thread.
const FRAME_CHANNEL_CAPACITY: usize = 64;

/// Playback queue cap in seconds; keeps output latency bounded when the
/// consumer outpaces the device.
const PLAYBACK_CAP_SECS: u32 = 1;

fn should_filter_device(name: &str) -> bool {
    let lower = name.to_lowercase();
    FILTERED_PATTERNS
        .iter()
        .any(|pattern| lower.contains(&pattern.to_lowercase()))
}

fn is_preferred_device(name: &str) -> bool {
    let lower = name.to_lowercase();
    PREFERRED_DEVICES
        .iter()
        .any(|pref| lower.contains(&pref.to_lowercase()))
}

/// List all available audio input devices with filtering and recommendations.
///
/// Preferred devices are marked with "\[recommended\]". Obviously unusable
/// devices (surround channels, HDMI, etc.) are filtered out.
pub fn list_devices() -> Result<Vec<String>> {
    let (host, devices) = with_suppressed_stderr(|| {
        let host = cpal::default_host();
        let devices = host.input_devices();
        (host, devices)
    });
    let _ = host; // keep host alive while iterating devices
    let devices = devices.map_err(|e| EchogateError::AudioStream {
        message: format!("Failed to enumerate input devices: {}", e),
    })?;

    let mut device_names = Vec::new();
    for device in devices {
        if let Ok(name) = device.name() {
            if should_filter_device(&name) {
                continue;
            }
            if is_preferred_device(&name) {
                device_names.push(format!("{} [recommended]", name));
            } else {
                device_names.push(name);
            }
        }
    }

    Ok(device_names)
}

/// Get the best default input device, preferring PipeWire/PulseAudio.
///
/// This ensures we respect the desktop's audio device selection.
fn get_best_default_device() -> Result<cpal::Device> {
    with_suppressed_stderr(|| {
        let host = cpal::default_host();

        if let Ok(devices) = host.input_devices() {
            for device in devices {
                if let Ok(name) = device.name()
                    && is_preferred_device(&name)
                {
                    return Ok(device);
                }
            }
        }

        host.default_input_device()
            .ok_or_else(|| EchogateError::AudioDeviceNotFound {
                device: "default".to_string(),
            })
    })
}

/// Wrapper for cpal::Stream to make it Send.
///
/// SAFETY: the stream is only accessed from a single thread at a time; its
/// methods are called synchronously and never cross thread boundaries.
struct SendableStream(cpal::Stream);

unsafe impl Send for SendableStream {}

/// Full-duplex audio: capture frames in, play gated frames out.
///
/// Capture runs mono f32 at the configured rate where the backend allows
/// it (PipeWire/PulseAudio convert transparently); otherwise the native
/// format is converted in software.
pub struct DuplexAudio {
    input_device: cpal::Device,
    output_device: cpal::Device,
    sample_rate: u32,
    frame_size: usize,
    input_stream: Option<SendableStream>,
    output_stream: Option<SendableStream>,
    playback: Arc<Mutex<VecDeque<f32>>>,
}

impl DuplexAudio {
    /// Creates a duplex pair on the given input device (or the best
    /// default) and the system default output device.
    pub fn new(device_name: Option<&str>, sample_rate: u32, frame_size: usize) -> Result<Self> {
        let input_device = with_suppressed_stderr(|| {
            let host = cpal::default_host();

            if let Some(name) = device_name {
                let devices = host
                    .input_devices()
                    .map_err(|e| EchogateError::AudioStream {
                        message: format!("Failed to enumerate devices: {}", e),
                    })?;

                devices
                    .into_iter()
                    .find(|dev| dev.name().is_ok_and(|n| n == name))
                    .ok_or_else(|| EchogateError::AudioDeviceNotFound {
                        device: name.to_string(),
                    })
            } else {
                get_best_default_device()
            }
        })?;

        let output_device = with_suppressed_stderr(|| {
            cpal::default_host()
                .default_output_device()
                .ok_or_else(|| EchogateError::AudioDeviceNotFound {
                    device: "default output".to_string(),
                })
        })?;

        Ok(Self {
            input_device,
            output_device,
            sample_rate,
            frame_size,
            input_stream: None,
            output_stream: None,
            playback: Arc::new(Mutex::new(VecDeque::new())),
        })
    }

    /// Starts both streams and returns the captured-frame receiver.
    ///
    /// Every received frame is exactly `frame_size` samples. Frames are
    /// dropped (newest first) when the consumer falls behind.
    pub fn start(&mut self) -> Result<Receiver<Vec<f32>>> {
        let (frame_tx, frame_rx) = bounded(FRAME_CHANNEL_CAPACITY);

        let input = self.build_input_stream(frame_tx)?;
        let output = self.build_output_stream()?;

        input.play().map_err(|e| EchogateError::AudioStream {
            message: format!("Failed to start input stream: {}", e),
        })?;
        output.play().map_err(|e| EchogateError::AudioStream {
            message: format!("Failed to start output stream: {}", e),
        })?;

        self.input_stream = Some(SendableStream(input));
        self.output_stream = Some(SendableStream(output));
        Ok(frame_rx)
    }

    /// Queues a gated frame for playback.
    pub fn push_playback(&self, frame: &[f32]) {
        let cap = (self.sample_rate * PLAYBACK_CAP_SECS) as usize;
        if let Ok(mut queue) = self.playback.lock() {
            queue.extend(frame.iter().copied());
            while queue.len() > cap {
                queue.pop_front();
            }
        }
    }

    /// Stops both streams.
    pub fn stop(&mut self) {
        if let Some(stream) = self.input_stream.take() {
            let _ = stream.0.pause();
        }
        if let Some(stream) = self.output_stream.take() {
            let _ = stream.0.pause();
        }
    }

    /// Build the capture stream with the configured format.
    ///
    /// Tries f32/mono at the configured rate first, then falls back to
    /// the device's native config with software conversion (channel
    /// mixing + resampling). The fallback handles PipeWire-ALSA setups
    /// that reject non-native configs.
    fn build_input_stream(&self, frame_tx: Sender<Vec<f32>>) -> Result<cpal::Stream> {
        let preferred_config = cpal::StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(self.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let err_callback = |err| {
            eprintln!("Audio input error: {}", err);
        };

        let mut framer = Framer::new(self.frame_size, frame_tx.clone());
        if let Ok(stream) = self.input_device.build_input_stream(
            &preferred_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                framer.push(data);
            },
            err_callback,
            None,
        ) {
            return Ok(stream);
        }

        self.build_input_stream_native(frame_tx)
    }

    /// Capture at the device's native config, converting in software.
    fn build_input_stream_native(&self, frame_tx: Sender<Vec<f32>>) -> Result<cpal::Stream> {
        use cpal::SampleFormat;

        let default_config =
            self.input_device
                .default_input_config()
                .map_err(|e| EchogateError::AudioStream {
                    message: format!("Failed to query default input config: {}", e),
                })?;

        let native_rate = default_config.sample_rate().0;
        let native_channels = default_config.channels() as usize;
        let target_rate = self.sample_rate;
        let stream_config: cpal::StreamConfig = default_config.clone().into();

        eprintln!(
            "echogate: using native audio format ({}ch/{}Hz/{:?}), converting in software",
            native_channels,
            native_rate,
            default_config.sample_format(),
        );

        let err_callback = |err| {
            eprintln!("Audio input error: {}", err);
        };

        let mut framer = Framer::new(self.frame_size, frame_tx);

        match default_config.sample_format() {
            SampleFormat::F32 => self
                .input_device
                .build_input_stream(
                    &stream_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        let converted =
                            convert_to_mono(data, native_channels, native_rate, target_rate);
                        framer.push(&converted);
                    },
                    err_callback,
                    None,
                )
                .map_err(|e| EchogateError::AudioStream {
                    message: format!("Failed to build native f32 stream: {}", e),
                }),
            SampleFormat::I16 => self
                .input_device
                .build_input_stream(
                    &stream_config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        let floats = pcm::i16_to_f32(data);
                        let converted =
                            convert_to_mono(&floats, native_channels, native_rate, target_rate);
                        framer.push(&converted);
                    },
                    err_callback,
                    None,
                )
                .map_err(|e| EchogateError::AudioStream {
                    message: format!("Failed to build native i16 stream: {}", e),
                }),
            fmt => Err(EchogateError::AudioStream {
                message: format!(
                    "Unsupported native sample format: {:?}. \
                     Try specifying a device with --device.",
                    fmt
                ),
            }),
        }
    }

    /// Build the playback stream, draining the gated-frame queue.
    fn build_output_stream(&self) -> Result<cpal::Stream> {
        let preferred_config = cpal::StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(self.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let err_callback = |err| {
            eprintln!("Audio output error: {}", err);
        };

        let playback = Arc::clone(&self.playback);
        self.output_device
            .build_output_stream(
                &preferred_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut queue = match playback.lock() {
                        Ok(queue) => queue,
                        Err(_) => {
                            data.fill(0.0);
                            return;
                        }
                    };
                    for slot in data.iter_mut() {
                        // Silence on underrun keeps the stream glitch-free.
                        *slot = queue.pop_front().unwrap_or(0.0);
                    }
                },
                err_callback,
                None,
            )
            .map_err(|e| EchogateError::AudioStream {
                message: format!("Failed to build output stream: {}", e),
            })
    }
}

/// Chops a sample stream into fixed-size frames and forwards them.
struct Framer {
    pending: Vec<f32>,
    frame_size: usize,
    frame_tx: Sender<Vec<f32>>,
}

impl Framer {
    fn new(frame_size: usize, frame_tx: Sender<Vec<f32>>) -> Self {
        Self {
            pending: Vec::with_capacity(frame_size * 2),
            frame_size,
            frame_tx,
        }
    }

    fn push(&mut self, samples: &[f32]) {
        self.pending.extend_from_slice(samples);
        while self.pending.len() >= self.frame_size {
            let frame: Vec<f32> = self.pending.drain(..self.frame_size).collect();
            // try_send: never block the audio callback; drop on overflow.
            let _ = self.frame_tx.try_send(frame);
        }
    }
}

/// Mix multi-channel audio to mono and resample to the target rate.
fn convert_to_mono(
    samples: &[f32],
    channels: usize,
    source_rate: u32,
    target_rate: u32,
) -> Vec<f32> {
    let mono: Vec<f32> = if channels == 1 {
        samples.to_vec()
    } else {
        samples
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    if source_rate == target_rate {
        mono
    } else {
        crate::audio::wav::resample(&mono, source_rate, target_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_should_filter_device() {
        assert!(should_filter_device("surround51"));
        assert!(should_filter_device("front:CARD=PCH"));
        assert!(should_filter_device("HDMI Output"));
        assert!(should_filter_device("Digital Output S/PDIF"));
        assert!(!should_filter_device("pipewire"));
        assert!(!should_filter_device("Built-in Audio"));
    }

    #[test]
    fn test_is_preferred_device() {
        assert!(is_preferred_device("pipewire"));
        assert!(is_preferred_device("PipeWire"));
        assert!(is_preferred_device("PulseAudio"));
        assert!(!is_preferred_device("hw:0,0"));
        assert!(!is_preferred_device("default"));
    }

    #[test]
    fn test_framer_emits_fixed_frames() {
        let (tx, rx) = bounded(8);
        let mut framer = Framer::new(480, tx);

        framer.push(&vec![0.1; 300]);
        assert!(rx.try_recv().is_err());

        framer.push(&vec![0.1; 300]);
        let frame = rx.try_recv().unwrap();
        assert_eq!(frame.len(), 480);

        // 120 samples carried over
        framer.push(&vec![0.1; 360]);
        assert_eq!(rx.try_recv().unwrap().len(), 480);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_framer_drops_on_overflow() {
        let (tx, rx) = bounded(2);
        let mut framer = Framer::new(4, tx);

        framer.push(&vec![0.0; 20]); // 5 frames into a 2-slot channel
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_convert_to_mono_mixes_channels() {
        let stereo = vec![0.2, 0.4, 0.6, 0.8];
        let mono = convert_to_mono(&stereo, 2, 16000, 16000);
        assert_eq!(mono.len(), 2);
        assert!((mono[0] - 0.3).abs() < 1e-6);
        assert!((mono[1] - 0.7).abs() < 1e-6);
    }

    #[test]
    fn test_convert_to_mono_resamples() {
        let samples = vec![0.5; 4800];
        let converted = convert_to_mono(&samples, 1, 48000, 16000);
        assert!(converted.len() >= 1590 && converted.len() <= 1610);
    }

    #[test]
    #[ignore] // Requires audio hardware
    fn test_list_devices_returns_at_least_one_device() {
        let devices = list_devices();
        assert!(devices.is_ok());
        assert!(!devices.unwrap().is_empty());
    }

    #[test]
    fn test_create_with_invalid_device_name() {
        let result = DuplexAudio::new(Some("NonExistentDevice12345"), 16000, 480);
        // Either the device is not found, or the host has no devices at all
        // (headless CI); both surface as an error.
        assert!(result.is_err());
    }

    #[test]
    #[ignore] // Requires audio hardware
    fn test_duplex_start_stop() {
        let mut audio = DuplexAudio::new(None, 16000, 480).expect("no audio device");
        let rx = audio.start().expect("failed to start");
        std::thread::sleep(std::time::Duration::from_millis(100));
        let _ = rx.try_recv();
        audio.stop();
    }
}
