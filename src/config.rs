use crate::defaults;
use crate::error::{EchogateError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub verification: VerificationConfig,
    pub wake: WakeSectionConfig,
    pub ambient: AmbientConfig,
    pub device: DeviceConfig,
    pub recording: RecordingConfig,
}

/// Audio capture configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub device: Option<String>,
    pub sample_rate: u32,
    pub frame_duration_ms: u32,
    pub energy_floor: f32,
    /// Recognized for forward compatibility; the gate applies no
    /// suppression to the stream itself.
    pub noise_reduction: bool,
}

/// Speaker verification configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct VerificationConfig {
    pub enabled: bool,
    pub voice_sample: PathBuf,
    pub threshold: f32,
    pub interval_frames: u32,
    pub window_secs: u32,
}

/// Wake-phrase detection configuration.
///
/// `recognizer_command` is any program that reads raw 16-bit PCM on stdin
/// and prints finalized results as JSON lines with a `text` field; empty
/// means wake detection is disabled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WakeSectionConfig {
    pub enabled: bool,
    pub recognizer_command: Vec<String>,
    pub phrases: Vec<String>,
    pub window_secs: u32,
    pub chunk_secs: u32,
}

/// Ambient mode configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AmbientConfig {
    pub duration_secs: u64,
}

/// External earbud control configuration.
///
/// Commands are program + args vectors; empty means the switch is
/// unconfigured and transitions proceed without touching hardware.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DeviceConfig {
    pub name: String,
    pub ambient_command: Vec<String>,
    pub noise_cancel_command: Vec<String>,
    pub probe_command: Vec<String>,
}

/// Session recording configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RecordingConfig {
    pub dir: PathBuf,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: defaults::SAMPLE_RATE,
            frame_duration_ms: defaults::FRAME_DURATION_MS,
            energy_floor: defaults::ENERGY_FLOOR,
            noise_reduction: true,
        }
    }
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            voice_sample: PathBuf::from(defaults::VOICE_SAMPLE_PATH),
            threshold: defaults::VERIFY_THRESHOLD,
            interval_frames: defaults::VERIFY_INTERVAL_FRAMES,
            window_secs: defaults::UTTERANCE_WINDOW_SECS,
        }
    }
}

impl Default for WakeSectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            recognizer_command: Vec::new(),
            phrases: defaults::WAKE_PHRASES.iter().map(|s| s.to_string()).collect(),
            window_secs: defaults::WAKE_WINDOW_SECS,
            chunk_secs: defaults::WAKE_CHUNK_SECS,
        }
    }
}

impl Default for AmbientConfig {
    fn default() -> Self {
        Self {
            duration_secs: defaults::AMBIENT_DURATION_SECS,
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: "Galaxy Buds".to_string(),
            ambient_command: Vec::new(),
            noise_cancel_command: Vec::new(),
            probe_command: vec!["bluetoothctl".to_string(), "devices".to_string()],
        }
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(defaults::RECORDINGS_DIR),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                if e.downcast_ref::<std::io::Error>()
                    .map(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
                    .unwrap_or(false)
                {
                    Self::default()
                } else {
                    panic!("Failed to load config from {}: {}", path.display(), e);
                }
            }
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - ECHOGATE_AUDIO_DEVICE → audio.device
    /// - ECHOGATE_VOICE_SAMPLE → verification.voice_sample
    /// - ECHOGATE_RECORDINGS_DIR → recording.dir
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(device) = std::env::var("ECHOGATE_AUDIO_DEVICE")
            && !device.is_empty()
        {
            self.audio.device = Some(device);
        }

        if let Ok(sample) = std::env::var("ECHOGATE_VOICE_SAMPLE")
            && !sample.is_empty()
        {
            self.verification.voice_sample = PathBuf::from(sample);
        }

        if let Ok(dir) = std::env::var("ECHOGATE_RECORDINGS_DIR")
            && !dir.is_empty()
        {
            self.recording.dir = PathBuf::from(dir);
        }

        self
    }

    /// Validate value ranges before wiring the pipeline.
    pub fn validate(&self) -> Result<()> {
        if self.audio.sample_rate == 0 {
            return Err(EchogateError::ConfigInvalidValue {
                key: "audio.sample_rate".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.audio.frame_duration_ms == 0 {
            return Err(EchogateError::ConfigInvalidValue {
                key: "audio.frame_duration_ms".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.verification.threshold) {
            return Err(EchogateError::ConfigInvalidValue {
                key: "verification.threshold".to_string(),
                message: format!(
                    "{} is outside the similarity range 0.0..=1.0",
                    self.verification.threshold
                ),
            });
        }
        if self.verification.interval_frames == 0 {
            return Err(EchogateError::ConfigInvalidValue {
                key: "verification.interval_frames".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.wake.chunk_secs == 0 || self.wake.window_secs < self.wake.chunk_secs {
            return Err(EchogateError::ConfigInvalidValue {
                key: "wake.window_secs".to_string(),
                message: "window must be at least one chunk long".to_string(),
            });
        }
        if self.ambient.duration_secs == 0 {
            return Err(EchogateError::ConfigInvalidValue {
                key: "ambient.duration_secs".to_string(),
                message: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/echogate/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .expect("Could not determine config directory")
            .join("echogate")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::NamedTempFile;

    // Mutex to serialize tests that modify environment variables
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    // SAFETY: These helpers are only used in tests with ENV_LOCK held,
    // ensuring no concurrent access to environment variables.
    fn set_env(key: &str, value: &str) {
        unsafe { std::env::set_var(key, value) }
    }

    fn remove_env(key: &str) {
        unsafe { std::env::remove_var(key) }
    }

    fn clear_echogate_env() {
        remove_env("ECHOGATE_AUDIO_DEVICE");
        remove_env("ECHOGATE_VOICE_SAMPLE");
        remove_env("ECHOGATE_RECORDINGS_DIR");
    }

    #[test]
    fn test_default_config_has_correct_values() {
        let config = Config::default();

        assert_eq!(config.audio.device, None);
        assert_eq!(config.audio.sample_rate, 16000);
        assert_eq!(config.audio.frame_duration_ms, 30);
        assert_eq!(config.audio.energy_floor, 0.005);

        assert!(config.verification.enabled);
        assert_eq!(config.verification.threshold, 0.5);
        assert_eq!(config.verification.interval_frames, 10);
        assert_eq!(config.verification.window_secs, 2);

        assert!(config.wake.enabled);
        assert_eq!(config.wake.window_secs, 5);
        assert_eq!(config.wake.chunk_secs, 2);
        assert!(config.wake.phrases.contains(&"hey echo".to_string()));

        assert_eq!(config.ambient.duration_secs, 5);
        assert_eq!(config.device.name, "Galaxy Buds");
        assert_eq!(config.recording.dir, PathBuf::from("recordings"));
    }

    #[test]
    fn test_load_from_toml_file() {
        let toml_content = r#"
            [audio]
            device = "hw:0,0"
            energy_floor = 0.01

            [verification]
            voice_sample = "/data/voice.wav"
            threshold = 0.7

            [wake]
            phrases = ["computer"]

            [ambient]
            duration_secs = 12

            [device]
            name = "Buds Pro"
            ambient_command = ["buds-cli", "ambient", "on"]
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.audio.device, Some("hw:0,0".to_string()));
        assert_eq!(config.audio.energy_floor, 0.01);
        assert_eq!(
            config.verification.voice_sample,
            PathBuf::from("/data/voice.wav")
        );
        assert_eq!(config.verification.threshold, 0.7);
        assert_eq!(config.wake.phrases, vec!["computer".to_string()]);
        assert_eq!(config.ambient.duration_secs, 12);
        assert_eq!(config.device.name, "Buds Pro");
        assert_eq!(
            config.device.ambient_command,
            vec!["buds-cli", "ambient", "on"]
        );
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let toml_content = r#"
            [ambient]
            duration_secs = 30
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();

        let config = Config::load(temp_file.path()).unwrap();

        assert_eq!(config.ambient.duration_secs, 30);

        // Everything else should be defaults
        assert_eq!(config.audio.sample_rate, 16000);
        assert_eq!(config.verification.threshold, 0.5);
        assert_eq!(config.wake.chunk_secs, 2);
    }

    #[test]
    fn test_env_override_device() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_echogate_env();

        set_env("ECHOGATE_AUDIO_DEVICE", "hw:1,0");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.audio.device, Some("hw:1,0".to_string()));

        clear_echogate_env();
    }

    #[test]
    fn test_env_override_all() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_echogate_env();

        set_env("ECHOGATE_AUDIO_DEVICE", "pulse");
        set_env("ECHOGATE_VOICE_SAMPLE", "/tmp/voice.wav");
        set_env("ECHOGATE_RECORDINGS_DIR", "/tmp/sessions");

        let config = Config::default().with_env_overrides();

        assert_eq!(config.audio.device, Some("pulse".to_string()));
        assert_eq!(
            config.verification.voice_sample,
            PathBuf::from("/tmp/voice.wav")
        );
        assert_eq!(config.recording.dir, PathBuf::from("/tmp/sessions"));

        clear_echogate_env();
    }

    #[test]
    fn test_env_override_empty_string_ignored() {
        let _lock = ENV_LOCK.lock().unwrap();
        clear_echogate_env();

        set_env("ECHOGATE_AUDIO_DEVICE", "");
        let config = Config::default().with_env_overrides();

        assert_eq!(config.audio.device, None);

        clear_echogate_env();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let invalid_toml = r#"
            [audio
            device = "broken
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(invalid_toml.as_bytes()).unwrap();

        assert!(Config::load(temp_file.path()).is_err());
    }

    #[test]
    fn test_default_path_is_xdg_compliant() {
        let path = Config::default_path();
        let path_str = path.to_string_lossy();

        assert!(path_str.contains("echogate"));
        assert!(path_str.ends_with("config.toml"));
    }

    #[test]
    fn test_load_or_default_returns_default_for_missing_file() {
        let missing_path = Path::new("/tmp/nonexistent_echogate_config_12345.toml");
        let config = Config::load_or_default(missing_path);

        assert_eq!(config, Config::default());
    }

    #[test]
    #[should_panic(expected = "Failed to load config")]
    fn test_load_or_default_panics_on_invalid_toml() {
        let invalid_toml = r#"
            [audio
            device = "broken
        "#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(invalid_toml.as_bytes()).unwrap();

        Config::load_or_default(temp_file.path());
    }

    #[test]
    fn test_validate_accepts_defaults() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range_threshold() {
        let mut config = Config::default();
        config.verification.threshold = 1.5;

        let err = config.validate().unwrap_err();
        assert!(matches!(err, EchogateError::ConfigInvalidValue { ref key, .. }
            if key == "verification.threshold"));
    }

    #[test]
    fn test_validate_rejects_window_shorter_than_chunk() {
        let mut config = Config::default();
        config.wake.window_secs = 1;
        config.wake.chunk_secs = 2;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_ambient_duration() {
        let mut config = Config::default();
        config.ambient.duration_secs = 0;

        assert!(config.validate().is_err());
    }
}
