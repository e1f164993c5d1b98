//! Device audio-mode switching (ambient vs noise cancellation).
//!
//! Switches are best-effort calls to an external earbud/headphone control;
//! the `CommandExecutor` trait enables full testability without touching
//! real hardware or system tools.

use crate::error::{EchogateError, Result};
use std::process::Command;
use std::sync::Mutex;

/// Trait for executing system commands.
///
/// Object-safe, Send + Sync for use in concurrent contexts.
pub trait CommandExecutor: Send + Sync {
    /// Execute a command with arguments, returning its stdout on success.
    fn execute(&self, command: &str, args: &[&str]) -> Result<String>;
}

/// Production command executor using std::process::Command.
#[derive(Debug, Clone, Default)]
pub struct SystemCommandExecutor;

impl SystemCommandExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl CommandExecutor for SystemCommandExecutor {
    fn execute(&self, command: &str, args: &[&str]) -> Result<String> {
        let output = Command::new(command).args(args).output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EchogateError::DeviceToolNotFound {
                    tool: command.to_string(),
                }
            } else {
                EchogateError::DeviceSwitch {
                    message: format!("Failed to execute {}: {}", command, e),
                }
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EchogateError::DeviceSwitch {
                message: format!(
                    "{} failed with status {:?}: {}",
                    command, output.status, stderr
                ),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Trait for the external device-mode capability.
///
/// All operations are best-effort: failures are reported but the caller's
/// state machine proceeds as if the switch succeeded (intended-state
/// tracking, not confirmed hardware state).
pub trait DeviceControl: Send + Sync {
    /// Switch the device to ambient (transparency) mode.
    fn switch_to_ambient(&self) -> Result<()>;

    /// Switch the device back to noise cancellation.
    fn switch_to_noise_cancellation(&self) -> Result<()>;

    /// Whether the device is currently reachable.
    fn check_connected(&self) -> bool;
}

/// Shell-command-driven device control.
///
/// Runs user-configured commands for each mode switch; the connectivity probe
/// greps a pairing-list command's output for the device name. The original
/// hardware path is `blueutil --paired` plus vendor tools, which is exactly
/// this shape.
pub struct CommandDeviceControl<E: CommandExecutor> {
    executor: E,
    device_name: String,
    ambient_cmd: Vec<String>,
    noise_cancel_cmd: Vec<String>,
    probe_cmd: Vec<String>,
}

impl<E: CommandExecutor> CommandDeviceControl<E> {
    /// Creates a control from configured command lines (program + args).
    pub fn new(
        executor: E,
        device_name: String,
        ambient_cmd: Vec<String>,
        noise_cancel_cmd: Vec<String>,
        probe_cmd: Vec<String>,
    ) -> Self {
        Self {
            executor,
            device_name,
            ambient_cmd,
            noise_cancel_cmd,
            probe_cmd,
        }
    }

    fn run(&self, cmd: &[String]) -> Result<String> {
        let Some((program, args)) = cmd.split_first() else {
            return Err(EchogateError::DeviceSwitch {
                message: "no command configured".to_string(),
            });
        };
        let args: Vec<&str> = args.iter().map(|s| s.as_str()).collect();
        self.executor.execute(program, &args)
    }
}

impl<E: CommandExecutor> DeviceControl for CommandDeviceControl<E> {
    fn switch_to_ambient(&self) -> Result<()> {
        self.run(&self.ambient_cmd).map(|_| ())
    }

    fn switch_to_noise_cancellation(&self) -> Result<()> {
        self.run(&self.noise_cancel_cmd).map(|_| ())
    }

    fn check_connected(&self) -> bool {
        match self.run(&self.probe_cmd) {
            Ok(output) => output
                .to_lowercase()
                .contains(&self.device_name.to_lowercase()),
            Err(_) => false,
        }
    }
}

/// Device-mode calls observed by [`MockDevice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCall {
    Ambient,
    NoiseCancellation,
}

/// Mock device control recording every call, for tests.
pub struct MockDevice {
    calls: Mutex<Vec<DeviceCall>>,
    connected: bool,
    should_fail: bool,
}

impl MockDevice {
    /// Creates a connected mock that accepts every switch.
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            connected: true,
            should_fail: false,
        }
    }

    /// Configure the connectivity probe result.
    pub fn with_connected(mut self, connected: bool) -> Self {
        self.connected = connected;
        self
    }

    /// Configure every switch to fail.
    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// All calls observed so far, in order.
    pub fn calls(&self) -> Vec<DeviceCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: DeviceCall) -> Result<()> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
        if self.should_fail {
            Err(EchogateError::DeviceSwitch {
                message: "mock device failure".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceControl for MockDevice {
    fn switch_to_ambient(&self) -> Result<()> {
        self.record(DeviceCall::Ambient)
    }

    fn switch_to_noise_cancellation(&self) -> Result<()> {
        self.record(DeviceCall::NoiseCancellation)
    }

    fn check_connected(&self) -> bool {
        self.connected
    }
}
