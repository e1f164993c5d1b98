//! Ambient mode state machine.
//!
//! A wake phrase opens a timed ambient window: the earbuds switch to
//! transparency, a recording session starts, and a deadline is armed.
//! Wake phrases during an active window extend the deadline instead of
//! stacking timers. When the deadline fires the window closes and the
//! earbuds return to noise cancellation; the recording session keeps
//! running and is flushed only on controller shutdown.

use crate::gate::device::DeviceControl;
use crate::gate::session::SessionRecorder;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Current phase of the ambient window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AmbientState {
    /// No window open; earbuds in noise cancellation.
    Idle,
    /// Window open until the deadline of the given generation fires.
    Active { generation: u64 },
}

/// Messages to the deadline timer thread.
enum TimerMsg {
    /// (Re-)arm the countdown for this generation.
    Arm { generation: u64 },
}

struct AmbientInner {
    state: Mutex<AmbientState>,
    device: Arc<dyn DeviceControl>,
    recorder: Arc<Mutex<SessionRecorder>>,
}

impl AmbientInner {
    /// Closes the window if `generation` is still the live one.
    ///
    /// A stale generation means the window was extended (or already
    /// closed) after this deadline was armed, so the fire is a no-op.
    fn deadline_elapsed(&self, generation: u64) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match *state {
            AmbientState::Active { generation: g } if g == generation => {
                *state = AmbientState::Idle;
            }
            _ => return,
        }
        drop(state);

        // The recording session outlives the window; it is flushed on
        // controller shutdown, not here.
        if let Err(e) = self.device.switch_to_noise_cancellation() {
            eprintln!("Warning: Failed to restore noise cancellation: {}", e);
        }
    }
}

/// Drives ambient-mode transitions off wake phrases and a deadline timer.
///
/// Transitions are guarded by a single mutex; the deadline runs on a
/// dedicated thread using `recv_timeout` so a new `Arm` message both
/// cancels the pending countdown and starts the next one.
pub struct AmbientModeController {
    inner: Arc<AmbientInner>,
    timer_tx: Option<Sender<TimerMsg>>,
    timer: Option<JoinHandle<()>>,
    next_generation: u64,
}

impl AmbientModeController {
    /// Creates the controller and spawns its timer thread.
    pub fn new(
        device: Arc<dyn DeviceControl>,
        recorder: Arc<Mutex<SessionRecorder>>,
        duration: Duration,
    ) -> Self {
        let inner = Arc::new(AmbientInner {
            state: Mutex::new(AmbientState::Idle),
            device,
            recorder,
        });

        let (tx, rx) = bounded::<TimerMsg>(16);
        let timer_inner = inner.clone();
        let timer = thread::spawn(move || {
            timer_loop(rx, timer_inner, duration);
        });

        Self {
            inner,
            timer_tx: Some(tx),
            timer: Some(timer),
            next_generation: 0,
        }
    }

    /// Handles a detected wake phrase, with the matched phrase and the
    /// transcript it was found in.
    ///
    /// Idle: opens the window (ambient mode, recording session, armed
    /// deadline). Active: extends the deadline for a full duration.
    /// Device failures are logged and never block the transition.
    pub fn on_wake_phrase(&mut self, phrase: &str, text: &str) {
        eprintln!("Wake phrase detected: \"{}\" in \"{}\"", phrase, text);
        self.next_generation += 1;
        let generation = self.next_generation;

        let mut state = self
            .inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let was_idle = matches!(*state, AmbientState::Idle);
        *state = AmbientState::Active { generation };
        drop(state);

        if was_idle {
            if let Err(e) = self.inner.device.switch_to_ambient() {
                eprintln!("Warning: Failed to enable ambient mode: {}", e);
            }
            self.inner
                .recorder
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .start();
        }

        if let Some(tx) = &self.timer_tx {
            let _ = tx.send(TimerMsg::Arm { generation });
        }
    }

    /// Current state snapshot.
    pub fn state(&self) -> AmbientState {
        *self
            .inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// True while an ambient window is open.
    pub fn is_active(&self) -> bool {
        matches!(self.state(), AmbientState::Active { .. })
    }

    /// Shuts down the timer and closes any open window.
    ///
    /// Returns the recording path when a session was flushed.
    pub fn shutdown(&mut self) -> Option<PathBuf> {
        // Dropping the sender ends the timer loop.
        self.timer_tx.take();
        if let Some(timer) = self.timer.take() {
            let _ = timer.join();
        }

        let mut state = self
            .inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let was_active = matches!(*state, AmbientState::Active { .. });
        *state = AmbientState::Idle;
        drop(state);

        if was_active {
            if let Err(e) = self.inner.device.switch_to_noise_cancellation() {
                eprintln!("Warning: Failed to restore noise cancellation: {}", e);
            }
        }
        // Flush unconditionally: the session may still be running after
        // its window closed. A recorder that never started returns None.
        match self
            .inner
            .recorder
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .stop()
        {
            Ok(path) => path,
            Err(e) => {
                eprintln!("Warning: Failed to save session: {}", e);
                None
            }
        }
    }

    /// Forces the deadline of `generation` to fire now. Test hook; the
    /// timer thread performs the same call when its countdown elapses.
    #[cfg(test)]
    fn fire_deadline(&self, generation: u64) {
        self.inner.deadline_elapsed(generation);
    }
}

impl Drop for AmbientModeController {
    fn drop(&mut self) {
        if self.timer_tx.is_some() {
            self.shutdown();
        }
    }
}

/// Timer loop: idle until armed, then count down. A fresh `Arm` during
/// the countdown restarts it for the new generation.
fn timer_loop(rx: Receiver<TimerMsg>, inner: Arc<AmbientInner>, duration: Duration) {
    loop {
        // Wait for the next window to open.
        let TimerMsg::Arm { mut generation } = match rx.recv() {
            Ok(msg) => msg,
            Err(_) => return,
        };

        loop {
            match rx.recv_timeout(duration) {
                Ok(TimerMsg::Arm { generation: g }) => {
                    // Deadline extended; restart the countdown.
                    generation = g;
                }
                Err(RecvTimeoutError::Timeout) => {
                    inner.deadline_elapsed(generation);
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => return,
            }
        }
    }
}
