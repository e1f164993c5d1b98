//! External streaming recognizer driven over a child-process pipe.
//!
//! The recognizer is any command that reads raw 16-bit PCM from stdin and
//! emits JSON objects with a `text` field on stdout, one per line, as text
//! is finalized (a Vosk-style transcriber wrapped in a small script fits
//! this shape). Keeping recognition out of process means no model runtime
//! is linked into the gate and a crashed recognizer cannot take the audio
//! path down with it.

use crate::error::{EchogateError, Result};
use crate::gate::wake::{RecognizerResult, StreamingRecognizer};
use crossbeam_channel::{Receiver, Sender, TrySendError, bounded, unbounded};
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, Command, Stdio};
use std::thread;

/// Audio chunks queued for the writer thread before new ones are dropped.
const CHUNK_QUEUE: usize = 4;

/// Streaming recognizer over a spawned child process.
pub struct PipeRecognizer {
    child: Child,
    chunk_tx: Option<Sender<Vec<u8>>>,
    lines: Receiver<String>,
    pending: Option<String>,
}

impl PipeRecognizer {
    /// Spawns the recognizer command (program + args).
    pub fn spawn(command: &[String]) -> Result<Self> {
        let Some((program, args)) = command.split_first() else {
            return Err(EchogateError::Recognition {
                message: "no recognizer command configured".to_string(),
            });
        };

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| EchogateError::Recognition {
                message: format!("Failed to spawn recognizer '{}': {}", program, e),
            })?;

        let mut stdin = child.stdin.take().ok_or_else(|| EchogateError::Recognition {
            message: "recognizer has no stdin".to_string(),
        })?;
        let stdout = child.stdout.take().ok_or_else(|| EchogateError::Recognition {
            message: "recognizer has no stdout".to_string(),
        })?;

        // Writer thread: owns the child's stdin so a recognizer that
        // stops reading stalls this thread, never the frame loop.
        // Dropping the sender closes stdin and the thread exits.
        let (chunk_tx, chunk_rx) = bounded::<Vec<u8>>(CHUNK_QUEUE);
        thread::spawn(move || {
            while let Ok(chunk) = chunk_rx.recv() {
                if stdin.write_all(&chunk).and_then(|()| stdin.flush()).is_err() {
                    break;
                }
            }
        });

        // Reader thread: child stdout lines flow into a channel the audio
        // loop can drain without blocking. Dies with the child.
        let (tx, rx) = unbounded();
        thread::spawn(move || {
            let reader = BufReader::new(stdout);
            for line in reader.lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
        });

        Ok(Self {
            child,
            chunk_tx: Some(chunk_tx),
            lines: rx,
            pending: None,
        })
    }

    /// Pulls any finalized text lines the child has emitted so far.
    fn drain_lines(&mut self) {
        while let Ok(line) = self.lines.try_recv() {
            // Non-JSON lines and partial-result objects are skipped.
            if let Ok(result) = RecognizerResult::from_json(&line)
                && !result.text.trim().is_empty()
            {
                self.pending = Some(result.text);
            }
        }
    }
}

impl StreamingRecognizer for PipeRecognizer {
    fn accept_chunk(&mut self, pcm16: &[u8]) -> Result<bool> {
        let tx = self.chunk_tx.as_ref().ok_or_else(|| EchogateError::Recognition {
            message: "recognizer stdin closed".to_string(),
        })?;

        // A full queue means the recognizer has fallen behind; the chunk
        // is dropped so the frame loop never waits on the pipe.
        match tx.try_send(pcm16.to_vec()) {
            Ok(()) | Err(TrySendError::Full(_)) => {}
            Err(TrySendError::Disconnected(_)) => {
                return Err(EchogateError::Recognition {
                    message: "recognizer stopped accepting audio".to_string(),
                });
            }
        }

        self.drain_lines();
        Ok(self.pending.is_some())
    }

    fn result(&mut self) -> Result<RecognizerResult> {
        Ok(RecognizerResult {
            text: self.pending.take().unwrap_or_default(),
        })
    }

    fn reset(&mut self) {
        self.pending = None;
        while self.lines.try_recv().is_ok() {}
    }
}

impl Drop for PipeRecognizer {
    fn drop(&mut self) {
        // Unblocks the writer thread, which then closes the child's stdin.
        self.chunk_tx.take();
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
