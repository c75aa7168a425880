//! Output sink shared between pump tasks and pollers.
//!
//! Pumps append lines as they arrive; a poller drains everything buffered so
//! far. Draining takes the whole buffer under the lock, so a drain racing an
//! append sees the line either in this drain or the next one, never both.
//!
//! Pumps write through a [`SinkWriter`]. Clearing the sink starts a new
//! generation, and writers from an earlier generation drop their lines.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

/// Which stream a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// Standard output of the child.
    Stdout,
    /// Standard error of the child.
    Stderr,
    /// Produced by the supervisor or runner itself.
    System,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Stdout => write!(f, "stdout"),
            Origin::Stderr => write!(f, "stderr"),
            Origin::System => write!(f, "system"),
        }
    }
}

/// Structural classification of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LineKind {
    /// The literal command text of an ad-hoc run.
    CommandEcho,
    /// A line of process output.
    Content,
    /// A process finished; the line carries its exit code.
    Completion,
    /// A launch or read failure.
    Error,
}

/// One immutable unit of output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputLine {
    pub text: String,
    pub origin: Origin,
    pub kind: LineKind,
    /// Set on `Completion` lines only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl OutputLine {
    /// A content line read from `origin`.
    pub fn content(origin: Origin, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            origin,
            kind: LineKind::Content,
            exit_code: None,
        }
    }

    /// Echo of the command an ad-hoc run is about to execute.
    pub fn command_echo(command: impl Into<String>) -> Self {
        Self {
            text: command.into(),
            origin: Origin::System,
            kind: LineKind::CommandEcho,
            exit_code: None,
        }
    }

    /// Completion marker carrying the exit code.
    pub fn completion(exit_code: i32) -> Self {
        Self {
            text: format!("[Command finished with exit code {}]", exit_code),
            origin: Origin::System,
            kind: LineKind::Completion,
            exit_code: Some(exit_code),
        }
    }

    /// Error line; replaces the completion marker when a run fails.
    pub fn error(origin: Origin, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            origin,
            kind: LineKind::Error,
            exit_code: None,
        }
    }
}

#[derive(Debug, Default)]
struct Buffer {
    lines: VecDeque<OutputLine>,
    /// Bumped by every clear; writers of older generations are cut off.
    generation: u64,
}

/// Growable multi-producer buffer of [`OutputLine`]s.
///
/// Cloning yields another handle to the same buffer.
#[derive(Debug, Clone, Default)]
pub struct OutputSink {
    buffer: Arc<Mutex<Buffer>>,
}

impl OutputSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a line. Never blocks beyond the short critical section.
    pub fn append(&self, line: OutputLine) {
        self.lock().lines.push_back(line);
    }

    /// Take every buffered line in arrival order, leaving the sink empty.
    pub fn drain_all(&self) -> Vec<OutputLine> {
        let taken = std::mem::take(&mut self.lock().lines);
        taken.into()
    }

    /// Discard everything buffered and start a new generation.
    ///
    /// Writers handed out before the clear stop delivering; the returned
    /// writer belongs to the new generation.
    pub fn clear(&self) -> SinkWriter {
        let mut buffer = self.lock();
        buffer.lines.clear();
        buffer.generation += 1;
        SinkWriter {
            sink: self.clone(),
            generation: buffer.generation,
        }
    }

    /// Writer bound to the current generation.
    pub fn writer(&self) -> SinkWriter {
        SinkWriter {
            sink: self.clone(),
            generation: self.lock().generation,
        }
    }

    /// Number of buffered lines.
    pub fn len(&self) -> usize {
        self.lock().lines.len()
    }

    /// Whether nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.lock().lines.is_empty()
    }

    // A pump that panicked mid-append leaves the deque itself intact.
    fn lock(&self) -> MutexGuard<'_, Buffer> {
        self.buffer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Appending handle tied to one generation of an [`OutputSink`].
#[derive(Debug, Clone)]
pub struct SinkWriter {
    sink: OutputSink,
    generation: u64,
}

impl SinkWriter {
    /// Append `line` unless the sink has been cleared since this writer was
    /// made. Returns whether the line was kept.
    pub fn append(&self, line: OutputLine) -> bool {
        let mut buffer = self.sink.lock();
        if buffer.generation != self.generation {
            return false;
        }
        buffer.lines.push_back(line);
        true
    }
}
