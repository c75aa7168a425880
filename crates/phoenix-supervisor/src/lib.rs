//! Project Phoenix supervision core.
//!
//! Launches, observes and tears down one externally managed VM process, and
//! runs fire-and-forget shell commands, while callers poll for output without
//! ever blocking on the processes themselves.
//!
//! ## Components
//!
//! - **[`OutputSink`]**: growable multi-producer buffer of [`OutputLine`]s;
//!   `append` never blocks, `drain_all` empties it.
//! - **[`Supervisor`]**: owns the single managed process. Two pump tasks feed
//!   its stdout/stderr into a sink and a reaper task performs the terminal
//!   lifecycle transition.
//! - **[`AdHocRunner`]**: one task per shell command, writing an echo line,
//!   merged output and a completion (or error) line into its own sink.
//! - **[`LifecycleState`]**: the status callers observe, only ever changed
//!   under the supervisor's single lock.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use phoenix_supervisor::{Supervisor, SupervisorConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let supervisor = Supervisor::new(SupervisorConfig::default());
//!     supervisor.start("qemu-system-x86_64", ["-m", "2048", "-vnc", ":0"])?;
//!
//!     for line in supervisor.drain_logs() {
//!         println!("[{}] {}", line.origin, line.text);
//!     }
//!
//!     supervisor.stop().await?;
//!     Ok(())
//! }
//! ```

mod config;
mod error;
mod pump;
mod runner;
mod sink;
mod state;
mod supervisor;

pub use config::SupervisorConfig;
pub use error::{SupervisorError, SupervisorResult};
pub use runner::{AdHocRunner, RunHandle, RunId, RunOutcome};
pub use sink::{LineKind, Origin, OutputLine, OutputSink, SinkWriter};
pub use state::LifecycleState;
pub use supervisor::{ProcessExit, Started, StopOutcome, Supervisor, SupervisorStatus};
