//! Lifecycle events published alongside the pipeline's output.

use std::{
	fmt,
	num::{NonZeroI32, NonZeroI64},
	process::ExitStatus,
};

use crate::Signal;

/// The end status of a process.
///
/// This is a sort-of equivalent of the [`std::process::ExitStatus`] type, structured so it can be
/// matched on and carried around in events.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ProcessEnd {
	/// The process ended successfully, with exit status = 0.
	Success,

	/// The process exited with a non-zero exit status.
	ExitError(NonZeroI64),

	/// The process exited due to a signal.
	ExitSignal(Signal),

	/// The process was stopped (but not terminated) (`libc::WIFSTOPPED`).
	ExitStop(NonZeroI32),

	/// The process was continued (`libc::WIFCONTINUED`).
	Continued,

	/// The process never ran: it could not be spawned, or waiting on it failed.
	Failed,
}

impl ProcessEnd {
	/// Whether this is a clean exit.
	#[must_use]
	pub const fn is_success(self) -> bool {
		matches!(self, Self::Success)
	}

	/// An exit code suitable for passing on to the host process.
	///
	/// Signal deaths map to `128 + signo` like shells do.
	#[must_use]
	pub fn code(self) -> i32 {
		match self {
			Self::Success | Self::Continued => 0,
			Self::ExitError(code) => i32::try_from(code.get()).unwrap_or(1),
			Self::ExitSignal(sig) => 128 + sig.to_nix().map_or(0, |s| s as i32),
			Self::ExitStop(_) | Self::Failed => 1,
		}
	}
}

impl From<ExitStatus> for ProcessEnd {
	fn from(es: ExitStatus) -> Self {
		use std::os::unix::process::ExitStatusExt;

		match (es.code(), es.signal(), es.stopped_signal()) {
			(Some(code), _, _) => {
				NonZeroI64::try_from(i64::from(code)).map_or(Self::Success, Self::ExitError)
			}
			(None, Some(_), Some(stopsig)) => {
				NonZeroI32::try_from(stopsig).map_or(Self::Success, Self::ExitStop)
			}
			(None, Some(_), _) if es.continued() => Self::Continued,
			(None, Some(signal), _) => Self::ExitSignal(signal.into()),
			(None, None, _) => Self::Success,
		}
	}
}

impl fmt::Display for ProcessEnd {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Success => f.write_str("exited successfully"),
			Self::ExitError(code) => write!(f, "exited with status {code}"),
			Self::ExitSignal(sig) => write!(f, "killed by {sig}"),
			Self::ExitStop(sig) => write!(f, "stopped by signal {sig}"),
			Self::Continued => f.write_str("continued"),
			Self::Failed => f.write_str("failed to run"),
		}
	}
}

/// A discrete change in the pipeline's lifecycle.
///
/// These are interleaved with output lines in the [`LogSink`](crate::LogSink), so their
/// position relative to the output is meaningful: `Started` comes before the first line of a run
/// and `Terminated` after its last.
///
/// The `Display` form is what a human-facing log shows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
	/// A pipeline process group was spawned.
	Started {
		/// The process id, which is also the process group id.
		pid: u32,

		/// The command line, for display.
		command: String,
	},

	/// A stop was requested and the graceful signal delivered.
	Stopping {
		/// The signal sent to the process group.
		signal: Signal,
	},

	/// The grace period ran out and the process group was sent `SIGKILL`.
	Escalated,

	/// The pipeline is gone and the supervisor is idle again.
	///
	/// Exactly one of these is emitted per run, whichever way the run ended.
	Terminated {
		/// How it ended.
		status: ProcessEnd,
	},

	/// Something went wrong that the caller should see.
	///
	/// The reason is flattened to a string at the error point.
	Error {
		/// Human-readable reason.
		reason: String,
	},
}

impl fmt::Display for Event {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Started { command, .. } => write!(f, "$ {command}"),
			Self::Stopping { signal } => write!(f, "--- stopping pipeline ({signal}) ---"),
			Self::Escalated => f.write_str("Process did not exit, sending SIGKILL..."),
			Self::Terminated { .. } => f.write_str("--- pipeline terminated ---"),
			Self::Error { reason } => write!(f, "Error: {reason}"),
		}
	}
}
