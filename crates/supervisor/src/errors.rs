//! Error types.

use miette::Diagnostic;
use thiserror::Error;

use crate::Signal;

/// Errors returned by the [`Supervisor`](crate::Supervisor).
///
/// Everything here is reported as a value: the supervisor never panics or aborts the host
/// application because a pipeline misbehaved.
#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum SupervisorError {
	/// A pipeline is already live (running or being stopped).
	///
	/// Returned by `start()`; the live pipeline is left untouched.
	#[error("a pipeline is already running (pid {pid})")]
	#[diagnostic(
		code(rtspcam::supervisor::already_running),
		help("stop the running pipeline before starting another")
	)]
	AlreadyRunning {
		/// The process id of the live pipeline.
		pid: u32,
	},

	/// Generic I/O error, with some context.
	///
	/// Launch failures come through here, with `about` set to what was being attempted.
	#[error("io({about}): {err}")]
	#[diagnostic(code(rtspcam::supervisor::io_error))]
	IoError {
		/// What it was about.
		about: &'static str,

		/// The I/O error which occurred.
		#[source]
		err: std::io::Error,
	},

	/// The process did not start correctly, or finished before we could even get its id.
	#[error("process was dead on arrival")]
	#[diagnostic(code(rtspcam::supervisor::process_doa))]
	ProcessDeadOnArrival,

	/// The signal can't be delivered on this platform.
	#[error("unsupported signal: {0}")]
	#[diagnostic(code(rtspcam::supervisor::unsupported_signal))]
	UnsupportedSignal(Signal),
}

/// Errors from the [`PrivilegedRunner`](crate::privileged::PrivilegedRunner).
///
/// A non-zero exit from the privileged command is _not_ an error: it's reported in the
/// [`PrivilegedOutput`](crate::privileged::PrivilegedOutput). These are only for the cases where
/// the command could not be run at all.
#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum PrivilegedError {
	/// Generic I/O error, with some context.
	#[error("io({about}): {err}")]
	#[diagnostic(code(rtspcam::privileged::io_error))]
	IoError {
		/// What it was about.
		about: &'static str,

		/// The I/O error which occurred.
		#[source]
		err: std::io::Error,
	},

	/// The worker task running the command panicked or was cancelled.
	#[error("privileged command worker failed: {0}")]
	#[diagnostic(code(rtspcam::privileged::worker))]
	Worker(#[source] tokio::task::JoinError),
}

/// Error when parsing a signal from string.
#[derive(Debug, Diagnostic, Error)]
#[error("invalid signal `{src}`: {err}")]
#[diagnostic(code(rtspcam::signal::parse))]
pub struct SignalParseError {
	// The string that was parsed.
	#[source_code]
	src: String,

	// The error that occurred.
	err: String,

	// The span of the source which is in error.
	#[label = "invalid signal"]
	span: (usize, usize),
}

impl SignalParseError {
	pub(crate) fn new(src: &str, err: &str) -> Self {
		Self {
			src: src.to_owned(),
			err: err.to_owned(),
			span: (0, src.len()),
		}
	}
}
