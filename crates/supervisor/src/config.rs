//! Configuration for the [`Supervisor`](crate::Supervisor).

use std::time::Duration;

use tracing::debug;

use crate::Signal;

/// How long a pipeline gets to exit after the graceful signal.
pub const DEFAULT_GRACE: Duration = Duration::from_secs(3);

/// How often to complain while waiting for a killed pipeline to be reaped.
pub const DEFAULT_SLOW_KILL_WARNING: Duration = Duration::from_secs(5);

/// Configuration for the [`Supervisor`](crate::Supervisor).
///
/// Fields are public, but the methods are preferred: each calls `debug!` on the new value,
/// providing a quick insight into what the application sets.
///
/// The configuration is read once when the supervisor is created.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub struct SupervisorConfig {
	/// The signal sent to the process group to ask it to stop.
	///
	/// Defaults to [`Signal::Interrupt`].
	pub stop_signal: Signal,

	/// How long to wait after `stop_signal` before escalating to `SIGKILL`.
	///
	/// Defaults to [`DEFAULT_GRACE`]. A zero grace period still sends the stop signal, but kills
	/// immediately after.
	pub grace: Duration,

	/// After escalating, a warning is logged every time this much time passes without the process
	/// being reaped.
	///
	/// Defaults to [`DEFAULT_SLOW_KILL_WARNING`].
	pub slow_kill_warning: Duration,

	/// Bound on the number of entries retained in the log.
	///
	/// Defaults to unbounded.
	pub log_capacity: Option<usize>,
}

impl Default for SupervisorConfig {
	fn default() -> Self {
		Self {
			stop_signal: Signal::Interrupt,
			grace: DEFAULT_GRACE,
			slow_kill_warning: DEFAULT_SLOW_KILL_WARNING,
			log_capacity: None,
		}
	}
}

impl SupervisorConfig {
	/// Set the graceful stop signal.
	pub fn stop_signal(&mut self, signal: Signal) -> &mut Self {
		debug!(?signal, "SupervisorConfig: stop_signal");
		self.stop_signal = signal;
		self
	}

	/// Set the grace period.
	pub fn grace(&mut self, grace: Duration) -> &mut Self {
		debug!(?grace, "SupervisorConfig: grace");
		self.grace = grace;
		self
	}

	/// Set the slow-kill warning interval.
	///
	/// Zero is bumped to one millisecond.
	pub fn slow_kill_warning(&mut self, interval: Duration) -> &mut Self {
		let interval = interval.max(Duration::from_millis(1));
		debug!(?interval, "SupervisorConfig: slow_kill_warning");
		self.slow_kill_warning = interval;
		self
	}

	/// Bound the log to the newest `capacity` entries.
	pub fn log_capacity(&mut self, capacity: Option<usize>) -> &mut Self {
		debug!(?capacity, "SupervisorConfig: log_capacity");
		self.log_capacity = capacity;
		self
	}
}
