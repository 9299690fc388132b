//! The pipeline supervisor.

use std::{
	sync::{Arc, Mutex, MutexGuard, PoisonError},
	time::Instant,
};

use tokio::{
	runtime::Handle,
	sync::{mpsc, watch},
};
use tracing::{debug, error, info_span, warn, Instrument};

use crate::{
	command::Command,
	config::SupervisorConfig,
	errors::SupervisorError,
	events::{Event, ProcessEnd},
	sink::LogSink,
};

#[doc(inline)]
pub use self::state::SupervisorState;
use self::{
	state::{ChildHandle, Slot},
	task::Intervention,
};

mod state;
mod task;

/// Supervises at most one pipeline process at a time.
///
/// Call [`start`](Self::start) with a command to spawn it as the leader of a new process group,
/// and [`stop`](Self::stop) to end it: the group is sent the graceful stop signal (`SIGINT` by
/// default), given a grace period (3 seconds by default), and then sent `SIGKILL`. The pipeline
/// may also exit on its own at any time, which the supervisor notices and reports without anyone
/// calling `stop`.
///
/// Everything the pipeline writes to stdout or stderr goes into the [`LogSink`], one entry per
/// line, in order, interleaved with lifecycle [`Event`]s: `Started` before a run's first line,
/// `Terminated` after its last. Each run produces exactly one `Terminated`.
///
/// This is cheaply cloneable; all clones control the same pipeline. It is created on a Tokio
/// runtime and keeps a handle to it, so `start` and `stop` may be called from any thread.
///
/// # Shutting down
///
/// The application must `stop()` the supervisor before exiting. If it doesn't, the process group
/// is killed when the runtime shuts down, without the grace period.
#[derive(Clone, Debug)]
pub struct Supervisor {
	inner: Arc<Inner>,
}

#[derive(Debug)]
pub(crate) struct Inner {
	config: SupervisorConfig,
	runtime: Handle,
	pub(crate) sink: LogSink,
	slot: Mutex<Slot>,
	state: watch::Sender<SupervisorState>,
}

impl Inner {
	fn slot(&self) -> MutexGuard<'_, Slot> {
		// the slot is only ever changed in single assignments, so it can't be left half-updated
		self.slot.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// End a run: release its handle, go idle, and announce the termination.
	///
	/// Does nothing if the handle was already released, so a run's termination is announced at
	/// most once however many paths lead here.
	pub(crate) fn release(&self, generation: u64, status: ProcessEnd) {
		let mut slot = self.slot();
		let Some(handle) = slot.take_if(generation) else {
			warn!(generation, "run already released");
			return;
		};

		debug!(
			pid = handle.pid,
			command = %handle.command,
			ran_for = ?handle.started.elapsed(),
			?status,
			"releasing pipeline"
		);
		self.sink.event(Event::Terminated { status });
		self.state.send_replace(slot.state());
	}
}

impl Supervisor {
	/// Create an idle supervisor.
	///
	/// # Panics
	///
	/// Panics if not called from within a Tokio runtime.
	#[must_use]
	pub fn new(config: SupervisorConfig) -> Self {
		let sink = config
			.log_capacity
			.map_or_else(LogSink::new, LogSink::with_capacity);
		Self::with_sink(config, sink)
	}

	/// Create an idle supervisor writing to an existing log.
	///
	/// This lets several producers (e.g. device registration and the pipeline) share one log.
	///
	/// # Panics
	///
	/// Panics if not called from within a Tokio runtime.
	#[must_use]
	pub fn with_sink(config: SupervisorConfig, sink: LogSink) -> Self {
		debug!(?config, "creating supervisor");
		let (state, _) = watch::channel(SupervisorState::Idle);
		Self {
			inner: Arc::new(Inner {
				config,
				runtime: Handle::current(),
				sink,
				slot: Mutex::new(Slot::default()),
				state,
			}),
		}
	}

	/// The log this supervisor writes to.
	#[must_use]
	pub fn sink(&self) -> &LogSink {
		&self.inner.sink
	}

	/// The current state.
	#[must_use]
	pub fn state(&self) -> SupervisorState {
		self.inner.slot().state()
	}

	/// Watch state changes.
	#[must_use]
	pub fn subscribe_state(&self) -> watch::Receiver<SupervisorState> {
		self.inner.state.subscribe()
	}

	/// The process (and process group) id of the live pipeline, if any.
	#[must_use]
	pub fn pid(&self) -> Option<u32> {
		self.inner.slot().live.as_ref().map(|handle| handle.pid)
	}

	/// The command of the live pipeline, if any.
	#[must_use]
	pub fn command(&self) -> Option<Arc<Command>> {
		self.inner
			.slot()
			.live
			.as_ref()
			.map(|handle| handle.command.clone())
	}

	/// Start a pipeline.
	///
	/// If a pipeline is already live (running or stopping), this returns
	/// [`SupervisorError::AlreadyRunning`] and changes nothing.
	///
	/// Otherwise the command is spawned in a new process group and its output starts flowing to
	/// the log. If spawning fails, the failure is logged as an `Error` event followed by a
	/// `Terminated` event with [`ProcessEnd::Failed`], the supervisor stays idle, and the error is
	/// also returned.
	///
	/// Returns the pid of the new process group leader. This doesn't wait for anything.
	pub fn start(&self, command: Command) -> Result<u32, SupervisorError> {
		let command = Arc::new(command);
		let mut slot = self.inner.slot();
		if let Some(handle) = &slot.live {
			debug!(pid = handle.pid, %command, "refusing to start: already running");
			return Err(SupervisorError::AlreadyRunning { pid: handle.pid });
		}

		let _runtime = self.inner.runtime.enter();
		let spawned = match task::spawn(&command) {
			Ok(spawned) => spawned,
			Err(err) => {
				error!(%err, %command, "while spawning pipeline");
				self.inner.sink.event(Event::Error {
					reason: err.to_string(),
				});
				self.inner.sink.event(Event::Terminated {
					status: ProcessEnd::Failed,
				});
				return Err(err);
			}
		};

		let pid = spawned.pid;
		let generation = slot.next_generation();
		let (interventions, receiver) = mpsc::unbounded_channel();
		let (ended, ended_receiver) = watch::channel(None);

		self.inner.sink.event(Event::Started {
			pid,
			command: command.to_string(),
		});
		slot.live = Some(ChildHandle {
			generation,
			pid,
			command,
			started: Instant::now(),
			stopping: false,
			interventions,
			ended: ended_receiver,
		});
		self.inner.state.send_replace(slot.state());
		drop(slot);

		self.inner.runtime.spawn(
			task::supervise(self.inner.clone(), generation, spawned, receiver, ended)
				.instrument(info_span!("pipeline", pid, generation)),
		);

		Ok(pid)
	}

	/// Stop the pipeline.
	///
	/// Sends the stop signal to the process group, waits out the grace period, and then kills the
	/// group if it's still there. Returns once the pipeline is gone and the supervisor is idle,
	/// with how it ended.
	///
	/// Returns `None` immediately if there's nothing to stop, or if a stop is already underway
	/// (use [`wait`](Self::wait) to wait on that one).
	///
	/// Dropping the returned future doesn't cancel the stop: the escalation is driven by the
	/// pipeline's own task.
	pub async fn stop(&self) -> Option<ProcessEnd> {
		let mut ended = {
			let mut slot = self.inner.slot();
			let handle = match slot.live.as_mut() {
				None => {
					debug!("stop: nothing running");
					return None;
				}
				Some(handle) if handle.stopping => {
					debug!(pid = handle.pid, "stop: already stopping");
					return None;
				}
				Some(handle) => handle,
			};

			let SupervisorConfig {
				stop_signal,
				grace,
				slow_kill_warning,
				..
			} = self.inner.config;
			debug!(pid = handle.pid, %stop_signal, ?grace, "stopping pipeline");
			handle.stopping = true;
			if handle
				.interventions
				.send(Intervention::Stop {
					signal: stop_signal,
					grace,
					slow_kill_warning,
				})
				.is_err()
			{
				// the task has exited the loop and is about to release
				debug!("stop: pipeline already exiting");
			}

			let ended = handle.ended.clone();
			self.inner.state.send_replace(slot.state());
			ended
		};

		wait_ended(&mut ended).await
	}

	/// Wait for the live pipeline to end, whichever way it does.
	///
	/// Returns `None` immediately if there's nothing running.
	pub async fn wait(&self) -> Option<ProcessEnd> {
		let ended = self
			.inner
			.slot()
			.live
			.as_ref()
			.map(|handle| handle.ended.clone());
		match ended {
			Some(mut ended) => wait_ended(&mut ended).await,
			None => None,
		}
	}
}

async fn wait_ended(ended: &mut watch::Receiver<Option<ProcessEnd>>) -> Option<ProcessEnd> {
	match ended.wait_for(Option::is_some).await {
		Ok(status) => *status,
		Err(_) => {
			error!("pipeline task went away without reporting an end");
			None
		}
	}
}
