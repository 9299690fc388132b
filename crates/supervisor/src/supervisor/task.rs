use std::{os::fd::OwnedFd, process::Stdio, sync::Arc, time::Duration};

use nix::{errno::Errno, sys::signal::killpg, unistd::Pid};
use process_wrap::tokio::{KillOnDrop, ProcessGroup, TokioChildWrapper, TokioCommandWrap};
use tokio::{
	select,
	sync::{mpsc::UnboundedReceiver, watch},
	time::{sleep_until, timeout, Instant},
};
use tracing::{debug, error, info, trace, warn, Instrument, Span};

use crate::{
	command::Command,
	errors::SupervisorError,
	events::{Event, ProcessEnd},
	pipe, Signal,
};

use super::Inner;

/// How long to keep reading output after the process group is reaped.
///
/// Output can only outlive the group if something escaped it (daemonised, or put itself in its
/// own group) while keeping the pipe open; then we stop waiting for end-of-file.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// An order to the task supervising a pipeline.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Intervention {
	/// Send `signal` to the group, then `SIGKILL` if it's still alive after `grace`.
	Stop {
		signal: Signal,
		grace: Duration,
		slow_kill_warning: Duration,
	},
}

/// A freshly spawned pipeline, not yet supervised.
pub(crate) struct Spawned {
	pub child: Box<dyn TokioChildWrapper>,
	pub pid: u32,
	pub pgid: Pid,
	pub output: OwnedFd,
}

/// Spawn `command` as the leader of a new process group, its stdout and stderr merged.
pub(crate) fn spawn(command: &Command) -> Result<Spawned, SupervisorError> {
	let output = pipe::output_pipe().map_err(|err| SupervisorError::IoError {
		about: "creating output pipe",
		err,
	})?;

	let mut spawnable = command.to_spawnable();
	spawnable
		.stdin(Stdio::null())
		.stdout(output.stdout)
		.stderr(output.stderr);

	let child = {
		// the wrapper holds our copies of the pipe's write end: it must be gone before reading
		let mut wrapped = TokioCommandWrap::from(spawnable);
		wrapped.wrap(ProcessGroup::leader()).wrap(KillOnDrop);
		info!(%command, "spawning pipeline");
		wrapped.spawn().map_err(|err| SupervisorError::IoError {
			about: "spawning pipeline process group",
			err,
		})?
	};

	let pid = child.id().ok_or(SupervisorError::ProcessDeadOnArrival)?;
	let pgid = i32::try_from(pid)
		.map(Pid::from_raw)
		.map_err(|_| SupervisorError::ProcessDeadOnArrival)?;
	info!(pgid=%pid, "process group spawned");

	Ok(Spawned {
		child,
		pid,
		pgid,
		output: output.reader,
	})
}

/// Deliver `signal` to every process in the group.
///
/// A group that's already gone is not an error: the exit is about to be picked up anyway.
fn signal_group(pgid: Pid, signal: Signal) -> Result<(), SupervisorError> {
	let sig = signal
		.to_nix()
		.ok_or(SupervisorError::UnsupportedSignal(signal))?;
	debug!(%pgid, %signal, "signalling process group");
	match killpg(pgid, sig) {
		Ok(()) => Ok(()),
		Err(Errno::ESRCH) => {
			trace!(%pgid, "process group already gone");
			Ok(())
		}
		Err(errno) => Err(SupervisorError::IoError {
			about: "signalling process group",
			err: errno.into(),
		}),
	}
}

/// Supervise one run of a pipeline, from spawn to release.
///
/// This task is the only one which waits on the child, so it alone decides when the run is over.
/// Output is drained on a subtask and fully forwarded before the run is released.
pub(crate) async fn supervise(
	inner: Arc<Inner>,
	generation: u64,
	spawned: Spawned,
	mut interventions: UnboundedReceiver<Intervention>,
	ended: watch::Sender<Option<ProcessEnd>>,
) {
	let Spawned {
		mut child,
		pid,
		pgid,
		output,
	} = spawned;
	let sink = inner.sink.clone();

	let mut drain = tokio::spawn(
		{
			let sink = sink.clone();
			async move { pipe::forward_lines(output, |line| sink.line(line)).await }
		}
		.instrument(Span::current()),
	);

	let report = |err: SupervisorError| {
		error!(%err, "while supervising pipeline");
		sink.event(Event::Error {
			reason: err.to_string(),
		});
	};

	let mut stopping = false;
	let mut kill_at: Option<Instant> = None;
	let mut warn_at: Option<Instant> = None;
	let mut slow_kill_warning = Duration::MAX;

	let status = loop {
		select! {
			status = Box::into_pin(child.wait()) => break status,
			Some(intervention) = interventions.recv() => match intervention {
				Intervention::Stop { signal, grace, slow_kill_warning: interval } => {
					if stopping {
						trace!("already stopping");
						continue;
					}

					stopping = true;
					sink.event(Event::Stopping { signal });
					if let Err(err) = signal_group(pgid, signal) {
						report(err);
					}
					slow_kill_warning = interval;
					kill_at = Instant::now().checked_add(grace);
				}
			},
			() = sleep_until(kill_at.unwrap_or_else(Instant::now)), if kill_at.is_some() => {
				kill_at = None;
				warn!(%pid, "pipeline did not exit within the grace period, killing");
				sink.event(Event::Escalated);
				if let Err(err) = signal_group(pgid, Signal::ForceStop) {
					report(err);
				}
				warn_at = Instant::now().checked_add(slow_kill_warning);
			}
			() = sleep_until(warn_at.unwrap_or_else(Instant::now)), if warn_at.is_some() => {
				warn!(%pid, waited=?slow_kill_warning, "killed pipeline has still not been reaped");
				warn_at = Instant::now().checked_add(slow_kill_warning);
			}
		}
	};

	let status = match status {
		Ok(status) => ProcessEnd::from(status),
		Err(err) => {
			report(SupervisorError::IoError {
				about: "waiting on pipeline",
				err,
			});
			ProcessEnd::Failed
		}
	};
	debug!(%pid, ?status, "pipeline exited");

	match timeout(DRAIN_TIMEOUT, &mut drain).await {
		Ok(Ok(Ok(()))) => {}
		Ok(Ok(Err(err))) => report(SupervisorError::IoError {
			about: "reading pipeline output",
			err,
		}),
		Ok(Err(err)) => error!(%err, "output reader task failed"),
		Err(_) => {
			warn!(
				?DRAIN_TIMEOUT,
				"output still open after the process group exited, detaching"
			);
			drain.abort();
		}
	}

	drop(child);
	inner.release(generation, status);
	ended.send_replace(Some(status));
}
