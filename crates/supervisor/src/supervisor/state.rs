use std::{sync::Arc, time::Instant};

use tokio::sync::{mpsc::UnboundedSender, watch};

use crate::{command::Command, events::ProcessEnd};

use super::task::Intervention;

/// The supervisor's lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SupervisorState {
	/// No pipeline.
	Idle,

	/// A pipeline is live.
	Running,

	/// A pipeline is live and has been asked to stop.
	Stopping,
}

/// Everything the supervisor knows about the live pipeline.
///
/// Only ever held inside [`Slot`]; never handed out.
#[derive(Debug)]
pub(crate) struct ChildHandle {
	/// Distinguishes runs, so a run's task can only ever clear its own handle.
	pub generation: u64,

	/// Also the process group id.
	pub pid: u32,
	pub command: Arc<Command>,
	pub started: Instant,
	pub stopping: bool,
	pub interventions: UnboundedSender<Intervention>,
	pub ended: watch::Receiver<Option<ProcessEnd>>,
}

/// The supervisor's mutable state: zero or one live pipeline.
#[derive(Debug, Default)]
pub(crate) struct Slot {
	pub live: Option<ChildHandle>,
	next_generation: u64,
}

impl Slot {
	pub fn state(&self) -> SupervisorState {
		match &self.live {
			None => SupervisorState::Idle,
			Some(handle) if handle.stopping => SupervisorState::Stopping,
			Some(_) => SupervisorState::Running,
		}
	}

	pub fn next_generation(&mut self) -> u64 {
		self.next_generation += 1;
		self.next_generation
	}

	/// Release the handle if it still belongs to `generation`.
	///
	/// This is the only way a handle leaves the slot, so whoever gets `Some` here owns the run's
	/// termination.
	pub fn take_if(&mut self, generation: u64) -> Option<ChildHandle> {
		if self
			.live
			.as_ref()
			.is_some_and(|handle| handle.generation == generation)
		{
			self.live.take()
		} else {
			None
		}
	}
}
