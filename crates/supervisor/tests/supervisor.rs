use std::{
	num::NonZeroI64,
	time::{Duration, Instant},
};

use rtspcam_supervisor::{
	command::Command, errors::SupervisorError, Event, LogCursor, LogEntry, ProcessEnd, Signal,
	Supervisor, SupervisorConfig, SupervisorState,
};
use tokio::time::timeout;

const PATIENCE: Duration = Duration::from_secs(10);

fn sleeper() -> Command {
	Command::Exec {
		prog: "sleep".into(),
		args: vec!["30".into()],
	}
}

async fn until_terminated(cursor: &mut LogCursor) -> Vec<LogEntry> {
	let mut seen = Vec::new();
	timeout(PATIENCE, async {
		loop {
			for entry in cursor.next_batch().await {
				let done = matches!(entry, LogEntry::Event(Event::Terminated { .. }));
				seen.push(entry);
				if done {
					return;
				}
			}
		}
	})
	.await
	.expect("run never terminated");
	seen
}

async fn until_line(cursor: &mut LogCursor, wanted: &str) {
	timeout(PATIENCE, async {
		loop {
			if cursor
				.next_batch()
				.await
				.iter()
				.any(|entry| entry.as_line() == Some(wanted))
			{
				return;
			}
		}
	})
	.await
	.expect("line never showed up");
}

fn lines(entries: &[LogEntry]) -> Vec<&str> {
	entries.iter().filter_map(LogEntry::as_line).collect()
}

fn terminations(entries: &[LogEntry]) -> Vec<ProcessEnd> {
	entries
		.iter()
		.filter_map(|entry| match entry.as_event() {
			Some(Event::Terminated { status }) => Some(*status),
			_ => None,
		})
		.collect()
}

#[tokio::test]
async fn lines_arrive_in_order_despite_rejected_start() {
	let supervisor = Supervisor::new(SupervisorConfig::default());
	let mut cursor = supervisor.sink().cursor();

	let pid = supervisor
		.start(Command::sh("printf 'A\\nB\\nC\\n'; sleep 0.3"))
		.unwrap();
	let rejected = supervisor.start(Command::sh("echo intruder"));
	assert!(matches!(
		rejected,
		Err(SupervisorError::AlreadyRunning { pid: live }) if live == pid
	));

	let entries = until_terminated(&mut cursor).await;
	assert_eq!(lines(&entries), ["A", "B", "C"]);
	assert!(matches!(
		entries.first(),
		Some(LogEntry::Event(Event::Started { pid: started, .. })) if *started == pid
	));
	assert!(!entries
		.iter()
		.any(|entry| matches!(entry.as_event(), Some(Event::Error { .. }))));
}

#[tokio::test]
async fn natural_exit_terminates_once_without_stop() {
	let supervisor = Supervisor::new(SupervisorConfig::default());
	let mut cursor = supervisor.sink().cursor();

	supervisor.start(Command::sh("echo bye; exit 3")).unwrap();
	let status = timeout(PATIENCE, supervisor.wait()).await.unwrap();
	assert_eq!(status, Some(ProcessEnd::ExitError(NonZeroI64::new(3).unwrap())));
	assert_eq!(supervisor.state(), SupervisorState::Idle);
	assert_eq!(supervisor.pid(), None);

	let entries = until_terminated(&mut cursor).await;
	assert_eq!(lines(&entries), ["bye"]);
	assert_eq!(terminations(&supervisor.sink().snapshot()).len(), 1);

	assert_eq!(supervisor.stop().await, None);
}

#[tokio::test]
async fn start_while_running_leaves_child_alone() {
	let supervisor = Supervisor::new(SupervisorConfig::default());

	let pid = supervisor.start(sleeper()).unwrap();
	for _ in 0..3 {
		match supervisor.start(sleeper()) {
			Err(SupervisorError::AlreadyRunning { pid: live }) => assert_eq!(live, pid),
			other => panic!("expected AlreadyRunning, got {other:?}"),
		}
	}

	assert_eq!(supervisor.pid(), Some(pid));
	assert_eq!(supervisor.state(), SupervisorState::Running);
	assert_eq!(supervisor.command().as_deref(), Some(&sleeper()));

	supervisor.stop().await;
	let started = supervisor
		.sink()
		.snapshot()
		.iter()
		.filter(|entry| matches!(entry.as_event(), Some(Event::Started { .. })))
		.count();
	assert_eq!(started, 1);
}

#[tokio::test]
async fn graceful_stop_interrupts_the_group() {
	let supervisor = Supervisor::new(SupervisorConfig::default());
	supervisor.start(sleeper()).unwrap();

	let status = timeout(PATIENCE, supervisor.stop()).await.unwrap();
	assert_eq!(status, Some(ProcessEnd::ExitSignal(Signal::Interrupt)));
	assert_eq!(supervisor.state(), SupervisorState::Idle);

	let entries = supervisor.sink().snapshot();
	assert!(entries.iter().any(|entry| matches!(
		entry.as_event(),
		Some(Event::Stopping {
			signal: Signal::Interrupt
		})
	)));
	assert!(!entries
		.iter()
		.any(|entry| matches!(entry.as_event(), Some(Event::Escalated))));
}

#[tokio::test]
async fn double_stop_terminates_once() {
	let supervisor = Supervisor::new(SupervisorConfig::default());
	supervisor.start(sleeper()).unwrap();

	let (first, second) = tokio::join!(supervisor.stop(), supervisor.stop());
	assert!(first.is_some() ^ second.is_some());
	assert_eq!(supervisor.stop().await, None);

	assert_eq!(terminations(&supervisor.sink().snapshot()).len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_racing_natural_exit_terminates_once() {
	const RUNS: usize = 100;

	let supervisor = Supervisor::new(SupervisorConfig::default());
	for _ in 0..RUNS {
		supervisor.start(Command::sh("exit 0")).unwrap();
		let (stopped, waited) = timeout(PATIENCE, async {
			tokio::join!(supervisor.stop(), supervisor.wait())
		})
		.await
		.unwrap();

		for status in [stopped, waited].into_iter().flatten() {
			assert!(
				matches!(
					status,
					ProcessEnd::Success | ProcessEnd::ExitSignal(Signal::Interrupt)
				),
				"unexpected end: {status:?}"
			);
		}
		assert_eq!(supervisor.state(), SupervisorState::Idle);
		assert_eq!(supervisor.pid(), None);
	}

	let entries = supervisor.sink().snapshot();
	let started = entries
		.iter()
		.filter(|entry| matches!(entry.as_event(), Some(Event::Started { .. })))
		.count();
	assert_eq!(started, RUNS);
	assert_eq!(terminations(&entries).len(), RUNS);

	// each run's Terminated comes before the next run's Started
	let mut live = false;
	for entry in &entries {
		match entry.as_event() {
			Some(Event::Started { .. }) => {
				assert!(!live, "started while another run was live");
				live = true;
			}
			Some(Event::Terminated { .. }) => {
				assert!(live, "terminated without a live run");
				live = false;
			}
			_ => {}
		}
	}
	assert!(!live);
}

#[tokio::test]
async fn ignored_interrupt_escalates_after_grace() {
	let grace = Duration::from_millis(500);
	let mut config = SupervisorConfig::default();
	config.grace(grace);
	let supervisor = Supervisor::new(config);
	let mut cursor = supervisor.sink().cursor();

	supervisor
		.start(Command::sh("trap '' INT; echo ready; sleep 30"))
		.unwrap();
	until_line(&mut cursor, "ready").await;

	let begun = Instant::now();
	let status = timeout(PATIENCE, supervisor.stop()).await.unwrap();
	assert!(begun.elapsed() >= grace);
	assert_eq!(status, Some(ProcessEnd::ExitSignal(Signal::ForceStop)));

	let entries = until_terminated(&mut cursor).await;
	let events: Vec<_> = entries.iter().filter_map(LogEntry::as_event).collect();
	assert!(matches!(
		events.as_slice(),
		[
			Event::Stopping { .. },
			Event::Escalated,
			Event::Terminated {
				status: ProcessEnd::ExitSignal(Signal::ForceStop)
			}
		]
	));
}

#[tokio::test]
async fn stop_signal_is_configurable() {
	let mut config = SupervisorConfig::default();
	config.stop_signal(Signal::Terminate);
	let supervisor = Supervisor::new(config);
	supervisor.start(sleeper()).unwrap();

	let status = timeout(PATIENCE, supervisor.stop()).await.unwrap();
	assert_eq!(status, Some(ProcessEnd::ExitSignal(Signal::Terminate)));
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn stop_reaches_forked_children() {
	fn gone(pid: &str) -> bool {
		// reparented zombies may linger if nothing reaps them; they're dead all the same
		std::fs::read_to_string(format!("/proc/{pid}/stat"))
			.map_or(true, |stat| stat.contains(") Z "))
	}

	let mut config = SupervisorConfig::default();
	config.stop_signal(Signal::Terminate);
	let supervisor = Supervisor::new(config);
	let mut cursor = supervisor.sink().cursor();

	supervisor
		.start(Command::sh("sleep 30 & echo \"$!\"; wait"))
		.unwrap();
	let child = timeout(PATIENCE, async {
		loop {
			if let Some(line) = cursor
				.next_batch()
				.await
				.into_iter()
				.find_map(|entry| entry.as_line().map(ToOwned::to_owned))
			{
				return line;
			}
		}
	})
	.await
	.unwrap();
	assert!(!gone(&child));

	timeout(PATIENCE, supervisor.stop()).await.unwrap();
	let begun = Instant::now();
	while !gone(&child) {
		assert!(begun.elapsed() < PATIENCE, "forked child {child} survived");
		tokio::time::sleep(Duration::from_millis(20)).await;
	}
}

#[tokio::test]
async fn launch_failure_is_reported_and_recoverable() {
	let supervisor = Supervisor::new(SupervisorConfig::default());
	let mut cursor = supervisor.sink().cursor();

	let result = supervisor.start(Command::Exec {
		prog: "/does/not/exist".into(),
		args: Vec::new(),
	});
	assert!(matches!(result, Err(SupervisorError::IoError { .. })));
	assert_eq!(supervisor.state(), SupervisorState::Idle);

	let entries = until_terminated(&mut cursor).await;
	assert!(matches!(
		entries.as_slice(),
		[
			LogEntry::Event(Event::Error { .. }),
			LogEntry::Event(Event::Terminated {
				status: ProcessEnd::Failed
			})
		]
	));

	supervisor.start(Command::sh("true")).unwrap();
	assert_eq!(
		timeout(PATIENCE, supervisor.wait()).await.unwrap(),
		Some(ProcessEnd::Success)
	);
}

#[tokio::test]
async fn dropped_stop_still_finishes() {
	let mut config = SupervisorConfig::default();
	config.grace(Duration::from_millis(300));
	let supervisor = Supervisor::new(config);
	let mut cursor = supervisor.sink().cursor();

	supervisor
		.start(Command::sh("trap '' INT; echo ready; sleep 30"))
		.unwrap();
	until_line(&mut cursor, "ready").await;

	// polled once, which is enough to send the stop, then dropped
	assert!(timeout(Duration::from_millis(1), supervisor.stop())
		.await
		.is_err());
	assert_eq!(supervisor.state(), SupervisorState::Stopping);

	let status = timeout(PATIENCE, supervisor.wait()).await.unwrap();
	assert_eq!(status, Some(ProcessEnd::ExitSignal(Signal::ForceStop)));
	assert_eq!(supervisor.state(), SupervisorState::Idle);
}

#[tokio::test]
async fn state_changes_are_observable() {
	let supervisor = Supervisor::new(SupervisorConfig::default());
	let mut states = supervisor.subscribe_state();
	assert_eq!(*states.borrow_and_update(), SupervisorState::Idle);

	supervisor.start(sleeper()).unwrap();
	assert_eq!(*states.borrow_and_update(), SupervisorState::Running);

	supervisor.stop().await;
	assert_eq!(*states.borrow_and_update(), SupervisorState::Idle);
}

#[test]
fn start_works_outside_the_runtime() {
	let runtime = tokio::runtime::Builder::new_multi_thread()
		.enable_all()
		.build()
		.unwrap();
	let supervisor = runtime.block_on(async { Supervisor::new(SupervisorConfig::default()) });

	let handle = std::thread::spawn({
		let supervisor = supervisor.clone();
		move || supervisor.start(Command::sh("exit 0"))
	});
	handle.join().unwrap().unwrap();

	let status = runtime.block_on(async { timeout(PATIENCE, supervisor.wait()).await.unwrap() });
	assert!(matches!(status, Some(ProcessEnd::Success) | None));
}
