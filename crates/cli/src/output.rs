use rtspcam_supervisor::{Event, LogCursor, ProcessEnd};
use tracing::warn;

/// Print log entries to stdout as they come, until the end of a run.
///
/// Returns how the run ended, or `None` if the log went away first.
pub async fn follow(mut cursor: LogCursor) -> Option<ProcessEnd> {
	let mut missed = 0;
	loop {
		let batch = cursor.next_batch().await;
		if batch.is_empty() {
			return None;
		}

		if cursor.missed() != missed {
			warn!(missed = cursor.missed() - missed, "log entries dropped before printing");
			missed = cursor.missed();
		}

		for entry in batch {
			println!("{entry}");
			if let Some(Event::Terminated { status }) = entry.as_event() {
				return Some(*status);
			}
		}
	}
}
