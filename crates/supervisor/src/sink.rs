//! The append-only log shared between the supervisor and its consumers.

use std::{
	collections::VecDeque,
	fmt,
	sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tokio::sync::watch;
use tracing::trace;

use crate::events::Event;

/// One entry in the log: either a line of pipeline output or a lifecycle event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogEntry {
	/// A line of output, without its terminating newline.
	Line(String),

	/// A lifecycle event.
	Event(Event),
}

impl LogEntry {
	/// The event, if this is one.
	#[must_use]
	pub const fn as_event(&self) -> Option<&Event> {
		match self {
			Self::Event(event) => Some(event),
			Self::Line(_) => None,
		}
	}

	/// The line, if this is one.
	#[must_use]
	pub fn as_line(&self) -> Option<&str> {
		match self {
			Self::Line(line) => Some(line),
			Self::Event(_) => None,
		}
	}
}

impl fmt::Display for LogEntry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Line(line) => f.write_str(line),
			Self::Event(event) => event.fmt(f),
		}
	}
}

impl From<Event> for LogEntry {
	fn from(event: Event) -> Self {
		Self::Event(event)
	}
}

/// An ordered, append-only log.
///
/// Producers append; consumers read through [`LogCursor`]s, in batches, at their own pace. Every
/// entry gets a sequence number, and entries are never reordered or modified once appended.
///
/// By default everything is retained. With [`LogSink::with_capacity`] only the newest entries are
/// kept; cursors which fall behind the retained window skip ahead and count what they missed.
///
/// This is cheaply cloneable; all clones share the same log.
#[derive(Clone, Debug)]
pub struct LogSink {
	inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
	buffer: Mutex<Buffer>,

	/// Sequence number of the next entry to be appended.
	appended: watch::Sender<u64>,
}

#[derive(Debug, Default)]
struct Buffer {
	/// Sequence number of `entries[0]`.
	first: u64,
	entries: VecDeque<LogEntry>,
	capacity: Option<usize>,
}

impl Buffer {
	fn end(&self) -> u64 {
		self.first + self.entries.len() as u64
	}
}

impl Default for LogSink {
	fn default() -> Self {
		Self::new()
	}
}

impl LogSink {
	/// A new empty log which retains everything.
	#[must_use]
	pub fn new() -> Self {
		Self::from_buffer(Buffer::default())
	}

	/// A new empty log which retains only the newest `capacity` entries.
	#[must_use]
	pub fn with_capacity(capacity: usize) -> Self {
		Self::from_buffer(Buffer {
			capacity: Some(capacity.max(1)),
			..Buffer::default()
		})
	}

	fn from_buffer(buffer: Buffer) -> Self {
		let (appended, _) = watch::channel(0);
		Self {
			inner: Arc::new(Inner {
				buffer: Mutex::new(buffer),
				appended,
			}),
		}
	}

	fn buffer(&self) -> MutexGuard<'_, Buffer> {
		// appends can't leave the buffer half-written, so a poisoned lock is still consistent
		self.inner
			.buffer
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
	}

	/// Append an entry.
	pub fn append(&self, entry: impl Into<LogEntry>) {
		let entry = entry.into();
		trace!(?entry, "appending to log");

		let mut buffer = self.buffer();
		buffer.entries.push_back(entry);
		if let Some(capacity) = buffer.capacity {
			while buffer.entries.len() > capacity {
				buffer.entries.pop_front();
				buffer.first += 1;
			}
		}

		// published under the lock so the watched sequence number never goes backwards
		let end = buffer.end();
		self.inner.appended.send_replace(end);
	}

	/// Append a line of output.
	pub fn line(&self, line: impl Into<String>) {
		self.append(LogEntry::Line(line.into()));
	}

	/// Append a lifecycle event.
	pub fn event(&self, event: Event) {
		self.append(LogEntry::Event(event));
	}

	/// Copy out all retained entries, oldest first.
	#[must_use]
	pub fn snapshot(&self) -> Vec<LogEntry> {
		self.buffer().entries.iter().cloned().collect()
	}

	/// Total number of entries ever appended, including any no longer retained.
	#[must_use]
	pub fn appended(&self) -> u64 {
		self.buffer().end()
	}

	/// A cursor positioned at the oldest retained entry.
	#[must_use]
	pub fn cursor(&self) -> LogCursor {
		let next = self.buffer().first;
		self.cursor_at(next)
	}

	/// A cursor positioned after the newest entry, so it only sees what comes next.
	#[must_use]
	pub fn tail(&self) -> LogCursor {
		let next = self.buffer().end();
		self.cursor_at(next)
	}

	fn cursor_at(&self, next: u64) -> LogCursor {
		LogCursor {
			sink: self.clone(),
			next,
			missed: 0,
			changed: self.inner.appended.subscribe(),
		}
	}
}

/// A reading position in a [`LogSink`].
///
/// Each cursor sees every entry from its starting position onwards exactly once, in order.
#[derive(Debug)]
pub struct LogCursor {
	sink: LogSink,
	next: u64,
	missed: u64,
	changed: watch::Receiver<u64>,
}

impl LogCursor {
	/// Take whatever is available right now, possibly nothing.
	pub fn try_next_batch(&mut self) -> Vec<LogEntry> {
		let buffer = self.sink.buffer();
		if self.next < buffer.first {
			self.missed += buffer.first - self.next;
			self.next = buffer.first;
		}

		let start = usize::try_from(self.next - buffer.first).unwrap_or(usize::MAX);
		let batch: Vec<LogEntry> = buffer.entries.iter().skip(start).cloned().collect();
		self.next = buffer.end();
		batch
	}

	/// Wait until at least one entry is available, then take everything available.
	pub async fn next_batch(&mut self) -> Vec<LogEntry> {
		loop {
			self.changed.borrow_and_update();
			let batch = self.try_next_batch();
			if !batch.is_empty() {
				return batch;
			}

			if self.changed.changed().await.is_err() {
				// unreachable while we hold a clone of the sink, but don't spin if it happens
				return Vec::new();
			}
		}
	}

	/// How many entries this cursor skipped because they fell out of a bounded log.
	#[must_use]
	pub const fn missed(&self) -> u64 {
		self.missed
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::events::ProcessEnd;

	fn lines(entries: &[LogEntry]) -> Vec<&str> {
		entries.iter().filter_map(LogEntry::as_line).collect()
	}

	#[test]
	fn cursor_sees_everything_in_order() {
		let sink = LogSink::new();
		let mut cursor = sink.cursor();
		sink.line("A");
		sink.line("B");
		assert_eq!(lines(&cursor.try_next_batch()), ["A", "B"]);
		sink.line("C");
		assert_eq!(lines(&cursor.try_next_batch()), ["C"]);
		assert!(cursor.try_next_batch().is_empty());
	}

	#[test]
	fn tail_skips_history() {
		let sink = LogSink::new();
		sink.line("old");
		let mut tail = sink.tail();
		sink.line("new");
		assert_eq!(lines(&tail.try_next_batch()), ["new"]);
		assert_eq!(lines(&sink.cursor().try_next_batch()), ["old", "new"]);
	}

	#[test]
	fn bounded_log_drops_oldest_and_counts_misses() {
		let sink = LogSink::with_capacity(2);
		let mut cursor = sink.cursor();
		for line in ["1", "2", "3", "4"] {
			sink.line(line);
		}
		assert_eq!(lines(&sink.snapshot()), ["3", "4"]);
		assert_eq!(lines(&cursor.try_next_batch()), ["3", "4"]);
		assert_eq!(cursor.missed(), 2);
		assert_eq!(sink.appended(), 4);
	}

	#[tokio::test]
	async fn next_batch_waits_for_appends() {
		let sink = LogSink::new();
		let mut cursor = sink.cursor();
		let producer = sink.clone();
		tokio::spawn(async move {
			producer.line("late");
			producer.event(Event::Terminated {
				status: ProcessEnd::Success,
			});
		});

		let mut seen = Vec::new();
		while seen.len() < 2 {
			seen.extend(cursor.next_batch().await);
		}
		assert_eq!(seen[0], LogEntry::Line("late".into()));
		assert!(matches!(seen[1], LogEntry::Event(Event::Terminated { .. })));
	}
}
