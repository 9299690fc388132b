//! Process supervision for an RTSP camera bridge.
//!
//! This crate runs an external media pipeline (typically `gst-launch-1.0` pulling an RTSP stream
//! into a v4l2loopback device) and keeps it under control: at most one pipeline at a time, its
//! output streamed line by line into an observable log, and a two-stage stop which asks nicely
//! before killing. It also runs the one-shot privileged commands needed to set up the loopback
//! device.
//!
//! # Usage
//!
//! Create a [`Supervisor`] with a [`SupervisorConfig`], then [`start`](Supervisor::start) a
//! [`Command`](command::Command). Read the pipeline's output and lifecycle [`Event`]s from the
//! [`LogSink`] through a [`LogCursor`], and [`stop`](Supervisor::stop) it when done.
//!
//! ```no_run
//! # #[tokio::main(flavor = "current_thread")] async fn main() { // single-threaded for doctest only
//! use rtspcam_supervisor::{command::Command, Supervisor, SupervisorConfig};
//!
//! let supervisor = Supervisor::new(SupervisorConfig::default());
//! let mut cursor = supervisor.sink().cursor();
//!
//! supervisor.start(Command::Exec {
//!     prog: "gst-launch-1.0".into(),
//!     args: vec!["-e".into(), "videotestsrc".into(), "!".into(), "fakesink".into()],
//! }).unwrap();
//!
//! for entry in cursor.next_batch().await {
//!     println!("{entry}");
//! }
//!
//! let status = supervisor.stop().await;
//! println!("pipeline ended: {status:?}");
//! # }
//! ```
//!
//! # Theory of Operation
//!
//! The supervisor's only mutable state is a slot holding zero or one live pipeline, behind a
//! mutex which is never held across an await. Each run gets its own Tokio task which owns the
//! child: it waits on it, receives stop requests over a channel, and runs the grace-period timer.
//! That task alone decides when the run is over, and clears the slot with a compare-and-clear keyed
//! on the run's generation, so a natural exit racing with a stop still produces exactly one
//! `Terminated` event.
//!
//! The pipeline is spawned as the leader of a new process group (using
//! [`process-wrap`](process_wrap)), and signals are delivered to the whole group, so anything the
//! pipeline forks is stopped along with it.

#![warn(clippy::unwrap_used, missing_docs, rustdoc::unescaped_backticks)]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![deny(rust_2018_idioms)]

#[doc(inline)]
pub use crate::config::SupervisorConfig;
#[doc(inline)]
pub use crate::events::{Event, ProcessEnd};
#[doc(inline)]
pub use crate::signal::Signal;
#[doc(inline)]
pub use crate::sink::{LogCursor, LogEntry, LogSink};
#[doc(inline)]
pub use crate::supervisor::{Supervisor, SupervisorState};

pub mod command;
pub mod config;
pub mod errors;
pub mod events;
pub mod privileged;
pub mod signal;
pub mod sink;

mod pipe;
mod supervisor;
