//! Pipeline commands.
//!
//! The supervisor never looks inside a [`Command`]: it is built by the caller (for rtspcam, the
//! CLI assembles a `gst-launch-1.0` invocation) and handed over whole to
//! [`Supervisor::start`](crate::Supervisor::start), which only turns it into a spawnable process.

use std::path::PathBuf;

mod conversions;

/// A command to execute.
///
/// ```
/// # use rtspcam_supervisor::command::Command;
/// Command::Exec {
///     prog: "gst-launch-1.0".into(),
///     args: vec!["-e".into(), "videotestsrc".into(), "!".into(), "fakesink".into()],
/// };
///
/// Command::Shell {
///     shell: "bash".into(),
///     command: "gst-launch-1.0 -e videotestsrc ! fakesink".into(),
/// };
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Command {
	/// A raw program call: the path or name of a program and its argument list.
	Exec {
		/// Path or name of the program.
		prog: PathBuf,

		/// The arguments to pass.
		args: Vec<String>,
	},

	/// A shell program: a string which is to be executed by a shell, as `<shell> -c <command>`.
	///
	/// The shell becomes the process group leader; anything it forks stays in the group and is
	/// reached by the stop signals too.
	Shell {
		/// Path or name of the shell.
		shell: PathBuf,

		/// The command line to pass to the shell.
		command: String,
	},
}

impl Command {
	/// Shorthand for a command line run through `sh -c`.
	pub fn sh(command: impl Into<String>) -> Self {
		Self::Shell {
			shell: "sh".into(),
			command: command.into(),
		}
	}
}
