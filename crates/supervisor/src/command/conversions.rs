use std::fmt;

use tokio::process::Command as TokioCommand;
use tracing::trace;

use super::Command;

impl Command {
	/// Obtain a [`tokio::process::Command`].
	///
	/// Standard streams are left to the caller to configure.
	pub fn to_spawnable(&self) -> TokioCommand {
		trace!(command=?self, "constructing command");

		let mut cmd = match self {
			Self::Exec { prog, args } => {
				let mut c = TokioCommand::new(prog);
				c.args(args);
				c
			}

			Self::Shell { shell, command } => {
				let mut c = TokioCommand::new(shell);
				c.arg("-c").arg(command);
				c
			}
		};

		// Resets the sigmask of the process before we spawn it.
		//
		// Required from Rust 1.66:
		// https://github.com/rust-lang/rust/pull/101077
		//
		// Without this a pipeline spawned from a thread with SIGINT blocked would never see the
		// graceful stop signal and would always get escalated to SIGKILL.
		{
			use nix::sys::signal::{sigprocmask, SigSet, SigmaskHow, Signal};
			unsafe {
				cmd.pre_exec(|| {
					let mut oldset = SigSet::empty();
					let mut newset = SigSet::all();
					newset.remove(Signal::SIGHUP); // leave SIGHUP alone so nohup works
					sigprocmask(SigmaskHow::SIG_UNBLOCK, Some(&newset), Some(&mut oldset))?;
					Ok(())
				});
			}
		}

		cmd
	}
}

impl fmt::Display for Command {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Exec { prog, args } => {
				write!(f, "{}", prog.display())?;
				for arg in args {
					write!(f, " {arg}")?;
				}

				Ok(())
			}
			Self::Shell { command, .. } => {
				write!(f, "{command}")
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn display_exec_joins_args() {
		let cmd = Command::Exec {
			prog: "gst-launch-1.0".into(),
			args: vec!["-e".into(), "videotestsrc".into(), "!".into(), "fakesink".into()],
		};
		assert_eq!(cmd.to_string(), "gst-launch-1.0 -e videotestsrc ! fakesink");
	}

	#[test]
	fn display_shell_is_the_command_line() {
		let cmd = Command::Shell {
			shell: "bash".into(),
			command: "echo hi | tr a-z A-Z".into(),
		};
		assert_eq!(cmd.to_string(), "echo hi | tr a-z A-Z");
	}

	#[test]
	fn shell_gets_dash_c() {
		let cmd = Command::Shell {
			shell: "bash".into(),
			command: "echo hi".into(),
		}
		.to_spawnable();
		let std = cmd.as_std();
		assert_eq!(std.get_program(), "bash");
		assert_eq!(std.get_args().collect::<Vec<_>>(), ["-c", "echo hi"]);
	}
}
