//! One-shot privileged commands, authenticated by a secret on stdin.
//!
//! This is how devices get registered: a single shell command run through an elevation program
//! (`sudo -S` by default) which reads the password from its standard input. The password is never
//! placed on a command line, never logged, and wiped from memory as soon as it has been written.

use std::{
	ffi::OsString,
	fmt,
	process::Stdio,
	ptr,
	sync::atomic::{compiler_fence, Ordering},
};

use tokio::{io::AsyncWriteExt, process::Command as TokioCommand};
use tracing::{debug, instrument, trace};

use crate::{errors::PrivilegedError, events::ProcessEnd, pipe};

/// A secret, such as a password, to be used exactly once.
///
/// The bytes are overwritten with zeroes when this is dropped, and never appear in `Debug` output.
/// There is deliberately no way to clone it or to read it back out.
pub struct Secret(Vec<u8>);

impl Secret {
	/// Whether the secret is empty.
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	fn wipe(&mut self) {
		for byte in &mut self.0 {
			// SAFETY: the pointer comes from a live &mut u8
			unsafe { ptr::write_volatile(byte, 0) };
		}
		compiler_fence(Ordering::SeqCst);
	}
}

impl From<String> for Secret {
	fn from(secret: String) -> Self {
		Self(secret.into_bytes())
	}
}

impl From<Vec<u8>> for Secret {
	fn from(secret: Vec<u8>) -> Self {
		Self(secret)
	}
}

impl fmt::Debug for Secret {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("Secret(<redacted>)")
	}
}

impl Drop for Secret {
	fn drop(&mut self) {
		self.wipe();
		#[cfg(test)]
		tests::WIPED.with(|wiped| wiped.set(wiped.get() + 1));
	}
}

/// What a privileged command did.
///
/// A command which ran but failed is still an `Ok` result from [`PrivilegedRunner::run`]; look at
/// the status here.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrivilegedOutput {
	/// How the command ended.
	pub status: ProcessEnd,

	/// Everything it wrote to stdout and stderr, interleaved as written, decoded lossily.
	pub output: String,
}

impl PrivilegedOutput {
	/// Whether the command exited with status 0.
	#[must_use]
	pub const fn success(&self) -> bool {
		self.status.is_success()
	}

	/// The exit code, with signal deaths mapped to `128 + signo`.
	#[must_use]
	pub fn code(&self) -> i32 {
		self.status.code()
	}
}

/// Runs shell commands through an elevation program.
#[derive(Clone, Debug)]
pub struct PrivilegedRunner {
	elevation: Vec<OsString>,
	shell: OsString,
}

impl Default for PrivilegedRunner {
	/// `sudo -S -p '' sh -c <command>`: sudo reads the password from stdin and prints no prompt.
	fn default() -> Self {
		Self::new(["sudo", "-S", "-p", ""])
	}
}

impl PrivilegedRunner {
	/// A runner using the given elevation program and its arguments.
	///
	/// The program must read the secret as a single line from its standard input. The command is
	/// appended as `sh -c <command>`.
	///
	/// An empty elevation runs the command directly, unprivileged, with the secret still on stdin.
	pub fn new<I, S>(elevation: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<OsString>,
	{
		let elevation: Vec<OsString> = elevation.into_iter().map(Into::into).collect();
		debug!(?elevation, "PrivilegedRunner: elevation");
		Self {
			elevation,
			shell: "sh".into(),
		}
	}

	/// Use a different shell than `sh`.
	pub fn shell(&mut self, shell: impl Into<OsString>) -> &mut Self {
		let shell = shell.into();
		debug!(?shell, "PrivilegedRunner: shell");
		self.shell = shell;
		self
	}

	fn to_spawnable(&self, command: &str) -> TokioCommand {
		let (program, args) = match self.elevation.split_first() {
			Some((program, args)) => (program.clone(), args.to_vec()),
			None => (self.shell.clone(), Vec::new()),
		};

		let mut spawnable = TokioCommand::new(program);
		spawnable.args(args);
		if !self.elevation.is_empty() {
			spawnable.arg(&self.shell);
		}
		spawnable.arg("-c").arg(command);
		spawnable
	}

	/// Run `command` with elevated privileges, consuming the secret.
	///
	/// The secret is written to the command's stdin followed by a newline, then stdin is closed.
	/// The secret is wiped as soon as it's written, or as soon as it's known it won't be, before
	/// this returns.
	///
	/// This runs on its own task, so it doesn't hold up the caller's task while the command runs.
	///
	/// Only failing to launch the command (or to collect its output) is an error.
	#[instrument(level = "debug", skip(self, secret))]
	pub async fn run(
		&self,
		command: &str,
		secret: Secret,
	) -> Result<PrivilegedOutput, PrivilegedError> {
		let spawnable = self.to_spawnable(command);
		tokio::spawn(run_with_secret(spawnable, secret))
			.await
			.map_err(PrivilegedError::Worker)?
	}
}

async fn run_with_secret(
	mut spawnable: TokioCommand,
	secret: Secret,
) -> Result<PrivilegedOutput, PrivilegedError> {
	let output = pipe::output_pipe().map_err(|err| PrivilegedError::IoError {
		about: "creating output pipe",
		err,
	})?;
	spawnable
		.stdin(Stdio::piped())
		.stdout(output.stdout)
		.stderr(output.stderr)
		.kill_on_drop(true);

	let spawned = spawnable.spawn();
	// the command holds the pipe's write ends
	drop(spawnable);
	let mut child = spawned.map_err(|err| PrivilegedError::IoError {
		about: "spawning privileged command",
		err,
	})?;
	debug!(pid = ?child.id(), "privileged command spawned");

	if let Some(mut stdin) = child.stdin.take() {
		let written = async {
			stdin.write_all(&secret.0).await?;
			stdin.write_all(b"\n").await?;
			stdin.flush().await
		}
		.await;
		drop(secret);
		drop(stdin);

		match written {
			Ok(()) => trace!("secret delivered"),
			// the command exited or closed stdin without reading it all; its status will tell
			Err(err) if err.kind() == std::io::ErrorKind::BrokenPipe => {
				debug!("privileged command did not read the secret");
			}
			Err(err) => {
				return Err(PrivilegedError::IoError {
					about: "writing secret to privileged command",
					err,
				})
			}
		}
	}

	let (output, status) = tokio::join!(pipe::read_to_end(output.reader), child.wait());
	let status = status.map_err(|err| PrivilegedError::IoError {
		about: "waiting on privileged command",
		err,
	})?;
	let output = output.map_err(|err| PrivilegedError::IoError {
		about: "reading privileged command output",
		err,
	})?;

	let status = ProcessEnd::from(status);
	debug!(?status, bytes = output.len(), "privileged command finished");
	Ok(PrivilegedOutput {
		status,
		output: String::from_utf8_lossy(&output).into_owned(),
	})
}
