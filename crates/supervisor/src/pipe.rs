//! One pipe carrying both stdout and stderr of a child, like `2>&1`.

use std::{io, os::fd::OwnedFd, process::Stdio};

use tokio::{
	io::{AsyncBufReadExt, AsyncReadExt, BufReader},
	net::unix::pipe::Receiver,
};
use tracing::trace;

/// Both ends of an output pipe, with the write end ready to hand to a command twice.
#[derive(Debug)]
pub(crate) struct OutputPipe {
	pub reader: OwnedFd,
	pub stdout: Stdio,
	pub stderr: Stdio,
}

/// Create a close-on-exec pipe whose write end serves as both stdout and stderr.
///
/// The parent must drop the command (and with it both `Stdio`s) once the child is spawned, or the
/// reader will never see end-of-file.
pub(crate) fn output_pipe() -> io::Result<OutputPipe> {
	let (reader, writer) = cloexec_pipe()?;
	let stderr = writer.try_clone()?;
	Ok(OutputPipe {
		reader,
		stdout: writer.into(),
		stderr: stderr.into(),
	})
}

#[cfg(any(
	target_os = "android",
	target_os = "dragonfly",
	target_os = "freebsd",
	target_os = "linux",
	target_os = "netbsd",
	target_os = "openbsd",
))]
fn cloexec_pipe() -> io::Result<(OwnedFd, OwnedFd)> {
	use nix::{fcntl::OFlag, unistd::pipe2};
	Ok(pipe2(OFlag::O_CLOEXEC)?)
}

#[cfg(not(any(
	target_os = "android",
	target_os = "dragonfly",
	target_os = "freebsd",
	target_os = "linux",
	target_os = "netbsd",
	target_os = "openbsd",
)))]
fn cloexec_pipe() -> io::Result<(OwnedFd, OwnedFd)> {
	use std::os::fd::AsRawFd;

	use nix::{
		fcntl::{fcntl, FcntlArg, FdFlag},
		unistd::pipe,
	};

	// not atomic: a fork on another thread in between can inherit these
	let (reader, writer) = pipe()?;
	for fd in [&reader, &writer] {
		fcntl(fd.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))?;
	}
	Ok((reader, writer))
}

/// Must be called from within a Tokio runtime.
fn open(reader: OwnedFd) -> io::Result<Receiver> {
	Receiver::from_owned_fd(reader)
}

/// Read lines until end-of-file, handing each to `each` as soon as it's complete.
///
/// Lines are decoded lossily and lose their terminator (`\n` or `\r\n`). A final unterminated
/// line is still delivered.
pub(crate) async fn forward_lines(reader: OwnedFd, mut each: impl FnMut(String)) -> io::Result<()> {
	let mut reader = BufReader::new(open(reader)?);
	let mut buf = Vec::with_capacity(256);
	loop {
		buf.clear();
		if reader.read_until(b'\n', &mut buf).await? == 0 {
			trace!("output stream closed");
			return Ok(());
		}

		let mut line = buf.as_slice();
		if let Some(rest) = line.strip_suffix(b"\n") {
			line = rest.strip_suffix(b"\r").unwrap_or(rest);
		}

		each(String::from_utf8_lossy(line).into_owned());
	}
}

/// Read everything until end-of-file.
pub(crate) async fn read_to_end(reader: OwnedFd) -> io::Result<Vec<u8>> {
	let mut buf = Vec::new();
	open(reader)?.read_to_end(&mut buf).await?;
	Ok(buf)
}
