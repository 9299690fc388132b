//! Signals sent to the pipeline's process group.

use std::{fmt, str::FromStr};

use nix::sys::signal::Signal as NixSignal;

use crate::errors::SignalParseError;

/// A notification sent to the supervised process group.
///
/// There are several "first-class" signals which have their own variants, and a generic
/// [`Custom`][Signal::Custom] variant which can be used to send arbitrary signals.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Signal {
	/// `SIGHUP`.
	Hangup,

	/// Indicate to the kernel that the process should stop.
	///
	/// This is `SIGKILL`. It is not handled by the process but directly by the kernel, and thus
	/// cannot be intercepted. This is what the supervisor escalates to once the grace period runs
	/// out.
	ForceStop,

	/// Indicate that the process should stop.
	///
	/// This is `SIGINT`, the default graceful signal: `gst-launch-1.0 -e` answers it by sending
	/// end-of-stream down the pipeline and exiting once it has been flushed.
	Interrupt,

	/// `SIGQUIT`.
	Quit,

	/// `SIGTERM`.
	Terminate,

	/// `SIGUSR1`.
	User1,

	/// `SIGUSR2`.
	User2,

	/// A custom signal, as a raw number.
	///
	/// Invalid signals on the current platform are rejected when sent.
	Custom(i32),
}

impl Signal {
	/// Converts to a [`nix::Signal`](NixSignal) if possible.
	///
	/// This returns `None` only for [`Custom`][Signal::Custom] numbers the platform doesn't know.
	#[must_use]
	pub fn to_nix(self) -> Option<NixSignal> {
		match self {
			Self::Hangup => Some(NixSignal::SIGHUP),
			Self::ForceStop => Some(NixSignal::SIGKILL),
			Self::Interrupt => Some(NixSignal::SIGINT),
			Self::Quit => Some(NixSignal::SIGQUIT),
			Self::Terminate => Some(NixSignal::SIGTERM),
			Self::User1 => Some(NixSignal::SIGUSR1),
			Self::User2 => Some(NixSignal::SIGUSR2),
			Self::Custom(sig) => NixSignal::try_from(sig).ok(),
		}
	}

	/// Converts from a [`nix::Signal`](NixSignal).
	#[must_use]
	pub fn from_nix(sig: NixSignal) -> Self {
		match sig {
			NixSignal::SIGHUP => Self::Hangup,
			NixSignal::SIGKILL => Self::ForceStop,
			NixSignal::SIGINT => Self::Interrupt,
			NixSignal::SIGQUIT => Self::Quit,
			NixSignal::SIGTERM => Self::Terminate,
			NixSignal::SIGUSR1 => Self::User1,
			NixSignal::SIGUSR2 => Self::User2,
			sig => Self::Custom(sig as _),
		}
	}
}

impl From<i32> for Signal {
	fn from(raw: i32) -> Self {
		NixSignal::try_from(raw).map_or(Self::Custom(raw), Self::from_nix)
	}
}

impl fmt::Display for Signal {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match (self, self.to_nix()) {
			(_, Some(sig)) => f.write_str(sig.as_str()),
			(Self::Custom(n), None) => write!(f, "signal {n}"),
			(sig, None) => write!(f, "{sig:?}"),
		}
	}
}

impl FromStr for Signal {
	type Err = SignalParseError;

	/// Parses a signal name or number, case-insensitively.
	///
	/// Accepts integers, short names (`INT`, `HUP`, `USR1`), and long names (`SIGINT`, `SIGHUP`).
	///
	/// ```
	/// # use rtspcam_supervisor::Signal;
	/// assert_eq!(Signal::Hangup, "hup".parse().unwrap());
	/// assert_eq!(Signal::Interrupt, "SIGINT".parse().unwrap());
	/// assert_eq!(Signal::ForceStop, "Kill".parse().unwrap());
	/// assert_eq!(Signal::Terminate, "15".parse().unwrap());
	/// ```
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let s = s.trim();
		if let Ok(sig) = i32::from_str(s) {
			if let Ok(sig) = NixSignal::try_from(sig) {
				return Ok(Self::from_nix(sig));
			}
		}

		let upper = s.to_ascii_uppercase();
		NixSignal::from_str(&upper)
			.or_else(|_| NixSignal::from_str(&format!("SIG{upper}")))
			.map(Self::from_nix)
			.map_err(|_| SignalParseError::new(s, "unsupported signal"))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_names_and_numbers() {
		assert_eq!("int".parse::<Signal>().unwrap(), Signal::Interrupt);
		assert_eq!("SIGTERM".parse::<Signal>().unwrap(), Signal::Terminate);
		assert_eq!("9".parse::<Signal>().unwrap(), Signal::ForceStop);
		assert_eq!("sigwinch".parse::<Signal>().unwrap(), Signal::Custom(28));
		assert!("nope".parse::<Signal>().is_err());
	}

	#[test]
	fn displays_as_nix_name() {
		assert_eq!(Signal::Interrupt.to_string(), "SIGINT");
		assert_eq!(Signal::ForceStop.to_string(), "SIGKILL");
		assert_eq!(Signal::Custom(1000).to_string(), "signal 1000");
	}
}
