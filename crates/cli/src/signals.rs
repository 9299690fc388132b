use miette::{IntoDiagnostic, Result, WrapErr};
use rtspcam_supervisor::Signal;
use tokio::{
	select,
	signal::unix::{signal, Signal as UnixSignal, SignalKind},
};
use tracing::{debug, trace};

/// Listeners for the signals which ask us to exit.
///
/// While this exists, those signals no longer kill the process: it's up to the holder to act.
#[derive(Debug)]
pub struct Shutdown {
	hangup: UnixSignal,
	interrupt: UnixSignal,
	terminate: UnixSignal,
}

impl Shutdown {
	pub fn listen() -> Result<Self> {
		macro_rules! listen {
			($sig:ident) => {{
				trace!(kind=%stringify!($sig), "listening for unix signal");
				signal(SignalKind::$sig())
					.into_diagnostic()
					.wrap_err(concat!("setting ", stringify!($sig), " signal listener"))?
			}};
		}

		Ok(Self {
			hangup: listen!(hangup),
			interrupt: listen!(interrupt),
			terminate: listen!(terminate),
		})
	}

	/// Wait for the next signal.
	pub async fn recv(&mut self) -> Signal {
		let sig = select!(
			_ = self.hangup.recv() => Signal::Hangup,
			_ = self.interrupt.recv() => Signal::Interrupt,
			_ = self.terminate.recv() => Signal::Terminate,
		);

		debug!(?sig, "received unix signal");
		sig
	}
}
