use std::{path::Path, process::ExitCode, time::Duration};

use miette::{bail, IntoDiagnostic, Result};
use rtspcam_devices::DeviceRegistry;
use rtspcam_supervisor::{command::Command, ProcessEnd, Signal, Supervisor, SupervisorConfig};
use tokio::select;
use tracing::{debug, info};

use crate::{args::RunArgs, output, signals::Shutdown};

/// The GStreamer pipeline pulling `url` into the `device` node.
///
/// `-e` makes gst-launch answer SIGINT with an end-of-stream, so the sink is closed cleanly.
pub fn command(gst_launch: &Path, url: &str, device: &Path) -> Command {
	let args = [
		"-e".to_owned(),
		"rtspsrc".to_owned(),
		format!("location={url}"),
		"latency=0".to_owned(),
		"protocols=tcp".to_owned(),
		"name=src".to_owned(),
		"!".to_owned(),
		"rtpjitterbuffer".to_owned(),
		"!".to_owned(),
		"decodebin".to_owned(),
		"!".to_owned(),
		"videoconvert".to_owned(),
		"!".to_owned(),
		"v4l2sink".to_owned(),
		format!("device={}", device.display()),
		"sync=false".to_owned(),
	];

	Command::Exec {
		prog: gst_launch.to_owned(),
		args: args.into(),
	}
}

/// How many log entries are kept while the pipeline runs.
///
/// Entries are printed as they arrive, so this only needs to cover the printer falling behind.
pub const LOG_CAPACITY: usize = 1024;

fn supervisor_config(grace: Duration, stop_signal: Signal) -> SupervisorConfig {
	let mut config = SupervisorConfig::default();
	config
		.grace(grace)
		.stop_signal(stop_signal)
		.log_capacity(Some(LOG_CAPACITY));
	config
}

fn exit_code(status: Option<ProcessEnd>) -> u8 {
	status.map_or(1, |status| u8::try_from(status.code()).unwrap_or(1))
}

pub async fn run(registry: &DeviceRegistry, args: RunArgs) -> Result<ExitCode> {
	let url = args.url.trim();
	if url.is_empty() {
		bail!("Please enter an RTSP URL.");
	}

	let device = registry.path(args.device);
	if !registry.exists(args.device).await {
		bail!("{} does not exist. Register it first.", device.display());
	}

	let mut shutdown = Shutdown::listen()?;

	let supervisor = Supervisor::new(supervisor_config(args.grace.0, args.stop_signal));
	let printer = tokio::spawn(output::follow(supervisor.sink().cursor()));

	if let Err(err) = supervisor.start(command(&args.gst_launch, url, &device)) {
		// the failure is in the log too; let it print
		printer.await.into_diagnostic()?;
		return Err(err.into());
	}

	select! {
		status = supervisor.wait() => debug!(?status, "pipeline ended on its own"),
		signal = shutdown.recv() => {
			info!(%signal, "stopping pipeline");
			supervisor.stop().await;
		}
	}

	// no-op unless the pipeline is somehow still there
	supervisor.stop().await;

	let status = printer.await.into_diagnostic()?;
	info!(?status, "pipeline finished");
	Ok(ExitCode::from(exit_code(status)))
}
