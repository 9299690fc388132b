#![deny(rust_2018_idioms)]
#![allow(clippy::missing_const_for_fn, clippy::future_not_send)]

use std::process::ExitCode;

use miette::Result;
use rtspcam_devices::{DeviceNumber, DeviceRegistry};
use tracing::{debug, info, warn};

use crate::args::{Action, Args};

pub mod args;
mod output;
mod pipeline;
mod registration;
mod signals;

async fn init() -> Result<(Args, Option<tracing_appender::non_blocking::WorkerGuard>)> {
	let log_on = args::preargs();
	let args = args::get_args();

	let guard = if log_on {
		warn!("ignoring logging options from args");
		None
	} else {
		args::postargs(&args.logging).await?
	};

	Ok((args, guard))
}

async fn status(registry: &DeviceRegistry, device: DeviceNumber) -> ExitCode {
	let path = registry.path(device);
	if registry.exists(device).await {
		println!("{} exists", path.display());
		ExitCode::SUCCESS
	} else {
		println!("{} does not exist", path.display());
		ExitCode::FAILURE
	}
}

pub async fn run() -> Result<ExitCode> {
	let (args, _guard) = init().await?;
	info!(version=%env!("CARGO_PKG_VERSION"), "rtspcam starting");

	let registry = DeviceRegistry::new(&args.dev_dir);
	debug!(?registry, "device registry");

	match args.action {
		Action::Status { device } => Ok(status(&registry, device).await),
		Action::Register(register) => registration::register(&registry, register).await,
		Action::Run(run) => pipeline::run(&registry, run).await,
	}
}
