use std::{ffi::OsString, process::ExitCode};

use miette::{IntoDiagnostic, Result, WrapErr};
use rtspcam_devices::{
	errors::RegistrationError, register as register_device, DeviceRegistry, RegistrationRequest,
};
use rtspcam_supervisor::{
	privileged::{PrivilegedRunner, Secret},
	LogSink,
};
use tokio::task::spawn_blocking;
use tracing::warn;

use crate::args::RegisterArgs;

async fn prompt_password() -> Result<Secret> {
	spawn_blocking(|| {
		rpassword::prompt_password("Enter your sudo password (will not be stored): ")
	})
	.await
	.into_diagnostic()?
	.into_diagnostic()
	.wrap_err("reading password")
	.map(Secret::from)
}

pub async fn register(registry: &DeviceRegistry, args: RegisterArgs) -> Result<ExitCode> {
	// checked before prompting; register() checks again
	if registry.exists(args.device).await {
		return Err(RegistrationError::AlreadyExists {
			path: registry.path(args.device),
		}
		.into());
	}

	let secret = prompt_password().await?;
	if secret.is_empty() {
		warn!("empty password");
	}

	let runner = PrivilegedRunner::new([
		args.sudo,
		OsString::from("-S"),
		OsString::from("-p"),
		OsString::new(),
	]);
	let log = LogSink::new();
	let mut cursor = log.cursor();
	let request = RegistrationRequest::new(args.device, args.label.as_deref(), secret);
	let result = register_device(&runner, registry, &log, request).await;

	for entry in cursor.try_next_batch() {
		println!("{entry}");
	}

	if !result?.success() {
		return Ok(ExitCode::FAILURE);
	}

	if registry.exists(args.device).await {
		Ok(ExitCode::SUCCESS)
	} else {
		warn!(device=%args.device, "module loaded but the device did not appear");
		eprintln!(
			"{} did not appear; is v4l2loopback already loaded with other options?",
			registry.path(args.device).display()
		);
		Ok(ExitCode::FAILURE)
	}
}
