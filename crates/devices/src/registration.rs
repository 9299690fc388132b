//! Creating devices by loading v4l2loopback.

use rtspcam_supervisor::{
	privileged::{PrivilegedOutput, PrivilegedRunner, Secret},
	LogSink,
};
use tracing::{info, warn};

use crate::{errors::RegistrationError, DeviceNumber, DeviceRegistry};

/// The card label used when none is given.
pub const DEFAULT_LABEL: &str = "RTSP-Cam";

/// Everything needed to create one device.
#[derive(Debug)]
pub struct RegistrationRequest {
	/// Which `/dev/videoN` to create.
	pub device: DeviceNumber,

	/// The card label, shown by capture programs as the camera's name.
	pub label: String,

	/// The password for the elevation program. Consumed by [`register`].
	pub secret: Secret,
}

impl RegistrationRequest {
	/// A request with the label trimmed, and defaulted if it ends up empty.
	pub fn new(device: DeviceNumber, label: Option<&str>, secret: Secret) -> Self {
		let label = label
			.map(str::trim)
			.filter(|label| !label.is_empty())
			.unwrap_or(DEFAULT_LABEL)
			.to_owned();
		Self {
			device,
			label,
			secret,
		}
	}

	/// The shell command which creates the device.
	///
	/// v4l2loopback only takes device options when it's loaded, so this can only work while the
	/// module isn't loaded yet. The label is quoted for the shell.
	#[must_use]
	pub fn command(&self) -> String {
		format!(
			"modprobe v4l2loopback devices=1 video_nr={} card_label={} exclusive_caps=1",
			self.device,
			shell_escape(&self.label)
		)
	}
}

/// Quote a string for a POSIX shell.
fn shell_escape(s: &str) -> String {
	format!("'{}'", s.replace('\'', r#"'"'"'"#))
}

/// Create a device.
///
/// Refuses if the device already exists. Otherwise the command is echoed to `log` as
/// `$ <command>`, run through `runner` with the request's secret, and the outcome logged:
/// `Device created: /dev/videoN` on success, `Error (<code>): <output>` on failure.
///
/// A command which ran but failed is returned as `Ok`, check [`PrivilegedOutput::success`]. Note
/// that success means the command succeeded: check the `registry` again to see the device.
pub async fn register(
	runner: &PrivilegedRunner,
	registry: &DeviceRegistry,
	log: &LogSink,
	request: RegistrationRequest,
) -> Result<PrivilegedOutput, RegistrationError> {
	let path = registry.path(request.device);
	if registry.exists(request.device).await {
		warn!(?path, "refusing to register existing device");
		return Err(RegistrationError::AlreadyExists { path });
	}

	let command = request.command();
	log.line(format!("$ {command}"));
	info!(%command, "registering device");

	let output = match runner.run(&command, request.secret).await {
		Ok(output) => output,
		Err(err) => {
			log.line(format!("Exception: {err}"));
			return Err(err.into());
		}
	};

	if output.success() {
		info!(?path, "device registered");
		log.line(format!("Device created: {}", path.display()));
	} else {
		warn!(code = output.code(), "device registration failed");
		log.line(format!(
			"Error ({}): {}",
			output.code(),
			output.output.trim_end()
		));
	}

	Ok(output)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn request(label: Option<&str>) -> RegistrationRequest {
		RegistrationRequest::new(
			DeviceNumber::new(10).unwrap(),
			label,
			Secret::from(String::new()),
		)
	}

	#[test]
	fn label_defaults_and_trims() {
		assert_eq!(request(None).label, DEFAULT_LABEL);
		assert_eq!(request(Some("   ")).label, DEFAULT_LABEL);
		assert_eq!(request(Some(" Door Cam ")).label, "Door Cam");
	}

	#[test]
	fn command_quotes_the_label() {
		assert_eq!(
			request(Some("Door Cam")).command(),
			"modprobe v4l2loopback devices=1 video_nr=10 card_label='Door Cam' exclusive_caps=1"
		);
		assert_eq!(
			request(Some("Bob's; rm -rf /")).command(),
			r#"modprobe v4l2loopback devices=1 video_nr=10 card_label='Bob'"'"'s; rm -rf /' exclusive_caps=1"#
		);
	}
}
