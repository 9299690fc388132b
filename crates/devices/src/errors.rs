//! Error types.

use std::path::PathBuf;

use miette::Diagnostic;
use rtspcam_supervisor::errors::PrivilegedError;
use thiserror::Error;

/// A device number outside of what v4l2loopback accepts.
#[derive(Debug, Diagnostic, Error)]
#[error("invalid device number `{src}`: {err}")]
#[diagnostic(
	code(rtspcam::devices::invalid_number),
	help("device numbers go from 0 to 63, as in /dev/video0 to /dev/video63")
)]
pub struct DeviceNumberError {
	#[source_code]
	src: String,

	err: &'static str,

	#[label = "not a device number"]
	span: (usize, usize),
}

impl DeviceNumberError {
	pub(crate) fn new(src: impl Into<String>, err: &'static str) -> Self {
		let src = src.into();
		let span = (0, src.len());
		Self { src, err, span }
	}
}

/// Errors from [`register`](crate::register).
///
/// A registration command which ran and failed is not one of these: that's reported as a
/// [`PrivilegedOutput`](rtspcam_supervisor::privileged::PrivilegedOutput) with its status and
/// output.
#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum RegistrationError {
	/// The device already exists, so the module is presumably loaded already.
	#[error("{} already exists", path.display())]
	#[diagnostic(
		code(rtspcam::devices::already_exists),
		help("unload the module first with `sudo modprobe -r v4l2loopback`, or pick another number")
	)]
	AlreadyExists {
		/// The device node.
		path: PathBuf,
	},

	/// The registration command couldn't be run at all.
	#[error(transparent)]
	#[diagnostic(transparent)]
	Privileged(#[from] PrivilegedError),
}
