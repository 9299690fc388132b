//! Device existence checks.

use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::DeviceNumber;

/// Looks up video device nodes.
///
/// This holds nothing but the directory the nodes live in; every check goes to the filesystem.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceRegistry {
	root: PathBuf,
}

impl Default for DeviceRegistry {
	fn default() -> Self {
		Self::new("/dev")
	}
}

impl DeviceRegistry {
	/// A registry looking for `videoN` nodes in `root` instead of `/dev`.
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	/// The directory device nodes live in.
	#[must_use]
	pub fn root(&self) -> &Path {
		&self.root
	}

	/// The path of a device node: `/dev/videoN`.
	#[must_use]
	pub fn path(&self, device: DeviceNumber) -> PathBuf {
		self.root.join(format!("video{device}"))
	}

	/// Whether the device node currently exists.
	///
	/// Any error while checking (permissions, I/O) counts as not existing: callers should treat
	/// the device as not ready rather than fail.
	pub async fn exists(&self, device: DeviceNumber) -> bool {
		let path = self.path(device);
		match tokio::fs::try_exists(&path).await {
			Ok(exists) => {
				trace!(?path, exists, "checked device");
				exists
			}
			Err(err) => {
				debug!(?path, %err, "could not check device, assuming absent");
				false
			}
		}
	}
}
