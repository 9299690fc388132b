use std::{ffi::OsString, num::ParseIntError, path::PathBuf, str::FromStr, time::Duration};

use clap::{Parser, Subcommand, ValueHint};
use rtspcam_devices::DeviceNumber;
use rtspcam_supervisor::Signal;
use tracing::debug;

pub use self::logging::{postargs, preargs, LoggingArgs};

mod logging;

const OPTSET_DEBUGGING: &str = "Debugging options";
const OPTSET_DEVICE: &str = "Device options";
const OPTSET_PIPELINE: &str = "Pipeline options";

/// Bridge an RTSP camera into a v4l2loopback video device.
///
/// Register a loopback device once with `rtspcam register`, then stream into it with `rtspcam run`.
/// Any program reading the device then sees the camera as a local webcam.
#[derive(Debug, Clone, Parser)]
#[command(name = "rtspcam", author, version, about)]
#[cfg_attr(debug_assertions, command(before_help = "⚠ DEBUG BUILD ⚠"))]
pub struct Args {
	#[command(subcommand)]
	pub action: Action,

	/// Directory where video device nodes live
	///
	/// Only useful for testing.
	#[arg(
		long,
		global = true,
		hide = true,
		env = "RTSPCAM_DEV_DIR",
		default_value = "/dev",
		value_hint = ValueHint::DirPath,
	)]
	pub dev_dir: PathBuf,

	#[command(flatten)]
	pub logging: LoggingArgs,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Action {
	/// Check whether a video device exists
	///
	/// Exits with 0 if it does, 1 if it doesn't.
	Status {
		/// Device number, as in /dev/videoN
		device: DeviceNumber,
	},

	/// Create a video device by loading v4l2loopback
	///
	/// This asks for your sudo password. v4l2loopback only takes device options when it's loaded,
	/// so this fails if the module is already loaded; unload it first with
	/// `sudo modprobe -r v4l2loopback`.
	Register(RegisterArgs),

	/// Stream an RTSP camera into a video device
	///
	/// Runs a GStreamer pipeline until it ends or until interrupted (Ctrl-C, SIGTERM, SIGHUP), at
	/// which point it's stopped gracefully.
	Run(RunArgs),
}

#[derive(Debug, Clone, Parser)]
pub struct RegisterArgs {
	/// Device number, as in /dev/videoN
	pub device: DeviceNumber,

	/// Name shown for the camera by programs using it
	///
	/// Defaults to "RTSP-Cam".
	#[arg(long, short, help_heading = OPTSET_DEVICE)]
	pub label: Option<String>,

	/// Program used to gain root privileges
	///
	/// It's called as `<PROGRAM> -S -p '' sh -c <command>` with the password on its stdin, like
	/// sudo expects.
	#[arg(
		long,
		help_heading = OPTSET_DEVICE,
		env = "RTSPCAM_SUDO",
		default_value = "sudo",
		value_name = "PROGRAM",
		value_hint = ValueHint::CommandName,
	)]
	pub sudo: OsString,
}

#[derive(Debug, Clone, Parser)]
pub struct RunArgs {
	/// RTSP URL of the camera
	#[arg(long, short)]
	pub url: String,

	/// Device number to stream into, as in /dev/videoN
	#[arg(long, short)]
	pub device: DeviceNumber,

	/// Time to wait for the pipeline to exit gracefully
	///
	/// When stopping, the pipeline is sent the stop signal, which makes GStreamer flush and exit.
	/// If it hasn't exited after this time, it's forcefully killed.
	///
	/// Takes a unit-less value in seconds, or a time span value such as "2s 500ms".
	#[arg(
		long,
		help_heading = OPTSET_PIPELINE,
		env = "RTSPCAM_GRACE",
		default_value = "3",
	)]
	pub grace: TimeSpan,

	/// Signal to send to stop the pipeline
	///
	/// Input is parsed as a full signal name (like "SIGINT"), a short signal name (like "INT"), or a
	/// signal number (like "2"). All input is case-insensitive.
	#[arg(
		long,
		help_heading = OPTSET_PIPELINE,
		default_value = "SIGINT",
	)]
	pub stop_signal: Signal,

	/// The gst-launch program to run
	#[arg(
		long,
		help_heading = OPTSET_PIPELINE,
		env = "RTSPCAM_GST_LAUNCH",
		default_value = "gst-launch-1.0",
		value_name = "PROGRAM",
		value_hint = ValueHint::CommandName,
	)]
	pub gst_launch: PathBuf,
}

/// A duration given as a unit-less number of seconds, or in humantime syntax.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeSpan(pub Duration);

impl FromStr for TimeSpan {
	type Err = humantime::DurationError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		s.parse::<u64>()
			.map_or_else(
				|_: ParseIntError| humantime::parse_duration(s),
				|secs| Ok(Duration::from_secs(secs)),
			)
			.map(Self)
	}
}

pub fn get_args() -> Args {
	let args = Args::parse();
	debug!(?args, "got arguments");
	args
}
