use std::process::{Command, Output};

use assert_cmd::prelude::CommandCargoExt;
use tempfile::TempDir;

fn rtspcam(dev_dir: &TempDir, args: &[&str]) -> Output {
	Command::cargo_bin("rtspcam")
		.unwrap()
		.env_remove("RUST_LOG")
		.env("RTSPCAM_DEV_DIR", dev_dir.path())
		.args(args)
		.output()
		.unwrap()
}

fn fake_device(dev_dir: &TempDir, n: u8) {
	std::fs::write(dev_dir.path().join(format!("video{n}")), b"").unwrap();
}

#[test]
fn status_reflects_the_device_node() {
	let dev_dir = tempfile::tempdir().unwrap();

	let output = rtspcam(&dev_dir, &["status", "3"]);
	assert_eq!(output.status.code(), Some(1));
	assert!(String::from_utf8_lossy(&output.stdout).contains("does not exist"));

	fake_device(&dev_dir, 3);
	let output = rtspcam(&dev_dir, &["status", "3"]);
	assert!(output.status.success());
}

#[test]
fn run_requires_a_url() {
	let dev_dir = tempfile::tempdir().unwrap();
	fake_device(&dev_dir, 0);

	let output = rtspcam(&dev_dir, &["run", "--url", "  ", "--device", "0"]);
	assert!(!output.status.success());
	assert!(String::from_utf8_lossy(&output.stderr).contains("Please enter an RTSP URL."));
}

#[test]
fn run_requires_the_device() {
	let dev_dir = tempfile::tempdir().unwrap();

	let output = rtspcam(&dev_dir, &["run", "--url", "rtsp://cam/live", "--device", "4"]);
	assert!(!output.status.success());
	assert!(String::from_utf8_lossy(&output.stderr).contains("Register it first."));
}

#[test]
fn run_streams_pipeline_output() {
	let dev_dir = tempfile::tempdir().unwrap();
	fake_device(&dev_dir, 2);

	// echo stands in for gst-launch, printing the pipeline it was given
	let output = rtspcam(
		&dev_dir,
		&[
			"run",
			"--url",
			"rtsp://cam/live",
			"--device",
			"2",
			"--gst-launch",
			"echo",
		],
	);
	assert!(output.status.success());

	let stdout = String::from_utf8_lossy(&output.stdout);
	let lines: Vec<&str> = stdout.lines().collect();
	assert_eq!(lines.len(), 3, "unexpected output: {stdout}");
	assert!(lines[0].starts_with("$ echo -e rtspsrc location=rtsp://cam/live "));
	assert!(lines[1].contains("rtspsrc location=rtsp://cam/live latency=0"));
	assert!(lines[1].ends_with(&format!(
		"v4l2sink device={} sync=false",
		dev_dir.path().join("video2").display()
	)));
	assert_eq!(lines[2], "--- pipeline terminated ---");
}

#[test]
fn register_refuses_existing_device() {
	let dev_dir = tempfile::tempdir().unwrap();
	fake_device(&dev_dir, 1);

	let output = rtspcam(&dev_dir, &["register", "1"]);
	assert!(!output.status.success());
	assert!(String::from_utf8_lossy(&output.stderr).contains("already exists"));
}
