#![deny(rust_2018_idioms)]

use std::process::ExitCode;

use miette::{IntoDiagnostic, Result};

fn main() -> Result<ExitCode> {
	tokio::runtime::Builder::new_multi_thread()
		.enable_all()
		.build()
		.into_diagnostic()?
		.block_on(rtspcam_cli::run())
}
