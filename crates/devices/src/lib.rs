//! Video loopback devices for rtspcam.
//!
//! The pipeline writes frames into a [v4l2loopback] device node, `/dev/videoN`. This crate checks
//! whether such a node exists ([`DeviceRegistry`]) and creates one by loading the kernel module
//! with the right options, as root ([`register`]).
//!
//! Nothing is cached: the device namespace changes whenever the module is loaded or unloaded, by us
//! or anyone else, so every question is answered by looking again.
//!
//! [v4l2loopback]: https://github.com/umlaeute/v4l2loopback

#![warn(clippy::unwrap_used, missing_docs, rustdoc::unescaped_backticks)]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![deny(rust_2018_idioms)]

#[doc(inline)]
pub use crate::{
	number::DeviceNumber,
	registration::{register, RegistrationRequest, DEFAULT_LABEL},
	registry::DeviceRegistry,
};

pub mod errors;
pub mod number;
pub mod registration;
pub mod registry;
