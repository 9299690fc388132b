//! Device numbers.

use std::{fmt, num::IntErrorKind, str::FromStr};

use crate::errors::DeviceNumberError;

/// The number of a video device node, `N` in `/dev/videoN`.
///
/// v4l2loopback accepts 0 to 63 (`MAX_DEVICES`), so that's all this holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceNumber(u8);

impl DeviceNumber {
	/// The highest valid device number.
	pub const MAX: u8 = 63;

	/// Check and wrap a raw number.
	pub const fn new(number: u8) -> Option<Self> {
		if number <= Self::MAX {
			Some(Self(number))
		} else {
			None
		}
	}

	/// The raw number.
	#[must_use]
	pub const fn get(self) -> u8 {
		self.0
	}
}

impl fmt::Display for DeviceNumber {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

impl TryFrom<u8> for DeviceNumber {
	type Error = DeviceNumberError;

	fn try_from(number: u8) -> Result<Self, Self::Error> {
		Self::new(number).ok_or_else(|| DeviceNumberError::new(number.to_string(), "out of range"))
	}
}

impl TryFrom<i64> for DeviceNumber {
	type Error = DeviceNumberError;

	fn try_from(number: i64) -> Result<Self, Self::Error> {
		u8::try_from(number)
			.ok()
			.and_then(Self::new)
			.ok_or_else(|| DeviceNumberError::new(number.to_string(), "out of range"))
	}
}

impl FromStr for DeviceNumber {
	type Err = DeviceNumberError;

	/// Parses a bare number, or a device path like `/dev/video2` or `video2`.
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let trimmed = s.trim();
		let name = trimmed.strip_prefix("/dev/").unwrap_or(trimmed);
		let digits = name.strip_prefix("video").unwrap_or(name);

		match digits.parse::<i64>() {
			Ok(number) => {
				Self::try_from(number).map_err(|_| DeviceNumberError::new(s, "out of range"))
			}
			Err(err)
				if matches!(
					err.kind(),
					IntErrorKind::PosOverflow | IntErrorKind::NegOverflow
				) =>
			{
				Err(DeviceNumberError::new(s, "out of range"))
			}
			Err(_) => Err(DeviceNumberError::new(s, "not a number")),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn range_is_enforced() {
		assert_eq!(DeviceNumber::new(0).map(DeviceNumber::get), Some(0));
		assert_eq!(DeviceNumber::new(63).map(DeviceNumber::get), Some(63));
		assert_eq!(DeviceNumber::new(64), None);
		assert!(DeviceNumber::try_from(-1_i64).is_err());
		assert!(DeviceNumber::try_from(200_u8).is_err());
	}

	#[test]
	fn parses_numbers_and_paths() {
		assert_eq!("10".parse::<DeviceNumber>().unwrap().get(), 10);
		assert_eq!(" 7 ".parse::<DeviceNumber>().unwrap().get(), 7);
		assert_eq!("/dev/video2".parse::<DeviceNumber>().unwrap().get(), 2);
		assert_eq!("video63".parse::<DeviceNumber>().unwrap().get(), 63);
		assert!("64".parse::<DeviceNumber>().is_err());
		assert!("-3".parse::<DeviceNumber>().is_err());
		assert!("99999999999999999999".parse::<DeviceNumber>().is_err());
		assert!("cam".parse::<DeviceNumber>().is_err());
		assert!("".parse::<DeviceNumber>().is_err());
	}
}
