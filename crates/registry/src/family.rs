//! Integer id families.
//!
//! A family fixes the key space of a registry for its whole life. The 32-bit family
//! stops at `i32::MAX` so ids stay positive for consumers that store them as signed
//! 32-bit values.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Integer id assigned by a registry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntId(u64);

impl IntId {
	pub const fn new(raw: u64) -> Self {
		Self(raw)
	}

	pub const fn get(self) -> u64 {
		self.0
	}
}

impl fmt::Display for IntId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

impl From<u32> for IntId {
	fn from(raw: u32) -> Self {
		Self(u64::from(raw))
	}
}

impl From<u64> for IntId {
	fn from(raw: u64) -> Self {
		Self(raw)
	}
}

impl From<IntId> for u64 {
	fn from(id: IntId) -> Self {
		id.0
	}
}

/// Width of a registry's key space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdFamily {
	/// Ids in `[0, 2^31 - 1]`.
	#[default]
	#[serde(rename = "32", alias = "family32")]
	Bits32,
	/// Ids in `[0, 2^63 - 1]`.
	#[serde(rename = "64", alias = "family64")]
	Bits64,
}

impl IdFamily {
	/// Largest id the family can store.
	pub const fn max_id(self) -> IntId {
		match self {
			Self::Bits32 => IntId(i32::MAX as u64),
			Self::Bits64 => IntId(i64::MAX as u64),
		}
	}

	/// Returns true if `id` fits the family.
	pub const fn contains(self, id: IntId) -> bool {
		id.0 <= self.max_id().0
	}
}

impl fmt::Display for IdFamily {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Bits32 => f.write_str("family32"),
			Self::Bits64 => f.write_str("family64"),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn bounds_stay_in_signed_range() {
		assert_eq!(IdFamily::Bits32.max_id().get(), (1 << 31) - 1);
		assert_eq!(IdFamily::Bits64.max_id().get(), (1 << 63) - 1);
		assert!(IdFamily::Bits32.contains(IntId::new(i32::MAX as u64)));
		assert!(!IdFamily::Bits32.contains(IntId::new(1 << 31)));
		assert!(IdFamily::Bits64.contains(IntId::new(1 << 31)));
	}
}
