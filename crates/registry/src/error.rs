//! Error taxonomy for id registries.
//!
//! The not-found family ([`IntIdError::ObjectMissing`], [`IntIdError::IdMissing`],
//! [`IntIdError::IdMismatch`]) is recoverable and classified by
//! [`IntIdError::is_not_found`]. [`StorageError`] never joins that family: a failing
//! store may be corrupt, and reporting it as absence would hide the corruption.

use std::error::Error as StdError;

use thiserror::Error;

use crate::family::{IdFamily, IntId};

/// Opaque failure raised by the backing [`crate::IdStore`].
///
/// Always propagated verbatim.
#[derive(Debug, Error)]
#[error("storage failure: {source}")]
pub struct StorageError {
	#[source]
	source: Box<dyn StdError + Send + Sync>,
}

impl StorageError {
	/// Wraps a store-specific error.
	pub fn new(source: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
		Self {
			source: source.into(),
		}
	}

	/// Returns the wrapped store error.
	pub fn inner(&self) -> &(dyn StdError + Send + Sync + 'static) {
		self.source.as_ref()
	}
}

/// An id slot refused to record an id for an object.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot assign `{attribute}`: {reason}")]
pub struct AttributeError {
	/// Name of the slot that rejected the write.
	pub attribute: String,
	/// Human readable reason.
	pub reason: String,
}

impl AttributeError {
	pub fn new(attribute: impl Into<String>, reason: impl Into<String>) -> Self {
		Self {
			attribute: attribute.into(),
			reason: reason.into(),
		}
	}
}

/// Errors returned by registry operations.
#[derive(Debug, Error)]
pub enum IntIdError {
	/// No object is registered under the requested id.
	#[error("no object registered under id {0}")]
	ObjectMissing(IntId),

	/// The object carries no cached id.
	#[error("object has no `{attribute}` id")]
	IdMissing { attribute: String },

	/// The object's cached id is absent from the registry or owned by another object.
	///
	/// Signals a bug or tampering; never downgrade it to [`IntIdError::IdMissing`].
	#[error("object's `{attribute}` id {id} does not resolve back to it")]
	IdMismatch { attribute: String, id: IntId },

	/// An id generator produced an id that is already taken.
	#[error("id generator returned id {0}, which is already in use")]
	IdInUse(IntId),

	/// The generator found no free id within its run budget.
	#[error("no free id found in {family} after {runs} runs")]
	Exhausted { family: IdFamily, runs: u32 },

	/// The id does not fit the registry's family.
	#[error("id {id} is out of range for {family}")]
	OutOfRange { id: IntId, family: IdFamily },

	#[error(transparent)]
	Storage(#[from] StorageError),

	#[error(transparent)]
	Attribute(#[from] AttributeError),
}

impl IntIdError {
	/// Returns true for the recoverable "key not found" family.
	///
	/// Storage failures are excluded even when the underlying store reported a
	/// missing key.
	pub fn is_not_found(&self) -> bool {
		matches!(
			self,
			Self::ObjectMissing(_) | Self::IdMissing { .. } | Self::IdMismatch { .. }
		)
	}

	/// Returns true when the error came from the backing store.
	pub fn is_storage(&self) -> bool {
		matches!(self, Self::Storage(_))
	}
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, IntIdError>;
