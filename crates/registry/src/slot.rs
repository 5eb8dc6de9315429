//! Cached id slots.
//!
//! A slot remembers, per object, the id a registry assigned to it so `object -> id`
//! lookups need no reverse index over the store. The default [`SideTable`] keeps the
//! slot beside the registry instead of on the object, holding only a [`Weak`]
//! back-reference so it never extends an object's lifetime.
//!
//! # Invariants
//!
//! * A slot entry whose back-reference is dead reads as unset. The address may have
//!   been reused by an unrelated object.
//! * Clearing writes an explicit `None`; callers treat it exactly like unset.

use std::sync::{Arc, Weak};

use rustc_hash::FxHashMap;

use crate::error::AttributeError;
use crate::family::IntId;
use crate::subject::identity;

/// Floor for the lazy pruning threshold.
const MIN_PRUNE_AT: usize = 64;

/// Per-object storage for a registry's cached id.
pub trait IdSlot<T: ?Sized>: Send + Sync {
	/// Reads the cached id, `None` when unset or cleared.
	fn get(&self, object: &Arc<T>) -> Option<IntId>;

	/// Writes the cached id. `None` clears it.
	fn set(&mut self, object: &Arc<T>, id: Option<IntId>) -> Result<(), AttributeError>;
}

struct SlotEntry<T: ?Sized> {
	object: Weak<T>,
	id: Option<IntId>,
}

/// Identity-keyed side table of cached ids.
pub struct SideTable<T: ?Sized> {
	entries: FxHashMap<usize, SlotEntry<T>>,
	prune_at: usize,
}

impl<T: ?Sized> Default for SideTable<T> {
	fn default() -> Self {
		Self {
			entries: FxHashMap::default(),
			prune_at: MIN_PRUNE_AT,
		}
	}
}

impl<T: ?Sized> SideTable<T> {
	pub fn new() -> Self {
		Self::default()
	}

	/// Number of entries whose objects are still alive.
	pub fn len(&self) -> usize {
		self.entries
			.values()
			.filter(|entry| entry.object.strong_count() > 0)
			.count()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	fn prune(&mut self) {
		self.entries.retain(|_, entry| entry.object.strong_count() > 0);
		self.prune_at = (self.entries.len() * 2).max(MIN_PRUNE_AT);
	}
}

impl<T: ?Sized + Send + Sync> IdSlot<T> for SideTable<T> {
	fn get(&self, object: &Arc<T>) -> Option<IntId> {
		let entry = self.entries.get(&identity(object))?;
		if entry.object.strong_count() == 0 {
			return None;
		}
		entry.id
	}

	fn set(&mut self, object: &Arc<T>, id: Option<IntId>) -> Result<(), AttributeError> {
		if self.entries.len() >= self.prune_at {
			self.prune();
		}
		self.entries.insert(
			identity(object),
			SlotEntry {
				object: Arc::downgrade(object),
				id,
			},
		);
		Ok(())
	}
}
