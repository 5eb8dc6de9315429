//! Ordered id-to-object storage.
//!
//! The registry only needs an ordered integer-keyed map. Durable engines implement
//! [`IdStore`] and report their own failures as [`StorageError`]; the registry never
//! reinterprets those as absence.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::StorageError;
use crate::family::IntId;

/// Ordered map from id to object reference.
pub trait IdStore<T: ?Sized>: Send + Sync {
	/// Returns the object stored under `id`.
	fn get(&self, id: IntId) -> Result<Option<Arc<T>>, StorageError>;

	/// Returns true if `id` is occupied.
	fn contains(&self, id: IntId) -> Result<bool, StorageError> {
		Ok(self.get(id)?.is_some())
	}

	/// Stores `object` under `id`, returning the previous occupant.
	fn insert(&mut self, id: IntId, object: Arc<T>) -> Result<Option<Arc<T>>, StorageError>;

	/// Removes `id`, returning the previous occupant.
	fn remove(&mut self, id: IntId) -> Result<Option<Arc<T>>, StorageError>;

	/// Number of stored ids.
	fn len(&self) -> usize;

	fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Ids in ascending order.
	fn keys(&self) -> Result<Box<dyn Iterator<Item = IntId> + '_>, StorageError>;

	/// `(id, object)` pairs in ascending id order.
	fn items(&self) -> Result<Box<dyn Iterator<Item = (IntId, Arc<T>)> + '_>, StorageError>;
}

/// In-memory [`IdStore`] backed by a [`BTreeMap`].
pub struct BTreeStore<T: ?Sized> {
	refs: BTreeMap<IntId, Arc<T>>,
}

impl<T: ?Sized> Default for BTreeStore<T> {
	fn default() -> Self {
		Self {
			refs: BTreeMap::new(),
		}
	}
}

impl<T: ?Sized> BTreeStore<T> {
	pub fn new() -> Self {
		Self::default()
	}
}

impl<T: ?Sized + Send + Sync> IdStore<T> for BTreeStore<T> {
	fn get(&self, id: IntId) -> Result<Option<Arc<T>>, StorageError> {
		Ok(self.refs.get(&id).cloned())
	}

	fn contains(&self, id: IntId) -> Result<bool, StorageError> {
		Ok(self.refs.contains_key(&id))
	}

	fn insert(&mut self, id: IntId, object: Arc<T>) -> Result<Option<Arc<T>>, StorageError> {
		Ok(self.refs.insert(id, object))
	}

	fn remove(&mut self, id: IntId) -> Result<Option<Arc<T>>, StorageError> {
		Ok(self.refs.remove(&id))
	}

	fn len(&self) -> usize {
		self.refs.len()
	}

	fn keys(&self) -> Result<Box<dyn Iterator<Item = IntId> + '_>, StorageError> {
		Ok(Box::new(self.refs.keys().copied()))
	}

	fn items(&self) -> Result<Box<dyn Iterator<Item = (IntId, Arc<T>)> + '_>, StorageError> {
		Ok(Box::new(self.refs.iter().map(|(id, ob)| (*id, Arc::clone(ob)))))
	}
}
