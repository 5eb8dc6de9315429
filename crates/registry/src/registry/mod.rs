//! Bidirectional integer id registry.
//!
//! # Purpose
//!
//! Assign small collision-free integer ids to shared objects and resolve them in both
//! directions: `id -> object` through the ordered [`IdStore`], `object -> id` through
//! the registry's [`IdSlot`] without a reverse index.
//!
//! # Mental model
//!
//! * The store owns the authoritative mapping. The slot only caches, per object, the
//!   id the store should hold for it.
//! * `get_id` trusts the slot but verifies it against the store. A cached id that
//!   the store maps elsewhere (or nowhere) is a mismatch, not a missing id.
//! * Each effective mutation publishes one registry-scoped event on the bus once the
//!   store and the slot agree again.
//!
//! # Invariants
//!
//! * Every stored id lies in `[0, family.max_id()]`.
//!   - Enforced in: [`IdentityRegistry::register`].
//! * For a registered object `o` with cached id `u`, `store[u]` is `o`.
//!   - Enforced in: [`IdentityRegistry::register`] (rollback), [`IdentityRegistry::unregister`].
//!   - Failure symptom: `get_id` returns [`IntIdError::IdMismatch`].
//! * A generator collision never mutates the store.
//!   - Enforced in: [`IdentityRegistry::register`] (`IdInUse` check before insert).
//!
//! # Concurrency & ordering
//!
//! * Lookups share a read lock; `register`, `unregister` and `generate_id` take the
//!   write lock, so mutations of one registry are serialized.
//! * Events are emitted after the lock is released. Listeners may call back into the
//!   registry.
//! * Because emission happens outside the lock, racing mutations of the same object
//!   on different threads may reach listeners out of order (a `Removed` ahead of the
//!   `Added` it undoes). Each [`IdChange`] carries a `sequence` taken under the write
//!   lock; listeners that need mutation order sort or discard by it.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::bus::EventBus;
use crate::error::{IntIdError, Result};
use crate::event::{IdChange, IdEvent, RegistryKey};
use crate::family::{IdFamily, IntId};
use crate::generate::{GenerateCtx, IdGenerator, SequentialIds};
use crate::slot::{IdSlot, SideTable};
use crate::store::{BTreeStore, IdStore};
use crate::subject::{Subject, identity};


/// Object-safe registry contract, used where registries with different stores
/// are handled together.
pub trait IntIds<T: ?Sized>: Send + Sync {
	/// Process-unique identity of this registry.
	fn key(&self) -> RegistryKey;

	/// Name of the slot that caches ids on objects.
	fn attribute(&self) -> &str;

	fn family(&self) -> IdFamily;

	/// Returns the object registered under `id`.
	fn get_object(&self, id: IntId) -> Result<Arc<T>>;

	/// Like [`IntIds::get_object`], with `None` for an unknown id.
	fn query_object(&self, id: IntId) -> Result<Option<Arc<T>>>;

	/// Returns the id of `object`.
	fn get_id(&self, object: &dyn Subject<T>) -> Result<IntId>;

	/// Like [`IntIds::get_id`], with `None` when the object has no valid id.
	fn query_id(&self, object: &dyn Subject<T>) -> Result<Option<IntId>>;

	/// Registers `object`, returning its existing id if it already has one.
	fn register(&self, object: &dyn Subject<T>) -> Result<IntId>;

	/// Releases the id of `object`, if any.
	fn unregister(&self, object: &dyn Subject<T>) -> Result<()>;

	fn len(&self) -> usize;

	/// `(id, object)` pairs in ascending id order.
	fn items(&self) -> Result<Vec<(IntId, Arc<T>)>>;

	/// Ids in ascending order, as of the call.
	fn iter_ids(&self) -> Result<IdIter>;

	fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

/// Mutable registry state, guarded as one unit.
struct RegistryState<T: ?Sized, S> {
	refs: S,
	slots: Box<dyn IdSlot<T>>,
	generator: Box<dyn IdGenerator<T>>,
	/// Bumped for every event published, under the write lock.
	sequence: u64,
}

/// Two-way mapping between objects and integer ids.
pub struct IdentityRegistry<T: ?Sized, S = BTreeStore<T>> {
	key: RegistryKey,
	attribute: Arc<str>,
	family: IdFamily,
	state: RwLock<RegistryState<T, S>>,
	bus: Arc<EventBus<T>>,
}

impl<T> IdentityRegistry<T>
where
	T: ?Sized + Send + Sync + 'static,
{
	/// Creates an empty in-memory registry with its own event bus.
	pub fn new(attribute: impl Into<Arc<str>>, family: IdFamily) -> Self {
		Self::with_store(attribute, family, BTreeStore::new())
	}
}

impl<T, S> IdentityRegistry<T, S>
where
	T: ?Sized + Send + Sync + 'static,
	S: IdStore<T>,
{
	/// Creates a registry over `store`, which should start empty.
	pub fn with_store(attribute: impl Into<Arc<str>>, family: IdFamily, store: S) -> Self {
		Self {
			key: RegistryKey::next(),
			attribute: attribute.into(),
			family,
			state: RwLock::new(RegistryState {
				refs: store,
				slots: Box::new(SideTable::new()),
				generator: Box::new(SequentialIds::new()),
				sequence: 0,
			}),
			bus: EventBus::shared(),
		}
	}

	/// Publishes events on `bus` instead of a private bus.
	pub fn with_bus(mut self, bus: Arc<EventBus<T>>) -> Self {
		self.bus = bus;
		self
	}

	/// Replaces the id generation strategy.
	pub fn with_generator(self, generator: impl IdGenerator<T> + 'static) -> Self {
		self.state.write().generator = Box::new(generator);
		self
	}

	/// Replaces the cached id slot.
	pub fn with_slot(self, slot: impl IdSlot<T> + 'static) -> Self {
		self.state.write().slots = Box::new(slot);
		self
	}

	pub fn key(&self) -> RegistryKey {
		self.key
	}

	pub fn attribute(&self) -> &str {
		&self.attribute
	}

	pub fn family(&self) -> IdFamily {
		self.family
	}

	/// Bus this registry publishes on.
	pub fn bus(&self) -> &Arc<EventBus<T>> {
		&self.bus
	}

	pub fn get_object(&self, id: IntId) -> Result<Arc<T>> {
		self.query_object(id)?.ok_or(IntIdError::ObjectMissing(id))
	}

	/// Ids outside the family never reach the store.
	pub fn query_object(&self, id: IntId) -> Result<Option<Arc<T>>> {
		if !self.family.contains(id) {
			return Ok(None);
		}
		Ok(self.state.read().refs.get(id)?)
	}

	pub fn get_id(&self, object: impl Subject<T>) -> Result<IntId> {
		let state = self.state.read();
		self.resolve(&state, object.subject())
	}

	pub fn query_id(&self, object: impl Subject<T>) -> Result<Option<IntId>> {
		let state = self.state.read();
		self.query(&state, object.subject())
	}

	/// Raw cached id of `object`, without verifying it against the store.
	pub fn cached_id(&self, object: impl Subject<T>) -> Option<IntId> {
		self.state.read().slots.get(object.subject())
	}

	/// Runs the generator once. The id is not reserved.
	pub fn generate_id(&self, object: impl Subject<T>) -> Result<IntId> {
		let mut guard = self.state.write();
		let state = &mut *guard;
		let ctx = GenerateCtx::new(self.family, &state.refs);
		state.generator.generate_id(&ctx, object.subject())
	}

	pub fn register(&self, object: impl Subject<T>) -> Result<IntId> {
		let object = Arc::clone(object.subject());
		let (id, sequence) = {
			let mut guard = self.state.write();
			let state = &mut *guard;
			let id = match self.query(state, &object)? {
				Some(id) => id,
				None => self.assign(state, &object)?,
			};
			(id, state.next_sequence())
		};
		self.bus.emit(&IdEvent::Added(self.change(object, id, sequence)));
		Ok(id)
	}

	pub fn unregister(&self, object: impl Subject<T>) -> Result<()> {
		let object = Arc::clone(object.subject());
		let (id, sequence) = {
			let mut guard = self.state.write();
			let state = &mut *guard;
			let Some(id) = self.query(state, &object)? else {
				return Ok(());
			};
			state.refs.remove(id)?;
			if let Err(err) = state.slots.set(&object, None) {
				warn!(registry = %self.key, attribute = %self.attribute, %id, %err, "rolling back release");
				state.refs.insert(id, Arc::clone(&object))?;
				return Err(err.into());
			}
			(id, state.next_sequence())
		};
		debug!(registry = %self.key, attribute = %self.attribute, %id, "released id");
		self.bus.emit(&IdEvent::Removed(self.change(object, id, sequence)));
		Ok(())
	}

	/// Number of registered objects.
	pub fn len(&self) -> usize {
		self.state.read().refs.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// `(id, object)` pairs in ascending id order.
	pub fn items(&self) -> Result<Vec<(IntId, Arc<T>)>> {
		Ok(self.state.read().refs.items()?.collect())
	}

	/// Ids in ascending order, as of the call.
	pub fn iter_ids(&self) -> Result<IdIter> {
		let ids: Vec<IntId> = self.state.read().refs.keys()?.collect();
		Ok(IdIter {
			ids: ids.into_iter(),
		})
	}

	fn resolve(&self, state: &RegistryState<T, S>, object: &Arc<T>) -> Result<IntId> {
		let Some(id) = state.slots.get(object) else {
			return Err(IntIdError::IdMissing {
				attribute: self.attribute.to_string(),
			});
		};
		match state.refs.get(id)? {
			Some(stored) if identity(&stored) == identity(object) => Ok(id),
			_ => {
				warn!(registry = %self.key, attribute = %self.attribute, %id, "cached id does not resolve back");
				Err(IntIdError::IdMismatch {
					attribute: self.attribute.to_string(),
					id,
				})
			}
		}
	}

	fn query(&self, state: &RegistryState<T, S>, object: &Arc<T>) -> Result<Option<IntId>> {
		match self.resolve(state, object) {
			Ok(id) => Ok(Some(id)),
			Err(err) if err.is_not_found() => Ok(None),
			Err(err) => Err(err),
		}
	}

	fn assign(&self, state: &mut RegistryState<T, S>, object: &Arc<T>) -> Result<IntId> {
		let ctx = GenerateCtx::new(self.family, &state.refs);
		let id = state.generator.generate_id(&ctx, object)?;
		if !self.family.contains(id) {
			return Err(IntIdError::OutOfRange {
				id,
				family: self.family,
			});
		}
		if state.refs.contains(id)? {
			warn!(registry = %self.key, attribute = %self.attribute, %id, "id generator returned a used id");
			return Err(IntIdError::IdInUse(id));
		}

		state.refs.insert(id, Arc::clone(object))?;
		if let Err(err) = state.slots.set(object, Some(id)) {
			warn!(registry = %self.key, attribute = %self.attribute, %id, %err, "rolling back registration");
			state.refs.remove(id)?;
			return Err(err.into());
		}
		debug!(registry = %self.key, attribute = %self.attribute, %id, "assigned id");
		Ok(id)
	}

	fn change(&self, object: Arc<T>, id: IntId, sequence: u64) -> IdChange<T> {
		IdChange {
			object,
			registry: self.key,
			attribute: Arc::clone(&self.attribute),
			id,
			sequence,
		}
	}
}

impl<T: ?Sized, S> RegistryState<T, S> {
	fn next_sequence(&mut self) -> u64 {
		self.sequence += 1;
		self.sequence
	}
}

impl<T, S> IntIds<T> for IdentityRegistry<T, S>
where
	T: ?Sized + Send + Sync + 'static,
	S: IdStore<T>,
{
	fn key(&self) -> RegistryKey {
		self.key
	}

	fn attribute(&self) -> &str {
		&self.attribute
	}

	fn family(&self) -> IdFamily {
		self.family
	}

	fn get_object(&self, id: IntId) -> Result<Arc<T>> {
		IdentityRegistry::get_object(self, id)
	}

	fn query_object(&self, id: IntId) -> Result<Option<Arc<T>>> {
		IdentityRegistry::query_object(self, id)
	}

	fn get_id(&self, object: &dyn Subject<T>) -> Result<IntId> {
		IdentityRegistry::get_id(self, object)
	}

	fn query_id(&self, object: &dyn Subject<T>) -> Result<Option<IntId>> {
		IdentityRegistry::query_id(self, object)
	}

	fn register(&self, object: &dyn Subject<T>) -> Result<IntId> {
		IdentityRegistry::register(self, object)
	}

	fn unregister(&self, object: &dyn Subject<T>) -> Result<()> {
		IdentityRegistry::unregister(self, object)
	}

	fn len(&self) -> usize {
		IdentityRegistry::len(self)
	}

	fn items(&self) -> Result<Vec<(IntId, Arc<T>)>> {
		IdentityRegistry::items(self)
	}

	fn iter_ids(&self) -> Result<IdIter> {
		IdentityRegistry::iter_ids(self)
	}
}

impl<T, S> fmt::Debug for IdentityRegistry<T, S>
where
	T: ?Sized,
	S: IdStore<T>,
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("IdentityRegistry")
			.field("key", &self.key)
			.field("attribute", &self.attribute)
			.field("family", &self.family)
			.field("len", &self.state.read().refs.len())
			.finish()
	}
}

/// Owned iterator over a registry's ids.
///
/// Cloning restarts from the clone point; the ids reflect the registry when
/// [`IdentityRegistry::iter_ids`] was called.
#[derive(Debug, Clone)]
pub struct IdIter {
	ids: std::vec::IntoIter<IntId>,
}

impl Iterator for IdIter {
	type Item = IntId;

	fn next(&mut self) -> Option<IntId> {
		self.ids.next()
	}

	fn size_hint(&self) -> (usize, Option<usize>) {
		self.ids.size_hint()
	}
}

impl ExactSizeIterator for IdIter {}
