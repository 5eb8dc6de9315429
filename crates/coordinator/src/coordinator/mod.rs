//! Lifecycle notification handling across registries.
//!
//! # Invariants
//!
//! * Every per-registry `Added` event precedes `ObjectAdded`, which precedes
//!   `AfterAdded`.
//! * `BeforeRemoved` and `ObjectRemoved` fire at most once per notification, and
//!   before any registry releases its id.
//! * Registrations across registries are not atomic. A failure part way through
//!   leaves earlier registrations committed and publishes no aggregate event.
//!
//! # Errors
//!
//! Not-found errors while releasing ids are skipped. Every other error, storage
//! failures included, aborts the notification and propagates unchanged.

use std::fmt;
use std::sync::Arc;

use intid_registry::{
	EventBus, IdEvent, IdMap, IdsAdded, IdsRemoved, IntIds, ObjectEvent, ObjectEventKind,
	Result, Subject,
};
use tracing::debug;

use crate::provider::RegistryProvider;


/// Gate deciding whether an object has a stable identity worth registering.
pub type KeyCheck<T> = Box<dyn Fn(&Arc<T>) -> bool + Send + Sync>;

/// Keeps every active registry in step with object lifecycle notifications.
pub struct MultiRegistryCoordinator<T: ?Sized> {
	provider: Arc<dyn RegistryProvider<T>>,
	bus: Arc<EventBus<T>>,
	key_check: KeyCheck<T>,
}

impl<T: ?Sized> fmt::Debug for MultiRegistryCoordinator<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("MultiRegistryCoordinator")
			.field("registries", &self.provider.registries().len())
			.field("bus", &self.bus)
			.finish_non_exhaustive()
	}
}

impl<T> MultiRegistryCoordinator<T>
where
	T: ?Sized + Send + Sync + 'static,
{
	/// Creates a coordinator publishing aggregate events on `bus`.
	///
	/// Registries should publish on the same bus for listeners to observe one
	/// ordered stream.
	pub fn new(provider: Arc<dyn RegistryProvider<T>>, bus: Arc<EventBus<T>>) -> Self {
		Self {
			provider,
			bus,
			key_check: Box::new(|_| true),
		}
	}

	/// Skips objects for which `check` returns false.
	pub fn with_key_check(mut self, check: impl Fn(&Arc<T>) -> bool + Send + Sync + 'static) -> Self {
		self.key_check = Box::new(check);
		self
	}

	pub fn bus(&self) -> &Arc<EventBus<T>> {
		&self.bus
	}

	/// Registers `object` everywhere and publishes the aggregate add events.
	///
	/// Returns the published idmap, or `None` when there is nothing to do.
	pub fn on_object_added(&self, object: impl Subject<T>, cause: &ObjectEvent) -> Result<Option<IdMap>> {
		let object = object.subject();
		let Some(registries) = self.active(object) else {
			return Ok(None);
		};

		let mut idmap = IdMap::with_capacity(registries.len());
		for registry in &registries {
			let id = registry.register(object)?;
			idmap.insert(registry.key(), id);
		}

		let added = IdsAdded {
			object: Arc::clone(object),
			cause: cause.clone(),
			idmap,
		};
		self.bus.emit(&IdEvent::ObjectAdded(added.clone()));
		self.bus.emit(&IdEvent::AfterAdded(added.clone()));
		Ok(Some(added.idmap))
	}

	/// Releases `object` from every registry.
	///
	/// Returns true if the aggregate removal events were published, i.e. some
	/// registry still held an id for the object.
	pub fn on_object_removed(&self, object: impl Subject<T>, cause: &ObjectEvent) -> Result<bool> {
		let object = object.subject();
		let Some(registries) = self.active(object) else {
			return Ok(false);
		};

		let mut notified = false;
		for registry in &registries {
			if !notified && registry.query_id(object)?.is_some() {
				notified = true;
				let removed = IdsRemoved {
					object: Arc::clone(object),
					cause: cause.clone(),
				};
				self.bus.emit(&IdEvent::BeforeRemoved(removed.clone()));
				self.bus.emit(&IdEvent::ObjectRemoved(removed));
			}
			match registry.unregister(object) {
				Ok(()) => {}
				Err(err) if err.is_not_found() => {
					debug!(registry = %registry.key(), %err, "id already gone");
				}
				Err(err) => return Err(err),
			}
		}
		Ok(notified)
	}

	/// Routes `event` to [`Self::on_object_added`] or [`Self::on_object_removed`].
	///
	/// Returns true if aggregate events were published.
	pub fn dispatch(&self, object: impl Subject<T>, event: &ObjectEvent) -> Result<bool> {
		match event.kind {
			ObjectEventKind::Added => Ok(self.on_object_added(object, event)?.is_some()),
			ObjectEventKind::Removed => self.on_object_removed(object, event),
		}
	}

	fn active(&self, object: &Arc<T>) -> Option<Vec<Arc<dyn IntIds<T>>>> {
		let registries = self.provider.registries();
		if registries.is_empty() {
			debug!("no active registries, skipping notification");
			return None;
		}
		if !(self.key_check)(object) {
			debug!("object has no stable key, skipping notification");
			return None;
		}
		Some(registries)
	}
}
