//! Lifecycle event shapes.
//!
//! Registries publish [`IdEvent::Added`] and [`IdEvent::Removed`] once per effective
//! mutation, after the store and the id slot are both updated. The remaining
//! variants are aggregate events published by a coordinator on behalf of every
//! registry it drives.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use crate::family::IntId;

/// Process-unique identity of one registry instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegistryKey(u64);

impl RegistryKey {
	/// Allocates a key no other registry in this process holds.
	pub(crate) fn next() -> Self {
		static NEXT: AtomicU64 = AtomicU64::new(1);
		Self(NEXT.fetch_add(1, Ordering::Relaxed))
	}

	pub const fn get(self) -> u64 {
		self.0
	}
}

impl fmt::Display for RegistryKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "registry#{}", self.0)
	}
}

/// Ids assigned to one object, per registry, in registration order.
pub type IdMap = IndexMap<RegistryKey, IntId>;

bitflags::bitflags! {
	/// Set of [`IdEvent`] kinds a listener subscribes to.
	#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
	pub struct EventKinds: u8 {
		const ADDED = 1 << 0;
		const REMOVED = 1 << 1;
		const OBJECT_ADDED = 1 << 2;
		const AFTER_ADDED = 1 << 3;
		const BEFORE_REMOVED = 1 << 4;
		const OBJECT_REMOVED = 1 << 5;

		/// Events published by individual registries.
		const REGISTRY = Self::ADDED.bits() | Self::REMOVED.bits();
		/// Aggregate events published by a coordinator.
		const COORDINATOR = Self::OBJECT_ADDED.bits()
			| Self::AFTER_ADDED.bits()
			| Self::BEFORE_REMOVED.bits()
			| Self::OBJECT_REMOVED.bits();
		const ALL = Self::REGISTRY.bits() | Self::COORDINATOR.bits();
	}
}

/// Kind of an external object lifecycle notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectEventKind {
	Added,
	Removed,
}

/// External notification that an object entered or left its container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEvent {
	pub kind: ObjectEventKind,
	/// Container the object was added to or removed from.
	pub container: Option<Arc<str>>,
	/// Name of the object within the container.
	pub name: Option<Arc<str>>,
}

impl ObjectEvent {
	pub fn added() -> Self {
		Self {
			kind: ObjectEventKind::Added,
			container: None,
			name: None,
		}
	}

	pub fn removed() -> Self {
		Self {
			kind: ObjectEventKind::Removed,
			container: None,
			name: None,
		}
	}

	pub fn with_container(mut self, container: impl Into<Arc<str>>) -> Self {
		self.container = Some(container.into());
		self
	}

	pub fn with_name(mut self, name: impl Into<Arc<str>>) -> Self {
		self.name = Some(name.into());
		self
	}
}

/// Payload of registry-scoped events.
#[derive(Debug)]
pub struct IdChange<T: ?Sized> {
	pub object: Arc<T>,
	pub registry: RegistryKey,
	/// Slot name of the publishing registry.
	pub attribute: Arc<str>,
	pub id: IntId,
	/// Position of the mutation among the publishing registry's events.
	pub sequence: u64,
}

impl<T: ?Sized> Clone for IdChange<T> {
	fn clone(&self) -> Self {
		Self {
			object: Arc::clone(&self.object),
			registry: self.registry,
			attribute: Arc::clone(&self.attribute),
			id: self.id,
			sequence: self.sequence,
		}
	}
}

/// Payload of the aggregate add events.
#[derive(Debug)]
pub struct IdsAdded<T: ?Sized> {
	pub object: Arc<T>,
	pub cause: ObjectEvent,
	pub idmap: IdMap,
}

impl<T: ?Sized> Clone for IdsAdded<T> {
	fn clone(&self) -> Self {
		Self {
			object: Arc::clone(&self.object),
			cause: self.cause.clone(),
			idmap: self.idmap.clone(),
		}
	}
}

/// Payload of the aggregate removal events.
#[derive(Debug)]
pub struct IdsRemoved<T: ?Sized> {
	pub object: Arc<T>,
	pub cause: ObjectEvent,
}

impl<T: ?Sized> Clone for IdsRemoved<T> {
	fn clone(&self) -> Self {
		Self {
			object: Arc::clone(&self.object),
			cause: self.cause.clone(),
		}
	}
}

/// Every event published on an [`crate::EventBus`].
#[derive(Debug)]
pub enum IdEvent<T: ?Sized> {
	/// A registry assigned an id.
	Added(IdChange<T>),
	/// A registry released an id.
	Removed(IdChange<T>),
	/// Every registry has assigned its id; carries the full idmap.
	ObjectAdded(IdsAdded<T>),
	/// Published right after [`IdEvent::ObjectAdded`] and last for an add.
	AfterAdded(IdsAdded<T>),
	/// First event of a removal, before any registry releases its id.
	BeforeRemoved(IdsRemoved<T>),
	/// Published right after [`IdEvent::BeforeRemoved`].
	ObjectRemoved(IdsRemoved<T>),
}

impl<T: ?Sized> Clone for IdEvent<T> {
	fn clone(&self) -> Self {
		match self {
			Self::Added(change) => Self::Added(change.clone()),
			Self::Removed(change) => Self::Removed(change.clone()),
			Self::ObjectAdded(added) => Self::ObjectAdded(added.clone()),
			Self::AfterAdded(added) => Self::AfterAdded(added.clone()),
			Self::BeforeRemoved(removed) => Self::BeforeRemoved(removed.clone()),
			Self::ObjectRemoved(removed) => Self::ObjectRemoved(removed.clone()),
		}
	}
}

impl<T: ?Sized> IdEvent<T> {
	pub fn kind(&self) -> EventKinds {
		match self {
			Self::Added(_) => EventKinds::ADDED,
			Self::Removed(_) => EventKinds::REMOVED,
			Self::ObjectAdded(_) => EventKinds::OBJECT_ADDED,
			Self::AfterAdded(_) => EventKinds::AFTER_ADDED,
			Self::BeforeRemoved(_) => EventKinds::BEFORE_REMOVED,
			Self::ObjectRemoved(_) => EventKinds::OBJECT_REMOVED,
		}
	}

	/// Object the event is about.
	pub fn object(&self) -> &Arc<T> {
		match self {
			Self::Added(change) | Self::Removed(change) => &change.object,
			Self::ObjectAdded(added) | Self::AfterAdded(added) => &added.object,
			Self::BeforeRemoved(removed) | Self::ObjectRemoved(removed) => &removed.object,
		}
	}

	/// Registry-scoped payload, if any.
	pub fn change(&self) -> Option<&IdChange<T>> {
		match self {
			Self::Added(change) | Self::Removed(change) => Some(change),
			_ => None,
		}
	}

	/// Idmap of an aggregate add event.
	pub fn idmap(&self) -> Option<&IdMap> {
		match self {
			Self::ObjectAdded(added) | Self::AfterAdded(added) => Some(&added.idmap),
			_ => None,
		}
	}
}
