//! Synchronous in-process event dispatch.
//!
//! # Concurrency & ordering
//!
//! * [`EventBus::emit`] runs every matching listener on the caller's thread, in
//!   subscription order, before returning.
//! * The listener list is snapshotted before dispatch. Listeners may subscribe,
//!   unsubscribe or call back into registries; changes apply to the next emission.
//! * A panicking listener unwinds through `emit` and skips the remaining listeners.
//!
//! # Object listeners
//!
//! [`EventBus::subscribe_object`] scopes a listener to one object, compared by
//! identity. The bus holds the object weakly; once it is dropped the listener never
//! fires again and [`EventBus::prune`] discards it.

use std::fmt;
use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::trace;

use crate::event::{EventKinds, IdEvent};

/// Callback invoked for each matching event.
pub type Listener<T> = Arc<dyn Fn(&IdEvent<T>) + Send + Sync>;

/// Handle returned by [`EventBus::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

struct ListenerEntry<T: ?Sized> {
	subscription: Subscription,
	kinds: EventKinds,
	target: Option<Weak<T>>,
	listener: Listener<T>,
}

impl<T: ?Sized> ListenerEntry<T> {
	fn matches(&self, event: &IdEvent<T>) -> bool {
		if !self.kinds.intersects(event.kind()) {
			return false;
		}
		match &self.target {
			None => true,
			Some(target) => {
				Weak::as_ptr(target).cast::<()>() == Arc::as_ptr(event.object()).cast::<()>()
					&& target.strong_count() > 0
			}
		}
	}

	fn is_live(&self) -> bool {
		self.target.as_ref().is_none_or(|target| target.strong_count() > 0)
	}
}

/// Typed callback list shared by registries and coordinators.
pub struct EventBus<T: ?Sized> {
	listeners: RwLock<Vec<ListenerEntry<T>>>,
	next_subscription: AtomicU64,
}

impl<T: ?Sized> Default for EventBus<T> {
	fn default() -> Self {
		Self {
			listeners: RwLock::new(Vec::new()),
			next_subscription: AtomicU64::new(0),
		}
	}
}

impl<T: ?Sized> fmt::Debug for EventBus<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("EventBus")
			.field("listeners", &self.listener_count())
			.finish()
	}
}

impl<T: ?Sized> EventBus<T> {
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates a bus ready to be shared between registries and a coordinator.
	pub fn shared() -> Arc<Self> {
		Arc::new(Self::default())
	}

	/// Subscribes `listener` to every event kind.
	pub fn subscribe(&self, listener: impl Fn(&IdEvent<T>) + Send + Sync + 'static) -> Subscription {
		self.subscribe_to(EventKinds::ALL, listener)
	}

	/// Subscribes `listener` to the event kinds in `kinds`.
	pub fn subscribe_to(
		&self,
		kinds: EventKinds,
		listener: impl Fn(&IdEvent<T>) + Send + Sync + 'static,
	) -> Subscription {
		self.push(kinds, None, Arc::new(listener))
	}

	/// Subscribes `listener` to events in `kinds` about `object` only.
	pub fn subscribe_object(
		&self,
		object: &Arc<T>,
		kinds: EventKinds,
		listener: impl Fn(&IdEvent<T>) + Send + Sync + 'static,
	) -> Subscription {
		self.push(kinds, Some(Arc::downgrade(object)), Arc::new(listener))
	}

	fn push(&self, kinds: EventKinds, target: Option<Weak<T>>, listener: Listener<T>) -> Subscription {
		let subscription = Subscription(self.next_subscription.fetch_add(1, Ordering::Relaxed));
		self.listeners.write().push(ListenerEntry {
			subscription,
			kinds,
			target,
			listener,
		});
		subscription
	}

	/// Removes a listener. Returns false if it was already gone.
	pub fn unsubscribe(&self, subscription: Subscription) -> bool {
		let mut listeners = self.listeners.write();
		let before = listeners.len();
		listeners.retain(|entry| entry.subscription != subscription);
		listeners.len() != before
	}

	pub fn listener_count(&self) -> usize {
		self.listeners.read().len()
	}

	/// Drops object listeners whose object is gone. Returns how many were removed.
	pub fn prune(&self) -> usize {
		let mut listeners = self.listeners.write();
		let before = listeners.len();
		listeners.retain(ListenerEntry::is_live);
		before - listeners.len()
	}

	/// Delivers `event` to every listener subscribed to its kind.
	pub fn emit(&self, event: &IdEvent<T>) {
		let matching: Vec<Listener<T>> = self
			.listeners
			.read()
			.iter()
			.filter(|entry| entry.matches(event))
			.map(|entry| Arc::clone(&entry.listener))
			.collect();
		trace!(kind = ?event.kind(), listeners = matching.len(), "emitting id event");
		for listener in matching {
			listener(event);
		}
	}
}

#[cfg(test)]
mod tests {
	use parking_lot::Mutex;

	use super::*;
	use crate::event::{IdChange, IdsRemoved, ObjectEvent, RegistryKey};
	use crate::family::IntId;

	fn added_for(object: &Arc<str>, id: u64) -> IdEvent<str> {
		IdEvent::Added(IdChange {
			object: Arc::clone(object),
			registry: RegistryKey::next(),
			attribute: Arc::from("iid"),
			id: IntId::new(id),
			sequence: 1,
		})
	}

	fn added(id: u64) -> IdEvent<str> {
		added_for(&Arc::from("ob"), id)
	}

	#[test]
	fn listeners_run_in_subscription_order() {
		let bus = EventBus::<str>::new();
		let seen = Arc::new(Mutex::new(Vec::new()));
		for tag in ["first", "second"] {
			let seen = Arc::clone(&seen);
			bus.subscribe(move |_| seen.lock().push(tag));
		}
		bus.emit(&added(1));
		assert_eq!(*seen.lock(), ["first", "second"]);
	}

	#[test]
	fn kind_filter_skips_other_events() {
		let bus = EventBus::<str>::new();
		let seen = Arc::new(Mutex::new(Vec::new()));
		let sink = Arc::clone(&seen);
		bus.subscribe_to(EventKinds::COORDINATOR, move |event| sink.lock().push(event.kind()));

		bus.emit(&added(1));
		bus.emit(&IdEvent::BeforeRemoved(IdsRemoved {
			object: Arc::from("ob"),
			cause: ObjectEvent::removed(),
		}));
		assert_eq!(*seen.lock(), [EventKinds::BEFORE_REMOVED]);
	}

	#[test]
	fn unsubscribe_is_idempotent() {
		let bus = EventBus::<str>::new();
		let sub = bus.subscribe(|_| {});
		assert_eq!(bus.listener_count(), 1);
		assert!(bus.unsubscribe(sub));
		assert!(!bus.unsubscribe(sub));
		assert_eq!(bus.listener_count(), 0);
	}

	#[test]
	fn listener_may_subscribe_during_emit() {
		let bus = EventBus::<str>::shared();
		let inner = Arc::clone(&bus);
		bus.subscribe(move |_| {
			inner.subscribe(|_| {});
		});
		bus.emit(&added(1));
		assert_eq!(bus.listener_count(), 2);
	}

	#[test]
	fn object_listeners_only_see_their_object() {
		let bus = EventBus::<str>::new();
		let doc: Arc<str> = Arc::from("doc");
		let twin: Arc<str> = Arc::from("doc");
		let seen = Arc::new(Mutex::new(Vec::new()));
		let sink = Arc::clone(&seen);
		bus.subscribe_object(&doc, EventKinds::ADDED, move |event| {
			sink.lock().push(event.change().map(|change| change.id))
		});

		bus.emit(&added_for(&twin, 1));
		bus.emit(&added_for(&doc, 2));
		bus.emit(&IdEvent::BeforeRemoved(IdsRemoved {
			object: Arc::clone(&doc),
			cause: ObjectEvent::removed(),
		}));
		assert_eq!(*seen.lock(), [Some(IntId::new(2))]);
	}

	#[test]
	fn dropped_objects_release_their_listeners() {
		let bus = EventBus::<str>::new();
		bus.subscribe(|_| {});
		let doc: Arc<str> = Arc::from("doc");
		bus.subscribe_object(&doc, EventKinds::ALL, |_| panic!("object is gone"));
		assert_eq!(bus.prune(), 0);

		drop(doc);
		bus.emit(&added(1));
		assert_eq!(bus.prune(), 1);
		assert_eq!(bus.listener_count(), 1);
	}
}
