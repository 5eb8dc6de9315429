//! End-to-end lifecycle ordering across cooperating registries.
//!
//! Two registries and a coordinator share one bus; a recording listener checks
//! the exact event stream consumers such as search indexes rely on.

use std::sync::Arc;

use intid_coordinator::{MultiRegistryCoordinator, RegistryProvider, RegistrySet};
use intid_registry::{
	EventBus, EventKinds, IdEvent, IntIds, ObjectEvent, RegistriesConfig, RegistryKey,
};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Seen {
	Added(RegistryKey),
	Removed(RegistryKey),
	ObjectAdded(Vec<RegistryKey>),
	AfterAdded(Vec<RegistryKey>),
	BeforeRemoved,
	ObjectRemoved,
}

/// A document tracked by the registries.
#[derive(Debug)]
struct Doc {
	#[allow(dead_code)]
	title: &'static str,
}

struct Fixture {
	bus: Arc<EventBus<Doc>>,
	set: Arc<RegistrySet<Doc>>,
	coordinator: MultiRegistryCoordinator<Doc>,
	seen: Arc<Mutex<Vec<Seen>>>,
}

impl Fixture {
	fn new() -> Self {
		let _ = tracing_subscriber::fmt::try_init();
		let bus = EventBus::shared();
		let config = RegistriesConfig::from_toml_str(
			r#"
[[registry]]
attribute = "iid"
family = "32"

[[registry]]
attribute = "catalog_id"
family = "64"
seed = 7
"#,
		)
		.unwrap();
		let set = Arc::new(RegistrySet::from_config(&config, &bus).unwrap());
		let coordinator = MultiRegistryCoordinator::new(set.clone(), Arc::clone(&bus));

		let seen = Arc::new(Mutex::new(Vec::new()));
		let sink = Arc::clone(&seen);
		bus.subscribe(move |event: &IdEvent<Doc>| {
			let keys = |event: &IdEvent<Doc>| {
				event
					.idmap()
					.map(|idmap| idmap.keys().copied().collect::<Vec<_>>())
					.unwrap_or_default()
			};
			let entry = match event {
				IdEvent::Added(change) => Seen::Added(change.registry),
				IdEvent::Removed(change) => Seen::Removed(change.registry),
				IdEvent::ObjectAdded(_) => Seen::ObjectAdded(keys(event)),
				IdEvent::AfterAdded(_) => Seen::AfterAdded(keys(event)),
				IdEvent::BeforeRemoved(_) => Seen::BeforeRemoved,
				IdEvent::ObjectRemoved(_) => Seen::ObjectRemoved,
			};
			sink.lock().push(entry);
		});

		Self {
			bus,
			set,
			coordinator,
			seen,
		}
	}

	fn keys(&self) -> (RegistryKey, RegistryKey) {
		let keys = self.set.keys();
		(keys[0], keys[1])
	}

	fn take(&self) -> Vec<Seen> {
		std::mem::take(&mut *self.seen.lock())
	}
}

#[test]
fn add_fires_registry_events_then_aggregates() {
	let fx = Fixture::new();
	let (r1, r2) = fx.keys();
	let doc = Arc::new(Doc { title: "readme" });

	let idmap = fx
		.coordinator
		.on_object_added(&doc, &ObjectEvent::added().with_container("docs"))
		.unwrap()
		.unwrap();

	assert_eq!(
		fx.take(),
		vec![
			Seen::Added(r1),
			Seen::Added(r2),
			Seen::ObjectAdded(vec![r1, r2]),
			Seen::AfterAdded(vec![r1, r2]),
		]
	);
	let registries = fx.set.registries();
	assert_eq!(idmap.len(), 2);
	for registry in &registries {
		assert_eq!(idmap[&registry.key()], registry.get_id(&doc).unwrap());
		assert!(Arc::ptr_eq(&registry.get_object(idmap[&registry.key()]).unwrap(), &doc));

		let items = registry.items().unwrap();
		assert_eq!(items.len(), 1);
		assert_eq!(items[0].0, idmap[&registry.key()]);
		assert_eq!(registry.iter_ids().unwrap().collect::<Vec<_>>(), vec![items[0].0]);
	}
}

#[test]
fn remove_fires_aggregates_before_registry_events() {
	let fx = Fixture::new();
	let (r1, r2) = fx.keys();
	let doc = Arc::new(Doc { title: "readme" });
	fx.coordinator
		.on_object_added(&doc, &ObjectEvent::added())
		.unwrap();
	fx.take();

	assert!(
		fx.coordinator
			.on_object_removed(&doc, &ObjectEvent::removed().with_name("readme"))
			.unwrap()
	);
	assert_eq!(
		fx.take(),
		vec![
			Seen::BeforeRemoved,
			Seen::ObjectRemoved,
			Seen::Removed(r1),
			Seen::Removed(r2),
		]
	);
	for registry in fx.set.registries() {
		assert!(registry.get_id(&doc).unwrap_err().is_not_found());
		assert!(registry.is_empty());
	}
}

#[test]
fn removal_listener_still_sees_ids() {
	let fx = Fixture::new();
	let doc = Arc::new(Doc { title: "index" });
	fx.coordinator
		.on_object_added(&doc, &ObjectEvent::added())
		.unwrap();

	let observed = Arc::new(Mutex::new(Vec::new()));
	let sink = Arc::clone(&observed);
	let set = Arc::clone(&fx.set);
	fx.bus
		.subscribe_to(EventKinds::BEFORE_REMOVED, move |event| {
			for registry in set.registries() {
				sink.lock()
					.push(registry.query_id(event.object()).unwrap().is_some());
			}
		});

	fx.coordinator
		.on_object_removed(&doc, &ObjectEvent::removed())
		.unwrap();
	assert_eq!(*observed.lock(), vec![true, true]);
}

#[test]
fn readding_keeps_ids_and_refires_events() {
	let fx = Fixture::new();
	let (r1, r2) = fx.keys();
	let doc = Arc::new(Doc { title: "moved" });

	let first = fx
		.coordinator
		.on_object_added(&doc, &ObjectEvent::added())
		.unwrap();
	let second = fx
		.coordinator
		.on_object_added(&doc, &ObjectEvent::added())
		.unwrap();
	assert_eq!(first, second);
	assert_eq!(
		fx.take()
			.into_iter()
			.filter(|seen| matches!(seen, Seen::Added(_)))
			.collect::<Vec<_>>(),
		vec![
			Seen::Added(r1),
			Seen::Added(r2),
			Seen::Added(r1),
			Seen::Added(r2)
		]
	);
	for registry in fx.set.registries() {
		assert_eq!(registry.len(), 1);
	}
}

#[test]
fn object_listeners_follow_one_document() {
	let fx = Fixture::new();
	let (r1, r2) = fx.keys();
	let readme = Arc::new(Doc { title: "readme" });
	let license = Arc::new(Doc { title: "license" });

	let tracked = Arc::new(Mutex::new(Vec::new()));
	let sink = Arc::clone(&tracked);
	fx.bus
		.subscribe_object(&readme, EventKinds::REGISTRY, move |event| {
			sink.lock().push(event.change().map(|change| change.registry));
		});

	for doc in [&license, &readme] {
		fx.coordinator
			.on_object_added(doc, &ObjectEvent::added())
			.unwrap();
	}
	fx.coordinator
		.on_object_removed(&license, &ObjectEvent::removed())
		.unwrap();
	assert_eq!(*tracked.lock(), vec![Some(r1), Some(r2)]);

	fx.coordinator
		.on_object_removed(&readme, &ObjectEvent::removed())
		.unwrap();
	assert_eq!(tracked.lock().len(), 4);
	drop(readme);
	assert_eq!(fx.bus.prune(), 1);
}
