//! Registry discovery.

use std::fmt;
use std::sync::Arc;

use intid_registry::{
	ConfigError, EventBus, IdentityRegistry, IntIds, RegistriesConfig, RegistryKey,
};
use parking_lot::RwLock;
use tracing::debug;

/// Source of the registries a coordinator drives.
///
/// Each call returns the currently active registries. The order must be stable
/// between calls for the same set; it decides the order of per-registry events.
pub trait RegistryProvider<T: ?Sized>: Send + Sync {
	fn registries(&self) -> Vec<Arc<dyn IntIds<T>>>;
}

impl<T, F> RegistryProvider<T> for F
where
	T: ?Sized,
	F: Fn() -> Vec<Arc<dyn IntIds<T>>> + Send + Sync,
{
	fn registries(&self) -> Vec<Arc<dyn IntIds<T>>> {
		self()
	}
}

/// Insertion-ordered set of registries that may change at runtime.
pub struct RegistrySet<T: ?Sized> {
	registries: RwLock<Vec<Arc<dyn IntIds<T>>>>,
}

impl<T: ?Sized> Default for RegistrySet<T> {
	fn default() -> Self {
		Self {
			registries: RwLock::new(Vec::new()),
		}
	}
}

impl<T: ?Sized> fmt::Debug for RegistrySet<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_list().entries(self.keys()).finish()
	}
}

impl<T: ?Sized> RegistrySet<T> {
	pub fn new() -> Self {
		Self::default()
	}

	/// Adds `registry` at the end. Returns false if it is already present.
	pub fn insert(&self, registry: Arc<dyn IntIds<T>>) -> bool {
		let mut registries = self.registries.write();
		let key = registry.key();
		if registries.iter().any(|r| r.key() == key) {
			return false;
		}
		debug!(registry = %key, attribute = registry.attribute(), "registry activated");
		registries.push(registry);
		true
	}

	/// Removes the registry with `key`, keeping the order of the rest.
	pub fn remove(&self, key: RegistryKey) -> Option<Arc<dyn IntIds<T>>> {
		let mut registries = self.registries.write();
		let index = registries.iter().position(|r| r.key() == key)?;
		debug!(registry = %key, "registry deactivated");
		Some(registries.remove(index))
	}

	pub fn get(&self, key: RegistryKey) -> Option<Arc<dyn IntIds<T>>> {
		self.registries
			.read()
			.iter()
			.find(|r| r.key() == key)
			.cloned()
	}

	/// Looks a registry up by its slot name.
	pub fn by_attribute(&self, attribute: &str) -> Option<Arc<dyn IntIds<T>>> {
		self.registries
			.read()
			.iter()
			.find(|r| r.attribute() == attribute)
			.cloned()
	}

	pub fn keys(&self) -> Vec<RegistryKey> {
		self.registries.read().iter().map(|r| r.key()).collect()
	}

	pub fn len(&self) -> usize {
		self.registries.read().len()
	}

	pub fn is_empty(&self) -> bool {
		self.registries.read().is_empty()
	}
}

impl<T> RegistrySet<T>
where
	T: ?Sized + Send + Sync + 'static,
{
	/// Builds every configured registry, in configuration order, publishing on `bus`.
	pub fn from_config(config: &RegistriesConfig, bus: &Arc<EventBus<T>>) -> Result<Self, ConfigError> {
		config.validate()?;
		let set = Self::new();
		for entry in &config.registries {
			let registry = IdentityRegistry::from_config(entry, Arc::clone(bus))?;
			set.insert(Arc::new(registry));
		}
		Ok(set)
	}
}

impl<T: ?Sized> RegistryProvider<T> for RegistrySet<T> {
	fn registries(&self) -> Vec<Arc<dyn IntIds<T>>> {
		self.registries.read().clone()
	}
}
