//! Registry configuration.
//!
//! Registries are described in TOML, one `[[registry]]` table each:
//!
//! ```toml
//! [[registry]]
//! attribute = "iid"
//! family = "32"
//!
//! [[registry]]
//! attribute = "catalog_id"
//! family = "64"
//! seed = 1234
//! ```
//!
//! `family` defaults to `"32"`. A `seed` makes id generation reproducible.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::bus::EventBus;
use crate::family::IdFamily;
use crate::generate::SequentialIds;
use crate::registry::IdentityRegistry;

/// Errors that can occur when loading registry configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error reading a configuration file.
	#[error("I/O error reading {path}: {error}")]
	Io {
		path: PathBuf,
		error: std::io::Error,
	},

	#[error("TOML parse error: {0}")]
	Parse(#[from] toml::de::Error),

	/// The configuration parsed but describes an unusable registry set.
	#[error("invalid registry configuration: {0}")]
	Invalid(String),
}

/// Settings for one registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryConfig {
	/// Name of the slot caching ids on objects.
	pub attribute: String,
	#[serde(default)]
	pub family: IdFamily,
	/// Seed for the default generator; entropy when absent.
	#[serde(default)]
	pub seed: Option<u64>,
}

impl RegistryConfig {
	pub fn new(attribute: impl Into<String>, family: IdFamily) -> Self {
		Self {
			attribute: attribute.into(),
			family,
			seed: None,
		}
	}

	pub fn with_seed(mut self, seed: u64) -> Self {
		self.seed = Some(seed);
		self
	}

	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.attribute.trim().is_empty() {
			return Err(ConfigError::Invalid("attribute name must not be empty".into()));
		}
		Ok(())
	}

	/// Default generator honoring `seed`.
	pub fn generator(&self) -> SequentialIds {
		match self.seed {
			Some(seed) => SequentialIds::from_seed(seed),
			None => SequentialIds::new(),
		}
	}
}

/// A set of registries sharing one process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistriesConfig {
	#[serde(default, rename = "registry")]
	pub registries: Vec<RegistryConfig>,
}

impl RegistriesConfig {
	/// Parses and validates a TOML document.
	pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
		let config: Self = toml::from_str(input)?;
		config.validate()?;
		Ok(config)
	}

	/// Loads and validates a TOML file.
	pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let content = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		Self::from_toml_str(&content)
	}

	/// Checks every entry and rejects attribute names used twice.
	pub fn validate(&self) -> Result<(), ConfigError> {
		let mut seen = HashSet::new();
		for registry in &self.registries {
			registry.validate()?;
			if !seen.insert(registry.attribute.as_str()) {
				return Err(ConfigError::Invalid(format!(
					"attribute `{}` is configured more than once",
					registry.attribute
				)));
			}
		}
		Ok(())
	}
}

impl<T> IdentityRegistry<T>
where
	T: ?Sized + Send + Sync + 'static,
{
	/// Builds an in-memory registry publishing on `bus`.
	pub fn from_config(config: &RegistryConfig, bus: Arc<EventBus<T>>) -> Result<Self, ConfigError> {
		config.validate()?;
		Ok(Self::new(config.attribute.as_str(), config.family)
			.with_bus(bus)
			.with_generator(config.generator()))
	}
}

#[cfg(test)]
mod tests {
	use std::io::Write;

	use super::*;
	use crate::family::IntId;

	const TWO_REGISTRIES: &str = r#"
[[registry]]
attribute = "iid"

[[registry]]
attribute = "catalog_id"
family = "family64"
seed = 1234
"#;

	#[test]
	fn parses_registry_tables() {
		let config = RegistriesConfig::from_toml_str(TWO_REGISTRIES).unwrap();
		assert_eq!(
			config.registries,
			[
				RegistryConfig::new("iid", IdFamily::Bits32),
				RegistryConfig::new("catalog_id", IdFamily::Bits64).with_seed(1234),
			]
		);
	}

	#[test]
	fn empty_document_has_no_registries() {
		let config = RegistriesConfig::from_toml_str("").unwrap();
		assert!(config.registries.is_empty());
	}

	#[test]
	fn rejects_blank_and_duplicate_attributes() {
		let blank = "[[registry]]\nattribute = \" \"\n";
		assert!(matches!(
			RegistriesConfig::from_toml_str(blank),
			Err(ConfigError::Invalid(_))
		));

		let duplicate = "[[registry]]\nattribute = \"iid\"\n[[registry]]\nattribute = \"iid\"\nfamily = \"64\"\n";
		let err = RegistriesConfig::from_toml_str(duplicate).unwrap_err();
		assert!(err.to_string().contains("`iid`"), "{err}");
	}

	#[test]
	fn rejects_unknown_family() {
		let input = "[[registry]]\nattribute = \"iid\"\nfamily = \"16\"\n";
		assert!(matches!(
			RegistriesConfig::from_toml_str(input),
			Err(ConfigError::Parse(_))
		));
	}

	#[test]
	fn loads_from_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		file.write_all(TWO_REGISTRIES.as_bytes()).unwrap();
		let config = RegistriesConfig::load(file.path()).unwrap();
		assert_eq!(config.registries.len(), 2);

		let missing = file.path().with_extension("missing");
		assert!(matches!(
			RegistriesConfig::load(&missing),
			Err(ConfigError::Io { path, .. }) if path == missing
		));
	}

	#[test]
	fn seeded_registries_assign_identical_ids() {
		let config = RegistryConfig::new("iid", IdFamily::Bits64).with_seed(99);
		let a = IdentityRegistry::<str>::from_config(&config, EventBus::shared()).unwrap();
		let b = IdentityRegistry::<str>::from_config(&config, EventBus::shared()).unwrap();
		let ida = a.register(Arc::<str>::from("x")).unwrap();
		let idb = b.register(Arc::<str>::from("y")).unwrap();
		assert_eq!(ida, idb);
		assert!(IdFamily::Bits64.contains(ida));
		assert_eq!(a.attribute(), "iid");
		assert_ne!(a.key(), b.key());
		assert_ne!(ida, IntId::new(u64::MAX));
	}
}
