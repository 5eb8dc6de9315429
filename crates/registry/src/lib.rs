//! Integer id registries for shared objects.
//!
//! An [`IdentityRegistry`] maps collision-free integer ids to objects in an ordered
//! store and caches each object's id in an [`IdSlot`], so lookups work in both
//! directions without a reverse index. Registries publish [`IdEvent`]s on an
//! [`EventBus`]; the aggregate events are driven by a coordinator living in a
//! separate crate.
//!
//! # Modules
//!
//! - [`registry`] - the registry and its object-safe [`IntIds`] contract
//! - [`store`] - ordered `id -> object` storage
//! - [`slot`] - per-object cached ids
//! - [`generate`] - id generation strategies
//! - [`event`] / [`bus`] - lifecycle events and their dispatch
//! - [`config`] - TOML registry configuration

pub mod bus;
pub mod config;
pub mod error;
pub mod event;
pub mod family;
pub mod generate;
pub mod registry;
pub mod slot;
pub mod store;
pub mod subject;

pub use bus::{EventBus, Listener, Subscription};
pub use config::{ConfigError, RegistriesConfig, RegistryConfig};
pub use error::{AttributeError, IntIdError, Result, StorageError};
pub use event::{
	EventKinds, IdChange, IdEvent, IdMap, IdsAdded, IdsRemoved, ObjectEvent, ObjectEventKind,
	RegistryKey,
};
pub use family::{IdFamily, IntId};
pub use generate::{GenerateCtx, IdGenerator, SequentialIds};
pub use registry::{IdIter, IdentityRegistry, IntIds};
pub use slot::{IdSlot, SideTable};
pub use store::{BTreeStore, IdStore};
pub use subject::Subject;
