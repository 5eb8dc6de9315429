//! Multi-registry lifecycle coordination.
//!
//! A [`MultiRegistryCoordinator`] turns "object added" and "object removed"
//! notifications into registrations across every registry its
//! [`RegistryProvider`] reports, and publishes the aggregate events consumers
//! order their own work against.
//!
//! # Event order
//!
//! Adding an object publishes one [`IdEvent::Added`] per registry, then
//! [`IdEvent::ObjectAdded`] and [`IdEvent::AfterAdded`] carrying the full idmap.
//! Removing it publishes [`IdEvent::BeforeRemoved`] and [`IdEvent::ObjectRemoved`]
//! once, before any registry releases its id and publishes [`IdEvent::Removed`].
//!
//! [`IdEvent::Added`]: intid_registry::IdEvent::Added
//! [`IdEvent::Removed`]: intid_registry::IdEvent::Removed
//! [`IdEvent::ObjectAdded`]: intid_registry::IdEvent::ObjectAdded
//! [`IdEvent::AfterAdded`]: intid_registry::IdEvent::AfterAdded
//! [`IdEvent::BeforeRemoved`]: intid_registry::IdEvent::BeforeRemoved
//! [`IdEvent::ObjectRemoved`]: intid_registry::IdEvent::ObjectRemoved

mod coordinator;
mod provider;

pub use coordinator::{KeyCheck, MultiRegistryCoordinator};
pub use provider::{RegistryProvider, RegistrySet};
