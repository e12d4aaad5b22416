//! # engine_instance
//!
//! The entity side of the component bridge: named attributes and properties
//! attached to an engine object, with per-name change notification.
//!
//! This crate provides:
//!
//! - [`EntityHandle`] — the narrow interface components consume.
//! - [`Instance`] — an in-memory entity implementing it.
//! - [`Variant`] / [`VariantKind`] — serialisable attribute and property values.
//! - [`EntityId`] / [`EntityAllocator`] — entity identity.
//! - [`codec`] — MessagePack attribute snapshots.

pub mod codec;
pub mod entity;
pub mod error;
pub mod instance;
pub mod variant;

pub use codec::{AttributeMap, decode_attributes, encode_attributes};
pub use entity::{EntityAllocator, EntityId};
pub use error::EntityError;
pub use instance::{ChangedSignal, EntityHandle, Instance};
pub use variant::{Color3, Variant, VariantKind};
