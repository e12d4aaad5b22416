//! MessagePack snapshots of an entity's attributes.
//!
//! Snapshots let a component persist or replicate attribute state and later
//! re-apply it with [`Instance::load_attributes`](crate::Instance::load_attributes).

use std::collections::BTreeMap;

use crate::error::EntityError;
use crate::variant::Variant;

/// An attribute set keyed by attribute name.
pub type AttributeMap = BTreeMap<String, Variant>;

/// Encode an attribute set to MessagePack bytes.
///
/// # Errors
///
/// Returns [`EntityError::Encode`] if serialisation fails.
pub fn encode_attributes(attributes: &AttributeMap) -> Result<Vec<u8>, EntityError> {
    Ok(rmp_serde::to_vec_named(attributes)?)
}

/// Decode an attribute set from MessagePack bytes.
///
/// # Errors
///
/// Returns [`EntityError::Decode`] if the bytes are not a valid snapshot.
pub fn decode_attributes(bytes: &[u8]) -> Result<AttributeMap, EntityError> {
    Ok(rmp_serde::from_slice(bytes)?)
}
