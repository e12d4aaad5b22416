//! Entity-layer error types.

use crate::variant::VariantKind;

/// Errors raised by entity storage.
#[derive(Debug, thiserror::Error)]
pub enum EntityError {
    /// The entity's class does not declare this property.
    #[error("{class} has no property named `{name}`")]
    UnknownProperty { class: String, name: String },

    /// A property was assigned a value of the wrong kind.
    #[error("property `{name}` expects {expected}, got {found}")]
    PropertyKindMismatch {
        name: String,
        expected: VariantKind,
        found: VariantKind,
    },

    /// Failed to encode an attribute snapshot to MessagePack.
    #[error("failed to encode attributes: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    /// Failed to decode an attribute snapshot from MessagePack.
    #[error("failed to decode attributes: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}
