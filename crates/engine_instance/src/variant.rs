//! Dynamic values stored in attributes and properties.
//!
//! A [`Variant`] is the serialisable payload of an attribute or property.
//! [`VariantKind`] names its shape so callers can validate values without
//! matching on the payload.

use std::fmt;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::entity::EntityId;

/// An RGB colour with components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Color3 {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color3 {
    /// Build a colour from floating-point components.
    #[must_use]
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Build a colour from 8-bit channels.
    #[must_use]
    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: f32::from(r) / 255.0,
            g: f32::from(g) / 255.0,
            b: f32::from(b) / 255.0,
        }
    }
}

/// A value held by an attribute or property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Variant {
    Bool(bool),
    Number(f64),
    String(String),
    Vector3(Vec3),
    Color3(Color3),
    /// A reference to another entity.
    EntityRef(EntityId),
}

/// The shape of a [`Variant`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariantKind {
    Bool,
    Number,
    String,
    Vector3,
    Color3,
    EntityRef,
}

impl VariantKind {
    /// Engine-facing type name, as shown in validation errors.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            VariantKind::Bool => "boolean",
            VariantKind::Number => "number",
            VariantKind::String => "string",
            VariantKind::Vector3 => "Vector3",
            VariantKind::Color3 => "Color3",
            VariantKind::EntityRef => "Entity",
        }
    }
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Variant {
    /// Returns the [`VariantKind`] of this value.
    #[must_use]
    pub const fn kind(&self) -> VariantKind {
        match self {
            Variant::Bool(_) => VariantKind::Bool,
            Variant::Number(_) => VariantKind::Number,
            Variant::String(_) => VariantKind::String,
            Variant::Vector3(_) => VariantKind::Vector3,
            Variant::Color3(_) => VariantKind::Color3,
            Variant::EntityRef(_) => VariantKind::EntityRef,
        }
    }

    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Variant::Number(n) => Some(*n),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Variant::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Variant::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_vector3(&self) -> Option<Vec3> {
        match self {
            Variant::Vector3(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Bool(b) => write!(f, "{b}"),
            Variant::Number(n) => write!(f, "{n}"),
            Variant::String(s) => write!(f, "{s:?}"),
            Variant::Vector3(v) => write!(f, "Vector3({}, {}, {})", v.x, v.y, v.z),
            Variant::Color3(c) => write!(f, "Color3({}, {}, {})", c.r, c.g, c.b),
            Variant::EntityRef(e) => write!(f, "{e}"),
        }
    }
}

impl From<bool> for Variant {
    fn from(value: bool) -> Self {
        Variant::Bool(value)
    }
}

impl From<f64> for Variant {
    fn from(value: f64) -> Self {
        Variant::Number(value)
    }
}

impl From<f32> for Variant {
    fn from(value: f32) -> Self {
        Variant::Number(f64::from(value))
    }
}

impl From<i32> for Variant {
    fn from(value: i32) -> Self {
        Variant::Number(f64::from(value))
    }
}

impl From<u32> for Variant {
    fn from(value: u32) -> Self {
        Variant::Number(f64::from(value))
    }
}

impl From<&str> for Variant {
    fn from(value: &str) -> Self {
        Variant::String(value.to_string())
    }
}

impl From<String> for Variant {
    fn from(value: String) -> Self {
        Variant::String(value)
    }
}

impl From<Vec3> for Variant {
    fn from(value: Vec3) -> Self {
        Variant::Vector3(value)
    }
}

impl From<Color3> for Variant {
    fn from(value: Color3) -> Self {
        Variant::Color3(value)
    }
}

impl From<EntityId> for Variant {
    fn from(value: EntityId) -> Self {
        Variant::EntityRef(value)
    }
}
