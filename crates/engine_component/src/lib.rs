//! # engine_component
//!
//! The substrate user components are built on: everything a component
//! creates is owned by it and released in one pass when it stops.
//!
//! This crate provides:
//!
//! - [`Janitor`] — ordered, indexed cleanup of tasks, closures and promises.
//! - [`SignalRegistry`] — named, lazily created signals per component.
//! - [`BaseComponent`] — the per-instance state, lifecycle and the attribute,
//!   property and reactive (`out_*`) bridges to its entity.
//! - [`Component`] / [`Behavior`] — hosting user logic on a base component.
//! - [`ComponentConfig`] — per-component settings.
//!
//! Everything here is single-threaded (`Rc`-based, `!Send`).

pub mod attribute;
pub mod base;
pub mod component;
pub mod config;
pub mod error;
pub mod janitor;
pub mod observe;
pub mod out;
pub mod property;
pub mod signals;

pub use base::{BaseComponent, LifecycleState, WeakBaseComponent};
pub use component::{Behavior, Component};
pub use config::{ComponentConfig, DEFAULT_CLEANUP_BUDGET};
pub use error::ComponentError;
pub use janitor::{CLEANUP, CleanupMethod, CleanupReport, Janitor, TaskIndex, WeakJanitor};
pub use observe::ObserverHandle;
pub use out::OUT_SCOPE;
pub use signals::{SIGNAL_SCOPE, SignalRegistry};
