//! # engine_signal
//!
//! Single-threaded reactive primitives that engine components build on.
//!
//! This crate provides:
//!
//! - [`Signal`] / [`Connection`] — synchronous multi-listener events.
//! - [`Value`] — a push-updated reactive cell.
//! - [`Promise`] — the cancellation handle of an asynchronous task.
//! - [`Cleanup`] — the teardown contract every owned resource implements.

pub mod cleanup;
pub mod promise;
pub mod signal;
pub mod value;

pub use cleanup::{CANCEL, Cleanup, CleanupError, DESTROY, DISCONNECT, DISCONNECT_ALL};
pub use promise::{Cancelled, Promise};
pub use signal::{Connection, Signal};
pub use value::Value;
