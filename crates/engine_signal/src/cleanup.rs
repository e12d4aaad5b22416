//! The [`Cleanup`] contract shared by every resource a janitor can own.
//!
//! Resources are addressed by the name of the operation that tears them
//! down (`"Destroy"`, `"Disconnect"`, `"Cancel"`, ...). A resource advertises
//! which operations it supports and which one is canonical, so an owner can
//! validate a requested operation at registration time instead of finding
//! out during teardown.

/// Generic destroy operation.
pub const DESTROY: &str = "Destroy";

/// Operation that severs a single connection.
pub const DISCONNECT: &str = "Disconnect";

/// Operation that severs every connection of a signal without destroying it.
pub const DISCONNECT_ALL: &str = "DisconnectAll";

/// Operation that cancels an in-flight asynchronous task.
pub const CANCEL: &str = "Cancel";

/// Errors produced while tearing a resource down.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CleanupError {
    /// The resource does not implement the requested operation.
    #[error("resource does not support cleanup method `{method}`")]
    UnknownMethod {
        /// The operation that was requested.
        method: String,
    },

    /// The resource's own teardown reported a failure.
    #[error("cleanup failed: {0}")]
    Failed(String),

    /// The teardown panicked; the payload message is preserved.
    #[error("cleanup panicked: {0}")]
    Panicked(String),
}

/// A resource that can be disposed through a named operation.
///
/// Handles implementing this trait are cheap clones of shared state, so
/// teardown works through `&self`.
pub trait Cleanup: 'static {
    /// The operation used when the owner does not name one. `None` means the
    /// resource has no canonical teardown and must be registered with an
    /// explicit method.
    fn default_method(&self) -> Option<&'static str> {
        Some(DESTROY)
    }

    /// Returns `true` if `method` can be passed to [`Cleanup::cleanup`].
    fn supports(&self, method: &str) -> bool {
        method == DESTROY
    }

    /// Run the named teardown operation.
    ///
    /// # Errors
    ///
    /// Returns [`CleanupError::UnknownMethod`] for unsupported operations, or
    /// [`CleanupError::Failed`] if the resource could not be torn down.
    fn cleanup(&self, method: &str) -> Result<(), CleanupError>;
}

/// Build the [`CleanupError::UnknownMethod`] for `method`.
pub(crate) fn unknown(method: &str) -> CleanupError {
    CleanupError::UnknownMethod {
        method: method.to_string(),
    }
}
