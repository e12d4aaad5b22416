//! Observer plumbing shared by the attribute and property bridges.

use std::cell::RefCell;
use std::rc::Rc;

use engine_instance::{ChangedSignal, Variant};
use engine_signal::Connection;

use crate::base::BaseComponent;
use crate::error::ComponentError;
use crate::janitor::{CleanupMethod, TaskIndex, WeakJanitor};

/// Handle returned by `observe_*`. Disconnecting removes the observer from
/// the component's janitor.
#[derive(Debug, Clone)]
pub struct ObserverHandle {
    index: TaskIndex,
    connection: Connection,
    janitor: WeakJanitor,
}

impl ObserverHandle {
    /// Stop observing. Calling this more than once is a no-op.
    pub fn disconnect(&self) {
        if let Some(janitor) = self.janitor.upgrade() {
            janitor.remove_task(&self.index, false);
        }
        self.connection.disconnect();
    }

    /// Returns `true` while the observer still receives changes.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Janitor index holding the observer's connection.
    #[must_use]
    pub fn index(&self) -> &TaskIndex {
        &self.index
    }
}

impl BaseComponent {
    /// Connect `listener` to `signal`, silenced once the component is
    /// destroyed, and hand the connection to the janitor. A `once` listener
    /// drops its janitor entry after it fires.
    pub(crate) fn connect_guarded(
        &self,
        signal: &ChangedSignal,
        listener: impl Fn(Option<&Variant>) + 'static,
        once: bool,
    ) -> Result<(Connection, TaskIndex), ComponentError> {
        let destroyed = Rc::clone(&self.inner.destroyed);
        let fired_index: Rc<RefCell<Option<TaskIndex>>> = Rc::default();
        let entry = Rc::clone(&fired_index);
        let janitor = self.inner.janitor.downgrade();
        let guarded = move |value: &Option<Variant>| {
            if !destroyed.get() {
                listener(value.as_ref());
            }
            let fired = entry.borrow_mut().take();
            if let Some(index) = fired
                && let Some(janitor) = janitor.upgrade()
            {
                janitor.remove_task_no_clean(&index);
            }
        };
        let connection = if once {
            signal.connect_once(guarded)
        } else {
            signal.connect(guarded)
        };
        let index =
            self.inner
                .janitor
                .add_indexed(connection.clone(), CleanupMethod::Infer, None)?;
        if once && connection.is_connected() {
            *fired_index.borrow_mut() = Some(index.clone());
        }
        Ok((connection, index))
    }

    /// Connect `callback` to `signal`, then call it once with the value read
    /// by `current`.
    pub(crate) fn observe_with(
        &self,
        signal: &ChangedSignal,
        current: impl FnOnce() -> Option<Variant>,
        callback: impl Fn(Option<&Variant>) + 'static,
    ) -> Result<ObserverHandle, ComponentError> {
        let callback = Rc::new(callback);
        let listener = Rc::clone(&callback);
        let (connection, index) =
            self.connect_guarded(signal, move |value| listener(value), false)?;

        callback(current().as_ref());

        Ok(ObserverHandle {
            index,
            connection,
            janitor: self.inner.janitor.downgrade(),
        })
    }
}
