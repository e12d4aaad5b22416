//! Push-updated reactive value cell.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::cleanup::{self, Cleanup, CleanupError, DESTROY};
use crate::signal::{Connection, Signal};

struct ValueInner<T: 'static> {
    current: RefCell<T>,
    changed: Signal<T>,
    destroyed: Cell<bool>,
}

/// A mutable cell that notifies subscribers whenever its value changes.
///
/// Writes that store an equal value are dropped without notifying anyone.
/// Cloning a `Value` yields another handle to the same cell.
pub struct Value<T: 'static> {
    inner: Rc<ValueInner<T>>,
}

impl<T: Clone + PartialEq + 'static> Value<T> {
    /// Create a cell holding `initial`.
    #[must_use]
    pub fn new(initial: T) -> Self {
        Self {
            inner: Rc::new(ValueInner {
                current: RefCell::new(initial),
                changed: Signal::new(),
                destroyed: Cell::new(false),
            }),
        }
    }

    /// Returns a clone of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.current.borrow().clone()
    }

    /// Borrow the current value for the duration of `f`.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.current.borrow())
    }

    /// Store `value` and notify subscribers. Returns `true` if the stored
    /// value changed. Writes to a destroyed cell are ignored.
    pub fn set(&self, value: T) -> bool {
        if self.inner.destroyed.get() {
            debug!("write to a destroyed value ignored");
            return false;
        }
        {
            let mut current = self.inner.current.borrow_mut();
            if *current == value {
                return false;
            }
            *current = value.clone();
        }
        self.inner.changed.fire(&value);
        true
    }

    /// Subscribe to changes; `listener` receives each newly stored value.
    pub fn observe(&self, listener: impl Fn(&T) + 'static) -> Connection {
        self.inner.changed.connect(listener)
    }

    /// The change-notification signal of this cell.
    #[must_use]
    pub fn changed(&self) -> Signal<T> {
        self.inner.changed.clone()
    }

    /// Detach all subscribers and freeze the value.
    pub fn destroy(&self) {
        self.inner.destroyed.set(true);
        self.inner.changed.destroy();
    }

    /// Returns `true` once [`Value::destroy`] has run.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.get()
    }

    /// Returns `true` if both handles refer to the same cell.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T: 'static> Clone for Value<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug + 'static> fmt::Debug for Value<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Value")
            .field("current", &*self.inner.current.borrow())
            .field("destroyed", &self.inner.destroyed.get())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> Cleanup for Value<T> {
    fn cleanup(&self, method: &str) -> Result<(), CleanupError> {
        match method {
            DESTROY => {
                self.destroy();
                Ok(())
            }
            other => Err(cleanup::unknown(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_get_set() {
        let value = Value::new(1);
        assert_eq!(value.get(), 1);
        assert!(value.set(2));
        assert_eq!(value.get(), 2);
        assert_eq!(value.with(|v| v * 10), 20);
    }

    #[test]
    fn test_equal_write_does_not_notify() {
        let value = Value::new("a".to_string());
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        value.observe(move |_| counter.set(counter.get() + 1));

        assert!(!value.set("a".to_string()));
        assert!(value.set("b".to_string()));
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_observer_may_read_cell() {
        let value = Value::new(0);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let handle = value.clone();
        let sink = Rc::clone(&seen);
        value.observe(move |new| sink.borrow_mut().push((*new, handle.get())));

        value.set(3);
        value.set(4);
        assert_eq!(*seen.borrow(), vec![(3, 3), (4, 4)]);
    }

    #[test]
    fn test_destroy_freezes_value() {
        let value = Value::new(5);
        let conn = value.observe(|_| panic!("destroyed cells never notify"));
        value.cleanup(DESTROY).unwrap();
        assert!(value.is_destroyed());
        assert!(!conn.is_connected());
        assert!(!value.set(6));
        assert_eq!(value.get(), 5);
    }
}
