//! Per-component registry of named signals.
//!
//! Signals are created on first access and live until the owning janitor
//! cleans up. Each signal's teardown is a janitor task under
//! `TaskIndex::Scoped { scope: SIGNAL_SCOPE, name }`, so a user task keyed
//! by the same literal name never collides with it.

use std::any::{Any, type_name};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use engine_signal::Signal;
use tracing::debug;

use crate::error::ComponentError;
use crate::janitor::{Janitor, TaskIndex};

/// Janitor scope of signal teardown tasks.
pub const SIGNAL_SCOPE: &str = "signal";

type SignalMap = HashMap<String, Box<dyn Any>>;

/// Named signals owned by one component.
///
/// Each name is bound to one argument type `A` for its lifetime; asking for
/// the same name with another type is a usage error.
#[derive(Clone)]
pub struct SignalRegistry {
    signals: Rc<RefCell<SignalMap>>,
    janitor: Janitor,
}

impl SignalRegistry {
    /// Create an empty registry whose signals are torn down by `janitor`.
    #[must_use]
    pub fn new(janitor: Janitor) -> Self {
        Self {
            signals: Rc::new(RefCell::new(HashMap::new())),
            janitor,
        }
    }

    /// Janitor index of the teardown task for signal `name`.
    #[must_use]
    pub fn task_index(name: &str) -> TaskIndex {
        TaskIndex::scoped(SIGNAL_SCOPE, name)
    }

    /// Return the signal called `name`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::SignalTypeMismatch`] if `name` exists with
    /// a different argument type.
    pub fn register_signal<A: 'static>(&self, name: &str) -> Result<Signal<A>, ComponentError> {
        if let Some(existing) = self.lookup::<A>(name)? {
            return Ok(existing);
        }

        let signal = Signal::<A>::new();
        self.signals
            .borrow_mut()
            .insert(name.to_string(), Box::new(signal.clone()));

        let registry = Rc::downgrade(&self.signals);
        let owned = signal.clone();
        let key = name.to_string();
        self.janitor.add_fn(
            move || {
                owned.destroy();
                if let Some(signals) = registry.upgrade() {
                    let mut signals = signals.borrow_mut();
                    let same = signals
                        .get(&key)
                        .and_then(|entry| entry.downcast_ref::<Signal<A>>())
                        .is_some_and(|current| current.ptr_eq(&owned));
                    if same {
                        signals.remove(&key);
                    }
                }
            },
            Some(Self::task_index(name)),
        )?;

        debug!(signal = name, "signal registered");
        Ok(signal)
    }

    /// Get-or-create accessor; identical to [`SignalRegistry::register_signal`].
    ///
    /// # Errors
    ///
    /// See [`SignalRegistry::register_signal`].
    pub fn get_signal<A: 'static>(&self, name: &str) -> Result<Signal<A>, ComponentError> {
        self.register_signal(name)
    }

    /// Fire signal `name` with `args`. Firing a name nobody registered is a
    /// no-op and does not create the signal.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::SignalTypeMismatch`] if `name` exists with
    /// a different argument type.
    pub fn fire_signal<A: 'static>(&self, name: &str, args: A) -> Result<(), ComponentError> {
        if let Some(signal) = self.lookup::<A>(name)? {
            signal.fire(&args);
        }
        Ok(())
    }

    /// Returns `true` if a signal called `name` exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.signals.borrow().contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.signals.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every signal without tearing it down. Teardown belongs to the
    /// janitor; this only drops the registry's handles.
    pub fn clear(&self) {
        self.signals.borrow_mut().clear();
    }

    fn lookup<A: 'static>(&self, name: &str) -> Result<Option<Signal<A>>, ComponentError> {
        let signals = self.signals.borrow();
        let Some(entry) = signals.get(name) else {
            return Ok(None);
        };
        match entry.downcast_ref::<Signal<A>>() {
            Some(signal) => Ok(Some(signal.clone())),
            None => Err(ComponentError::SignalTypeMismatch {
                name: name.to_string(),
                requested: type_name::<A>(),
            }),
        }
    }
}
