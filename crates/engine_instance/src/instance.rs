//! The [`EntityHandle`] contract and its in-memory [`Instance`] implementation.
//!
//! An entity exposes two families of named values:
//!
//! - **Attributes** — free-form, created on first write, removed by writing
//!   `None`.
//! - **Properties** — declared by the entity's class with a fixed
//!   [`VariantKind`]; writes of another kind or to undeclared names fail.
//!
//! Both families publish a per-name change signal carrying the new value.
//! Signals fire only when the stored value actually changes.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::rc::Rc;

use engine_signal::Signal;
use tracing::trace;

use crate::entity::EntityId;
use crate::error::EntityError;
use crate::variant::Variant;

/// Change notification payload: the value after the change.
pub type ChangedSignal = Signal<Option<Variant>>;

/// Access to an engine entity's attributes and properties.
pub trait EntityHandle {
    /// The entity's identifier.
    fn id(&self) -> EntityId;

    /// The entity's class name (e.g. `"Part"`).
    fn class_name(&self) -> &str;

    /// Current value of an attribute, if set.
    fn attribute(&self, name: &str) -> Option<Variant>;

    /// Set or (with `None`) clear an attribute.
    fn set_attribute(&self, name: &str, value: Option<Variant>);

    /// Signal fired whenever the named attribute changes.
    fn attribute_changed_signal(&self, name: &str) -> ChangedSignal;

    /// Current value of a property. `None` if the class does not declare it.
    fn property(&self, name: &str) -> Option<Variant>;

    /// Assign a declared property.
    ///
    /// # Errors
    ///
    /// Returns [`EntityError::UnknownProperty`] for undeclared names and
    /// [`EntityError::PropertyKindMismatch`] if `value` has the wrong kind.
    fn set_property(&self, name: &str, value: Variant) -> Result<(), EntityError>;

    /// Signal fired whenever the named property changes. Undeclared names get
    /// a signal that never fires.
    fn property_changed_signal(&self, name: &str) -> ChangedSignal;
}

#[derive(Default)]
struct Slots {
    values: BTreeMap<String, Variant>,
    signals: HashMap<String, ChangedSignal>,
}

impl Slots {
    fn signal(&mut self, name: &str) -> ChangedSignal {
        self.signals.entry(name.to_string()).or_default().clone()
    }

    /// Store `value` and return the signal to fire, if any listener could
    /// care. The caller fires after releasing the borrow.
    fn store(&mut self, name: &str, value: Option<Variant>) -> Option<ChangedSignal> {
        let unchanged = self.values.get(name) == value.as_ref();
        if unchanged {
            return None;
        }
        match value {
            Some(v) => {
                self.values.insert(name.to_string(), v);
            }
            None => {
                self.values.remove(name);
            }
        }
        self.signals.get(name).cloned()
    }
}

struct InstanceInner {
    id: EntityId,
    class_name: String,
    attributes: RefCell<Slots>,
    properties: RefCell<Slots>,
}

/// An in-process entity with attribute and property storage.
///
/// Cloning an `Instance` yields another handle to the same entity.
#[derive(Clone)]
pub struct Instance {
    inner: Rc<InstanceInner>,
}

impl Instance {
    /// Create an entity of class `class_name` with no properties declared.
    #[must_use]
    pub fn new(id: EntityId, class_name: impl Into<String>) -> Self {
        Self {
            inner: Rc::new(InstanceInner {
                id,
                class_name: class_name.into(),
                attributes: RefCell::new(Slots::default()),
                properties: RefCell::new(Slots::default()),
            }),
        }
    }

    /// Declare a property with its initial value. The value's kind becomes
    /// the property's kind.
    #[must_use]
    pub fn with_property(self, name: impl Into<String>, initial: impl Into<Variant>) -> Self {
        self.inner
            .properties
            .borrow_mut()
            .values
            .insert(name.into(), initial.into());
        self
    }

    /// Snapshot of every attribute currently set.
    #[must_use]
    pub fn attributes(&self) -> BTreeMap<String, Variant> {
        self.inner.attributes.borrow().values.clone()
    }

    /// Replace the attribute set with `snapshot`.
    ///
    /// Each change goes through [`EntityHandle::set_attribute`], so observers
    /// see attributes that appear, change, or disappear.
    pub fn load_attributes(&self, snapshot: BTreeMap<String, Variant>) {
        let stale: Vec<String> = self
            .inner
            .attributes
            .borrow()
            .values
            .keys()
            .filter(|name| !snapshot.contains_key(*name))
            .cloned()
            .collect();
        for name in stale {
            self.set_attribute(&name, None);
        }
        for (name, value) in snapshot {
            self.set_attribute(&name, Some(value));
        }
    }
}

impl EntityHandle for Instance {
    fn id(&self) -> EntityId {
        self.inner.id
    }

    fn class_name(&self) -> &str {
        &self.inner.class_name
    }

    fn attribute(&self, name: &str) -> Option<Variant> {
        self.inner.attributes.borrow().values.get(name).cloned()
    }

    fn set_attribute(&self, name: &str, value: Option<Variant>) {
        let signal = self
            .inner
            .attributes
            .borrow_mut()
            .store(name, value.clone());
        if let Some(signal) = signal {
            trace!(entity = %self.inner.id, attribute = name, "attribute changed");
            signal.fire(&value);
        }
    }

    fn attribute_changed_signal(&self, name: &str) -> ChangedSignal {
        self.inner.attributes.borrow_mut().signal(name)
    }

    fn property(&self, name: &str) -> Option<Variant> {
        self.inner.properties.borrow().values.get(name).cloned()
    }

    fn set_property(&self, name: &str, value: Variant) -> Result<(), EntityError> {
        let expected = match self.inner.properties.borrow().values.get(name) {
            Some(current) => current.kind(),
            None => {
                return Err(EntityError::UnknownProperty {
                    class: self.inner.class_name.clone(),
                    name: name.to_string(),
                });
            }
        };
        if value.kind() != expected {
            return Err(EntityError::PropertyKindMismatch {
                name: name.to_string(),
                expected,
                found: value.kind(),
            });
        }

        let signal = self
            .inner
            .properties
            .borrow_mut()
            .store(name, Some(value.clone()));
        if let Some(signal) = signal {
            trace!(entity = %self.inner.id, property = name, "property changed");
            signal.fire(&Some(value));
        }
        Ok(())
    }

    fn property_changed_signal(&self, name: &str) -> ChangedSignal {
        self.inner.properties.borrow_mut().signal(name)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("id", &self.inner.id)
            .field("class_name", &self.inner.class_name)
            .field("attributes", &self.inner.attributes.borrow().values)
            .finish()
    }
}
