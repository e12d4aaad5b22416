//! Reactive mirrors of entity attributes and properties.
//!
//! An out cell is a [`Value`] seeded with the current value and pushed every
//! change afterwards. One cell exists per (family, name) per component; it is
//! destroyed when the component stops.

use std::rc::Rc;

use engine_instance::{ChangedSignal, EntityHandle, Variant};
use engine_signal::Value;
use tracing::debug;

use crate::base::BaseComponent;
use crate::error::ComponentError;
use crate::janitor::{CleanupMethod, TaskIndex};

/// Janitor scope of out-cell tasks.
pub const OUT_SCOPE: &str = "out";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum OutKey {
    Attribute(String),
    Property(String),
}

impl OutKey {
    fn operation(&self) -> &'static str {
        match self {
            OutKey::Attribute(_) => "out_attribute",
            OutKey::Property(_) => "out_property",
        }
    }

    fn task_index(&self) -> TaskIndex {
        match self {
            OutKey::Attribute(name) => TaskIndex::scoped(OUT_SCOPE, format!("attribute:{name}")),
            OutKey::Property(name) => TaskIndex::scoped(OUT_SCOPE, format!("property:{name}")),
        }
    }

    fn read(&self, entity: &dyn EntityHandle) -> Option<Variant> {
        match self {
            OutKey::Attribute(name) => entity.attribute(name),
            OutKey::Property(name) => entity.property(name),
        }
    }

    fn signal(&self, entity: &dyn EntityHandle) -> ChangedSignal {
        match self {
            OutKey::Attribute(name) => entity.attribute_changed_signal(name),
            OutKey::Property(name) => entity.property_changed_signal(name),
        }
    }
}

impl BaseComponent {
    pub(crate) fn out(&self, key: OutKey) -> Result<Value<Option<Variant>>, ComponentError> {
        self.guard(key.operation())?;

        let cached = self.inner.outs.borrow().get(&key).cloned();
        if let Some(cell) = cached {
            return Ok(cell);
        }

        let entity = Rc::clone(&self.inner.entity);
        let cell = Value::new(key.read(entity.as_ref()));
        // Cached before subscribing so a re-entrant request gets this cell.
        self.inner
            .outs
            .borrow_mut()
            .insert(key.clone(), cell.clone());

        let sink = cell.clone();
        let signal = key.signal(entity.as_ref());
        let subscribed = self
            .observe_with(&signal, || key.read(entity.as_ref()), move |value| {
                sink.set(value.cloned());
            })
            .and_then(|_| {
                self.inner
                    .janitor
                    .add_task(cell.clone(), CleanupMethod::Destroy, Some(key.task_index()))
            });
        if let Err(err) = subscribed {
            self.inner.outs.borrow_mut().remove(&key);
            cell.destroy();
            return Err(err);
        }

        debug!(component = self.tag(), out = %key.task_index(), "out cell created");
        Ok(cell)
    }
}
