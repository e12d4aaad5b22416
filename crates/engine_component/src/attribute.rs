//! Attribute bridge: typed access to the entity's free-form attributes.
//!
//! Reads always go to the entity. Writes and registrations are refused once
//! the component is destroyed. Every connection made here is owned by the
//! component's janitor.

use std::rc::Rc;

use engine_instance::{ChangedSignal, Variant, VariantKind};
use engine_signal::{Connection, Value};
use tracing::trace;

use crate::base::BaseComponent;
use crate::error::ComponentError;
use crate::observe::ObserverHandle;
use crate::out::OutKey;

impl BaseComponent {
    /// Current value of attribute `name`.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<Variant> {
        self.inner.entity.attribute(name)
    }

    /// Set attribute `name` to `value`.
    ///
    /// # Errors
    ///
    /// [`ComponentError::Destroyed`] once stopped.
    pub fn set_attribute(&self, name: &str, value: impl Into<Variant>) -> Result<(), ComponentError> {
        self.guard("set_attribute")?;
        self.inner.entity.set_attribute(name, Some(value.into()));
        Ok(())
    }

    /// Remove attribute `name`.
    ///
    /// # Errors
    ///
    /// [`ComponentError::Destroyed`] once stopped.
    pub fn clear_attribute(&self, name: &str) -> Result<(), ComponentError> {
        self.guard("clear_attribute")?;
        self.inner.entity.set_attribute(name, None);
        Ok(())
    }

    /// Add 1 to numeric attribute `name` and return the new value. An unset
    /// attribute counts as 0.
    ///
    /// # Errors
    ///
    /// See [`BaseComponent::increment_attribute_by`].
    pub fn increment_attribute(&self, name: &str) -> Result<f64, ComponentError> {
        self.increment_attribute_by(name, 1.0)
    }

    /// Add `delta` to numeric attribute `name` and return the new value. An
    /// unset attribute counts as 0.
    ///
    /// # Errors
    ///
    /// [`ComponentError::AttributeTypeMismatch`] if the attribute holds a
    /// non-number; [`ComponentError::Destroyed`] once stopped.
    pub fn increment_attribute_by(&self, name: &str, delta: f64) -> Result<f64, ComponentError> {
        self.guard("increment_attribute")?;
        let current = match self.attribute(name) {
            None => 0.0,
            Some(Variant::Number(n)) => n,
            Some(other) => {
                return Err(ComponentError::AttributeTypeMismatch {
                    name: name.to_string(),
                    expected: VariantKind::Number,
                    found: other.kind(),
                });
            }
        };
        let next = current + delta;
        self.inner
            .entity
            .set_attribute(name, Some(Variant::Number(next)));
        Ok(next)
    }

    /// Replace attribute `name` with `mutator(current)` and return the result.
    /// Returning `None` clears the attribute.
    ///
    /// # Errors
    ///
    /// [`ComponentError::Destroyed`] once stopped.
    pub fn update_attribute(
        &self,
        name: &str,
        mutator: impl FnOnce(Option<Variant>) -> Option<Variant>,
    ) -> Result<Option<Variant>, ComponentError> {
        self.guard("update_attribute")?;
        let next = mutator(self.attribute(name));
        self.inner.entity.set_attribute(name, next.clone());
        Ok(next)
    }

    /// Set attribute `name` to `value` if it is unset, and return the
    /// attribute's value either way.
    ///
    /// With `valid_kinds`, the resulting value must have one of those kinds.
    /// An invalid default is rejected before it is written.
    ///
    /// # Errors
    ///
    /// [`ComponentError::InvalidAttributeKind`] on a kind outside
    /// `valid_kinds`; [`ComponentError::Destroyed`] if the default would have
    /// to be written to a stopped component.
    pub fn default_attribute(
        &self,
        name: &str,
        value: impl Into<Variant>,
        valid_kinds: Option<&[VariantKind]>,
    ) -> Result<Variant, ComponentError> {
        let existing = self.attribute(name);
        let resolved = existing.clone().unwrap_or_else(|| value.into());

        if let Some(kinds) = valid_kinds
            && !kinds.contains(&resolved.kind())
        {
            return Err(ComponentError::InvalidAttributeKind {
                name: name.to_string(),
                found: resolved.kind(),
                expected: kinds.to_vec(),
            });
        }

        if existing.is_none() {
            self.guard("default_attribute")?;
            trace!(component = self.tag(), attribute = name, "attribute defaulted");
            self.inner.entity.set_attribute(name, Some(resolved.clone()));
        }
        Ok(resolved)
    }

    /// Call `callback` with the attribute's current value now, and again
    /// after every change until the handle is disconnected or the component
    /// stops.
    ///
    /// # Errors
    ///
    /// [`ComponentError::Destroyed`] once stopped; `callback` is not called.
    pub fn observe_attribute(
        &self,
        name: &str,
        callback: impl Fn(Option<&Variant>) + 'static,
    ) -> Result<ObserverHandle, ComponentError> {
        self.guard("observe_attribute")?;
        let signal = self.inner.entity.attribute_changed_signal(name);
        let entity = Rc::clone(&self.inner.entity);
        self.observe_with(&signal, || entity.attribute(name), callback)
    }

    /// The entity's raw change signal for attribute `name`. Connections made
    /// on it directly are not owned by the component.
    #[must_use]
    pub fn attribute_changed_signal(&self, name: &str) -> ChangedSignal {
        self.inner.entity.attribute_changed_signal(name)
    }

    /// Connect `listener` to changes of attribute `name`; with `once` it
    /// fires for the next change only. The connection is owned by the
    /// component's janitor.
    ///
    /// # Errors
    ///
    /// [`ComponentError::Destroyed`] once stopped.
    pub fn attribute_changed(
        &self,
        name: &str,
        listener: impl Fn(Option<&Variant>) + 'static,
        once: bool,
    ) -> Result<Connection, ComponentError> {
        self.guard("attribute_changed")?;
        let signal = self.inner.entity.attribute_changed_signal(name);
        let (connection, _) = self.connect_guarded(&signal, listener, once)?;
        Ok(connection)
    }

    /// A reactive cell mirroring attribute `name`. Repeated calls return the
    /// same cell.
    ///
    /// # Errors
    ///
    /// [`ComponentError::Destroyed`] once stopped.
    pub fn out_attribute(&self, name: &str) -> Result<Value<Option<Variant>>, ComponentError> {
        self.out(OutKey::Attribute(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};

    use engine_instance::{EntityHandle, EntityId, Instance};

    use super::*;
    use crate::config::ComponentConfig;

    fn setup() -> (BaseComponent, Instance) {
        let instance = Instance::new(EntityId::from_raw(1), "Part");
        let base = BaseComponent::new(ComponentConfig::new("Lamp"), instance.clone());
        base.start().unwrap();
        (base, instance)
    }

    fn recorder() -> (Rc<RefCell<Vec<Option<Variant>>>>, impl Fn(Option<&Variant>) + 'static) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        (log, move |v: Option<&Variant>| sink.borrow_mut().push(v.cloned()))
    }

    #[test]
    fn test_get_set_clear() {
        let (base, instance) = setup();
        base.set_attribute("Brightness", 0.5).unwrap();
        assert_eq!(instance.attribute("Brightness"), Some(Variant::Number(0.5)));
        assert_eq!(base.attribute("Brightness"), Some(Variant::Number(0.5)));
        base.clear_attribute("Brightness").unwrap();
        assert_eq!(base.attribute("Brightness"), None);
    }

    #[test]
    fn test_observe_calls_immediately_then_on_change() {
        let (base, instance) = setup();
        instance.set_attribute("x", Some(Variant::from(5)));

        let (log, callback) = recorder();
        base.observe_attribute("x", callback).unwrap();
        assert_eq!(*log.borrow(), vec![Some(Variant::Number(5.0))]);

        base.set_attribute("x", 7).unwrap();
        assert_eq!(
            *log.borrow(),
            vec![Some(Variant::Number(5.0)), Some(Variant::Number(7.0))]
        );

        instance.set_attribute("x", None);
        assert_eq!(log.borrow().len(), 3);
        assert_eq!(log.borrow()[2], None);
    }

    #[test]
    fn test_observe_unset_attribute_reports_none() {
        let (base, _instance) = setup();
        let (log, callback) = recorder();
        base.observe_attribute("missing", callback).unwrap();
        assert_eq!(*log.borrow(), vec![None]);
    }

    #[test]
    fn test_observer_disconnect_removes_janitor_task() {
        let (base, instance) = setup();
        let (log, callback) = recorder();
        let handle = base.observe_attribute("x", callback).unwrap();
        assert_eq!(base.task_count(), 1);

        handle.disconnect();
        handle.disconnect();
        assert!(!handle.is_connected());
        assert_eq!(base.task_count(), 0);

        instance.set_attribute("x", Some(Variant::from(1)));
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn test_stop_silences_observers() {
        let (base, instance) = setup();
        let (log, callback) = recorder();
        let handle = base.observe_attribute("x", callback).unwrap();

        base.stop();
        assert!(!handle.is_connected());
        instance.set_attribute("x", Some(Variant::from(1)));
        assert_eq!(log.borrow().len(), 1);
        assert_eq!(instance.attribute_changed_signal("x").listener_count(), 0);
    }

    #[test]
    fn test_observe_after_stop_registers_nothing() {
        let (base, instance) = setup();
        base.stop();
        let (log, callback) = recorder();
        assert!(matches!(
            base.observe_attribute("x", callback),
            Err(ComponentError::Destroyed { .. })
        ));
        assert!(log.borrow().is_empty());
        assert_eq!(instance.attribute_changed_signal("x").listener_count(), 0);
        assert_eq!(base.task_count(), 0);
    }

    #[test]
    fn test_observer_skips_changes_made_during_teardown() {
        let (base, instance) = setup();
        let writer = instance.clone();
        base.add_fn(
            move || writer.set_attribute("x", Some(Variant::from("closing"))),
            None,
        )
        .unwrap();
        let (log, callback) = recorder();
        base.observe_attribute("x", callback).unwrap();

        base.stop();
        assert_eq!(instance.attribute("x"), Some(Variant::from("closing")));
        assert_eq!(*log.borrow(), vec![None]);
    }

    #[test]
    fn test_increment_defaults_to_zero() {
        let (base, _instance) = setup();
        assert_eq!(base.increment_attribute("count").unwrap(), 1.0);
        assert_eq!(base.increment_attribute("count").unwrap(), 2.0);
        assert_eq!(base.increment_attribute_by("count", 0.5).unwrap(), 2.5);
        assert_eq!(base.attribute("count"), Some(Variant::Number(2.5)));
    }

    #[test]
    fn test_increment_rejects_non_numbers() {
        let (base, _instance) = setup();
        base.set_attribute("count", "many").unwrap();
        let err = base.increment_attribute("count").unwrap_err();
        assert!(err.is_usage_error());
        assert!(matches!(
            err,
            ComponentError::AttributeTypeMismatch {
                found: VariantKind::String,
                ..
            }
        ));
    }

    #[test]
    fn test_update_attribute() {
        let (base, _instance) = setup();
        base.set_attribute("name", "lamp").unwrap();
        let next = base
            .update_attribute("name", |current| {
                let text = current.as_ref().and_then(Variant::as_str).unwrap_or("");
                Some(Variant::from(text.to_uppercase()))
            })
            .unwrap();
        assert_eq!(next, Some(Variant::from("LAMP")));
        assert_eq!(base.attribute("name"), next);

        assert_eq!(base.update_attribute("name", |_| None).unwrap(), None);
        assert_eq!(base.attribute("name"), None);
    }

    #[test]
    fn test_default_attribute() {
        let (base, _instance) = setup();
        let kinds = [VariantKind::Number];

        assert_eq!(
            base.default_attribute("speed", 10, Some(&kinds)).unwrap(),
            Variant::Number(10.0)
        );
        base.set_attribute("speed", 3).unwrap();
        assert_eq!(
            base.default_attribute("speed", 10, Some(&kinds)).unwrap(),
            Variant::Number(3.0)
        );
    }

    #[test]
    fn test_default_attribute_kind_check() {
        let (base, _instance) = setup();
        base.set_attribute("speed", "fast").unwrap();
        let err = base
            .default_attribute("speed", 10, Some(&[VariantKind::Number]))
            .unwrap_err();
        assert!(matches!(err, ComponentError::InvalidAttributeKind { .. }));

        let err = base
            .default_attribute("label", 10, Some(&[VariantKind::String]))
            .unwrap_err();
        assert!(err.is_usage_error());
        assert_eq!(base.attribute("label"), None);

        assert_eq!(
            base.default_attribute("label", 10, None).unwrap(),
            Variant::Number(10.0)
        );
    }

    #[test]
    fn test_attribute_changed_with_listener() {
        let (base, instance) = setup();
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        let conn = base
            .attribute_changed("x", move |_| counter.set(counter.get() + 1), false)
            .unwrap();
        assert_eq!(hits.get(), 0);

        instance.set_attribute("x", Some(Variant::from(1)));
        instance.set_attribute("x", Some(Variant::from(2)));
        assert_eq!(hits.get(), 2);

        base.stop();
        assert!(!conn.is_connected());
    }

    #[test]
    fn test_attribute_changed_once() {
        let (base, instance) = setup();
        let (log, callback) = recorder();
        base.attribute_changed("x", callback, true).unwrap();
        instance.set_attribute("x", Some(Variant::from(1)));
        instance.set_attribute("x", Some(Variant::from(2)));
        assert_eq!(*log.borrow(), vec![Some(Variant::Number(1.0))]);
    }

    #[test]
    fn test_fired_once_listeners_leave_the_janitor() {
        let (base, instance) = setup();
        let hits = Rc::new(Cell::new(0));
        for _ in 0..100 {
            let counter = Rc::clone(&hits);
            base.attribute_changed("x", move |_| counter.set(counter.get() + 1), true).unwrap();
        }
        let kept = base.attribute_changed("x", |_| {}, false).unwrap();
        assert_eq!(base.task_count(), 101);

        instance.set_attribute("x", Some(Variant::from(1)));
        instance.set_attribute("x", Some(Variant::from(2)));
        assert_eq!(hits.get(), 100);
        assert_eq!(base.task_count(), 1);
        assert!(kept.is_connected());
    }

    #[test]
    fn test_attribute_changed_signal_is_unmanaged() {
        let (base, instance) = setup();
        let signal = base.attribute_changed_signal("x");
        let conn = signal.connect(|_| {});
        assert_eq!(base.task_count(), 0);
        base.stop();
        assert!(conn.is_connected());
        instance.set_attribute("x", Some(Variant::from(1)));
        conn.disconnect();
    }

    #[test]
    fn test_stale_writes_are_refused() {
        let (base, _instance) = setup();
        base.set_attribute("x", 1).unwrap();
        base.stop();

        assert!(base.set_attribute("x", 2).is_err());
        assert!(base.increment_attribute("x").is_err());
        assert!(base.update_attribute("x", |_| None).is_err());
        assert!(base.default_attribute("y", 1, None).is_err());
        assert!(base.attribute_changed("x", |_| {}, false).is_err());
        assert_eq!(base.attribute("x"), Some(Variant::Number(1.0)));
        assert_eq!(base.default_attribute("x", 5, None).unwrap(), Variant::Number(1.0));
    }
}
