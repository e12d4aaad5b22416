//! Property bridge: the class-declared counterpart of the attribute bridge.

use std::rc::Rc;

use engine_instance::{ChangedSignal, Variant};
use engine_signal::{Connection, Value};

use crate::base::BaseComponent;
use crate::error::ComponentError;
use crate::observe::ObserverHandle;
use crate::out::OutKey;

impl BaseComponent {
    /// Current value of property `name`; `None` if the class does not
    /// declare it.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<Variant> {
        self.inner.entity.property(name)
    }

    /// Assign property `name`.
    ///
    /// # Errors
    ///
    /// [`ComponentError::Entity`] if the entity rejects the write;
    /// [`ComponentError::Destroyed`] once stopped.
    pub fn set_property(&self, name: &str, value: impl Into<Variant>) -> Result<(), ComponentError> {
        self.guard("set_property")?;
        self.inner.entity.set_property(name, value.into())?;
        Ok(())
    }

    /// Call `callback` with the property's current value now, and again
    /// after every change.
    ///
    /// # Errors
    ///
    /// [`ComponentError::Destroyed`] once stopped.
    pub fn observe_property(
        &self,
        name: &str,
        callback: impl Fn(Option<&Variant>) + 'static,
    ) -> Result<ObserverHandle, ComponentError> {
        self.guard("observe_property")?;
        let signal = self.inner.entity.property_changed_signal(name);
        let entity = Rc::clone(&self.inner.entity);
        self.observe_with(&signal, || entity.property(name), callback)
    }

    /// The entity's raw change signal for property `name`.
    #[must_use]
    pub fn property_changed_signal(&self, name: &str) -> ChangedSignal {
        self.inner.entity.property_changed_signal(name)
    }

    /// Connect `listener` to changes of property `name`, optionally for the
    /// next change only. Owned by the component's janitor.
    ///
    /// # Errors
    ///
    /// [`ComponentError::Destroyed`] once stopped.
    pub fn property_changed(
        &self,
        name: &str,
        listener: impl Fn(Option<&Variant>) + 'static,
        once: bool,
    ) -> Result<Connection, ComponentError> {
        self.guard("property_changed")?;
        let signal = self.inner.entity.property_changed_signal(name);
        let (connection, _) = self.connect_guarded(&signal, listener, once)?;
        Ok(connection)
    }

    /// A reactive cell mirroring property `name`.
    ///
    /// # Errors
    ///
    /// [`ComponentError::Destroyed`] once stopped.
    pub fn out_property(&self, name: &str) -> Result<Value<Option<Variant>>, ComponentError> {
        self.out(OutKey::Property(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use engine_instance::{EntityError, EntityHandle, EntityId, Instance, VariantKind};

    use super::*;
    use crate::config::ComponentConfig;

    fn setup() -> (BaseComponent, Instance) {
        let instance = Instance::new(EntityId::from_raw(7), "Part")
            .with_property("Transparency", 0.0)
            .with_property("Name", "Door");
        let base = BaseComponent::new(ComponentConfig::new("Fader"), instance.clone());
        (base, instance)
    }

    #[test]
    fn test_read_and_write() {
        let (base, instance) = setup();
        assert_eq!(base.property("Transparency"), Some(Variant::Number(0.0)));
        base.set_property("Transparency", 0.5).unwrap();
        assert_eq!(instance.property("Transparency"), Some(Variant::Number(0.5)));
        assert_eq!(base.property("Missing"), None);
    }

    #[test]
    fn test_entity_rejections_surface() {
        let (base, _instance) = setup();
        let err = base.set_property("Missing", 1).unwrap_err();
        assert!(matches!(
            err,
            ComponentError::Entity(EntityError::UnknownProperty { .. })
        ));

        let err = base.set_property("Transparency", "opaque").unwrap_err();
        assert!(matches!(
            err,
            ComponentError::Entity(EntityError::PropertyKindMismatch {
                expected: VariantKind::Number,
                found: VariantKind::String,
                ..
            })
        ));
        assert_eq!(base.property("Transparency"), Some(Variant::Number(0.0)));
    }

    #[test]
    fn test_observe_property() {
        let (base, instance) = setup();
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        base.observe_property("Name", move |v| sink.borrow_mut().push(v.cloned())).unwrap();

        instance.set_property("Name", Variant::from("Gate")).unwrap();
        instance.set_property("Name", Variant::from("Gate")).unwrap();
        assert_eq!(
            *log.borrow(),
            vec![Some(Variant::from("Door")), Some(Variant::from("Gate"))]
        );

        base.stop();
        instance.set_property("Name", Variant::from("Wall")).unwrap();
        assert_eq!(log.borrow().len(), 2);
    }

    #[test]
    fn test_property_changed_once() {
        let (base, instance) = setup();
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        let conn = base
            .property_changed(
                "Transparency",
                move |v| sink.borrow_mut().push(v.cloned()),
                true,
            )
            .unwrap();

        instance.set_property("Transparency", Variant::from(0.25)).unwrap();
        instance.set_property("Transparency", Variant::from(1.0)).unwrap();
        assert_eq!(*log.borrow(), vec![Some(Variant::Number(0.25))]);
        assert!(!conn.is_connected());
    }

    #[test]
    fn test_property_changed_signal() {
        let (base, instance) = setup();
        let signal = base.property_changed_signal("Transparency");
        assert!(signal.ptr_eq(&instance.property_changed_signal("Transparency")));
    }

    #[test]
    fn test_stale_property_access() {
        let (base, _instance) = setup();
        base.stop();
        assert!(matches!(
            base.set_property("Transparency", 1.0),
            Err(ComponentError::Destroyed { .. })
        ));
        assert!(base.observe_property("Name", |_| {}).is_err());
        assert!(base.property_changed("Name", |_| {}, false).is_err());
        assert!(base.out_property("Name").is_err());
        assert_eq!(base.property("Name"), Some(Variant::from("Door")));
    }
}
