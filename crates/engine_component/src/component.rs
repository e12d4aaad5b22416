//! [`Component`] — a [`Behavior`] hosted on a [`BaseComponent`].
//!
//! The host drives the behavior through the lifecycle:
//!
//! 1. [`Behavior::construct`] while the base is `Constructing`; registration
//!    of signals, observers and tasks happens here.
//! 2. [`Behavior::start`] once the base is `Live`.
//! 3. [`Behavior::stop`] right before the base tears down.
//!
//! Dropping a `Component` stops it.

use std::rc::Rc;

use engine_instance::EntityHandle;
use tracing::warn;

use crate::base::BaseComponent;
use crate::config::ComponentConfig;
use crate::error::ComponentError;
use crate::janitor::CleanupReport;

/// User logic attached to an entity.
pub trait Behavior: Sized + 'static {
    /// Build the behavior. Anything registered on `base` before an error is
    /// returned is cleaned up.
    ///
    /// # Errors
    ///
    /// Any [`ComponentError`]; construction is abandoned.
    fn construct(base: &BaseComponent) -> Result<Self, ComponentError>;

    fn start(&mut self, _base: &BaseComponent) {}

    fn stop(&mut self, _base: &BaseComponent) {}
}

/// A live behavior together with the base component it runs on.
pub struct Component<B: Behavior> {
    base: BaseComponent,
    behavior: B,
}

impl<B: Behavior> Component<B> {
    /// Construct and start a `B` on `entity`.
    ///
    /// # Errors
    ///
    /// The error from [`Behavior::construct`]; the base is stopped first.
    pub fn new(config: ComponentConfig, entity: impl EntityHandle + 'static) -> Result<Self, ComponentError> {
        Self::with_entity(config, Rc::new(entity))
    }

    /// Like [`Component::new`] for an entity that is already shared.
    ///
    /// # Errors
    ///
    /// See [`Component::new`].
    pub fn with_entity(config: ComponentConfig, entity: Rc<dyn EntityHandle>) -> Result<Self, ComponentError> {
        let base = BaseComponent::with_entity(config, entity);
        let mut behavior = match B::construct(&base) {
            Ok(behavior) => behavior,
            Err(err) => {
                warn!(component = base.tag(), error = %err, "construct failed");
                base.stop();
                return Err(err);
            }
        };
        if let Err(err) = base.start() {
            // construct stopped its own base
            behavior.stop(&base);
            return Err(err);
        }
        behavior.start(&base);
        Ok(Self { base, behavior })
    }

    #[must_use]
    pub fn base(&self) -> &BaseComponent {
        &self.base
    }

    #[must_use]
    pub fn behavior(&self) -> &B {
        &self.behavior
    }

    pub fn behavior_mut(&mut self) -> &mut B {
        &mut self.behavior
    }

    /// Run [`Behavior::stop`], then tear the base down. Idempotent.
    pub fn stop(&mut self) -> CleanupReport {
        if self.base.is_destroyed() {
            return CleanupReport::default();
        }
        self.behavior.stop(&self.base);
        self.base.stop()
    }
}

impl<B: Behavior> Drop for Component<B> {
    fn drop(&mut self) {
        self.stop();
    }
}
