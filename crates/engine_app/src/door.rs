//! A door component: toggles its `Open` attribute, counts uses, and closes
//! itself after a delay.

use std::cell::RefCell;
use std::time::Duration;

use engine_component::{BaseComponent, Behavior, ComponentError};
use engine_instance::{EntityId, Variant, VariantKind};
use engine_signal::{Promise, Signal, Value};
use tracing::{debug, info, warn};

pub const OPEN: &str = "Open";
pub const USES: &str = "Uses";
pub const AUTO_CLOSE: &str = "AutoCloseSeconds";

pub struct Door {
    entity: EntityId,
    opened: Signal<EntityId>,
    closed: Signal<EntityId>,
    uses: Value<Option<Variant>>,
    pending_close: RefCell<Option<Promise>>,
}

impl Behavior for Door {
    fn construct(base: &BaseComponent) -> Result<Self, ComponentError> {
        let entity = base.entity().id();
        let opened = base.register_signal::<EntityId>("Opened")?;
        let closed = base.register_signal::<EntityId>("Closed")?;

        base.default_attribute(OPEN, false, Some(&[VariantKind::Bool]))?;
        base.default_attribute(USES, 0, Some(&[VariantKind::Number]))?;
        base.default_attribute(AUTO_CLOSE, 0, Some(&[VariantKind::Number]))?;

        let weak = base.downgrade();
        base.attribute_changed(
            OPEN,
            move |value| {
                let Some(base) = weak.upgrade() else { return };
                let name = if value.and_then(Variant::as_bool).unwrap_or(false) {
                    "Opened"
                } else {
                    "Closed"
                };
                if let Err(err) = base.fire_signal(name, entity) {
                    debug!(error = %err, "door signal not fired");
                }
            },
            false,
        )?;

        let uses = base.out_attribute(USES)?;
        Ok(Self {
            entity,
            opened,
            closed,
            uses,
            pending_close: RefCell::new(None),
        })
    }

    fn start(&mut self, base: &BaseComponent) {
        info!(entity = %self.entity, instance_id = %base.instance_id(), "door ready");
    }

    fn stop(&mut self, _base: &BaseComponent) {
        debug!(entity = %self.entity, uses = self.use_count(), "door stopping");
    }
}

impl Door {
    #[must_use]
    pub fn opened(&self) -> &Signal<EntityId> {
        &self.opened
    }

    #[must_use]
    pub fn closed(&self) -> &Signal<EntityId> {
        &self.closed
    }

    /// Times the door has been opened, as mirrored by its out cell.
    #[must_use]
    pub fn use_count(&self) -> f64 {
        self.uses.with(|uses| uses.as_ref().and_then(Variant::as_number).unwrap_or(0.0))
    }

    /// Flip the door. Opening bumps the use counter and, with a positive
    /// `AutoCloseSeconds`, schedules a close on the current `LocalSet`.
    ///
    /// # Errors
    ///
    /// [`ComponentError::Destroyed`] once the door has stopped.
    pub fn toggle(&self, base: &BaseComponent) -> Result<bool, ComponentError> {
        let next = base.update_attribute(OPEN, |current| {
            let open = current.as_ref().and_then(Variant::as_bool).unwrap_or(false);
            Some(Variant::Bool(!open))
        })?;
        let open = next.as_ref().and_then(Variant::as_bool).unwrap_or(false);

        if let Some(previous) = self.pending_close.borrow_mut().take() {
            previous.cancel();
        }
        if open {
            base.increment_attribute(USES)?;
            self.schedule_close(base)?;
        }
        Ok(open)
    }

    fn schedule_close(&self, base: &BaseComponent) -> Result<(), ComponentError> {
        let seconds = base
            .attribute(AUTO_CLOSE)
            .as_ref()
            .and_then(Variant::as_number)
            .unwrap_or(0.0);
        if seconds <= 0.0 {
            return Ok(());
        }

        let delay = match Duration::try_from_secs_f64(seconds) {
            Ok(delay) => delay,
            Err(err) => {
                warn!(entity = %self.entity, seconds, error = %err, "auto-close delay ignored");
                return Ok(());
            }
        };

        let (promise, closing) = Promise::new(tokio::time::sleep(delay));
        let promise = base.add_promise(promise)?;
        let weak = base.downgrade();
        let entity = self.entity;
        tokio::task::spawn_local(async move {
            if closing.await.is_err() {
                return;
            }
            if let Some(base) = weak.upgrade()
                && base.set_attribute(OPEN, false).is_ok()
            {
                debug!(entity = %entity, "door closed itself");
            }
        });
        *self.pending_close.borrow_mut() = Some(promise);
        Ok(())
    }
}
