//! [`BaseComponent`] — the per-instance state every component builds on.
//!
//! A base component owns one [`Janitor`], one [`SignalRegistry`], a destroyed
//! flag, and a handle to the entity it is attached to. Everything it hands
//! out (signals, observers, reactive cells) is reachable from the janitor, so
//! [`BaseComponent::stop`] tears all of it down in one pass.
//!
//! ## Lifecycle
//!
//! ```text
//! Constructing ──start()──▶ Live ──stop()──▶ Stopped
//!       └───────────────stop()─────────────────▲
//! ```
//!
//! Registration is allowed while `Constructing` and `Live`. `stop()` sets the
//! destroyed flag before the janitor runs, so observers firing during
//! teardown see the component as destroyed and do nothing.
//!
//! ## Stale access
//!
//! After `stop()` every registration or mutation logs a warning and returns
//! [`ComponentError::Destroyed`]. A task handed to a destroyed component is
//! disposed on the spot rather than leaked.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use engine_instance::{EntityHandle, Variant};
use engine_signal::{Cleanup, Promise, Signal, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ComponentConfig;
use crate::error::ComponentError;
use crate::janitor::{CleanupMethod, CleanupReport, Janitor, TaskIndex};
use crate::out::OutKey;
use crate::signals::SignalRegistry;

/// Lifecycle state of a component instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Setup is running; registration is allowed.
    Constructing,
    /// Fully started.
    Live,
    /// Torn down. Terminal.
    Stopped,
}

pub(crate) struct BaseInner {
    pub(crate) instance_id: Uuid,
    pub(crate) config: ComponentConfig,
    pub(crate) entity: Rc<dyn EntityHandle>,
    pub(crate) janitor: Janitor,
    pub(crate) signals: SignalRegistry,
    pub(crate) outs: RefCell<HashMap<OutKey, Value<Option<Variant>>>>,
    pub(crate) state: Cell<LifecycleState>,
    /// Shared with observer callbacks so they can check it without holding
    /// the component alive.
    pub(crate) destroyed: Rc<Cell<bool>>,
}

impl Drop for BaseInner {
    fn drop(&mut self) {
        if !self.destroyed.replace(true) {
            debug!(component = self.config.tag, "component dropped while live; cleaning up");
            self.janitor.cleanup();
        }
    }
}

/// Handle to a component instance's shared state.
///
/// Cloning yields another handle to the same instance. Closures stored in
/// the component's own janitor or signals should capture a
/// [`WeakBaseComponent`] to avoid keeping the instance alive.
#[derive(Clone)]
pub struct BaseComponent {
    pub(crate) inner: Rc<BaseInner>,
}

/// Non-owning handle to a [`BaseComponent`].
#[derive(Clone)]
pub struct WeakBaseComponent {
    inner: Weak<BaseInner>,
}

impl WeakBaseComponent {
    #[must_use]
    pub fn upgrade(&self) -> Option<BaseComponent> {
        self.inner.upgrade().map(|inner| BaseComponent { inner })
    }
}

impl BaseComponent {
    /// Create a component attached to `entity`, in the
    /// [`LifecycleState::Constructing`] state.
    #[must_use]
    pub fn new(config: ComponentConfig, entity: impl EntityHandle + 'static) -> Self {
        Self::with_entity(config, Rc::new(entity))
    }

    /// Like [`BaseComponent::new`] for an entity that is already shared.
    #[must_use]
    pub fn with_entity(config: ComponentConfig, entity: Rc<dyn EntityHandle>) -> Self {
        let janitor = Janitor::with_budget(config.cleanup_budget);
        let signals = SignalRegistry::new(janitor.clone());
        let instance_id = Uuid::new_v4();
        debug!(
            component = config.tag,
            %instance_id,
            entity = %entity.id(),
            "component constructing"
        );
        Self {
            inner: Rc::new(BaseInner {
                instance_id,
                config,
                entity,
                janitor,
                signals,
                outs: RefCell::new(HashMap::new()),
                state: Cell::new(LifecycleState::Constructing),
                destroyed: Rc::new(Cell::new(false)),
            }),
        }
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakBaseComponent {
        WeakBaseComponent {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Unique identifier of this component instance.
    #[must_use]
    pub fn instance_id(&self) -> Uuid {
        self.inner.instance_id
    }

    /// The component tag from its [`ComponentConfig`].
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.inner.config.tag
    }

    /// The entity this component is attached to.
    #[must_use]
    pub fn entity(&self) -> &dyn EntityHandle {
        self.inner.entity.as_ref()
    }

    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.inner.state.get()
    }

    /// Returns `true` once [`BaseComponent::stop`] has begun.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.get()
    }

    /// Enter [`LifecycleState::Live`]. Starting a live component is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::Destroyed`] if the component was stopped.
    pub fn start(&self) -> Result<(), ComponentError> {
        self.guard("start")?;
        if self.inner.state.replace(LifecycleState::Live) == LifecycleState::Constructing {
            info!(
                component = self.tag(),
                instance_id = %self.inner.instance_id,
                "component started"
            );
        }
        Ok(())
    }

    /// Destroy the component: set the destroyed flag, then dispose every
    /// janitor task. Stopping twice is a no-op that returns an empty report.
    pub fn stop(&self) -> CleanupReport {
        if self.inner.destroyed.replace(true) {
            debug!(component = self.tag(), "stop on a stopped component ignored");
            return CleanupReport::default();
        }
        self.inner.state.set(LifecycleState::Stopped);

        let report = self.inner.janitor.cleanup();
        self.inner.signals.clear();
        self.inner.outs.borrow_mut().clear();

        info!(
            component = self.tag(),
            instance_id = %self.inner.instance_id,
            disposed = report.disposed,
            failed = report.failures.len(),
            "component stopped"
        );
        report
    }

    /// Fail with [`ComponentError::Destroyed`] (and a warning) once stopped.
    pub(crate) fn guard(&self, operation: &'static str) -> Result<(), ComponentError> {
        if !self.is_destroyed() {
            return Ok(());
        }
        warn!(
            component = self.tag(),
            instance_id = %self.inner.instance_id,
            operation,
            "operation on a destroyed component ignored"
        );
        Err(ComponentError::Destroyed {
            tag: self.inner.config.tag.clone(),
            operation,
        })
    }

    // ── janitor ──────────────────────────────────────────────────────────

    /// Register `task` with the component's janitor and return it.
    ///
    /// # Errors
    ///
    /// Usage errors from [`Janitor::add_task`]. On a destroyed component the
    /// task is disposed immediately and [`ComponentError::Destroyed`] is
    /// returned.
    pub fn add_task<T: Cleanup + Clone>(
        &self,
        task: T,
        method: CleanupMethod,
        index: Option<TaskIndex>,
    ) -> Result<T, ComponentError> {
        if let Err(stale) = self.guard("add_task") {
            dispose_now(&task, &method);
            return Err(stale);
        }
        self.inner.janitor.add_task(task, method, index)
    }

    /// Register a closure run once when the component stops.
    ///
    /// # Errors
    ///
    /// On a destroyed component `callback` runs immediately and
    /// [`ComponentError::Destroyed`] is returned.
    pub fn add_fn(
        &self,
        callback: impl FnOnce() + 'static,
        index: Option<TaskIndex>,
    ) -> Result<TaskIndex, ComponentError> {
        if let Err(stale) = self.guard("add_fn") {
            callback();
            return Err(stale);
        }
        self.inner.janitor.add_fn(callback, index)
    }

    /// Register a promise, cancelled when the component stops. Its entry is
    /// dropped once it settles or is cancelled.
    ///
    /// # Errors
    ///
    /// On a destroyed component the promise is cancelled immediately and
    /// [`ComponentError::Destroyed`] is returned.
    pub fn add_promise(&self, promise: Promise) -> Result<Promise, ComponentError> {
        if let Err(stale) = self.guard("add_promise") {
            promise.cancel();
            return Err(stale);
        }
        self.inner.janitor.add_promise(promise)
    }

    /// Detach the task at `index`, disposing it unless `dont_clean` is set.
    pub fn remove_task(&self, index: &TaskIndex, dont_clean: bool) {
        self.inner.janitor.remove_task(index, dont_clean);
    }

    /// Detach the task at `index` without disposing it.
    pub fn remove_task_no_clean(&self, index: &TaskIndex) {
        self.inner.janitor.remove_task_no_clean(index);
    }

    /// Returns the task at `index` if it is an object of type `T`.
    #[must_use]
    pub fn get_task<T: Clone + 'static>(&self, index: &TaskIndex) -> Option<T> {
        self.inner.janitor.get_task(index)
    }

    /// Number of live janitor tasks.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.inner.janitor.len()
    }

    // ── signals ──────────────────────────────────────────────────────────

    /// Get or create the signal called `name`.
    ///
    /// # Errors
    ///
    /// [`ComponentError::SignalTypeMismatch`] if `name` exists with another
    /// argument type; [`ComponentError::Destroyed`] once stopped.
    pub fn register_signal<A: 'static>(&self, name: &str) -> Result<Signal<A>, ComponentError> {
        self.guard("register_signal")?;
        self.inner.signals.register_signal(name)
    }

    /// Get-or-create accessor; identical to [`BaseComponent::register_signal`].
    ///
    /// # Errors
    ///
    /// See [`BaseComponent::register_signal`].
    pub fn get_signal<A: 'static>(&self, name: &str) -> Result<Signal<A>, ComponentError> {
        self.guard("get_signal")?;
        self.inner.signals.get_signal(name)
    }

    /// Fire signal `name`. A missing signal makes this a no-op; so does a
    /// stopped component, whose signals are gone.
    ///
    /// # Errors
    ///
    /// [`ComponentError::SignalTypeMismatch`] if `name` exists with another
    /// argument type.
    pub fn fire_signal<A: 'static>(&self, name: &str, args: A) -> Result<(), ComponentError> {
        self.inner.signals.fire_signal(name, args)
    }

    /// Returns `true` if the signal `name` has been created.
    #[must_use]
    pub fn has_signal(&self, name: &str) -> bool {
        self.inner.signals.contains(name)
    }
}

/// Best-effort teardown of a task refused by a destroyed component.
fn dispose_now<T: Cleanup>(task: &T, method: &CleanupMethod) {
    let method = match method {
        CleanupMethod::Infer => task.default_method().map(str::to_string),
        CleanupMethod::Destroy => Some(engine_signal::DESTROY.to_string()),
        CleanupMethod::Named(name) => Some(name.to_string()),
    };
    let Some(method) = method else {
        return;
    };
    if let Err(err) = task.cleanup(&method) {
        warn!(error = %err, "refused task could not be disposed");
    }
}

impl fmt::Debug for BaseComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseComponent")
            .field("tag", &self.inner.config.tag)
            .field("instance_id", &self.inner.instance_id)
            .field("state", &self.inner.state.get())
            .field("tasks", &self.inner.janitor.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use engine_instance::{EntityId, Instance};

    use super::*;

    fn base() -> BaseComponent {
        BaseComponent::new(
            ComponentConfig::new("Door"),
            Instance::new(EntityId::from_raw(1), "Part"),
        )
    }

    #[test]
    fn test_lifecycle_transitions() {
        let base = base();
        assert_eq!(base.state(), LifecycleState::Constructing);
        assert!(!base.is_destroyed());
        base.start().unwrap();
        base.start().unwrap();
        assert_eq!(base.state(), LifecycleState::Live);
        base.stop();
        assert_eq!(base.state(), LifecycleState::Stopped);
        assert!(base.is_destroyed());
        assert!(matches!(base.start(), Err(ComponentError::Destroyed { .. })));
    }

    #[test]
    fn test_double_stop_disposes_once() {
        let base = base();
        let runs = Rc::new(Cell::new(0));
        for _ in 0..3 {
            let counter = Rc::clone(&runs);
            base.add_fn(move || counter.set(counter.get() + 1), None).unwrap();
        }
        base.start().unwrap();

        assert_eq!(base.stop().disposed, 3);
        assert_eq!(base.stop().disposed, 0);
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn test_destroyed_flag_is_set_before_cleanup() {
        let base = base();
        let seen = Rc::new(Cell::new(false));
        let weak = base.downgrade();
        let flag = Rc::clone(&seen);
        base.add_fn(
            move || {
                if let Some(base) = weak.upgrade() {
                    flag.set(base.is_destroyed());
                }
            },
            None,
        )
        .unwrap();
        base.stop();
        assert!(seen.get());
    }

    #[test]
    fn test_stop_from_constructing() {
        let base = base();
        let ran = Rc::new(Cell::new(false));
        let flag = Rc::clone(&ran);
        base.add_fn(move || flag.set(true), None).unwrap();
        base.stop();
        assert!(ran.get());
        assert_eq!(base.state(), LifecycleState::Stopped);
    }

    #[test]
    fn test_stale_add_task_disposes_immediately() {
        let base = base();
        base.stop();

        let signal = Signal::<()>::new();
        let conn = signal.connect(|_| {});
        let result = base.add_task(conn.clone(), CleanupMethod::Infer, None);
        assert!(matches!(result, Err(ComponentError::Destroyed { .. })));
        assert!(!conn.is_connected());
        assert_eq!(base.task_count(), 0);

        let ran = Rc::new(Cell::new(false));
        let flag = Rc::clone(&ran);
        assert!(base.add_fn(move || flag.set(true), None).is_err());
        assert!(ran.get());
        assert_eq!(base.task_count(), 0);
    }

    #[test]
    fn test_stale_add_promise_cancels() {
        let base = base();
        base.stop();
        let (promise, _future) = Promise::new(futures::future::pending::<()>());
        assert!(base.add_promise(promise.clone()).is_err());
        assert!(promise.is_cancelled());
    }

    #[test]
    fn test_finished_promises_leave_the_janitor() {
        let base = base();
        base.start().unwrap();
        for _ in 0..100 {
            let (promise, _future) = Promise::new(futures::future::pending::<()>());
            base.add_promise(promise.clone()).unwrap();
            promise.cancel();
        }
        assert_eq!(base.task_count(), 0);

        let (pending, _future) = Promise::new(futures::future::pending::<()>());
        base.add_promise(pending.clone()).unwrap();
        assert_eq!(base.task_count(), 1);
        base.stop();
        assert!(pending.is_cancelled());
    }

    #[test]
    fn test_small_budget_still_disposes_every_task() {
        let base = BaseComponent::new(
            ComponentConfig::new("Door").with_cleanup_budget(2),
            Instance::new(EntityId::from_raw(1), "Part"),
        );
        base.start().unwrap();
        let runs = Rc::new(Cell::new(0));
        for _ in 0..10 {
            let counter = Rc::clone(&runs);
            base.add_fn(move || counter.set(counter.get() + 1), None).unwrap();
        }

        let report = base.stop();
        assert!(report.is_clean());
        assert_eq!(runs.get(), 10);
        assert_eq!(base.task_count(), 0);
    }

    #[test]
    fn test_signals_through_base() {
        let base = base();
        base.fire_signal("Opened", ()).unwrap();
        assert!(!base.has_signal("Opened"));

        let signal = base.register_signal::<bool>("Opened").unwrap();
        assert!(signal.ptr_eq(&base.get_signal::<bool>("Opened").unwrap()));
        let seen = Rc::new(Cell::new(false));
        let flag = Rc::clone(&seen);
        signal.connect(move |open| flag.set(*open));
        base.fire_signal("Opened", true).unwrap();
        assert!(seen.get());

        base.stop();
        assert!(signal.is_destroyed());
        assert!(!base.has_signal("Opened"));
        base.fire_signal("Opened", true).unwrap();
        assert!(base.register_signal::<bool>("Opened").is_err());
    }

    #[test]
    fn test_task_passthrough() {
        let base = base();
        let value = Value::new(1);
        base.add_task(value.clone(), CleanupMethod::Infer, Some("cell".into()))
            .unwrap();
        let fetched: Value<i32> = base.get_task(&"cell".into()).unwrap();
        assert!(fetched.ptr_eq(&value));

        base.remove_task_no_clean(&"cell".into());
        assert!(base.get_task::<Value<i32>>(&"cell".into()).is_none());
        base.stop();
        assert!(!value.is_destroyed());
    }

    #[test]
    fn test_drop_cleans_up_live_component() {
        let ran = Rc::new(Cell::new(false));
        {
            let base = base();
            let flag = Rc::clone(&ran);
            base.add_fn(move || flag.set(true), None).unwrap();
        }
        assert!(ran.get());
    }
}
