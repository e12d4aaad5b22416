//! Scoped cleanup of heterogeneous resources.
//!
//! A [`Janitor`] owns a set of tasks, each registered under a [`TaskIndex`],
//! and disposes all of them exactly once when [`Janitor::cleanup`] runs.
//!
//! ## Task shapes
//!
//! - **Objects** implementing [`Cleanup`] (connections, signals, value
//!   cells, promises, nested janitors). Their teardown is a named operation,
//!   chosen through [`CleanupMethod`] and validated when the task is added.
//! - **Closures** registered with [`Janitor::add_fn`], invoked once.
//!
//! ## Ordering
//!
//! Tasks are disposed in insertion order. Replacing the task at an occupied
//! index disposes the old task and appends the new one at the end.
//! Cleanup is a drain loop: tasks registered while cleanup is running are
//! disposed by the same pass.

use std::any::Any;
use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use engine_signal::{Cleanup, CleanupError, DESTROY, Promise};
use tracing::{debug, error};

use crate::config::DEFAULT_CLEANUP_BUDGET;
use crate::error::ComponentError;

/// Alternate operation name accepted by a janitor used as a task.
pub const CLEANUP: &str = "Cleanup";

/// Key of a janitor task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskIndex {
    /// Identity allocated by the janitor when the caller gave no index.
    Id(u64),
    /// Caller-supplied key.
    Key(String),
    /// Key namespaced by a subsystem so it cannot collide with user keys.
    Scoped { scope: &'static str, name: String },
}

impl TaskIndex {
    /// A caller-supplied key.
    #[must_use]
    pub fn key(key: impl Into<String>) -> Self {
        TaskIndex::Key(key.into())
    }

    /// A key namespaced under `scope`.
    #[must_use]
    pub fn scoped(scope: &'static str, name: impl Into<String>) -> Self {
        TaskIndex::Scoped {
            scope,
            name: name.into(),
        }
    }
}

impl fmt::Display for TaskIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskIndex::Id(id) => write!(f, "#{id}"),
            TaskIndex::Key(key) => f.write_str(key),
            TaskIndex::Scoped { scope, name } => write!(f, "{scope}:{name}"),
        }
    }
}

impl From<&str> for TaskIndex {
    fn from(key: &str) -> Self {
        TaskIndex::Key(key.to_string())
    }
}

impl From<String> for TaskIndex {
    fn from(key: String) -> Self {
        TaskIndex::Key(key)
    }
}

/// How an object task is torn down.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CleanupMethod {
    /// Use the task's canonical operation.
    #[default]
    Infer,
    /// Use the generic `"Destroy"` operation.
    Destroy,
    /// Use the named operation.
    Named(Cow<'static, str>),
}

impl CleanupMethod {
    #[must_use]
    pub fn named(method: impl Into<Cow<'static, str>>) -> Self {
        CleanupMethod::Named(method.into())
    }

    /// Pick the concrete operation for `task`, or fail with a usage error.
    fn resolve(&self, task: &dyn Cleanup) -> Result<Cow<'static, str>, ComponentError> {
        let method: Cow<'static, str> = match self {
            CleanupMethod::Infer => match task.default_method() {
                Some(method) => Cow::Borrowed(method),
                None => return Err(ComponentError::NoCleanupMethod),
            },
            CleanupMethod::Destroy => Cow::Borrowed(DESTROY),
            CleanupMethod::Named(method) => method.clone(),
        };
        if !task.supports(&method) {
            return Err(ComponentError::UnknownCleanupMethod {
                method: method.into_owned(),
            });
        }
        Ok(method)
    }
}

/// Outcome of a [`Janitor::cleanup`] pass.
#[derive(Debug, Default)]
pub struct CleanupReport {
    /// Tasks disposed, including those whose disposal failed.
    pub disposed: usize,
    /// Tasks whose disposal failed, in disposal order.
    pub failures: Vec<(TaskIndex, CleanupError)>,
    /// `true` if the cleanup budget ran out before the janitor was empty.
    pub exhausted: bool,
}

impl CleanupReport {
    /// Returns `true` if every task was disposed without error.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && !self.exhausted
    }
}

enum Payload {
    Object {
        handle: Rc<dyn Any>,
        cleanup: Rc<dyn Cleanup>,
        method: Cow<'static, str>,
    },
    Callback(Box<dyn FnOnce()>),
}

struct Entry {
    index: TaskIndex,
    payload: Payload,
}

impl Entry {
    /// Run the task's teardown. Panics are caught and reported as errors.
    fn dispose(self) -> Result<(), CleanupError> {
        let Entry { index, payload } = self;
        let outcome = panic::catch_unwind(AssertUnwindSafe(move || match payload {
            Payload::Object {
                cleanup, method, ..
            } => cleanup.cleanup(&method),
            Payload::Callback(callback) => {
                callback();
                Ok(())
            }
        }));
        match outcome {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                debug!(index = %index, reason = %message, "task panicked during cleanup");
                Err(CleanupError::Panicked(message))
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[derive(Default)]
struct Tasks {
    /// Entries keyed by insertion sequence number.
    order: BTreeMap<u64, Entry>,
    /// Index -> sequence number of its live entry.
    slots: HashMap<TaskIndex, u64>,
    next_seq: u64,
    next_id: u64,
}

impl Tasks {
    fn detach(&mut self, index: &TaskIndex) -> Option<Entry> {
        let seq = self.slots.remove(index)?;
        self.order.remove(&seq)
    }

    fn push(&mut self, entry: Entry) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.slots.insert(entry.index.clone(), seq);
        self.order.insert(seq, entry);
    }

    fn pop_first(&mut self) -> Option<Entry> {
        let (_, entry) = self.order.pop_first()?;
        self.slots.remove(&entry.index);
        Some(entry)
    }
}

struct JanitorInner {
    tasks: RefCell<Tasks>,
    cleaning: Cell<bool>,
    budget: usize,
}

/// Ordered registry of disposable tasks.
///
/// Cloning a `Janitor` yields another handle to the same registry, so task
/// closures may capture a handle (preferably a [`WeakJanitor`]) and register
/// or remove tasks while cleanup is in progress.
#[derive(Clone)]
pub struct Janitor {
    inner: Rc<JanitorInner>,
}

/// Non-owning handle to a [`Janitor`].
#[derive(Debug, Clone)]
pub struct WeakJanitor {
    inner: Weak<JanitorInner>,
}

impl WeakJanitor {
    #[must_use]
    pub fn upgrade(&self) -> Option<Janitor> {
        self.inner.upgrade().map(|inner| Janitor { inner })
    }
}

impl Janitor {
    /// Create an empty janitor with the default cleanup budget.
    #[must_use]
    pub fn new() -> Self {
        Self::with_budget(DEFAULT_CLEANUP_BUDGET)
    }

    /// Create an empty janitor whose cleanup pass disposes at most `budget`
    /// tasks beyond those present when the pass starts.
    #[must_use]
    pub fn with_budget(budget: usize) -> Self {
        Self {
            inner: Rc::new(JanitorInner {
                tasks: RefCell::new(Tasks::default()),
                cleaning: Cell::new(false),
                budget,
            }),
        }
    }

    #[must_use]
    pub fn downgrade(&self) -> WeakJanitor {
        WeakJanitor {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// Register `task` and return it.
    ///
    /// With `index: None` the task gets a fresh [`TaskIndex::Id`] on every
    /// call, so adding the same handle twice creates two entries and disposes
    /// it twice. Pass an explicit index to keep a single entry; any task
    /// already at `index` is disposed first.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::NoCleanupMethod`] or
    /// [`ComponentError::UnknownCleanupMethod`] if `method` cannot be applied
    /// to `task`. Nothing is registered in that case.
    pub fn add_task<T: Cleanup + Clone>(
        &self,
        task: T,
        method: CleanupMethod,
        index: Option<TaskIndex>,
    ) -> Result<T, ComponentError> {
        self.add_indexed(task.clone(), method, index)?;
        Ok(task)
    }

    /// Like [`Janitor::add_task`], but returns the index the task was stored
    /// under. Useful when the janitor picked the index.
    ///
    /// # Errors
    ///
    /// Same as [`Janitor::add_task`].
    pub fn add_indexed<T: Cleanup>(
        &self,
        task: T,
        method: CleanupMethod,
        index: Option<TaskIndex>,
    ) -> Result<TaskIndex, ComponentError> {
        let method = method.resolve(&task)?;
        let task = Rc::new(task);
        let handle: Rc<dyn Any> = task.clone();
        let cleanup: Rc<dyn Cleanup> = task;
        Ok(self.insert(
            index,
            Payload::Object {
                handle,
                cleanup,
                method,
            },
        ))
    }

    /// Register a closure invoked once at disposal.
    ///
    /// # Errors
    ///
    /// Never fails today; the `Result` keeps the signature aligned with the
    /// other registration methods.
    pub fn add_fn(
        &self,
        callback: impl FnOnce() + 'static,
        index: Option<TaskIndex>,
    ) -> Result<TaskIndex, ComponentError> {
        Ok(self.insert(index, Payload::Callback(Box::new(callback))))
    }

    /// Register a promise; disposal cancels it. The entry is dropped as soon
    /// as the promise settles or is cancelled. A promise that has already
    /// finished is returned without being registered.
    ///
    /// # Errors
    ///
    /// Never fails for promises; see [`Janitor::add_fn`].
    pub fn add_promise(&self, promise: Promise) -> Result<Promise, ComponentError> {
        if promise.is_finished() {
            return Ok(promise);
        }
        let index = self.add_indexed(promise.clone(), CleanupMethod::Infer, None)?;
        let janitor = self.downgrade();
        promise.on_finish(move || {
            if let Some(janitor) = janitor.upgrade() {
                janitor.remove_task_no_clean(&index);
            }
        });
        Ok(promise)
    }

    fn insert(&self, index: Option<TaskIndex>, payload: Payload) -> TaskIndex {
        let index = match index {
            Some(index) => {
                // Last writer wins: anything that lands on this index while a
                // previous occupant is being disposed is disposed as well.
                loop {
                    let previous = self.inner.tasks.borrow_mut().detach(&index);
                    let Some(previous) = previous else {
                        break;
                    };
                    debug!(index = %index, "replacing task");
                    self.dispose_reporting(previous);
                }
                index
            }
            None => {
                let mut tasks = self.inner.tasks.borrow_mut();
                let id = tasks.next_id;
                tasks.next_id += 1;
                TaskIndex::Id(id)
            }
        };

        self.inner.tasks.borrow_mut().push(Entry {
            index: index.clone(),
            payload,
        });
        index
    }

    fn dispose_reporting(&self, entry: Entry) -> Option<(TaskIndex, CleanupError)> {
        let index = entry.index.clone();
        match entry.dispose() {
            Ok(()) => None,
            Err(err) => {
                error!(index = %index, error = %err, "task cleanup failed");
                Some((index, err))
            }
        }
    }

    /// Detach the task at `index`, disposing it unless `dont_clean` is set.
    /// Missing indices are ignored.
    pub fn remove_task(&self, index: &TaskIndex, dont_clean: bool) {
        let entry = self.inner.tasks.borrow_mut().detach(index);
        match entry {
            Some(entry) if !dont_clean => {
                self.dispose_reporting(entry);
            }
            Some(_) => debug!(index = %index, "task detached without cleanup"),
            None => {}
        }
    }

    /// Detach the task at `index` without disposing it.
    pub fn remove_task_no_clean(&self, index: &TaskIndex) {
        self.remove_task(index, true);
    }

    /// Returns the task at `index` if it is an object of type `T`.
    #[must_use]
    pub fn get_task<T: Clone + 'static>(&self, index: &TaskIndex) -> Option<T> {
        let tasks = self.inner.tasks.borrow();
        let seq = tasks.slots.get(index)?;
        match &tasks.order.get(seq)?.payload {
            Payload::Object { handle, .. } => handle.downcast_ref::<T>().cloned(),
            Payload::Callback(_) => None,
        }
    }

    /// Returns `true` if a task is registered at `index`.
    #[must_use]
    pub fn contains(&self, index: &TaskIndex) -> bool {
        self.inner.tasks.borrow().slots.contains_key(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.tasks.borrow().order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dispose every task, including tasks registered during this pass.
    ///
    /// Every task present when the pass starts is always disposed; the
    /// budget only caps how many extra disposals tasks registered during the
    /// pass may cause. Failing tasks are logged and recorded in the report;
    /// they never stop the pass. A nested call from inside a task returns an
    /// empty report and leaves the work to the outer pass.
    pub fn cleanup(&self) -> CleanupReport {
        let mut report = CleanupReport::default();
        if self.inner.cleaning.replace(true) {
            debug!("cleanup already in progress");
            return report;
        }

        let limit = self.len().saturating_add(self.inner.budget);
        loop {
            if report.disposed >= limit {
                if !self.is_empty() {
                    report.exhausted = true;
                    error!(
                        budget = self.inner.budget,
                        remaining = self.len(),
                        "cleanup budget exhausted"
                    );
                }
                break;
            }
            let next = self.inner.tasks.borrow_mut().pop_first();
            let Some(entry) = next else {
                break;
            };
            if let Some(failure) = self.dispose_reporting(entry) {
                report.failures.push(failure);
            }
            report.disposed += 1;
        }

        self.inner.cleaning.set(false);
        debug!(
            disposed = report.disposed,
            failed = report.failures.len(),
            "janitor cleaned"
        );
        report
    }
}

impl Default for Janitor {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Janitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tasks = self.inner.tasks.borrow();
        let indices: Vec<&TaskIndex> = tasks.order.values().map(|entry| &entry.index).collect();
        f.debug_struct("Janitor").field("tasks", &indices).finish()
    }
}

impl Cleanup for Janitor {
    fn supports(&self, method: &str) -> bool {
        matches!(method, DESTROY | CLEANUP)
    }

    fn cleanup(&self, method: &str) -> Result<(), CleanupError> {
        if !self.supports(method) {
            return Err(CleanupError::UnknownMethod {
                method: method.to_string(),
            });
        }
        let report = Janitor::cleanup(self);
        if report.is_clean() {
            Ok(())
        } else {
            Err(CleanupError::Failed(format!(
                "{} nested task(s) failed",
                report.failures.len()
            )))
        }
    }
}
