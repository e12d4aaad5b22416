//! Multi-listener synchronous [`Signal`] and its [`Connection`] handle.
//!
//! Firing is re-entrant: listeners run against a snapshot of the listener
//! list taken when [`Signal::fire`] starts, so a listener may connect,
//! disconnect, or fire further signals while it runs. Listeners connected
//! during a firing are not invoked for that firing; listeners disconnected
//! during a firing are skipped if they have not run yet.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::cleanup::{self, Cleanup, CleanupError, DESTROY, DISCONNECT, DISCONNECT_ALL};

type Callback<A> = Box<dyn Fn(&A)>;

/// One connected listener.
struct Slot<A> {
    id: u64,
    connected: Rc<Cell<bool>>,
    once: bool,
    callback: Callback<A>,
}

struct SignalInner<A> {
    /// Listeners in connection order.
    slots: RefCell<Vec<Rc<Slot<A>>>>,
    next_id: Cell<u64>,
    destroyed: Cell<bool>,
}

/// Type-erased view of a signal used by [`Connection`] to detach itself.
trait Detach {
    fn detach(&self, id: u64);
}

impl<A> Detach for SignalInner<A> {
    fn detach(&self, id: u64) {
        self.slots.borrow_mut().retain(|slot| slot.id != id);
    }
}

/// A handle to a listener attached to a [`Signal`].
///
/// Dropping a `Connection` does **not** disconnect it; call
/// [`Connection::disconnect`] or hand the connection to a janitor.
#[derive(Clone)]
pub struct Connection {
    id: u64,
    connected: Rc<Cell<bool>>,
    signal: Weak<dyn Detach>,
}

impl Connection {
    /// A connection that was never attached to anything.
    fn detached() -> Self {
        let signal: Weak<dyn Detach> = Weak::<SignalInner<()>>::new();
        Self {
            id: 0,
            connected: Rc::new(Cell::new(false)),
            signal,
        }
    }

    /// Returns `true` while the listener is still attached.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.get()
    }

    /// Detach the listener. Calling this more than once is a no-op.
    pub fn disconnect(&self) {
        if !self.connected.replace(false) {
            return;
        }
        if let Some(signal) = self.signal.upgrade() {
            signal.detach(self.id);
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("connected", &self.connected.get())
            .finish()
    }
}

impl Cleanup for Connection {
    fn default_method(&self) -> Option<&'static str> {
        Some(DISCONNECT)
    }

    fn supports(&self, method: &str) -> bool {
        method == DISCONNECT
    }

    fn cleanup(&self, method: &str) -> Result<(), CleanupError> {
        match method {
            DISCONNECT => {
                self.disconnect();
                Ok(())
            }
            other => Err(cleanup::unknown(other)),
        }
    }
}

/// A synchronous event primitive delivering `&A` to every connected listener.
///
/// `A` is usually a tuple of the event's arguments. Cloning a `Signal` yields
/// another handle to the same listener list.
pub struct Signal<A: 'static> {
    inner: Rc<SignalInner<A>>,
}

impl<A: 'static> Signal<A> {
    /// Create a signal with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(SignalInner {
                slots: RefCell::new(Vec::new()),
                next_id: Cell::new(1),
                destroyed: Cell::new(false),
            }),
        }
    }

    /// Attach `listener`; it runs on every subsequent [`Signal::fire`].
    pub fn connect(&self, listener: impl Fn(&A) + 'static) -> Connection {
        self.attach(Box::new(listener), false)
    }

    /// Attach `listener` for a single firing; it disconnects itself before
    /// it runs.
    pub fn connect_once(&self, listener: impl Fn(&A) + 'static) -> Connection {
        self.attach(Box::new(listener), true)
    }

    fn attach(&self, callback: Callback<A>, once: bool) -> Connection {
        if self.inner.destroyed.get() {
            debug!("connect on a destroyed signal ignored");
            return Connection::detached();
        }

        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);

        let connected = Rc::new(Cell::new(true));
        self.inner.slots.borrow_mut().push(Rc::new(Slot {
            id,
            connected: Rc::clone(&connected),
            once,
            callback,
        }));

        let signal: Weak<dyn Detach> = Rc::downgrade(&self.inner) as Weak<dyn Detach>;
        Connection {
            id,
            connected,
            signal,
        }
    }

    /// Invoke every connected listener with `args`, in connection order.
    pub fn fire(&self, args: &A) {
        let snapshot: Vec<Rc<Slot<A>>> = self.inner.slots.borrow().clone();
        for slot in snapshot {
            if !slot.connected.get() {
                continue;
            }
            if slot.once {
                slot.connected.set(false);
                self.inner.detach(slot.id);
            }
            (slot.callback)(args);
        }
    }

    /// Number of listeners currently attached.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.slots.borrow().len()
    }

    /// Detach every listener. The signal stays usable.
    pub fn disconnect_all(&self) {
        let slots = std::mem::take(&mut *self.inner.slots.borrow_mut());
        for slot in &slots {
            slot.connected.set(false);
        }
    }

    /// Detach every listener and refuse further connections.
    pub fn destroy(&self) {
        self.inner.destroyed.set(true);
        self.disconnect_all();
    }

    /// Returns `true` once [`Signal::destroy`] has run.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.get()
    }

    /// Returns `true` if both handles refer to the same signal.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<A: 'static> Clone for Signal<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<A: 'static> Default for Signal<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: 'static> fmt::Debug for Signal<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("listeners", &self.listener_count())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

impl<A: 'static> Cleanup for Signal<A> {
    fn supports(&self, method: &str) -> bool {
        matches!(method, DESTROY | DISCONNECT_ALL)
    }

    fn cleanup(&self, method: &str) -> Result<(), CleanupError> {
        match method {
            DESTROY => self.destroy(),
            DISCONNECT_ALL => self.disconnect_all(),
            other => return Err(cleanup::unknown(other)),
        }
        Ok(())
    }
}
