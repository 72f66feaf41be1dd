//! Synchronous, single-threaded signals. Emission never queues: every
//! subscriber alive at the moment of emit() runs to completion before emit()
//! returns. Subscribers registered while an emission is in flight are not
//! invoked until the next emission; subscribers released mid-emission are
//! skipped if they have not yet run.

use std::cell;
use std::fmt;
use std::rc;
use std::vec;

struct Slot<T> {
    callback: rc::Rc<dyn Fn(&T)>,
    live: rc::Rc<cell::Cell<bool>>,
}

impl<T> Clone for Slot<T> {
    fn clone(&self) -> Slot<T> {
        Slot {
            callback: self.callback.clone(),
            live: self.live.clone(),
        }
    }
}

pub struct Signal<T> {
    slots: cell::RefCell<vec::Vec<Slot<T>>>,
}

impl<T> Signal<T> {
    pub fn new() -> Signal<T> {
        Signal {
            slots: cell::RefCell::new(vec::Vec::new()),
        }
    }

    /* The subscription lasts until the returned Connection is dropped or
       forgotten. */
    #[must_use]
    pub fn connect<F: Fn(&T) + 'static>(&self, f: F) -> Connection {
        let live = rc::Rc::new(cell::Cell::new(true));
        let mut slots = self.slots.borrow_mut();
        slots.retain(|slot| slot.live.get());
        slots.push(Slot {
            callback: rc::Rc::new(f),
            live: live.clone(),
        });
        Connection { live: Some(live) }
    }

    pub fn emit(&self, value: &T) {
        /* Snapshot first so subscribers are free to connect and disconnect
           from inside their callbacks. */
        let snapshot: vec::Vec<Slot<T>> = self
            .slots
            .borrow()
            .iter()
            .filter(|slot| slot.live.get())
            .cloned()
            .collect();

        for slot in snapshot {
            /* An earlier subscriber may have released this one. */
            if slot.live.get() {
                (slot.callback)(value);
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.slots.borrow().iter().filter(|slot| slot.live.get()).count()
    }
}

impl<T> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/* Scoped handle for a single subscription. Dropping it releases the
   subscription; it is safe to drop after the signal itself is gone. */
pub struct Connection {
    live: Option<rc::Rc<cell::Cell<bool>>>,
}

impl Connection {
    /* Abandons the handle, leaving the subscription registered for as long
       as the signal lives. */
    pub fn forget(mut self) {
        self.live = None;
    }
}

impl std::ops::Drop for Connection {
    fn drop(&mut self) {
        if let Some(live) = self.live.take() {
            live.set(false);
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("held", &self.live.is_some())
            .finish()
    }
}

/* Owns a batch of connections and releases them newest-first, so a handle
   wired after another is always torn down before it. */
#[derive(Debug)]
pub struct ConnectionBag {
    connections: vec::Vec<Connection>,
}

impl ConnectionBag {
    pub fn new() -> ConnectionBag {
        ConnectionBag {
            connections: vec::Vec::new(),
        }
    }

    pub fn hold(&mut self, connection: Connection) {
        self.connections.push(connection);
    }

    pub fn clear(&mut self) {
        while let Some(connection) = self.connections.pop() {
            drop(connection);
        }
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl std::ops::Drop for ConnectionBag {
    fn drop(&mut self) {
        self.clear();
    }
}
