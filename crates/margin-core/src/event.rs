//! Single-threaded event emitters.
//!
//! Listeners run synchronously on the thread that fires the event. Each
//! subscription returns a [`Disposable`] that removes the listener.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::disposable::Disposable;

type Listener<T> = Rc<dyn Fn(&T)>;

struct Listeners<T> {
    next_id: u64,
    entries: Vec<(u64, Listener<T>)>,
}

/// Broadcasts events of type `T` to subscribed listeners.
///
/// Firing iterates over a snapshot of the listener list, so a listener may
/// subscribe or unsubscribe (itself or others) while an event is delivered.
///
/// # Examples
///
/// ```
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use margin_core::EventEmitter;
///
/// let emitter = EventEmitter::<u32>::new();
/// let seen = Rc::new(Cell::new(0));
/// let s = seen.clone();
/// let subscription = emitter.subscribe(move |n| s.set(s.get() + n));
///
/// emitter.fire(&5);
/// subscription.dispose();
/// emitter.fire(&5);
/// assert_eq!(seen.get(), 5);
/// ```
pub struct EventEmitter<T> {
    listeners: Rc<RefCell<Listeners<T>>>,
}

impl<T: 'static> EventEmitter<T> {
    pub fn new() -> Self {
        Self {
            listeners: Rc::new(RefCell::new(Listeners {
                next_id: 0,
                entries: Vec::new(),
            })),
        }
    }

    /// Register `listener`; dispose the returned handle to unsubscribe.
    pub fn subscribe(&self, listener: impl Fn(&T) + 'static) -> Disposable {
        let id = {
            let mut listeners = self.listeners.borrow_mut();
            let id = listeners.next_id;
            listeners.next_id += 1;
            listeners.entries.push((id, Rc::new(listener)));
            id
        };

        let weak = Rc::downgrade(&self.listeners);
        Disposable::new(move || {
            if let Some(listeners) = weak.upgrade() {
                listeners.borrow_mut().entries.retain(|(i, _)| *i != id);
            }
        })
    }

    /// Deliver `event` to every current listener.
    pub fn fire(&self, event: &T) {
        let snapshot: Vec<Listener<T>> = self
            .listeners
            .borrow()
            .entries
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();
        for listener in snapshot {
            listener(event);
        }
    }

    /// Number of live subscriptions.
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().entries.len()
    }
}

impl<T: 'static> Default for EventEmitter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for EventEmitter<T> {
    fn clone(&self) -> Self {
        Self {
            listeners: Rc::clone(&self.listeners),
        }
    }
}

impl<T> fmt::Debug for EventEmitter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEmitter")
            .field("listeners", &self.listeners.borrow().entries.len())
            .finish()
    }
}
