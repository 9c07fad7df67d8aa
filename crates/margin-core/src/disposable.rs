//! Releasable handles for registrations and event subscriptions.

use std::fmt;

/// A handle that releases a resource exactly once.
///
/// The release action runs on [`Disposable::dispose`] or, if the handle is
/// dropped without being disposed, on drop. Several handles can be merged
/// with [`Disposable::from_all`] so an owner tears them down as one unit.
///
/// # Examples
///
/// ```
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use margin_core::Disposable;
///
/// let released = Rc::new(Cell::new(0));
/// let a = { let r = released.clone(); Disposable::new(move || r.set(r.get() + 1)) };
/// let b = { let r = released.clone(); Disposable::new(move || r.set(r.get() + 1)) };
///
/// let group = Disposable::from_all(vec![a, b]);
/// group.dispose();
/// assert_eq!(released.get(), 2);
/// ```
pub struct Disposable {
    release: Option<Box<dyn FnOnce()>>,
}

impl Disposable {
    pub fn new(release: impl FnOnce() + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// A handle that releases nothing.
    pub fn noop() -> Self {
        Self { release: None }
    }

    /// Combine handles; disposing the result disposes each one in order.
    pub fn from_all(handles: Vec<Disposable>) -> Self {
        Self::new(move || {
            for handle in handles {
                handle.dispose();
            }
        })
    }

    /// Release the resource now.
    pub fn dispose(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Disposable {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl fmt::Debug for Disposable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disposable")
            .field("pending", &self.release.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[test]
    fn dispose_runs_release_once() {
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        let handle = Disposable::new(move || c.set(c.get() + 1));
        handle.dispose();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn drop_releases_undisposed_handle() {
        let count = Rc::new(Cell::new(0));
        {
            let c = count.clone();
            let _handle = Disposable::new(move || c.set(c.get() + 1));
        }
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn group_releases_in_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let handles = (0..3)
            .map(|i| {
                let order = order.clone();
                Disposable::new(move || order.borrow_mut().push(i))
            })
            .collect();
        Disposable::from_all(handles).dispose();
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn noop_is_harmless() {
        Disposable::noop().dispose();
    }
}
