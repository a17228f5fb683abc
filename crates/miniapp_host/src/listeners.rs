//! Observer registry used for environment, appearance, visibility and back-button fan-out.

use std::{
    cell::{Cell, RefCell},
    fmt,
    panic::{catch_unwind, AssertUnwindSafe},
    rc::Rc,
};

use crate::disposables::{panic_message, Disposer};

/// Shared callback stored in a [`ListenerSet`].
pub type Listener<T> = Rc<dyn Fn(&T)>;

struct Entry<T: ?Sized> {
    active: Cell<bool>,
    callback: Rc<dyn Fn(&T)>,
}

struct Inner<T: ?Sized> {
    label: &'static str,
    entries: RefCell<Vec<(u64, Rc<Entry<T>>)>>,
    next_id: Cell<u64>,
}

/// Unordered set of callbacks notified with a shared value.
///
/// A listener that panics is logged and skipped; the remaining listeners still run. A listener
/// removed while a notification is in flight is not invoked for the rest of that round.
pub struct ListenerSet<T: ?Sized + 'static> {
    inner: Rc<Inner<T>>,
}

impl<T: ?Sized + 'static> Clone for ListenerSet<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: ?Sized + 'static> ListenerSet<T> {
    /// Creates an empty set. `label` tags failure logs.
    pub fn new(label: &'static str) -> Self {
        Self {
            inner: Rc::new(Inner {
                label,
                entries: RefCell::new(Vec::new()),
                next_id: Cell::new(0),
            }),
        }
    }

    /// Adds a listener and returns the disposer removing it.
    pub fn subscribe(&self, callback: Rc<dyn Fn(&T)>) -> Disposer {
        let id = self.inner.next_id.get() + 1;
        self.inner.next_id.set(id);
        let entry = Rc::new(Entry {
            active: Cell::new(true),
            callback,
        });
        self.inner.entries.borrow_mut().push((id, entry.clone()));

        let inner = Rc::downgrade(&self.inner);
        Disposer::new(move || {
            entry.active.set(false);
            if let Some(inner) = inner.upgrade() {
                inner
                    .entries
                    .borrow_mut()
                    .retain(|(entry_id, _)| *entry_id != id);
            }
        })
    }

    /// Invokes every active listener with `value`.
    pub fn notify(&self, value: &T) {
        let snapshot: Vec<Rc<Entry<T>>> = self
            .inner
            .entries
            .borrow()
            .iter()
            .map(|(_, entry)| entry.clone())
            .collect();

        for entry in snapshot {
            if !entry.active.get() {
                continue;
            }
            let callback = entry.callback.clone();
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| callback(value))) {
                tracing::warn!(
                    "[miniapp-host] {} listener failed: {}",
                    self.inner.label,
                    panic_message(&panic)
                );
            }
        }
    }

    /// Removes every listener. Outstanding disposers become no-ops.
    pub fn clear(&self) {
        let drained: Vec<_> = self.inner.entries.borrow_mut().drain(..).collect();
        for (_, entry) in drained {
            entry.active.set(false);
        }
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.inner.entries.borrow().len()
    }

    /// Returns whether no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: ?Sized + 'static> fmt::Debug for ListenerSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerSet")
            .field("label", &self.inner.label)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn failing_listener_does_not_stop_siblings() {
        let set = ListenerSet::<u32>::new("test");
        let seen = Rc::new(RefCell::new(Vec::new()));

        let first = seen.clone();
        set.subscribe(Rc::new(move |value: &u32| first.borrow_mut().push(*value)));
        set.subscribe(Rc::new(|_: &u32| panic!("listener exploded")));
        let last = seen.clone();
        set.subscribe(Rc::new(move |value: &u32| last.borrow_mut().push(value * 10)));

        set.notify(&7);

        assert_eq!(*seen.borrow(), vec![7, 70]);
    }

    #[test]
    fn unsubscribed_listener_is_not_called() {
        let set = ListenerSet::<()>::new("test");
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let disposer = set.subscribe(Rc::new(move |_: &()| counter.set(counter.get() + 1)));

        set.notify(&());
        disposer.dispose();
        set.notify(&());

        assert_eq!(calls.get(), 1);
        assert!(set.is_empty());
    }

    #[test]
    fn removal_during_dispatch_takes_effect_immediately() {
        let set = ListenerSet::<()>::new("test");
        let second_calls = Rc::new(Cell::new(0));
        let second_disposer: Rc<RefCell<Option<Disposer>>> = Rc::new(RefCell::new(None));

        let to_remove = second_disposer.clone();
        set.subscribe(Rc::new(move |_: &()| {
            if let Some(disposer) = to_remove.borrow().as_ref() {
                disposer.dispose();
            }
        }));
        let counter = second_calls.clone();
        let disposer = set.subscribe(Rc::new(move |_: &()| counter.set(counter.get() + 1)));
        *second_disposer.borrow_mut() = Some(disposer);

        set.notify(&());

        assert_eq!(second_calls.get(), 0);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn clear_deactivates_outstanding_listeners() {
        let set = ListenerSet::<str>::new("test");
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let disposer = set.subscribe(Rc::new(move |_: &str| counter.set(counter.get() + 1)));

        set.clear();
        set.notify("ignored");
        disposer.dispose();

        assert_eq!(calls.get(), 0);
    }
}
