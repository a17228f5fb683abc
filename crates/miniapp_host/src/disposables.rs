//! Disposable registry guaranteeing exactly-once cleanup of external subscriptions.
//!
//! Every listener an adapter binds (DOM event, bridge subscription, timer) is registered in a
//! [`DisposableBag`]. The returned [`Disposer`] may be invoked by the consumer at any time; bulk
//! teardown through [`DisposableBag::dispose_all`] skips anything already disposed.

use std::{
    cell::RefCell,
    collections::BTreeMap,
    fmt,
    panic::{catch_unwind, AssertUnwindSafe},
    rc::{Rc, Weak},
};

type CleanupFn = Box<dyn FnOnce() -> Result<(), String>>;

/// Object exposing an explicit `dispose` method.
pub trait Dispose {
    /// Releases the resource.
    fn dispose(self: Box<Self>);
}

/// Cleanup action accepted by [`DisposableBag::add`].
///
/// May be empty ([`Disposable::none`]), in which case nothing is registered.
pub struct Disposable {
    cleanup: Option<CleanupFn>,
}

impl Disposable {
    /// Wraps an infallible cleanup closure.
    pub fn new(cleanup: impl FnOnce() + 'static) -> Self {
        Self {
            cleanup: Some(Box::new(move || {
                cleanup();
                Ok(())
            })),
        }
    }

    /// Wraps a cleanup closure that reports failure through `Err`.
    pub fn fallible(cleanup: impl FnOnce() -> Result<(), String> + 'static) -> Self {
        Self {
            cleanup: Some(Box::new(cleanup)),
        }
    }

    /// Wraps an object implementing [`Dispose`].
    pub fn from_dispose(resource: impl Dispose + 'static) -> Self {
        let boxed: Box<dyn Dispose> = Box::new(resource);
        Self::new(move || boxed.dispose())
    }

    /// Empty disposable; registering it is a no-op.
    pub fn none() -> Self {
        Self { cleanup: None }
    }

    /// Returns whether a cleanup action is present.
    pub fn is_some(&self) -> bool {
        self.cleanup.is_some()
    }
}

impl<F> From<Option<F>> for Disposable
where
    F: FnOnce() + 'static,
{
    fn from(value: Option<F>) -> Self {
        value.map_or_else(Self::none, Self::new)
    }
}

impl From<Disposer> for Disposable {
    fn from(value: Disposer) -> Self {
        Self::new(move || value.dispose())
    }
}

impl fmt::Debug for Disposable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disposable")
            .field("present", &self.is_some())
            .finish()
    }
}

struct Slot {
    cleanup: RefCell<Option<CleanupFn>>,
}

#[derive(Default)]
struct BagState {
    next_id: u64,
    entries: BTreeMap<u64, Rc<Slot>>,
}

/// Cancel handle returned by [`DisposableBag::add`].
///
/// Cloning shares the same underlying cleanup; whichever clone fires first runs it and every
/// later call is a no-op.
#[derive(Clone)]
pub struct Disposer {
    slot: Option<Rc<Slot>>,
    bag: Weak<RefCell<BagState>>,
    id: u64,
}

impl Disposer {
    /// Disposer that does nothing.
    pub fn noop() -> Self {
        Self {
            slot: None,
            bag: Weak::new(),
            id: 0,
        }
    }

    /// Standalone disposer not tracked by any bag.
    pub fn new(cleanup: impl FnOnce() + 'static) -> Self {
        Self::detached(Disposable::new(cleanup))
    }

    pub(crate) fn detached(disposable: Disposable) -> Self {
        Self {
            slot: disposable.cleanup.map(|cleanup| {
                Rc::new(Slot {
                    cleanup: RefCell::new(Some(cleanup)),
                })
            }),
            bag: Weak::new(),
            id: 0,
        }
    }

    /// Runs the cleanup if it has not run yet and drops it from its bag.
    ///
    /// Cleanup failures are logged and never surface to the caller.
    pub fn dispose(&self) {
        let Some(slot) = self.slot.as_ref() else {
            return;
        };
        let cleanup = slot.cleanup.borrow_mut().take();
        if let Some(bag) = self.bag.upgrade() {
            bag.borrow_mut().entries.remove(&self.id);
        }
        if let Some(cleanup) = cleanup {
            run_cleanup(cleanup, "disposable failed");
        }
    }

    /// Returns whether the cleanup has already run (or there never was one).
    pub fn is_disposed(&self) -> bool {
        self.slot
            .as_ref()
            .map_or(true, |slot| slot.cleanup.borrow().is_none())
    }
}

impl fmt::Debug for Disposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Disposer")
            .field("id", &self.id)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl Dispose for Disposer {
    fn dispose(self: Box<Self>) {
        Disposer::dispose(&self);
    }
}

/// Registry of pending cleanup actions.
///
/// Cloning yields another handle to the same registry.
#[derive(Clone, Default)]
pub struct DisposableBag {
    inner: Rc<RefCell<BagState>>,
}

impl DisposableBag {
    /// Creates an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a cleanup action and returns its cancel handle.
    ///
    /// An empty [`Disposable`] registers nothing and yields [`Disposer::noop`].
    pub fn add(&self, disposable: impl Into<Disposable>) -> Disposer {
        let Some(cleanup) = disposable.into().cleanup else {
            return Disposer::noop();
        };
        let slot = Rc::new(Slot {
            cleanup: RefCell::new(Some(cleanup)),
        });
        let mut state = self.inner.borrow_mut();
        state.next_id += 1;
        let id = state.next_id;
        state.entries.insert(id, slot.clone());
        Disposer {
            slot: Some(slot),
            bag: Rc::downgrade(&self.inner),
            id,
        }
    }

    /// Runs every still-registered cleanup and empties the bag.
    ///
    /// Each cleanup is isolated: a failing one is logged and the rest still run. Cleanups
    /// registered while this runs belong to the next round.
    pub fn dispose_all(&self) {
        let pending = std::mem::take(&mut self.inner.borrow_mut().entries);
        for slot in pending.into_values() {
            let cleanup = slot.cleanup.borrow_mut().take();
            if let Some(cleanup) = cleanup {
                run_cleanup(cleanup, "disposeAll failed");
            }
        }
    }

    /// Number of cleanups still pending.
    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    /// Returns whether no cleanup is pending.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for DisposableBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisposableBag")
            .field("pending", &self.len())
            .finish()
    }
}

fn run_cleanup(cleanup: CleanupFn, context: &str) {
    match catch_unwind(AssertUnwindSafe(cleanup)) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => tracing::warn!("[miniapp-host] {context}: {err}"),
        Err(panic) => tracing::warn!("[miniapp-host] {context}: {}", panic_message(&panic)),
    }
}

pub(crate) fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(text) = panic.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = panic.downcast_ref::<String>() {
        text.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use pretty_assertions::assert_eq;

    use super::*;

    fn counter() -> (Rc<Cell<u32>>, impl FnOnce() + 'static) {
        let count = Rc::new(Cell::new(0));
        let handle = count.clone();
        (count, move || handle.set(handle.get() + 1))
    }

    #[test]
    fn cancel_twice_runs_cleanup_once() {
        let bag = DisposableBag::new();
        let (count, cleanup) = counter();
        let cancel = bag.add(Disposable::new(cleanup));

        cancel.dispose();
        cancel.dispose();

        assert_eq!(count.get(), 1);
        assert!(cancel.is_disposed());
        assert!(bag.is_empty());
    }

    #[test]
    fn cancel_after_dispose_all_is_noop() {
        let bag = DisposableBag::new();
        let (count, cleanup) = counter();
        let cancel = bag.add(Disposable::new(cleanup));

        bag.dispose_all();
        cancel.dispose();

        assert_eq!(count.get(), 1);
    }

    #[test]
    fn dispose_all_twice_invokes_nothing_second_time() {
        let bag = DisposableBag::new();
        let (count, cleanup) = counter();
        bag.add(Disposable::new(cleanup));

        bag.dispose_all();
        bag.dispose_all();

        assert_eq!(count.get(), 1);
    }

    #[test]
    fn failing_cleanup_does_not_block_siblings() {
        let bag = DisposableBag::new();
        let (first, first_cleanup) = counter();
        let (third, third_cleanup) = counter();
        bag.add(Disposable::new(first_cleanup));
        bag.add(Disposable::new(|| panic!("cleanup exploded")));
        bag.add(Disposable::new(third_cleanup));

        bag.dispose_all();

        assert_eq!(first.get(), 1);
        assert_eq!(third.get(), 1);
        assert!(bag.is_empty());
    }

    #[test]
    fn fallible_cleanup_error_is_swallowed() {
        let bag = DisposableBag::new();
        let cancel = bag.add(Disposable::fallible(|| Err("listener already gone".into())));
        cancel.dispose();
        assert!(cancel.is_disposed());
    }

    #[test]
    fn empty_disposable_registers_nothing() {
        let bag = DisposableBag::new();
        let cancel = bag.add(Disposable::none());
        let from_option = bag.add(None::<fn()>);

        assert!(bag.is_empty());
        cancel.dispose();
        from_option.dispose();
    }

    #[test]
    fn bag_is_reusable_after_dispose_all() {
        let bag = DisposableBag::new();
        let (old, old_cleanup) = counter();
        bag.add(Disposable::new(old_cleanup));
        bag.dispose_all();

        let (fresh, fresh_cleanup) = counter();
        let cancel = bag.add(Disposable::new(fresh_cleanup));
        assert_eq!(bag.len(), 1);
        cancel.dispose();

        assert_eq!(old.get(), 1);
        assert_eq!(fresh.get(), 1);
    }

    #[test]
    fn dispose_objects_are_accepted() {
        struct Subscription(Rc<Cell<bool>>);
        impl Dispose for Subscription {
            fn dispose(self: Box<Self>) {
                self.0.set(true);
            }
        }

        let released = Rc::new(Cell::new(false));
        let bag = DisposableBag::new();
        bag.add(Disposable::from_dispose(Subscription(released.clone())));
        bag.dispose_all();
        assert!(released.get());
    }

    #[test]
    fn cleanup_may_register_into_the_same_bag() {
        let bag = DisposableBag::new();
        let inner_bag = bag.clone();
        let (count, cleanup) = counter();
        bag.add(Disposable::new(move || {
            inner_bag.add(Disposable::new(cleanup));
        }));

        bag.dispose_all();
        assert_eq!(bag.len(), 1);
        bag.dispose_all();
        assert_eq!(count.get(), 1);
    }
}
