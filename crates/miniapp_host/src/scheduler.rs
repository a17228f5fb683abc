//! One-shot timer contract used for request timeouts and delayed cleanups.

use std::{
    cell::{Cell, RefCell},
    collections::BTreeMap,
    rc::Rc,
};

use crate::disposables::Disposer;

/// Timer service.
pub trait Scheduler {
    /// Runs `callback` once after `delay_ms`. Disposing the handle cancels it.
    fn set_timeout(&self, delay_ms: u32, callback: Box<dyn FnOnce()>) -> Disposer;
}

#[derive(Debug, Clone, Copy, Default)]
/// Scheduler that never fires, for hosts without timers.
pub struct NoopScheduler;

impl Scheduler for NoopScheduler {
    fn set_timeout(&self, _delay_ms: u32, _callback: Box<dyn FnOnce()>) -> Disposer {
        Disposer::noop()
    }
}

#[derive(Default)]
struct ManualState {
    now_ms: Cell<u64>,
    next_id: Cell<u64>,
    pending: RefCell<BTreeMap<(u64, u64), Box<dyn FnOnce()>>>,
}

/// Deterministic scheduler driven by [`ManualScheduler::advance`].
#[derive(Clone, Default)]
pub struct ManualScheduler {
    state: Rc<ManualState>,
}

impl ManualScheduler {
    /// Creates a scheduler at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current virtual time.
    pub fn now_ms(&self) -> u64 {
        self.state.now_ms.get()
    }

    /// Number of timers still waiting.
    pub fn pending(&self) -> usize {
        self.state.pending.borrow().len()
    }

    /// Moves the clock forward, firing due timers in deadline order.
    pub fn advance(&self, delta_ms: u64) {
        let target = self.state.now_ms.get().saturating_add(delta_ms);
        loop {
            let due = {
                let mut pending = self.state.pending.borrow_mut();
                let next_key = pending
                    .keys()
                    .next()
                    .copied()
                    .filter(|(deadline, _)| *deadline <= target);
                next_key.and_then(|key| pending.remove(&key).map(|callback| (key.0, callback)))
            };
            let Some((deadline, callback)) = due else {
                break;
            };
            self.state.now_ms.set(deadline);
            callback();
        }
        self.state.now_ms.set(target);
    }
}

impl Scheduler for ManualScheduler {
    fn set_timeout(&self, delay_ms: u32, callback: Box<dyn FnOnce()>) -> Disposer {
        let id = self.state.next_id.get() + 1;
        self.state.next_id.set(id);
        let key = (self.state.now_ms.get() + u64::from(delay_ms), id);
        self.state.pending.borrow_mut().insert(key, callback);

        let state = Rc::downgrade(&self.state);
        Disposer::new(move || {
            if let Some(state) = state.upgrade() {
                state.pending.borrow_mut().remove(&key);
            }
        })
    }
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("now_ms", &self.now_ms())
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn fires_due_timers_in_order_and_honours_cancel() {
        let scheduler = ManualScheduler::new();
        let fired = Rc::new(RefCell::new(Vec::new()));

        let late = fired.clone();
        scheduler.set_timeout(200, Box::new(move || late.borrow_mut().push("late")));
        let early = fired.clone();
        scheduler.set_timeout(100, Box::new(move || early.borrow_mut().push("early")));
        let cancelled = fired.clone();
        let handle =
            scheduler.set_timeout(150, Box::new(move || cancelled.borrow_mut().push("cancelled")));
        handle.dispose();

        scheduler.advance(150);
        assert_eq!(*fired.borrow(), vec!["early"]);

        scheduler.advance(50);
        assert_eq!(*fired.borrow(), vec!["early", "late"]);
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(scheduler.now_ms(), 200);
    }
}
