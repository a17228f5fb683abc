//! Safe-area change watcher driven by window-level trigger events.

use std::{
    cell::{Cell, RefCell},
    collections::BTreeMap,
    rc::Rc,
};

use crate::{disposables::Disposer, insets::Insets, listeners::ListenerSet};

/// Events re-checked by default: viewport resize and device rotation.
pub const DEFAULT_TRIGGER_EVENTS: [&str; 2] = ["resize", "orientationchange"];

/// Event target that can report named, payload-free trigger events.
pub trait TriggerSource {
    /// Attaches `handler` to `event` and returns the disposer detaching it.
    fn add_listener(&self, event: &str, handler: Rc<dyn Fn()>) -> Disposer;
}

/// In-memory [`TriggerSource`] for non-browser builds and tests.
#[derive(Clone, Default)]
pub struct EventHub {
    events: Rc<RefCell<BTreeMap<String, ListenerSet<()>>>>,
}

impl EventHub {
    /// Creates a hub with no listeners.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires `event`, invoking every handler attached to it.
    pub fn dispatch(&self, event: &str) {
        let listeners = self.events.borrow().get(event).cloned();
        if let Some(listeners) = listeners {
            listeners.notify(&());
        }
    }

    /// Number of handlers attached to `event`.
    pub fn listener_count(&self, event: &str) -> usize {
        self.events
            .borrow()
            .get(event)
            .map_or(0, ListenerSet::len)
    }
}

impl TriggerSource for EventHub {
    fn add_listener(&self, event: &str, handler: Rc<dyn Fn()>) -> Disposer {
        let listeners = self
            .events
            .borrow_mut()
            .entry(event.to_string())
            .or_insert_with(|| ListenerSet::new("trigger event"))
            .clone();
        listeners.subscribe(Rc::new(move |_: &()| handler()))
    }
}

impl std::fmt::Debug for EventHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHub")
            .field("events", &self.events.borrow().keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Watches `get_safe_area` and calls `on_change` only when the value changes.
///
/// The initial value, when defined, is emitted before this returns. Each trigger event
/// recomputes the value and compares it to the last emission with exact per-edge equality.
/// Without a `target` nothing is registered and `None` is returned. The returned disposer
/// detaches every trigger listener.
pub fn create_safe_area_watcher(
    target: Option<&dyn TriggerSource>,
    get_safe_area: impl Fn() -> Option<Insets> + 'static,
    on_change: impl Fn(Insets) + 'static,
    events: &[&str],
) -> Option<Disposer> {
    let target = target?;
    let last: Rc<Cell<Option<Insets>>> = Rc::new(Cell::new(None));

    let check: Rc<dyn Fn()> = {
        let last = last.clone();
        Rc::new(move || {
            let Some(next) = get_safe_area() else {
                return;
            };
            let changed = last
                .get()
                .map_or(true, |previous| !previous.same_edges(&next));
            if changed {
                last.set(Some(next));
                on_change(next);
            }
        })
    };

    check();

    let disposers: Vec<Disposer> = events
        .iter()
        .map(|event| target.add_listener(event, check.clone()))
        .collect();

    check();

    Some(Disposer::new(move || {
        for disposer in &disposers {
            disposer.dispose();
        }
    }))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn scripted(values: Vec<Insets>) -> impl Fn() -> Option<Insets> {
        let values = RefCell::new(values.into_iter());
        let current = Cell::new(None);
        move || {
            if let Some(next) = values.borrow_mut().next() {
                current.set(Some(next));
            }
            current.get()
        }
    }

    #[test]
    fn emits_only_on_genuine_change() {
        let hub = EventHub::new();
        let a = Insets::new(10.0, 0.0, 0.0, 0.0);
        let b = Insets::new(20.0, 0.0, 0.0, 0.0);
        let emitted = Rc::new(RefCell::new(Vec::new()));
        let sink = emitted.clone();

        let disposer = create_safe_area_watcher(
            Some(&hub),
            scripted(vec![a, a, b, b]),
            move |insets| sink.borrow_mut().push(insets),
            &DEFAULT_TRIGGER_EVENTS,
        )
        .expect("target present");

        assert_eq!(*emitted.borrow(), vec![a]);
        hub.dispatch("resize");
        hub.dispatch("orientationchange");
        hub.dispatch("resize");

        assert_eq!(*emitted.borrow(), vec![a, b]);

        disposer.dispose();
        assert_eq!(hub.listener_count("resize"), 0);
        assert_eq!(hub.listener_count("orientationchange"), 0);
    }

    #[test]
    fn missing_target_registers_nothing() {
        let called = Rc::new(Cell::new(false));
        let flag = called.clone();
        let result = create_safe_area_watcher(
            None,
            || Some(Insets::ZERO),
            move |_| flag.set(true),
            &DEFAULT_TRIGGER_EVENTS,
        );

        assert!(result.is_none());
        assert!(!called.get());
    }

    #[test]
    fn undefined_initial_value_defers_first_emission() {
        let hub = EventHub::new();
        let ready = Rc::new(Cell::new(false));
        let source = ready.clone();
        let emitted = Rc::new(Cell::new(0));
        let counter = emitted.clone();

        let _disposer = create_safe_area_watcher(
            Some(&hub),
            move || source.get().then_some(Insets::new(0.0, 0.0, 34.0, 0.0)),
            move |_| counter.set(counter.get() + 1),
            &["resize"],
        );

        assert_eq!(emitted.get(), 0);
        ready.set(true);
        hub.dispatch("resize");
        assert_eq!(emitted.get(), 1);
    }
}
