//! Host bridge contract: capability probe, request channel and event stream.
//!
//! Adapters speak a normalized method/event vocabulary to a [`PlatformBridge`]; the browser glue
//! in `miniapp_host_web` maps it onto each vendor object. Any of the three channels may be
//! missing on a given host.

use std::{
    cell::{Cell, RefCell},
    collections::{BTreeSet, HashMap, VecDeque},
    future::Future,
    pin::Pin,
    rc::Rc,
};

use serde_json::Value;

use crate::{disposables::Disposer, error::AdapterError, listeners::ListenerSet};

/// Object-safe boxed future used by [`PlatformBridge`] requests.
pub type BridgeFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Event pushed by the host platform.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeEvent {
    /// Event name in the bridge vocabulary.
    pub name: String,
    /// Event payload (`Null` when the host sends none).
    pub data: Value,
}

impl BridgeEvent {
    /// Builds an event.
    pub fn new(name: impl Into<String>, data: Value) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

/// Connection to a host platform SDK or native bridge.
pub trait PlatformBridge {
    /// Short label used in logs.
    fn label(&self) -> &'static str;

    /// Returns whether the host object backing this bridge exists at all.
    fn is_present(&self) -> bool;

    /// Synchronous presence check for one bridge method.
    fn has_method(&self, method: &str) -> bool;

    /// Asynchronous capability probe, when the host offers one.
    ///
    /// `None` means the host has no probe function.
    fn probe<'a>(
        &'a self,
        method: &'a str,
    ) -> Option<BridgeFuture<'a, Result<bool, AdapterError>>> {
        let _ = method;
        None
    }

    /// Sends a request and resolves with the host's JSON response.
    fn call<'a>(
        &'a self,
        method: &'a str,
        params: Value,
    ) -> BridgeFuture<'a, Result<Value, AdapterError>>;

    /// Subscribes to host events. `None` means the host exposes no event stream.
    fn subscribe(&self, handler: Rc<dyn Fn(&BridgeEvent)>) -> Option<Disposer> {
        let _ = handler;
        None
    }

    /// Host-reported webview flag, when the bridge knows it.
    fn is_web_view(&self) -> Option<bool> {
        None
    }
}

/// Asks the bridge probe whether `method` is supported.
///
/// A missing bridge or a missing probe function resolves `false`; a failing probe is logged and
/// also resolves `false`.
pub async fn is_bridge_method_supported(bridge: Option<&dyn PlatformBridge>, method: &str) -> bool {
    let Some(bridge) = bridge else {
        return false;
    };
    let Some(probe) = bridge.probe(method) else {
        return false;
    };
    match probe.await {
        Ok(supported) => supported,
        Err(err) => {
            tracing::warn!(
                "[miniapp-host] {} supportsAsync({method}) failed: {err}",
                bridge.label()
            );
            false
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
/// Bridge for hosts without any platform SDK.
pub struct NoopBridge;

impl PlatformBridge for NoopBridge {
    fn label(&self) -> &'static str {
        "noop"
    }

    fn is_present(&self) -> bool {
        false
    }

    fn has_method(&self, _method: &str) -> bool {
        false
    }

    fn call<'a>(
        &'a self,
        method: &'a str,
        _params: Value,
    ) -> BridgeFuture<'a, Result<Value, AdapterError>> {
        Box::pin(async move { Err(AdapterError::bridge(method, "no platform bridge")) })
    }
}

struct MemoryBridgeState {
    label: &'static str,
    present: Cell<bool>,
    methods: RefCell<BTreeSet<String>>,
    probe: RefCell<Option<BTreeSet<String>>>,
    failing_probes: RefCell<BTreeSet<String>>,
    responses: RefCell<HashMap<String, VecDeque<Result<Value, AdapterError>>>>,
    calls: RefCell<Vec<(String, Value)>>,
    events: ListenerSet<BridgeEvent>,
    events_enabled: Cell<bool>,
    web_view: Cell<Option<bool>>,
}

/// Scripted in-memory bridge for tests and non-browser builds.
///
/// Records every call, answers with queued responses (the last queued response for a method is
/// sticky; unscripted methods answer `Null`) and lets tests push events.
#[derive(Clone)]
pub struct MemoryBridge {
    inner: Rc<MemoryBridgeState>,
}

impl Default for MemoryBridge {
    fn default() -> Self {
        Self::new("memory")
    }
}

impl MemoryBridge {
    /// Creates a present bridge with no methods, no probe and an enabled event stream.
    pub fn new(label: &'static str) -> Self {
        Self {
            inner: Rc::new(MemoryBridgeState {
                label,
                present: Cell::new(true),
                methods: RefCell::new(BTreeSet::new()),
                probe: RefCell::new(None),
                failing_probes: RefCell::new(BTreeSet::new()),
                responses: RefCell::new(HashMap::new()),
                calls: RefCell::new(Vec::new()),
                events: ListenerSet::new("bridge event"),
                events_enabled: Cell::new(true),
                web_view: Cell::new(None),
            }),
        }
    }

    /// Marks methods as present for [`PlatformBridge::has_method`].
    #[must_use]
    pub fn with_methods(self, methods: &[&str]) -> Self {
        self.inner
            .methods
            .borrow_mut()
            .extend(methods.iter().map(|method| method.to_string()));
        self
    }

    /// Enables the async probe, answering `true` for `supported` methods.
    #[must_use]
    pub fn with_probe(self, supported: &[&str]) -> Self {
        self.inner.probe.replace(Some(
            supported.iter().map(|method| method.to_string()).collect(),
        ));
        self
    }

    /// Makes the probe fail for `method`.
    #[must_use]
    pub fn with_failing_probe(self, method: &str) -> Self {
        self.inner
            .failing_probes
            .borrow_mut()
            .insert(method.to_string());
        self
    }

    /// Disables the event stream so `subscribe` returns `None`.
    #[must_use]
    pub fn without_events(self) -> Self {
        self.inner.events_enabled.set(false);
        self
    }

    /// Sets the host-reported webview flag.
    #[must_use]
    pub fn with_web_view(self, web_view: bool) -> Self {
        self.inner.web_view.set(Some(web_view));
        self
    }

    /// Marks the backing host object as missing.
    #[must_use]
    pub fn absent(self) -> Self {
        self.inner.present.set(false);
        self
    }

    /// Queues a response for `method`.
    pub fn respond(&self, method: &str, response: Result<Value, AdapterError>) -> &Self {
        self.inner
            .responses
            .borrow_mut()
            .entry(method.to_string())
            .or_default()
            .push_back(response);
        self
    }

    /// Pushes an event to every subscriber.
    pub fn emit(&self, name: &str, data: Value) {
        self.inner.events.notify(&BridgeEvent::new(name, data));
    }

    /// All recorded calls in order.
    pub fn calls(&self) -> Vec<(String, Value)> {
        self.inner.calls.borrow().clone()
    }

    /// Parameters of every recorded call to `method`.
    pub fn calls_to(&self, method: &str) -> Vec<Value> {
        self.inner
            .calls
            .borrow()
            .iter()
            .filter(|(name, _)| name == method)
            .map(|(_, params)| params.clone())
            .collect()
    }

    /// Number of live event subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.events.len()
    }

    fn next_response(&self, method: &str) -> Result<Value, AdapterError> {
        let mut responses = self.inner.responses.borrow_mut();
        let Some(queue) = responses.get_mut(method) else {
            return Ok(Value::Null);
        };
        if queue.len() > 1 {
            queue.pop_front().unwrap_or(Ok(Value::Null))
        } else {
            queue.front().cloned().unwrap_or(Ok(Value::Null))
        }
    }
}

impl PlatformBridge for MemoryBridge {
    fn label(&self) -> &'static str {
        self.inner.label
    }

    fn is_present(&self) -> bool {
        self.inner.present.get()
    }

    fn has_method(&self, method: &str) -> bool {
        self.inner.methods.borrow().contains(method)
    }

    fn probe<'a>(
        &'a self,
        method: &'a str,
    ) -> Option<BridgeFuture<'a, Result<bool, AdapterError>>> {
        let supported = self.inner.probe.borrow().as_ref()?.contains(method);
        let failing = self.inner.failing_probes.borrow().contains(method);
        Some(Box::pin(async move {
            if failing {
                Err(AdapterError::bridge("supportsAsync", format!("probe for {method} failed")))
            } else {
                Ok(supported)
            }
        }))
    }

    fn call<'a>(
        &'a self,
        method: &'a str,
        params: Value,
    ) -> BridgeFuture<'a, Result<Value, AdapterError>> {
        self.inner
            .calls
            .borrow_mut()
            .push((method.to_string(), params));
        let response = self.next_response(method);
        Box::pin(async move { response })
    }

    fn subscribe(&self, handler: Rc<dyn Fn(&BridgeEvent)>) -> Option<Disposer> {
        if !self.inner.events_enabled.get() {
            return None;
        }
        Some(self.inner.events.subscribe(handler))
    }

    fn is_web_view(&self) -> Option<bool> {
        self.inner.web_view.get()
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn missing_bridge_or_probe_resolves_false() {
        assert!(!block_on(is_bridge_method_supported(None, "VKWebAppInit")));

        let without_probe = MemoryBridge::new("vk");
        assert!(!block_on(is_bridge_method_supported(
            Some(&without_probe),
            "VKWebAppInit"
        )));
    }

    #[test]
    fn failing_probe_resolves_false() {
        let bridge = MemoryBridge::new("vk")
            .with_probe(&["VKWebAppOpenCodeReader"])
            .with_failing_probe("VKWebAppOpenCodeReader");
        assert!(!block_on(is_bridge_method_supported(
            Some(&bridge),
            "VKWebAppOpenCodeReader"
        )));
    }

    #[test]
    fn probe_answers_from_supported_set() {
        let bridge = MemoryBridge::new("vk").with_probe(&["VKWebAppGetPhoneNumber"]);
        assert!(block_on(is_bridge_method_supported(
            Some(&bridge),
            "VKWebAppGetPhoneNumber"
        )));
        assert!(!block_on(is_bridge_method_supported(
            Some(&bridge),
            "VKWebAppGetPersonalCard"
        )));
    }

    #[test]
    fn queued_responses_drain_until_last_which_sticks() {
        let bridge = MemoryBridge::new("max");
        bridge
            .respond("openCodeReader", Ok(json!({"value": "first"})))
            .respond("openCodeReader", Ok(json!({"value": "second"})));

        let first = block_on(bridge.call("openCodeReader", json!([true]))).expect("first");
        let second = block_on(bridge.call("openCodeReader", json!([true]))).expect("second");
        let third = block_on(bridge.call("openCodeReader", json!([true]))).expect("third");
        let unscripted = block_on(bridge.call("ready", Value::Null)).expect("ready");

        assert_eq!(first["value"], "first");
        assert_eq!(second["value"], "second");
        assert_eq!(third["value"], "second");
        assert_eq!(unscripted, Value::Null);
        assert_eq!(bridge.calls_to("openCodeReader").len(), 3);
    }

    #[test]
    fn events_reach_subscribers_until_disposed() {
        let bridge = MemoryBridge::new("telegram");
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let disposer = bridge
            .subscribe(Rc::new(move |event: &BridgeEvent| {
                sink.borrow_mut().push(event.name.clone())
            }))
            .expect("event stream");

        bridge.emit("themeChanged", Value::Null);
        disposer.dispose();
        bridge.emit("activated", Value::Null);

        assert_eq!(*seen.borrow(), vec!["themeChanged".to_string()]);
        assert_eq!(bridge.subscriber_count(), 0);
        assert!(MemoryBridge::new("x")
            .without_events()
            .subscribe(Rc::new(|_: &BridgeEvent| {}))
            .is_none());
    }
}
