//! Native iOS/Android shell integration.
//!
//! The shell wraps the web app in a native webview and talks to it through two channels: a
//! one-way `NativeBridge.postMessage` command channel and a set of global callbacks the native
//! side invokes (`nativePushToken`, `nativeQRResult`, ...). [`ShellTransport`] abstracts both so
//! [`ShellBridge`] can be driven by [`MemoryShellTransport`] in tests.

use std::{
    cell::{Cell, RefCell},
    collections::BTreeMap,
    future::Future,
    rc::{Rc, Weak},
};

use futures::channel::oneshot;
use miniapp_host::{
    log_ignored_init_options, AdapterConfig, AdapterCore, AdapterDeps, AdapterError,
    AdapterFuture, Capability, Disposer, EnvironmentInfo, InitOptions, ListenerSet,
    MiniAppAdapter, Platform, PlatformCapabilities, QrScanOptions, Scheduler, ShellBridgeNames,
    ShellCallback,
};
use serde::Serialize;
use serde_json::Value;

use crate::bridge::interop;

/// Command posted to the native shell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum ShellCommand {
    /// Hands a token payload to native storage.
    #[serde(rename = "storeToken")]
    StoreToken {
        /// Arbitrary payload, usually `{ "token": ... }`.
        #[serde(skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
    /// Asks the shell to show the OS push permission prompt.
    #[serde(rename = "requestPushPermission")]
    RequestPushPermission,
    /// Opens the native QR scanner; the result arrives through the QR callback.
    #[serde(rename = "openNativeQR")]
    OpenNativeQr,
}

/// Command channel and global callback installation for the native shell.
pub trait ShellTransport {
    /// Returns whether the native command channel exists.
    fn is_available(&self) -> bool;

    /// Posts one command.
    fn post(&self, command: &ShellCommand) -> Result<(), String>;

    /// Installs a global callback under `name`. Disposing removes the global.
    fn install_callback(&self, name: &str, handler: Rc<dyn Fn(Value)>) -> Disposer;
}

/// Transport over `window.NativeBridge` and `window[name]` globals.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebShellTransport;

impl ShellTransport for WebShellTransport {
    fn is_available(&self) -> bool {
        interop::shell_available()
    }

    fn post(&self, command: &ShellCommand) -> Result<(), String> {
        let message = serde_json::to_value(command).map_err(|err| err.to_string())?;
        interop::shell_post_message(&message)
    }

    fn install_callback(&self, name: &str, handler: Rc<dyn Fn(Value)>) -> Disposer {
        interop::shell_install_callback(name, handler)
    }
}

#[derive(Default)]
struct MemoryShellState {
    available: bool,
    failing: bool,
    posted: Vec<ShellCommand>,
    callbacks: BTreeMap<String, Rc<dyn Fn(Value)>>,
}

/// Scripted transport recording posted commands and exposing installed callbacks.
#[derive(Clone)]
pub struct MemoryShellTransport {
    state: Rc<RefCell<MemoryShellState>>,
}

impl MemoryShellTransport {
    /// Transport with a working command channel.
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(MemoryShellState {
                available: true,
                ..MemoryShellState::default()
            })),
        }
    }

    /// Transport without `NativeBridge`.
    pub fn unavailable() -> Self {
        let transport = Self::new();
        transport.state.borrow_mut().available = false;
        transport
    }

    /// Makes every later `post` fail.
    pub fn fail_posts(&self) {
        self.state.borrow_mut().failing = true;
    }

    /// Commands posted so far.
    pub fn posted(&self) -> Vec<ShellCommand> {
        self.state.borrow().posted.clone()
    }

    /// Names of the globals currently installed.
    pub fn installed(&self) -> Vec<String> {
        self.state.borrow().callbacks.keys().cloned().collect()
    }

    /// Invokes the global `name` like native code would. Returns `false` when it is not installed.
    pub fn invoke(&self, name: &str, payload: Value) -> bool {
        let handler = self.state.borrow().callbacks.get(name).cloned();
        match handler {
            Some(handler) => {
                handler(payload);
                true
            }
            None => false,
        }
    }
}

impl Default for MemoryShellTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ShellTransport for MemoryShellTransport {
    fn is_available(&self) -> bool {
        self.state.borrow().available
    }

    fn post(&self, command: &ShellCommand) -> Result<(), String> {
        let mut state = self.state.borrow_mut();
        if !state.available {
            return Err("NativeBridge is unavailable".to_string());
        }
        if state.failing {
            return Err("NativeBridge.postMessage threw".to_string());
        }
        state.posted.push(command.clone());
        Ok(())
    }

    fn install_callback(&self, name: &str, handler: Rc<dyn Fn(Value)>) -> Disposer {
        self.state
            .borrow_mut()
            .callbacks
            .insert(name.to_string(), handler.clone());
        let state = Rc::downgrade(&self.state);
        let name = name.to_string();
        Disposer::new(move || {
            let Some(state) = state.upgrade() else {
                return;
            };
            let mut state = state.borrow_mut();
            if state
                .callbacks
                .get(&name)
                .is_some_and(|current| Rc::ptr_eq(current, &handler))
            {
                state.callbacks.remove(&name);
            }
        })
    }
}

struct PendingQr {
    id: u64,
    sender: oneshot::Sender<Result<String, AdapterError>>,
    timeout: Disposer,
}

struct ShellInner {
    transport: Rc<dyn ShellTransport>,
    scheduler: Rc<dyn Scheduler>,
    names: RefCell<ShellBridgeNames>,
    qr_timeout_ms: u32,
    installed: RefCell<Vec<(ShellCallback, String, Disposer)>>,
    push_listeners: ListenerSet<str>,
    deep_link_listeners: ListenerSet<str>,
    active_listeners: ListenerSet<()>,
    background_listeners: ListenerSet<()>,
    last_push_token: RefCell<Option<String>>,
    pending_qr: RefCell<Option<PendingQr>>,
    next_request: Cell<u64>,
}

impl ShellInner {
    fn send(&self, command: &ShellCommand) -> bool {
        if !self.transport.is_available() {
            return false;
        }
        match self.transport.post(command) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!("[miniapp-host] NativeBridge.postMessage failed: {err}");
                false
            }
        }
    }

    fn handle(&self, role: ShellCallback, payload: Value) {
        match role {
            ShellCallback::PushToken => {
                let Some(token) = payload.as_str() else {
                    return;
                };
                tracing::debug!("[miniapp-host] native push token received");
                self.last_push_token.replace(Some(token.to_string()));
                self.push_listeners.notify(token);
            }
            ShellCallback::DeepLink => {
                if let Some(path) = payload.as_str() {
                    self.deep_link_listeners.notify(path);
                }
            }
            ShellCallback::AppActive => self.active_listeners.notify(&()),
            ShellCallback::AppBackground => self.background_listeners.notify(&()),
            ShellCallback::QrResult => {
                let Some(value) = payload.as_str() else {
                    return;
                };
                let pending = self.pending_qr.borrow_mut().take();
                if let Some(pending) = pending {
                    pending.timeout.dispose();
                    let _ = pending.sender.send(Ok(value.to_string()));
                }
            }
        }
    }

    /// Installs every callback under its configured name, removing globals whose name changed.
    fn install(self: &Rc<Self>) {
        let names = self.names.borrow().clone();
        let mut installed = self.installed.borrow_mut();
        for (_, _, disposer) in installed.drain(..) {
            disposer.dispose();
        }
        for (role, name) in names.callbacks() {
            let weak: Weak<Self> = Rc::downgrade(self);
            let disposer = self.transport.install_callback(
                name,
                Rc::new(move |payload: Value| {
                    if let Some(inner) = weak.upgrade() {
                        inner.handle(role, payload);
                    }
                }),
            );
            installed.push((role, name.to_string(), disposer));
        }
    }

    fn reject_pending(&self, error: AdapterError) {
        let pending = self.pending_qr.borrow_mut().take();
        if let Some(pending) = pending {
            pending.timeout.dispose();
            let _ = pending.sender.send(Err(error));
        }
    }
}

/// Push, deep-link, lifecycle and QR plumbing for the native shell.
#[derive(Clone)]
pub struct ShellBridge {
    inner: Rc<ShellInner>,
}

impl ShellBridge {
    /// Bridge over `transport` that installs its global callbacks immediately.
    pub fn new(
        transport: Rc<dyn ShellTransport>,
        scheduler: Rc<dyn Scheduler>,
        config: &AdapterConfig,
    ) -> Self {
        let inner = Rc::new(ShellInner {
            transport,
            scheduler,
            names: RefCell::new(config.shell_bridge.clone()),
            qr_timeout_ms: config.shell_qr_timeout_ms,
            installed: RefCell::new(Vec::new()),
            push_listeners: ListenerSet::new("onPushToken"),
            deep_link_listeners: ListenerSet::new("onDeepLink"),
            active_listeners: ListenerSet::new("onAppActive"),
            background_listeners: ListenerSet::new("onAppBackground"),
            last_push_token: RefCell::new(None),
            pending_qr: RefCell::new(None),
            next_request: Cell::new(0),
        });
        inner.install();
        Self { inner }
    }

    /// Renames the global callbacks and reinstalls them.
    pub fn configure(&self, names: ShellBridgeNames) {
        self.inner.names.replace(names);
        self.inner.install();
    }

    /// Currently installed `(role, global name)` pairs.
    pub fn installed_callbacks(&self) -> Vec<(ShellCallback, String)> {
        self.inner
            .installed
            .borrow()
            .iter()
            .map(|(role, name, _)| (*role, name.clone()))
            .collect()
    }

    /// Opens the native QR scanner.
    ///
    /// The request is registered before this returns: a later call rejects it with
    /// [`AdapterError::Superseded`], and without a result it fails with
    /// [`AdapterError::Timeout`] after the configured delay.
    pub fn open_native_qr(&self) -> impl Future<Output = Result<String, AdapterError>> + 'static {
        let inner = &self.inner;
        inner.reject_pending(AdapterError::Superseded);

        let (sender, receiver) = oneshot::channel();
        if !inner.send(&ShellCommand::OpenNativeQr) {
            let _ = sender.send(Err(AdapterError::Unavailable(
                "Native bridge is unavailable".to_string(),
            )));
        } else {
            let id = inner.next_request.get() + 1;
            inner.next_request.set(id);
            let after_ms = inner.qr_timeout_ms;
            let weak = Rc::downgrade(inner);
            let timeout = inner.scheduler.set_timeout(
                after_ms,
                Box::new(move || {
                    let Some(inner) = weak.upgrade() else {
                        return;
                    };
                    let expired = inner
                        .pending_qr
                        .borrow()
                        .as_ref()
                        .is_some_and(|pending| pending.id == id);
                    if expired {
                        inner.reject_pending(AdapterError::Timeout {
                            operation: "openNativeQR",
                            after_ms,
                        });
                    }
                }),
            );
            inner.pending_qr.replace(Some(PendingQr {
                id,
                sender,
                timeout,
            }));
        }

        async move { receiver.await.unwrap_or(Err(AdapterError::Cancelled)) }
    }

    /// Subscribes to push tokens. The last known token is replayed on the next tick.
    pub fn on_push_token(&self, callback: Rc<dyn Fn(&str)>) -> Disposer {
        let inner = &self.inner;
        let subscription = inner.push_listeners.subscribe(callback.clone());
        let last_token = inner.last_push_token.borrow().clone();
        if let Some(token) = last_token {
            let live = subscription.clone();
            inner.scheduler.set_timeout(
                0,
                Box::new(move || {
                    if !live.is_disposed() {
                        callback(&token);
                    }
                }),
            );
        }
        subscription
    }

    /// Subscribes to deep-link paths.
    pub fn on_deep_link(&self, callback: Rc<dyn Fn(&str)>) -> Disposer {
        self.inner.deep_link_listeners.subscribe(callback)
    }

    /// Subscribes to app-foreground notifications.
    pub fn on_app_active(&self, callback: Rc<dyn Fn()>) -> Disposer {
        self.inner
            .active_listeners
            .subscribe(Rc::new(move |_: &()| callback()))
    }

    /// Subscribes to app-background notifications.
    pub fn on_app_background(&self, callback: Rc<dyn Fn()>) -> Disposer {
        self.inner
            .background_listeners
            .subscribe(Rc::new(move |_: &()| callback()))
    }

    /// Posts `storeToken`. Returns whether the command was delivered.
    pub fn store_token(&self, payload: Option<Value>) -> bool {
        self.inner.send(&ShellCommand::StoreToken { payload })
    }

    /// Posts `requestPushPermission`. Returns whether the command was delivered.
    pub fn request_push_permission(&self) -> bool {
        self.inner.send(&ShellCommand::RequestPushPermission)
    }

    /// Last push token delivered by the shell.
    pub fn last_push_token(&self) -> Option<String> {
        self.inner.last_push_token.borrow().clone()
    }

    /// Removes the globals, cancels a pending QR request and drops every listener.
    pub fn teardown(&self) {
        let inner = &self.inner;
        for (_, _, disposer) in inner.installed.borrow_mut().drain(..) {
            disposer.dispose();
        }
        inner.reject_pending(AdapterError::Cancelled);
        inner.push_listeners.clear();
        inner.deep_link_listeners.clear();
        inner.active_listeners.clear();
        inner.background_listeners.clear();
    }
}

struct ShellAdapterInner {
    core: AdapterCore,
    shell: ShellBridge,
}

/// Adapter for the native iOS/Android shells.
pub struct ShellAdapter {
    inner: Rc<ShellAdapterInner>,
}

impl ShellAdapter {
    /// Adapter for `platform` (`ShellIos` or `ShellAndroid`) over `transport`.
    pub fn new(platform: Platform, transport: Rc<dyn ShellTransport>, deps: AdapterDeps) -> Self {
        let shell = ShellBridge::new(transport, deps.scheduler.clone(), &deps.config);
        let mut environment = EnvironmentInfo::new(platform);
        environment.is_web_view = Some(true);
        let capabilities = PlatformCapabilities::none()
            .with_presence(Capability::QrScanner, true)
            .with_presence(Capability::Notifications, true);
        Self {
            inner: Rc::new(ShellAdapterInner {
                core: AdapterCore::new(environment, capabilities, deps),
                shell,
            }),
        }
    }

    /// Push, deep-link and lifecycle channel of this shell.
    pub fn shell(&self) -> &ShellBridge {
        &self.inner.shell
    }
}

impl MiniAppAdapter for ShellAdapter {
    fn core(&self) -> &AdapterCore {
        &self.inner.core
    }

    fn init(&self, options: InitOptions) -> AdapterFuture<'_, Result<(), AdapterError>> {
        Box::pin(async move {
            let inner = &self.inner;
            if inner.core.is_ready() {
                return Ok(());
            }
            log_ignored_init_options(self.platform(), options);

            let weak = Rc::downgrade(inner);
            let hide = inner.shell.on_app_background(Rc::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.core.notify_view_hide();
                }
            }));
            let weak = Rc::downgrade(inner);
            let restore = inner.shell.on_app_active(Rc::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.core.notify_view_restore();
                }
            }));
            inner.core.register(hide);
            inner.core.register(restore);
            inner.core.set_ready(true);
            Ok(())
        })
    }

    fn scan_qr_code(&self, _options: QrScanOptions) -> AdapterFuture<'_, Option<String>> {
        let pending = self.inner.shell.open_native_qr();
        Box::pin(async move {
            match pending.await {
                Ok(value) => Some(value),
                Err(err) => {
                    tracing::warn!("[miniapp-host] shell.openNativeQR failed: {err}");
                    None
                }
            }
        })
    }

    fn request_notifications_permission(&self) -> AdapterFuture<'_, bool> {
        let delivered = self.inner.shell.request_push_permission();
        Box::pin(async move { delivered })
    }

    fn on_destroy(&self) {
        self.inner.shell.teardown();
    }
}

#[cfg(test)]
mod tests {
    use futures::{executor::block_on, FutureExt};
    use miniapp_host::{ManualScheduler, MemoryBrowserHost};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn bridge(transport: &MemoryShellTransport, scheduler: &ManualScheduler) -> ShellBridge {
        ShellBridge::new(
            Rc::new(transport.clone()),
            Rc::new(scheduler.clone()),
            &AdapterConfig::default(),
        )
    }

    #[test]
    fn commands_serialize_with_type_tag() {
        assert_eq!(
            serde_json::to_value(ShellCommand::StoreToken {
                payload: Some(json!({"token": "abc"}))
            })
            .expect("serialize"),
            json!({"type": "storeToken", "payload": {"token": "abc"}})
        );
        assert_eq!(
            serde_json::to_value(ShellCommand::OpenNativeQr).expect("serialize"),
            json!({"type": "openNativeQR"})
        );
    }

    #[test]
    fn qr_result_callback_resolves_pending_request() {
        let transport = MemoryShellTransport::new();
        let scheduler = ManualScheduler::new();
        let shell = bridge(&transport, &scheduler);

        let pending = shell.open_native_qr();
        assert!(transport.invoke("nativeQRResult", json!("ticket-17")));

        assert_eq!(block_on(pending), Ok("ticket-17".to_string()));
        assert_eq!(transport.posted(), vec![ShellCommand::OpenNativeQr]);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn second_qr_request_supersedes_first() {
        let transport = MemoryShellTransport::new();
        let scheduler = ManualScheduler::new();
        let shell = bridge(&transport, &scheduler);

        let first = shell.open_native_qr();
        let second = shell.open_native_qr();
        transport.invoke("nativeQRResult", json!("second"));

        assert_eq!(block_on(first), Err(AdapterError::Superseded));
        assert_eq!(block_on(second), Ok("second".to_string()));
    }

    #[test]
    fn qr_request_times_out() {
        let transport = MemoryShellTransport::new();
        let scheduler = ManualScheduler::new();
        let shell = bridge(&transport, &scheduler);

        let mut pending = shell.open_native_qr().boxed_local();
        scheduler.advance(59_999);
        assert!((&mut pending).now_or_never().is_none());
        scheduler.advance(1);

        assert_eq!(
            block_on(pending),
            Err(AdapterError::Timeout {
                operation: "openNativeQR",
                after_ms: 60_000
            })
        );
    }

    #[test]
    fn qr_without_native_bridge_is_unavailable() {
        let transport = MemoryShellTransport::unavailable();
        let shell = bridge(&transport, &ManualScheduler::new());

        assert!(matches!(
            block_on(shell.open_native_qr()),
            Err(AdapterError::Unavailable(_))
        ));
        assert!(!shell.request_push_permission());
    }

    #[test]
    fn failed_post_reports_undelivered_token() {
        let transport = MemoryShellTransport::new();
        let shell = bridge(&transport, &ManualScheduler::new());
        assert!(shell.store_token(Some(json!({"token": "t"}))));

        transport.fail_posts();

        assert!(!shell.store_token(None));
        assert_eq!(transport.posted().len(), 1);
    }

    #[test]
    fn push_token_replays_to_late_subscribers_on_next_tick() {
        let transport = MemoryShellTransport::new();
        let scheduler = ManualScheduler::new();
        let shell = bridge(&transport, &scheduler);
        transport.invoke("nativePushToken", json!("token-1"));
        let received = Rc::new(RefCell::new(Vec::new()));
        let sink = received.clone();

        let _subscription = shell.on_push_token(Rc::new(move |token: &str| {
            sink.borrow_mut().push(token.to_string())
        }));
        assert!(received.borrow().is_empty());
        scheduler.advance(0);
        transport.invoke("nativePushToken", json!("token-2"));
        transport.invoke("nativePushToken", json!(42));

        assert_eq!(*received.borrow(), vec!["token-1".to_string(), "token-2".to_string()]);
        assert_eq!(shell.last_push_token().as_deref(), Some("token-2"));
    }

    #[test]
    fn renaming_callbacks_removes_old_globals() {
        let transport = MemoryShellTransport::new();
        let shell = bridge(&transport, &ManualScheduler::new());
        let links = Rc::new(RefCell::new(Vec::new()));
        let sink = links.clone();
        let _subscription = shell.on_deep_link(Rc::new(move |path: &str| {
            sink.borrow_mut().push(path.to_string())
        }));

        shell.configure(ShellBridgeNames {
            deep_link_callback: "appDeepLink".to_string(),
            ..ShellBridgeNames::default()
        });

        assert!(!transport.invoke("nativeDeepLink", json!("/old")));
        assert!(transport.invoke("appDeepLink", json!("/orders/7")));
        assert_eq!(*links.borrow(), vec!["/orders/7".to_string()]);
        assert!(transport.installed().contains(&"appDeepLink".to_string()));
        assert_eq!(transport.installed().len(), 5);
    }

    #[test]
    fn adapter_maps_app_lifecycle_and_tears_down_globals() {
        let transport = MemoryShellTransport::new();
        let scheduler = ManualScheduler::new();
        let adapter = ShellAdapter::new(
            Platform::ShellIos,
            Rc::new(transport.clone()),
            AdapterDeps::new(
                Rc::new(MemoryBrowserHost::new()),
                Rc::new(scheduler.clone()),
                AdapterConfig::default(),
            ),
        );
        block_on(adapter.init(InitOptions::default())).expect("init");
        let hidden = Rc::new(Cell::new(0));
        let counter = hidden.clone();
        let _subscription = adapter.on_view_hide(Rc::new(move || counter.set(counter.get() + 1)));

        transport.invoke("nativeAppBackground", Value::Null);
        assert_eq!(hidden.get(), 1);
        assert!(adapter.supports(Capability::QrScanner));
        assert_eq!(adapter.environment().is_web_view, Some(true));
        assert!(block_on(adapter.request_notifications_permission()));

        let pending = adapter.scan_qr_code(QrScanOptions::default());
        adapter.destroy();

        assert_eq!(block_on(pending), None);
        assert!(transport.installed().is_empty());
    }
}
