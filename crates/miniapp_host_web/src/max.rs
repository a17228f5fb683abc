//! MAX mini-app adapter over the global `WebApp` object.

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use miniapp_host::{
    default_close_app, default_download_file, default_on_back_button, default_open_link,
    default_share_url, extract_phone, log_ignored_init_options, unix_time_ms_now, AdapterCore,
    AdapterDeps, AdapterError, AdapterFuture, BridgeEvent, Callback, Capability, Disposable,
    Disposer, DownloadOptions, EnvironmentInfo, HapticImpactStyle, HapticNotificationType,
    InitOptions, MiniAppAdapter, Platform, PlatformBridge, PlatformCapabilities, QrScanOptions,
};
use serde_json::{json, Map, Value};

use crate::{bridge::fire, params::QueryParams};

fn capabilities(bridge: &dyn PlatformBridge) -> PlatformCapabilities {
    let has = |method: &str| bridge.has_method(method);
    PlatformCapabilities::none()
        .with_presence(Capability::Haptics, has("hapticImpact"))
        .with_presence(Capability::QrScanner, has("openCodeReader"))
        .with_presence(Capability::CloseApp, has("close"))
        .with_presence(Capability::BackButton, has("backButton.onClick"))
        .with_presence(
            Capability::BackButtonVisibility,
            has("backButton.show") && has("backButton.hide"),
        )
        .with_presence(Capability::OpenInternalLink, has("openMaxLink"))
        .with_presence(Capability::DownloadFile, has("downloadFile"))
        .with_presence(Capability::RequestPhone, bridge.is_present())
        .with_presence(Capability::Popup, false)
}

struct MaxInner {
    core: AdapterCore,
    bridge: Rc<dyn PlatformBridge>,
    init_data: RefCell<Option<String>>,
    init_data_unsafe: RefCell<Value>,
    back_handlers: Cell<usize>,
}

impl MaxInner {
    fn has(&self, method: &str) -> bool {
        self.bridge.has_method(method)
    }

    /// Calls `method` when present; `None` means the caller should fall back.
    async fn try_call(&self, method: &'static str, params: Value) -> Option<Value> {
        if !self.has(method) {
            return None;
        }
        match self.bridge.call(method, params).await {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!("[miniapp-host] MAX {method} failed: {err}");
                None
            }
        }
    }

    async fn haptic(&self, method: &'static str, params: Value, fallback: &[u32]) {
        if !self.has(method) {
            self.core.browser().vibrate(fallback);
            return;
        }
        if let Err(err) = self.bridge.call(method, params).await {
            tracing::warn!("[miniapp-host] MAX {method} haptic failed: {err}");
        }
    }

    fn custom_launch_params(&self) -> Value {
        let query = QueryParams::parse(&self.core.browser().location_search());
        let params: Map<String, Value> = query
            .iter()
            .map(|(key, value)| (key.to_string(), Value::String(value.to_string())))
            .collect();
        Value::Object(params)
    }
}

/// Adapter for MAX mini-apps.
pub struct MaxAdapter {
    inner: Rc<MaxInner>,
}

impl MaxAdapter {
    /// Adapter over `bridge` (normally the `window.WebApp` glue).
    pub fn new(bridge: Rc<dyn PlatformBridge>, deps: AdapterDeps) -> Self {
        let capabilities = capabilities(bridge.as_ref());
        Self {
            inner: Rc::new(MaxInner {
                core: AdapterCore::new(EnvironmentInfo::new(Platform::Max), capabilities, deps),
                bridge,
                init_data: RefCell::new(None),
                init_data_unsafe: RefCell::new(Value::Null),
                back_handlers: Cell::new(0),
            }),
        }
    }
}

impl MiniAppAdapter for MaxAdapter {
    fn core(&self) -> &AdapterCore {
        &self.inner.core
    }

    fn init(&self, options: InitOptions) -> AdapterFuture<'_, Result<(), AdapterError>> {
        Box::pin(async move {
            let inner = &self.inner;
            if inner.core.is_ready() {
                return Ok(());
            }
            log_ignored_init_options(Platform::Max, options);

            inner.try_call("ready", Value::Null).await;
            let state = match inner.bridge.call("getState", Value::Null).await {
                Ok(state) => state,
                Err(err) => {
                    tracing::warn!("[miniapp-host] MAX state unavailable: {err}");
                    Value::Null
                }
            };

            let text = |key: &str| {
                state
                    .get(key)
                    .and_then(Value::as_str)
                    .filter(|value| !value.is_empty())
                    .map(str::to_string)
            };
            let version = text("version");
            let init_data_unsafe = state.get("initDataUnsafe").cloned().unwrap_or(Value::Null);
            let language = init_data_unsafe
                .pointer("/user/language_code")
                .and_then(Value::as_str)
                .map(str::to_string);

            inner.init_data.replace(text("initData"));
            inner.init_data_unsafe.replace(init_data_unsafe);
            inner.core.update_environment(|environment| {
                environment.sdk_version = version.clone();
                environment.app_version = version;
                environment.language_code = language;
                environment.is_web_view = Some(true);
            });
            inner.core.set_ready(true);
            inner.core.notify_environment_changed();
            Ok(())
        })
    }

    fn on_back_button(&self, callback: Callback) -> Disposer {
        let inner = &self.inner;
        if !self.supports(Capability::BackButton) {
            return default_on_back_button(&inner.core, callback);
        }
        let Some(subscription) = inner.bridge.subscribe(Rc::new(move |event: &BridgeEvent| {
            if event.name == "backButtonClicked" {
                callback();
            }
        })) else {
            tracing::warn!("[miniapp-host] MAX BackButton.onClick rejected the handler");
            return Disposer::noop();
        };

        inner.back_handlers.set(inner.back_handlers.get() + 1);
        if inner.has("backButton.show") {
            fire(&inner.bridge, "backButton.show", Value::Null);
        }

        let weak = Rc::downgrade(inner);
        inner.core.register(Disposable::new(move || {
            subscription.dispose();
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let remaining = inner.back_handlers.get().saturating_sub(1);
            inner.back_handlers.set(remaining);
            if remaining == 0 && inner.has("backButton.hide") {
                fire(&inner.bridge, "backButton.hide", Value::Null);
            }
        }))
    }

    fn set_back_button_visibility(&self, visible: bool) {
        let method = if visible {
            "backButton.show"
        } else {
            "backButton.hide"
        };
        if self.inner.has(method) {
            fire(&self.inner.bridge, method, Value::Null);
        }
    }

    fn open_link<'a>(&'a self, url: &'a str) -> AdapterFuture<'a, ()> {
        Box::pin(async move {
            let inner = &self.inner;
            if inner.try_call("openExternalLink", json!({ "url": url })).await.is_none() {
                default_open_link(&inner.core, url);
            }
        })
    }

    fn open_internal_link<'a>(&'a self, url: &'a str) -> AdapterFuture<'a, ()> {
        Box::pin(async move {
            let inner = &self.inner;
            if inner.try_call("openMaxLink", json!({ "url": url })).await.is_none() {
                default_open_link(&inner.core, url);
            }
        })
    }

    fn close_app(&self) -> AdapterFuture<'_, ()> {
        Box::pin(async move {
            let inner = &self.inner;
            if inner.try_call("close", Value::Null).await.is_none() {
                default_close_app(&inner.core);
            }
        })
    }

    fn vibrate_impact(&self, style: HapticImpactStyle) -> AdapterFuture<'_, ()> {
        Box::pin(
            self.inner
                .haptic("hapticImpact", json!({ "style": style.as_str() }), &[10]),
        )
    }

    fn vibrate_notification(&self, kind: HapticNotificationType) -> AdapterFuture<'_, ()> {
        Box::pin(self.inner.haptic(
            "hapticNotification",
            json!({ "type": kind.as_str() }),
            &[10, 30, 10],
        ))
    }

    fn vibrate_selection(&self) -> AdapterFuture<'_, ()> {
        Box::pin(self.inner.haptic("hapticSelection", Value::Null, &[5]))
    }

    fn scan_qr_code(&self, options: QrScanOptions) -> AdapterFuture<'_, Option<String>> {
        Box::pin(async move {
            let result = self
                .inner
                .try_call(
                    "openCodeReader",
                    json!({ "closeOnCapture": options.close_on_capture }),
                )
                .await?;
            result
                .get("value")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
    }

    fn request_phone(&self) -> AdapterFuture<'_, Option<String>> {
        Box::pin(async move {
            let inner = &self.inner;
            if inner.has("requestPhoneNumber") {
                return match inner.bridge.call("requestPhoneNumber", Value::Null).await {
                    Ok(response) => extract_phone(&response),
                    Err(err) => {
                        tracing::warn!("[miniapp-host] MAX requestPhone failed: {err}");
                        None
                    }
                };
            }

            let Some(pending) = inner.core.browser().request_phone_via_event() else {
                tracing::warn!(
                    "[miniapp-host] MAX requestPhone not handled: native promise missing"
                );
                return None;
            };
            match pending.await {
                Ok(response) => extract_phone(&response),
                Err(err) => {
                    tracing::warn!("[miniapp-host] MAX requestPhone promise rejected: {err}");
                    None
                }
            }
        })
    }

    fn share_url<'a>(&'a self, url: &'a str, text: Option<&'a str>) -> AdapterFuture<'a, ()> {
        Box::pin(async move {
            let inner = &self.inner;
            let params = json!({
                "text": text.unwrap_or_default(),
                "link": url,
                "requestId": format!("share-{}", unix_time_ms_now()),
            });
            if inner.try_call("shareContent", params).await.is_none() {
                default_share_url(&inner.core, url, text).await;
            }
        })
    }

    fn download_file<'a>(
        &'a self,
        url: &'a str,
        file_name: Option<&'a str>,
    ) -> AdapterFuture<'a, Result<(), AdapterError>> {
        Box::pin(async move {
            let inner = &self.inner;
            let params = json!({
                "url": url,
                "file_name": miniapp_host::fallback_file_name(url, file_name),
            });
            if inner.try_call("downloadFile", params).await.is_some() {
                return Ok(());
            }
            default_download_file(
                &inner.core,
                url,
                file_name,
                DownloadOptions {
                    prefer_blob: false,
                    revoke_after_ms: inner.core.config().blob_url_revoke_ms,
                },
            )
            .await
        })
    }

    fn init_data(&self) -> Option<String> {
        self.inner.init_data.borrow().clone()
    }

    fn launch_params(&self) -> Option<Value> {
        Some(json!({
            "launchParams": self.inner.init_data_unsafe.borrow().clone(),
            "customLaunchParams": self.inner.custom_launch_params(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use miniapp_host::{MemoryBridge, MemoryBrowserHost, NoopScheduler};
    use pretty_assertions::assert_eq;

    use super::*;

    fn max_bridge(methods: &[&str]) -> MemoryBridge {
        let bridge = MemoryBridge::new("max").with_methods(methods);
        bridge.respond(
            "getState",
            Ok(json!({
                "version": "25.9.1",
                "platform": "android",
                "initData": "auth_date=1&hash=abc",
                "initDataUnsafe": {"user": {"language_code": "ru"}, "start_param": "ref42"},
            })),
        );
        bridge
    }

    fn adapter(bridge: &MemoryBridge, browser: &MemoryBrowserHost) -> MaxAdapter {
        MaxAdapter::new(
            Rc::new(bridge.clone()),
            AdapterDeps::new(
                Rc::new(browser.clone()),
                Rc::new(NoopScheduler),
                miniapp_host::AdapterConfig::default(),
            ),
        )
    }

    #[test]
    fn init_reads_web_app_state_and_launch_params() {
        let bridge = max_bridge(&["ready", "getState"]);
        let browser = MemoryBrowserHost::new();
        browser.configure(|state| state.search = "?utm_source=push&promo=spring".to_string());
        let adapter = adapter(&bridge, &browser);

        block_on(adapter.init(InitOptions::default())).expect("init");

        let environment = adapter.environment();
        assert_eq!(environment.sdk_version.as_deref(), Some("25.9.1"));
        assert_eq!(environment.app_version.as_deref(), Some("25.9.1"));
        assert_eq!(environment.language_code.as_deref(), Some("ru"));
        assert_eq!(environment.is_web_view, Some(true));
        assert_eq!(adapter.init_data().as_deref(), Some("auth_date=1&hash=abc"));
        assert_eq!(
            adapter.launch_params(),
            Some(json!({
                "launchParams": {"user": {"language_code": "ru"}, "start_param": "ref42"},
                "customLaunchParams": {"promo": "spring", "utm_source": "push"},
            }))
        );
        assert_eq!(bridge.calls_to("ready").len(), 1);
    }

    #[test]
    fn back_button_shows_then_hides_after_last_handler() {
        let bridge = max_bridge(&["backButton.onClick", "backButton.show", "backButton.hide"]);
        let adapter = adapter(&bridge, &MemoryBrowserHost::new());
        let presses = Rc::new(Cell::new(0));
        let counter = presses.clone();

        let first = adapter.on_back_button(Rc::new(move || counter.set(counter.get() + 1)));
        let second = adapter.on_back_button(Rc::new(|| {}));
        bridge.emit("backButtonClicked", Value::Null);
        first.dispose();
        assert!(bridge.calls_to("backButton.hide").is_empty());
        second.dispose();

        assert_eq!(presses.get(), 1);
        assert_eq!(bridge.calls_to("backButton.show").len(), 2);
        assert_eq!(bridge.calls_to("backButton.hide").len(), 1);
        assert_eq!(bridge.subscriber_count(), 0);
    }

    #[test]
    fn haptics_fall_back_to_vibration() {
        let bridge = max_bridge(&["hapticSelection"]);
        let browser = MemoryBrowserHost::new();
        let adapter = adapter(&bridge, &browser);

        block_on(adapter.vibrate_impact(HapticImpactStyle::Heavy));
        block_on(adapter.vibrate_selection());

        assert_eq!(browser.state().vibrations, vec![vec![10]]);
        assert_eq!(bridge.calls_to("hapticSelection").len(), 1);
    }

    #[test]
    fn code_reader_returns_value() {
        let bridge = max_bridge(&["openCodeReader"]);
        bridge.respond("openCodeReader", Ok(json!({"requestId": "1", "value": "MAX-QR"})));
        let adapter = adapter(&bridge, &MemoryBrowserHost::new());

        let scanned = block_on(adapter.scan_qr_code(QrScanOptions::default()));

        assert_eq!(scanned.as_deref(), Some("MAX-QR"));
        assert_eq!(
            bridge.calls_to("openCodeReader"),
            vec![json!({"closeOnCapture": true})]
        );
    }

    #[test]
    fn phone_falls_back_to_request_event_then_none() {
        let bridge = max_bridge(&[]);
        let browser = MemoryBrowserHost::new();
        browser.configure(|state| {
            state.phone_event_response = Some(json!({"phone_number": "+79990001122"}));
        });
        let adapter = adapter(&bridge, &browser);

        assert_eq!(
            block_on(adapter.request_phone()).as_deref(),
            Some("+79990001122")
        );

        browser.configure(|state| state.phone_event_response = None);
        assert_eq!(block_on(adapter.request_phone()), None);
    }

    #[test]
    fn external_links_use_bridge_and_internal_fall_back() {
        let bridge = max_bridge(&["openExternalLink"]);
        let browser = MemoryBrowserHost::new();
        let adapter = adapter(&bridge, &browser);

        block_on(adapter.open_link("https://example.com"));
        block_on(adapter.open_internal_link("https://max.ru/app"));

        assert_eq!(
            bridge.calls_to("openExternalLink"),
            vec![json!({"url": "https://example.com"})]
        );
        assert_eq!(browser.state().opened_urls, vec!["https://max.ru/app".to_string()]);
        assert!(!adapter.supports(Capability::OpenInternalLink));
    }
}
