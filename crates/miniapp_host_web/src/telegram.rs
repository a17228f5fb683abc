//! Telegram Mini Apps adapter over `Telegram.WebApp`.

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use miniapp_host::{
    default_close_app, default_download_file, default_on_back_button, default_open_link,
    default_set_colors, default_share_url, default_show_popup, log_ignored_init_options,
    AdapterCore, AdapterDeps, AdapterError, AdapterFuture, Appearance, BridgeEvent, Callback,
    Capability, ColorScheme, Disposable, Disposer, DownloadOptions, EnvironmentInfo,
    HapticImpactStyle, HapticNotificationType, HomeScreenStatus, InitOptions, ListenerSet,
    MiniAppAdapter, PartialInsets, Platform, PlatformBridge, PlatformCapabilities, PopupOptions,
    QrScanOptions, ShareStoryOptions, ViewportInsets,
};
use serde_json::{json, Value};

use crate::{
    bridge::{fire, spawn_detached},
    params::encode_component,
};

const SHARE_URL_BASE: &str = "https://t.me/share/url";

/// Returns whether a `major.minor` client version is at least `major.minor`.
///
/// Unparsable versions are treated as `0.0`.
pub fn version_at_least(version: &str, major: u32, minor: u32) -> bool {
    let mut parts = version
        .trim()
        .split('.')
        .map(|part| part.parse::<u32>().unwrap_or(0));
    let actual = (parts.next().unwrap_or(0), parts.next().unwrap_or(0));
    actual >= (major, minor)
}

/// `t.me` share link for `url` with optional `text`.
pub fn share_link(url: &str, text: Option<&str>) -> String {
    let mut link = format!("{SHARE_URL_BASE}?url={}", encode_component(url));
    if let Some(text) = text.filter(|text| !text.is_empty()) {
        link.push_str("&text=");
        link.push_str(&encode_component(text));
    }
    link
}

fn capabilities(bridge: &dyn PlatformBridge) -> PlatformCapabilities {
    let has = |method: &str| bridge.has_method(method);
    PlatformCapabilities::none()
        .with_presence(Capability::Haptics, has("hapticSelection"))
        .with_presence(Capability::Popup, has("showPopup"))
        .with_presence(Capability::QrScanner, has("scanQr"))
        .with_presence(Capability::CloseApp, has("close"))
        .with_presence(Capability::BackButton, has("backButton.show"))
        .with_presence(Capability::BackButtonVisibility, has("backButton.hide"))
        .with_presence(Capability::BindCssVariables, has("bindCssVariables"))
        .with_presence(
            Capability::RequestPhone,
            has("requestPhoneAccess") || has("requestContact"),
        )
        .with_presence(Capability::OpenInternalLink, has("openTelegramLink"))
        .with_presence(Capability::DownloadFile, has("downloadFile"))
        .with_presence(Capability::ShareStory, has("shareStory"))
        .with_presence(Capability::Fullscreen, has("requestFullscreen"))
        .with_presence(Capability::HomeScreen, has("addToHomeScreen"))
}

struct TelegramInner {
    core: AdapterCore,
    bridge: Rc<dyn PlatformBridge>,
    state: RefCell<Value>,
    viewport: Cell<ViewportInsets>,
    css_bound: Cell<bool>,
    back_handlers: ListenerSet<()>,
}

impl TelegramInner {
    fn has(&self, method: &str) -> bool {
        self.bridge.has_method(method)
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, AdapterError> {
        self.bridge.call(method, params).await
    }

    async fn bind_css(&self) -> Result<(), AdapterError> {
        if self.css_bound.get() {
            return Ok(());
        }
        if !self.has("bindCssVariables") {
            return Err(AdapterError::Unsupported {
                capability: Capability::BindCssVariables,
            });
        }
        match self.call("bindCssVariables", Value::Null).await {
            Ok(_) => {
                self.css_bound.set(true);
                Ok(())
            }
            Err(AdapterError::Bridge { message, .. })
                if message.to_lowercase().contains("css variables are already bound") =>
            {
                self.css_bound.set(true);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    fn state_str(&self, pointer: &str) -> Option<String> {
        self.state
            .borrow()
            .pointer(pointer)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    }

    fn handle_event(&self, event: &BridgeEvent) {
        match event.name.as_str() {
            "themeChanged" => {
                let appearance = event
                    .data
                    .get("colorScheme")
                    .and_then(Value::as_str)
                    .and_then(Appearance::parse);
                if self.core.set_appearance(appearance) {
                    self.core.notify_environment_changed();
                }
            }
            "safeAreaChanged" | "contentSafeAreaChanged" => {
                let insets = PartialInsets::from_json(&event.data);
                let mut viewport = self.viewport.get();
                if event.name == "safeAreaChanged" {
                    viewport.safe_area = insets;
                } else {
                    viewport.content_safe_area = insets;
                }
                self.viewport.set(viewport);
                self.core.notify_environment_changed();
            }
            "activated" => self.core.notify_view_restore(),
            "deactivated" => self.core.notify_view_hide(),
            "backButtonClicked" => self.back_handlers.notify(&()),
            _ => {}
        }
    }
}

/// Adapter for Telegram Mini Apps.
pub struct TelegramAdapter {
    inner: Rc<TelegramInner>,
}

impl TelegramAdapter {
    /// Adapter over `bridge` (normally the `Telegram.WebApp` glue).
    pub fn new(bridge: Rc<dyn PlatformBridge>, deps: AdapterDeps) -> Self {
        let capabilities = capabilities(bridge.as_ref());
        Self {
            inner: Rc::new(TelegramInner {
                core: AdapterCore::new(
                    EnvironmentInfo::new(Platform::Telegram),
                    capabilities,
                    deps,
                ),
                bridge,
                state: RefCell::new(Value::Null),
                viewport: Cell::new(ViewportInsets::default()),
                css_bound: Cell::new(false),
                back_handlers: ListenerSet::new("onBackButton"),
            }),
        }
    }

    async fn native_or_default<F>(&self, method: &'static str, params: Value, fallback: F)
    where
        F: FnOnce(&AdapterCore),
    {
        let inner = &self.inner;
        if inner.has(method) {
            match inner.call(method, params).await {
                Ok(_) => return,
                Err(err) => tracing::warn!("[miniapp-host] Telegram {method} failed: {err}"),
            }
        }
        fallback(&inner.core);
    }

    async fn call_if_present(&self, method: &'static str, params: Value) {
        let inner = &self.inner;
        if !inner.has(method) {
            return;
        }
        if let Err(err) = inner.call(method, params).await {
            tracing::warn!("[miniapp-host] Telegram {method} failed: {err}");
        }
    }
}

impl MiniAppAdapter for TelegramAdapter {
    fn core(&self) -> &AdapterCore {
        &self.inner.core
    }

    fn init(&self, options: InitOptions) -> AdapterFuture<'_, Result<(), AdapterError>> {
        Box::pin(async move {
            let inner = &self.inner;
            if inner.core.is_ready() {
                return Ok(());
            }
            log_ignored_init_options(Platform::Telegram, options);

            if inner.has("ready") {
                if let Err(err) = inner.call("ready", Value::Null).await {
                    tracing::warn!("[miniapp-host] Telegram ready failed: {err}");
                }
            } else {
                tracing::warn!(
                    "[miniapp-host] Telegram.WebApp.ready is missing; running in limited mode"
                );
            }

            let state = inner
                .call("getState", Value::Null)
                .await
                .map_err(|err| AdapterError::Init(err.to_string()))?;
            let is_active = state.get("isActive").and_then(Value::as_bool).unwrap_or(true);
            inner.viewport.set(ViewportInsets {
                safe_area: state.get("safeAreaInset").and_then(PartialInsets::from_json),
                content_safe_area: state
                    .get("contentSafeAreaInset")
                    .and_then(PartialInsets::from_json),
            });
            inner.state.replace(state);

            let appearance = inner
                .state_str("/colorScheme")
                .as_deref()
                .and_then(Appearance::parse);
            inner.core.update_environment(|environment| {
                environment.sdk_version = inner.state_str("/version");
                environment.language_code = inner.state_str("/initDataUnsafe/user/language_code");
                environment.is_web_view = Some(true);
            });
            inner.core.set_appearance(appearance);

            if let Err(err) = inner.bind_css().await {
                tracing::warn!("[miniapp-host] Telegram bindCssVariables failed: {err}");
            }

            let weak = Rc::downgrade(inner);
            let subscription = inner.bridge.subscribe(Rc::new(move |event: &BridgeEvent| {
                if let Some(inner) = weak.upgrade() {
                    inner.handle_event(event);
                }
            }));
            if let Some(subscription) = subscription {
                inner.core.register(subscription);
            }

            inner.core.set_ready(true);
            if is_active {
                inner.core.notify_view_restore();
            } else {
                inner.core.notify_view_hide();
            }
            inner.core.notify_environment_changed();
            Ok(())
        })
    }

    fn set_colors(&self, colors: ColorScheme) -> AdapterFuture<'_, ()> {
        Box::pin(async move {
            let inner = &self.inner;
            let mut fallback = ColorScheme::default();

            if let Some(header) = colors.header {
                let rgb = inner
                    .state_str("/version")
                    .is_some_and(|version| version_at_least(&version, 6, 1));
                let value = if rgb { header.clone() } else { "bg_color".to_string() };
                if !self.apply_color("setHeaderColor", value).await {
                    fallback.header = Some(header);
                }
            }
            if let Some(background) = colors.background {
                if !self.apply_color("setBackgroundColor", background.clone()).await {
                    fallback.background = Some(background);
                }
            }
            if let Some(footer) = colors.footer {
                if !self.apply_color("setBottomBarColor", footer.clone()).await {
                    fallback.footer = Some(footer);
                }
            }

            if fallback.header.is_some() || fallback.background.is_some() {
                default_set_colors(&inner.core, &fallback);
            }
        })
    }

    fn on_back_button(&self, callback: Callback) -> Disposer {
        let inner = &self.inner;
        if !self.supports(Capability::BackButton) {
            return default_on_back_button(&inner.core, callback);
        }
        let subscription = inner
            .back_handlers
            .subscribe(Rc::new(move |_: &()| callback()));
        fire(&inner.bridge, "backButton.show", Value::Null);
        let weak = Rc::downgrade(inner);
        inner.core.register(Disposable::new(move || {
            subscription.dispose();
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if inner.back_handlers.is_empty() && inner.has("backButton.hide") {
                fire(&inner.bridge, "backButton.hide", Value::Null);
            }
        }))
    }

    fn set_back_button_visibility(&self, visible: bool) {
        if !self.supports(Capability::BackButton) {
            return;
        }
        let method = if visible {
            "backButton.show"
        } else {
            "backButton.hide"
        };
        fire(&self.inner.bridge, method, Value::Null);
    }

    fn bind_css_variables(&self) -> Result<(), AdapterError> {
        let inner = &self.inner;
        if inner.css_bound.get() {
            return Ok(());
        }
        if !inner.has("bindCssVariables") {
            return Err(AdapterError::Unsupported {
                capability: Capability::BindCssVariables,
            });
        }
        let weak = Rc::downgrade(inner);
        spawn_detached(async move {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if let Err(err) = inner.bind_css().await {
                tracing::warn!("[miniapp-host] Telegram bindCssVariables failed: {err}");
            }
        });
        Ok(())
    }

    fn open_link<'a>(&'a self, url: &'a str) -> AdapterFuture<'a, ()> {
        Box::pin(self.native_or_default(
            "openLink",
            json!({ "url": url, "tryInstantView": true }),
            move |core| default_open_link(core, url),
        ))
    }

    fn open_internal_link<'a>(&'a self, url: &'a str) -> AdapterFuture<'a, ()> {
        Box::pin(self.native_or_default(
            "openTelegramLink",
            json!({ "path_full": url }),
            move |core| default_open_link(core, url),
        ))
    }

    fn close_app(&self) -> AdapterFuture<'_, ()> {
        Box::pin(self.native_or_default("close", Value::Null, default_close_app))
    }

    fn vibrate_impact(&self, style: HapticImpactStyle) -> AdapterFuture<'_, ()> {
        Box::pin(self.call_if_present("hapticImpact", json!({ "style": style.as_str() })))
    }

    fn vibrate_notification(&self, kind: HapticNotificationType) -> AdapterFuture<'_, ()> {
        Box::pin(self.call_if_present("hapticNotification", json!({ "type": kind.as_str() })))
    }

    fn vibrate_selection(&self) -> AdapterFuture<'_, ()> {
        Box::pin(self.call_if_present("hapticSelection", Value::Null))
    }

    fn show_popup(&self, options: PopupOptions) -> AdapterFuture<'_, Option<String>> {
        Box::pin(async move {
            let inner = &self.inner;
            if !inner.has("showPopup") {
                return default_show_popup(&inner.core, &options);
            }
            let buttons: Vec<Value> = options
                .buttons
                .iter()
                .map(|button| {
                    json!({
                        "id": button.id,
                        "text": button.text.as_deref().unwrap_or(&button.id),
                        "type": button.kind.as_str(),
                    })
                })
                .collect();
            let params = json!({
                "title": options.title,
                "message": options.message,
                "buttons": buttons,
            });
            match inner.call("showPopup", params).await {
                Ok(response) => response.as_str().map(str::to_string),
                Err(err) => {
                    tracing::warn!("[miniapp-host] Telegram showPopup failed: {err}");
                    default_show_popup(&inner.core, &options)
                }
            }
        })
    }

    fn scan_qr_code(&self, options: QrScanOptions) -> AdapterFuture<'_, Option<String>> {
        Box::pin(async move {
            let inner = &self.inner;
            if !inner.has("scanQr") {
                return None;
            }
            match inner
                .call("scanQr", json!({ "closeOnCapture": options.close_on_capture }))
                .await
            {
                Ok(result) => result.as_str().map(str::to_string),
                Err(err) => {
                    tracing::warn!("[miniapp-host] Telegram scanQr failed: {err}");
                    None
                }
            }
        })
    }

    fn request_phone(&self) -> AdapterFuture<'_, Option<String>> {
        Box::pin(async move {
            let inner = &self.inner;
            if !inner.has("requestContact") {
                return None;
            }
            if inner.has("requestPhoneAccess") {
                if let Err(err) = inner.call("requestPhoneAccess", Value::Null).await {
                    tracing::warn!("[miniapp-host] Telegram requestPhone access failed: {err}");
                }
            }
            match inner.call("requestContact", Value::Null).await {
                Ok(contact) => miniapp_host::extract_phone(&contact),
                Err(err) => {
                    tracing::warn!("[miniapp-host] Telegram requestPhone failed: {err}");
                    None
                }
            }
        })
    }

    fn share_url<'a>(&'a self, url: &'a str, text: Option<&'a str>) -> AdapterFuture<'a, ()> {
        Box::pin(async move {
            let inner = &self.inner;
            if inner.has("openTelegramLink") {
                let link = share_link(url, text);
                match inner
                    .call("openTelegramLink", json!({ "path_full": link }))
                    .await
                {
                    Ok(_) => return,
                    Err(err) => tracing::warn!("[miniapp-host] Telegram shareURL failed: {err}"),
                }
            }
            default_share_url(&inner.core, url, text).await;
        })
    }

    fn download_file<'a>(
        &'a self,
        url: &'a str,
        file_name: Option<&'a str>,
    ) -> AdapterFuture<'a, Result<(), AdapterError>> {
        Box::pin(async move {
            let inner = &self.inner;
            if inner.has("downloadFile") {
                let params = json!({
                    "url": url,
                    "file_name": miniapp_host::fallback_file_name(url, file_name),
                });
                match inner.call("downloadFile", params).await {
                    Ok(_) => return Ok(()),
                    Err(err) => {
                        tracing::warn!("[miniapp-host] Telegram downloadFile failed: {err}")
                    }
                }
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

    fn share_story<'a>(
        &'a self,
        media_url: &'a str,
        options: ShareStoryOptions,
    ) -> AdapterFuture<'a, Result<(), AdapterError>> {
        Box::pin(async move {
            let inner = &self.inner;
            if !inner.has("shareStory") {
                return Err(AdapterError::Unsupported {
                    capability: Capability::ShareStory,
                });
            }
            let params = json!({
                "media_url": media_url,
                "text": options.text,
                "widget_link": options.widget_link,
            });
            inner.call("shareStory", params).await.map(|_| ())
        })
    }

    fn add_to_home_screen(&self) -> AdapterFuture<'_, bool> {
        Box::pin(async move {
            let inner = &self.inner;
            if !inner.has("addToHomeScreen") {
                return false;
            }
            match inner.call("addToHomeScreen", Value::Null).await {
                Ok(_) => true,
                Err(err) => {
                    tracing::warn!("[miniapp-host] Telegram addToHomeScreen failed: {err}");
                    false
                }
            }
        })
    }

    fn check_home_screen_status(&self) -> AdapterFuture<'_, HomeScreenStatus> {
        Box::pin(async move {
            let inner = &self.inner;
            if !inner.has("checkHomeScreenStatus") {
                return HomeScreenStatus::Unknown;
            }
            match inner.call("checkHomeScreenStatus", Value::Null).await {
                Ok(status) => HomeScreenStatus::parse(status.as_str().unwrap_or_default()),
                Err(err) => {
                    tracing::warn!("[miniapp-host] Telegram checkHomeScreenStatus failed: {err}");
                    HomeScreenStatus::Unknown
                }
            }
        })
    }

    fn request_fullscreen(&self) -> AdapterFuture<'_, ()> {
        Box::pin(async move {
            let inner = &self.inner;
            if !inner.has("requestFullscreen") {
                tracing::warn!("[miniapp-host] Telegram requestFullscreen is unavailable");
                return;
            }
            if let Err(err) = inner.call("requestFullscreen", Value::Null).await {
                tracing::warn!("[miniapp-host] Telegram requestFullscreen failed: {err}");
                return;
            }
            self.disable_vertical_swipes().await;
        })
    }

    fn enable_vertical_swipes(&self) -> AdapterFuture<'_, ()> {
        Box::pin(self.call_if_present("enableVerticalSwipes", Value::Null))
    }

    fn disable_vertical_swipes(&self) -> AdapterFuture<'_, ()> {
        Box::pin(self.call_if_present("disableVerticalSwipes", Value::Null))
    }

    fn enable_closing_confirmation(&self, enabled: bool) -> AdapterFuture<'_, ()> {
        let method = if enabled {
            "enableClosingConfirmation"
        } else {
            "disableClosingConfirmation"
        };
        Box::pin(self.call_if_present(method, Value::Null))
    }

    fn init_data(&self) -> Option<String> {
        self.inner.state_str("/initData")
    }

    fn launch_params(&self) -> Option<Value> {
        let state = self.inner.state.borrow();
        if state.is_null() {
            return None;
        }
        let init_data = state.get("initDataUnsafe").cloned().unwrap_or(Value::Null);
        Some(json!({
            "tgWebAppVersion": state.get("version"),
            "tgWebAppPlatform": state.get("platform"),
            "tgWebAppStartParam": init_data.get("start_param"),
            "tgWebAppData": init_data,
        }))
    }

    fn viewport_insets(&self) -> Option<ViewportInsets> {
        let viewport = self.inner.viewport.get();
        (viewport.safe_area.is_some() || viewport.content_safe_area.is_some()).then_some(viewport)
    }
}

impl TelegramAdapter {
    async fn apply_color(&self, method: &'static str, color: String) -> bool {
        let inner = &self.inner;
        if !inner.has(method) {
            return false;
        }
        match inner.call(method, json!({ "color": color })).await {
            Ok(_) => true,
            Err(err) => {
                tracing::warn!("[miniapp-host] Telegram {method} failed: {err}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use miniapp_host::{Insets, MemoryBridge, MemoryBrowserHost, NoopScheduler};
    use pretty_assertions::assert_eq;

    use super::*;

    const ALL_METHODS: [&str; 18] = [
        "ready",
        "getState",
        "bindCssVariables",
        "setHeaderColor",
        "setBackgroundColor",
        "backButton.show",
        "backButton.hide",
        "openTelegramLink",
        "close",
        "hapticSelection",
        "hapticImpact",
        "showPopup",
        "requestPhoneAccess",
        "requestContact",
        "downloadFile",
        "requestFullscreen",
        "disableVerticalSwipes",
        "enableClosingConfirmation",
    ];

    fn telegram_bridge() -> MemoryBridge {
        let bridge = MemoryBridge::new("telegram").with_methods(&ALL_METHODS);
        bridge.respond(
            "getState",
            Ok(json!({
                "version": "8.0",
                "platform": "ios",
                "initData": "query_id=AA&user=%7B%7D&hash=ff",
                "initDataUnsafe": {"user": {"language_code": "de"}, "start_param": "promo"},
                "colorScheme": "dark",
                "isActive": true,
                "safeAreaInset": {"top": 47, "bottom": 34},
                "contentSafeAreaInset": {"top": 46},
            })),
        );
        bridge
    }

    fn adapter(bridge: &MemoryBridge, browser: &MemoryBrowserHost) -> TelegramAdapter {
        TelegramAdapter::new(
            Rc::new(bridge.clone()),
            AdapterDeps::new(
                Rc::new(browser.clone()),
                Rc::new(NoopScheduler),
                miniapp_host::AdapterConfig::default(),
            ),
        )
    }

    #[test]
    fn version_comparison_and_share_link() {
        assert!(version_at_least("6.1", 6, 1));
        assert!(version_at_least("7.0", 6, 1));
        assert!(!version_at_least("6.0", 6, 1));
        assert!(!version_at_least("garbage", 6, 1));
        assert_eq!(
            share_link("https://example.com/a b", Some("Look")),
            "https://t.me/share/url?url=https%3A%2F%2Fexample.com%2Fa%20b&text=Look"
        );
    }

    #[test]
    fn init_reads_state_and_combines_viewport_insets() {
        let bridge = telegram_bridge();
        let browser = MemoryBrowserHost::new();
        let adapter = adapter(&bridge, &browser);

        block_on(adapter.init(InitOptions::default())).expect("init");

        let environment = adapter.environment();
        assert_eq!(environment.sdk_version.as_deref(), Some("8.0"));
        assert_eq!(environment.language_code.as_deref(), Some("de"));
        assert_eq!(environment.appearance, Some(Appearance::Dark));
        assert_eq!(environment.is_web_view, Some(true));
        assert_eq!(adapter.init_data().as_deref(), Some("query_id=AA&user=%7B%7D&hash=ff"));
        assert_eq!(adapter.compute_safe_area(), Insets::new(93.0, 0.0, 34.0, 0.0));
        assert_eq!(
            adapter
                .launch_params()
                .and_then(|params| params.get("tgWebAppStartParam").cloned()),
            Some(json!("promo"))
        );
        assert_eq!(bridge.calls_to("ready").len(), 1);
        assert_eq!(bridge.calls_to("bindCssVariables").len(), 1);
        assert!(adapter.is_ready());
    }

    #[test]
    fn failed_state_handshake_fails_init() {
        let bridge = MemoryBridge::new("telegram").with_methods(&["ready"]);
        bridge.respond("getState", Err(AdapterError::bridge("getState", "no WebApp")));
        let adapter = adapter(&bridge, &MemoryBrowserHost::new());

        let result = block_on(adapter.init(InitOptions::default()));

        assert!(matches!(result, Err(AdapterError::Init(_))));
        assert!(!adapter.is_ready());
    }

    #[test]
    fn already_bound_css_counts_as_bound() {
        let bridge = telegram_bridge();
        bridge.respond(
            "bindCssVariables",
            Err(AdapterError::bridge(
                "bindCssVariables",
                "CSS variables are already bound",
            )),
        );
        let adapter = adapter(&bridge, &MemoryBrowserHost::new());

        assert_eq!(adapter.bind_css_variables(), Ok(()));
        assert_eq!(adapter.bind_css_variables(), Ok(()));
        assert_eq!(bridge.calls_to("bindCssVariables").len(), 1);
    }

    #[test]
    fn back_button_hides_when_last_handler_leaves() {
        let bridge = telegram_bridge();
        let adapter = adapter(&bridge, &MemoryBrowserHost::new());
        block_on(adapter.init(InitOptions::default())).expect("init");
        let presses = Rc::new(Cell::new(0));
        let first_counter = presses.clone();
        let second_counter = presses.clone();

        let first =
            adapter.on_back_button(Rc::new(move || first_counter.set(first_counter.get() + 1)));
        let second =
            adapter.on_back_button(Rc::new(move || second_counter.set(second_counter.get() + 10)));
        bridge.emit("backButtonClicked", Value::Null);
        first.dispose();
        assert!(bridge.calls_to("backButton.hide").is_empty());
        second.dispose();
        bridge.emit("backButtonClicked", Value::Null);

        assert_eq!(presses.get(), 11);
        assert_eq!(bridge.calls_to("backButton.show").len(), 2);
        assert_eq!(bridge.calls_to("backButton.hide").len(), 1);
    }

    #[test]
    fn events_update_appearance_insets_and_visibility() {
        let bridge = telegram_bridge();
        let adapter = adapter(&bridge, &MemoryBrowserHost::new());
        block_on(adapter.init(InitOptions::default())).expect("init");
        let hides = Rc::new(Cell::new(0));
        let counter = hides.clone();
        adapter.on_view_hide(Rc::new(move || counter.set(counter.get() + 1)));

        bridge.emit("themeChanged", json!({"colorScheme": "light"}));
        bridge.emit("safeAreaChanged", json!({"top": 20, "bottom": 0}));
        bridge.emit("deactivated", Value::Null);

        assert_eq!(adapter.environment().appearance, Some(Appearance::Light));
        assert_eq!(adapter.compute_safe_area(), Insets::new(66.0, 0.0, 0.0, 0.0));
        assert_eq!(hides.get(), 1);

        adapter.destroy();
        assert_eq!(bridge.subscriber_count(), 0);
    }

    #[test]
    fn colors_fall_back_per_field() {
        let bridge = telegram_bridge();
        let browser = MemoryBrowserHost::new();
        let adapter = adapter(&bridge, &browser);
        block_on(adapter.init(InitOptions::default())).expect("init");
        bridge.respond(
            "setBackgroundColor",
            Err(AdapterError::bridge("setBackgroundColor", "bad colour")),
        );

        block_on(adapter.set_colors(ColorScheme {
            header: Some("#101010".to_string()),
            background: Some("#202020".to_string()),
            footer: Some("#303030".to_string()),
        }));

        assert_eq!(
            bridge.calls_to("setHeaderColor"),
            vec![json!({"color": "#101010"})]
        );
        let state = browser.state();
        assert_eq!(state.theme_color, None);
        assert_eq!(state.body_background.as_deref(), Some("#202020"));
    }

    #[test]
    fn phone_requests_access_then_contact() {
        let bridge = telegram_bridge();
        bridge.respond(
            "requestPhoneAccess",
            Err(AdapterError::bridge("requestPhoneAccess", "declined")),
        );
        bridge.respond(
            "requestContact",
            Ok(json!({"contact": {"phone_number": "+4915112345678"}})),
        );
        let adapter = adapter(&bridge, &MemoryBrowserHost::new());

        let phone = block_on(adapter.request_phone());

        assert_eq!(phone.as_deref(), Some("+4915112345678"));
        let order: Vec<String> = bridge
            .calls()
            .into_iter()
            .map(|(method, _)| method)
            .collect();
        assert_eq!(order, vec!["requestPhoneAccess", "requestContact"]);
    }

    #[test]
    fn fullscreen_then_locks_vertical_swipes() {
        let bridge = telegram_bridge();
        let adapter = adapter(&bridge, &MemoryBrowserHost::new());

        block_on(adapter.request_fullscreen());
        block_on(adapter.enable_closing_confirmation(true));
        block_on(adapter.enable_closing_confirmation(false));

        assert_eq!(bridge.calls_to("requestFullscreen").len(), 1);
        assert_eq!(bridge.calls_to("disableVerticalSwipes").len(), 1);
        assert_eq!(bridge.calls_to("enableClosingConfirmation").len(), 1);
        assert!(bridge.calls_to("disableClosingConfirmation").is_empty());
    }

    #[test]
    fn download_failure_uses_browser_anchor() {
        let bridge = telegram_bridge();
        bridge.respond(
            "downloadFile",
            Err(AdapterError::bridge("downloadFile", "not allowed")),
        );
        let browser = MemoryBrowserHost::new();
        let adapter = adapter(&bridge, &browser);

        block_on(adapter.download_file("https://cdn.example.com/files/report.pdf", None))
            .expect("download");

        assert_eq!(
            bridge.calls_to("downloadFile"),
            vec![json!({
                "url": "https://cdn.example.com/files/report.pdf",
                "file_name": "report.pdf",
            })]
        );
        assert_eq!(
            browser.state().downloads,
            vec![(
                "https://cdn.example.com/files/report.pdf".to_string(),
                "report.pdf".to_string(),
                true
            )]
        );
    }
}
