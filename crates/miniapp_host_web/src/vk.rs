//! VK Mini Apps adapter.
//!
//! VK exposes no synchronous method table: every optional feature is checked with the bridge's
//! `supportsAsync` probe right before use, and the capability table is filled in once `init`
//! has probed the host. The safe area combines config-pushed insets, CSS `env()` values and a
//! floor for the overlay controls VK draws over mobile webviews.

use std::{
    cell::{Cell, RefCell},
    rc::{Rc, Weak},
};

use miniapp_host::{
    compute_combined_safe_area, create_safe_area_watcher, default_copy_text,
    default_download_file, default_set_colors, default_share_url, is_bridge_method_supported,
    AdapterCore, AdapterDeps, AdapterError, AdapterFuture, Appearance, Attempt, BridgeEvent,
    Capability, CapabilityStatus, ColorScheme, DownloadOptions, EnvironmentInfo,
    HapticImpactStyle, HapticNotificationType, HomeScreenStatus, InitOptions, Insets,
    MiniAppAdapter, PartialInsets, Platform, PlatformBridge, PlatformCapabilities, QrScanOptions,
    SafeAreaSources, ShareStoryOptions, StrategyChain, DEFAULT_TRIGGER_EVENTS,
};
use serde_json::{json, Map, Value};

use crate::params::QueryParams;

const OVERLAY_PORTRAIT: (f64, f64) = (56.0, 88.0);
const OVERLAY_LANDSCAPE: (f64, f64) = (48.0, 72.0);
const MOBILE_TOKENS: [&str; 5] = ["iphone", "ipad", "ios", "android", "mobile"];
const DESKTOP_TOKENS: [&str; 3] = ["desktop", "web", "tablet"];

const PROBED_CAPABILITIES: [(Capability, &[&str]); 8] = [
    (Capability::Haptics, &["VKWebAppTapticImpactOccurred"]),
    (Capability::QrScanner, &["VKWebAppOpenCodeReader"]),
    (
        Capability::RequestPhone,
        &["VKWebAppGetPhoneNumber", "VKWebAppGetPersonalCard"],
    ),
    (Capability::Notifications, &["VKWebAppAllowNotifications"]),
    (Capability::ShareStory, &["VKWebAppShowStoryBox"]),
    (Capability::HomeScreen, &["VKWebAppAddToHomeScreen"]),
    (Capability::DownloadFile, &["VKWebAppDownloadFile"]),
    (Capability::CloseApp, &["VKWebAppClose"]),
];

/// Normalizes VK `appearance` / `scheme` values.
///
/// An explicit `dark` / `light` appearance wins. Otherwise any scheme containing `dark` or
/// `space_gray` is dark and every other non-empty scheme is light.
pub fn normalize_appearance(appearance: Option<&str>, scheme: Option<&str>) -> Option<Appearance> {
    if let Some(appearance) = appearance.and_then(Appearance::parse) {
        return Some(appearance);
    }
    let scheme = scheme.map(str::to_lowercase).filter(|scheme| !scheme.is_empty())?;
    let dark = scheme.contains("dark") || scheme.contains("space_gray");
    Some(Appearance::from_is_dark(dark))
}

/// Status bar style readable on top of `color` (a `#rgb` or `#rrggbb` hex colour).
///
/// Relative luminance above 0.6 needs dark icons; anything else, including unparsable input,
/// gets light icons.
pub fn status_bar_style(color: &str) -> &'static str {
    let hex = color.trim().trim_start_matches('#');
    let expanded: String = if hex.chars().count() == 3 {
        hex.chars().flat_map(|symbol| [symbol, symbol]).collect()
    } else {
        hex.chars().take(6).collect()
    };
    let channel = |range: std::ops::Range<usize>| {
        expanded
            .get(range)
            .and_then(|raw| u8::from_str_radix(raw, 16).ok())
            .map(|value| f64::from(value) / 255.0)
    };
    let luminance = match (channel(0..2), channel(2..4), channel(4..6)) {
        (Some(r), Some(g), Some(b)) => 0.2126 * r + 0.7152 * g + 0.0722 * b,
        _ => return "light",
    };
    if luminance > 0.6 {
        "dark"
    } else {
        "light"
    }
}

/// Insets pushed in a VK config payload.
///
/// Missing or non-numeric edges count as zero and an all-zero inset is treated as absent.
pub fn config_insets(config: &Value) -> Option<Insets> {
    let raw = config.get("insets")?;
    let partial = PartialInsets::from_json(raw)?;
    let insets = Insets::normalized(&partial);
    (!insets.is_zero()).then_some(insets)
}

/// Guesses whether the launch parameters describe a phone-sized VK client.
///
/// Layer launches never are; otherwise the platform or device must look mobile and neither may
/// look like a desktop, web or tablet client.
pub fn is_likely_mobile(platform: &str, device: &str, is_layer: bool) -> bool {
    if is_layer {
        return false;
    }
    let platform = platform.to_lowercase();
    let device = device.to_lowercase();
    let matches = |tokens: &[&str]| {
        tokens
            .iter()
            .any(|token| platform.contains(token) || device.contains(token))
    };
    matches(&MOBILE_TOKENS) && !matches(&DESKTOP_TOKENS)
}

/// Floor insets covering the VK overlay controls.
///
/// Applies only when the viewport is at most `breakpoint_px` wide; landscape uses a shorter
/// and narrower reservation.
pub fn overlay_insets(
    viewport_width: f64,
    breakpoint_px: f64,
    landscape: bool,
) -> Option<PartialInsets> {
    if !(viewport_width > 0.0) || viewport_width > breakpoint_px {
        return None;
    }
    let (top, right) = if landscape {
        OVERLAY_LANDSCAPE
    } else {
        OVERLAY_PORTRAIT
    };
    Some(PartialInsets {
        top: Some(top),
        right: Some(right),
        bottom: None,
        left: None,
    })
}

struct VkInner {
    core: AdapterCore,
    bridge: Rc<dyn PlatformBridge>,
    launch_params: RefCell<Option<Value>>,
    query_params: RefCell<QueryParams>,
    config_safe_area: Cell<Option<Insets>>,
}

impl VkInner {
    async fn supported(&self, method: &str) -> bool {
        is_bridge_method_supported(Some(self.bridge.as_ref()), method).await
    }

    async fn send(&self, method: &str, params: Value) -> Result<Value, AdapterError> {
        self.bridge.call(method, params).await
    }

    fn resolve_launch_param(&self, key: &str) -> Option<String> {
        if let Some(value) = self.query_params.borrow().get_non_empty(key) {
            return Some(value.to_string());
        }
        match self.launch_params.borrow().as_ref()?.get(key)? {
            Value::String(value) if !value.is_empty() => Some(value.clone()),
            Value::Number(value) => Some(value.to_string()),
            Value::Bool(value) => Some(if *value { "1" } else { "0" }.to_string()),
            _ => None,
        }
    }

    fn overlay_floor(&self) -> Option<PartialInsets> {
        if !self.bridge.is_web_view().unwrap_or(false) {
            return None;
        }
        let mobile = is_likely_mobile(
            &self.resolve_launch_param("vk_platform").unwrap_or_default(),
            &self.resolve_launch_param("vk_viewer_device").unwrap_or_default(),
            self.resolve_launch_param("vk_is_layer").as_deref() == Some("1"),
        );
        if !mobile {
            return None;
        }
        let browser = self.core.browser();
        overlay_insets(
            browser.viewport_width(),
            self.core.config().overlay_breakpoint_px,
            browser.matches_media("(orientation: landscape)"),
        )
    }

    fn combined_safe_area(&self) -> Insets {
        compute_combined_safe_area(&SafeAreaSources {
            environment: self.config_safe_area.get().map(Into::into),
            css: self.core.browser().css_safe_area().map(Into::into),
            minimum: self.overlay_floor(),
            ..SafeAreaSources::default()
        })
    }

    fn apply_appearance(&self, appearance: Option<Appearance>, scheme: Option<&str>) {
        let browser = self.core.browser();
        if let Some(appearance) = appearance {
            browser.set_root_data("vk-appearance", appearance.as_str());
            browser.toggle_root_class("dark", appearance == Appearance::Dark);
        }
        if let Some(scheme) = scheme.filter(|scheme| !scheme.is_empty()) {
            browser.set_root_data("vk-scheme", scheme);
            if appearance.is_none() {
                let dark = normalize_appearance(None, Some(scheme)) == Some(Appearance::Dark);
                browser.toggle_root_class("dark", dark);
            }
        }
    }

    fn handle_event(&self, event: &BridgeEvent) {
        match event.name.as_str() {
            "VKWebAppViewHide" => self.core.notify_view_hide(),
            "VKWebAppViewRestore" => self.core.notify_view_restore(),
            "VKWebAppUpdateConfig" if !event.data.is_null() => self.apply_config(&event.data),
            _ => {}
        }
    }

    fn apply_config(&self, config: &Value) {
        let scheme = config.get("scheme").and_then(Value::as_str);
        let next_appearance =
            normalize_appearance(config.get("appearance").and_then(Value::as_str), scheme);
        let mut changed = match next_appearance {
            Some(appearance) => self.core.set_appearance(Some(appearance)),
            None => false,
        };

        self.config_safe_area.set(config_insets(config));
        let combined = self.combined_safe_area();
        changed |= self.core.update_environment(|environment| {
            let moved = environment
                .safe_area
                .map_or(true, |previous| !previous.same_edges(&combined));
            if moved {
                environment.safe_area = Some(combined);
            }
            moved
        });

        self.apply_appearance(self.core.environment().appearance, scheme);
        if changed {
            self.core.notify_environment_changed();
        }
    }

    fn compose_environment(&self, config: Option<&Value>) -> EnvironmentInfo {
        let query = self.query_params.borrow();
        let launch = self.launch_params.borrow();
        let launch_field = |key: &str| launch.as_ref().and_then(|params| params.get(key));
        let text = |key: &str| {
            query
                .get_non_empty(key)
                .map(str::to_string)
                .or_else(|| launch_field(key).and_then(Value::as_str).map(str::to_string))
        };
        let app_id = query
            .get_non_empty("vk_app_id")
            .and_then(|raw| raw.parse::<u64>().ok())
            .or_else(|| launch_field("vk_app_id").and_then(Value::as_u64));

        let browser = self.core.browser();
        let appearance = normalize_appearance(
            config.and_then(|config| config.get("appearance")).and_then(Value::as_str),
            config.and_then(|config| config.get("scheme")).and_then(Value::as_str),
        )
        .unwrap_or_else(|| {
            Appearance::from_is_dark(browser.matches_media("(prefers-color-scheme: dark)"))
        });

        EnvironmentInfo {
            sdk_version: text("vk_platform"),
            app_version: app_id.map(|id| format!("vk-app-{id}")),
            language_code: text("vk_language"),
            appearance: Some(appearance),
            is_web_view: self.bridge.is_web_view(),
            safe_area: config.and_then(config_insets),
            ..EnvironmentInfo::new(Platform::Vk)
        }
    }

    async fn probe_capabilities(&self) {
        for (capability, methods) in PROBED_CAPABILITIES {
            let mut present = false;
            for method in methods {
                if self.supported(method).await {
                    present = true;
                    break;
                }
            }
            self.core
                .set_capability(capability, CapabilityStatus::from_presence(present));
        }
    }
}

/// Adapter for VK Mini Apps.
pub struct VkAdapter {
    inner: Rc<VkInner>,
}

impl VkAdapter {
    /// Adapter over `bridge` (normally the `vkBridge` glue).
    pub fn new(bridge: Rc<dyn PlatformBridge>, deps: AdapterDeps) -> Self {
        Self {
            inner: Rc::new(VkInner {
                core: AdapterCore::new(
                    EnvironmentInfo::new(Platform::Vk),
                    PlatformCapabilities::none(),
                    deps,
                ),
                bridge,
                launch_params: RefCell::new(None),
                query_params: RefCell::new(QueryParams::default()),
                config_safe_area: Cell::new(None),
            }),
        }
    }

    fn pixel_code(&self) -> Option<String> {
        self.inner
            .core
            .config()
            .pixel_code()
            .map(str::to_string)
            .or_else(|| miniapp_host::miniapp_context().vk_pixel_code())
    }

    async fn handshake(&self) -> Result<(Option<Value>, Value), AdapterError> {
        let inner = &self.inner;
        let config = match inner.send("VKWebAppGetConfig", Value::Null).await {
            Ok(config) => Some(config).filter(|config| !config.is_null()),
            Err(err) => {
                tracing::warn!("[miniapp-host] VKWebAppGetConfig failed: {err}");
                None
            }
        };

        let init = inner
            .send("VKWebAppInit", Value::Null)
            .await
            .map_err(|err| AdapterError::Init(err.to_string()))?;
        if init.get("result").and_then(Value::as_bool) == Some(false) {
            tracing::warn!("[miniapp-host] VKWebAppInit returned result=false");
        }

        let launch_params = inner
            .send("VKWebAppGetLaunchParams", Value::Null)
            .await
            .map_err(|err| AdapterError::Init(err.to_string()))?;
        Ok((config, launch_params))
    }

    fn send_detached(&self, method: &'static str, params: Value) -> AdapterFuture<'_, ()> {
        Box::pin(async move {
            if !self.inner.supported(method).await {
                return;
            }
            if let Err(err) = self.inner.send(method, params).await {
                tracing::warn!("[miniapp-host] {method} failed: {err}");
            }
        })
    }
}

impl MiniAppAdapter for VkAdapter {
    fn core(&self) -> &AdapterCore {
        &self.inner.core
    }

    fn init(&self, options: InitOptions) -> AdapterFuture<'_, Result<(), AdapterError>> {
        Box::pin(async move {
            let inner = &self.inner;
            if inner.core.is_ready() {
                return Ok(());
            }
            miniapp_host::log_ignored_init_options(Platform::Vk, options);

            let weak: Weak<VkInner> = Rc::downgrade(inner);
            let subscription = inner.bridge.subscribe(Rc::new(move |event: &BridgeEvent| {
                if let Some(inner) = weak.upgrade() {
                    inner.handle_event(event);
                }
            }));

            let (config, launch_params) = match self.handshake().await {
                Ok(handshake) => handshake,
                Err(err) => {
                    tracing::error!("[miniapp-host] VK init failed: {err}");
                    if let Some(subscription) = subscription {
                        subscription.dispose();
                    }
                    return Err(err);
                }
            };
            if let Some(subscription) = subscription {
                inner.core.register(subscription);
            }

            inner.launch_params.replace(Some(launch_params));
            inner
                .query_params
                .replace(QueryParams::parse(&inner.core.browser().location_search()));

            let environment = inner.compose_environment(config.as_ref());
            inner.config_safe_area.set(environment.safe_area);
            let appearance = environment.appearance;
            inner.core.update_environment(|current| *current = environment);
            let combined = inner.combined_safe_area();
            inner
                .core
                .update_environment(|environment| environment.safe_area = Some(combined));
            inner.apply_appearance(
                appearance,
                config
                    .as_ref()
                    .and_then(|config| config.get("scheme"))
                    .and_then(Value::as_str),
            );
            inner.core.notify_environment_changed();

            inner.probe_capabilities().await;
            inner.core.set_ready(true);

            let weak = Rc::downgrade(inner);
            let on_change_target = weak.clone();
            let watcher = create_safe_area_watcher(
                inner.core.browser().events(),
                move || weak.upgrade().map(|inner| inner.combined_safe_area()),
                move |next| {
                    let Some(inner) = on_change_target.upgrade() else {
                        return;
                    };
                    let moved = inner.core.update_environment(|environment| {
                        let moved = environment
                            .safe_area
                            .map_or(true, |previous| !previous.same_edges(&next));
                        if moved {
                            environment.safe_area = Some(next);
                        }
                        moved
                    });
                    if moved {
                        inner.core.notify_environment_changed();
                    }
                },
                &DEFAULT_TRIGGER_EVENTS,
            );
            if let Some(watcher) = watcher {
                inner.core.register(watcher);
            }
            Ok(())
        })
    }

    fn set_colors(&self, colors: ColorScheme) -> AdapterFuture<'_, ()> {
        Box::pin(async move {
            let inner = &self.inner;
            if (colors.header.is_some() || colors.background.is_some())
                && inner.supported("VKWebAppSetViewSettings").await
            {
                let style = match colors.header.as_deref() {
                    Some(header) => status_bar_style(header),
                    None if inner.core.environment().appearance == Some(Appearance::Dark) => {
                        "light"
                    }
                    None => "dark",
                };
                let mut params = Map::new();
                params.insert("status_bar_style".to_string(), json!(style));
                if let Some(header) = &colors.header {
                    params.insert("action_bar_color".to_string(), json!(header));
                }
                if let Some(background) = &colors.background {
                    params.insert("navigation_bar_color".to_string(), json!(background));
                }
                if let Err(err) = inner
                    .send("VKWebAppSetViewSettings", Value::Object(params))
                    .await
                {
                    tracing::warn!("[miniapp-host] VKWebAppSetViewSettings failed: {err}");
                }
            }
            default_set_colors(&inner.core, &colors);
        })
    }

    fn close_app(&self) -> AdapterFuture<'_, ()> {
        Box::pin(async move {
            let inner = &self.inner;
            if inner.supported("VKWebAppClose").await {
                match inner
                    .send("VKWebAppClose", json!({ "status": "success" }))
                    .await
                {
                    Ok(_) => return,
                    Err(err) => tracing::warn!("[miniapp-host] VKWebAppClose failed: {err}"),
                }
            }
            miniapp_host::default_close_app(&inner.core);
        })
    }

    fn vibrate_impact(&self, style: HapticImpactStyle) -> AdapterFuture<'_, ()> {
        self.send_detached(
            "VKWebAppTapticImpactOccurred",
            json!({ "style": style.as_str() }),
        )
    }

    fn vibrate_notification(&self, kind: HapticNotificationType) -> AdapterFuture<'_, ()> {
        self.send_detached(
            "VKWebAppTapticNotificationOccurred",
            json!({ "type": kind.as_str() }),
        )
    }

    fn vibrate_selection(&self) -> AdapterFuture<'_, ()> {
        self.send_detached("VKWebAppTapticSelectionChanged", Value::Null)
    }

    fn scan_qr_code(&self, _options: QrScanOptions) -> AdapterFuture<'_, Option<String>> {
        Box::pin(async move {
            let inner = &self.inner;
            if !inner.supported("VKWebAppOpenCodeReader").await {
                return None;
            }
            match inner.send("VKWebAppOpenCodeReader", Value::Null).await {
                Ok(data) => data
                    .get("code_data")
                    .and_then(Value::as_str)
                    .filter(|code| !code.is_empty())
                    .map(str::to_string),
                Err(err) => {
                    tracing::warn!("[miniapp-host] VKWebAppOpenCodeReader failed: {err}");
                    None
                }
            }
        })
    }

    fn request_phone(&self) -> AdapterFuture<'_, Option<String>> {
        Box::pin(async move {
            let inner = &self.inner;
            let phone_number = inner.supported("VKWebAppGetPhoneNumber").await;
            let personal_card = inner.supported("VKWebAppGetPersonalCard").await;
            let result = if phone_number {
                inner
                    .send("VKWebAppGetPhoneNumber", Value::Null)
                    .await
                    .map(|result| result.get("phone_number").cloned())
            } else if personal_card {
                inner
                    .send("VKWebAppGetPersonalCard", json!({ "type": ["phone"] }))
                    .await
                    .map(|card| card.get("phone").cloned())
            } else {
                return None;
            };
            match result {
                Ok(phone) => phone
                    .as_ref()
                    .and_then(Value::as_str)
                    .filter(|phone| !phone.is_empty())
                    .map(str::to_string),
                Err(err) => {
                    tracing::warn!("[miniapp-host] VK requestPhone failed: {err}");
                    None
                }
            }
        })
    }

    fn share_url<'a>(&'a self, url: &'a str, text: Option<&'a str>) -> AdapterFuture<'a, ()> {
        Box::pin(async move {
            let inner = &self.inner;
            if inner.supported("VKWebAppShare").await {
                match inner.send("VKWebAppShare", json!({ "link": url })).await {
                    Ok(_) => return,
                    Err(err) => tracing::warn!("[miniapp-host] VKWebAppShare failed: {err}"),
                }
            }
            default_share_url(&inner.core, url, text).await;
        })
    }

    fn copy_text<'a>(&'a self, text: &'a str) -> AdapterFuture<'a, Result<(), AdapterError>> {
        Box::pin(async move {
            let inner = &self.inner;
            let outcome = StrategyChain::new("copy_text")
                .step("VKWebAppCopyText", || async move {
                    if !inner.supported("VKWebAppCopyText").await {
                        return Attempt::Unsupported;
                    }
                    Attempt::from_result(
                        inner
                            .send("VKWebAppCopyText", json!({ "text": text }))
                            .await
                            .map(|_| ()),
                    )
                })
                .step("clipboard", || async move {
                    Attempt::from_result(default_copy_text(&inner.core, text).await)
                })
                .run()
                .await;
            if outcome.value.is_some() {
                return Ok(());
            }
            Err(outcome
                .failures
                .into_iter()
                .last()
                .map_or_else(|| AdapterError::Unavailable("clipboard".to_string()), |(_, err)| err))
        })
    }

    fn download_file<'a>(
        &'a self,
        url: &'a str,
        file_name: Option<&'a str>,
    ) -> AdapterFuture<'a, Result<(), AdapterError>> {
        Box::pin(async move {
            let inner = &self.inner;
            let name = miniapp_host::fallback_file_name(url, file_name);
            let outcome = StrategyChain::new("download_file")
                .step("VKWebAppDownloadFile", || async move {
                    if !inner.supported("VKWebAppDownloadFile").await {
                        return Attempt::Unsupported;
                    }
                    Attempt::from_result(
                        inner
                            .send(
                                "VKWebAppDownloadFile",
                                json!({ "url": url, "filename": name }),
                            )
                            .await
                            .map(|_| ()),
                    )
                })
                .step("browser", || async move {
                    Attempt::from_result(
                        default_download_file(
                            &inner.core,
                            url,
                            file_name,
                            DownloadOptions {
                                prefer_blob: false,
                                revoke_after_ms: inner.core.config().blob_url_revoke_ms,
                            },
                        )
                        .await,
                    )
                })
                .run()
                .await;
            match outcome.failures.into_iter().last() {
                Some((_, err)) if outcome.value.is_none() => Err(err),
                _ => Ok(()),
            }
        })
    }

    fn share_story<'a>(
        &'a self,
        media_url: &'a str,
        options: ShareStoryOptions,
    ) -> AdapterFuture<'a, Result<(), AdapterError>> {
        Box::pin(async move {
            let inner = &self.inner;
            if !inner.supported("VKWebAppShowStoryBox").await {
                return Err(AdapterError::Unsupported {
                    capability: Capability::ShareStory,
                });
            }
            let mut params = Map::new();
            params.insert("background_type".to_string(), json!("image"));
            params.insert("url".to_string(), json!(media_url));
            if let Some(link) = &options.widget_link {
                params.insert(
                    "attachment".to_string(),
                    json!({
                        "type": "url",
                        "url": link.url,
                        "text": link.name.as_deref().unwrap_or("open"),
                    }),
                );
            }
            inner
                .send("VKWebAppShowStoryBox", Value::Object(params))
                .await
                .map(|_| ())
        })
    }

    fn request_notifications_permission(&self) -> AdapterFuture<'_, bool> {
        Box::pin(async move {
            let inner = &self.inner;
            if !inner.supported("VKWebAppAllowNotifications").await {
                return false;
            }
            match inner.send("VKWebAppAllowNotifications", Value::Null).await {
                Ok(response) => response
                    .get("result")
                    .map_or(true, |result| result.as_bool().unwrap_or(!result.is_null())),
                Err(err) => {
                    tracing::warn!("[miniapp-host] VK allow notifications failed: {err}");
                    false
                }
            }
        })
    }

    fn add_to_home_screen(&self) -> AdapterFuture<'_, bool> {
        Box::pin(async move {
            let inner = &self.inner;
            if !inner.supported("VKWebAppAddToHomeScreen").await {
                return false;
            }
            match inner.send("VKWebAppAddToHomeScreen", Value::Null).await {
                Ok(response) => response
                    .get("result")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
                Err(err) => {
                    tracing::warn!("[miniapp-host] VKWebAppAddToHomeScreen failed: {err}");
                    false
                }
            }
        })
    }

    fn check_home_screen_status(&self) -> AdapterFuture<'_, HomeScreenStatus> {
        Box::pin(async move {
            let inner = &self.inner;
            if !inner.supported("VKWebAppAddToHomeScreenInfo").await {
                return HomeScreenStatus::Unknown;
            }
            match inner.send("VKWebAppAddToHomeScreenInfo", Value::Null).await {
                Ok(info) => match info.get("is_added_to_home_screen").and_then(Value::as_bool) {
                    Some(true) => HomeScreenStatus::Added,
                    Some(false) => HomeScreenStatus::NotAdded,
                    None => HomeScreenStatus::Unknown,
                },
                Err(err) => {
                    tracing::warn!("[miniapp-host] VKWebAppAddToHomeScreenInfo failed: {err}");
                    HomeScreenStatus::Unknown
                }
            }
        })
    }

    fn track_conversion_event<'a>(
        &'a self,
        event: &'a str,
        payload: Option<&'a Value>,
    ) -> AdapterFuture<'a, ()> {
        Box::pin(async move {
            let Some(pixel_code) = self.pixel_code() else {
                tracing::debug!("[miniapp-host] conversion `{event}` skipped: no pixel code");
                return;
            };
            let params = tracking_params(
                payload,
                [("pixel_code", pixel_code), ("conversion_event", event.to_string())],
            );
            self.send_detached("VKWebAppConversionHit", params).await;
        })
    }

    fn track_pixel_event<'a>(
        &'a self,
        event: &'a str,
        payload: Option<&'a Value>,
    ) -> AdapterFuture<'a, ()> {
        Box::pin(async move {
            let Some(pixel_code) = self.pixel_code() else {
                tracing::debug!("[miniapp-host] pixel event `{event}` skipped: no pixel code");
                return;
            };
            let params = tracking_params(
                payload,
                [("pixel_code", pixel_code), ("event", event.to_string())],
            );
            self.send_detached("VKWebAppRetargetingPixel", params).await;
        })
    }

    fn launch_params(&self) -> Option<Value> {
        let launch = self.inner.launch_params.borrow().clone()?;
        let query: Map<String, Value> = self
            .inner
            .query_params
            .borrow()
            .iter()
            .filter(|(key, _)| key.starts_with("vk_") || *key == "sign")
            .map(|(key, value)| (key.to_string(), json!(value)))
            .collect();
        Some(json!({ "launchParams": launch, "queryParams": query }))
    }

    fn compute_safe_area(&self) -> Insets {
        self.inner.combined_safe_area()
    }
}

fn tracking_params<const N: usize>(payload: Option<&Value>, fixed: [(&str, String); N]) -> Value {
    let mut params = payload
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    for (key, value) in fixed {
        params.insert(key.to_string(), Value::String(value));
    }
    Value::Object(params)
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use miniapp_host::{MemoryBridge, MemoryBrowserHost, NoopScheduler};
    use pretty_assertions::assert_eq;

    use super::*;

    fn launch() -> Value {
        json!({
            "vk_app_id": 51234,
            "vk_platform": "mobile_android",
            "vk_language": "ru",
            "vk_is_layer": false,
        })
    }

    fn handshake_bridge() -> MemoryBridge {
        let bridge = MemoryBridge::new("vk")
            .with_probe(&[
                "VKWebAppTapticImpactOccurred",
                "VKWebAppGetPersonalCard",
                "VKWebAppSetViewSettings",
                "VKWebAppConversionHit",
            ])
            .with_web_view(true);
        bridge.respond(
            "VKWebAppGetConfig",
            Ok(json!({"appearance": "dark", "insets": {"top": 24, "bottom": 16}})),
        );
        bridge.respond("VKWebAppInit", Ok(json!({"result": true})));
        bridge
    }

    fn vk_bridge() -> MemoryBridge {
        let bridge = handshake_bridge();
        bridge.respond("VKWebAppGetLaunchParams", Ok(launch()));
        bridge
    }

    fn adapter(bridge: &MemoryBridge, browser: &MemoryBrowserHost) -> VkAdapter {
        VkAdapter::new(
            Rc::new(bridge.clone()),
            AdapterDeps::new(
                Rc::new(browser.clone()),
                Rc::new(NoopScheduler),
                miniapp_host::AdapterConfig {
                    vk_pixel_code: Some("VK-RTRG-42".to_string()),
                    ..miniapp_host::AdapterConfig::default()
                },
            ),
        )
    }

    #[test]
    fn appearance_prefers_explicit_value_then_scheme() {
        assert_eq!(
            normalize_appearance(Some("Dark"), Some("bright_light")),
            Some(Appearance::Dark)
        );
        assert_eq!(normalize_appearance(None, Some("space_gray")), Some(Appearance::Dark));
        assert_eq!(
            normalize_appearance(Some("auto"), Some("bright_light")),
            Some(Appearance::Light)
        );
        assert_eq!(normalize_appearance(None, None), None);
    }

    #[test]
    fn status_bar_contrasts_with_header_luminance() {
        assert_eq!(status_bar_style("#ffffff"), "dark");
        assert_eq!(status_bar_style("#fff"), "dark");
        assert_eq!(status_bar_style("#19191a"), "light");
        assert_eq!(status_bar_style("not-a-colour"), "light");
    }

    #[test]
    fn overlay_applies_to_narrow_mobile_webviews() {
        assert!(is_likely_mobile("mobile_iphone", "", false));
        assert!(!is_likely_mobile("mobile_web", "", false));
        assert!(!is_likely_mobile("mobile_android", "", true));
        assert!(!is_likely_mobile("desktop_web", "", false));

        assert_eq!(
            overlay_insets(390.0, 880.0, false),
            Some(PartialInsets {
                top: Some(56.0),
                right: Some(88.0),
                bottom: None,
                left: None
            })
        );
        assert_eq!(overlay_insets(800.0, 880.0, true).and_then(|i| i.right), Some(72.0));
        assert_eq!(overlay_insets(1024.0, 880.0, false), None);
        assert_eq!(overlay_insets(0.0, 880.0, false), None);
    }

    #[test]
    fn zero_config_insets_are_absent() {
        assert_eq!(config_insets(&json!({"insets": {"top": 0}})), None);
        assert_eq!(
            config_insets(&json!({"insets": {"top": "12", "left": 4}})),
            Some(Insets::new(12.0, 0.0, 0.0, 4.0))
        );
    }

    #[test]
    fn init_composes_environment_and_overlay_floor() {
        let bridge = vk_bridge();
        let browser = MemoryBrowserHost::new();
        let adapter = adapter(&bridge, &browser);

        block_on(adapter.init(InitOptions::default())).expect("init");

        let environment = adapter.environment();
        assert_eq!(environment.sdk_version.as_deref(), Some("mobile_android"));
        assert_eq!(environment.app_version.as_deref(), Some("vk-app-51234"));
        assert_eq!(environment.language_code.as_deref(), Some("ru"));
        assert_eq!(environment.appearance, Some(Appearance::Dark));
        assert_eq!(environment.safe_area, Some(Insets::new(56.0, 88.0, 16.0, 0.0)));
        assert!(adapter.supports(Capability::Haptics));
        assert!(adapter.supports(Capability::RequestPhone));
        assert!(!adapter.supports(Capability::QrScanner));
        assert!(browser.state().root_classes.contains("dark"));
        assert_eq!(
            browser.state().root_data.get("vk-appearance").map(String::as_str),
            Some("dark")
        );
    }

    #[test]
    fn failed_init_handshake_unsubscribes() {
        let bridge = handshake_bridge();
        bridge.respond(
            "VKWebAppGetLaunchParams",
            Err(AdapterError::bridge("VKWebAppGetLaunchParams", "denied")),
        );
        let adapter = adapter(&bridge, &MemoryBrowserHost::new());

        let result = block_on(adapter.init(InitOptions::default()));

        assert!(matches!(result, Err(AdapterError::Init(_))));
        assert_eq!(bridge.subscriber_count(), 0);
        assert!(!adapter.is_ready());
    }

    #[test]
    fn bridge_events_drive_visibility_and_config() {
        let bridge = vk_bridge();
        let browser = MemoryBrowserHost::new();
        let adapter = adapter(&bridge, &browser);
        block_on(adapter.init(InitOptions::default())).expect("init");
        let hidden = Rc::new(Cell::new(0));
        let counter = hidden.clone();
        adapter.on_view_hide(Rc::new(move || counter.set(counter.get() + 1)));
        let notified = Rc::new(Cell::new(0));
        let environment_counter = notified.clone();
        adapter.subscribe(Rc::new(move |_: &EnvironmentInfo| {
            environment_counter.set(environment_counter.get() + 1)
        }));

        bridge.emit("VKWebAppViewHide", Value::Null);
        bridge.emit(
            "VKWebAppUpdateConfig",
            json!({"scheme": "bright_light", "insets": {"bottom": 20}}),
        );

        assert_eq!(hidden.get(), 1);
        assert_eq!(notified.get(), 1);
        assert_eq!(adapter.environment().appearance, Some(Appearance::Light));
        assert_eq!(
            adapter.environment().safe_area,
            Some(Insets::new(56.0, 88.0, 20.0, 0.0))
        );
        assert!(!browser.state().root_classes.contains("dark"));

        adapter.destroy();
        assert_eq!(bridge.subscriber_count(), 0);
    }

    #[test]
    fn phone_falls_back_to_personal_card() {
        let bridge = vk_bridge();
        bridge.respond("VKWebAppGetPersonalCard", Ok(json!({"phone": "+79990001122"})));
        let adapter = adapter(&bridge, &MemoryBrowserHost::new());

        let phone = block_on(adapter.request_phone());

        assert_eq!(phone.as_deref(), Some("+79990001122"));
        assert_eq!(
            bridge.calls_to("VKWebAppGetPersonalCard"),
            vec![json!({"type": ["phone"]})]
        );
    }

    #[test]
    fn view_settings_follow_header_luminance() {
        let bridge = vk_bridge();
        let browser = MemoryBrowserHost::new();
        let adapter = adapter(&bridge, &browser);

        block_on(adapter.set_colors(ColorScheme {
            header: Some("#ffffff".to_string()),
            background: Some("#000000".to_string()),
            footer: None,
        }));

        assert_eq!(
            bridge.calls_to("VKWebAppSetViewSettings"),
            vec![json!({
                "status_bar_style": "dark",
                "action_bar_color": "#ffffff",
                "navigation_bar_color": "#000000",
            })]
        );
        assert_eq!(browser.state().theme_color.as_deref(), Some("#ffffff"));
    }

    #[test]
    fn conversion_hit_carries_pixel_code_and_payload() {
        let bridge = vk_bridge();
        let adapter = adapter(&bridge, &MemoryBrowserHost::new());

        block_on(adapter.track_conversion_event("purchase", Some(&json!({"value": 10}))));
        block_on(adapter.track_pixel_event("view", None));

        assert_eq!(
            bridge.calls_to("VKWebAppConversionHit"),
            vec![json!({"pixel_code": "VK-RTRG-42", "conversion_event": "purchase", "value": 10})]
        );
        assert!(bridge.calls_to("VKWebAppRetargetingPixel").is_empty());
    }

    #[test]
    fn copy_falls_back_to_clipboard_without_native_support() {
        let bridge = vk_bridge();
        let browser = MemoryBrowserHost::new();
        let adapter = adapter(&bridge, &browser);

        block_on(adapter.copy_text("promo-2024")).expect("copy");

        assert_eq!(browser.state().clipboard.as_deref(), Some("promo-2024"));
        assert!(bridge.calls_to("VKWebAppCopyText").is_empty());
    }
}
