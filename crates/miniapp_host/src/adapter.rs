//! Cross-platform adapter contract and the state every adapter shares.
//!
//! [`MiniAppAdapter`] ships portable defaults for every operation, built on a [`BrowserHost`].
//! Platform adapters override the operations their host implements natively and call back into
//! the defaults (the `default_*` free functions) when a native primitive is missing or fails.

use std::{
    cell::{Cell, RefCell},
    fmt,
    future::Future,
    pin::Pin,
    rc::Rc,
};

use serde_json::Value;

use crate::{
    browser::{BrowserHost, NoopBrowserHost, SharePayload},
    capability::{Capability, CapabilityStatus, PlatformCapabilities},
    config::AdapterConfig,
    disposables::{Disposable, DisposableBag, Disposer},
    download::{trigger_file_download, DownloadOptions},
    environment::{Appearance, EnvironmentInfo, InitOptions, Platform},
    error::AdapterError,
    insets::{Insets, ViewportInsets},
    listeners::ListenerSet,
    safe_area::{compute_combined_safe_area, SafeAreaSources},
    scheduler::{NoopScheduler, Scheduler},
    ui::{
        ColorScheme, HapticImpactStyle, HapticNotificationType, HomeScreenStatus, PopupOptions,
        QrScanOptions, ShareStoryOptions,
    },
};

/// Object-safe boxed future used by [`MiniAppAdapter`] async methods.
pub type AdapterFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Payload-free callback (back button, view hide/restore).
pub type Callback = Rc<dyn Fn()>;

/// Services injected into every adapter.
#[derive(Clone)]
pub struct AdapterDeps {
    /// Browser fallbacks.
    pub browser: Rc<dyn BrowserHost>,
    /// Timer service.
    pub scheduler: Rc<dyn Scheduler>,
    /// Tunables.
    pub config: AdapterConfig,
}

impl AdapterDeps {
    /// Bundles the three services.
    pub fn new(
        browser: Rc<dyn BrowserHost>,
        scheduler: Rc<dyn Scheduler>,
        config: AdapterConfig,
    ) -> Self {
        Self {
            browser,
            scheduler,
            config,
        }
    }
}

impl Default for AdapterDeps {
    fn default() -> Self {
        Self::new(
            Rc::new(NoopBrowserHost),
            Rc::new(NoopScheduler),
            AdapterConfig::default(),
        )
    }
}

impl fmt::Debug for AdapterDeps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterDeps")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// State owned by one adapter instance: environment snapshot, readiness, capability table,
/// disposables and listener sets.
pub struct AdapterCore {
    environment: RefCell<EnvironmentInfo>,
    ready: Cell<bool>,
    capabilities: RefCell<PlatformCapabilities>,
    disposables: DisposableBag,
    environment_listeners: ListenerSet<EnvironmentInfo>,
    appearance_listeners: ListenerSet<Option<Appearance>>,
    view_hide_listeners: ListenerSet<()>,
    view_restore_listeners: ListenerSet<()>,
    deps: AdapterDeps,
}

impl AdapterCore {
    /// Core for `environment` with an initial capability table.
    pub fn new(
        environment: EnvironmentInfo,
        capabilities: PlatformCapabilities,
        deps: AdapterDeps,
    ) -> Self {
        Self {
            environment: RefCell::new(environment),
            ready: Cell::new(false),
            capabilities: RefCell::new(capabilities),
            disposables: DisposableBag::new(),
            environment_listeners: ListenerSet::new("environment"),
            appearance_listeners: ListenerSet::new("appearance"),
            view_hide_listeners: ListenerSet::new("onViewHide"),
            view_restore_listeners: ListenerSet::new("onViewRestore"),
            deps,
        }
    }

    /// Clone of the environment snapshot.
    pub fn environment(&self) -> EnvironmentInfo {
        self.environment.borrow().clone()
    }

    /// Mutates the environment in place without notifying anyone.
    pub fn update_environment<R>(&self, update: impl FnOnce(&mut EnvironmentInfo) -> R) -> R {
        update(&mut self.environment.borrow_mut())
    }

    /// Notifies environment subscribers with the current snapshot.
    pub fn notify_environment_changed(&self) {
        let snapshot = self.environment();
        self.environment_listeners.notify(&snapshot);
    }

    /// Stores `appearance` and notifies appearance listeners when it differs.
    ///
    /// Returns whether the value changed.
    pub fn set_appearance(&self, appearance: Option<Appearance>) -> bool {
        let changed = self.update_environment(|environment| {
            let changed = environment.appearance != appearance;
            environment.appearance = appearance;
            changed
        });
        if changed {
            self.appearance_listeners.notify(&appearance);
        }
        changed
    }

    /// Returns whether `init` completed.
    pub fn is_ready(&self) -> bool {
        self.ready.get()
    }

    /// Marks the adapter ready (or not).
    pub fn set_ready(&self, ready: bool) {
        self.ready.set(ready);
    }

    /// Status of one capability.
    pub fn capability(&self, capability: Capability) -> CapabilityStatus {
        self.capabilities.borrow().status(capability)
    }

    /// Clone of the capability table.
    pub fn capabilities(&self) -> PlatformCapabilities {
        self.capabilities.borrow().clone()
    }

    /// Updates one capability (used by adapters that can only probe asynchronously).
    pub fn set_capability(&self, capability: Capability, status: CapabilityStatus) {
        self.capabilities.borrow_mut().set(capability, status);
    }

    /// Registers a cleanup torn down by [`AdapterCore::teardown`].
    pub fn register(&self, disposable: impl Into<Disposable>) -> Disposer {
        self.disposables.add(disposable)
    }

    /// Number of pending cleanups.
    pub fn pending_disposables(&self) -> usize {
        self.disposables.len()
    }

    /// Environment subscriber set.
    pub fn environment_listeners(&self) -> &ListenerSet<EnvironmentInfo> {
        &self.environment_listeners
    }

    /// Appearance subscriber set.
    pub fn appearance_listeners(&self) -> &ListenerSet<Option<Appearance>> {
        &self.appearance_listeners
    }

    /// Fires view-hide listeners.
    pub fn notify_view_hide(&self) {
        self.view_hide_listeners.notify(&());
    }

    /// Fires view-restore listeners.
    pub fn notify_view_restore(&self) {
        self.view_restore_listeners.notify(&());
    }

    /// Browser fallbacks.
    pub fn browser(&self) -> &Rc<dyn BrowserHost> {
        &self.deps.browser
    }

    /// Timer service.
    pub fn scheduler(&self) -> &Rc<dyn Scheduler> {
        &self.deps.scheduler
    }

    /// Tunables.
    pub fn config(&self) -> &AdapterConfig {
        &self.deps.config
    }

    /// Flushes every disposable, clears every listener set and drops readiness.
    pub fn teardown(&self) {
        self.disposables.dispose_all();
        self.environment_listeners.clear();
        self.appearance_listeners.clear();
        self.view_hide_listeners.clear();
        self.view_restore_listeners.clear();
        self.ready.set(false);
    }
}

impl fmt::Debug for AdapterCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterCore")
            .field("environment", &*self.environment.borrow())
            .field("ready", &self.ready.get())
            .field("capabilities", &*self.capabilities.borrow())
            .field("disposables", &self.disposables)
            .finish()
    }
}

/// Uniform interface over every supported host platform.
///
/// Defaults implement the portable behaviour through the core's [`BrowserHost`]; overriding
/// adapters fall back to the `default_*` functions of this module.
pub trait MiniAppAdapter {
    /// Shared adapter state.
    fn core(&self) -> &AdapterCore;

    /// Platform this adapter targets.
    fn platform(&self) -> Platform {
        self.core().environment().platform
    }

    /// Capability lookup.
    fn supports(&self, capability: Capability) -> bool {
        self.core().capability(capability).is_available()
    }

    /// Initializes the host SDK. Safe to call repeatedly.
    fn init(&self, options: InitOptions) -> AdapterFuture<'_, Result<(), AdapterError>> {
        log_ignored_init_options(self.platform(), options);
        self.core().set_ready(true);
        Box::pin(async { Ok(()) })
    }

    /// Returns whether `init` completed.
    fn is_ready(&self) -> bool {
        self.core().is_ready()
    }

    /// Environment snapshot.
    fn environment(&self) -> EnvironmentInfo {
        self.core().environment()
    }

    /// Subscribes to environment changes.
    fn subscribe(&self, listener: Rc<dyn Fn(&EnvironmentInfo)>) -> Disposer {
        self.core().environment_listeners().subscribe(listener)
    }

    /// Applies header/background/footer colours.
    fn set_colors(&self, colors: ColorScheme) -> AdapterFuture<'_, ()> {
        Box::pin(async move { default_set_colors(self.core(), &colors) })
    }

    /// Registers a back-button handler.
    fn on_back_button(&self, callback: Callback) -> Disposer {
        default_on_back_button(self.core(), callback)
    }

    /// Shows or hides the native back button.
    fn set_back_button_visibility(&self, _visible: bool) {}

    /// Binds host theme variables to CSS custom properties.
    fn bind_css_variables(&self) -> Result<(), AdapterError> {
        Ok(())
    }

    /// Opens an external link.
    fn open_link<'a>(&'a self, url: &'a str) -> AdapterFuture<'a, ()> {
        Box::pin(async move { default_open_link(self.core(), url) })
    }

    /// Opens a platform-internal link.
    fn open_internal_link<'a>(&'a self, url: &'a str) -> AdapterFuture<'a, ()> {
        Box::pin(async move { default_open_link(self.core(), url) })
    }

    /// Closes the mini-app.
    fn close_app(&self) -> AdapterFuture<'_, ()> {
        Box::pin(async move { default_close_app(self.core()) })
    }

    /// Impact haptic.
    fn vibrate_impact(&self, _style: HapticImpactStyle) -> AdapterFuture<'_, ()> {
        Box::pin(async move {
            self.core().browser().vibrate(&[10]);
        })
    }

    /// Notification haptic.
    fn vibrate_notification(&self, _kind: HapticNotificationType) -> AdapterFuture<'_, ()> {
        Box::pin(async move {
            self.core().browser().vibrate(&[10, 30, 10]);
        })
    }

    /// Selection-changed haptic.
    fn vibrate_selection(&self) -> AdapterFuture<'_, ()> {
        Box::pin(async move {
            self.core().browser().vibrate(&[5]);
        })
    }

    /// Shows a popup and resolves the pressed button id (`None` when dismissed).
    fn show_popup(&self, options: PopupOptions) -> AdapterFuture<'_, Option<String>> {
        Box::pin(async move { default_show_popup(self.core(), &options) })
    }

    /// Scans a QR code.
    fn scan_qr_code(&self, _options: QrScanOptions) -> AdapterFuture<'_, Option<String>> {
        Box::pin(async { None })
    }

    /// Requests the user's phone number.
    fn request_phone(&self) -> AdapterFuture<'_, Option<String>> {
        Box::pin(async { None })
    }

    /// Shares a URL with optional text.
    fn share_url<'a>(&'a self, url: &'a str, text: Option<&'a str>) -> AdapterFuture<'a, ()> {
        Box::pin(default_share_url(self.core(), url, text))
    }

    /// Copies text to the clipboard.
    fn copy_text<'a>(&'a self, text: &'a str) -> AdapterFuture<'a, Result<(), AdapterError>> {
        Box::pin(default_copy_text(self.core(), text))
    }

    /// Downloads a file.
    fn download_file<'a>(
        &'a self,
        url: &'a str,
        file_name: Option<&'a str>,
    ) -> AdapterFuture<'a, Result<(), AdapterError>> {
        Box::pin(default_download_file(
            self.core(),
            url,
            file_name,
            DownloadOptions {
                prefer_blob: false,
                revoke_after_ms: self.core().config().blob_url_revoke_ms,
            },
        ))
    }

    /// Shares media to stories.
    fn share_story<'a>(
        &'a self,
        _media_url: &'a str,
        _options: ShareStoryOptions,
    ) -> AdapterFuture<'a, Result<(), AdapterError>> {
        Box::pin(async {
            Err(AdapterError::Unsupported {
                capability: Capability::ShareStory,
            })
        })
    }

    /// Requests push/notification permission.
    fn request_notifications_permission(&self) -> AdapterFuture<'_, bool> {
        Box::pin(async { false })
    }

    /// Asks the host to add the app to the home screen.
    fn add_to_home_screen(&self) -> AdapterFuture<'_, bool> {
        Box::pin(async { false })
    }

    /// Reports whether the app is on the home screen.
    fn check_home_screen_status(&self) -> AdapterFuture<'_, HomeScreenStatus> {
        Box::pin(async { HomeScreenStatus::Unknown })
    }

    /// Sends a conversion analytics event.
    fn track_conversion_event<'a>(
        &'a self,
        _event: &'a str,
        _payload: Option<&'a Value>,
    ) -> AdapterFuture<'a, ()> {
        Box::pin(async {})
    }

    /// Sends a retargeting pixel event.
    fn track_pixel_event<'a>(
        &'a self,
        _event: &'a str,
        _payload: Option<&'a Value>,
    ) -> AdapterFuture<'a, ()> {
        Box::pin(async {})
    }

    /// Calls `callback` with the current appearance and on every later change.
    fn on_appearance_change(&self, callback: Rc<dyn Fn(Option<Appearance>)>) -> Disposer {
        callback(self.core().environment().appearance);
        self.core()
            .appearance_listeners()
            .subscribe(Rc::new(move |appearance: &Option<Appearance>| {
                callback(*appearance)
            }))
    }

    /// Registers a handler fired when the host hides the view.
    fn on_view_hide(&self, callback: Callback) -> Disposer {
        self.core()
            .view_hide_listeners
            .subscribe(Rc::new(move |_: &()| callback()))
    }

    /// Registers a handler fired when the host restores the view.
    fn on_view_restore(&self, callback: Callback) -> Disposer {
        self.core()
            .view_restore_listeners
            .subscribe(Rc::new(move |_: &()| callback()))
    }

    /// Enters fullscreen mode.
    fn request_fullscreen(&self) -> AdapterFuture<'_, ()> {
        Box::pin(async {})
    }

    /// Allows vertical swipe-to-close.
    fn enable_vertical_swipes(&self) -> AdapterFuture<'_, ()> {
        Box::pin(async {})
    }

    /// Blocks vertical swipe-to-close.
    fn disable_vertical_swipes(&self) -> AdapterFuture<'_, ()> {
        Box::pin(async {})
    }

    /// Toggles the host's "confirm before closing" prompt.
    fn enable_closing_confirmation(&self, _enabled: bool) -> AdapterFuture<'_, ()> {
        Box::pin(async {})
    }

    /// Raw signed init data.
    fn init_data(&self) -> Option<String> {
        None
    }

    /// Host launch parameters.
    fn launch_params(&self) -> Option<Value> {
        None
    }

    /// Viewport-reported insets.
    fn viewport_insets(&self) -> Option<ViewportInsets> {
        None
    }

    /// Reconciled safe area.
    fn compute_safe_area(&self) -> Insets {
        default_compute_safe_area(self.core(), self.viewport_insets())
    }

    /// Adapter-specific teardown run by [`MiniAppAdapter::destroy`] before the core flush.
    fn on_destroy(&self) {}

    /// Releases every subscription and listener the adapter holds.
    fn destroy(&self) {
        self.on_destroy();
        self.core().teardown();
    }
}

/// Logs devtools and vendor-mocking requests, which are accepted but not acted upon.
pub fn log_ignored_init_options(platform: Platform, options: InitOptions) {
    if options.eruda {
        tracing::debug!("[miniapp-host] {platform}: devtools injection is not supported");
    }
    if options.mock_for_macos {
        tracing::debug!("[miniapp-host] {platform}: vendor environment mocking is not supported");
    }
}

/// Body background and `theme-color` meta.
pub fn default_set_colors(core: &AdapterCore, colors: &ColorScheme) {
    let browser = core.browser();
    if let Some(background) = colors.background.as_deref() {
        browser.set_body_background(background);
    }
    if let Some(header) = colors.header.as_deref() {
        browser.set_theme_color(header);
    }
}

/// `popstate` listener on the window, released on teardown.
pub fn default_on_back_button(core: &AdapterCore, callback: Callback) -> Disposer {
    let Some(events) = core.browser().events() else {
        return Disposer::noop();
    };
    let listener = events.add_listener("popstate", Rc::new(move || callback()));
    core.register(listener)
}

/// `window.open` in a new tab.
pub fn default_open_link(core: &AdapterCore, url: &str) {
    if let Err(err) = core.browser().open_window(url) {
        tracing::warn!("[miniapp-host] window.open failed: {err}");
    }
}

/// `history.back()` when there is history, `window.close()` otherwise.
pub fn default_close_app(core: &AdapterCore) {
    let browser = core.browser();
    if browser.history_length() > 1 {
        browser.history_back();
    } else {
        browser.close_window();
    }
}

/// Blocking alert; resolves the first button id or `ok`.
pub fn default_show_popup(core: &AdapterCore, options: &PopupOptions) -> Option<String> {
    core.browser().alert(&options.alert_text());
    Some(options.fallback_button_id())
}

/// Web Share, then clipboard copy of `text\nurl`.
pub async fn default_share_url(core: &AdapterCore, url: &str, text: Option<&str>) {
    let text = text.filter(|text| !text.is_empty());
    let payload = SharePayload {
        title: text.map(str::to_string),
        text: text.map(str::to_string),
        url: url.to_string(),
    };
    match core.browser().share(&payload).await {
        Ok(true) => return,
        Ok(false) => {}
        Err(err) => tracing::warn!("[miniapp-host] share cancelled or failed: {err}"),
    }

    let fallback = text.map_or_else(|| url.to_string(), |text| format!("{text}\n{url}"));
    if let Err(err) = core.browser().copy_text(&fallback).await {
        tracing::warn!("[miniapp-host] share fallback (clipboard) failed: {err}");
    }
}

/// Clipboard write.
pub async fn default_copy_text(core: &AdapterCore, text: &str) -> Result<(), AdapterError> {
    core.browser()
        .copy_text(text)
        .await
        .map_err(|message| AdapterError::bridge("clipboard.writeText", message))
}

/// Anchor download (optionally blob-first).
pub async fn default_download_file(
    core: &AdapterCore,
    url: &str,
    file_name: Option<&str>,
    options: DownloadOptions,
) -> Result<(), AdapterError> {
    trigger_file_download(core.browser(), core.scheduler().as_ref(), url, file_name, options)
        .await
        .map_err(|message| AdapterError::bridge("download", message))
}

/// Reconciles environment insets, viewport insets and CSS custom properties.
pub fn default_compute_safe_area(core: &AdapterCore, viewport: Option<ViewportInsets>) -> Insets {
    compute_combined_safe_area(&SafeAreaSources {
        environment: core.environment().safe_area.map(Into::into),
        viewport,
        css: core.browser().css_safe_area().map(Into::into),
        ..SafeAreaSources::default()
    })
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::browser::MemoryBrowserHost;

    struct PlainAdapter {
        core: AdapterCore,
    }

    impl MiniAppAdapter for PlainAdapter {
        fn core(&self) -> &AdapterCore {
            &self.core
        }
    }

    fn adapter(browser: &MemoryBrowserHost) -> PlainAdapter {
        PlainAdapter {
            core: AdapterCore::new(
                EnvironmentInfo::new(Platform::Web),
                PlatformCapabilities::none(),
                AdapterDeps::new(
                    Rc::new(browser.clone()),
                    Rc::new(NoopScheduler),
                    AdapterConfig::default(),
                ),
            ),
        }
    }

    #[test]
    fn defaults_use_browser_fallbacks() {
        let browser = MemoryBrowserHost::new();
        let adapter = adapter(&browser);

        block_on(adapter.init(InitOptions::default())).expect("init");
        block_on(adapter.vibrate_notification(HapticNotificationType::Success));
        block_on(adapter.set_colors(ColorScheme {
            header: Some("#112233".to_string()),
            background: Some("#ffffff".to_string()),
            footer: None,
        }));
        block_on(adapter.close_app());
        let popup = block_on(adapter.show_popup(PopupOptions {
            title: "Hi".to_string(),
            message: "There".to_string(),
            buttons: Vec::new(),
        }));

        let state = browser.state();
        assert!(adapter.is_ready());
        assert_eq!(state.vibrations, vec![vec![10, 30, 10]]);
        assert_eq!(state.theme_color.as_deref(), Some("#112233"));
        assert_eq!(state.body_background.as_deref(), Some("#ffffff"));
        assert!(state.window_closed);
        assert_eq!(state.alerts, vec!["Hi\n\nThere".to_string()]);
        assert_eq!(popup.as_deref(), Some("ok"));
        assert!(!adapter.supports(Capability::Popup));
    }

    #[test]
    fn share_falls_back_to_clipboard() {
        let browser = MemoryBrowserHost::new();
        let adapter = adapter(&browser);

        block_on(adapter.share_url("https://example.com/card", Some("My card")));

        assert_eq!(
            browser.state().clipboard.as_deref(),
            Some("My card\nhttps://example.com/card")
        );
    }

    #[test]
    fn back_button_fallback_listens_to_popstate_until_destroy() {
        let browser = MemoryBrowserHost::new();
        let adapter = adapter(&browser);
        let presses = Rc::new(Cell::new(0));
        let counter = presses.clone();

        adapter.on_back_button(Rc::new(move || counter.set(counter.get() + 1)));
        browser.event_hub().dispatch("popstate");
        adapter.destroy();
        browser.event_hub().dispatch("popstate");

        assert_eq!(presses.get(), 1);
        assert!(!adapter.is_ready());
        assert_eq!(adapter.core().pending_disposables(), 0);
    }

    #[test]
    fn appearance_listener_gets_current_value_then_changes() {
        let browser = MemoryBrowserHost::new();
        let adapter = adapter(&browser);
        adapter.core().set_appearance(Some(Appearance::Light));
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();

        let disposer =
            adapter.on_appearance_change(Rc::new(move |value| sink.borrow_mut().push(value)));
        adapter.core().set_appearance(Some(Appearance::Dark));
        adapter.core().set_appearance(Some(Appearance::Dark));
        disposer.dispose();
        adapter.core().set_appearance(Some(Appearance::Light));

        assert_eq!(
            *seen.borrow(),
            vec![Some(Appearance::Light), Some(Appearance::Dark)]
        );
    }

    #[test]
    fn safe_area_combines_environment_and_css_floor() {
        let browser = MemoryBrowserHost::new();
        browser.configure(|state| state.css_safe_area = Some(Insets::new(20.0, 0.0, 34.0, 0.0)));
        let adapter = adapter(&browser);
        adapter
            .core()
            .update_environment(|environment| {
                environment.safe_area = Some(Insets::new(30.0, 0.0, 0.0, 0.0))
            });

        assert_eq!(adapter.compute_safe_area(), Insets::new(30.0, 0.0, 34.0, 0.0));
    }

    #[test]
    fn share_story_is_unsupported_by_default() {
        let adapter = adapter(&MemoryBrowserHost::new());
        assert_eq!(
            block_on(
                adapter.share_story("https://example.com/a.png", ShareStoryOptions::default())
            ),
            Err(AdapterError::Unsupported {
                capability: Capability::ShareStory
            })
        );
    }
}
