//! Browser (DOM / Web API) fallbacks used when a host primitive is missing.

use std::{
    cell::{Ref, RefCell},
    collections::{BTreeMap, BTreeSet},
    future::Future,
    pin::Pin,
    rc::Rc,
};

use serde_json::Value;

use crate::{insets::Insets, watcher::EventHub, watcher::TriggerSource};

/// Object-safe boxed future used by [`BrowserHost`] async methods.
pub type BrowserFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Web Share payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SharePayload {
    /// Share sheet title.
    pub title: Option<String>,
    /// Message text.
    pub text: Option<String>,
    /// Shared URL.
    pub url: String,
}

/// Browser services behind the portable adapter defaults.
pub trait BrowserHost {
    /// Returns whether a window/document exists.
    fn is_available(&self) -> bool;

    /// Window-level event target (`resize`, `orientationchange`, `popstate`), when present.
    fn events(&self) -> Option<&dyn TriggerSource>;

    /// `navigator.vibrate`; returns `false` when unsupported.
    fn vibrate(&self, pattern: &[u32]) -> bool;

    /// Blocking `window.alert`.
    fn alert(&self, message: &str);

    /// `window.open(url, "_blank", "noopener,noreferrer")`.
    fn open_window(&self, url: &str) -> Result<(), String>;

    /// `history.length`.
    fn history_length(&self) -> u32;

    /// `history.back()`.
    fn history_back(&self);

    /// `window.close()`.
    fn close_window(&self);

    /// Sets `document.body.style.backgroundColor`.
    fn set_body_background(&self, color: &str);

    /// Updates `<meta name="theme-color">` when the tag exists.
    fn set_theme_color(&self, color: &str);

    /// Reads the `--safe-area-inset-*` custom properties from the document root.
    fn css_safe_area(&self) -> Option<Insets>;

    /// `matchMedia(query).matches`.
    fn matches_media(&self, query: &str) -> bool;

    /// `window.innerWidth`, falling back to the root element width; `0` when unknown.
    fn viewport_width(&self) -> f64;

    /// `navigator.userAgent`.
    fn user_agent(&self) -> String;

    /// `navigator.language`.
    fn language(&self) -> Option<String>;

    /// `location.search` including the leading `?`.
    fn location_search(&self) -> String;

    /// `location.hash` including the leading `#`.
    fn location_hash(&self) -> String;

    /// `navigator.share`; resolves `Ok(false)` when the Web Share API is missing.
    fn share<'a>(&'a self, payload: &'a SharePayload) -> BrowserFuture<'a, Result<bool, String>>;

    /// `navigator.clipboard.writeText`.
    fn copy_text<'a>(&'a self, text: &'a str) -> BrowserFuture<'a, Result<(), String>>;

    /// Clicks a temporary `<a download>` element.
    fn anchor_download(&self, href: &str, file_name: &str, new_tab: bool) -> Result<(), String>;

    /// Fetches `url` with credentials and returns an object URL for the body.
    fn fetch_blob_url<'a>(&'a self, url: &'a str) -> BrowserFuture<'a, Result<String, String>>;

    /// `URL.revokeObjectURL`.
    fn revoke_object_url(&self, url: &str);

    /// Shows the captured `beforeinstallprompt` prompt; `None` when none was captured.
    fn install_prompt(&self) -> Option<BrowserFuture<'_, Result<bool, String>>>;

    /// Returns whether the page runs as an installed standalone app.
    fn is_standalone(&self) -> bool;

    /// Runs the camera scanning overlay; `Ok(None)` when the user closes it.
    fn scan_qr(&self) -> BrowserFuture<'_, Result<Option<String>, String>>;

    /// Dispatches the `WebAppRequestPhone` window event and awaits the promise a native
    /// handler provides. `None` when no handler answered.
    fn request_phone_via_event(&self) -> Option<BrowserFuture<'_, Result<Value, String>>>;

    /// Adds or removes a class on the document root.
    fn toggle_root_class(&self, class: &str, enabled: bool);

    /// Sets a `data-*` attribute on the document root.
    fn set_root_data(&self, key: &str, value: &str);
}

#[derive(Debug, Clone, Copy, Default)]
/// Host for non-browser targets: every action is a no-op and every probe is negative.
pub struct NoopBrowserHost;

impl BrowserHost for NoopBrowserHost {
    fn is_available(&self) -> bool {
        false
    }

    fn events(&self) -> Option<&dyn TriggerSource> {
        None
    }

    fn vibrate(&self, _pattern: &[u32]) -> bool {
        false
    }

    fn alert(&self, _message: &str) {}

    fn open_window(&self, _url: &str) -> Result<(), String> {
        Err("window is unavailable".to_string())
    }

    fn history_length(&self) -> u32 {
        0
    }

    fn history_back(&self) {}

    fn close_window(&self) {}

    fn set_body_background(&self, _color: &str) {}

    fn set_theme_color(&self, _color: &str) {}

    fn css_safe_area(&self) -> Option<Insets> {
        None
    }

    fn matches_media(&self, _query: &str) -> bool {
        false
    }

    fn viewport_width(&self) -> f64 {
        0.0
    }

    fn user_agent(&self) -> String {
        String::new()
    }

    fn language(&self) -> Option<String> {
        None
    }

    fn location_search(&self) -> String {
        String::new()
    }

    fn location_hash(&self) -> String {
        String::new()
    }

    fn share<'a>(&'a self, _payload: &'a SharePayload) -> BrowserFuture<'a, Result<bool, String>> {
        Box::pin(async { Ok(false) })
    }

    fn copy_text<'a>(&'a self, _text: &'a str) -> BrowserFuture<'a, Result<(), String>> {
        Box::pin(async { Err("clipboard is unavailable".to_string()) })
    }

    fn anchor_download(&self, _href: &str, _file_name: &str, _new_tab: bool) -> Result<(), String> {
        Err("document is unavailable".to_string())
    }

    fn fetch_blob_url<'a>(&'a self, _url: &'a str) -> BrowserFuture<'a, Result<String, String>> {
        Box::pin(async { Err("fetch is unavailable".to_string()) })
    }

    fn revoke_object_url(&self, _url: &str) {}

    fn install_prompt(&self) -> Option<BrowserFuture<'_, Result<bool, String>>> {
        None
    }

    fn is_standalone(&self) -> bool {
        false
    }

    fn scan_qr(&self) -> BrowserFuture<'_, Result<Option<String>, String>> {
        Box::pin(async { Ok(None) })
    }

    fn request_phone_via_event(&self) -> Option<BrowserFuture<'_, Result<Value, String>>> {
        None
    }

    fn toggle_root_class(&self, _class: &str, _enabled: bool) {}

    fn set_root_data(&self, _key: &str, _value: &str) {}
}

/// Observable state of a [`MemoryBrowserHost`].
///
/// Fields prefixed by an action name record what adapters did; the rest script what the fake
/// browser reports.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryBrowserState {
    /// Recorded `navigator.vibrate` patterns.
    pub vibrations: Vec<Vec<u32>>,
    /// Recorded alert texts.
    pub alerts: Vec<String>,
    /// Recorded `window.open` URLs.
    pub opened_urls: Vec<String>,
    /// Number of `history.back()` calls.
    pub history_backs: u32,
    /// Whether `window.close()` was called.
    pub window_closed: bool,
    /// Last body background.
    pub body_background: Option<String>,
    /// Last theme-color meta value.
    pub theme_color: Option<String>,
    /// Recorded shares.
    pub shared: Vec<SharePayload>,
    /// Clipboard contents.
    pub clipboard: Option<String>,
    /// Recorded anchor downloads `(href, file_name, new_tab)`.
    pub downloads: Vec<(String, String, bool)>,
    /// Revoked object URLs.
    pub revoked_urls: Vec<String>,
    /// Document root classes.
    pub root_classes: BTreeSet<String>,
    /// Document root data attributes.
    pub root_data: BTreeMap<String, String>,

    /// Reported `history.length`.
    pub history_length: u32,
    /// Whether `navigator.vibrate` exists.
    pub vibrate_supported: bool,
    /// Whether the Web Share API exists.
    pub share_supported: bool,
    /// Whether the clipboard accepts writes.
    pub clipboard_supported: bool,
    /// Result for blob fetches; `None` makes them fail.
    pub blob_url: Option<String>,
    /// CSS custom property insets.
    pub css_safe_area: Option<Insets>,
    /// Media queries that match.
    pub matching_media: BTreeSet<String>,
    /// Reported viewport width.
    pub viewport_width: f64,
    /// Reported user agent.
    pub user_agent: String,
    /// Reported language.
    pub language: Option<String>,
    /// Reported `location.search`.
    pub search: String,
    /// Reported `location.hash`.
    pub hash: String,
    /// Install prompt outcome; `None` means no prompt was captured.
    pub install_prompt_accepted: Option<bool>,
    /// Standalone display mode.
    pub standalone: bool,
    /// Camera scan result.
    pub scanned_qr: Option<String>,
    /// Response a native handler gives to `WebAppRequestPhone`; `None` means unhandled.
    pub phone_event_response: Option<Value>,
}

impl Default for MemoryBrowserState {
    fn default() -> Self {
        Self {
            vibrations: Vec::new(),
            alerts: Vec::new(),
            opened_urls: Vec::new(),
            history_backs: 0,
            window_closed: false,
            body_background: None,
            theme_color: None,
            shared: Vec::new(),
            clipboard: None,
            downloads: Vec::new(),
            revoked_urls: Vec::new(),
            root_classes: BTreeSet::new(),
            root_data: BTreeMap::new(),
            history_length: 1,
            vibrate_supported: true,
            share_supported: false,
            clipboard_supported: true,
            blob_url: None,
            css_safe_area: None,
            matching_media: BTreeSet::new(),
            viewport_width: 390.0,
            user_agent: "Mozilla/5.0".to_string(),
            language: Some("en-US".to_string()),
            search: String::new(),
            hash: String::new(),
            install_prompt_accepted: None,
            standalone: false,
            scanned_qr: None,
            phone_event_response: None,
        }
    }
}

/// Recording in-memory browser for tests and non-browser builds.
#[derive(Clone, Default)]
pub struct MemoryBrowserHost {
    state: Rc<RefCell<MemoryBrowserState>>,
    events: EventHub,
}

impl MemoryBrowserHost {
    /// Creates a host with default scripted values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mutates the scripted state.
    pub fn configure(&self, update: impl FnOnce(&mut MemoryBrowserState)) -> &Self {
        update(&mut self.state.borrow_mut());
        self
    }

    /// Read access to the recorded state.
    pub fn state(&self) -> Ref<'_, MemoryBrowserState> {
        self.state.borrow()
    }

    /// Window event hub backing [`BrowserHost::events`].
    pub fn event_hub(&self) -> &EventHub {
        &self.events
    }
}

impl BrowserHost for MemoryBrowserHost {
    fn is_available(&self) -> bool {
        true
    }

    fn events(&self) -> Option<&dyn TriggerSource> {
        Some(&self.events)
    }

    fn vibrate(&self, pattern: &[u32]) -> bool {
        let mut state = self.state.borrow_mut();
        if !state.vibrate_supported {
            return false;
        }
        state.vibrations.push(pattern.to_vec());
        true
    }

    fn alert(&self, message: &str) {
        self.state.borrow_mut().alerts.push(message.to_string());
    }

    fn open_window(&self, url: &str) -> Result<(), String> {
        self.state.borrow_mut().opened_urls.push(url.to_string());
        Ok(())
    }

    fn history_length(&self) -> u32 {
        self.state.borrow().history_length
    }

    fn history_back(&self) {
        self.state.borrow_mut().history_backs += 1;
    }

    fn close_window(&self) {
        self.state.borrow_mut().window_closed = true;
    }

    fn set_body_background(&self, color: &str) {
        self.state.borrow_mut().body_background = Some(color.to_string());
    }

    fn set_theme_color(&self, color: &str) {
        self.state.borrow_mut().theme_color = Some(color.to_string());
    }

    fn css_safe_area(&self) -> Option<Insets> {
        self.state.borrow().css_safe_area
    }

    fn matches_media(&self, query: &str) -> bool {
        self.state.borrow().matching_media.contains(query)
    }

    fn viewport_width(&self) -> f64 {
        self.state.borrow().viewport_width
    }

    fn user_agent(&self) -> String {
        self.state.borrow().user_agent.clone()
    }

    fn language(&self) -> Option<String> {
        self.state.borrow().language.clone()
    }

    fn location_search(&self) -> String {
        self.state.borrow().search.clone()
    }

    fn location_hash(&self) -> String {
        self.state.borrow().hash.clone()
    }

    fn share<'a>(&'a self, payload: &'a SharePayload) -> BrowserFuture<'a, Result<bool, String>> {
        Box::pin(async move {
            let mut state = self.state.borrow_mut();
            if !state.share_supported {
                return Ok(false);
            }
            state.shared.push(payload.clone());
            Ok(true)
        })
    }

    fn copy_text<'a>(&'a self, text: &'a str) -> BrowserFuture<'a, Result<(), String>> {
        Box::pin(async move {
            let mut state = self.state.borrow_mut();
            if !state.clipboard_supported {
                return Err("clipboard write denied".to_string());
            }
            state.clipboard = Some(text.to_string());
            Ok(())
        })
    }

    fn anchor_download(&self, href: &str, file_name: &str, new_tab: bool) -> Result<(), String> {
        self.state
            .borrow_mut()
            .downloads
            .push((href.to_string(), file_name.to_string(), new_tab));
        Ok(())
    }

    fn fetch_blob_url<'a>(&'a self, url: &'a str) -> BrowserFuture<'a, Result<String, String>> {
        Box::pin(async move {
            self.state
                .borrow()
                .blob_url
                .clone()
                .ok_or_else(|| format!("Failed to download file: {url}"))
        })
    }

    fn revoke_object_url(&self, url: &str) {
        self.state.borrow_mut().revoked_urls.push(url.to_string());
    }

    fn install_prompt(&self) -> Option<BrowserFuture<'_, Result<bool, String>>> {
        let accepted = self.state.borrow_mut().install_prompt_accepted.take()?;
        Some(Box::pin(async move { Ok(accepted) }))
    }

    fn is_standalone(&self) -> bool {
        self.state.borrow().standalone
    }

    fn scan_qr(&self) -> BrowserFuture<'_, Result<Option<String>, String>> {
        Box::pin(async move { Ok(self.state.borrow().scanned_qr.clone()) })
    }

    fn request_phone_via_event(&self) -> Option<BrowserFuture<'_, Result<Value, String>>> {
        let response = self.state.borrow().phone_event_response.clone()?;
        Some(Box::pin(async move { Ok(response) }))
    }

    fn toggle_root_class(&self, class: &str, enabled: bool) {
        let mut state = self.state.borrow_mut();
        if enabled {
            state.root_classes.insert(class.to_string());
        } else {
            state.root_classes.remove(class);
        }
    }

    fn set_root_data(&self, key: &str, value: &str) {
        self.state
            .borrow_mut()
            .root_data
            .insert(key.to_string(), value.to_string());
    }
}

impl std::fmt::Debug for MemoryBrowserHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBrowserHost")
            .field("state", &*self.state.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn install_prompt_is_consumed_once() {
        let host = MemoryBrowserHost::new();
        host.configure(|state| state.install_prompt_accepted = Some(true));

        let first = host.install_prompt().map(block_on);
        let second = host.install_prompt().map(block_on);

        assert_eq!(first, Some(Ok(true)));
        assert_eq!(second, None);
    }

    #[test]
    fn share_reports_missing_api_without_recording() {
        let host = MemoryBrowserHost::new();
        let payload = SharePayload {
            url: "https://example.com".to_string(),
            ..SharePayload::default()
        };

        assert_eq!(block_on(host.share(&payload)), Ok(false));
        host.configure(|state| state.share_supported = true);
        assert_eq!(block_on(host.share(&payload)), Ok(true));
        assert_eq!(host.state().shared.len(), 1);
    }
}
