//! `web-sys` implementation of [`BrowserHost`].
//!
//! Synchronous DOM work goes through `web-sys`; promise-based Web APIs (share, clipboard, fetch,
//! install prompt, camera scanning) go through the inline-JS interop layer. Off-wasm every probe
//! is negative and every action is inert, matching `NoopBrowserHost`.

use std::rc::Rc;

use miniapp_host::{BrowserFuture, BrowserHost, Disposer, Insets, SharePayload, TriggerSource};
use serde_json::Value;

use crate::bridge::interop;

#[derive(Debug, Clone, Copy, Default)]
/// `window` as a [`TriggerSource`].
pub struct WindowEvents;

impl TriggerSource for WindowEvents {
    fn add_listener(&self, event: &str, handler: Rc<dyn Fn()>) -> Disposer {
        #[cfg(target_arch = "wasm32")]
        {
            use wasm_bindgen::{closure::Closure, JsCast};

            let Some(window) = web_sys::window() else {
                return Disposer::noop();
            };
            let closure =
                Closure::<dyn FnMut(web_sys::Event)>::wrap(Box::new(move |_| handler()));
            if let Err(err) =
                window.add_event_listener_with_callback(event, closure.as_ref().unchecked_ref())
            {
                tracing::warn!("[miniapp-host] addEventListener({event}) failed: {err:?}");
                return Disposer::noop();
            }
            let event = event.to_string();
            Disposer::new(move || {
                let _ = window
                    .remove_event_listener_with_callback(&event, closure.as_ref().unchecked_ref());
            })
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            let _ = (event, handler);
            Disposer::noop()
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
/// Browser host over the real `window` and `document`.
pub struct WebBrowserHost {
    events: WindowEvents,
}

impl WebBrowserHost {
    /// Creates the host.
    pub const fn new() -> Self {
        Self {
            events: WindowEvents,
        }
    }
}

#[cfg(target_arch = "wasm32")]
mod dom {
    use wasm_bindgen::{JsCast, JsValue};

    pub fn window() -> Option<web_sys::Window> {
        web_sys::window()
    }

    pub fn document() -> Option<web_sys::Document> {
        window()?.document()
    }

    pub fn root() -> Option<web_sys::Element> {
        document()?.document_element()
    }

    pub fn anchor_download(href: &str, file_name: &str, new_tab: bool) -> Result<(), String> {
        let document = document().ok_or_else(|| "document unavailable".to_string())?;
        let anchor = document
            .create_element("a")
            .map_err(|err| format!("failed to create anchor: {err:?}"))?
            .dyn_into::<web_sys::HtmlAnchorElement>()
            .map_err(|_| "failed to cast anchor".to_string())?;
        anchor.set_href(href);
        anchor.set_download(file_name);
        if new_tab {
            anchor.set_target("_blank");
            anchor.set_rel("noopener");
        }
        let body = document
            .body()
            .ok_or_else(|| "document body unavailable".to_string())?;
        body.append_child(&anchor)
            .map_err(|err| format!("failed to attach anchor: {err:?}"))?;
        anchor.click();
        anchor.remove();
        Ok(())
    }

    pub fn vibrate(pattern: &[u32]) -> bool {
        let Some(window) = window() else {
            return false;
        };
        let navigator = window.navigator();
        let has_vibrate = js_sys::Reflect::has(&navigator, &JsValue::from_str("vibrate"))
            .unwrap_or(false);
        if !has_vibrate {
            return false;
        }
        let sequence = pattern
            .iter()
            .map(|step| JsValue::from_f64(f64::from(*step)))
            .collect::<js_sys::Array>();
        navigator.vibrate_with_pattern(&sequence)
    }
}

impl BrowserHost for WebBrowserHost {
    fn is_available(&self) -> bool {
        #[cfg(target_arch = "wasm32")]
        {
            dom::document().is_some()
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            false
        }
    }

    fn events(&self) -> Option<&dyn TriggerSource> {
        if cfg!(target_arch = "wasm32") {
            Some(&self.events)
        } else {
            None
        }
    }

    fn vibrate(&self, pattern: &[u32]) -> bool {
        #[cfg(target_arch = "wasm32")]
        {
            dom::vibrate(pattern)
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            let _ = pattern;
            false
        }
    }

    fn alert(&self, message: &str) {
        #[cfg(target_arch = "wasm32")]
        {
            if let Some(window) = dom::window() {
                let _ = window.alert_with_message(message);
            }
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            let _ = message;
        }
    }

    fn open_window(&self, url: &str) -> Result<(), String> {
        #[cfg(target_arch = "wasm32")]
        {
            let window = dom::window().ok_or_else(|| "window unavailable".to_string())?;
            window
                .open_with_url_and_target_and_features(url, "_blank", "noopener,noreferrer")
                .map(|_| ())
                .map_err(|err| format!("window.open failed: {err:?}"))
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            let _ = url;
            Err("window is unavailable".to_string())
        }
    }

    fn history_length(&self) -> u32 {
        #[cfg(target_arch = "wasm32")]
        {
            dom::window()
                .and_then(|window| window.history().ok())
                .and_then(|history| history.length().ok())
                .unwrap_or(0)
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            0
        }
    }

    fn history_back(&self) {
        #[cfg(target_arch = "wasm32")]
        {
            if let Some(history) = dom::window().and_then(|window| window.history().ok()) {
                let _ = history.back();
            }
        }
    }

    fn close_window(&self) {
        #[cfg(target_arch = "wasm32")]
        {
            if let Some(window) = dom::window() {
                let _ = window.close();
            }
        }
    }

    fn set_body_background(&self, color: &str) {
        #[cfg(target_arch = "wasm32")]
        {
            if let Some(body) = dom::document().and_then(|document| document.body()) {
                let _ = body.style().set_property("background-color", color);
            }
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            let _ = color;
        }
    }

    fn set_theme_color(&self, color: &str) {
        #[cfg(target_arch = "wasm32")]
        {
            if let Some(meta) = dom::document()
                .and_then(|document| document.query_selector("meta[name=\"theme-color\"]").ok())
                .flatten()
            {
                let _ = meta.set_attribute("content", color);
            }
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            let _ = color;
        }
    }

    fn css_safe_area(&self) -> Option<Insets> {
        #[cfg(target_arch = "wasm32")]
        {
            use miniapp_host::{css_safe_area_from_values, CSS_SAFE_AREA_PROPERTIES};

            let window = dom::window()?;
            let style = window.get_computed_style(&dom::root()?).ok().flatten()?;
            let [top, right, bottom, left] = CSS_SAFE_AREA_PROPERTIES
                .map(|property| style.get_property_value(property).unwrap_or_default());
            css_safe_area_from_values(&top, &right, &bottom, &left)
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            None
        }
    }

    fn matches_media(&self, query: &str) -> bool {
        #[cfg(target_arch = "wasm32")]
        {
            dom::window()
                .and_then(|window| window.match_media(query).ok().flatten())
                .is_some_and(|list| list.matches())
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            let _ = query;
            false
        }
    }

    fn viewport_width(&self) -> f64 {
        #[cfg(target_arch = "wasm32")]
        {
            dom::window()
                .and_then(|window| window.inner_width().ok())
                .and_then(|value| value.as_f64())
                .filter(|width| *width > 0.0)
                .or_else(|| dom::root().map(|root| f64::from(root.client_width())))
                .unwrap_or(0.0)
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            0.0
        }
    }

    fn user_agent(&self) -> String {
        #[cfg(target_arch = "wasm32")]
        {
            dom::window()
                .and_then(|window| window.navigator().user_agent().ok())
                .unwrap_or_default()
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            String::new()
        }
    }

    fn language(&self) -> Option<String> {
        #[cfg(target_arch = "wasm32")]
        {
            dom::window().and_then(|window| window.navigator().language())
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            None
        }
    }

    fn location_search(&self) -> String {
        #[cfg(target_arch = "wasm32")]
        {
            dom::window()
                .and_then(|window| window.location().search().ok())
                .unwrap_or_default()
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            String::new()
        }
    }

    fn location_hash(&self) -> String {
        #[cfg(target_arch = "wasm32")]
        {
            dom::window()
                .and_then(|window| window.location().hash().ok())
                .unwrap_or_default()
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            String::new()
        }
    }

    fn share<'a>(&'a self, payload: &'a SharePayload) -> BrowserFuture<'a, Result<bool, String>> {
        Box::pin(interop::share(payload))
    }

    fn copy_text<'a>(&'a self, text: &'a str) -> BrowserFuture<'a, Result<(), String>> {
        Box::pin(interop::copy_text(text))
    }

    fn anchor_download(&self, href: &str, file_name: &str, new_tab: bool) -> Result<(), String> {
        #[cfg(target_arch = "wasm32")]
        {
            dom::anchor_download(href, file_name, new_tab)
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            let _ = (href, file_name, new_tab);
            Err("document is unavailable".to_string())
        }
    }

    fn fetch_blob_url<'a>(&'a self, url: &'a str) -> BrowserFuture<'a, Result<String, String>> {
        Box::pin(interop::fetch_blob_url(url))
    }

    fn revoke_object_url(&self, url: &str) {
        #[cfg(target_arch = "wasm32")]
        {
            if let Err(err) = web_sys::Url::revoke_object_url(url) {
                tracing::warn!("[miniapp-host] revokeObjectURL failed: {err:?}");
            }
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            let _ = url;
        }
    }

    fn install_prompt(&self) -> Option<BrowserFuture<'_, Result<bool, String>>> {
        interop::install_prompt()
    }

    fn is_standalone(&self) -> bool {
        self.matches_media("(display-mode: standalone)")
    }

    fn scan_qr(&self) -> BrowserFuture<'_, Result<Option<String>, String>> {
        Box::pin(interop::scan_qr())
    }

    fn request_phone_via_event(&self) -> Option<BrowserFuture<'_, Result<Value, String>>> {
        interop::request_phone_via_event()
    }

    fn toggle_root_class(&self, class: &str, enabled: bool) {
        #[cfg(target_arch = "wasm32")]
        {
            if let Some(root) = dom::root() {
                let _ = root.class_list().toggle_with_force(class, enabled);
            }
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            let _ = (class, enabled);
        }
    }

    fn set_root_data(&self, key: &str, value: &str) {
        #[cfg(target_arch = "wasm32")]
        {
            if let Some(root) = dom::root() {
                let _ = root.set_attribute(&format!("data-{key}"), value);
            }
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            let _ = (key, value);
        }
    }
}
