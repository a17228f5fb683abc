//! Shared JS interop for host SDKs, the native shell and browser APIs.
//!
//! This module routes calls to target-specific implementations while preserving a uniform API
//! for the bridge, shell and browser-host modules.

use std::rc::Rc;

use miniapp_host::{BridgeEvent, BrowserFuture, Disposer, SharePayload};
use serde_json::Value;

use crate::detect::DetectionSignals;

#[cfg(not(target_arch = "wasm32"))]
mod non_wasm;
#[cfg(target_arch = "wasm32")]
mod wasm;

#[cfg(not(target_arch = "wasm32"))]
use non_wasm as imp;
#[cfg(target_arch = "wasm32")]
use wasm as imp;

pub fn bridge_present(kind: &str) -> bool {
    imp::bridge_present(kind)
}

pub fn bridge_has_method(kind: &str, method: &str) -> bool {
    imp::bridge_has_method(kind, method)
}

pub fn bridge_has_probe(kind: &str) -> bool {
    imp::bridge_has_probe(kind)
}

pub async fn bridge_probe(kind: &str, method: &str) -> Result<bool, String> {
    imp::bridge_probe(kind, method).await
}

pub async fn bridge_call(kind: &str, method: &str, params: &Value) -> Result<Value, String> {
    imp::bridge_call(kind, method, params).await
}

pub fn bridge_subscribe(kind: &str, handler: Rc<dyn Fn(&BridgeEvent)>) -> Option<Disposer> {
    imp::bridge_subscribe(kind, handler)
}

pub fn bridge_is_web_view(kind: &str) -> Option<bool> {
    imp::bridge_is_web_view(kind)
}

pub fn detection_signals(shell_flag: &str) -> Option<DetectionSignals> {
    imp::detection_signals(shell_flag)
}

pub fn shell_available() -> bool {
    imp::shell_available()
}

pub fn shell_post_message(message: &Value) -> Result<(), String> {
    imp::shell_post_message(message)
}

pub fn shell_install_callback(name: &str, handler: Rc<dyn Fn(Value)>) -> Disposer {
    imp::shell_install_callback(name, handler)
}

pub async fn share(payload: &SharePayload) -> Result<bool, String> {
    imp::share(payload).await
}

pub async fn copy_text(text: &str) -> Result<(), String> {
    imp::copy_text(text).await
}

pub async fn fetch_blob_url(url: &str) -> Result<String, String> {
    imp::fetch_blob_url(url).await
}

pub fn install_prompt() -> Option<BrowserFuture<'static, Result<bool, String>>> {
    imp::install_prompt()
}

pub async fn scan_qr() -> Result<Option<String>, String> {
    imp::scan_qr().await
}

pub fn request_phone_via_event() -> Option<BrowserFuture<'static, Result<Value, String>>> {
    imp::request_phone_via_event()
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn host_sdk_interop_is_inert_off_wasm() {
        assert!(!bridge_present("telegram"));
        assert!(!bridge_has_method("vk", "VKWebAppInit"));
        assert!(!bridge_has_probe("vk"));
        assert!(block_on(bridge_call("max", "ready", &Value::Null)).is_err());
        assert!(bridge_subscribe("vk", Rc::new(|_: &BridgeEvent| {})).is_none());
        assert_eq!(bridge_is_web_view("vk"), None);
        assert_eq!(detection_signals("nativePlatform"), None);
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn browser_interop_reports_missing_apis_off_wasm() {
        let payload = SharePayload {
            url: "https://example.com".to_string(),
            ..SharePayload::default()
        };
        assert_eq!(block_on(share(&payload)), Ok(false));
        assert!(block_on(copy_text("x")).is_err());
        assert!(block_on(fetch_blob_url("https://example.com/a.pdf")).is_err());
        assert!(install_prompt().is_none());
        assert_eq!(block_on(scan_qr()), Ok(None));
        assert!(request_phone_via_event().is_none());
        assert!(!shell_available());
        assert!(shell_post_message(&json!({"type": "openNativeQR"})).is_err());
    }
}
