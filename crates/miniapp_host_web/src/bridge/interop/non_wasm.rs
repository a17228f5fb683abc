use super::*;

fn unsupported() -> String {
    "Browser and host SDK APIs are only available when compiled for wasm32".to_string()
}

pub fn bridge_present(_kind: &str) -> bool {
    false
}

pub fn bridge_has_method(_kind: &str, _method: &str) -> bool {
    false
}

pub fn bridge_has_probe(_kind: &str) -> bool {
    false
}

pub async fn bridge_probe(_kind: &str, _method: &str) -> Result<bool, String> {
    Ok(false)
}

pub async fn bridge_call(_kind: &str, _method: &str, _params: &Value) -> Result<Value, String> {
    Err(unsupported())
}

pub fn bridge_subscribe(_kind: &str, _handler: Rc<dyn Fn(&BridgeEvent)>) -> Option<Disposer> {
    None
}

pub fn bridge_is_web_view(_kind: &str) -> Option<bool> {
    None
}

pub fn detection_signals(_shell_flag: &str) -> Option<DetectionSignals> {
    None
}

pub fn shell_available() -> bool {
    false
}

pub fn shell_post_message(_message: &Value) -> Result<(), String> {
    Err(unsupported())
}

pub fn shell_install_callback(_name: &str, _handler: Rc<dyn Fn(Value)>) -> Disposer {
    Disposer::noop()
}

pub async fn share(_payload: &SharePayload) -> Result<bool, String> {
    Ok(false)
}

pub async fn copy_text(_text: &str) -> Result<(), String> {
    Err(unsupported())
}

pub async fn fetch_blob_url(_url: &str) -> Result<String, String> {
    Err(unsupported())
}

pub fn install_prompt() -> Option<BrowserFuture<'static, Result<bool, String>>> {
    None
}

pub async fn scan_qr() -> Result<Option<String>, String> {
    Ok(None)
}

pub fn request_phone_via_event() -> Option<BrowserFuture<'static, Result<Value, String>>> {
    None
}
