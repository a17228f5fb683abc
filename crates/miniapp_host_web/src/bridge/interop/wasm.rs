use super::*;
use js_sys::{Function, Promise};
use serde::{Deserialize, Serialize};
use serde_wasm_bindgen::{from_value, Serializer};
use wasm_bindgen::{closure::Closure, prelude::*, JsCast};
use wasm_bindgen_futures::JsFuture;

#[wasm_bindgen(inline_js = r#"
function fail(message) {
  throw new Error(message);
}

function fn(value) {
  return typeof value === 'function';
}

function viaCallback(start) {
  return new Promise((resolve, reject) => {
    try {
      start(resolve);
    } catch (err) {
      reject(err);
    }
  });
}

function telegramHost() {
  return globalThis.Telegram?.WebApp ?? null;
}

function maxHost() {
  return globalThis.WebApp ?? globalThis.MaxMiniApp ?? null;
}

function vkHost() {
  return globalThis.vkBridge ?? null;
}

const HOSTS = { telegram: telegramHost, vk: vkHost, max: maxHost };

function host(kind) {
  const resolve = HOSTS[kind];
  return resolve ? resolve() : null;
}

function entry(available, run) {
  return { available, run };
}

let telegramCssBound = false;

function bindTelegramCss(wa) {
  if (telegramCssBound) fail('CSS variables are already bound');
  const root = document.documentElement;
  const apply = () => {
    for (const [key, value] of Object.entries(wa.themeParams || {})) {
      root.style.setProperty(`--tg-theme-${key.replace(/_/g, '-')}`, value);
    }
  };
  apply();
  wa.onEvent('themeChanged', apply);
  telegramCssBound = true;
  return null;
}

function telegramState(wa) {
  return {
    version: wa.version ?? null,
    platform: wa.platform ?? null,
    initData: wa.initData || null,
    initDataUnsafe: wa.initDataUnsafe ?? null,
    colorScheme: wa.colorScheme ?? null,
    isActive: wa.isActive !== false,
    safeAreaInset: wa.safeAreaInset ?? null,
    contentSafeAreaInset: wa.contentSafeAreaInset ?? null,
  };
}

function scanTelegramQr(wa, closeOnCapture) {
  return viaCallback((resolve) => {
    let settled = false;
    const closed = () => {
      wa.offEvent('scanQrPopupClosed', closed);
      if (!settled) {
        settled = true;
        resolve(null);
      }
    };
    wa.onEvent('scanQrPopupClosed', closed);
    wa.showScanQrPopup({}, (text) => {
      if (settled) return true;
      settled = true;
      wa.offEvent('scanQrPopupClosed', closed);
      resolve(text ?? null);
      return closeOnCapture !== false;
    });
  });
}

const TELEGRAM = {
  ready: entry((wa) => fn(wa.ready), (wa) => wa.ready()),
  getState: entry(() => true, (wa) => telegramState(wa)),
  bindCssVariables: entry((wa) => !!wa.themeParams && fn(wa.onEvent), (wa) => bindTelegramCss(wa)),
  setHeaderColor: entry((wa) => fn(wa.setHeaderColor), (wa, p) => wa.setHeaderColor(p.color)),
  setBackgroundColor: entry((wa) => fn(wa.setBackgroundColor), (wa, p) => wa.setBackgroundColor(p.color)),
  setBottomBarColor: entry((wa) => fn(wa.setBottomBarColor), (wa, p) => wa.setBottomBarColor(p.color)),
  'backButton.show': entry((wa) => fn(wa.BackButton?.show), (wa) => wa.BackButton.show()),
  'backButton.hide': entry((wa) => fn(wa.BackButton?.hide), (wa) => wa.BackButton.hide()),
  openLink: entry((wa) => fn(wa.openLink), (wa, p) => wa.openLink(p.url, { try_instant_view: !!p.tryInstantView })),
  openTelegramLink: entry((wa) => fn(wa.openTelegramLink), (wa, p) =>
    wa.openTelegramLink(/^https?:/.test(p.path_full) ? p.path_full : `https://t.me${p.path_full}`)),
  close: entry((wa) => fn(wa.close), (wa) => wa.close()),
  hapticImpact: entry((wa) => fn(wa.HapticFeedback?.impactOccurred), (wa, p) => wa.HapticFeedback.impactOccurred(p.style)),
  hapticNotification: entry((wa) => fn(wa.HapticFeedback?.notificationOccurred), (wa, p) => wa.HapticFeedback.notificationOccurred(p.type)),
  hapticSelection: entry((wa) => fn(wa.HapticFeedback?.selectionChanged), (wa) => wa.HapticFeedback.selectionChanged()),
  showPopup: entry((wa) => fn(wa.showPopup), (wa, p) => viaCallback((resolve) => wa.showPopup(p, (id) => resolve(id || null)))),
  scanQr: entry((wa) => fn(wa.showScanQrPopup), (wa, p) => scanTelegramQr(wa, p.closeOnCapture)),
  requestPhoneAccess: entry((wa) => fn(wa.requestPhoneAccess), (wa) => viaCallback((resolve) => wa.requestPhoneAccess((ok) => resolve(!!ok)))),
  requestContact: entry((wa) => fn(wa.requestContact), (wa) =>
    viaCallback((resolve) => wa.requestContact((ok, res) => resolve(ok ? (res?.responseUnsafe ?? res ?? null) : null)))),
  downloadFile: entry((wa) => fn(wa.downloadFile), (wa, p) =>
    viaCallback((resolve) => wa.downloadFile({ url: p.url, file_name: p.file_name }, (accepted) => resolve(!!accepted)))),
  shareStory: entry((wa) => fn(wa.shareToStory), (wa, p) => wa.shareToStory(p.media_url, { text: p.text ?? undefined, widget_link: p.widget_link ?? undefined })),
  requestFullscreen: entry((wa) => fn(wa.requestFullscreen), (wa) => wa.requestFullscreen()),
  enableVerticalSwipes: entry((wa) => fn(wa.enableVerticalSwipes), (wa) => wa.enableVerticalSwipes()),
  disableVerticalSwipes: entry((wa) => fn(wa.disableVerticalSwipes), (wa) => wa.disableVerticalSwipes()),
  enableClosingConfirmation: entry((wa) => fn(wa.enableClosingConfirmation), (wa) => wa.enableClosingConfirmation()),
  disableClosingConfirmation: entry((wa) => fn(wa.disableClosingConfirmation), (wa) => wa.disableClosingConfirmation()),
  addToHomeScreen: entry((wa) => fn(wa.addToHomeScreen), (wa) => wa.addToHomeScreen()),
  checkHomeScreenStatus: entry((wa) => fn(wa.checkHomeScreenStatus), (wa) =>
    viaCallback((resolve) => wa.checkHomeScreenStatus((status) => resolve(status || 'unknown')))),
};

const TELEGRAM_EVENTS = {
  themeChanged: (wa) => ({ colorScheme: wa.colorScheme ?? null }),
  safeAreaChanged: (wa) => wa.safeAreaInset ?? null,
  contentSafeAreaChanged: (wa) => wa.contentSafeAreaInset ?? null,
  activated: () => null,
  deactivated: () => null,
  backButtonClicked: () => null,
};

const MAX = {
  ready: entry((wa) => fn(wa.ready), (wa) => wa.ready()),
  getState: entry(() => true, (wa) => ({
    version: wa.version ?? null,
    platform: wa.platform ?? null,
    initData: wa.initData || null,
    initDataUnsafe: wa.initDataUnsafe ?? null,
  })),
  'backButton.show': entry((wa) => fn(wa.BackButton?.show), (wa) => wa.BackButton.show()),
  'backButton.hide': entry((wa) => fn(wa.BackButton?.hide), (wa) => wa.BackButton.hide()),
  'backButton.onClick': entry((wa) => fn(wa.BackButton?.onClick), () => null),
  openExternalLink: entry((wa) => fn(wa.openExternalLink), (wa, p) => wa.openExternalLink(p.url)),
  openMaxLink: entry((wa) => fn(wa.openMaxLink), (wa, p) => wa.openMaxLink(p.url)),
  close: entry((wa) => fn(wa.close), (wa) => wa.close()),
  hapticImpact: entry((wa) => fn(wa.HapticFeedback?.impactOccurred), (wa, p) => wa.HapticFeedback.impactOccurred(p.style)),
  hapticNotification: entry((wa) => fn(wa.HapticFeedback?.notificationOccurred), (wa, p) => wa.HapticFeedback.notificationOccurred(p.type)),
  hapticSelection: entry((wa) => fn(wa.HapticFeedback?.selectionChanged), (wa) => wa.HapticFeedback.selectionChanged()),
  openCodeReader: entry((wa) => fn(wa.openCodeReader), (wa, p) => wa.openCodeReader(p.closeOnCapture !== false)),
  requestPhoneNumber: entry((wa) => fn(wa.requestPhoneNumber), (wa) => wa.requestPhoneNumber()),
  downloadFile: entry((wa) => fn(wa.downloadFile), (wa, p) => wa.downloadFile(p.url, p.file_name)),
  shareContent: entry((wa) => fn(wa.shareContent), (wa, p) => wa.shareContent({
    text: p.text ?? '',
    link: p.link ?? undefined,
    requestId: p.requestId,
  })),
};

const TABLES = { telegram: TELEGRAM, max: MAX };

export function jsBridgePresent(kind) {
  return !!host(kind);
}

export function jsBridgeHasMethod(kind, method) {
  const bridge = host(kind);
  if (!bridge) return false;
  if (kind === 'vk') return fn(bridge.send);
  const found = TABLES[kind]?.[method];
  return !!found && !!found.available(bridge);
}

export function jsBridgeHasProbe(kind) {
  return kind === 'vk' && fn(vkHost()?.supportsAsync);
}

export async function jsBridgeProbe(kind, method) {
  const bridge = host(kind);
  if (!bridge || !fn(bridge.supportsAsync)) return false;
  return !!(await bridge.supportsAsync(method));
}

export async function jsBridgeCall(kind, method, params) {
  const bridge = host(kind);
  if (!bridge) fail(`${kind} bridge is unavailable`);
  if (kind === 'vk') {
    const result = await bridge.send(method, params ?? {});
    return result ?? null;
  }
  const found = TABLES[kind]?.[method];
  if (!found || !found.available(bridge)) fail(`${method} is not available`);
  const result = await found.run(bridge, params ?? {});
  return result === undefined ? null : result;
}

export function jsBridgeSubscribe(kind, callback) {
  const bridge = host(kind);
  if (!bridge) return null;
  if (kind === 'vk') {
    if (!fn(bridge.subscribe)) return null;
    const handler = (event) => {
      const detail = event?.detail;
      if (detail?.type) callback({ name: detail.type, data: detail.data ?? null });
    };
    bridge.subscribe(handler);
    return () => bridge.unsubscribe?.(handler);
  }
  if (kind === 'telegram') {
    if (!fn(bridge.onEvent)) return null;
    const handlers = Object.entries(TELEGRAM_EVENTS).map(([name, read]) => {
      const handler = () => callback({ name, data: read(bridge) });
      bridge.onEvent(name, handler);
      return [name, handler];
    });
    return () => handlers.forEach(([name, handler]) => bridge.offEvent?.(name, handler));
  }
  const back = bridge.BackButton;
  if (!fn(back?.onClick)) return null;
  const handler = () => callback({ name: 'backButtonClicked', data: null });
  const disposer = back.onClick(handler);
  return () => {
    if (fn(disposer)) {
      disposer();
    } else {
      back.offClick?.(handler);
    }
  };
}

export function jsBridgeIsWebView(kind) {
  const bridge = host(kind);
  if (kind !== 'vk' || !bridge || !fn(bridge.isWebView)) return null;
  return !!bridge.isWebView();
}

export function jsDetectionSignals(shellFlag) {
  if (typeof window === 'undefined') return null;
  const flag = window[shellFlag];
  return {
    shellPlatform: typeof flag === 'string' ? flag : null,
    hasTelegramObject: !!telegramHost(),
    hasMaxObject: !!maxHost(),
    search: window.location?.search ?? '',
    hash: window.location?.hash ?? '',
    userAgent: navigator.userAgent ?? '',
  };
}

function nativeBridge() {
  const bridge = typeof window === 'undefined' ? null : window.NativeBridge;
  return bridge && fn(bridge.postMessage) ? bridge : null;
}

export function jsShellAvailable() {
  return !!nativeBridge();
}

export function jsShellPostMessage(message) {
  const bridge = nativeBridge();
  if (!bridge) fail('NativeBridge is unavailable');
  bridge.postMessage(message);
}

export function jsShellInstallCallback(name, callback) {
  const handler = (payload) => callback(payload === undefined ? null : payload);
  window[name] = handler;
  return () => {
    if (window[name] === handler) delete window[name];
  };
}

export async function jsShare(payload) {
  if (!fn(navigator.share)) return false;
  await navigator.share({
    title: payload.title ?? undefined,
    text: payload.text ?? undefined,
    url: payload.url,
  });
  return true;
}

export async function jsCopyText(text) {
  if (!fn(navigator.clipboard?.writeText)) fail('Clipboard API is unavailable');
  await navigator.clipboard.writeText(text);
  return null;
}

export async function jsFetchBlobUrl(url) {
  const response = await fetch(url, { credentials: 'include' });
  if (!response.ok) fail(`Failed to download file: ${response.status}`);
  const blob = await response.blob();
  return URL.createObjectURL(blob);
}

let deferredInstallPrompt = null;

if (typeof window !== 'undefined') {
  window.addEventListener('beforeinstallprompt', (event) => {
    event.preventDefault();
    deferredInstallPrompt = event;
  });
}

export function jsInstallPromptAvailable() {
  return !!deferredInstallPrompt;
}

export async function jsShowInstallPrompt() {
  const prompt = deferredInstallPrompt;
  if (!prompt) return false;
  deferredInstallPrompt = null;
  await prompt.prompt();
  const choice = await prompt.userChoice;
  return choice?.outcome === 'accepted';
}

export async function jsScanQr() {
  if (typeof document === 'undefined') fail('QR scanning requires a browser environment');
  if (typeof BarcodeDetector === 'undefined') fail('BarcodeDetector is unavailable');
  if (!fn(navigator.mediaDevices?.getUserMedia)) fail('Camera access is unavailable');

  const stream = await navigator.mediaDevices.getUserMedia({ video: { facingMode: 'environment' } });
  const detector = new BarcodeDetector({ formats: ['qr_code'] });

  const overlay = document.createElement('div');
  Object.assign(overlay.style, {
    position: 'fixed', inset: '0', background: 'rgba(0, 0, 0, 0.9)', display: 'flex',
    alignItems: 'center', justifyContent: 'center', zIndex: '2147483647',
  });
  const video = document.createElement('video');
  Object.assign(video.style, { width: '280px', height: '280px', objectFit: 'cover', borderRadius: '16px' });
  video.muted = true;
  video.playsInline = true;
  video.srcObject = stream;
  const close = document.createElement('button');
  close.type = 'button';
  close.textContent = '✕';
  Object.assign(close.style, {
    position: 'absolute', top: '16px', right: '16px', background: 'transparent',
    border: 'none', color: '#fff', fontSize: '28px', cursor: 'pointer',
  });
  overlay.append(close, video);
  document.body.appendChild(overlay);
  const previousOverflow = document.body.style.overflow;
  document.body.style.overflow = 'hidden';
  await video.play().catch(() => {});

  return await new Promise((resolve) => {
    let done = false;
    const finish = (value) => {
      if (done) return;
      done = true;
      stream.getTracks().forEach((track) => track.stop());
      overlay.remove();
      document.body.style.overflow = previousOverflow;
      resolve(value);
    };
    close.addEventListener('click', () => finish(null));
    const tick = async () => {
      if (done) return;
      try {
        const codes = await detector.detect(video);
        if (codes.length && codes[0].rawValue) {
          finish(codes[0].rawValue);
          return;
        }
      } catch (_) {}
      requestAnimationFrame(tick);
    };
    requestAnimationFrame(tick);
  });
}

export function jsRequestPhoneViaEvent() {
  if (typeof window === 'undefined' || typeof CustomEvent !== 'function') return null;
  let provided = null;
  const detail = {
    providePromise(promise) {
      provided = Promise.resolve(promise);
    },
  };
  window.dispatchEvent(new CustomEvent('WebAppRequestPhone', { detail }));
  return provided;
}
"#)]
extern "C" {
    #[wasm_bindgen(js_name = jsBridgePresent)]
    fn js_bridge_present(kind: &str) -> bool;
    #[wasm_bindgen(js_name = jsBridgeHasMethod)]
    fn js_bridge_has_method(kind: &str, method: &str) -> bool;
    #[wasm_bindgen(js_name = jsBridgeHasProbe)]
    fn js_bridge_has_probe(kind: &str) -> bool;
    #[wasm_bindgen(js_name = jsBridgeProbe)]
    fn js_bridge_probe(kind: &str, method: &str) -> Promise;
    #[wasm_bindgen(js_name = jsBridgeCall)]
    fn js_bridge_call(kind: &str, method: &str, params: JsValue) -> Promise;
    #[wasm_bindgen(js_name = jsBridgeSubscribe)]
    fn js_bridge_subscribe(kind: &str, callback: &Closure<dyn FnMut(JsValue)>) -> JsValue;
    #[wasm_bindgen(js_name = jsBridgeIsWebView)]
    fn js_bridge_is_web_view(kind: &str) -> JsValue;

    #[wasm_bindgen(js_name = jsDetectionSignals)]
    fn js_detection_signals(shell_flag: &str) -> JsValue;

    #[wasm_bindgen(js_name = jsShellAvailable)]
    fn js_shell_available() -> bool;
    #[wasm_bindgen(catch, js_name = jsShellPostMessage)]
    fn js_shell_post_message(message: JsValue) -> Result<(), JsValue>;
    #[wasm_bindgen(js_name = jsShellInstallCallback)]
    fn js_shell_install_callback(name: &str, callback: &Closure<dyn FnMut(JsValue)>) -> JsValue;

    #[wasm_bindgen(js_name = jsShare)]
    fn js_share(payload: JsValue) -> Promise;
    #[wasm_bindgen(js_name = jsCopyText)]
    fn js_copy_text(text: &str) -> Promise;
    #[wasm_bindgen(js_name = jsFetchBlobUrl)]
    fn js_fetch_blob_url(url: &str) -> Promise;
    #[wasm_bindgen(js_name = jsInstallPromptAvailable)]
    fn js_install_prompt_available() -> bool;
    #[wasm_bindgen(js_name = jsShowInstallPrompt)]
    fn js_show_install_prompt() -> Promise;
    #[wasm_bindgen(js_name = jsScanQr)]
    fn js_scan_qr() -> Promise;
    #[wasm_bindgen(js_name = jsRequestPhoneViaEvent)]
    fn js_request_phone_via_event() -> JsValue;
}

#[derive(Deserialize)]
struct WireEvent {
    name: String,
    #[serde(default)]
    data: Value,
}

async fn await_promise(promise: Promise) -> Result<JsValue, String> {
    JsFuture::from(promise).await.map_err(js_error_to_string)
}

fn js_error_to_string(err: JsValue) -> String {
    if let Some(text) = err.as_string() {
        return text;
    }
    if let Ok(message) = js_sys::Reflect::get(&err, &JsValue::from_str("message")) {
        if let Some(text) = message.as_string() {
            return text;
        }
    }
    format!("{err:?}")
}

fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, String> {
    value
        .serialize(&Serializer::json_compatible())
        .map_err(|e| e.to_string())
}

fn to_json(value: JsValue) -> Result<Value, String> {
    if value.is_null() || value.is_undefined() {
        return Ok(Value::Null);
    }
    from_value(value).map_err(|e| e.to_string())
}

fn disposer_for(remove: JsValue, closure: Closure<dyn FnMut(JsValue)>) -> Disposer {
    let remove = remove.dyn_into::<Function>().ok();
    Disposer::new(move || {
        if let Some(remove) = remove {
            let _ = remove.call0(&JsValue::NULL);
        }
        drop(closure);
    })
}

pub fn bridge_present(kind: &str) -> bool {
    js_bridge_present(kind)
}

pub fn bridge_has_method(kind: &str, method: &str) -> bool {
    js_bridge_has_method(kind, method)
}

pub fn bridge_has_probe(kind: &str) -> bool {
    js_bridge_has_probe(kind)
}

pub async fn bridge_probe(kind: &str, method: &str) -> Result<bool, String> {
    let value = await_promise(js_bridge_probe(kind, method)).await?;
    Ok(value.as_bool().unwrap_or(false))
}

pub async fn bridge_call(kind: &str, method: &str, params: &Value) -> Result<Value, String> {
    let params = to_js(params)?;
    let value = await_promise(js_bridge_call(kind, method, params)).await?;
    to_json(value)
}

pub fn bridge_subscribe(kind: &str, handler: Rc<dyn Fn(&BridgeEvent)>) -> Option<Disposer> {
    let label = kind.to_string();
    let closure = Closure::<dyn FnMut(JsValue)>::wrap(Box::new(move |raw: JsValue| {
        match from_value::<WireEvent>(raw) {
            Ok(event) => handler(&BridgeEvent::new(event.name, event.data)),
            Err(err) => tracing::warn!("[miniapp-host] {label} event decode failed: {err}"),
        }
    }));
    let remove = js_bridge_subscribe(kind, &closure);
    if remove.is_null() || remove.is_undefined() {
        return None;
    }
    Some(disposer_for(remove, closure))
}

pub fn bridge_is_web_view(kind: &str) -> Option<bool> {
    js_bridge_is_web_view(kind).as_bool()
}

pub fn detection_signals(shell_flag: &str) -> Option<DetectionSignals> {
    let value = js_detection_signals(shell_flag);
    if value.is_null() || value.is_undefined() {
        return None;
    }
    from_value(value).ok()
}

pub fn shell_available() -> bool {
    js_shell_available()
}

pub fn shell_post_message(message: &Value) -> Result<(), String> {
    js_shell_post_message(to_js(message)?).map_err(js_error_to_string)
}

pub fn shell_install_callback(name: &str, handler: Rc<dyn Fn(Value)>) -> Disposer {
    let label = name.to_string();
    let closure = Closure::<dyn FnMut(JsValue)>::wrap(Box::new(move |raw: JsValue| {
        match to_json(raw) {
            Ok(payload) => handler(payload),
            Err(err) => tracing::warn!("[miniapp-host] {label} payload decode failed: {err}"),
        }
    }));
    let remove = js_shell_install_callback(name, &closure);
    disposer_for(remove, closure)
}

pub async fn share(payload: &SharePayload) -> Result<bool, String> {
    #[derive(Serialize)]
    struct WireShare<'a> {
        title: Option<&'a str>,
        text: Option<&'a str>,
        url: &'a str,
    }

    let wire = to_js(&WireShare {
        title: payload.title.as_deref(),
        text: payload.text.as_deref(),
        url: &payload.url,
    })?;
    let value = await_promise(js_share(wire)).await?;
    Ok(value.as_bool().unwrap_or(false))
}

pub async fn copy_text(text: &str) -> Result<(), String> {
    let _ = await_promise(js_copy_text(text)).await?;
    Ok(())
}

pub async fn fetch_blob_url(url: &str) -> Result<String, String> {
    let value = await_promise(js_fetch_blob_url(url)).await?;
    value
        .as_string()
        .ok_or_else(|| "object URL is not a string".to_string())
}

pub fn install_prompt() -> Option<BrowserFuture<'static, Result<bool, String>>> {
    if !js_install_prompt_available() {
        return None;
    }
    let promise = js_show_install_prompt();
    Some(Box::pin(async move {
        let value = await_promise(promise).await?;
        Ok(value.as_bool().unwrap_or(false))
    }))
}

pub async fn scan_qr() -> Result<Option<String>, String> {
    let value = await_promise(js_scan_qr()).await?;
    Ok(value.as_string())
}

pub fn request_phone_via_event() -> Option<BrowserFuture<'static, Result<Value, String>>> {
    let promise = js_request_phone_via_event().dyn_into::<Promise>().ok()?;
    Some(Box::pin(async move {
        let value = await_promise(promise).await?;
        to_json(value)
    }))
}
