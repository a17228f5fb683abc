//! Host SDK bridges backed by the JS interop layer.
//!
//! Each [`BridgeKind`] maps to one global SDK object (`Telegram.WebApp`, `vkBridge`,
//! `WebApp`). [`JsBridge`] exposes it through the [`PlatformBridge`] contract so adapters can be
//! exercised against `MemoryBridge` off-wasm and against the real SDK in the browser.

pub(crate) mod interop;

use std::{future::Future, rc::Rc};

use miniapp_host::{AdapterError, BridgeEvent, BridgeFuture, Disposer, PlatformBridge};
use serde_json::Value;

/// Host SDK targeted by a [`JsBridge`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BridgeKind {
    /// `window.Telegram.WebApp`.
    Telegram,
    /// `window.vkBridge`.
    Vk,
    /// `window.WebApp` (MAX).
    Max,
}

impl BridgeKind {
    /// Interop token for the kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Telegram => "telegram",
            Self::Vk => "vk",
            Self::Max => "max",
        }
    }
}

/// [`PlatformBridge`] over a global host SDK object.
#[derive(Debug, Clone, Copy)]
pub struct JsBridge {
    kind: BridgeKind,
}

impl JsBridge {
    /// Bridge for `kind`.
    pub const fn new(kind: BridgeKind) -> Self {
        Self { kind }
    }

    /// Shared handle, as adapters expect.
    pub fn shared(kind: BridgeKind) -> Rc<dyn PlatformBridge> {
        Rc::new(Self::new(kind))
    }
}

impl PlatformBridge for JsBridge {
    fn label(&self) -> &'static str {
        self.kind.as_str()
    }

    fn is_present(&self) -> bool {
        interop::bridge_present(self.kind.as_str())
    }

    fn has_method(&self, method: &str) -> bool {
        interop::bridge_has_method(self.kind.as_str(), method)
    }

    fn probe<'a>(
        &'a self,
        method: &'a str,
    ) -> Option<BridgeFuture<'a, Result<bool, AdapterError>>> {
        if !interop::bridge_has_probe(self.kind.as_str()) {
            return None;
        }
        Some(Box::pin(async move {
            interop::bridge_probe(self.kind.as_str(), method)
                .await
                .map_err(|message| AdapterError::bridge("supportsAsync", message))
        }))
    }

    fn call<'a>(
        &'a self,
        method: &'a str,
        params: Value,
    ) -> BridgeFuture<'a, Result<Value, AdapterError>> {
        Box::pin(async move {
            interop::bridge_call(self.kind.as_str(), method, &params)
                .await
                .map_err(|message| AdapterError::bridge(method, message))
        })
    }

    fn subscribe(&self, handler: Rc<dyn Fn(&BridgeEvent)>) -> Option<Disposer> {
        interop::bridge_subscribe(self.kind.as_str(), handler)
    }

    fn is_web_view(&self) -> Option<bool> {
        interop::bridge_is_web_view(self.kind.as_str())
    }
}

/// Runs a bridge request whose result nobody awaits.
///
/// Sync adapter operations (back button bookkeeping, CSS binding) use this. Off-wasm the future
/// is driven to completion in place.
pub(crate) fn spawn_detached(future: impl Future<Output = ()> + 'static) {
    #[cfg(target_arch = "wasm32")]
    {
        wasm_bindgen_futures::spawn_local(future);
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        futures::executor::block_on(future);
    }
}

/// Fires `method` on `bridge` and logs a failure.
pub(crate) fn fire(bridge: &Rc<dyn PlatformBridge>, method: &'static str, params: Value) {
    let bridge = bridge.clone();
    spawn_detached(async move {
        if let Err(err) = bridge.call(method, params).await {
            tracing::warn!("[miniapp-host] {} {method} failed: {err}", bridge.label());
        }
    });
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use pretty_assertions::assert_eq;

    use super::*;

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn js_bridge_is_absent_off_wasm() {
        let bridge = JsBridge::new(BridgeKind::Vk);

        assert_eq!(bridge.label(), "vk");
        assert!(!bridge.is_present());
        assert!(bridge.probe("VKWebAppTapticImpactOccurred").is_none());
        let err = block_on(bridge.call("VKWebAppInit", Value::Null)).expect_err("no sdk");
        assert!(matches!(err, AdapterError::Bridge { ref method, .. } if method == "VKWebAppInit"));
        assert!(bridge.subscribe(Rc::new(|_: &BridgeEvent| {})).is_none());
    }
}
