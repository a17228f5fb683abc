//! Adapter factory and page-level platform detection.

use std::rc::Rc;

use miniapp_host::{
    miniapp_context, unix_time_ms_now, AdapterConfig, AdapterDeps, MiniAppAdapter, Platform,
};

use crate::{
    bridge::{BridgeKind, JsBridge},
    browser::WebBrowserHost,
    detect::{detect_platform_cached, DetectionSignals, PlatformCache},
    max::MaxAdapter,
    scheduler::WebScheduler,
    shell::{ShellAdapter, WebShellTransport},
    storage::WebStorageArea,
    telegram::TelegramAdapter,
    vk::VkAdapter,
    web::WebAdapter,
};

/// Browser-backed services for adapters running in the page.
pub fn web_adapter_deps(config: AdapterConfig) -> AdapterDeps {
    AdapterDeps::new(
        Rc::new(WebBrowserHost::new()),
        Rc::new(WebScheduler),
        config,
    )
}

/// Builds the adapter for `platform` over the page's host SDK globals.
pub fn create_adapter(platform: Platform, deps: AdapterDeps) -> Rc<dyn MiniAppAdapter> {
    tracing::debug!("[miniapp-host] creating {platform} adapter");
    match platform {
        Platform::ShellIos | Platform::ShellAndroid => {
            Rc::new(ShellAdapter::new(platform, Rc::new(WebShellTransport), deps))
        }
        Platform::Telegram => Rc::new(TelegramAdapter::new(
            JsBridge::shared(BridgeKind::Telegram),
            deps,
        )),
        Platform::Vk => Rc::new(VkAdapter::new(JsBridge::shared(BridgeKind::Vk), deps)),
        Platform::Max => Rc::new(MaxAdapter::new(JsBridge::shared(BridgeKind::Max), deps)),
        Platform::Web => Rc::new(WebAdapter::new(deps)),
    }
}

/// Detects the platform from the page, rescued by the session cache when launch parameters
/// were lost to client-side navigation.
pub fn detect_current_platform(config: &AdapterConfig) -> Platform {
    let signals = DetectionSignals::current(&config.shell_bridge.platform_flag);
    let cache = PlatformCache::new(WebStorageArea::Session, config.detection_cache_ttl_ms);
    detect_platform_cached(&signals, &cache, unix_time_ms_now())
}

/// Platform of the active adapter, else the context's cached or freshly detected platform.
pub fn current_platform(config: &AdapterConfig) -> Platform {
    miniapp_context().platform(|| detect_current_platform(config))
}
