//! Host platform detection and its session cache.

use miniapp_host::{Platform, StorageArea};
use serde::{Deserialize, Serialize};

use crate::params::LocationParams;

/// Storage key of the cached detection result.
pub const PLATFORM_CACHE_KEY: &str = "miniapp-host.platform";

const TELEGRAM_PARAMS: [&str; 4] = [
    "tgWebAppPlatform",
    "tgWebAppVersion",
    "tgWebAppData",
    "tgWebAppLanguage",
];
const VK_PARAMS: [&str; 2] = ["vk_app_id", "vk_platform"];

/// Everything detection looks at, captured from the page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DetectionSignals {
    /// Value of the native shell's platform flag global.
    pub shell_platform: Option<String>,
    /// Whether `Telegram.WebApp` exists.
    pub has_telegram_object: bool,
    /// Whether `WebApp` or `MaxMiniApp` exists.
    pub has_max_object: bool,
    /// `location.search`.
    pub search: String,
    /// `location.hash`.
    pub hash: String,
    /// `navigator.userAgent`.
    pub user_agent: String,
}

impl DetectionSignals {
    /// Reads signals from the current page; empty signals outside a browser.
    pub fn current(shell_flag: &str) -> Self {
        crate::bridge::interop::detection_signals(shell_flag).unwrap_or_default()
    }
}

/// Picks the host platform.
///
/// Precedence: native shell flag, Telegram (SDK object, `tgWebApp*` launch parameters in the
/// query or hash, or a Telegram user agent), MAX (SDK object), VK (`vk_app_id` / `vk_platform`
/// parameters), then plain web.
pub fn detect_platform(signals: &DetectionSignals) -> Platform {
    if let Some(shell) = signals
        .shell_platform
        .as_deref()
        .and_then(Platform::parse)
        .filter(|platform| platform.is_shell())
    {
        return shell;
    }

    let params = LocationParams::parse(&signals.search, &signals.hash);
    if signals.has_telegram_object
        || params.has_any(&TELEGRAM_PARAMS)
        || signals.user_agent.to_lowercase().contains("telegram")
    {
        return Platform::Telegram;
    }

    if signals.has_max_object {
        return Platform::Max;
    }

    if params.has_any(&VK_PARAMS) {
        return Platform::Vk;
    }

    Platform::Web
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedPlatform {
    platform: Platform,
    ts: u64,
}

/// Remembers a non-web detection result for a limited time.
///
/// Launch parameters disappear after client-side navigation; the cache keeps the session on the
/// right adapter. Entries are JSON `{platform, ts}`; missing, corrupt or expired entries are a
/// miss, and corrupt or expired ones are removed.
#[derive(Debug, Clone)]
pub struct PlatformCache<S> {
    storage: S,
    ttl_ms: u64,
}

impl<S: StorageArea> PlatformCache<S> {
    /// Cache over `storage` with entries valid for `ttl_ms`.
    pub fn new(storage: S, ttl_ms: u64) -> Self {
        Self { storage, ttl_ms }
    }

    /// Cached platform, if a fresh entry exists.
    pub fn load(&self, now_ms: u64) -> Option<Platform> {
        let raw = match self.storage.get(PLATFORM_CACHE_KEY) {
            Ok(raw) => raw?,
            Err(err) => {
                tracing::warn!("[miniapp-host] platform cache read failed: {err}");
                return None;
            }
        };
        let Ok(entry) = serde_json::from_str::<CachedPlatform>(&raw) else {
            self.clear();
            return None;
        };
        let expired = now_ms.saturating_sub(entry.ts) > self.ttl_ms || entry.ts > now_ms;
        if expired || entry.platform == Platform::Web {
            self.clear();
            return None;
        }
        Some(entry.platform)
    }

    /// Stores `platform`; web results are never stored.
    pub fn store(&self, platform: Platform, now_ms: u64) {
        if platform == Platform::Web {
            return;
        }
        let entry = CachedPlatform {
            platform,
            ts: now_ms,
        };
        let result = serde_json::to_string(&entry)
            .map_err(|err| err.to_string())
            .and_then(|raw| self.storage.set(PLATFORM_CACHE_KEY, &raw));
        if let Err(err) = result {
            tracing::warn!("[miniapp-host] platform cache write failed: {err}");
        }
    }

    /// Drops the cached entry.
    pub fn clear(&self) {
        if let Err(err) = self.storage.remove(PLATFORM_CACHE_KEY) {
            tracing::warn!("[miniapp-host] platform cache clear failed: {err}");
        }
    }
}

/// Detects the platform, consulting `cache` only when live signals say plain web.
///
/// Live non-web results refresh the cache.
pub fn detect_platform_cached<S: StorageArea>(
    signals: &DetectionSignals,
    cache: &PlatformCache<S>,
    now_ms: u64,
) -> Platform {
    let detected = detect_platform(signals);
    if detected != Platform::Web {
        cache.store(detected, now_ms);
        return detected;
    }
    cache.load(now_ms).unwrap_or(Platform::Web)
}
