//! Adapter configuration loaded from JSON or built in code.

use serde::{Deserialize, Serialize};

use crate::error::AdapterError;

/// Default lifetime of a cached platform detection result (30 minutes).
pub const DEFAULT_DETECTION_CACHE_TTL_MS: u64 = 30 * 60 * 1000;
/// Default wait for a native shell QR result.
pub const DEFAULT_SHELL_QR_TIMEOUT_MS: u32 = 60_000;
/// Default delay before a blob download URL is revoked.
pub const DEFAULT_BLOB_URL_REVOKE_MS: u32 = 30_000;
/// Default viewport width at or below which VK overlay controls are assumed.
pub const DEFAULT_OVERLAY_BREAKPOINT_PX: f64 = 880.0;

/// Global names the native shell uses to reach into the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellBridgeNames {
    /// Global flag holding `shell_ios` / `shell_android`.
    pub platform_flag: String,
    /// Callback receiving a push token string.
    pub push_token_callback: String,
    /// Callback receiving a scanned QR value.
    pub qr_result_callback: String,
    /// Callback receiving a deep-link path.
    pub deep_link_callback: String,
    /// Callback fired when the app returns to the foreground.
    pub app_active_callback: String,
    /// Callback fired when the app moves to the background.
    pub app_background_callback: String,
}

impl Default for ShellBridgeNames {
    fn default() -> Self {
        Self {
            platform_flag: "nativePlatform".to_string(),
            push_token_callback: "nativePushToken".to_string(),
            qr_result_callback: "nativeQRResult".to_string(),
            deep_link_callback: "nativeDeepLink".to_string(),
            app_active_callback: "nativeAppActive".to_string(),
            app_background_callback: "nativeAppBackground".to_string(),
        }
    }
}

impl ShellBridgeNames {
    /// Callback names paired with their role, in installation order.
    pub fn callbacks(&self) -> [(ShellCallback, &str); 5] {
        [
            (ShellCallback::PushToken, self.push_token_callback.as_str()),
            (ShellCallback::DeepLink, self.deep_link_callback.as_str()),
            (ShellCallback::AppActive, self.app_active_callback.as_str()),
            (
                ShellCallback::AppBackground,
                self.app_background_callback.as_str(),
            ),
            (ShellCallback::QrResult, self.qr_result_callback.as_str()),
        ]
    }
}

/// Role of one shell global callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ShellCallback {
    /// Push token delivery.
    PushToken,
    /// Deep-link delivery.
    DeepLink,
    /// Foreground notification.
    AppActive,
    /// Background notification.
    AppBackground,
    /// QR scan result.
    QrResult,
}

/// Tunables shared by detection and the platform adapters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// Enables verbose adapter logging and host SDK debug modes.
    pub debug: bool,
    /// Lifetime of the session detection cache.
    pub detection_cache_ttl_ms: u64,
    /// Wait for a native shell QR result before rejecting.
    pub shell_qr_timeout_ms: u32,
    /// Native shell global names.
    pub shell_bridge: ShellBridgeNames,
    /// VK retargeting pixel code; blank values are treated as unset.
    pub vk_pixel_code: Option<String>,
    /// Delay before revoking blob URLs created for downloads.
    pub blob_url_revoke_ms: u32,
    /// Viewport width at or below which the VK overlay heuristic applies.
    pub overlay_breakpoint_px: f64,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            debug: false,
            detection_cache_ttl_ms: DEFAULT_DETECTION_CACHE_TTL_MS,
            shell_qr_timeout_ms: DEFAULT_SHELL_QR_TIMEOUT_MS,
            shell_bridge: ShellBridgeNames::default(),
            vk_pixel_code: None,
            blob_url_revoke_ms: DEFAULT_BLOB_URL_REVOKE_MS,
            overlay_breakpoint_px: DEFAULT_OVERLAY_BREAKPOINT_PX,
        }
    }
}

impl AdapterConfig {
    /// Parses a JSON document; missing fields keep their defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, AdapterError> {
        let mut config: Self = serde_json::from_str(raw)?;
        config.vk_pixel_code = normalize_pixel_code(config.vk_pixel_code.as_deref());
        Ok(config)
    }

    /// Returns the pixel code with surrounding whitespace removed.
    pub fn pixel_code(&self) -> Option<&str> {
        self.vk_pixel_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
    }
}

/// Trims a pixel code; blank input clears it.
pub fn normalize_pixel_code(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|code| !code.is_empty())
        .map(str::to_string)
}
