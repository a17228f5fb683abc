//! Platform identity and environment snapshot models.

use serde::{Deserialize, Serialize};

use crate::insets::Insets;

/// Host runtime a mini-app is embedded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    /// Telegram Mini Apps.
    Telegram,
    /// VK Mini Apps.
    Vk,
    /// MAX messenger mini-apps.
    Max,
    /// Native iOS shell wrapping the web app.
    ShellIos,
    /// Native Android shell wrapping the web app.
    ShellAndroid,
    /// Plain browser tab.
    Web,
}

impl Platform {
    /// Stable string token used in caches, logs and bridge flags.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Telegram => "telegram",
            Self::Vk => "vk",
            Self::Max => "max",
            Self::ShellIos => "shell_ios",
            Self::ShellAndroid => "shell_android",
            Self::Web => "web",
        }
    }

    /// Parses a stable token back into a platform.
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim() {
            "telegram" => Some(Self::Telegram),
            "vk" => Some(Self::Vk),
            "max" => Some(Self::Max),
            "shell_ios" => Some(Self::ShellIos),
            "shell_android" => Some(Self::ShellAndroid),
            "web" => Some(Self::Web),
            _ => None,
        }
    }

    /// Returns whether the platform is one of the native shell wrappers.
    pub const fn is_shell(self) -> bool {
        matches!(self, Self::ShellIos | Self::ShellAndroid)
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Colour scheme reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Appearance {
    /// Dark scheme.
    Dark,
    /// Light scheme.
    Light,
}

impl Appearance {
    /// Stable string token.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Dark => "dark",
            Self::Light => "light",
        }
    }

    /// Maps a boolean "is dark" flag to an appearance.
    pub const fn from_is_dark(is_dark: bool) -> Self {
        if is_dark {
            Self::Dark
        } else {
            Self::Light
        }
    }

    /// Parses `dark` / `light` case-insensitively.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "dark" => Some(Self::Dark),
            "light" => Some(Self::Light),
            _ => None,
        }
    }
}

/// Snapshot of what the host platform reported about the current session.
///
/// Owned by one adapter; consumers always receive a clone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentInfo {
    /// Platform the adapter targets.
    pub platform: Platform,
    /// Host SDK or client version.
    pub sdk_version: Option<String>,
    /// Mini-app or host application version.
    pub app_version: Option<String>,
    /// User language code.
    pub language_code: Option<String>,
    /// Current colour scheme, when known.
    pub appearance: Option<Appearance>,
    /// Whether the app runs inside a native webview.
    pub is_web_view: Option<bool>,
    /// Last reconciled safe area.
    pub safe_area: Option<Insets>,
}

impl EnvironmentInfo {
    /// Environment with only the platform filled in.
    pub const fn new(platform: Platform) -> Self {
        Self {
            platform,
            sdk_version: None,
            app_version: None,
            language_code: None,
            appearance: None,
            is_web_view: None,
            safe_area: None,
        }
    }
}

/// Options accepted by [`crate::MiniAppAdapter::init`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InitOptions {
    /// Verbose logging for platforms that support it.
    pub debug: bool,
    /// Devtools injection request. Accepted for parity; devtools are not injected.
    pub eruda: bool,
    /// Vendor-mocking request for desktop clients. Accepted for parity; no mocking is installed.
    pub mock_for_macos: bool,
}
