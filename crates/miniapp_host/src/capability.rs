//! Capability vocabulary and the per-adapter capability table.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Optional host feature whose availability varies by platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Haptic feedback.
    Haptics,
    /// Native popup dialogs.
    Popup,
    /// QR code scanning.
    QrScanner,
    /// Closing the mini-app.
    CloseApp,
    /// Native back button events.
    BackButton,
    /// Toggling the native back button.
    BackButtonVisibility,
    /// Binding host theme variables to CSS custom properties.
    BindCssVariables,
    /// Requesting the user's phone number.
    RequestPhone,
    /// Push/notification permission.
    Notifications,
    /// Opening platform-internal links.
    OpenInternalLink,
    /// Native file download.
    DownloadFile,
    /// Sharing media to stories.
    ShareStory,
    /// Fullscreen mode.
    Fullscreen,
    /// Adding the app to the device home screen.
    HomeScreen,
}

impl Capability {
    /// Stable identifier used in diagnostics.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Haptics => "haptics",
            Self::Popup => "popup",
            Self::QrScanner => "qrScanner",
            Self::CloseApp => "closeApp",
            Self::BackButton => "backButton",
            Self::BackButtonVisibility => "backButtonVisibility",
            Self::BindCssVariables => "bindCssVariables",
            Self::RequestPhone => "requestPhone",
            Self::Notifications => "notifications",
            Self::OpenInternalLink => "openInternalLink",
            Self::DownloadFile => "downloadFile",
            Self::ShareStory => "shareStory",
            Self::Fullscreen => "fullscreen",
            Self::HomeScreen => "homeScreen",
        }
    }
}

/// Availability of one capability on the active host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityStatus {
    /// Usable immediately.
    Available,
    /// Not implemented by the host.
    #[default]
    Unavailable,
    /// Present but gated behind an explicit user action or permission prompt.
    RequiresUserActivation,
}

impl CapabilityStatus {
    /// Returns whether the capability can be used immediately.
    pub const fn is_available(self) -> bool {
        matches!(self, Self::Available)
    }

    /// `Available` when `present`, `Unavailable` otherwise.
    pub const fn from_presence(present: bool) -> Self {
        if present {
            Self::Available
        } else {
            Self::Unavailable
        }
    }
}

/// Capability table computed once when an adapter is constructed.
///
/// Replaces repeated runtime existence checks: adapters resolve every primitive they rely on up
/// front and answer `supports` with a lookup.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PlatformCapabilities {
    entries: BTreeMap<Capability, CapabilityStatus>,
}

impl PlatformCapabilities {
    /// Table where every capability is unavailable.
    pub fn none() -> Self {
        Self::default()
    }

    /// Returns a copy with `capability` set to `status`.
    #[must_use]
    pub fn with(mut self, capability: Capability, status: CapabilityStatus) -> Self {
        self.set(capability, status);
        self
    }

    /// Returns a copy with `capability` available when `present`.
    #[must_use]
    pub fn with_presence(self, capability: Capability, present: bool) -> Self {
        self.with(capability, CapabilityStatus::from_presence(present))
    }

    /// Updates one entry in place.
    pub fn set(&mut self, capability: Capability, status: CapabilityStatus) {
        self.entries.insert(capability, status);
    }

    /// Status for `capability`; unlisted entries are unavailable.
    pub fn status(&self, capability: Capability) -> CapabilityStatus {
        self.entries.get(&capability).copied().unwrap_or_default()
    }

    /// Shorthand for `status(capability).is_available()`.
    pub fn is_available(&self, capability: Capability) -> bool {
        self.status(capability).is_available()
    }

    /// Iterates over the explicitly listed capabilities.
    pub fn iter(&self) -> impl Iterator<Item = (Capability, CapabilityStatus)> + '_ {
        self.entries
            .iter()
            .map(|(capability, status)| (*capability, *status))
    }
}
