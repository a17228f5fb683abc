//! Request and response shapes for UI affordances (popups, scanning, haptics, theming, sharing).

use serde::{Deserialize, Serialize};

/// Popup button style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PopupButtonKind {
    /// Regular button.
    #[default]
    Default,
    /// Confirmation button.
    Ok,
    /// Destructive action button.
    Destructive,
}

impl PopupButtonKind {
    /// Host wire token.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Ok => "ok",
            Self::Destructive => "destructive",
        }
    }
}

/// One popup button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopupButton {
    /// Identifier returned when the button is pressed.
    pub id: String,
    /// Label; hosts show the id when missing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Button style.
    #[serde(default, rename = "type")]
    pub kind: PopupButtonKind,
}

impl PopupButton {
    /// Default-styled button.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: Some(text.into()),
            kind: PopupButtonKind::Default,
        }
    }

    /// Returns a copy with `kind`.
    #[must_use]
    pub fn with_kind(mut self, kind: PopupButtonKind) -> Self {
        self.kind = kind;
        self
    }
}

/// Popup request.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PopupOptions {
    /// Title line.
    pub title: String,
    /// Body text.
    pub message: String,
    /// Buttons in display order.
    #[serde(default)]
    pub buttons: Vec<PopupButton>,
}

impl PopupOptions {
    /// Text shown by the `alert` fallback: non-empty title and message separated by a blank line.
    pub fn alert_text(&self) -> String {
        [self.title.as_str(), self.message.as_str()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Button id the `alert` fallback resolves with.
    pub fn fallback_button_id(&self) -> String {
        self.buttons
            .first()
            .map_or_else(|| "ok".to_string(), |button| button.id.clone())
    }
}

/// QR scanner request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QrScanOptions {
    /// Close the scanner as soon as a code is captured.
    pub close_on_capture: bool,
}

impl Default for QrScanOptions {
    fn default() -> Self {
        Self {
            close_on_capture: true,
        }
    }
}

/// Header/background/footer colours (CSS colour strings).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorScheme {
    /// Header or action bar colour.
    pub header: Option<String>,
    /// Page background colour.
    pub background: Option<String>,
    /// Bottom bar colour.
    pub footer: Option<String>,
}

impl ColorScheme {
    /// Returns whether no colour is set.
    pub fn is_empty(&self) -> bool {
        self.header.is_none() && self.background.is_none() && self.footer.is_none()
    }
}

/// Impact haptic strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HapticImpactStyle {
    /// Light tap.
    Light,
    /// Medium tap.
    Medium,
    /// Heavy tap.
    Heavy,
    /// Rigid tap.
    Rigid,
    /// Soft tap.
    Soft,
}

impl HapticImpactStyle {
    /// Host wire token.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Medium => "medium",
            Self::Heavy => "heavy",
            Self::Rigid => "rigid",
            Self::Soft => "soft",
        }
    }
}

/// Notification haptic type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HapticNotificationType {
    /// Failure.
    Error,
    /// Success.
    Success,
    /// Warning.
    Warning,
}

impl HapticNotificationType {
    /// Host wire token.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Success => "success",
            Self::Warning => "warning",
        }
    }
}

/// Link widget attached to a shared story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryWidgetLink {
    /// Target URL.
    pub url: String,
    /// Optional label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Story share request extras.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShareStoryOptions {
    /// Caption.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Link widget.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub widget_link: Option<StoryWidgetLink>,
}

/// Home screen shortcut state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HomeScreenStatus {
    /// Shortcut exists.
    Added,
    /// Shortcut can be added.
    NotAdded,
    /// Host cannot tell.
    Unknown,
    /// Host-specific status token.
    Other(String),
}

impl HomeScreenStatus {
    /// Maps a host token onto a status.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "added" => Self::Added,
            "not_added" | "missed" => Self::NotAdded,
            "unknown" | "" => Self::Unknown,
            other => Self::Other(other.to_string()),
        }
    }

    /// Token form.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Added => "added",
            Self::NotAdded => "not_added",
            Self::Unknown => "unknown",
            Self::Other(other) => other,
        }
    }
}
