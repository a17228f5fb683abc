//! Inset value types shared by the safe-area reconciler, adapters and UI hooks.

use serde::{Deserialize, Serialize};

/// Four-edge inset rectangle in CSS pixels.
///
/// Values are plain numbers; "updating" an inset always produces a new value.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Insets {
    /// Top edge.
    pub top: f64,
    /// Right edge.
    pub right: f64,
    /// Bottom edge.
    pub bottom: f64,
    /// Left edge.
    pub left: f64,
}

impl Insets {
    /// All-zero inset.
    pub const ZERO: Self = Self {
        top: 0.0,
        right: 0.0,
        bottom: 0.0,
        left: 0.0,
    };

    /// Builds an inset from explicit edges.
    pub const fn new(top: f64, right: f64, bottom: f64, left: f64) -> Self {
        Self {
            top,
            right,
            bottom,
            left,
        }
    }

    /// Builds a full inset from a partial payload, reading missing or non-finite edges as zero.
    pub fn normalized(partial: &PartialInsets) -> Self {
        Self {
            top: finite_or_zero(partial.top),
            right: finite_or_zero(partial.right),
            bottom: finite_or_zero(partial.bottom),
            left: finite_or_zero(partial.left),
        }
    }

    /// Exact per-edge equality used for change detection.
    #[allow(clippy::float_cmp)]
    pub fn same_edges(&self, other: &Self) -> bool {
        self.top == other.top
            && self.right == other.right
            && self.bottom == other.bottom
            && self.left == other.left
    }

    /// Returns whether every edge is zero.
    pub fn is_zero(&self) -> bool {
        self.same_edges(&Self::ZERO)
    }

    pub(crate) fn edges_mut(&mut self) -> [&mut f64; 4] {
        [
            &mut self.top,
            &mut self.right,
            &mut self.bottom,
            &mut self.left,
        ]
    }
}

impl From<Insets> for PartialInsets {
    fn from(value: Insets) -> Self {
        Self {
            top: Some(value.top),
            right: Some(value.right),
            bottom: Some(value.bottom),
            left: Some(value.left),
        }
    }
}

/// Inset payload as reported by a platform, where any edge may be missing.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PartialInsets {
    /// Top edge, if reported.
    #[serde(default)]
    pub top: Option<f64>,
    /// Right edge, if reported.
    #[serde(default)]
    pub right: Option<f64>,
    /// Bottom edge, if reported.
    #[serde(default)]
    pub bottom: Option<f64>,
    /// Left edge, if reported.
    #[serde(default)]
    pub left: Option<f64>,
}

impl PartialInsets {
    /// Partial inset with only the top edge set.
    pub const fn top(value: f64) -> Self {
        Self {
            top: Some(value),
            right: None,
            bottom: None,
            left: None,
        }
    }

    pub(crate) fn edges(&self) -> [Option<f64>; 4] {
        [self.top, self.right, self.bottom, self.left]
    }

    /// Reads a partial inset out of a loosely typed JSON object.
    ///
    /// Numeric strings are accepted because some hosts serialize insets as text.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        let object = value.as_object()?;
        let edge = |key: &str| {
            object.get(key).and_then(|raw| match raw {
                serde_json::Value::Number(number) => number.as_f64(),
                serde_json::Value::String(text) => text.trim().parse::<f64>().ok(),
                _ => None,
            })
        };
        Some(Self {
            top: edge("top"),
            right: edge("right"),
            bottom: edge("bottom"),
            left: edge("left"),
        })
    }
}

/// Viewport-reported insets: device safe area and host content safe area.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ViewportInsets {
    /// Device safe area (notch, home indicator).
    #[serde(default)]
    pub safe_area: Option<PartialInsets>,
    /// Area covered by host-app chrome inside the device safe area.
    #[serde(default)]
    pub content_safe_area: Option<PartialInsets>,
}

pub(crate) fn finite_or_zero(value: Option<f64>) -> f64 {
    match value {
        Some(number) if number.is_finite() => number,
        _ => 0.0,
    }
}
