//! Leptos bindings for mini-app adapters.
//!
//! [`AdapterProvider`] places one [`miniapp_host::MiniAppAdapter`] in context; the hooks read it
//! back and turn adapter notifications into signals.

#![warn(missing_docs, rustdoc::broken_intra_doc_links)]

mod provider;
mod safe_area;
pub mod theme;

pub use provider::{use_miniapp_adapter, AdapterProvider, MiniAppAdapterContext};
pub use safe_area::{safe_area_signal, use_safe_area};
pub use theme::{
    adapter_theme, resolve_is_dark, use_adapter_theme, AdapterTheme, ThemePreference,
    THEME_PREFERENCE_KEY,
};
