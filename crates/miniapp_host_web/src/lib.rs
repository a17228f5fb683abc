//! Browser (`wasm32`) platform adapters for [`miniapp_host`].
//!
//! This crate wires the portable adapter contract to concrete hosts: Telegram, VK, MAX, the
//! native iOS/Android shells and a plain browser tab. It also owns platform detection with its
//! session cache and the browser implementations of the host service traits.
//!
//! Host SDK access goes through `bridge/`:
//! - `bridge::JsBridge` (one `PlatformBridge` per SDK global)
//! - `bridge::interop` (shared wasm/non-wasm transport glue)
//!
//! Off-wasm builds compile against inert interop shims, so every adapter can be tested with
//! `MemoryBridge` and `MemoryBrowserHost`.

#![warn(missing_docs, rustdoc::broken_intra_doc_links)]

/// Adapter factory and page-level platform detection.
pub mod adapters;
mod bridge;
pub mod browser;
pub mod detect;
pub mod max;
pub mod params;
pub mod scheduler;
pub mod shell;
pub mod storage;
pub mod telegram;
pub mod vk;
pub mod web;

pub use adapters::{create_adapter, current_platform, detect_current_platform, web_adapter_deps};
pub use bridge::{BridgeKind, JsBridge};
pub use browser::{WebBrowserHost, WindowEvents};
pub use detect::{
    detect_platform, detect_platform_cached, DetectionSignals, PlatformCache, PLATFORM_CACHE_KEY,
};
pub use max::MaxAdapter;
pub use params::{encode_component, LocationParams, QueryParams};
pub use scheduler::WebScheduler;
pub use shell::{
    MemoryShellTransport, ShellAdapter, ShellBridge, ShellCommand, ShellTransport,
    WebShellTransport,
};
pub use storage::WebStorageArea;
pub use telegram::TelegramAdapter;
pub use vk::VkAdapter;
pub use web::WebAdapter;
