//! Typed contracts and portable mechanisms for embedding a web app in messenger mini-app hosts.
//!
//! This crate is the target-independent half of the adapter layer. It owns the safe-area
//! reconciler, the disposable registry, listener fan-out, capability tables, strategy dispatch,
//! the bridge/browser/scheduler/storage service traits (with `Noop*` and `Memory*`
//! implementations) and the [`MiniAppAdapter`] contract with its portable defaults. Concrete
//! platform adapters and browser glue live in `miniapp_host_web`.

#![warn(missing_docs, rustdoc::broken_intra_doc_links)]

pub mod adapter;
pub mod bridge;
pub mod browser;
pub mod capability;
pub mod config;
pub mod context;
pub mod disposables;
pub mod dispatch;
pub mod download;
pub mod environment;
pub mod error;
pub mod insets;
pub mod listeners;
pub mod phone;
pub mod safe_area;
pub mod scheduler;
pub mod storage;
pub mod time;
pub mod ui;
pub mod watcher;

pub use adapter::{
    default_close_app, default_compute_safe_area, default_copy_text, default_download_file,
    default_on_back_button, default_open_link, default_set_colors, default_share_url,
    default_show_popup, log_ignored_init_options, AdapterCore, AdapterDeps, AdapterFuture,
    Callback, MiniAppAdapter,
};
pub use bridge::{
    is_bridge_method_supported, BridgeEvent, BridgeFuture, MemoryBridge, NoopBridge,
    PlatformBridge,
};
pub use browser::{
    BrowserFuture, BrowserHost, MemoryBrowserHost, MemoryBrowserState, NoopBrowserHost,
    SharePayload,
};
pub use capability::{Capability, CapabilityStatus, PlatformCapabilities};
pub use config::{
    normalize_pixel_code, AdapterConfig, ShellBridgeNames, ShellCallback,
    DEFAULT_BLOB_URL_REVOKE_MS, DEFAULT_DETECTION_CACHE_TTL_MS, DEFAULT_OVERLAY_BREAKPOINT_PX,
    DEFAULT_SHELL_QR_TIMEOUT_MS,
};
pub use context::{miniapp_context, MiniAppContext};
pub use disposables::{Disposable, DisposableBag, Dispose, Disposer};
pub use dispatch::{Attempt, DispatchOutcome, DispatchState, StrategyChain};
pub use download::{fallback_file_name, trigger_file_download, DownloadOptions};
pub use environment::{Appearance, EnvironmentInfo, InitOptions, Platform};
pub use error::AdapterError;
pub use insets::{Insets, PartialInsets, ViewportInsets};
pub use listeners::{Listener, ListenerSet};
pub use phone::extract_phone;
pub use safe_area::{
    compute_combined_safe_area, css_safe_area_from_values, parse_css_length, SafeAreaSources,
    CSS_SAFE_AREA_PROPERTIES,
};
pub use scheduler::{ManualScheduler, NoopScheduler, Scheduler};
pub use storage::{MemoryStorageArea, NoopStorageArea, StorageArea};
pub use time::unix_time_ms_now;
pub use ui::{
    ColorScheme, HapticImpactStyle, HapticNotificationType, HomeScreenStatus, PopupButton,
    PopupButtonKind, PopupOptions, QrScanOptions, ShareStoryOptions, StoryWidgetLink,
};
pub use watcher::{create_safe_area_watcher, EventHub, TriggerSource, DEFAULT_TRIGGER_EVENTS};
