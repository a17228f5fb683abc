//! Process-wide mini-app state: active adapter, cached platform and analytics routing.
//!
//! Ordering: create the adapter, `init` it, then [`MiniAppContext::activate`] it. On teardown
//! call [`MiniAppContext::deactivate`] before `destroy` so no consumer reaches a destroyed
//! adapter through the context.

use std::{cell::RefCell, rc::Rc};

use serde_json::Value;

use crate::{adapter::MiniAppAdapter, config::normalize_pixel_code, environment::Platform};

#[derive(Default)]
struct ContextState {
    active: Option<Rc<dyn MiniAppAdapter>>,
    cached_platform: Option<Platform>,
    vk_pixel_code: Option<String>,
}

/// Single owner of the mutable globals shared by adapters and UI code.
#[derive(Default)]
pub struct MiniAppContext {
    state: RefCell<ContextState>,
}

thread_local! {
    static CONTEXT: Rc<MiniAppContext> = Rc::new(MiniAppContext::default());
}

/// Returns the thread-local context.
pub fn miniapp_context() -> Rc<MiniAppContext> {
    CONTEXT.with(Rc::clone)
}

impl MiniAppContext {
    /// Creates an empty context (mostly useful in tests; apps use [`miniapp_context`]).
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `adapter` the active adapter and returns the previous one.
    ///
    /// The previous adapter is not destroyed; its owner decides.
    pub fn activate(&self, adapter: Rc<dyn MiniAppAdapter>) -> Option<Rc<dyn MiniAppAdapter>> {
        let platform = adapter.platform();
        let mut state = self.state.borrow_mut();
        state.cached_platform = Some(platform);
        state.active.replace(adapter)
    }

    /// Clears the active adapter if it is `adapter`. Returns whether it was cleared.
    pub fn deactivate(&self, adapter: &Rc<dyn MiniAppAdapter>) -> bool {
        let mut state = self.state.borrow_mut();
        let is_active = state
            .active
            .as_ref()
            .is_some_and(|active| Rc::ptr_eq(active, adapter));
        if is_active {
            state.active = None;
        }
        is_active
    }

    /// Active adapter, if any.
    pub fn active_adapter(&self) -> Option<Rc<dyn MiniAppAdapter>> {
        self.state.borrow().active.clone()
    }

    /// Active adapter's platform, else the cached platform, else `detect()` (which is cached).
    pub fn platform(&self, detect: impl FnOnce() -> Platform) -> Platform {
        if let Some(active) = self.active_adapter() {
            let platform = active.platform();
            self.state.borrow_mut().cached_platform = Some(platform);
            return platform;
        }
        if let Some(platform) = self.state.borrow().cached_platform {
            return platform;
        }
        let detected = detect();
        self.state.borrow_mut().cached_platform = Some(detected);
        detected
    }

    /// Sets the VK retargeting pixel code; blank input clears it.
    pub fn configure_vk_pixel(&self, pixel_code: Option<&str>) {
        self.state.borrow_mut().vk_pixel_code = normalize_pixel_code(pixel_code);
    }

    /// Configured VK pixel code.
    pub fn vk_pixel_code(&self) -> Option<String> {
        self.state.borrow().vk_pixel_code.clone()
    }

    /// Sends a conversion event through the active adapter when it is a VK adapter.
    pub async fn track_conversion_event(&self, event: &str, payload: Option<&Value>) {
        if let Some(adapter) = self.active_vk_adapter() {
            adapter.track_conversion_event(event, payload).await;
        }
    }

    /// Sends a pixel event through the active adapter when it is a VK adapter.
    pub async fn track_pixel_event(&self, event: &str, payload: Option<&Value>) {
        if let Some(adapter) = self.active_vk_adapter() {
            adapter.track_pixel_event(event, payload).await;
        }
    }

    /// Forgets the active adapter, cached platform and pixel code.
    pub fn reset(&self) {
        *self.state.borrow_mut() = ContextState::default();
    }

    fn active_vk_adapter(&self) -> Option<Rc<dyn MiniAppAdapter>> {
        self.active_adapter()
            .filter(|adapter| adapter.platform() == Platform::Vk)
    }
}

impl std::fmt::Debug for MiniAppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("MiniAppContext")
            .field(
                "active",
                &state.active.as_ref().map(|adapter| adapter.platform()),
            )
            .field("cached_platform", &state.cached_platform)
            .field("vk_pixel_code", &state.vk_pixel_code)
            .finish()
    }
}
