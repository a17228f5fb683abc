//! `setTimeout`-backed [`Scheduler`].

use miniapp_host::{Disposer, Scheduler};

#[derive(Debug, Clone, Copy, Default)]
/// Browser timer service. Off-wasm timers never fire.
pub struct WebScheduler;

impl Scheduler for WebScheduler {
    fn set_timeout(&self, delay_ms: u32, callback: Box<dyn FnOnce()>) -> Disposer {
        #[cfg(target_arch = "wasm32")]
        {
            use wasm_bindgen::{closure::Closure, JsCast};

            let Some(window) = web_sys::window() else {
                tracing::warn!("[miniapp-host] setTimeout unavailable: no window");
                return Disposer::noop();
            };
            let callback = Closure::once_into_js(move || callback());
            let timeout = i32::try_from(delay_ms).unwrap_or(i32::MAX);
            let handle = match window.set_timeout_with_callback_and_timeout_and_arguments_0(
                callback.unchecked_ref(),
                timeout,
            ) {
                Ok(handle) => handle,
                Err(err) => {
                    tracing::warn!("[miniapp-host] setTimeout failed: {err:?}");
                    return Disposer::noop();
                }
            };
            Disposer::new(move || {
                if let Some(window) = web_sys::window() {
                    window.clear_timeout_with_handle(handle);
                }
            })
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            let _ = (delay_ms, callback);
            Disposer::noop()
        }
    }
}
