use std::rc::{Rc, Weak};

use leptos::*;
use miniapp_host::{EnvironmentInfo, Insets, MiniAppAdapter};

use crate::provider::use_miniapp_adapter;

/// Reconciled safe area of the provided adapter, recomputed on every environment change.
pub fn use_safe_area() -> ReadSignal<Insets> {
    safe_area_signal(&use_miniapp_adapter())
}

/// Signal tracking [`MiniAppAdapter::compute_safe_area`] for `adapter`.
///
/// The environment subscription is released when the current reactive owner is cleaned up.
pub fn safe_area_signal(adapter: &Rc<dyn MiniAppAdapter>) -> ReadSignal<Insets> {
    let (safe_area, set_safe_area) = create_signal(adapter.compute_safe_area());
    let weak: Weak<dyn MiniAppAdapter> = Rc::downgrade(adapter);
    let subscription = adapter.subscribe(Rc::new(move |_: &EnvironmentInfo| {
        if let Some(adapter) = weak.upgrade() {
            set_safe_area.set(adapter.compute_safe_area());
        }
    }));
    on_cleanup(move || subscription.dispose());
    safe_area
}

#[cfg(test)]
mod tests {
    use miniapp_host::{AdapterDeps, MemoryBrowserHost};
    use miniapp_host_web::WebAdapter;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn follows_environment_notifications() {
        let _ = create_runtime();
        let browser = MemoryBrowserHost::new();
        let adapter: Rc<dyn MiniAppAdapter> = Rc::new(WebAdapter::new(AdapterDeps::new(
            Rc::new(browser.clone()),
            Rc::new(miniapp_host::NoopScheduler),
            Default::default(),
        )));
        let safe_area = safe_area_signal(&adapter);
        assert_eq!(safe_area.get_untracked(), Insets::ZERO);

        adapter.core().update_environment(|environment| {
            environment.safe_area = Some(Insets::new(24.0, 0.0, 16.0, 0.0));
        });
        adapter.core().notify_environment_changed();

        assert_eq!(safe_area.get_untracked(), Insets::new(24.0, 0.0, 16.0, 0.0));
    }
}
