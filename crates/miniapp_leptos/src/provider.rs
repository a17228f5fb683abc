use std::rc::Rc;

use leptos::*;
use miniapp_host::MiniAppAdapter;

#[derive(Clone)]
/// Leptos context carrying the page's active mini-app adapter.
pub struct MiniAppAdapterContext(pub Rc<dyn MiniAppAdapter>);

#[component]
/// Provides `adapter` to descendant components.
pub fn AdapterProvider(
    /// Adapter built by the entry layer, usually after `init` resolved.
    adapter: Rc<dyn MiniAppAdapter>,
    children: Children,
) -> impl IntoView {
    provide_context(MiniAppAdapterContext(adapter));
    children().into_view()
}

/// Returns the adapter provided by the nearest [`AdapterProvider`].
///
/// # Panics
///
/// Panics if called outside [`AdapterProvider`].
pub fn use_miniapp_adapter() -> Rc<dyn MiniAppAdapter> {
    use_context::<MiniAppAdapterContext>()
        .expect("use_miniapp_adapter must be used inside <AdapterProvider/>")
        .0
}
