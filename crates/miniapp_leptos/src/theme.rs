//! Light/dark theme preference merged with the host's appearance.

use std::rc::Rc;

use leptos::*;
use miniapp_host::{Appearance, ColorScheme, MiniAppAdapter, StorageArea};
use miniapp_host_web::WebStorageArea;

use crate::provider::use_miniapp_adapter;

/// Local storage key holding the user's [`ThemePreference`].
pub const THEME_PREFERENCE_KEY: &str = "miniapp-theme-preference";

const DARK_CLASS: &str = "dark";
const TRANSITION_CLASS: &str = "theme-transition";
const TRANSITION_MS: u32 = 450;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Theme chosen by the user.
pub enum ThemePreference {
    /// Follow the host (or the browser's colour scheme outside a host).
    #[default]
    System,
    /// Always light.
    Light,
    /// Always dark.
    Dark,
}

impl ThemePreference {
    /// Stable storage token.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    /// Parses a storage token.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "system" => Some(Self::System),
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            _ => None,
        }
    }

    /// Reads the saved preference, `System` when missing, unreadable or unknown.
    pub fn load(storage: &dyn StorageArea) -> Self {
        match storage.get(THEME_PREFERENCE_KEY) {
            Ok(Some(raw)) => Self::parse(&raw).unwrap_or_default(),
            Ok(None) => Self::System,
            Err(err) => {
                logging::warn!("theme preference read failed: {err}");
                Self::System
            }
        }
    }

    /// Persists the preference; failures are logged.
    pub fn save(self, storage: &dyn StorageArea) {
        if let Err(err) = storage.set(THEME_PREFERENCE_KEY, self.as_str()) {
            logging::warn!("theme preference write failed: {err}");
        }
    }
}

/// Whether the page should render dark for `preference` given the host's dark state.
pub const fn resolve_is_dark(preference: ThemePreference, system_dark: bool) -> bool {
    match preference {
        ThemePreference::Dark => true,
        ThemePreference::Light => false,
        ThemePreference::System => system_dark,
    }
}

#[derive(Clone, Copy)]
/// Reactive theme state returned by [`use_adapter_theme`].
pub struct AdapterTheme {
    /// Effective dark mode.
    pub is_dark: Memo<bool>,
    /// Effective appearance.
    pub appearance: Signal<Appearance>,
    /// Current user preference.
    pub preference: ReadSignal<ThemePreference>,
    /// Stores a new preference.
    pub set_preference: Callback<ThemePreference>,
    /// Flips between light and dark, optionally pushing new chrome colours to the host.
    pub toggle: Callback<Option<ColorScheme>>,
}

/// Theme state for the provided adapter, persisted in `localStorage`.
///
/// Keeps the `dark` class on the document root in sync with the effective appearance.
pub fn use_adapter_theme() -> AdapterTheme {
    let adapter = use_miniapp_adapter();
    let theme = adapter_theme(adapter.clone(), Rc::new(WebStorageArea::Local));
    let is_dark = theme.is_dark;
    create_effect(move |_| {
        adapter
            .core()
            .browser()
            .toggle_root_class(DARK_CLASS, is_dark.get());
    });
    theme
}

/// Builds [`AdapterTheme`] over an explicit adapter and preference store.
pub fn adapter_theme(
    adapter: Rc<dyn MiniAppAdapter>,
    storage: Rc<dyn StorageArea>,
) -> AdapterTheme {
    let initial_dark = match adapter.environment().appearance {
        Some(appearance) => appearance == Appearance::Dark,
        None => adapter
            .core()
            .browser()
            .matches_media("(prefers-color-scheme: dark)"),
    };
    let (system_dark, set_system_dark) = create_signal(initial_dark);
    let subscription = adapter.on_appearance_change(Rc::new(move |appearance| {
        if let Some(appearance) = appearance {
            set_system_dark.set(appearance == Appearance::Dark);
        }
    }));
    on_cleanup(move || subscription.dispose());

    let (preference, set_preference_signal) = create_signal(ThemePreference::load(&*storage));
    let is_dark = create_memo(move |_| resolve_is_dark(preference.get(), system_dark.get()));
    let appearance = Signal::derive(move || Appearance::from_is_dark(is_dark.get()));

    let set_preference = Callback::new(move |next: ThemePreference| {
        set_preference_signal.set(next);
        next.save(&*storage);
    });

    let toggle = Callback::new(move |colors: Option<ColorScheme>| {
        let browser = adapter.core().browser().clone();
        browser.toggle_root_class(TRANSITION_CLASS, true);
        let _ = adapter.core().scheduler().set_timeout(
            TRANSITION_MS,
            Box::new(move || browser.toggle_root_class(TRANSITION_CLASS, false)),
        );
        if let Some(colors) = colors {
            let adapter = adapter.clone();
            spawn_local(async move { adapter.set_colors(colors).await });
        }
        let next = if preference.get_untracked() == ThemePreference::Dark {
            ThemePreference::Light
        } else {
            ThemePreference::Dark
        };
        set_preference.call(next);
    });

    AdapterTheme {
        is_dark,
        appearance,
        preference,
        set_preference,
        toggle,
    }
}

#[cfg(test)]
mod tests {
    use miniapp_host::{
        AdapterDeps, ManualScheduler, MemoryBrowserHost, MemoryStorageArea, NoopScheduler,
        Scheduler,
    };
    use miniapp_host_web::WebAdapter;
    use pretty_assertions::assert_eq;

    use super::*;

    fn web_adapter(
        browser: &MemoryBrowserHost,
        scheduler: Rc<dyn Scheduler>,
    ) -> Rc<dyn MiniAppAdapter> {
        Rc::new(WebAdapter::new(AdapterDeps::new(
            Rc::new(browser.clone()),
            scheduler,
            Default::default(),
        )))
    }

    #[test]
    fn explicit_preference_overrides_host() {
        assert!(resolve_is_dark(ThemePreference::Dark, false));
        assert!(!resolve_is_dark(ThemePreference::Light, true));
        assert!(resolve_is_dark(ThemePreference::System, true));
        assert!(!resolve_is_dark(ThemePreference::System, false));
    }

    #[test]
    fn unknown_stored_preference_falls_back_to_system() {
        let storage = MemoryStorageArea::new();
        assert_eq!(ThemePreference::load(&storage), ThemePreference::System);

        storage.set(THEME_PREFERENCE_KEY, "sepia").expect("memory storage");
        assert_eq!(ThemePreference::load(&storage), ThemePreference::System);

        ThemePreference::Dark.save(&storage);
        assert_eq!(ThemePreference::load(&storage), ThemePreference::Dark);
    }

    #[test]
    fn host_appearance_drives_system_preference() {
        let _ = create_runtime();
        let browser = MemoryBrowserHost::new();
        let adapter = web_adapter(&browser, Rc::new(NoopScheduler));
        let theme = adapter_theme(adapter.clone(), Rc::new(MemoryStorageArea::new()));
        assert!(!theme.is_dark.get_untracked());

        adapter.core().set_appearance(Some(Appearance::Dark));

        assert!(theme.is_dark.get_untracked());
        assert_eq!(theme.appearance.get_untracked(), Appearance::Dark);
        theme.set_preference.call(ThemePreference::Light);
        assert!(!theme.is_dark.get_untracked());
    }

    #[test]
    fn toggle_persists_and_plays_transition() {
        let _ = create_runtime();
        let browser = MemoryBrowserHost::new();
        let scheduler = ManualScheduler::new();
        let storage = Rc::new(MemoryStorageArea::new());
        let adapter = web_adapter(&browser, Rc::new(scheduler.clone()));
        let theme = adapter_theme(adapter, storage.clone());

        theme.toggle.call(None);

        assert_eq!(theme.preference.get_untracked(), ThemePreference::Dark);
        assert_eq!(ThemePreference::load(&*storage), ThemePreference::Dark);
        assert!(browser.state().root_classes.contains(TRANSITION_CLASS));
        scheduler.advance(u64::from(TRANSITION_MS));
        assert!(!browser.state().root_classes.contains(TRANSITION_CLASS));

        theme.toggle.call(None);
        assert_eq!(theme.preference.get_untracked(), ThemePreference::Light);
    }
}
