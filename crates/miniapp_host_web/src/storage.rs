//! Web Storage (`sessionStorage` / `localStorage`) implementation of [`StorageArea`].

use miniapp_host::StorageArea;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Browser storage area backed by `window.sessionStorage` or `window.localStorage`.
pub enum WebStorageArea {
    /// Per-tab storage; used for the detection cache.
    #[default]
    Session,
    /// Persistent storage; used for user preferences.
    Local,
}

impl WebStorageArea {
    fn scope(self) -> &'static str {
        match self {
            Self::Session => "sessionStorage",
            Self::Local => "localStorage",
        }
    }

    #[cfg(target_arch = "wasm32")]
    fn storage(self) -> Result<web_sys::Storage, String> {
        let window = web_sys::window().ok_or_else(|| "window unavailable".to_string())?;
        let storage = match self {
            Self::Session => window.session_storage(),
            Self::Local => window.local_storage(),
        };
        storage
            .ok()
            .flatten()
            .ok_or_else(|| format!("{} unavailable", self.scope()))
    }
}

impl StorageArea for WebStorageArea {
    fn get(&self, key: &str) -> Result<Option<String>, String> {
        #[cfg(target_arch = "wasm32")]
        {
            self.storage()?
                .get_item(key)
                .map_err(|e| format!("{} get_item failed: {e:?}", self.scope()))
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            let _ = key;
            Ok(None)
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), String> {
        #[cfg(target_arch = "wasm32")]
        {
            self.storage()?
                .set_item(key, value)
                .map_err(|e| format!("{} set_item failed: {e:?}", self.scope()))
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            let _ = (key, value);
            Err(format!("{} unavailable", self.scope()))
        }
    }

    fn remove(&self, key: &str) -> Result<(), String> {
        #[cfg(target_arch = "wasm32")]
        {
            self.storage()?
                .remove_item(key)
                .map_err(|e| format!("{} remove_item failed: {e:?}", self.scope()))
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            let _ = key;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn web_storage_is_empty_and_read_only_off_wasm() {
        let area = WebStorageArea::Local;

        assert_eq!(area.get("miniapp-theme-preference"), Ok(None));
        assert_eq!(
            area.set("miniapp-theme-preference", "\"dark\""),
            Err("localStorage unavailable".to_string())
        );
        assert_eq!(WebStorageArea::Session.remove("x"), Ok(()));
    }
}
