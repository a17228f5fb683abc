//! String key/value storage used for detection caching and theme preferences.

use std::{cell::RefCell, collections::HashMap, rc::Rc};

/// Synchronous string storage area (session or local scope).
pub trait StorageArea {
    /// Reads the raw value for `key`.
    fn get(&self, key: &str) -> Result<Option<String>, String>;

    /// Stores `value` under `key`.
    fn set(&self, key: &str, value: &str) -> Result<(), String>;

    /// Deletes `key`.
    fn remove(&self, key: &str) -> Result<(), String>;
}

#[derive(Debug, Clone, Copy, Default)]
/// Storage that keeps nothing, for hosts without Web Storage.
pub struct NoopStorageArea;

impl StorageArea for NoopStorageArea {
    fn get(&self, _key: &str) -> Result<Option<String>, String> {
        Ok(None)
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), String> {
        Ok(())
    }

    fn remove(&self, _key: &str) -> Result<(), String> {
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
/// In-memory storage keyed by string. Clones share the same map.
pub struct MemoryStorageArea {
    inner: Rc<RefCell<HashMap<String, String>>>,
}

impl MemoryStorageArea {
    /// Creates an empty area.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.inner.borrow().len()
    }

    /// Returns whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StorageArea for MemoryStorageArea {
    fn get(&self, key: &str) -> Result<Option<String>, String> {
        Ok(self.inner.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), String> {
        self.inner
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), String> {
        self.inner.borrow_mut().remove(key);
        Ok(())
    }
}
