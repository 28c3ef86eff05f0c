//! Registry of live cloud connections.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::driver::CloudConnection;
use crate::error::{ControlError, Result};

/// Maps connection names to drivers.
#[derive(Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<String, Arc<dyn CloudConnection>>>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a driver to a connection name, replacing any previous binding.
    pub fn insert(&self, name: impl Into<String>, connection: Arc<dyn CloudConnection>) {
        let name = name.into();
        tracing::info!(connection = %name, provider = connection.provider_name(), "Registered connection");
        self.connections.write().insert(name, connection);
    }

    /// Remove a binding. Returns whether one existed.
    pub fn remove(&self, name: &str) -> bool {
        self.connections.write().remove(name).is_some()
    }

    /// Look up a driver.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::ConnectionNotFound` if nothing is bound to `name`.
    pub fn get(&self, name: &str) -> Result<Arc<dyn CloudConnection>> {
        self.connections
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| ControlError::ConnectionNotFound(name.to_string()))
    }

    /// Registered connection names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.connections.read().keys().cloned().collect();
        names.sort();
        names
    }
}
