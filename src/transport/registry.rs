//! Transport registry.
//!
//! Maps a configured transport name to the factory that builds it. Resolution
//! happens once at setup, so an unknown name fails there and never at dispatch.

use std::collections::HashMap;

use tracing::debug;

use super::{HttpTransport, HyperTransport, ReqwestTransport};
use crate::config::{ConfigError, Settings};

/// Builds a transport from its nested settings.
pub type TransportFactory<T> = fn(&Settings) -> Result<T, ConfigError>;

pub struct TransportRegistry<T> {
    factories: HashMap<String, TransportFactory<T>>,
}

impl<T> TransportRegistry<T> {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Register `factory` under `name`, replacing any previous entry.
    pub fn register(&mut self, name: impl Into<String>, factory: TransportFactory<T>) -> &mut Self {
        self.factories.insert(name.into(), factory);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn resolve(&self, name: &str, settings: &Settings) -> Result<T, ConfigError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| ConfigError::UnknownTransport(name.to_owned()))?;
        let transport = factory(settings)?;
        debug!(transport = name, "Transport resolved");
        Ok(transport)
    }
}

impl<T> Default for TransportRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportRegistry<HttpTransport> {
    /// `reqwest` and `hyper`.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry
            .register(ReqwestTransport::NAME, ReqwestTransport::factory)
            .register(HyperTransport::NAME, HyperTransport::factory);
        registry
    }
}
