use std::{collections::BTreeMap, sync::Arc};

use super::DatamarkService;
use crate::{
    domain::{ConfigError, Settings},
    storage::ResourceResolver,
};

/// Named datamark services.
///
/// Services are looked up by the identifier they are declared under in
/// [`Settings`]. Routing is the caller's concern; a service does not know its
/// own name.
#[derive(Debug, Default, Clone)]
pub struct Registry {
    services: BTreeMap<String, Arc<DatamarkService>>,
}

impl Registry {
    /// Builds a lazily-loading service for every service declared in the
    /// settings, all sharing one resolver.
    #[must_use]
    pub fn from_settings(settings: &Settings, resolver: &Arc<dyn ResourceResolver>) -> Self {
        let services = settings
            .services()
            .map(|(name, config)| {
                let service = DatamarkService::new(config.clone(), Arc::clone(resolver));
                (name.to_string(), Arc::new(service))
            })
            .collect();
        Self { services }
    }

    /// Returns the service registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownService`] if no such service exists.
    pub fn get(&self, name: &str) -> Result<Arc<DatamarkService>, ConfigError> {
        self.services
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownService(name.to_string()))
    }

    /// Iterates over the registered service names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }
}
