use std::{collections::BTreeMap, path::Path};

use serde::{Deserialize, Serialize};

use super::Charset;

/// The name of the service used when none is specified.
pub const DEFAULT_SERVICE: &str = "default";

/// Configuration for a single datamark service.
///
/// This describes where the datamark is stored, how it is encoded, and
/// whether the service may overwrite it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatamarkConfig {
    /// Locator of the backing resource.
    ///
    /// Either a `file:` URL, a `memory:` name, or a bare filesystem path.
    resource_url: String,

    /// Text encoding of the backing resource.
    resource_charset: Charset,

    /// Whether the service accepts updates.
    ///
    /// When `false`, every write is rejected before touching the resource.
    update_allowed: bool,
}

impl Default for DatamarkConfig {
    fn default() -> Self {
        Self {
            resource_url: default_resource_url(),
            resource_charset: Charset::default(),
            update_allowed: true,
        }
    }
}

impl DatamarkConfig {
    /// Creates a new configuration.
    #[must_use]
    pub fn new(resource_url: impl Into<String>, resource_charset: Charset, update_allowed: bool) -> Self {
        Self {
            resource_url: resource_url.into(),
            resource_charset,
            update_allowed,
        }
    }

    /// Returns the locator of the backing resource.
    #[must_use]
    pub fn resource_url(&self) -> &str {
        &self.resource_url
    }

    /// Returns the text encoding of the backing resource.
    #[must_use]
    pub const fn resource_charset(&self) -> Charset {
        self.resource_charset
    }

    /// Returns whether the service accepts updates.
    #[must_use]
    pub const fn update_allowed(&self) -> bool {
        self.update_allowed
    }

    /// Replaces the resource locator.
    #[must_use]
    pub fn with_resource_url(mut self, resource_url: impl Into<String>) -> Self {
        self.resource_url = resource_url.into();
        self
    }

    /// Replaces the resource charset.
    #[must_use]
    pub const fn with_resource_charset(mut self, charset: Charset) -> Self {
        self.resource_charset = charset;
        self
    }

    /// Replaces the update policy.
    #[must_use]
    pub const fn with_update_allowed(mut self, update_allowed: bool) -> Self {
        self.update_allowed = update_allowed;
        self
    }
}

fn default_resource_url() -> String {
    "datamark/storage".to_string()
}

/// The settings file: a table of named datamark services.
///
/// Settings are stored as TOML. A file that declares no services yields a
/// single [`DEFAULT_SERVICE`] with the default configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Versions", into = "Versions")]
pub struct Settings {
    services: BTreeMap<String, DatamarkConfig>,
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_services(BTreeMap::new())
    }
}

impl Settings {
    fn from_services(mut services: BTreeMap<String, DatamarkConfig>) -> Self {
        if services.is_empty() {
            services.insert(DEFAULT_SERVICE.to_string(), DatamarkConfig::default());
        }
        Self { services }
    }

    /// Loads the settings from a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or if the TOML content is
    /// invalid, including unknown charset names.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Read)?;
        toml::from_str(&content).map_err(ConfigError::Parse)
    }

    /// Saves the settings to a TOML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the settings cannot be serialized to TOML or if
    /// the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, content).map_err(ConfigError::Write)
    }

    /// Returns the configuration of the named service, if declared.
    #[must_use]
    pub fn service(&self, name: &str) -> Option<&DatamarkConfig> {
        self.services.get(name)
    }

    /// Iterates over the declared services in name order.
    pub fn services(&self) -> impl Iterator<Item = (&str, &DatamarkConfig)> {
        self.services.iter().map(|(name, config)| (name.as_str(), config))
    }

    /// Declares a service, replacing any existing service with the same name.
    ///
    /// Returns the configuration that was replaced, if any.
    pub fn insert_service(
        &mut self,
        name: impl Into<String>,
        config: DatamarkConfig,
    ) -> Option<DatamarkConfig> {
        self.services.insert(name.into(), config)
    }
}

/// Errors raised while loading or saving [`Settings`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The settings file could not be read.
    #[error("Failed to read settings file: {0}")]
    Read(#[source] std::io::Error),

    /// The settings file could not be written.
    #[error("Failed to write settings file: {0}")]
    Write(#[source] std::io::Error),

    /// The settings file is not valid TOML, or has invalid values such as an
    /// unknown charset or a service declared twice.
    #[error("Failed to parse settings file: {0}")]
    Parse(#[source] toml::de::Error),

    /// The settings could not be serialized.
    #[error("Failed to serialize settings: {0}")]
    Serialize(#[source] toml::ser::Error),

    /// No service with the given name is declared.
    #[error("Unknown datamark service '{0}'")]
    UnknownService(String),
}

/// The serialized versions of the settings.
/// This allows for future changes to the settings format and to the domain
/// type without breaking compatibility.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "_version")]
enum Versions {
    #[serde(rename = "1")]
    V1 {
        #[serde(default)]
        services: BTreeMap<String, DatamarkConfig>,
    },
}

impl From<Versions> for Settings {
    fn from(versions: Versions) -> Self {
        match versions {
            Versions::V1 { services } => Self::from_services(services),
        }
    }
}

impl From<Settings> for Versions {
    fn from(settings: Settings) -> Self {
        Self::V1 {
            services: settings.services,
        }
    }
}
