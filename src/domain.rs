//! Domain models for datamarks.
//!
//! This module contains the core domain types: the validated datamark value,
//! service configuration, resource charsets and the error taxonomy.

/// Datamark validation.
pub mod datamark;
pub use datamark::{Datamark, InvalidDatamarkError, MAX_LENGTH, is_valid, trim};

mod charset;
pub use charset::{Charset, UnknownCharsetError};

mod config;
pub use config::{ConfigError, DEFAULT_SERVICE, DatamarkConfig, Settings};

mod error;
pub use error::{Error, Result};
