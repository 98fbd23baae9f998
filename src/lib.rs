//! Cached, resource-backed datamarks
//!
//! A datamark is a short label (a data version or release stamp) stored as
//! the first line of a text resource. [`DatamarkService`] caches it in memory,
//! validates every value it reads or writes, and stamps it into records via
//! [`stamp::Stamper`].

pub mod domain;
pub use domain::{Charset, Datamark, DatamarkConfig, Error, Result, Settings, is_valid};

mod service;
pub use service::{DatamarkService, Registry};

/// Stamping records with the current datamark.
pub mod stamp;

/// Backing resource access.
pub mod storage;
pub use storage::{ResourceResolver, Resources};
