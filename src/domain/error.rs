use std::io;

use super::datamark::InvalidDatamarkError;

/// A datamark operation failed.
///
/// Every failure of a [`DatamarkService`](crate::DatamarkService) operation is
/// one of these variants. None of them are recovered internally.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A candidate or loaded value is not a legal datamark.
    #[error("Illegal datamark: '{value}'")]
    IllegalDatamark {
        /// The rejected value.
        value: String,
    },

    /// Reading the backing resource failed.
    #[error("Failed to read resource: {locator}")]
    ResourceReadFailed {
        /// Locator of the resource.
        locator: String,
        /// The underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// Writing the backing resource failed.
    #[error("Failed to write resource: {locator}")]
    ResourceWriteFailed {
        /// Locator of the resource.
        locator: String,
        /// The underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// The backing resource cannot be written.
    #[error("Resource is not writable: {locator}")]
    ResourceNotWritable {
        /// Locator of the resource.
        locator: String,
    },

    /// The service is configured to reject updates.
    #[error("Update not allowed")]
    UpdateNotAllowed,
}

impl From<InvalidDatamarkError> for Error {
    fn from(error: InvalidDatamarkError) -> Self {
        Self::IllegalDatamark {
            value: error.into_value(),
        }
    }
}

impl Error {
    /// Returns `true` if the failure was a validation failure.
    #[must_use]
    pub const fn is_illegal_datamark(&self) -> bool {
        matches!(self, Self::IllegalDatamark { .. })
    }

    /// Returns the resource locator the failure relates to, if any.
    #[must_use]
    pub fn locator(&self) -> Option<&str> {
        match self {
            Self::ResourceReadFailed { locator, .. }
            | Self::ResourceWriteFailed { locator, .. }
            | Self::ResourceNotWritable { locator } => Some(locator),
            Self::IllegalDatamark { .. } | Self::UpdateNotAllowed => None,
        }
    }
}

/// Result type for datamark operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
