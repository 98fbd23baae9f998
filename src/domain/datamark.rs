use std::{fmt, ops::Deref, str::FromStr, sync::LazyLock};

use regex::Regex;

/// The maximum length of a datamark, in characters.
pub const MAX_LENGTH: usize = 100;

static PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._-]*$").unwrap_or_else(|e| unreachable!("invalid pattern: {e}"))
});

/// Checks whether a candidate string is a legal datamark.
///
/// A datamark is legal if it is at most [`MAX_LENGTH`] characters long and
/// every character is an ASCII letter, digit, `.`, `_` or `-`. The empty
/// string is legal.
#[must_use]
pub fn is_valid(candidate: &str) -> bool {
    candidate.chars().count() <= MAX_LENGTH && PATTERN.is_match(candidate)
}

/// Strips leading and trailing ASCII control characters and spaces.
///
/// Only characters at or below U+0020 are removed. Other Unicode whitespace,
/// such as a no-break space, is kept and later fails validation.
#[must_use]
pub fn trim(candidate: &str) -> &str {
    candidate.trim_matches(|c: char| c <= ' ')
}

/// A validated datamark.
///
/// Holding a `Datamark` guarantees the wrapped string passed [`is_valid`].
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Datamark(String);

impl Datamark {
    /// Creates a new `Datamark` from a string.
    ///
    /// The string is not trimmed; callers that accept user input should trim
    /// it first.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDatamarkError` if the string is too long or contains
    /// characters outside `[A-Za-z0-9._-]`.
    pub fn new(s: String) -> Result<Self, InvalidDatamarkError> {
        if is_valid(&s) {
            Ok(Self(s))
        } else {
            Err(InvalidDatamarkError(s))
        }
    }

    /// Returns the string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the datamark, returning the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<String> for Datamark {
    type Error = InvalidDatamarkError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Datamark {
    type Error = InvalidDatamarkError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value.to_string())
    }
}

impl FromStr for Datamark {
    type Err = InvalidDatamarkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

impl AsRef<str> for Datamark {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for Datamark {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for Datamark {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for Datamark {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Datamark {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl From<Datamark> for String {
    fn from(datamark: Datamark) -> Self {
        datamark.0
    }
}

/// Error returned when a string is not a legal datamark.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error(
    "Invalid datamark '{0}': must be at most {MAX_LENGTH} characters of A-Z, a-z, 0-9, '.', '_' or '-'"
)]
pub struct InvalidDatamarkError(String);

impl InvalidDatamarkError {
    /// Returns the rejected string.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.0
    }

    /// Consumes the error, returning the rejected string.
    #[must_use]
    pub fn into_value(self) -> String {
        self.0
    }
}
