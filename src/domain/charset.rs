use std::{fmt, io, str::FromStr};

use serde::{Deserialize, Serialize};

/// The text encodings a datamark resource may be stored in.
///
/// The datamark alphabet is pure ASCII, so every supported charset is
/// ASCII-compatible and a line feed is always the single byte `0x0A`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Charset {
    /// UTF-8 (the default).
    #[default]
    Utf8,
    /// 7-bit US-ASCII.
    Ascii,
    /// ISO-8859-1 (Latin-1).
    Latin1,
}

impl Charset {
    /// Returns the canonical name of the charset.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Utf8 => "UTF-8",
            Self::Ascii => "US-ASCII",
            Self::Latin1 => "ISO-8859-1",
        }
    }

    /// Decodes raw bytes into text.
    ///
    /// # Errors
    ///
    /// Returns an [`io::ErrorKind::InvalidData`] error if the bytes are not
    /// valid in this charset.
    pub fn decode(self, bytes: &[u8]) -> io::Result<String> {
        match self {
            Self::Utf8 => String::from_utf8(bytes.to_vec())
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e)),
            Self::Ascii => {
                if let Some(position) = bytes.iter().position(|b| !b.is_ascii()) {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("byte {position} is not valid US-ASCII"),
                    ));
                }
                Ok(bytes.iter().map(|&b| char::from(b)).collect())
            }
            Self::Latin1 => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
        }
    }

    /// Encodes text into raw bytes.
    ///
    /// # Errors
    ///
    /// Returns an [`io::ErrorKind::InvalidInput`] error if the text contains
    /// a character this charset cannot represent.
    pub fn encode(self, text: &str) -> io::Result<Vec<u8>> {
        let limit = match self {
            Self::Utf8 => return Ok(text.as_bytes().to_vec()),
            Self::Ascii => 0x7F,
            Self::Latin1 => 0xFF,
        };
        text.chars()
            .map(|c| {
                u8::try_from(u32::from(c))
                    .ok()
                    .filter(|&b| b <= limit)
                    .ok_or_else(|| {
                        io::Error::new(
                            io::ErrorKind::InvalidInput,
                            format!("character {c:?} is not representable in {}", self.name()),
                        )
                    })
            })
            .collect()
    }
}

impl FromStr for Charset {
    type Err = UnknownCharsetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Ok(Self::Utf8),
            "us-ascii" | "ascii" => Ok(Self::Ascii),
            "iso-8859-1" | "latin1" | "latin-1" => Ok(Self::Latin1),
            _ => Err(UnknownCharsetError(s.to_string())),
        }
    }
}

impl TryFrom<String> for Charset {
    type Error = UnknownCharsetError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Charset> for String {
    fn from(charset: Charset) -> Self {
        charset.name().to_string()
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a charset name is not recognised.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Unknown charset '{0}': expected UTF-8, US-ASCII or ISO-8859-1")]
pub struct UnknownCharsetError(String);
