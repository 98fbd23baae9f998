//! Access to the text resources datamarks are stored in.
//!
//! A [`ResourceResolver`] maps a locator string to byte streams. The
//! [`read_first_line`] and [`write_line`] helpers layer the datamark file
//! format (one value on the first line) and the configured [`Charset`] on
//! top of any resolver.

use std::io::{self, BufRead, BufReader, Read, Write};

use crate::domain::{Charset, trim};

mod file_system;
pub use file_system::FileSystem;

mod memory;
pub use memory::Memory;

/// The URL scheme of filesystem resources.
pub const FILE_SCHEME: &str = "file:";

/// The URL scheme of in-memory resources.
pub const MEMORY_SCHEME: &str = "memory:";

/// A read/write channel to external text resources, addressed by locator.
///
/// Implementations must be safe to share between threads. The datamark
/// service serialises its own calls, but a resolver may be shared by several
/// services.
pub trait ResourceResolver: Send + Sync {
    /// Opens the resource for reading.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource does not exist or cannot be opened.
    fn open_read(&self, locator: &str) -> io::Result<Box<dyn Read + '_>>;

    /// Returns whether the resource supports being written.
    ///
    /// This is a capability check; a writable resource may still fail to
    /// open for writing.
    fn is_writable(&self, locator: &str) -> bool;

    /// Opens the resource for writing, replacing its content.
    ///
    /// The new content is committed once the writer is flushed and dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource cannot be opened for writing.
    fn open_write(&self, locator: &str) -> io::Result<Box<dyn Write + '_>>;
}

/// Reads the first line of a resource.
///
/// An empty resource yields the empty string. Line terminators (`\n`, `\r\n`
/// or a lone `\r`) are stripped, then the line is trimmed with
/// [`trim`](crate::domain::trim). Anything after the first line is never
/// read.
///
/// # Errors
///
/// Returns an error if the resource cannot be opened or read, or if the line
/// is not valid in the given charset.
pub fn read_first_line(
    resolver: &dyn ResourceResolver,
    locator: &str,
    charset: Charset,
) -> io::Result<String> {
    let mut reader = BufReader::new(resolver.open_read(locator)?);
    let mut bytes = Vec::new();
    reader.read_until(b'\n', &mut bytes)?;

    let text = charset.decode(&bytes)?;
    let line = text.split(['\r', '\n']).next().unwrap_or_default();
    Ok(trim(line).to_string())
}

/// Replaces the content of a resource with a single line of text.
///
/// # Errors
///
/// Returns an error if the text cannot be encoded in the given charset, or
/// if the resource cannot be opened, written or flushed.
pub fn write_line(
    resolver: &dyn ResourceResolver,
    locator: &str,
    charset: Charset,
    line: &str,
) -> io::Result<()> {
    let mut bytes = charset.encode(line)?;
    bytes.push(b'\n');

    let mut writer = resolver.open_write(locator)?;
    writer.write_all(&bytes)?;
    writer.flush()
}

/// The default resolver, dispatching on the locator's scheme.
///
/// `memory:` locators are served from an in-process [`Memory`] table; every
/// other locator (`file:` URLs and bare paths) is served by [`FileSystem`].
///
/// This is meant for embedding the library, where the process that fills
/// the memory table is the one that reads it.
#[derive(Debug, Default)]
pub struct Resources {
    file_system: FileSystem,
    memory: Memory,
}

impl Resources {
    /// Creates a resolver with the given filesystem and memory backends.
    #[must_use]
    pub const fn new(file_system: FileSystem, memory: Memory) -> Self {
        Self {
            file_system,
            memory,
        }
    }

    /// Returns the in-memory backend.
    #[must_use]
    pub const fn memory(&self) -> &Memory {
        &self.memory
    }

    fn backend(&self, locator: &str) -> &dyn ResourceResolver {
        if locator.starts_with(MEMORY_SCHEME) {
            &self.memory
        } else {
            &self.file_system
        }
    }
}

impl ResourceResolver for Resources {
    fn open_read(&self, locator: &str) -> io::Result<Box<dyn Read + '_>> {
        self.backend(locator).open_read(locator)
    }

    fn is_writable(&self, locator: &str) -> bool {
        self.backend(locator).is_writable(locator)
    }

    fn open_write(&self, locator: &str) -> io::Result<Box<dyn Write + '_>> {
        self.backend(locator).open_write(locator)
    }
}
