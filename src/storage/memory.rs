use std::{
    collections::HashMap,
    io::{self, Cursor, Read, Write},
    sync::Arc,
};

use parking_lot::RwLock;

use super::ResourceResolver;

#[derive(Debug, Clone)]
struct Entry {
    content: Vec<u8>,
    writable: bool,
}

/// Resources held in process memory.
///
/// Entries are keyed by their full locator (conventionally `memory:<name>`).
/// Read-only entries behave like resources bundled with the application:
/// they can be read but never written. Writing to an unknown locator
/// creates a writable entry.
///
/// Clones share the same table.
#[derive(Debug, Clone, Default)]
pub struct Memory {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
}

impl Memory {
    /// Stores writable content under `locator`.
    pub fn insert(&self, locator: impl Into<String>, content: impl Into<Vec<u8>>) {
        self.put(locator.into(), content.into(), true);
    }

    /// Stores read-only content under `locator`.
    pub fn insert_read_only(&self, locator: impl Into<String>, content: impl Into<Vec<u8>>) {
        self.put(locator.into(), content.into(), false);
    }

    /// Returns a copy of the content stored under `locator`.
    #[must_use]
    pub fn content(&self, locator: &str) -> Option<Vec<u8>> {
        self.entries.read().get(locator).map(|e| e.content.clone())
    }

    fn put(&self, locator: String, content: Vec<u8>, writable: bool) {
        self.entries
            .write()
            .insert(locator, Entry { content, writable });
    }
}

impl ResourceResolver for Memory {
    fn open_read(&self, locator: &str) -> io::Result<Box<dyn Read + '_>> {
        let content = self.content(locator).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no in-memory resource '{locator}'"),
            )
        })?;
        Ok(Box::new(Cursor::new(content)))
    }

    fn is_writable(&self, locator: &str) -> bool {
        self.entries.read().get(locator).is_none_or(|e| e.writable)
    }

    fn open_write(&self, locator: &str) -> io::Result<Box<dyn Write + '_>> {
        if !self.is_writable(locator) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("in-memory resource '{locator}' is read-only"),
            ));
        }
        Ok(Box::new(MemoryWriter {
            memory: self,
            locator: locator.to_string(),
            buffer: Vec::new(),
        }))
    }
}

/// Buffers written bytes and commits them to the table on flush.
struct MemoryWriter<'a> {
    memory: &'a Memory,
    locator: String,
    buffer: Vec<u8>,
}

impl Write for MemoryWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.memory
            .put(self.locator.clone(), self.buffer.clone(), true);
        Ok(())
    }
}

impl Drop for MemoryWriter<'_> {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}
