use std::{
    fs::{self, File},
    io::{self, Read, Write},
    path::{Path, PathBuf},
};

use tempfile::NamedTempFile;

use super::{FILE_SCHEME, ResourceResolver};

/// Resources stored as files on the local filesystem.
///
/// Locators are either `file:` URLs (`file:relative/path`,
/// `file:///absolute/path`) or bare paths. Relative paths are resolved
/// against the base directory, if one is set, and otherwise against the
/// process working directory.
///
/// Writes are atomic: new content goes to a temporary file in the target's
/// directory, which replaces the target when the writer is flushed. A write
/// that fails leaves the previous content in place.
#[derive(Debug, Clone, Default)]
pub struct FileSystem {
    base: Option<PathBuf>,
}

impl FileSystem {
    /// Creates a filesystem resolver that resolves relative paths against
    /// `base`.
    #[must_use]
    pub fn with_base(base: impl Into<PathBuf>) -> Self {
        Self {
            base: Some(base.into()),
        }
    }

    /// Resolves a locator to a filesystem path.
    #[must_use]
    pub fn path(&self, locator: &str) -> PathBuf {
        let raw = locator.strip_prefix(FILE_SCHEME).map_or(locator, |rest| {
            rest.strip_prefix("//").unwrap_or(rest)
        });
        let path = Path::new(raw);

        match &self.base {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl ResourceResolver for FileSystem {
    fn open_read(&self, locator: &str) -> io::Result<Box<dyn Read + '_>> {
        let path = self.path(locator);
        tracing::trace!("Opening {} for reading", path.display());
        Ok(Box::new(File::open(path)?))
    }

    fn is_writable(&self, locator: &str) -> bool {
        let path = self.path(locator);
        match fs::metadata(&path) {
            Ok(metadata) => metadata.is_file() && !metadata.permissions().readonly(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => true,
            Err(e) => {
                tracing::debug!("Cannot inspect {}: {e}", path.display());
                false
            }
        }
    }

    fn open_write(&self, locator: &str) -> io::Result<Box<dyn Write + '_>> {
        let path = self.path(locator);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        tracing::trace!("Opening {} for writing", path.display());
        Ok(Box::new(FileWriter {
            path,
            buffer: Vec::new(),
            committed: false,
        }))
    }
}

/// Buffers written bytes and atomically replaces the target file on flush.
struct FileWriter {
    path: PathBuf,
    buffer: Vec<u8>,
    committed: bool,
}

impl FileWriter {
    fn commit(&self) -> io::Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(&self.buffer)?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl Write for FileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        self.committed = false;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.commit()?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for FileWriter {
    fn drop(&mut self) {
        if !self.committed {
            if let Err(e) = self.commit() {
                tracing::warn!("Failed to write {}: {e}", self.path.display());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case("file:datamark/storage", "datamark/storage"; "file url")]
    #[test_case("datamark/storage", "datamark/storage"; "bare path")]
    #[test_case("file:///var/datamark", "/var/datamark"; "absolute file url")]
    #[test_case("/var/datamark", "/var/datamark"; "absolute path")]
    fn resolves_locators_without_base(locator: &str, expected: &str) {
        assert_eq!(FileSystem::default().path(locator), PathBuf::from(expected));
    }

    #[test]
    fn relative_paths_resolve_against_base() {
        let resolver = FileSystem::with_base("/srv/app");
        assert_eq!(resolver.path("file:mark"), PathBuf::from("/srv/app/mark"));
        assert_eq!(resolver.path("/abs/mark"), PathBuf::from("/abs/mark"));
    }

    #[test]
    fn open_write_creates_parent_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let resolver = FileSystem::with_base(tmp.path());

        let mut writer = resolver.open_write("file:nested/dir/mark").unwrap();
        writer.write_all(b"v1\n").unwrap();
        drop(writer);

        assert_eq!(
            fs::read_to_string(tmp.path().join("nested/dir/mark")).unwrap(),
            "v1\n"
        );
    }

    #[test]
    fn content_is_replaced_only_on_commit() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("mark");
        fs::write(&path, "old\n").unwrap();
        let resolver = FileSystem::with_base(tmp.path());

        let mut writer = resolver.open_write("mark").unwrap();
        writer.write_all(b"new\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "old\n");

        writer.flush().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "new\n");
        drop(writer);

        let leftovers: Vec<_> = fs::read_dir(tmp.path()).unwrap().collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[test]
    fn failed_commit_leaves_previous_content() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("mark");
        fs::create_dir(&target).unwrap();
        fs::write(target.join("keep"), "old\n").unwrap();
        let resolver = FileSystem::with_base(tmp.path());

        let mut writer = resolver.open_write("mark").unwrap();
        writer.write_all(b"new\n").unwrap();

        assert!(writer.flush().is_err());
        assert_eq!(fs::read_to_string(target.join("keep")).unwrap(), "old\n");
    }

    #[test]
    fn missing_file_fails_to_open_for_reading() {
        let tmp = tempfile::tempdir().unwrap();
        let resolver = FileSystem::with_base(tmp.path());

        let error = resolver.open_read("missing").err().unwrap();
        assert_eq!(error.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn missing_file_is_writable() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(FileSystem::with_base(tmp.path()).is_writable("file:not-yet"));
    }

    #[test]
    fn read_only_file_is_not_writable() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("mark");
        fs::write(&path, "v1\n").unwrap();
        let mut permissions = fs::metadata(&path).unwrap().permissions();
        permissions.set_readonly(true);
        fs::set_permissions(&path, permissions).unwrap();

        assert!(!FileSystem::with_base(tmp.path()).is_writable("mark"));
    }

    #[test]
    fn directory_is_not_writable() {
        let tmp = tempfile::tempdir().unwrap();
        fs::create_dir(tmp.path().join("dir")).unwrap();

        assert!(!FileSystem::with_base(tmp.path()).is_writable("dir"));
    }
}
