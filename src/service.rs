//! The cached datamark store.
//!
//! [`DatamarkService`] owns the authoritative datamark value. It loads the
//! value from its backing resource on first use, keeps it cached until an
//! explicit refresh or update, and writes updates through to the resource
//! before caching them.
//!
//! A single reader/writer lock guards the configuration and the cache
//! together. Cache hits take the shared lock only; every path that may change
//! the cache holds the exclusive lock for the whole load or write, I/O
//! included, so at most one resource operation is in flight per service.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::instrument;

use crate::{
    domain::{Datamark, DatamarkConfig, Error, Result, trim},
    storage::{self, ResourceResolver},
};

mod registry;
pub use registry::Registry;

#[derive(Debug)]
struct State {
    config: DatamarkConfig,
    /// `None` until a load or write succeeds, and after any failed load.
    cached: Option<Datamark>,
}

/// A cached, resource-backed datamark.
pub struct DatamarkService {
    resolver: Arc<dyn ResourceResolver>,
    state: RwLock<State>,
}

impl std::fmt::Debug for DatamarkService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("DatamarkService")
            .field("config", &state.config)
            .field("cached", &state.cached)
            .finish_non_exhaustive()
    }
}

impl DatamarkService {
    /// Creates a service with an empty cache.
    ///
    /// Nothing is read until the first call to [`get`](Self::get),
    /// [`refresh`](Self::refresh) or [`update`](Self::update).
    #[must_use]
    pub fn new(config: DatamarkConfig, resolver: Arc<dyn ResourceResolver>) -> Self {
        Self {
            resolver,
            state: RwLock::new(State {
                config,
                cached: None,
            }),
        }
    }

    /// Creates a service and loads its datamark immediately.
    ///
    /// # Errors
    ///
    /// Returns the load failure if the resource cannot be read or holds an
    /// illegal datamark.
    pub fn open(config: DatamarkConfig, resolver: Arc<dyn ResourceResolver>) -> Result<Self> {
        let service = Self::new(config, resolver);
        service.refresh()?;
        Ok(service)
    }

    /// Returns whether the service accepts updates.
    #[must_use]
    pub fn update_allowed(&self) -> bool {
        self.state.read().config.update_allowed()
    }

    /// Returns the current datamark.
    ///
    /// The cached value is returned if there is one. Otherwise the value is
    /// loaded from the resource and cached. Callers racing on an empty cache
    /// trigger a single load.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResourceReadFailed`] if the resource cannot be read,
    /// or [`Error::IllegalDatamark`] if it holds an illegal value. The cache
    /// is left empty in both cases.
    #[instrument(level = "debug", skip(self))]
    pub fn get(&self) -> Result<Datamark> {
        if let Some(cached) = &self.state.read().cached {
            return Ok(cached.clone());
        }

        let mut state = self.state.write();
        if let Some(cached) = &state.cached {
            tracing::debug!("Datamark was loaded by a concurrent caller");
            return Ok(cached.clone());
        }
        self.load(&mut state)
    }

    /// Reloads the datamark from the resource, discarding the cached value.
    ///
    /// # Errors
    ///
    /// Fails as [`get`](Self::get) does on a cache miss.
    #[instrument(level = "debug", skip(self))]
    pub fn refresh(&self) -> Result<()> {
        self.load(&mut self.state.write()).map(drop)
    }

    /// Reloads the datamark from the resource and returns it.
    ///
    /// # Errors
    ///
    /// Fails as [`get`](Self::get) does on a cache miss.
    #[instrument(level = "debug", skip(self))]
    pub fn refresh_and_get(&self) -> Result<Datamark> {
        self.load(&mut self.state.write())
    }

    /// Writes a new datamark to the resource and caches it.
    ///
    /// Leading and trailing spaces and control characters are trimmed from
    /// the candidate before it is validated and written.
    ///
    /// # Errors
    ///
    /// - [`Error::UpdateNotAllowed`] if the service rejects updates
    /// - [`Error::IllegalDatamark`] if the trimmed candidate is illegal
    /// - [`Error::ResourceNotWritable`] if the resource cannot be written
    /// - [`Error::ResourceWriteFailed`] if writing fails
    ///
    /// The cache is left unchanged on failure.
    #[instrument(level = "debug", skip(self))]
    pub fn update(&self, candidate: &str) -> Result<()> {
        let mut state = self.state.write();

        if !state.config.update_allowed() {
            tracing::warn!("Rejected datamark update: updates are not allowed");
            return Err(Error::UpdateNotAllowed);
        }

        let datamark = Datamark::try_from(trim(candidate)).inspect_err(|e| {
            tracing::warn!("Rejected illegal datamark '{}'", e.value());
        })?;

        let locator = state.config.resource_url().to_string();
        if !self.resolver.is_writable(&locator) {
            tracing::warn!("Resource {locator} is not writable");
            return Err(Error::ResourceNotWritable { locator });
        }

        tracing::debug!("Writing datamark to {locator}");
        let charset = state.config.resource_charset();
        if let Err(source) = storage::write_line(&*self.resolver, &locator, charset, &datamark) {
            tracing::warn!("Failed to write datamark to {locator}: {source}");
            return Err(Error::ResourceWriteFailed { locator, source });
        }

        tracing::debug!("Cached datamark is now '{datamark}'");
        state.cached = Some(datamark);
        Ok(())
    }

    /// Returns a copy of the service's configuration.
    #[must_use]
    pub fn config(&self) -> DatamarkConfig {
        self.state.read().config.clone()
    }

    /// Replaces the service's configuration.
    ///
    /// The cached value is kept; call [`refresh`](Self::refresh) to load from
    /// a new resource.
    pub fn set_config(&self, config: DatamarkConfig) {
        self.state.write().config = config;
    }

    /// Returns the cached datamark without loading, if there is one.
    #[must_use]
    pub fn cached(&self) -> Option<Datamark> {
        self.state.read().cached.clone()
    }

    fn load(&self, state: &mut State) -> Result<Datamark> {
        let locator = state.config.resource_url();
        let charset = state.config.resource_charset();

        tracing::debug!("Reading datamark from {locator}");
        let line = match storage::read_first_line(&*self.resolver, locator, charset) {
            Ok(line) => line,
            Err(source) => {
                tracing::warn!("Failed to read datamark from {locator}, clearing cache: {source}");
                let locator = locator.to_string();
                state.cached = None;
                return Err(Error::ResourceReadFailed { locator, source });
            }
        };

        let datamark = match Datamark::new(line) {
            Ok(datamark) => datamark,
            Err(e) => {
                tracing::warn!(
                    "Resource {locator} holds illegal datamark '{}', clearing cache",
                    e.value()
                );
                state.cached = None;
                return Err(e.into());
            }
        };

        tracing::debug!("Cached datamark is now '{datamark}'");
        state.cached = Some(datamark.clone());
        Ok(datamark)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{
        io::{self, Read, Write},
        sync::{
            Barrier,
            atomic::{AtomicBool, AtomicUsize, Ordering},
        },
        thread,
    };

    use super::*;
    use crate::{
        domain::Charset,
        storage::{FileSystem, Memory},
    };

    const LOCATOR: &str = "memory:datamark";

    /// An in-memory resolver that counts I/O and can be told to fail.
    #[derive(Default)]
    pub(crate) struct Faulty {
        pub(crate) memory: Memory,
        pub(crate) reads: AtomicUsize,
        pub(crate) writes: AtomicUsize,
        pub(crate) fail_reads: AtomicBool,
        pub(crate) fail_writes: AtomicBool,
        pub(crate) read_only: AtomicBool,
    }

    impl Faulty {
        pub(crate) fn with_content(content: &str) -> Arc<Self> {
            let faulty = Self::default();
            faulty.memory.insert(LOCATOR, content.as_bytes().to_vec());
            Arc::new(faulty)
        }

        pub(crate) fn content(&self) -> String {
            String::from_utf8(self.memory.content(LOCATOR).unwrap_or_default()).unwrap()
        }

        fn reads(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }

        fn writes(&self) -> usize {
            self.writes.load(Ordering::SeqCst)
        }
    }

    impl ResourceResolver for Faulty {
        fn open_read(&self, locator: &str) -> io::Result<Box<dyn Read + '_>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "unreadable"));
            }
            self.memory.open_read(locator)
        }

        fn is_writable(&self, locator: &str) -> bool {
            !self.read_only.load(Ordering::SeqCst) && self.memory.is_writable(locator)
        }

        fn open_write(&self, locator: &str) -> io::Result<Box<dyn Write + '_>> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(io::Error::other("disk full"));
            }
            self.memory.open_write(locator)
        }
    }

    pub(crate) fn new_service(resolver: &Arc<Faulty>, update_allowed: bool) -> DatamarkService {
        let config = DatamarkConfig::new(LOCATOR, Charset::Utf8, update_allowed);
        DatamarkService::new(config, resolver.clone())
    }

    #[test]
    fn get_reads_through_on_cold_cache() {
        let resolver = Faulty::with_content("v1.2.3\n");
        let service = new_service(&resolver, true);

        assert_eq!(service.cached(), None);
        assert_eq!(service.get().unwrap(), "v1.2.3");
        assert_eq!(service.cached().as_deref(), Some("v1.2.3"));
    }

    #[test]
    fn get_is_idempotent_and_hits_cache() {
        let resolver = Faulty::with_content("v1.2.3\n");
        let service = new_service(&resolver, true);

        let first = service.get().unwrap();
        let second = service.get().unwrap();

        assert_eq!(first, second);
        assert_eq!(resolver.reads(), 1);
    }

    #[test]
    fn empty_resource_is_empty_datamark() {
        let resolver = Faulty::with_content("");
        let service = new_service(&resolver, true);

        assert_eq!(service.get().unwrap(), "");
    }

    #[test]
    fn illegal_resource_content_fails_and_stays_uncached() {
        let resolver = Faulty::with_content("not valid!\n");
        let service = new_service(&resolver, true);

        let error = service.get().unwrap_err();
        assert!(matches!(error, Error::IllegalDatamark { ref value } if value == "not valid!"));
        assert_eq!(service.cached(), None);

        service.get().unwrap_err();
        assert_eq!(resolver.reads(), 2);
    }

    #[test]
    fn refresh_picks_up_external_edits() {
        let resolver = Faulty::with_content("v1\n");
        let service = new_service(&resolver, true);
        assert_eq!(service.get().unwrap(), "v1");

        resolver.memory.insert(LOCATOR, b"v2\n".to_vec());
        assert_eq!(service.get().unwrap(), "v1");

        service.refresh().unwrap();
        assert_eq!(service.get().unwrap(), "v2");
        assert_eq!(resolver.reads(), 2);
    }

    #[test]
    fn refresh_and_get_returns_reloaded_value() {
        let resolver = Faulty::with_content("v1\n");
        let service = new_service(&resolver, true);
        service.get().unwrap();

        resolver.memory.insert(LOCATOR, b"v2\n".to_vec());
        assert_eq!(service.refresh_and_get().unwrap(), "v2");
    }

    #[test]
    fn read_failure_clears_cache() {
        let resolver = Faulty::with_content("v1\n");
        let service = new_service(&resolver, true);
        service.get().unwrap();

        resolver.fail_reads.store(true, Ordering::SeqCst);
        let error = service.refresh().unwrap_err();
        assert!(matches!(error, Error::ResourceReadFailed { ref locator, .. } if locator == LOCATOR));
        assert_eq!(service.cached(), None);

        let reads_before = resolver.reads();
        service.get().unwrap_err();
        assert_eq!(resolver.reads(), reads_before + 1);

        resolver.fail_reads.store(false, Ordering::SeqCst);
        assert_eq!(service.get().unwrap(), "v1");
    }

    #[test]
    fn missing_resource_is_read_failure() {
        let resolver = Arc::new(Faulty::default());
        let service = new_service(&resolver, true);

        let error = service.get().unwrap_err();
        let Error::ResourceReadFailed { source, .. } = error else {
            panic!("expected read failure");
        };
        assert_eq!(source.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn update_writes_through_and_caches() {
        let resolver = Faulty::with_content("v1\n");
        let service = new_service(&resolver, true);

        service.update("build-42").unwrap();

        assert_eq!(resolver.content(), "build-42\n");
        assert_eq!(service.get().unwrap(), "build-42");
        assert_eq!(resolver.reads(), 0);

        let cold = new_service(&resolver, true);
        assert_eq!(cold.get().unwrap(), "build-42");
    }

    #[test]
    fn update_trims_candidate() {
        let resolver = Faulty::with_content("v1\n");
        let service = new_service(&resolver, true);

        service.update("  v2 \n").unwrap();

        assert_eq!(resolver.content(), "v2\n");
        assert_eq!(service.cached().as_deref(), Some("v2"));
    }

    #[test]
    fn update_rejects_no_break_space() {
        let resolver = Faulty::with_content("v1\n");
        let service = new_service(&resolver, true);

        let error = service.update("\u{a0}v2").unwrap_err();

        assert!(matches!(error, Error::IllegalDatamark { ref value } if value == "\u{a0}v2"));
        assert_eq!(resolver.writes(), 0);
        assert_eq!(resolver.content(), "v1\n");
    }

    #[test]
    fn update_strips_control_characters() {
        let resolver = Faulty::with_content("v1\n");
        let service = new_service(&resolver, true);

        service.update("\0v2\t").unwrap();

        assert_eq!(resolver.content(), "v2\n");
    }

    #[test]
    fn resource_with_leading_no_break_space_is_illegal() {
        let resolver = Faulty::with_content("\u{a0}v1\n");
        let service = new_service(&resolver, true);

        let error = service.get().unwrap_err();
        assert!(matches!(error, Error::IllegalDatamark { ref value } if value == "\u{a0}v1"));
        assert_eq!(service.cached(), None);
    }

    #[test]
    fn update_accepts_empty_datamark() {
        let resolver = Faulty::with_content("v1\n");
        let service = new_service(&resolver, true);

        service.update("   ").unwrap();

        assert_eq!(resolver.content(), "\n");
        assert_eq!(service.get().unwrap(), "");
    }

    #[test]
    fn update_rejected_when_not_allowed() {
        let resolver = Faulty::with_content("v1\n");
        let service = new_service(&resolver, false);
        assert!(!service.update_allowed());

        let error = service.update("x").unwrap_err();

        assert!(matches!(error, Error::UpdateNotAllowed));
        assert_eq!(resolver.content(), "v1\n");
        assert_eq!(resolver.writes(), 0);
    }

    #[test]
    fn illegal_update_never_opens_resource() {
        let resolver = Faulty::with_content("v1\n");
        let service = new_service(&resolver, true);
        service.get().unwrap();

        let error = service.update("bad value!").unwrap_err();

        assert!(matches!(error, Error::IllegalDatamark { ref value } if value == "bad value!"));
        assert_eq!(resolver.writes(), 0);
        assert_eq!(service.cached().as_deref(), Some("v1"));
    }

    #[test]
    fn write_failure_preserves_cache() {
        let resolver = Faulty::with_content("old\n");
        let service = new_service(&resolver, true);
        service.get().unwrap();

        resolver.fail_writes.store(true, Ordering::SeqCst);
        let error = service.update("new").unwrap_err();
        assert!(matches!(error, Error::ResourceWriteFailed { .. }));

        assert_eq!(service.get().unwrap(), "old");
        assert_eq!(resolver.reads(), 1);
        assert_eq!(resolver.content(), "old\n");
    }

    #[test]
    fn not_writable_preserves_cache() {
        let resolver = Faulty::with_content("old\n");
        let service = new_service(&resolver, true);
        service.get().unwrap();

        resolver.read_only.store(true, Ordering::SeqCst);
        let error = service.update("new").unwrap_err();
        assert!(matches!(error, Error::ResourceNotWritable { ref locator } if locator == LOCATOR));

        assert_eq!(service.get().unwrap(), "old");
        assert_eq!(resolver.reads(), 1);
        assert_eq!(resolver.writes(), 0);
    }

    #[test]
    fn open_loads_eagerly() {
        let resolver = Faulty::with_content("v9\n");
        let config = DatamarkConfig::new(LOCATOR, Charset::Utf8, true);

        let service = DatamarkService::open(config, resolver.clone()).unwrap();

        assert_eq!(service.cached().as_deref(), Some("v9"));
        assert_eq!(resolver.reads(), 1);
    }

    #[test]
    fn open_fails_on_missing_resource() {
        let resolver = Arc::new(Faulty::default());
        let config = DatamarkConfig::new(LOCATOR, Charset::Utf8, true);

        let error = DatamarkService::open(config, resolver).unwrap_err();
        assert!(matches!(error, Error::ResourceReadFailed { .. }));
    }

    #[test]
    fn set_config_changes_policy_and_keeps_cache() {
        let resolver = Faulty::with_content("v1\n");
        let service = new_service(&resolver, true);
        service.get().unwrap();

        service.set_config(service.config().with_update_allowed(false));

        assert!(!service.update_allowed());
        assert!(matches!(service.update("v2"), Err(Error::UpdateNotAllowed)));
        assert_eq!(service.cached().as_deref(), Some("v1"));
    }

    #[test]
    fn concurrent_cold_gets_load_once() {
        let resolver = Faulty::with_content("v1\n");
        let service = new_service(&resolver, true);
        let threads = 8;
        let barrier = Barrier::new(threads);

        thread::scope(|scope| {
            for _ in 0..threads {
                scope.spawn(|| {
                    barrier.wait();
                    assert_eq!(service.get().unwrap(), "v1");
                });
            }
        });

        assert_eq!(resolver.reads(), 1);
    }

    #[test]
    fn concurrent_updates_leave_consistent_state() {
        let resolver = Faulty::with_content("v0\n");
        let service = new_service(&resolver, true);

        thread::scope(|scope| {
            for i in 0..8 {
                let service = &service;
                scope.spawn(move || service.update(&format!("v{i}")).unwrap());
            }
        });

        let cached = service.get().unwrap();
        assert_eq!(resolver.content(), format!("{cached}\n"));
        assert_eq!(service.refresh_and_get().unwrap(), cached);
    }

    #[test]
    fn file_backed_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("datamark").join("storage");
        let config = DatamarkConfig::new(format!("file:{}", path.display()), Charset::Latin1, true);
        let service = DatamarkService::new(config, Arc::new(FileSystem::default()));

        service.get().unwrap_err();
        service.update("release-1.0").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "release-1.0\n");
        assert_eq!(service.refresh_and_get().unwrap(), "release-1.0");
    }
}
