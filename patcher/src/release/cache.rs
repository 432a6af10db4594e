//! Bounded release metadata cache and the fetcher that owns it.
//!
//! The cache lives for one process. Only successful lookups are stored, so a
//! rate-limited or failed lookup is retried the next time it is asked for.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::{debug, trace};

use super::model::{Release, ReleaseProject};
use super::source::{ReleaseError, ReleaseSource};

/// How long a cached release stays usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBound {
    /// Entries expire once they are older than this. A zero age disables
    /// caching.
    MaxAge(Duration),
    /// Entries are served from cache at most this many times before the
    /// next lookup goes back to the source.
    MaxHits(u32),
}

impl Default for CacheBound {
    fn default() -> Self {
        Self::MaxAge(Duration::from_secs(600))
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    release: Release,
    stored_at: Instant,
    hits: u32,
}

/// Release metadata keyed by project.
#[derive(Debug, Clone, Default)]
pub struct ReleaseCache {
    bound: CacheBound,
    entries: HashMap<ReleaseProject, CacheEntry>,
}

impl ReleaseCache {
    /// Create an empty cache with the given bound.
    #[must_use]
    pub fn new(bound: CacheBound) -> Self {
        Self {
            bound,
            entries: HashMap::new(),
        }
    }

    /// Return the cached release for `project` if it is still within bound,
    /// counting the hit. Stale entries are evicted.
    pub fn get(&mut self, project: &ReleaseProject) -> Option<Release> {
        let fresh = self
            .entries
            .get(project)
            .is_some_and(|entry| self.is_fresh(entry));
        if !fresh {
            if self.entries.remove(project).is_some() {
                trace!("release cache: evicted stale entry for {project}");
            }
            return None;
        }

        let entry = self.entries.get_mut(project)?;
        entry.hits = entry.hits.saturating_add(1);
        Some(entry.release.clone())
    }

    /// Store a freshly fetched release.
    pub fn insert(&mut self, project: ReleaseProject, release: Release) {
        self.entries.insert(
            project,
            CacheEntry {
                release,
                stored_at: Instant::now(),
                hits: 0,
            },
        );
    }

    /// Number of cached projects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_fresh(&self, entry: &CacheEntry) -> bool {
        match self.bound {
            CacheBound::MaxAge(max_age) => entry.stored_at.elapsed() < max_age,
            CacheBound::MaxHits(max_hits) => entry.hits < max_hits,
        }
    }
}

/// Fetches latest releases through a [`ReleaseSource`], consulting its
/// [`ReleaseCache`] first.
///
/// # Examples
///
/// ```
/// use revanced_assist::release::cache::{CacheBound, ReleaseFetcher};
/// use revanced_assist::release::model::{Release, ReleaseProject};
/// use revanced_assist::release::source::{ReleaseError, ReleaseSource};
///
/// struct Fixed;
/// impl ReleaseSource for Fixed {
///     fn latest_release(&self, _: &ReleaseProject) -> Result<Release, ReleaseError> {
///         Ok(Release { name: None, tag_name: "v1.0.0".into(), assets: Vec::new() })
///     }
/// }
///
/// let mut fetcher = ReleaseFetcher::new(Box::new(Fixed), CacheBound::MaxHits(5));
/// let project = ReleaseProject { owner: "o".into(), repo: "r".into() };
/// fetcher.latest(&project).expect("first lookup");
/// fetcher.latest(&project).expect("cached lookup");
/// assert_eq!(fetcher.remote_calls(), 1);
/// ```
pub struct ReleaseFetcher {
    source: Box<dyn ReleaseSource>,
    cache: ReleaseCache,
    remote_calls: usize,
}

impl ReleaseFetcher {
    /// Wrap `source` with an empty cache.
    #[must_use]
    pub fn new(source: Box<dyn ReleaseSource>, bound: CacheBound) -> Self {
        Self {
            source,
            cache: ReleaseCache::new(bound),
            remote_calls: 0,
        }
    }

    /// Latest release of `project`, from cache when possible.
    ///
    /// # Errors
    ///
    /// Returns the source's error when the lookup misses the cache and the
    /// remote call fails. Errors are not cached.
    pub fn latest(&mut self, project: &ReleaseProject) -> Result<Release, ReleaseError> {
        if let Some(release) = self.cache.get(project) {
            debug!("release cache hit for {project}");
            return Ok(release);
        }

        self.remote_calls += 1;
        let release = self.source.latest_release(project)?;
        self.cache.insert(project.clone(), release.clone());
        Ok(release)
    }

    /// Number of lookups that reached the source.
    #[must_use]
    pub const fn remote_calls(&self) -> usize {
        self.remote_calls
    }

    /// The cache, for inspection.
    #[must_use]
    pub const fn cache(&self) -> &ReleaseCache {
        &self.cache
    }
}

impl std::fmt::Debug for ReleaseFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReleaseFetcher")
            .field("cache", &self.cache)
            .field("remote_calls", &self.remote_calls)
            .finish_non_exhaustive()
    }
}
