//! Command name to man page resolution.
//!
//! Two layers sit in front of the external [`ManPageLookup`]:
//!
//! - [`ManPageCache`] is shared by every request of the process. It only
//!   ever holds successfully resolved pages. Readers take a read lock and
//!   never wait for another request's lookup to finish; two requests that
//!   miss on the same name both go to the lookup.
//! - [`Resolver`] lives for one request and memoizes every outcome,
//!   including failures, so a name reaches the lookup at most once per
//!   request.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use shell_explain_core::{LookupError, ManPage, ManPageLookup, validate_manpage};
use tracing::{debug, info, warn};

/// Process-wide cache of resolved man pages.
///
/// Construct one at startup and pass it by reference to every request.
/// Entries are inserted on first successful resolution; eviction is left to
/// the owner via [`remove`](Self::remove) and [`clear`](Self::clear).
#[derive(Debug, Default)]
pub struct ManPageCache {
    pages: RwLock<HashMap<String, Arc<ManPage>>>,
}

impl ManPageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Arc<ManPage>> {
        self.pages
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Stores `page` under `name` and returns the shared handle.
    ///
    /// When another request inserted the same name first, its page is kept
    /// and returned so that all holders observe a single instance.
    pub fn insert(&self, name: &str, page: ManPage) -> Arc<ManPage> {
        let mut pages = self.pages.write().unwrap_or_else(PoisonError::into_inner);
        pages
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(page))
            .clone()
    }

    pub fn remove(&self, name: &str) -> Option<Arc<ManPage>> {
        self.pages
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
    }

    pub fn clear(&self) {
        self.pages
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.pages.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Why a command has no man page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum UnresolvedReason {
    /// The lookup has no page under this name.
    NotFound,
    /// The lookup failed (storage, transport, or timeout).
    LookupFailed(String),
    /// The lookup returned a page that violates the model invariants.
    Malformed(String),
}

impl std::fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "no man page found"),
            Self::LookupFailed(detail) => write!(f, "man page lookup failed: {detail}"),
            Self::Malformed(detail) => write!(f, "man page is malformed: {detail}"),
        }
    }
}

/// Outcome of resolving one command name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(Arc<ManPage>),
    Unresolved(UnresolvedReason),
}

impl Resolution {
    pub fn page(&self) -> Option<&ManPage> {
        match self {
            Self::Resolved(page) => Some(page),
            Self::Unresolved(_) => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }
}

/// Returns the name a command is looked up under.
///
/// Paths resolve by their final component (`/usr/bin/ls` -> `ls`).
pub fn normalize_name(name: &str) -> &str {
    match name.rsplit_once('/') {
        Some((_, base)) => base,
        None => name,
    }
}

/// Per-request resolver with mandatory memoization.
///
/// # Examples
///
/// ```
/// use shell_explain_core::{LookupError, ManPage, ManPageLookup};
/// use shell_explain_engine::{ManPageCache, Resolver};
///
/// struct OnlyLs;
///
/// impl ManPageLookup for OnlyLs {
///     fn get_manpage(&self, name: &str) -> Result<Option<ManPage>, LookupError> {
///         Ok((name == "ls").then(|| ManPage::new("ls", "1")))
///     }
/// }
///
/// let cache = ManPageCache::new();
/// let mut resolver = Resolver::new(&OnlyLs, &cache);
/// assert!(resolver.resolve("/bin/ls").is_resolved());
/// assert!(!resolver.resolve("nope").is_resolved());
/// assert_eq!(cache.len(), 1);
/// ```
pub struct Resolver<'a, L: ManPageLookup + ?Sized> {
    lookup: &'a L,
    cache: &'a ManPageCache,
    memo: HashMap<String, Resolution>,
}

impl<'a, L: ManPageLookup + ?Sized> Resolver<'a, L> {
    pub fn new(lookup: &'a L, cache: &'a ManPageCache) -> Self {
        Self {
            lookup,
            cache,
            memo: HashMap::new(),
        }
    }

    /// Resolves `name`, consulting the request memo, then the shared cache,
    /// then the external lookup.
    pub fn resolve(&mut self, name: &str) -> Resolution {
        let key = normalize_name(name);
        if let Some(hit) = self.memo.get(key) {
            debug!(name = key, "resolver memo hit");
            return hit.clone();
        }

        let resolution = self.resolve_uncached(key);
        self.memo.insert(key.to_string(), resolution.clone());
        resolution
    }

    /// Returns the memoized outcome of `name` without resolving it.
    pub fn resolved(&self, name: &str) -> Option<&Resolution> {
        self.memo.get(normalize_name(name))
    }

    /// Consumes the resolver, yielding every outcome keyed by normalized name.
    pub fn into_resolutions(self) -> HashMap<String, Resolution> {
        self.memo
    }

    fn resolve_uncached(&self, key: &str) -> Resolution {
        if key.is_empty() {
            return Resolution::Unresolved(UnresolvedReason::NotFound);
        }
        if let Some(page) = self.cache.get(key) {
            debug!(name = key, "man page cache hit");
            return Resolution::Resolved(page);
        }

        info!(name = key, "looking up man page");
        match self.lookup.get_manpage(key) {
            Ok(Some(page)) => {
                let errors = validate_manpage(&page);
                if let Some(error) = errors.first() {
                    warn!(name = key, %error, "rejecting malformed man page");
                    return Resolution::Unresolved(UnresolvedReason::Malformed(error.to_string()));
                }
                Resolution::Resolved(self.cache.insert(key, page))
            }
            Ok(None) => {
                debug!(name = key, "no man page");
                Resolution::Unresolved(UnresolvedReason::NotFound)
            }
            Err(LookupError::Malformed(detail)) => {
                warn!(name = key, %detail, "lookup returned a malformed record");
                Resolution::Unresolved(UnresolvedReason::Malformed(detail))
            }
            Err(error) => {
                warn!(name = key, %error, "man page lookup failed");
                Resolution::Unresolved(UnresolvedReason::LookupFailed(error.to_string()))
            }
        }
    }
}
