//! The man page lookup interface consumed by the explanation engine.
//!
//! Store backends implement [`ManPageLookup`]; the engine only ever reads
//! through it. A missing page is `Ok(None)`, while transport, storage, and
//! timeout failures are reported as [`LookupError`]. The engine maps both to
//! an unresolved command rather than failing the request.

use std::sync::Arc;

use thiserror::Error;

use crate::ManPage;

/// Failure of an external man page lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// The backing store reported an error.
    #[error("lookup backend error: {0}")]
    Backend(String),
    /// The lookup did not complete in time.
    #[error("lookup timed out after {0} ms")]
    Timeout(u64),
    /// The store returned data that could not be decoded into a page.
    #[error("malformed man page record: {0}")]
    Malformed(String),
}

impl From<serde_json::Error> for LookupError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed(err.to_string())
    }
}

/// Retrieves a man page by command name.
///
/// `name` may carry a section suffix (`ls.1`); implementations interpret it
/// with [`split_section`](crate::split_section).
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use shell_explain_core::{LookupError, ManPage, ManPageLookup};
///
/// struct Fixed(HashMap<String, ManPage>);
///
/// impl ManPageLookup for Fixed {
///     fn get_manpage(&self, name: &str) -> Result<Option<ManPage>, LookupError> {
///         Ok(self.0.get(name).cloned())
///     }
/// }
///
/// let mut pages = HashMap::new();
/// pages.insert("ls".to_string(), ManPage::new("ls", "1"));
/// let lookup = Fixed(pages);
/// assert!(lookup.get_manpage("ls").unwrap().is_some());
/// assert!(lookup.get_manpage("nope").unwrap().is_none());
/// ```
pub trait ManPageLookup {
    /// Returns the best page for `name`, `Ok(None)` when there is none.
    fn get_manpage(&self, name: &str) -> Result<Option<ManPage>, LookupError>;
}

impl<T: ManPageLookup + ?Sized> ManPageLookup for &T {
    fn get_manpage(&self, name: &str) -> Result<Option<ManPage>, LookupError> {
        (**self).get_manpage(name)
    }
}

impl<T: ManPageLookup + ?Sized> ManPageLookup for Box<T> {
    fn get_manpage(&self, name: &str) -> Result<Option<ManPage>, LookupError> {
        (**self).get_manpage(name)
    }
}

impl<T: ManPageLookup + ?Sized> ManPageLookup for Arc<T> {
    fn get_manpage(&self, name: &str) -> Result<Option<ManPage>, LookupError> {
        (**self).get_manpage(name)
    }
}
