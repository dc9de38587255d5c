//! Core man page types and the lookup interface.
//!
//! This crate defines the foundational types for explaining shell command
//! lines against manual pages:
//!
//! - [`ManPage`]: normalized man page (name, synopsis, options, positional
//!   arguments, free-text sections, aliases, and matching hints).
//! - [`ManOption`]: a documented flag with all of its spellings.
//! - [`ManArgument`]: a documented positional argument.
//! - [`ManPagePackage`]: a versioned bundle of pages for distribution.
//! - [`ManPageLookup`]: the interface store backends implement and the
//!   explanation engine consumes.
//!
//! Validation ([`validate_manpage`], [`validate_package`]) enforces
//! structural invariants such as "no two options of a page share a
//! spelling".
//!
//! # Example
//!
//! ```
//! use shell_explain_core::*;
//!
//! let page = ManPage::new("grep", "1")
//!     .with_synopsis("grep - print lines that match patterns")
//!     .with_option(ManOption::flag(&["-i"], &["--ignore-case"], "Ignore case distinctions"))
//!     .with_option(ManOption::with_arg(&[], &["--color", "--colour"], "Surround matches with color"))
//!     .with_argument(ManArgument::new("PATTERNS", "Patterns to search for"))
//!     .with_argument(ManArgument::new("FILE", "Files to search").variadic());
//!
//! assert!(page.find_option("--colour").unwrap().expects_arg);
//! assert!(validate_manpage(&page).is_empty());
//! ```

mod lookup;
mod package;
mod types;
mod validate;

pub use lookup::{LookupError, ManPageLookup};
pub use package::ManPagePackage;
pub use types::*;
pub use validate::{ValidationError, validate_manpage, validate_package};
