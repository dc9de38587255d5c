//! Man page and package validation.
//!
//! Validates structural invariants of man pages and bundles, catching
//! duplicate spellings, empty names, and inconsistent nesting flags before
//! a page reaches the matcher.
//!
//! # Examples
//!
//! ```
//! use shell_explain_core::*;
//!
//! let page = ManPage::new("ls", "1")
//!     .with_option(ManOption::flag(&["-a"], &["--all"], "show hidden"));
//! assert!(validate_manpage(&page).is_empty());
//!
//! // Invalid: two options share the spelling `-a`
//! let bad = page.clone().with_option(ManOption::flag(&["-a"], &[], "again"));
//! assert!(!validate_manpage(&bad).is_empty());
//! ```

use std::collections::HashSet;

use thiserror::Error;

use crate::{ManOption, ManPage, ManPagePackage};

/// Man page / package validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Package version string is empty.
    #[error("package version cannot be empty")]
    EmptyPackageVersion,
    /// Page name is empty or whitespace-only.
    #[error("man page name cannot be empty")]
    EmptyName,
    /// Two pages in the same package share name and section.
    #[error("duplicate man page in package: {0}")]
    DuplicatePage(String),
    /// An option has no spelling at all.
    #[error("option must define at least one spelling")]
    MissingSpelling,
    /// A spelling is empty or contains whitespace.
    #[error("invalid option spelling: {0:?}")]
    InvalidSpelling(String),
    /// Two options of the same page share a spelling.
    #[error("duplicate option spelling: {0}")]
    DuplicateSpelling(String),
    /// An option starts nested commands but takes no value.
    #[error("option {0} nests commands but does not expect an argument")]
    NestedWithoutArgument(String),
    /// Two positional arguments share a name.
    #[error("duplicate argument: {0}")]
    DuplicateArgument(String),
}

/// Validates a full man page package.
///
/// Checks for an empty version string, duplicate pages, and validates each
/// page individually. Stops at the first failing page.
pub fn validate_package(package: &ManPagePackage) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if package.version.trim().is_empty() {
        errors.push(ValidationError::EmptyPackageVersion);
        return errors;
    }

    let mut seen: HashSet<(&str, &str)> = HashSet::new();
    for page in &package.pages {
        if !seen.insert((page.name.as_str(), page.section.as_str())) {
            errors.push(ValidationError::DuplicatePage(page.name_section()));
            return errors;
        }
        errors.extend(validate_manpage(page));
        if !errors.is_empty() {
            return errors;
        }
    }

    errors
}

/// Validates a single man page.
///
/// Enforces that no two options share a spelling, that every option has a
/// well-formed spelling, and that positional argument names are unique.
pub fn validate_manpage(page: &ManPage) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if page.name.trim().is_empty() {
        errors.push(ValidationError::EmptyName);
        return errors;
    }

    errors.extend(validate_options(&page.options));
    if !errors.is_empty() {
        return errors;
    }

    let mut names = HashSet::new();
    for argument in &page.arguments {
        if !names.insert(argument.name.as_str()) {
            errors.push(ValidationError::DuplicateArgument(argument.name.clone()));
            return errors;
        }
    }

    errors
}

fn validate_options(options: &[ManOption]) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();

    for option in options {
        if option.short.is_empty() && option.long.is_empty() {
            errors.push(ValidationError::MissingSpelling);
            return errors;
        }

        for spelling in option.spellings() {
            if spelling.is_empty() || spelling.chars().any(char::is_whitespace) {
                errors.push(ValidationError::InvalidSpelling(spelling.to_string()));
                return errors;
            }
            if !seen.insert(spelling) {
                errors.push(ValidationError::DuplicateSpelling(spelling.to_string()));
                return errors;
            }
        }

        if option.nested_command && !option.expects_arg {
            errors.push(ValidationError::NestedWithoutArgument(
                option.canonical_name().to_string(),
            ));
            return errors;
        }
    }

    errors
}
