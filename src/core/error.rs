//! Configuration error types.
//!
//! Every variant names the location of the offending rule, for example
//! `overrides[1].restricted_imports[0]`. These errors are raised while the
//! configuration is being compiled; the classifier never sees a partially
//! invalid rule set.

use thiserror::Error;

use crate::builders::classifier::Group;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{location}: malformed pattern '{pattern}': {reason}")]
    MalformedPattern {
        location: String,
        pattern: String,
        reason: String,
    },

    #[error(
        "{location}: pattern '{pattern}' targets group '{group}', which is not part of the configured group sequence"
    )]
    UnknownGroupTarget {
        location: String,
        pattern: String,
        group: Group,
    },

    #[error("{location}: pattern '{pattern}' is assigned to both '{first}' and '{second}'")]
    ConflictingPathGroup {
        location: String,
        pattern: String,
        first: Group,
        second: Group,
    },

    #[error("{location}: group '{group}' appears more than once in the group sequence")]
    DuplicateGroup { location: String, group: Group },

    #[error("{location}: restricted import pattern \"{message}\" has no specifier globs")]
    EmptyRestrictedPattern { location: String, message: String },

    #[error("Unsupported config version: {0}")]
    UnsupportedVersion(String),

    #[error("Unsupported config format for '{0}' (expected .toml, .json, .yaml or .yml)")]
    UnsupportedFormat(String),
}
