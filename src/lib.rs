//! Import grouping, ordering and module-boundary checks for JavaScript and
//! TypeScript projects.
//!
//! The rules engine lives in [`builders::classifier`]; [`core::engine`] applies
//! it to files, directories and git staging areas.

pub mod builders;
pub mod core;
pub mod utils;
