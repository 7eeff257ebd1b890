// This file is the module declaration file for the `core` module.
// In Rust, a `mod.rs` file within a directory (e.g., `src/core/`)
// serves two main purposes:
//
// 1. It declares the submodules contained within that directory.
// 2. It exposes these submodules to the parent module (`src/` in this case),
//    making them accessible to the entire crate.

// `config` module:
// This module is responsible for managing the lint configuration. It defines
// the on-disk structures (`ImportLintConfig`, `RuleConfiguration`, the
// per-file-role `OverrideLayer`s), the `RuleBook` that resolves the rule set
// for a path, a `ConfigProvider` trait for abstracting configuration access,
// and a `ConfigManager` that handles loading, saving, validating and
// exporting the configuration file.
pub mod config;

// `engine` module:
// The `LintEngine` ties everything together: it selects the rules for each
// file, extracts its imports, runs the classifier and collects `FileReport`s.
// It also rewrites import blocks for the `fix` command.
pub mod engine;

// `error` module:
// Typed configuration errors, each naming the offending rule location.
pub mod error;

// `git` module:
// The `GitClient` abstraction over the repository (staged and tracked files,
// staged blob content) and its `git2` implementation.
pub mod git;
