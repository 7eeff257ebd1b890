// This file is the module declaration file for the `builders` module.
// It declares and makes public all the sub-modules within the `src/builders`
// directory. These modules encapsulate the rules logic and the pieces built
// around it.

// The `pub mod classifier;` declaration exposes the `classifier` module.
//
// `classifier` module:
// This is the heart of the crate. It defines the import data model
// (`ImportStatement`, `Group`, `Violation`), compiles a `RuleConfiguration`
// into `CompiledRules`, and implements `classify_and_order`, which groups,
// sorts and checks one list of imports.
pub mod classifier;

// `extractor` module:
// This module turns source text into `ImportStatement`s. It understands the
// JavaScript/TypeScript import forms and the fenced code blocks of Markdown
// documents.
pub mod extractor;

// `hooks` module:
// This module installs the git `pre-commit` hook that runs
// `import-order-lint check --staged` before every commit.
pub mod hooks;

// `patterns` module:
// This module provides the glob-like `SpecifierPattern` used by path groups,
// restricted imports, override file selectors and ignore patterns, along with
// the `PatternMatcher` trait.
pub mod patterns;

// `reporter` module:
// This module is responsible for presenting lint results. It defines a
// `ViolationReporter` trait with a colored `ConsoleReporter` and a
// `JsonReporter` for tooling.
pub mod reporter;

// `validator` module:
// This module is dedicated to ensuring the integrity and correctness of
// the configuration. It defines the `ConfigValidator` trait and a
// `StandardValidator` implementation that reports compile errors as well as
// rules that can never take effect.
pub mod validator;
