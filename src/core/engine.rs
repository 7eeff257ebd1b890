use anyhow::{Context, Result};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::builders::classifier::{
    CompiledRules, ImportStatement, Violation, classify_and_order, newline_after_import,
};
use crate::builders::extractor::{ImportExtractor, SourceExtractor, SourceUnit};
use crate::builders::reporter::FileReport;
use crate::core::config::{ConfigManager, RuleBook};
use crate::core::error::ConfigError;
use crate::core::git::GitClient;

/// Directories never descended into when walking a path.
const SKIPPED_DIRS: &[&str] = &["node_modules", ".git", ".next"];

/// What `fix` did to one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FixOutcome {
    Unchanged,
    /// The new file content.
    Rewritten(String),
    /// The file was left alone; the reason is shown to the user.
    Skipped(String),
}

#[derive(Debug, Clone)]
pub struct FixReport {
    pub path: String,
    pub outcome: FixOutcome,
}

pub struct LintEngine {
    book: RuleBook,
    extractor: Box<dyn ImportExtractor>,
    project_root: PathBuf,
    // Keyed by the indices of the override layers that apply.
    compiled: HashMap<Vec<usize>, CompiledRules>,
}

impl LintEngine {
    pub fn new(config_manager: &ConfigManager) -> Result<Self> {
        let book = config_manager.load_rule_book()?;
        Self::with_rule_book(book, config_manager.get_project_root())
    }

    pub fn with_rule_book(book: RuleBook, project_root: &Path) -> Result<Self> {
        let project_root = project_root
            .canonicalize()
            .unwrap_or_else(|_| project_root.to_path_buf());
        Ok(Self {
            book,
            extractor: Box::new(SourceExtractor::new()?),
            project_root,
            compiled: HashMap::new(),
        })
    }

    /// Compiled rules for `path`. Each combination of override layers is
    /// compiled once.
    fn rules_for(&mut self, path: &str) -> Result<&CompiledRules, ConfigError> {
        let layers = self.book.layers_for(path);
        match self.compiled.entry(layers) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                debug!(path, layers = ?entry.key(), "compiling rule combination");
                let rules = self.book.compile_layers(entry.key())?;
                Ok(entry.insert(rules))
            }
        }
    }

    /// `/`-separated path relative to the project root, or `None` for files
    /// outside of it.
    fn relative_path(&self, path: &Path) -> Option<String> {
        path.strip_prefix(&self.project_root)
            .ok()
            .map(|relative| relative.to_string_lossy().replace('\\', "/"))
    }

    fn is_lintable(&self, relative: &str) -> bool {
        if self.book.is_ignored(relative) {
            debug!(path = relative, "ignored by configuration");
            return false;
        }
        self.extractor.supports(relative)
    }

    /// Lints one file's content. `path` is relative to the project root and
    /// selects the override layers.
    pub fn lint_source(&mut self, path: &str, content: &str) -> Result<FileReport> {
        let units = self.extractor.extract(path, content)?;
        let mut report = FileReport {
            path: path.to_string(),
            roles: self.book.roles_for(path),
            import_count: units.iter().map(|unit| unit.imports.len()).sum(),
            violations: Vec::new(),
            error: None,
        };

        let rules = match self.rules_for(path) {
            Ok(rules) => rules,
            Err(e) => {
                warn!(path, error = %e, "override layers conflict");
                report.error = Some(e.to_string());
                return Ok(report);
            }
        };
        for unit in &units {
            report.violations.extend(lint_unit(unit, rules));
        }
        report.violations.sort_by_key(|violation| violation.line);

        debug!(
            path,
            imports = report.import_count,
            violations = report.violations.len(),
            "linted"
        );
        Ok(report)
    }

    /// Lints files and directories. Directories are walked recursively.
    pub fn lint_paths(&mut self, paths: &[PathBuf]) -> Result<Vec<FileReport>> {
        let mut reports = Vec::new();
        for (file, relative) in self.collect_files(paths)? {
            if !self.is_lintable(&relative) {
                continue;
            }
            let content = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            reports.push(self.lint_source(&relative, &content)?);
        }
        info!(files = reports.len(), "linted paths");
        Ok(reports)
    }

    /// Lints the working tree copy of every tracked file.
    pub fn lint_tracked(&mut self, git: &dyn GitClient) -> Result<Vec<FileReport>> {
        let repo_root = canonical(&git.get_repo_root());
        let mut reports = Vec::new();
        for tracked in git.get_tracked_files()? {
            let file = repo_root.join(&tracked);
            let Some(relative) = self.relative_path(&file) else {
                continue;
            };
            // Deleted in the working tree but still in the index.
            if !file.is_file() || !self.is_lintable(&relative) {
                continue;
            }
            let content = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            reports.push(self.lint_source(&relative, &content)?);
        }
        info!(files = reports.len(), "linted tracked files");
        Ok(reports)
    }

    /// Lints the staged content of every staged file, which may differ from
    /// the working tree.
    pub fn lint_staged(&mut self, git: &dyn GitClient) -> Result<Vec<FileReport>> {
        let repo_root = canonical(&git.get_repo_root());
        let mut reports = Vec::new();
        for staged in git.get_staged_files()? {
            let Some(relative) = self.relative_path(&repo_root.join(&staged)) else {
                continue;
            };
            if !self.is_lintable(&relative) {
                continue;
            }
            let content = git.read_staged_file_content(&staged)?;
            reports.push(self.lint_source(&relative, &content)?);
        }
        info!(files = reports.len(), "linted staged files");
        Ok(reports)
    }

    /// Computes the rewritten content of a script file whose imports form one
    /// contiguous block. Markdown files and blocks interleaved with code are
    /// skipped.
    pub fn fix_source(&mut self, path: &str, content: &str) -> Result<FixOutcome> {
        if content.contains("\r\n") {
            return Ok(FixOutcome::Skipped(
                "CRLF line endings are not rewritten".to_string(),
            ));
        }
        let mut units = self.extractor.extract(path, content)?;
        let unit = match units.pop() {
            Some(unit) if units.is_empty() && unit.first_line == 1 => unit,
            None => return Ok(FixOutcome::Unchanged),
            Some(_) => {
                return Ok(FixOutcome::Skipped(
                    "imports inside code fences are not rewritten".to_string(),
                ));
            }
        };
        if unit.imports.is_empty() {
            return Ok(FixOutcome::Unchanged);
        }

        let rules = match self.rules_for(path) {
            Ok(rules) => rules,
            Err(e) => return Ok(FixOutcome::Skipped(e.to_string())),
        };

        let start = unit.imports.iter().map(|stmt| stmt.line).min().unwrap_or(1);
        let end = unit
            .imports
            .iter()
            .map(|stmt| stmt.end_line)
            .max()
            .unwrap_or(start);
        if let Some(line) = interleaved_line(&unit, start, end) {
            return Ok(FixOutcome::Skipped(format!(
                "line {line} between imports is not an import"
            )));
        }

        let ordering = classify_and_order(&unit.imports, rules);
        let block = ordering.render_with(rules.newlines_between(), |stmt| unit.text_of(stmt));

        let mut lines: Vec<String> = unit.lines[..start - 1].to_vec();
        lines.extend(block.lines().map(str::to_string));
        let rest = &unit.lines[end.min(unit.lines.len())..];
        if rules.checks_newline_after_import()
            && let Some(last) = ordering.ordered_imports().last()
            && newline_after_import(last, rest.first().map(String::as_str)).is_some()
        {
            lines.push(String::new());
        }
        lines.extend(rest.iter().cloned());

        let mut fixed = lines.join("\n");
        if content.ends_with('\n') {
            fixed.push('\n');
        }
        if fixed == content {
            Ok(FixOutcome::Unchanged)
        } else {
            Ok(FixOutcome::Rewritten(fixed))
        }
    }

    /// Rewrites the import blocks of the given files and directories in place.
    pub fn fix_paths(&mut self, paths: &[PathBuf]) -> Result<Vec<FixReport>> {
        let mut reports = Vec::new();
        for (file, relative) in self.collect_files(paths)? {
            if !self.is_lintable(&relative) {
                continue;
            }
            let content = fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let outcome = self.fix_source(&relative, &content)?;
            match &outcome {
                FixOutcome::Rewritten(fixed) => {
                    fs::write(&file, fixed)
                        .with_context(|| format!("Failed to write {}", file.display()))?;
                    info!(path = %relative, "rewrote import block");
                }
                FixOutcome::Skipped(reason) => warn!(path = %relative, "not fixed: {reason}"),
                FixOutcome::Unchanged => {}
            }
            reports.push(FixReport {
                path: relative,
                outcome,
            });
        }
        Ok(reports)
    }

    /// Expands `paths` into files, paired with their project-relative path.
    fn collect_files(&self, paths: &[PathBuf]) -> Result<Vec<(PathBuf, String)>> {
        let cwd = std::env::current_dir().context("Failed to read current directory")?;
        let mut files = Vec::new();

        for path in paths {
            let absolute = if path.is_absolute() {
                path.clone()
            } else {
                cwd.join(path)
            };
            let absolute = absolute
                .canonicalize()
                .with_context(|| format!("Cannot access {}", path.display()))?;

            if absolute.is_dir() {
                let walker = WalkDir::new(&absolute)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_entry(|entry| {
                        entry.depth() == 0
                            || !(entry.file_type().is_dir()
                                && entry
                                    .file_name()
                                    .to_str()
                                    .is_some_and(|name| SKIPPED_DIRS.contains(&name)))
                    });
                for entry in walker {
                    let entry = entry.context("Failed to walk directory")?;
                    if entry.file_type().is_file() {
                        files.push(entry.into_path());
                    }
                }
            } else {
                files.push(absolute);
            }
        }

        Ok(files
            .into_iter()
            .map(|file| {
                let relative = self
                    .relative_path(&file)
                    .unwrap_or_else(|| file.to_string_lossy().into_owned());
                (file, relative)
            })
            .collect())
    }
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

/// Runs every per-unit check.
fn lint_unit(unit: &SourceUnit, rules: &CompiledRules) -> Vec<Violation> {
    let mut violations = classify_and_order(&unit.imports, rules).violations;
    if rules.checks_newline_after_import()
        && let Some(last) = unit.imports.iter().max_by_key(|stmt| stmt.end_line)
        && let Some(violation) = newline_after_import(last, unit.line(last.end_line + 1))
    {
        violations.push(violation);
    }
    violations
}

/// First line within `start..=end` that is neither blank nor part of an import.
fn interleaved_line(unit: &SourceUnit, start: usize, end: usize) -> Option<usize> {
    let covered = |number: usize| {
        unit.imports
            .iter()
            .any(|stmt: &ImportStatement| stmt.line <= number && number <= stmt.end_line)
    };
    (start..=end).find(|&number| {
        !covered(number) && unit.line(number).is_some_and(|line| !line.trim().is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::classifier::{Group, RuleId};
    use crate::core::config::{FileRole, ImportLintConfig, PathGroupRule};
    use tempfile::tempdir;

    fn engine_at(root: &Path) -> LintEngine {
        let book = RuleBook::compile(&ImportLintConfig::default()).unwrap();
        LintEngine::with_rule_book(book, root).unwrap()
    }

    fn count(report: &FileReport, rule: RuleId) -> usize {
        report.violations.iter().filter(|v| v.rule == rule).count()
    }

    #[test]
    fn test_lint_source_reports_every_rule() {
        let dir = tempdir().unwrap();
        let mut engine = engine_at(dir.path());
        let content = "import React from \"react\";\nimport { util } from \"lib/util\";\nimport Button from \"../components/Button\";\nconst x = 1;\n";

        let report = engine.lint_source("src/pages/index.tsx", content).unwrap();
        assert_eq!(report.roles, vec![FileRole::Typescript]);
        assert_eq!(report.import_count, 3);
        assert_eq!(count(&report, RuleId::NoRestrictedImports), 2);
        assert_eq!(count(&report, RuleId::NewlinesBetween), 2);
        assert_eq!(count(&report, RuleId::ImportOrder), 0);
        assert_eq!(count(&report, RuleId::NewlineAfterImport), 1);
        assert!(report.violations.windows(2).all(|w| w[0].line <= w[1].line));
    }

    #[test]
    fn test_comment_lines_do_not_separate_groups() {
        let dir = tempdir().unwrap();
        let mut engine = engine_at(dir.path());

        let content = "import fs from \"fs\";\n// packages\nimport axios from \"axios\";\n\nconst client = axios.create();\n";
        let report = engine.lint_source("src/server.ts", content).unwrap();
        let blank: Vec<(usize, &str)> = report
            .violations
            .iter()
            .filter(|v| v.rule == RuleId::NewlinesBetween)
            .map(|v| (v.line, v.message.as_str()))
            .collect();
        assert_eq!(
            blank,
            vec![(3, "There should be at least one empty line between import groups")]
        );

        let content = "import axios from \"axios\";\n// utility belt\nimport lodash from \"lodash\";\n";
        let report = engine.lint_source("src/server.ts", content).unwrap();
        assert_eq!(count(&report, RuleId::NewlinesBetween), 0, "{:?}", report.violations);
    }

    #[test]
    fn test_test_files_only_keep_relative_import_restriction() {
        let dir = tempdir().unwrap();
        let mut engine = engine_at(dir.path());
        let content = "import { util } from \"lib/util\";\n\nimport Button from \"../components/Button\";\n";

        let plain = engine.lint_source("src/Button.tsx", content).unwrap();
        assert_eq!(count(&plain, RuleId::NoRestrictedImports), 2);

        let test = engine.lint_source("src/Button.test.tsx", content).unwrap();
        assert_eq!(test.roles, vec![FileRole::Typescript, FileRole::Test]);
        let restricted: Vec<_> = test
            .violations
            .iter()
            .filter(|v| v.rule == RuleId::NoRestrictedImports)
            .collect();
        assert_eq!(restricted.len(), 1);
        assert_eq!(restricted[0].specifier.as_deref(), Some("../components/Button"));
    }

    #[test]
    fn test_markdown_code_fences_are_linted() {
        let dir = tempdir().unwrap();
        let mut engine = engine_at(dir.path());
        let content = "# Buttons\n\n```tsx\nimport { ExampleButton } from \"components/buttons\";\nimport React from \"react\";\n```\n";

        let report = engine.lint_source("docs/README.md", content).unwrap();
        assert_eq!(report.roles, vec![FileRole::Markdown]);
        let order: Vec<_> = report
            .violations
            .iter()
            .filter(|v| v.rule == RuleId::ImportOrder)
            .collect();
        assert_eq!(order.len(), 1);
        assert_eq!(order[0].line, 5);
        assert_eq!(
            order[0].message,
            "`react` import should occur before import of `components/buttons`"
        );
        assert_eq!(count(&report, RuleId::NewlineAfterImport), 0);
    }

    #[test]
    fn test_conflicting_layer_combination_is_reported_per_file() {
        let dir = tempdir().unwrap();
        let mut config = ImportLintConfig::default();
        // Valid on their own; together the test layer targets a group the
        // typescript layer removed from the sequence.
        config.overrides[0].rules.groups = Some(
            config
                .base
                .groups
                .iter()
                .copied()
                .filter(|g| *g != Group::Parent)
                .collect(),
        );
        config.overrides[0].rules.path_groups = Some(Vec::new());
        config.overrides[1].rules.path_groups = Some(vec![PathGroupRule {
            pattern: "fixtures/**".to_string(),
            group: Group::Parent,
            position: None,
        }]);
        let book = RuleBook::compile(&config).unwrap();
        let mut engine = LintEngine::with_rule_book(book, dir.path()).unwrap();

        let report = engine
            .lint_source("src/a.test.ts", "import a from \"a\";\n")
            .unwrap();
        let error = report.error.unwrap();
        assert!(error.starts_with("base+overrides[0]+overrides[1]"), "{error}");

        let report = engine.lint_source("src/a.ts", "import a from \"a\";\n").unwrap();
        assert!(report.is_clean());
    }

    #[test]
    fn test_lint_paths_skips_vendored_ignored_and_unsupported_files() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::write(root.join("src/a.ts"), "import x from \"lib/x\";\n").unwrap();
        fs::write(root.join("src/style.scss"), "@import \"lib/x\";\n").unwrap();
        fs::write(root.join("node_modules/pkg/index.js"), "import x from \"lib/x\";\n").unwrap();
        fs::write(root.join("next-env.d.ts"), "import x from \"lib/x\";\n").unwrap();

        let mut engine = engine_at(root);
        let reports = engine.lint_paths(&[root.to_path_buf()]).unwrap();
        let paths: Vec<&str> = reports.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["src/a.ts"]);
        assert_eq!(count(&reports[0], RuleId::NoRestrictedImports), 1);
    }

    #[test]
    fn test_fix_rewrites_block_and_is_idempotent() {
        let dir = tempdir().unwrap();
        let mut engine = engine_at(dir.path());
        let content = "import { ExampleButton } from \"components/buttons\";\nimport React from \"react\";\nimport styles from \"./index.module.scss\";\nimport { useRouter } from \"next/router\";\nexport default function Page() {}\n";

        let FixOutcome::Rewritten(fixed) = engine.fix_source("src/pages/index.tsx", content).unwrap()
        else {
            panic!("expected a rewrite");
        };
        assert_eq!(
            fixed,
            "import { useRouter } from \"next/router\";\nimport React from \"react\";\n\nimport { ExampleButton } from \"components/buttons\";\n\nimport styles from \"./index.module.scss\";\n\nexport default function Page() {}\n"
        );
        assert_eq!(
            engine.fix_source("src/pages/index.tsx", &fixed).unwrap(),
            FixOutcome::Unchanged
        );
        assert!(engine.lint_source("src/pages/index.tsx", &fixed).unwrap().is_clean());
    }

    #[test]
    fn test_fix_skips_interleaved_code_and_markdown() {
        let dir = tempdir().unwrap();
        let mut engine = engine_at(dir.path());

        let interleaved = "import b from \"b\";\nconst x = 1;\nimport a from \"a\";\n";
        assert_eq!(
            engine.fix_source("src/a.ts", interleaved).unwrap(),
            FixOutcome::Skipped("line 2 between imports is not an import".to_string())
        );

        let markdown = "```ts\nimport b from \"b\";\nimport a from \"a\";\n```\n";
        assert!(matches!(
            engine.fix_source("README.md", markdown).unwrap(),
            FixOutcome::Skipped(_)
        ));
    }

    #[test]
    fn test_fix_paths_writes_files() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.js");
        fs::write(&file, "import b from \"b\";\nimport a from \"a\";\n").unwrap();

        let mut engine = engine_at(dir.path());
        let reports = engine.fix_paths(&[file.clone()]).unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].path, "a.js");
        assert_eq!(
            fs::read_to_string(&file).unwrap(),
            "import a from \"a\";\nimport b from \"b\";\n"
        );
    }
}
