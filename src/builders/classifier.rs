use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::builders::patterns::{PatternMatcher, SpecifierPattern};
use crate::core::config::{AlphabetizePolicy, NewlinesBetween, Position, RuleConfiguration, SortOrder};
use crate::core::error::ConfigError;

/// Node.js core modules. A specifier whose first segment is one of these (or
/// which carries the `node:` scheme) is structurally a `builtin` import.
const NODE_BUILTINS: &[&str] = &[
    "assert",
    "async_hooks",
    "buffer",
    "child_process",
    "cluster",
    "console",
    "constants",
    "crypto",
    "dgram",
    "diagnostics_channel",
    "dns",
    "domain",
    "events",
    "fs",
    "http",
    "http2",
    "https",
    "inspector",
    "module",
    "net",
    "os",
    "path",
    "perf_hooks",
    "process",
    "punycode",
    "querystring",
    "readline",
    "repl",
    "stream",
    "string_decoder",
    "sys",
    "timers",
    "tls",
    "trace_events",
    "tty",
    "url",
    "util",
    "v8",
    "vm",
    "wasi",
    "worker_threads",
    "zlib",
];

const INDEX_EXTENSIONS: &[&str] = &["js", "jsx", "ts", "tsx", "mjs", "cjs"];

/// The named buckets imports are sorted into.
///
/// The variant order is the default group sequence and is also used to order
/// groups that a configuration leaves out of its sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Group {
    Builtin,
    External,
    Type,
    Internal,
    Parent,
    Sibling,
    Index,
    Object,
}

impl Group {
    pub const ALL: [Group; 8] = [
        Group::Builtin,
        Group::External,
        Group::Type,
        Group::Internal,
        Group::Parent,
        Group::Sibling,
        Group::Index,
        Group::Object,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Group::Builtin => "builtin",
            Group::External => "external",
            Group::Type => "type",
            Group::Internal => "internal",
            Group::Parent => "parent",
            Group::Sibling => "sibling",
            Group::Index => "index",
            Group::Object => "object",
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What an import declaration binds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImportKind {
    /// `import x from "m"`, `import { a } from "m"`, `import x = require("m")`.
    Value,
    /// `import type { T } from "m"`.
    Type,
    /// `import "m"`: no bound name.
    SideEffect,
    /// `import x = Namespace.member`: an alias of an object, not a module.
    Object,
}

impl ImportKind {
    /// The name compared when `order_import_kind` breaks specifier ties.
    fn sort_name(&self) -> &'static str {
        match self {
            ImportKind::Type => "type",
            ImportKind::Value | ImportKind::SideEffect | ImportKind::Object => "value",
        }
    }
}

/// One import declaration reduced to what the rules need.
///
/// `line` and `end_line` are 1-based and inclusive; they differ only for
/// declarations that span several lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportStatement {
    pub specifier: String,
    pub kind: ImportKind,
    pub line: usize,
    pub end_line: usize,
    /// Whitespace-only lines between the previous import and this one. When
    /// unknown, every line between the two declarations counts as blank.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blank_lines_before: Option<usize>,
}

impl ImportStatement {
    pub fn new(specifier: impl Into<String>, kind: ImportKind, line: usize) -> Self {
        Self {
            specifier: specifier.into(),
            kind,
            line,
            end_line: line,
            blank_lines_before: None,
        }
    }

    /// Records how many blank lines separate this declaration from the
    /// previous import.
    pub fn after_blank_lines(mut self, count: usize) -> Self {
        self.blank_lines_before = Some(count);
        self
    }

    /// Marks the declaration as ending on `end_line`.
    pub fn spanning(mut self, end_line: usize) -> Self {
        self.end_line = end_line.max(self.line);
        self
    }
}

/// Identifies which check produced a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RuleId {
    NoRestrictedImports,
    ImportOrder,
    NewlinesBetween,
    NoDuplicates,
    NoUselessPathSegments,
    NewlineAfterImport,
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RuleId::NoRestrictedImports => "no-restricted-imports",
            RuleId::ImportOrder => "import-order",
            RuleId::NewlinesBetween => "newlines-between",
            RuleId::NoDuplicates => "no-duplicates",
            RuleId::NoUselessPathSegments => "no-useless-path-segments",
            RuleId::NewlineAfterImport => "newline-after-import",
        };
        write!(f, "{name}")
    }
}

/// A reported deviation. Violations are data: every check runs to completion
/// and all findings are returned together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub rule: RuleId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specifier: Option<String>,
    pub line: usize,
    pub message: String,
}

impl Violation {
    fn at(rule: RuleId, stmt: &ImportStatement, message: impl Into<String>) -> Self {
        Self {
            rule,
            specifier: Some(stmt.specifier.clone()),
            line: stmt.line,
            message: message.into(),
        }
    }
}

/// A run of imports that belong together in the canonical order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportGroup {
    pub group: Group,
    pub imports: Vec<ImportStatement>,
}

/// The result of `classify_and_order`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportOrdering {
    pub groups: Vec<ImportGroup>,
    pub violations: Vec<Violation>,
}

impl ImportOrdering {
    /// Renders the canonical import block. `text_of` returns the source text
    /// of one declaration; groups are separated by a single blank line unless
    /// the mode is `never`.
    pub fn render_with<F>(&self, newlines: NewlinesBetween, mut text_of: F) -> String
    where
        F: FnMut(&ImportStatement) -> String,
    {
        let separator = match newlines {
            NewlinesBetween::Never => "\n",
            _ => "\n\n",
        };
        self.groups
            .iter()
            .map(|group| {
                group
                    .imports
                    .iter()
                    .map(&mut text_of)
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .collect::<Vec<_>>()
            .join(separator)
    }

    pub fn ordered_imports(&self) -> impl Iterator<Item = &ImportStatement> {
        self.groups.iter().flat_map(|group| group.imports.iter())
    }
}

#[derive(Debug, Clone)]
struct CompiledPathGroup {
    pattern: SpecifierPattern,
    group: Group,
    offset: i32,
}

#[derive(Debug, Clone)]
struct CompiledRestriction {
    patterns: Vec<SpecifierPattern>,
    message: String,
}

/// A `RuleConfiguration` with every pattern compiled and every cross-reference
/// checked. Building one is the only way to obtain something
/// `classify_and_order` accepts, so the classifier never runs on a broken
/// configuration.
#[derive(Debug, Clone)]
pub struct CompiledRules {
    groups: Vec<Group>,
    path_groups: Vec<CompiledPathGroup>,
    excluded: HashSet<Group>,
    distinct_group: bool,
    newlines_between: NewlinesBetween,
    alphabetize: AlphabetizePolicy,
    restrictions: Vec<CompiledRestriction>,
    internal_modules: Vec<String>,
    no_duplicates: bool,
    no_useless_path_segments: bool,
    newline_after_import: bool,
}

impl CompiledRules {
    /// Compiles `config`. `location` prefixes the rule locations quoted in
    /// errors (`base`, `overrides[2]`, ...).
    pub fn compile(config: &RuleConfiguration, location: &str) -> Result<Self, ConfigError> {
        let mut seen_groups = HashSet::new();
        for (i, group) in config.groups.iter().enumerate() {
            if !seen_groups.insert(*group) {
                return Err(ConfigError::DuplicateGroup {
                    location: format!("{location}.groups[{i}]"),
                    group: *group,
                });
            }
        }

        let mut assigned: HashMap<&str, Group> = HashMap::new();
        let mut path_groups = Vec::with_capacity(config.path_groups.len());
        for (i, rule) in config.path_groups.iter().enumerate() {
            let rule_location = format!("{location}.path_groups[{i}]");
            let pattern =
                SpecifierPattern::compile(&rule.pattern).map_err(|e| ConfigError::MalformedPattern {
                    location: rule_location.clone(),
                    pattern: rule.pattern.clone(),
                    reason: e.to_string(),
                })?;
            if !config.groups.contains(&rule.group) {
                return Err(ConfigError::UnknownGroupTarget {
                    location: rule_location,
                    pattern: rule.pattern.clone(),
                    group: rule.group,
                });
            }
            if let Some(first) = assigned.insert(rule.pattern.as_str(), rule.group)
                && first != rule.group
            {
                return Err(ConfigError::ConflictingPathGroup {
                    location: rule_location,
                    pattern: rule.pattern.clone(),
                    first,
                    second: rule.group,
                });
            }
            path_groups.push(CompiledPathGroup {
                pattern,
                group: rule.group,
                offset: 0,
            });
        }
        assign_position_offsets(config, &mut path_groups);

        let mut restrictions = Vec::with_capacity(config.restricted_imports.len());
        for (i, restricted) in config.restricted_imports.iter().enumerate() {
            let rule_location = format!("{location}.restricted_imports[{i}]");
            if restricted.group.is_empty() {
                return Err(ConfigError::EmptyRestrictedPattern {
                    location: rule_location,
                    message: restricted.message.clone(),
                });
            }
            let patterns = restricted
                .group
                .iter()
                .enumerate()
                .map(|(j, glob)| {
                    SpecifierPattern::compile(glob).map_err(|e| ConfigError::MalformedPattern {
                        location: format!("{rule_location}.group[{j}]"),
                        pattern: glob.clone(),
                        reason: e.to_string(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            restrictions.push(CompiledRestriction {
                patterns,
                message: restricted.message.clone(),
            });
        }

        Ok(Self {
            groups: config.groups.clone(),
            path_groups,
            excluded: config.path_groups_excluded_import_types.iter().copied().collect(),
            distinct_group: config.distinct_group,
            newlines_between: config.newlines_between,
            alphabetize: config.alphabetize.clone(),
            restrictions,
            internal_modules: config.internal_modules.clone(),
            no_duplicates: config.no_duplicates,
            no_useless_path_segments: config.no_useless_path_segments,
            newline_after_import: config.newline_after_import,
        })
    }

    pub fn newlines_between(&self) -> NewlinesBetween {
        self.newlines_between
    }

    pub fn checks_newline_after_import(&self) -> bool {
        self.newline_after_import
    }

    /// Position of `group` in the canonical sequence; groups left out of the
    /// sequence rank after every listed group.
    fn rank(&self, group: Group) -> usize {
        self.groups
            .iter()
            .position(|g| *g == group)
            .unwrap_or(self.groups.len())
    }

    /// The structural group of an import, before any path group applies.
    pub fn structural_group(&self, stmt: &ImportStatement) -> Group {
        match stmt.kind {
            ImportKind::Object => Group::Object,
            ImportKind::Type if self.groups.contains(&Group::Type) => Group::Type,
            _ => infer_group(&stmt.specifier, &self.internal_modules),
        }
    }

    /// Final group and position offset: the first matching path group wins.
    fn assign(&self, stmt: &ImportStatement) -> (Group, i32) {
        let structural = self.structural_group(stmt);
        if self.excluded.contains(&structural) {
            return (structural, 0);
        }
        self.path_groups
            .iter()
            .find(|rule| rule.pattern.matches(&stmt.specifier))
            .map(|rule| (rule.group, rule.offset))
            .unwrap_or((structural, 0))
    }
}

/// Turns `before`/`after` hints into numeric offsets within each group.
///
/// `before` rules of a group get `-n..-1` in declaration order, `after` rules
/// get `1..`, unpositioned members stay at `0`.
fn assign_position_offsets(config: &RuleConfiguration, compiled: &mut [CompiledPathGroup]) {
    let mut before: HashMap<Group, Vec<usize>> = HashMap::new();
    let mut after: HashMap<Group, i32> = HashMap::new();

    for (i, rule) in config.path_groups.iter().enumerate() {
        match rule.position {
            Some(Position::Before) => before.entry(rule.group).or_default().push(i),
            Some(Position::After) => {
                let next = after.entry(rule.group).or_insert(0);
                *next += 1;
                compiled[i].offset = *next;
            }
            None => {}
        }
    }
    for indices in before.values() {
        let count = indices.len() as i32;
        for (n, &i) in indices.iter().enumerate() {
            compiled[i].offset = -(count - n as i32);
        }
    }
}

/// Infers a group from specifier syntax alone. Anything unrecognized is
/// `external`, so every import is always classified.
pub fn infer_group(specifier: &str, internal_modules: &[String]) -> Group {
    if is_index_specifier(specifier) {
        return Group::Index;
    }
    if specifier == ".." || specifier.starts_with("../") {
        return Group::Parent;
    }
    if specifier.starts_with("./") {
        return Group::Sibling;
    }
    if specifier.starts_with("node:") {
        return Group::Builtin;
    }
    let root = specifier.split('/').next().unwrap_or_default();
    if NODE_BUILTINS.contains(&root) {
        return Group::Builtin;
    }
    if internal_modules.iter().any(|module| module == root) {
        return Group::Internal;
    }
    Group::External
}

fn is_index_specifier(specifier: &str) -> bool {
    match specifier {
        "." | "./" | "./index" => true,
        _ => specifier
            .strip_prefix("./index.")
            .is_some_and(|ext| INDEX_EXTENSIONS.contains(&ext)),
    }
}

/// An import together with everything needed to place it.
struct Placed<'a> {
    stmt: &'a ImportStatement,
    index: usize,
    group: Group,
    rank: usize,
    offset: i32,
    sort_key: String,
}

impl Placed<'_> {
    /// The bucket this import renders in. With `distinct_group`, imports placed
    /// by a positioned path group form their own bucket.
    fn bucket(&self, distinct_group: bool) -> (usize, Group, i32) {
        let sub = if distinct_group { self.offset } else { 0 };
        (self.rank, self.group, sub)
    }
}

fn compare_placed(a: &Placed<'_>, b: &Placed<'_>, policy: &AlphabetizePolicy) -> Ordering {
    let by_group = a
        .rank
        .cmp(&b.rank)
        .then(a.group.cmp(&b.group))
        .then(a.offset.cmp(&b.offset));
    if by_group != Ordering::Equal {
        return by_group;
    }

    let by_name = match policy.order {
        SortOrder::Asc => a.sort_key.cmp(&b.sort_key),
        SortOrder::Desc => b.sort_key.cmp(&a.sort_key),
        SortOrder::Ignore => Ordering::Equal,
    };
    let by_kind = match policy.order_import_kind {
        SortOrder::Asc => a.stmt.kind.sort_name().cmp(b.stmt.kind.sort_name()),
        SortOrder::Desc => b.stmt.kind.sort_name().cmp(a.stmt.kind.sort_name()),
        SortOrder::Ignore => Ordering::Equal,
    };
    by_name.then(by_kind)
}

/// Classifies, groups and orders one source unit's imports and reports every
/// violation found.
///
/// The returned groups hold every input import exactly once, in canonical
/// order. Violations cover restricted specifiers, out-of-order imports, blank
/// line separation and (when enabled) duplicates and useless path segments.
pub fn classify_and_order(imports: &[ImportStatement], rules: &CompiledRules) -> ImportOrdering {
    let mut placed: Vec<Placed<'_>> = imports
        .iter()
        .enumerate()
        .map(|(index, stmt)| {
            let (group, offset) = rules.assign(stmt);
            let sort_key = if rules.alphabetize.case_insensitive {
                stmt.specifier.to_lowercase()
            } else {
                stmt.specifier.clone()
            };
            Placed {
                stmt,
                index,
                group,
                rank: rules.rank(group),
                offset,
                sort_key,
            }
        })
        .collect();

    // Checks that walk the file in source order.
    placed.sort_by_key(|p| (p.stmt.line, p.index));
    let mut violations = Vec::new();
    violations.extend(restricted_violations(&placed, rules));
    violations.extend(order_violations(&placed, rules));
    violations.extend(blank_line_violations(&placed, rules));
    if rules.no_duplicates {
        violations.extend(duplicate_violations(&placed));
    }
    if rules.no_useless_path_segments {
        violations.extend(placed.iter().filter_map(|p| {
            useless_path_segments(&p.stmt.specifier).map(|proposed| {
                Violation::at(
                    RuleId::NoUselessPathSegments,
                    p.stmt,
                    format!(
                        "Useless path segments for \"{}\", should be \"{proposed}\"",
                        p.stmt.specifier
                    ),
                )
            })
        }));
    }
    violations.sort_by_key(|v| v.line);

    // Canonical order. `sort_by` is stable, so full ties keep input order.
    placed.sort_by(|a, b| compare_placed(a, b, &rules.alphabetize).then(a.index.cmp(&b.index)));
    let mut groups: Vec<ImportGroup> = Vec::new();
    let mut current_bucket = None;
    for p in &placed {
        let bucket = p.bucket(rules.distinct_group);
        if current_bucket == Some(bucket)
            && let Some(last) = groups.last_mut()
        {
            last.imports.push(p.stmt.clone());
        } else {
            groups.push(ImportGroup {
                group: p.group,
                imports: vec![p.stmt.clone()],
            });
            current_bucket = Some(bucket);
        }
    }

    ImportOrdering { groups, violations }
}

fn restricted_violations(placed: &[Placed<'_>], rules: &CompiledRules) -> Vec<Violation> {
    let mut violations = Vec::new();
    for p in placed {
        for restriction in &rules.restrictions {
            if restriction
                .patterns
                .iter()
                .any(|pattern| pattern.matches_within(&p.stmt.specifier))
            {
                violations.push(Violation::at(
                    RuleId::NoRestrictedImports,
                    p.stmt,
                    restriction.message.clone(),
                ));
            }
        }
    }
    violations
}

/// Reports each import that ranks before an import appearing earlier in the
/// file, naming the first earlier import it should precede.
fn order_violations(placed: &[Placed<'_>], rules: &CompiledRules) -> Vec<Violation> {
    let policy = &rules.alphabetize;
    let mut violations = Vec::new();
    let mut highest: Option<&Placed<'_>> = None;

    for (i, p) in placed.iter().enumerate() {
        match highest {
            Some(max) if compare_placed(p, max, policy) == Ordering::Less => {
                if let Some(earlier) = placed[..i]
                    .iter()
                    .find(|e| compare_placed(p, e, policy) == Ordering::Less)
                {
                    violations.push(Violation::at(
                        RuleId::ImportOrder,
                        p.stmt,
                        format!(
                            "`{}` import should occur before import of `{}`",
                            p.stmt.specifier, earlier.stmt.specifier
                        ),
                    ));
                }
            }
            _ => highest = Some(p),
        }
    }
    violations
}

fn blank_line_violations(placed: &[Placed<'_>], rules: &CompiledRules) -> Vec<Violation> {
    let mode = rules.newlines_between;
    if mode == NewlinesBetween::Ignore {
        return Vec::new();
    }

    let mut violations = Vec::new();
    for pair in placed.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        let gap = next
            .stmt
            .blank_lines_before
            .unwrap_or_else(|| next.stmt.line.saturating_sub(prev.stmt.end_line + 1));
        let same_group = prev.bucket(rules.distinct_group) == next.bucket(rules.distinct_group);

        let message = match mode {
            NewlinesBetween::Never if gap > 0 => {
                Some("There should be no empty line between import groups")
            }
            NewlinesBetween::Always | NewlinesBetween::AlwaysAndInsideGroups if !same_group => {
                match gap {
                    0 => Some("There should be at least one empty line between import groups"),
                    1 => None,
                    _ => Some("There should be no more than one empty line between import groups"),
                }
            }
            NewlinesBetween::Always if gap > 0 => {
                Some("There should be no empty line within import group")
            }
            NewlinesBetween::AlwaysAndInsideGroups if gap > 1 => {
                Some("There should be no more than one empty line within import group")
            }
            _ => None,
        };
        if let Some(message) = message {
            violations.push(Violation::at(RuleId::NewlinesBetween, next.stmt, message));
        }
    }
    violations
}

/// Reports every occurrence of a specifier imported more than once with the
/// same kind class, the first one included.
fn duplicate_violations(placed: &[Placed<'_>]) -> Vec<Violation> {
    let key = |p: &Placed<'_>| (p.stmt.specifier.clone(), p.stmt.kind == ImportKind::Type);
    let mut occurrences: HashMap<(String, bool), usize> = HashMap::new();
    for p in placed.iter().filter(|p| p.stmt.kind != ImportKind::Object) {
        *occurrences.entry(key(p)).or_insert(0) += 1;
    }
    placed
        .iter()
        .filter(|p| p.stmt.kind != ImportKind::Object)
        .filter(|p| occurrences.get(&key(p)).is_some_and(|&count| count > 1))
        .map(|p| {
            Violation::at(
                RuleId::NoDuplicates,
                p.stmt,
                format!("'{}' imported multiple times.", p.stmt.specifier),
            )
        })
        .collect()
}

/// Returns the shortest equivalent of a relative specifier when it differs
/// from the original: `./a/../b` -> `./b`, `./foo/index` -> `./foo`,
/// `../index.ts` -> `..`.
pub fn useless_path_segments(specifier: &str) -> Option<String> {
    if !(specifier == "." || specifier == ".." || specifier.starts_with("./") || specifier.starts_with("../")) {
        return None;
    }

    let mut segments = normalize_relative(specifier);
    if let Some(last) = segments.last()
        && is_index_file(last)
    {
        segments.pop();
    }
    let proposed = render_relative(&segments);
    (proposed != specifier).then_some(proposed)
}

fn is_index_file(segment: &str) -> bool {
    segment == "index"
        || segment
            .strip_prefix("index.")
            .is_some_and(|ext| INDEX_EXTENSIONS.contains(&ext))
}

fn normalize_relative(specifier: &str) -> Vec<&str> {
    let mut stack: Vec<&str> = Vec::new();
    for segment in specifier.split('/') {
        match segment {
            "" | "." => {}
            ".." => match stack.last() {
                Some(&last) if last != ".." => {
                    stack.pop();
                }
                _ => stack.push(".."),
            },
            other => stack.push(other),
        }
    }
    stack
}

fn render_relative(segments: &[&str]) -> String {
    match segments.first() {
        None => ".".to_string(),
        Some(&"..") => segments.join("/"),
        Some(_) => format!("./{}", segments.join("/")),
    }
}

/// Checks that the line following the last import of a unit is blank.
/// `next_line` is `None` when the import is the last line of the unit.
/// A comment directly below the imports is accepted.
pub fn newline_after_import(last: &ImportStatement, next_line: Option<&str>) -> Option<Violation> {
    let is_code = |line: &str| {
        let line = line.trim();
        !line.is_empty() && !line.starts_with("//") && !line.starts_with("/*")
    };
    match next_line {
        Some(line) if is_code(line) => Some(Violation {
            rule: RuleId::NewlineAfterImport,
            specifier: Some(last.specifier.clone()),
            line: last.end_line,
            message: "Expected 1 empty line after import statement not followed by another import."
                .to_string(),
        }),
        _ => None,
    }
}
