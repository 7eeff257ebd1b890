use anyhow::{Context, Result};
use regex::Regex;
use std::path::Path;
use tracing::{debug, warn};

use crate::builders::classifier::{ImportKind, ImportStatement};

/// Extensions linted as JavaScript/TypeScript modules.
const SCRIPT_EXTENSIONS: &[&str] = &["js", "jsx", "ts", "tsx", "mjs", "cjs"];
/// Code fence info strings whose content is linted in Markdown files.
const FENCE_LANGUAGES: &[&str] = &["js", "jsx", "ts", "tsx", "javascript", "typescript"];
/// A declaration still open after this many lines is abandoned.
const MAX_STATEMENT_LINES: usize = 200;

/// A span of text linted as one import list: a whole script file, or one
/// fenced code block of a Markdown document.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    /// 1-based file line of `lines[0]`.
    pub first_line: usize,
    pub lines: Vec<String>,
    /// Line numbers are file-absolute.
    pub imports: Vec<ImportStatement>,
}

impl SourceUnit {
    /// The text of file line `number`, if it belongs to this unit.
    pub fn line(&self, number: usize) -> Option<&str> {
        number
            .checked_sub(self.first_line)
            .and_then(|index| self.lines.get(index))
            .map(String::as_str)
    }

    /// The full source text of one declaration.
    pub fn text_of(&self, stmt: &ImportStatement) -> String {
        (stmt.line..=stmt.end_line)
            .filter_map(|number| self.line(number))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A trait that defines how import declarations are pulled out of a file.
///
/// This keeps the rules engine independent of how source text is read; a
/// caller with a real parser can produce `ImportStatement`s directly.
pub trait ImportExtractor {
    /// Whether files at `path` are understood by this extractor.
    fn supports(&self, path: &str) -> bool;

    /// Splits `content` into source units and extracts their imports.
    ///
    /// # Arguments
    /// * `path`: The file path, used to pick between script and Markdown handling.
    /// * `content`: The full text of the file.
    fn extract(&self, path: &str, content: &str) -> Result<Vec<SourceUnit>>;
}

/// Line-oriented extractor for JavaScript and TypeScript import syntax.
pub struct SourceExtractor {
    start: Regex,
    type_only: Regex,
    from_clause: Regex,
    side_effect: Regex,
    require: Regex,
    object_alias: Regex,
    fence: Regex,
}

fn extension_of(path: &str) -> Option<&str> {
    Path::new(path).extension().and_then(|ext| ext.to_str())
}

/// Records on each import how many whitespace-only lines lie between it and
/// the previous import of the unit. Comment lines do not count.
fn count_blank_separators(imports: &mut [ImportStatement], lines: &[String], first_line: usize) {
    let mut previous_end: Option<usize> = None;
    for stmt in imports.iter_mut() {
        let blank = match previous_end {
            Some(end) => (end + 1..stmt.line)
                .filter_map(|number| lines.get(number - first_line))
                .filter(|line| line.trim().is_empty())
                .count(),
            None => 0,
        };
        stmt.blank_lines_before = Some(blank);
        previous_end = Some(stmt.end_line);
    }
}

/// Cuts a trailing `//` comment off `line`, ignoring `//` inside string
/// literals.
fn strip_line_comment(line: &str) -> &str {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut prev_slash = false;
    for (index, c) in line.char_indices() {
        if let Some(open) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == open {
                quote = None;
            }
            continue;
        }
        match c {
            '/' if prev_slash => return &line[..index - 1],
            '"' | '\'' | '`' => quote = Some(c),
            _ => {}
        }
        prev_slash = c == '/';
    }
    line
}

impl SourceExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            start: Regex::new(r#"^import(?:\s|\{|\*|["'])"#).context("Invalid start regex")?,
            type_only: Regex::new(r"^import\s+type\s+(?:\{|\*|[A-Za-z_$][\w$]*\s*(?:,|from\b))")
                .context("Invalid type regex")?,
            from_clause: Regex::new(r#"\bfrom\s*["']([^"']+)["']"#).context("Invalid from regex")?,
            side_effect: Regex::new(r#"^import\s*["']([^"']+)["']"#)
                .context("Invalid side-effect regex")?,
            require: Regex::new(
                r#"^import\s+(?:type\s+)?[A-Za-z_$][\w$]*\s*=\s*require\s*\(\s*["']([^"']+)["']\s*\)"#,
            )
            .context("Invalid require regex")?,
            object_alias: Regex::new(r"^import\s+[A-Za-z_$][\w$]*\s*=\s*([A-Za-z_$][\w$.]*)\s*;?\s*$")
                .context("Invalid object alias regex")?,
            fence: Regex::new(r"^\s*(`{3,}|~{3,})\s*([A-Za-z]*)").context("Invalid fence regex")?,
        })
    }

    /// Recognizes a complete declaration, or `None` if more lines are needed.
    fn parse_statement(&self, statement: &str) -> Option<(String, ImportKind)> {
        let statement = statement.trim();
        if let Some(caps) = self.require.captures(statement) {
            return Some((caps[1].to_string(), ImportKind::Value));
        }
        if let Some(caps) = self.object_alias.captures(statement) {
            return Some((caps[1].to_string(), ImportKind::Object));
        }
        if let Some(caps) = self.from_clause.captures(statement) {
            let kind = if self.type_only.is_match(statement) {
                ImportKind::Type
            } else {
                ImportKind::Value
            };
            return Some((caps[1].to_string(), kind));
        }
        if let Some(caps) = self.side_effect.captures(statement) {
            return Some((caps[1].to_string(), ImportKind::SideEffect));
        }
        None
    }

    /// Extracts the imports of `lines`, numbering them from `first_line`.
    pub fn extract_imports(&self, lines: &[String], first_line: usize) -> Vec<ImportStatement> {
        let mut imports = Vec::new();
        let mut in_block_comment = false;
        let mut i = 0;

        while i < lines.len() {
            let trimmed = lines[i].trim_start();
            if in_block_comment {
                in_block_comment = !trimmed.contains("*/");
                i += 1;
                continue;
            }
            if trimmed.starts_with("/*") && !trimmed.contains("*/") {
                in_block_comment = true;
                i += 1;
                continue;
            }
            if !self.start.is_match(trimmed) {
                i += 1;
                continue;
            }

            let start = i;
            let mut statement = String::new();
            loop {
                statement.push_str(strip_line_comment(lines[i].trim()));
                statement.push(' ');
                if let Some((specifier, kind)) = self.parse_statement(&statement) {
                    imports.push(
                        ImportStatement::new(specifier, kind, first_line + start)
                            .spanning(first_line + i),
                    );
                    break;
                }
                let closed = strip_line_comment(&lines[i]).trim_end().ends_with(';');
                let next_starts_import = lines
                    .get(i + 1)
                    .is_some_and(|next| self.start.is_match(next.trim_start()));
                if closed
                    || next_starts_import
                    || i + 1 >= lines.len()
                    || i - start >= MAX_STATEMENT_LINES
                {
                    warn!(
                        line = first_line + start,
                        "unrecognized import declaration: {}",
                        statement.trim()
                    );
                    break;
                }
                i += 1;
            }
            i += 1;
        }

        count_blank_separators(&mut imports, lines, first_line);
        imports
    }

    /// Splits a Markdown document into one unit per script code fence.
    fn markdown_units(&self, content: &str) -> Vec<SourceUnit> {
        let lines: Vec<&str> = content.lines().collect();
        let mut units = Vec::new();
        let mut i = 0;

        while i < lines.len() {
            let Some(caps) = self.fence.captures(lines[i]) else {
                i += 1;
                continue;
            };
            let marker = caps[1].to_string();
            let language = caps[2].to_ascii_lowercase();
            let body_start = i + 1;
            let mut end = body_start;
            while end < lines.len() && !lines[end].trim_start().starts_with(marker.as_str()) {
                end += 1;
            }

            if FENCE_LANGUAGES.contains(&language.as_str()) {
                let body: Vec<String> = lines[body_start..end].iter().map(|l| l.to_string()).collect();
                let imports = self.extract_imports(&body, body_start + 1);
                debug!(line = body_start + 1, language = %language, count = imports.len(), "markdown code fence");
                units.push(SourceUnit {
                    first_line: body_start + 1,
                    lines: body,
                    imports,
                });
            }
            i = end + 1;
        }

        units
    }
}

impl ImportExtractor for SourceExtractor {
    fn supports(&self, path: &str) -> bool {
        match extension_of(path) {
            Some("md") => true,
            Some(ext) => SCRIPT_EXTENSIONS.contains(&ext),
            None => false,
        }
    }

    fn extract(&self, path: &str, content: &str) -> Result<Vec<SourceUnit>> {
        match extension_of(path) {
            Some("md") => Ok(self.markdown_units(content)),
            Some(ext) if SCRIPT_EXTENSIONS.contains(&ext) => {
                let lines: Vec<String> = content.lines().map(str::to_string).collect();
                let imports = self.extract_imports(&lines, 1);
                Ok(vec![SourceUnit {
                    first_line: 1,
                    lines,
                    imports,
                }])
            }
            _ => anyhow::bail!("Unsupported file type: {path}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(path: &str, content: &str) -> Vec<SourceUnit> {
        SourceExtractor::new().unwrap().extract(path, content).unwrap()
    }

    #[test]
    fn test_recognizes_declaration_forms() {
        let content = r#"import type { AppProps } from "next/app";
import React, { useState } from 'react';
import * as path from "path";
import "style/globals/index.scss";
import fs = require("fs");
import Alias = Foo.Bar;
import { type Props, Button } from "components/buttons";
const lazy = import("./lazy");
// import ignored from "commented";
export { x } from "./x";
"#;
        let units = extract("src/pages/_app.tsx", content);
        assert_eq!(units.len(), 1);
        let found: Vec<(&str, ImportKind, usize)> = units[0]
            .imports
            .iter()
            .map(|i| (i.specifier.as_str(), i.kind, i.line))
            .collect();
        assert_eq!(
            found,
            vec![
                ("next/app", ImportKind::Type, 1),
                ("react", ImportKind::Value, 2),
                ("path", ImportKind::Value, 3),
                ("style/globals/index.scss", ImportKind::SideEffect, 4),
                ("fs", ImportKind::Value, 5),
                ("Foo.Bar", ImportKind::Object, 6),
                ("components/buttons", ImportKind::Value, 7),
            ]
        );
    }

    #[test]
    fn test_multiline_declaration_spans_lines() {
        let content = "import {\n  a,\n  b,\n} from \"lib\";\n\nconst x = 1;\n";
        let units = extract("a.ts", content);
        let stmt = &units[0].imports[0];
        assert_eq!(stmt.specifier, "lib");
        assert_eq!((stmt.line, stmt.end_line), (1, 4));
        assert_eq!(units[0].text_of(stmt), "import {\n  a,\n  b,\n} from \"lib\";");
    }

    #[test]
    fn test_block_comments_are_skipped() {
        let content = "/*\nimport x from \"hidden\";\n*/\nimport y from \"shown\";\n";
        let units = extract("a.js", content);
        assert_eq!(units[0].imports.len(), 1);
        assert_eq!(units[0].imports[0].specifier, "shown");
        assert_eq!(units[0].imports[0].line, 4);
    }

    #[test]
    fn test_type_named_default_import_is_a_value() {
        let units = extract("a.ts", "import type from \"type-lib\";\n");
        assert_eq!(units[0].imports[0].kind, ImportKind::Value);
    }

    #[test]
    fn test_markdown_fences_form_separate_units() {
        let content = "# Usage\n\n```tsx\nimport React from \"react\";\n\nimport { ExampleButton } from \"components/buttons\";\n```\n\n```sh\nimport nothing\n```\n\n~~~js\nimport fs from \"fs\";\n~~~\n";
        let units = extract("README.md", content);
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].first_line, 4);
        assert_eq!(units[0].imports[0].line, 4);
        assert_eq!(units[0].imports[1].line, 6);
        assert_eq!(units[0].line(5), Some(""));
        assert_eq!(units[1].imports[0].specifier, "fs");
        assert_eq!(units[1].imports[0].line, 14);
    }

    #[test]
    fn test_trailing_line_comment_does_not_swallow_next_import() {
        let content = "import Alias = Foo.Bar // legacy alias\nimport React from \"react\";\nimport axios from \"axios\"; // http\n";
        let units = extract("a.ts", content);
        let found: Vec<(&str, ImportKind, usize, usize)> = units[0]
            .imports
            .iter()
            .map(|i| (i.specifier.as_str(), i.kind, i.line, i.end_line))
            .collect();
        assert_eq!(
            found,
            vec![
                ("Foo.Bar", ImportKind::Object, 1, 1),
                ("react", ImportKind::Value, 2, 2),
                ("axios", ImportKind::Value, 3, 3),
            ]
        );
    }

    #[test]
    fn test_unfinished_declaration_stops_at_next_import() {
        let content = "import Broken =\nimport React from \"react\";\n";
        let units = extract("a.ts", content);
        assert_eq!(units[0].imports.len(), 1);
        assert_eq!(units[0].imports[0].specifier, "react");
        assert_eq!(units[0].imports[0].line, 2);
    }

    #[test]
    fn test_strip_line_comment_respects_strings() {
        assert_eq!(strip_line_comment("import a from \"a\"; // note"), "import a from \"a\"; ");
        assert_eq!(
            strip_line_comment("import u from \"http://x/y\";"),
            "import u from \"http://x/y\";"
        );
        assert_eq!(strip_line_comment("import 'a\\'//b';"), "import 'a\\'//b';");
    }

    #[test]
    fn test_blank_separators_ignore_comment_lines() {
        let content = "import fs from \"fs\";\n// packages\nimport axios from \"axios\";\n\n  \n// local\nimport a from \"./a\";\n";
        let units = extract("a.ts", content);
        let blank: Vec<Option<usize>> = units[0].imports.iter().map(|i| i.blank_lines_before).collect();
        assert_eq!(blank, vec![Some(0), Some(0), Some(2)]);
    }

    #[test]
    fn test_supports() {
        let extractor = SourceExtractor::new().unwrap();
        assert!(extractor.supports("src/a.tsx"));
        assert!(extractor.supports("docs/README.md"));
        assert!(!extractor.supports("src/style.scss"));
        assert!(!extractor.supports("Makefile"));
        assert!(extractor.extract("style.scss", "").is_err());
    }
}
