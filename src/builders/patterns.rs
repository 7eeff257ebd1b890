use std::fmt;
use thiserror::Error;

/// Syntax problems found while compiling a specifier pattern.
///
/// These are reported without a location; the configuration layer wraps them
/// into a `ConfigError::MalformedPattern` that names the offending rule.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternSyntaxError {
    #[error("pattern is empty")]
    EmptyPattern,
    #[error("unbalanced '{{' or '}}'")]
    UnbalancedBraces,
    #[error("empty path segment")]
    EmptySegment,
    #[error("'**' must be a whole path segment, found '{0}'")]
    MixedDoubleStar(String),
}

/// A single character-level token inside a wildcard segment.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(char),
    /// `*`: any run of characters inside the segment.
    Star,
    /// `?`: exactly one character.
    Question,
}

/// One `/`-separated piece of a compiled pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    /// `**`: zero or more whole segments.
    AnyDepth,
    /// A segment containing `*` or `?`. A lone `*` is exactly one segment.
    Wildcard(Vec<Token>),
    Literal(String),
}

impl Segment {
    fn parse(raw: &str) -> Result<Self, PatternSyntaxError> {
        if raw.is_empty() {
            return Err(PatternSyntaxError::EmptySegment);
        }
        if raw == "**" {
            return Ok(Segment::AnyDepth);
        }
        if raw.contains("**") {
            return Err(PatternSyntaxError::MixedDoubleStar(raw.to_string()));
        }
        if raw.contains(['*', '?']) {
            let tokens = raw
                .chars()
                .map(|c| match c {
                    '*' => Token::Star,
                    '?' => Token::Question,
                    other => Token::Literal(other),
                })
                .collect();
            return Ok(Segment::Wildcard(tokens));
        }
        Ok(Segment::Literal(raw.to_string()))
    }

    fn matches(&self, segment: &str) -> bool {
        match self {
            Segment::AnyDepth => true,
            Segment::Literal(literal) => literal == segment,
            Segment::Wildcard(tokens) => {
                let chars: Vec<char> = segment.chars().collect();
                !chars.is_empty() && match_tokens(tokens, &chars)
            }
        }
    }
}

/// Backtracking glob match of a token list against one segment.
fn match_tokens(tokens: &[Token], text: &[char]) -> bool {
    match tokens.split_first() {
        None => text.is_empty(),
        Some((Token::Star, rest)) => (0..=text.len()).any(|skip| match_tokens(rest, &text[skip..])),
        Some((Token::Question, rest)) => !text.is_empty() && match_tokens(rest, &text[1..]),
        Some((Token::Literal(c), rest)) => text.first() == Some(c) && match_tokens(rest, &text[1..]),
    }
}

fn match_segments(pattern: &[Segment], path: &[&str]) -> bool {
    match pattern.split_first() {
        None => path.is_empty(),
        Some((Segment::AnyDepth, rest)) => {
            (0..=path.len()).any(|skip| match_segments(rest, &path[skip..]))
        }
        Some((segment, rest)) => match path.split_first() {
            Some((head, tail)) => segment.matches(head) && match_segments(rest, tail),
            None => false,
        },
    }
}

/// Expands `{a,b}` alternation (nesting allowed) into plain alternatives.
fn expand_braces(pattern: &str) -> Result<Vec<String>, PatternSyntaxError> {
    let Some(open) = pattern.find('{') else {
        if pattern.contains('}') {
            return Err(PatternSyntaxError::UnbalancedBraces);
        }
        return Ok(vec![pattern.to_string()]);
    };
    if pattern[..open].contains('}') {
        return Err(PatternSyntaxError::UnbalancedBraces);
    }

    let mut depth = 0usize;
    let mut bounds = vec![open];
    let mut close = None;
    for (offset, c) in pattern[open..].char_indices() {
        let index = open + offset;
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(index);
                    break;
                }
            }
            ',' if depth == 1 => bounds.push(index),
            _ => {}
        }
    }
    let close = close.ok_or(PatternSyntaxError::UnbalancedBraces)?;
    bounds.push(close);

    let prefix = &pattern[..open];
    let suffix = &pattern[close + 1..];
    let mut expanded = Vec::new();
    for window in bounds.windows(2) {
        let option = &pattern[window[0] + 1..window[1]];
        expanded.extend(expand_braces(&format!("{prefix}{option}{suffix}"))?);
    }
    Ok(expanded)
}

/// The `PatternMatcher` trait defines how a compiled pattern is tested against
/// a `/`-separated path (a module specifier or a file path).
pub trait PatternMatcher {
    /// Whole-path match: every segment of `path` must be consumed.
    fn matches(&self, path: &str) -> bool;

    /// Directory-style match: true when the pattern matches `path` or any of
    /// its leading sub-paths. `lib/*` therefore matches `lib/a` and `lib/a/b`
    /// but never `lib`.
    fn matches_within(&self, path: &str) -> bool;
}

/// A glob-like specifier pattern compiled into explicit segment matchers.
///
/// Supported syntax:
/// * `{a,b}` alternation, expanded at compile time.
/// * `**` as a whole segment: zero or more segments (`lib/**` matches `lib`).
/// * `*` as a whole segment: exactly one segment.
/// * `*` and `?` inside a segment: wildcard characters (`*.test.ts`).
#[derive(Debug, Clone)]
pub struct SpecifierPattern {
    source: String,
    alternatives: Vec<Vec<Segment>>,
}

impl SpecifierPattern {
    /// Compiles `pattern`, rejecting empty patterns, unbalanced braces, empty
    /// segments and `**` glued to other characters.
    pub fn compile(pattern: &str) -> Result<Self, PatternSyntaxError> {
        if pattern.trim().is_empty() {
            return Err(PatternSyntaxError::EmptyPattern);
        }

        let mut alternatives = Vec::new();
        for alternative in expand_braces(pattern)? {
            if alternative.is_empty() {
                return Err(PatternSyntaxError::EmptyPattern);
            }
            let segments = alternative
                .split('/')
                .map(Segment::parse)
                .collect::<Result<Vec<_>, _>>()?;
            alternatives.push(segments);
        }

        Ok(Self {
            source: pattern.to_string(),
            alternatives,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// True when the pattern is nothing but `**`, i.e. it matches every path.
    pub fn matches_everything(&self) -> bool {
        self.alternatives
            .iter()
            .any(|segments| segments.iter().all(|s| *s == Segment::AnyDepth))
    }
}

impl PatternMatcher for SpecifierPattern {
    fn matches(&self, path: &str) -> bool {
        let segments: Vec<&str> = path.split('/').collect();
        self.alternatives
            .iter()
            .any(|pattern| match_segments(pattern, &segments))
    }

    fn matches_within(&self, path: &str) -> bool {
        let segments: Vec<&str> = path.split('/').collect();
        (1..=segments.len()).any(|len| {
            self.alternatives
                .iter()
                .any(|pattern| match_segments(pattern, &segments[..len]))
        })
    }
}

impl fmt::Display for SpecifierPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_star_is_one_segment() {
        let pattern = SpecifierPattern::compile("lib/*").unwrap();
        assert!(pattern.matches("lib/foo"));
        assert!(!pattern.matches("lib"));
        assert!(!pattern.matches("lib/foo/bar"));
        assert!(!pattern.matches("library/foo"));
    }

    #[test]
    fn test_double_star_includes_module_root() {
        let pattern = SpecifierPattern::compile("lib/**").unwrap();
        assert!(pattern.matches("lib"));
        assert!(pattern.matches("lib/foo"));
        assert!(pattern.matches("lib/foo/bar/baz"));
        assert!(!pattern.matches("libs/foo"));
    }

    #[test]
    fn test_brace_alternation() {
        let pattern = SpecifierPattern::compile("{react,react/**,next,next/**}").unwrap();
        assert!(pattern.matches("react"));
        assert!(pattern.matches("next/app"));
        assert!(!pattern.matches("react-dom"));

        let nested = SpecifierPattern::compile("{a,b/{c,d}}/x").unwrap();
        assert!(nested.matches("a/x"));
        assert!(nested.matches("b/d/x"));
        assert!(!nested.matches("b/x"));
    }

    #[test]
    fn test_wildcards_inside_segment() {
        let pattern = SpecifierPattern::compile("**/*.test.tsx").unwrap();
        assert!(pattern.matches("src/tests/Button.test.tsx"));
        assert!(pattern.matches("Button.test.tsx"));
        assert!(!pattern.matches("src/Button.tsx"));

        let question = SpecifierPattern::compile("v?").unwrap();
        assert!(question.matches("v1"));
        assert!(!question.matches("v10"));
    }

    #[test]
    fn test_relative_patterns() {
        let parent = SpecifierPattern::compile("{../*}").unwrap();
        assert!(parent.matches("../components"));
        assert!(!parent.matches("../../components"));

        let nested = SpecifierPattern::compile("../*/lib").unwrap();
        assert!(nested.matches("../../lib"));
        assert!(nested.matches("../pages/lib"));
    }

    #[test]
    fn test_matches_within_uses_directory_semantics() {
        let pattern = SpecifierPattern::compile("lib/*").unwrap();
        assert!(pattern.matches_within("lib/foo"));
        assert!(pattern.matches_within("lib/foo/bar"));
        assert!(!pattern.matches_within("lib"));

        let deep = SpecifierPattern::compile("components/*/*").unwrap();
        assert!(!deep.matches_within("components/buttons"));
        assert!(deep.matches_within("components/buttons/ExampleButton"));
    }

    #[test]
    fn test_malformed_patterns_are_rejected() {
        assert_eq!(
            SpecifierPattern::compile("").unwrap_err(),
            PatternSyntaxError::EmptyPattern
        );
        assert_eq!(
            SpecifierPattern::compile("{lib,internal").unwrap_err(),
            PatternSyntaxError::UnbalancedBraces
        );
        assert_eq!(
            SpecifierPattern::compile("lib}").unwrap_err(),
            PatternSyntaxError::UnbalancedBraces
        );
        assert_eq!(
            SpecifierPattern::compile("lib//foo").unwrap_err(),
            PatternSyntaxError::EmptySegment
        );
        assert_eq!(
            SpecifierPattern::compile("lib/**.ts").unwrap_err(),
            PatternSyntaxError::MixedDoubleStar("**.ts".to_string())
        );
    }

    #[test]
    fn test_matches_everything() {
        assert!(SpecifierPattern::compile("**").unwrap().matches_everything());
        assert!(!SpecifierPattern::compile("lib/**").unwrap().matches_everything());
    }
}
