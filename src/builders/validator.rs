use anyhow::Result;
use std::collections::HashSet;

use crate::builders::classifier::Group;
use crate::builders::patterns::SpecifierPattern;
use crate::core::config::{ImportLintConfig, RuleBook, RuleConfiguration};

/// The `ConfigValidator` trait defines the public interface for validating the
/// import ordering configuration.
///
/// This trait allows for the implementation of different validation strategies,
/// such as a strict validator or a more permissive one, by adhering to a common
/// set of methods.
pub trait ConfigValidator {
    /// Performs a full validation of the `ImportLintConfig` and returns
    /// a list of issues found.
    ///
    /// # Arguments
    /// * `config`: The `ImportLintConfig` to be validated.
    ///
    /// # Returns
    /// A `Result<Vec<String>>` containing a vector of strings, where each string
    /// describes a specific validation issue.
    fn validate_config(&self, config: &ImportLintConfig) -> Result<Vec<String>>;

    /// Checks a single (possibly merged) rule set for rules that compile but
    /// can never take effect.
    ///
    /// # Arguments
    /// * `rules`: The rule set to inspect.
    /// * `location`: Prefix used to name rules in the returned issues.
    fn validate_rule_set(&self, rules: &RuleConfiguration, location: &str) -> Vec<String>;
}

/// The `StandardValidator` is a concrete implementation of `ConfigValidator`.
///
/// Hard errors (malformed patterns, groups missing from the sequence, and so
/// on) come from compiling the configuration; on top of that it reports
/// rules that are legal but dead or suspicious.
pub struct StandardValidator;

impl StandardValidator {
    /// Creates a new instance of `StandardValidator`.
    pub fn new() -> Self {
        Self
    }

    /// Path groups declared after a rule matching every specifier are never
    /// consulted, since the first match wins.
    fn check_shadowed_path_groups(&self, rules: &RuleConfiguration, location: &str) -> Vec<String> {
        let mut warnings = Vec::new();
        let mut catch_all: Option<usize> = None;

        for (i, rule) in rules.path_groups.iter().enumerate() {
            if let Some(first) = catch_all {
                warnings.push(format!(
                    "{location}.path_groups[{i}] ('{}') is unreachable: {location}.path_groups[{first}] matches every specifier",
                    rule.pattern
                ));
                continue;
            }
            if let Ok(pattern) = SpecifierPattern::compile(&rule.pattern)
                && pattern.matches_everything()
            {
                catch_all = Some(i);
            }
        }
        warnings
    }

    /// The same glob listed in two restricted patterns reports every match twice.
    fn check_duplicate_restrictions(&self, rules: &RuleConfiguration, location: &str) -> Vec<String> {
        let mut warnings = Vec::new();
        let mut seen = HashSet::new();

        for (i, restricted) in rules.restricted_imports.iter().enumerate() {
            if restricted.message.trim().is_empty() {
                warnings.push(format!(
                    "{location}.restricted_imports[{i}] has an empty message"
                ));
            }
            for glob in &restricted.group {
                if !seen.insert(glob.as_str()) {
                    warnings.push(format!(
                        "{location}.restricted_imports[{i}]: glob '{glob}' is already restricted"
                    ));
                }
            }
        }
        warnings
    }
}

impl Default for StandardValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigValidator for StandardValidator {
    /// The main public method for validating the entire configuration.
    ///
    /// It orchestrates multiple checks, including:
    /// - Compiling the base set and every override layer.
    /// - Override layers that can never apply.
    /// - Dead or duplicated rules within each resulting rule set.
    fn validate_config(&self, config: &ImportLintConfig) -> Result<Vec<String>> {
        let mut issues = Vec::new();

        // A compile failure makes every other check meaningless.
        if let Err(e) = RuleBook::compile(config) {
            issues.push(e.to_string());
            return Ok(issues);
        }

        issues.extend(self.validate_rule_set(&config.base, "base"));

        for (i, layer) in config.overrides.iter().enumerate() {
            if layer.files.is_empty() {
                issues.push(format!(
                    "overrides[{i}] ({}) has no file globs and never applies",
                    layer.role
                ));
            }
            let merged = config.base.merged_with(&layer.rules);
            let location = format!("overrides[{i}]");
            for issue in self.validate_rule_set(&merged, &location) {
                // Inherited base issues are already reported once.
                if !issues.contains(&issue.replace(&location, "base")) {
                    issues.push(issue);
                }
            }
        }

        Ok(issues)
    }

    fn validate_rule_set(&self, rules: &RuleConfiguration, location: &str) -> Vec<String> {
        let mut issues = Vec::new();

        if rules.groups.is_empty() {
            issues.push(format!(
                "{location}.groups is empty; every import shares one group"
            ));
        }
        for group in Group::ALL {
            if !rules.groups.contains(&group) && !rules.groups.is_empty() {
                issues.push(format!(
                    "{location}.groups does not list '{group}'; those imports sort after every listed group"
                ));
            }
        }

        issues.extend(self.check_shadowed_path_groups(rules, location));
        issues.extend(self.check_duplicate_restrictions(rules, location));
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::PathGroupRule;

    #[test]
    fn test_default_configuration_is_clean() {
        let issues = StandardValidator::new()
            .validate_config(&ImportLintConfig::default())
            .unwrap();
        assert!(issues.is_empty(), "{issues:?}");
    }

    #[test]
    fn test_compile_errors_are_reported_as_issues() {
        let mut config = ImportLintConfig::default();
        config.base.restricted_imports[0].group = vec!["{lib".to_string()];
        let issues = StandardValidator::new().validate_config(&config).unwrap();
        assert_eq!(issues.len(), 1);
        assert!(issues[0].starts_with("base.restricted_imports[0].group[0]"));
    }

    #[test]
    fn test_shadowed_path_group_is_reported() {
        let mut config = ImportLintConfig::default();
        config.base.path_groups.insert(
            0,
            PathGroupRule {
                pattern: "**".to_string(),
                group: Group::External,
                position: None,
            },
        );
        let issues = StandardValidator::new().validate_config(&config).unwrap();
        assert_eq!(
            issues.iter().filter(|i| i.contains("is unreachable")).count(),
            5,
            "{issues:?}"
        );
    }

    #[test]
    fn test_layer_without_files_and_duplicate_globs() {
        let mut config = ImportLintConfig::default();
        config.overrides[2].files.clear();
        config.base.restricted_imports[1].group.push("lib/*".to_string());
        let issues = StandardValidator::new().validate_config(&config).unwrap();
        assert!(issues.iter().any(|i| i.contains("never applies")));
        assert_eq!(
            issues.iter().filter(|i| i.contains("already restricted")).count(),
            1,
            "{issues:?}"
        );
    }
}
