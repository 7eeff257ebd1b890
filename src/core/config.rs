use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::builders::classifier::{CompiledRules, Group};
use crate::builders::patterns::{PatternMatcher, SpecifierPattern};
use crate::builders::validator::{ConfigValidator, StandardValidator};
use crate::core::error::ConfigError;

/// Name of the configuration file looked up at the project root.
pub const CONFIG_FILE_NAME: &str = ".import-order.toml";

pub const CONFIG_VERSION: &str = "1.0";

/// Root modules shared by the whole application.
const GENERAL_ROOT_MODULES: &[&str] = &["application", "lib", "internal"];
/// Component related root modules. They are ranked as their own path group,
/// right after the general root modules.
const COMPONENT_ROOT_MODULES: &[&str] = &["components", "style", "pages"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Position {
    Before,
    After,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortOrder {
    Asc,
    Desc,
    Ignore,
}

/// How blank lines between consecutive imports are enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NewlinesBetween {
    Ignore,
    Always,
    AlwaysAndInsideGroups,
    Never,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlphabetizePolicy {
    pub order: SortOrder,
    pub case_insensitive: bool,
    /// Tie-break for equal specifiers that differ in kind (`type` vs `value`).
    pub order_import_kind: SortOrder,
}

impl Default for AlphabetizePolicy {
    fn default() -> Self {
        Self {
            order: SortOrder::Asc,
            case_insensitive: true,
            order_import_kind: SortOrder::Asc,
        }
    }
}

/// Reassigns specifiers matching `pattern` to `group`, optionally ranked
/// before or after the group's other members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathGroupRule {
    pub pattern: String,
    pub group: Group,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

/// Specifiers matching any glob in `group` are reported with `message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestrictedImportPattern {
    pub group: Vec<String>,
    pub message: String,
}

/// The full rule set applied to one file.
///
/// Scalar fields come first so the struct serializes cleanly to TOML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConfiguration {
    pub groups: Vec<Group>,
    /// Structural groups that path groups never reassign.
    pub path_groups_excluded_import_types: Vec<Group>,
    /// Root modules of the project; bare specifiers under them are `internal`.
    pub internal_modules: Vec<String>,
    /// Treat imports placed by a positioned path group as a separate group
    /// for blank-line purposes.
    pub distinct_group: bool,
    pub newlines_between: NewlinesBetween,
    pub no_duplicates: bool,
    pub no_useless_path_segments: bool,
    pub newline_after_import: bool,
    pub alphabetize: AlphabetizePolicy,
    pub path_groups: Vec<PathGroupRule>,
    pub restricted_imports: Vec<RestrictedImportPattern>,
}

fn path_group_pattern(modules: &[&str]) -> String {
    let alternatives: Vec<String> = modules
        .iter()
        .flat_map(|m| [m.to_string(), format!("{m}/**")])
        .collect();
    format!("{{{}}}", alternatives.join(","))
}

fn internal_modules() -> impl Iterator<Item = &'static str> {
    GENERAL_ROOT_MODULES
        .iter()
        .chain(COMPONENT_ROOT_MODULES.iter())
        .copied()
}

/// Relative imports of root level modules (`../components`, `../x/lib`) from
/// outside of them can lead to circular imports.
pub fn no_relative_import_from_module() -> RestrictedImportPattern {
    RestrictedImportPattern {
        group: internal_modules()
            .flat_map(|m| [format!("../{m}"), format!("../*/{m}")])
            .collect(),
        message: "When outside of the module, absolute imports must be used to import from that module."
            .to_string(),
    }
}

fn restricted(glob: &str, message: &str) -> RestrictedImportPattern {
    RestrictedImportPattern {
        group: vec![glob.to_string()],
        message: message.to_string(),
    }
}

impl Default for RuleConfiguration {
    fn default() -> Self {
        Self {
            groups: Group::ALL.to_vec(),
            path_groups_excluded_import_types: Vec::new(),
            internal_modules: internal_modules().map(str::to_string).collect(),
            distinct_group: false,
            newlines_between: NewlinesBetween::Always,
            no_duplicates: true,
            no_useless_path_segments: true,
            newline_after_import: true,
            alphabetize: AlphabetizePolicy::default(),
            path_groups: vec![
                PathGroupRule {
                    pattern: path_group_pattern(&["react", "next", "react-dom"]),
                    group: Group::Builtin,
                    position: Some(Position::Before),
                },
                PathGroupRule {
                    pattern: "{../*}".to_string(),
                    group: Group::Parent,
                    position: Some(Position::After),
                },
                PathGroupRule {
                    pattern: "{./*}".to_string(),
                    group: Group::Sibling,
                    position: Some(Position::After),
                },
                PathGroupRule {
                    pattern: path_group_pattern(GENERAL_ROOT_MODULES),
                    group: Group::Internal,
                    position: Some(Position::Before),
                },
                PathGroupRule {
                    pattern: path_group_pattern(COMPONENT_ROOT_MODULES),
                    group: Group::Internal,
                    position: Some(Position::Before),
                },
            ],
            restricted_imports: vec![
                restricted("lib/*", "Imports from lib must use namespaces."),
                restricted("internal/*", "Imports from internal must use namespaces."),
                restricted("components/*/*", "Components must be imported from modules."),
                restricted(
                    "application/*/*",
                    "Imports from application must be imported as modules.",
                ),
                no_relative_import_from_module(),
            ],
        }
    }
}

/// Partial rule set; every `Some` field replaces the layer below it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<Group>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_groups_excluded_import_types: Option<Vec<Group>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub internal_modules: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distinct_group: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newlines_between: Option<NewlinesBetween>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_duplicates: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_useless_path_segments: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newline_after_import: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alphabetize: Option<AlphabetizePolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_groups: Option<Vec<PathGroupRule>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restricted_imports: Option<Vec<RestrictedImportPattern>>,
}

impl RuleConfiguration {
    /// Returns a copy of `self` with every field set in `overrides` replaced.
    pub fn merged_with(&self, overrides: &RuleOverrides) -> Self {
        let mut merged = self.clone();
        if let Some(groups) = &overrides.groups {
            merged.groups = groups.clone();
        }
        if let Some(excluded) = &overrides.path_groups_excluded_import_types {
            merged.path_groups_excluded_import_types = excluded.clone();
        }
        if let Some(modules) = &overrides.internal_modules {
            merged.internal_modules = modules.clone();
        }
        if let Some(distinct) = overrides.distinct_group {
            merged.distinct_group = distinct;
        }
        if let Some(newlines) = overrides.newlines_between {
            merged.newlines_between = newlines;
        }
        if let Some(enabled) = overrides.no_duplicates {
            merged.no_duplicates = enabled;
        }
        if let Some(enabled) = overrides.no_useless_path_segments {
            merged.no_useless_path_segments = enabled;
        }
        if let Some(enabled) = overrides.newline_after_import {
            merged.newline_after_import = enabled;
        }
        if let Some(alphabetize) = &overrides.alphabetize {
            merged.alphabetize = alphabetize.clone();
        }
        if let Some(path_groups) = &overrides.path_groups {
            merged.path_groups = path_groups.clone();
        }
        if let Some(restricted) = &overrides.restricted_imports {
            merged.restricted_imports = restricted.clone();
        }
        merged
    }
}

/// The kind of file an override layer targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FileRole {
    Typescript,
    Test,
    Markdown,
}

impl fmt::Display for FileRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileRole::Typescript => write!(f, "typescript"),
            FileRole::Test => write!(f, "test"),
            FileRole::Markdown => write!(f, "markdown"),
        }
    }
}

/// Rules applied on top of the base set for files matching `files`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverrideLayer {
    pub role: FileRole,
    pub files: Vec<String>,
    #[serde(default)]
    pub rules: RuleOverrides,
}

/// The on-disk configuration: a base rule set plus ordered override layers.
/// Later layers win when several match the same file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportLintConfig {
    pub version: String,
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
    #[serde(default)]
    pub base: RuleConfiguration,
    #[serde(default)]
    pub overrides: Vec<OverrideLayer>,
}

impl Default for ImportLintConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION.to_string(),
            ignore_patterns: vec![
                "next-env.d.ts".to_string(),
                "package.json".to_string(),
                "package-lock.json".to_string(),
            ],
            base: RuleConfiguration::default(),
            overrides: vec![
                OverrideLayer {
                    role: FileRole::Typescript,
                    files: vec!["**/*.ts".to_string(), "**/*.tsx".to_string()],
                    rules: RuleOverrides::default(),
                },
                // Tests often reach into a namespace to exercise code it does
                // not export, so only the relative-import restriction applies.
                OverrideLayer {
                    role: FileRole::Test,
                    files: vec!["**/*.test.ts".to_string(), "**/*.test.tsx".to_string()],
                    rules: RuleOverrides {
                        restricted_imports: Some(vec![no_relative_import_from_module()]),
                        ..RuleOverrides::default()
                    },
                },
                OverrideLayer {
                    role: FileRole::Markdown,
                    files: vec!["**/*.md".to_string()],
                    rules: RuleOverrides::default(),
                },
            ],
        }
    }
}

#[derive(Debug, Clone)]
struct CompiledLayer {
    role: FileRole,
    files: Vec<SpecifierPattern>,
    rules: RuleOverrides,
}

/// A validated `ImportLintConfig` that resolves the rule set for a file path.
///
/// `compile` checks the base set and every override layer (each merged onto
/// the base), so configuration mistakes surface at load time.
#[derive(Debug, Clone)]
pub struct RuleBook {
    ignore: Vec<SpecifierPattern>,
    base: RuleConfiguration,
    layers: Vec<CompiledLayer>,
}

impl RuleBook {
    pub fn compile(config: &ImportLintConfig) -> Result<Self, ConfigError> {
        if config.version != CONFIG_VERSION {
            return Err(ConfigError::UnsupportedVersion(config.version.clone()));
        }

        let ignore = config
            .ignore_patterns
            .iter()
            .enumerate()
            .map(|(i, glob)| compile_glob(glob, format!("ignore_patterns[{i}]")))
            .collect::<Result<Vec<_>, _>>()?;

        CompiledRules::compile(&config.base, "base")?;

        let mut layers = Vec::with_capacity(config.overrides.len());
        for (i, layer) in config.overrides.iter().enumerate() {
            let files = layer
                .files
                .iter()
                .enumerate()
                .map(|(j, glob)| compile_glob(glob, format!("overrides[{i}].files[{j}]")))
                .collect::<Result<Vec<_>, _>>()?;
            CompiledRules::compile(
                &config.base.merged_with(&layer.rules),
                &format!("overrides[{i}]"),
            )?;
            layers.push(CompiledLayer {
                role: layer.role,
                files,
                rules: layer.rules.clone(),
            });
        }

        Ok(Self {
            ignore,
            base: config.base.clone(),
            layers,
        })
    }

    /// Ignore globs without a `/` match the file name at any depth; others
    /// match the path or any directory above it.
    pub fn is_ignored(&self, path: &str) -> bool {
        let file_name = path.rsplit('/').next().unwrap_or(path);
        self.ignore.iter().any(|pattern| {
            if pattern.source().contains('/') {
                pattern.matches_within(path)
            } else {
                pattern.matches(file_name)
            }
        })
    }

    /// Indices of the override layers that apply to `path`, in order.
    pub fn layers_for(&self, path: &str) -> Vec<usize> {
        self.layers
            .iter()
            .enumerate()
            .filter(|(_, layer)| layer.files.iter().any(|glob| glob.matches(path)))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn roles_for(&self, path: &str) -> Vec<FileRole> {
        self.layers_for(path)
            .into_iter()
            .map(|i| self.layers[i].role)
            .collect()
    }

    /// Merges the base set with the given layers, in order.
    pub fn resolve(&self, layers: &[usize]) -> RuleConfiguration {
        layers
            .iter()
            .filter_map(|&i| self.layers.get(i))
            .fold(self.base.clone(), |merged, layer| merged.merged_with(&layer.rules))
    }

    /// Compiles the merged rule set for a combination of layers. Layers were
    /// validated one at a time; a combination can still conflict, which is
    /// reported with every layer named.
    pub fn compile_layers(&self, layers: &[usize]) -> Result<CompiledRules, ConfigError> {
        let location = std::iter::once("base".to_string())
            .chain(layers.iter().map(|i| format!("overrides[{i}]")))
            .collect::<Vec<_>>()
            .join("+");
        CompiledRules::compile(&self.resolve(layers), &location)
    }

    pub fn rules_for(&self, path: &str) -> Result<CompiledRules, ConfigError> {
        self.compile_layers(&self.layers_for(path))
    }
}

fn compile_glob(glob: &str, location: String) -> Result<SpecifierPattern, ConfigError> {
    SpecifierPattern::compile(glob).map_err(|e| ConfigError::MalformedPattern {
        location,
        pattern: glob.to_string(),
        reason: e.to_string(),
    })
}

/// Serialization formats understood for loading and exporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
    Yaml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(ConfigFormat::Toml),
            Some("json") => Ok(ConfigFormat::Json),
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }

    pub fn parse(name: &str) -> Self {
        match name {
            "json" => ConfigFormat::Json,
            "yaml" | "yml" => ConfigFormat::Yaml,
            _ => ConfigFormat::Toml,
        }
    }

    pub fn serialize(&self, config: &ImportLintConfig) -> Result<String> {
        match self {
            ConfigFormat::Json => {
                serde_json::to_string_pretty(config).context("Failed to serialize to JSON")
            }
            ConfigFormat::Yaml => serde_yaml::to_string(config).context("Failed to serialize to YAML"),
            ConfigFormat::Toml => {
                toml::to_string_pretty(config).context("Failed to serialize to TOML")
            }
        }
    }

    pub fn deserialize(&self, content: &str) -> Result<ImportLintConfig> {
        match self {
            ConfigFormat::Json => serde_json::from_str(content).context("Failed to parse JSON config"),
            ConfigFormat::Yaml => serde_yaml::from_str(content).context("Failed to parse YAML config"),
            ConfigFormat::Toml => toml::from_str(content).context("Failed to parse TOML config"),
        }
    }
}

pub struct ConfigManager {
    config_path: PathBuf,
    project_root: PathBuf,
}

impl ConfigManager {
    /// Locates the project root from the current directory.
    pub fn new() -> Result<Self> {
        let current_dir = std::env::current_dir().context("Failed to read current directory")?;
        Self::new_at(find_project_root(&current_dir))
    }

    pub fn new_at(project_root: PathBuf) -> Result<Self> {
        let config_path = project_root.join(CONFIG_FILE_NAME);
        Ok(Self {
            config_path,
            project_root,
        })
    }

    /// Uses an explicit configuration file instead of the project default.
    pub fn with_config_path(mut self, config_path: PathBuf) -> Self {
        self.config_path = config_path;
        self
    }

    /// Writes the default configuration unless a file already exists.
    pub fn initialize(&self) -> Result<bool> {
        if self.config_path.exists() {
            return Ok(false);
        }

        let default_config = ImportLintConfig::default();
        self.save_config(&default_config)?;
        info!(path = %self.config_path.display(), "wrote default configuration");
        Ok(true)
    }

    /// Loads and compiles the configuration. Fails on the first invalid rule.
    pub fn load_rule_book(&self) -> Result<RuleBook> {
        let config = self.load_config()?;
        let book = RuleBook::compile(&config)
            .with_context(|| format!("Invalid configuration in {}", self.config_path.display()))?;
        Ok(book)
    }

    pub fn validate_config(&self) -> Result<()> {
        let config = self.load_config()?;
        let validator = StandardValidator::new();
        let issues = validator.validate_config(&config)?;

        if issues.is_empty() {
            println!("✓ Configuration is valid.");
            Ok(())
        } else {
            println!("⚠️  Found issues in configuration:");
            for issue in issues {
                println!("  - {issue}");
            }
            anyhow::bail!("Configuration validation failed.");
        }
    }

    pub fn export_config(&self, file_path: &str, format: ConfigFormat) -> Result<()> {
        let config = self.load_config()?;
        let content = format.serialize(&config)?;
        fs::write(file_path, content).context("Failed to write export file")?;
        Ok(())
    }

    pub fn get_project_root(&self) -> &Path {
        &self.project_root
    }
}

pub trait ConfigProvider {
    fn load_config(&self) -> Result<ImportLintConfig>;
    fn save_config(&self, config: &ImportLintConfig) -> Result<()>;
    fn get_config_path(&self) -> Result<PathBuf>;
}

impl ConfigProvider for ConfigManager {
    fn load_config(&self) -> Result<ImportLintConfig> {
        if !self.config_path.exists() {
            debug!(path = %self.config_path.display(), "no configuration file, using defaults");
            return Ok(ImportLintConfig::default());
        }

        let format = ConfigFormat::from_path(&self.config_path)?;
        let content =
            fs::read_to_string(&self.config_path).context("Failed to read config file")?;
        format.deserialize(&content)
    }

    fn save_config(&self, config: &ImportLintConfig) -> Result<()> {
        let format = ConfigFormat::from_path(&self.config_path)?;
        let content = format.serialize(config)?;
        fs::write(&self.config_path, content).context("Failed to write config file")?;
        Ok(())
    }

    fn get_config_path(&self) -> Result<PathBuf> {
        Ok(self.config_path.clone())
    }
}

/// Nearest ancestor holding a configuration file or a `.git` directory,
/// falling back to `start` itself.
fn find_project_root(start: &Path) -> PathBuf {
    let mut dir = start;
    loop {
        if dir.join(CONFIG_FILE_NAME).exists() || dir.join(".git").exists() {
            return dir.to_path_buf();
        }
        match dir.parent() {
            Some(parent) => dir = parent,
            None => {
                debug!("no project root found, using {}", start.display());
                return start.to_path_buf();
            }
        }
    }
}
