use git2::Repository;
use import_order_lint::builders::classifier::RuleId;
use import_order_lint::builders::hooks::{HookInstall, install_pre_commit_hook};
use import_order_lint::core::config::{ConfigManager, ConfigProvider};
use import_order_lint::core::engine::LintEngine;
use import_order_lint::core::git::{Git2Client, GitClient};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn setup_test_repo() -> (TempDir, Repository) {
    let dir = tempfile::tempdir().unwrap();
    let repo = Repository::init(dir.path()).unwrap();
    (dir, repo)
}

fn write_and_stage(repo: &Repository, root: &Path, path: &str, content: &str) {
    let file = root.join(path);
    fs::create_dir_all(file.parent().unwrap()).unwrap();
    fs::write(&file, content).unwrap();
    let mut index = repo.index().unwrap();
    index.add_path(Path::new(path)).unwrap();
    index.write().unwrap();
}

#[test]
fn test_staged_content_is_linted_not_working_copy() {
    let (td, repo) = setup_test_repo();
    let repo_root = td.path().to_path_buf();

    // 1. Setup Config
    let config_manager = ConfigManager::new_at(repo_root.clone()).unwrap();
    assert!(config_manager.initialize().unwrap());

    // 2. Stage a file with a restricted import, then fix it only in the working tree
    write_and_stage(
        &repo,
        &repo_root,
        "src/pages/index.tsx",
        "import React from \"react\";\n\nimport { util } from \"lib/util\";\n",
    );
    fs::write(
        repo_root.join("src/pages/index.tsx"),
        "import React from \"react\";\n\nimport { lib } from \"lib\";\n",
    )
    .unwrap();

    // 3. The staged blob still carries the violation
    let git = Git2Client::new(&repo_root).unwrap();
    let mut engine = LintEngine::new(&config_manager).unwrap();
    let staged = engine.lint_staged(&git).unwrap();
    assert_eq!(staged.len(), 1);
    assert_eq!(staged[0].path, "src/pages/index.tsx");
    assert_eq!(staged[0].violations.len(), 1);
    assert_eq!(staged[0].violations[0].rule, RuleId::NoRestrictedImports);

    // 4. The tracked file's working copy is clean
    let tracked = engine.lint_tracked(&git).unwrap();
    assert_eq!(tracked.len(), 1);
    assert!(tracked[0].is_clean(), "{:?}", tracked[0].violations);
}

#[test]
fn test_override_layers_apply_by_file_role() {
    let (td, repo) = setup_test_repo();
    let repo_root = td.path().to_path_buf();
    let config_manager = ConfigManager::new_at(repo_root.clone()).unwrap();

    let content = "import { Button } from \"components/buttons/Button\";\n";
    write_and_stage(&repo, &repo_root, "src/Page.tsx", content);
    write_and_stage(&repo, &repo_root, "src/Page.test.tsx", content);
    write_and_stage(&repo, &repo_root, "package.json", "{}\n");
    write_and_stage(&repo, &repo_root, "styles/site.scss", "body {}\n");

    let git = Git2Client::new(&repo_root).unwrap();
    let mut engine = LintEngine::new(&config_manager).unwrap();
    let reports = engine.lint_staged(&git).unwrap();

    let mut summary: Vec<(&str, usize)> = reports
        .iter()
        .map(|r| (r.path.as_str(), r.violations.len()))
        .collect();
    summary.sort();
    assert_eq!(summary, vec![("src/Page.test.tsx", 0), ("src/Page.tsx", 1)]);
}

#[test]
fn test_configuration_file_drives_the_engine() {
    let (td, repo) = setup_test_repo();
    let repo_root = td.path().to_path_buf();
    let config_manager = ConfigManager::new_at(repo_root.clone()).unwrap();
    config_manager.initialize().unwrap();

    // Disable every restriction in the saved configuration
    let mut config = config_manager.load_config().unwrap();
    config.base.restricted_imports.clear();
    config.overrides.retain(|layer| layer.rules.restricted_imports.is_none());
    config_manager.save_config(&config).unwrap();

    write_and_stage(
        &repo,
        &repo_root,
        "src/index.ts",
        "import { util } from \"lib/util\";\n",
    );
    let git = Git2Client::new(&repo_root).unwrap();
    let mut engine = LintEngine::new(&config_manager).unwrap();
    let reports = engine.lint_staged(&git).unwrap();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].is_clean());
}

#[test]
fn test_invalid_configuration_is_rejected_at_load() {
    let (td, _repo) = setup_test_repo();
    let repo_root = td.path().to_path_buf();
    let config_manager = ConfigManager::new_at(repo_root.clone()).unwrap();
    config_manager.initialize().unwrap();

    let mut config = config_manager.load_config().unwrap();
    config.base.restricted_imports[0].group = vec!["lib//x".to_string()];
    config_manager.save_config(&config).unwrap();

    let err = LintEngine::new(&config_manager).err().unwrap();
    assert!(
        format!("{err:#}").contains("base.restricted_imports[0].group[0]"),
        "{err:#}"
    );
    assert!(config_manager.validate_config().is_err());
}

#[test]
fn test_install_hook_into_repository() {
    let (td, _repo) = setup_test_repo();
    let git = Git2Client::new(td.path()).unwrap();

    assert_eq!(
        install_pre_commit_hook(&git.get_git_dir()).unwrap(),
        HookInstall::Installed
    );
    assert!(td.path().join(".git/hooks/pre-commit").exists());
}
