use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Marker line identifying a hook written by this tool.
const HOOK_MARKER: &str = "# import-order-lint - pre-commit hook";

const PRE_COMMIT_HOOK: &str = r#"#!/bin/sh
# import-order-lint - pre-commit hook

# Check if import-order-lint is available
if ! command -v import-order-lint > /dev/null 2>&1; then
    echo "Warning: import-order-lint not found in PATH"
    exit 0
fi

# Lint the staged content of every staged file
import-order-lint check --staged
if [ $? -ne 0 ]; then
    echo "Commit aborted: fix the import violations above or run 'import-order-lint fix'"
    exit 1
fi
"#;

/// What `install_pre_commit_hook` found in the hooks directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookInstall {
    Installed,
    AlreadyInstalled,
    /// A foreign hook was moved to `pre-commit.backup`.
    ReplacedExisting,
}

/// Installs the `pre-commit` hook into `git_dir/hooks`.
pub fn install_pre_commit_hook(git_dir: &Path) -> Result<HookInstall> {
    let hooks_dir = git_dir.join("hooks");
    fs::create_dir_all(&hooks_dir).context("Failed to create hooks directory")?;
    let hook_path = hooks_dir.join("pre-commit");

    let mut status = HookInstall::Installed;
    if hook_path.exists() {
        // Check if it's already our hook
        let existing_content = fs::read_to_string(&hook_path)?;
        if existing_content.contains(HOOK_MARKER) {
            return Ok(HookInstall::AlreadyInstalled);
        }

        // Backup existing hook
        fs::rename(&hook_path, hooks_dir.join("pre-commit.backup"))
            .context("Failed to back up existing pre-commit hook")?;
        status = HookInstall::ReplacedExisting;
    }

    fs::write(&hook_path, PRE_COMMIT_HOOK).context("Failed to write pre-commit hook")?;

    // Make executable on Unix systems
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(&hook_path)?.permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&hook_path, perms)?;
    }

    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_install_backs_up_foreign_hook_once() {
        let dir = tempdir().unwrap();
        let hooks = dir.path().join("hooks");
        fs::create_dir_all(&hooks).unwrap();
        fs::write(hooks.join("pre-commit"), "#!/bin/sh\nmake lint\n").unwrap();

        assert_eq!(
            install_pre_commit_hook(dir.path()).unwrap(),
            HookInstall::ReplacedExisting
        );
        assert_eq!(
            fs::read_to_string(hooks.join("pre-commit.backup")).unwrap(),
            "#!/bin/sh\nmake lint\n"
        );
        assert!(
            fs::read_to_string(hooks.join("pre-commit"))
                .unwrap()
                .contains("import-order-lint check --staged")
        );

        assert_eq!(
            install_pre_commit_hook(dir.path()).unwrap(),
            HookInstall::AlreadyInstalled
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_installed_hook_is_executable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        assert_eq!(
            install_pre_commit_hook(dir.path()).unwrap(),
            HookInstall::Installed
        );
        let mode = fs::metadata(dir.path().join("hooks/pre-commit"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o111, 0o111);
    }
}
