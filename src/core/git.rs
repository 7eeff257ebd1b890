use anyhow::{Context, Result, anyhow};
use git2::{Delta, DiffOptions, Repository};
use std::path::{Path, PathBuf};
use std::str;
use tracing::debug;

/// Trait defining the Git operations required by the engine.
/// This abstraction allows for easier testing and decoupling from specific git implementations.
pub trait GitClient {
    /// Returns the files added or modified in the index, relative to the repository root.
    /// Deleted files are left out since there is nothing to lint.
    fn get_staged_files(&self) -> Result<Vec<String>>;

    /// Reads the content of a file as it exists in the staging area (index).
    fn read_staged_file_content(&self, path: &str) -> Result<String>;

    /// Returns all files tracked in the index, relative to the repository root.
    fn get_tracked_files(&self) -> Result<Vec<String>>;

    /// Returns the root path of the repository.
    fn get_repo_root(&self) -> PathBuf;

    /// Returns the .git directory path
    fn get_git_dir(&self) -> PathBuf;
}

/// Concrete implementation of GitClient using the git2 crate.
pub struct Git2Client {
    repo: Repository,
}

impl Git2Client {
    /// Opens the repository containing `path`, searching parent directories.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let repo = Repository::discover(path)
            .with_context(|| format!("Not a git repository: {}", path.display()))?;
        Ok(Self { repo })
    }

    /// The index as currently on disk; another process may have staged files
    /// since the repository was opened.
    fn fresh_index(&self) -> Result<git2::Index> {
        let mut index = self.repo.index()?;
        index.read(false)?;
        Ok(index)
    }
}

impl GitClient for Git2Client {
    fn get_staged_files(&self) -> Result<Vec<String>> {
        let index = self.fresh_index()?;
        let mut options = DiffOptions::new();

        // Diff from HEAD to the index, or from an empty tree before the first commit.
        let base_tree = match self.repo.head().ok().and_then(|head| head.peel_to_tree().ok()) {
            Some(tree) => tree,
            None => {
                let empty_tree = self.repo.treebuilder(None)?.write()?;
                self.repo.find_tree(empty_tree)?
            }
        };
        let diff = self
            .repo
            .diff_tree_to_index(Some(&base_tree), Some(&index), Some(&mut options))?;

        let mut staged_files = Vec::new();
        for delta in diff.deltas() {
            if delta.status() == Delta::Deleted {
                continue;
            }
            if let Some(path) = delta.new_file().path().and_then(|p| p.to_str()) {
                staged_files.push(path.to_string());
            }
        }
        debug!(count = staged_files.len(), "staged files");
        Ok(staged_files)
    }

    fn read_staged_file_content(&self, path: &str) -> Result<String> {
        let index = self.fresh_index()?;
        let entry = index
            .get_path(Path::new(path), 0)
            .ok_or_else(|| anyhow!("Failed to get staged file entry for {path}"))?;
        let blob = self.repo.find_blob(entry.id)?;
        let content = str::from_utf8(blob.content())
            .with_context(|| format!("Staged content of {path} is not valid UTF-8"))?;
        Ok(content.to_string())
    }

    fn get_tracked_files(&self) -> Result<Vec<String>> {
        let index = self.fresh_index()?;
        let mut files = Vec::new();
        for i in 0..index.len() {
            if let Some(entry) = index.get(i)
                && let Ok(path_str) = str::from_utf8(&entry.path)
            {
                files.push(path_str.to_string());
            }
        }
        Ok(files)
    }

    fn get_repo_root(&self) -> PathBuf {
        self.repo
            .workdir()
            .unwrap_or_else(|| self.repo.path())
            .to_path_buf()
    }

    fn get_git_dir(&self) -> PathBuf {
        self.repo.path().to_path_buf()
    }
}
