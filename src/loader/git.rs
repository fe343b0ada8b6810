use anyhow::{Context, Result, bail};
use log::{debug, info};
use std::collections::BTreeMap;
use std::path::Path;
use std::process::Command;

use super::BundleProcessor;
use crate::bundle::Bundle;
use crate::errors::BundleError;
use crate::module::ModuleParser;

/// Git operations the loader needs. `repo` is a local clone.
#[cfg_attr(test, mockall::automock)]
pub trait GitClient: Send + Sync {
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<()>;
    /// Short names of every tag in the repository.
    fn tags(&self, repo: &Path) -> Result<Vec<String>>;
    /// Commit hash a revision points to.
    fn resolve(&self, repo: &Path, rev: &str) -> Result<String>;
    /// Contents of every tracked file at `commit`, keyed by path.
    fn files_at(&self, repo: &Path, commit: &str) -> Result<BTreeMap<String, Vec<u8>>>;
}

/// [`GitClient`] backed by the `git` executable.
pub struct GitCli;

impl GitCli {
    fn run(&self, repo: Option<&Path>, args: &[&str]) -> Result<Vec<u8>> {
        let mut command = Command::new("git");
        if let Some(repo) = repo {
            command.arg("-C").arg(repo);
        }
        let output = command
            .args(args)
            .output()
            .with_context(|| format!("Failed to run git {}", args.join(" ")))?;

        if !output.status.success() {
            bail!(
                "git {} failed: {}",
                args.first().copied().unwrap_or_default(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(output.stdout)
    }
}

impl GitClient for GitCli {
    #[tracing::instrument(skip(self))]
    fn clone_repo(&self, url: &str, dest: &Path) -> Result<()> {
        let dest = dest.to_string_lossy();
        self.run(None, &["clone", "--quiet", "--no-checkout", "--", url, &dest])?;
        Ok(())
    }

    fn tags(&self, repo: &Path) -> Result<Vec<String>> {
        let stdout = self.run(Some(repo), &["tag", "--list"])?;
        Ok(String::from_utf8_lossy(&stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect())
    }

    fn resolve(&self, repo: &Path, rev: &str) -> Result<String> {
        let rev = format!("{}^{{commit}}", rev);
        let stdout = self.run(Some(repo), &["rev-parse", "--verify", "--quiet", &rev])?;
        Ok(String::from_utf8_lossy(&stdout).trim().to_string())
    }

    #[tracing::instrument(skip(self))]
    fn files_at(&self, repo: &Path, commit: &str) -> Result<BTreeMap<String, Vec<u8>>> {
        let listing = self.run(Some(repo), &["ls-tree", "-r", "-z", commit])?;
        let mut files = BTreeMap::new();

        // <mode> SP <type> SP <object> TAB <path> NUL
        for record in listing.split(|b| *b == 0).filter(|r| !r.is_empty()) {
            let record = String::from_utf8_lossy(record);
            let Some((meta, path)) = record.split_once('\t') else {
                bail!("unexpected git ls-tree output: {}", record);
            };
            let mut meta = meta.split(' ');
            let (Some(_mode), Some(kind), Some(object)) = (meta.next(), meta.next(), meta.next())
            else {
                bail!("unexpected git ls-tree output: {}", record);
            };
            if kind != "blob" {
                debug!("Skipping {} {}", kind, path);
                continue;
            }
            let contents = self.run(Some(repo), &["cat-file", "blob", object])?;
            files.insert(path.to_string(), contents);
        }

        Ok(files)
    }
}

/// A bundle fetched from a git repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadResult {
    /// Commit hash the bundle was read from.
    pub hash: String,
    /// Requested tag, `None` for `HEAD`.
    pub version: Option<String>,
    pub bundle: Bundle,
}

/// Reject tag names git could read as options or that carry unexpected
/// characters.
pub fn validate_tag(tag: &str) -> Result<()> {
    if tag.is_empty()
        || tag.starts_with('-')
        || !tag
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'))
    {
        bail!("'{}' is not a valid tag name", tag);
    }
    Ok(())
}

pub struct GitLoader<G: GitClient, P: ModuleParser> {
    git: G,
    processor: BundleProcessor<P>,
}

impl<G: GitClient, P: ModuleParser> GitLoader<G, P> {
    pub fn new(git: G, processor: BundleProcessor<P>) -> Self {
        Self { git, processor }
    }

    /// Clone `url`, resolve `tag` (or `HEAD`) and parse the files of that
    /// commit into a bundle. The clone lives in a temporary directory that
    /// is removed on return.
    #[tracing::instrument(skip(self))]
    pub fn download_bundle(&self, url: &str, tag: Option<&str>) -> Result<DownloadResult> {
        if let Some(tag) = tag {
            validate_tag(tag)?;
        }

        let workdir = tempfile::tempdir().context("Failed to create temporary directory")?;
        let repo = workdir.path().join("repo");

        info!("Cloning {}...", url);
        self.git
            .clone_repo(url, &repo)
            .with_context(|| format!("Failed to clone {}", url))?;

        let rev = match tag {
            Some(tag) => {
                let tags = self.git.tags(&repo)?;
                if !tags.iter().any(|t| t == tag) {
                    return Err(BundleError::TagNotFound(tag.to_string()).into());
                }
                tag
            }
            None => "HEAD",
        };
        let hash = self.git.resolve(&repo, rev)?;
        debug!("Resolved {} to {}", rev, hash);

        let files = self.git.files_at(&repo, &hash)?;
        let bundle = self.processor.process(&repo_name(url), files)?;

        Ok(DownloadResult {
            hash,
            version: tag.map(String::from),
            bundle,
        })
    }
}

/// Last path segment of a repository URL without a trailing `.git`.
fn repo_name(url: &str) -> String {
    let segment = url
        .trim_end_matches('/')
        .rsplit(['/', ':'])
        .next()
        .unwrap_or(url);
    segment.trim_end_matches(".git").to_string()
}
