//! Turn bytes on disk, in an archive or in a git tree into bundles.
//!
//! # Structure
//!
//! - `processor` - Classify a file map and parse it into a bundle
//! - `fs` - Module files, module directories and `.tar.gz` archives
//! - `git` - Repositories at a tag or `HEAD`
//! - `walk` - Recursive directory listing shared with the builder

mod fs;
mod git;
mod processor;
mod walk;

pub use fs::FsLoader;
pub use git::{DownloadResult, GitCli, GitClient, GitLoader, validate_tag};
pub use processor::BundleProcessor;
pub(crate) use walk::walk_files;

#[cfg(test)]
pub use git::MockGitClient;

