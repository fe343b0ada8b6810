use anyhow::Result;
use std::path::Path;

use crate::runtime::{Runtime, path::to_slash, relative_path_from_dir};

/// List every file under `root` as a `/`-separated path relative to it,
/// skipping files that match any of the `ignore` globs.
#[tracing::instrument(skip(runtime, ignore))]
pub(crate) fn walk_files<R: Runtime>(
    runtime: &R,
    root: &Path,
    ignore: &[String],
) -> Result<Vec<String>> {
    let mut files = Vec::new();
    walk_dir(runtime, root, root, ignore, &mut files)?;
    Ok(files)
}

fn walk_dir<R: Runtime>(
    runtime: &R,
    root: &Path,
    dir: &Path,
    ignore: &[String],
    files: &mut Vec<String>,
) -> Result<()> {
    for path in runtime.read_dir(dir)? {
        if runtime.is_dir(&path) {
            // a linked directory may point back at one of its parents
            if runtime.is_symlink(&path) {
                log::debug!("Skipping linked directory {:?}", path);
                continue;
            }
            walk_dir(runtime, root, &path, ignore, files)?;
            continue;
        }

        let relative = match relative_path_from_dir(root, &path) {
            Some(relative) => to_slash(&relative),
            None => to_slash(&path),
        };
        if is_ignored(&relative, ignore) {
            log::debug!("Ignoring {}", relative);
            continue;
        }
        files.push(relative);
    }
    Ok(())
}

fn is_ignored(path: &str, ignore: &[String]) -> bool {
    ignore.iter().any(|pattern| {
        glob::Pattern::new(pattern)
            .map(|p| p.matches(path))
            .unwrap_or(false)
    })
}
