//! Lexical path utilities. None of these touch the file system.

use std::path::{Component, Path, PathBuf};

/// Normalize a path by processing `.` and `..` components lexically.
pub(crate) fn normalize_path(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                // keep a leading `..` that cannot be popped
                if !result.pop() {
                    result.push(component);
                }
            }
            _ => result.push(component),
        }
    }
    result
}

/// Clean a slash-separated path the way archive entry names are compared:
/// repeated separators collapse, `.` elements vanish, `name/..` pairs cancel,
/// and `..` above a rooted path is dropped. An empty result becomes `.`.
pub fn clean_path(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }

    let rooted = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for element in path.split('/') {
        match element {
            "" | "." => {}
            ".." => match parts.last() {
                Some(last) if *last != ".." => {
                    parts.pop();
                }
                _ if rooted => {}
                _ => parts.push(".."),
            },
            _ => parts.push(element),
        }
    }

    let joined = parts.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{}", joined),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Check if a path is under a given directory by comparing normalized path components.
///
/// # Security
/// Both sides are normalized first, so `/bundles/a/../../etc/passwd` is NOT under `/bundles`.
pub fn is_path_under(path: &Path, dir: &Path) -> bool {
    let normalized_path = normalize_path(path);
    let normalized_dir = normalize_path(dir);

    let path_components: Vec<_> = normalized_path.components().collect();
    let dir_components: Vec<_> = normalized_dir.components().collect();

    if path_components.len() < dir_components.len() {
        return false;
    }

    dir_components
        .iter()
        .zip(path_components.iter())
        .all(|(d, p)| d == p)
}

/// Calculate the path of `to_path` relative to `from_dir`.
///
/// Returns `None` when no relative path exists (e.g. different drive letters on Windows).
pub fn relative_path_from_dir(from_dir: &Path, to_path: &Path) -> Option<PathBuf> {
    let result = pathdiff::diff_paths(to_path, from_dir)?;
    if result.is_absolute() {
        return None;
    }
    Some(result)
}

/// Render a relative path with forward slashes, the separator used inside bundles.
pub(crate) fn to_slash(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_with_dot_and_parent() {
        assert_eq!(
            normalize_path(Path::new("/usr/./local/../bin/./tool")),
            PathBuf::from("/usr/bin/tool")
        );
    }

    #[test]
    fn test_normalize_path_relative() {
        assert_eq!(
            normalize_path(Path::new("foo/bar/../baz")),
            PathBuf::from("foo/baz")
        );
    }

    #[test]
    fn test_clean_path_identity() {
        assert_eq!(clean_path("policies/authz.rego"), "policies/authz.rego");
        assert_eq!(clean_path("a"), "a");
    }

    #[test]
    fn test_clean_path_collapses() {
        assert_eq!(clean_path("a//b/./c/"), "a/b/c");
        assert_eq!(clean_path("./a"), "a");
        assert_eq!(clean_path("a/b/../c"), "a/c");
        assert_eq!(clean_path(""), ".");
        assert_eq!(clean_path("a/.."), ".");
    }

    #[test]
    fn test_clean_path_parent_dirs() {
        assert_eq!(clean_path("../secret"), "../secret");
        assert_eq!(clean_path("a/../../b"), "../b");
        assert_eq!(clean_path("/../etc/passwd"), "/etc/passwd");
        assert_eq!(clean_path("/"), "/");
    }

    #[test]
    fn test_is_path_under_blocks_traversal() {
        assert!(is_path_under(
            Path::new("/bundles/acme/1.0.0/a.rego"),
            Path::new("/bundles")
        ));
        assert!(!is_path_under(
            Path::new("/bundles/acme/../../etc/passwd"),
            Path::new("/bundles")
        ));
    }

    #[test]
    fn test_relative_path_from_dir() {
        assert_eq!(
            relative_path_from_dir(Path::new("/src"), Path::new("/src/pkg/a.rego")),
            Some(PathBuf::from("pkg/a.rego"))
        );
    }

    #[test]
    fn test_to_slash() {
        assert_eq!(to_slash(Path::new("pkg/sub/a.rego")), "pkg/sub/a.rego");
    }
}
