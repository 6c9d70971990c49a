//! Home directory lookup and lexical path helpers.
//!
//! Nothing here touches the filesystem: paths are expanded, joined and
//! normalized purely by their components, so results are reproducible for
//! datafiles that do not exist yet.

use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

use directories::BaseDirs;

/// Get the user's home directory.
///
/// Uses the platform lookup, then `$HOME`, then `/`.
///
/// # Example
///
/// ```
/// use pspace_kernel::paths::home_dir;
///
/// let home = home_dir();
/// assert!(home.is_absolute());
/// ```
pub fn home_dir() -> PathBuf {
    BaseDirs::new()
        .map(|d| d.home_dir().to_path_buf())
        .or_else(|| std::env::var_os("HOME").map(PathBuf::from))
        .filter(|p| p.is_absolute())
        .unwrap_or_else(|| PathBuf::from("/"))
}

/// Expand a leading `~` or `~/` to `home`. `~user` forms are left alone.
pub fn expand_tilde(path: &str, home: &Path) -> PathBuf {
    if path == "~" {
        return home.to_path_buf();
    }
    match path.strip_prefix("~/") {
        Some(rest) => home.join(rest),
        None => PathBuf::from(path),
    }
}

/// Join `path` onto `base` unless it is already absolute, then normalize.
pub fn absolutize(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize_path(path)
    } else {
        normalize_path(&base.join(path))
    }
}

/// Normalize a path lexically, resolving `.` and `..` without touching the
/// filesystem. `..` above the root of an absolute path stays at the root.
pub fn normalize_path(path: &Path) -> PathBuf {
    let is_absolute = path.is_absolute();
    let mut components: Vec<&OsStr> = Vec::new();

    for component in path.components() {
        match component {
            Component::ParentDir => {
                if !components.is_empty() && components.last() != Some(&OsStr::new("..")) {
                    components.pop();
                } else if !is_absolute {
                    components.push(OsStr::new(".."));
                }
            }
            Component::CurDir => {}
            Component::Normal(s) => components.push(s),
            Component::RootDir => components.clear(),
            Component::Prefix(_) => {}
        }
    }

    let mut out = if is_absolute {
        PathBuf::from("/")
    } else {
        PathBuf::new()
    };
    for c in components {
        out.push(c);
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Path of `path` relative to `base`, both taken as absolute and normalized.
///
/// Climbs out of `base` with `..` where the two diverge.
pub fn relative_path(path: &Path, base: &Path) -> PathBuf {
    let path = normalize_path(path);
    let base = normalize_path(base);
    let path_parts: Vec<_> = path.components().collect();
    let base_parts: Vec<_> = base.components().collect();

    let common = path_parts
        .iter()
        .zip(base_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut out = PathBuf::new();
    for _ in common..base_parts.len() {
        out.push("..");
    }
    for part in &path_parts[common..] {
        out.push(part.as_os_str());
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}
