//! Path helpers for config and log locations.

use std::env;
use std::path::{Component, Path, PathBuf};

/// `$HOME`, or `/tmp` (with a warning) when it is unset.
pub fn home_dir() -> PathBuf {
    env::var_os("HOME")
        .filter(|home| !home.is_empty())
        .map_or_else(
            || {
                eprintln!("[TTV-CONFIG] WARNING: HOME not set, falling back to /tmp for data paths");
                PathBuf::from("/tmp")
            },
            PathBuf::from,
        )
}

/// `~/.config/ttv`
pub fn config_dir() -> PathBuf {
    home_dir().join(".config").join("ttv")
}

/// `~/.local/share/ttv`
pub fn data_dir() -> PathBuf {
    home_dir().join(".local").join("share").join("ttv")
}

/// Replace a leading `~` component with the home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => home_dir().join(rest),
        Err(_) => path.to_path_buf(),
    }
}

/// Absolute form of `path` after `~` expansion.
///
/// Existing paths are canonicalized; others are joined onto the working
/// directory with `.` and `..` folded away.
pub fn resolve_absolute_path(path: &Path) -> PathBuf {
    let expanded = expand_tilde(path);
    let absolute = if expanded.is_absolute() {
        expanded
    } else {
        env::current_dir().map_or_else(|_| expanded.clone(), |cwd| cwd.join(&expanded))
    };

    std::fs::canonicalize(&absolute).unwrap_or_else(|_| fold_dots(&absolute))
}

fn fold_dots(path: &Path) -> PathBuf {
    let mut kept: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(kept.last(), Some(Component::Normal(_))) {
                    kept.pop();
                }
            }
            other => kept.push(other),
        }
    }
    kept.into_iter().collect()
}
