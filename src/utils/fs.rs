//! File system utilities.

use super::hash;
use crate::Result;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Check if a path exists and is a directory.
pub fn ensure_directory(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(crate::Error::PathNotFound(path.display().to_string()));
    }
    if !path.is_dir() {
        return Err(crate::Error::NotADirectory(path.display().to_string()));
    }
    Ok(())
}

/// Create the parent directory of `path` if it is missing.
pub fn ensure_parent(path: &Path) -> std::io::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
            std::fs::create_dir_all(parent)
        }
        _ => Ok(()),
    }
}

/// Move a file, falling back to copy + delete across filesystems.
///
/// A same-filesystem rename is atomic and needs no verification. A copied file
/// is checked against the original's SHA-256 when `verify_checksum` is set, and
/// the original is only removed once the copy is known good.
pub fn move_file(from: &Path, to: &Path, verify_checksum: bool) -> std::io::Result<()> {
    ensure_parent(to)?;

    match std::fs::rename(from, to) {
        Ok(()) => {
            tracing::debug!("Moved (rename): {:?} -> {:?}", from, to);
            return Ok(());
        }
        Err(e) if e.kind() == std::io::ErrorKind::CrossesDevices => {
            tracing::debug!("Cross-filesystem move detected, using copy+delete");
        }
        Err(e) => return Err(e),
    }

    let checksum = if verify_checksum {
        Some(hash::sha256_file(from)?)
    } else {
        None
    };

    std::fs::copy(from, to)?;

    if let Some(original) = checksum {
        let copied = hash::sha256_file(to)?;
        if original != copied {
            // Remove incomplete copy
            let _ = std::fs::remove_file(to);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("checksum mismatch after copying to {:?}", to),
            ));
        }
    }

    std::fs::remove_file(from)?;
    tracing::debug!("Moved (copy+delete): {:?} -> {:?}", from, to);
    Ok(())
}

/// Resolve a configured root to a single absolute spelling.
///
/// Identity keys embed paths, so `lib`, `./lib` and `lib/../lib` must all end up
/// as the same path. An existing root is canonicalized. A missing one gets its
/// nearest existing ancestor canonicalized and the rest appended.
pub fn absolute_root(path: &Path) -> std::io::Result<PathBuf> {
    if path.exists() {
        return std::fs::canonicalize(path);
    }

    let absolute = std::path::absolute(path)?;
    for ancestor in absolute.ancestors().skip(1) {
        if ancestor.exists() {
            let rest = absolute.strip_prefix(ancestor).unwrap_or(Path::new(""));
            return Ok(std::fs::canonicalize(ancestor)?.join(rest));
        }
    }
    Ok(absolute)
}

fn is_empty_dir(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false)
}

/// Remove the given directories, and then their parents, once they are empty.
///
/// Only `dirs` and their ancestors below `root` are looked at, so folders that
/// were already empty elsewhere in the tree are left alone. `root` itself is
/// never removed. A directory that cannot be removed is logged and ends the walk
/// up from it. Returns the number of directories removed.
pub fn prune_emptied_dirs<I>(dirs: I, root: &Path) -> usize
where
    I: IntoIterator<Item = PathBuf>,
{
    let mut starts: Vec<PathBuf> = dirs
        .into_iter()
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    // Children before parents
    starts.sort_by(|a, b| {
        b.components()
            .count()
            .cmp(&a.components().count())
            .then_with(|| a.cmp(b))
    });

    let mut removed = 0;
    for start in starts {
        let mut current = Some(start.as_path());
        while let Some(dir) = current {
            if dir == root || !dir.starts_with(root) {
                break;
            }
            if dir.exists() {
                if !is_empty_dir(dir) {
                    break;
                }
                if let Err(e) = std::fs::remove_dir(dir) {
                    tracing::warn!("Could not remove empty directory {:?}: {}", dir, e);
                    break;
                }
                tracing::debug!("Removed empty directory {:?}", dir);
                removed += 1;
            }
            current = dir.parent();
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prune_walks_up_and_keeps_root() {
        let temp = tempfile::TempDir::new().unwrap();
        let root = temp.path();
        std::fs::create_dir_all(root.join("old/a/b")).unwrap();
        std::fs::create_dir_all(root.join("keep")).unwrap();
        std::fs::write(root.join("keep/file.mkv"), "x").unwrap();

        let removed = prune_emptied_dirs(
            vec![root.join("old/a/b"), root.join("keep")],
            root,
        );

        assert_eq!(removed, 3);
        assert!(root.exists());
        assert!(!root.join("old").exists());
        assert!(root.join("keep/file.mkv").exists());
    }

    #[test]
    fn test_prune_leaves_unrelated_empty_dirs() {
        let temp = tempfile::TempDir::new().unwrap();
        let root = temp.path();
        std::fs::create_dir_all(root.join("Movies/To Watch")).unwrap();
        std::fs::create_dir_all(root.join("old/x")).unwrap();
        std::fs::create_dir_all(root.join("old/y")).unwrap();

        let removed = prune_emptied_dirs(vec![root.join("old/x"), root.join("old/y")], root);

        assert_eq!(removed, 3);
        assert!(!root.join("old").exists());
        assert!(root.join("Movies/To Watch").exists());
    }

    #[test]
    fn test_prune_ignores_dirs_outside_root() {
        let temp = tempfile::TempDir::new().unwrap();
        let root = temp.path().join("library");
        let outside = temp.path().join("inbox/empty");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::create_dir_all(&outside).unwrap();

        assert_eq!(prune_emptied_dirs(vec![outside.clone(), root.clone()], &root), 0);
        assert!(outside.exists());
        assert!(root.exists());
    }

    #[test]
    fn test_absolute_root_has_one_spelling() {
        let temp = tempfile::TempDir::new().unwrap();
        let library = temp.path().join("Shared Media");
        std::fs::create_dir_all(&library).unwrap();

        let plain = absolute_root(&library).unwrap();
        let dotted = absolute_root(&library.join("../Shared Media/.")).unwrap();
        assert_eq!(plain, dotted);
        assert!(plain.is_absolute());

        // Missing roots resolve through their existing ancestor
        let missing = absolute_root(&temp.path().join("x/../new/lib")).unwrap_or_default();
        assert!(missing.is_absolute());
        let created = absolute_root(&temp.path().join("new-lib")).unwrap();
        assert_eq!(created, plain.parent().unwrap().join("new-lib"));
    }

    #[test]
    fn test_move_file_creates_parents() {
        let temp = tempfile::TempDir::new().unwrap();
        let from = temp.path().join("a.mkv");
        let to = temp.path().join("x/y/b.mkv");
        std::fs::write(&from, "video").unwrap();

        move_file(&from, &to, true).unwrap();

        assert!(!from.exists());
        assert_eq!(std::fs::read_to_string(&to).unwrap(), "video");
    }

    #[test]
    fn test_ensure_directory() {
        let temp = tempfile::TempDir::new().unwrap();
        assert!(ensure_directory(temp.path()).is_ok());
        let file = temp.path().join("f");
        std::fs::write(&file, "x").unwrap();
        assert!(ensure_directory(&file).is_err());
        assert!(ensure_directory(&temp.path().join("missing")).is_err());
    }
}
