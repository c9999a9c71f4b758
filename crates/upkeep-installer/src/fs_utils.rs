use std::collections::VecDeque;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Copies the contents of `source_root` into `destination_root`, creating
/// directories as needed and overwriting same-named files. Symlinks are
/// recreated as links, not followed. Files that only exist at the destination
/// are left alone. Returns the relative paths copied.
pub fn copy_tree_over(source_root: &Path, destination_root: &Path) -> Result<Vec<PathBuf>> {
    if !source_root.is_dir() {
        anyhow::bail!("source location is not a directory: {}", source_root.display());
    }
    fs::create_dir_all(destination_root)
        .with_context(|| format!("failed creating directory {}", destination_root.display()))?;

    let mut copied = Vec::new();
    let mut queue: VecDeque<PathBuf> = VecDeque::new();
    queue.push_back(PathBuf::new());

    while let Some(relative_dir) = queue.pop_front() {
        let from_dir = source_root.join(&relative_dir);
        for entry in fs::read_dir(&from_dir)
            .with_context(|| format!("failed reading directory {}", from_dir.display()))?
        {
            let entry = entry?;
            let relative = relative_dir.join(entry.file_name());
            let from_path = entry.path();
            let to_path = destination_root.join(&relative);
            let metadata = fs::symlink_metadata(&from_path)
                .with_context(|| format!("failed to stat {}", from_path.display()))?;
            let file_type = metadata.file_type();
            if file_type.is_symlink() {
                copy_symlink(&from_path, &to_path)?;
                copied.push(relative);
            } else if file_type.is_dir() {
                if fs::symlink_metadata(&to_path).is_ok_and(|existing| !existing.is_dir()) {
                    remove_existing(&to_path)?;
                }
                fs::create_dir_all(&to_path)
                    .with_context(|| format!("failed creating directory {}", to_path.display()))?;
                queue.push_back(relative);
            } else if file_type.is_file() {
                // Never write through a link left at the destination.
                if fs::symlink_metadata(&to_path)
                    .is_ok_and(|existing| existing.file_type().is_symlink() || existing.is_dir())
                {
                    remove_existing(&to_path)?;
                }
                fs::copy(&from_path, &to_path).with_context(|| {
                    format!(
                        "failed copying file from {} to {}",
                        from_path.display(),
                        to_path.display()
                    )
                })?;
                copied.push(relative);
            }
        }
    }

    Ok(copied)
}

/// Empties `dir` except for the paths in `keep`; directories on the way to a
/// kept path are emptied recursively instead of removed.
pub fn clear_dir_except(dir: &Path, keep: &[PathBuf]) -> Result<()> {
    for entry in fs::read_dir(dir).with_context(|| format!("failed reading {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        if keep.iter().any(|kept| kept == &path) {
            continue;
        }
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            if keep.iter().any(|kept| kept.starts_with(&path)) {
                clear_dir_except(&path, keep)?;
            } else {
                fs::remove_dir_all(&path)
                    .with_context(|| format!("failed to remove {}", path.display()))?;
            }
        } else {
            fs::remove_file(&path)
                .with_context(|| format!("failed to remove {}", path.display()))?;
        }
    }
    Ok(())
}

/// Renames `from` to `to`, falling back to copy-and-remove when the rename
/// is refused (typically because the two sit on different filesystems).
pub fn move_path(from: &Path, to: &Path) -> Result<()> {
    let rename_err = match fs::rename(from, to) {
        Ok(()) => return Ok(()),
        Err(err) => err,
    };
    let metadata = match fs::symlink_metadata(from) {
        Ok(metadata) => metadata,
        Err(_) => {
            return Err(rename_err)
                .with_context(|| format!("failed moving {} to {}", from.display(), to.display()));
        }
    };

    if metadata.file_type().is_symlink() {
        copy_symlink(from, to)
            .with_context(|| format!("failed moving {} to {}", from.display(), to.display()))?;
        fs::remove_file(from)
            .with_context(|| format!("failed removing moved link {}", from.display()))?;
    } else if metadata.is_dir() {
        copy_tree_over(from, to)
            .with_context(|| format!("failed moving {} to {}", from.display(), to.display()))?;
        fs::remove_dir_all(from)
            .with_context(|| format!("failed removing moved directory {}", from.display()))?;
    } else {
        fs::copy(from, to)
            .with_context(|| format!("failed moving {} to {}", from.display(), to.display()))?;
        fs::remove_file(from)
            .with_context(|| format!("failed removing moved file {}", from.display()))?;
    }
    Ok(())
}

#[cfg(unix)]
fn copy_symlink(from: &Path, to: &Path) -> Result<()> {
    let target =
        fs::read_link(from).with_context(|| format!("failed to read symlink {}", from.display()))?;
    remove_existing(to)?;
    std::os::unix::fs::symlink(&target, to).with_context(|| {
        format!(
            "failed to create symlink {} -> {}",
            to.display(),
            target.display()
        )
    })
}

/// Without a portable way to recreate the link, its target's content is
/// copied instead.
#[cfg(not(unix))]
fn copy_symlink(from: &Path, to: &Path) -> Result<()> {
    remove_existing(to)?;
    fs::copy(from, to)
        .map(|_| ())
        .with_context(|| format!("failed copying {} to {}", from.display(), to.display()))
}

/// Removes whatever sits at `path` without following links.
fn remove_existing(path: &Path) -> Result<()> {
    let result = match fs::symlink_metadata(path) {
        Ok(metadata) if metadata.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => Err(err),
    };
    result.with_context(|| format!("failed to replace {}", path.display()))
}
