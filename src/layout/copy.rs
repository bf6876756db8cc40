//! Attribute-preserving recursive copy.

use anyhow::{Context, Result};
use std::fs::{self, File, FileTimes};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use walkdir::WalkDir;

/// Copy the contents of `src` into `dst`, preserving symlinks, permission
/// bits and modification times. `dst` is created if needed.
///
/// Copied directories are always owner-writable so the tree can be edited
/// and removed afterwards; read-only media ship `0555` directories.
///
/// Returns the number of regular files copied.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<u64> {
    fs::create_dir_all(dst)
        .with_context(|| format!("Failed to create directory: {}", dst.display()))?;

    let mut files = 0;
    // Directory attributes are applied last: a read-only source directory
    // would otherwise block copying its children.
    let mut dirs = Vec::new();

    for entry in WalkDir::new(src).min_depth(1).follow_links(false) {
        let entry = entry.with_context(|| format!("Failed to walk {}", src.display()))?;
        let src_path = entry.path();
        let rel = src_path
            .strip_prefix(src)
            .with_context(|| format!("{} escaped {}", src_path.display(), src.display()))?;
        let dst_path = dst.join(rel);
        let file_type = entry.file_type();

        if file_type.is_symlink() {
            let target = fs::read_link(src_path)?;
            if dst_path.exists() || dst_path.is_symlink() {
                fs::remove_file(&dst_path)?;
            }
            std::os::unix::fs::symlink(&target, &dst_path)
                .with_context(|| format!("Failed to create symlink: {}", dst_path.display()))?;
        } else if file_type.is_dir() {
            fs::create_dir_all(&dst_path)
                .with_context(|| format!("Failed to create directory: {}", dst_path.display()))?;
            dirs.push((src_path.to_path_buf(), dst_path));
        } else {
            fs::copy(src_path, &dst_path)
                .with_context(|| format!("Failed to copy file: {}", src_path.display()))?;
            copy_mtime(src_path, &dst_path)?;
            files += 1;
        }
    }

    for (src_dir, dst_dir) in dirs.iter().rev() {
        let mut perms = fs::metadata(src_dir)?.permissions();
        perms.set_mode(perms.mode() | 0o200);
        copy_mtime(src_dir, dst_dir)?;
        fs::set_permissions(dst_dir, perms)
            .with_context(|| format!("Failed to set permissions on {}", dst_dir.display()))?;
    }

    Ok(files)
}

fn copy_mtime(src: &Path, dst: &Path) -> Result<()> {
    let modified = fs::metadata(src)?.modified()?;
    File::open(dst)
        .and_then(|f| f.set_times(FileTimes::new().set_modified(modified)))
        .with_context(|| format!("Failed to set times on {}", dst.display()))
}
