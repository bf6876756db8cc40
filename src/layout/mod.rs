//! Layout extraction: materialize the source ISO as a directory tree.
//!
//! The layout directory is rebuilt from scratch on every run; nothing from a
//! previous run survives. A mount left behind by an interrupted run is
//! released before the new mount is attempted, and the new mount is released
//! whether or not the copy succeeds.

pub mod copy;
pub mod mount;
pub mod sanitize;

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::error::FailureKind;
use mount::LoopMount;

/// Delete `path` if it exists and recreate it empty.
pub fn reset_dir(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path)
            .with_context(|| format!("removing previous layout directory {}", path.display()))?;
    }
    fs::create_dir_all(path)
        .with_context(|| format!("creating layout directory {}", path.display()))?;
    Ok(())
}

/// Copy the full contents of `iso` into `config.layout_dir`.
///
/// Returns the number of regular files copied.
pub fn extract(config: &PipelineConfig, iso: &Path) -> Result<u64> {
    info!("[layout] rebuilding {}", config.layout_dir.display());
    reset_dir(&config.layout_dir).context(FailureKind::Copy)?;

    let tools = &config.tools;
    let mount_point = &config.mount_point;
    if mount::is_mounted(tools, mount_point).context(FailureKind::Mount)? {
        warn!(
            "[layout] {} is still mounted from an earlier run; unmounting",
            mount_point.display()
        );
        mount::unmount(tools, mount_point).context(FailureKind::Mount)?;
    }
    fs::create_dir_all(mount_point)
        .with_context(|| format!("creating mount point {}", mount_point.display()))
        .context(FailureKind::Mount)?;

    info!("[layout] mounting {} at {}", iso.display(), mount_point.display());
    let mounted = LoopMount::mount(tools, iso, mount_point).context(FailureKind::Mount)?;

    let copied = copy::copy_tree(mounted.target(), &config.layout_dir)
        .with_context(|| {
            format!(
                "copying {} into {}",
                mounted.target().display(),
                config.layout_dir.display()
            )
        })
        .context(FailureKind::Copy)?;

    mounted.release().context(FailureKind::Mount)?;
    info!("[layout] copied {} files", copied);
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeHost;

    fn iso_with(host: &FakeHost, name: &str, files: &[(&str, &str)]) -> std::path::PathBuf {
        let path = host.root().join(name);
        host.make_iso(&path, files);
        path
    }

    #[test]
    fn test_extract_copies_iso_contents() {
        let host = FakeHost::new();
        let config = host.config();
        let iso = iso_with(&host, "a.iso", &FakeHost::standard_iso_files());

        let copied = extract(&config, &iso).unwrap();

        assert_eq!(copied, FakeHost::standard_iso_files().len() as u64);
        assert!(config.layout_dir.join("isolinux/isolinux.bin").is_file());
        assert!(config.layout_dir.join(".treeinfo").is_file());
        assert!(!host.is_mounted());
    }

    #[test]
    fn test_rebuild_leaves_no_residue() {
        let host = FakeHost::new();
        let config = host.config();
        let first = iso_with(&host, "first.iso", &[("first-only.txt", "1"), ("shared.txt", "old")]);
        let second = iso_with(&host, "second.iso", &[("shared.txt", "new")]);

        extract(&config, &first).unwrap();
        fs::write(config.layout_dir.join("marker"), "injected").unwrap();
        extract(&config, &second).unwrap();

        assert!(!config.layout_dir.join("marker").exists());
        assert!(!config.layout_dir.join("first-only.txt").exists());
        assert_eq!(
            fs::read_to_string(config.layout_dir.join("shared.txt")).unwrap(),
            "new"
        );
    }

    #[test]
    fn test_stale_mount_is_released_first() {
        let host = FakeHost::new();
        let config = host.config();
        host.leave_stale_mount(&config.mount_point);
        let iso = iso_with(&host, "a.iso", &[("isolinux/isolinux.bin", "boot")]);

        extract(&config, &iso).unwrap();

        let log = host.log("mount");
        let first_umount = log.iter().position(|l| l.starts_with("umount")).unwrap();
        let first_mount = log.iter().position(|l| l.starts_with("mount ")).unwrap();
        assert!(first_umount < first_mount, "{log:?}");
        assert!(!config.layout_dir.join("stale-file").exists());
        assert!(config.layout_dir.join("isolinux/isolinux.bin").is_file());
        assert!(!host.is_mounted());
    }

    #[test]
    fn test_mount_failure_is_classified() {
        let host = FakeHost::new();
        let config = host.config();

        let err = extract(&config, &host.root().join("absent.iso")).unwrap_err();

        assert_eq!(FailureKind::of(&err), Some(FailureKind::Mount));
    }

    #[test]
    fn test_copy_failure_still_unmounts() {
        let host = FakeHost::new();
        let config = host.config();
        let iso = iso_with(&host, "a.iso", &[("isolinux/isolinux.bin", "boot")]);
        // Once mounted, replace the layout directory with a plain file so the
        // copy cannot create it.
        let script = host.root().join("bin/mount");
        let mut body = fs::read_to_string(&script).unwrap();
        body.push_str(&format!(
            "rm -rf \"{0}\" && touch \"{0}\"\n",
            config.layout_dir.display()
        ));
        fs::write(&script, body).unwrap();

        let err = extract(&config, &iso).unwrap_err();

        assert_eq!(FailureKind::of(&err), Some(FailureKind::Copy));
        assert!(host.log("mount").iter().any(|l| l.starts_with("umount")));
        assert!(!host.is_mounted());
    }
}
