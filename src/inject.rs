//! Content injection: overlay guest tooling, the kickstart file and the boot
//! menu onto the extracted layout.

use anyhow::{bail, Context, Result};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::PipelineConfig;
use crate::layout::copy::copy_tree;
use crate::process::Cmd;

/// Location of the boot menu inside the layout.
pub const BOOT_MENU_PATH: &str = "isolinux/isolinux.cfg";

pub fn inject(config: &PipelineConfig) -> Result<()> {
    overlay_guest_tools(config)?;
    overlay_kickstart(config)?;
    overlay_boot_menu(config)?;
    Ok(())
}

/// Fetch the guest tooling submodule if it is not checked out yet.
pub fn ensure_guest_tools(config: &PipelineConfig) -> Result<()> {
    let dir = &config.guest_tools;
    if is_populated(dir) {
        return Ok(());
    }

    let repo = dir
        .parent()
        .with_context(|| format!("guest tools directory has no parent: {}", dir.display()))?;
    info!("[inject] initializing guest tools submodule {}", dir.display());
    Cmd::new(&config.tools.git)
        .arg("-C")
        .arg_path(repo)
        .args(["submodule", "update", "--init", "--recursive", "--"])
        .arg_path(dir)
        .error_msg(format!("fetching guest tools into {} failed", dir.display()))
        .run()?;

    if !is_populated(dir) {
        bail!("guest tools directory is still empty after submodule update: {}", dir.display());
    }
    Ok(())
}

pub fn overlay_guest_tools(config: &PipelineConfig) -> Result<PathBuf> {
    ensure_guest_tools(config)?;

    let name = config
        .guest_tools
        .file_name()
        .with_context(|| format!("guest tools path has no name: {}", config.guest_tools.display()))?;
    let dest = config.layout_dir.join(name);
    let copied = copy_tree(&config.guest_tools, &dest)
        .with_context(|| format!("copying guest tools into {}", dest.display()))?;
    info!("[inject] guest tools: {} files -> {}", copied, dest.display());
    Ok(dest)
}

pub fn overlay_kickstart(config: &PipelineConfig) -> Result<PathBuf> {
    let name = config
        .kickstart
        .file_name()
        .with_context(|| format!("kickstart path has no file name: {}", config.kickstart.display()))?;
    let dest = config.layout_dir.join(name);
    copy_file_over(&config.kickstart, &dest)?;
    info!("[inject] kickstart -> {}", dest.display());
    Ok(dest)
}

pub fn overlay_boot_menu(config: &PipelineConfig) -> Result<PathBuf> {
    let dest = config.layout_dir.join(BOOT_MENU_PATH);
    let boot_dir = dest.parent().unwrap_or(&config.layout_dir);
    if !boot_dir.is_dir() {
        bail!(
            "layout has no boot loader directory {}; is the source a bootable ISO?",
            boot_dir.display()
        );
    }
    copy_file_over(&config.boot_menu, &dest)?;
    info!("[inject] boot menu -> {}", dest.display());
    Ok(dest)
}

/// Copy `src` to `dst`, replacing `dst` even when it was copied read-only
/// from the source image.
fn copy_file_over(src: &Path, dst: &Path) -> Result<()> {
    if !src.is_file() {
        bail!("source file not found: {}", src.display());
    }
    if let Ok(meta) = fs::metadata(dst) {
        let mut perms = meta.permissions();
        perms.set_mode(perms.mode() | 0o200);
        fs::set_permissions(dst, perms)
            .with_context(|| format!("making {} writable", dst.display()))?;
    }
    fs::copy(src, dst)
        .with_context(|| format!("copying {} to {}", src.display(), dst.display()))?;
    Ok(())
}

fn is_populated(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}
