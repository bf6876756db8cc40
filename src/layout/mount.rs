//! Loop mounts scoped to a guard value.

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::config::Tools;
use crate::process::Cmd;

/// Whether `target` is currently an active mount point.
pub fn is_mounted(tools: &Tools, target: &Path) -> Result<bool> {
    let result = Cmd::new(&tools.mountpoint)
        .arg("-q")
        .arg_path(target)
        .allow_fail()
        .run()?;
    Ok(result.success())
}

pub fn unmount(tools: &Tools, target: &Path) -> Result<()> {
    Cmd::new(&tools.umount)
        .arg_path(target)
        .error_msg(format!("unmounting {} failed", target.display()))
        .run()?;
    Ok(())
}

/// A read-only loop mount of an image file.
///
/// The mount is released when the guard is dropped, on every exit path.
/// Call [`LoopMount::release`] on the success path to surface unmount errors
/// instead of only logging them.
#[derive(Debug)]
pub struct LoopMount<'a> {
    tools: &'a Tools,
    target: PathBuf,
    active: bool,
}

impl<'a> LoopMount<'a> {
    pub fn mount(tools: &'a Tools, image: &Path, target: &Path) -> Result<Self> {
        Cmd::new(&tools.mount)
            .args(["-o", "loop,ro"])
            .arg_path(image)
            .arg_path(target)
            .error_msg(format!(
                "mounting {} at {} failed",
                image.display(),
                target.display()
            ))
            .run()?;

        debug!(image = %image.display(), target = %target.display(), "loop mounted");
        Ok(Self {
            tools,
            target: target.to_path_buf(),
            active: true,
        })
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    pub fn release(mut self) -> Result<()> {
        self.active = false;
        unmount(self.tools, &self.target)
    }
}

impl Drop for LoopMount<'_> {
    fn drop(&mut self) {
        if !self.active {
            return;
        }
        if let Err(e) = unmount(self.tools, &self.target) {
            warn!(target = %self.target.display(), error = %format!("{e:#}"), "failed to release loop mount");
        }
    }
}
