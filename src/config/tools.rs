//! External programs the pipeline shells out to.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Program name or path for each external collaborator.
///
/// Bare names are resolved on `PATH`. The `[tools]` table of the config file
/// can point any of them somewhere else.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Tools {
    pub curl: PathBuf,
    pub gpg: PathBuf,
    pub git: PathBuf,
    pub mount: PathBuf,
    pub umount: PathBuf,
    pub mountpoint: PathBuf,
    pub mkisofs: PathBuf,
    pub implantisomd5: PathBuf,
}

impl Default for Tools {
    fn default() -> Self {
        Self {
            curl: "curl".into(),
            gpg: "gpg".into(),
            git: "git".into(),
            mount: "mount".into(),
            umount: "umount".into(),
            mountpoint: "mountpoint".into(),
            mkisofs: "mkisofs".into(),
            implantisomd5: "implantisomd5".into(),
        }
    }
}

impl Tools {
    /// Every configured tool paired with the package that usually provides it.
    pub fn required(&self) -> Vec<(&Path, &'static str)> {
        vec![
            (self.curl.as_path(), "curl"),
            (self.gpg.as_path(), "gnupg2"),
            (self.git.as_path(), "git"),
            (self.mount.as_path(), "util-linux"),
            (self.umount.as_path(), "util-linux"),
            (self.mountpoint.as_path(), "util-linux"),
            (self.mkisofs.as_path(), "genisoimage"),
            (self.implantisomd5.as_path(), "isomd5sum"),
        ]
    }
}
