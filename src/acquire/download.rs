//! Atomic downloads into the local cache.
//!
//! curl writes into a temporary file next to the destination; only a complete
//! transfer is renamed into place. A failed or interrupted transfer never
//! leaves a partial file under the final name.

use anyhow::{Context, Result};
use std::path::Path;
use tempfile::Builder;
use tracing::debug;

use crate::config::Tools;
use crate::process::Cmd;

/// Fetch `url` into `dest`, replacing any existing file.
pub fn download(tools: &Tools, url: &str, dest: &Path) -> Result<()> {
    let dir = dest
        .parent()
        .with_context(|| format!("download target has no parent: {}", dest.display()))?;

    let partial = Builder::new()
        .prefix(".partial-")
        .tempfile_in(dir)
        .with_context(|| format!("creating temporary download file in {}", dir.display()))?;

    Cmd::new(&tools.curl)
        .args(["--fail", "--location", "--silent", "--show-error", "--output"])
        .arg_path(partial.path())
        .arg(url)
        .error_msg(format!("downloading {url} failed"))
        .run()?;

    partial
        .persist(dest)
        .with_context(|| format!("moving download into place at {}", dest.display()))?;

    debug!(url, dest = %dest.display(), "download complete");
    Ok(())
}
