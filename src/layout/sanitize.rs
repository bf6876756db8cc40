//! Layout sanitizer.
//!
//! ISO9660 translation tables (`TRANS.TBL`) copied from the source image
//! describe the old image's directory listings and must not be re-embedded.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::debug;
use walkdir::WalkDir;

pub const ARTIFACT_NAME: &str = "TRANS.TBL";

/// Remove every `TRANS.TBL` file under `root`. Returns how many were removed;
/// zero is success.
pub fn sanitize(root: &Path) -> Result<usize> {
    let mut artifacts = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.with_context(|| format!("walking {}", root.display()))?;
        if entry.file_type().is_file() && entry.file_name() == ARTIFACT_NAME {
            artifacts.push(entry.into_path());
        }
    }

    for path in &artifacts {
        fs::remove_file(path).with_context(|| format!("removing {}", path.display()))?;
        debug!(path = %path.display(), "removed translation table");
    }

    Ok(artifacts.len())
}
