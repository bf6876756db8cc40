//! End-to-end remaster pipeline.
//!
//! ```text
//! preflight ─► acquire ─► extract ─► inject ─► sanitize ─► pack
//! ```
//!
//! Stages run strictly in order; the first error aborts the run. Each error
//! carries a [`FailureKind`] so the binary can report a distinct exit code.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tracing::info;

use crate::acquire::{self, AcquiredIso};
use crate::config::PipelineConfig;
use crate::error::FailureKind;
use crate::inject;
use crate::layout::{self, sanitize};
use crate::pack::{self, PackedIso};
use crate::preflight;

/// Summary of a successful run.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub source: AcquiredIso,
    pub files_copied: u64,
    pub artifacts_removed: usize,
    pub output: PackedIso,
}

/// Exclusive lock on a layout directory, held for the length of a run.
///
/// The lock file sits next to the layout (`<layout>.lock`) so that it
/// survives the layout being deleted and rebuilt.
#[derive(Debug)]
pub struct RunLock {
    _file: File,
    path: PathBuf,
}

impl RunLock {
    pub fn acquire(layout_dir: &Path) -> Result<Self> {
        let mut name = layout_dir
            .file_name()
            .with_context(|| format!("layout directory has no name: {}", layout_dir.display()))?
            .to_owned();
        name.push(".lock");
        let path = layout_dir.with_file_name(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Do not unlink the lock file afterwards: a second process could
        // then lock a fresh inode at the same path.
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .with_context(|| format!("Failed to create lock file: {}", path.display()))?;

        if file.try_lock_exclusive().is_err() {
            anyhow::bail!(
                "another run is using {} (lock held on {})",
                layout_dir.display(),
                path.display()
            );
        }

        Ok(Self { _file: file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub fn run(config: &PipelineConfig) -> Result<BuildReport> {
    let started = OffsetDateTime::now_utc();

    preflight::check_host(config).context(FailureKind::Preflight)?;
    let _lock = RunLock::acquire(&config.layout_dir).context(FailureKind::Preflight)?;

    let source = acquire::acquire(config).context(FailureKind::Acquisition)?;

    // extract classifies its own mount and copy failures
    let files_copied = layout::extract(config, &source.path)?;

    inject::inject(config).context(FailureKind::Copy)?;

    let artifacts_removed = sanitize::sanitize(&config.layout_dir).context(FailureKind::Copy)?;
    info!("[sanitize] removed {} {} files", artifacts_removed, sanitize::ARTIFACT_NAME);

    let output = pack::pack(config, started).context(FailureKind::Pack)?;
    info!("[pack] wrote {}", output.path.display());

    Ok(BuildReport {
        source,
        files_copied,
        artifacts_removed,
        output,
    })
}
