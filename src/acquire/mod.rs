//! Acquisition stage: make sure a verified copy of the source ISO is cached.
//!
//! Protocol:
//!
//! 1. Download the ISO into the cache unless it is already there.
//! 2. Import any missing trusted signing keys (best effort).
//! 3. Always re-fetch the checksum manifest and verify its signature. Only
//!    the text gpg reports as signed is trusted.
//! 4. Compare the cached ISO against the manifest. On mismatch download the
//!    ISO once more and re-check; a second mismatch is fatal.

pub mod checksum;
pub mod download;
pub mod keys;
pub mod manifest;

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use checksum::{digests_match, sha256_file};
use download::download;
use keys::{KeyStore, TRUSTED_KEYS};
use manifest::ChecksumManifest;

/// A cached ISO whose digest matches the signature-verified manifest.
#[derive(Debug, Clone)]
pub struct AcquiredIso {
    pub path: PathBuf,
    pub sha256: String,
    /// Whether the ISO was fetched from the mirror during this run.
    pub downloaded: bool,
}

pub fn acquire(config: &PipelineConfig) -> Result<AcquiredIso> {
    fs::create_dir_all(&config.cache_dir)
        .with_context(|| format!("creating cache directory {}", config.cache_dir.display()))?;

    let iso_path = config.cached_iso();
    let mut downloaded = false;
    if iso_path.is_file() {
        info!("[acquire] using cached {}", iso_path.display());
    } else {
        info!("[acquire] downloading {}", config.iso_url());
        download(&config.tools, &config.iso_url(), &iso_path)?;
        downloaded = true;
    }

    let store = KeyStore::new(config);
    let missing = store.ensure_trusted(&config.keyserver, TRUSTED_KEYS);
    if !missing.is_empty() {
        warn!(?missing, "[acquire] some trusted keys are unavailable");
    }

    let manifest_path = config.cached_manifest();
    info!("[acquire] fetching checksum manifest {}", config.checksum_url());
    download(&config.tools, &config.checksum_url(), &manifest_path)?;
    let signed_text = store.verify(&manifest_path)?;
    let manifest = ChecksumManifest::parse(&signed_text)
        .with_context(|| format!("parsing signed text of {}", manifest_path.display()))?;
    let published = ChecksumManifest::load(&manifest_path)?;
    if published.entries() != manifest.entries() {
        bail!(
            "{} lists checksums outside its signed block",
            manifest_path.display()
        );
    }

    let expected = manifest
        .digest_for_base_name(&config.iso_name)
        .with_context(|| {
            format!(
                "no checksum for {} in {}",
                config.iso_name,
                manifest_path.display()
            )
        })?;
    let actual = sha256_file(&iso_path)?;
    if digests_match(&actual, expected) {
        info!("[acquire] checksum OK for {}", config.iso_name);
        return Ok(AcquiredIso {
            path: iso_path,
            sha256: actual,
            downloaded,
        });
    }

    warn!(
        expected,
        actual = %actual,
        "[acquire] checksum mismatch for {}; downloading again",
        config.iso_name
    );
    download(&config.tools, &config.iso_url(), &iso_path)?;

    let expected = manifest.digest_for(&config.iso_name).with_context(|| {
        format!(
            "no checksum line for exactly {} in {}",
            config.iso_name,
            manifest_path.display()
        )
    })?;
    let actual = sha256_file(&iso_path)?;
    if !digests_match(&actual, expected) {
        bail!(
            "checksum mismatch for {} after re-download: expected {}, got {}",
            iso_path.display(),
            expected,
            actual
        );
    }

    info!("[acquire] checksum OK for {} after re-download", config.iso_name);
    Ok(AcquiredIso {
        path: iso_path,
        sha256: actual,
        downloaded: true,
    })
}
