//! ISO packing.
//!
//! Masters the finished layout into a bootable ISO with `mkisofs`, embeds the
//! install-time media check with `implantisomd5`, and writes a sha256 sidecar
//! next to the image.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tracing::info;

use crate::acquire::checksum::sha256_file;
use crate::config::PipelineConfig;
use crate::process::Cmd;

pub const BOOT_IMAGE: &str = "isolinux/isolinux.bin";
pub const BOOT_CATALOG: &str = "isolinux/boot.cat";
pub const BOOT_LOAD_SIZE: u32 = 4;
pub const EXCLUDED_DIR: &str = "lost+found";
pub const CHECKSUM_SUFFIX: &str = "sha256";

/// The produced image and its digest.
#[derive(Debug, Clone)]
pub struct PackedIso {
    pub path: PathBuf,
    pub sha256: String,
    pub checksum_file: PathBuf,
}

/// UTC timestamp in `YYYYMMDDTHHMMSSZ` form.
pub fn build_timestamp(at: OffsetDateTime) -> String {
    let at = at.to_offset(time::UtcOffset::UTC);
    format!(
        "{:04}{:02}{:02}T{:02}{:02}{:02}Z",
        at.year(),
        at.month() as u8,
        at.day(),
        at.hour(),
        at.minute(),
        at.second()
    )
}

pub fn volume_description(label: &str, started: OffsetDateTime) -> String {
    format!("{} - {}", label, build_timestamp(started))
}

fn mkisofs(config: &PipelineConfig, started: OffsetDateTime) -> Cmd {
    Cmd::new(&config.tools.mkisofs)
        .arg("-o")
        .arg_path(&config.output)
        .args(["-b", BOOT_IMAGE, "-c", BOOT_CATALOG])
        .args(["-no-emul-boot", "-boot-load-size"])
        .arg(BOOT_LOAD_SIZE.to_string())
        .args(["-boot-info-table", "-R", "-J"])
        .args(["-V", &config.volume_label])
        .arg("-A")
        .arg(volume_description(&config.volume_label, started))
        .args(["-m", EXCLUDED_DIR])
        .arg(".")
        .dir(&config.layout_dir)
        .error_msg("mkisofs failed")
}

/// Build the output ISO from `config.layout_dir`.
///
/// The mastering tool runs with the layout as its working directory; the
/// pipeline's own working directory is left unchanged.
pub fn pack(config: &PipelineConfig, started: OffsetDateTime) -> Result<PackedIso> {
    let output = &config.output;
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating output directory {}", parent.display()))?;
    }

    info!("[pack] mastering {}", output.display());
    mkisofs(config, started).run_interactive()?;
    if !output.is_file() {
        bail!("mkisofs finished but {} is missing", output.display());
    }

    info!("[pack] embedding media check");
    Cmd::new(&config.tools.implantisomd5)
        .arg_path(output)
        .error_msg("implantisomd5 failed")
        .run()?;

    let (checksum_file, sha256) = write_checksum_file(output)?;
    Ok(PackedIso {
        path: output.clone(),
        sha256,
        checksum_file,
    })
}

/// Write `<iso>.sha256` in `sha256sum -c` format using the bare file name.
pub fn write_checksum_file(iso: &Path) -> Result<(PathBuf, String)> {
    let hash = sha256_file(iso)?;
    let filename = iso
        .file_name()
        .context("Could not get ISO filename")?
        .to_string_lossy();

    let mut checksum_path = iso.as_os_str().to_owned();
    checksum_path.push(".");
    checksum_path.push(CHECKSUM_SUFFIX);
    let checksum_path = PathBuf::from(checksum_path);

    fs::write(&checksum_path, format!("{}  {}\n", hash, filename))
        .with_context(|| format!("writing {}", checksum_path.display()))?;

    info!("[pack] SHA256: {}...{}", &hash[..8], &hash[hash.len() - 8..]);
    Ok((checksum_path, hash))
}
