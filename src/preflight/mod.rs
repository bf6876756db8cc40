//! Preflight checks for build validation.
//!
//! Validates that the host has the tools, privileges and input files a run
//! needs before anything is downloaded or mounted. This prevents a run from
//! failing halfway through with a half-built layout.

use anyhow::{bail, Result};
use nix::unistd;
use std::path::Path;

use crate::config::PipelineConfig;

/// Check if a command exists on the host system.
///
/// Bare names are looked up in PATH; paths are checked directly.
pub fn command_exists(cmd: &Path) -> bool {
    which::which(cmd).is_ok()
}

/// Check that specific tools are available.
///
/// # Arguments
///
/// * `tools` - Slice of (command, package) tuples
///
/// # Returns
///
/// * `Ok(())` if all tools are found
/// * `Err` with list of missing tools and their packages
pub fn check_required_tools(tools: &[(&Path, &str)]) -> Result<()> {
    let missing: Vec<_> = tools
        .iter()
        .filter(|(tool, _)| !command_exists(tool))
        .collect();

    if !missing.is_empty() {
        let msg = missing
            .iter()
            .map(|(t, p)| format!("  {} (install: {})", t.display(), p))
            .collect::<Vec<_>>()
            .join("\n");
        bail!("Missing required host tools:\n{}", msg);
    }

    Ok(())
}

/// Loop mounting needs root.
pub fn is_root() -> bool {
    unistd::geteuid().is_root()
}

/// Check the input files the content injector will copy from.
///
/// The guest tooling directory is not checked here: it may legitimately be
/// absent until its submodule is initialized.
pub fn check_inputs(config: &PipelineConfig) -> Result<()> {
    let mut missing = Vec::new();
    for (what, path) in [
        ("kickstart file", &config.kickstart),
        ("boot menu override", &config.boot_menu),
    ] {
        if !path.is_file() {
            missing.push(format!("  {}: {}", what, path.display()));
        }
    }

    if !missing.is_empty() {
        bail!("Missing input files:\n{}", missing.join("\n"));
    }

    Ok(())
}

/// Run every host check for `config`.
pub fn check_host(config: &PipelineConfig) -> Result<()> {
    check_required_tools(&config.tools.required())?;

    if config.require_root && !is_root() {
        bail!("loop mounting the source ISO requires root; re-run with sudo or pass --skip-root-check");
    }

    check_inputs(config)
}
