//! Pipeline configuration.
//!
//! Values come from command-line flags and, optionally, a TOML file. Both are
//! collected into a [`RawConfig`], merged (flags win), and resolved once into
//! an immutable [`PipelineConfig`] that every stage borrows.
//!
//! Resolution has no side effects: a missing parameter is reported before
//! anything is downloaded, mounted or written.

mod tools;

pub use tools::Tools;

use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_KICKSTART: &str = "ks.cfg";
pub const DEFAULT_BOOT_MENU: &str = "isolinux.cfg";
pub const DEFAULT_GUEST_TOOLS: &str = "guest-tools";
pub const DEFAULT_VOLUME_LABEL: &str = "CentOS 7 x86_64";
pub const DEFAULT_KEYSERVER: &str = "hkps://keys.openpgp.org";

/// A required pipeline parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parameter {
    Mirror,
    Iso,
    Checksum,
    CacheDir,
    MountPoint,
    LayoutDir,
    Output,
}

impl Parameter {
    pub const ALL: [Parameter; 7] = [
        Parameter::Mirror,
        Parameter::Iso,
        Parameter::Checksum,
        Parameter::CacheDir,
        Parameter::MountPoint,
        Parameter::LayoutDir,
        Parameter::Output,
    ];

    /// Command-line flag that supplies this parameter.
    pub fn flag(self) -> &'static str {
        match self {
            Parameter::Mirror => "--mirror",
            Parameter::Iso => "--iso",
            Parameter::Checksum => "--checksum",
            Parameter::CacheDir => "--cache-dir",
            Parameter::MountPoint => "--mount-point",
            Parameter::LayoutDir => "--layout-dir",
            Parameter::Output => "--output",
        }
    }

    fn description(self) -> &'static str {
        match self {
            Parameter::Mirror => "mirror url",
            Parameter::Iso => "iso name",
            Parameter::Checksum => "checksum file name",
            Parameter::CacheDir => "cache dir",
            Parameter::MountPoint => "mount point",
            Parameter::LayoutDir => "layout dir",
            Parameter::Output => "output file name",
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing {0}")]
    Missing(Parameter),

    #[error("reading config file '{}'", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing config file '{}'", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("resolving current directory")]
    CurrentDir(#[source] std::io::Error),
}

/// Unvalidated configuration as read from flags or a config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    pub mirror: Option<String>,
    pub iso: Option<String>,
    pub checksum: Option<String>,
    pub cache_dir: Option<String>,
    pub mount_point: Option<String>,
    pub layout_dir: Option<String>,
    pub output: Option<String>,
    pub kickstart: Option<String>,
    pub boot_menu: Option<String>,
    pub guest_tools: Option<String>,
    pub volume_label: Option<String>,
    pub keyserver: Option<String>,
    pub gnupg_home: Option<String>,
    pub require_root: Option<bool>,
    pub tools: Option<Tools>,
}

impl RawConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Merge `overrides` on top of `self`; every value set in `overrides` wins.
    pub fn merge(self, overrides: RawConfig) -> RawConfig {
        RawConfig {
            mirror: overrides.mirror.or(self.mirror),
            iso: overrides.iso.or(self.iso),
            checksum: overrides.checksum.or(self.checksum),
            cache_dir: overrides.cache_dir.or(self.cache_dir),
            mount_point: overrides.mount_point.or(self.mount_point),
            layout_dir: overrides.layout_dir.or(self.layout_dir),
            output: overrides.output.or(self.output),
            kickstart: overrides.kickstart.or(self.kickstart),
            boot_menu: overrides.boot_menu.or(self.boot_menu),
            guest_tools: overrides.guest_tools.or(self.guest_tools),
            volume_label: overrides.volume_label.or(self.volume_label),
            keyserver: overrides.keyserver.or(self.keyserver),
            gnupg_home: overrides.gnupg_home.or(self.gnupg_home),
            require_root: overrides.require_root.or(self.require_root),
            tools: overrides.tools.or(self.tools),
        }
    }

    /// Validate and normalize. Relative paths are anchored at `cwd`.
    pub fn resolve(self, cwd: &Path) -> Result<PipelineConfig, ConfigError> {
        let mirror = required(self.mirror, Parameter::Mirror)?;
        let iso_name = required(self.iso, Parameter::Iso)?;
        let checksum_name = required(self.checksum, Parameter::Checksum)?;
        let cache_dir = required(self.cache_dir, Parameter::CacheDir)?;
        let mount_point = required(self.mount_point, Parameter::MountPoint)?;
        let layout_dir = required(self.layout_dir, Parameter::LayoutDir)?;
        let output = required(self.output, Parameter::Output)?;

        let path_or = |value: Option<String>, default: &str| {
            let value = non_empty(value).unwrap_or_else(|| default.to_string());
            anchor(cwd, trim_trailing_separators(&value))
        };

        Ok(PipelineConfig {
            mirror: trim_trailing_separators(&mirror).to_string(),
            iso_name,
            checksum_name,
            cache_dir: anchor(cwd, trim_trailing_separators(&cache_dir)),
            mount_point: anchor(cwd, trim_trailing_separators(&mount_point)),
            layout_dir: anchor(cwd, trim_trailing_separators(&layout_dir)),
            output: anchor(cwd, &output),
            kickstart: path_or(self.kickstart, DEFAULT_KICKSTART),
            boot_menu: path_or(self.boot_menu, DEFAULT_BOOT_MENU),
            guest_tools: path_or(self.guest_tools, DEFAULT_GUEST_TOOLS),
            volume_label: non_empty(self.volume_label)
                .unwrap_or_else(|| DEFAULT_VOLUME_LABEL.to_string()),
            keyserver: non_empty(self.keyserver).unwrap_or_else(|| DEFAULT_KEYSERVER.to_string()),
            gnupg_home: non_empty(self.gnupg_home).map(|home| anchor(cwd, &home)),
            require_root: self.require_root.unwrap_or(true),
            tools: self.tools.unwrap_or_default(),
        })
    }
}

/// Validated, immutable configuration for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Base URL the ISO and checksum manifest are fetched from.
    pub mirror: String,
    pub iso_name: String,
    pub checksum_name: String,
    pub cache_dir: PathBuf,
    pub mount_point: PathBuf,
    pub layout_dir: PathBuf,
    pub output: PathBuf,
    pub kickstart: PathBuf,
    pub boot_menu: PathBuf,
    pub guest_tools: PathBuf,
    pub volume_label: String,
    pub keyserver: String,
    pub gnupg_home: Option<PathBuf>,
    pub require_root: bool,
    pub tools: Tools,
}

impl PipelineConfig {
    pub fn iso_url(&self) -> String {
        format!("{}/{}", self.mirror, self.iso_name)
    }

    pub fn checksum_url(&self) -> String {
        format!("{}/{}", self.mirror, self.checksum_name)
    }

    pub fn cached_iso(&self) -> PathBuf {
        self.cache_dir.join(&self.iso_name)
    }

    pub fn cached_manifest(&self) -> PathBuf {
        self.cache_dir.join(&self.checksum_name)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(value: Option<String>, param: Parameter) -> Result<String, ConfigError> {
    non_empty(value).ok_or(ConfigError::Missing(param))
}

fn trim_trailing_separators(value: &str) -> &str {
    let trimmed = value.trim_end_matches('/');
    if trimmed.is_empty() && value.starts_with('/') {
        "/"
    } else {
        trimmed
    }
}

fn anchor(cwd: &Path, value: &str) -> PathBuf {
    let path = Path::new(value);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}
