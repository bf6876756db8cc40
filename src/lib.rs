//! Remaster a distribution netinstall ISO into an unattended installer.
//!
//! The pipeline downloads the network-install ISO from a mirror, verifies it
//! against a signed checksum manifest, unpacks it into a layout directory,
//! overlays guest tooling, a kickstart file and a boot menu, and masters a new
//! bootable ISO with an embedded media check.
//!
//! # Architecture
//!
//! ```text
//! config      PipelineConfig (flags + optional TOML file)
//!    │
//! preflight   host tools, privileges, input files
//!    │
//! acquire     cache ─► keys ─► signed manifest ─► sha256 (one retry)
//!    │
//! layout      reset dir ─► LoopMount ─► copy_tree ─► unmount
//!    │
//! inject      guest tools, ks.cfg, isolinux/isolinux.cfg
//!    │
//! sanitize    drop TRANS.TBL
//!    │
//! pack        mkisofs ─► implantisomd5 ─► <output>.sha256
//! ```
//!
//! Every external tool is invoked through [`process::Cmd`]; every failure is
//! classified with an [`error::FailureKind`].
//!
//! # Example
//!
//! ```rust,ignore
//! use netinst_remaster::config::RawConfig;
//!
//! let config = RawConfig::load("remaster.toml".as_ref())?.resolve(&std::env::current_dir()?)?;
//! let report = netinst_remaster::pipeline::run(&config)?;
//! println!("{}", report.output.path.display());
//! ```

pub mod acquire;
pub mod config;
pub mod error;
pub mod inject;
pub mod layout;
pub mod pack;
pub mod pipeline;
pub mod preflight;
pub mod process;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{PipelineConfig, RawConfig};
pub use error::FailureKind;
pub use pipeline::{run, BuildReport};
