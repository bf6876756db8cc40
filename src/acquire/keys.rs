//! Trusted signing keys and the local GnuPG key store.

use anyhow::Result;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::process::Cmd;

/// Fingerprints whose signatures are accepted on the checksum manifest.
pub const TRUSTED_KEYS: &[&str] = &[
    // CentOS 7 Official Signing Key
    "6341AB2753D78A78A7C27BB124C6A8A7F4A80EB5",
];

/// The gpg key store used for manifest verification.
#[derive(Debug)]
pub struct KeyStore<'a> {
    gpg: &'a Path,
    home: Option<&'a Path>,
}

impl<'a> KeyStore<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self {
            gpg: &config.tools.gpg,
            home: config.gnupg_home.as_deref(),
        }
    }

    fn gpg(&self) -> Cmd {
        let cmd = Cmd::new(self.gpg).arg("--batch");
        match self.home {
            Some(home) => cmd.env("GNUPGHOME", home),
            None => cmd,
        }
    }

    pub fn contains(&self, fingerprint: &str) -> Result<bool> {
        let result = self
            .gpg()
            .args(["--list-keys", fingerprint])
            .allow_fail()
            .run()?;
        Ok(result.success())
    }

    pub fn import(&self, keyserver: &str, fingerprint: &str) -> Result<()> {
        self.gpg()
            .args(["--keyserver", keyserver, "--recv-keys", fingerprint])
            .error_msg(format!("importing key {fingerprint} from {keyserver} failed"))
            .run()?;
        Ok(())
    }

    /// Make sure every key in `fingerprints` is present, importing missing
    /// ones from `keyserver`.
    ///
    /// Import failures are logged and skipped; a manifest signed by a key that
    /// could not be imported still fails [`KeyStore::verify`]. Returns the
    /// fingerprints that are still missing.
    pub fn ensure_trusted<'k>(&self, keyserver: &str, fingerprints: &[&'k str]) -> Vec<&'k str> {
        let mut missing = Vec::new();
        for &fingerprint in fingerprints {
            match self.contains(fingerprint) {
                Ok(true) => {
                    debug!(fingerprint, "trusted key already present");
                    continue;
                }
                Ok(false) => {}
                Err(e) => warn!(fingerprint, error = %format!("{e:#}"), "could not query key store"),
            }

            info!(fingerprint, keyserver, "[acquire] importing trusted key");
            if let Err(e) = self.import(keyserver, fingerprint) {
                warn!(fingerprint, error = %format!("{e:#}"), "could not import trusted key; continuing");
                missing.push(fingerprint);
            }
        }
        missing
    }

    /// Verify a clearsigned file and return the text covered by the
    /// signature. Any non-success is fatal.
    ///
    /// Only what gpg writes out is signed; text around the armor in the file
    /// itself is not, so callers must parse the returned text rather than the
    /// file.
    pub fn verify(&self, signed: &Path) -> Result<String> {
        let result = self
            .gpg()
            .args(["--output", "-", "--decrypt"])
            .arg_path(signed)
            .error_msg(format!(
                "signature verification failed for {}",
                signed.display()
            ))
            .run()?;
        Ok(result.stdout)
    }
}
