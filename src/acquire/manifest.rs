//! Checksum manifest parsing.
//!
//! Mirrors publish a (usually clearsigned) list of SHA-256 digests. Both the
//! GNU coreutils layout (`<hex>  <name>`, optionally `*<name>` for binary
//! mode) and the BSD layout (`SHA256 (<name>) = <hex>`) are accepted.
//!
//! Clearsigned input is read strictly: only the signed body yields entries,
//! and anything other than blank lines outside the armor is an error.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

const SIGNED_MESSAGE_HEADER: &str = "-----BEGIN PGP SIGNED MESSAGE-----";
const SIGNATURE_HEADER: &str = "-----BEGIN PGP SIGNATURE-----";
const SIGNATURE_FOOTER: &str = "-----END PGP SIGNATURE-----";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub file_name: String,
    pub digest: String,
}

#[derive(Debug, Clone, Default)]
pub struct ChecksumManifest {
    entries: Vec<ManifestEntry>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Armor {
    Before,
    Headers,
    Body,
    Signature,
    After,
}

impl ChecksumManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading checksum manifest {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing checksum manifest {}", path.display()))
    }

    /// Parse manifest text. Plain text is read line by line; clearsigned text
    /// contributes only the lines between the armor headers and the
    /// signature.
    pub fn parse(text: &str) -> Result<Self> {
        let lines = if text.lines().any(|l| l.trim_end() == SIGNED_MESSAGE_HEADER) {
            signed_body(text)?
        } else {
            text.lines().map(str::trim).collect()
        };

        let entries = lines
            .into_iter()
            .filter_map(|line| parse_bsd(line).or_else(|| parse_gnu(line)))
            .collect();
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// Digest listed for exactly `file_name`.
    pub fn digest_for(&self, file_name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.file_name == file_name)
            .map(|e| e.digest.as_str())
    }

    /// Digest for the ISO `iso_name`, matched on its base name (final
    /// extension stripped). An exact file name match wins over a base-name
    /// match.
    pub fn digest_for_base_name(&self, iso_name: &str) -> Option<&str> {
        let stem = base_name(iso_name);
        self.digest_for(iso_name).or_else(|| {
            self.entries
                .iter()
                .find(|e| base_name(&e.file_name) == stem)
                .map(|e| e.digest.as_str())
        })
    }
}

/// Body lines of a single clearsigned message, dash-escaping removed.
fn signed_body(text: &str) -> Result<Vec<&str>> {
    let mut state = Armor::Before;
    let mut body = Vec::new();

    for (n, raw) in text.lines().enumerate() {
        let line = raw.trim_end();
        state = match state {
            Armor::Before if line == SIGNED_MESSAGE_HEADER => Armor::Headers,
            Armor::Before if line.trim().is_empty() => Armor::Before,
            Armor::Before => bail!("unsigned content before the signed block (line {})", n + 1),
            Armor::Headers if line.is_empty() => Armor::Body,
            Armor::Headers => Armor::Headers,
            Armor::Body if line == SIGNATURE_HEADER => Armor::Signature,
            Armor::Body if line == SIGNED_MESSAGE_HEADER => {
                bail!("more than one signed block (line {})", n + 1)
            }
            Armor::Body => {
                body.push(line.strip_prefix("- ").unwrap_or(line).trim());
                Armor::Body
            }
            Armor::Signature if line == SIGNATURE_FOOTER => Armor::After,
            Armor::Signature => Armor::Signature,
            Armor::After if line.trim().is_empty() => Armor::After,
            Armor::After => bail!("unsigned content after the signature (line {})", n + 1),
        };
    }

    if state != Armor::After {
        bail!("truncated signed block");
    }
    Ok(body)
}

/// File name with its final extension removed (`a.b.iso` -> `a.b`).
pub fn base_name(file_name: &str) -> &str {
    match file_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => file_name,
    }
}

fn is_sha256_hex(s: &str) -> bool {
    s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

fn parse_gnu(line: &str) -> Option<ManifestEntry> {
    let (digest, rest) = line.split_once(char::is_whitespace)?;
    if !is_sha256_hex(digest) {
        return None;
    }
    let name = rest.trim_start();
    let name = name.strip_prefix('*').unwrap_or(name);
    if name.is_empty() {
        return None;
    }
    Some(ManifestEntry {
        file_name: name.to_string(),
        digest: digest.to_ascii_lowercase(),
    })
}

fn parse_bsd(line: &str) -> Option<ManifestEntry> {
    let rest = line.strip_prefix("SHA256 (")?;
    let (name, digest) = rest.rsplit_once(") = ")?;
    let digest = digest.trim();
    if !is_sha256_hex(digest) || name.is_empty() {
        return None;
    }
    Some(ManifestEntry {
        file_name: name.to_string(),
        digest: digest.to_ascii_lowercase(),
    })
}
