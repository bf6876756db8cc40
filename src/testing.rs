//! Fake host tools for tests.
//!
//! Each [`FakeHost`] owns a temp directory holding shell-script stand-ins for
//! curl, gpg, git, mount, umount, mountpoint, mkisofs and implantisomd5, a
//! local "mirror" directory, and the input files a run needs. The fake tools
//! log their invocations under `state/` so tests can assert on them.
//!
//! The fake "ISO" is a tar archive: `mount` extracts it into the mount point,
//! `umount` empties the mount point again, and `mkisofs` tars the layout.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

use crate::acquire::checksum::sha256_file;
use crate::config::{PipelineConfig, Tools};

pub(crate) const ISO_NAME: &str = "CentOS-7-x86_64-NetInstall-2009.iso";
pub(crate) const MANIFEST_NAME: &str = "sha256sum.txt.asc";
pub(crate) const MIRROR_URL: &str = "http://mirror.test/centos/7/isos/x86_64";

pub(crate) struct FakeHost {
    pub temp: TempDir,
}

impl FakeHost {
    pub fn new() -> Self {
        let host = Self {
            temp: TempDir::new().unwrap(),
        };
        for dir in ["bin", "state", "mirror", "inputs/guest-tools", "cache"] {
            fs::create_dir_all(host.root().join(dir)).unwrap();
        }
        fs::write(
            host.root().join("inputs/ks.cfg"),
            "install\ntext\nreboot\n",
        )
        .unwrap();
        fs::write(
            host.root().join("inputs/isolinux.cfg"),
            "default ks\nlabel ks\n  append inst.ks=cdrom:/ks.cfg\n",
        )
        .unwrap();
        fs::write(
            host.root().join("inputs/guest-tools/install-tools.sh"),
            "#!/bin/sh\necho installing guest tools\n",
        )
        .unwrap();
        host.write_tools();
        host
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn state(&self) -> PathBuf {
        self.root().join("state")
    }

    pub fn mirror(&self) -> PathBuf {
        self.root().join("mirror")
    }

    pub fn tools(&self) -> Tools {
        let bin = self.root().join("bin");
        Tools {
            curl: bin.join("curl"),
            gpg: bin.join("gpg"),
            git: bin.join("git"),
            mount: bin.join("mount"),
            umount: bin.join("umount"),
            mountpoint: bin.join("mountpoint"),
            mkisofs: bin.join("mkisofs"),
            implantisomd5: bin.join("implantisomd5"),
        }
    }

    pub fn config(&self) -> PipelineConfig {
        let root = self.root();
        PipelineConfig {
            mirror: MIRROR_URL.to_string(),
            iso_name: ISO_NAME.to_string(),
            checksum_name: MANIFEST_NAME.to_string(),
            cache_dir: root.join("cache"),
            mount_point: root.join("mnt"),
            layout_dir: root.join("work/dvd-layout"),
            output: root.join("out/custom.iso"),
            kickstart: root.join("inputs/ks.cfg"),
            boot_menu: root.join("inputs/isolinux.cfg"),
            guest_tools: root.join("inputs/guest-tools"),
            volume_label: "CentOS 7 x86_64".to_string(),
            keyserver: "hkps://keys.example".to_string(),
            gnupg_home: None,
            require_root: false,
            tools: self.tools(),
        }
    }

    /// Build a fake ISO (tar) at `dest` from `(relative path, contents)` pairs.
    pub fn make_iso(&self, dest: &Path, files: &[(&str, &str)]) {
        let staging = TempDir::new_in(self.root()).unwrap();
        for (rel, contents) in files {
            let path = staging.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, contents).unwrap();
        }
        let status = Command::new("tar")
            .arg("-cf")
            .arg(dest)
            .arg("-C")
            .arg(staging.path())
            .arg(".")
            .status()
            .unwrap();
        assert!(status.success(), "tar failed building fake ISO");
    }

    /// Publish an ISO on the mirror under the default name.
    pub fn publish_iso(&self, files: &[(&str, &str)]) {
        self.make_iso(&self.mirror().join(ISO_NAME), files);
    }

    /// Publish a clearsigned manifest with the given `(file name, digest)` lines.
    pub fn publish_manifest(&self, entries: &[(&str, &str)]) {
        let mut text = String::from("-----BEGIN PGP SIGNED MESSAGE-----\nHash: SHA256\n\n");
        for (name, digest) in entries {
            text.push_str(&format!("{digest}  {name}\n"));
        }
        text.push_str("-----BEGIN PGP SIGNATURE-----\n\niQIcBAEBAgAGBQJfake\n=abcd\n-----END PGP SIGNATURE-----\n");
        fs::write(self.mirror().join(MANIFEST_NAME), text).unwrap();
    }

    /// Publish a manifest whose entry matches the ISO currently on the mirror.
    pub fn publish_matching_manifest(&self) {
        let digest = sha256_file(&self.mirror().join(ISO_NAME)).unwrap();
        self.publish_manifest(&[
            ("CentOS-7-x86_64-DVD-2009.iso", &"0".repeat(64)),
            (ISO_NAME, &digest),
        ]);
    }

    pub fn standard_iso_files() -> Vec<(&'static str, &'static str)> {
        vec![
            ("isolinux/isolinux.bin", "isolinux boot image"),
            ("isolinux/isolinux.cfg", "default linux\n"),
            ("isolinux/TRANS.TBL", "F isolinux.bin\n"),
            ("images/pxeboot/vmlinuz", "kernel"),
            ("images/pxeboot/TRANS.TBL", "F vmlinuz\n"),
            ("TRANS.TBL", "D images\n"),
            (".treeinfo", "[general]\nfamily = CentOS\n"),
        ]
    }

    /// Mirror with the standard ISO and a matching signed manifest.
    pub fn with_standard_mirror() -> Self {
        let host = Self::new();
        host.publish_iso(&Self::standard_iso_files());
        host.publish_matching_manifest();
        host
    }

    pub fn fail_signature(&self) {
        fs::write(self.state().join("bad-signature"), "").unwrap();
    }

    pub fn keyserver_down(&self) {
        fs::write(self.state().join("keyserver-down"), "").unwrap();
    }

    /// Pretend `target` is still mounted from an earlier, crashed run.
    pub fn leave_stale_mount(&self, target: &Path) {
        fs::create_dir_all(target).unwrap();
        fs::write(target.join("stale-file"), "left behind").unwrap();
        fs::write(self.state().join("mounted"), target.as_os_str().as_encoded_bytes()).unwrap();
    }

    pub fn is_mounted(&self) -> bool {
        self.state().join("mounted").exists()
    }

    /// Lines logged by one fake tool.
    pub fn log(&self, tool: &str) -> Vec<String> {
        fs::read_to_string(self.state().join(format!("{tool}.log")))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn iso_downloads(&self) -> usize {
        self.log("curl")
            .iter()
            .filter(|url| url.ends_with(ISO_NAME))
            .count()
    }

    /// Member names of a fake ISO produced by the fake mkisofs.
    pub fn iso_members(&self, iso: &Path) -> Vec<String> {
        let output = Command::new("tar").arg("-tf").arg(iso).output().unwrap();
        assert!(output.status.success(), "tar -tf failed");
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(|l| l.trim_start_matches("./").trim_end_matches('/').to_string())
            .filter(|l| !l.is_empty() && l != ".")
            .collect()
    }

    fn write_tools(&self) {
        let state = self.state();
        let state = state.display();
        let mirror = self.mirror();
        let mirror = mirror.display();

        self.write_script(
            "curl",
            &format!(
                r#"out=""; url=""
while [ $# -gt 0 ]; do
  case "$1" in
    --output|-o) out="$2"; shift 2 ;;
    -*) shift ;;
    *) url="$1"; shift ;;
  esac
done
echo "$url" >> "{state}/curl.log"
name="${{url##*/}}"
if [ ! -f "{mirror}/$name" ]; then
  echo "curl: (22) The requested URL returned error: 404" >&2
  exit 22
fi
cp "{mirror}/$name" "$out"
"#
            ),
        );

        self.write_script(
            "gpg",
            &format!(
                r#"echo "$*" >> "{state}/gpg.log"
for a in "$@"; do last="$a"; done
for a in "$@"; do
  case "$a" in
    --list-keys) [ -f "{state}/keys-present" ] && exit 0; exit 2 ;;
    --recv-keys) [ -f "{state}/keyserver-down" ] && exit 2; touch "{state}/keys-present"; exit 0 ;;
    --decrypt)
      [ -f "{state}/bad-signature" ] && {{ echo "gpg: BAD signature" >&2; exit 1; }}
      awk '/^-----BEGIN PGP SIGNED MESSAGE/ {{ s = 1; next }}
           s == 1 && /^$/ {{ s = 2; next }}
           /^-----BEGIN PGP SIGNATURE/ {{ s = 3 }}
           s == 2 {{ sub(/^- /, ""); print }}' "$last"
      exit 0 ;;
  esac
done
exit 0
"#
            ),
        );

        self.write_script(
            "git",
            &format!(
                r##"echo "$*" >> "{state}/git.log"
for a in "$@"; do dir="$a"; done
mkdir -p "$dir"
echo "#!/bin/sh" > "$dir/install-tools.sh"
"##
            ),
        );

        self.write_script(
            "mountpoint",
            &format!(
                r#"for a in "$@"; do target="$a"; done
if [ -f "{state}/mounted" ] && [ "$(cat "{state}/mounted")" = "$target" ]; then
  exit 0
fi
exit 32
"#
            ),
        );

        self.write_script(
            "mount",
            &format!(
                r#"image=""; target=""
while [ $# -gt 0 ]; do
  case "$1" in
    -o) shift 2 ;;
    *) if [ -z "$image" ]; then image="$1"; else target="$1"; fi; shift ;;
  esac
done
echo "mount $image $target" >> "{state}/mount.log"
if [ -f "{state}/mounted" ]; then
  echo "mount: $target: already mounted" >&2
  exit 32
fi
tar -xf "$image" -C "$target" || exit 32
printf '%s' "$target" > "{state}/mounted"
"#
            ),
        );

        self.write_script(
            "umount",
            &format!(
                r#"for a in "$@"; do target="$a"; done
echo "umount $target" >> "{state}/mount.log"
if [ ! -f "{state}/mounted" ] || [ "$(cat "{state}/mounted")" != "$target" ]; then
  echo "umount: $target: not mounted" >&2
  exit 32
fi
find "$target" -mindepth 1 -delete
rm -f "{state}/mounted"
"#
            ),
        );

        self.write_script(
            "mkisofs",
            &format!(
                r#"printf '%s\n' "$@" > "{state}/mkisofs.args"
pwd > "{state}/mkisofs.cwd"
out=""; exclude=""
while [ $# -gt 0 ]; do
  case "$1" in
    -o) out="$2"; shift 2 ;;
    -m) exclude="$2"; shift 2 ;;
    *) shift ;;
  esac
done
tar --exclude="./$exclude" -cf "$out" .
"#
            ),
        );

        self.write_script(
            "implantisomd5",
            &format!(
                r#"echo "$*" >> "{state}/implantisomd5.log"
for a in "$@"; do iso="$a"; done
[ -f "$iso" ]
"#
            ),
        );
    }

    fn write_script(&self, name: &str, body: &str) {
        let path = self.root().join("bin").join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    }
}
