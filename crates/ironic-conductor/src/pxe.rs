//! PXE/iPXE boot service layout.
//!
//! Describes where `tftpd-hpa` and `nginx` serve boot files from, which
//! packages provide the boot binaries, and copies those binaries into the
//! TFTP root.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use crate::error::CharmError;

/// Service account owning the boot roots.
pub const IRONIC_USER: &str = "ironic";
pub const IRONIC_GROUP: &str = "ironic";

pub const TFTPD_SERVICE: &str = "tftpd-hpa";
pub const HTTPD_SERVICE: &str = "nginx";

const BOOT_PACKAGES: [&str; 5] = [
    "syslinux-common",
    "pxelinux",
    "grub-efi-amd64-signed",
    "shim-signed",
    "ipxe",
];
const TFTP_PACKAGES: [&str; 1] = ["tftpd-hpa"];
const HTTPD_PACKAGES: [&str; 1] = ["nginx"];

/// Boot binary source → file name under the TFTP root.
const BOOT_FILES: [(&str, &str); 7] = [
    ("/usr/lib/PXELINUX/pxelinux.0", "pxelinux.0"),
    ("/usr/lib/syslinux/modules/bios/chain.c32", "chain.c32"),
    ("/usr/lib/syslinux/modules/bios/ldlinux.c32", "ldlinux.c32"),
    (
        "/usr/lib/grub/x86_64-efi-signed/grubnetx64.efi.signed",
        "grubx64.efi",
    ),
    ("/usr/lib/shim/shimx64.efi.signed", "bootx64.efi"),
    ("/usr/lib/ipxe/undionly.kpxe", "undionly.kpxe"),
    ("/usr/lib/ipxe/ipxe.efi", "ipxe.efi"),
];

/// Owner applied recursively to the boot roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ownership {
    /// Owning user.
    pub user: String,
    /// Owning group.
    pub group: String,
}

impl Default for Ownership {
    fn default() -> Self {
        Self {
            user: IRONIC_USER.to_string(),
            group: IRONIC_GROUP.to_string(),
        }
    }
}

/// Filesystem layout of the boot services.
#[derive(Debug, Clone)]
pub struct PxeBootLayout {
    pub tftp_root: PathBuf,
    pub http_root: PathBuf,
    pub tftp_config: PathBuf,
    pub http_server_config: PathBuf,
    files: Vec<(PathBuf, String)>,
    ownership: Option<Ownership>,
}

impl Default for PxeBootLayout {
    fn default() -> Self {
        Self {
            tftp_root: PathBuf::from("/tftpboot"),
            http_root: PathBuf::from("/httpboot"),
            tftp_config: PathBuf::from("/etc/default/tftpd-hpa"),
            http_server_config: PathBuf::from("/etc/nginx/nginx.conf"),
            files: BOOT_FILES
                .iter()
                .map(|(src, dest)| (PathBuf::from(src), (*dest).to_string()))
                .collect(),
            ownership: Some(Ownership::default()),
        }
    }
}

impl PxeBootLayout {
    /// Serve boot files from other roots.
    #[must_use]
    pub fn with_roots(
        mut self,
        tftp_root: impl Into<PathBuf>,
        http_root: impl Into<PathBuf>,
    ) -> Self {
        self.tftp_root = tftp_root.into();
        self.http_root = http_root.into();
        self
    }

    /// Replace the boot binaries to install.
    #[must_use]
    pub fn with_files<I, P, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = (P, S)>,
        P: Into<PathBuf>,
        S: Into<String>,
    {
        self.files = files
            .into_iter()
            .map(|(src, dest)| (src.into(), dest.into()))
            .collect();
        self
    }

    /// Hand the boot roots to another account.
    #[must_use]
    pub fn with_ownership(mut self, user: impl Into<String>, group: impl Into<String>) -> Self {
        self.ownership = Some(Ownership {
            user: user.into(),
            group: group.into(),
        });
        self
    }

    /// Owner applied to the boot roots, if any.
    #[must_use]
    pub fn ownership(&self) -> Option<&Ownership> {
        self.ownership.as_ref()
    }

    /// Leave ownership of the boot roots untouched.
    #[must_use]
    pub fn without_ownership(mut self) -> Self {
        self.ownership = None;
        self
    }

    #[must_use]
    pub fn grub_dir(&self) -> PathBuf {
        self.tftp_root.join("grub")
    }

    #[must_use]
    pub fn grub_config(&self) -> PathBuf {
        self.grub_dir().join("grub.cfg")
    }

    #[must_use]
    pub fn map_file(&self) -> PathBuf {
        self.tftp_root.join("map-file")
    }

    /// Boot binaries as (source, destination) pairs.
    pub fn files(&self) -> impl Iterator<Item = (&Path, PathBuf)> {
        self.files
            .iter()
            .map(|(src, dest)| (src.as_path(), self.tftp_root.join(dest)))
    }

    /// Packages providing the boot binaries and services.
    #[must_use]
    pub fn packages(&self) -> Vec<&'static str> {
        BOOT_PACKAGES
            .iter()
            .chain(TFTP_PACKAGES.iter())
            .chain(HTTPD_PACKAGES.iter())
            .copied()
            .collect()
    }

    #[must_use]
    pub fn services(&self) -> Vec<&'static str> {
        vec![TFTPD_SERVICE, HTTPD_SERVICE]
    }

    /// Configuration file → services to restart when it changes.
    #[must_use]
    pub fn restart_map(&self) -> BTreeMap<PathBuf, Vec<String>> {
        let tftpd = || vec![TFTPD_SERVICE.to_string()];
        BTreeMap::from([
            (self.tftp_config.clone(), tftpd()),
            (self.map_file(), tftpd()),
            (self.grub_config(), tftpd()),
            (self.http_server_config.clone(), vec![HTTPD_SERVICE.to_string()]),
        ])
    }

    /// Create the TFTP, HTTP and grub directories and hand the roots to
    /// the service account.
    ///
    /// # Errors
    /// Returns an error if a directory cannot be created or chowned.
    pub fn ensure_folders(&self) -> Result<(), CharmError> {
        for dir in [self.tftp_root.clone(), self.http_root.clone(), self.grub_dir()] {
            if !dir.is_dir() {
                debug!(path = %dir.display(), "Creating directory");
                std::fs::create_dir_all(&dir).map_err(|source| CharmError::Io {
                    path: dir.clone(),
                    source,
                })?;
            }
        }
        self.chown(&self.tftp_root)?;
        self.chown(&self.http_root)
    }

    /// Copy the boot binaries into the TFTP root.
    ///
    /// # Errors
    /// Returns [`CharmError::MissingResource`] for the first binary not on
    /// disk, or an I/O error if copying fails.
    pub fn copy_resources(&self) -> Result<(), CharmError> {
        self.ensure_folders()?;
        for (src, dest) in self.files() {
            if !src.is_file() {
                return Err(CharmError::MissingResource(src.to_path_buf()));
            }
            // fs::copy follows symlinks on the source.
            std::fs::copy(src, &dest).map_err(|source| CharmError::Io {
                path: dest.clone(),
                source,
            })?;
            debug!(src = %src.display(), dest = %dest.display(), "Copied boot file");
        }
        self.chown(&self.tftp_root)?;
        info!(tftp_root = %self.tftp_root.display(), "Boot resources installed");
        Ok(())
    }

    fn chown(&self, path: &Path) -> Result<(), CharmError> {
        let Some(owner) = &self.ownership else {
            return Ok(());
        };
        let owner_arg = format!("{}:{}", owner.user, owner.group);
        let output = Command::new("chown")
            .arg("-R")
            .arg(&owner_arg)
            .arg(path)
            .output()
            .map_err(|source| CharmError::Io {
                path: path.to_path_buf(),
                source,
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(CharmError::Command {
                command: format!("chown -R {owner_arg} {}", path.display()),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let layout = PxeBootLayout::default();
        assert_eq!(layout.grub_config(), PathBuf::from("/tftpboot/grub/grub.cfg"));
        assert_eq!(layout.map_file(), PathBuf::from("/tftpboot/map-file"));
        assert_eq!(layout.files().count(), 7);
        assert!(layout
            .files()
            .any(|(_, dest)| dest == Path::new("/tftpboot/bootx64.efi")));
    }

    #[test]
    fn test_ownership_builders() {
        let layout = PxeBootLayout::default();
        assert_eq!(layout.ownership(), Some(&Ownership::default()));

        let layout = layout.with_ownership("tftp", "nogroup");
        assert_eq!(
            layout.ownership(),
            Some(&Ownership {
                user: "tftp".to_string(),
                group: "nogroup".to_string(),
            })
        );
        assert!(layout.without_ownership().ownership().is_none());
    }

    #[test]
    fn test_packages_include_services() {
        let packages = PxeBootLayout::default().packages();
        assert_eq!(packages.first(), Some(&"syslinux-common"));
        assert!(packages.contains(&"tftpd-hpa"));
        assert!(packages.contains(&"nginx"));
    }

    #[test]
    fn test_restart_map() {
        let map = PxeBootLayout::default().restart_map();
        assert_eq!(
            map.get(Path::new("/etc/nginx/nginx.conf")),
            Some(&vec!["nginx".to_string()])
        );
        assert_eq!(
            map.get(Path::new("/tftpboot/grub/grub.cfg")),
            Some(&vec!["tftpd-hpa".to_string()])
        );
        assert_eq!(map.len(), 4);
    }

    #[test]
    fn test_ensure_folders_creates_tree() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = PxeBootLayout::default()
            .with_roots(tmp.path().join("tftp"), tmp.path().join("http"))
            .without_ownership();
        layout.ensure_folders().unwrap();
        assert!(tmp.path().join("tftp/grub").is_dir());
        assert!(tmp.path().join("http").is_dir());
        // Idempotent.
        layout.ensure_folders().unwrap();
    }

    #[test]
    fn test_copy_resources_missing_file() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("missing.efi");
        let layout = PxeBootLayout::default()
            .with_roots(tmp.path().join("tftp"), tmp.path().join("http"))
            .with_files([(missing.clone(), "ipxe.efi")])
            .without_ownership();
        match layout.copy_resources() {
            Err(CharmError::MissingResource(path)) => assert_eq!(path, missing),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_copy_resources() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("undionly.kpxe.src");
        std::fs::write(&src, b"kpxe").unwrap();
        let layout = PxeBootLayout::default()
            .with_roots(tmp.path().join("tftp"), tmp.path().join("http"))
            .with_files([(src, "undionly.kpxe")])
            .without_ownership();
        layout.copy_resources().unwrap();
        assert_eq!(
            std::fs::read(tmp.path().join("tftp/undionly.kpxe")).unwrap(),
            b"kpxe"
        );
    }
}
