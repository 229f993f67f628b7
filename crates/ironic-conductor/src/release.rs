//! OpenStack release detection from installed package versions.

use tracing::debug;

/// Package whose version identifies the installed release.
pub const RELEASE_PACKAGE: &str = "ironic-common";

/// Release assumed when the package version is unknown.
pub const DEFAULT_RELEASE: &str = "train";

/// `ironic-common` major version → OpenStack codename.
const PACKAGE_CODENAMES: [(&str, &str); 3] = [("13", "train"), ("15", "ussuri"), ("16", "victoria")];

/// Codename for a Debian package version such as `1:15.0.0-0ubuntu1`.
#[must_use]
pub fn codename_for_version(version: &str) -> Option<&'static str> {
    let version = version.trim();
    let upstream = version.split_once(':').map_or(version, |(_, rest)| rest);
    let major = upstream.split('.').next()?;
    PACKAGE_CODENAMES
        .iter()
        .find(|(m, _)| *m == major)
        .map(|(_, codename)| *codename)
}

/// Release to configure for, given the installed package version.
#[must_use]
pub fn select_release(package_version: Option<&str>) -> &'static str {
    match package_version.and_then(codename_for_version) {
        Some(codename) => codename,
        None => {
            debug!(
                package = RELEASE_PACKAGE,
                version = ?package_version,
                default = DEFAULT_RELEASE,
                "Unrecognised package version, using default release"
            );
            DEFAULT_RELEASE
        }
    }
}
