//! Hardware type catalog.
//!
//! Every supported OpenStack release carries a table of the Ironic hardware
//! types the conductor can enable, the packages each one pulls in, and the
//! driver interfaces it contributes to each interface category of
//! `ironic.conf`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// OpenStack releases with a catalog entry, oldest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Release {
    /// OpenStack Train (Ironic 13.x).
    Train,
    /// OpenStack Ussuri (Ironic 15.x).
    Ussuri,
}

impl Release {
    /// All catalogued releases in ascending order.
    pub const ALL: [Self; 2] = [Self::Train, Self::Ussuri];

    /// Parse a release codename.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "train" => Some(Self::Train),
            "ussuri" => Some(Self::Ussuri),
            _ => None,
        }
    }

    /// Release codename.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Ussuri => "ussuri",
        }
    }
}

impl fmt::Display for Release {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ironic hardware types known to the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HardwareType {
    /// Generic IPMI (and Intel IPMI) servers.
    Ipmi,
    /// DMTF Redfish compliant BMCs.
    Redfish,
    /// Dell iDRAC.
    Idrac,
}

impl HardwareType {
    /// All hardware types.
    pub const ALL: [Self; 3] = [Self::Ipmi, Self::Redfish, Self::Idrac];

    /// Parse a hardware type name as written in `enabled-hw-types`.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "ipmi" => Some(Self::Ipmi),
            "redfish" => Some(Self::Redfish),
            "idrac" => Some(Self::Idrac),
            _ => None,
        }
    }

    /// Hardware type name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ipmi => "ipmi",
            Self::Redfish => "redfish",
            Self::Idrac => "idrac",
        }
    }
}

impl fmt::Display for HardwareType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One axis of pluggable driver behaviour in `ironic.conf`.
///
/// Serializes to the configuration key the category renders into, so a
/// `BTreeMap<InterfaceCategory, String>` can be handed straight to a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum InterfaceCategory {
    #[serde(rename = "enabled_hardware_types")]
    HardwareTypes,
    #[serde(rename = "enabled_management_interfaces")]
    Management,
    #[serde(rename = "enabled_inspect_interfaces")]
    Inspect,
    #[serde(rename = "enabled_power_interfaces")]
    Power,
    #[serde(rename = "enabled_console_interfaces")]
    Console,
    #[serde(rename = "enabled_raid_interfaces")]
    Raid,
    #[serde(rename = "enabled_vendor_interfaces")]
    Vendor,
    #[serde(rename = "enabled_boot_interfaces")]
    Boot,
    #[serde(rename = "enabled_bios_interfaces")]
    Bios,
}

impl InterfaceCategory {
    /// All categories in rendering order.
    pub const ALL: [Self; 9] = [
        Self::HardwareTypes,
        Self::Management,
        Self::Inspect,
        Self::Power,
        Self::Console,
        Self::Raid,
        Self::Vendor,
        Self::Boot,
        Self::Bios,
    ];

    /// Configuration key this category renders into.
    #[must_use]
    pub fn config_key(&self) -> &'static str {
        match self {
            Self::HardwareTypes => "enabled_hardware_types",
            Self::Management => "enabled_management_interfaces",
            Self::Inspect => "enabled_inspect_interfaces",
            Self::Power => "enabled_power_interfaces",
            Self::Console => "enabled_console_interfaces",
            Self::Raid => "enabled_raid_interfaces",
            Self::Vendor => "enabled_vendor_interfaces",
            Self::Boot => "enabled_boot_interfaces",
            Self::Bios => "enabled_bios_interfaces",
        }
    }

    /// Interface that keeps a node valid when its hardware type lacks the
    /// capability. Always rendered last.
    #[must_use]
    pub fn fallback(&self) -> Option<&'static str> {
        match self {
            Self::Management => Some("noop"),
            Self::Inspect => Some("no-inspect"),
            Self::Console => Some("no-console"),
            Self::Raid => Some("no-raid"),
            Self::Vendor => Some("no-vendor"),
            Self::Bios => Some("no-bios"),
            Self::HardwareTypes | Self::Power | Self::Boot => None,
        }
    }
}

impl fmt::Display for InterfaceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.config_key())
    }
}

/// What one hardware type needs and contributes in one release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardwareTypeEntry {
    /// Packages required by the hardware type's drivers.
    pub needed_packages: &'static [&'static str],
    pub hardware_types: &'static [&'static str],
    pub management: &'static [&'static str],
    pub inspect: &'static [&'static str],
    pub power: &'static [&'static str],
    pub console: &'static [&'static str],
    pub raid: &'static [&'static str],
    pub vendor: &'static [&'static str],
    pub boot: &'static [&'static str],
    pub bios: &'static [&'static str],
}

impl HardwareTypeEntry {
    /// Interfaces this hardware type contributes to `category`.
    #[must_use]
    pub fn interfaces(&self, category: InterfaceCategory) -> &'static [&'static str] {
        match category {
            InterfaceCategory::HardwareTypes => self.hardware_types,
            InterfaceCategory::Management => self.management,
            InterfaceCategory::Inspect => self.inspect,
            InterfaceCategory::Power => self.power,
            InterfaceCategory::Console => self.console,
            InterfaceCategory::Raid => self.raid,
            InterfaceCategory::Vendor => self.vendor,
            InterfaceCategory::Boot => self.boot,
            InterfaceCategory::Bios => self.bios,
        }
    }
}

const IPMI_TRAIN: HardwareTypeEntry = HardwareTypeEntry {
    needed_packages: &["ipmitool", "shellinabox", "socat"],
    hardware_types: &["ipmi", "intel-ipmi"],
    management: &["ipmitool", "intel-ipmitool"],
    inspect: &[],
    power: &["ipmitool"],
    console: &["ipmitool-socat", "ipmitool-shellinabox"],
    raid: &["agent"],
    vendor: &["ipmitool"],
    boot: &["pxe"],
    bios: &[],
};

const REDFISH_TRAIN: HardwareTypeEntry = HardwareTypeEntry {
    needed_packages: &["python3-sushy"],
    hardware_types: &["redfish"],
    management: &["redfish"],
    inspect: &["redfish"],
    power: &["redfish"],
    console: &[],
    raid: &[],
    vendor: &[],
    boot: &["pxe"],
    bios: &[],
};

const IDRAC_TRAIN: HardwareTypeEntry = HardwareTypeEntry {
    needed_packages: &["python3-dracclient", "python3-sushy"],
    hardware_types: &["idrac"],
    management: &["idrac-redfish", "idrac-wsman"],
    inspect: &["idrac-redfish", "idrac-wsman"],
    power: &["idrac-redfish", "idrac-wsman"],
    console: &[],
    raid: &["idrac-wsman"],
    vendor: &["idrac-wsman"],
    boot: &["pxe"],
    bios: &[],
};

// Ussuri adds Redfish virtual media boot and iDRAC BIOS settings.
const REDFISH_USSURI: HardwareTypeEntry = HardwareTypeEntry {
    boot: &["pxe", "redfish-virtual-media"],
    ..REDFISH_TRAIN
};

const IDRAC_USSURI: HardwareTypeEntry = HardwareTypeEntry {
    bios: &["idrac-wsman"],
    ..IDRAC_TRAIN
};

/// Built-in table. Exhaustive over both enums so a new release or hardware
/// type cannot be added without deciding what it contributes.
fn builtin_entry(release: Release, hw_type: HardwareType) -> Option<HardwareTypeEntry> {
    match (release, hw_type) {
        (Release::Train | Release::Ussuri, HardwareType::Ipmi) => Some(IPMI_TRAIN),
        (Release::Train, HardwareType::Redfish) => Some(REDFISH_TRAIN),
        (Release::Train, HardwareType::Idrac) => Some(IDRAC_TRAIN),
        (Release::Ussuri, HardwareType::Redfish) => Some(REDFISH_USSURI),
        (Release::Ussuri, HardwareType::Idrac) => Some(IDRAC_USSURI),
    }
}

static NO_ENTRIES: BTreeMap<HardwareType, HardwareTypeEntry> = BTreeMap::new();

/// Release → hardware type → entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceCatalog {
    releases: BTreeMap<Release, BTreeMap<HardwareType, HardwareTypeEntry>>,
}

impl Default for InterfaceCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl InterfaceCatalog {
    /// Catalog compiled into the charm.
    #[must_use]
    pub fn builtin() -> Self {
        let mut catalog = Self::empty();
        for release in Release::ALL {
            for hw_type in HardwareType::ALL {
                if let Some(entry) = builtin_entry(release, hw_type) {
                    catalog = catalog.with_entry(release, hw_type, entry);
                }
            }
        }
        catalog
    }

    /// A catalog without any release.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            releases: BTreeMap::new(),
        }
    }

    /// Add or replace one entry.
    #[must_use]
    pub fn with_entry(
        mut self,
        release: Release,
        hw_type: HardwareType,
        entry: HardwareTypeEntry,
    ) -> Self {
        self.releases
            .entry(release)
            .or_default()
            .insert(hw_type, entry);
        self
    }

    /// Newest release in the catalog.
    #[must_use]
    pub fn latest_release(&self) -> Option<Release> {
        self.releases.keys().next_back().copied()
    }

    /// Release whose table serves `release`.
    ///
    /// An exact match wins. Anything else, including codenames newer than
    /// the charm knows about, degrades to the newest catalogued release.
    #[must_use]
    pub fn effective_release(&self, release: &str) -> Option<Release> {
        Release::from_name(release)
            .filter(|r| self.releases.contains_key(r))
            .or_else(|| self.latest_release())
    }

    /// Hardware type table for `release`, falling back to the newest release.
    #[must_use]
    pub fn release_entries(&self, release: &str) -> &BTreeMap<HardwareType, HardwareTypeEntry> {
        self.effective_release(release)
            .and_then(|r| self.releases.get(&r))
            .unwrap_or(&NO_ENTRIES)
    }

    /// Entry for a hardware type name, if the effective release supports it.
    #[must_use]
    pub fn lookup(&self, release: &str, hw_type: &str) -> Option<&HardwareTypeEntry> {
        let hw_type = HardwareType::from_name(hw_type)?;
        self.release_entries(release).get(&hw_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_covers_every_release() {
        let catalog = InterfaceCatalog::builtin();
        for release in Release::ALL {
            assert_eq!(
                catalog.release_entries(release.as_str()).len(),
                HardwareType::ALL.len()
            );
        }
    }

    #[test]
    fn test_unknown_release_uses_latest() {
        let catalog = InterfaceCatalog::builtin();
        assert_eq!(catalog.effective_release("zed"), Some(Release::Ussuri));
        assert_eq!(
            catalog.release_entries("zed"),
            catalog.release_entries("ussuri")
        );
    }

    #[test]
    fn test_latest_follows_catalog_contents() {
        let catalog =
            InterfaceCatalog::empty().with_entry(Release::Train, HardwareType::Ipmi, IPMI_TRAIN);
        assert_eq!(catalog.effective_release("ussuri"), Some(Release::Train));
        assert!(catalog.lookup("ussuri", "redfish").is_none());
        assert!(catalog.lookup("ussuri", "ipmi").is_some());
    }

    #[test]
    fn test_empty_catalog_has_no_entries() {
        let catalog = InterfaceCatalog::empty();
        assert_eq!(catalog.effective_release("train"), None);
        assert!(catalog.release_entries("train").is_empty());
    }

    #[test]
    fn test_lookup_unknown_hardware_type() {
        let catalog = InterfaceCatalog::builtin();
        assert!(catalog.lookup("train", "ilo").is_none());
        assert!(catalog.lookup("train", "IPMI").is_none());
    }

    #[test]
    fn test_ussuri_differences() {
        let catalog = InterfaceCatalog::builtin();
        let redfish = catalog.lookup("ussuri", "redfish").copied();
        assert_eq!(
            redfish.map(|e| e.boot),
            Some(&["pxe", "redfish-virtual-media"][..])
        );
        let idrac = catalog.lookup("train", "idrac").copied();
        assert_eq!(idrac.map(|e| e.bios.len()), Some(0));
    }

    #[test]
    fn test_category_keys_and_fallbacks() {
        assert_eq!(
            InterfaceCategory::Console.config_key(),
            "enabled_console_interfaces"
        );
        assert_eq!(InterfaceCategory::Management.fallback(), Some("noop"));
        assert_eq!(InterfaceCategory::Boot.fallback(), None);
        assert_eq!(
            serde_json::to_string(&InterfaceCategory::Bios).unwrap(),
            "\"enabled_bios_interfaces\""
        );
    }
}
