//! Driver interface resolution.
//!
//! Turns the operator's `enabled-hw-types` list into the `enabled_*`
//! options of `ironic.conf` and the packages those drivers need.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::{debug, info};

use crate::catalog::{HardwareType, InterfaceCatalog, InterfaceCategory, Release};

/// Boot interface enabled by the `use-ipxe` option.
pub const IPXE_BOOT_INTERFACE: &str = "ipxe";

/// Rendered value of every interface category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ResolvedConfig {
    values: BTreeMap<InterfaceCategory, String>,
}

impl ResolvedConfig {
    /// Comma-joined value for `category`.
    #[must_use]
    pub fn get(&self, category: InterfaceCategory) -> &str {
        self.values.get(&category).map_or("", String::as_str)
    }

    /// Categories and values in rendering order.
    pub fn iter(&self) -> impl Iterator<Item = (InterfaceCategory, &str)> {
        self.values.iter().map(|(c, v)| (*c, v.as_str()))
    }

    /// Values keyed by their `ironic.conf` option name.
    #[must_use]
    pub fn to_context(&self) -> serde_json::Map<String, serde_json::Value> {
        self.iter()
            .map(|(category, value)| {
                (
                    category.config_key().to_string(),
                    serde_json::Value::String(value.to_string()),
                )
            })
            .collect()
    }
}

/// Output of one resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    /// Catalog release the values were taken from.
    pub release: Option<Release>,
    /// Interface options for `ironic.conf`.
    pub config: ResolvedConfig,
    /// Packages required by the enabled hardware types.
    pub packages: BTreeSet<String>,
}

/// Interfaces gathered for one category before rendering.
#[derive(Debug, Default)]
struct CategoryAccumulator {
    contributed: BTreeSet<&'static str>,
    extras: Vec<&'static str>,
}

impl CategoryAccumulator {
    fn extend(&mut self, interfaces: &[&'static str]) {
        self.contributed.extend(interfaces.iter().copied());
    }

    /// Feature-flag interface, rendered after the sorted contributions.
    fn push_extra(&mut self, interface: &'static str) {
        if !self.extras.contains(&interface) {
            self.extras.push(interface);
        }
    }

    fn render(&self, category: InterfaceCategory) -> String {
        let fallback = category.fallback();
        let mut values: Vec<&str> = self
            .contributed
            .iter()
            .copied()
            .filter(|v| Some(*v) != fallback)
            .collect();
        for extra in &self.extras {
            if Some(*extra) != fallback && !values.contains(extra) {
                values.push(*extra);
            }
        }
        values.extend(fallback);
        values.join(", ")
    }
}

/// Resolves hardware types against a catalog.
#[derive(Debug, Clone, Copy)]
pub struct ConfigResolver<'a> {
    catalog: &'a InterfaceCatalog,
}

impl<'a> ConfigResolver<'a> {
    /// Create a resolver over `catalog`.
    #[must_use]
    pub fn new(catalog: &'a InterfaceCatalog) -> Self {
        Self { catalog }
    }

    /// Resolve the interface options and packages for `hw_types`.
    ///
    /// Hardware types the release does not support are skipped; the
    /// validator reports them. Identical inputs always produce identical
    /// output.
    pub fn resolve<S: AsRef<str>>(
        &self,
        release: &str,
        hw_types: &[S],
        use_ipxe: bool,
    ) -> Resolution {
        let effective = self.catalog.effective_release(release);
        let entries = self.catalog.release_entries(release);

        let mut packages = BTreeSet::new();
        let mut accumulators: BTreeMap<InterfaceCategory, CategoryAccumulator> =
            InterfaceCategory::ALL
                .iter()
                .map(|c| (*c, CategoryAccumulator::default()))
                .collect();

        for name in hw_types {
            let name = name.as_ref();
            let Some(entry) = HardwareType::from_name(name).and_then(|hw| entries.get(&hw)) else {
                debug!(hw_type = %name, release = %release, "Skipping unsupported hardware type");
                continue;
            };

            packages.extend(entry.needed_packages.iter().map(|p| (*p).to_string()));
            for (category, acc) in &mut accumulators {
                acc.extend(entry.interfaces(*category));
            }
        }

        if use_ipxe {
            if let Some(boot) = accumulators.get_mut(&InterfaceCategory::Boot) {
                boot.push_extra(IPXE_BOOT_INTERFACE);
            }
        }

        let values = accumulators
            .iter()
            .map(|(category, acc)| (*category, acc.render(*category)))
            .collect();

        info!(
            requested = %release,
            release = ?effective,
            packages = packages.len(),
            "Resolved hardware type configuration"
        );

        Resolution {
            release: effective,
            config: ResolvedConfig { values },
            packages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_TYPES: [&str; 3] = ["ipmi", "redfish", "idrac"];

    #[test]
    fn test_train_management_is_sorted_with_noop_last() {
        let catalog = InterfaceCatalog::builtin();
        let resolution = ConfigResolver::new(&catalog).resolve("train", &ALL_TYPES, false);
        assert_eq!(
            resolution.config.get(InterfaceCategory::Management),
            "idrac-redfish, idrac-wsman, intel-ipmitool, ipmitool, redfish, noop"
        );
        assert_eq!(
            resolution.config.get(InterfaceCategory::HardwareTypes),
            "idrac, intel-ipmi, ipmi, redfish"
        );
    }

    #[test]
    fn test_category_without_contributions() {
        let catalog = InterfaceCatalog::builtin();
        let resolution = ConfigResolver::new(&catalog).resolve("train", &["redfish"], false);
        assert_eq!(resolution.config.get(InterfaceCategory::Console), "no-console");
        assert_eq!(resolution.config.get(InterfaceCategory::Raid), "no-raid");
    }

    #[test]
    fn test_no_hardware_types() {
        let catalog = InterfaceCatalog::builtin();
        let none: [&str; 0] = [];
        let resolution = ConfigResolver::new(&catalog).resolve("train", &none, false);
        assert_eq!(resolution.config.get(InterfaceCategory::HardwareTypes), "");
        assert_eq!(resolution.config.get(InterfaceCategory::Power), "");
        assert_eq!(resolution.config.get(InterfaceCategory::Bios), "no-bios");
        assert!(resolution.packages.is_empty());
    }

    #[test]
    fn test_unsupported_hardware_type_is_skipped() {
        let catalog = InterfaceCatalog::builtin();
        let resolver = ConfigResolver::new(&catalog);
        let with_unknown = resolver.resolve("train", &["ipmi", "ilo"], false);
        let without = resolver.resolve("train", &["ipmi"], false);
        assert_eq!(with_unknown, without);
    }

    #[test]
    fn test_packages_are_deduplicated() {
        let catalog = InterfaceCatalog::builtin();
        let resolution = ConfigResolver::new(&catalog).resolve(
            "ussuri",
            &["redfish", "idrac", "redfish"],
            false,
        );
        let packages: Vec<_> = resolution.packages.iter().map(String::as_str).collect();
        assert_eq!(packages, vec!["python3-dracclient", "python3-sushy"]);
    }

    #[test]
    fn test_contributed_fallback_still_renders_last() {
        let mut acc = CategoryAccumulator::default();
        acc.extend(&["noop", "ipmitool", "ansible"]);
        assert_eq!(
            acc.render(InterfaceCategory::Management),
            "ansible, ipmitool, noop"
        );
    }

    #[test]
    fn test_ipxe_not_duplicated() {
        let mut acc = CategoryAccumulator::default();
        acc.extend(&["ipxe", "pxe"]);
        acc.push_extra(IPXE_BOOT_INTERFACE);
        assert_eq!(acc.render(InterfaceCategory::Boot), "ipxe, pxe");
    }

    #[test]
    fn test_context_uses_config_keys() {
        let catalog = InterfaceCatalog::builtin();
        let resolution = ConfigResolver::new(&catalog).resolve("train", &["ipmi"], true);
        let context = resolution.config.to_context();
        assert_eq!(context.len(), InterfaceCategory::ALL.len());
        assert_eq!(
            context.get("enabled_boot_interfaces"),
            Some(&serde_json::Value::String("pxe, ipxe".to_string()))
        );
    }
}
