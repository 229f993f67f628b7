//! Operator configuration.
//!
//! Mirrors the charm's `config.yaml` options. List-valued options are
//! comma separated strings and tolerate surrounding whitespace.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CharmError;

/// Network interface used when `default-network-interface` is empty.
pub const DEFAULT_NETWORK_INTERFACE: &str = "flat";

/// Deploy interface used when `default-deploy-interface` is empty.
pub const DEFAULT_DEPLOY_INTERFACE: &str = "direct";

/// Options that become mandatory once `neutron` networking is enabled.
pub const NEUTRON_MANDATORY_OPTIONS: [&str; 2] = ["provisioning-network", "cleaning-network"];

/// Charm configuration as set by the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CharmConfig {
    pub enabled_network_interfaces: String,
    pub default_network_interface: String,
    pub enabled_deploy_interfaces: String,
    pub default_deploy_interface: String,
    pub enabled_hw_types: String,
    pub use_ipxe: bool,
    /// Neutron network used to provision nodes.
    pub provisioning_network: Option<String>,
    /// Neutron network used to clean nodes.
    pub cleaning_network: Option<String>,
    pub rabbit_user: String,
    pub rabbit_vhost: String,
    pub database: String,
    pub database_user: String,
    pub debug: bool,
    pub verbose: bool,
}

impl Default for CharmConfig {
    fn default() -> Self {
        Self {
            enabled_network_interfaces: "flat, neutron, noop".to_string(),
            default_network_interface: String::new(),
            enabled_deploy_interfaces: "direct, iscsi".to_string(),
            default_deploy_interface: String::new(),
            enabled_hw_types: "ipmi, redfish, idrac".to_string(),
            use_ipxe: true,
            provisioning_network: None,
            cleaning_network: None,
            rabbit_user: "ironic".to_string(),
            rabbit_vhost: "openstack".to_string(),
            database: "ironic".to_string(),
            database_user: "ironic".to_string(),
            debug: false,
            verbose: false,
        }
    }
}

/// Split a comma separated option and trim each entry.
///
/// Empty entries are kept so that validation rejects them; an empty
/// option yields a single empty entry.
#[must_use]
pub fn parse_list(value: &str) -> Vec<String> {
    value.split(',').map(|item| item.trim().to_string()).collect()
}

impl CharmConfig {
    /// Parse configuration from YAML.
    ///
    /// # Errors
    /// Returns an error if the document is not a valid configuration.
    pub fn from_yaml(content: &str) -> Result<Self, CharmError> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Load configuration from a YAML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, CharmError> {
        debug!(path = %path.display(), "Loading charm configuration");
        let content = std::fs::read_to_string(path).map_err(|source| CharmError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Fill in the default network and deploy interfaces when unset.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        if self.default_network_interface.trim().is_empty() {
            self.default_network_interface = DEFAULT_NETWORK_INTERFACE.to_string();
        }
        if self.default_deploy_interface.trim().is_empty() {
            self.default_deploy_interface = DEFAULT_DEPLOY_INTERFACE.to_string();
        }
        self
    }

    #[must_use]
    pub fn enabled_network_interfaces(&self) -> Vec<String> {
        parse_list(&self.enabled_network_interfaces)
    }

    #[must_use]
    pub fn enabled_deploy_interfaces(&self) -> Vec<String> {
        parse_list(&self.enabled_deploy_interfaces)
    }

    #[must_use]
    pub fn enabled_hw_types(&self) -> Vec<String> {
        parse_list(&self.enabled_hw_types)
    }

    /// Options that must be set before the unit can be assessed.
    #[must_use]
    pub fn mandatory_options(&self) -> Vec<&'static str> {
        let mut options = Vec::new();
        if self
            .enabled_network_interfaces()
            .iter()
            .any(|iface| iface == "neutron")
        {
            options.extend(NEUTRON_MANDATORY_OPTIONS);
        }
        options
    }

    /// Value of an option by its `config.yaml` name. Booleans are not
    /// included; they always have a value.
    #[must_use]
    pub fn option(&self, name: &str) -> Option<&str> {
        let value = match name {
            "enabled-network-interfaces" => self.enabled_network_interfaces.as_str(),
            "default-network-interface" => self.default_network_interface.as_str(),
            "enabled-deploy-interfaces" => self.enabled_deploy_interfaces.as_str(),
            "default-deploy-interface" => self.default_deploy_interface.as_str(),
            "enabled-hw-types" => self.enabled_hw_types.as_str(),
            "provisioning-network" => self.provisioning_network.as_deref()?,
            "cleaning-network" => self.cleaning_network.as_deref()?,
            "rabbit-user" => self.rabbit_user.as_str(),
            "rabbit-vhost" => self.rabbit_vhost.as_str(),
            "database" => self.database.as_str(),
            "database-user" => self.database_user.as_str(),
            _ => return None,
        };
        Some(value)
    }

    /// Mandatory options that are unset or empty.
    #[must_use]
    pub fn missing_mandatory_options(&self) -> Vec<&'static str> {
        self.mandatory_options()
            .into_iter()
            .filter(|name| self.option(name).is_none_or(|v| v.trim().is_empty()))
            .collect()
    }
}
