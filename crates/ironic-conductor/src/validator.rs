//! Deployment readiness checks.
//!
//! The checks run in a fixed order and the first failure decides the
//! unit's blocked message. Nothing is cached between assessments.

use serde::Serialize;
use tracing::debug;

use crate::catalog::{HardwareType, InterfaceCatalog};
use crate::config::CharmConfig;

/// Network interfaces Ironic can be configured with.
pub const VALID_NETWORK_INTERFACES: [&str; 3] = ["neutron", "flat", "noop"];

/// Deploy interfaces Ironic can be configured with.
pub const VALID_DEPLOY_INTERFACES: [&str; 2] = ["direct", "iscsi"];

/// Deploy interface that needs the Swift temp URL secret.
const DIRECT_DEPLOY_INTERFACE: &str = "direct";

/// Outcome of a readiness assessment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", content = "reason", rename_all = "snake_case")]
pub enum ValidationVerdict {
    /// Every check passed.
    Ready,
    /// The first failed check, prefixed with the offending option.
    Blocked(String),
}

impl ValidationVerdict {
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// `(status, message)` as consumed by status reporting; both are
    /// `None` when nothing blocks the unit.
    #[must_use]
    pub fn as_status(&self) -> (Option<&'static str>, Option<&str>) {
        match self {
            Self::Ready => (None, None),
            Self::Blocked(reason) => (Some("blocked"), Some(reason.as_str())),
        }
    }
}

/// Externally sourced readiness signals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadinessFlags {
    /// Configuration has been rendered at least once.
    pub config_complete: bool,
    /// The leader has published the temp URL secret.
    pub secret_provisioned: bool,
}

/// Interface selections under validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploymentInputs {
    /// Parsed `enabled-network-interfaces`.
    pub enabled_network_interfaces: Vec<String>,
    /// `default-network-interface` after defaults are applied.
    pub default_network_interface: String,
    /// Parsed `enabled-deploy-interfaces`.
    pub enabled_deploy_interfaces: Vec<String>,
    /// `default-deploy-interface` after defaults are applied.
    pub default_deploy_interface: String,
    /// Parsed `enabled-hw-types`.
    pub enabled_hw_types: Vec<String>,
}

impl From<&CharmConfig> for DeploymentInputs {
    fn from(config: &CharmConfig) -> Self {
        Self {
            enabled_network_interfaces: config.enabled_network_interfaces(),
            default_network_interface: config.default_network_interface.trim().to_string(),
            enabled_deploy_interfaces: config.enabled_deploy_interfaces(),
            default_deploy_interface: config.default_deploy_interface.trim().to_string(),
            enabled_hw_types: config.enabled_hw_types(),
        }
    }
}

/// Validates interface selections for one release.
#[derive(Debug, Clone, Copy)]
pub struct DeploymentValidator<'a> {
    catalog: &'a InterfaceCatalog,
    release: &'a str,
}

impl<'a> DeploymentValidator<'a> {
    #[must_use]
    pub fn new(catalog: &'a InterfaceCatalog, release: &'a str) -> Self {
        Self { catalog, release }
    }

    /// Run every check in order and report the first failure.
    #[must_use]
    pub fn validate(&self, inputs: &DeploymentInputs, flags: ReadinessFlags) -> ValidationVerdict {
        let result = check_network_interfaces(&inputs.enabled_network_interfaces)
            .map_err(|e| format!("invalid enabled-network-interfaces config: {e}"))
            .and_then(|()| {
                check_default(
                    "default-network-interface",
                    "enabled-network-interfaces",
                    &inputs.default_network_interface,
                    &inputs.enabled_network_interfaces,
                )
                .map_err(|e| format!("invalid default-network-interface config: {e}"))
            })
            .and_then(|()| {
                check_deploy_interfaces(&inputs.enabled_deploy_interfaces, flags)
                    .map_err(|e| format!("invalid enabled-deploy-interfaces config: {e}"))
            })
            .and_then(|()| {
                check_default(
                    "default-deploy-interface",
                    "enabled-deploy-interfaces",
                    &inputs.default_deploy_interface,
                    &inputs.enabled_deploy_interfaces,
                )
                .map_err(|e| format!("invalid default-deploy-interface config: {e}"))
            })
            .and_then(|()| {
                self.check_hw_types(&inputs.enabled_hw_types)
                    .map_err(|e| format!("invalid enabled-hw-types config: {e}"))
            });

        match result {
            Ok(()) => ValidationVerdict::Ready,
            Err(reason) => {
                debug!(reason = %reason, "Deployment validation failed");
                ValidationVerdict::Blocked(reason)
            }
        }
    }

    fn check_hw_types(&self, hw_types: &[String]) -> Result<(), String> {
        if hw_types.is_empty() {
            return Err("no hardware types enabled".to_string());
        }
        let entries = self.catalog.release_entries(self.release);
        let unsupported: Vec<&str> = hw_types
            .iter()
            .map(String::as_str)
            .filter(|name| {
                HardwareType::from_name(name).is_none_or(|hw| !entries.contains_key(&hw))
            })
            .collect();

        if unsupported.is_empty() {
            Ok(())
        } else {
            let release = self
                .catalog
                .effective_release(self.release)
                .map_or(self.release, |r| r.as_str());
            Err(format!(
                "unsupported hardware types for release {release}: {}",
                unsupported.join(", ")
            ))
        }
    }
}

fn check_network_interfaces(interfaces: &[String]) -> Result<(), String> {
    match interfaces
        .iter()
        .find(|iface| !VALID_NETWORK_INTERFACES.contains(&iface.as_str()))
    {
        Some(invalid) => Err(format!(
            "Network interface \"{invalid}\" is not valid. Valid interfaces are: {}",
            VALID_NETWORK_INTERFACES.join(", ")
        )),
        None => Ok(()),
    }
}

fn check_deploy_interfaces(interfaces: &[String], flags: ReadinessFlags) -> Result<(), String> {
    if let Some(invalid) = interfaces
        .iter()
        .find(|iface| !VALID_DEPLOY_INTERFACES.contains(&iface.as_str()))
    {
        return Err(format!(
            "Deploy interface {invalid} is not valid. Valid interfaces are: {}",
            VALID_DEPLOY_INTERFACES.join(", ")
        ));
    }

    // The secret only matters once relations have delivered a full render.
    let direct_enabled = interfaces.iter().any(|i| i == DIRECT_DEPLOY_INTERFACE);
    if flags.config_complete && direct_enabled && !flags.secret_provisioned {
        return Err(
            "run \"set-temp-url-secret\" action on leader to enable \"direct\" deploy method"
                .to_string(),
        );
    }
    Ok(())
}

fn check_default(
    option: &str,
    list_option: &str,
    value: &str,
    enabled: &[String],
) -> Result<(), String> {
    if enabled.iter().any(|iface| iface == value) {
        Ok(())
    } else {
        Err(format!(
            "{option} ({value}) is not enabled in {list_option}: {}",
            enabled.join(", ")
        ))
    }
}
