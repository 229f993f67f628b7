//! The Ironic conductor charm.
//!
//! [`IronicConductorCharm`] is built explicitly from the operator's
//! configuration, the installed release and a catalog. Everything it
//! exposes (packages, services, rendered context, status) is derived from
//! those inputs, so a new instance is built whenever the configuration
//! changes.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::catalog::InterfaceCatalog;
use crate::config::CharmConfig;
use crate::pxe::{PxeBootLayout, IRONIC_GROUP, IRONIC_USER};
use crate::resolver::{ConfigResolver, Resolution};
use crate::state::{
    LeaderSettings, RelationState, UnitState, CONFIG_COMPLETE_FLAG, TEMP_URL_SECRET_KEY,
};
use crate::validator::{DeploymentInputs, DeploymentValidator, ReadinessFlags, ValidationVerdict};

/// Packages installed regardless of the enabled hardware types.
pub const PACKAGES: [&str; 11] = [
    "ironic-conductor",
    "python3-keystoneauth1",
    "python3-keystoneclient",
    "python3-glanceclient",
    "python3-swiftclient",
    "python-mysqldb",
    "python3-ironicclient",
    "python3-scciclient",
    "openssl",
    "open-iscsi",
    "qemu-utils",
];

pub const CONDUCTOR_SERVICE: &str = "ironic-conductor";

/// Relations that must be available before the unit can be ready.
pub const REQUIRED_RELATIONS: [&str; 4] =
    ["shared-db", "amqp", "identity-credentials", "ironic-api"];

const IRONIC_CONF: &str = "/etc/ironic/ironic.conf";
const ROOTWRAP_CONF: &str = "/etc/ironic/rootwrap.conf";
const IRONIC_LIB_FILTERS: &str = "/etc/ironic/rootwrap.d/ironic-lib.filters";
const IRONIC_UTILS_FILTERS: &str = "/etc/ironic/rootwrap.d/ironic-utils.filters";

/// Workload status reported to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "lowercase")]
pub enum WorkloadStatus {
    Active(String),
    Blocked(String),
    Waiting(String),
}

impl WorkloadStatus {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Active(_) => "active",
            Self::Blocked(_) => "blocked",
            Self::Waiting(_) => "waiting",
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Active(m) | Self::Blocked(m) | Self::Waiting(m) => m,
        }
    }
}

impl fmt::Display for WorkloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name(), self.message())
    }
}

/// Database the charm requests over `shared-db`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseRequest {
    pub database: String,
    pub username: String,
}

/// Ironic conductor charm for one configuration.
#[derive(Debug, Clone)]
pub struct IronicConductorCharm {
    config: CharmConfig,
    release: String,
    catalog: InterfaceCatalog,
    pxe: PxeBootLayout,
    resolution: Resolution,
}

impl IronicConductorCharm {
    /// Build the charm, filling in default interfaces and resolving the
    /// enabled hardware types.
    #[must_use]
    pub fn new(
        config: CharmConfig,
        release: impl Into<String>,
        catalog: InterfaceCatalog,
    ) -> Self {
        let config = config.with_defaults();
        let release = release.into();
        let resolution = ConfigResolver::new(&catalog).resolve(
            &release,
            &config.enabled_hw_types(),
            config.use_ipxe,
        );

        Self {
            config,
            release,
            catalog,
            pxe: PxeBootLayout::default(),
            resolution,
        }
    }

    /// Use a different boot service layout.
    #[must_use]
    pub fn with_pxe_layout(mut self, pxe: PxeBootLayout) -> Self {
        self.pxe = pxe;
        self
    }

    #[must_use]
    pub fn config(&self) -> &CharmConfig {
        &self.config
    }

    /// Release requested by the caller.
    #[must_use]
    pub fn release(&self) -> &str {
        &self.release
    }

    #[must_use]
    pub fn pxe_layout(&self) -> &PxeBootLayout {
        &self.pxe
    }

    #[must_use]
    pub fn resolution(&self) -> &Resolution {
        &self.resolution
    }

    /// Packages to install: base, boot services, then hardware type
    /// drivers. Each package appears once.
    #[must_use]
    pub fn packages(&self) -> Vec<String> {
        let mut candidates: Vec<&str> = PACKAGES.to_vec();
        candidates.extend(self.pxe.packages());
        candidates.extend(self.resolution.packages.iter().map(String::as_str));

        let mut packages: Vec<String> = Vec::new();
        for package in candidates {
            if !packages.iter().any(|p| p == package) {
                packages.push(package.to_string());
            }
        }
        packages
    }

    #[must_use]
    pub fn services(&self) -> Vec<&'static str> {
        let mut services = vec![CONDUCTOR_SERVICE];
        services.extend(self.pxe.services());
        services
    }

    /// Configuration file → services restarted when it changes.
    #[must_use]
    pub fn restart_map(&self) -> BTreeMap<PathBuf, Vec<String>> {
        let mut map: BTreeMap<PathBuf, Vec<String>> = [
            IRONIC_CONF,
            IRONIC_UTILS_FILTERS,
            IRONIC_LIB_FILTERS,
            ROOTWRAP_CONF,
        ]
        .into_iter()
        .map(|path| (PathBuf::from(path), vec![CONDUCTOR_SERVICE.to_string()]))
        .collect();
        map.extend(self.pxe.restart_map());
        map
    }

    /// Options that must be set for this configuration.
    #[must_use]
    pub fn mandatory_config(&self) -> Vec<&'static str> {
        self.config.mandatory_options()
    }

    /// Username and vhost requested from the AMQP provider.
    #[must_use]
    pub fn amqp_credentials(&self) -> (&str, &str) {
        (&self.config.rabbit_user, &self.config.rabbit_vhost)
    }

    #[must_use]
    pub fn database_setup(&self) -> Vec<DatabaseRequest> {
        vec![DatabaseRequest {
            database: self.config.database.clone(),
            username: self.config.database_user.clone(),
        }]
    }

    #[must_use]
    pub fn validator(&self) -> DeploymentValidator<'_> {
        DeploymentValidator::new(&self.catalog, &self.release)
    }

    /// Check the interface configuration.
    #[must_use]
    pub fn validate(&self, flags: ReadinessFlags) -> ValidationVerdict {
        self.validator()
            .validate(&DeploymentInputs::from(&self.config), flags)
    }

    /// Values handed to the `ironic.conf` templates.
    #[must_use]
    pub fn render_context(&self, leader: &impl LeaderSettings) -> Value {
        let mut context = Map::new();
        if let Ok(Value::Object(options)) = serde_json::to_value(&self.config) {
            for (key, value) in options {
                context.insert(key.replace('-', "_"), value);
            }
        }

        let path = |p: &std::path::Path| Value::String(p.display().to_string());
        context.insert("tftpboot".into(), path(&self.pxe.tftp_root));
        context.insert("httpboot".into(), path(&self.pxe.http_root));
        context.insert("ironic_user".into(), IRONIC_USER.into());
        context.insert("ironic_group".into(), IRONIC_GROUP.into());
        context.insert("release".into(), self.release.clone().into());
        context.extend(self.resolution.config.to_context());

        if let Some(secret) = leader
            .leader_get(TEMP_URL_SECRET_KEY)
            .filter(|s| !s.is_empty())
        {
            context.insert(TEMP_URL_SECRET_KEY.into(), secret.into());
        }

        Value::Object(context)
    }

    /// Whether every required relation has published its data.
    #[must_use]
    pub fn relations_available(&self, state: &UnitState) -> bool {
        REQUIRED_RELATIONS
            .iter()
            .all(|r| state.relations.get(*r) == Some(&RelationState::Available))
    }

    /// Write the template context to `output`, mark configuration complete
    /// once all required relations are available, and reassess the unit.
    ///
    /// # Errors
    /// Returns an error if the context cannot be written or the state
    /// cannot be saved.
    pub fn render(&self, state: &mut UnitState, output: &Path) -> Result<WorkloadStatus> {
        let context = self.render_context(&*state);
        let content =
            serde_json::to_string_pretty(&context).context("Failed to serialize context")?;
        std::fs::write(output, content)
            .with_context(|| format!("Failed to write {}", output.display()))?;
        info!(path = %output.display(), "Rendered configuration context");

        if self.relations_available(state) {
            state.set_flag(CONFIG_COMPLETE_FLAG)?;
        } else {
            warn!("Required relations incomplete, configuration not marked complete");
        }
        Ok(self.assess_status(state))
    }

    /// Assess the unit: relations, then mandatory options, then the
    /// interface configuration.
    #[must_use]
    pub fn assess_status(&self, state: &UnitState) -> WorkloadStatus {
        let status = self.compute_status(state);
        info!(status = %status.name(), message = %status.message(), "Assessed status");
        status
    }

    fn compute_status(&self, state: &UnitState) -> WorkloadStatus {
        let missing: Vec<&str> = REQUIRED_RELATIONS
            .iter()
            .copied()
            .filter(|r| !state.relations.contains_key(*r))
            .collect();
        if !missing.is_empty() {
            return WorkloadStatus::Blocked(format!("Missing relations: {}", missing.join(", ")));
        }

        let incomplete: Vec<&str> = REQUIRED_RELATIONS
            .iter()
            .copied()
            .filter(|r| state.relations.get(*r) != Some(&RelationState::Available))
            .collect();
        if !incomplete.is_empty() {
            return WorkloadStatus::Waiting(format!(
                "Incomplete relations: {}",
                incomplete.join(", ")
            ));
        }

        let missing_config = self.config.missing_mandatory_options();
        if !missing_config.is_empty() {
            return WorkloadStatus::Blocked(format!(
                "Missing mandatory configuration: {}",
                missing_config.join(", ")
            ));
        }

        let flags = ReadinessFlags {
            config_complete: state.config_complete(),
            secret_provisioned: state.secret_provisioned(),
        };
        match self.validate(flags) {
            ValidationVerdict::Ready => WorkloadStatus::Active("Unit is ready".to_string()),
            ValidationVerdict::Blocked(reason) => WorkloadStatus::Blocked(reason),
        }
    }
}
