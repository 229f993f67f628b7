//! Lifecycle management for the OpenStack Ironic conductor.
//!
//! This crate turns the operator's hardware-type selection into the
//! driver interface options of `ironic.conf`, validates the network and
//! deploy interface settings before the conductor is declared ready, and
//! manages the PXE/iPXE boot services the conductor depends on.
//!
//! # Example
//!
//! ```rust,ignore
//! use ironic_conductor::{CharmConfig, InterfaceCatalog, IronicConductorCharm, ReadinessFlags};
//!
//! let config = CharmConfig::from_yaml("enabled-hw-types: ipmi, redfish\n")?;
//! let charm = IronicConductorCharm::new(config, "ussuri", InterfaceCatalog::builtin());
//!
//! // enabled_boot_interfaces = "pxe, redfish-virtual-media, ipxe"
//! let context = charm.render_context(&unit_state);
//!
//! let verdict = charm.validate(ReadinessFlags {
//!     config_complete: true,
//!     secret_provisioned: true,
//! });
//! ```

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod actions;
pub mod catalog;
pub mod charm;
pub mod config;
pub mod error;
pub mod openstack;
pub mod pxe;
pub mod release;
pub mod resolver;
pub mod state;
pub mod validator;

pub use catalog::{HardwareType, HardwareTypeEntry, InterfaceCatalog, InterfaceCategory, Release};
pub use charm::{IronicConductorCharm, WorkloadStatus};
pub use config::CharmConfig;
pub use error::CharmError;
pub use resolver::{ConfigResolver, Resolution, ResolvedConfig};
pub use state::{LeaderSettings, UnitState};
pub use validator::{DeploymentInputs, DeploymentValidator, ReadinessFlags, ValidationVerdict};
