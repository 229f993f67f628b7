//! OpenStack API access for the temp URL secret action.
//!
//! A Keystone session (v3 or v2.0 password auth) provides the token and
//! service catalog; Glance reports its stores and Swift holds the account
//! metadata Ironic signs temporary URLs with.

pub mod client;
pub mod models;
pub mod traits;

pub use client::{KeystoneSession, OpenStackClients, SYSTEM_CA_BUNDLE};
pub use models::{CatalogService, Endpoint, IdentityCredentials};
pub use traits::{default_store, CloudServices, GlanceStore, OpenStackError};
