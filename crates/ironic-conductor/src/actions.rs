//! Operator actions.

use std::future::Future;

use sha1::{Digest, Sha1};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::openstack::{CloudServices, OpenStackError};
use crate::state::{LeaderSettings, UnitState, TEMP_URL_SECRET_KEY};

/// Swift account property Ironic signs temporary URLs with.
pub const TEMP_URL_KEY_PROPERTY: &str = "temp-url-key";

/// Glance store that must be enabled for `direct` deploys.
const SWIFT_STORE: &str = "swift";

/// Reasons the `set-temp-url-secret` action fails.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("action must be run on the leader unit.")]
    NotLeader,

    #[error(
        "required relations are not yet available, please defer action until deployment is complete."
    )]
    NotReady,

    #[error("Failed to create keystone session (\"{0}\")")]
    Session(#[source] OpenStackError),

    #[error("Swift not yet available. Please wait for deployment to finish")]
    SwiftUnavailable,

    #[error("Glance not yet available. Please wait for deployment to finish")]
    GlanceUnavailable,

    #[error(
        "Glance does not support Swift storage backend. Please add relation between glance and ceph-radosgw/swift"
    )]
    NoSwiftStore,

    #[error(transparent)]
    OpenStack(#[from] OpenStackError),

    #[error("Failed to publish leader setting: {0}")]
    Leadership(String),
}

/// What the action did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretOutcome {
    /// A new secret was stored on Swift and published to peers.
    Rotated,
    /// Swift and the leader settings already agree.
    Unchanged,
}

/// Random secret: hex SHA-1 of a fresh v4 UUID.
#[must_use]
pub fn generate_secret() -> String {
    hex::encode(Sha1::digest(Uuid::new_v4().to_string().as_bytes()))
}

/// Make sure Swift and the leader settings share one temp URL secret.
///
/// `connect` is only called once the unit is known to be the leader with
/// complete configuration.
///
/// # Errors
/// Returns an [`ActionError`] describing the first failed precondition or
/// API call.
pub async fn set_temp_url_secret<C, F, Fut>(
    unit: &mut UnitState,
    connect: F,
) -> Result<SecretOutcome, ActionError>
where
    C: CloudServices,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<C, OpenStackError>>,
{
    if !unit.is_leader {
        return Err(ActionError::NotLeader);
    }
    if !unit.config_complete() {
        return Err(ActionError::NotReady);
    }

    let cloud = connect().await.map_err(ActionError::Session)?;
    if !cloud.has_swift() {
        return Err(ActionError::SwiftUnavailable);
    }
    if !cloud.has_glance() {
        return Err(ActionError::GlanceUnavailable);
    }
    let stores = cloud.glance_stores().await?;
    if !stores.iter().any(|s| s.id == SWIFT_STORE) {
        return Err(ActionError::NoSwiftStore);
    }

    let current = unit
        .leader_get(TEMP_URL_SECRET_KEY)
        .filter(|s| !s.is_empty());
    let on_swift = cloud
        .object_account_properties()
        .await?
        .remove(TEMP_URL_KEY_PROPERTY);

    if current.is_some() && on_swift == current {
        info!("Temp URL secret already in place");
        return Ok(SecretOutcome::Unchanged);
    }

    let secret = generate_secret();
    cloud
        .set_object_account_property(TEMP_URL_KEY_PROPERTY, &secret)
        .await?;
    unit.leader_set(TEMP_URL_SECRET_KEY, &secret)
        .map_err(|e| ActionError::Leadership(format!("{e:#}")))?;

    info!(rotated = current.is_some(), "Temp URL secret published");
    Ok(SecretOutcome::Rotated)
}
