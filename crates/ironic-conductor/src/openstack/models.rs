//! Keystone and Glance API models.

use serde::{Deserialize, Serialize};

use super::traits::GlanceStore;

// ============================================================================
// Identity credentials
// ============================================================================

/// Service credentials published on the `identity-credentials` relation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityCredentials {
    pub username: String,
    pub password: String,
    pub project_name: String,
    /// `http` or `https`.
    pub auth_protocol: String,
    pub auth_host: String,
    pub credentials_port: u16,
    /// Identity API version, `3` or `2.0`.
    pub api_version: String,
    #[serde(default = "default_domain")]
    pub project_domain_name: String,
    #[serde(default = "default_domain")]
    pub user_domain_name: String,
}

fn default_domain() -> String {
    "default".to_string()
}

impl IdentityCredentials {
    /// Keystone base URL.
    #[must_use]
    pub fn auth_url(&self) -> String {
        format!(
            "{}://{}:{}",
            self.auth_protocol, self.auth_host, self.credentials_port
        )
    }

    /// Whether the v3 password plugin applies.
    #[must_use]
    pub fn is_v3(&self) -> bool {
        self.api_version.trim() == "3"
    }
}

// ============================================================================
// Keystone v3
// ============================================================================

#[derive(Debug, Serialize)]
pub struct V3AuthRequest {
    pub auth: V3Auth,
}

#[derive(Debug, Serialize)]
pub struct V3Auth {
    pub identity: V3Identity,
    pub scope: V3Scope,
}

#[derive(Debug, Serialize)]
pub struct V3Identity {
    pub methods: Vec<String>,
    pub password: V3Password,
}

#[derive(Debug, Serialize)]
pub struct V3Password {
    pub user: V3User,
}

#[derive(Debug, Serialize)]
pub struct V3User {
    pub name: String,
    pub domain: NamedDomain,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct V3Scope {
    pub project: V3Project,
}

#[derive(Debug, Serialize)]
pub struct V3Project {
    pub name: String,
    pub domain: NamedDomain,
}

#[derive(Debug, Serialize)]
pub struct NamedDomain {
    pub name: String,
}

impl V3AuthRequest {
    /// Project-scoped password authentication.
    #[must_use]
    pub fn password(creds: &IdentityCredentials) -> Self {
        Self {
            auth: V3Auth {
                identity: V3Identity {
                    methods: vec!["password".to_string()],
                    password: V3Password {
                        user: V3User {
                            name: creds.username.clone(),
                            domain: NamedDomain {
                                name: creds.user_domain_name.clone(),
                            },
                            password: creds.password.clone(),
                        },
                    },
                },
                scope: V3Scope {
                    project: V3Project {
                        name: creds.project_name.clone(),
                        domain: NamedDomain {
                            name: creds.project_domain_name.clone(),
                        },
                    },
                },
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct V3TokenResponse {
    pub token: V3Token,
}

#[derive(Debug, Deserialize)]
pub struct V3Token {
    #[serde(default)]
    pub catalog: Vec<V3CatalogEntry>,
}

#[derive(Debug, Deserialize)]
pub struct V3CatalogEntry {
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(default)]
    pub endpoints: Vec<V3Endpoint>,
}

#[derive(Debug, Deserialize)]
pub struct V3Endpoint {
    pub interface: String,
    pub url: String,
}

// ============================================================================
// Keystone v2.0
// ============================================================================

#[derive(Debug, Serialize)]
pub struct V2AuthRequest {
    pub auth: V2Auth,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct V2Auth {
    pub password_credentials: V2PasswordCredentials,
    pub tenant_name: String,
}

#[derive(Debug, Serialize)]
pub struct V2PasswordCredentials {
    pub username: String,
    pub password: String,
}

impl V2AuthRequest {
    #[must_use]
    pub fn password(creds: &IdentityCredentials) -> Self {
        Self {
            auth: V2Auth {
                password_credentials: V2PasswordCredentials {
                    username: creds.username.clone(),
                    password: creds.password.clone(),
                },
                tenant_name: creds.project_name.clone(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct V2TokenResponse {
    pub access: V2Access,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct V2Access {
    pub token: V2Token,
    #[serde(default)]
    pub service_catalog: Vec<V2CatalogEntry>,
}

#[derive(Debug, Deserialize)]
pub struct V2Token {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct V2CatalogEntry {
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(default)]
    pub endpoints: Vec<V2Endpoint>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct V2Endpoint {
    #[serde(rename = "publicURL")]
    pub public_url: Option<String>,
    #[serde(rename = "internalURL")]
    pub internal_url: Option<String>,
    #[serde(rename = "adminURL")]
    pub admin_url: Option<String>,
}

// ============================================================================
// Normalised catalog
// ============================================================================

/// One endpoint of a catalogued service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// `public`, `internal` or `admin`.
    pub interface: String,
    pub url: String,
}

/// A service from the token's catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogService {
    pub service_type: String,
    pub endpoints: Vec<Endpoint>,
}

impl From<V3CatalogEntry> for CatalogService {
    fn from(entry: V3CatalogEntry) -> Self {
        Self {
            service_type: entry.service_type,
            endpoints: entry
                .endpoints
                .into_iter()
                .map(|e| Endpoint {
                    interface: e.interface,
                    url: e.url,
                })
                .collect(),
        }
    }
}

impl From<V2CatalogEntry> for CatalogService {
    fn from(entry: V2CatalogEntry) -> Self {
        let endpoints = entry
            .endpoints
            .into_iter()
            .flat_map(|e| {
                [
                    ("public", e.public_url),
                    ("internal", e.internal_url),
                    ("admin", e.admin_url),
                ]
            })
            .filter_map(|(interface, url)| {
                url.map(|url| Endpoint {
                    interface: interface.to_string(),
                    url,
                })
            })
            .collect();
        Self {
            service_type: entry.service_type,
            endpoints,
        }
    }
}

// ============================================================================
// Glance
// ============================================================================

/// `GET /v2/info/stores` response.
#[derive(Debug, Deserialize)]
pub struct StoresResponse {
    #[serde(default)]
    pub stores: Vec<GlanceStore>,
}
