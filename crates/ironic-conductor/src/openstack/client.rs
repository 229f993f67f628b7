//! Keystone session and Glance/Swift client implementation.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Certificate, Client, Response};
use tracing::{debug, info, warn};

use super::models::{
    CatalogService, IdentityCredentials, StoresResponse, V2AuthRequest, V2TokenResponse,
    V3AuthRequest, V3TokenResponse,
};
use super::traits::{CloudServices, GlanceStore, OpenStackError};

/// System CA bundle trusted in addition to the built-in roots.
pub const SYSTEM_CA_BUNDLE: &str = "/etc/ssl/certs/ca-certificates.crt";

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Header carrying the token on every authenticated request.
const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// Header Keystone v3 returns the token in.
const SUBJECT_TOKEN_HEADER: &str = "X-Subject-Token";

/// Prefix of Swift account metadata headers.
const ACCOUNT_META_PREFIX: &str = "x-account-meta-";

/// Endpoint interface used for every service call.
const ENDPOINT_INTERFACE: &str = "public";

/// An authenticated Keystone session with its service catalog.
#[derive(Clone)]
pub struct KeystoneSession {
    client: Client,
    token: String,
    catalog: Vec<CatalogService>,
}

impl KeystoneSession {
    /// Authenticate with `creds`, trusting the system CA bundle when present.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built or Keystone rejects
    /// the credentials.
    pub async fn create(creds: &IdentityCredentials) -> Result<Self, OpenStackError> {
        Self::create_with_ca(creds, Path::new(SYSTEM_CA_BUNDLE)).await
    }

    /// Authenticate with `creds`, trusting the CA bundle at `ca_bundle` when
    /// the file exists.
    ///
    /// # Errors
    /// Returns error if the bundle is unreadable, the HTTP client cannot be
    /// built, or Keystone rejects the credentials.
    pub async fn create_with_ca(
        creds: &IdentityCredentials,
        ca_bundle: &Path,
    ) -> Result<Self, OpenStackError> {
        let mut builder = Client::builder().timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        if ca_bundle.is_file() {
            let pem = std::fs::read(ca_bundle).map_err(|e| {
                OpenStackError::Config(format!("reading {}: {e}", ca_bundle.display()))
            })?;
            builder = builder.add_root_certificate(Certificate::from_pem(&pem)?);
            debug!(path = %ca_bundle.display(), "Trusting CA bundle");
        }
        let client = builder.build()?;

        let auth_url = creds.auth_url();
        let (token, catalog) = if creds.is_v3() {
            Self::authenticate_v3(&client, &auth_url, creds).await?
        } else {
            Self::authenticate_v2(&client, &auth_url, creds).await?
        };

        info!(
            auth_url = %auth_url,
            api_version = %creds.api_version,
            services = catalog.len(),
            "Keystone session established"
        );
        Ok(Self {
            client,
            token,
            catalog,
        })
    }

    async fn authenticate_v3(
        client: &Client,
        auth_url: &str,
        creds: &IdentityCredentials,
    ) -> Result<(String, Vec<CatalogService>), OpenStackError> {
        let url = format!("{auth_url}/v3/auth/tokens");
        debug!(url = %url, "POST request");

        let response = client
            .post(&url)
            .json(&V3AuthRequest::password(creds))
            .send()
            .await?;
        let response = check_status(response).await?;

        let token = response
            .headers()
            .get(SUBJECT_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or(OpenStackError::MissingToken)?;
        let body: V3TokenResponse = parse_json(response).await?;

        Ok((
            token,
            body.token.catalog.into_iter().map(Into::into).collect(),
        ))
    }

    async fn authenticate_v2(
        client: &Client,
        auth_url: &str,
        creds: &IdentityCredentials,
    ) -> Result<(String, Vec<CatalogService>), OpenStackError> {
        let url = format!("{auth_url}/v2.0/tokens");
        debug!(url = %url, "POST request");

        let response = client
            .post(&url)
            .json(&V2AuthRequest::password(creds))
            .send()
            .await?;
        let response = check_status(response).await?;
        let body: V2TokenResponse = parse_json(response).await?;

        if body.access.token.id.is_empty() {
            return Err(OpenStackError::MissingToken);
        }
        Ok((
            body.access.token.id,
            body.access
                .service_catalog
                .into_iter()
                .map(Into::into)
                .collect(),
        ))
    }

    /// The session token.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Services listed in the token's catalog.
    #[must_use]
    pub fn catalog(&self) -> &[CatalogService] {
        &self.catalog
    }

    /// URL of the public endpoint for `service_type`.
    ///
    /// # Errors
    /// Returns [`OpenStackError::EndpointNotFound`] if the catalog has none.
    pub fn endpoint(&self, service_type: &str) -> Result<&str, OpenStackError> {
        self.catalog
            .iter()
            .filter(|s| s.service_type == service_type)
            .flat_map(|s| s.endpoints.iter())
            .find(|e| e.interface == ENDPOINT_INTERFACE)
            .map(|e| e.url.trim_end_matches('/'))
            .ok_or_else(|| OpenStackError::EndpointNotFound {
                service_type: service_type.to_string(),
                interface: ENDPOINT_INTERFACE.to_string(),
            })
    }
}

/// Glance and Swift clients sharing one Keystone session.
#[derive(Clone)]
pub struct OpenStackClients {
    session: KeystoneSession,
}

impl OpenStackClients {
    #[must_use]
    pub fn new(session: KeystoneSession) -> Self {
        Self { session }
    }

    /// Authenticate and build clients in one step.
    ///
    /// # Errors
    /// Returns error if the session cannot be created.
    pub async fn connect(creds: &IdentityCredentials) -> Result<Self, OpenStackError> {
        Ok(Self::new(KeystoneSession::create(creds).await?))
    }

    #[must_use]
    pub fn session(&self) -> &KeystoneSession {
        &self.session
    }

    /// HEAD the object storage account and return its headers.
    async fn account_headers(&self) -> Result<HeaderMap, OpenStackError> {
        let url = self.session.endpoint("object-store")?.to_string();
        debug!(url = %url, "HEAD request");

        let response = self
            .session
            .client
            .head(&url)
            .header(AUTH_TOKEN_HEADER, self.session.token())
            .send()
            .await?;
        Ok(check_status(response).await?.headers().clone())
    }

    /// POST account metadata headers.
    async fn post_account_headers(&self, headers: HeaderMap) -> Result<(), OpenStackError> {
        let url = self.session.endpoint("object-store")?.to_string();
        debug!(url = %url, "POST request");

        let response = self
            .session
            .client
            .post(&url)
            .header(AUTH_TOKEN_HEADER, self.session.token())
            .headers(headers)
            .send()
            .await?;
        check_status(response).await.map(|_| ())
    }
}

#[async_trait]
impl CloudServices for OpenStackClients {
    fn has_service_type(&self, service_type: &str) -> bool {
        self.session.endpoint(service_type).is_ok()
    }

    async fn glance_stores(&self) -> Result<Vec<GlanceStore>, OpenStackError> {
        let url = format!("{}/v2/info/stores", self.session.endpoint("image")?);
        debug!(url = %url, "GET request");

        let response = self
            .session
            .client
            .get(&url)
            .header(AUTH_TOKEN_HEADER, self.session.token())
            .send()
            .await?;
        let body: StoresResponse = parse_json(check_status(response).await?).await?;
        Ok(body.stores)
    }

    async fn object_account_properties(
        &self,
    ) -> Result<BTreeMap<String, String>, OpenStackError> {
        let headers = self.account_headers().await?;
        Ok(headers
            .iter()
            .filter_map(|(name, value)| {
                let property = name.as_str().strip_prefix(ACCOUNT_META_PREFIX)?;
                let value = value.to_str().ok()?;
                Some((property.to_string(), value.to_string()))
            })
            .collect())
    }

    async fn set_object_account_property(
        &self,
        property: &str,
        value: &str,
    ) -> Result<(), OpenStackError> {
        let property = property.to_lowercase();
        let current = self.object_account_properties().await?;
        if current.get(&property).map(String::as_str) == Some(value) {
            debug!(property = %property, "Account property already set");
            return Ok(());
        }

        let mut headers = HeaderMap::new();
        insert_meta_header(&mut headers, &property, value)?;
        self.post_account_headers(headers).await?;
        info!(property = %property, "Account property updated");
        Ok(())
    }

    async fn delete_object_account_property(&self, property: &str) -> Result<(), OpenStackError> {
        let property = property.to_lowercase();
        let mut headers = HeaderMap::new();
        // Swift removes metadata posted with an empty value.
        insert_meta_header(&mut headers, &property, "")?;
        self.post_account_headers(headers).await?;
        info!(property = %property, "Account property removed");
        Ok(())
    }
}

fn insert_meta_header(
    headers: &mut HeaderMap,
    property: &str,
    value: &str,
) -> Result<(), OpenStackError> {
    let name = reqwest::header::HeaderName::from_bytes(
        format!("{ACCOUNT_META_PREFIX}{property}").as_bytes(),
    )
    .map_err(|e| OpenStackError::InvalidHeader(e.to_string()))?;
    let value = reqwest::header::HeaderValue::from_str(value)
        .map_err(|e| OpenStackError::InvalidHeader(e.to_string()))?;
    headers.insert(name, value);
    Ok(())
}

/// Turn non-success responses into [`OpenStackError::Api`].
async fn check_status(response: Response) -> Result<Response, OpenStackError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        let text = response.text().await.unwrap_or_default();
        Err(OpenStackError::Api {
            status: status.as_u16(),
            message: text,
        })
    }
}

async fn parse_json<T: serde::de::DeserializeOwned>(
    response: Response,
) -> Result<T, OpenStackError> {
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| {
        warn!(error = %e, "Failed to parse response");
        OpenStackError::Serialization(e)
    })
}
