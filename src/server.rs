use std::{
    collections::BTreeMap,
    io::Cursor,
    sync::{Arc, Mutex, PoisonError},
};

use tracing::debug;

use crate::{
    ApiResponse, Credential, Database, Endpoint, Error, Profile, QueryParams, RequestBody,
    Transport, api::ProductInfo, build_request,
};

/// The address layout of a Data API deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// The URI scheme, usually `https`.
    pub scheme: String,
    /// The API version segment, e.g. `/vLatest` or `/v2`.
    pub version: String,
    /// The path the API is mounted at.
    pub root_path: String,
    /// The user-agent sent on requests.
    pub user_agent: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            scheme: "https".to_string(),
            version: "/vLatest".to_string(),
            root_path: "/fmi/data".to_string(),
            user_agent: crate::config::make_ua(None),
        }
    }
}

/// A Data API host, and the databases known on it.
///
/// A server owns the transport, but never a credential: each
/// [`Database`] holds its own.
pub struct Server {
    host: String,
    config: ServerConfig,
    transport: Arc<dyn Transport>,
    databases: Mutex<BTreeMap<String, Arc<Database>>>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("host", &self.host)
            .field("config", &self.config)
            .field("databases", &self.database_names_cached())
            .finish()
    }
}

impl Server {
    /// A server at `host` (an authority, such as `fm.example.com` or
    /// `10.0.0.5:8443`).
    pub fn new(
        host: impl Into<String>,
        config: ServerConfig,
        transport: impl Transport + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            host: host.into(),
            config,
            transport: Arc::new(transport),
            databases: Mutex::default(),
        })
    }

    /// A server configured from a profile. If the profile names a
    /// database, it is added with the profile's credential.
    pub fn from_profile(profile: &Profile, transport: impl Transport + 'static) -> Arc<Self> {
        let server = Self::new(profile.host.clone(), profile.server_config(), transport);
        if let Some(name) = &profile.database {
            server.add_database(name).set_credential(profile.credential());
        }

        server
    }

    /// The host this server sends requests to.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The address configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Add a database to this server, or return the existing one with the
    /// same name.
    pub fn add_database(self: &Arc<Self>, name: &str) -> Arc<Database> {
        let mut databases = self.lock_databases();
        databases
            .entry(name.to_owned())
            .or_insert_with(|| Database::new(name, Arc::downgrade(self)))
            .clone()
    }

    /// Look up a database by name.
    pub fn database(&self, name: &str) -> Option<Arc<Database>> {
        self.lock_databases().get(name).cloned()
    }

    /// Every database added to this server, ordered by name.
    pub fn databases(&self) -> Vec<Arc<Database>> {
        self.lock_databases().values().cloned().collect()
    }

    /// Fetch information about the server software. Sent without
    /// authorization.
    pub async fn product_info(&self) -> Result<ProductInfo, Error> {
        let resp: crate::api::ProductInfoContainer = roundtrip(
            Some(self),
            &Credential::Invalid,
            Endpoint::ProductInfo,
            None,
            None,
        )
        .await?;

        Ok(resp.product_info)
    }

    /// List the databases hosted on the server. Requires a login
    /// credential, not a session token.
    pub async fn database_names(&self, credential: &Credential) -> Result<Vec<String>, Error> {
        let resp: crate::DatabaseList =
            roundtrip(Some(self), credential, Endpoint::DatabaseNames, None, None).await?;

        Ok(resp.names().map(str::to_owned).collect())
    }

    /// List the databases hosted on the server, and add each one.
    pub async fn discover_databases(
        self: &Arc<Self>,
        credential: &Credential,
    ) -> Result<Vec<Arc<Database>>, Error> {
        let names = self.database_names(credential).await?;
        Ok(names.iter().map(|name| self.add_database(name)).collect())
    }

    /// Check that a session token is still valid. Does not change any
    /// database's credential.
    pub async fn validate_session(&self, credential: &Credential) -> Result<(), Error> {
        roundtrip::<crate::Empty>(
            Some(self),
            credential,
            Endpoint::ValidateSession,
            None,
            None,
        )
        .await?;

        Ok(())
    }

    fn lock_databases(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Arc<Database>>> {
        self.databases.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn database_names_cached(&self) -> Vec<String> {
        self.lock_databases().keys().cloned().collect()
    }
}

/// Build a request, send it, and decode the response.
pub(crate) async fn roundtrip<T: ApiResponse>(
    server: Option<&Server>,
    credential: &Credential,
    endpoint: Endpoint,
    query: Option<&QueryParams>,
    body: Option<RequestBody>,
) -> Result<T, Error> {
    let req = build_request(server, credential, &endpoint, query, body)?;
    let Some(server) = server else {
        return Err(Error::NotConnected);
    };

    let resp = server.transport.execute(req).await?;
    debug!(status = %resp.status(), ?endpoint, "decoding response");
    T::from_response(resp.map(Cursor::new))
}
