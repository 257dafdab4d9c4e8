//! Credentials for authorizing Data API requests.

use base64::Engine as _;
use http::header::{AUTHORIZATION, CONTENT_TYPE, HeaderName};
use serde::Serialize;

/// Header carrying the request id of an OAuth login.
pub const OAUTH_REQUEST_ID: HeaderName = HeaderName::from_static("x-fm-data-oauth-request-id");

/// Header carrying the identifier of an OAuth login.
pub const OAUTH_IDENTIFIER: HeaderName = HeaderName::from_static("x-fm-data-oauth-identifier");

/// One of the ways a request can be authorized against the Data API.
///
/// A session [`Credential::Token`] is only ever produced by a successful
/// login; the other variants are used to obtain one.
#[derive(Default, Clone, PartialEq, Eq)]
pub enum Credential {
    /// A Claris ID token issued by the identity provider.
    ClarisId(String),
    /// The base64 encoding of `user:password`.
    Basic(String),
    /// An OAuth request id and identifier.
    OAuth {
        /// The OAuth request id.
        request_id: String,
        /// The OAuth identifier.
        identifier: String,
    },
    /// A session token returned by the server.
    Token(String),
    /// No usable credential.
    #[default]
    Invalid,
}

/// The variant of a [`Credential`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialKind {
    /// See [`Credential::ClarisId`].
    ClarisId,
    /// See [`Credential::Basic`].
    Basic,
    /// See [`Credential::OAuth`].
    OAuth,
    /// See [`Credential::Token`].
    Token,
    /// See [`Credential::Invalid`].
    Invalid,
}

impl Credential {
    /// Build a basic credential from a user name and password.
    pub fn basic(user: &str, password: &str) -> Self {
        let encoded = base64::engine::general_purpose::STANDARD.encode(format!("{user}:{password}"));
        Credential::Basic(encoded)
    }

    /// Build an OAuth credential.
    pub fn oauth(request_id: impl Into<String>, identifier: impl Into<String>) -> Self {
        Credential::OAuth {
            request_id: request_id.into(),
            identifier: identifier.into(),
        }
    }

    /// Build a Claris ID credential.
    pub fn claris_id(token: impl Into<String>) -> Self {
        Credential::ClarisId(token.into())
    }

    /// Wrap an existing session token.
    pub fn token(token: impl Into<String>) -> Self {
        Credential::Token(token.into())
    }

    /// The variant of this credential.
    pub fn kind(&self) -> CredentialKind {
        match self {
            Credential::ClarisId(_) => CredentialKind::ClarisId,
            Credential::Basic(_) => CredentialKind::Basic,
            Credential::OAuth { .. } => CredentialKind::OAuth,
            Credential::Token(_) => CredentialKind::Token,
            Credential::Invalid => CredentialKind::Invalid,
        }
    }

    /// The session token, if this is a token credential.
    pub fn session_token(&self) -> Option<&str> {
        match self {
            Credential::Token(token) => Some(token),
            _ => None,
        }
    }

    /// The headers needed to authorize a request, in the order they should
    /// be sent.
    pub fn headers(&self) -> Vec<(HeaderName, String)> {
        match self {
            Credential::ClarisId(token) => vec![(AUTHORIZATION, format!("FMID {token}"))],
            Credential::Basic(encoded) => vec![
                (AUTHORIZATION, format!("Basic {encoded}")),
                (CONTENT_TYPE, "application/json".to_string()),
            ],
            Credential::OAuth {
                request_id,
                identifier,
            } => vec![
                (OAUTH_REQUEST_ID, request_id.clone()),
                (OAUTH_IDENTIFIER, identifier.clone()),
            ],
            Credential::Token(token) => vec![(AUTHORIZATION, format!("Bearer {token}"))],
            Credential::Invalid => Vec::new(),
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::ClarisId(_) => f.write_str("ClarisId(********)"),
            Credential::Basic(_) => f.write_str("Basic(********)"),
            Credential::OAuth { request_id, .. } => f
                .debug_struct("OAuth")
                .field("request_id", request_id)
                .field("identifier", &"********")
                .finish(),
            Credential::Token(_) => f.write_str("Token(********)"),
            Credential::Invalid => f.write_str("Invalid"),
        }
    }
}

/// Credentials for external data sources, sent in the body of a login.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DataSourceAuth {
    /// One entry per external data source.
    #[serde(rename = "fmDataSource")]
    pub data_sources: Vec<DataSource>,
}

impl DataSourceAuth {
    /// An empty set of data source credentials.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a data source.
    pub fn with(mut self, database: impl Into<String>, login: DataSourceLogin) -> Self {
        self.data_sources.push(DataSource {
            database: database.into(),
            login,
        });
        self
    }
}

/// Credentials for a single external data source.
#[derive(Debug, Clone, Serialize)]
pub struct DataSource {
    /// The data source (database) name.
    pub database: String,
    /// How to log in to it.
    #[serde(flatten)]
    pub login: DataSourceLogin,
}

/// How to log in to an external data source.
#[derive(Clone, Serialize)]
#[serde(untagged)]
pub enum DataSourceLogin {
    /// A user name and password.
    Basic {
        /// The user name.
        username: String,
        /// The password.
        password: String,
    },
    /// An OAuth request id and identifier.
    OAuth {
        /// The OAuth request id.
        #[serde(rename = "oAuthRequestId")]
        request_id: String,
        /// The OAuth identifier.
        #[serde(rename = "oAuthIdentifier")]
        identifier: String,
    },
}

impl std::fmt::Debug for DataSourceLogin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataSourceLogin::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"********")
                .finish(),
            DataSourceLogin::OAuth { request_id, .. } => f
                .debug_struct("OAuth")
                .field("request_id", request_id)
                .field("identifier", &"********")
                .finish(),
        }
    }
}
