//! Turning an endpoint, a credential and its parameters into an
//! [`http::Request`].

use http::header::{CONTENT_LENGTH, CONTENT_TYPE, HeaderValue, USER_AGENT};
use serde::Serialize;
use tracing::debug;

use crate::{
    Credential, CredentialKind, Server,
    api::{Access, Endpoint, Error, QueryParams},
};

/// The body of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    /// A serialized JSON document.
    Json(String),
    /// An encoded `multipart/form-data` document.
    Multipart {
        /// The boundary between parts.
        boundary: String,
        /// The encoded parts.
        data: Vec<u8>,
    },
}

impl RequestBody {
    /// Serialize a value as a JSON body.
    pub fn json(value: &impl Serialize) -> Result<Self, Error> {
        serde_json::to_string(value)
            .map(RequestBody::Json)
            .map_err(Error::Encode)
    }

    fn content_type(&self) -> String {
        match self {
            RequestBody::Json(_) => "application/json".to_string(),
            RequestBody::Multipart { boundary, .. } => {
                format!("multipart/form-data; boundary={boundary}")
            }
        }
    }

    fn into_bytes(self) -> Vec<u8> {
        match self {
            RequestBody::Json(s) => s.into_bytes(),
            RequestBody::Multipart { data, .. } => data,
        }
    }
}

/// Check whether a credential may be used for an endpoint's access class.
///
/// | Access       | Invalid           | Basic, ClarisId, OAuth | Token                  |
/// |--------------|-------------------|------------------------|------------------------|
/// | Anonymous    | ok                | ok                     | ok                     |
/// | Establishing | InvalidCredential | ok                     | AlreadyAuthenticated   |
/// | Session      | MissingToken      | MissingToken           | ok                     |
/// | Upload       | InvalidCredential | ok                     | ok                     |
pub fn authorize(access: Access, credential: CredentialKind) -> Result<(), Error> {
    use CredentialKind::*;

    match (access, credential) {
        (Access::Anonymous, _) => Ok(()),

        (Access::Establishing, Invalid) => Err(Error::InvalidCredential),
        (Access::Establishing, Token) => Err(Error::AlreadyAuthenticated),
        (Access::Establishing, Basic | ClarisId | OAuth) => Ok(()),

        (Access::Session, Token) => Ok(()),
        (Access::Session, Invalid | Basic | ClarisId | OAuth) => Err(Error::MissingToken),

        (Access::Upload, Invalid) => Err(Error::InvalidCredential),
        (Access::Upload, Basic | ClarisId | OAuth | Token) => Ok(()),
    }
}

/// Build a request for an endpoint.
///
/// Exactly one of a query string or a JSON body is sent. Passing a
/// non-empty query alongside a JSON body fails with
/// [`Error::QueryWithBody`]; multipart uploads may carry both.
pub fn build_request(
    server: Option<&Server>,
    credential: &Credential,
    endpoint: &Endpoint,
    query: Option<&QueryParams>,
    body: Option<RequestBody>,
) -> Result<http::Request<Vec<u8>>, Error> {
    let Some(server) = server else {
        return Err(Error::NotConnected);
    };

    let access = endpoint.access();
    authorize(access, credential.kind())?;

    let query = query.filter(|q| !q.is_empty());
    if query.is_some() && matches!(body, Some(RequestBody::Json(_))) {
        return Err(Error::QueryWithBody);
    }

    let config = server.config();
    let mut path = format!("{}{}{}", config.root_path, config.version, endpoint.path());
    if let Some(query) = query {
        path.push('?');
        path.push_str(&query.to_query_string());
    }

    let uri = http::Uri::builder()
        .scheme(config.scheme.as_str())
        .authority(server.host())
        .path_and_query(path)
        .build()?;

    let method = endpoint.method();
    debug!(%method, %uri, ?access, "building request");

    let (content_type, body) = match body {
        Some(body) => (Some(body.content_type()), body.into_bytes()),
        None => (None, Vec::new()),
    };

    let content_length = body.len();
    let mut req = http::Request::new(body);
    *req.method_mut() = method;
    *req.uri_mut() = uri;

    let headers = req.headers_mut();
    headers.insert(USER_AGENT, HeaderValue::from_str(&config.user_agent)?);
    if access != Access::Anonymous {
        for (name, value) in credential.headers() {
            headers.insert(name, HeaderValue::from_str(&value)?);
        }
    }

    if let Some(content_type) = content_type {
        headers.insert(CONTENT_TYPE, HeaderValue::from_str(&content_type)?);
        headers.insert(CONTENT_LENGTH, HeaderValue::from(content_length));
    }

    Ok(req)
}
