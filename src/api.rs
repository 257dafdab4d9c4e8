use std::io::Read;

use serde::{Deserialize, de::DeserializeOwned};

mod discovery;
mod endpoint;
mod error;
mod metadata;
mod paginate;
mod query;
mod request;
mod response;
mod upload;

#[cfg(test)]
pub(crate) mod testutil;

pub use discovery::*;
pub use endpoint::*;
pub use error::*;
pub use metadata::*;
pub use paginate::*;
pub use query::*;
pub use request::*;
pub use response::*;
pub use upload::*;

/// The response header a login may carry its session token in.
pub const ACCESS_TOKEN_HEADER: &str = "x-fm-data-access-token";

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(default)]
    response: Option<serde_json::Value>,
    #[serde(default)]
    messages: Vec<RawMessage>,
}

/// A response that passed the envelope checks: the status was successful
/// and every message code was `0`.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// The HTTP status.
    pub status: http::StatusCode,
    /// The session token from the response headers, if present.
    pub access_token: Option<String>,
    /// The `response` member of the body.
    pub response: Option<serde_json::Value>,
}

impl Envelope {
    /// Read and check the envelope of a response.
    pub fn from_response_parts(parts: http::response::Parts, body: impl Read) -> Result<Self, Error> {
        let access_token = parts
            .headers
            .get(ACCESS_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let raw: RawEnvelope = match serde_json::from_reader(body) {
            Ok(raw) => raw,
            Err(e) if parts.status.is_success() => {
                tracing::error!("Failed to parse API response: {e:#?}");
                return Err(Error::Decode(e));
            }
            Err(_) => return Err(TransportError::Status(parts.status).into()),
        };

        if let Some(message) = raw.messages.into_iter().find(|m| !m.is_ok()) {
            return Err(TransportError::from_raw(parts.status, message).into());
        }

        if !parts.status.is_success() {
            return Err(TransportError::Status(parts.status).into());
        }

        Ok(Self {
            status: parts.status,
            access_token,
            response: raw.response,
        })
    }

    /// Decode the `response` member. Fails with `Response("missing")` if
    /// there is none.
    pub fn into_response<T: DeserializeOwned>(self) -> Result<T, Error> {
        let value = self.response.ok_or(Error::Response("missing"))?;
        serde_json::from_value(value).map_err(|e| {
            tracing::error!("Failed to decode API response: {e:#?}");
            Error::Decode(e)
        })
    }
}

/// Implemented by types that can be read as responses from the Data API.
pub trait ApiResponse: Sized {
    /// Read the response from an [http::Response] object.
    fn from_response(resp: http::Response<impl Read>) -> Result<Self, Error> {
        let (parts, body) = resp.into_parts();
        Self::from_response_parts(parts, body)
    }

    /// Read the response from pre-parsed parts. Useful for async HTTP clients
    /// where the body must be collected before parsing.
    fn from_response_parts(parts: http::response::Parts, body: impl Read) -> Result<Self, Error> {
        Self::from_envelope(Envelope::from_response_parts(parts, body)?)
    }

    /// Interpret an envelope that has already been checked for errors.
    fn from_envelope(envelope: Envelope) -> Result<Self, Error>;
}

/// A private trait for types that deserialize json directly from the
/// `response` field of the envelope.
pub(crate) trait DataResponse: DeserializeOwned {}

impl<T: DataResponse> ApiResponse for T {
    fn from_envelope(envelope: Envelope) -> Result<Self, Error> {
        envelope.into_response()
    }
}

/// A response whose payload is ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Empty;

impl ApiResponse for Empty {
    fn from_envelope(_: Envelope) -> Result<Self, Error> {
        Ok(Empty)
    }
}

#[cfg(test)]
mod test {
    use assert_matches::assert_matches;

    use super::*;

    fn response(status: u16, body: &str) -> http::Response<&[u8]> {
        http::Response::builder()
            .status(status)
            .body(body.as_bytes())
            .unwrap()
    }

    #[test]
    fn error_code_wins_over_status() {
        let resp = response(
            401,
            r#"{"response":{},"messages":[{"code":"952","message":"Invalid FileMaker Data API token (*)"}]}"#,
        );

        let err = Empty::from_response(resp).unwrap_err();
        assert_eq!(err.kind(), Some(&ApiErrorKind::InvalidToken));
        assert_matches!(
            err,
            Error::Transport(TransportError::ErrorResponse { status, .. }) if status == 401
        );
    }

    #[test]
    fn status_without_body() {
        let err = Empty::from_response(response(502, "<html>Bad Gateway</html>")).unwrap_err();
        assert_matches!(err, Error::Transport(TransportError::Status(s)) if s == 502);
    }

    #[test]
    fn undecodable_success() {
        let err = Empty::from_response(response(200, "not json")).unwrap_err();
        assert_matches!(err, Error::Decode(_));
    }

    #[test]
    fn missing_payload() {
        let resp = response(200, r#"{"messages":[{"code":"0","message":"OK"}]}"#);
        let err = DatabaseList::from_response(resp).unwrap_err();
        assert_matches!(err, Error::Response("missing"));

        let resp = response(200, r#"{"response":null,"messages":[{"code":"0"}]}"#);
        let err = DatabaseList::from_response(resp).unwrap_err();
        assert_matches!(err, Error::Response("missing"));
    }

    #[test]
    fn access_token_header() -> anyhow::Result<()> {
        let resp = http::Response::builder()
            .status(200)
            .header("X-FM-Data-Access-Token", "from-header")
            .body(r#"{"response":{},"messages":[{"code":"0"}]}"#.as_bytes())?;

        let (parts, body) = resp.into_parts();
        let envelope = Envelope::from_response_parts(parts, body)?;
        assert_eq!(envelope.access_token.as_deref(), Some("from-header"));
        Ok(())
    }
}
