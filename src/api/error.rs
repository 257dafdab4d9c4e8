use std::str::FromStr as _;

use serde::Deserialize;

/// An error returned by any client operation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The handle is not attached to a server or database.
    #[error("Not connected to a server")]
    NotConnected,
    /// The credential cannot be used for this request.
    #[error("Credential is not valid for this request")]
    InvalidCredential,
    /// A login was attempted while already holding a session token.
    #[error("Already authenticated with a session token")]
    AlreadyAuthenticated,
    /// The request requires a session token.
    #[error("Credential does not contain a session token")]
    MissingToken,
    /// Query parameters were supplied alongside a JSON body.
    #[error("Query parameters cannot be sent with a request body")]
    QueryWithBody,
    /// The transport failed, or the server returned an error.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The server responded successfully, but without the expected data.
    #[error("Response {0}")]
    Response(&'static str),
    /// An identifier in the response was not numeric.
    #[error("Malformed {field}: {value}")]
    MalformedIdentifier {
        /// The name of the identifier field.
        field: &'static str,
        /// The value that was received.
        value: String,
    },
    /// A request body could not be serialized.
    #[error("Failed to encode request body")]
    Encode(#[source] serde_json::Error),
    /// The response body could not be decoded.
    #[error("Failed to decode response")]
    Decode(#[source] serde_json::Error),
    /// The request could not be assembled.
    #[error("Failed to build request")]
    Request(#[from] http::Error),
    /// A credential contained characters that cannot be sent in a header.
    #[error("Invalid header value")]
    InvalidHeader(#[from] http::header::InvalidHeaderValue),
}

/// A failure reported by the transport or the server.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The API responded with an application-level error code.
    ErrorResponse {
        /// The HTTP status on the overall response.
        status: http::StatusCode,
        /// The error code from the API.
        kind: ApiErrorKind,
        /// A longer description of the error encountered.
        message: Option<String>,
    },
    /// The API response did not contain a code, but the HTTP status was non-200.
    Status(http::StatusCode),
    /// The request never completed.
    Connection(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::ErrorResponse { kind, message, .. } => {
                write!(f, "{kind}")?;
                if let Some(message) = &message {
                    write!(f, ": {message}")?;
                }
            }
            TransportError::Status(status) => {
                write!(f, "{status}")?;
            }
            TransportError::Connection(e) => {
                write!(f, "Connection failed: {e}")?;
            }
        }

        Ok(())
    }
}

impl TransportError {
    /// Wrap an error from an HTTP client.
    pub fn connection(e: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        TransportError::Connection(e.into())
    }

    /// The API error code, if the server sent one.
    pub fn kind(&self) -> Option<&ApiErrorKind> {
        match self {
            TransportError::ErrorResponse { kind, .. } => Some(kind),
            _ => None,
        }
    }
}

impl Error {
    /// The API error code, if the server sent one.
    pub fn kind(&self) -> Option<&ApiErrorKind> {
        match self {
            Error::Transport(e) => e.kind(),
            _ => None,
        }
    }
}

/// Indicates that the error code was unrecognized.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Invalid error kind: {0}")]
pub struct InvalidErrorKind(String);

macro_rules! api_error_kinds {
    ($($code:literal => $variant:ident),* $(,)?) => {
        /// An error code from the API.
        #[derive(Debug, Clone, PartialEq, Eq)]
        #[non_exhaustive]
        pub enum ApiErrorKind {
            $(
                #[doc = $code]
                $variant,
            )*
            /// An unknown error code.
            Unknown(String),
        }

        impl std::fmt::Display for ApiErrorKind {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(match self {
                    $(ApiErrorKind::$variant => stringify!($variant),)*
                    ApiErrorKind::Unknown(code) => code,
                })
            }
        }

        impl ApiErrorKind {
            /// The numeric code, as sent by the server.
            pub fn code(&self) -> &str {
                match self {
                    $(ApiErrorKind::$variant => $code,)*
                    ApiErrorKind::Unknown(code) => code,
                }
            }
        }

        impl std::str::FromStr for ApiErrorKind {
            type Err = InvalidErrorKind;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(match s {
                    $($code => ApiErrorKind::$variant,)*
                    _ => return Err(InvalidErrorKind(s.to_string())),
                })
            }
        }
    };
}

api_error_kinds! {
    "-1" => UnknownError,
    "100" => FileMissing,
    "101" => RecordMissing,
    "102" => FieldMissing,
    "104" => ScriptMissing,
    "105" => LayoutMissing,
    "106" => TableMissing,
    "200" => AccessDenied,
    "212" => InvalidAccount,
    "301" => RecordInUse,
    "306" => ModIdMismatch,
    "401" => NoRecordsMatch,
    "504" => ValueNotUnique,
    "802" => UnableToOpenFile,
    "952" => InvalidToken,
    "958" => ParameterMissing,
    "960" => InvalidParameter,
}

/// An entry in the `messages` list of a response.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawMessage {
    code: String,
    message: Option<String>,
}

impl RawMessage {
    pub(crate) fn is_ok(&self) -> bool {
        self.code == "0"
    }
}

impl TransportError {
    pub(crate) fn from_raw(status: http::StatusCode, raw: RawMessage) -> Self {
        let kind = ApiErrorKind::from_str(&raw.code).unwrap_or(ApiErrorKind::Unknown(raw.code));

        TransportError::ErrorResponse {
            status,
            kind,
            message: raw.message,
        }
    }
}
