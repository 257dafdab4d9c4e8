//! The static table of Data API endpoints.

use percent_encoding::{PercentEncode, utf8_percent_encode};

use crate::api::query::UNRESERVED;

/// Which credentials an endpoint can be called with. See
/// [`authorize`](crate::api::authorize) for the full table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
    /// No authorization is sent.
    Anonymous,
    /// Establishes a session, or otherwise requires a non-token login
    /// credential.
    Establishing,
    /// Requires a session token.
    Session,
    /// Container uploads, which accept any real credential.
    Upload,
}

/// A single logical Data API operation, carrying its path parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Server product information.
    ProductInfo,
    /// The databases hosted on the server.
    DatabaseNames,
    /// The layouts of a database.
    LayoutNames {
        /// The database name.
        database: String,
    },
    /// The scripts of a database.
    ScriptNames {
        /// The database name.
        database: String,
    },
    /// Field, portal and value list metadata for a layout.
    LayoutMetadata {
        /// The database name.
        database: String,
        /// The layout name.
        layout: String,
    },
    /// The metadata endpoint used by older servers.
    LegacyLayoutMetadata {
        /// The database name.
        database: String,
        /// The layout name.
        layout: String,
    },
    /// Log in to a database.
    CreateSession {
        /// The database name.
        database: String,
    },
    /// Log out of a database.
    DeleteSession {
        /// The database name.
        database: String,
        /// The session token to invalidate.
        token: String,
    },
    /// Check that a session token is still valid.
    ValidateSession,
    /// A range of records.
    GetRecords {
        /// The database name.
        database: String,
        /// The layout name.
        layout: String,
    },
    /// Create a record.
    CreateRecord {
        /// The database name.
        database: String,
        /// The layout name.
        layout: String,
    },
    /// A single record.
    GetRecord {
        /// The database name.
        database: String,
        /// The layout name.
        layout: String,
        /// The record id.
        record_id: u64,
    },
    /// Edit a record.
    EditRecord {
        /// The database name.
        database: String,
        /// The layout name.
        layout: String,
        /// The record id.
        record_id: u64,
    },
    /// Delete a record.
    DeleteRecord {
        /// The database name.
        database: String,
        /// The layout name.
        layout: String,
        /// The record id.
        record_id: u64,
    },
    /// Duplicate a record.
    DuplicateRecord {
        /// The database name.
        database: String,
        /// The layout name.
        layout: String,
        /// The record id.
        record_id: u64,
    },
    /// Run a find request.
    FindRecords {
        /// The database name.
        database: String,
        /// The layout name.
        layout: String,
    },
    /// Run a script.
    ExecuteScript {
        /// The database name.
        database: String,
        /// The layout name.
        layout: String,
        /// The script name.
        script: String,
    },
    /// Upload a file into a container field.
    UploadToContainer {
        /// The database name.
        database: String,
        /// The layout name.
        layout: String,
        /// The record id.
        record_id: u64,
        /// The container field name.
        field: String,
        /// The field repetition. Defaults to 1.
        repetition: Option<u32>,
    },
    /// Set global field values for the session.
    SetGlobalFields {
        /// The database name.
        database: String,
    },
}

impl Endpoint {
    /// The path of the endpoint, relative to the versioned API root. Path
    /// parameters are percent-encoded.
    pub fn path(&self) -> String {
        use Endpoint::*;

        match self {
            ProductInfo => "/productInfo".to_string(),
            DatabaseNames => "/databases".to_string(),
            LayoutNames { database } => format!("/databases/{}/layouts", seg(database)),
            ScriptNames { database } => format!("/databases/{}/scripts", seg(database)),
            LayoutMetadata { database, layout } => {
                format!("/databases/{}/layouts/{}", seg(database), seg(layout))
            }
            LegacyLayoutMetadata { database, layout } => format!(
                "/databases/{}/layouts/{}/metadata",
                seg(database),
                seg(layout)
            ),
            CreateSession { database } => format!("/databases/{}/sessions", seg(database)),
            DeleteSession { database, token } => {
                format!("/databases/{}/sessions/{}", seg(database), seg(token))
            }
            ValidateSession => "/validateSession".to_string(),
            GetRecords { database, layout } | CreateRecord { database, layout } => format!(
                "/databases/{}/layouts/{}/records",
                seg(database),
                seg(layout)
            ),
            GetRecord {
                database,
                layout,
                record_id,
            }
            | EditRecord {
                database,
                layout,
                record_id,
            }
            | DeleteRecord {
                database,
                layout,
                record_id,
            }
            | DuplicateRecord {
                database,
                layout,
                record_id,
            } => format!(
                "/databases/{}/layouts/{}/records/{record_id}",
                seg(database),
                seg(layout)
            ),
            FindRecords { database, layout } => format!(
                "/databases/{}/layouts/{}/_find",
                seg(database),
                seg(layout)
            ),
            ExecuteScript {
                database,
                layout,
                script,
            } => format!(
                "/databases/{}/layouts/{}/script/{}",
                seg(database),
                seg(layout),
                seg(script)
            ),
            UploadToContainer {
                database,
                layout,
                record_id,
                field,
                repetition,
            } => format!(
                "/databases/{}/layouts/{}/records/{record_id}/containers/{}/{}",
                seg(database),
                seg(layout),
                seg(field),
                repetition.unwrap_or(1)
            ),
            SetGlobalFields { database } => format!("/databases/{}/globals/", seg(database)),
        }
    }

    /// The HTTP method of the endpoint.
    pub fn method(&self) -> http::Method {
        use Endpoint::*;

        match self {
            ProductInfo
            | DatabaseNames
            | LayoutNames { .. }
            | ScriptNames { .. }
            | LayoutMetadata { .. }
            | LegacyLayoutMetadata { .. }
            | ValidateSession
            | GetRecords { .. }
            | GetRecord { .. }
            | ExecuteScript { .. } => http::Method::GET,
            CreateSession { .. }
            | CreateRecord { .. }
            | DuplicateRecord { .. }
            | FindRecords { .. }
            | UploadToContainer { .. } => http::Method::POST,
            EditRecord { .. } | SetGlobalFields { .. } => http::Method::PATCH,
            DeleteSession { .. } | DeleteRecord { .. } => http::Method::DELETE,
        }
    }

    /// The access class of the endpoint.
    pub fn access(&self) -> Access {
        use Endpoint::*;

        match self {
            ProductInfo => Access::Anonymous,
            CreateSession { .. } | DatabaseNames => Access::Establishing,
            UploadToContainer { .. } => Access::Upload,
            LayoutNames { .. }
            | ScriptNames { .. }
            | LayoutMetadata { .. }
            | LegacyLayoutMetadata { .. }
            | DeleteSession { .. }
            | ValidateSession
            | GetRecords { .. }
            | CreateRecord { .. }
            | GetRecord { .. }
            | EditRecord { .. }
            | DeleteRecord { .. }
            | DuplicateRecord { .. }
            | FindRecords { .. }
            | ExecuteScript { .. }
            | SetGlobalFields { .. } => Access::Session,
        }
    }
}

fn seg(s: &str) -> PercentEncode<'_> {
    utf8_percent_encode(s, UNRESERVED)
}
