//! Record-bearing responses.
//!
//! The server is inconsistent about whether identifiers are strings or
//! numbers, so they are read as raw JSON and coerced afterwards.

use serde::{Deserialize, de::DeserializeOwned};
use serde_json::Value;

use super::{ApiResponse, Envelope, Error};

/// A page of records.
#[derive(Debug, Clone)]
pub struct RecordResponse<F, P = Value> {
    /// The records.
    pub data: Vec<Record<F, P>>,
    /// Counts and names describing the result set.
    pub data_info: DataInfo,
    /// The outcome of any scripts run with the request.
    pub script: Option<ScriptResult>,
}

/// A single record.
#[derive(Debug, Clone)]
pub struct Record<F, P = Value> {
    /// The field values.
    pub field_data: F,
    /// Related records, keyed by portal.
    pub portal_data: Option<P>,
    /// The record id.
    pub record_id: u64,
    /// The modification counter.
    pub mod_id: u64,
    /// Counts for each included portal.
    pub portal_data_info: Option<Vec<PortalDataInfo>>,
}

/// Describes the result set of a record request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataInfo {
    /// The database name.
    pub database: String,
    /// The layout name.
    pub layout: String,
    /// The table occurrence behind the layout.
    pub table: String,
    /// The number of records in the table.
    pub total_record_count: u64,
    /// The number of records in the found set.
    pub found_count: u64,
    /// The number of records in this response.
    pub returned_count: u64,
}

/// Describes the related records returned for one portal.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalDataInfo {
    /// The database name.
    pub database: String,
    /// The related table occurrence.
    pub table: String,
    /// The number of related records.
    pub found_count: u64,
    /// The number of related records in this response.
    pub returned_count: u64,
}

/// The result of creating or duplicating a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateResponse {
    /// The id of the new record.
    pub record_id: u64,
    /// Its modification counter.
    pub mod_id: u64,
    /// The outcome of any scripts run with the request.
    pub script: Option<ScriptResult>,
}

/// The result of editing a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditRecordResponse {
    /// The new modification counter.
    pub mod_id: u64,
    /// A related record created through a portal, if any.
    pub new_portal_record_info: Option<CreatedPortalRecord>,
    /// The outcome of any scripts run with the request.
    pub script: Option<ScriptResult>,
}

/// A related record created as part of an edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedPortalRecord {
    /// The related table occurrence.
    pub table_name: String,
    /// The id of the related record.
    pub record_id: u64,
    /// Its modification counter.
    pub mod_id: u64,
}

/// The outcome of the scripts that ran as part of a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptResult {
    /// The script run after the request.
    pub main: Option<ScriptOutcome>,
    /// The script run before the request.
    pub pre_request: Option<ScriptOutcome>,
    /// The script run before sorting.
    pub pre_sort: Option<ScriptOutcome>,
}

/// The error code and result of one script.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptOutcome {
    /// The script's error code, `"0"` on success.
    pub error: Option<String>,
    /// The value the script returned.
    pub result: Option<String>,
}

/// A response that carries nothing but a script result, such as a
/// delete or a script execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptResponse {
    /// The outcome of any scripts run with the request.
    pub script: Option<ScriptResult>,
}

/// The session token returned by a login.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(pub String);

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionToken(********)")
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawScriptFields {
    #[serde(rename = "scriptError")]
    error: Option<Value>,
    #[serde(rename = "scriptResult")]
    result: Option<Value>,
    #[serde(rename = "scriptError.prerequest")]
    pre_request_error: Option<Value>,
    #[serde(rename = "scriptResult.prerequest")]
    pre_request_result: Option<Value>,
    #[serde(rename = "scriptError.presort")]
    pre_sort_error: Option<Value>,
    #[serde(rename = "scriptResult.presort")]
    pre_sort_result: Option<Value>,
}

impl RawScriptFields {
    fn into_result(self) -> Option<ScriptResult> {
        let main = outcome(self.error, self.result);
        let pre_request = outcome(self.pre_request_error, self.pre_request_result);
        let pre_sort = outcome(self.pre_sort_error, self.pre_sort_result);

        if main.is_none() && pre_request.is_none() && pre_sort.is_none() {
            return None;
        }

        Some(ScriptResult {
            main,
            pre_request,
            pre_sort,
        })
    }
}

fn outcome(error: Option<Value>, result: Option<Value>) -> Option<ScriptOutcome> {
    let error = error.and_then(value_string);
    let result = result.and_then(value_string);
    if error.is_none() && result.is_none() {
        return None;
    }

    Some(ScriptOutcome { error, result })
}

fn value_string(v: Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// Coerce an identifier that may be a number or a numeric string.
pub(crate) fn coerce_id(field: &'static str, value: &Value) -> Result<u64, Error> {
    let id = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };

    id.ok_or_else(|| Error::MalformedIdentifier {
        field,
        value: value.to_string(),
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRecord<F, P> {
    field_data: F,
    portal_data: Option<P>,
    record_id: Value,
    mod_id: Value,
    #[serde(default)]
    portal_data_info: Option<Vec<PortalDataInfo>>,
}

impl<F, P> TryFrom<RawRecord<F, P>> for Record<F, P> {
    type Error = Error;

    fn try_from(raw: RawRecord<F, P>) -> Result<Self, Self::Error> {
        Ok(Record {
            record_id: coerce_id("recordId", &raw.record_id)?,
            mod_id: coerce_id("modId", &raw.mod_id)?,
            field_data: raw.field_data,
            portal_data: raw.portal_data,
            portal_data_info: raw.portal_data_info,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRecordResponse<F, P> {
    data: Vec<RawRecord<F, P>>,
    data_info: DataInfo,
    #[serde(flatten)]
    script: RawScriptFields,
}

impl<F, P> ApiResponse for RecordResponse<F, P>
where
    F: DeserializeOwned,
    P: DeserializeOwned,
{
    fn from_envelope(envelope: Envelope) -> Result<Self, Error> {
        let raw: RawRecordResponse<F, P> = envelope.into_response()?;
        let data = raw
            .data
            .into_iter()
            .map(Record::try_from)
            .collect::<Result<_, _>>()?;

        Ok(RecordResponse {
            data,
            data_info: raw.data_info,
            script: raw.script.into_result(),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCreateResponse {
    record_id: Value,
    mod_id: Value,
    #[serde(flatten)]
    script: RawScriptFields,
}

impl ApiResponse for CreateResponse {
    fn from_envelope(envelope: Envelope) -> Result<Self, Error> {
        let raw: RawCreateResponse = envelope.into_response()?;
        Ok(CreateResponse {
            record_id: coerce_id("recordId", &raw.record_id)?,
            mod_id: coerce_id("modId", &raw.mod_id)?,
            script: raw.script.into_result(),
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCreatedPortalRecord {
    table_name: String,
    record_id: Value,
    mod_id: Value,
}

impl TryFrom<RawCreatedPortalRecord> for CreatedPortalRecord {
    type Error = Error;

    fn try_from(raw: RawCreatedPortalRecord) -> Result<Self, Self::Error> {
        Ok(CreatedPortalRecord {
            table_name: raw.table_name,
            record_id: coerce_id("recordId", &raw.record_id)?,
            mod_id: coerce_id("modId", &raw.mod_id)?,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawEditRecordResponse {
    mod_id: Value,
    #[serde(default)]
    new_portal_record_info: Option<RawCreatedPortalRecord>,
    #[serde(flatten)]
    script: RawScriptFields,
}

impl ApiResponse for EditRecordResponse {
    fn from_envelope(envelope: Envelope) -> Result<Self, Error> {
        let raw: RawEditRecordResponse = envelope.into_response()?;
        Ok(EditRecordResponse {
            mod_id: coerce_id("modId", &raw.mod_id)?,
            new_portal_record_info: raw
                .new_portal_record_info
                .map(CreatedPortalRecord::try_from)
                .transpose()?,
            script: raw.script.into_result(),
        })
    }
}

impl ApiResponse for ScriptResponse {
    fn from_envelope(envelope: Envelope) -> Result<Self, Error> {
        // Deletes answer with an empty object, or nothing at all.
        let Some(response) = envelope.response else {
            return Ok(ScriptResponse::default());
        };

        let raw: RawScriptFields = serde_json::from_value(response).map_err(Error::Decode)?;
        Ok(ScriptResponse {
            script: raw.into_result(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawAccessToken {
    token: Option<String>,
}

impl ApiResponse for SessionToken {
    fn from_envelope(envelope: Envelope) -> Result<Self, Error> {
        if let Some(token) = envelope.access_token.clone() {
            return Ok(SessionToken(token));
        }

        let raw: RawAccessToken = envelope.into_response()?;
        raw.token.map(SessionToken).ok_or(Error::Response("missing"))
    }
}
