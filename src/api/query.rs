//! Query strings and request bodies for record operations.
//!
//! The Data API flattens nested options into dynamically named keys: a
//! portal's pagination travels as `_limit.<portal>` in a query string, or
//! `limit.<portal>` in a JSON body. Everything here writes keys in a fixed
//! order, and leaves out any value that was not set.

use std::collections::BTreeMap;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Serialize, ser::SerializeMap as _};

/// Every byte outside the RFC 3986 unreserved set.
pub(crate) const UNRESERVED: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// An ordered list of query string parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    /// An empty parameter list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a parameter.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push((key.into(), value.into()));
    }

    /// Append a parameter if the value is set.
    pub fn push_opt(&mut self, key: impl Into<String>, value: Option<impl ToString>) {
        if let Some(value) = value {
            self.push(key, value.to_string());
        }
    }

    /// Whether there are no parameters.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The number of parameters.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// The first value for a key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Iterate over the parameters in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// The percent-encoded query string, without a leading `?`.
    pub fn to_query_string(&self) -> String {
        let mut out = String::new();
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                out.push('&');
            }

            out.extend(utf8_percent_encode(k, UNRESERVED));
            out.push('=');
            out.extend(utf8_percent_encode(v, UNRESERVED));
        }

        out
    }
}

impl Extend<(String, String)> for QueryParams {
    fn extend<I: IntoIterator<Item = (String, String)>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl IntoIterator for QueryParams {
    type Item = (String, String);
    type IntoIter = std::vec::IntoIter<(String, String)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Where a dynamically keyed value is going to be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStyle {
    /// A query string, where keys carry a leading underscore.
    Query,
    /// A JSON body.
    Body,
}

/// Expand per-portal pagination into dynamically named keys, in the order
/// the portals were given: for each portal, its limit and then its offset.
pub fn portal_keys(portals: &[PortalRequest], style: KeyStyle) -> Vec<(String, u32)> {
    let prefix = match style {
        KeyStyle::Query => "_",
        KeyStyle::Body => "",
    };

    let mut keys = Vec::new();
    for portal in portals {
        if let Some(limit) = portal.limit {
            keys.push((format!("{prefix}limit.{}", portal.name), limit));
        }

        if let Some(offset) = portal.offset {
            keys.push((format!("{prefix}offset.{}", portal.name), offset));
        }
    }

    keys
}

fn portal_names(portals: &[PortalRequest]) -> Vec<&str> {
    portals.iter().map(|p| p.name.as_str()).collect()
}

/// Scripts to run as part of a request.
///
/// The main script runs after the request; the pre-request script runs
/// before it, and the pre-sort script runs before any sort is applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptQuery {
    /// The script to run after the request.
    pub script: Option<String>,
    /// The parameter passed to the main script.
    pub param: Option<String>,
    /// The script to run before the request.
    pub pre_request: Option<String>,
    /// The parameter passed to the pre-request script.
    pub pre_request_param: Option<String>,
    /// The script to run before sorting.
    pub pre_sort: Option<String>,
    /// The parameter passed to the pre-sort script.
    pub pre_sort_param: Option<String>,
}

impl ScriptQuery {
    /// Run a script after the request.
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: Some(script.into()),
            ..Default::default()
        }
    }

    /// Set the parameter for the main script.
    pub fn param(mut self, param: impl Into<String>) -> Self {
        self.param = Some(param.into());
        self
    }

    /// Run a script before the request.
    pub fn pre_request(mut self, script: impl Into<String>) -> Self {
        self.pre_request = Some(script.into());
        self
    }

    /// Set the parameter for the pre-request script.
    pub fn pre_request_param(mut self, param: impl Into<String>) -> Self {
        self.pre_request_param = Some(param.into());
        self
    }

    /// Run a script before sorting.
    pub fn pre_sort(mut self, script: impl Into<String>) -> Self {
        self.pre_sort = Some(script.into());
        self
    }

    /// Set the parameter for the pre-sort script.
    pub fn pre_sort_param(mut self, param: impl Into<String>) -> Self {
        self.pre_sort_param = Some(param.into());
        self
    }

    /// The keys that are set, in wire order. The same keys are used in query
    /// strings and JSON bodies.
    pub fn entries(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("script", &self.script),
            ("script.param", &self.param),
            ("script.prerequest", &self.pre_request),
            ("script.prerequest.param", &self.pre_request_param),
            ("script.presort", &self.pre_sort),
            ("script.presort.param", &self.pre_sort_param),
        ]
        .into_iter()
        .filter_map(|(k, v)| v.as_deref().map(|v| (k, v)))
    }

    /// Encode as query string parameters.
    pub fn query_params(&self) -> QueryParams {
        self.entries().collect()
    }
}

impl Serialize for ScriptQuery {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        for (k, v) in self.entries() {
            map.serialize_entry(k, v)?;
        }

        map.end()
    }
}

/// The direction of a sort.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Smallest first.
    #[default]
    Ascend,
    /// Largest first.
    Descend,
}

/// Sort by a single field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SortQuery {
    /// The field to sort by.
    pub field_name: String,
    /// The sort direction.
    pub sort_order: SortOrder,
}

impl SortQuery {
    /// Sort ascending by a field.
    pub fn ascend(field_name: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            sort_order: SortOrder::Ascend,
        }
    }

    /// Sort descending by a field.
    pub fn descend(field_name: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            sort_order: SortOrder::Descend,
        }
    }
}

fn sort_string(sort: &[SortQuery]) -> String {
    serde_json::to_string(sort).expect("JSON serialization should be infallible")
}

/// Portal data to include in a response, with optional pagination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalRequest {
    /// The portal (or related table occurrence) name.
    pub name: String,
    /// The maximum number of related records to return.
    pub limit: Option<u32>,
    /// The first related record to return (1-based).
    pub offset: Option<u32>,
}

impl PortalRequest {
    /// Include a portal, using the server's default pagination.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            limit: None,
            offset: None,
        }
    }

    /// Limit the number of related records.
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skip related records.
    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// Options for listing records, or fetching a single one. Sent as a query
/// string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordQuery {
    /// Scripts to run.
    pub script: Option<ScriptQuery>,
    /// A different layout to shape the response with.
    pub layout_response: Option<String>,
    /// Portals to include.
    pub portals: Vec<PortalRequest>,
    /// The first record to return (1-based).
    pub offset: Option<u32>,
    /// The maximum number of records to return.
    pub limit: Option<u32>,
    /// The sort to apply.
    pub sort: Vec<SortQuery>,
}

impl RecordQuery {
    /// An empty query.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run scripts as part of the request.
    pub fn script(mut self, script: ScriptQuery) -> Self {
        self.script = Some(script);
        self
    }

    /// Shape the response with a different layout.
    pub fn layout_response(mut self, layout: impl Into<String>) -> Self {
        self.layout_response = Some(layout.into());
        self
    }

    /// Include a portal.
    pub fn portal(mut self, portal: PortalRequest) -> Self {
        self.portals.push(portal);
        self
    }

    /// Set the first record to return.
    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Set the maximum number of records.
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Add a sort.
    pub fn sort(mut self, sort: SortQuery) -> Self {
        self.sort.push(sort);
        self
    }

    /// Encode as query string parameters.
    pub fn query_params(&self) -> QueryParams {
        self.params(true)
    }

    /// Encode the options that apply to a single record: scripts, portals
    /// and `layout.response`. The offset, limit and sort are left out.
    pub fn record_params(&self) -> QueryParams {
        self.params(false)
    }

    fn params(&self, range: bool) -> QueryParams {
        let mut params = QueryParams::new();
        if let Some(script) = &self.script {
            params.extend(script.query_params());
        }

        params.push_opt("layout.response", self.layout_response.as_deref());

        if !self.portals.is_empty() {
            let names = serde_json::to_string(&portal_names(&self.portals))
                .expect("JSON serialization should be infallible");
            params.push("portal", names);
            for (key, value) in portal_keys(&self.portals, KeyStyle::Query) {
                params.push(key, value.to_string());
            }
        }

        if !range {
            return params;
        }

        params.push_opt("_offset", self.offset);
        params.push_opt("_limit", self.limit);

        if !self.sort.is_empty() {
            params.push("_sort", sort_string(&self.sort));
        }

        params
    }
}

/// A single find request: field names mapped to match criteria.
pub type FindRequest = BTreeMap<String, String>;

/// A find, sent as a JSON body. Records matching any of the requests are
/// returned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindQuery {
    /// The find requests.
    pub query: Vec<FindRequest>,
    /// The sort to apply.
    pub sort: Vec<SortQuery>,
    /// Scripts to run.
    pub script: Option<ScriptQuery>,
    /// The first record to return (1-based).
    pub offset: Option<u32>,
    /// The maximum number of records to return.
    pub limit: Option<u32>,
    /// A different layout to shape the response with.
    pub layout_response: Option<String>,
    /// Portals to include.
    pub portals: Vec<PortalRequest>,
}

impl FindQuery {
    /// A find with the given requests.
    pub fn new(query: Vec<FindRequest>) -> Self {
        Self {
            query,
            ..Default::default()
        }
    }

    /// Add a find request from field/criteria pairs.
    pub fn request<K, V>(mut self, criteria: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.query.push(
            criteria
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    /// Add a sort.
    pub fn sort(mut self, sort: SortQuery) -> Self {
        self.sort.push(sort);
        self
    }

    /// Run scripts as part of the request.
    pub fn script(mut self, script: ScriptQuery) -> Self {
        self.script = Some(script);
        self
    }

    /// Set the first record to return.
    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Set the maximum number of records.
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Shape the response with a different layout.
    pub fn layout_response(mut self, layout: impl Into<String>) -> Self {
        self.layout_response = Some(layout.into());
        self
    }

    /// Include a portal.
    pub fn portal(mut self, portal: PortalRequest) -> Self {
        self.portals.push(portal);
        self
    }
}

impl Serialize for FindQuery {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("query", &self.query)?;
        if !self.sort.is_empty() {
            map.serialize_entry("sort", &self.sort)?;
        }

        if let Some(offset) = self.offset {
            map.serialize_entry("offset", &offset)?;
        }

        if let Some(limit) = self.limit {
            map.serialize_entry("limit", &limit)?;
        }

        if let Some(layout) = &self.layout_response {
            map.serialize_entry("layout.response", layout)?;
        }

        if !self.portals.is_empty() {
            map.serialize_entry("portal", &portal_names(&self.portals))?;
            for (key, value) in portal_keys(&self.portals, KeyStyle::Body) {
                map.serialize_entry(&key, &value)?;
            }
        }

        if let Some(script) = &self.script {
            for (k, v) in script.entries() {
                map.serialize_entry(k, v)?;
            }
        }

        map.end()
    }
}

/// Field data for creating or editing a record, sent as a JSON body.
///
/// `F` is the field data, and `P` is the value written for each portal
/// table (usually a list of related rows).
#[derive(Debug, Clone, PartialEq)]
pub struct EditRecord<F, P = Vec<serde_json::Value>> {
    /// The field data.
    pub field_data: F,
    /// Related records to create or edit, by portal name.
    pub portal_data: Option<BTreeMap<String, P>>,
    /// Only apply the edit if the record's mod id still matches.
    pub mod_id: Option<u64>,
    /// Scripts to run.
    pub script: Option<ScriptQuery>,
    /// A different layout to shape the response with.
    pub layout_response: Option<String>,
}

impl<F> EditRecord<F> {
    /// Field data with no portal edits.
    pub fn new(field_data: F) -> Self {
        Self::with_portals(field_data, None)
    }
}

impl<F, P> EditRecord<F, P> {
    /// Field data plus portal edits.
    pub fn with_portals(field_data: F, portal_data: Option<BTreeMap<String, P>>) -> Self {
        Self {
            field_data,
            portal_data,
            mod_id: None,
            script: None,
            layout_response: None,
        }
    }

    /// Add data for a portal.
    pub fn portal(mut self, name: impl Into<String>, data: P) -> Self {
        self.portal_data
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), data);
        self
    }

    /// Guard the edit with a mod id.
    pub fn mod_id(mut self, mod_id: u64) -> Self {
        self.mod_id = Some(mod_id);
        self
    }

    /// Run scripts as part of the request.
    pub fn script(mut self, script: ScriptQuery) -> Self {
        self.script = Some(script);
        self
    }

    /// Shape the response with a different layout.
    pub fn layout_response(mut self, layout: impl Into<String>) -> Self {
        self.layout_response = Some(layout.into());
        self
    }
}

impl<F: Serialize, P: Serialize> Serialize for EditRecord<F, P> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("fieldData", &self.field_data)?;
        if let Some(portal_data) = &self.portal_data {
            map.serialize_entry("portalData", portal_data)?;
        }

        // The server expects the mod id as a string.
        if let Some(mod_id) = self.mod_id {
            map.serialize_entry("modId", &mod_id.to_string())?;
        }

        if let Some(layout) = &self.layout_response {
            map.serialize_entry("layout.response", layout)?;
        }

        if let Some(script) = &self.script {
            for (k, v) in script.entries() {
                map.serialize_entry(k, v)?;
            }
        }

        map.end()
    }
}

/// Global field values to set for the rest of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GlobalFields {
    /// Fully qualified field names (`Table::Field`) mapped to values.
    #[serde(rename = "globalFields")]
    pub fields: BTreeMap<String, String>,
}

impl GlobalFields {
    /// No fields.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field.
    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for GlobalFields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            fields: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}


#[cfg(test)]
mod property_tests {
    use std::collections::{BTreeSet, HashSet};

    use proptest::prelude::*;

    use super::*;

    fn portals() -> impl Strategy<Value = Vec<PortalRequest>> {
        prop::collection::vec(
            (
                "[A-Za-z][A-Za-z0-9]{0,7}",
                any::<Option<u32>>(),
                any::<Option<u32>>(),
            ),
            0..5,
        )
        .prop_map(|raw| {
            let mut seen = HashSet::new();
            raw.into_iter()
                .filter(|(name, _, _)| seen.insert(name.clone()))
                .map(|(name, limit, offset)| PortalRequest {
                    name,
                    limit,
                    offset,
                })
                .collect()
        })
    }

    fn sorts() -> impl Strategy<Value = Vec<SortQuery>> {
        prop::collection::vec(("[A-Za-z]{1,8}", any::<bool>()), 0..4).prop_map(|raw| {
            raw.into_iter()
                .map(|(field, descend)| {
                    if descend {
                        SortQuery::descend(field)
                    } else {
                        SortQuery::ascend(field)
                    }
                })
                .collect()
        })
    }

    fn scripts() -> impl Strategy<Value = ScriptQuery> {
        let value = || proptest::option::of("[a-z]{1,5}");
        (value(), value(), value(), value(), value(), value()).prop_map(
            |(script, param, pre_request, pre_request_param, pre_sort, pre_sort_param)| {
                ScriptQuery {
                    script,
                    param,
                    pre_request,
                    pre_request_param,
                    pre_sort,
                    pre_sort_param,
                }
            },
        )
    }

    fn record_queries() -> impl Strategy<Value = RecordQuery> {
        (
            proptest::option::of(scripts()),
            proptest::option::of("[A-Za-z ]{1,10}"),
            portals(),
            any::<Option<u32>>(),
            any::<Option<u32>>(),
            sorts(),
        )
            .prop_map(|(script, layout_response, portals, offset, limit, sort)| RecordQuery {
                script,
                layout_response,
                portals,
                offset,
                limit,
                sort,
            })
    }

    fn find_queries() -> impl Strategy<Value = FindQuery> {
        (
            proptest::option::of(scripts()),
            proptest::option::of("[A-Za-z ]{1,10}"),
            portals(),
            any::<Option<u32>>(),
            any::<Option<u32>>(),
            sorts(),
        )
            .prop_map(|(script, layout_response, portals, offset, limit, sort)| {
                FindQuery {
                    query: vec![FindRequest::from([("Name".to_string(), "x".to_string())])],
                    sort,
                    script,
                    offset,
                    limit,
                    layout_response,
                    portals,
                }
            })
    }

    fn script_keys(script: Option<&ScriptQuery>) -> Vec<String> {
        let Some(s) = script else {
            return Vec::new();
        };

        [
            ("script", &s.script),
            ("script.param", &s.param),
            ("script.prerequest", &s.pre_request),
            ("script.prerequest.param", &s.pre_request_param),
            ("script.presort", &s.pre_sort),
            ("script.presort.param", &s.pre_sort_param),
        ]
        .into_iter()
        .filter(|(_, v)| v.is_some())
        .map(|(k, _)| k.to_string())
        .collect()
    }

    fn expected_portal_keys(portals: &[PortalRequest], prefix: &str) -> Vec<String> {
        let mut keys = Vec::new();
        for p in portals {
            if p.limit.is_some() {
                keys.push(format!("{prefix}limit.{}", p.name));
            }

            if p.offset.is_some() {
                keys.push(format!("{prefix}offset.{}", p.name));
            }
        }

        keys
    }

    fn expected_record_keys(q: &RecordQuery) -> Vec<String> {
        let mut keys = script_keys(q.script.as_ref());
        if q.layout_response.is_some() {
            keys.push("layout.response".into());
        }

        if !q.portals.is_empty() {
            keys.push("portal".into());
            keys.extend(expected_portal_keys(&q.portals, "_"));
        }

        if q.offset.is_some() {
            keys.push("_offset".into());
        }

        if q.limit.is_some() {
            keys.push("_limit".into());
        }

        if !q.sort.is_empty() {
            keys.push("_sort".into());
        }

        keys
    }

    fn expected_find_keys(q: &FindQuery) -> BTreeSet<String> {
        let mut keys = BTreeSet::from(["query".to_string()]);
        if !q.sort.is_empty() {
            keys.insert("sort".into());
        }

        if q.offset.is_some() {
            keys.insert("offset".into());
        }

        if q.limit.is_some() {
            keys.insert("limit".into());
        }

        if q.layout_response.is_some() {
            keys.insert("layout.response".into());
        }

        if !q.portals.is_empty() {
            keys.insert("portal".into());
            keys.extend(expected_portal_keys(&q.portals, ""));
        }

        keys.extend(script_keys(q.script.as_ref()));
        keys
    }

    proptest! {
        #[test]
        fn record_query_keys_are_ordered_and_present(query in record_queries()) {
            let params = query.query_params();
            let keys: Vec<String> = params.iter().map(|(k, _)| k.to_string()).collect();
            prop_assert_eq!(&keys, &expected_record_keys(&query));

            let portal_keys: Vec<String> = keys
                .iter()
                .filter(|k| k.starts_with("_limit.") || k.starts_with("_offset."))
                .cloned()
                .collect();
            prop_assert_eq!(portal_keys, expected_portal_keys(&query.portals, "_"));

            for (_, value) in params.iter() {
                prop_assert!(!value.is_empty());
            }
        }

        #[test]
        fn record_query_encoding_is_stable(query in record_queries()) {
            let first = query.query_params().to_query_string();
            let second = query.clone().query_params().to_query_string();
            prop_assert_eq!(first, second);
        }

        #[test]
        fn find_query_keys_are_ordered_and_present(query in find_queries()) {
            let body = serde_json::to_string(&query).unwrap();
            let value: serde_json::Value = serde_json::from_str(&body).unwrap();
            let keys: BTreeSet<String> = value
                .as_object()
                .unwrap()
                .keys()
                .cloned()
                .collect();
            prop_assert_eq!(keys, expected_find_keys(&query));

            let positions: Vec<usize> = expected_portal_keys(&query.portals, "")
                .iter()
                .map(|k| body.find(&format!("\"{k}\":")).unwrap())
                .collect();
            prop_assert!(positions.windows(2).all(|w| w[0] < w[1]));

            if !query.portals.is_empty() {
                let names: Vec<&str> = query.portals.iter().map(|p| p.name.as_str()).collect();
                prop_assert_eq!(&value["portal"], &serde_json::json!(names));
            }

            prop_assert_eq!(body, serde_json::to_string(&query.clone()).unwrap());
        }
    }
}
