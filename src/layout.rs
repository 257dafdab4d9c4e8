use std::sync::{Arc, Weak};

use futures::Stream;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    ApiResponse, ContainerFile, CreateResponse, Database, EditRecord, EditRecordResponse,
    Endpoint, Error, FindQuery, LayoutMetadata, QueryParams, Record, RecordQuery, RecordResponse,
    RequestBody, ScriptQuery, ScriptResponse, api::paginate,
};

/// A layout in a database. Every record operation goes through a layout.
///
/// A layout decoded from a listing is detached until it is passed through
/// [`Database::connect_layouts`]; operations on a detached layout fail with
/// [`Error::NotConnected`].
#[derive(Clone, Deserialize)]
pub struct Layout {
    name: String,
    #[serde(skip)]
    database: Option<Weak<Database>>,
    #[serde(skip)]
    metadata: Option<LayoutMetadata>,
}

impl std::fmt::Debug for Layout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Layout")
            .field("name", &self.name)
            .field("connected", &self.is_connected())
            .field("metadata", &self.metadata.is_some())
            .finish()
    }
}

impl Layout {
    /// A layout that is not attached to any database.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            database: None,
            metadata: None,
        }
    }

    pub(crate) fn connected(name: &str, database: Weak<Database>) -> Self {
        let mut layout = Self::new(name);
        layout.connect(database);
        layout
    }

    pub(crate) fn connect(&mut self, database: Weak<Database>) {
        self.database = Some(database);
    }

    /// The layout name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The database this layout belongs to, if it is attached and still
    /// alive.
    pub fn database(&self) -> Option<Arc<Database>> {
        self.database.as_ref().and_then(Weak::upgrade)
    }

    /// Whether the layout is attached to a live database.
    pub fn is_connected(&self) -> bool {
        self.database().is_some()
    }

    /// The metadata stored by [`Layout::load_metadata`].
    pub fn cached_metadata(&self) -> Option<&LayoutMetadata> {
        self.metadata.as_ref()
    }

    /// Fetch a range of records.
    pub async fn records<F, P>(
        &self,
        query: Option<&RecordQuery>,
    ) -> Result<RecordResponse<F, P>, Error>
    where
        F: DeserializeOwned,
        P: DeserializeOwned,
    {
        let params = query.map(RecordQuery::query_params);
        self.send(
            |database, layout| Endpoint::GetRecords { database, layout },
            params.as_ref(),
            None,
        )
        .await
    }

    /// Fetch a single record. Only the script, portal and
    /// `layout.response` options of the query are sent.
    pub async fn record<F, P>(
        &self,
        record_id: u64,
        query: Option<&RecordQuery>,
    ) -> Result<RecordResponse<F, P>, Error>
    where
        F: DeserializeOwned,
        P: DeserializeOwned,
    {
        let params = query.map(RecordQuery::record_params);
        self.send(
            |database, layout| Endpoint::GetRecord {
                database,
                layout,
                record_id,
            },
            params.as_ref(),
            None,
        )
        .await
    }

    /// Create a record.
    pub async fn create_record<F, P>(
        &self,
        record: &EditRecord<F, P>,
    ) -> Result<CreateResponse, Error>
    where
        F: Serialize,
        P: Serialize,
    {
        let body = RequestBody::json(record)?;
        self.send(
            |database, layout| Endpoint::CreateRecord { database, layout },
            None,
            Some(body),
        )
        .await
    }

    /// Edit a record. Set [`EditRecord::mod_id`] to fail if the record was
    /// changed since it was read.
    pub async fn edit_record<F, P>(
        &self,
        record_id: u64,
        record: &EditRecord<F, P>,
    ) -> Result<EditRecordResponse, Error>
    where
        F: Serialize,
        P: Serialize,
    {
        let body = RequestBody::json(record)?;
        self.send(
            |database, layout| Endpoint::EditRecord {
                database,
                layout,
                record_id,
            },
            None,
            Some(body),
        )
        .await
    }

    /// Delete a record, optionally running scripts.
    pub async fn delete_record(
        &self,
        record_id: u64,
        script: Option<&ScriptQuery>,
    ) -> Result<ScriptResponse, Error> {
        let params = script.map(ScriptQuery::query_params);
        self.send(
            |database, layout| Endpoint::DeleteRecord {
                database,
                layout,
                record_id,
            },
            params.as_ref(),
            None,
        )
        .await
    }

    /// Duplicate a record, optionally running scripts.
    pub async fn duplicate_record(
        &self,
        record_id: u64,
        script: Option<&ScriptQuery>,
    ) -> Result<CreateResponse, Error> {
        let body = match script {
            Some(script) => RequestBody::json(script)?,
            None => RequestBody::Json("{}".to_string()),
        };

        self.send(
            |database, layout| Endpoint::DuplicateRecord {
                database,
                layout,
                record_id,
            },
            None,
            Some(body),
        )
        .await
    }

    /// Run a find.
    pub async fn find_records<F, P>(&self, query: &FindQuery) -> Result<RecordResponse<F, P>, Error>
    where
        F: DeserializeOwned,
        P: DeserializeOwned,
    {
        let body = RequestBody::json(query)?;
        self.send(
            |database, layout| Endpoint::FindRecords { database, layout },
            None,
            Some(body),
        )
        .await
    }

    /// Run a script in the context of this layout.
    pub async fn execute_script(
        &self,
        script: &str,
        param: Option<&str>,
    ) -> Result<ScriptResponse, Error> {
        let mut params = QueryParams::new();
        params.push_opt("script.param", param);

        self.send(
            |database, layout| Endpoint::ExecuteScript {
                database,
                layout,
                script: script.to_owned(),
            },
            Some(&params),
            None,
        )
        .await
    }

    /// Upload a file into a container field. The repetition defaults to 1.
    /// If `mod_id` is set, the upload fails if the record was changed since
    /// it was read.
    pub async fn upload_to_container(
        &self,
        field: &str,
        record_id: u64,
        repetition: Option<u32>,
        mod_id: Option<u64>,
        file: ContainerFile,
    ) -> Result<(), Error> {
        let mut params = QueryParams::new();
        params.push_opt("modId", mod_id);

        self.send::<crate::Empty>(
            |database, layout| Endpoint::UploadToContainer {
                database,
                layout,
                record_id,
                field: field.to_owned(),
                repetition,
            },
            Some(&params),
            Some(file.into_body()),
        )
        .await?;

        Ok(())
    }

    /// Fetch the field, portal and value list definitions of this layout.
    /// Value lists that depend on a record are resolved against `record_id`.
    pub async fn metadata(&self, record_id: Option<u64>) -> Result<LayoutMetadata, Error> {
        let mut params = QueryParams::new();
        params.push_opt("recordId", record_id);

        self.send(
            |database, layout| Endpoint::LayoutMetadata { database, layout },
            Some(&params),
            None,
        )
        .await
    }

    /// Fetch layout metadata from the endpoint used by older servers.
    pub async fn legacy_metadata(&self) -> Result<LayoutMetadata, Error> {
        self.send(
            |database, layout| Endpoint::LegacyLayoutMetadata { database, layout },
            None,
            None,
        )
        .await
    }

    /// Fetch the layout metadata, and store it on this handle.
    pub async fn load_metadata(&mut self) -> Result<&LayoutMetadata, Error> {
        let metadata = self.metadata(None).await?;
        Ok(self.metadata.insert(metadata))
    }

    /// Stream every record matching `query`, `page_size` records per
    /// request. The query's offset (default 1) is where paging starts, and
    /// its limit, if set, caps the total number of records.
    pub fn paginate_records<F, P>(
        &self,
        query: RecordQuery,
        page_size: u32,
    ) -> impl Stream<Item = Result<Record<F, P>, Error>> + '_
    where
        F: DeserializeOwned + 'static,
        P: DeserializeOwned + 'static,
    {
        let start = query.offset.unwrap_or(1);
        let limit = query.limit.map(u64::from);

        paginate(start, page_size, limit, move |offset, limit| {
            let page = query.clone().offset(offset).limit(limit);
            async move { self.records::<F, P>(Some(&page)).await }
        })
    }

    async fn send<T: ApiResponse>(
        &self,
        endpoint: impl FnOnce(String, String) -> Endpoint,
        query: Option<&QueryParams>,
        body: Option<RequestBody>,
    ) -> Result<T, Error> {
        let Some(database) = self.database() else {
            return Err(Error::NotConnected);
        };

        let endpoint = endpoint(database.name().to_owned(), self.name.clone());
        database.send(endpoint, query, body).await
    }
}
