use std::sync::{Arc, Mutex, PoisonError, Weak};

use tokio::sync::watch;
use tracing::info;

use crate::{
    ApiResponse, Credential, DataSourceAuth, Empty, Endpoint, Error, GlobalFields, Layout,
    LayoutListItem, QueryParams, RequestBody, ScriptItem, Server, SessionToken,
    api::{LayoutList, ScriptList},
    server::roundtrip,
};

/// A database on a [`Server`], and the credential used to access it.
///
/// The credential is shared state: every request takes a snapshot of it
/// when the request is built, and only [`Database::login`],
/// [`Database::logout`] and the explicit setters change it. Observers can
/// follow changes with [`Database::subscribe`].
pub struct Database {
    name: String,
    server: Weak<Server>,
    credential: watch::Sender<Credential>,
    layouts: Mutex<Vec<LayoutListItem>>,
    scripts: Mutex<Vec<ScriptItem>>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name)
            .field("connected", &(self.server.strong_count() > 0))
            .field("credential", &*self.credential.borrow())
            .finish()
    }
}

impl Database {
    pub(crate) fn new(name: &str, server: Weak<Server>) -> Arc<Self> {
        let (credential, _) = watch::channel(Credential::Invalid);
        Arc::new(Self {
            name: name.to_owned(),
            server,
            credential,
            layouts: Mutex::default(),
            scripts: Mutex::default(),
        })
    }

    /// A database that is not attached to any server. Every request made
    /// through it fails with [`Error::NotConnected`].
    pub fn detached(name: &str) -> Arc<Self> {
        Self::new(name, Weak::new())
    }

    /// The database name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The server this database belongs to, if it is still alive.
    pub fn server(&self) -> Option<Arc<Server>> {
        self.server.upgrade()
    }

    /// A snapshot of the current credential.
    pub fn credential(&self) -> Credential {
        self.credential.borrow().clone()
    }

    /// Follow changes to the credential.
    pub fn subscribe(&self) -> watch::Receiver<Credential> {
        self.credential.subscribe()
    }

    /// Replace the credential, returning the previous one.
    pub fn set_credential(&self, credential: Credential) -> Credential {
        self.credential.send_replace(credential)
    }

    /// Replace the credential only if it is still `expected`. Returns
    /// whether the swap happened.
    pub fn compare_and_swap_credential(&self, expected: &Credential, new: Credential) -> bool {
        let mut new = Some(new);
        self.credential.send_if_modified(|current| {
            if current != expected {
                return false;
            }

            match new.take() {
                Some(new) => {
                    *current = new;
                    true
                }
                None => false,
            }
        })
    }

    /// Log in with a non-token credential, optionally passing credentials
    /// for external data sources. On success the database's credential is
    /// replaced with the session token, and that token is returned.
    pub async fn login(
        &self,
        credential: &Credential,
        data_sources: Option<&DataSourceAuth>,
    ) -> Result<Credential, Error> {
        let body = match data_sources {
            Some(auth) => RequestBody::json(auth)?,
            None => RequestBody::Json("{}".to_string()),
        };

        let endpoint = Endpoint::CreateSession {
            database: self.name.clone(),
        };

        let server = self.server.upgrade();
        let SessionToken(token) =
            roundtrip::<SessionToken>(server.as_deref(), credential, endpoint, None, Some(body))
                .await?;

        let token = Credential::Token(token);
        self.credential.send_replace(token.clone());
        info!(database = %self.name, "logged in");

        Ok(token)
    }

    /// Log out of the current session.
    ///
    /// On success the credential is reset to [`Credential::Invalid`], unless
    /// it was changed while the request was in flight. On failure the token
    /// is kept, so that the logout can be retried.
    pub async fn logout(&self) -> Result<(), Error> {
        let credential = self.credential();
        let token = credential.session_token().unwrap_or_default().to_owned();
        let endpoint = Endpoint::DeleteSession {
            database: self.name.clone(),
            token,
        };

        let server = self.server.upgrade();
        roundtrip::<Empty>(server.as_deref(), &credential, endpoint, None, None).await?;

        if self.compare_and_swap_credential(&credential, Credential::Invalid) {
            info!(database = %self.name, "logged out");
        }

        Ok(())
    }

    /// Fetch the layouts of this database, and store them on the handle.
    /// Every returned layout is connected to this database.
    pub async fn layout_names(self: &Arc<Self>) -> Result<Vec<LayoutListItem>, Error> {
        let endpoint = Endpoint::LayoutNames {
            database: self.name.clone(),
        };

        let resp: LayoutList = self.send(endpoint, None, None).await?;
        let layouts = self.connect_layouts(resp.layouts);
        *lock(&self.layouts) = layouts.clone();

        Ok(layouts)
    }

    /// Fetch the scripts of this database, and store them on the handle.
    pub async fn script_names(&self) -> Result<Vec<ScriptItem>, Error> {
        let endpoint = Endpoint::ScriptNames {
            database: self.name.clone(),
        };

        let resp: ScriptList = self.send(endpoint, None, None).await?;
        *lock(&self.scripts) = resp.scripts.clone();

        Ok(resp.scripts)
    }

    /// Set global field values for the current session.
    pub async fn set_global_fields(&self, fields: &GlobalFields) -> Result<(), Error> {
        let endpoint = Endpoint::SetGlobalFields {
            database: self.name.clone(),
        };

        let body = RequestBody::json(fields)?;
        self.send::<Empty>(endpoint, None, Some(body)).await?;
        Ok(())
    }

    /// The layouts stored by the last [`Database::layout_names`] call, plus
    /// any added with [`Database::add_layout`].
    pub fn layouts(&self) -> Vec<LayoutListItem> {
        lock(&self.layouts).clone()
    }

    /// The scripts stored by the last [`Database::script_names`] call.
    pub fn scripts(&self) -> Vec<ScriptItem> {
        lock(&self.scripts).clone()
    }

    /// A handle to a layout in this database.
    pub fn layout(self: &Arc<Self>, name: &str) -> Layout {
        Layout::connected(name, Arc::downgrade(self))
    }

    /// A handle to a layout in this database, which is also added to the
    /// stored layout list.
    pub fn add_layout(self: &Arc<Self>, name: &str) -> Layout {
        let layout = self.layout(name);
        lock(&self.layouts).push(LayoutListItem::Layout(layout.clone()));
        layout
    }

    /// Attach every layout in a decoded layout list to this database.
    pub fn connect_layouts(self: &Arc<Self>, mut items: Vec<LayoutListItem>) -> Vec<LayoutListItem> {
        let this = Arc::downgrade(self);
        for item in &mut items {
            item.for_each_layout_mut(&mut |layout| layout.connect(this.clone()));
        }

        items
    }

    pub(crate) async fn send<T: ApiResponse>(
        &self,
        endpoint: Endpoint,
        query: Option<&QueryParams>,
        body: Option<RequestBody>,
    ) -> Result<T, Error> {
        let credential = self.credential();
        let server = self.server.upgrade();
        roundtrip(server.as_deref(), &credential, endpoint, query, body).await
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
