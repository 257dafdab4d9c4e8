//! A typed client for the [FileMaker Data
//! API](https://help.claris.com/en/data-api-guide/).
//!
//! The client is organized as a tree of handles: a [`Server`] owns the
//! transport and the [`Database`]s added to it, each database owns its own
//! [`Credential`], and every record operation goes through a [`Layout`].
//!
//! # HTTP Requests and Responses
//!
//! Requests are built as [`http::Request`]s by [`build_request`], and sent by
//! a [`Transport`]. The crate ships [`UreqTransport`]; any other HTTP client
//! can be used by implementing the trait. Responses are decoded with
//! [`ApiResponse::from_response`].
//!
//! # Example
//!
//! ```no_run
//! use fmdata::{Credential, Profile, RecordQuery, RecordResponse, Server, UreqTransport};
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let profile = Profile::from_default_env()?;
//! let server = Server::from_profile(&profile, UreqTransport::default());
//! let database = server.add_database("Contacts");
//!
//! database
//!     .login(&Credential::basic("admin", "secret"), None)
//!     .await?;
//!
//! let people = database.layout("People");
//! let query = RecordQuery::new().limit(10);
//! let resp: RecordResponse<serde_json::Value> = people.records(Some(&query)).await?;
//! println!("{} of {} records", resp.data.len(), resp.data_info.found_count);
//!
//! database.logout().await?;
//! # Ok(())
//! # }
//! ```

#![warn(
    anonymous_parameters,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    nonstandard_style,
    rust_2018_idioms,
    single_use_lifetimes,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unused_extern_crates,
    unused_qualifications,
    variant_size_differences
)]

mod api;
mod config;
mod credential;
mod database;
mod layout;
mod server;
mod transport;

pub use api::*;
pub use config::{Error as ConfigError, Profile};
pub use credential::*;
pub use database::Database;
pub use layout::Layout;
pub use server::{Server, ServerConfig};
pub use transport::{Transport, UreqTransport};
