//! # itop-client
//!
//! A blocking client for the iTop CMDB REST/JSON API.
//!
//! ## Features
//!
//! - **Authentication**: form fields (`auth_user` / `auth_pwd`) or HTTP Basic
//! - **Queries**: field equality maps, raw OQL, or a small [`OqlBuilder`](query::OqlBuilder)
//! - **Records**: per-class record shapes derived from the payload at runtime
//! - **Security**: the password is never logged or exposed in error messages
//!
//! ## Architecture
//!
//! - [`config`] - Connection settings, in code or from environment variables
//! - [`error`] - Error type covering transport, API and response failures
//! - [`connection`] - HTTP connection and the high-level operations
//! - [`query`] - Filter to OQL translation
//! - [`models`] - Response classification, records, status codes
//!
//! ## Example
//!
//! ```ignore
//! use itop_client::config::Config;
//! use itop_client::connection::{Connection, GetParams};
//! use itop_client::models::Response;
//! use itop_client::query::Filter;
//!
//! fn example() -> Result<(), itop_client::error::ItopError> {
//!     let config = Config::new("https://itop.example.com", "admin", "secret");
//!     let connection = Connection::new(&config)?;
//!
//!     let params = GetParams::new()
//!         .with_filter(Filter::fields([("status", "production")]))
//!         .with_fields(["name", "status"]);
//!
//!     if let Response::Successful(mut servers) = connection.get("Server", params)? {
//!         while let Some(server) = servers.get_one() {
//!             println!("#{}: {:?}", server.id(), server.get_str("name"));
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod connection;
pub mod error;
pub mod models;
pub mod query;
