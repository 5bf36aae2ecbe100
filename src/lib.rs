//! Async WebDAV client.
//!
//! Lists remote collections (`PROPFIND`), downloads (`GET`), uploads (`PUT`)
//! and deletes (`DELETE`) resources on any compliant WebDAV server.
//!
//! ```no_run
//! use webdav_client::{WebDAVClient, WebDAVConfig};
//!
//! # async fn run() -> webdav_client::Result<()> {
//! let config = WebDAVConfig::new("https://demo.owncloud.com/remote.php/dav/files/demo/")
//!     .with_credentials("demo", "demo");
//! let client = WebDAVClient::new(config)?;
//!
//! for entry in client.propfind("Documents", None).await? {
//!     println!("{:?} {} ({} bytes)", entry.resource_type(), entry.name, entry.size());
//! }
//! client.get("Documents/Example.odt", "/tmp", None).await?;
//! client.close();
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod common;
pub mod config;
pub mod error;
pub mod models;
pub mod webdav_xml_parser;

pub use client::{RequestOptions, WebDAVClient};
pub use config::{Credentials, WebDAVConfig};
pub use error::{Result, WebDAVError};
pub use models::{ResourceEntry, ResourceKind, ResourceType};
