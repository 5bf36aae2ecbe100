use std::path::{Path, PathBuf};

use reqwest::StatusCode;
use thiserror::Error;

pub type Result<T, E = WebDAVError> = std::result::Result<T, E>;

/// Errors surfaced by [`crate::WebDAVClient`].
///
/// Callers usually match on [`WebDAVError::Unauthorized`] and
/// [`WebDAVError::RemoteNotFound`] and treat everything else as fatal for the
/// current operation.
#[derive(Debug, Error)]
pub enum WebDAVError {
    /// The server rejected the request. `params` records the call arguments
    /// (headers sent, which credentials were used) for diagnostics.
    #[error("Unauthorized request: {method} to {path}")]
    Unauthorized {
        method: String,
        path: String,
        status: StatusCode,
        params: Vec<(String, String)>,
    },

    #[error("Remote resource not found: {path}")]
    RemoteNotFound { path: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Local filesystem error at {}: {source}", path.display())]
    LocalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Malformed multistatus response: {0}")]
    MalformedResponse(String),

    #[error("Missing property '{property}' for {href}")]
    MissingProperty { href: String, property: &'static str },

    #[error("Invalid value '{value}' for property '{property}' of {href}")]
    InvalidProperty {
        href: String,
        property: &'static str,
        value: String,
    },

    #[error("HTTP {status} for {method} {path}")]
    UnexpectedStatus {
        method: String,
        path: String,
        status: StatusCode,
    },

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl WebDAVError {
    pub(crate) fn local_io(path: &Path, source: std::io::Error) -> Self {
        WebDAVError::LocalIo {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, WebDAVError::Unauthorized { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, WebDAVError::RemoteNotFound { .. })
    }

    /// True when the request hit the configured timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, WebDAVError::Http(e) if e.is_timeout())
    }

    /// HTTP status carried by the error, if the server answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            WebDAVError::Unauthorized { status, .. }
            | WebDAVError::UnexpectedStatus { status, .. } => Some(*status),
            WebDAVError::Http(e) => e.status(),
            _ => None,
        }
    }
}
