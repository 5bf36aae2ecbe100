use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::{Body, Client, Method, Response, StatusCode};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};
use url::Url;

use crate::common::{build_user_agent, last_path_segment, UPLOAD_CHUNK_SIZE};
use crate::config::{Credentials, WebDAVConfig};
use crate::error::{Result, WebDAVError};
use crate::models::ResourceEntry;
use crate::webdav_xml_parser::{parse_propfind_response, PROPFIND_REQUEST_BODY};

/// Per-call knobs for [`WebDAVClient::send_request`]
#[derive(Debug, Default)]
pub struct RequestOptions<'a> {
    headers: Vec<(String, String)>,
    body: Option<Body>,
    auth: Option<&'a Credentials>,
    timeout: Option<Duration>,
}

impl<'a> RequestOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Credentials used instead of the session's for this call only.
    pub fn auth(mut self, auth: Option<&'a Credentials>) -> Self {
        self.auth = auth;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// WebDAV client owning one HTTP session.
///
/// Every operation joins the configured hostname with a relative, decoded
/// resource path and issues exactly one request. Nothing is retried. The
/// underlying connection pool is shared by all calls and is safe to use from
/// several tasks at once.
pub struct WebDAVClient {
    client: Client,
    base_url: Url,
    credentials: Option<Credentials>,
    timeout: Duration,
}

impl WebDAVClient {
    /// Creates the session. Basic auth is attached to every request only when
    /// the config carries both a username and a password.
    pub fn new(config: WebDAVConfig) -> Result<Self> {
        config.validate()?;
        let base_url = config.base_url()?;

        let client = Client::builder()
            .connect_timeout(config.timeout())
            .user_agent(build_user_agent())
            .build()?;

        debug!(
            "Created WebDAV session for {} (authenticated: {}, timeout: {}s)",
            base_url,
            config.credentials().is_some(),
            config.timeout_seconds
        );

        Ok(Self {
            client,
            base_url,
            credentials: config.credentials(),
            timeout: config.timeout(),
        })
    }

    pub fn hostname(&self) -> &str {
        self.base_url.as_str()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Full URL for a resource path relative to the hostname.
    ///
    /// Segments are percent-encoded once, empty segments are dropped and a
    /// trailing slash on `path` is kept.
    ///
    /// Input:  "Documents/My Notes/" on "https://dav.example.com/files/demo/"
    /// Output: "https://dav.example.com/files/demo/Documents/My%20Notes/"
    pub fn url_for_path(&self, path: &str) -> Result<Url> {
        let mut url = self.base_url.clone();
        if path.trim_matches('/').is_empty() {
            return Ok(url);
        }

        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                WebDAVError::Config(format!("'{}' cannot be used as a base URL", self.base_url))
            })?;
            segments.pop_if_empty();
            for segment in path.split('/').filter(|s| !s.is_empty()) {
                segments.push(segment);
            }
            if path.ends_with('/') {
                segments.push("");
            }
        }

        Ok(url)
    }

    /// Sends one request and returns the raw response; the status is not interpreted.
    pub async fn send_request(
        &self,
        method: Method,
        path: &str,
        options: RequestOptions<'_>,
    ) -> Result<Response> {
        let url = self.url_for_path(path)?;
        let timeout = options.timeout.unwrap_or(self.timeout);

        debug!("📤 Sending HTTP {} request to: {}", method, url);
        if !options.headers.is_empty() {
            debug!("   Headers: {:?}", options.headers);
        }

        let mut request = self.client.request(method.clone(), url.clone()).timeout(timeout);

        if let Some(credentials) = options.auth.or(self.credentials.as_ref()) {
            request = request.basic_auth(&credentials.username, Some(&credentials.password));
        }
        for (name, value) in &options.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = options.body {
            request = request.body(body);
        }

        let response = request.send().await?;
        let status = response.status();
        debug!(
            "📥 HTTP Response: {} {} for {} {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or(""),
            method,
            url
        );
        Ok(response)
    }

    /// Lists `path` and its immediate children (`Depth: 1`).
    ///
    /// A 404 yields an empty list rather than an error, so "no such path" and
    /// "nothing there" look the same here, unlike [`get`](Self::get) and
    /// [`put`](Self::put) which report [`WebDAVError::RemoteNotFound`]. Any other
    /// non-2xx status is reported as [`WebDAVError::Unauthorized`].
    pub async fn propfind(&self, path: &str, auth: Option<&Credentials>) -> Result<Vec<ResourceEntry>> {
        let method = propfind_method()?;
        let options = RequestOptions::new()
            .header("Depth", "1")
            .header("Content-Type", "application/xml; charset=utf-8")
            .body(PROPFIND_REQUEST_BODY)
            .auth(auth);
        let params = self.call_params(&options);

        let response = self.send_request(method.clone(), path, options).await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            debug!("PROPFIND on '{}' returned 404, treating as empty listing", path);
            return Ok(Vec::new());
        }
        if !status.is_success() {
            warn!("PROPFIND on '{}' rejected with HTTP {}", path, status);
            return Err(unauthorized(&method, path, status, params));
        }

        let body = response.text().await?;
        let entries = parse_propfind_response(&body)?;
        debug!("PROPFIND on '{}' listed {} entries", path, entries.len());
        Ok(entries)
    }

    /// Downloads `remote_path` and returns the file written.
    ///
    /// When `local_path` is an existing directory the file is created inside it
    /// under the remote base name, otherwise `local_path` is the destination
    /// itself. The body is streamed to disk chunk by chunk; a transfer that
    /// fails midway leaves no partial file behind.
    pub async fn get(
        &self,
        remote_path: &str,
        local_path: impl AsRef<Path>,
        auth: Option<&Credentials>,
    ) -> Result<PathBuf> {
        let destination = resolve_download_destination(remote_path, local_path.as_ref()).await?;

        let options = RequestOptions::new().auth(auth);
        let params = self.call_params(&options);
        let response = self.send_request(Method::GET, remote_path, options).await?;
        let status = response.status();

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(unauthorized(&Method::GET, remote_path, status, params));
            }
            StatusCode::NOT_FOUND | StatusCode::GONE => {
                return Err(WebDAVError::RemoteNotFound {
                    path: remote_path.to_string(),
                });
            }
            s if !s.is_success() => {
                return Err(WebDAVError::UnexpectedStatus {
                    method: Method::GET.to_string(),
                    path: remote_path.to_string(),
                    status,
                });
            }
            _ => {}
        }

        let mut file = File::create(&destination)
            .await
            .map_err(|e| WebDAVError::local_io(&destination, e))?;

        match write_body(response, &mut file, &destination).await {
            Ok(bytes) => {
                info!("⬇️ Downloaded {} bytes from '{}' to {}", bytes, remote_path, destination.display());
                Ok(destination)
            }
            Err(e) => {
                drop(file);
                match fs::remove_file(&destination).await {
                    Ok(()) => warn!("Removed partial download {}", destination.display()),
                    Err(rm) => warn!("Failed to remove partial download {}: {}", destination.display(), rm),
                }
                Err(e)
            }
        }
    }

    /// Uploads the file at `local_path` to `remote_path` and returns the raw status.
    ///
    /// The local file and the remote path are checked before anything is sent.
    /// A 404 or 409 means the remote parent collection does not exist and is
    /// reported as [`WebDAVError::RemoteNotFound`].
    pub async fn put(
        &self,
        remote_path: &str,
        local_path: impl AsRef<Path>,
        auth: Option<&Credentials>,
    ) -> Result<StatusCode> {
        let local_path = local_path.as_ref();
        let file = File::open(local_path)
            .await
            .map_err(|e| WebDAVError::local_io(local_path, e))?;
        let metadata = file
            .metadata()
            .await
            .map_err(|e| WebDAVError::local_io(local_path, e))?;
        if metadata.is_dir() {
            return Err(WebDAVError::local_io(
                local_path,
                io::Error::new(io::ErrorKind::InvalidInput, "expected a file, found a directory"),
            ));
        }
        if remote_path.trim_matches('/').is_empty() {
            return Err(WebDAVError::InvalidArgument(
                "remote path must name a resource, got an empty path".to_string(),
            ));
        }

        let content_type = mime_guess::from_path(local_path).first_or_octet_stream();
        let body = Body::wrap_stream(ReaderStream::with_capacity(file, UPLOAD_CHUNK_SIZE));
        let options = RequestOptions::new()
            .header("Content-Length", metadata.len().to_string())
            .header("Content-Type", content_type.essence_str())
            .body(body)
            .auth(auth);
        let params = self.call_params(&options);

        let response = self.send_request(Method::PUT, remote_path, options).await?;
        let status = response.status();

        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(unauthorized(&Method::PUT, remote_path, status, params))
            }
            StatusCode::NOT_FOUND | StatusCode::CONFLICT => Err(WebDAVError::RemoteNotFound {
                path: remote_path.to_string(),
            }),
            _ => {
                info!(
                    "⬆️ Uploaded {} bytes from {} to '{}': HTTP {}",
                    metadata.len(),
                    local_path.display(),
                    remote_path,
                    status.as_u16()
                );
                Ok(status)
            }
        }
    }

    /// Deletes `remote_path` and returns the raw status.
    pub async fn delete(&self, remote_path: &str, auth: Option<&Credentials>) -> Result<StatusCode> {
        let response = self
            .send_request(Method::DELETE, remote_path, RequestOptions::new().auth(auth))
            .await?;
        Ok(response.status())
    }

    /// Releases the session and its connection pool.
    pub fn close(self) {
        debug!("Closing WebDAV session for {}", self.base_url);
    }

    /// Call arguments recorded on [`WebDAVError::Unauthorized`].
    fn call_params(&self, options: &RequestOptions<'_>) -> Vec<(String, String)> {
        let auth = match (options.auth, &self.credentials) {
            (Some(credentials), _) => format!("per-call ({})", credentials.username),
            (None, Some(credentials)) => format!("session ({})", credentials.username),
            (None, None) => "none".to_string(),
        };
        let mut params = options.headers.clone();
        params.push(("auth".to_string(), auth));
        if let Some(timeout) = options.timeout {
            params.push(("timeout".to_string(), format!("{}s", timeout.as_secs())));
        }
        params
    }
}

fn propfind_method() -> Result<Method> {
    Method::from_bytes(b"PROPFIND").map_err(|e| WebDAVError::InvalidArgument(e.to_string()))
}

fn unauthorized(method: &Method, path: &str, status: StatusCode, params: Vec<(String, String)>) -> WebDAVError {
    WebDAVError::Unauthorized {
        method: method.to_string(),
        path: path.to_string(),
        status,
        params,
    }
}

/// Where a download of `remote_path` requested at `local_path` lands.
async fn resolve_download_destination(remote_path: &str, local_path: &Path) -> Result<PathBuf> {
    if local_path.as_os_str().is_empty() {
        return Err(WebDAVError::InvalidArgument("local path must not be empty".to_string()));
    }

    if fs::metadata(local_path).await.map(|m| m.is_dir()).unwrap_or(false) {
        let name = last_path_segment(remote_path);
        if name.is_empty() {
            return Err(WebDAVError::InvalidArgument(format!(
                "cannot derive a file name from remote path '{}'",
                remote_path
            )));
        }
        return Ok(local_path.join(name));
    }

    let parent = match local_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => return Ok(local_path.to_path_buf()),
    };
    match fs::metadata(parent).await {
        Ok(metadata) if metadata.is_dir() => Ok(local_path.to_path_buf()),
        Ok(_) => Err(WebDAVError::local_io(
            parent,
            io::Error::new(io::ErrorKind::InvalidInput, "parent is not a directory"),
        )),
        Err(e) => Err(WebDAVError::local_io(parent, e)),
    }
}

async fn write_body(response: Response, file: &mut File, destination: &Path) -> Result<u64> {
    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)
            .await
            .map_err(|e| WebDAVError::local_io(destination, e))?;
        written += chunk.len() as u64;
    }

    file.flush()
        .await
        .map_err(|e| WebDAVError::local_io(destination, e))?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(hostname: &str) -> WebDAVClient {
        WebDAVClient::new(WebDAVConfig::new(hostname)).expect("Failed to create WebDAV client")
    }

    #[test]
    fn test_url_construction() {
        let client = client("https://demo.owncloud.com/remote.php/dav/files/demo/");

        assert_eq!(
            client.url_for_path("").unwrap().as_str(),
            "https://demo.owncloud.com/remote.php/dav/files/demo/"
        );
        assert_eq!(
            client.url_for_path("Documents/Example.odt").unwrap().as_str(),
            "https://demo.owncloud.com/remote.php/dav/files/demo/Documents/Example.odt"
        );
        assert_eq!(
            client.url_for_path("/Documents//Example.odt").unwrap().as_str(),
            "https://demo.owncloud.com/remote.php/dav/files/demo/Documents/Example.odt"
        );
        assert_eq!(
            client.url_for_path("ownCloud Manual.pdf").unwrap().as_str(),
            "https://demo.owncloud.com/remote.php/dav/files/demo/ownCloud%20Manual.pdf"
        );
        assert_eq!(
            client.url_for_path("Photos/").unwrap().as_str(),
            "https://demo.owncloud.com/remote.php/dav/files/demo/Photos/"
        );
        assert_eq!(
            client.url_for_path("100%/a#b?.txt").unwrap().as_str(),
            "https://demo.owncloud.com/remote.php/dav/files/demo/100%25/a%23b%3F.txt"
        );
    }

    #[test]
    fn test_url_construction_without_trailing_slash() {
        let client = client("http://localhost:8080/webdav");
        assert_eq!(
            client.url_for_path("notes/todo.md").unwrap().as_str(),
            "http://localhost:8080/webdav/notes/todo.md"
        );
        assert_eq!(client.hostname(), "http://localhost:8080/webdav");
        assert_eq!(client.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_rejects_invalid_hostname() {
        assert!(WebDAVClient::new(WebDAVConfig::new("not a url")).is_err());
    }

    #[test]
    fn test_call_params_record_auth_source() {
        let session = WebDAVClient::new(
            WebDAVConfig::new("https://dav.example.com/").with_credentials("demo", "demo"),
        )
        .unwrap();
        let override_credentials = Credentials::new("other", "pw");

        let params = session.call_params(&RequestOptions::new().header("Depth", "1"));
        assert!(params.contains(&("Depth".to_string(), "1".to_string())));
        assert!(params.contains(&("auth".to_string(), "session (demo)".to_string())));

        let params = session.call_params(&RequestOptions::new().auth(Some(&override_credentials)));
        assert!(params.contains(&("auth".to_string(), "per-call (other)".to_string())));

        let anonymous = client("https://dav.example.com/");
        let params = anonymous.call_params(&RequestOptions::new());
        assert_eq!(params, vec![("auth".to_string(), "none".to_string())]);
    }

    #[tokio::test]
    async fn test_download_destination_resolution() {
        let dir = tempfile::tempdir().unwrap();

        let into_dir = resolve_download_destination("Documents/Example.odt", dir.path()).await.unwrap();
        assert_eq!(into_dir, dir.path().join("Example.odt"));

        let exact = dir.path().join("renamed.odt");
        assert_eq!(
            resolve_download_destination("Documents/Example.odt", &exact).await.unwrap(),
            exact
        );

        let missing_parent = dir.path().join("missing").join("file.odt");
        assert!(matches!(
            resolve_download_destination("Documents/Example.odt", &missing_parent).await,
            Err(WebDAVError::LocalIo { .. })
        ));

        assert!(matches!(
            resolve_download_destination("/", dir.path()).await,
            Err(WebDAVError::InvalidArgument(_))
        ));
    }
}
