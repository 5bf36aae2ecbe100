//! PROPFIND multistatus parsing
//!
//! Elements are matched by resolved namespace URI (`DAV:`) plus local name, so
//! `<D:href>`, `<d:href>` and a default-namespace `<href>` are the same element,
//! while an `<x:getetag>` bound to another namespace is ignored.

use quick_xml::events::Event;
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::NsReader;
use tracing::debug;
use url::Url;

use crate::common::last_path_segment;
use crate::error::{Result, WebDAVError};
use crate::models::{ResourceEntry, ResourceKind};

const DAV_NAMESPACE: &[u8] = b"DAV:";

/// Request body asking for exactly the properties [`parse_propfind_response`] reads.
/// `quota-used-bytes` is not part of `allprop`, so it has to be named.
pub const PROPFIND_REQUEST_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<D:propfind xmlns:D="DAV:">
  <D:prop>
    <D:resourcetype/>
    <D:getcontentlength/>
    <D:getcontenttype/>
    <D:getlastmodified/>
    <D:getetag/>
    <D:quota-used-bytes/>
  </D:prop>
</D:propfind>"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Href,
    Status,
    QuotaUsedBytes,
    ContentLength,
    ContentType,
    LastModified,
    ETag,
}

impl Field {
    fn property(name: &[u8]) -> Option<Field> {
        match name {
            b"quota-used-bytes" => Some(Field::QuotaUsedBytes),
            b"getcontentlength" => Some(Field::ContentLength),
            b"getcontenttype" => Some(Field::ContentType),
            b"getlastmodified" => Some(Field::LastModified),
            b"getetag" => Some(Field::ETag),
            _ => None,
        }
    }

    fn element_name(self) -> &'static [u8] {
        match self {
            Field::Href => b"href",
            Field::Status => b"status",
            Field::QuotaUsedBytes => b"quota-used-bytes",
            Field::ContentLength => b"getcontentlength",
            Field::ContentType => b"getcontenttype",
            Field::LastModified => b"getlastmodified",
            Field::ETag => b"getetag",
        }
    }
}

#[derive(Debug, Default)]
struct PropValues {
    collection: bool,
    quota_used_bytes: Option<String>,
    content_length: Option<String>,
    content_type: Option<String>,
    last_modified: Option<String>,
    etag: Option<String>,
}

impl PropValues {
    fn set(&mut self, field: Field, value: String) {
        match field {
            Field::QuotaUsedBytes => self.quota_used_bytes = Some(value),
            Field::ContentLength => self.content_length = Some(value),
            Field::ContentType => self.content_type = Some(value),
            Field::LastModified => self.last_modified = Some(value),
            Field::ETag => self.etag = Some(value),
            Field::Href | Field::Status => {}
        }
    }

    fn merge(&mut self, other: PropValues) {
        self.collection |= other.collection;
        self.quota_used_bytes = other.quota_used_bytes.or(self.quota_used_bytes.take());
        self.content_length = other.content_length.or(self.content_length.take());
        self.content_type = other.content_type.or(self.content_type.take());
        self.last_modified = other.last_modified.or(self.last_modified.take());
        self.etag = other.etag.or(self.etag.take());
    }
}

#[derive(Debug, Default)]
struct ResponseBuilder {
    href: Option<String>,
    props: PropValues,
}

#[derive(Debug, Default)]
struct PropstatBuilder {
    status: Option<String>,
    props: PropValues,
}

/// Event-driven state for one multistatus document
#[derive(Debug, Default)]
struct MultistatusParser {
    entries: Vec<ResourceEntry>,
    saw_multistatus: bool,
    response: Option<ResponseBuilder>,
    propstat: Option<PropstatBuilder>,
    in_prop: bool,
    in_resourcetype: bool,
    capture: Option<(Field, String)>,
}

impl MultistatusParser {
    fn start(&mut self, name: &[u8]) {
        match name {
            b"multistatus" => self.saw_multistatus = true,
            b"response" => self.response = Some(ResponseBuilder::default()),
            b"href" if self.response.is_some() && self.propstat.is_none() => {
                self.capture = Some((Field::Href, String::new()));
            }
            b"propstat" if self.response.is_some() => self.propstat = Some(PropstatBuilder::default()),
            b"status" if self.propstat.is_some() && !self.in_prop => {
                self.capture = Some((Field::Status, String::new()));
            }
            b"prop" if self.propstat.is_some() => self.in_prop = true,
            b"resourcetype" if self.in_prop => self.in_resourcetype = true,
            b"collection" if self.in_resourcetype => {
                if let Some(propstat) = self.propstat.as_mut() {
                    propstat.props.collection = true;
                }
            }
            _ if self.in_prop && !self.in_resourcetype => {
                if let Some(field) = Field::property(name) {
                    self.capture = Some((field, String::new()));
                }
            }
            _ => {}
        }
    }

    fn text(&mut self, text: &str) {
        if let Some((_, buffer)) = self.capture.as_mut() {
            buffer.push_str(text);
        }
    }

    fn end(&mut self, name: &[u8]) -> Result<()> {
        if matches!(self.capture, Some((field, _)) if field.element_name() == name) {
            self.finish_capture();
            return Ok(());
        }

        match name {
            b"prop" => self.in_prop = false,
            b"resourcetype" => self.in_resourcetype = false,
            b"propstat" => {
                if let (Some(propstat), Some(response)) = (self.propstat.take(), self.response.as_mut()) {
                    if status_is_success(propstat.status.as_deref()) {
                        response.props.merge(propstat.props);
                    } else {
                        debug!("Skipping propstat with status {:?}", propstat.status);
                    }
                }
                self.in_prop = false;
                self.in_resourcetype = false;
            }
            b"response" => {
                if let Some(response) = self.response.take() {
                    self.entries.push(build_entry(response)?);
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn finish_capture(&mut self) {
        let Some((field, value)) = self.capture.take() else {
            return;
        };
        match field {
            Field::Href => {
                if let Some(response) = self.response.as_mut() {
                    response.href = Some(value);
                }
            }
            Field::Status => {
                if let Some(propstat) = self.propstat.as_mut() {
                    propstat.status = Some(value);
                }
            }
            property => {
                if let Some(propstat) = self.propstat.as_mut() {
                    propstat.props.set(property, value);
                }
            }
        }
    }
}

/// Parses a `207 Multi-Status` PROPFIND body into one entry per `<response>`.
///
/// Fails with [`WebDAVError::Xml`] or [`WebDAVError::MalformedResponse`] when the
/// body is not a well-formed multistatus document, and with
/// [`WebDAVError::MissingProperty`] / [`WebDAVError::InvalidProperty`] when the
/// size property of an entry is absent or not a number.
///
/// A `<response>` carrying only `href` and `status` (a member the server could
/// not report on) has no `resourcetype`, so it is treated as a file and fails
/// with `MissingProperty { property: "getcontentlength" }`.
pub fn parse_propfind_response(xml: &str) -> Result<Vec<ResourceEntry>> {
    let mut reader = NsReader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut parser = MultistatusParser::default();
    let mut depth = 0usize;

    loop {
        let (namespace, event) = reader.read_resolved_event()?;
        let in_dav = matches!(namespace, ResolveResult::Bound(Namespace(uri)) if uri == DAV_NAMESPACE);

        match event {
            Event::Start(e) => {
                depth += 1;
                if in_dav {
                    parser.start(e.local_name().as_ref());
                }
            }
            Event::Empty(e) => {
                if in_dav {
                    let name = e.local_name();
                    parser.start(name.as_ref());
                    parser.end(name.as_ref())?;
                }
            }
            Event::End(e) => {
                depth = depth.saturating_sub(1);
                if in_dav {
                    parser.end(e.local_name().as_ref())?;
                }
            }
            Event::Text(e) => {
                let text = e.unescape().map_err(|err| WebDAVError::Xml(err.into()))?;
                parser.text(&text);
            }
            Event::CData(e) => parser.text(&String::from_utf8_lossy(&e)),
            Event::Eof => break,
            _ => {}
        }
    }

    if depth != 0 {
        return Err(WebDAVError::MalformedResponse(format!(
            "document ended with {} unclosed element(s)",
            depth
        )));
    }
    if !parser.saw_multistatus {
        return Err(WebDAVError::MalformedResponse(
            "missing DAV: multistatus root element".to_string(),
        ));
    }

    debug!("Parsed {} entries from PROPFIND response", parser.entries.len());
    Ok(parser.entries)
}

/// Percent-decoded path component of an `<href>`, which servers send either as
/// an absolute path or as a full URL.
///
/// Input:  "https://dav.example.com/remote.php/dav/files/demo/My%20Notes/"
/// Output: "/remote.php/dav/files/demo/My Notes/"
pub fn href_to_path(href: &str) -> String {
    let href = href.trim();
    let raw_path = match Url::parse(href) {
        Ok(url) => url.path().to_string(),
        Err(_) => href
            .split(|c| c == '?' || c == '#')
            .next()
            .unwrap_or_default()
            .to_string(),
    };

    match urlencoding::decode(&raw_path) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => String::from_utf8_lossy(&urlencoding::decode_binary(raw_path.as_bytes())).into_owned(),
    }
}

/// `HTTP/1.1 200 OK` style status lines; a propstat without one is accepted.
fn status_is_success(status: Option<&str>) -> bool {
    let Some(status) = status else {
        return true;
    };
    status
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse::<u16>().ok())
        .map(|code| (200..300).contains(&code))
        .unwrap_or(false)
}

fn parse_size(href: &str, property: &'static str, value: Option<String>) -> Result<u64> {
    let value = value.ok_or_else(|| WebDAVError::MissingProperty {
        href: href.to_string(),
        property,
    })?;
    value.trim().parse::<u64>().map_err(|_| WebDAVError::InvalidProperty {
        href: href.to_string(),
        property,
        value,
    })
}

fn build_entry(response: ResponseBuilder) -> Result<ResourceEntry> {
    let href = response
        .href
        .filter(|href| !href.trim().is_empty())
        .ok_or_else(|| WebDAVError::MissingProperty {
            href: "<response>".to_string(),
            property: "href",
        })?;
    let path = href_to_path(&href);
    let props = response.props;

    let kind = if props.collection {
        ResourceKind::Folder {
            quota_used_bytes: parse_size(&href, "quota-used-bytes", props.quota_used_bytes)?,
        }
    } else {
        ResourceKind::File {
            content_length: parse_size(&href, "getcontentlength", props.content_length)?,
            content_type: props.content_type,
        }
    };

    Ok(ResourceEntry {
        name: last_path_segment(&path).to_string(),
        path,
        kind,
        last_modified: props.last_modified,
        etag: props.etag,
    })
}
