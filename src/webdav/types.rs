use std::fmt;

use chrono::{DateTime, Utc};
use hyper::Uri;
use hyper::http::uri::{Parts, PathAndQuery};
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};

use crate::webdav::date::parse_dav_date;
use crate::webdav::error::DecodeError;

/// Content type reported for collections whose server did not send one.
pub const DIRECTORY_CONTENT_TYPE: &str = "httpd/unix-directory";

/// Characters that may show up unescaped in server hrefs but are not valid in a URI.
const HREF_UNSAFE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'\\')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// WebDAV Depth
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Depth {
    Zero,
    One,
}

impl Depth {
    pub fn as_str(self) -> &'static str {
        match self {
            Depth::Zero => "0",
            Depth::One => "1",
        }
    }
}

/// Raw fields of one `<response>` element of a multistatus document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MultistatusEntry {
    pub href: String,
    pub is_collection: bool,
    pub creation_date: Option<String>,
    pub last_modified: Option<String>,
    pub content_type: Option<String>,
    pub content_length: Option<String>,
}

/// A resource on a remote server, file or collection.
///
/// Built once per multistatus entry and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DavResource {
    href: String,
    url: Uri,
    name: Option<String>,
    is_collection: bool,
    creation_date: Option<DateTime<Utc>>,
    modified_date: Option<DateTime<Utc>>,
    content_type: String,
    content_length: u64,
}

impl DavResource {
    /// Interpret one multistatus entry, resolving its href against `base`.
    pub fn from_entry(base: &Uri, entry: MultistatusEntry) -> Result<Self, DecodeError> {
        let MultistatusEntry {
            mut href,
            is_collection,
            creation_date,
            last_modified,
            content_type,
            content_length,
        } = entry;

        if is_collection && !href.ends_with('/') {
            href.push('/');
        }

        let url = resolve_href(base, &href)?;
        let name = last_segment(url.path()).map(str::to_owned);

        // getlastmodified is optional on many servers
        let modified_source = last_modified.as_deref().or(creation_date.as_deref());
        let modified_date = modified_source.and_then(parse_dav_date);
        let creation_date = creation_date.as_deref().and_then(parse_dav_date);

        let content_type = match content_type {
            Some(ct) => ct,
            None if is_collection => DIRECTORY_CONTENT_TYPE.to_string(),
            None => String::new(),
        };

        let content_length = match content_length {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|_| DecodeError::InvalidContentLength {
                    href: href.clone(),
                    value: raw.clone(),
                })?,
            None => 0,
        };

        Ok(Self {
            href,
            url,
            name,
            is_collection,
            creation_date,
            modified_date,
            content_type,
            content_length,
        })
    }

    /// The href exactly as the server reported it (plus a trailing `/` on collections).
    pub fn href(&self) -> &str {
        &self.href
    }

    /// Absolute URL of the resource.
    pub fn url(&self) -> &Uri {
        &self.url
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// Path of the enclosing collection, ending with `/`. `None` for the root.
    pub fn parent_path(&self) -> Option<&str> {
        parent_of(self.url.path())
    }

    /// Absolute URL of the enclosing collection. `None` for the root.
    pub fn parent_url(&self) -> Option<Uri> {
        let parent = parent_of(self.url.path())?;
        let mut parts = Parts::default();
        parts.scheme = self.url.scheme().cloned();
        parts.authority = self.url.authority().cloned();
        parts.path_and_query = Some(PathAndQuery::try_from(parent).ok()?);
        Uri::from_parts(parts).ok()
    }

    /// The last path segment, percent-encoded as the server sent it.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The percent-decoded name, or `None` when it does not decode to UTF-8.
    pub fn name_decoded(&self) -> Option<String> {
        let name = self.name.as_deref()?;
        percent_decode_str(name)
            .decode_utf8()
            .ok()
            .map(|decoded| decoded.into_owned())
    }

    pub fn is_collection(&self) -> bool {
        self.is_collection
    }

    pub fn creation_date(&self) -> Option<DateTime<Utc>> {
        self.creation_date
    }

    /// Last modification time, falling back to the creation date.
    pub fn modified_date(&self) -> Option<DateTime<Utc>> {
        self.modified_date
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn content_length(&self) -> u64 {
        self.content_length
    }
}

impl fmt::Display for DavResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DavResource [url={}, name={}, nameDecoded={}, contentLength={}, contentType={}, created={}, modified={}, isCollection={}]",
            self.url,
            self.name.as_deref().unwrap_or("-"),
            self.name_decoded().as_deref().unwrap_or("-"),
            self.content_length,
            self.content_type,
            display_date(self.creation_date),
            display_date(self.modified_date),
            self.is_collection,
        )
    }
}

fn display_date(date: Option<DateTime<Utc>>) -> String {
    date.map(|d| d.to_rfc3339()).unwrap_or_else(|| "-".to_string())
}

/// Resolve a server href (absolute URL or path) against the scheme and authority of `base`.
pub(crate) fn resolve_href(base: &Uri, href: &str) -> Result<Uri, DecodeError> {
    let href = href.trim();
    let invalid = || DecodeError::InvalidHref(href.to_string());

    if href.contains("://") {
        let parsed = parse_lenient::<Uri>(href).ok_or_else(invalid)?;
        if parsed.scheme().is_none() || parsed.authority().is_none() {
            return Err(invalid());
        }
        return Ok(parsed);
    }

    let path = if href.starts_with('/') {
        href.to_string()
    } else {
        // relative to the base collection
        let base_path = base.path();
        let dir_end = base_path.rfind('/').map_or(0, |i| i + 1);
        let dir = if dir_end == 0 { "/" } else { &base_path[..dir_end] };
        format!("{dir}{href}")
    };

    let mut parts = Parts::default();
    parts.scheme = base.scheme().cloned();
    parts.authority = base.authority().cloned();
    parts.path_and_query = Some(parse_lenient::<PathAndQuery>(&path).ok_or_else(invalid)?);
    Uri::from_parts(parts).map_err(|_| invalid())
}

fn parse_lenient<T: std::str::FromStr>(raw: &str) -> Option<T> {
    raw.parse()
        .ok()
        .or_else(|| utf8_percent_encode(raw, HREF_UNSAFE).to_string().parse().ok())
}

/// Last non-empty segment of a path, ignoring one trailing `/`.
pub(crate) fn last_segment(path: &str) -> Option<&str> {
    let trimmed = path.strip_suffix('/').unwrap_or(path);
    let (_, segment) = trimmed.rsplit_once('/')?;
    (!segment.is_empty()).then_some(segment)
}

/// `path` with exactly its last segment removed, keeping the trailing `/`.
pub(crate) fn parent_of(path: &str) -> Option<&str> {
    let segment = last_segment(path)?;
    let trimmed = path.strip_suffix('/').unwrap_or(path);
    Some(&trimmed[..trimmed.len() - segment.len()])
}
