//! Request construction for the WebDAV verbs, kept apart from execution.
//!
//! Every builder returns a [`DavRequest`] that any [`HttpExecutor`](crate::HttpExecutor) can
//! send. Nothing here touches the network.

use std::path::PathBuf;

use bytes::Bytes;
use hyper::http::uri::{Parts, PathAndQuery};
use hyper::{HeaderMap, Method, Uri, header};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::common::http::DavRequest;
use crate::webdav::charset::encode_text;
use crate::webdav::types::Depth;

/// PROPFIND body asking for every live property.
pub const PROPFIND_ALLPROP_BODY: &str =
    r#"<?xml version="1.0" encoding="utf-8" ?><propfind xmlns="DAV:"><allprop/></propfind>"#;

const XML_CONTENT_TYPE: &str = "text/xml; charset=utf-8";
const OCTET_STREAM: &str = "application/octet-stream";

fn dav_method(name: &'static str) -> Result<Method, hyper::http::Error> {
    Ok(Method::from_bytes(name.as_bytes())?)
}

fn bare(method: Method, uri: Uri) -> DavRequest {
    DavRequest {
        method,
        uri,
        headers: HeaderMap::new(),
        body: None,
    }
}

/// `uri` with a `/` appended to its path when missing. The query, if any, is kept.
pub fn ensure_trailing_slash(uri: &Uri) -> Result<Uri, hyper::http::Error> {
    if uri.path().ends_with('/') {
        return Ok(uri.clone());
    }
    let path_and_query = match uri.query() {
        Some(query) => format!("{}/?{}", uri.path(), query),
        None => format!("{}/", uri.path()),
    };
    let mut parts = Parts::default();
    parts.scheme = uri.scheme().cloned();
    parts.authority = uri.authority().cloned();
    parts.path_and_query = Some(PathAndQuery::try_from(path_and_query)?);
    Ok(Uri::from_parts(parts)?)
}

/// `PROPFIND` with the allprop body.
pub fn propfind(uri: Uri, depth: Depth) -> Result<DavRequest, hyper::http::Error> {
    let mut headers = HeaderMap::new();
    headers.insert("Depth", header::HeaderValue::from_static(depth.as_str()));
    headers.insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static(XML_CONTENT_TYPE),
    );
    Ok(DavRequest {
        method: dav_method("PROPFIND")?,
        uri,
        headers,
        body: Some(Bytes::from_static(PROPFIND_ALLPROP_BODY.as_bytes())),
    })
}

pub fn get(uri: Uri) -> DavRequest {
    bare(Method::GET, uri)
}

pub fn head(uri: Uri) -> DavRequest {
    bare(Method::HEAD, uri)
}

pub fn delete(uri: Uri) -> DavRequest {
    bare(Method::DELETE, uri)
}

pub fn mkcol(uri: Uri) -> Result<DavRequest, hyper::http::Error> {
    Ok(bare(dav_method("MKCOL")?, uri))
}

pub fn put(uri: Uri, body: Bytes, content_type: header::HeaderValue) -> DavRequest {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, content_type);
    DavRequest {
        method: Method::PUT,
        uri,
        headers,
        body: Some(body),
    }
}

/// `MOVE` with an absolute `Destination` and `Overwrite: T`.
pub fn move_request(source: Uri, destination: &Uri) -> Result<DavRequest, hyper::http::Error> {
    relocation(dav_method("MOVE")?, source, destination)
}

/// `COPY` with an absolute `Destination` and `Overwrite: T`.
pub fn copy_request(source: Uri, destination: &Uri) -> Result<DavRequest, hyper::http::Error> {
    relocation(dav_method("COPY")?, source, destination)
}

fn relocation(
    method: Method,
    source: Uri,
    destination: &Uri,
) -> Result<DavRequest, hyper::http::Error> {
    let mut headers = HeaderMap::new();
    headers.insert(
        "Destination",
        header::HeaderValue::from_str(&destination.to_string())?,
    );
    headers.insert("Overwrite", header::HeaderValue::from_static("T"));
    Ok(DavRequest {
        method,
        uri: source,
        headers,
        body: None,
    })
}

/// A collection can only be moved or copied onto a collection URL.
pub(crate) fn check_relocation(source: &str, destination: &str) -> Result<(), String> {
    if source.ends_with('/') && !destination.ends_with('/') {
        return Err(format!(
            "destination {destination} must end with '/' because the source is a collection"
        ));
    }
    Ok(())
}

/// Content of a `PUT` request.
pub enum PutPayload {
    /// Sent as `application/octet-stream`.
    Bytes(Bytes),
    /// Read to the end before sending, then sent as `application/octet-stream`.
    Stream(Box<dyn AsyncRead + Unpin + Send>),
    /// A local file, sent with the given content type.
    File { path: PathBuf, content_type: String },
    /// Text encoded in `charset`, sent as `text/plain; charset=<charset>`.
    Text { content: String, charset: String },
}

impl std::fmt::Debug for PutPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PutPayload::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            PutPayload::Stream(_) => f.write_str("Stream"),
            PutPayload::File { path, content_type } => f
                .debug_struct("File")
                .field("path", path)
                .field("content_type", content_type)
                .finish(),
            PutPayload::Text { charset, .. } => {
                f.debug_struct("Text").field("charset", charset).finish_non_exhaustive()
            }
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub(crate) enum PayloadError {
    #[error("failed to read the upload payload")]
    Io(#[from] std::io::Error),

    #[error("unsupported charset {0:?}")]
    UnknownCharset(String),

    #[error("invalid content type {0:?}")]
    InvalidContentType(String),
}

impl PutPayload {
    /// Materialize the body and its `Content-Type`.
    pub(crate) async fn into_body(self) -> Result<(Bytes, header::HeaderValue), PayloadError> {
        match self {
            PutPayload::Bytes(bytes) => Ok((bytes, header::HeaderValue::from_static(OCTET_STREAM))),
            PutPayload::Stream(mut reader) => {
                let mut buf = Vec::new();
                reader.read_to_end(&mut buf).await?;
                Ok((Bytes::from(buf), header::HeaderValue::from_static(OCTET_STREAM)))
            }
            PutPayload::File { path, content_type } => {
                let content = tokio::fs::read(&path).await?;
                let value = header::HeaderValue::from_str(&content_type)
                    .map_err(|_| PayloadError::InvalidContentType(content_type.clone()))?;
                Ok((Bytes::from(content), value))
            }
            PutPayload::Text { content, charset } => {
                let body = encode_text(&content, &charset)
                    .ok_or_else(|| PayloadError::UnknownCharset(charset.clone()))?;
                let content_type = format!("text/plain; charset={charset}");
                let value = header::HeaderValue::from_str(&content_type)
                    .map_err(|_| PayloadError::InvalidContentType(content_type.clone()))?;
                Ok((body, value))
            }
        }
    }
}
