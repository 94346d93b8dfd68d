use std::fmt;

use hyper::{Method, StatusCode};

use crate::common::http::TransportError;

/// Coarse classification of a [`DavError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No HTTP exchange could be completed.
    Transport,
    /// The exchange completed with a non-2xx status.
    HttpStatus,
    /// The response body did not have the expected multistatus shape.
    DecodeFailure,
    /// A precondition enforced by the client itself was violated.
    Protocol,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorKind::Transport => "transport",
            ErrorKind::HttpStatus => "http status",
            ErrorKind::DecodeFailure => "decode failure",
            ErrorKind::Protocol => "protocol",
        })
    }
}

/// Why a multistatus body could not be decoded.
#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("malformed XML")]
    Xml(#[from] quick_xml::Error),

    #[error("expected a multistatus document, found <{0}>")]
    UnexpectedRoot(String),

    #[error("the document has no root element")]
    EmptyDocument,

    #[error("the document ended inside <{0}>")]
    Truncated(String),

    #[error("response element without href")]
    MissingHref,

    #[error("response for {href} has no propstat")]
    MissingPropstat { href: String },

    #[error("invalid UTF-8 in XML text")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("unknown entity reference &{0};")]
    UnknownEntity(String),

    #[error("invalid getcontentlength {value:?} for {href}")]
    InvalidContentLength { href: String, value: String },

    #[error("href {0:?} cannot be resolved to a URL")]
    InvalidHref(String),

    #[error("response body is not valid {0}")]
    InvalidText(&'static str),
}

/// The error type of every [`WebDavClient`](crate::WebDavClient) operation.
#[derive(thiserror::Error, Debug)]
pub enum DavError {
    #[error("{method} {url}: transport failure")]
    Transport {
        method: Method,
        url: String,
        #[source]
        source: TransportError,
    },

    #[error("{method} {url}: the server returned {status}{}", reason_suffix(.reason))]
    HttpStatus {
        method: Method,
        url: String,
        status: StatusCode,
        reason: Option<String>,
    },

    #[error("{url}: could not decode response")]
    Decode {
        url: String,
        #[source]
        source: DecodeError,
    },

    #[error("{url}: {message}")]
    Protocol { url: String, message: String },
}

impl DavError {
    pub(crate) fn protocol(url: impl Into<String>, message: impl Into<String>) -> Self {
        DavError::Protocol {
            url: url.into(),
            message: message.into(),
        }
    }

    pub(crate) fn decode(url: impl Into<String>, source: DecodeError) -> Self {
        DavError::Decode {
            url: url.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DavError::Transport { .. } => ErrorKind::Transport,
            DavError::HttpStatus { .. } => ErrorKind::HttpStatus,
            DavError::Decode { .. } => ErrorKind::DecodeFailure,
            DavError::Protocol { .. } => ErrorKind::Protocol,
        }
    }

    /// The URL the failing request was addressed to.
    pub fn url(&self) -> &str {
        match self {
            DavError::Transport { url, .. }
            | DavError::HttpStatus { url, .. }
            | DavError::Decode { url, .. }
            | DavError::Protocol { url, .. } => url,
        }
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            DavError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            DavError::HttpStatus { reason, .. } => reason.as_deref(),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }

    /// A completed exchange that the server rejected, with no underlying cause.
    ///
    /// `exists` and `mkdir` turn exactly these into `false`.
    pub fn is_clean_rejection(&self) -> bool {
        matches!(self, DavError::HttpStatus { .. })
    }
}

fn reason_suffix(reason: &Option<String>) -> String {
    reason.as_deref().map(|r| format!(" ({r})")).unwrap_or_default()
}
