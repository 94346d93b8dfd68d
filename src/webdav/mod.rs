pub mod charset;
pub mod client;
pub mod date;
pub mod error;
pub mod request;
pub mod streaming;
pub mod types;

pub use client::WebDavClient;
pub use date::parse_dav_date;
pub use error::{DavError, DecodeError, ErrorKind};
pub use request::{PROPFIND_ALLPROP_BODY, PutPayload, ensure_trailing_slash};
pub use streaming::{decode_resources, parse_multistatus_bytes, parse_multistatus_stream};
pub use types::{DIRECTORY_CONTENT_TYPE, DavResource, Depth, MultistatusEntry};
