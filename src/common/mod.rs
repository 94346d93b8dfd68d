pub mod compression;
pub mod config;
pub mod http;

pub use compression::{ContentEncoding, add_accept_encoding, decode_body, detect_encodings};
pub use config::{ClientConfig, Credentials, DEFAULT_USER_AGENT, ProxyConfig, TlsRoots};
pub use http::{
    BodyReader, DavRequest, HttpExecutor, HyperClient, HyperExecutor, RawResponse, TransportError,
    build_hyper_client,
};
