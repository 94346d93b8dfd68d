//! Fast WebDAV client library for Rust.
//!
//! An asynchronous WebDAV client built on hyper 1.x, rustls and tokio. It lists, fetches,
//! uploads, deletes, moves and copies resources, and creates collection hierarchies on any
//! WebDAV-capable HTTP server.
//!
//! # Features
//!
//! - HTTP/2 and connection pooling with per-host and global connection caps
//! - Automatic response decompression (br/zstd/gzip)
//! - Streaming multistatus parsing with minimal memory footprint
//! - Recursive listing and `mkdirs` without call-stack recursion
//! - A pluggable [`HttpExecutor`] for custom transports and tests
//!
//! # Examples
//!
//! ## Listing a collection
//!
//! ```no_run
//! use fast_webdav_rs::WebDavClient;
//! use anyhow::Result;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = WebDavClient::new(
//!         "https://dav.example.com/files/",
//!         Some("username"),
//!         Some("password"),
//!     )?;
//!
//!     for resource in client.list_contents("projects/", true).await? {
//!         println!("{} ({} bytes)", resource.path(), resource.content_length());
//!     }
//!
//!     // Only `.log` files, anywhere below `projects/`
//!     let logs = client
//!         .list_contents_filtered("projects/", true, |_, name| {
//!             name.is_some_and(|n| n.ends_with(".log"))
//!         })
//!         .await?;
//!     println!("{} log files", logs.len());
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Uploading and downloading
//!
//! ```no_run
//! use fast_webdav_rs::WebDavClient;
//! use anyhow::Result;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = WebDavClient::new("https://dav.example.com/files/", None, None)?;
//!
//!     if client.mkdirs("reports/2024/").await? {
//!         client.put_text("reports/2024/summary.txt", "all green", "utf-8").await?;
//!         client.put_file("reports/2024/data.csv", "data.csv", "text/csv").await?;
//!     }
//!
//!     let summary = client.get_string("reports/2024/summary.txt").await?;
//!     assert_eq!(summary, "all green");
//!
//!     client.r#move("reports/2024/", "archive/2024/").await?;
//!     assert!(!client.exists("reports/2024/summary.txt").await?);
//!
//!     client.close();
//!     Ok(())
//! }
//! ```
//!
//! ## Error handling
//!
//! `exists` and `mkdir` answer `false` when the server rejects the request with a status code;
//! transport failures are always returned as errors.
//!
//! ```no_run
//! use fast_webdav_rs::{ErrorKind, WebDavClient};
//!
//! # async fn run(client: WebDavClient) {
//! match client.resource_info("missing.txt").await {
//!     Ok(info) => println!("{info}"),
//!     Err(err) if err.is_not_found() => println!("no such resource"),
//!     Err(err) if err.kind() == ErrorKind::Transport => eprintln!("server unreachable: {err}"),
//!     Err(err) => eprintln!("{err}"),
//! }
//! # }
//! ```
pub mod common;
pub mod webdav;

pub use common::config::{ClientConfig, Credentials, DEFAULT_USER_AGENT, ProxyConfig, TlsRoots};
pub use common::http::{
    BodyReader, DavRequest, HttpExecutor, HyperExecutor, RawResponse, TransportError,
};
pub use webdav::{
    DavError, DavResource, DecodeError, Depth, ErrorKind, MultistatusEntry, PutPayload,
    WebDavClient, decode_resources, parse_dav_date, parse_multistatus_bytes,
    parse_multistatus_stream,
};
