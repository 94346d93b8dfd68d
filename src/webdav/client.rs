use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use hyper::{Method, Uri, header};
use percent_encoding::percent_decode_str;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, info, warn};

use crate::common::config::ClientConfig;
use crate::common::http::{
    BodyReader, DavRequest, HttpExecutor, HyperExecutor, RawResponse, TransportError,
};
use crate::webdav::charset::decode_text;
use crate::webdav::error::{DavError, DecodeError};
use crate::webdav::request::{self, PayloadError, PutPayload, ensure_trailing_slash};
use crate::webdav::streaming::{decode_resources, parse_multistatus_stream};
use crate::webdav::types::{DavResource, Depth};

/// WebDAV client bound to a base URL.
///
/// Cloning is cheap: clones share the executor and its connection pool. Paths passed to the
/// operations are resolved with [`build_uri`](Self::build_uri), so both absolute URLs and paths
/// relative to the base work.
pub struct WebDavClient<E: HttpExecutor = HyperExecutor> {
    base: Uri,
    executor: Arc<E>,
}

impl<E: HttpExecutor> Clone for WebDavClient<E> {
    fn clone(&self) -> Self {
        Self {
            base: self.base.clone(),
            executor: Arc::clone(&self.executor),
        }
    }
}

impl<E: HttpExecutor> std::fmt::Debug for WebDavClient<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebDavClient")
            .field("base", &self.base)
            .finish_non_exhaustive()
    }
}

impl WebDavClient<HyperExecutor> {
    /// Create a new client from a **base URL** and optional **Basic** credentials.
    ///
    /// The base may be `https://` **or** `http://` (both are supported by the connector).
    pub fn new(
        base_url: &str,
        basic_user: Option<&str>,
        basic_pass: Option<&str>,
    ) -> Result<Self, DavError> {
        let mut config = ClientConfig::new(base_url);
        if let (Some(user), Some(pass)) = (basic_user, basic_pass) {
            config = config.with_credentials(user, pass);
        }
        Self::with_config(config)
    }

    /// Create a client with full control over timeouts, pool limits, TLS roots and headers.
    pub fn with_config(config: ClientConfig) -> Result<Self, DavError> {
        let executor = HyperExecutor::new(&config).map_err(|err| {
            DavError::protocol(&config.base_url, format!("invalid client configuration: {err}"))
        })?;
        Self::with_executor(&config.base_url, executor)
    }
}

impl<E: HttpExecutor> WebDavClient<E> {
    /// Create a client that sends every request through `executor`.
    pub fn with_executor(base_url: &str, executor: E) -> Result<Self, DavError> {
        let base: Uri = base_url
            .parse()
            .map_err(|err| DavError::protocol(base_url, format!("invalid base URL: {err}")))?;
        match base.scheme_str() {
            Some("http") | Some("https") if base.authority().is_some() => {}
            _ => {
                return Err(DavError::protocol(
                    base_url,
                    "base URL must be an absolute http:// or https:// URL",
                ));
            }
        }

        Ok(Self {
            base,
            executor: Arc::new(executor),
        })
    }

    pub fn base(&self) -> &Uri {
        &self.base
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Resolve `path` against the base URL.
    ///
    /// Absolute `http(s)://` URLs are used as is, paths starting with `/` replace the base path,
    /// and anything else is appended to the base collection.
    pub fn build_uri(&self, path: &str) -> Result<Uri, DavError> {
        let invalid =
            |err: &dyn std::fmt::Display| DavError::protocol(path, format!("invalid URL: {err}"));

        if path.starts_with("http://") || path.starts_with("https://") {
            return path.parse().map_err(|err| invalid(&err));
        }

        let mut parts = self.base.clone().into_parts();
        let existing_path = parts
            .path_and_query
            .as_ref()
            .map(|pq| pq.path())
            .unwrap_or("/");

        let (path_only, query) = match path.split_once('?') {
            Some((p, q)) => (p, Some(q)),
            None => (path, None),
        };

        let mut combined = if path_only.is_empty() {
            existing_path.to_string()
        } else if path_only.starts_with('/') {
            path_only.to_string()
        } else {
            let mut base = existing_path.trim_end_matches('/').to_string();
            base.push('/');
            base.push_str(path_only);
            base
        };

        if combined.is_empty() {
            combined.push('/');
        }

        let path_and_query = match query {
            Some(q) => format!("{combined}?{q}"),
            None => combined,
        };

        parts.path_and_query = Some(path_and_query.parse().map_err(|err| invalid(&err))?);
        Uri::from_parts(parts).map_err(|err| invalid(&err))
    }

    /// [`build_uri`](Self::build_uri) with a trailing `/` appended to the path.
    fn collection_uri(&self, path: &str) -> Result<Uri, DavError> {
        ensure_trailing_slash(&self.build_uri(path)?).map_err(|err| build_error(path, err))
    }

    /// Release the connection pool. Every later operation fails with a transport error.
    pub fn close(&self) {
        self.executor.close();
        info!(base = %self.base, "client closed");
    }

    // ----------- Execution -----------

    /// Send one request. Non-2xx statuses become [`DavError::HttpStatus`].
    async fn execute(&self, request: DavRequest) -> Result<RawResponse, DavError> {
        let method = request.method.clone();
        let url = request.uri.to_string();
        debug!(%method, %url, depth = ?request.headers.get("Depth"), "sending request");

        let response = self
            .executor
            .execute(request)
            .await
            .map_err(|source| {
                warn!(%method, %url, error = %source, "transport failure");
                DavError::Transport {
                    method: method.clone(),
                    url: url.clone(),
                    source,
                }
            })?;

        if response.is_success() {
            return Ok(response);
        }

        Err(DavError::HttpStatus {
            method,
            url,
            status: response.status,
            reason: response.reason_phrase().map(str::to_owned),
        })
    }

    /// `true` on 2xx, `false` on a status rejection, `Err` on anything else.
    async fn execute_accepted(&self, request: DavRequest) -> Result<bool, DavError> {
        match self.execute(request).await {
            Ok(_) => Ok(true),
            Err(err) if err.is_clean_rejection() => {
                debug!(error = %err, "request rejected");
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    async fn propfind(&self, uri: Uri, depth: Depth) -> Result<Vec<DavResource>, DavError> {
        let url = uri.to_string();
        let request = request::propfind(uri.clone(), depth).map_err(|err| build_error(&url, err))?;
        let method = request.method.clone();
        let response = self.execute(request).await?;

        let entries = parse_multistatus_stream(response.body)
            .await
            .map_err(|err| body_error(method, &url, err))?;

        decode_resources(&uri, entries).map_err(|err| {
            warn!(%url, error = %err, "undecodable multistatus entry");
            DavError::decode(&url, err)
        })
    }

    // ----------- Queries -----------

    /// Properties of a single resource (`PROPFIND`, `Depth: 0`).
    pub async fn resource_info(&self, url: &str) -> Result<DavResource, DavError> {
        let uri = self.build_uri(url)?;
        let mut resources = self.propfind(uri, Depth::Zero).await?;

        let count = resources.len();
        match resources.pop() {
            Some(resource) if count == 1 => Ok(resource),
            _ => Err(DavError::protocol(
                url,
                format!("expected exactly one resource, the server returned {count}"),
            )),
        }
    }

    /// Members of the collection at `url`, without the collection itself.
    ///
    /// With `recurse`, every sub-collection is listed depth-first right after it appears.
    pub async fn list_contents(
        &self,
        url: &str,
        recurse: bool,
    ) -> Result<Vec<DavResource>, DavError> {
        self.walk(url, recurse, |_, _| true, false).await
    }

    /// Like [`list_contents`](Self::list_contents), keeping only entries accepted by `filter`.
    ///
    /// The filter receives `(parent path, Some(decoded name))` for files and
    /// `(collection path, None)` for collections. Rejected collections are still descended into.
    pub async fn list_contents_filtered<F>(
        &self,
        url: &str,
        recurse: bool,
        filter: F,
    ) -> Result<Vec<DavResource>, DavError>
    where
        F: FnMut(&str, Option<&str>) -> bool + Send,
    {
        self.walk(url, recurse, filter, false).await
    }

    /// Recursive listing where a collection rejected by `filter` is neither returned nor queried.
    pub async fn list_contents_pruned<F>(
        &self,
        url: &str,
        filter: F,
    ) -> Result<Vec<DavResource>, DavError>
    where
        F: FnMut(&str, Option<&str>) -> bool + Send,
    {
        self.walk(url, true, filter, true).await
    }

    /// Files only. Sub-collections are still traversed when `recurse` is set.
    pub async fn list_files(&self, url: &str, recurse: bool) -> Result<Vec<DavResource>, DavError> {
        self.walk(url, recurse, |_, name| name.is_some(), false).await
    }

    async fn walk<F>(
        &self,
        url: &str,
        recurse: bool,
        mut filter: F,
        prune: bool,
    ) -> Result<Vec<DavResource>, DavError>
    where
        F: FnMut(&str, Option<&str>) -> bool + Send,
    {
        let root = self.collection_uri(url)?;

        let mut visited = HashSet::new();
        visited.insert(canonical_key(&root));

        let mut result = Vec::new();
        let mut stack = vec![self.list_children(root).await?.into_iter()];

        while let Some(level) = stack.last_mut() {
            let Some(resource) = level.next() else {
                stack.pop();
                continue;
            };

            let accepted = if resource.is_collection() {
                filter(resource.path(), None)
            } else {
                let name = resource
                    .name_decoded()
                    .or_else(|| resource.name().map(str::to_owned));
                filter(resource.parent_path().unwrap_or("/"), name.as_deref())
            };

            let descend = recurse
                && resource.is_collection()
                && (accepted || !prune)
                && visited.insert(canonical_key(resource.url()));
            let next = descend.then(|| resource.url().clone());

            if accepted {
                result.push(resource);
            }
            if let Some(uri) = next {
                let children = self.list_children(uri).await?;
                stack.push(children.into_iter());
            }
        }

        Ok(result)
    }

    /// `PROPFIND Depth: 1` on a collection, minus the entry for the collection itself.
    async fn list_children(&self, collection: Uri) -> Result<Vec<DavResource>, DavError> {
        let own_key = canonical_key(&collection);
        let resources = self.propfind(collection, Depth::One).await?;
        Ok(resources
            .into_iter()
            .filter(|resource| canonical_key(resource.url()) != own_key)
            .collect())
    }

    /// `HEAD`: `true` on 2xx, `false` when the server answers with any other status.
    pub async fn exists(&self, url: &str) -> Result<bool, DavError> {
        let uri = self.build_uri(url)?;
        self.execute_accepted(request::head(uri)).await
    }

    // ----------- Downloads -----------

    /// `GET`, returning the body as a reader. Nothing is buffered.
    pub async fn get_stream(&self, url: &str) -> Result<BodyReader, DavError> {
        let uri = self.build_uri(url)?;
        Ok(self.execute(request::get(uri)).await?.body)
    }

    pub async fn get_bytes(&self, url: &str) -> Result<Bytes, DavError> {
        let uri = self.build_uri(url)?;
        let response = self.execute(request::get(uri.clone())).await?;
        read_body(uri, response).await.map(|(_, body)| body)
    }

    /// `GET`, decoding the body with the charset of its `Content-Type` (UTF-8 by default).
    pub async fn get_string(&self, url: &str) -> Result<String, DavError> {
        let uri = self.build_uri(url)?;
        let response = self.execute(request::get(uri.clone())).await?;
        let url = uri.to_string();
        let (content_type, body) = read_body(uri, response).await?;
        decode_text(&body, content_type.as_deref()).map_err(|err| DavError::decode(url, err))
    }

    // ----------- Uploads -----------

    /// `PUT`. Missing parent collections are not created.
    pub async fn put(&self, url: &str, payload: PutPayload) -> Result<(), DavError> {
        let uri = self.build_uri(url)?;
        let (body, content_type) = payload.into_body().await.map_err(|err| match err {
            PayloadError::Io(source) => DavError::Transport {
                method: Method::PUT,
                url: uri.to_string(),
                source: TransportError::Io(source),
            },
            other => DavError::protocol(uri.to_string(), other.to_string()),
        })?;
        self.execute(request::put(uri, body, content_type)).await?;
        Ok(())
    }

    pub async fn put_bytes(&self, url: &str, body: impl Into<Bytes>) -> Result<(), DavError> {
        self.put(url, PutPayload::Bytes(body.into())).await
    }

    pub async fn put_stream<R>(&self, url: &str, reader: R) -> Result<(), DavError>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        self.put(url, PutPayload::Stream(Box::new(reader))).await
    }

    pub async fn put_file(
        &self,
        url: &str,
        path: impl AsRef<Path>,
        content_type: &str,
    ) -> Result<(), DavError> {
        let payload = PutPayload::File {
            path: path.as_ref().to_path_buf(),
            content_type: content_type.to_string(),
        };
        self.put(url, payload).await
    }

    pub async fn put_text(&self, url: &str, content: &str, charset: &str) -> Result<(), DavError> {
        let payload = PutPayload::Text {
            content: content.to_string(),
            charset: charset.to_string(),
        };
        self.put(url, payload).await
    }

    // ----------- Mutations -----------

    pub async fn delete(&self, url: &str) -> Result<(), DavError> {
        let uri = self.build_uri(url)?;
        self.execute(request::delete(uri)).await?;
        Ok(())
    }

    /// `MOVE` with `Overwrite: T`.
    ///
    /// A collection source (ending with `/`) requires a destination ending with `/`; otherwise
    /// this fails with [`DavError::Protocol`] before anything is sent.
    pub async fn r#move(&self, source: &str, destination: &str) -> Result<(), DavError> {
        self.relocate(source, destination, request::move_request).await
    }

    /// `COPY` with `Overwrite: T`. Same destination rule as [`r#move`](Self::r#move).
    pub async fn copy(&self, source: &str, destination: &str) -> Result<(), DavError> {
        self.relocate(source, destination, request::copy_request).await
    }

    async fn relocate(
        &self,
        source: &str,
        destination: &str,
        build: fn(Uri, &Uri) -> Result<DavRequest, hyper::http::Error>,
    ) -> Result<(), DavError> {
        request::check_relocation(source, destination)
            .map_err(|message| DavError::protocol(source, message))?;

        let from = self.build_uri(source)?;
        let to = self.build_uri(destination)?;
        let request = build(from, &to).map_err(|err| build_error(source, err))?;
        self.execute(request).await?;
        Ok(())
    }

    /// `MKCOL`: `true` when created, `false` when the server refuses.
    pub async fn mkdir(&self, url: &str) -> Result<bool, DavError> {
        let uri = self.collection_uri(url)?;
        self.mkcol(uri).await
    }

    async fn mkcol(&self, uri: Uri) -> Result<bool, DavError> {
        let url = uri.to_string();
        let request = request::mkcol(uri).map_err(|err| build_error(&url, err))?;
        self.execute_accepted(request).await
    }

    /// Create `url` and every missing ancestor.
    ///
    /// Walks up with `HEAD` until an existing collection is found, then creates the missing
    /// levels top-down. Returns `false` when some level cannot be created, or when not even the
    /// root exists.
    pub async fn mkdirs(&self, url: &str) -> Result<bool, DavError> {
        let target = self.collection_uri(url)?;
        let segments: Vec<&str> = target.path().split('/').filter(|s| !s.is_empty()).collect();

        let mut existing = segments.len();
        loop {
            let level = collection_at(&target, &segments[..existing])?;
            if self.execute_accepted(request::head(level)).await? {
                break;
            }
            if existing == 0 {
                debug!(%target, "server root does not exist");
                return Ok(false);
            }
            existing -= 1;
        }

        for depth in existing + 1..=segments.len() {
            let level = collection_at(&target, &segments[..depth])?;
            if !self.mkcol(level).await? {
                return Ok(false);
            }
        }

        Ok(true)
    }
}

fn build_error(url: &str, err: hyper::http::Error) -> DavError {
    DavError::protocol(url, format!("could not build request: {err}"))
}

/// Reader failures while decoding are transport errors, everything else is a decode failure.
fn body_error(method: Method, url: &str, err: DecodeError) -> DavError {
    match err {
        DecodeError::Xml(quick_xml::Error::Io(source)) => {
            warn!(%method, %url, error = %source, "response body interrupted");
            DavError::Transport {
                method,
                url: url.to_string(),
                source: TransportError::Body(source),
            }
        }
        other => {
            warn!(%url, error = %other, "undecodable multistatus body");
            DavError::decode(url, other)
        }
    }
}

async fn read_body(uri: Uri, response: RawResponse) -> Result<(Option<String>, Bytes), DavError> {
    let content_type = response
        .headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    let mut body = response.body;
    let mut buf = Vec::new();
    body.read_to_end(&mut buf)
        .await
        .map_err(|source| {
            warn!(%uri, error = %source, "response body interrupted");
            DavError::Transport {
                method: Method::GET,
                url: uri.to_string(),
                source: TransportError::Body(Arc::new(source)),
            }
        })?;

    Ok((content_type, Bytes::from(buf)))
}

/// The collection URL made of the first `segments` of `target`'s path.
fn collection_at(target: &Uri, segments: &[&str]) -> Result<Uri, DavError> {
    let mut path = String::from("/");
    for segment in segments {
        path.push_str(segment);
        path.push('/');
    }

    let mut parts = hyper::http::uri::Parts::default();
    parts.scheme = target.scheme().cloned();
    parts.authority = target.authority().cloned();
    parts.path_and_query = Some(
        path.parse()
            .map_err(|err| DavError::protocol(target.to_string(), format!("invalid URL: {err}")))?,
    );
    Uri::from_parts(parts)
        .map_err(|err| DavError::protocol(target.to_string(), format!("invalid URL: {err}")))
}

/// Authority plus percent-decoded path without trailing `/`, for comparing collection URLs.
fn canonical_key(uri: &Uri) -> String {
    let authority = uri
        .authority()
        .map(|a| a.as_str().to_ascii_lowercase())
        .unwrap_or_default();
    let path = percent_decode_str(uri.path()).decode_utf8_lossy();
    format!("{authority}{}", path.trim_end_matches('/'))
}
