//! HTTP transport: the [`HttpExecutor`] seam and its hyper-based implementation.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::task::{Context, Poll};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as B64;
use bytes::Bytes;
use futures_util::TryStreamExt;
use http_body_util::{BodyStream, Full};
use hyper::{HeaderMap, Method, Request, StatusCode, Uri, header};
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::connect::proxy::Tunnel;
use hyper_util::client::legacy::{Client, ResponseFuture};
use hyper_util::rt::TokioExecutor;
use tokio::io::{AsyncBufRead, AsyncRead, BufReader, ReadBuf};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::{Instant, Sleep, sleep, timeout};
use tokio_util::io::StreamReader;
use tracing::{info, trace, warn};

use crate::common::compression::{
    add_accept_encoding, decode_body, detect_encodings, strip_encoding_headers,
};
use crate::common::config::{ClientConfig, Credentials, ProxyConfig, TlsRoots};

/// The pooled Hyper client behind [`HyperExecutor`], connecting directly or through a proxy.
#[derive(Clone)]
pub enum HyperClient {
    Direct(Client<HttpsConnector<HttpConnector>, Full<Bytes>>),
    Proxied(Client<HttpsConnector<Tunnel<HttpConnector>>, Full<Bytes>>),
}

impl HyperClient {
    pub fn request(&self, req: Request<Full<Bytes>>) -> ResponseFuture {
        match self {
            HyperClient::Direct(client) => client.request(req),
            HyperClient::Proxied(client) => client.request(req),
        }
    }
}

/// Readable response body, already decompressed.
pub type BodyReader = Box<dyn AsyncBufRead + Unpin + Send>;

/// A fully built request, ready to hand to an [`HttpExecutor`].
#[derive(Debug, Clone)]
pub struct DavRequest {
    pub method: Method,
    /// Absolute URL.
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

/// Status line, headers and body of a completed exchange.
pub struct RawResponse {
    pub status: StatusCode,
    /// Reason phrase as sent on the wire, when the transport exposes it.
    pub reason: Option<String>,
    pub headers: HeaderMap,
    pub body: BodyReader,
}

impl RawResponse {
    /// Response backed by an in-memory body.
    pub fn with_body(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            reason: None,
            headers,
            body: Box::new(io::Cursor::new(body.into())),
        }
    }

    /// Response with an empty body and no headers.
    pub fn empty(status: StatusCode) -> Self {
        Self::with_body(status, HeaderMap::new(), Bytes::new())
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// The wire reason phrase, or the canonical one for the status code.
    pub fn reason_phrase(&self) -> Option<&str> {
        self.reason
            .as_deref()
            .or_else(|| self.status.canonical_reason())
    }
}

impl fmt::Debug for RawResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawResponse")
            .field("status", &self.status)
            .field("reason", &self.reason)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Failure to complete an HTTP exchange at all.
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("http client error")]
    Client(#[from] hyper_util::client::legacy::Error),

    #[error("no response within {0:?}")]
    Timeout(Duration),

    #[error("the client has been closed")]
    Closed,

    #[error("failed to build request")]
    InvalidRequest(#[from] hyper::http::Error),

    #[error("proxy must be an http:// URL with a host, got {0:?}")]
    InvalidProxy(String),

    #[error("failed reading the response body")]
    Body(#[source] Arc<io::Error>),

    #[error("i/o error")]
    Io(#[from] io::Error),
}

/// Performs one HTTP exchange.
///
/// Implementations own connection management, TLS and authentication. A response with any
/// status code is a success at this level; only failing to obtain a response is an error.
pub trait HttpExecutor: Send + Sync + 'static {
    fn execute(
        &self,
        request: DavRequest,
    ) -> impl Future<Output = Result<RawResponse, TransportError>> + Send;

    /// Release pooled resources. Later calls to [`execute`](Self::execute) must fail fast.
    fn close(&self) {}
}

/// Build a Hyper client with HTTP/1.1 + HTTP/2, connection pooling, and a TLS connector
/// whose root store follows [`ClientConfig::tls_roots`].
///
/// With [`ClientConfig::proxy`] set, every connection is a `CONNECT` tunnel through the proxy.
pub fn build_hyper_client(config: &ClientConfig) -> Result<HyperClient, TransportError> {
    let mut http = HttpConnector::new();
    http.enforce_http(false);
    http.set_connect_timeout(Some(config.connect_timeout));

    let https_builder = match config.tls_roots {
        TlsRoots::NativeWithFallback => {
            HttpsConnectorBuilder::new()
                .with_native_roots()
                .unwrap_or_else(|err| {
                    warn!("falling back to webpki roots (native roots unavailable: {err})");
                    HttpsConnectorBuilder::new().with_webpki_roots()
                })
        }
        TlsRoots::WebPki => HttpsConnectorBuilder::new().with_webpki_roots(),
    };

    let https = https_builder.https_or_http().enable_http1().enable_http2();

    let mut pool = Client::builder(TokioExecutor::new());
    pool.pool_max_idle_per_host(config.max_connections_per_route);

    match &config.proxy {
        None => Ok(HyperClient::Direct(pool.build(https.wrap_connector(http)))),
        Some(proxy) => {
            let tunnel = proxy_tunnel(proxy, http)?;
            Ok(HyperClient::Proxied(pool.build(https.wrap_connector(tunnel))))
        }
    }
}

fn proxy_tunnel(
    proxy: &ProxyConfig,
    http: HttpConnector,
) -> Result<Tunnel<HttpConnector>, TransportError> {
    let uri: Uri = proxy
        .url
        .parse()
        .map_err(|_| TransportError::InvalidProxy(proxy.url.clone()))?;
    if uri.scheme_str() != Some("http") || uri.authority().is_none() {
        return Err(TransportError::InvalidProxy(proxy.url.clone()));
    }

    let tunnel = Tunnel::new(uri, http);
    match &proxy.credentials {
        Some(creds) => Ok(tunnel.with_auth(basic_auth(creds)?)),
        None => Ok(tunnel),
    }
}

fn basic_auth(creds: &Credentials) -> Result<header::HeaderValue, TransportError> {
    let token = format!("{}:{}", creds.username, creds.password);
    let mut value = header::HeaderValue::from_str(&format!("Basic {}", B64.encode(token)))
        .map_err(hyper::http::Error::from)?;
    value.set_sensitive(true);
    Ok(value)
}

/// Default [`HttpExecutor`]: pooled hyper client with Basic auth and connection caps.
///
/// Cloning is cheap and shares the pool.
#[derive(Clone)]
pub struct HyperExecutor {
    inner: Arc<HyperInner>,
}

struct HyperInner {
    client: RwLock<Option<HyperClient>>,
    auth_header: Option<header::HeaderValue>,
    user_agent: header::HeaderValue,
    request_timeout: Duration,
    read_timeout: Duration,
    accept_compressed: bool,
    limits: ConnectionLimits,
}

impl HyperExecutor {
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let auth_header = config.credentials.as_ref().map(basic_auth).transpose()?;
        let user_agent =
            header::HeaderValue::from_str(&config.user_agent).map_err(hyper::http::Error::from)?;

        Ok(Self {
            inner: Arc::new(HyperInner {
                client: RwLock::new(Some(build_hyper_client(config)?)),
                auth_header,
                user_agent,
                request_timeout: config.request_timeout,
                read_timeout: config.read_timeout,
                accept_compressed: config.accept_compressed,
                limits: ConnectionLimits::new(
                    config.max_connections_per_route,
                    config.max_connections_total,
                ),
            }),
        })
    }

    async fn send(&self, request: DavRequest) -> Result<RawResponse, TransportError> {
        let client = self
            .inner
            .client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(TransportError::Closed)?;
        let permits = self.inner.limits.acquire(&request.uri).await?;

        let DavRequest {
            method,
            uri,
            mut headers,
            body,
        } = request;
        if self.inner.accept_compressed {
            add_accept_encoding(&mut headers);
        }

        let mut req_builder = Request::builder().method(method).uri(uri);
        if let Some(auth) = &self.inner.auth_header {
            req_builder = req_builder.header(header::AUTHORIZATION, auth);
        }
        if !headers.contains_key(header::USER_AGENT) {
            req_builder = req_builder.header(header::USER_AGENT, &self.inner.user_agent);
        }
        for (k, v) in headers.iter() {
            req_builder = req_builder.header(k, v);
        }
        let req = req_builder.body(Full::new(body.unwrap_or_default()))?;

        let resp = timeout(self.inner.request_timeout, client.request(req))
            .await
            .map_err(|_| TransportError::Timeout(self.inner.request_timeout))??;

        let status = resp.status();
        let reason = resp
            .extensions()
            .get::<hyper::ext::ReasonPhrase>()
            .and_then(|phrase| std::str::from_utf8(phrase.as_bytes()).ok())
            .map(str::to_owned);
        trace!(%status, "response head received");

        let (mut parts, body) = resp.into_parts();
        let encodings = if self.inner.accept_compressed {
            detect_encodings(&parts.headers)
        } else {
            Vec::new()
        };
        strip_encoding_headers(&mut parts.headers, &encodings);

        let stream = BodyStream::new(body)
            .map_ok(|frame| frame.into_data().unwrap_or_default())
            .map_err(io::Error::other);
        let reader: BodyReader = Box::new(BufReader::new(StreamReader::new(stream)));

        Ok(RawResponse {
            status,
            reason,
            headers: parts.headers,
            body: Box::new(PermitGuardedBody::new(
                decode_body(reader, &encodings),
                self.inner.read_timeout,
                permits,
            )),
        })
    }
}

impl HttpExecutor for HyperExecutor {
    async fn execute(&self, request: DavRequest) -> Result<RawResponse, TransportError> {
        self.send(request).await
    }

    fn close(&self) {
        let previous = self
            .inner
            .client
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.inner.limits.close();
        if previous.is_some() {
            info!("connection pool released");
        }
    }
}

/// Caps on simultaneous exchanges, per scheme+authority and overall.
struct ConnectionLimits {
    per_route: usize,
    total: Arc<Semaphore>,
    routes: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl ConnectionLimits {
    fn new(per_route: usize, total: usize) -> Self {
        Self {
            per_route: per_route.max(1),
            total: Arc::new(Semaphore::new(total.max(1))),
            routes: Mutex::new(HashMap::new()),
        }
    }

    async fn acquire(&self, uri: &Uri) -> Result<[OwnedSemaphorePermit; 2], TransportError> {
        let route = format!(
            "{}://{}",
            uri.scheme_str().unwrap_or("http"),
            uri.authority().map(|a| a.as_str()).unwrap_or_default()
        );
        let route_sem = self
            .routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(route)
            .or_insert_with(|| Arc::new(Semaphore::new(self.per_route)))
            .clone();

        let route_permit = route_sem
            .acquire_owned()
            .await
            .map_err(|_| TransportError::Closed)?;
        let total_permit = self
            .total
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| TransportError::Closed)?;
        Ok([route_permit, total_permit])
    }

    fn close(&self) {
        self.total.close();
        for sem in self
            .routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
        {
            sem.close();
        }
    }
}

/// Body reader that keeps its connection permits until it is dropped.
///
/// A read that makes no progress for `read_timeout` fails with [`io::ErrorKind::TimedOut`].
struct PermitGuardedBody {
    inner: BodyReader,
    read_timeout: Duration,
    stall: Pin<Box<Sleep>>,
    waiting: bool,
    _permits: [OwnedSemaphorePermit; 2],
}

impl PermitGuardedBody {
    fn new(inner: BodyReader, read_timeout: Duration, permits: [OwnedSemaphorePermit; 2]) -> Self {
        Self {
            inner,
            read_timeout,
            stall: Box::pin(sleep(read_timeout)),
            waiting: false,
            _permits: permits,
        }
    }
}

/// Arms the stall timer on the first `Pending` of a read and reports when it fires.
fn poll_stalled(
    stall: &mut Pin<Box<Sleep>>,
    waiting: &mut bool,
    read_timeout: Duration,
    cx: &mut Context<'_>,
) -> Poll<io::Error> {
    if !*waiting {
        stall.as_mut().reset(Instant::now() + read_timeout);
        *waiting = true;
    }
    match stall.as_mut().poll(cx) {
        Poll::Ready(()) => Poll::Ready(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("no body data received within {read_timeout:?}"),
        )),
        Poll::Pending => Poll::Pending,
    }
}

impl AsyncRead for PermitGuardedBody {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_read(cx, buf) {
            Poll::Ready(result) => {
                this.waiting = false;
                Poll::Ready(result)
            }
            Poll::Pending => {
                poll_stalled(&mut this.stall, &mut this.waiting, this.read_timeout, cx).map(Err)
            }
        }
    }
}

impl AsyncBufRead for PermitGuardedBody {
    fn poll_fill_buf(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<&[u8]>> {
        let this = self.get_mut();
        match Pin::new(&mut this.inner).poll_fill_buf(cx) {
            Poll::Ready(result) => {
                this.waiting = false;
                Poll::Ready(result)
            }
            Poll::Pending => {
                poll_stalled(&mut this.stall, &mut this.waiting, this.read_timeout, cx).map(Err)
            }
        }
    }

    fn consume(mut self: Pin<&mut Self>, amt: usize) {
        Pin::new(&mut self.inner).consume(amt)
    }
}
