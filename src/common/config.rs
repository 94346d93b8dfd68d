//! Client configuration.
//!
//! Everything here is fixed once a client is built; there are no per-call overrides.

use std::fmt;
use std::time::Duration;

/// Default `User-Agent` sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("fast-webdav-rs/", env!("CARGO_PKG_VERSION"));

/// Username/password pair sent as a Basic `Authorization` header.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Which root certificates the TLS connector trusts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsRoots {
    /// Platform store, falling back to the bundled WebPKI roots when it cannot be loaded.
    #[default]
    NativeWithFallback,
    /// Only the bundled WebPKI roots.
    WebPki,
}

/// HTTP proxy that every connection is tunnelled through with `CONNECT`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    /// `http://host:port` of the proxy.
    pub url: String,
    /// Sent as `Proxy-Authorization: Basic ...` on the `CONNECT` request.
    pub credentials: Option<Credentials>,
}

impl ProxyConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            credentials: None,
        }
    }

    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        self.credentials = Some(Credentials::new(username, password));
        self
    }
}

/// Settings for a [`WebDavClient`](crate::WebDavClient) and its [`HyperExecutor`](crate::HyperExecutor).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL used to resolve relative paths (scheme, host and port, optionally a path).
    pub base_url: String,
    pub credentials: Option<Credentials>,
    pub tls_roots: TlsRoots,
    pub connect_timeout: Duration,
    /// Upper bound for receiving the response head of a single request.
    pub request_timeout: Duration,
    /// Longest wait for the next chunk of a response body before the read fails.
    pub read_timeout: Duration,
    /// Route every connection through this proxy instead of connecting directly.
    pub proxy: Option<ProxyConfig>,
    /// Maximum simultaneous exchanges with one scheme+authority.
    pub max_connections_per_route: usize,
    /// Maximum simultaneous exchanges overall.
    pub max_connections_total: usize,
    /// Advertise `Accept-Encoding: br, zstd, gzip` and decode compressed bodies.
    pub accept_compressed: bool,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost/".to_string(),
            credentials: None,
            tls_roots: TlsRoots::default(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(20),
            read_timeout: Duration::from_secs(60),
            proxy: None,
            max_connections_per_route: 20,
            max_connections_total: 200,
            accept_compressed: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl ClientConfig {
    /// Creates a configuration with defaults for everything but the base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_credentials(mut self, username: &str, password: &str) -> Self {
        self.credentials = Some(Credentials::new(username, password));
        self
    }

    pub fn with_tls_roots(mut self, roots: TlsRoots) -> Self {
        self.tls_roots = roots;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Sets the per-route and total connection caps. Zero is raised to one.
    pub fn with_connection_limits(mut self, per_route: usize, total: usize) -> Self {
        self.max_connections_per_route = per_route.max(1);
        self.max_connections_total = total.max(1);
        self
    }

    pub fn with_accept_compressed(mut self, enabled: bool) -> Self {
        self.accept_compressed = enabled;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}
