//! Startup configuration read once from the environment.
//!
//! Nothing here is mutated after `main` builds the [`GatewayConfig`]; the
//! gateway shares it read-only across all connection handlers.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use axum::http::uri::{Authority, PathAndQuery, Scheme, Uri};
use axum::http::HeaderValue;

/// Path prefix whose requests are tunnelled to the backend.
pub const API_PREFIX: &str = "/api/";

const DEFAULT_STATIC_ROOT: &str = "/app/dist";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_BACKEND_URL: &str = "http://host.docker.internal:8001";
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

/// Errors raised while building the configuration or opening the static root.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// An environment variable held a value that could not be parsed.
    #[error("invalid {key}='{value}': {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    /// The backend URL uses a scheme the proxy cannot speak.
    #[error("unsupported backend scheme in '{url}': only http is supported")]
    UnsupportedScheme { url: String },

    /// The static root directory is missing or unreadable.
    #[error("static root {}: {source}", path.display())]
    StaticRoot {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Backend location the reverse proxy forwards to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyTarget {
    authority: Authority,
    host_header: HeaderValue,
}

impl ProxyTarget {
    /// Parse a backend base URL such as `http://backend:8001`.
    ///
    /// Any path on the base URL is ignored: forwarded requests keep their own
    /// absolute path.
    ///
    /// # Errors
    /// Returns [`ConfigError::UnsupportedScheme`] for anything but `http`, and
    /// [`ConfigError::InvalidValue`] when the URL does not parse or has no host.
    pub fn parse(url: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidValue {
            key: "PTW_BACKEND_BASE_URL",
            value: url.to_owned(),
            reason,
        };
        let uri: Uri = url.trim().parse().map_err(|e| invalid(format!("{e}")))?;
        match uri.scheme() {
            Some(scheme) if *scheme == Scheme::HTTP => {}
            Some(_) => return Err(ConfigError::UnsupportedScheme { url: url.to_owned() }),
            None => return Err(invalid("missing scheme".to_owned())),
        }
        let authority = uri
            .authority()
            .cloned()
            .ok_or_else(|| invalid("missing host".to_owned()))?;
        if authority.as_str().contains('@') {
            return Err(invalid("credentials in the backend URL are not supported".to_owned()));
        }
        let host_header =
            HeaderValue::from_str(authority.as_str()).map_err(|e| invalid(e.to_string()))?;
        Ok(Self { authority, host_header })
    }

    /// The `host[:port]` the backend considers itself to be.
    #[must_use]
    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Value for the rewritten outbound `Host` header.
    #[must_use]
    pub fn host_header(&self) -> &HeaderValue {
        &self.host_header
    }

    /// Absolute backend URI for an inbound path and query.
    ///
    /// # Errors
    /// Returns the builder error if the parts do not form a valid URI.
    pub fn uri_for(&self, path_and_query: PathAndQuery) -> Result<Uri, axum::http::Error> {
        Uri::builder()
            .scheme(Scheme::HTTP)
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()
    }
}

impl std::fmt::Display for ProxyTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "http://{}", self.authority)
    }
}

/// Immutable gateway configuration.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct GatewayConfig {
    /// Address the HTTP listener binds to.
    pub listen_addr: SocketAddr,
    /// Directory holding the built single-page application.
    pub static_root: PathBuf,
    /// Backend that receives everything under [`API_PREFIX`].
    pub backend: ProxyTarget,
    /// Upper bound on establishing a backend connection.
    pub connect_timeout: Duration,
}

impl GatewayConfig {
    /// Build a config with defaults for everything except the required parts.
    #[must_use]
    pub fn new(static_root: PathBuf, backend: ProxyTarget) -> Self {
        Self {
            listen_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            static_root,
            backend,
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
        }
    }

    /// Read the configuration from process environment variables.
    ///
    /// # Errors
    /// See [`GatewayConfig::from_lookup`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through an arbitrary key lookup.
    ///
    /// Recognised keys: `DIST_DIR`, `PORT`, `PTW_BIND_HOST`,
    /// `PTW_BACKEND_BASE_URL`, `PTW_CONNECT_TIMEOUT_MS`. Empty values count
    /// as unset.
    ///
    /// # Errors
    /// Returns [`ConfigError`] for any value that fails to parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let static_root =
            get("DIST_DIR").map_or_else(|| PathBuf::from(DEFAULT_STATIC_ROOT), PathBuf::from);

        let port = match get("PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|e| ConfigError::InvalidValue {
                key: "PORT",
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            None => DEFAULT_PORT,
        };

        let host = match get("PTW_BIND_HOST") {
            Some(raw) => raw.trim().parse::<IpAddr>().map_err(|e| ConfigError::InvalidValue {
                key: "PTW_BIND_HOST",
                value: raw.clone(),
                reason: e.to_string(),
            })?,
            None => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        };

        let backend_url =
            get("PTW_BACKEND_BASE_URL").unwrap_or_else(|| DEFAULT_BACKEND_URL.to_owned());
        let backend = ProxyTarget::parse(&backend_url)?;

        let connect_timeout_ms = match get("PTW_CONNECT_TIMEOUT_MS") {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(0) => {
                    return Err(ConfigError::InvalidValue {
                        key: "PTW_CONNECT_TIMEOUT_MS",
                        value: raw,
                        reason: "must be greater than zero".to_owned(),
                    })
                }
                Ok(ms) => ms,
                Err(e) => {
                    return Err(ConfigError::InvalidValue {
                        key: "PTW_CONNECT_TIMEOUT_MS",
                        value: raw.clone(),
                        reason: e.to_string(),
                    })
                }
            },
            None => DEFAULT_CONNECT_TIMEOUT_MS,
        };

        Ok(Self {
            listen_addr: SocketAddr::new(host, port),
            static_root,
            backend,
            connect_timeout: Duration::from_millis(connect_timeout_ms),
        })
    }
}
