// HTTP GET transport for health probes

use crate::{HealthCheckError, HealthCheckResult};
use async_trait::async_trait;
use http_body_util::Empty;
use hyper::body::Bytes;
use hyper::{Method, Request, Uri};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::net::IpAddr;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

/// Issues a single GET and reports the HTTP status code.
///
/// Transport failures (refused connection, timeout, bad URL) are errors;
/// any HTTP response, including 5xx, is `Ok(status)`.
#[async_trait]
pub trait HttpGetter: Send + Sync {
    async fn get_status(&self, url: &str, timeout: Duration) -> HealthCheckResult<u16>;
}

/// Production getter backed by the hyper-util legacy client.
#[derive(Clone)]
pub struct HyperGetter {
    client: Client<HttpConnector, Empty<Bytes>>,
}

impl HyperGetter {
    pub fn new() -> Self {
        Self {
            client: Client::builder(TokioExecutor::new()).build_http(),
        }
    }
}

impl Default for HyperGetter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HyperGetter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperGetter").finish_non_exhaustive()
    }
}

#[async_trait]
impl HttpGetter for HyperGetter {
    async fn get_status(&self, url: &str, check_timeout: Duration) -> HealthCheckResult<u16> {
        let uri: Uri = url.parse().map_err(|e| HealthCheckError::InvalidUrl {
            url: url.to_string(),
            reason: format!("{}", e),
        })?;

        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .header("User-Agent", concat!("keeper/", env!("CARGO_PKG_VERSION")))
            .body(Empty::<Bytes>::new())
            .map_err(|e| HealthCheckError::InvalidUrl {
                url: url.to_string(),
                reason: format!("Failed to build request: {}", e),
            })?;

        match timeout(check_timeout, self.client.request(request)).await {
            Ok(Ok(response)) => {
                let status = response.status().as_u16();
                debug!(url, status, "Health endpoint answered");
                Ok(status)
            }
            Ok(Err(e)) => Err(HealthCheckError::ConnectionFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(HealthCheckError::Timeout {
                url: url.to_string(),
                timeout: check_timeout,
            }),
        }
    }
}

/// Build `http://host:port/path` for a probe.
///
/// A wildcard bind address is probed over loopback of the same family.
pub fn health_url(host: &str, port: u16, path: &str) -> String {
    let host = match host.parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) if v4.is_unspecified() => "127.0.0.1".to_string(),
        Ok(IpAddr::V6(v6)) if v6.is_unspecified() => "[::1]".to_string(),
        Ok(IpAddr::V6(v6)) => format!("[{}]", v6),
        _ => host.to_string(),
    };
    format!("http://{}:{}{}", host, port, path)
}
