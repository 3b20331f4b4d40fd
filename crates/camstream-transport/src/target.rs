//! Publish target parsing and validation.

use url::Url;

use crate::error::TransportError;
use crate::{TransportResult, DEFAULT_RTMP_PORT};

/// A validated RTMP destination: server application plus stream key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishTarget {
    base_url: String,
    host: String,
    port: u16,
    app_name: String,
    stream_key: String,
    tls: bool,
}

impl PublishTarget {
    /// Build a target from a server address and a stream key.
    ///
    /// The address must use the `rtmp` or `rtmps` scheme, name a host and
    /// carry an application path (e.g. `rtmp://host:1935/live`). A trailing
    /// slash on the address is ignored.
    pub fn new(address: &str, stream_key: &str) -> TransportResult<Self> {
        let address = address.trim();
        if address.is_empty() {
            return Err(TransportError::InvalidUrl("address is empty".to_string()));
        }

        let stream_key = stream_key.trim();
        if stream_key.is_empty() {
            return Err(TransportError::InvalidUrl("stream key is empty".to_string()));
        }

        let base_url = address.trim_end_matches('/');
        let parsed = Url::parse(base_url).map_err(|e| TransportError::InvalidUrl(e.to_string()))?;

        let tls = match parsed.scheme() {
            "rtmp" => false,
            "rtmps" => true,
            _ => {
                return Err(TransportError::InvalidUrl(
                    "URL must start with rtmp:// or rtmps://".to_string(),
                ))
            }
        };

        let host = parsed
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| TransportError::InvalidUrl("missing host".to_string()))?
            .to_string();

        let app_name = parsed.path().trim_matches('/').to_string();
        if app_name.is_empty() {
            return Err(TransportError::InvalidUrl(
                "missing application name in URL path".to_string(),
            ));
        }

        Ok(Self {
            base_url: base_url.to_string(),
            host,
            port: parsed.port().unwrap_or(DEFAULT_RTMP_PORT),
            app_name,
            stream_key: stream_key.to_string(),
            tls,
        })
    }

    /// Server host name or address.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Server port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// `host:port` for the TCP connection.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// RTMP application name (URL path).
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    /// Stream key used in the publish request.
    pub fn stream_key(&self) -> &str {
        &self.stream_key
    }

    /// Whether the scheme is `rtmps`.
    pub fn is_tls(&self) -> bool {
        self.tls
    }

    /// Full URL including the stream key.
    pub fn full_url(&self) -> String {
        format!("{}/{}", self.base_url, self.stream_key)
    }

    /// URL without the stream key, safe to log.
    pub fn redacted(&self) -> &str {
        &self.base_url
    }
}
