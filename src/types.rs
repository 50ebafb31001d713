//! Data types carried by call lifecycle events.
//!
//! These are the parameters an HTTP engine hands to an [`EventListener`](crate::EventListener).
//! Each type renders a one-line summary through [`Display`](fmt::Display); the summaries are
//! meant for humans and are not a stable format.

use http::{HeaderMap, Method, StatusCode, Uri, Version};
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

/// Summary of an outgoing HTTP request.
///
/// # Examples
///
/// ```rust
/// use calltrace::types::RequestData;
/// use http::{Method, Uri};
///
/// let request = RequestData::new(Method::GET, Uri::from_static("http://localhost/"));
/// assert_eq!(request.to_string(), "Request{method=GET, url=http://localhost/}");
/// ```
#[derive(Debug, Clone)]
pub struct RequestData {
    /// HTTP method (GET, POST, etc.)
    pub method: Method,
    /// Full request URI
    pub uri: Uri,
    /// Request headers as they were handed to the engine
    pub headers: HeaderMap,
}

impl RequestData {
    /// Create request data with no headers.
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
        }
    }

    /// Capture the metadata of an [`http::Request`] without touching its body.
    pub fn from_request<B>(request: &http::Request<B>) -> Self {
        Self {
            method: request.method().clone(),
            uri: request.uri().clone(),
            headers: request.headers().clone(),
        }
    }
}

impl fmt::Display for RequestData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Request{{method={}, url={}}}", self.method, self.uri)
    }
}

/// Summary of a received response head.
#[derive(Debug, Clone)]
pub struct ResponseData {
    /// Protocol the response arrived over
    pub protocol: Protocol,
    /// HTTP status code (200, 404, 500, etc.)
    pub status: StatusCode,
    /// URI of the request this response answers
    pub uri: Uri,
    /// Response headers
    pub headers: HeaderMap,
}

impl ResponseData {
    /// Create response data with no headers.
    pub fn new(protocol: Protocol, status: StatusCode, uri: Uri) -> Self {
        Self {
            protocol,
            status,
            uri,
            headers: HeaderMap::new(),
        }
    }

    /// Capture the head of an [`http::Response`]. Versions without an ALPN id
    /// (HTTP/0.9) are reported as `http/1.0`.
    pub fn from_response<B>(response: &http::Response<B>, uri: Uri) -> Self {
        Self {
            protocol: Protocol::from_version(response.version()).unwrap_or(Protocol::Http10),
            status: response.status(),
            uri,
            headers: response.headers().clone(),
        }
    }
}

impl fmt::Display for ResponseData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Response{{protocol={}, code={}, message={}, url={}}}",
            self.protocol,
            self.status.as_u16(),
            self.status.canonical_reason().unwrap_or(""),
            self.uri
        )
    }
}

/// Application protocol negotiated for a connection, named by its ALPN id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Http10,
    Http11,
    Http2,
    /// Cleartext HTTP/2 without an upgrade.
    H2PriorKnowledge,
    Http3,
    Quic,
}

impl Protocol {
    /// The protocol's ALPN identifier, e.g. `http/1.1` or `h2`.
    ///
    /// ```
    /// use calltrace::types::Protocol;
    ///
    /// assert_eq!(Protocol::Http2.as_str(), "h2");
    /// assert_eq!(Protocol::Http11.as_str(), "http/1.1");
    /// ```
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http10 => "http/1.0",
            Protocol::Http11 => "http/1.1",
            Protocol::Http2 => "h2",
            Protocol::H2PriorKnowledge => "h2_prior_knowledge",
            Protocol::Http3 => "h3",
            Protocol::Quic => "quic",
        }
    }

    /// Map an [`http::Version`]; HTTP/0.9 has no protocol id.
    pub fn from_version(version: Version) -> Option<Self> {
        if version == Version::HTTP_10 {
            Some(Protocol::Http10)
        } else if version == Version::HTTP_11 {
            Some(Protocol::Http11)
        } else if version == Version::HTTP_2 {
            Some(Protocol::Http2)
        } else if version == Version::HTTP_3 {
            Some(Protocol::Http3)
        } else {
            None
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error type for protocol id parsing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    #[error("Unexpected protocol: {0}")]
    Unknown(String),
}

impl FromStr for Protocol {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http/1.0" => Ok(Protocol::Http10),
            "http/1.1" => Ok(Protocol::Http11),
            "h2" => Ok(Protocol::Http2),
            "h2_prior_knowledge" => Ok(Protocol::H2PriorKnowledge),
            "h3" => Ok(Protocol::Http3),
            "quic" => Ok(Protocol::Quic),
            other => Err(ProtocolError::Unknown(other.to_owned())),
        }
    }
}

/// How a connection reaches its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Proxy {
    #[default]
    Direct,
    Http(SocketAddr),
    Socks(SocketAddr),
}

impl fmt::Display for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Proxy::Direct => f.write_str("DIRECT"),
            Proxy::Http(addr) => write!(f, "HTTP @ {addr}"),
            Proxy::Socks(addr) => write!(f, "SOCKS @ {addr}"),
        }
    }
}

/// Result of a completed TLS handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub tls_version: String,
    pub cipher_suite: String,
}

/// Summary of a pooled connection a call runs on.
///
/// # Examples
///
/// ```rust
/// use calltrace::types::{ConnectionData, Protocol, Proxy};
///
/// let connection = ConnectionData {
///     host: "localhost".to_string(),
///     port: 8080,
///     proxy: Proxy::Direct,
///     address: "127.0.0.1:8080".parse().unwrap(),
///     handshake: None,
///     protocol: Protocol::Http11,
/// };
/// assert_eq!(
///     connection.to_string(),
///     "Connection{localhost:8080, proxy=DIRECT hostAddress=127.0.0.1:8080 cipherSuite=none protocol=http/1.1}"
/// );
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionData {
    /// Host name of the route target
    pub host: String,
    /// Port of the route target
    pub port: u16,
    pub proxy: Proxy,
    /// Resolved socket address actually connected to
    pub address: SocketAddr,
    /// TLS handshake, absent for plaintext connections
    pub handshake: Option<Handshake>,
    pub protocol: Protocol,
}

impl fmt::Display for ConnectionData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cipher_suite = self
            .handshake
            .as_ref()
            .map(|h| h.cipher_suite.as_str())
            .unwrap_or("none");
        write!(
            f,
            "Connection{{{}:{}, proxy={} hostAddress={} cipherSuite={} protocol={}}}",
            self.host, self.port, self.proxy, self.address, cipher_suite, self.protocol
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_ids_parse_back() {
        for protocol in [
            Protocol::Http10,
            Protocol::Http11,
            Protocol::Http2,
            Protocol::H2PriorKnowledge,
            Protocol::Http3,
            Protocol::Quic,
        ] {
            assert_eq!(protocol.as_str().parse::<Protocol>(), Ok(protocol));
        }
    }

    #[test]
    fn test_unknown_protocol_is_rejected() {
        let err = "spdy/3.1".parse::<Protocol>().unwrap_err();
        assert_eq!(err, ProtocolError::Unknown("spdy/3.1".to_string()));
        assert_eq!(err.to_string(), "Unexpected protocol: spdy/3.1");
    }

    #[test]
    fn test_protocol_from_version() {
        assert_eq!(Protocol::from_version(Version::HTTP_11), Some(Protocol::Http11));
        assert_eq!(Protocol::from_version(Version::HTTP_2), Some(Protocol::Http2));
        assert_eq!(Protocol::from_version(Version::HTTP_09), None);
    }

    #[test]
    fn test_response_summary() {
        let response = http::Response::builder()
            .status(StatusCode::NOT_FOUND)
            .version(Version::HTTP_2)
            .body(())
            .unwrap();
        let data = ResponseData::from_response(&response, Uri::from_static("https://localhost/missing"));
        assert_eq!(
            data.to_string(),
            "Response{protocol=h2, code=404, message=Not Found, url=https://localhost/missing}"
        );
    }

    #[test]
    fn test_proxy_summary() {
        let addr: SocketAddr = "10.0.0.1:3128".parse().unwrap();
        assert_eq!(Proxy::Direct.to_string(), "DIRECT");
        assert_eq!(Proxy::Http(addr).to_string(), "HTTP @ 10.0.0.1:3128");
        assert_eq!(Proxy::Socks(addr).to_string(), "SOCKS @ 10.0.0.1:3128");
    }

    #[test]
    fn test_secure_connection_summary() {
        let connection = ConnectionData {
            host: "example.com".to_string(),
            port: 443,
            proxy: Proxy::Direct,
            address: "93.184.216.34:443".parse().unwrap(),
            handshake: Some(Handshake {
                tls_version: "TLSv1.3".to_string(),
                cipher_suite: "TLS_AES_128_GCM_SHA256".to_string(),
            }),
            protocol: Protocol::Http2,
        };
        assert_eq!(
            connection.to_string(),
            "Connection{example.com:443, proxy=DIRECT hostAddress=93.184.216.34:443 cipherSuite=TLS_AES_128_GCM_SHA256 protocol=h2}"
        );
    }
}
