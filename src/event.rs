//! One-line rendering of call lifecycle events.

use std::error::Error;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use crate::types::{ConnectionData, Protocol, Proxy, RequestData, ResponseData};

/// A single lifecycle event of an HTTP call, borrowing the parameters the engine supplied.
///
/// Formatting is a pure function of the event's fields; the same event always renders
/// the same line.
///
/// # Examples
///
/// ```rust
/// use calltrace::CallEvent;
///
/// assert_eq!(CallEvent::DnsStart { domain_name: "localhost" }.to_string(), "* dnsStart: localhost");
/// assert_eq!(CallEvent::ResponseBodyEnd { byte_count: 6 }.to_string(), "* responseBodyEnd: byteCount=6");
/// ```
#[derive(Debug, Clone, Copy)]
pub enum CallEvent<'a> {
    CallStart { request: &'a RequestData },
    DnsStart { domain_name: &'a str },
    DnsEnd { addresses: &'a [IpAddr] },
    ConnectStart { address: SocketAddr, proxy: &'a Proxy },
    SecureConnectStart,
    SecureConnectEnd,
    ConnectEnd { protocol: Option<Protocol> },
    ConnectFailed { protocol: Option<Protocol>, error: &'a dyn Error },
    ConnectionAcquired { connection: &'a ConnectionData },
    ConnectionReleased,
    RequestHeadersStart,
    RequestHeadersEnd,
    RequestBodyStart,
    RequestBodyEnd { byte_count: u64 },
    ResponseHeadersStart,
    ResponseHeadersEnd { response: &'a ResponseData },
    ResponseBodyStart,
    ResponseBodyEnd { byte_count: u64 },
    /// `took` is truncated to whole milliseconds when rendered.
    CallEnd { took: Duration },
    CallFailed { error: &'a dyn Error },
}

impl CallEvent<'_> {
    /// The event name as it appears in the log line.
    pub fn name(&self) -> &'static str {
        match self {
            CallEvent::CallStart { .. } => "callStart",
            CallEvent::DnsStart { .. } => "dnsStart",
            CallEvent::DnsEnd { .. } => "dnsEnd",
            CallEvent::ConnectStart { .. } => "connectStart",
            CallEvent::SecureConnectStart => "secureConnectStart",
            CallEvent::SecureConnectEnd => "secureConnectEnd",
            CallEvent::ConnectEnd { .. } => "connectEnd",
            CallEvent::ConnectFailed { .. } => "connectFailed",
            CallEvent::ConnectionAcquired { .. } => "connectionAcquired",
            CallEvent::ConnectionReleased => "connectionReleased",
            CallEvent::RequestHeadersStart => "requestHeadersStart",
            CallEvent::RequestHeadersEnd => "requestHeadersEnd",
            CallEvent::RequestBodyStart => "requestBodyStart",
            CallEvent::RequestBodyEnd { .. } => "requestBodyEnd",
            CallEvent::ResponseHeadersStart => "responseHeadersStart",
            CallEvent::ResponseHeadersEnd { .. } => "responseHeadersEnd",
            CallEvent::ResponseBodyStart => "responseBodyStart",
            CallEvent::ResponseBodyEnd { .. } => "responseBodyEnd",
            CallEvent::CallEnd { .. } => "callEnd",
            CallEvent::CallFailed { .. } => "callFailed",
        }
    }
}

struct OptionalProtocol(Option<Protocol>);

impl fmt::Display for OptionalProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(protocol) => fmt::Display::fmt(&protocol, f),
            None => f.write_str("none"),
        }
    }
}

struct AddressList<'a>(&'a [IpAddr]);

impl fmt::Display for AddressList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, address) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{address}")?;
        }
        f.write_str("]")
    }
}

impl fmt::Display for CallEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "* {}", self.name())?;
        match self {
            CallEvent::CallStart { request } => write!(f, ": {request}"),
            CallEvent::DnsStart { domain_name } => write!(f, ": {domain_name}"),
            CallEvent::DnsEnd { addresses } => write!(f, ": {}", AddressList(addresses)),
            CallEvent::ConnectStart { address, proxy } => write!(f, ": {address} {proxy}"),
            CallEvent::ConnectEnd { protocol } => write!(f, ": {}", OptionalProtocol(*protocol)),
            CallEvent::ConnectFailed { protocol, error } => {
                write!(f, ": {} {error}", OptionalProtocol(*protocol))
            }
            CallEvent::ConnectionAcquired { connection } => write!(f, ": {connection}"),
            CallEvent::RequestBodyEnd { byte_count } | CallEvent::ResponseBodyEnd { byte_count } => {
                write!(f, ": byteCount={byte_count}")
            }
            CallEvent::ResponseHeadersEnd { response } => write!(f, ": {response}"),
            CallEvent::CallEnd { took } => write!(f, " (took {}ms)", took.as_millis()),
            CallEvent::CallFailed { error } => write!(f, ": {error}"),
            CallEvent::SecureConnectStart
            | CallEvent::SecureConnectEnd
            | CallEvent::ConnectionReleased
            | CallEvent::RequestHeadersStart
            | CallEvent::RequestHeadersEnd
            | CallEvent::RequestBodyStart
            | CallEvent::ResponseHeadersStart
            | CallEvent::ResponseBodyStart => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_dns_end_lists_addresses() {
        let addresses: Vec<IpAddr> = vec!["127.0.0.1".parse().unwrap(), "::1".parse().unwrap()];
        let event = CallEvent::DnsEnd {
            addresses: &addresses,
        };
        assert_eq!(event.to_string(), "* dnsEnd: [127.0.0.1, ::1]");
        assert_eq!(CallEvent::DnsEnd { addresses: &[] }.to_string(), "* dnsEnd: []");
    }

    #[test]
    fn test_connect_events() {
        let address: SocketAddr = "127.0.0.1:8080".parse().unwrap();
        let start = CallEvent::ConnectStart {
            address,
            proxy: &Proxy::Direct,
        };
        assert_eq!(start.to_string(), "* connectStart: 127.0.0.1:8080 DIRECT");

        let end = CallEvent::ConnectEnd {
            protocol: Some(Protocol::Http11),
        };
        assert_eq!(end.to_string(), "* connectEnd: http/1.1");

        let error = io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused");
        let failed = CallEvent::ConnectFailed {
            protocol: None,
            error: &error,
        };
        assert_eq!(failed.to_string(), "* connectFailed: none connection refused");
    }

    #[test]
    fn test_call_end_truncates_to_millis() {
        let event = CallEvent::CallEnd {
            took: Duration::from_micros(12_999),
        };
        assert_eq!(event.to_string(), "* callEnd (took 12ms)");
        assert_eq!(
            CallEvent::CallEnd { took: Duration::ZERO }.to_string(),
            "* callEnd (took 0ms)"
        );
    }

    #[test]
    fn test_bare_events_have_no_suffix() {
        assert_eq!(CallEvent::SecureConnectStart.to_string(), "* secureConnectStart");
        assert_eq!(CallEvent::ConnectionReleased.to_string(), "* connectionReleased");
        assert_eq!(CallEvent::RequestHeadersEnd.to_string(), "* requestHeadersEnd");
        assert_eq!(CallEvent::ResponseBodyStart.to_string(), "* responseBodyStart");
    }

    #[test]
    fn test_formatting_is_repeatable() {
        let request = RequestData::new(http::Method::POST, http::Uri::from_static("http://localhost/echo"));
        let event = CallEvent::CallStart { request: &request };
        let first = event.to_string();
        assert_eq!(first, "* callStart: Request{method=POST, url=http://localhost/echo}");
        assert_eq!(event.to_string(), first);
    }
}
