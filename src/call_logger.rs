//! Event-to-text logging of HTTP calls.
//!
//! This module provides [`CallLogger`], an [`EventListenerFactory`] whose listeners render
//! every lifecycle event of a call as one line and hand it to a [`Logger`] sink. The default
//! sink, [`TracingLogger`], emits each line through the `tracing` crate at `INFO`.
//!
//! The format of these lines is for humans and may change between releases. If you need a
//! stable format, implement your own [`EventListener`].

use std::error::Error;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::info;

use crate::event::CallEvent;
use crate::listener::{EventListener, EventListenerFactory};
use crate::types::{ConnectionData, Handshake, Protocol, Proxy, RequestData, ResponseData};

/// Destination for formatted call log lines.
///
/// Sinks are shared between every call a [`CallLogger`] observes and may be invoked from
/// several tasks at once; any synchronization is the sink's own business. Closures of type
/// `Fn(&str)` are sinks:
///
/// ```rust
/// use calltrace::CallLogger;
///
/// let logger = CallLogger::with_logger(|line: &str| eprintln!("{line}"));
/// ```
pub trait Logger: Send + Sync + 'static {
    fn log(&self, message: &str);
}

impl<F> Logger for F
where
    F: Fn(&str) + Send + Sync + 'static,
{
    fn log(&self, message: &str) {
        self(message)
    }
}

/// Default [`Logger`] writing each line as a `tracing` event at `INFO`, target `calltrace`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log(&self, message: &str) {
        info!(target: "calltrace", "{message}");
    }
}

/// A logger of HTTP calls, usable wherever an [`EventListenerFactory`] is expected.
///
/// # Examples
///
/// ```rust
/// use calltrace::{CallLogger, EventListener, EventListenerFactory};
/// use calltrace::types::RequestData;
/// use std::sync::{Arc, Mutex};
///
/// let lines = Arc::new(Mutex::new(Vec::new()));
/// let sink = lines.clone();
/// let logger = CallLogger::with_logger(move |line: &str| sink.lock().unwrap().push(line.to_string()));
///
/// let request = RequestData::new(http::Method::GET, http::Uri::from_static("http://localhost/"));
/// let mut listener = logger.create(&request);
/// listener.call_start(&request);
/// listener.dns_start("localhost");
///
/// assert_eq!(
///     *lines.lock().unwrap(),
///     vec![
///         "* callStart: Request{method=GET, url=http://localhost/}".to_string(),
///         "* dnsStart: localhost".to_string(),
///     ]
/// );
/// ```
#[derive(Clone)]
pub struct CallLogger {
    logger: Arc<dyn Logger>,
}

impl CallLogger {
    /// Create a call logger writing to [`TracingLogger`].
    pub fn new() -> Self {
        Self::with_logger(TracingLogger)
    }

    /// Create a call logger writing to `logger`. Any `Fn(&str)` closure is a sink.
    ///
    /// ```
    /// use calltrace::{CallLogger, EventListener};
    /// use std::sync::{Arc, Mutex};
    ///
    /// let lines = Arc::new(Mutex::new(Vec::new()));
    /// let sink = lines.clone();
    /// let logger = CallLogger::with_logger(move |line: &str| sink.lock().unwrap().push(line.to_string()));
    /// let mut listener = logger.listener();
    /// listener.dns_start("example.com");
    /// assert_eq!(*lines.lock().unwrap(), ["* dnsStart: example.com"]);
    /// ```
    pub fn with_logger<L: Logger>(logger: L) -> Self {
        Self::with_shared_logger(Arc::new(logger))
    }

    /// Create a call logger writing to a sink that is also used elsewhere.
    pub fn with_shared_logger(logger: Arc<dyn Logger>) -> Self {
        Self { logger }
    }

    /// A factory producing one fresh [`CallLoggerEventListener`] per call.
    pub fn event_listener_factory(&self) -> impl EventListenerFactory {
        self.clone()
    }

    /// A listener for a single call.
    pub fn listener(&self) -> CallLoggerEventListener {
        CallLoggerEventListener {
            logger: self.logger.clone(),
            start: None,
        }
    }
}

impl Default for CallLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CallLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallLogger").finish_non_exhaustive()
    }
}

impl EventListenerFactory for CallLogger {
    fn create(&self, _request: &RequestData) -> Box<dyn EventListener> {
        Box::new(self.listener())
    }
}

/// Per-call listener created by [`CallLogger`]. Holds only the call's start instant.
pub struct CallLoggerEventListener {
    logger: Arc<dyn Logger>,
    start: Option<Instant>,
}

impl CallLoggerEventListener {
    fn log(&self, event: CallEvent<'_>) {
        self.logger.log(&event.to_string());
    }
}

impl fmt::Debug for CallLoggerEventListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallLoggerEventListener")
            .field("start", &self.start)
            .finish_non_exhaustive()
    }
}

impl EventListener for CallLoggerEventListener {
    fn call_start(&mut self, request: &RequestData) {
        self.start = Some(Instant::now());
        self.log(CallEvent::CallStart { request });
    }

    fn dns_start(&mut self, domain_name: &str) {
        self.log(CallEvent::DnsStart { domain_name });
    }

    fn dns_end(&mut self, _domain_name: &str, addresses: &[IpAddr]) {
        self.log(CallEvent::DnsEnd { addresses });
    }

    fn connect_start(&mut self, address: SocketAddr, proxy: &Proxy) {
        self.log(CallEvent::ConnectStart { address, proxy });
    }

    fn secure_connect_start(&mut self) {
        self.log(CallEvent::SecureConnectStart);
    }

    fn secure_connect_end(&mut self, _handshake: Option<&Handshake>) {
        self.log(CallEvent::SecureConnectEnd);
    }

    fn connect_end(&mut self, _address: SocketAddr, _proxy: &Proxy, protocol: Option<Protocol>) {
        self.log(CallEvent::ConnectEnd { protocol });
    }

    fn connect_failed(
        &mut self,
        _address: SocketAddr,
        _proxy: &Proxy,
        protocol: Option<Protocol>,
        error: &dyn Error,
    ) {
        self.log(CallEvent::ConnectFailed { protocol, error });
    }

    fn connection_acquired(&mut self, connection: &ConnectionData) {
        self.log(CallEvent::ConnectionAcquired { connection });
    }

    fn connection_released(&mut self, _connection: &ConnectionData) {
        self.log(CallEvent::ConnectionReleased);
    }

    fn request_headers_start(&mut self) {
        self.log(CallEvent::RequestHeadersStart);
    }

    fn request_headers_end(&mut self, _request: &RequestData) {
        self.log(CallEvent::RequestHeadersEnd);
    }

    fn request_body_start(&mut self) {
        self.log(CallEvent::RequestBodyStart);
    }

    fn request_body_end(&mut self, byte_count: u64) {
        self.log(CallEvent::RequestBodyEnd { byte_count });
    }

    fn response_headers_start(&mut self) {
        self.log(CallEvent::ResponseHeadersStart);
    }

    fn response_headers_end(&mut self, response: &ResponseData) {
        self.log(CallEvent::ResponseHeadersEnd { response });
    }

    fn response_body_start(&mut self) {
        self.log(CallEvent::ResponseBodyStart);
    }

    fn response_body_end(&mut self, byte_count: u64) {
        self.log(CallEvent::ResponseBodyEnd { byte_count });
    }

    fn call_end(&mut self) {
        let took = self
            .start
            .map(|start| start.elapsed())
            .unwrap_or(Duration::ZERO);
        self.log(CallEvent::CallEnd { took });
    }

    fn call_failed(&mut self, error: &dyn Error) {
        self.log(CallEvent::CallFailed { error });
    }
}
