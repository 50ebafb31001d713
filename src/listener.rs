//! The per-call lifecycle listener capability.
//!
//! An HTTP engine notifies an [`EventListener`] as a call makes progress. Listeners are
//! created through an [`EventListenerFactory`], once per call, so any state a listener keeps
//! belongs to exactly one call.

use std::error::Error;
use std::net::{IpAddr, SocketAddr};

use crate::types::{ConnectionData, Handshake, Protocol, Proxy, RequestData, ResponseData};

/// Receiver of the lifecycle events of a single HTTP call.
///
/// Every method has an empty default body, so implementations only override the events
/// they care about. Events arrive in call order on whatever task the engine dispatches
/// them from.
///
/// A successful call is bracketed by [`call_start`](Self::call_start) and
/// [`call_end`](Self::call_end); a failed one ends with [`call_failed`](Self::call_failed)
/// instead. Each connection attempt on a new route emits its own
/// [`connect_start`](Self::connect_start) followed by either
/// [`connect_end`](Self::connect_end) or [`connect_failed`](Self::connect_failed).
#[allow(unused_variables)]
pub trait EventListener: Send {
    fn call_start(&mut self, request: &RequestData) {}

    fn dns_start(&mut self, domain_name: &str) {}

    fn dns_end(&mut self, domain_name: &str, addresses: &[IpAddr]) {}

    fn connect_start(&mut self, address: SocketAddr, proxy: &Proxy) {}

    fn secure_connect_start(&mut self) {}

    fn secure_connect_end(&mut self, handshake: Option<&Handshake>) {}

    fn connect_end(&mut self, address: SocketAddr, proxy: &Proxy, protocol: Option<Protocol>) {}

    fn connect_failed(
        &mut self,
        address: SocketAddr,
        proxy: &Proxy,
        protocol: Option<Protocol>,
        error: &dyn Error,
    ) {
    }

    fn connection_acquired(&mut self, connection: &ConnectionData) {}

    fn connection_released(&mut self, connection: &ConnectionData) {}

    fn request_headers_start(&mut self) {}

    fn request_headers_end(&mut self, request: &RequestData) {}

    fn request_body_start(&mut self) {}

    /// `byte_count` is the number of body bytes written.
    fn request_body_end(&mut self, byte_count: u64) {}

    fn response_headers_start(&mut self) {}

    fn response_headers_end(&mut self, response: &ResponseData) {}

    fn response_body_start(&mut self) {}

    /// `byte_count` is the number of body bytes read.
    fn response_body_end(&mut self, byte_count: u64) {}

    fn call_end(&mut self) {}

    fn call_failed(&mut self, error: &dyn Error) {}
}

/// A listener that ignores every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventListener;

impl EventListener for NoopEventListener {}

/// Creates a fresh [`EventListener`] for each call.
///
/// Closures taking the call's [`RequestData`] are factories too:
///
/// ```rust
/// use calltrace::{EventListener, EventListenerFactory, NoopEventListener};
/// use calltrace::types::RequestData;
///
/// let factory = |_request: &RequestData| -> Box<dyn EventListener> { Box::new(NoopEventListener) };
/// let request = RequestData::new(http::Method::GET, http::Uri::from_static("http://localhost/"));
/// let _listener = factory.create(&request);
/// ```
pub trait EventListenerFactory: Send + Sync + 'static {
    fn create(&self, request: &RequestData) -> Box<dyn EventListener>;
}

impl<F> EventListenerFactory for F
where
    F: Fn(&RequestData) -> Box<dyn EventListener> + Send + Sync + 'static,
{
    fn create(&self, request: &RequestData) -> Box<dyn EventListener> {
        self(request)
    }
}
