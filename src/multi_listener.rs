//! Composite factory for combining multiple event listeners.
//!
//! This module provides [`MultiListenerFactory`], a factory that composes an arbitrary
//! number of [`EventListenerFactory`] implementations. Each call gets one listener from
//! every inner factory, and every event is forwarded to all of them in registration order.
//!
//! # Example
//!
//! ```rust
//! use calltrace::{CallLogger, MultiListenerFactory, NoopEventListener, EventListener};
//! use calltrace::types::RequestData;
//!
//! let factory = MultiListenerFactory::new()
//!     .with(CallLogger::new())
//!     .with(|_request: &RequestData| -> Box<dyn EventListener> { Box::new(NoopEventListener) });
//!
//! assert_eq!(factory.len(), 2);
//! ```

use std::error::Error;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use crate::listener::{EventListener, EventListenerFactory};
use crate::types::{ConnectionData, Handshake, Protocol, Proxy, RequestData, ResponseData};

/// A factory whose listeners delegate to the listeners of multiple inner factories.
///
/// `MultiListenerFactory` is `Send + Sync` and cheap to clone; inner factories are held
/// behind `Arc`.
#[derive(Clone, Default)]
pub struct MultiListenerFactory {
    factories: Vec<Arc<dyn EventListenerFactory>>,
}

impl MultiListenerFactory {
    /// Create an empty factory; its listeners ignore every event.
    pub fn new() -> Self {
        Self {
            factories: Vec::new(),
        }
    }

    /// Add a factory to the chain. Returns self for builder pattern.
    pub fn with<F: EventListenerFactory>(mut self, factory: F) -> Self {
        self.factories.push(Arc::new(factory));
        self
    }

    /// Check if no factories are registered.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Number of registered factories.
    pub fn len(&self) -> usize {
        self.factories.len()
    }
}

impl EventListenerFactory for MultiListenerFactory {
    fn create(&self, request: &RequestData) -> Box<dyn EventListener> {
        Box::new(MultiEventListener {
            listeners: self.factories.iter().map(|f| f.create(request)).collect(),
        })
    }
}

struct MultiEventListener {
    listeners: Vec<Box<dyn EventListener>>,
}

impl MultiEventListener {
    fn each(&mut self, mut event: impl FnMut(&mut dyn EventListener)) {
        for listener in &mut self.listeners {
            event(listener.as_mut());
        }
    }
}

impl EventListener for MultiEventListener {
    fn call_start(&mut self, request: &RequestData) {
        self.each(|l| l.call_start(request));
    }

    fn dns_start(&mut self, domain_name: &str) {
        self.each(|l| l.dns_start(domain_name));
    }

    fn dns_end(&mut self, domain_name: &str, addresses: &[IpAddr]) {
        self.each(|l| l.dns_end(domain_name, addresses));
    }

    fn connect_start(&mut self, address: SocketAddr, proxy: &Proxy) {
        self.each(|l| l.connect_start(address, proxy));
    }

    fn secure_connect_start(&mut self) {
        self.each(|l| l.secure_connect_start());
    }

    fn secure_connect_end(&mut self, handshake: Option<&Handshake>) {
        self.each(|l| l.secure_connect_end(handshake));
    }

    fn connect_end(&mut self, address: SocketAddr, proxy: &Proxy, protocol: Option<Protocol>) {
        self.each(|l| l.connect_end(address, proxy, protocol));
    }

    fn connect_failed(
        &mut self,
        address: SocketAddr,
        proxy: &Proxy,
        protocol: Option<Protocol>,
        error: &dyn Error,
    ) {
        self.each(|l| l.connect_failed(address, proxy, protocol, error));
    }

    fn connection_acquired(&mut self, connection: &ConnectionData) {
        self.each(|l| l.connection_acquired(connection));
    }

    fn connection_released(&mut self, connection: &ConnectionData) {
        self.each(|l| l.connection_released(connection));
    }

    fn request_headers_start(&mut self) {
        self.each(|l| l.request_headers_start());
    }

    fn request_headers_end(&mut self, request: &RequestData) {
        self.each(|l| l.request_headers_end(request));
    }

    fn request_body_start(&mut self) {
        self.each(|l| l.request_body_start());
    }

    fn request_body_end(&mut self, byte_count: u64) {
        self.each(|l| l.request_body_end(byte_count));
    }

    fn response_headers_start(&mut self) {
        self.each(|l| l.response_headers_start());
    }

    fn response_headers_end(&mut self, response: &ResponseData) {
        self.each(|l| l.response_headers_end(response));
    }

    fn response_body_start(&mut self) {
        self.each(|l| l.response_body_start());
    }

    fn response_body_end(&mut self, byte_count: u64) {
        self.each(|l| l.response_body_end(byte_count));
    }

    fn call_end(&mut self) {
        self.each(|l| l.call_end());
    }

    fn call_failed(&mut self, error: &dyn Error) {
        self.each(|l| l.call_failed(error));
    }
}
