//! # Calltrace
//!
//! A per-call event listener for HTTP clients that writes one human-readable line for every
//! lifecycle event of a call: DNS resolution, connection setup, TLS handshake, request and
//! response headers and bodies, and call completion or failure.
//!
//! ## Features
//!
//! - **Per-call listeners**: a factory creates one [`EventListener`] per call, so per-call
//!   state never leaks between calls
//! - **Pluggable sinks**: log lines go to any [`Logger`], by default `tracing` at `INFO`
//! - **Tower integration**: [`EventListenerLayer`] drives listeners from any tower HTTP client
//!   service, including streaming request and response bodies
//! - **Composable**: [`MultiListenerFactory`] fans events out to several listeners
//!
//! ## Quick Start
//!
//! Engines that own DNS and connection setup drive the listener directly:
//!
//! ```rust
//! use calltrace::{CallLogger, EventListener, EventListenerFactory};
//! use calltrace::types::{Protocol, Proxy, RequestData};
//! use std::sync::{Arc, Mutex};
//!
//! let lines = Arc::new(Mutex::new(Vec::<String>::new()));
//! let sink = lines.clone();
//! let logger = CallLogger::with_logger(move |line: &str| sink.lock().unwrap().push(line.to_string()));
//!
//! let request = RequestData::new(http::Method::GET, http::Uri::from_static("http://localhost:8080/"));
//! let mut listener = logger.create(&request);
//! listener.call_start(&request);
//! listener.dns_start("localhost");
//! listener.dns_end("localhost", &["127.0.0.1".parse::<std::net::IpAddr>().unwrap()]);
//! listener.connect_start("127.0.0.1:8080".parse().unwrap(), &Proxy::Direct);
//! listener.connect_end("127.0.0.1:8080".parse().unwrap(), &Proxy::Direct, Some(Protocol::Http11));
//!
//! assert_eq!(lines.lock().unwrap()[4], "* connectEnd: http/1.1");
//! ```
//!
//! ## Tower Services
//!
//! Wrap a client service to observe what crosses the service boundary:
//!
//! ```rust,no_run
//! use calltrace::{CallLogger, EventListenerConfig, EventListenerLayer};
//! use tower::ServiceBuilder;
//!
//! # fn wrap<S>(client: S) {
//! let service = ServiceBuilder::new()
//!     .layer(EventListenerLayer::new(EventListenerConfig::default(), CallLogger::new()))
//!     .service(client);
//! # }
//! ```

use futures::future::BoxFuture;
use http::{Request, Response};
use http_body::Body;
use std::{
    sync::Arc,
    task::{Context, Poll},
};
use tower::{Layer, Service};
use tracing::{debug, instrument};

pub mod types;
use types::{RequestData, ResponseData};

pub mod event;
pub use event::CallEvent;

pub mod listener;
pub use listener::{EventListener, EventListenerFactory, NoopEventListener};

pub mod call_logger;
pub use call_logger::{CallLogger, CallLoggerEventListener, Logger, TracingLogger};

pub mod body_wrapper;
use body_wrapper::SharedListener;
pub use body_wrapper::ObservedBody;

pub mod multi_listener;
pub use multi_listener::MultiListenerFactory;

/// Configuration for the event listener layer.
///
/// Controls which bodies are observed. An unobserved request body emits no request body
/// events; with an unobserved response body the call ends as soon as the response headers
/// have been received.
///
/// # Examples
///
/// ```rust
/// use calltrace::EventListenerConfig;
///
/// // Default configuration
/// let config = EventListenerConfig::default();
///
/// // Custom configuration
/// let config = EventListenerConfig {
///     observe_request_body: true,
///     observe_response_body: false,
/// };
/// ```
#[derive(Clone, Debug)]
pub struct EventListenerConfig {
    /// Whether to report request body progress
    pub observe_request_body: bool,
    /// Whether to report response body progress and end the call when the body completes
    pub observe_response_body: bool,
}

impl Default for EventListenerConfig {
    fn default() -> Self {
        Self {
            observe_request_body: true,
            observe_response_body: true,
        }
    }
}

/// Tower layer that attaches a fresh [`EventListener`] to every call made through the
/// wrapped client service.
///
/// Only events visible at the service boundary are emitted: call start, end and failure,
/// request headers and body, and response headers and body. DNS, connect and connection
/// pool events belong to the engine behind the service, which can report them through its
/// own listener.
#[derive(Clone)]
pub struct EventListenerLayer {
    config: EventListenerConfig,
    factory: Arc<dyn EventListenerFactory>,
}

impl EventListenerLayer {
    /// Create a new layer creating listeners from `factory`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use calltrace::{CallLogger, EventListenerConfig, EventListenerLayer};
    ///
    /// let layer = EventListenerLayer::new(EventListenerConfig::default(), CallLogger::new());
    /// ```
    pub fn new<F: EventListenerFactory>(config: EventListenerConfig, factory: F) -> Self {
        Self {
            config,
            factory: Arc::new(factory),
        }
    }
}

impl<S> Layer<S> for EventListenerLayer {
    type Service = EventListenerService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        EventListenerService {
            inner,
            config: self.config.clone(),
            factory: self.factory.clone(),
        }
    }
}

/// Tower service created by [`EventListenerLayer`].
///
/// Requests reach the inner service with their body wrapped in [`ObservedBody`]; responses
/// come back the same way.
#[derive(Clone)]
pub struct EventListenerService<S> {
    inner: S,
    config: EventListenerConfig,
    factory: Arc<dyn EventListenerFactory>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for EventListenerService<S>
where
    S: Service<Request<ObservedBody<ReqBody>>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
    S::Error: std::error::Error + Send + 'static,
    ReqBody: Body,
    ResBody: Body + Send + 'static,
{
    type Response = Response<ObservedBody<ResBody>>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    #[instrument(skip_all)]
    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        let request_data = RequestData::from_request(&request);
        debug!(method = %request_data.method, uri = %request_data.uri, "Starting call");

        let call = SharedListener::new(self.factory.create(&request_data));
        call.emit(|l| l.call_start(&request_data));
        call.emit(|l| l.request_headers_start());
        call.emit(|l| l.request_headers_end(&request_data));

        let (parts, body) = request.into_parts();
        let body = if self.config.observe_request_body && !body.is_end_stream() {
            debug!("Observing request body");
            ObservedBody::request(body, call.clone())
        } else {
            ObservedBody::passthrough(body)
        };
        let future = self.inner.call(Request::from_parts(parts, body));

        let observe_response_body = self.config.observe_response_body;
        let uri = request_data.uri;
        Box::pin(async move {
            match future.await {
                Ok(response) => {
                    call.emit(|l| l.response_headers_start());
                    let response_data = ResponseData::from_response(&response, uri);
                    debug!(status = %response_data.status, "Response headers received");
                    call.emit(|l| l.response_headers_end(&response_data));

                    let (parts, body) = response.into_parts();
                    let body = if observe_response_body {
                        ObservedBody::response(body, call)
                    } else {
                        call.finish(|l| l.call_end());
                        ObservedBody::passthrough(body)
                    };
                    Ok(Response::from_parts(parts, body))
                }
                Err(e) => {
                    debug!(error = %e, "Call failed");
                    call.finish(|l| l.call_failed(&e));
                    Err(e)
                }
            }
        })
    }
}
