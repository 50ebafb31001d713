use bytes::Bytes;
use calltrace::types::{Protocol, Proxy, RequestData};
use calltrace::{
    CallLogger, EventListener, EventListenerConfig, EventListenerFactory, EventListenerLayer,
    ObservedBody,
};
use http::{Request, Response};
use http_body_util::{BodyExt, Empty, Full};
use std::{
    io,
    net::{IpAddr, SocketAddr},
    time::Duration,
};
use tokio::time::sleep;
use tower::{service_fn, ServiceBuilder, ServiceExt};
use tracing::{info, Level};

/// Stand-in for a real HTTP client: waits a little and answers every request.
async fn fake_transport(
    request: Request<ObservedBody<Full<Bytes>>>,
) -> Result<Response<Full<Bytes>>, io::Error> {
    let received = request
        .into_body()
        .collect()
        .await
        .map_err(|e| io::Error::other(e.to_string()))?
        .to_bytes();
    sleep(Duration::from_millis(25)).await;
    Ok(Response::new(Full::new(Bytes::from(format!(
        "Echo: {}",
        String::from_utf8_lossy(&received)
    )))))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .with_target(true)
        .init();

    let logger = CallLogger::new();

    // Calls made through a tower client service.
    let client = ServiceBuilder::new()
        .layer(EventListenerLayer::new(EventListenerConfig::default(), logger.clone()))
        .service(service_fn(fake_transport));

    let request = Request::post("http://localhost:3000/echo").body(Full::new(Bytes::from("Hello!")))?;
    let response = client.oneshot(request).await?;
    let body = response.into_body().collect().await?.to_bytes();
    info!("Response body: {}", String::from_utf8_lossy(&body));

    // An engine that owns DNS and connection setup reports them directly.
    let request = RequestData::new(http::Method::GET, "http://localhost:3000/".parse::<http::Uri>()?);
    let mut listener = logger.event_listener_factory().create(&request);
    listener.call_start(&request);
    listener.dns_start("localhost");
    listener.dns_end("localhost", &["127.0.0.1".parse::<IpAddr>()?]);
    let address: SocketAddr = "127.0.0.1:3000".parse()?;
    listener.connect_start(address, &Proxy::Direct);
    listener.connect_failed(
        address,
        &Proxy::Direct,
        Some(Protocol::Http11),
        &io::Error::new(io::ErrorKind::ConnectionRefused, "Connection refused"),
    );
    listener.call_failed(&io::Error::new(
        io::ErrorKind::ConnectionRefused,
        "Failed to connect to localhost:3000",
    ));

    // Body-less requests skip the request body events.
    let empty_client = ServiceBuilder::new()
        .layer(EventListenerLayer::new(EventListenerConfig::default(), logger))
        .service(service_fn(|_request: Request<ObservedBody<Empty<Bytes>>>| async {
            Ok::<_, io::Error>(Response::new(Full::new(Bytes::from_static(b"pong"))))
        }));
    let request = Request::get("http://localhost:3000/ping").body(Empty::<Bytes>::new())?;
    empty_client.oneshot(request).await?.into_body().collect().await?;

    Ok(())
}
