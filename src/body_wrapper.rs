//! Body observation utilities.
//!
//! This module provides [`ObservedBody`], a pass-through HTTP body that reports when the
//! body starts streaming, how many bytes it carried and when it finished to the listener of
//! the call it belongs to.

use bytes::Buf;
use http_body::{Body, Frame, SizeHint};
use pin_project_lite::pin_project;
use std::error::Error;
use std::fmt;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{ready, Context, Poll};
use tracing::trace;

use crate::listener::EventListener;

/// The listener of one call, shared by the response future and the call's bodies.
///
/// Once a terminal event (`call_end` or `call_failed`) has been delivered, every later
/// event is dropped.
#[derive(Clone)]
pub(crate) struct SharedListener {
    inner: Arc<Mutex<CallState>>,
}

struct CallState {
    listener: Box<dyn EventListener>,
    finished: bool,
}

impl SharedListener {
    pub(crate) fn new(listener: Box<dyn EventListener>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CallState {
                listener,
                finished: false,
            })),
        }
    }

    pub(crate) fn emit(&self, event: impl FnOnce(&mut dyn EventListener)) {
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if !state.finished {
            event(state.listener.as_mut());
        }
    }

    pub(crate) fn finish(&self, event: impl FnOnce(&mut dyn EventListener)) {
        let mut state = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if !state.finished {
            state.finished = true;
            event(state.listener.as_mut());
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Request,
    Response,
}

struct BodyObserver {
    call: SharedListener,
    direction: Direction,
    started: bool,
    done: bool,
    byte_count: u64,
}

impl BodyObserver {
    fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        match self.direction {
            Direction::Request => self.call.emit(|l| l.request_body_start()),
            Direction::Response => self.call.emit(|l| l.response_body_start()),
        }
    }

    fn end(&mut self) {
        self.done = true;
        let byte_count = self.byte_count;
        trace!(direction = ?self.direction, byte_count, "Observed body finished");
        match self.direction {
            Direction::Request => self.call.emit(|l| l.request_body_end(byte_count)),
            Direction::Response => {
                self.call.emit(|l| l.response_body_end(byte_count));
                self.call.finish(|l| l.call_end());
            }
        }
    }

    fn fail(&mut self, error: &dyn Error) {
        self.done = true;
        self.call.finish(|l| l.call_failed(error));
    }
}

impl Drop for BodyObserver {
    // A response closed before its end still completes the call with the bytes read so far.
    fn drop(&mut self) {
        if self.done || self.direction == Direction::Request {
            return;
        }
        self.start();
        self.end();
    }
}

pin_project! {
    /// An HTTP body that passes every frame through unchanged while reporting its
    /// progress to the owning call's listener.
    ///
    /// The first poll emits `request_body_start` or `response_body_start`. The end of the
    /// stream emits the matching `*_body_end` with the number of data bytes seen; for a
    /// response body this is followed by `call_end`. A stream error emits `call_failed`.
    /// Dropping an unfinished response body reports the bytes read so far and ends the call;
    /// dropping an unfinished request body reports nothing.
    ///
    /// Bodies built with [`ObservedBody::passthrough`] report nothing.
    pub struct ObservedBody<B> {
        #[pin]
        inner: B,
        observer: Option<BodyObserver>,
    }
}

impl<B> ObservedBody<B> {
    /// Wrap a body without observing it.
    pub fn passthrough(inner: B) -> Self {
        Self {
            inner,
            observer: None,
        }
    }

    pub(crate) fn request(inner: B, call: SharedListener) -> Self {
        Self::observed(inner, call, Direction::Request)
    }

    pub(crate) fn response(inner: B, call: SharedListener) -> Self {
        Self::observed(inner, call, Direction::Response)
    }

    fn observed(inner: B, call: SharedListener, direction: Direction) -> Self {
        Self {
            inner,
            observer: Some(BodyObserver {
                call,
                direction,
                started: false,
                done: false,
                byte_count: 0,
            }),
        }
    }
}

impl<B: fmt::Debug> fmt::Debug for ObservedBody<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservedBody")
            .field("inner", &self.inner)
            .field("observed", &self.observer.is_some())
            .finish()
    }
}

impl<B> Body for ObservedBody<B>
where
    B: Body,
    B::Error: Error,
{
    type Data = B::Data;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.project();
        let Some(observer) = this.observer.as_mut() else {
            return this.inner.poll_frame(cx);
        };
        if observer.done {
            return this.inner.poll_frame(cx);
        }
        observer.start();

        match ready!(this.inner.poll_frame(cx)) {
            Some(Ok(frame)) => {
                if let Some(data) = frame.data_ref() {
                    observer.byte_count += data.remaining() as u64;
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Some(Err(e)) => {
                observer.fail(&e);
                Poll::Ready(Some(Err(e)))
            }
            None => {
                observer.end();
                Poll::Ready(None)
            }
        }
    }

    fn is_end_stream(&self) -> bool {
        match &self.observer {
            // Keep consumers polling until the end events have been delivered.
            Some(observer) => observer.done,
            None => self.inner.is_end_stream(),
        }
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RequestData;
    use bytes::Bytes;
    use http_body_util::{BodyExt, Full, StreamBody};
    use std::convert::Infallible;
    use std::io;

    #[derive(Default)]
    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl EventListener for Recorder {
        fn call_start(&mut self, _request: &RequestData) {
            self.0.lock().unwrap().push("callStart".into());
        }
        fn request_body_start(&mut self) {
            self.0.lock().unwrap().push("requestBodyStart".into());
        }
        fn request_body_end(&mut self, byte_count: u64) {
            self.0.lock().unwrap().push(format!("requestBodyEnd {byte_count}"));
        }
        fn response_body_start(&mut self) {
            self.0.lock().unwrap().push("responseBodyStart".into());
        }
        fn response_body_end(&mut self, byte_count: u64) {
            self.0.lock().unwrap().push(format!("responseBodyEnd {byte_count}"));
        }
        fn call_end(&mut self) {
            self.0.lock().unwrap().push("callEnd".into());
        }
        fn call_failed(&mut self, error: &dyn Error) {
            self.0.lock().unwrap().push(format!("callFailed {error}"));
        }
    }

    fn shared() -> (SharedListener, Arc<Mutex<Vec<String>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let call = SharedListener::new(Box::new(Recorder(events.clone())));
        (call, events)
    }

    #[tokio::test]
    async fn test_response_body_counts_streamed_chunks() {
        let (call, events) = shared();
        let chunks = futures::stream::iter(vec![
            Ok::<_, Infallible>(Frame::data(Bytes::from("chunk1"))),
            Ok(Frame::data(Bytes::from("chunk2"))),
            Ok(Frame::data(Bytes::from("chunk3"))),
        ]);
        let body = ObservedBody::response(StreamBody::new(chunks), call);

        let collected = body.collect().await.unwrap().to_bytes();
        assert_eq!(collected, "chunk1chunk2chunk3");
        assert_eq!(
            *events.lock().unwrap(),
            vec!["responseBodyStart", "responseBodyEnd 18", "callEnd"]
        );
    }

    #[tokio::test]
    async fn test_request_body_does_not_end_call() {
        let (call, events) = shared();
        let body = ObservedBody::request(Full::new(Bytes::from("Hello!")), call);

        body.collect().await.unwrap();
        assert_eq!(
            *events.lock().unwrap(),
            vec!["requestBodyStart", "requestBodyEnd 6"]
        );
    }

    #[tokio::test]
    async fn test_body_error_fails_call_once() {
        let (call, events) = shared();
        let chunks = futures::stream::iter(vec![
            Ok(Frame::data(Bytes::from("partial"))),
            Err(io::Error::new(io::ErrorKind::UnexpectedEof, "unexpected end of stream")),
        ]);
        let body = ObservedBody::response(StreamBody::new(chunks), call.clone());

        assert!(body.collect().await.is_err());
        call.finish(|l| l.call_end());
        assert_eq!(
            *events.lock().unwrap(),
            vec!["responseBodyStart", "callFailed unexpected end of stream"]
        );
    }

    #[tokio::test]
    async fn test_dropped_response_body_ends_call_with_bytes_read() {
        let (call, events) = shared();
        let chunks = futures::stream::iter(vec![
            Ok::<_, Infallible>(Frame::data(Bytes::from("chunk1"))),
            Ok(Frame::data(Bytes::from("chunk2"))),
        ]);
        let mut body = ObservedBody::response(StreamBody::new(chunks), call);

        let first = body.frame().await.unwrap().unwrap().into_data().unwrap();
        assert_eq!(first, "chunk1");
        drop(body);
        assert_eq!(
            *events.lock().unwrap(),
            vec!["responseBodyStart", "responseBodyEnd 6", "callEnd"]
        );
    }

    #[test]
    fn test_unread_response_body_drop_reports_start_and_end() {
        let (call, events) = shared();
        drop(ObservedBody::response(Full::new(Bytes::from("Hello!")), call));
        assert_eq!(
            *events.lock().unwrap(),
            vec!["responseBodyStart", "responseBodyEnd 0", "callEnd"]
        );
    }

    #[tokio::test]
    async fn test_dropped_request_body_reports_nothing() {
        let (call, events) = shared();
        let mut body = ObservedBody::request(Full::new(Bytes::from("Hello!")), call.clone());

        body.frame().await.unwrap().unwrap();
        drop(body);
        call.finish(|l| l.call_end());
        assert_eq!(*events.lock().unwrap(), vec!["requestBodyStart", "callEnd"]);
    }

    #[tokio::test]
    async fn test_poll_after_error_reads_inner_body_silently() {
        let (call, events) = shared();
        let chunks = futures::stream::iter(vec![
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset")),
            Ok(Frame::data(Bytes::from("late"))),
        ]);
        let mut body = ObservedBody::response(StreamBody::new(chunks), call);

        assert!(body.frame().await.unwrap().is_err());
        assert!(body.is_end_stream());
        let late = body.frame().await.unwrap().unwrap().into_data().unwrap();
        assert_eq!(late, "late");
        assert!(body.frame().await.is_none());
        drop(body);
        assert_eq!(
            *events.lock().unwrap(),
            vec!["responseBodyStart", "callFailed connection reset"]
        );
    }

    #[tokio::test]
    async fn test_passthrough_reports_nothing() {
        let (call, events) = shared();
        let body = ObservedBody::passthrough(Full::new(Bytes::from("quiet")));

        let collected = body.collect().await.unwrap().to_bytes();
        assert_eq!(collected, "quiet");
        drop(call);
        assert!(events.lock().unwrap().is_empty());
    }
}
