//! In-process transport doubles for exercising the client without an indexer.

use std::collections::VecDeque;
use std::fmt::Display;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::{StreamExt, stream};
use midnight_indexer_sdk::executor::Delay;
use midnight_indexer_sdk::transport::{
    GraphQlRequest, RawStream, StreamingTransport, Transport, TransportError,
};
use serde_json::Value;

/// Scripted outcome of a single transport call.
#[derive(Debug, Clone)]
pub enum CallResponse {
    /// Respond with this `data` object.
    Data(Value),
    /// Fail with this message.
    Error(String),
}

impl CallResponse {
    pub fn error(message: impl Display) -> Self {
        CallResponse::Error(message.to_string())
    }

    fn into_result(self) -> Result<Value, TransportError> {
        match self {
            CallResponse::Data(data) => Ok(data),
            CallResponse::Error(message) => Err(TransportError::Other(message)),
        }
    }
}

/// Request/response transport that replays scripted responses in order.
/// Once the script is exhausted every call fails.
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<CallResponse>>,
    requests: Mutex<Vec<GraphQlRequest>>,
    calls: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transport that replays `responses`.
    pub fn with_responses(responses: impl IntoIterator<Item = CallResponse>) -> Self {
        let transport = Self::new();
        transport.responses.lock().unwrap().extend(responses);
        transport
    }

    /// Creates a transport that fails `failures` times and then returns `data`.
    pub fn failing_then(failures: usize, data: Value) -> Self {
        let mut responses: Vec<CallResponse> = (0..failures)
            .map(|i| CallResponse::error(format!("error sending request ({})", i + 1)))
            .collect();
        responses.push(CallResponse::Data(data));
        Self::with_responses(responses)
    }

    /// Appends a response to the script.
    pub fn push(&self, response: CallResponse) {
        self.responses.lock().unwrap().push_back(response);
    }

    /// Number of `execute` calls so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> Vec<GraphQlRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn execute(&self, request: &GraphQlRequest) -> Result<Value, TransportError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests.lock().unwrap().push(request.clone());
        let response = self.responses.lock().unwrap().pop_front();
        log::debug!("{}: mock call #{call} -> {response:?}", request.name);
        response
            .unwrap_or_else(|| CallResponse::error("no scripted response left"))
            .into_result()
    }
}

/// Script for one subscription opened on [`MockStreamingTransport`].
#[derive(Debug, Clone, Default)]
pub struct StreamScript {
    items: Vec<CallResponse>,
    keep_open: bool,
}

impl StreamScript {
    /// A stream that yields `items` and then ends.
    pub fn items(items: impl IntoIterator<Item = CallResponse>) -> Self {
        Self {
            items: items.into_iter().collect(),
            keep_open: false,
        }
    }

    /// A stream that yields `data` objects and then ends.
    pub fn data(items: impl IntoIterator<Item = Value>) -> Self {
        Self::items(items.into_iter().map(CallResponse::Data))
    }

    /// Keep the connection open after the scripted items instead of ending.
    pub fn keep_open(mut self) -> Self {
        self.keep_open = true;
        self
    }
}

/// Counts a released connection when dropped.
struct ConnectionGuard {
    closed: Arc<AtomicUsize>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Streaming transport that replays one [`StreamScript`] per subscription and
/// counts how many connections were opened and released.
#[derive(Default)]
pub struct MockStreamingTransport {
    scripts: Mutex<VecDeque<StreamScript>>,
    requests: Mutex<Vec<GraphQlRequest>>,
    opened: AtomicUsize,
    closed: Arc<AtomicUsize>,
    pulled: Arc<AtomicUsize>,
}

impl MockStreamingTransport {
    pub fn new(scripts: impl IntoIterator<Item = StreamScript>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into_iter().collect()),
            ..Default::default()
        }
    }

    /// Number of subscriptions opened.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Number of subscription connections released.
    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Number of raw items handed out across all subscriptions.
    pub fn pulled(&self) -> usize {
        self.pulled.load(Ordering::SeqCst)
    }

    /// Subscription requests received so far, in order.
    pub fn requests(&self) -> Vec<GraphQlRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl StreamingTransport for MockStreamingTransport {
    async fn subscribe(&self, request: &GraphQlRequest) -> Result<RawStream, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| TransportError::Other("connection refused".to_string()))?;
        self.opened.fetch_add(1, Ordering::SeqCst);
        log::debug!("{}: mock subscription opened", request.name);

        let guard = ConnectionGuard {
            closed: self.closed.clone(),
        };
        let pulled = self.pulled.clone();
        let items = stream::iter(script.items).map(move |item| {
            pulled.fetch_add(1, Ordering::SeqCst);
            item.into_result()
        });
        let items = if script.keep_open {
            items.chain(stream::pending()).boxed()
        } else {
            items.boxed()
        };
        Ok(Box::pin(items.map(move |item| {
            let _connection = &guard;
            item
        })))
    }
}

/// Delay that records requested durations and returns immediately.
#[derive(Default)]
pub struct RecordingDelay {
    delays: Mutex<Vec<Duration>>,
}

impl RecordingDelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays requested so far, in order.
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().unwrap().clone()
    }
}

impl Delay for RecordingDelay {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        self.delays.lock().unwrap().push(duration);
        Box::pin(futures::future::ready(()))
    }
}
