//! In-memory transport used by the client tests.

use super::factory::{Frame, Transport, TransportFactory};
use crate::types::{RealtimeError, Result};
use async_trait::async_trait;
use futures::Sink;
use futures::channel::mpsc;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};

/// Server side of one mock transport
pub(crate) struct MockPeer {
    /// Frames written by the client
    pub sent: mpsc::UnboundedReceiver<Frame>,
    /// Frames delivered to the client
    pub inbound: mpsc::UnboundedSender<Result<Frame>>,
}

impl MockPeer {
    pub fn push_text(&self, text: &str) {
        let _ = self.inbound.unbounded_send(Ok(Frame::Text(text.to_string())));
    }

    pub fn push_close(&self, code: u16, reason: &str) {
        let _ = self
            .inbound
            .unbounded_send(Ok(Frame::Close(Some(super::CloseInfo::new(code, reason)))));
    }

    /// Drain everything the client has written so far
    pub fn drain_sent(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.sent.try_recv() {
            frames.push(frame);
        }
        frames
    }

    /// Text frames written so far, parsed as JSON
    pub fn drain_json(&mut self) -> Vec<serde_json::Value> {
        self.drain_sent()
            .into_iter()
            .filter_map(|frame| match frame {
                Frame::Text(text) => serde_json::from_str(&text).ok(),
                Frame::Close(_) => None,
            })
            .collect()
    }
}

#[derive(Default)]
struct Counters {
    opened: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

/// Factory handing out channel-backed transports and tracking how many are alive
#[derive(Clone, Default)]
pub(crate) struct MockTransportFactory {
    counters: Arc<Counters>,
    peers: Arc<Mutex<Vec<MockPeer>>>,
    fail_next: Arc<Mutex<usize>>,
    urls: Arc<Mutex<Vec<String>>>,
}

impl MockTransportFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` open attempts fail
    pub fn fail_next(&self, count: usize) {
        *self.fail_next.lock().unwrap() = count;
    }

    pub fn opened(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    pub fn active(&self) -> usize {
        self.counters.active.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.counters.max_active.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }

    /// Take the peer of the most recently opened transport
    pub fn take_peer(&self) -> Option<MockPeer> {
        self.peers.lock().unwrap().pop()
    }
}

#[async_trait]
impl TransportFactory for MockTransportFactory {
    async fn open(&self, url: &str) -> Result<Transport> {
        self.urls.lock().unwrap().push(url.to_string());
        {
            let mut fail = self.fail_next.lock().unwrap();
            if *fail > 0 {
                *fail -= 1;
                return Err(RealtimeError::Connection("connection refused".to_string()));
            }
        }

        let (out_tx, out_rx) = mpsc::unbounded();
        let (in_tx, in_rx) = mpsc::unbounded();

        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        let active = self.counters.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.max_active.fetch_max(active, Ordering::SeqCst);

        self.peers.lock().unwrap().push(MockPeer {
            sent: out_rx,
            inbound: in_tx,
        });

        Ok(Transport {
            sink: Box::pin(CountedSink {
                inner: out_tx,
                counters: Arc::clone(&self.counters),
            }),
            stream: Box::pin(in_rx),
        })
    }
}

/// Sink that counts as an active transport until dropped
struct CountedSink {
    inner: mpsc::UnboundedSender<Frame>,
    counters: Arc<Counters>,
}

impl Sink<Frame> for CountedSink {
    type Error = RealtimeError;

    fn poll_ready(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
        Pin::new(&mut self.inner)
            .poll_ready(cx)
            .map_err(|_| RealtimeError::NotConnected)
    }

    fn start_send(mut self: Pin<&mut Self>, item: Frame) -> Result<()> {
        Pin::new(&mut self.inner)
            .start_send(item)
            .map_err(|_| RealtimeError::NotConnected)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
        Pin::new(&mut self.inner)
            .poll_flush(cx)
            .map_err(|_| RealtimeError::NotConnected)
    }

    fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<()>> {
        Pin::new(&mut self.inner)
            .poll_close(cx)
            .map_err(|_| RealtimeError::NotConnected)
    }
}

impl Drop for CountedSink {
    fn drop(&mut self) {
        self.counters.active.fetch_sub(1, Ordering::SeqCst);
    }
}
