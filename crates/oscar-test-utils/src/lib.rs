//! Common test helpers and utilities for OSCAR tests
//!
//! This crate provides:
//! - Condition-based waiting (no hardcoded sleeps)
//! - Message and bad-data collectors usable as listeners
//! - Packet fixtures

use bytes::Bytes;
use oscar_core::{codec, Bundle, Message, Packet, TimeTag};
use oscar_dispatch::{BadDataEvent, BadDataListener, MessageEvent, MessageListener};
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default test timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default condition check interval
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_millis(10);

// ============================================================================
// Condition-Based Waiting
// ============================================================================

/// Wait for a condition with timeout - condition-based, not time-based
pub fn wait_for<F>(check: F, interval: Duration, max_wait: Duration) -> bool
where
    F: Fn() -> bool,
{
    let start = Instant::now();
    loop {
        if check() {
            return true;
        }
        if start.elapsed() >= max_wait {
            return false;
        }
        std::thread::sleep(interval);
    }
}

// ============================================================================
// Fixtures
// ============================================================================

/// Encode a message with the standard codec
pub fn message_bytes(message: &Message) -> Bytes {
    codec::encode(&Packet::from(message.clone())).expect("fixture message must encode")
}

/// Bundle of `messages` scheduled for `timetag`
pub fn bundle_at(timetag: TimeTag, messages: impl IntoIterator<Item = Message>) -> Packet {
    let mut bundle = Bundle::new(timetag);
    for message in messages {
        bundle.push(message);
    }
    bundle.into()
}

/// Bundle of `messages` due `delay` from now.
///
/// Panics if the wall clock cannot represent the deadline.
pub fn bundle_after(delay: Duration, messages: impl IntoIterator<Item = Message>) -> Packet {
    let timetag = TimeTag::after(delay).expect("bundle delay out of clock range");
    bundle_at(timetag, messages)
}

/// Loopback source address for receiver tests
pub fn local_source(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

// ============================================================================
// Collectors - for verifying delivered messages
// ============================================================================

/// A message as seen by a listener
#[derive(Debug, Clone)]
pub struct Received {
    pub time: TimeTag,
    pub source: Option<SocketAddr>,
    pub message: Message,
    pub at: Instant,
    pub thread: Option<String>,
}

/// Thread-safe recorder of delivered messages
#[derive(Clone, Default)]
pub struct MessageCollector {
    received: Arc<Mutex<Vec<Received>>>,
}

impl MessageCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// A listener that records into this collector
    pub fn listener(&self) -> Arc<dyn MessageListener> {
        Arc::new(self.clone())
    }

    /// Get the count of received messages
    pub fn count(&self) -> usize {
        self.received.lock().len()
    }

    /// Wait for at least n messages to be received
    pub fn wait_for_count(&self, n: usize, max_wait: Duration) -> bool {
        wait_for(|| self.count() >= n, DEFAULT_CHECK_INTERVAL, max_wait)
    }

    pub fn received(&self) -> Vec<Received> {
        self.received.lock().clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.received.lock().iter().map(|r| r.message.clone()).collect()
    }

    /// Addresses in delivery order
    pub fn addresses(&self) -> Vec<String> {
        self.received
            .lock()
            .iter()
            .map(|r| r.message.address.clone())
            .collect()
    }

    /// Check if a specific address was received
    pub fn has_address(&self, addr: &str) -> bool {
        self.received.lock().iter().any(|r| r.message.address == addr)
    }

    pub fn last(&self) -> Option<Received> {
        self.received.lock().last().cloned()
    }

    pub fn clear(&self) {
        self.received.lock().clear();
    }
}

impl MessageListener for MessageCollector {
    fn accept_message(&self, event: &MessageEvent<'_>) {
        self.received.lock().push(Received {
            time: event.time,
            source: event.source,
            message: event.message.clone(),
            at: Instant::now(),
            thread: std::thread::current().name().map(str::to_string),
        });
    }
}

/// Thread-safe recorder of parse failures
#[derive(Clone, Default)]
pub struct BadDataCollector {
    events: Arc<Mutex<Vec<BadDataEvent>>>,
}

impl BadDataCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listener(&self) -> Arc<dyn BadDataListener> {
        Arc::new(self.clone())
    }

    pub fn count(&self) -> usize {
        self.events.lock().len()
    }

    pub fn events(&self) -> Vec<BadDataEvent> {
        self.events.lock().clone()
    }
}

impl BadDataListener for BadDataCollector {
    fn bad_data_received(&self, event: &BadDataEvent) {
        self.events.lock().push(event.clone());
    }
}
