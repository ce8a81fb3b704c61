//! Listener traits and the events they receive

use bytes::Bytes;
use oscar_core::{Message, Packet, ParseError, TimeTag};
use std::net::SocketAddr;
use std::sync::Arc;

/// A message delivered to a [`MessageListener`]
#[derive(Debug, Clone, Copy)]
pub struct MessageEvent<'a> {
    /// Where the packet came from, when known
    pub source: Option<SocketAddr>,
    /// Time tag of the enclosing bundle, or [`TimeTag::IMMEDIATE`] for a
    /// top-level message
    pub time: TimeTag,
    pub message: &'a Message,
}

/// Receives messages whose selector matched.
///
/// Any `Fn(&MessageEvent)` closure is a listener.
pub trait MessageListener: Send + Sync {
    fn accept_message(&self, event: &MessageEvent<'_>);
}

impl<F> MessageListener for F
where
    F: Fn(&MessageEvent<'_>) + Send + Sync,
{
    fn accept_message(&self, event: &MessageEvent<'_>) {
        self(event)
    }
}

/// Wrap a closure as a shareable listener
///
/// ```
/// use oscar_dispatch::listener_fn;
///
/// let listener = listener_fn(|event| println!("{}", event.message.address));
/// # drop(listener);
/// ```
pub fn listener_fn<F>(f: F) -> Arc<dyn MessageListener>
where
    F: Fn(&MessageEvent<'_>) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// A successfully parsed packet
#[derive(Debug, Clone)]
pub struct PacketEvent {
    pub source: Option<SocketAddr>,
    pub packet: Packet,
}

/// Bytes that could not be parsed
#[derive(Debug, Clone)]
pub struct BadDataEvent {
    pub source: Option<SocketAddr>,
    pub error: ParseError,
}

impl BadDataEvent {
    /// The offending bytes
    pub fn data(&self) -> &Bytes {
        self.error.data()
    }
}

/// Receives parsed packets and parse failures from a
/// [`Receiver`](crate::Receiver)
pub trait PacketListener: Send + Sync {
    fn handle_packet(&self, event: &PacketEvent);

    fn handle_bad_data(&self, _event: &BadDataEvent) {}
}

/// Receives parse failures
pub trait BadDataListener: Send + Sync {
    fn bad_data_received(&self, event: &BadDataEvent);
}

impl<F> BadDataListener for F
where
    F: Fn(&BadDataEvent) + Send + Sync,
{
    fn bad_data_received(&self, event: &BadDataEvent) {
        self(event)
    }
}
