//! Transport-facing entry point
//!
//! A transport hands every datagram (or stream frame) to
//! [`Receiver::receive`]. The receiver parses it and fans the result out to
//! its packet listeners; parse failures take the bad-data path and never
//! affect later packets.

use crate::listener::{BadDataEvent, PacketEvent, PacketListener};
use bytes::Bytes;
use oscar_core::{CodecConfig, Packet, ParseError, Parser, TypeRegistry};
use parking_lot::RwLock;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{trace, warn};

pub struct Receiver {
    parser: Parser,
    listeners: RwLock<Arc<Vec<Arc<dyn PacketListener>>>>,
}

impl Receiver {
    /// Receiver using the standard type registry
    pub fn new() -> Self {
        Self::with_parser(Parser::new(Arc::new(TypeRegistry::standard())))
    }

    pub fn with_config(registry: Arc<TypeRegistry>, config: CodecConfig) -> Self {
        Self::with_parser(Parser::with_config(registry, config))
    }

    pub fn with_parser(parser: Parser) -> Self {
        Self {
            parser,
            listeners: RwLock::new(Arc::new(Vec::new())),
        }
    }

    pub fn parser(&self) -> &Parser {
        &self.parser
    }

    pub fn add_listener(&self, listener: Arc<dyn PacketListener>) {
        let mut listeners = self.listeners.write();
        let mut updated = listeners.as_ref().clone();
        updated.push(listener);
        *listeners = Arc::new(updated);
    }

    pub fn remove_listener(&self, listener: &Arc<dyn PacketListener>) -> bool {
        let mut listeners = self.listeners.write();
        match listeners.iter().position(|l| Arc::ptr_eq(l, listener)) {
            Some(index) => {
                let mut updated = listeners.as_ref().clone();
                updated.remove(index);
                *listeners = Arc::new(updated);
                true
            }
            None => false,
        }
    }

    /// Parse `data` and notify listeners.
    ///
    /// Returns the parse failure as well as reporting it to
    /// [`PacketListener::handle_bad_data`].
    pub fn receive(&self, data: &[u8], source: Option<SocketAddr>) -> Result<(), ParseError> {
        self.deliver(self.parser.parse(data), source)
    }

    /// Like [`receive`](Self::receive), without copying an owned buffer
    pub fn receive_bytes(&self, data: &Bytes, source: Option<SocketAddr>) -> Result<(), ParseError> {
        self.deliver(self.parser.parse_bytes(data), source)
    }

    fn deliver(
        &self,
        parsed: Result<Packet, ParseError>,
        source: Option<SocketAddr>,
    ) -> Result<(), ParseError> {
        let listeners = self.listeners.read().clone();
        match parsed {
            Ok(packet) => {
                trace!("Received {} packet from {:?}", kind(&packet), source);
                let event = PacketEvent { source, packet };
                for listener in listeners.iter() {
                    listener.handle_packet(&event);
                }
                Ok(())
            }
            Err(error) => {
                match source {
                    Some(addr) => warn!("Decode error from {}: {}", addr, error),
                    None => warn!("Decode error: {}", error),
                }
                let event = BadDataEvent {
                    source,
                    error: error.clone(),
                };
                for listener in listeners.iter() {
                    listener.handle_bad_data(&event);
                }
                Err(error)
            }
        }
    }
}

impl Default for Receiver {
    fn default() -> Self {
        Self::new()
    }
}

fn kind(packet: &Packet) -> &'static str {
    if packet.is_bundle() {
        "bundle"
    } else {
        "message"
    }
}
