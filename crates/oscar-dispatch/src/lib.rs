//! OSCAR Dispatch
//!
//! Delivers decoded OSC packets to application listeners:
//! - Evaluates `(selector, listener)` registrations in registration order
//! - Unwraps bundles depth-first
//! - Defers future time-tagged bundles to a dedicated timer thread
//! - Routes undecodable input to bad-data listeners
//!
//! # Example
//!
//! ```
//! use oscar_core::{codec, Message, Packet, Selector};
//! use oscar_dispatch::{listener_fn, Dispatcher, Receiver};
//! use std::sync::Arc;
//!
//! let dispatcher = Arc::new(Dispatcher::new());
//! dispatcher.add_listener(
//!     Selector::address("/mixer/*/fader"),
//!     listener_fn(|event| println!("{} at {}", event.message, event.time)),
//! );
//!
//! let receiver = Receiver::new();
//! receiver.add_listener(dispatcher.clone());
//!
//! let bytes = codec::encode(&Packet::from(Message::new("/mixer/1/fader").arg(0.5f32))).unwrap();
//! receiver.receive(&bytes, None).unwrap();
//! ```

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod listener;
pub mod receiver;
pub mod scheduler;

pub use config::DispatcherConfig;
pub use dispatcher::Dispatcher;
pub use error::{DispatchError, Result};
pub use listener::{
    listener_fn, BadDataEvent, BadDataListener, MessageEvent, MessageListener, PacketEvent,
    PacketListener,
};
pub use receiver::Receiver;
pub use scheduler::{Scheduler, SchedulerHandle};
