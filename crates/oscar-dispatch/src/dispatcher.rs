//! Packet dispatcher
//!
//! Routes decoded packets to `(selector, listener)` registrations. Messages
//! are delivered synchronously, in registration order. Bundles are
//! unwrapped depth-first; a bundle whose time tag lies in the future is
//! handed to the [`Scheduler`] and dispatched on its timer thread once the
//! wall clock reaches the tag.

use crate::config::DispatcherConfig;
use crate::error::Result;
use crate::listener::{
    BadDataEvent, BadDataListener, MessageEvent, MessageListener, PacketEvent, PacketListener,
};
use crate::scheduler::{Scheduler, SchedulerHandle};
use oscar_core::{
    Bundle, Message, MessageSelector, Packet, Selector, Serializer, TimeTag, TypeRegistry,
};
use parking_lot::RwLock;
use std::borrow::Cow;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, error, trace, warn};

struct Registration {
    selector: Selector,
    listener: Arc<dyn MessageListener>,
}

/// Immutable snapshot of the registration list
#[derive(Default)]
struct Registrations {
    entries: Vec<Arc<Registration>>,
    info_required: bool,
}

impl Registrations {
    fn from_entries(entries: Vec<Arc<Registration>>) -> Self {
        let info_required = entries.iter().any(|r| r.selector.is_info_required());
        Self {
            entries,
            info_required,
        }
    }
}

struct DispatchCore {
    config: DispatcherConfig,
    serializer: Serializer,
    registrations: RwLock<Arc<Registrations>>,
    bad_data_listeners: RwLock<Arc<Vec<Arc<dyn BadDataListener>>>>,
    scheduler: SchedulerHandle,
}

/// Dispatches packets to registered message listeners.
///
/// Registration changes are copy-on-write: a dispatch in progress keeps the
/// snapshot it started with, and listeners are never called under a lock.
pub struct Dispatcher {
    core: Arc<DispatchCore>,
    // Dropped after `core`; discards bundles that have not fired yet
    scheduler: Scheduler,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::with_config(DispatcherConfig::default())
    }

    pub fn with_config(config: DispatcherConfig) -> Self {
        Self::with_registry(config, Arc::new(TypeRegistry::standard()))
    }

    /// Create a dispatcher whose type-tag materialization uses `registry`.
    ///
    /// Use the registry the parser was built with when custom argument
    /// types are in play.
    pub fn with_registry(config: DispatcherConfig, registry: Arc<TypeRegistry>) -> Self {
        let scheduler = Scheduler::new(config.scheduler_thread_name.clone());
        let core = Arc::new(DispatchCore {
            config,
            serializer: Serializer::new(registry),
            registrations: RwLock::new(Arc::new(Registrations::default())),
            bad_data_listeners: RwLock::new(Arc::new(Vec::new())),
            scheduler: scheduler.handle(),
        });
        Self { core, scheduler }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.core.config
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Register `listener` for messages matching `selector`.
    ///
    /// Registering the same pair twice delivers each matching message twice.
    pub fn add_listener(&self, selector: impl Into<Selector>, listener: Arc<dyn MessageListener>) {
        let selector = selector.into();
        debug!("Adding listener for {:?}", selector);

        let mut registrations = self.core.registrations.write();
        let mut entries = registrations.entries.clone();
        entries.push(Arc::new(Registration { selector, listener }));
        *registrations = Arc::new(Registrations::from_entries(entries));
    }

    /// Remove the first registration of `listener` under an equal selector.
    ///
    /// Returns `false` if no such registration exists.
    pub fn remove_listener(&self, selector: &Selector, listener: &Arc<dyn MessageListener>) -> bool {
        let mut registrations = self.core.registrations.write();
        let position = registrations
            .entries
            .iter()
            .position(|r| &r.selector == selector && Arc::ptr_eq(&r.listener, listener));

        match position {
            Some(index) => {
                let mut entries = registrations.entries.clone();
                entries.remove(index);
                *registrations = Arc::new(Registrations::from_entries(entries));
                debug!("Removed listener for {:?}", selector);
                true
            }
            None => false,
        }
    }

    pub fn listener_count(&self) -> usize {
        self.core.registrations.read().entries.len()
    }

    /// Whether any registered selector inspects type tags
    pub fn is_info_required(&self) -> bool {
        self.core.registrations.read().info_required
    }

    pub fn add_bad_data_listener(&self, listener: Arc<dyn BadDataListener>) {
        let mut listeners = self.core.bad_data_listeners.write();
        let mut updated = listeners.as_ref().clone();
        updated.push(listener);
        *listeners = Arc::new(updated);
    }

    pub fn remove_bad_data_listener(&self, listener: &Arc<dyn BadDataListener>) -> bool {
        let mut listeners = self.core.bad_data_listeners.write();
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

    // ========================================================================
    // Dispatch
    // ========================================================================

    /// Dispatch a packet with no known source
    pub fn dispatch(&self, packet: &Packet) -> Result<()> {
        self.dispatch_from(packet, None)
    }

    /// Dispatch a packet received from `source`.
    ///
    /// Messages and due bundles are delivered before this returns. Future
    /// bundles are queued; the only error is a failure to start the
    /// scheduler thread.
    pub fn dispatch_from(&self, packet: &Packet, source: Option<SocketAddr>) -> Result<()> {
        dispatch_packet(&self.core, packet, TimeTag::IMMEDIATE, source)
    }

    /// Deliver a parse failure to the bad-data listeners
    pub fn dispatch_bad_data(&self, event: &BadDataEvent) {
        let listeners = self.core.bad_data_listeners.read().clone();
        if listeners.is_empty() {
            trace!("No bad-data listeners for {}", event.error);
        }
        for listener in listeners.iter() {
            listener.bad_data_received(event);
        }
    }

    /// Number of deferred bundles not yet dispatched
    pub fn pending_bundles(&self) -> usize {
        self.scheduler.pending()
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.core.config)
            .field("listeners", &self.listener_count())
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

impl PacketListener for Dispatcher {
    fn handle_packet(&self, event: &PacketEvent) {
        if let Err(e) = self.dispatch_from(&event.packet, event.source) {
            warn!("Dispatch error: {}", e);
        }
    }

    fn handle_bad_data(&self, event: &BadDataEvent) {
        self.dispatch_bad_data(event);
    }
}

// ============================================================================
// Internals
// ============================================================================

fn dispatch_packet(
    core: &Arc<DispatchCore>,
    packet: &Packet,
    time: TimeTag,
    source: Option<SocketAddr>,
) -> Result<()> {
    match packet {
        Packet::Message(message) => {
            dispatch_message(core, message, time, source);
            Ok(())
        }
        Packet::Bundle(bundle) => dispatch_bundle(core, bundle, source),
    }
}

fn dispatch_bundle(
    core: &Arc<DispatchCore>,
    bundle: &Bundle,
    source: Option<SocketAddr>,
) -> Result<()> {
    match bundle_delay(core, bundle) {
        None => dispatch_bundle_now(core, bundle, source),
        Some(delay) => defer_bundle(core, bundle, delay, source),
    }
}

/// How long `bundle` must wait, `None` if it is due
fn bundle_delay(core: &DispatchCore, bundle: &Bundle) -> Option<Duration> {
    if core.config.always_dispatch_immediately || bundle.timetag.is_immediate() {
        return None;
    }
    let delay = bundle.timetag.delay_from(SystemTime::now());
    if delay.is_none() {
        trace!("Bundle {} is due, dispatching now", bundle.timetag);
    }
    delay
}

fn defer_bundle(
    core: &Arc<DispatchCore>,
    bundle: &Bundle,
    delay: Duration,
    source: Option<SocketAddr>,
) -> Result<()> {
    debug!(
        "Deferring bundle {} ({} elements) by {:?}",
        bundle.timetag,
        bundle.elements.len(),
        delay
    );
    let task_core = core.clone();
    let bundle = bundle.clone();
    core.scheduler.schedule_after(delay, move || {
        if let Err(e) = dispatch_bundle_now(&task_core, &bundle, source) {
            error!("Deferred dispatch of bundle {} failed: {}", bundle.timetag, e);
        }
    })?;
    Ok(())
}

/// Deliver the contents of a due bundle depth-first.
///
/// Walks nested bundles with an explicit stack, so nesting depth is bounded
/// by memory rather than by the thread's stack.
fn dispatch_bundle_now(
    core: &Arc<DispatchCore>,
    bundle: &Bundle,
    source: Option<SocketAddr>,
) -> Result<()> {
    let mut stack = vec![(bundle.timetag, bundle.elements.iter())];
    while let Some((time, elements)) = stack.last_mut() {
        let time = *time;
        match elements.next() {
            None => {
                stack.pop();
            }
            Some(Packet::Message(message)) => dispatch_message(core, message, time, source),
            Some(Packet::Bundle(nested)) => match bundle_delay(core, nested) {
                None => stack.push((nested.timetag, nested.elements.iter())),
                Some(delay) => defer_bundle(core, nested, delay, source)?,
            },
        }
    }
    Ok(())
}

fn dispatch_message(
    core: &DispatchCore,
    message: &Message,
    time: TimeTag,
    source: Option<SocketAddr>,
) {
    let registrations = core.registrations.read().clone();
    if registrations.entries.is_empty() {
        return;
    }

    let message = if registrations.info_required {
        ensure_info(&core.serializer, message)
    } else {
        Cow::Borrowed(message)
    };

    let event = MessageEvent {
        source,
        time,
        message: &message,
    };
    for registration in &registrations.entries {
        if registration.selector.matches(&message) {
            registration.listener.accept_message(&event);
        }
    }
}

/// Attach type tags to a message that was built in memory rather than
/// parsed, so type-tag selectors see what the wire would carry.
fn ensure_info<'a>(serializer: &Serializer, message: &'a Message) -> Cow<'a, Message> {
    if message.info().is_some() {
        return Cow::Borrowed(message);
    }
    match serializer.message_info(message) {
        Ok(info) => Cow::Owned(message.clone().with_info(info)),
        Err(e) => {
            // Selectors fall back to the tags derived from the arguments
            debug!("Cannot materialize type tags for {}: {}", message.address, e);
            Cow::Borrowed(message)
        }
    }
}
