//! Dispatcher error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DispatchError>;

/// Failure to dispatch a packet.
///
/// Listener failures are not errors: a panicking listener unwinds to the
/// caller of the dispatch.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// The timer runtime for deferred bundles could not be started
    #[error("scheduler error: {0}")]
    Scheduler(#[from] std::io::Error),
}
