//! Cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag checked between traversal steps and prim insertions.
///
/// Clones share the flag, so a host can keep one and hand another to the
/// exporter.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// True once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Marker returned when a run stops because of a [`CancelToken`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

pub(crate) fn check(token: Option<&CancelToken>) -> Result<(), Cancelled> {
    match token {
        Some(t) if t.is_cancelled() => Err(Cancelled),
        _ => Ok(()),
    }
}
