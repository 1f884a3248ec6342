//! Small shared helpers.

pub(crate) mod buffer;

use std::sync::atomic::{AtomicUsize, Ordering};

// -------------------------------------------------------------------------------------------------

/// Generates a unique usize number, by simply counting atomically upwards from 1.
pub(crate) fn unique_usize_id() -> usize {
    static ID_COUNTER: AtomicUsize = AtomicUsize::new(1);
    ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

// -------------------------------------------------------------------------------------------------
