//! Process-wide manager slot
//!
//! Passing a [`BucketManager`] to the code that needs it is the primary way
//! to share one. This slot is a convenience for code that cannot be handed
//! a manager directly; it holds at most one manager at a time.

use std::any::{Any, type_name};
use std::sync::{Mutex, PoisonError};

use crate::connector::Connector;
use crate::error::{Error, Result};
use crate::manager::BucketManager;

static SHARED: Mutex<Option<Box<dyn Any + Send + Sync>>> = Mutex::new(None);

/// Store `manager` in the slot, replacing whatever was there.
pub fn set_shared<C: Connector>(manager: &BucketManager<C>) {
    let previous = SHARED
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .replace(Box::new(manager.clone()));

    if previous.is_some() {
        tracing::debug!("Replaced shared bucket manager");
    }
}

/// The shared manager, if one was set.
///
/// Fails with [`Error::InvalidArgument`] when the stored manager uses a
/// connector other than `C`.
pub fn shared<C: Connector>() -> Result<Option<BucketManager<C>>> {
    let slot = SHARED.lock().unwrap_or_else(PoisonError::into_inner);
    let Some(stored) = slot.as_ref() else {
        return Ok(None);
    };

    stored
        .downcast_ref::<BucketManager<C>>()
        .cloned()
        .map(Some)
        .ok_or_else(|| {
            Error::invalid_argument(format!(
                "The shared bucket manager does not use connector {}",
                type_name::<C>()
            ))
        })
}

/// Empty the slot. Returns whether a manager was stored.
pub fn clear_shared() -> bool {
    SHARED
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take()
        .is_some()
}
