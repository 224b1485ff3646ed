//! Leak checking for tests.
//!
//! Between [`Runtime::enable_destroyable_tracking`] and
//! [`Runtime::assert_destroyables_destroyed`] the runtime uses a fresh meta
//! store that holds strong references, so every destroyable touched during
//! the test stays observable until the assertion.

use super::meta::leaked_labels;
use crate::error::{Error, Result};
use crate::reactive::Runtime;

impl Runtime {
    /// Start tracking every destroyable touched from now on.
    pub fn enable_destroyable_tracking(&self) -> Result<()> {
        if self.inner.destroyables.borrow_mut().begin_session() {
            tracing::debug!("destroyable tracking enabled");
            Ok(())
        } else {
            Err(Error::UnbalancedDestroyableTestSession {
                reason: "attempted to start destroyable testing, but the previous session was not ended"
                    .to_owned(),
                leaked: Vec::new(),
            })
        }
    }

    /// Stop tracking and fail if any tracked destroyable was not destroyed.
    pub fn assert_destroyables_destroyed(&self) -> Result<()> {
        let session = self.inner.destroyables.borrow_mut().end_session();
        let Some(session) = session else {
            return Err(Error::UnbalancedDestroyableTestSession {
                reason: "attempted to assert destroyables destroyed, but tracking was never enabled"
                    .to_owned(),
                leaked: Vec::new(),
            });
        };

        let leaked = leaked_labels(&session);
        // Release the session's strong references with the store unborrowed.
        drop(session);

        if leaked.is_empty() {
            Ok(())
        } else {
            Err(Error::UnbalancedDestroyableTestSession {
                reason: "some destroyables were not destroyed during this test".to_owned(),
                leaked,
            })
        }
    }
}
