//! Error types for the reactive core.
//!
//! Every variant describes a usage error in the calling code. None of them
//! model an expected runtime condition, so the only recovery is fixing the
//! call site.

/// Errors raised by the runtime, the destroyable graph and the DAG.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A cache was read through a runtime that did not create it.
    #[error("invalid cache handle: {label} does not belong to this runtime")]
    InvalidCacheHandle {
        /// Debug label of the offending cache.
        label: String,
    },

    /// The ownership graph of an object was changed after its destruction began.
    #[error("cannot {action} on {object}: it is already being destroyed")]
    AlreadyDestroying {
        /// The attempted operation.
        action: &'static str,
        /// Debug label of the dying object.
        object: String,
    },

    /// A destructor was unregistered from an object it was never registered on.
    #[error("attempted to unregister a destructor from {object} that was never registered")]
    UnregisteredDestructor {
        /// Debug label of the object.
        object: String,
    },

    /// A tracking frame was committed with no frame active.
    #[error("attempted to commit a tracking frame, but no frame was active")]
    CommitWithoutBegin,

    /// An embedder hook was needed before any global context was installed.
    #[error("global context was not set before {operation}")]
    GlobalContextNotSet {
        /// The operation that needed the hook.
        operation: &'static str,
    },

    /// The global context was installed a second time.
    #[error("global context has already been set for this runtime")]
    GlobalContextSetTwice,

    /// Adding an edge would close a cycle.
    #[error("cycle detected: {path}")]
    DagCycleDetected {
        /// The reconstructed path, `w <- ... <- w`.
        path: String,
    },

    /// A DAG key was empty.
    #[error("argument `key` is required ({context})")]
    DagMissingKey {
        /// Which argument carried the empty key.
        context: &'static str,
    },

    /// The destroyable test harness was misused, or objects leaked.
    #[error("{reason}{}", format_leaked(.leaked))]
    UnbalancedDestroyableTestSession {
        /// What went wrong.
        reason: String,
        /// Labels of every object that was not destroyed.
        leaked: Vec<String>,
    },

    /// Runtime configuration could not be parsed.
    #[error("invalid runtime configuration: {0}")]
    InvalidConfig(#[from] serde_json::Error),
}

fn format_leaked(leaked: &[String]) -> String {
    if leaked.is_empty() {
        String::new()
    } else {
        format!(":\n\n\t{}", leaked.join("\n\t"))
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
