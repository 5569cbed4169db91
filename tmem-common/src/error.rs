//! # Error Taxonomy
//!
//! One error enum shared by every tmem crate, so a backend's failure and a
//! request-plane failure compose without per-crate conversions.

/// Result alias used throughout the tmem workspace.
pub type TmemResult<T> = Result<T, TmemError>;

/// The complete set of ways a tmem operation can fail.
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum TmemError {
    /// Key has no entry in the store or backend.
    #[error("key not found")]
    NotFound,

    /// Allocation of an entry, key buffer, or value buffer failed.
    #[error("allocation failed")]
    OutOfMemory,

    /// The store's capacity ceiling (`POOL_BYTES`) would be exceeded by a
    /// non-updating insert.
    #[error("capacity exhausted")]
    CapacityExhausted,

    /// A supplied value exceeds the handle's scratch buffer (`TMEM_MAX`).
    #[error("value exceeds maximum transfer size")]
    Overflow,

    /// Copy-in or copy-out of a request failed before the backend was
    /// invoked; the caller may retry without side effects.
    #[error("transient abort, caller may retry")]
    TransientAbort,

    /// The request-plane lock is already held by another in-flight call.
    #[error("request plane busy")]
    Busy,

    /// The opaque transport used by the remote backend failed.
    #[error("transport error")]
    TransportError,

    /// An ioctl-style command code or argument combination is not valid.
    #[error("invalid command")]
    InvalidCommand,

    /// A supplied key exceeds `KEY_MAX`.
    #[error("key exceeds maximum size")]
    KeyTooLong,
}

impl TmemError {
    /// Coerces a remote transport failure into the request plane's own
    /// vocabulary. Per the control-plane contract, the caller never sees
    /// `TransportError` directly — it surfaces as `TransientAbort`.
    pub fn at_request_plane(self) -> TmemError {
        match self {
            TmemError::TransportError => TmemError::TransientAbort,
            other => other,
        }
    }
}
