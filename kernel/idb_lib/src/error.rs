//! Errors reported by database operations.
//!
//! Only conditions a caller can reasonably react to are errors. Broken
//! invariants (walking a checked-out ID, a payload that does not match its
//! type code) are programmer errors and assert in debug builds.

use idb_ir::{IdCode, IdHandle};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdError {
    /// The handle does not resolve to a live ID of this database.
    #[error("stale or foreign ID handle {0:?}")]
    StaleHandle(IdHandle),

    /// No descriptor is registered for this type code.
    #[error("no ID type registered for code `{0}`")]
    UnknownType(IdCode),

    /// The type does not support copying.
    #[error("IDs of type `{0}` cannot be copied")]
    CopyUnsupported(IdCode),

    /// The type cannot be linked from or made local to a library.
    #[error("IDs of type `{0}` cannot be linked")]
    NotLinkable(IdCode),

    /// The operation is not allowed on linked data.
    #[error("`{0}` is linked data and cannot be modified")]
    LinkedData(String),

    /// The payload does not have the Rust type the descriptor expects.
    #[error("payload of `{name}` is not a {expected}")]
    PayloadMismatch { name: String, expected: &'static str },

    /// Conflicting copy flags.
    #[error("invalid copy flags: {0}")]
    InvalidFlags(&'static str),

    /// A memfile record could not be encoded or decoded.
    #[error("memfile encoding failed: {0}")]
    Encoding(#[from] bincode::Error),

    /// A memfile is structurally inconsistent.
    #[error("corrupt memfile: {0}")]
    CorruptMemFile(String),
}
