//! Session-specific error types.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("slot {0} is not registered")]
    UnknownSlot(usize),

    #[error("slot {index} out of range (session has {total} slots)")]
    SlotOutOfRange { index: usize, total: usize },

    #[error("slot {0} is already registered")]
    DuplicateSlot(usize),
}

pub type SessionResult<T> = Result<T, SessionError>;
