//! Slot error types.

use thiserror::Error;

/// Errors returned by slot operations.
#[derive(Debug, Error)]
pub enum SlotError {
    /// A trusted caller (scheduler or execution host) broke the slot
    /// protocol. Never expected in correct operation.
    #[error("slot contract violated: {0}")]
    ContractViolation(String),

    #[error("slot not found: {0}")]
    SlotNotFound(String),

    #[error("no slot holds container: {0}")]
    ContainerNotFound(String),

    #[error("slot mailbox closed: {0}")]
    MailboxClosed(String),
}

impl SlotError {
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, SlotError::ContractViolation(_))
    }
}

pub type SlotResult<T> = Result<T, SlotError>;
