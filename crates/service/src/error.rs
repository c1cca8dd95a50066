use thiserror::Error;

use stockroom_core::DomainError;

#[derive(Debug, Error)]
pub enum StockroomError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// A thread panicked while holding the stockroom lock.
    #[error("stockroom state lock poisoned")]
    Poisoned,
}

impl StockroomError {
    /// Whether the caller can correct the input and try again.
    pub fn is_recoverable(&self) -> bool {
        match self {
            StockroomError::Domain(err) => err.is_recoverable(),
            StockroomError::Poisoned => false,
        }
    }
}
