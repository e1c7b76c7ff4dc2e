use thiserror::Error;

#[derive(Debug, Error)]
pub enum ObligationError {
    #[error("obligation not found: {0}")]
    NotFound(String),
    #[error("obligation {0} is not currently leasable")]
    NotLeasable(String),
    #[error("lease on obligation {0} was claimed by another worker")]
    LeaseConflict(String),
    #[error("caller does not hold the lease on obligation {0}")]
    NotLeaseHolder(String),
    #[error("obligation {0} is already in a terminal state")]
    AlreadyTerminal(String),
    #[error(transparent)]
    Storage(#[from] kernel_core::KernelError),
}
