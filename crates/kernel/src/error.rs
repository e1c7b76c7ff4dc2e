use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Kernel(#[from] kernel_core::KernelError),

    #[error(transparent)]
    Obligation(#[from] kernel_obligations::ObligationError),

    #[error(transparent)]
    Tape(#[from] kernel_tape::TapeError),

    #[error(transparent)]
    Evidence(#[from] kernel_evidence::EvidenceError),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("dispatch loop is no longer accepting work")]
    DispatchClosed,
}
