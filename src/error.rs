use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("link error: {0}")]
    Link(String),
    #[error("unknown slot index: {0}")]
    UnknownSlot(usize),
    #[error("state lock poisoned")]
    StateLock,
}
