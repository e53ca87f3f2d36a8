use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("work order #{0} not found")]
    NotFound(u32),
    #[error("invalid {field}: {value:?} is not a non-negative number")]
    InvalidAmount { field: &'static str, value: String },
    #[error("no work numbers left after #{0}")]
    WorkNumbersExhausted(u32),
    #[error("stored work data repeats work number #{0}")]
    DuplicateWorkNumber(u32),
    #[error("stored work data is unreadable: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error(transparent)]
    Storage(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TrackerError>;
