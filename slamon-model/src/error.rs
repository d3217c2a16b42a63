use std::fmt::{self, Display};

/// Errors produced by model constructors and validation routines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// A caller handed in something the schedule model cannot work with:
    /// an instant without an explicit UTC offset, an empty or out of range
    /// cadence, or a product that would be required immediately.
    InvalidInput(String),
}

impl ModelError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        ModelError::InvalidInput(msg.into())
    }
}

impl Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
        }
    }
}

impl std::error::Error for ModelError {}

pub type Result<T> = std::result::Result<T, ModelError>;
