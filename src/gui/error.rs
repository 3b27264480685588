use std::{error::Error, fmt::Display};

/// Errors raised while driving the terminal.
#[derive(Debug)]
pub enum GuiError {
    /// The terminal could not be set up, drawn to, or restored.
    IOError(std::io::Error),
    /// There are no serial devices to choose from.
    NoPorts,
}

impl Display for GuiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GuiError::IOError(e) => write!(f, "terminal error: {}", e),
            GuiError::NoPorts => write!(f, "no serial devices found"),
        }
    }
}

impl Error for GuiError {}

impl From<std::io::Error> for GuiError {
    fn from(value: std::io::Error) -> Self {
        Self::IOError(value)
    }
}
