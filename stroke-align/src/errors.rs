//! Error definitions.
use std::error::Error;
use std::{fmt, result};

/// A specialized Result type for this library.
pub type Result<T, E = StrokeAlignError> = result::Result<T, E>;

/// Errors in this library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrokeAlignError {
    /// Contains [`InputError`].
    Input(InputError),
    /// Contains [`UnknownStrokeError`].
    UnknownStroke(UnknownStrokeError),
}

impl fmt::Display for StrokeAlignError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Input(e) => e.fmt(f),
            Self::UnknownStroke(e) => e.fmt(f),
        }
    }
}

impl Error for StrokeAlignError {}

impl StrokeAlignError {
    pub(crate) const fn input(msg: String) -> Self {
        Self::Input(InputError { msg })
    }
}

impl From<UnknownStrokeError> for StrokeAlignError {
    fn from(e: UnknownStrokeError) -> Self {
        Self::UnknownStroke(e)
    }
}

/// Error used when a taxonomy definition is invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputError {
    msg: String,
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "InputError: {}", self.msg)
    }
}

/// Error used when a stroke code is absent from the taxonomy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStrokeError {
    code: String,
    position: usize,
}

impl UnknownStrokeError {
    pub(crate) fn new(code: &str, position: usize) -> Self {
        Self {
            code: code.to_string(),
            position,
        }
    }

    /// Gets the offending stroke code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Gets the position of the code in its sequence.
    pub const fn position(&self) -> usize {
        self.position
    }
}

impl fmt::Display for UnknownStrokeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "UnknownStrokeError: {:?} at position {} is not in the taxonomy",
            self.code, self.position
        )
    }
}

impl Error for UnknownStrokeError {}
