//! Error definitions.
use std::error::Error;
use std::time::Duration;
use std::{fmt, result};

/// A specialized Result type for this library.
pub type Result<T, E = SimsearchError> = result::Result<T, E>;

/// Errors in this library.
#[derive(Debug, Clone, PartialEq)]
pub enum SimsearchError {
    /// Contains [`InputError`].
    Input(InputError),
    /// Contains [`NotFoundError`].
    NotFound(NotFoundError),
    /// Contains [`DataIntegrityError`].
    DataIntegrity(DataIntegrityError),
    /// Contains [`TimeoutError`].
    Timeout(TimeoutError),
    /// Contains [`StoreError`].
    Store(StoreError),
}

impl fmt::Display for SimsearchError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Input(e) => e.fmt(f),
            Self::NotFound(e) => e.fmt(f),
            Self::DataIntegrity(e) => e.fmt(f),
            Self::Timeout(e) => e.fmt(f),
            Self::Store(e) => e.fmt(f),
        }
    }
}

impl Error for SimsearchError {}

impl From<StoreError> for SimsearchError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl SimsearchError {
    pub(crate) const fn input(msg: &'static str) -> Self {
        Self::Input(InputError { msg })
    }

    pub(crate) fn not_found(glyph: &str) -> Self {
        Self::NotFound(NotFoundError {
            glyph: glyph.to_string(),
        })
    }

    pub(crate) fn data_integrity<M>(glyph: &str, msg: M) -> Self
    where
        M: fmt::Display,
    {
        Self::DataIntegrity(DataIntegrityError {
            glyph: glyph.to_string(),
            msg: msg.to_string(),
        })
    }

    pub(crate) const fn timeout(budget: Duration) -> Self {
        Self::Timeout(TimeoutError { budget })
    }
}

/// Error used when the input argument is invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputError {
    msg: &'static str,
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "InputError: {}", self.msg)
    }
}

/// Error used when a glyph identifier is unknown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotFoundError {
    glyph: String,
}

impl NotFoundError {
    /// Gets the unknown identifier.
    pub fn glyph(&self) -> &str {
        &self.glyph
    }
}

impl fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "NotFoundError: no glyph {:?}", self.glyph)
    }
}

/// Error used when the stroke data of a glyph cannot be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataIntegrityError {
    glyph: String,
    msg: String,
}

impl DataIntegrityError {
    /// Gets the identifier of the offending glyph.
    pub fn glyph(&self) -> &str {
        &self.glyph
    }
}

impl fmt::Display for DataIntegrityError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "DataIntegrityError: glyph {:?}: {}", self.glyph, self.msg)
    }
}

/// Error used when a query exceeds its time budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeoutError {
    budget: Duration,
}

impl fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "TimeoutError: not completed within {} ms",
            self.budget.as_millis()
        )
    }
}

/// Error used when a glyph repository or a model store cannot be accessed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreError {
    msg: String,
}

impl StoreError {
    /// Creates an instance.
    pub fn new<M>(msg: M) -> Self
    where
        M: fmt::Display,
    {
        Self {
            msg: msg.to_string(),
        }
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "StoreError: {}", self.msg)
    }
}

impl Error for StoreError {}
