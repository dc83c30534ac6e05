use std::error::Error;
use std::fmt::{self, Display};

use crate::position::Position;

/// Raised when a module file can't be read or parsed: a message plus
/// an optional position, since a missing file never reaches a parsed
/// position at all.
#[derive(Debug, Clone)]
pub struct FileLoadError {
    pub message: String,
    pub position: Option<Position>,
}

impl Display for FileLoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.position {
            Some(pos) => write!(f, "{} ({pos})", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl Error for FileLoadError {}
