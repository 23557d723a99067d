use core::fmt::{self, Display, Formatter};

use ::derive_more::From;

/// Error raised while reading or writing the genealogical cache.
#[derive(Debug, From)]
pub enum Error {
    /// Underlying SQLite failure.
    Sqlite(rusqlite::Error),
    /// The stored data does not deserialize back into valid entities.
    Corruption { detail: String },
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "cache database failure: {err}"),
            Self::Corruption { detail } => write!(f, "cache corruption: {detail}"),
        }
    }
}

impl std::error::Error for Error {}
