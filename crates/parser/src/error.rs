use core::fmt::{self, Display, Formatter};

use ::derive_more::From;

/// Error raised while parsing a TEI collation.
#[derive(Debug, From)]
pub enum Error {
    /// The XML itself is malformed or a required structure is missing.
    InvalidInput { detail: String },
    /// Low-level XML reader failure.
    Xml(quick_xml::Error),
    /// A local stemma read from the collation is structurally invalid.
    Stemma(cbgm_core::Error),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput { detail } => write!(f, "invalid collation input: {detail}"),
            Self::Xml(err) => write!(f, "XML parse failure: {err}"),
            Self::Stemma(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for Error {}
