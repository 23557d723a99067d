//! TEI collation parsing for the CBGM engine.
//!
//! Reads a TEI-style XML apparatus -- a witness list under the header and
//! `app` elements carrying `rdg`/`witDetail` readings, an optional
//! connectivity feature, and an optional per-passage `graph` with the
//! editor's local stemma -- and produces a `cbgm_core` [`Apparatus`].
//!
//! Normalization applied while reading (all optional): merging split
//! attestations, collapsing trivial reading types, dropping defective
//! reading types, and stripping witness-siglum suffixes down to declared
//! base witnesses.
//!
//! ```rust,ignore
//! use cbgm_parser::{parse_collation, ParseOptions};
//!
//! let apparatus = parse_collation(&xml, &ParseOptions::default())?;
//! ```
//!
//! [`Apparatus`]: cbgm_core::Apparatus

pub mod dom;
pub mod error;
pub mod tei;

pub use error::Error;
pub use tei::{base_siglum, parse_collation, ParseOptions};
