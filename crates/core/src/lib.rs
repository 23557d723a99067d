//! Coherence-Based Genealogical Method (CBGM) for textual criticism.
//!
//! `cbgm_core` takes a collation of manuscript witnesses -- an
//! [`Apparatus`] of variation units, each carrying a scholar-curated
//! [`LocalStemma`](local_stemma::LocalStemma) of reading derivation -- and
//! computes the genealogical machinery of the CBGM:
//!
//! 1. **Pairwise comparison** ([`comparison`]) classifies every passage of
//!    every ordered witness pair into bitmap-indexed sets (extant,
//!    agreements, prior, posterior, no-relation, unclear, explained) with
//!    a scalar genealogical cost.
//! 2. **Potential ancestors** ([`witness`]) ranks, for each witness, the
//!    witnesses whose text is on balance prior to it, by agreement count.
//! 3. **Optimal substemmata** ([`set_cover`]) finds the minimum-cost
//!    subsets of a witness's potential ancestors that explain every one of
//!    its extant readings, via branch and bound over a weighted set cover.
//! 4. **Textual flow** ([`textual_flow`]) connects each witness to the
//!    nearest qualifying ancestor at a single passage under that passage's
//!    connectivity bound.
//! 5. **Global stemma** ([`global_stemma`]) aggregates all substemmata
//!    into one witness-level directed graph.
//!
//! Report-oriented projections of these results live in [`tables`]. XML
//! parsing and the SQLite genealogical cache are separate crates
//! (`cbgm_parser`, `cbgm_cache`); this crate performs no I/O.
//!
//! # Entry points
//!
//! Build an [`Apparatus`] (by hand or through the parser crate), then
//! [`build_witnesses`] to run the comparison fan-out. Everything else is
//! derived from the resulting [`Witness`] values.
//!
//! ```rust,ignore
//! use cbgm_core::{build_witnesses, RelationMode};
//!
//! let witnesses = build_witnesses(&apparatus, RelationMode::Open)?;
//! let substemmata = witnesses[3].substemmata(None, None)?;
//! ```
//!
//! # Crate features
//!
//! - **`serde`** -- enables `Serialize`/`Deserialize` derives on the
//!   table, flow, and stemma output types.

pub mod apparatus;
pub mod comparison;
pub mod error;
pub mod global_stemma;
pub mod local_stemma;
pub mod set_cover;
pub mod tables;
pub mod textual_flow;
pub mod variation_unit;
pub mod witness;

pub use apparatus::Apparatus;
pub use comparison::{compare, GenealogicalComparison, RelationMode};
pub use error::Error;
pub use witness::{build_witnesses, Witness};
