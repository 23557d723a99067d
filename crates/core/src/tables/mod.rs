//! Pure table projections over comparison, witness, and solver output.
//!
//! Each table is a plain data structure the report renderers serialize;
//! nothing here touches an output stream.

pub mod compare_witnesses;
pub mod enumerate_relationships;
pub mod find_relatives;
pub mod optimize_substemmata;

pub use compare_witnesses::{CompareWitnessesRow, CompareWitnessesTable};
pub use enumerate_relationships::EnumerateRelationshipsTable;
pub use find_relatives::{FindRelativesRow, FindRelativesTable};
pub use optimize_substemmata::OptimizeSubstemmataTable;
