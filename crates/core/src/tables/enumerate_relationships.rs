//! Passage-by-passage relationships of one ordered witness pair.

use roaring::RoaringBitmap;

use crate::comparison::GenealogicalComparison;

#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumerateRelationshipsTable {
    pub primary: String,
    pub secondary: String,
    pub extant: Vec<String>,
    pub agreements: Vec<String>,
    pub prior: Vec<String>,
    pub posterior: Vec<String>,
    pub norel: Vec<String>,
    pub unclear: Vec<String>,
    pub explained: Vec<String>,
}

impl EnumerateRelationshipsTable {
    /// Expands a comparison's bitmaps into lists of variation unit IDs,
    /// in passage order.
    #[must_use]
    pub fn build(comp: &GenealogicalComparison, unit_ids: &[String]) -> Self {
        let names = |bits: &RoaringBitmap| -> Vec<String> {
            bits.iter()
                .map(|index| {
                    unit_ids
                        .get(index as usize)
                        .map_or_else(|| index.to_string(), Clone::clone)
                })
                .collect()
        };
        Self {
            primary: comp.primary.clone(),
            secondary: comp.secondary.clone(),
            extant: names(&comp.extant),
            agreements: names(&comp.agreements),
            prior: names(&comp.prior),
            posterior: names(&comp.posterior),
            norel: names(&comp.norel),
            unclear: names(&comp.unclear),
            explained: names(&comp.explained),
        }
    }
}
