//! The apparatus: the ordered record of witnesses and variation units.
//!
//! The order of `units` defines the passage indices `0..N` used by every
//! bitmap in the crate; the order of `list_wit` fixes every witness
//! iteration downstream, so report output stays reproducible.

use hashbrown::HashMap;

use crate::error::Error;
use crate::variation_unit::VariationUnit;

#[derive(Debug, Clone)]
pub struct Apparatus {
    list_wit: Vec<String>,
    units: Vec<VariationUnit>,
    index_by_unit: HashMap<String, usize>,
}

impl Apparatus {
    #[must_use]
    pub fn new(list_wit: Vec<String>, units: Vec<VariationUnit>) -> Self {
        let index_by_unit = units
            .iter()
            .enumerate()
            .map(|(i, vu)| (vu.id().to_owned(), i))
            .collect();
        Self {
            list_wit,
            units,
            index_by_unit,
        }
    }

    /// Witness IDs in declaration order.
    #[must_use]
    pub fn list_wit(&self) -> &[String] {
        &self.list_wit
    }

    /// Variation units in passage order.
    #[must_use]
    pub fn units(&self) -> &[VariationUnit] {
        &self.units
    }

    /// Number of passages; the universe size of every passage bitmap.
    #[must_use]
    pub fn passage_count(&self) -> usize {
        self.units.len()
    }

    #[must_use]
    pub fn contains_witness(&self, witness: &str) -> bool {
        self.list_wit.iter().any(|w| w == witness)
    }

    /// The passage index assigned to the unit with the given ID.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownVariationUnit`] if no unit carries the ID.
    pub fn passage_index(&self, unit_id: &str) -> Result<usize, Error> {
        self.index_by_unit
            .get(unit_id)
            .copied()
            .ok_or_else(|| Error::UnknownVariationUnit {
                unit: unit_id.to_owned(),
            })
    }

    /// The unit with the given ID.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownVariationUnit`] if no unit carries the ID.
    pub fn unit(&self, unit_id: &str) -> Result<&VariationUnit, Error> {
        self.passage_index(unit_id).map(|i| &self.units[i])
    }

    /// Number of passages at which `witness` has a reading.
    #[must_use]
    pub fn extant_passages(&self, witness: &str) -> usize {
        self.units
            .iter()
            .filter(|vu| vu.reading_for(witness).is_some())
            .count()
    }

    /// Drops every witness extant at fewer than `threshold` passages,
    /// removing its attestations from all units. Passage indices are
    /// unaffected.
    pub fn filter_by_extant(&mut self, threshold: usize) {
        let dropped: Vec<String> = self
            .list_wit
            .iter()
            .filter(|wit| self.extant_passages(wit) < threshold)
            .cloned()
            .collect();
        if dropped.is_empty() {
            return;
        }
        tracing::debug!(
            dropped = dropped.len(),
            threshold,
            "filtering witnesses below extant-passage threshold"
        );
        self.list_wit.retain(|wit| !dropped.contains(wit));
        for unit in &mut self.units {
            for wit in &dropped {
                unit.remove_witness(wit);
            }
        }
    }
}
