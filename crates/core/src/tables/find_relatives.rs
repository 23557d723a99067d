//! Relatives of a witness at a single variation unit.
//!
//! The same rows as the comparison table, extended with each secondary
//! witness's reading at the passage and filterable to an attestation.

use std::collections::BTreeSet;

use crate::error::Error;
use crate::tables::compare_witnesses::assign_directions_and_ranks;
use crate::tables::CompareWitnessesRow;
use crate::variation_unit::{Connectivity, VariationUnit};
use crate::witness::Witness;

/// A comparison row plus the secondary witness's reading at the passage
/// (`None` when it is lacunose there).
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct FindRelativesRow {
    pub rdg: Option<String>,
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub comparison: CompareWitnessesRow,
}

#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct FindRelativesTable {
    /// Primary witness ID.
    pub id: String,
    /// Variation unit label.
    pub label: String,
    pub connectivity: Connectivity,
    pub primary_extant: u64,
    /// The primary witness's reading at the passage.
    pub primary_rdg: Option<String>,
    pub rows: Vec<FindRelativesRow>,
}

impl FindRelativesTable {
    /// Builds the relatives table for `wit` at `vu`. When `filter_rdgs`
    /// is given, only rows attesting one of those readings are kept.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownWitness`] if a comparison is missing.
    pub fn build(
        wit: &Witness,
        vu: &VariationUnit,
        list_wit: &[String],
        filter_rdgs: Option<&BTreeSet<String>>,
    ) -> Result<Self, Error> {
        let mut primary_extant = 0u64;
        let mut rows: Vec<FindRelativesRow> = Vec::with_capacity(list_wit.len());
        for secondary in list_wit {
            let comp = wit.comparison_for(secondary)?;
            if secondary == wit.id() {
                primary_extant = comp.extant.len();
                continue;
            }
            let pass = comp.extant.len();
            let eq = comp.agreements.len();
            #[allow(clippy::cast_precision_loss)]
            let perc = if pass > 0 {
                100.0 * eq as f64 / pass as f64
            } else {
                0.0
            };
            rows.push(FindRelativesRow {
                rdg: vu.reading_for(secondary).map(str::to_owned),
                comparison: CompareWitnessesRow {
                    id: secondary.clone(),
                    dir: 0,
                    nr: 0,
                    pass,
                    eq,
                    perc,
                    prior: comp.prior.len(),
                    posterior: comp.posterior.len(),
                    norel: comp.norel.len(),
                    uncl: comp.unclear.len(),
                    expl: comp.explained.len(),
                    cost: None,
                },
            });
        }
        rows.sort_by_key(|row| core::cmp::Reverse(row.comparison.eq));
        assign_directions_and_ranks(wit, rows.iter_mut().map(|row| &mut row.comparison))?;
        if let Some(filter) = filter_rdgs {
            rows.retain(|row| {
                row.rdg
                    .as_ref()
                    .map_or(false, |rdg| filter.contains(rdg))
            });
        }
        Ok(Self {
            id: wit.id().to_owned(),
            label: vu.label().to_owned(),
            connectivity: vu.connectivity(),
            primary_extant,
            primary_rdg: vu.reading_for(wit.id()).map(str::to_owned),
            rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use hashbrown::HashMap as HbMap;

    use super::*;
    use crate::apparatus::Apparatus;
    use crate::comparison::RelationMode;
    use crate::local_stemma::{LocalStemma, LocalStemmaEdge};
    use crate::witness::build_witnesses;

    fn apparatus() -> Apparatus {
        let stemma = LocalStemma::new(
            "u0",
            "u0",
            vec!["a".into(), "b".into()],
            vec![LocalStemmaEdge::new("a", "b", 1.0)],
            &HbMap::new(),
        )
        .unwrap();
        let mut support: BTreeMap<String, String> = BTreeMap::new();
        support.insert("A".into(), "a".into());
        support.insert("B".into(), "b".into());
        support.insert("C".into(), "b".into());
        let vu = crate::variation_unit::VariationUnit::new(
            "u0",
            "u0",
            vec!["a".into(), "b".into()],
            support,
            Connectivity::Limited(5),
            stemma,
        );
        Apparatus::new(vec!["A".into(), "B".into(), "C".into(), "D".into()], vec![vu])
    }

    #[test]
    fn rows_carry_readings_and_lacunae() {
        let app = apparatus();
        let witnesses = build_witnesses(&app, RelationMode::Open).unwrap();
        let b = witnesses.iter().find(|w| w.id() == "B").unwrap();
        let table =
            FindRelativesTable::build(b, &app.units()[0], app.list_wit(), None).unwrap();
        assert_eq!(table.primary_rdg.as_deref(), Some("b"));
        let row = |id: &str| table.rows.iter().find(|r| r.comparison.id == id).unwrap();
        assert_eq!(row("A").rdg.as_deref(), Some("a"));
        assert_eq!(row("C").rdg.as_deref(), Some("b"));
        assert_eq!(row("D").rdg, None);
    }

    #[test]
    fn reading_filter_drops_other_attestations() {
        let app = apparatus();
        let witnesses = build_witnesses(&app, RelationMode::Open).unwrap();
        let b = witnesses.iter().find(|w| w.id() == "B").unwrap();
        let filter: BTreeSet<String> = ["b".to_owned()].into_iter().collect();
        let table =
            FindRelativesTable::build(b, &app.units()[0], app.list_wit(), Some(&filter))
                .unwrap();
        let ids: Vec<&str> = table.rows.iter().map(|r| r.comparison.id.as_str()).collect();
        assert_eq!(ids, ["C"]);
    }
}
