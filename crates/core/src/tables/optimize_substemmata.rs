//! Optimal substemmata of a witness as a table of solver solutions.

use std::time::Instant;

use crate::apparatus::Apparatus;
use crate::error::Error;
use crate::set_cover::SetCoverSolution;
use crate::witness::Witness;

#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizeSubstemmataTable {
    /// Primary witness ID.
    pub id: String,
    /// Solutions ordered by cost, then size.
    pub rows: Vec<SetCoverSolution>,
    /// Variation unit IDs no potential ancestor explains; non-empty only
    /// when no substemma exists.
    pub uncovered: Vec<String>,
    /// Whether the solver stopped at its deadline.
    pub truncated: bool,
}

impl OptimizeSubstemmataTable {
    /// Runs the substemma optimization for `wit` and projects the outcome.
    ///
    /// With `bound`, every substemma within that cost is enumerated;
    /// otherwise only the minimum-cost substemmata are returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownWitness`] if the witness's self-comparison
    /// is missing.
    pub fn build(
        wit: &Witness,
        app: &Apparatus,
        bound: Option<f64>,
        deadline: Option<Instant>,
    ) -> Result<Self, Error> {
        let outcome = wit.substemmata(bound, deadline)?;
        let uncovered = outcome
            .uncovered
            .iter()
            .map(|index| {
                app.units()
                    .get(index as usize)
                    .map_or_else(|| index.to_string(), |vu| vu.id().to_owned())
            })
            .collect();
        Ok(Self {
            id: wit.id().to_owned(),
            rows: outcome.solutions,
            uncovered,
            truncated: outcome.truncated,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use hashbrown::HashMap as HbMap;

    use super::*;
    use crate::comparison::RelationMode;
    use crate::local_stemma::{LocalStemma, LocalStemmaEdge};
    use crate::variation_unit::{Connectivity, VariationUnit};
    use crate::witness::build_witnesses;

    fn apparatus() -> Apparatus {
        let units = (0..2)
            .map(|i| {
                let id = format!("unit-{i}");
                let stemma = LocalStemma::new(
                    id.clone(),
                    id.clone(),
                    vec!["a".into(), "b".into()],
                    vec![LocalStemmaEdge::new("a", "b", 1.0)],
                    &HbMap::new(),
                )
                .unwrap();
                let mut support: BTreeMap<String, String> = BTreeMap::new();
                support.insert("A".into(), "a".into());
                support.insert("B".into(), "b".into());
                VariationUnit::new(
                    id.clone(),
                    id,
                    vec!["a".into(), "b".into()],
                    support,
                    Connectivity::Absolute,
                    stemma,
                )
            })
            .collect();
        Apparatus::new(vec!["A".into(), "B".into()], units)
    }

    #[test]
    fn solutions_become_rows() {
        let app = apparatus();
        let witnesses = build_witnesses(&app, RelationMode::Open).unwrap();
        let b = witnesses.iter().find(|w| w.id() == "B").unwrap();
        let table = OptimizeSubstemmataTable::build(b, &app, None, None).unwrap();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].rows, ["A"]);
        assert!(table.uncovered.is_empty());
        assert!(!table.truncated);
    }

    #[test]
    fn infeasible_witness_lists_uncovered_units() {
        let app = apparatus();
        let witnesses = build_witnesses(&app, RelationMode::Open).unwrap();
        let a = witnesses.iter().find(|w| w.id() == "A").unwrap();
        let table = OptimizeSubstemmataTable::build(a, &app, None, None).unwrap();
        assert!(table.rows.is_empty());
        assert_eq!(table.uncovered, ["unit-0", "unit-1"]);
    }
}
