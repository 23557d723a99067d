//! Pairwise genealogical comparison of witnesses.
//!
//! For an ordered pair of witnesses, every passage at which both are
//! extant is classified by the relationship of their readings in that
//! passage's local stemma. The classification lands in seven bitmaps over
//! passage indices, plus a scalar cost measuring how much textual change
//! separates the pair.
//!
//! Two costing regimes exist. The classic regime counts one unit per
//! disagreeing passage and accepts a reading as explained only when it is
//! equivalent or directly prior. The open regime (the default) accepts any
//! prior reading as an explanation and accumulates the weight of the
//! derivation path as the cost.

use roaring::RoaringBitmap;

use crate::apparatus::Apparatus;
use crate::error::Error;

/// Costing and explanation regime, fixed when comparisons are built.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RelationMode {
    /// Equivalent-or-directly-prior readings explain; unit cost per
    /// disagreement.
    Classic,
    /// Any prior reading explains; cost is the derivation path weight.
    #[default]
    Open,
}

/// The genealogical relationship of an ordered witness pair.
///
/// All bitmaps share the apparatus's passage-index universe. `agreements`,
/// `prior`, `posterior`, `norel`, and `unclear` partition `extant` (with
/// `prior`/`posterior` overlapping only where the local stemma is cyclic),
/// and `agreements ⊆ explained ⊆ extant`.
#[derive(Debug, Clone, PartialEq)]
pub struct GenealogicalComparison {
    /// The witness being explained.
    pub primary: String,
    /// The witness doing the explaining.
    pub secondary: String,
    /// Passages where both witnesses are extant.
    pub extant: RoaringBitmap,
    /// Passages where the readings are trivially equivalent.
    pub agreements: RoaringBitmap,
    /// Passages where the primary witness's reading is prior.
    pub prior: RoaringBitmap,
    /// Passages where the primary witness's reading is posterior.
    pub posterior: RoaringBitmap,
    /// Passages with no directed path but a common ancestor.
    pub norel: RoaringBitmap,
    /// Passages with no directed path and no common ancestor.
    pub unclear: RoaringBitmap,
    /// Passages where the secondary witness's reading explains the primary's.
    pub explained: RoaringBitmap,
    /// Total genealogical cost of deriving the primary from the secondary.
    pub cost: f64,
}

impl GenealogicalComparison {
    fn empty(primary: &str, secondary: &str) -> Self {
        Self {
            primary: primary.to_owned(),
            secondary: secondary.to_owned(),
            extant: RoaringBitmap::new(),
            agreements: RoaringBitmap::new(),
            prior: RoaringBitmap::new(),
            posterior: RoaringBitmap::new(),
            norel: RoaringBitmap::new(),
            unclear: RoaringBitmap::new(),
            explained: RoaringBitmap::new(),
            cost: 0.0,
        }
    }

    /// Sign of `|posterior| - |prior|`: +1 when the secondary witness is a
    /// potential ancestor of the primary, -1 when the reverse holds.
    #[must_use]
    pub fn direction(&self) -> i8 {
        let posterior = self.posterior.len();
        let prior = self.prior.len();
        match posterior.cmp(&prior) {
            core::cmp::Ordering::Greater => 1,
            core::cmp::Ordering::Less => -1,
            core::cmp::Ordering::Equal => 0,
        }
    }
}

/// Compares `primary` against `secondary` over every passage of the
/// apparatus.
///
/// The self-comparison of a witness yields its extant set in `extant`,
/// `agreements`, and `explained`, and a cost of zero.
///
/// # Errors
///
/// Returns [`Error::UnknownWitness`] if either ID is not in the apparatus,
/// or [`Error::UnknownReading`] if a support entry names a reading absent
/// from its local stemma.
pub fn compare(
    app: &Apparatus,
    primary: &str,
    secondary: &str,
    mode: RelationMode,
) -> Result<GenealogicalComparison, Error> {
    if !app.contains_witness(primary) {
        return Err(Error::UnknownWitness {
            witness: primary.to_owned(),
        });
    }
    if !app.contains_witness(secondary) {
        return Err(Error::UnknownWitness {
            witness: secondary.to_owned(),
        });
    }

    let mut comp = GenealogicalComparison::empty(primary, secondary);
    for (index, vu) in app.units().iter().enumerate() {
        // Two lacunae are not an agreement: skip unless both are extant.
        let (Some(r1), Some(r2)) = (vu.reading_for(primary), vu.reading_for(secondary)) else {
            continue;
        };
        let index = u32::try_from(index).expect("passage index fits in u32");
        comp.extant.insert(index);

        let stemma = vu.stemma();
        if stemma.trivially_equal(r1, r2)? {
            comp.agreements.insert(index);
            comp.explained.insert(index);
            continue;
        }
        // Local stemmata may be cyclic, so probe both directions.
        let forward = stemma.path(r1, r2)?;
        let backward = stemma.path(r2, r1)?;
        if forward.is_some() || backward.is_some() {
            if forward.is_some() {
                comp.prior.insert(index);
            }
            if let Some(path) = backward {
                comp.posterior.insert(index);
                match mode {
                    RelationMode::Classic => {
                        if path.cardinality <= 1 {
                            comp.explained.insert(index);
                        }
                    }
                    RelationMode::Open => {
                        comp.explained.insert(index);
                        comp.cost += path.weight;
                    }
                }
            }
        } else if stemma.common_ancestor_exists(r1, r2)? {
            comp.norel.insert(index);
        } else {
            comp.unclear.insert(index);
        }
        if mode == RelationMode::Classic {
            comp.cost += 1.0;
        }
    }
    Ok(comp)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use hashbrown::HashMap;

    use super::*;
    use crate::local_stemma::{LocalStemma, LocalStemmaEdge};
    use crate::variation_unit::{Connectivity, VariationUnit};

    /// One unit over a -> b -> c -> d with unit weights.
    fn chain_apparatus(support: &[(&str, &str)]) -> Apparatus {
        let stemma = LocalStemma::new(
            "u1",
            "U1",
            vec!["a".into(), "b".into(), "c".into(), "d".into()],
            vec![
                LocalStemmaEdge::new("a", "b", 1.0),
                LocalStemmaEdge::new("b", "c", 1.0),
                LocalStemmaEdge::new("c", "d", 1.0),
            ],
            &HashMap::new(),
        )
        .unwrap();
        let support: BTreeMap<String, String> = support
            .iter()
            .map(|&(w, r)| (w.to_owned(), r.to_owned()))
            .collect();
        let vu = VariationUnit::new(
            "u1",
            "U1",
            vec!["a".into(), "b".into(), "c".into(), "d".into()],
            support,
            Connectivity::Absolute,
            stemma,
        );
        let wits = ["A", "B", "C", "D", "E"]
            .iter()
            .map(|&w| w.to_owned())
            .collect();
        Apparatus::new(wits, vec![vu])
    }

    #[test]
    fn posterior_reading_costs_path_weight() {
        let app = chain_apparatus(&[("A", "a"), ("B", "b")]);
        let comp = compare(&app, "B", "A", RelationMode::Open).unwrap();
        assert!(comp.posterior.contains(0));
        assert!(comp.prior.is_empty());
        assert!(comp.explained.contains(0));
        assert_eq!(comp.cost, 1.0);
    }

    #[test]
    fn prior_reading_costs_nothing_in_open_mode() {
        let app = chain_apparatus(&[("A", "a"), ("B", "b")]);
        let comp = compare(&app, "A", "B", RelationMode::Open).unwrap();
        assert!(comp.prior.contains(0));
        assert!(comp.posterior.is_empty());
        assert!(comp.explained.is_empty());
        assert_eq!(comp.cost, 0.0);
    }

    #[test]
    fn classic_mode_rejects_long_explanations() {
        // Primary reads d, secondary reads a: d descends from a through a
        // three-edge path.
        let app = chain_apparatus(&[("A", "a"), ("D", "d")]);
        let classic = compare(&app, "D", "A", RelationMode::Classic).unwrap();
        assert!(classic.posterior.contains(0));
        assert!(!classic.explained.contains(0));
        assert_eq!(classic.cost, 1.0);

        let open = compare(&app, "D", "A", RelationMode::Open).unwrap();
        assert!(open.explained.contains(0));
        assert_eq!(open.cost, 3.0);
    }

    #[test]
    fn classic_mode_accepts_direct_parent() {
        let app = chain_apparatus(&[("A", "a"), ("B", "b")]);
        let comp = compare(&app, "B", "A", RelationMode::Classic).unwrap();
        assert!(comp.explained.contains(0));
        assert_eq!(comp.cost, 1.0);
    }

    #[test]
    fn siblings_have_no_directed_relation() {
        // c and d both derive from b but not from each other.
        let stemma = LocalStemma::new(
            "u1",
            "U1",
            vec!["a".into(), "b".into(), "c".into(), "d".into()],
            vec![
                LocalStemmaEdge::new("a", "b", 1.0),
                LocalStemmaEdge::new("b", "c", 1.0),
                LocalStemmaEdge::new("b", "d", 1.0),
            ],
            &HashMap::new(),
        )
        .unwrap();
        let support: BTreeMap<String, String> = [("C", "c"), ("D", "d")]
            .iter()
            .map(|&(w, r)| (w.to_owned(), r.to_owned()))
            .collect();
        let vu = VariationUnit::new(
            "u1",
            "U1",
            vec!["a".into(), "b".into(), "c".into(), "d".into()],
            support,
            Connectivity::Absolute,
            stemma,
        );
        let app = Apparatus::new(vec!["C".into(), "D".into()], vec![vu]);
        let comp = compare(&app, "C", "D", RelationMode::Open).unwrap();
        assert!(comp.norel.contains(0));
        assert!(comp.prior.is_empty());
        assert!(comp.posterior.is_empty());
    }

    #[test]
    fn lacuna_is_skipped() {
        let app = chain_apparatus(&[("A", "a")]);
        let comp = compare(&app, "A", "E", RelationMode::Open).unwrap();
        assert!(comp.extant.is_empty());
        assert_eq!(comp.cost, 0.0);
    }

    #[test]
    fn self_comparison_agrees_everywhere() {
        let app = chain_apparatus(&[("A", "a"), ("B", "b")]);
        let comp = compare(&app, "A", "A", RelationMode::Open).unwrap();
        assert_eq!(comp.extant, comp.agreements);
        assert_eq!(comp.extant, comp.explained);
        assert_eq!(comp.cost, 0.0);
    }

    #[test]
    fn unknown_witness_is_reported() {
        let app = chain_apparatus(&[("A", "a")]);
        assert!(matches!(
            compare(&app, "A", "Z", RelationMode::Open),
            Err(Error::UnknownWitness { .. })
        ));
    }
}
