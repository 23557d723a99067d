//! The global stemma: witness-level ancestry aggregated from every
//! witness's optimal substemma.
//!
//! Each witness with substemma ancestors contributes one edge per
//! ancestor, weighted by that ancestor's agreement count normalized
//! against the best agreement count among the witness's ancestors. When a
//! witness has several optimal substemmata and an ancestor is missing
//! from some of them, its edge is flagged ambiguous; the driver decides
//! whether to draw such edges.

use hashbrown::HashMap;

use crate::error::Error;
use crate::set_cover::SetCoverSolution;
use crate::witness::Witness;

#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalStemmaVertex {
    pub id: String,
}

#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct GlobalStemmaEdge {
    pub ancestor: String,
    pub descendant: String,
    /// Agreement count with the ancestor, normalized to the best ancestor.
    pub weight: f64,
    /// Whether the ancestor is absent from some optimal substemma.
    pub ambiguous: bool,
}

#[derive(Debug, Clone, Default)]
pub struct GlobalStemma {
    pub vertices: Vec<GlobalStemmaVertex>,
    pub edges: Vec<GlobalStemmaEdge>,
}

impl GlobalStemma {
    /// Assembles the global stemma from witnesses whose substemma
    /// ancestors have been populated.
    ///
    /// `optima` maps witness IDs to their full optimal-substemma lists and
    /// feeds the ambiguity flags; witnesses absent from it get unambiguous
    /// edges. Witnesses with no substemma ancestors (the Ausgangstext and
    /// heavily lacunose witnesses) become sources.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownWitness`] if a substemma ancestor has no
    /// comparison on its descendant.
    pub fn build(
        witnesses: &[Witness],
        optima: &HashMap<String, Vec<SetCoverSolution>>,
    ) -> Result<Self, Error> {
        let mut stemma = Self::default();
        for wit in witnesses {
            stemma.vertices.push(GlobalStemmaVertex {
                id: wit.id().to_owned(),
            });
        }
        for wit in witnesses {
            let ancestors = wit.substemma_ancestors();
            if ancestors.is_empty() {
                continue;
            }
            let mut max_agreements = 0u64;
            for ancestor in ancestors {
                let agreements = wit.comparison_for(ancestor)?.agreements.len();
                max_agreements = max_agreements.max(agreements);
            }
            let alternatives = optima.get(wit.id()).map(Vec::as_slice).unwrap_or(&[]);
            for ancestor in ancestors {
                let agreements = wit.comparison_for(ancestor)?.agreements.len();
                #[allow(clippy::cast_precision_loss)]
                let weight = if max_agreements == 0 {
                    0.0
                } else {
                    agreements as f64 / max_agreements as f64
                };
                let ambiguous = alternatives.len() > 1
                    && !alternatives
                        .iter()
                        .all(|solution| solution.rows.contains(ancestor));
                stemma.edges.push(GlobalStemmaEdge {
                    ancestor: ancestor.clone(),
                    descendant: wit.id().to_owned(),
                    weight,
                    ambiguous,
                });
            }
        }
        Ok(stemma)
    }
}

#[cfg(test)]
mod tests {
    use roaring::RoaringBitmap;

    use super::*;
    use crate::comparison::GenealogicalComparison;

    fn comparison(primary: &str, secondary: &str, agreements: u64) -> GenealogicalComparison {
        let mut agreement_bits = RoaringBitmap::new();
        let mut posterior = RoaringBitmap::new();
        for i in 0..agreements {
            agreement_bits.insert(u32::try_from(i).unwrap());
        }
        // One posterior passage keeps the secondary ranked as an ancestor.
        posterior.insert(200);
        let mut extant = agreement_bits.clone();
        extant.insert(200);
        GenealogicalComparison {
            primary: primary.to_owned(),
            secondary: secondary.to_owned(),
            extant: extant.clone(),
            agreements: agreement_bits.clone(),
            prior: RoaringBitmap::new(),
            posterior,
            norel: RoaringBitmap::new(),
            unclear: RoaringBitmap::new(),
            explained: extant,
            cost: 1.0,
        }
    }

    fn self_comparison(id: &str, extant: u64) -> GenealogicalComparison {
        let mut bits = RoaringBitmap::new();
        for i in 0..extant {
            bits.insert(u32::try_from(i).unwrap());
        }
        GenealogicalComparison {
            primary: id.to_owned(),
            secondary: id.to_owned(),
            extant: bits.clone(),
            agreements: bits.clone(),
            prior: RoaringBitmap::new(),
            posterior: RoaringBitmap::new(),
            norel: RoaringBitmap::new(),
            unclear: RoaringBitmap::new(),
            explained: bits,
            cost: 0.0,
        }
    }

    #[test]
    fn edge_weights_are_normalized_to_best_ancestor() {
        // W agrees with X at 80 passages and with Y at 100.
        let mut w = Witness::from_comparisons(
            "W",
            vec![
                self_comparison("W", 100),
                comparison("W", "X", 80),
                comparison("W", "Y", 100),
            ],
        );
        w.set_substemma_ancestors(vec!["X".to_owned(), "Y".to_owned()]);
        let x = Witness::from_comparisons("X", vec![self_comparison("X", 80)]);
        let y = Witness::from_comparisons("Y", vec![self_comparison("Y", 100)]);

        let stemma = GlobalStemma::build(&[x, y, w], &HashMap::new()).unwrap();
        assert_eq!(stemma.vertices.len(), 3);
        assert_eq!(stemma.edges.len(), 2);
        let x_edge = stemma.edges.iter().find(|e| e.ancestor == "X").unwrap();
        let y_edge = stemma.edges.iter().find(|e| e.ancestor == "Y").unwrap();
        assert!((x_edge.weight - 0.8).abs() < 1e-12);
        assert!((y_edge.weight - 1.0).abs() < 1e-12);
        assert!(!x_edge.ambiguous);
    }

    #[test]
    fn ancestors_missing_from_some_optimum_are_ambiguous() {
        let mut w = Witness::from_comparisons(
            "W",
            vec![
                self_comparison("W", 10),
                comparison("W", "X", 8),
                comparison("W", "Y", 10),
            ],
        );
        w.set_substemma_ancestors(vec!["X".to_owned(), "Y".to_owned()]);
        let mut optima = HashMap::new();
        optima.insert(
            "W".to_owned(),
            vec![
                crate::set_cover::SetCoverSolution {
                    rows: vec!["X".to_owned(), "Y".to_owned()],
                    cost: 2.0,
                    agreements: 10,
                },
                crate::set_cover::SetCoverSolution {
                    rows: vec!["Y".to_owned()],
                    cost: 2.0,
                    agreements: 10,
                },
            ],
        );
        let stemma = GlobalStemma::build(&[w], &optima).unwrap();
        let x_edge = stemma.edges.iter().find(|e| e.ancestor == "X").unwrap();
        let y_edge = stemma.edges.iter().find(|e| e.ancestor == "Y").unwrap();
        assert!(x_edge.ambiguous);
        assert!(!y_edge.ambiguous);
    }

    #[test]
    fn witnesses_without_substemma_are_sources() {
        let w = Witness::from_comparisons("W", vec![self_comparison("W", 5)]);
        let stemma = GlobalStemma::build(&[w], &HashMap::new()).unwrap();
        assert_eq!(stemma.vertices.len(), 1);
        assert!(stemma.edges.is_empty());
    }
}
