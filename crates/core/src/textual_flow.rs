//! Per-passage textual flow: which ancestor each witness draws its
//! reading from.
//!
//! For one variation unit, every witness is connected to the nearest
//! qualifying potential ancestor within the unit's connectivity window.
//! Ancestors are grouped into ranks by equal agreement count; the window
//! admits ranks below the connectivity bound. An extant witness with an
//! agreeing ancestor in the window gets a single EQUAL edge; otherwise
//! every ancestor in the window offering a distinct reading contributes a
//! CHANGE edge (or LOSS, when the witness itself is lacunose). Multiple
//! CHANGE/LOSS edges represent ambiguous flow.

use crate::error::Error;
use crate::variation_unit::{Connectivity, VariationUnit};
use crate::witness::Witness;

/// The kind of textual flow an edge represents.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowType {
    #[default]
    None,
    Equal,
    Change,
    Loss,
}

#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextualFlowVertex {
    pub id: String,
    /// The witness's reading here, or `None` if it is lacunose.
    pub reading: Option<String>,
}

#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct TextualFlowEdge {
    pub ancestor: String,
    pub descendant: String,
    pub flow: FlowType,
    /// Connectivity rank of the ancestor (0 = best).
    pub rank: u32,
    /// `(|posterior| - |prior|) / |extant|` of the descendant-to-ancestor
    /// comparison.
    pub strength: f64,
}

/// The textual flow diagram of one variation unit.
#[derive(Debug, Clone)]
pub struct TextualFlow {
    label: String,
    readings: Vec<String>,
    connectivity: Connectivity,
    vertices: Vec<TextualFlowVertex>,
    edges: Vec<TextualFlowEdge>,
}

/// Walks a witness's potential ancestors, yielding each with its
/// connectivity rank until the window closes.
struct RankWalk<'a> {
    witness: &'a Witness,
    ancestors: core::slice::Iter<'a, String>,
    connectivity: Connectivity,
    rank: u32,
    current_agreements: Option<u64>,
}

impl<'a> RankWalk<'a> {
    fn new(witness: &'a Witness, connectivity: Connectivity) -> Self {
        Self {
            witness,
            ancestors: witness.potential_ancestors().iter(),
            connectivity,
            rank: 0,
            current_agreements: None,
        }
    }
}

impl<'a> Iterator for RankWalk<'a> {
    type Item = Result<(&'a String, u32), Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let ancestor = self.ancestors.next()?;
        let comp = match self.witness.comparison_for(ancestor) {
            Ok(comp) => comp,
            Err(err) => return Some(Err(err)),
        };
        let agreements = comp.agreements.len();
        // The rank advances whenever the agreement count changes; ties
        // share a rank.
        match self.current_agreements {
            None => self.current_agreements = Some(agreements),
            Some(current) if current != agreements => {
                self.current_agreements = Some(agreements);
                self.rank += 1;
            }
            Some(_) => {}
        }
        if self.connectivity.admits(self.rank) {
            Some(Ok((ancestor, self.rank)))
        } else {
            None
        }
    }
}

impl TextualFlow {
    /// Builds the textual flow diagram for `vu` over all witnesses (whose
    /// potential-ancestor lists must already be populated).
    ///
    /// # Errors
    ///
    /// Propagates reading-lookup failures and missing comparisons.
    pub fn build(vu: &VariationUnit, witnesses: &[Witness]) -> Result<Self, Error> {
        let stemma = vu.stemma();
        let mut vertices = Vec::with_capacity(witnesses.len());
        let mut edges = Vec::new();

        for wit in witnesses {
            let reading = vu.reading_for(wit.id());
            vertices.push(TextualFlowVertex {
                id: wit.id().to_owned(),
                reading: reading.map(str::to_owned),
            });
            // A witness with no potential ancestors is a source.
            if wit.potential_ancestors().is_empty() {
                continue;
            }

            let mut equal_found = false;
            if let Some(wit_rdg) = reading {
                for item in RankWalk::new(wit, vu.connectivity()) {
                    let (ancestor, rank) = item?;
                    let Some(ancestor_rdg) = vu.reading_for(ancestor) else {
                        continue;
                    };
                    if stemma.trivially_equal(ancestor_rdg, wit_rdg)? {
                        edges.push(TextualFlowEdge {
                            ancestor: ancestor.clone(),
                            descendant: wit.id().to_owned(),
                            flow: FlowType::Equal,
                            rank,
                            strength: strength(wit, ancestor)?,
                        });
                        equal_found = true;
                        break;
                    }
                }
            }
            if !equal_found {
                // Lacunose witness, or no agreeing ancestor in the window:
                // every distinct ancestral reading is a possible source.
                let mut distinct_readings: Vec<&str> = Vec::new();
                for item in RankWalk::new(wit, vu.connectivity()) {
                    let (ancestor, rank) = item?;
                    let Some(ancestor_rdg) = vu.reading_for(ancestor) else {
                        continue;
                    };
                    let mut seen = false;
                    for known in &distinct_readings {
                        if stemma.trivially_equal(ancestor_rdg, known)? {
                            seen = true;
                            break;
                        }
                    }
                    if seen {
                        continue;
                    }
                    distinct_readings.push(ancestor_rdg);
                    edges.push(TextualFlowEdge {
                        ancestor: ancestor.clone(),
                        descendant: wit.id().to_owned(),
                        flow: if reading.is_some() {
                            FlowType::Change
                        } else {
                            FlowType::Loss
                        },
                        rank,
                        strength: strength(wit, ancestor)?,
                    });
                }
            }
        }

        Ok(Self {
            label: vu.label().to_owned(),
            readings: vu.readings().to_vec(),
            connectivity: vu.connectivity(),
            vertices,
            edges,
        })
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn readings(&self) -> &[String] {
        &self.readings
    }

    #[must_use]
    pub fn connectivity(&self) -> Connectivity {
        self.connectivity
    }

    #[must_use]
    pub fn vertices(&self) -> &[TextualFlowVertex] {
        &self.vertices
    }

    #[must_use]
    pub fn edges(&self) -> &[TextualFlowEdge] {
        &self.edges
    }

    /// The first edge recorded for each descendant, in edge order. This is
    /// the view drawn by the complete flow diagram; later CHANGE/LOSS
    /// edges to the same descendant represent ambiguous flow.
    #[must_use]
    pub fn primary_edges(&self) -> Vec<&TextualFlowEdge> {
        let mut drawn: Vec<&str> = Vec::new();
        let mut primary = Vec::new();
        for edge in &self.edges {
            if drawn.contains(&edge.descendant.as_str()) {
                continue;
            }
            drawn.push(&edge.descendant);
            primary.push(edge);
        }
        primary
    }

    /// Coherence in attestations: the witnesses supporting `reading`, each
    /// with its primary flow edge, plus any flow ancestors from outside
    /// the attestation.
    #[must_use]
    pub fn attestation_view(&self, reading: &str) -> (Vec<&TextualFlowVertex>, Vec<&TextualFlowEdge>) {
        let in_attestation: Vec<&str> = self
            .vertices
            .iter()
            .filter(|v| v.reading.as_deref() == Some(reading))
            .map(|v| v.id.as_str())
            .collect();
        let edges: Vec<&TextualFlowEdge> = self
            .primary_edges()
            .into_iter()
            .filter(|e| in_attestation.contains(&e.descendant.as_str()))
            .collect();
        let mut vertex_ids: Vec<&str> = in_attestation.clone();
        for edge in &edges {
            if !vertex_ids.contains(&edge.ancestor.as_str()) {
                vertex_ids.push(&edge.ancestor);
            }
        }
        let vertices = self
            .vertices
            .iter()
            .filter(|v| vertex_ids.contains(&v.id.as_str()))
            .collect();
        (vertices, edges)
    }

    /// Coherence in variant passages: only the CHANGE edges and their
    /// endpoints.
    #[must_use]
    pub fn variants_view(&self) -> (Vec<&TextualFlowVertex>, Vec<&TextualFlowEdge>) {
        let edges: Vec<&TextualFlowEdge> = self
            .edges
            .iter()
            .filter(|e| e.flow == FlowType::Change)
            .collect();
        let mut endpoint_ids: Vec<&str> = Vec::new();
        for edge in &edges {
            if !endpoint_ids.contains(&edge.ancestor.as_str()) {
                endpoint_ids.push(&edge.ancestor);
            }
            if !endpoint_ids.contains(&edge.descendant.as_str()) {
                endpoint_ids.push(&edge.descendant);
            }
        }
        let vertices = self
            .vertices
            .iter()
            .filter(|v| endpoint_ids.contains(&v.id.as_str()))
            .collect();
        (vertices, edges)
    }
}

/// Flow stability of the descendant-to-ancestor relationship.
fn strength(wit: &Witness, ancestor: &str) -> Result<f64, Error> {
    let comp = wit.comparison_for(ancestor)?;
    let extant = comp.extant.len();
    if extant == 0 {
        return Ok(0.0);
    }
    #[allow(clippy::cast_precision_loss)]
    let diff = i64::try_from(comp.posterior.len()).unwrap_or(i64::MAX)
        - i64::try_from(comp.prior.len()).unwrap_or(i64::MAX);
    #[allow(clippy::cast_precision_loss)]
    Ok(diff as f64 / extant as f64)
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

    /// A two-reading passage over x -> y (weight 1). Witnesses absent from
    /// `support` are lacunose.
    fn chain_unit(id: &str, support: &[(&str, &str)]) -> crate::variation_unit::VariationUnit {
        let stemma = LocalStemma::new(
            id,
            id,
            vec!["x".into(), "y".into()],
            vec![LocalStemmaEdge::new("x", "y", 1.0)],
            &HbMap::new(),
        )
        .unwrap();
        let support: BTreeMap<String, String> = support
            .iter()
            .map(|&(w, r)| (w.to_owned(), r.to_owned()))
            .collect();
        crate::variation_unit::VariationUnit::new(
            id,
            id,
            vec!["x".into(), "y".into()],
            support,
            Connectivity::Absolute,
            stemma,
        )
    }

    /// Apparatus engineered so that W's ranked potential ancestors are
    /// P1 (reading a at u0), P2 (reading b), P3 (reading c), with P1 and
    /// P2 tied on agreements (rank 0) and P3 strictly below them (rank 1).
    ///
    /// Agreement tallies against W: P1 at u1/u2/u4, P2 at u0/u1/u2, P3 at
    /// u1 only. P1 always reads the archetypal text, so it has no
    /// potential ancestors of its own.
    fn ranked_apparatus(connectivity: Connectivity) -> Apparatus {
        let stemma_u0 = LocalStemma::new(
            "u0",
            "u0",
            vec!["a".into(), "b".into(), "c".into()],
            vec![
                LocalStemmaEdge::new("a", "b", 1.0),
                LocalStemmaEdge::new("a", "c", 1.0),
            ],
            &HbMap::new(),
        )
        .unwrap();
        let mut support0: BTreeMap<String, String> = BTreeMap::new();
        support0.insert("W".into(), "b".into());
        support0.insert("P1".into(), "a".into());
        support0.insert("P2".into(), "b".into());
        support0.insert("P3".into(), "c".into());
        let u0 = crate::variation_unit::VariationUnit::new(
            "u0",
            "u0",
            vec!["a".into(), "b".into(), "c".into()],
            support0,
            connectivity,
            stemma_u0,
        );

        Apparatus::new(
            vec!["P1".into(), "P2".into(), "P3".into(), "W".into()],
            vec![
                u0,
                chain_unit("u1", &[("W", "x"), ("P1", "x"), ("P2", "x"), ("P3", "x")]),
                chain_unit("u2", &[("W", "x"), ("P1", "x"), ("P2", "x")]),
                chain_unit("u3", &[("W", "y"), ("P1", "x"), ("P2", "x"), ("P3", "x")]),
                chain_unit("u4", &[("W", "x"), ("P1", "x")]),
            ],
        )
    }

    #[test]
    fn equal_ancestor_within_window_wins() {
        let app = ranked_apparatus(Connectivity::Limited(2));
        let witnesses = build_witnesses(&app, RelationMode::Open).unwrap();
        let w = witnesses.iter().find(|w| w.id() == "W").unwrap();
        assert_eq!(w.potential_ancestors()[..2], ["P1", "P2"]);

        let flow = TextualFlow::build(&app.units()[0], &witnesses).unwrap();
        let w_edges: Vec<&TextualFlowEdge> = flow
            .edges()
            .iter()
            .filter(|e| e.descendant == "W")
            .collect();
        assert_eq!(w_edges.len(), 1);
        assert_eq!(w_edges[0].ancestor, "P2");
        assert_eq!(w_edges[0].flow, FlowType::Equal);
        assert_eq!(w_edges[0].rank, 0);
    }

    #[test]
    fn no_equal_ancestor_yields_change_edges_per_distinct_reading() {
        // Window of a single rank excludes P3; P1 offers the only distinct
        // reading once P2 is gone.
        let stemma = LocalStemma::new(
            "u0",
            "u0",
            vec!["a".into(), "b".into(), "c".into()],
            vec![
                LocalStemmaEdge::new("a", "b", 1.0),
                LocalStemmaEdge::new("a", "c", 1.0),
            ],
            &HbMap::new(),
        )
        .unwrap();
        let mut support: BTreeMap<String, String> = BTreeMap::new();
        support.insert("W".into(), "b".into());
        support.insert("P1".into(), "a".into());
        support.insert("P3".into(), "c".into());
        let app = {
            let ranked = ranked_apparatus(Connectivity::Limited(1));
            let mut units: Vec<_> = ranked.units().to_vec();
            units[0] = crate::variation_unit::VariationUnit::new(
                "u0",
                "u0",
                vec!["a".into(), "b".into(), "c".into()],
                support,
                Connectivity::Limited(1),
                stemma,
            );
            Apparatus::new(ranked.list_wit().to_vec(), units)
        };
        let witnesses = build_witnesses(&app, RelationMode::Open).unwrap();
        let flow = TextualFlow::build(&app.units()[0], &witnesses).unwrap();
        let w_edges: Vec<&TextualFlowEdge> = flow
            .edges()
            .iter()
            .filter(|e| e.descendant == "W")
            .collect();
        // P2 is lacunose at u0; P1 (rank 0) offers reading a as a change.
        assert_eq!(w_edges.len(), 1);
        assert_eq!(w_edges[0].ancestor, "P1");
        assert_eq!(w_edges[0].flow, FlowType::Change);
    }

    #[test]
    fn lacunose_witness_gets_loss_edges() {
        let app = {
            let ranked = ranked_apparatus(Connectivity::Limited(2));
            let mut units: Vec<_> = ranked.units().to_vec();
            let mut support = units[0].support().clone();
            support.remove("W");
            let replacement = crate::variation_unit::VariationUnit::new(
                "u0",
                "u0",
                units[0].readings().to_vec(),
                support,
                Connectivity::Limited(2),
                units[0].stemma().clone(),
            );
            units[0] = replacement;
            Apparatus::new(ranked.list_wit().to_vec(), units)
        };
        let witnesses = build_witnesses(&app, RelationMode::Open).unwrap();
        let flow = TextualFlow::build(&app.units()[0], &witnesses).unwrap();
        let w_edges: Vec<&TextualFlowEdge> = flow
            .edges()
            .iter()
            .filter(|e| e.descendant == "W")
            .collect();
        assert!(!w_edges.is_empty());
        assert!(w_edges.iter().all(|e| e.flow == FlowType::Loss));
    }

    #[test]
    fn sources_have_no_edges() {
        let app = ranked_apparatus(Connectivity::Absolute);
        let witnesses = build_witnesses(&app, RelationMode::Open).unwrap();
        let flow = TextualFlow::build(&app.units()[0], &witnesses).unwrap();
        // P1 reads the archetypal text and has no potential ancestors.
        assert!(flow.edges().iter().all(|e| e.descendant != "P1"));
    }

    #[test]
    fn variants_view_keeps_only_change_edges() {
        let app = ranked_apparatus(Connectivity::Limited(2));
        let witnesses = build_witnesses(&app, RelationMode::Open).unwrap();
        let flow = TextualFlow::build(&app.units()[0], &witnesses).unwrap();
        let (_, edges) = flow.variants_view();
        assert!(edges.iter().all(|e| e.flow == FlowType::Change));
    }
}
