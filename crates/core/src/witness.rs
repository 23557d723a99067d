//! A witness and its genealogical relationships to every other witness.
//!
//! A witness is initialized in two phases. Construction computes its
//! comparison with every witness in the apparatus (itself included; the
//! self-comparison carries the witness's extant set) and ranks its
//! potential ancestors: all witnesses sorted by agreement count, keeping
//! those genealogically prior to it. Substemma ancestors are attached
//! later, once the set-cover solver has been run.

use std::time::Instant;

use hashbrown::HashMap;
use rayon::prelude::*;
use roaring::RoaringBitmap;

use crate::apparatus::Apparatus;
use crate::comparison::{compare, GenealogicalComparison, RelationMode};
use crate::error::Error;
use crate::set_cover::{SetCoverOutcome, SetCoverRow, SetCoverSolver};

#[derive(Debug, Clone)]
pub struct Witness {
    id: String,
    /// Comparisons in apparatus witness order.
    comparisons: Vec<GenealogicalComparison>,
    index_by_secondary: HashMap<String, usize>,
    potential_ancestors: Vec<String>,
    substemma_ancestors: Vec<String>,
}

impl Witness {
    /// Builds the witness by comparing it against every witness listed in
    /// the apparatus.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownWitness`] if `id` is not in the apparatus,
    /// or propagates reading-lookup failures from the local stemmata.
    pub fn generate(id: &str, app: &Apparatus, mode: RelationMode) -> Result<Self, Error> {
        let comparisons = app
            .list_wit()
            .iter()
            .map(|other| compare(app, id, other, mode))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_comparisons(id, comparisons))
    }

    /// Assembles a witness from pre-computed comparisons, ordered by
    /// secondary witness as the apparatus lists them.
    #[must_use]
    pub fn from_comparisons(id: &str, comparisons: Vec<GenealogicalComparison>) -> Self {
        let index_by_secondary = comparisons
            .iter()
            .enumerate()
            .map(|(i, comp)| (comp.secondary.clone(), i))
            .collect();
        let potential_ancestors = rank_potential_ancestors(id, &comparisons);
        Self {
            id: id.to_owned(),
            comparisons,
            index_by_secondary,
            potential_ancestors,
            substemma_ancestors: Vec::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// All comparisons, in apparatus witness order.
    #[must_use]
    pub fn comparisons(&self) -> &[GenealogicalComparison] {
        &self.comparisons
    }

    /// The comparison against the given secondary witness.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownWitness`] if no comparison exists for it.
    pub fn comparison_for(&self, other: &str) -> Result<&GenealogicalComparison, Error> {
        self.index_by_secondary
            .get(other)
            .map(|&i| &self.comparisons[i])
            .ok_or_else(|| Error::UnknownWitness {
                witness: other.to_owned(),
            })
    }

    /// Passages at which this witness is extant.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownWitness`] if the self-comparison is missing
    /// (a witness loaded from a partial comparison list).
    pub fn extant(&self) -> Result<&RoaringBitmap, Error> {
        self.comparison_for(&self.id).map(|comp| &comp.extant)
    }

    /// Potential ancestor IDs, best agreement first.
    #[must_use]
    pub fn potential_ancestors(&self) -> &[String] {
        &self.potential_ancestors
    }

    /// Solves for this witness's optimal substemmata.
    ///
    /// With `fixed_ub`, every solution within the bound is enumerated;
    /// otherwise all minimum-cost solutions are returned. An infeasible
    /// cover comes back as an empty solution list with the uncovered
    /// passages in the outcome.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownWitness`] if the self-comparison is missing.
    pub fn substemmata(
        &self,
        fixed_ub: Option<f64>,
        deadline: Option<Instant>,
    ) -> Result<SetCoverOutcome, Error> {
        let target = self.extant()?.clone();
        let mut rows: Vec<SetCoverRow> = self
            .potential_ancestors
            .iter()
            .map(|ancestor| {
                let comp = self.comparison_for(ancestor)?;
                Ok(SetCoverRow {
                    id: ancestor.clone(),
                    covered: comp.explained.clone(),
                    agreements: comp.agreements.clone(),
                    cost: comp.cost,
                })
            })
            .collect::<Result<_, Error>>()?;
        rows.sort_by(|r1, r2| {
            r1.cost
                .partial_cmp(&r2.cost)
                .unwrap_or(core::cmp::Ordering::Equal)
                .then_with(|| r2.agreements.len().cmp(&r1.agreements.len()))
        });
        tracing::debug!(
            witness = %self.id,
            rows = rows.len(),
            target = target.len(),
            "solving substemma set cover"
        );
        Ok(SetCoverSolver::new(&rows, target, fixed_ub, deadline).solve())
    }

    /// Records the chosen substemma after optimization.
    pub fn set_substemma_ancestors(&mut self, ancestors: Vec<String>) {
        self.substemma_ancestors = ancestors;
    }

    #[must_use]
    pub fn substemma_ancestors(&self) -> &[String] {
        &self.substemma_ancestors
    }
}

/// Witnesses sorted by agreement count (stable over the apparatus order),
/// keeping those whose readings are on balance prior to the primary's.
fn rank_potential_ancestors(id: &str, comparisons: &[GenealogicalComparison]) -> Vec<String> {
    let mut ranked: Vec<&GenealogicalComparison> = comparisons.iter().collect();
    ranked.sort_by_key(|comp| core::cmp::Reverse(comp.agreements.len()));
    ranked
        .into_iter()
        .filter(|comp| comp.secondary != id && comp.posterior.len() > comp.prior.len())
        .map(|comp| comp.secondary.clone())
        .collect()
}

/// Builds every witness of the apparatus.
///
/// Comparisons are independent and share only the immutable apparatus, so
/// the outer loop fans out across a worker pool.
///
/// # Errors
///
/// Propagates the first comparison failure.
pub fn build_witnesses(app: &Apparatus, mode: RelationMode) -> Result<Vec<Witness>, Error> {
    tracing::debug!(
        witnesses = app.list_wit().len(),
        passages = app.passage_count(),
        ?mode,
        "computing genealogical comparisons"
    );
    app.list_wit()
        .par_iter()
        .map(|id| Witness::generate(id, app, mode))
        .collect()
}
