//! Comparison table of one witness against all others.

use std::collections::BTreeSet;

use crate::error::Error;
use crate::witness::Witness;

/// One row: the primary witness's relationship to a secondary witness.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct CompareWitnessesRow {
    /// Secondary witness ID.
    pub id: String,
    /// Sign of `posterior - prior`: +1 when the secondary is a potential
    /// ancestor of the primary.
    pub dir: i8,
    /// Ancestral rank for `dir = +1` rows (ties share a rank), 0 for
    /// `dir = 0`, -1 for `dir = -1`.
    pub nr: i32,
    /// Passages where both witnesses are extant.
    pub pass: u64,
    /// Passages where they agree.
    pub eq: u64,
    /// `100 * eq / pass`.
    pub perc: f64,
    pub prior: u64,
    pub posterior: u64,
    pub norel: u64,
    pub uncl: u64,
    pub expl: u64,
    /// Genealogical cost, absent when the primary witness is on balance
    /// prior to the secondary (`dir = -1`).
    pub cost: Option<f64>,
}

#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct CompareWitnessesTable {
    /// Primary witness ID.
    pub id: String,
    /// Passages where the primary witness is extant.
    pub primary_extant: u64,
    /// Rows sorted by agreements, descending.
    pub rows: Vec<CompareWitnessesRow>,
}

impl CompareWitnessesTable {
    /// Builds the table for `wit`, with rows ordered by agreement count.
    /// When `filter` is given, only the named secondary witnesses are
    /// kept (ranks are assigned before filtering).
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownWitness`] if a comparison is missing.
    pub fn build(
        wit: &Witness,
        list_wit: &[String],
        filter: Option<&BTreeSet<String>>,
    ) -> Result<Self, Error> {
        let mut primary_extant = 0u64;
        let mut rows: Vec<CompareWitnessesRow> = Vec::with_capacity(list_wit.len());
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
            rows.push(CompareWitnessesRow {
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
            });
        }
        rows.sort_by_key(|row| core::cmp::Reverse(row.eq));
        assign_directions_and_ranks(wit, &mut rows)?;
        if let Some(filter) = filter {
            rows.retain(|row| filter.contains(&row.id));
        }
        Ok(Self {
            id: wit.id().to_owned(),
            primary_extant,
            rows,
        })
    }
}

/// Assigns `dir`, `nr`, and `cost` over rows pre-sorted by descending
/// agreements. The ancestral rank is one-based and advances only on a
/// strict decrease in agreements, so tied potential ancestors share it.
pub(crate) fn assign_directions_and_ranks<'a, I>(wit: &Witness, rows: I) -> Result<(), Error>
where
    I: IntoIterator<Item = &'a mut CompareWitnessesRow>,
{
    let mut nr = 0i32;
    let mut nr_value: Option<u64> = None;
    for row in rows {
        if row.posterior > row.prior {
            if nr_value.map_or(true, |value| row.eq < value) {
                nr_value = Some(row.eq);
                nr += 1;
            }
            row.dir = 1;
            row.nr = nr;
            row.cost = Some(wit.comparison_for(&row.id)?.cost);
        } else if row.posterior == row.prior {
            row.dir = 0;
            row.nr = 0;
            row.cost = Some(wit.comparison_for(&row.id)?.cost);
        } else {
            row.dir = -1;
            row.nr = -1;
            row.cost = None;
        }
    }
    Ok(())
}
