//! Shared fixture builders for the integration suites.

use std::collections::BTreeMap;

use cbgm_core::apparatus::Apparatus;
use cbgm_core::local_stemma::{LocalStemma, LocalStemmaEdge};
use cbgm_core::variation_unit::{Connectivity, VariationUnit};
use hashbrown::HashMap;

/// Builds a variation unit from compact literals. Witnesses absent from
/// `support` are lacunose.
pub fn unit(
    id: &str,
    readings: &[&str],
    edges: &[(&str, &str, f64)],
    support: &[(&str, &str)],
    connectivity: Connectivity,
) -> VariationUnit {
    let stemma = LocalStemma::new(
        id,
        id,
        readings.iter().map(|&r| r.to_owned()).collect(),
        edges
            .iter()
            .map(|&(prior, posterior, weight)| LocalStemmaEdge::new(prior, posterior, weight))
            .collect(),
        &HashMap::new(),
    )
    .expect("fixture stemma is well-formed");
    let support: BTreeMap<String, String> = support
        .iter()
        .map(|&(w, r)| (w.to_owned(), r.to_owned()))
        .collect();
    VariationUnit::new(
        id,
        id,
        readings.iter().map(|&r| r.to_owned()).collect(),
        support,
        connectivity,
        stemma,
    )
}

pub fn apparatus(witnesses: &[&str], units: Vec<VariationUnit>) -> Apparatus {
    Apparatus::new(witnesses.iter().map(|&w| w.to_owned()).collect(), units)
}
