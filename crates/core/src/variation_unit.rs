//! A variation unit: one passage of the collation.
//!
//! Bundles the passage's reading list, the witness-to-reading support map,
//! the connectivity bound used by textual-flow construction, and the local
//! stemma. A witness absent from the support map is lacunose at this
//! passage.

use std::collections::BTreeMap;

use crate::local_stemma::LocalStemma;

/// Bound on how far down the potential-ancestor ranking the textual-flow
/// builder may look at a given passage.
#[cfg_attr(feature = "serde", derive(::serde::Serialize, ::serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    /// Consider only the first `n` ancestor ranks (`n >= 1`).
    Limited(u32),
    /// No bound ("absolute" connectivity).
    Absolute,
}

impl Connectivity {
    /// Whether `rank` falls inside this connectivity window.
    #[must_use]
    pub fn admits(&self, rank: u32) -> bool {
        match self {
            Self::Limited(n) => rank < *n,
            Self::Absolute => true,
        }
    }
}

/// One passage: readings, support, connectivity, and the local stemma.
#[derive(Debug, Clone)]
pub struct VariationUnit {
    id: String,
    label: String,
    readings: Vec<String>,
    support: BTreeMap<String, String>,
    connectivity: Connectivity,
    stemma: LocalStemma,
}

impl VariationUnit {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        readings: Vec<String>,
        support: BTreeMap<String, String>,
        connectivity: Connectivity,
        stemma: LocalStemma,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            readings,
            support,
            connectivity,
            stemma,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Reading IDs in apparatus order.
    #[must_use]
    pub fn readings(&self) -> &[String] {
        &self.readings
    }

    /// The reading attested by `witness`, or `None` if it is lacunose here.
    #[must_use]
    pub fn reading_for(&self, witness: &str) -> Option<&str> {
        self.support.get(witness).map(String::as_str)
    }

    /// Witness-to-reading support map (witnesses in lexicographic order).
    #[must_use]
    pub fn support(&self) -> &BTreeMap<String, String> {
        &self.support
    }

    #[must_use]
    pub fn connectivity(&self) -> Connectivity {
        self.connectivity
    }

    #[must_use]
    pub fn stemma(&self) -> &LocalStemma {
        &self.stemma
    }

    pub(crate) fn remove_witness(&mut self, witness: &str) {
        self.support.remove(witness);
    }
}
