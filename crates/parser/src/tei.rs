//! TEI collation parsing: witnesses, variation units, and local stemmata.

use std::collections::{BTreeMap, BTreeSet};

use cbgm_core::apparatus::Apparatus;
use cbgm_core::local_stemma::{LocalStemma, LocalStemmaEdge};
use cbgm_core::variation_unit::{Connectivity, VariationUnit};
use hashbrown::{HashMap, HashSet};

use crate::dom::{self, Element};
use crate::error::Error;

/// Attribute precedence for identifiers across TEI dialects.
const ID_ATTRS: &[&str] = &["xml:id", "id", "n"];

/// Collation normalization options.
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Connect split attestations of the same text with zero-weight edges.
    pub merge_splits: bool,
    /// Reading types whose readings collapse onto their parents (their
    /// incoming edges become zero-weight).
    pub trivial_reading_types: BTreeSet<String>,
    /// Reading types whose readings are discarded; their witnesses count
    /// as lacunose.
    pub dropped_reading_types: BTreeSet<String>,
    /// Suffixes stripped from witness sigla until a declared base witness
    /// is matched.
    pub ignored_suffixes: Vec<String>,
}

/// Parses a TEI collation document into an [`Apparatus`].
///
/// # Errors
///
/// Returns [`Error::InvalidInput`] on malformed XML, a missing witness
/// list, or missing/bad attributes, and [`Error::Stemma`] if a local
/// stemma is structurally invalid.
pub fn parse_collation(xml: &str, options: &ParseOptions) -> Result<Apparatus, Error> {
    let root = dom::parse(xml)?;

    let list_wit_element = root
        .descend(&["teiHeader", "fileDesc", "sourceDesc", "listWit"])
        .ok_or_else(|| Error::InvalidInput {
            detail: "collation has no teiHeader/fileDesc/sourceDesc/listWit".to_owned(),
        })?;
    let mut list_wit: Vec<String> = Vec::new();
    for witness in list_wit_element.children_named("witness") {
        let id = witness
            .first_attr(ID_ATTRS)
            .ok_or_else(|| Error::InvalidInput {
                detail: "witness without identifier in listWit".to_owned(),
            })?;
        list_wit.push(id.to_owned());
    }
    if list_wit.is_empty() {
        return Err(Error::InvalidInput {
            detail: "listWit declares no witnesses".to_owned(),
        });
    }
    let base_sigla: HashSet<&str> = list_wit.iter().map(String::as_str).collect();

    let mut units = Vec::new();
    for app in root.descendants_named("app") {
        units.push(parse_variation_unit(app, options, &base_sigla)?);
    }
    drop(base_sigla);
    tracing::debug!(
        witnesses = list_wit.len(),
        units = units.len(),
        "parsed collation"
    );
    Ok(Apparatus::new(list_wit, units))
}

fn parse_variation_unit(
    app: &Element,
    options: &ParseOptions,
    base_sigla: &HashSet<&str>,
) -> Result<VariationUnit, Error> {
    let mut id = app
        .first_attr(ID_ATTRS)
        .ok_or_else(|| Error::InvalidInput {
            detail: "app element without identifier".to_owned(),
        })?
        .to_owned();
    // Collation-editor output carries verse-relative unit bounds.
    if let (Some(from), Some(to)) = (app.attr("from"), app.attr("to")) {
        if from == to {
            id.push_str(&format!("U{from}"));
        } else {
            id.push_str(&format!("U{from}-{to}"));
        }
    }
    let label = app
        .descend(&["note", "label"])
        .map(|label| label.text.trim().to_owned())
        .filter(|label| !label.is_empty())
        .unwrap_or_else(|| id.clone());

    let mut readings: Vec<String> = Vec::new();
    let mut support: BTreeMap<String, String> = BTreeMap::new();
    let mut types_by_reading: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut text_by_reading: BTreeMap<String, String> = BTreeMap::new();
    let mut reading_by_text: BTreeMap<String, String> = BTreeMap::new();
    let mut dropped_readings: BTreeSet<String> = BTreeSet::new();

    for rdg in app
        .children
        .iter()
        .filter(|child| child.name == "rdg" || child.name == "witDetail")
    {
        let rdg_id = rdg
            .first_attr(ID_ATTRS)
            .ok_or_else(|| Error::InvalidInput {
                detail: format!("reading without identifier in app {id}"),
            })?
            .to_owned();
        let rdg_types: BTreeSet<String> = rdg
            .attr("type")
            .map(|types| types.split_whitespace().map(str::to_owned).collect())
            .unwrap_or_default();
        if rdg_types
            .iter()
            .any(|t| options.dropped_reading_types.contains(t))
        {
            dropped_readings.insert(rdg_id);
            continue;
        }
        let rdg_text = rdg.text.trim().to_owned();
        if let Some(wits) = rdg.attr("wit") {
            for siglum in wits.split_whitespace() {
                if let Some(base) =
                    base_siglum(siglum, &options.ignored_suffixes, base_sigla)
                {
                    support.insert(base, rdg_id.clone());
                }
            }
        }
        // Non-split readings claim their surface text for split matching.
        if !rdg_types.contains("split") {
            reading_by_text
                .entry(rdg_text.clone())
                .or_insert_with(|| rdg_id.clone());
        }
        text_by_reading.insert(rdg_id.clone(), rdg_text);
        types_by_reading.insert(rdg_id.clone(), rdg_types);
        readings.push(rdg_id);
    }

    // Split attestations of an existing reading's text link back to it.
    let mut split_pairs: Vec<(String, String)> = Vec::new();
    if options.merge_splits {
        for (rdg_id, rdg_types) in &types_by_reading {
            if !rdg_types.contains("split") {
                continue;
            }
            let Some(text) = text_by_reading.get(rdg_id) else {
                continue;
            };
            if let Some(canonical) = reading_by_text.get(text) {
                if canonical != rdg_id {
                    split_pairs.push((rdg_id.clone(), canonical.clone()));
                }
            }
        }
    }

    // A reading is trivial when all of its remaining types are trivial.
    let mut trivial_readings: BTreeSet<String> = BTreeSet::new();
    for (rdg_id, rdg_types) in &types_by_reading {
        let mut rest = rdg_types.clone();
        rest.remove("split");
        if !rest.is_empty()
            && rest
                .iter()
                .all(|t| options.trivial_reading_types.contains(t))
        {
            trivial_readings.insert(rdg_id.clone());
        }
    }

    let connectivity = parse_connectivity(app, &id)?;
    let stemma = parse_local_stemma(
        app,
        &id,
        &label,
        &readings,
        &split_pairs,
        &trivial_readings,
        &dropped_readings,
    )?;

    Ok(VariationUnit::new(
        id,
        label,
        readings,
        support,
        connectivity,
        stemma,
    ))
}

fn parse_connectivity(app: &Element, unit_id: &str) -> Result<Connectivity, Error> {
    let Some(fs) = app.descend(&["note", "fs"]) else {
        return Ok(Connectivity::Absolute);
    };
    for feature in fs.children_named("f") {
        if feature.attr("name") != Some("connectivity") {
            continue;
        }
        let Some(numeric) = feature.child("numeric") else {
            continue;
        };
        let Some(value) = numeric.attr("value") else {
            continue;
        };
        let parsed: i64 = value.parse().map_err(|_| Error::InvalidInput {
            detail: format!("bad connectivity value {value:?} in app {unit_id}"),
        })?;
        if parsed > 0 {
            let bounded = u32::try_from(parsed).map_err(|_| Error::InvalidInput {
                detail: format!("connectivity {parsed} out of range in app {unit_id}"),
            })?;
            return Ok(Connectivity::Limited(bounded));
        }
        return Ok(Connectivity::Absolute);
    }
    Ok(Connectivity::Absolute)
}

fn parse_local_stemma(
    app: &Element,
    unit_id: &str,
    label: &str,
    readings: &[String],
    split_pairs: &[(String, String)],
    trivial_readings: &BTreeSet<String>,
    dropped_readings: &BTreeSet<String>,
) -> Result<LocalStemma, Error> {
    let Some(graph) = app.descend(&["note", "graph"]) else {
        // No editorial stemma: the readings stand unrelated.
        return Ok(LocalStemma::new(
            unit_id,
            label,
            readings.to_vec(),
            Vec::new(),
            &HashMap::new(),
        )?);
    };

    let mut vertices: Vec<String> = Vec::new();
    for node in graph.children_named("node") {
        let vertex = node
            .first_attr(ID_ATTRS)
            .ok_or_else(|| Error::InvalidInput {
                detail: format!("graph node without identifier in app {unit_id}"),
            })?
            .to_owned();
        if !dropped_readings.contains(&vertex) {
            vertices.push(vertex);
        }
    }

    let mut edges: Vec<LocalStemmaEdge> = Vec::new();
    for arc in graph.children_named("arc") {
        let from = arc.attr("from").ok_or_else(|| Error::InvalidInput {
            detail: format!("arc without \"from\" in app {unit_id}"),
        })?;
        let to = arc.attr("to").ok_or_else(|| Error::InvalidInput {
            detail: format!("arc without \"to\" in app {unit_id}"),
        })?;
        if dropped_readings.contains(from) || dropped_readings.contains(to) {
            continue;
        }
        let mut weight = match arc.attr("weight") {
            Some(value) => value.parse().map_err(|_| Error::InvalidInput {
                detail: format!("bad arc weight {value:?} in app {unit_id}"),
            })?,
            None => 1.0,
        };
        if weight < 0.0 {
            return Err(Error::InvalidInput {
                detail: format!("negative arc weight in app {unit_id}"),
            });
        }
        // Derivation into a trivial reading is not a substantive change.
        if trivial_readings.contains(to) {
            weight = 0.0;
        }
        edges.push(LocalStemmaEdge::new(from, to, weight));
    }
    for (split, canonical) in split_pairs {
        edges.push(LocalStemmaEdge::new(split.clone(), canonical.clone(), 0.0));
        edges.push(LocalStemmaEdge::new(canonical.clone(), split.clone(), 0.0));
    }

    Ok(LocalStemma::new(
        unit_id,
        label,
        vertices,
        edges,
        &HashMap::new(),
    )?)
}

/// Resolves a witness siglum to a declared base witness, stripping the
/// leading `#` and then ignored suffixes until a base witness matches.
/// The first match wins; a siglum that never matches is dropped.
#[must_use]
pub fn base_siglum(
    siglum: &str,
    ignored_suffixes: &[String],
    base_sigla: &HashSet<&str>,
) -> Option<String> {
    let mut current = siglum.strip_prefix('#').unwrap_or(siglum).to_owned();
    if base_sigla.contains(current.as_str()) {
        return Some(current);
    }
    loop {
        let mut stripped = false;
        for suffix in ignored_suffixes {
            if !suffix.is_empty() && current.ends_with(suffix.as_str()) {
                current.truncate(current.len() - suffix.len());
                stripped = true;
                break;
            }
        }
        if !stripped {
            return None;
        }
        if base_sigla.contains(current.as_str()) {
            return Some(current);
        }
    }
}
