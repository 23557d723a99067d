//! JSON serialization of the graph outputs.
//!
//! Mirrors the DOT writers: the same vertices and edges, as plain JSON
//! objects for downstream tooling.

use std::io::{self, Write};

use cbgm_core::global_stemma::GlobalStemma;
use cbgm_core::local_stemma::LocalStemma;
use cbgm_core::textual_flow::{FlowType, TextualFlow, TextualFlowEdge, TextualFlowVertex};
use cbgm_core::variation_unit::Connectivity;
use serde_json::json;

fn connectivity_value(connectivity: Connectivity) -> serde_json::Value {
    match connectivity {
        Connectivity::Limited(value) => json!(value),
        Connectivity::Absolute => serde_json::Value::Null,
    }
}

fn flow_name(flow: FlowType) -> &'static str {
    match flow {
        FlowType::None => "none",
        FlowType::Equal => "equal",
        FlowType::Change => "change",
        FlowType::Loss => "loss",
    }
}

fn flow_vertices(vertices: &[&TextualFlowVertex]) -> Vec<serde_json::Value> {
    vertices
        .iter()
        .map(|vertex| json!({ "id": vertex.id, "rdg": vertex.reading }))
        .collect()
}

fn flow_edges(edges: &[&TextualFlowEdge]) -> Vec<serde_json::Value> {
    edges
        .iter()
        .map(|edge| {
            json!({
                "ancestor": edge.ancestor,
                "descendant": edge.descendant,
                "type": flow_name(edge.flow),
                "connectivity": edge.rank,
                "strength": edge.strength,
            })
        })
        .collect()
}

fn write_value(out: &mut impl Write, value: &serde_json::Value) -> io::Result<()> {
    serde_json::to_writer(&mut *out, value)?;
    writeln!(out)
}

/// # Errors
///
/// Propagates write failures to the output stream.
pub fn local_stemma(out: &mut impl Write, stemma: &LocalStemma) -> io::Result<()> {
    let edges: Vec<serde_json::Value> = stemma
        .edges()
        .iter()
        .map(|edge| {
            json!({
                "prior": edge.prior,
                "posterior": edge.posterior,
                "weight": edge.weight,
            })
        })
        .collect();
    write_value(
        out,
        &json!({
            "id": stemma.id(),
            "label": stemma.label(),
            "vertices": stemma.readings(),
            "edges": edges,
        }),
    )
}

/// # Errors
///
/// Propagates write failures to the output stream.
pub fn textual_flow(out: &mut impl Write, flow: &TextualFlow) -> io::Result<()> {
    let vertices: Vec<&TextualFlowVertex> = flow.vertices().iter().collect();
    let edges = flow.primary_edges();
    write_value(
        out,
        &json!({
            "label": flow.label(),
            "connectivity": connectivity_value(flow.connectivity()),
            "vertices": flow_vertices(&vertices),
            "edges": flow_edges(&edges),
        }),
    )
}

/// # Errors
///
/// Propagates write failures to the output stream.
pub fn coherence_in_attestations(
    out: &mut impl Write,
    flow: &TextualFlow,
    reading: &str,
) -> io::Result<()> {
    let (vertices, edges) = flow.attestation_view(reading);
    write_value(
        out,
        &json!({
            "label": flow.label(),
            "rdg": reading,
            "connectivity": connectivity_value(flow.connectivity()),
            "vertices": flow_vertices(&vertices),
            "edges": flow_edges(&edges),
        }),
    )
}

/// # Errors
///
/// Propagates write failures to the output stream.
pub fn coherence_in_variant_passages(out: &mut impl Write, flow: &TextualFlow) -> io::Result<()> {
    let (vertices, edges) = flow.variants_view();
    write_value(
        out,
        &json!({
            "label": flow.label(),
            "connectivity": connectivity_value(flow.connectivity()),
            "vertices": flow_vertices(&vertices),
            "edges": flow_edges(&edges),
        }),
    )
}

/// # Errors
///
/// Propagates write failures to the output stream.
pub fn global_stemma(
    out: &mut impl Write,
    stemma: &GlobalStemma,
    draw_ambiguous: bool,
) -> io::Result<()> {
    let vertices: Vec<serde_json::Value> = stemma
        .vertices
        .iter()
        .map(|vertex| json!({ "id": vertex.id }))
        .collect();
    let edges: Vec<serde_json::Value> = stemma
        .edges
        .iter()
        .filter(|edge| draw_ambiguous || !edge.ambiguous)
        .map(|edge| {
            json!({
                "ancestor": edge.ancestor,
                "descendant": edge.descendant,
                "weight": edge.weight,
                "ambiguous": edge.ambiguous,
            })
        })
        .collect();
    write_value(out, &json!({ "vertices": vertices, "edges": edges }))
}
