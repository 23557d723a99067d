//! DOT serialization of local stemmata, textual flow diagrams, and the
//! global stemma.

use std::io::{self, Write};

use cbgm_core::local_stemma::LocalStemma;
use cbgm_core::global_stemma::GlobalStemma;
use cbgm_core::textual_flow::{FlowType, TextualFlow, TextualFlowEdge, TextualFlowVertex};
use cbgm_core::variation_unit::Connectivity;

/// Insertion-ordered ID-to-index assignment for DOT node numbering.
#[derive(Debug, Default)]
struct IndexMap {
    ids: Vec<String>,
}

impl IndexMap {
    fn index_of(&mut self, id: &str) -> usize {
        if let Some(index) = self.ids.iter().position(|known| known == id) {
            return index;
        }
        self.ids.push(id.to_owned());
        self.ids.len() - 1
    }
}

fn escape(label: &str) -> String {
    label.replace('\\', "\\\\").replace('"', "\\\"")
}

fn connectivity_label(connectivity: Connectivity) -> String {
    match connectivity {
        Connectivity::Limited(value) => value.to_string(),
        Connectivity::Absolute => "Absolute".to_owned(),
    }
}

/// Writes a local stemma. Trivial (zero-weight) derivation edges are
/// dashed.
///
/// # Errors
///
/// Propagates write failures to the output stream.
pub fn local_stemma(out: &mut impl Write, stemma: &LocalStemma) -> io::Result<()> {
    writeln!(out, "digraph local_stemma {{")?;
    writeln!(out, "\tnode [shape=plaintext];")?;
    writeln!(
        out,
        "\tlabel [shape=box, label=\"{}\"];",
        escape(stemma.label())
    )?;
    let mut indices = IndexMap::default();
    for reading in stemma.readings() {
        let index = indices.index_of(reading);
        writeln!(out, "\t{index} [label=\"{}\"];", escape(reading))?;
    }
    for edge in stemma.edges() {
        let from = indices.index_of(&edge.prior);
        let to = indices.index_of(&edge.posterior);
        if edge.weight == 0.0 {
            writeln!(out, "\t{from} -> {to} [style=dashed];")?;
        } else {
            writeln!(out, "\t{from} -> {to};")?;
        }
    }
    writeln!(out, "}}")
}

fn edge_attributes(edge: &TextualFlowEdge, strengths: bool) -> String {
    let mut attributes: Vec<String> = Vec::new();
    // Ranks print one-based; the direct (best) rank needs no label.
    if edge.rank > 0 {
        attributes.push(format!("label=\"{}\", fontsize=10", edge.rank + 1));
    }
    match edge.flow {
        FlowType::Change => attributes.push("color=blue".to_owned()),
        FlowType::Loss => attributes.push("color=gray".to_owned()),
        FlowType::Equal | FlowType::None => attributes.push("color=black".to_owned()),
    }
    if strengths {
        let style = if edge.strength < 0.01 {
            "style=dotted"
        } else if edge.strength < 0.05 {
            "style=dashed"
        } else if edge.strength < 0.1 {
            "style=solid"
        } else {
            "style=bold"
        };
        attributes.push(style.to_owned());
    } else if edge.flow == FlowType::Loss {
        attributes.push("style=dashed".to_owned());
    }
    attributes.join(", ")
}

fn flow_vertex_line(vertex: &TextualFlowVertex, index: usize) -> String {
    match &vertex.reading {
        Some(reading) => format!(
            "\t\t{index} [label=\"{} ({})\"];",
            escape(&vertex.id),
            escape(reading)
        ),
        None => format!(
            "\t\t{index} [label=\"{}\", color=gray, style=dashed];",
            escape(&vertex.id)
        ),
    }
}

fn open_flow_graph(
    out: &mut impl Write,
    name: &str,
    label: &str,
    connectivity: Connectivity,
) -> io::Result<()> {
    writeln!(out, "digraph {name} {{")?;
    writeln!(out, "\tsubgraph cluster_legend {{")?;
    writeln!(
        out,
        "\t\tlabel [shape=plaintext, label=\"{}\\nCon = {}\"];",
        escape(label),
        connectivity_label(connectivity)
    )?;
    writeln!(out, "\t}}")?;
    writeln!(out, "\tsubgraph cluster_plot {{")?;
    writeln!(out, "\t\tstyle=invis;")?;
    writeln!(out, "\t\tnode [shape=ellipse];")
}

/// Writes the complete textual flow diagram: every witness, and its
/// primary flow edge.
///
/// # Errors
///
/// Propagates write failures to the output stream.
pub fn textual_flow(out: &mut impl Write, flow: &TextualFlow, strengths: bool) -> io::Result<()> {
    open_flow_graph(out, "textual_flow", flow.label(), flow.connectivity())?;
    let mut indices = IndexMap::default();
    for vertex in flow.vertices() {
        let index = indices.index_of(&vertex.id);
        writeln!(out, "{}", flow_vertex_line(vertex, index))?;
    }
    for edge in flow.primary_edges() {
        let ancestor = indices.index_of(&edge.ancestor);
        let descendant = indices.index_of(&edge.descendant);
        writeln!(
            out,
            "\t\t{ancestor} -> {descendant} [{}];",
            edge_attributes(edge, strengths)
        )?;
    }
    writeln!(out, "\t}}")?;
    writeln!(out, "}}")
}

/// Writes the coherence-in-attestations diagram for one reading.
///
/// # Errors
///
/// Propagates write failures to the output stream.
pub fn coherence_in_attestations(
    out: &mut impl Write,
    flow: &TextualFlow,
    reading: &str,
    strengths: bool,
) -> io::Result<()> {
    open_flow_graph(out, "textual_flow_diagram", flow.label(), flow.connectivity())?;
    let (vertices, edges) = flow.attestation_view(reading);
    let mut indices = IndexMap::default();
    for vertex in &vertices {
        let index = indices.index_of(&vertex.id);
        if vertex.reading.as_deref() == Some(reading) {
            writeln!(
                out,
                "\t\t{index} [label=\"{} ({})\"];",
                escape(&vertex.id),
                escape(reading)
            )?;
        } else {
            // A flow ancestor from outside the attestation.
            writeln!(
                out,
                "\t\t{index} [label=\"{} ({})\", color=blue, style=dashed];",
                escape(&vertex.id),
                vertex.reading.as_deref().map_or_else(String::new, escape)
            )?;
        }
    }
    for edge in edges {
        let ancestor = indices.index_of(&edge.ancestor);
        let descendant = indices.index_of(&edge.descendant);
        writeln!(
            out,
            "\t\t{ancestor} -> {descendant} [{}];",
            edge_attributes(edge, strengths)
        )?;
    }
    writeln!(out, "\t}}")?;
    writeln!(out, "}}")
}

/// Writes the coherence-in-variant-passages diagram: clusters of
/// witnesses per reading, connected by CHANGE edges only.
///
/// # Errors
///
/// Propagates write failures to the output stream.
pub fn coherence_in_variant_passages(
    out: &mut impl Write,
    flow: &TextualFlow,
    strengths: bool,
) -> io::Result<()> {
    open_flow_graph(out, "textual_flow_diagram", flow.label(), flow.connectivity())?;
    let (vertices, edges) = flow.variants_view();
    let mut indices = IndexMap::default();
    for reading in flow.readings() {
        writeln!(out, "\t\tsubgraph cluster_{} {{", sanitize(reading))?;
        writeln!(out, "\t\t\tlabeljust=\"c\";")?;
        writeln!(out, "\t\t\tlabel=\"{}\";", escape(reading))?;
        writeln!(out, "\t\t\tstyle=solid;")?;
        for vertex in vertices
            .iter()
            .filter(|v| v.reading.as_deref() == Some(reading.as_str()))
        {
            let index = indices.index_of(&vertex.id);
            writeln!(out, "\t\t\t{index} [label=\"{}\"];", escape(&vertex.id))?;
        }
        writeln!(out, "\t\t}}")?;
    }
    // Lacunose endpoints of CHANGE edges sit outside every cluster.
    for vertex in vertices.iter().filter(|v| v.reading.is_none()) {
        let index = indices.index_of(&vertex.id);
        writeln!(
            out,
            "\t\t{index} [label=\"{}\", color=gray, style=dashed];",
            escape(&vertex.id)
        )?;
    }
    for edge in edges {
        let ancestor = indices.index_of(&edge.ancestor);
        let descendant = indices.index_of(&edge.descendant);
        writeln!(
            out,
            "\t\t{ancestor} -> {descendant} [{}];",
            edge_attributes(edge, strengths)
        )?;
    }
    writeln!(out, "\t}}")?;
    writeln!(out, "}}")
}

/// Writes the global stemma. Edge thickness reflects the normalized
/// agreement weight; ambiguous edges are dashed.
///
/// # Errors
///
/// Propagates write failures to the output stream.
pub fn global_stemma(
    out: &mut impl Write,
    stemma: &GlobalStemma,
    draw_ambiguous: bool,
) -> io::Result<()> {
    writeln!(out, "digraph global_stemma {{")?;
    writeln!(out, "\tnode [shape=plaintext];")?;
    writeln!(out, "\tlabel [shape=box, label=\"Global Stemma\"];")?;
    let mut indices = IndexMap::default();
    for vertex in &stemma.vertices {
        let index = indices.index_of(&vertex.id);
        writeln!(out, "\t{index} [label=\"{}\"];", escape(&vertex.id))?;
    }
    for edge in &stemma.edges {
        if edge.ambiguous && !draw_ambiguous {
            continue;
        }
        let ancestor = indices.index_of(&edge.ancestor);
        let descendant = indices.index_of(&edge.descendant);
        let style = if edge.ambiguous { ", style=dashed" } else { "" };
        writeln!(
            out,
            "\t{ancestor} -> {descendant} [penwidth={:.3}, arrowsize={:.3}{style}];",
            edge.weight, edge.weight
        )?;
    }
    writeln!(out, "}}")
}

/// DOT cluster names admit only word characters.
fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}
