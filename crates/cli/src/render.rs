//! Table serialization: fixed-width, CSV, TSV, and JSON.
//!
//! Percentages and costs print to three decimals in the textual formats;
//! JSON carries the raw numbers.

use std::io::{self, Write};

use cbgm_core::tables::{
    CompareWitnessesRow, CompareWitnessesTable, EnumerateRelationshipsTable, FindRelativesTable,
    OptimizeSubstemmataTable,
};
use cbgm_core::variation_unit::Connectivity;

use crate::{OutputFormat, RelationType};

const COMPARE_HEADERS: &[&str] = &[
    "ID", "DIR", "NR", "PASS", "EQ", "PERC", "PRIOR", "POSTERIOR", "NOREL", "UNCL", "EXPL",
    "COST",
];

fn dir_symbol(dir: i8) -> &'static str {
    match dir {
        1 => ">",
        -1 => "<",
        _ => "=",
    }
}

fn nr_cell(nr: i32) -> String {
    if nr > 0 {
        nr.to_string()
    } else {
        String::new()
    }
}

fn cost_cell(cost: Option<f64>) -> String {
    cost.map_or_else(String::new, |cost| format!("{cost:.3}"))
}

fn comparison_cells(row: &CompareWitnessesRow) -> Vec<String> {
    vec![
        row.id.clone(),
        dir_symbol(row.dir).to_owned(),
        nr_cell(row.nr),
        row.pass.to_string(),
        row.eq.to_string(),
        format!("{:.3}", row.perc),
        row.prior.to_string(),
        row.posterior.to_string(),
        row.norel.to_string(),
        row.uncl.to_string(),
        row.expl.to_string(),
        cost_cell(row.cost),
    ]
}

fn write_cells(
    out: &mut impl Write,
    format: OutputFormat,
    headers: &[&str],
    rows: &[Vec<String>],
) -> io::Result<()> {
    match format {
        OutputFormat::Fixed => {
            let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
            for row in rows {
                for (width, cell) in widths.iter_mut().zip(row) {
                    *width = (*width).max(cell.len());
                }
            }
            for (&width, header) in widths.iter().zip(headers) {
                write!(out, "{header:>width$}  ")?;
            }
            writeln!(out)?;
            for row in rows {
                for (&width, cell) in widths.iter().zip(row) {
                    write!(out, "{cell:>width$}  ")?;
                }
                writeln!(out)?;
            }
        }
        OutputFormat::Csv | OutputFormat::Tsv => {
            let separator = if format == OutputFormat::Csv { "," } else { "\t" };
            writeln!(out, "{}", headers.join(separator))?;
            for row in rows {
                writeln!(out, "{}", row.join(separator))?;
            }
        }
        OutputFormat::Json => unreachable!("JSON output is serialized from the table value"),
    }
    Ok(())
}

/// # Errors
///
/// Propagates write failures to the output stream.
pub fn compare_witnesses(
    out: &mut impl Write,
    table: &CompareWitnessesTable,
    format: OutputFormat,
) -> io::Result<()> {
    if format == OutputFormat::Json {
        serde_json::to_writer(&mut *out, table)?;
        writeln!(out)?;
        return Ok(());
    }
    writeln!(
        out,
        "witness {} (extant at {} passages)",
        table.id, table.primary_extant
    )?;
    let rows: Vec<Vec<String>> = table.rows.iter().map(comparison_cells).collect();
    write_cells(out, format, COMPARE_HEADERS, &rows)
}

/// # Errors
///
/// Propagates write failures to the output stream.
pub fn find_relatives(
    out: &mut impl Write,
    table: &FindRelativesTable,
    format: OutputFormat,
) -> io::Result<()> {
    if format == OutputFormat::Json {
        serde_json::to_writer(&mut *out, table)?;
        writeln!(out)?;
        return Ok(());
    }
    let connectivity = match table.connectivity {
        Connectivity::Limited(value) => value.to_string(),
        Connectivity::Absolute => "Absolute".to_owned(),
    };
    writeln!(
        out,
        "witness {} at {} (reading: {}, connectivity: {connectivity})",
        table.id,
        table.label,
        table.primary_rdg.as_deref().unwrap_or("-")
    )?;
    let headers: Vec<&str> = {
        let mut headers = COMPARE_HEADERS.to_vec();
        headers.insert(3, "RDG");
        headers
    };
    let rows: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|row| {
            let mut cells = comparison_cells(&row.comparison);
            cells.insert(3, row.rdg.clone().unwrap_or_else(|| "-".to_owned()));
            cells
        })
        .collect();
    write_cells(out, format, &headers, &rows)
}

/// # Errors
///
/// Propagates write failures to the output stream.
pub fn optimize_substemmata(
    out: &mut impl Write,
    table: &OptimizeSubstemmataTable,
    format: OutputFormat,
) -> io::Result<()> {
    if format == OutputFormat::Json {
        serde_json::to_writer(&mut *out, table)?;
        writeln!(out)?;
        return Ok(());
    }
    writeln!(out, "optimal substemmata for witness {}", table.id)?;
    if !table.uncovered.is_empty() {
        writeln!(
            out,
            "no substemma exists; unexplained passages: {}",
            table.uncovered.join(" ")
        )?;
        return Ok(());
    }
    let headers = &["ANCESTORS", "COST", "AGREEMENTS"];
    let rows: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|solution| {
            vec![
                solution.rows.join(" "),
                format!("{:.3}", solution.cost),
                solution.agreements.to_string(),
            ]
        })
        .collect();
    write_cells(out, format, headers, &rows)
}

/// # Errors
///
/// Propagates write failures to the output stream.
pub fn enumerate_relationships(
    out: &mut impl Write,
    table: &EnumerateRelationshipsTable,
    types: &[RelationType],
    format: OutputFormat,
) -> io::Result<()> {
    if format == OutputFormat::Json {
        serde_json::to_writer(&mut *out, table)?;
        writeln!(out)?;
        return Ok(());
    }
    writeln!(out, "{} vs {}", table.primary, table.secondary)?;
    let sections: &[(RelationType, &str, &Vec<String>)] = &[
        (RelationType::Extant, "extant", &table.extant),
        (RelationType::Agreements, "agreements", &table.agreements),
        (RelationType::Prior, "prior", &table.prior),
        (RelationType::Posterior, "posterior", &table.posterior),
        (RelationType::Norel, "norel", &table.norel),
        (RelationType::Unclear, "unclear", &table.unclear),
        (RelationType::Explained, "explained", &table.explained),
    ];
    let separator = match format {
        OutputFormat::Tsv => "\t",
        OutputFormat::Csv => ",",
        _ => " ",
    };
    for (relation, name, passages) in sections {
        if !types.is_empty() && !types.contains(relation) {
            continue;
        }
        writeln!(out, "{name} ({}): {}", passages.len(), passages.join(separator))?;
    }
    Ok(())
}
