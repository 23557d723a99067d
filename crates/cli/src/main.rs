use std::collections::BTreeSet;
use std::io;
use std::path::Path;
use std::time::{Duration, Instant};
use std::{fs, process};

use cbgm_cache::Cache;
use cbgm_cli::{
    dot, json, render, App, Command, CompareArgs, FlowArgs, FlowAttestationsArgs, GraphFormat,
    GlobalStemmaArgs, LocalStemmaArgs, PopulateArgs, RelationshipsArgs, RelativesArgs,
    SubstemmataArgs,
};
use cbgm_core::comparison::RelationMode;
use cbgm_core::global_stemma::GlobalStemma;
use cbgm_core::tables::{
    CompareWitnessesTable, EnumerateRelationshipsTable, FindRelativesTable,
    OptimizeSubstemmataTable,
};
use cbgm_core::textual_flow::TextualFlow;
use cbgm_core::variation_unit::{Connectivity, VariationUnit};
use cbgm_core::witness::{build_witnesses, Witness};
use cbgm_core::Apparatus;
use cbgm_parser::{parse_collation, ParseOptions};
use clap::Parser;
use hashbrown::HashMap;

/// Driver-level failure, mapped onto the process exit code.
#[derive(Debug)]
enum CliError {
    /// Invalid inputs or missing entities: exit 1.
    Data(String),
    /// I/O failure: exit 2.
    Io(String),
}

impl CliError {
    const fn code(&self) -> i32 {
        match self {
            Self::Data(_) => 1,
            Self::Io(_) => 2,
        }
    }

    fn message(&self) -> &str {
        match self {
            Self::Data(message) | Self::Io(message) => message,
        }
    }
}

impl From<cbgm_parser::Error> for CliError {
    fn from(err: cbgm_parser::Error) -> Self {
        Self::Data(err.to_string())
    }
}

impl From<cbgm_core::Error> for CliError {
    fn from(err: cbgm_core::Error) -> Self {
        Self::Data(err.to_string())
    }
}

impl From<cbgm_cache::Error> for CliError {
    fn from(err: cbgm_cache::Error) -> Self {
        match err {
            cbgm_cache::Error::Corruption { .. } => Self::Data(err.to_string()),
            cbgm_cache::Error::Sqlite(_) => Self::Io(err.to_string()),
        }
    }
}

impl From<io::Error> for CliError {
    fn from(err: io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let app = App::parse();
    if let Err(err) = run(&app) {
        eprintln!("{}", err.message());
        process::exit(err.code());
    }
}

fn run(app: &App) -> Result<(), CliError> {
    match &app.command {
        Command::Populate(args) => populate(args),
        Command::Compare(args) => compare_witnesses(args),
        Command::Relatives(args) => find_relatives(args),
        Command::Substemmata(args) => optimize_substemmata(args),
        Command::Relationships(args) => enumerate_relationships(args),
        Command::LocalStemma(args) => print_local_stemma(args),
        Command::Flow(args) => print_textual_flow(args),
        Command::FlowAttestations(args) => print_coherence_in_attestations(args),
        Command::FlowVariants(args) => print_coherence_in_variant_passages(args),
        Command::GlobalStemma(args) => print_global_stemma(args),
    }
}

fn open_cache(path: &Path) -> Result<Cache, CliError> {
    if !path.exists() {
        return Err(CliError::Data(format!(
            "genealogical cache {} does not exist",
            path.display()
        )));
    }
    Ok(Cache::open(path)?)
}

fn require_witness(app: &Apparatus, witness: &str) -> Result<(), CliError> {
    if app.contains_witness(witness) {
        Ok(())
    } else {
        Err(CliError::Data(format!("unknown witness {witness}")))
    }
}

fn deadline_from(timeout: Option<u64>) -> Option<Instant> {
    timeout.map(|seconds| Instant::now() + Duration::from_secs(seconds))
}

fn populate(args: &PopulateArgs) -> Result<(), CliError> {
    let xml = fs::read_to_string(&args.collation)?;
    let options = ParseOptions {
        merge_splits: args.merge_splits,
        trivial_reading_types: args.trivial_reading_types.iter().cloned().collect(),
        dropped_reading_types: args.dropped_reading_types.iter().cloned().collect(),
        ignored_suffixes: args.ignored_suffixes.clone(),
    };
    let mut apparatus = parse_collation(&xml, &options)?;
    if let Some(threshold) = args.threshold {
        apparatus.filter_by_extant(threshold);
    }
    let mode = if args.classic {
        RelationMode::Classic
    } else {
        RelationMode::Open
    };
    let witnesses = build_witnesses(&apparatus, mode)?;
    let mut cache = Cache::open(&args.cache)?;
    cache.save(&apparatus, &witnesses)?;
    println!(
        "cached {} witnesses over {} passages in {}",
        apparatus.list_wit().len(),
        apparatus.passage_count(),
        args.cache.display()
    );
    Ok(())
}

fn compare_witnesses(args: &CompareArgs) -> Result<(), CliError> {
    let cache = open_cache(&args.cache)?;
    let apparatus = cache.load_apparatus()?;
    require_witness(&apparatus, &args.witness)?;
    let witness = cache.load_witness(&args.witness)?;
    let filter: Option<BTreeSet<String>> = if args.compared.is_empty() {
        None
    } else {
        for compared in &args.compared {
            require_witness(&apparatus, compared)?;
        }
        Some(args.compared.iter().cloned().collect())
    };
    let table = CompareWitnessesTable::build(&witness, apparatus.list_wit(), filter.as_ref())?;
    render::compare_witnesses(&mut io::stdout().lock(), &table, args.format)?;
    Ok(())
}

fn find_relatives(args: &RelativesArgs) -> Result<(), CliError> {
    let cache = open_cache(&args.cache)?;
    let apparatus = cache.load_apparatus()?;
    require_witness(&apparatus, &args.witness)?;
    let unit = apparatus.unit(&args.passage)?;
    let witness = cache.load_witness(&args.witness)?;
    let filter: Option<BTreeSet<String>> = if args.readings.is_empty() {
        None
    } else {
        Some(args.readings.iter().cloned().collect())
    };
    let table = FindRelativesTable::build(&witness, unit, apparatus.list_wit(), filter.as_ref())?;
    render::find_relatives(&mut io::stdout().lock(), &table, args.format)?;
    Ok(())
}

fn optimize_substemmata(args: &SubstemmataArgs) -> Result<(), CliError> {
    let cache = open_cache(&args.cache)?;
    let apparatus = cache.load_apparatus()?;
    require_witness(&apparatus, &args.witness)?;
    let witness = cache.load_witness(&args.witness)?;
    let table = OptimizeSubstemmataTable::build(
        &witness,
        &apparatus,
        args.bound,
        deadline_from(args.timeout),
    )?;
    if table.truncated {
        eprintln!(
            "warning: solver deadline reached for witness {}; results may be incomplete",
            args.witness
        );
    }
    render::optimize_substemmata(&mut io::stdout().lock(), &table, args.format)?;
    Ok(())
}

fn enumerate_relationships(args: &RelationshipsArgs) -> Result<(), CliError> {
    let cache = open_cache(&args.cache)?;
    let apparatus = cache.load_apparatus()?;
    require_witness(&apparatus, &args.primary)?;
    require_witness(&apparatus, &args.secondary)?;
    let witness = cache.load_witness(&args.primary)?;
    let comparison = witness.comparison_for(&args.secondary)?;
    let unit_ids: Vec<String> = apparatus
        .units()
        .iter()
        .map(|vu| vu.id().to_owned())
        .collect();
    let table = EnumerateRelationshipsTable::build(comparison, &unit_ids);
    render::enumerate_relationships(&mut io::stdout().lock(), &table, &args.types, args.format)?;
    Ok(())
}

fn print_local_stemma(args: &LocalStemmaArgs) -> Result<(), CliError> {
    let cache = open_cache(&args.cache)?;
    let apparatus = cache.load_apparatus()?;
    let unit = apparatus.unit(&args.passage)?;
    match args.format {
        GraphFormat::Dot => dot::local_stemma(&mut io::stdout().lock(), unit.stemma())?,
        GraphFormat::Json => json::local_stemma(&mut io::stdout().lock(), unit.stemma())?,
    }
    Ok(())
}

/// Clones a unit with its connectivity bound replaced.
fn with_connectivity(unit: &VariationUnit, connectivity: Option<u32>) -> VariationUnit {
    match connectivity {
        Some(bound) => VariationUnit::new(
            unit.id(),
            unit.label(),
            unit.readings().to_vec(),
            unit.support().clone(),
            Connectivity::Limited(bound),
            unit.stemma().clone(),
        ),
        None => unit.clone(),
    }
}

fn flow_for(
    cache: &Cache,
    passage: &str,
    connectivity: Option<u32>,
) -> Result<TextualFlow, CliError> {
    let apparatus = cache.load_apparatus()?;
    let unit = with_connectivity(apparatus.unit(passage)?, connectivity);
    let witnesses = cache.load_witnesses()?;
    Ok(TextualFlow::build(&unit, &witnesses)?)
}

fn print_textual_flow(args: &FlowArgs) -> Result<(), CliError> {
    let cache = open_cache(&args.cache)?;
    let flow = flow_for(&cache, &args.passage, args.connectivity)?;
    match args.format {
        GraphFormat::Dot => dot::textual_flow(&mut io::stdout().lock(), &flow, args.strengths)?,
        GraphFormat::Json => json::textual_flow(&mut io::stdout().lock(), &flow)?,
    }
    Ok(())
}

fn print_coherence_in_attestations(args: &FlowAttestationsArgs) -> Result<(), CliError> {
    let cache = open_cache(&args.cache)?;
    let flow = flow_for(&cache, &args.passage, args.connectivity)?;
    if !flow.readings().contains(&args.reading) {
        return Err(CliError::Data(format!(
            "unknown reading {} in variation unit {}",
            args.reading, args.passage
        )));
    }
    match args.format {
        GraphFormat::Dot => dot::coherence_in_attestations(
            &mut io::stdout().lock(),
            &flow,
            &args.reading,
            args.strengths,
        )?,
        GraphFormat::Json => {
            json::coherence_in_attestations(&mut io::stdout().lock(), &flow, &args.reading)?;
        }
    }
    Ok(())
}

fn print_coherence_in_variant_passages(args: &FlowArgs) -> Result<(), CliError> {
    let cache = open_cache(&args.cache)?;
    let flow = flow_for(&cache, &args.passage, args.connectivity)?;
    match args.format {
        GraphFormat::Dot => {
            dot::coherence_in_variant_passages(&mut io::stdout().lock(), &flow, args.strengths)?;
        }
        GraphFormat::Json => json::coherence_in_variant_passages(&mut io::stdout().lock(), &flow)?,
    }
    Ok(())
}

fn print_global_stemma(args: &GlobalStemmaArgs) -> Result<(), CliError> {
    let cache = open_cache(&args.cache)?;
    let mut witnesses: Vec<Witness> = cache.load_witnesses()?;
    let mut optima: HashMap<String, Vec<cbgm_core::set_cover::SetCoverSolution>> = HashMap::new();
    for witness in &mut witnesses {
        let outcome = witness.substemmata(args.bound, deadline_from(args.timeout))?;
        if outcome.truncated {
            eprintln!(
                "warning: solver deadline reached for witness {}; results may be incomplete",
                witness.id()
            );
        }
        if let Some(best) = outcome.solutions.first() {
            witness.set_substemma_ancestors(best.rows.clone());
        }
        optima.insert(witness.id().to_owned(), outcome.solutions);
    }
    let stemma = GlobalStemma::build(&witnesses, &optima)?;
    match args.format {
        GraphFormat::Dot => {
            dot::global_stemma(&mut io::stdout().lock(), &stemma, args.draw_ambiguous)?;
        }
        GraphFormat::Json => {
            json::global_stemma(&mut io::stdout().lock(), &stemma, args.draw_ambiguous)?;
        }
    }
    Ok(())
}
