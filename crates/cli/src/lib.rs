//! cbgm CLI -- populate a genealogical cache and query it.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(
    name = "cbgm",
    about = "Coherence-Based Genealogical Method for textual criticism"
)]
pub struct App {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Parse a TEI collation and populate the genealogical cache
    Populate(PopulateArgs),
    /// Compare a witness against all others
    Compare(CompareArgs),
    /// List the relatives of a witness at one passage
    Relatives(RelativesArgs),
    /// Enumerate a witness's optimal substemmata
    Substemmata(SubstemmataArgs),
    /// List the passage-level relationships of a witness pair
    Relationships(RelationshipsArgs),
    /// Print a passage's local stemma as DOT or JSON
    LocalStemma(LocalStemmaArgs),
    /// Print a passage's complete textual flow diagram as DOT or JSON
    Flow(FlowArgs),
    /// Print the coherence-in-attestations diagram for one reading
    FlowAttestations(FlowAttestationsArgs),
    /// Print the coherence-in-variant-passages diagram
    FlowVariants(FlowArgs),
    /// Print the global stemma as DOT or JSON
    GlobalStemma(GlobalStemmaArgs),
}

#[derive(Debug, Parser)]
pub struct PopulateArgs {
    /// TEI collation file
    pub collation: PathBuf,
    /// Genealogical cache database to write
    pub cache: PathBuf,
    /// Drop witnesses extant at fewer than this many passages
    #[arg(long)]
    pub threshold: Option<usize>,
    /// Merge split attestations of the same reading text
    #[arg(long)]
    pub merge_splits: bool,
    /// Reading type treated as trivial (repeatable)
    #[arg(long = "trivial-reading-types")]
    pub trivial_reading_types: Vec<String>,
    /// Reading type whose attestations are dropped (repeatable)
    #[arg(long = "dropped-reading-types")]
    pub dropped_reading_types: Vec<String>,
    /// Witness siglum suffix to strip (repeatable)
    #[arg(long = "ignored-suffixes")]
    pub ignored_suffixes: Vec<String>,
    /// Use the classic explained-readings and cost calculation
    #[arg(long)]
    pub classic: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Fixed,
    Csv,
    Tsv,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GraphFormat {
    Dot,
    Json,
}

#[derive(Debug, Parser)]
pub struct CompareArgs {
    /// Genealogical cache database
    pub cache: PathBuf,
    /// Primary witness ID
    pub witness: String,
    /// Secondary witnesses to keep (default: all)
    pub compared: Vec<String>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Fixed)]
    pub format: OutputFormat,
}

#[derive(Debug, Parser)]
pub struct RelativesArgs {
    /// Genealogical cache database
    pub cache: PathBuf,
    /// Primary witness ID
    pub witness: String,
    /// Variation unit ID
    pub passage: String,
    /// Readings to keep (default: all)
    #[arg(long = "reading")]
    pub readings: Vec<String>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Fixed)]
    pub format: OutputFormat,
}

#[derive(Debug, Parser)]
pub struct SubstemmataArgs {
    /// Genealogical cache database
    pub cache: PathBuf,
    /// Witness ID to optimize
    pub witness: String,
    /// Enumerate all substemmata within this cost bound
    #[arg(long = "upper-bound")]
    pub bound: Option<f64>,
    /// Solver time limit in seconds
    #[arg(long)]
    pub timeout: Option<u64>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Fixed)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RelationType {
    Extant,
    Agreements,
    Prior,
    Posterior,
    Norel,
    Unclear,
    Explained,
}

#[derive(Debug, Parser)]
pub struct RelationshipsArgs {
    /// Genealogical cache database
    pub cache: PathBuf,
    /// Primary witness ID
    pub primary: String,
    /// Secondary witness ID
    pub secondary: String,
    /// Relationship types to print (default: all)
    #[arg(long = "type", value_enum)]
    pub types: Vec<RelationType>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Fixed)]
    pub format: OutputFormat,
}

#[derive(Debug, Parser)]
pub struct LocalStemmaArgs {
    /// Genealogical cache database
    pub cache: PathBuf,
    /// Variation unit ID
    pub passage: String,
    #[arg(long, value_enum, default_value_t = GraphFormat::Dot)]
    pub format: GraphFormat,
}

#[derive(Debug, Parser)]
pub struct FlowArgs {
    /// Genealogical cache database
    pub cache: PathBuf,
    /// Variation unit ID
    pub passage: String,
    /// Override the passage's connectivity bound
    #[arg(long = "connectivity-override")]
    pub connectivity: Option<u32>,
    /// Style edges by flow strength
    #[arg(long)]
    pub strengths: bool,
    #[arg(long, value_enum, default_value_t = GraphFormat::Dot)]
    pub format: GraphFormat,
}

#[derive(Debug, Parser)]
pub struct FlowAttestationsArgs {
    /// Genealogical cache database
    pub cache: PathBuf,
    /// Variation unit ID
    pub passage: String,
    /// Reading whose attestation is drawn
    pub reading: String,
    /// Override the passage's connectivity bound
    #[arg(long = "connectivity-override")]
    pub connectivity: Option<u32>,
    /// Style edges by flow strength
    #[arg(long)]
    pub strengths: bool,
    #[arg(long, value_enum, default_value_t = GraphFormat::Dot)]
    pub format: GraphFormat,
}

#[derive(Debug, Parser)]
pub struct GlobalStemmaArgs {
    /// Genealogical cache database
    pub cache: PathBuf,
    /// Enumerate substemmata within this cost bound per witness
    #[arg(long = "upper-bound")]
    pub bound: Option<f64>,
    /// Solver time limit in seconds, per witness
    #[arg(long)]
    pub timeout: Option<u64>,
    /// Draw edges whose ancestor is absent from some optimal substemma
    #[arg(long)]
    pub draw_ambiguous: bool,
    #[arg(long, value_enum, default_value_t = GraphFormat::Dot)]
    pub format: GraphFormat,
}

pub mod dot;
pub mod json;
pub mod render;
