pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "famdb",
    version,
    about = "Queries or modifies the contents of a partitioned famdb family database",
    long_about = "famdb answers taxonomy and family queries against a directory of FamDB \
                  partition files, emitting families as summaries, HMMs, FASTA or EMBL \
                  records for annotation pipelines such as RepeatMasker."
)]
pub struct Cli {
    /// Directory containing the FamDB file set to operate on
    #[arg(short = 'i', long = "db-dir", global = true, value_name = "DIR")]
    pub db_dir: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        default_value = "info",
        value_name = "LEVEL"
    )]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List general information about the file set
    Info(commands::info::InfoArgs),

    /// List the names and taxonomy identifiers of a clade
    Names(commands::names::NamesArgs),

    /// List the taxonomy tree including counts of families at each clade
    Lineage(commands::lineage::LineageArgs),

    /// Retrieve details of a single family
    Family(commands::family::FamilyArgs),

    /// Retrieve the families associated with a given clade
    Families(commands::families::FamiliesArgs),

    /// Append families from an EMBL file to an existing file set
    Append(commands::append::AppendArgs),

    /// Print the stored RepeatPeps library
    #[command(name = "repeat-peps", hide = true)]
    RepeatPeps,

    /// Replace the stored database description
    #[command(name = "edit-description", hide = true)]
    EditDescription(commands::append::EditDescriptionArgs),
}
