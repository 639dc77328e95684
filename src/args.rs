use clap::{Parser, Subcommand};

/// Builds the candidate, commissioner and election tables of the ANC website.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The JSON build configuration. Relative paths inside it are read from
    /// the directory of this file.
    #[clap(short, long, value_parser)]
    pub config: String,

    /// (directory, optional) Overrides the output directory of the configuration.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (file path, optional) A reference file for the main output of the step. If provided, the
    /// produced file is compared to it and any difference is printed and reported as an error.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Matches the candidates of the election authority exports against the known people and
    /// writes the review files.
    Resolve,
    /// Applies the reviewed files and writes the updated people and candidates tables.
    Apply {
        /// (directory, optional) Where the reviewed files are. Defaults to the review directory
        /// of the output.
        #[clap(long, value_parser)]
        review_dir: Option<String>,
    },
    /// Writes the per-district view.
    Districts {
        /// (RFC 3339 timestamp, optional) The instant at which the commissioners are evaluated.
        /// Defaults to now.
        #[clap(long, value_parser)]
        at: Option<String>,
    },
    /// Aggregates the precinct results.
    Results,
}
