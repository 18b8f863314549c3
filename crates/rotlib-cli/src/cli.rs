use crate::utils::parser::parse_atom_pair;
use clap::{Args, Parser, Subcommand};
use rotlib::engine::config::{AtomPair, AtomSelector, LibraryMode, RingMode};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Tony Kan, Ted Yu, William A. Goddard III, Victor Wai Tak Kam",
    version,
    about = "rotlib CLI - Builds rotamer libraries, assignment scripts and reordered templates for ligands and unnatural amino acids.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for parallel computation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the rotamer libraries and assignment script for one residue.
    Build(BuildArgs),
}

/// Arguments for the `build` subcommand.
#[derive(Args, Debug)]
pub struct BuildArgs {
    // --- Core Arguments ---
    /// Path to the input structure file (Maestro format). Every connection table after the
    /// first is read as an additional conformer.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Directory that receives the library files, the assignment script and the template.
    #[arg(short, long, required = true, value_name = "DIR")]
    pub output: PathBuf,

    /// Path to an optional configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// CSV list of rotatable bonds (`atom_i,atom_j`, 0-based).
    #[arg(short, long, value_name = "PATH")]
    pub rotatable: Option<PathBuf>,

    /// Separate structure file holding the sampled conformers, replacing those of the input.
    #[arg(long, value_name = "PATH")]
    pub conformers: Option<PathBuf>,

    /// Residue z-matrix template to rewrite in the new tree order.
    #[arg(short, long, value_name = "PATH")]
    pub template: Option<PathBuf>,

    // --- Sampling Overrides ---
    /// Override the grid resolution in degrees.
    #[arg(short, long, value_name = "DEGREES")]
    pub grid: Option<f64>,

    /// Override the grid resolution used for hydroxyl-like torsions.
    #[arg(long, value_name = "DEGREES")]
    pub hydroxyl_grid: Option<f64>,

    /// Override how flexible rings are sampled: off, on or only.
    #[arg(long, value_name = "MODE")]
    pub rings: Option<RingMode>,

    /// Override how libraries are produced: combinatorial or conformer.
    #[arg(short = 'm', long, value_name = "MODE")]
    pub library_mode: Option<LibraryMode>,

    // --- Tree Overrides ---
    /// Root atom, by 0-based index or atom name.
    #[arg(long, value_name = "ATOM")]
    pub root: Option<AtomSelector>,

    /// Attachment atom of the R-group to sample; the root becomes the atom farthest from it.
    #[arg(long, value_name = "ATOM", conflicts_with = "root")]
    pub r_group_root: Option<AtomSelector>,

    /// Maximum number of torsions in one group.
    #[arg(long, value_name = "INT")]
    pub max_torsions: Option<usize>,

    /// Sample exactly this bond instead of the discovered ones. Can be used multiple times.
    #[arg(long = "torsion", value_name = "A:B", value_parser = parse_atom_pair)]
    pub torsions: Vec<AtomPair>,

    /// Never sample this bond. Can be used multiple times.
    #[arg(long = "fix", value_name = "A:B", value_parser = parse_atom_pair)]
    pub fixed_bonds: Vec<AtomPair>,

    /// Move this bond into the backbone library. Can be used multiple times.
    #[arg(long = "backbone-torsion", value_name = "A:B", value_parser = parse_atom_pair)]
    pub backbone_torsions: Vec<AtomPair>,

    /// Put every torsion into a single library instead of one per branch.
    #[arg(long)]
    pub single_library: bool,

    /// Treat the residue as an unnatural amino acid rooted at its backbone.
    #[arg(long)]
    pub unnatural_amino_acid: bool,

    /// Override the residue name used for file and library names.
    #[arg(long, value_name = "NAME")]
    pub residue_name: Option<String>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S sampling.grid-resolution=15
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}
