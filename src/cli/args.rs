//! CLI argument definitions using clap

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint};

/// Fixture generator: random JSON values shaped by path-addressed manipulators
#[derive(Parser, Debug)]
#[command(name = "fixtree")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity: -d info, -dd debug, -ddd trace
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub debug: u8,

    /// Directory holding a local .fixtree.toml (default: cwd)
    #[arg(short = 'c', long, global = true, value_hint = ValueHint::DirPath)]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print sampled values as JSON lines
    Sample {
        #[command(flatten)]
        shape: ShapeArgs,

        #[command(flatten)]
        manipulators: ManipulatorArgs,

        /// Number of values
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,

        /// Seed for reproducible output (overrides config)
        #[arg(long, env = "FIXTREE_SEED")]
        seed: Option<u64>,
    },

    /// Show the expanded, manipulated tree
    Tree {
        #[command(flatten)]
        shape: ShapeArgs,

        #[command(flatten)]
        manipulators: ManipulatorArgs,

        /// Seed used for container sizes
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Parse a path expression and print its segments
    Parse {
        /// Expression, e.g. "items[*].price"
        expression: String,
    },

    /// Manage settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Where the value shapes come from
#[derive(Args, Debug, Clone)]
pub struct ShapeArgs {
    /// JSON shape file
    #[arg(short, long, value_hint = ValueHint::FilePath)]
    pub shape: PathBuf,

    /// Root type (default: the file's root)
    #[arg(short = 't', long = "type")]
    pub type_name: Option<String>,
}

/// Manipulators given on the command line, applied in this order:
/// sizes, nullity, assignments
#[derive(Args, Debug, Clone, Default)]
pub struct ManipulatorArgs {
    /// Pin a value: EXPR=JSON
    #[arg(long = "set", value_name = "EXPR=JSON")]
    pub set: Vec<String>,

    /// Force null at EXPR
    #[arg(long = "null", value_name = "EXPR")]
    pub null: Vec<String>,

    /// Force non-null at EXPR
    #[arg(long = "not-null", value_name = "EXPR")]
    pub not_null: Vec<String>,

    /// Container size: EXPR=MIN..MAX or EXPR=N
    #[arg(long = "size", value_name = "EXPR=MIN..MAX")]
    pub size: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show effective settings
    Show,
    /// Print a commented template
    Template,
    /// Show the global config path
    Path,
}
