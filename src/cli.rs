use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "classist")]
#[command(about = "Index the classes inside Java archives under a directory and find where they live")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory to scan; defaults to the last one used, then the home directory
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Preference file holding the last scanned directory
    #[arg(long, value_name = "FILE")]
    pub prefs: Option<PathBuf>,

    /// Archives read in parallel
    #[arg(long, value_name = "N", default_value_t = 1)]
    pub threads: usize,

    /// Visit directory entries in filesystem order instead of by name
    #[arg(long)]
    pub no_sort: bool,

    /// Skip nested classes (names containing `$`)
    #[arg(long)]
    pub top_level_only: bool,

    /// Do not descend into symlinked directories
    #[arg(long)]
    pub no_follow_links: bool,

    #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    #[arg(short = 'v', long, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Classes whose name contains PATTERN (case-insensitive regex)
    Search {
        #[arg(default_value = "")]
        pattern: String,
    },
    /// Classes present in more than one archive
    Duplicates,
    /// Archives containing CLASS
    Which { class_name: String },
    /// Scan counters
    Stats,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Text,
}

/// Global options that consume the following argument.
pub const VALUE_OPTIONS: [&str; 5] = ["--root", "--prefs", "--threads", "-f", "--format"];

pub const SUBCOMMANDS: [&str; 5] = ["search", "duplicates", "which", "stats", "help"];

/// `classist Foo` means `classist search Foo`.
pub fn rewrite_args_for_implicit_search(mut args: Vec<String>) -> Vec<String> {
    if args.len() <= 1 {
        return args;
    }

    let mut idx = 1usize;
    while idx < args.len() {
        let a = args[idx].as_str();
        if a == "--" {
            idx += 1;
            break;
        }

        if VALUE_OPTIONS.contains(&a) {
            idx += 2;
            continue;
        }

        if a.starts_with('-') {
            idx += 1;
            continue;
        }

        break;
    }

    if idx < args.len() {
        let token = args[idx].as_str();
        if !SUBCOMMANDS.contains(&token) {
            args.insert(idx, "search".to_string());
        }
    }

    args
}
