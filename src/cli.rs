use clap::{Parser, Subcommand};

// ///////////// //
// CLI interface //
// ///////////// //

/// indicator-printers - Shows printers with queued jobs in the panel and warns about printer problems.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Log debug output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Default, PartialEq, Eq)]
pub enum Commands {
    /// Runs the indicator service (default).
    #[default]
    Run,
    /// Scans all printers once and dumps their state and the menu model to stdout.
    Dump,
}
