use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "chapipe")]
#[command(about = "Run declarative `task: options` pipelines", long_about = None)]
pub struct Opts {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a pipeline file
    Run {
        path: PathBuf,

        /// Save records and run metadata under DIR/runs/<id>
        #[arg(long, value_name = "DIR")]
        save: Option<PathBuf>,
    },

    /// Run expressions given on the command line
    Exec {
        #[arg(required = true)]
        exprs: Vec<String>,

        /// Chain step applied to the combined output; repeatable
        #[arg(long = "then", value_name = "EXPR")]
        steps: Vec<String>,
    },

    /// Check a pipeline file without running it
    Validate { path: PathBuf },

    /// List registered tasks and builtin transforms
    Tasks,
}

pub fn get_opts() -> Opts {
    Opts::parse()
}
