//! Command-line surface (§1 ambient stack): four subcommands, no
//! rendering/windowing concepts since simulation here is headless only.

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "ams-runtime", version, about = "Headless runtime for YAML-driven data-defined games")]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the game project root directory (the directory containing game.yaml)
    #[arg(long, global = true, default_value = ".")]
    pub project: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scaffold a new project directory with a starter game.yaml
    Init {
        /// Project name (becomes directory name)
        name: String,
    },
    /// Run a headless simulation for a fixed duration
    Run {
        /// Seconds of simulated time to run before exiting
        #[arg(long, default_value_t = 10.0)]
        seconds: f64,
    },
    /// Execute the project's Lua test scripts against the engine
    Test {
        /// Specific test file (relative to the project root); omit to run all discovered tests
        test_file: Option<String>,
    },
    /// Schema-check a content tree
    Validate {
        /// Fail on any warning (missing optional fields, unresolved references) rather than just errors
        #[arg(long)]
        strict: bool,
    },
}
