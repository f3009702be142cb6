use crate::pipeline::RunOptions;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about = "The Gor scripting language")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a .gor source file
    Run {
        /// Path to the source file; `.gor` is appended when it has no extension
        file: PathBuf,

        #[command(flatten)]
        dumps: DumpFlags,
    },

    /// Check a source file for syntax errors
    Check {
        /// Path to the source file to check
        file: PathBuf,
    },

    /// Start an interactive REPL session
    Repl {
        #[command(flatten)]
        dumps: DumpFlags,
    },
}

#[derive(clap::Args, Debug, Clone, Copy)]
pub struct DumpFlags {
    /// Print lexer tokens
    #[arg(short = 't', long)]
    pub tokens: bool,

    /// Print AST nodes
    #[arg(short = 'n', long)]
    pub nodes: bool,

    /// Print variables after execution of all code
    #[arg(short = 'v', long)]
    pub vars: bool,

    /// Print variables after every executed statement (overrides --vars)
    #[arg(short = 'c', long)]
    pub cycle_vars: bool,
}

impl From<DumpFlags> for RunOptions {
    fn from(flags: DumpFlags) -> Self {
        RunOptions {
            print_tokens: flags.tokens,
            print_nodes: flags.nodes,
            print_vars: flags.vars,
            print_vars_each_cycle: flags.cycle_vars,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_run_flags() {
        let args = Args::parse_from(["gor", "run", "main", "-t", "-c"]);
        match args.command {
            Commands::Run { file, dumps } => {
                assert_eq!(file, PathBuf::from("main"));
                assert_eq!(
                    RunOptions::from(dumps),
                    RunOptions {
                        print_tokens: true,
                        print_nodes: false,
                        print_vars: false,
                        print_vars_each_cycle: true,
                    }
                );
            }
            other => panic!("expected run command, got {:?}", other),
        }
    }
}
