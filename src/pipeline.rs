use crate::environment::Environment;
use crate::error::Result;
use crate::parser::parse;
use crate::runtime::Interpreter;
use crate::tokenizer::tokenize;
use log::debug;
use std::path::{Path, PathBuf};

/// Diagnostic dumps written to stdout. None of them affect evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub print_tokens: bool,
    pub print_nodes: bool,
    pub print_vars: bool,
    /// Dump the variables after every executed statement; overrides
    /// `print_vars`.
    pub print_vars_each_cycle: bool,
}

impl RunOptions {
    /// Imported modules never dump their tokens or nodes.
    pub fn for_import(&self) -> Self {
        Self {
            print_tokens: false,
            print_nodes: false,
            ..*self
        }
    }
}

/// Lex, parse and execute `source` as the file `file` in a fresh
/// environment, returning the final bindings.
pub fn run(source: &str, file: &Path, options: &RunOptions) -> Result<Environment> {
    run_with_imports(source, file, options, &[])
}

pub(crate) fn run_with_imports(
    source: &str,
    file: &Path,
    options: &RunOptions,
    imports: &[PathBuf],
) -> Result<Environment> {
    debug!("running {}", file.display());

    let tokens = tokenize(source)?;
    debug!("lexed {} tokens", tokens.len());
    if options.print_tokens {
        for token in &tokens {
            println!("{}", token);
        }
    }

    let nodes = parse(&tokens)?;
    debug!("parsed {} statements", nodes.len());
    if options.print_nodes {
        println!("{:#?}", nodes);
    }

    let mut interpreter = Interpreter::new(file, options).with_imports(imports.to_vec());
    interpreter.execute(&nodes)?;

    if options.print_vars && !options.print_vars_each_cycle {
        println!("{}", interpreter.environment());
    }

    Ok(interpreter.into_environment())
}
