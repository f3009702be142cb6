pub mod cli;
pub mod environment;
pub mod error;
pub mod module;
pub mod parser;
pub mod pipeline;
pub mod repl;
pub mod runtime;
pub mod stdlib;
pub mod tokenizer;

pub use module::import_module;
pub use pipeline::{run, RunOptions};
