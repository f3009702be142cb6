use crate::tokenizer::Token;
use std::fmt::{self, Display, Formatter};
use thiserror::Error;

/// Source location of a token, as reported in error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub line: usize,
    pub start_column: usize,
    pub end_column: usize,
}

impl Span {
    pub fn new(line: usize, start_column: usize, end_column: usize) -> Self {
        Self {
            line,
            start_column,
            end_column,
        }
    }
}

impl From<&Token> for Span {
    fn from(token: &Token) -> Self {
        let width = token.literal.chars().count().max(1);
        Span::new(token.line, token.column, token.column + width - 1)
    }
}

impl Display for Span {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "line {}, col {}-{}",
            self.line, self.start_column, self.end_column
        )
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("io error: {0}")]
    IO(#[from] std::io::Error),
    #[error("lexer error on {span}: {message}")]
    Lexer { message: String, span: Span },
    #[error("parser error on {span}: {message}")]
    Parser { message: String, span: Span },
    #[error("runtime error on {span}: {message}")]
    Runtime { message: String, span: Span },
    #[error("type mismatch on {span}: {message}")]
    TypeMismatch { message: String, span: Span },
    #[error("module error: {message}")]
    Module { message: String },
}

pub type Result<T> = std::result::Result<T, Error>;

pub fn lexer_error<T>(message: impl Into<String>, span: Span) -> Result<T> {
    Err(Error::Lexer {
        message: message.into(),
        span,
    })
}

pub fn parser_error<T>(message: impl Into<String>, token: &Token) -> Result<T> {
    Err(Error::Parser {
        message: message.into(),
        span: token.into(),
    })
}

pub fn runtime_error<T>(message: impl Into<String>, token: &Token) -> Result<T> {
    Err(Error::Runtime {
        message: message.into(),
        span: token.into(),
    })
}

pub fn type_mismatch<T>(message: impl Into<String>, token: &Token) -> Result<T> {
    Err(Error::TypeMismatch {
        message: message.into(),
        span: token.into(),
    })
}

pub fn module_error<T>(message: impl Into<String>) -> Result<T> {
    Err(Error::Module {
        message: message.into(),
    })
}
