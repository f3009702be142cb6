use log::debug;
use snailquote::escape;
use std::fmt::{self, Display, Formatter};

use crate::error::{lexer_error, Result, Span};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Func,
    Con,
    Delete,
    Jumpto,
    If,
    Elsif,
    Else,
    Use,
}

pub const KEYWORDS: [(&str, Keyword); 8] = [
    ("func", Keyword::Func),
    ("con", Keyword::Con),
    ("delete", Keyword::Delete),
    ("jumpto", Keyword::Jumpto),
    ("if", Keyword::If),
    ("elsif", Keyword::Elsif),
    ("else", Keyword::Else),
    ("use", Keyword::Use),
];

impl Keyword {
    pub fn from_word(word: &str) -> Option<Keyword> {
        KEYWORDS
            .iter()
            .find(|(name, _)| *name == word)
            .map(|(_, keyword)| *keyword)
    }

    pub fn as_str(&self) -> &'static str {
        KEYWORDS
            .iter()
            .find(|(_, keyword)| keyword == self)
            .map_or("", |(name, _)| name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenType {
    LeftParen,
    RightParen,
    LeftSquare,
    RightSquare,
    LeftBrace,
    RightBrace,

    Colon,
    Dot,
    Semicolon,
    Comma,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,

    Equal,
    NotEqual,
    Greater,
    Less,
    And,
    Or,

    Assign,

    Identifier(String),
    String(String),
    Number(Number),
    True,
    False,
    Keyword(Keyword),

    NewLine,
    Comment(String),
    EOF,
}

impl TokenType {
    pub fn kind_name(&self) -> &'static str {
        match self {
            TokenType::LeftParen => "LPAREN",
            TokenType::RightParen => "RPAREN",
            TokenType::LeftSquare => "LBRACKET",
            TokenType::RightSquare => "RBRACKET",
            TokenType::LeftBrace => "LBRACE",
            TokenType::RightBrace => "RBRACE",
            TokenType::Colon => "COLON",
            TokenType::Dot => "DOT",
            TokenType::Semicolon => "SEMICOLON",
            TokenType::Comma => "COMMA",
            TokenType::Plus => "PLUS",
            TokenType::Minus => "MINUS",
            TokenType::Star => "STAR",
            TokenType::Slash => "SLASH",
            TokenType::Percent => "PERCENT",
            TokenType::Equal => "EQUALS",
            TokenType::NotEqual => "NOT_EQUALS",
            TokenType::Greater => "GREATER_THAN",
            TokenType::Less => "LESS_THAN",
            TokenType::And => "AND",
            TokenType::Or => "OR",
            TokenType::Assign => "ASSIGN",
            TokenType::Identifier(_) => "IDENT",
            TokenType::String(_) => "STRING",
            TokenType::Number(_) => "NUMBER",
            TokenType::True | TokenType::False => "BOOLEAN",
            TokenType::Keyword(_) => "KEYWORD",
            TokenType::NewLine => "NEWLINE",
            TokenType::Comment(_) => "COMMENT",
            TokenType::EOF => "EOF",
        }
    }
}

/// A lexical unit together with its exact source text and position.
///
/// `start` and `end` are byte offsets (end exclusive); `line` and `column`
/// are 1-based and refer to the first character of the token.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    pub literal: String,
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl Token {
    /// Human readable form used in error messages.
    pub fn describe(&self) -> String {
        match self.token_type {
            TokenType::EOF => "end of input".to_string(),
            TokenType::NewLine => "newline".to_string(),
            _ => format!("'{}'", self.literal),
        }
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} {} {}",
            self.line,
            self.column,
            self.token_type.kind_name(),
            escape(&self.literal)
        )
    }
}

type Fault = (usize, String);

pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    let mut cursor = 0;
    let mut line = 1;
    let mut line_start = 0;
    let mut tokens = Vec::new();

    loop {
        let rest = &source[cursor..];
        let start = cursor + (rest.len() - rest.trim_start_matches([' ', '\t', '\r']).len());
        let column = source[line_start..start].chars().count() + 1;

        let (bytes_read, token_type) = match next_token(&source[start..]) {
            Ok(lexeme) => lexeme,
            Err((offset, message)) => {
                debug!("{} on line {}", message, line);
                let column = column + source[start..start + offset].chars().count();
                return lexer_error(message, Span::new(line, column, column));
            }
        };

        let end = start + bytes_read;
        let literal = &source[start..end];
        let at_eof = token_type == TokenType::EOF;

        tokens.push(Token {
            token_type,
            literal: literal.to_string(),
            start,
            end,
            line,
            column,
        });

        if at_eof {
            debug!("tokenized {} tokens over {} lines", tokens.len(), line);
            return Ok(tokens);
        }

        for (offset, c) in literal.char_indices() {
            if c == '\n' {
                line += 1;
                line_start = start + offset + 1;
            }
        }
        cursor = end;
    }
}

fn next_token(rest: &str) -> std::result::Result<(usize, TokenType), Fault> {
    let Some(c) = rest.chars().next() else {
        return Ok((0, TokenType::EOF));
    };

    let token = if rest.starts_with("<-") {
        Some(TokenType::Assign)
    } else if rest.starts_with("!=") {
        Some(TokenType::NotEqual)
    } else {
        None
    };

    if let Some(token) = token {
        return Ok((2, token));
    }

    let token = match c {
        '\n' => Some(TokenType::NewLine),
        '(' => Some(TokenType::LeftParen),
        ')' => Some(TokenType::RightParen),
        '[' => Some(TokenType::LeftSquare),
        ']' => Some(TokenType::RightSquare),
        '{' => Some(TokenType::LeftBrace),
        '}' => Some(TokenType::RightBrace),
        ':' => Some(TokenType::Colon),
        '.' => Some(TokenType::Dot),
        ';' => Some(TokenType::Semicolon),
        ',' => Some(TokenType::Comma),
        '+' => Some(TokenType::Plus),
        '-' => Some(TokenType::Minus),
        '*' => Some(TokenType::Star),
        '/' => Some(TokenType::Slash),
        '%' => Some(TokenType::Percent),
        '=' => Some(TokenType::Equal),
        '≠' => Some(TokenType::NotEqual),
        '>' => Some(TokenType::Greater),
        '<' => Some(TokenType::Less),
        _ => None,
    };

    if let Some(token) = token {
        return Ok((c.len_utf8(), token));
    }

    if c == '"' {
        return match rest[1..].find('"') {
            Some(len) => Ok((len + 2, TokenType::String(rest[1..len + 1].to_string()))),
            None => Err((0, "unterminated string literal".to_string())),
        };
    }

    if c == '?' {
        let end = rest.find('\n').unwrap_or(rest.len());
        let body = rest[1..end].trim_start_matches(' ');
        return Ok((end, TokenType::Comment(body.to_string())));
    }

    if c.is_ascii_digit() {
        let mut end = 0;
        let mut has_dot = false;

        for (offset, c) in rest.char_indices() {
            match c {
                '0'..='9' => {}
                '.' if has_dot => {
                    return Err((
                        offset,
                        format!("malformed number literal '{}'", &rest[..=offset]),
                    ))
                }
                '.' => has_dot = true,
                _ => break,
            }
            end = offset + 1;
        }

        let text = &rest[..end];
        let number = if has_dot {
            text.parse()
                .map(Number::Float)
                .map_err(|err| (0, format!("malformed number literal '{}': {}", text, err)))?
        } else {
            text.parse()
                .map(Number::Int)
                .map_err(|err| (0, format!("malformed number literal '{}': {}", text, err)))?
        };

        return Ok((end, TokenType::Number(number)));
    }

    if c.is_ascii_alphabetic() || c == '_' {
        let end = rest
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        let word = &rest[..end];

        let token = match word {
            "and" => TokenType::And,
            "or" => TokenType::Or,
            "true" => TokenType::True,
            "false" => TokenType::False,
            _ => match Keyword::from_word(word) {
                Some(keyword) => TokenType::Keyword(keyword),
                None => TokenType::Identifier(word.to_string()),
            },
        };

        return Ok((end, token));
    }

    Err((0, format!("illegal character '{}'", c)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::mem::discriminant;

    fn types(source: &str) -> Result<Vec<TokenType>> {
        Ok(tokenize(source)?
            .into_iter()
            .map(|token| token.token_type)
            .collect())
    }

    #[test]
    fn test_assignment_glyph() -> Result<()> {
        assert_eq!(
            types("x <- 1")?,
            vec![
                TokenType::Identifier("x".to_string()),
                TokenType::Assign,
                TokenType::Number(Number::Int(1)),
                TokenType::EOF,
            ]
        );

        assert_eq!(
            types("x < -1")?,
            vec![
                TokenType::Identifier("x".to_string()),
                TokenType::Less,
                TokenType::Minus,
                TokenType::Number(Number::Int(1)),
                TokenType::EOF,
            ]
        );
        Ok(())
    }

    #[test]
    fn test_operators() -> Result<()> {
        assert_eq!(
            types("+ - * / % = ≠ != > < and or")?,
            vec![
                TokenType::Plus,
                TokenType::Minus,
                TokenType::Star,
                TokenType::Slash,
                TokenType::Percent,
                TokenType::Equal,
                TokenType::NotEqual,
                TokenType::NotEqual,
                TokenType::Greater,
                TokenType::Less,
                TokenType::And,
                TokenType::Or,
                TokenType::EOF,
            ]
        );
        Ok(())
    }

    #[test]
    fn test_numbers() -> Result<()> {
        assert_eq!(
            types("42 3.5 7.")?,
            vec![
                TokenType::Number(Number::Int(42)),
                TokenType::Number(Number::Float(3.5)),
                TokenType::Number(Number::Float(7.0)),
                TokenType::EOF,
            ]
        );

        match tokenize("x <- 1.2.3") {
            Err(Error::Lexer { span, .. }) => {
                assert_eq!(span.line, 1);
                assert_eq!(span.start_column, 9);
            }
            other => panic!("expected lexer error, got {:?}", other),
        }

        assert!(tokenize("99999999999999999999").is_err());
        Ok(())
    }

    #[test]
    fn test_strings() -> Result<()> {
        let tokens = tokenize("\"hello\tworld\" \"a\nb\"")?;
        assert_eq!(
            tokens[0].token_type,
            TokenType::String("hello\tworld".to_string())
        );
        assert_eq!(tokens[0].literal, "\"hello\tworld\"");
        assert_eq!(tokens[1].token_type, TokenType::String("a\nb".to_string()));
        assert_eq!(tokens[2].line, 2);

        assert!(matches!(
            tokenize("x <- \"open"),
            Err(Error::Lexer { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_keywords_and_identifiers() -> Result<()> {
        assert_eq!(
            types("jumpto loop use If _tmp1 true")?,
            vec![
                TokenType::Keyword(Keyword::Jumpto),
                TokenType::Identifier("loop".to_string()),
                TokenType::Keyword(Keyword::Use),
                TokenType::Identifier("If".to_string()),
                TokenType::Identifier("_tmp1".to_string()),
                TokenType::True,
                TokenType::EOF,
            ]
        );

        for (word, keyword) in KEYWORDS {
            assert_eq!(keyword.as_str(), word);
        }
        Ok(())
    }

    #[test]
    fn test_comments_and_newlines() -> Result<()> {
        let tokens = tokenize("x <- 1 ?   note here\ny <- 2")?;
        assert_eq!(
            tokens[3].token_type,
            TokenType::Comment("note here".to_string())
        );
        assert_eq!(tokens[4].token_type, TokenType::NewLine);
        assert_eq!(tokens[5].token_type, TokenType::Identifier("y".to_string()));
        assert_eq!(tokens[5].line, 2);
        assert_eq!(tokens[5].column, 1);
        Ok(())
    }

    #[test]
    fn test_positions() -> Result<()> {
        let tokens = tokenize("  abc <- 12")?;
        assert_eq!((tokens[0].start, tokens[0].end), (2, 5));
        assert_eq!(tokens[0].column, 3);
        assert_eq!((tokens[1].start, tokens[1].end), (6, 8));
        assert_eq!(tokens[2].literal, "12");
        assert_eq!(tokens.last().map(|t| t.start), Some(11));
        Ok(())
    }

    #[test]
    fn test_illegal_character() {
        match tokenize("x <- 1\ny <- @") {
            Err(Error::Lexer { message, span }) => {
                assert!(message.contains('@'));
                assert_eq!(span.line, 2);
                assert_eq!(span.start_column, 6);
            }
            other => panic!("expected lexer error, got {:?}", other),
        }

        assert!(tokenize("!").is_err());
    }

    #[test]
    fn test_literal_round_trip() -> Result<()> {
        let source = "? header\n: top :\nname <- \"gor\" * 2 ;\nif n ≠ 3.5 and ok { jumpto top ; }\nuse \"lib\" ;";
        let tokens = tokenize(source)?;

        let joined = tokens
            .iter()
            .filter(|token| token.token_type != TokenType::EOF)
            .map(|token| token.literal.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let relexed = tokenize(&joined)?;

        assert_eq!(tokens.len(), relexed.len());
        for (a, b) in tokens.iter().zip(relexed.iter()) {
            assert_eq!(discriminant(&a.token_type), discriminant(&b.token_type));
        }
        Ok(())
    }
}
