use nu_ansi_term::{Color, Style};
use reedline::{
    Highlighter, Prompt, PromptEditMode, PromptHistorySearch, PromptHistorySearchStatus,
    StyledText, ValidationResult, Validator,
};
use std::borrow::Cow;

use crate::tokenizer::{tokenize, TokenType};

#[derive(Clone)]
pub struct REPLPrompt;

impl Prompt for REPLPrompt {
    fn render_prompt_left(&self) -> Cow<str> {
        Cow::Borrowed("gor")
    }

    fn render_prompt_right(&self) -> Cow<str> {
        Cow::Borrowed("")
    }

    fn render_prompt_indicator(&self, _edit_mode: PromptEditMode) -> Cow<str> {
        Cow::Borrowed(" >>> ")
    }

    fn render_prompt_multiline_indicator(&self) -> Cow<str> {
        Cow::Borrowed("  ... ")
    }

    fn render_prompt_history_search_indicator(
        &self,
        history_search: PromptHistorySearch,
    ) -> Cow<str> {
        let prefix = match history_search.status {
            PromptHistorySearchStatus::Passing => "",
            PromptHistorySearchStatus::Failing => "failing ",
        };
        Cow::Owned(format!(
            "({}reverse-search: {}) ",
            prefix, history_search.term
        ))
    }
}

/// Keeps the editor open while a block, a parenthesis or a string is
/// still open. Gor strings have no escapes and may span lines.
pub struct REPLValidator;

impl Validator for REPLValidator {
    fn validate(&self, line: &str) -> ValidationResult {
        let mut delimiters = Vec::new();
        let mut in_string = false;
        let mut in_comment = false;

        for c in line.chars() {
            match c {
                '\n' if in_comment => in_comment = false,
                _ if in_comment => continue,
                '"' => in_string = !in_string,
                _ if in_string => continue,

                '?' => in_comment = true,
                '{' | '(' => delimiters.push(c),
                '}' => {
                    if delimiters.pop() != Some('{') {
                        return ValidationResult::Complete;
                    }
                }
                ')' => {
                    if delimiters.pop() != Some('(') {
                        return ValidationResult::Complete;
                    }
                }
                _ => (),
            }
        }

        if in_string || !delimiters.is_empty() {
            ValidationResult::Incomplete
        } else {
            ValidationResult::Complete
        }
    }
}

pub static KEYWORD_COLOR: Color = Color::LightBlue;
pub static LITERAL_COLOR: Color = Color::Yellow;
pub static DEFAULT_COLOR: Color = Color::White;
pub static OPERATOR_COLOR: Color = Color::DarkGray;
pub static COMMENT_COLOR: Color = Color::Green;

fn token_color(token_type: &TokenType) -> Color {
    match token_type {
        TokenType::Keyword(_) => KEYWORD_COLOR,
        TokenType::String(_) | TokenType::Number(_) | TokenType::True | TokenType::False => {
            LITERAL_COLOR
        }
        TokenType::Comment(_) => COMMENT_COLOR,
        TokenType::Identifier(_) | TokenType::NewLine | TokenType::EOF => DEFAULT_COLOR,
        _ => OPERATOR_COLOR,
    }
}

pub struct SyntaxHighlighter;

impl Highlighter for SyntaxHighlighter {
    fn highlight(&self, line: &str, _cursor: usize) -> StyledText {
        let mut styled_text = StyledText::new();

        let tokens = match tokenize(line) {
            Ok(t) => t,
            Err(_) => {
                styled_text.push((Style::new().fg(DEFAULT_COLOR), line.to_string()));
                return styled_text;
            }
        };

        let mut written = 0;
        for token in tokens {
            if token.start > written {
                styled_text.push((
                    Style::new().fg(DEFAULT_COLOR),
                    line[written..token.start].to_string(),
                ));
            }

            if token.end > token.start {
                styled_text.push((
                    Style::new().fg(token_color(&token.token_type)),
                    line[token.start..token.end].to_string(),
                ));
            }
            written = token.end;
        }

        if written < line.len() {
            styled_text.push((Style::new().fg(DEFAULT_COLOR), line[written..].to_string()));
        }

        styled_text
    }
}
