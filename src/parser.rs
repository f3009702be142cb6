use log::debug;
use std::path::Path;

use crate::{
    error::{parser_error, Result},
    module::gor_path,
    tokenizer::{Keyword, Token, TokenType},
};

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Assign {
        name: Token,
        value: Expr,
    },
    Call {
        name: Token,
        arguments: Vec<Expr>,
    },
    Label {
        name: Token,
    },
    Jump {
        label: Token,
    },
    Use {
        path: Token,
    },
    If {
        branches: Vec<Branch>,
        otherwise: Option<Vec<Node>>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Branch {
    pub condition: Expr,
    pub body: Vec<Node>,
}

impl Node {
    pub fn token(&self) -> &Token {
        match self {
            Node::Assign { name, .. } | Node::Call { name, .. } | Node::Label { name } => name,
            Node::Jump { label } => label,
            Node::Use { path } => path,
            Node::If { branches, .. } => match branches.first() {
                Some(branch) => branch.condition.token(),
                None => unreachable!("a conditional always has an 'if' arm"),
            },
        }
    }

    /// Body of the `index`-th arm of a conditional; the `else` arm comes
    /// after every `if`/`elsif` arm.
    pub fn branch_body(&self, index: usize) -> Option<&[Node]> {
        match self {
            Node::If {
                branches,
                otherwise,
            } => match branches.get(index) {
                Some(branch) => Some(&branch.body),
                None if index == branches.len() => otherwise.as_deref(),
                None => None,
            },
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Value(Token),
    Binary {
        left: Box<Expr>,
        operator: BinaryOp,
        token: Token,
        right: Box<Expr>,
    },
    Call {
        name: Token,
        arguments: Vec<Expr>,
    },
}

impl Expr {
    /// Token used to point at this expression in error messages.
    pub fn token(&self) -> &Token {
        match self {
            Expr::Value(token) => token,
            Expr::Binary { token, .. } => token,
            Expr::Call { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    And,
    Or,
    Equal,
    NotEqual,
    Greater,
    Less,
    Divide,
    Modulo,
    Multiply,
    Subtract,
    Add,
}

impl BinaryOp {
    fn from_token(token: &TokenType) -> Option<BinaryOp> {
        match token {
            TokenType::And => Some(BinaryOp::And),
            TokenType::Or => Some(BinaryOp::Or),
            TokenType::Equal => Some(BinaryOp::Equal),
            TokenType::NotEqual => Some(BinaryOp::NotEqual),
            TokenType::Greater => Some(BinaryOp::Greater),
            TokenType::Less => Some(BinaryOp::Less),
            TokenType::Slash => Some(BinaryOp::Divide),
            TokenType::Percent => Some(BinaryOp::Modulo),
            TokenType::Star => Some(BinaryOp::Multiply),
            TokenType::Minus => Some(BinaryOp::Subtract),
            TokenType::Plus => Some(BinaryOp::Add),
            _ => None,
        }
    }
}

/// Operator classes in the order the splitter looks for them. Within a
/// class the leftmost operator wins, so chains group to the right.
const PRECEDENCE_CASCADE: [&[BinaryOp]; 4] = [
    &[BinaryOp::And, BinaryOp::Or],
    &[BinaryOp::Equal, BinaryOp::NotEqual],
    &[BinaryOp::Greater, BinaryOp::Less],
    &[
        BinaryOp::Divide,
        BinaryOp::Modulo,
        BinaryOp::Multiply,
        BinaryOp::Subtract,
        BinaryOp::Add,
    ],
];

pub fn parse(tokens: &[Token]) -> Result<Vec<Node>> {
    assert!(
        tokens
            .last()
            .map_or(false, |t| t.token_type == TokenType::EOF),
        "Token slice must be terminated by EOF"
    );

    let tokens = tokens
        .iter()
        .filter(|t| !matches!(t.token_type, TokenType::NewLine | TokenType::Comment(_)))
        .cloned()
        .collect::<Vec<_>>();

    let (nodes, consumed) = parse_scope(&tokens)?;
    if tokens[consumed].token_type != TokenType::EOF {
        return parser_error(
            format!("unexpected {}", tokens[consumed].describe()),
            &tokens[consumed],
        );
    }

    debug!("parsed {} top-level statements", nodes.len());
    Ok(nodes)
}

// Parse statements up to (not including) an EOF or '}' terminator.
fn parse_scope(tokens: &[Token]) -> Result<(Vec<Node>, usize)> {
    let mut consumed = 0;
    let mut nodes = Vec::new();

    while !matches!(
        tokens[consumed].token_type,
        TokenType::EOF | TokenType::RightBrace
    ) {
        if tokens[consumed].token_type == TokenType::Semicolon {
            consumed += 1;
            continue;
        }

        let (node, node_consumed) = parse_statement(&tokens[consumed..])?;
        nodes.push(node);
        consumed += node_consumed;
    }

    Ok((nodes, consumed))
}

fn parse_statement(tokens: &[Token]) -> Result<(Node, usize)> {
    match &tokens[0].token_type {
        TokenType::Identifier(_) => match tokens[1].token_type {
            TokenType::Assign => parse_assignment(tokens),
            TokenType::LeftParen => parse_call_statement(tokens),
            _ => parser_error(
                format!(
                    "expected assign glyph ('<-') or '(' after {}, but found {} instead",
                    tokens[0].describe(),
                    tokens[1].describe()
                ),
                &tokens[1],
            ),
        },
        TokenType::Colon => parse_label(tokens),
        TokenType::Keyword(Keyword::Jumpto) => parse_jump(tokens),
        TokenType::Keyword(Keyword::Use) => parse_use(tokens),
        TokenType::Keyword(Keyword::If) => parse_if(tokens),
        TokenType::Keyword(keyword @ (Keyword::Elsif | Keyword::Else)) => parser_error(
            format!("'{}' without a preceding 'if'", keyword.as_str()),
            &tokens[0],
        ),
        TokenType::Keyword(keyword) => {
            parser_error(format!("unknown keyword '{}'", keyword.as_str()), &tokens[0])
        }
        _ => parser_error(format!("unexpected {}", tokens[0].describe()), &tokens[0]),
    }
}

fn parse_assignment(tokens: &[Token]) -> Result<(Node, usize)> {
    let mut consumed = 2; // Skip identifier and '<-'

    let length = collect_until_semicolon(&tokens[consumed..])?;
    let value = parse_expression(&tokens[consumed..consumed + length], &tokens[1])?;
    consumed += length + 1;

    Ok((
        Node::Assign {
            name: tokens[0].clone(),
            value,
        },
        consumed,
    ))
}

fn parse_call_statement(tokens: &[Token]) -> Result<(Node, usize)> {
    let length = collect_until_semicolon(tokens)?;

    match parse_expression(&tokens[..length], &tokens[0])? {
        Expr::Call { name, arguments } => Ok((Node::Call { name, arguments }, length + 1)),
        _ => parser_error(
            "expected ';' after function call",
            &tokens[closing_paren(tokens, 1)? + 1],
        ),
    }
}

fn parse_label(tokens: &[Token]) -> Result<(Node, usize)> {
    if !matches!(tokens[1].token_type, TokenType::Identifier(_)) {
        return parser_error(
            format!("expected identifier, but found {} instead", tokens[1].describe()),
            &tokens[1],
        );
    }

    if tokens[2].token_type != TokenType::Colon {
        return parser_error(
            format!("expected colon (':'), but found {} instead", tokens[2].describe()),
            &tokens[2],
        );
    }

    Ok((
        Node::Label {
            name: tokens[1].clone(),
        },
        3,
    ))
}

fn parse_jump(tokens: &[Token]) -> Result<(Node, usize)> {
    if !matches!(tokens[1].token_type, TokenType::Identifier(_)) {
        return parser_error(
            format!(
                "expected label name after 'jumpto', but found {} instead",
                tokens[1].describe()
            ),
            &tokens[1],
        );
    }

    expect_semicolon(&tokens[2])?;

    Ok((
        Node::Jump {
            label: tokens[1].clone(),
        },
        3,
    ))
}

fn parse_use(tokens: &[Token]) -> Result<(Node, usize)> {
    let TokenType::String(path) = &tokens[1].token_type else {
        return parser_error(
            format!(
                "expected string after 'use', but found {} instead",
                tokens[1].describe()
            ),
            &tokens[1],
        );
    };

    if gor_path(Path::new(path).to_path_buf()).is_none() {
        return parser_error(format!("path '{}' is not a Gor file", path), &tokens[1]);
    }

    expect_semicolon(&tokens[2])?;

    Ok((
        Node::Use {
            path: tokens[1].clone(),
        },
        3,
    ))
}

fn parse_if(tokens: &[Token]) -> Result<(Node, usize)> {
    let mut consumed = 0;
    let mut branches = Vec::new();
    let mut otherwise = None;

    loop {
        let keyword = &tokens[consumed];
        consumed += 1; // Skip 'if' / 'elsif'

        let length = collect_condition(&tokens[consumed..], keyword)?;
        let condition = parse_expression(&tokens[consumed..consumed + length], keyword)?;
        consumed += length;

        let (body, body_consumed) = parse_block(&tokens[consumed..])?;
        consumed += body_consumed;
        branches.push(Branch { condition, body });

        match tokens[consumed].token_type {
            TokenType::Keyword(Keyword::Elsif) => continue,
            TokenType::Keyword(Keyword::Else) => {
                consumed += 1;
                if tokens[consumed].token_type != TokenType::LeftBrace {
                    return parser_error(
                        format!(
                            "expected '{{' after 'else', but found {} instead",
                            tokens[consumed].describe()
                        ),
                        &tokens[consumed],
                    );
                }

                let (body, body_consumed) = parse_block(&tokens[consumed..])?;
                consumed += body_consumed;
                otherwise = Some(body);
                break;
            }
            _ => break,
        }
    }

    Ok((
        Node::If {
            branches,
            otherwise,
        },
        consumed,
    ))
}

// Parse `{ statements }`, tokens[0] being the opening brace.
fn parse_block(tokens: &[Token]) -> Result<(Vec<Node>, usize)> {
    let close = matching_brace(tokens)?;

    let (body, consumed) = parse_scope(&tokens[1..=close])?;
    if consumed + 1 != close {
        return parser_error(
            format!("unexpected {}", tokens[consumed + 1].describe()),
            &tokens[consumed + 1],
        );
    }

    Ok((body, close + 1))
}

fn matching_brace(tokens: &[Token]) -> Result<usize> {
    let mut nesting = 0;

    for (index, token) in tokens.iter().enumerate() {
        match token.token_type {
            TokenType::LeftBrace => nesting += 1,
            TokenType::RightBrace => {
                nesting -= 1;
                if nesting == 0 {
                    return Ok(index);
                }
            }
            TokenType::EOF => break,
            _ => (),
        }
    }

    parser_error("unterminated block, expected '}'", &tokens[0])
}

// Length of the condition run that precedes a block's '{'.
fn collect_condition(tokens: &[Token], keyword: &Token) -> Result<usize> {
    let mut depth = 0usize;

    for (index, token) in tokens.iter().enumerate() {
        match token.token_type {
            TokenType::LeftParen => depth += 1,
            TokenType::RightParen => depth = depth.saturating_sub(1),
            TokenType::LeftBrace if depth == 0 => return Ok(index),
            TokenType::Semicolon | TokenType::RightBrace | TokenType::EOF => {
                return parser_error(
                    format!(
                        "expected '{{' after the {} condition, but found {} instead",
                        keyword.describe(),
                        token.describe()
                    ),
                    token,
                )
            }
            _ => (),
        }
    }

    unreachable!("token slices are terminated by EOF")
}

// Length of the expression run that precedes the terminating ';'.
fn collect_until_semicolon(tokens: &[Token]) -> Result<usize> {
    for (index, token) in tokens.iter().enumerate() {
        match token.token_type {
            TokenType::Semicolon => return Ok(index),
            TokenType::LeftBrace | TokenType::RightBrace | TokenType::EOF => {
                return parser_error(
                    format!(
                        "expected ';' after expression, but found {} instead",
                        token.describe()
                    ),
                    token,
                )
            }
            _ => (),
        }
    }

    unreachable!("token slices are terminated by EOF")
}

fn expect_semicolon(token: &Token) -> Result<()> {
    if token.token_type == TokenType::Semicolon {
        Ok(())
    } else {
        parser_error(
            format!("expected ';', but found {} instead", token.describe()),
            token,
        )
    }
}

/// Reduce a run of tokens to an expression tree by splitting it around the
/// lowest-precedence operator found outside parentheses.
///
/// `anchor` is the token preceding the run and is only used to locate an
/// error when the run is empty.
pub fn parse_expression(tokens: &[Token], anchor: &Token) -> Result<Expr> {
    if tokens.is_empty() {
        return parser_error(
            format!("expected expression after {}", anchor.describe()),
            anchor,
        );
    }

    if let Some((index, operator)) = find_split(tokens)? {
        let token = &tokens[index];
        if index == 0 {
            return parser_error(
                format!("expected expression before {}", token.describe()),
                token,
            );
        }

        let left = parse_expression(&tokens[..index], token)?;
        let right = parse_expression(&tokens[index + 1..], token)?;

        return Ok(Expr::Binary {
            left: Box::new(left),
            operator,
            token: token.clone(),
            right: Box::new(right),
        });
    }

    if tokens.len() == 1 {
        return match tokens[0].token_type {
            TokenType::String(_)
            | TokenType::Number(_)
            | TokenType::Identifier(_)
            | TokenType::True
            | TokenType::False => Ok(Expr::Value(tokens[0].clone())),
            _ => parser_error(
                format!("expected value, but found {} instead", tokens[0].describe()),
                &tokens[0],
            ),
        };
    }

    let last = tokens.len() - 1;
    match (&tokens[0].token_type, &tokens[1].token_type) {
        (TokenType::LeftParen, _) if closing_paren(tokens, 0)? == last => {
            parse_expression(&tokens[1..last], &tokens[0])
        }
        (TokenType::Identifier(_), TokenType::LeftParen) if closing_paren(tokens, 1)? == last => {
            Ok(Expr::Call {
                name: tokens[0].clone(),
                arguments: parse_arguments(&tokens[1..])?,
            })
        }
        _ => parser_error(format!("unexpected {}", tokens[1].describe()), &tokens[1]),
    }
}

fn find_split(tokens: &[Token]) -> Result<Option<(usize, BinaryOp)>> {
    for class in PRECEDENCE_CASCADE {
        let mut depth = 0usize;

        for (index, token) in tokens.iter().enumerate() {
            match token.token_type {
                TokenType::LeftParen => depth += 1,
                TokenType::RightParen => match depth.checked_sub(1) {
                    Some(outer) => depth = outer,
                    None => return parser_error("unmatched ')'", token),
                },
                _ if depth == 0 => match BinaryOp::from_token(&token.token_type) {
                    Some(operator) if class.contains(&operator) => {
                        return Ok(Some((index, operator)))
                    }
                    _ => (),
                },
                _ => (),
            }
        }

        if depth != 0 {
            return parser_error("unclosed '('", &tokens[0]);
        }
    }

    Ok(None)
}

fn closing_paren(tokens: &[Token], open: usize) -> Result<usize> {
    let mut depth = 0;

    for (index, token) in tokens.iter().enumerate().skip(open) {
        match token.token_type {
            TokenType::LeftParen => depth += 1,
            TokenType::RightParen => {
                depth -= 1;
                if depth == 0 {
                    return Ok(index);
                }
            }
            _ => (),
        }
    }

    parser_error("unclosed '('", &tokens[open])
}

// Split `( a, b, ... )` into argument expressions, tokens[0] being '('.
fn parse_arguments(tokens: &[Token]) -> Result<Vec<Expr>> {
    let inner = &tokens[1..tokens.len() - 1];
    if inner.is_empty() {
        return Ok(Vec::new());
    }

    let mut arguments = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut anchor = &tokens[0];

    for (index, token) in inner.iter().enumerate() {
        match token.token_type {
            TokenType::LeftParen => depth += 1,
            TokenType::RightParen => depth = depth.saturating_sub(1),
            TokenType::Comma if depth == 0 => {
                arguments.push(parse_expression(&inner[start..index], anchor)?);
                start = index + 1;
                anchor = token;
            }
            _ => (),
        }
    }
    arguments.push(parse_expression(&inner[start..], anchor)?);

    Ok(arguments)
}
