//! Tokenizer and recursive-descent parser for template expressions.

use super::{BinaryOp, Expr, ExprError, UnaryOp};
use crate::variables::parse_path;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
    Comma,
}

/// Longest operators first so `>=` is not read as `>` then `=`.
const OPERATORS: &[&str] = &[
    "&&", "||", "==", "!=", ">=", "<=", ">", "<", "=", "!", "+", "-", "*", "/", "%",
];

fn tokenize(src: &str) -> Result<Vec<(usize, Token)>, ExprError> {
    let mut tokens = Vec::new();
    let chars: Vec<(usize, char)> = src.char_indices().collect();
    let mut i = 0;

    while i < chars.len() {
        let (pos, c) = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c.is_ascii_digit() {
            let start = i;
            while i < chars.len() && (chars[i].1.is_ascii_digit() || chars[i].1 == '.') {
                i += 1;
            }
            let end = chars.get(i).map(|(p, _)| *p).unwrap_or(src.len());
            let text = &src[pos..end];
            let value = text.parse::<f64>().map_err(|_| ExprError::Parse {
                position: chars[start].0,
                message: format!("invalid number '{text}'"),
            })?;
            tokens.push((pos, Token::Number(value)));
            continue;
        }

        if c == '"' || c == '\'' {
            let quote = c;
            let mut value = String::new();
            i += 1;
            let mut closed = false;
            while i < chars.len() {
                let ch = chars[i].1;
                if ch == '\\' && i + 1 < chars.len() {
                    value.push(chars[i + 1].1);
                    i += 2;
                    continue;
                }
                if ch == quote {
                    closed = true;
                    i += 1;
                    break;
                }
                value.push(ch);
                i += 1;
            }
            if !closed {
                return Err(ExprError::Parse {
                    position: pos,
                    message: "unterminated string".to_string(),
                });
            }
            tokens.push((pos, Token::Str(value)));
            continue;
        }

        if c.is_ascii_alphabetic() || c == '_' {
            let mut end = i;
            let mut depth = 0usize;
            // Paths may contain `.key` and `[n]` segments
            while end < chars.len() {
                let ch = chars[end].1;
                if ch.is_ascii_alphanumeric() || ch == '_' || ch == '.' {
                    end += 1;
                } else if ch == '[' {
                    depth += 1;
                    end += 1;
                } else if ch == ']' && depth > 0 {
                    depth -= 1;
                    end += 1;
                } else {
                    break;
                }
            }
            let end_pos = chars.get(end).map(|(p, _)| *p).unwrap_or(src.len());
            tokens.push((pos, Token::Ident(src[pos..end_pos].to_string())));
            i = end;
            continue;
        }

        match c {
            '(' => {
                tokens.push((pos, Token::LParen));
                i += 1;
                continue;
            }
            ')' => {
                tokens.push((pos, Token::RParen));
                i += 1;
                continue;
            }
            ',' => {
                tokens.push((pos, Token::Comma));
                i += 1;
                continue;
            }
            _ => {}
        }

        let rest = &src[pos..];
        match OPERATORS.iter().find(|op| rest.starts_with(**op)) {
            Some(op) => {
                tokens.push((pos, Token::Op(op)));
                i += op.chars().count();
            }
            None => {
                return Err(ExprError::Parse {
                    position: pos,
                    message: format!("unexpected character '{c}'"),
                });
            }
        }
    }

    Ok(tokens)
}

/// Parse an expression.
pub fn parse(src: &str) -> Result<Expr, ExprError> {
    let tokens = tokenize(src)?;
    if tokens.is_empty() {
        return Err(ExprError::Parse {
            position: 0,
            message: "empty expression".to_string(),
        });
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        src_len: src.len(),
    };
    let expr = parser.or()?;
    if let Some((position, token)) = parser.tokens.get(parser.pos) {
        return Err(ExprError::Parse {
            position: *position,
            message: format!("unexpected {token:?}"),
        });
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
    src_len: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn position(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|(p, _)| *p)
            .unwrap_or(self.src_len)
    }

    fn error(&self, message: impl Into<String>) -> ExprError {
        ExprError::Parse {
            position: self.position(),
            message: message.into(),
        }
    }

    /// Consume an operator (or its word form) if it is next.
    fn eat_op(&mut self, symbol: &str, word: Option<&str>) -> bool {
        let matched = match self.peek() {
            Some(Token::Op(op)) => *op == symbol,
            Some(Token::Ident(id)) => word.is_some_and(|w| id.eq_ignore_ascii_case(w)),
            _ => false,
        };
        if matched {
            self.pos += 1;
        }
        matched
    }

    fn or(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.and()?;
        while self.eat_op("||", Some("OR")) {
            let right = self.and()?;
            left = Expr::binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.comparison()?;
        while self.eat_op("&&", Some("AND")) {
            let right = self.comparison()?;
            left = Expr::binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn comparison(&mut self) -> Result<Expr, ExprError> {
        let left = self.additive()?;
        let op = match self.peek() {
            Some(Token::Op("==")) | Some(Token::Op("=")) => BinaryOp::Eq,
            Some(Token::Op("!=")) => BinaryOp::Ne,
            Some(Token::Op(">")) => BinaryOp::Gt,
            Some(Token::Op(">=")) => BinaryOp::Ge,
            Some(Token::Op("<")) => BinaryOp::Lt,
            Some(Token::Op("<=")) => BinaryOp::Le,
            _ => return Ok(left),
        };
        self.pos += 1;
        let right = self.additive()?;
        Ok(Expr::binary(op, left, right))
    }

    fn additive(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Op("+")) => BinaryOp::Add,
                Some(Token::Op("-")) => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.multiplicative()?;
            left = Expr::binary(op, left, right);
        }
    }

    fn multiplicative(&mut self) -> Result<Expr, ExprError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Op("*")) => BinaryOp::Mul,
                Some(Token::Op("/")) => BinaryOp::Div,
                Some(Token::Op("%")) => BinaryOp::Rem,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.unary()?;
            left = Expr::binary(op, left, right);
        }
    }

    fn unary(&mut self) -> Result<Expr, ExprError> {
        if self.eat_op("!", Some("NOT")) {
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(self.unary()?)));
        }
        if self.eat_op("-", None) {
            return Ok(Expr::Unary(UnaryOp::Neg, Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, ExprError> {
        let Some((_, token)) = self.tokens.get(self.pos).cloned() else {
            return Err(self.error("unexpected end of expression"));
        };

        match token {
            Token::Number(n) => {
                self.pos += 1;
                Ok(Expr::Number(n))
            }
            Token::Str(s) => {
                self.pos += 1;
                Ok(Expr::Str(s))
            }
            Token::LParen => {
                self.pos += 1;
                let inner = self.or()?;
                if self.peek() != Some(&Token::RParen) {
                    return Err(self.error("expected ')'"));
                }
                self.pos += 1;
                Ok(inner)
            }
            Token::Ident(name) => {
                self.pos += 1;
                if self.peek() == Some(&Token::LParen) {
                    self.pos += 1;
                    let args = self.arguments()?;
                    return Ok(Expr::Call(name.to_ascii_uppercase(), args));
                }
                match name.as_str() {
                    "true" | "TRUE" => Ok(Expr::Bool(true)),
                    "false" | "FALSE" => Ok(Expr::Bool(false)),
                    "null" | "NULL" => Ok(Expr::Null),
                    _ => {
                        let path = parse_path(&name).ok_or_else(|| ExprError::Parse {
                            position: self.tokens[self.pos - 1].0,
                            message: format!("invalid variable path '{name}'"),
                        })?;
                        Ok(Expr::Path(name, path))
                    }
                }
            }
            other => Err(self.error(format!("unexpected {other:?}"))),
        }
    }

    fn arguments(&mut self) -> Result<Vec<Expr>, ExprError> {
        let mut args = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.pos += 1;
            return Ok(args);
        }
        loop {
            args.push(self.or()?);
            match self.peek() {
                Some(Token::Comma) => self.pos += 1,
                Some(Token::RParen) => {
                    self.pos += 1;
                    return Ok(args);
                }
                _ => return Err(self.error("expected ',' or ')'")),
            }
        }
    }
}
