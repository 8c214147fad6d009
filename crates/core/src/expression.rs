//! Selector expressions
//!
//! A small quotation layer over closure syntax. Selectors such as
//! `|p| p.first_name` or `p => p.first_name` are parsed into an [`Expr`]
//! tree that [`crate::locate`] can inspect. The grammar covers enough of
//! the expression language to tell member accesses apart from everything
//! else:
//!
//! ```text
//! lambda  := '|' ident [':' ident] '|' expr
//!          | ident '=>' expr
//! expr    := term (('+' | '-') term)*
//! term    := cast (('*' | '/') cast)*
//! cast    := postfix ('as' ident)*
//! postfix := primary ('.' ident ['(' args ')'] | '[' expr ']')*
//! primary := ident | number | string | '(' expr ')'
//! ```

use std::fmt;
use std::marker::PhantomData;

use logos::Logos;
use serde::{Deserialize, Serialize};

use crate::error::{ReflectError, Result};
use crate::types::Reflect;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl BinaryOp {
    fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Number(String),
    Text(String),
}

/// Expression tree of a selector body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// Reference to a name, usually the lambda parameter
    Parameter(String),
    /// `target.name`
    Member { target: Box<Expr>, name: String },
    /// `operand as Type`
    Convert { operand: Box<Expr>, to: String },
    /// `target.method(args)`
    Call {
        target: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },
    /// `target[index]`
    Index { target: Box<Expr>, index: Box<Expr> },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Literal(Literal),
}

impl Expr {
    /// Short description of the node kind, for diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Expr::Parameter(_) => "parameter",
            Expr::Member { .. } => "member access",
            Expr::Convert { .. } => "conversion",
            Expr::Call { .. } => "method call",
            Expr::Index { .. } => "indexer",
            Expr::Binary { .. } => "binary expression",
            Expr::Literal(_) => "literal",
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Parameter(name) => f.write_str(name),
            Expr::Member { target, name } => write!(f, "{}.{}", target, name),
            Expr::Convert { operand, to } => write!(f, "({} as {})", operand, to),
            Expr::Call {
                target,
                method,
                args,
            } => {
                write!(f, "{}.{}(", target, method)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(")")
            }
            Expr::Index { target, index } => write!(f, "{}[{}]", target, index),
            Expr::Binary { op, lhs, rhs } => write!(f, "({} {} {})", lhs, op.symbol(), rhs),
            Expr::Literal(Literal::Number(n)) => f.write_str(n),
            Expr::Literal(Literal::Text(s)) => write!(f, "{:?}", s),
        }
    }
}

/// A single-parameter lambda
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lambda {
    pub parameter: String,
    pub body: Expr,
}

impl Lambda {
    /// Parse lambda source text
    ///
    /// # Errors
    ///
    /// [`ReflectError::NullArgument`] for blank text,
    /// [`ReflectError::InvalidSelector`] for text outside the grammar.
    pub fn parse(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Err(ReflectError::NullArgument("selector"));
        }
        let tokens = tokenize(text)?;
        Parser {
            source: text,
            tokens,
            pos: 0,
        }
        .lambda()
    }
}

impl fmt::Display for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "|{}| {}", self.parameter, self.body)
    }
}

/// A lambda selecting a `V` from an `O`
pub struct Selector<O, V> {
    lambda: Lambda,
    _marker: PhantomData<fn(&O) -> V>,
}

impl<O: Reflect, V: Reflect> Selector<O, V> {
    pub fn parse(text: &str) -> Result<Self> {
        Lambda::parse(text).map(Self::from_lambda)
    }

    pub fn from_lambda(lambda: Lambda) -> Self {
        Self {
            lambda,
            _marker: PhantomData,
        }
    }

    pub fn lambda(&self) -> &Lambda {
        &self.lambda
    }
}

impl<O, V> Clone for Selector<O, V> {
    fn clone(&self) -> Self {
        Self {
            lambda: self.lambda.clone(),
            _marker: PhantomData,
        }
    }
}

impl<O, V> fmt::Debug for Selector<O, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Selector").field(&self.lambda).finish()
    }
}

impl<O, V> fmt::Display for Selector<O, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.lambda, f)
    }
}

/// Quote closure syntax into a [`Selector`]
///
/// ```
/// use reflect_kit_core::{selector, types::{Reflect, TypeBuilder, TypeInfo}};
///
/// struct Point { x: i32 }
///
/// impl Reflect for Point {
///     fn describe() -> TypeBuilder<Self> {
///         TypeInfo::builder::<Point>("Point").field("x", |p: &Point| &p.x)
///     }
/// }
///
/// let selector = selector!(|p: Point| -> i32 { p.x }).unwrap();
/// let member = reflect_kit_core::locate(&selector).unwrap();
/// assert_eq!(member.name(), "x");
/// ```
#[macro_export]
macro_rules! selector {
    (|$param:ident : $owner:ty| -> $value:ty { $($body:tt)+ }) => {
        $crate::expression::Selector::<$owner, $value>::parse(concat!(
            "|",
            stringify!($param),
            "| ",
            stringify!($($body)+)
        ))
    };
    (|$param:ident : $owner:ty| $($body:tt)+) => {
        $crate::expression::Selector::<$owner, _>::parse(concat!(
            "|",
            stringify!($param),
            "| ",
            stringify!($($body)+)
        ))
    };
}

/// Selector tokens, produced by logos
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
enum Token {
    #[token("as")]
    As,

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),

    #[regex(r"[0-9][0-9_]*", |lex| lex.slice().to_string())]
    Number(String),

    #[regex(r#""[^"]*""#, unquote)]
    Text(String),

    #[token(".")]
    Dot,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token("|")]
    Pipe,
    #[token("=>")]
    FatArrow,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
}

impl Token {
    fn binary_op(&self) -> Option<BinaryOp> {
        match self {
            Token::Plus => Some(BinaryOp::Add),
            Token::Minus => Some(BinaryOp::Subtract),
            Token::Star => Some(BinaryOp::Multiply),
            Token::Slash => Some(BinaryOp::Divide),
            _ => None,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::As => f.write_str("as"),
            Token::Ident(s) | Token::Number(s) => f.write_str(s),
            Token::Text(s) => write!(f, "{:?}", s),
            Token::Dot => f.write_str("."),
            Token::Comma => f.write_str(","),
            Token::Colon => f.write_str(":"),
            Token::Pipe => f.write_str("|"),
            Token::FatArrow => f.write_str("=>"),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
            Token::LBracket => f.write_str("["),
            Token::RBracket => f.write_str("]"),
            Token::Plus | Token::Minus | Token::Star | Token::Slash => {
                f.write_str(self.binary_op().map_or("", BinaryOp::symbol))
            }
        }
    }
}

fn unquote(lex: &mut logos::Lexer<Token>) -> String {
    let quoted = lex.slice();
    quoted[1..quoted.len() - 1].to_string()
}

fn invalid(source: &str, reason: impl Into<String>) -> ReflectError {
    ReflectError::InvalidSelector {
        selector: source.to_string(),
        reason: reason.into(),
    }
}

fn tokenize(source: &str) -> Result<Vec<Token>> {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();

    while let Some(token) = lexer.next() {
        match token {
            Ok(token) => tokens.push(token),
            Err(()) => {
                return Err(invalid(
                    source,
                    format!("unexpected input '{}' at offset {}", lexer.slice(), lexer.span().start),
                ))
            }
        }
    }

    Ok(tokens)
}

struct Parser<'s> {
    source: &'s str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn lambda(mut self) -> Result<Lambda> {
        let parameter = match self.next() {
            Some(Token::Pipe) => {
                let name = self.ident()?;
                if self.eat(&Token::Colon) {
                    self.ident()?;
                }
                self.expect(&Token::Pipe)?;
                name
            }
            Some(Token::Ident(name)) => {
                self.expect(&Token::FatArrow)?;
                name
            }
            other => return Err(self.unexpected(other, "a lambda parameter")),
        };

        let body = self.expr()?;
        if let Some(token) = self.next() {
            return Err(self.unexpected(Some(token), "end of selector"));
        }
        Ok(Lambda { parameter, body })
    }

    fn expr(&mut self) -> Result<Expr> {
        let mut lhs = self.term()?;
        while let Some(op @ (BinaryOp::Add | BinaryOp::Subtract)) = self.peek().and_then(Token::binary_op) {
            self.pos += 1;
            let rhs = self.term()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn term(&mut self) -> Result<Expr> {
        let mut lhs = self.cast()?;
        while let Some(op @ (BinaryOp::Multiply | BinaryOp::Divide)) = self.peek().and_then(Token::binary_op) {
            self.pos += 1;
            let rhs = self.cast()?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
        Ok(lhs)
    }

    fn cast(&mut self) -> Result<Expr> {
        let mut operand = self.postfix()?;
        while self.eat(&Token::As) {
            let to = self.ident()?;
            operand = Expr::Convert {
                operand: Box::new(operand),
                to,
            };
        }
        Ok(operand)
    }

    fn postfix(&mut self) -> Result<Expr> {
        let mut target = self.primary()?;
        loop {
            if self.eat(&Token::Dot) {
                let name = self.ident()?;
                if self.eat(&Token::LParen) {
                    let args = self.args()?;
                    target = Expr::Call {
                        target: Box::new(target),
                        method: name,
                        args,
                    };
                } else {
                    target = Expr::Member {
                        target: Box::new(target),
                        name,
                    };
                }
            } else if self.eat(&Token::LBracket) {
                let index = self.expr()?;
                self.expect(&Token::RBracket)?;
                target = Expr::Index {
                    target: Box::new(target),
                    index: Box::new(index),
                };
            } else {
                return Ok(target);
            }
        }
    }

    fn args(&mut self) -> Result<Vec<Expr>> {
        let mut args = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.expr()?);
            if self.eat(&Token::RParen) {
                return Ok(args);
            }
            self.expect(&Token::Comma)?;
        }
    }

    fn primary(&mut self) -> Result<Expr> {
        match self.next() {
            Some(Token::Ident(name)) => Ok(Expr::Parameter(name)),
            Some(Token::Number(n)) => Ok(Expr::Literal(Literal::Number(n))),
            Some(Token::Text(s)) => Ok(Expr::Literal(Literal::Text(s))),
            Some(Token::LParen) => {
                let inner = self.expr()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            other => Err(self.unexpected(other, "an expression")),
        }
    }

    fn ident(&mut self) -> Result<String> {
        match self.next() {
            Some(Token::Ident(name)) => Ok(name),
            other => Err(self.unexpected(other, "an identifier")),
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<()> {
        if self.eat(expected) {
            Ok(())
        } else {
            let found = self.next();
            Err(self.unexpected(found, &format!("'{}'", expected)))
        }
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn unexpected(&self, found: Option<Token>, expected: &str) -> ReflectError {
        let found = found.map_or_else(|| "end of input".to_string(), |t| format!("'{}'", t));
        invalid(self.source, format!("expected {}, found {}", expected, found))
    }
}
