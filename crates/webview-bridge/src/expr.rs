//! Arithmetic expression evaluator
//!
//! Backs the `calculate` operation. Input is parsed into a small AST and then
//! evaluated, so syntax errors are reported before any arithmetic error.
//!
//! Supported: integer and float literals, `+ - * / // % **`, unary `+`/`-`,
//! parentheses, the constants `pi` and `e`, and the functions `abs`, `round`,
//! `min`, `max`, `sum`, `sqrt`, `sin`, `cos`, `tan`. Integer arithmetic stays
//! integral until a float or `/` is involved.

use std::cmp::Ordering;
use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

use serde::Serialize;
use thiserror::Error;

const MAX_DEPTH: usize = 64;
/// Bounds the size of the AST; long operator chains nest as deeply as they are long.
const MAX_TOKENS: usize = 1024;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExprError {
    #[error("empty expression")]
    Empty,
    #[error("unexpected character '{0}' at position {1}")]
    UnexpectedChar(char, usize),
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("unexpected token '{0}'")]
    UnexpectedToken(String),
    #[error("invalid number literal '{0}'")]
    InvalidNumber(String),
    #[error("name '{0}' is not defined")]
    UnknownName(String),
    #[error("'{0}' is a function and must be called")]
    NotAValue(String),
    #[error("'{0}' is not callable")]
    NotCallable(String),
    #[error("{name}() expects {expected} argument(s), got {got}")]
    Arity {
        name: String,
        expected: &'static str,
        got: usize,
    },
    #[error("division by zero")]
    DivisionByZero,
    #[error("integer overflow")]
    Overflow,
    #[error("math domain error in {0}")]
    Domain(&'static str),
    #[error("result is not a finite number")]
    NotFinite,
    #[error("expression is nested too deeply")]
    TooDeep,
    #[error("expression is too long (limit {} tokens)", MAX_TOKENS)]
    TooLong,
}

/// Numeric result, kept integral where the arithmetic allows it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn type_name(&self) -> &'static str {
        match self {
            Number::Int(_) => "int",
            Number::Float(_) => "float",
        }
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    fn partial_cmp_num(&self, other: &Number) -> Option<Ordering> {
        match (*self, *other) {
            (Number::Int(a), Number::Int(b)) => Some(a.cmp(&b)),
            (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{}", i),
            Number::Float(x) => write!(f, "{:?}", x),
        }
    }
}

/// Evaluate an expression string.
pub fn evaluate(input: &str) -> Result<Number, ExprError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(ExprError::Empty);
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let ast = parser.expression()?;
    if let Some(extra) = parser.peek() {
        return Err(ExprError::UnexpectedToken(extra.to_string()));
    }

    let value = eval(&ast)?;
    match value {
        Number::Float(f) if !f.is_finite() => Err(ExprError::NotFinite),
        other => Ok(other),
    }
}

// ---------------------------------------------------------------------------
// Tokenizer

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(Number),
    Ident(String),
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    SlashSlash,
    Percent,
    LParen,
    RParen,
    Comma,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Num(n) => write!(f, "{}", n),
            Token::Ident(s) => write!(f, "{}", s),
            Token::Plus => f.write_str("+"),
            Token::Minus => f.write_str("-"),
            Token::Star => f.write_str("*"),
            Token::StarStar => f.write_str("**"),
            Token::Slash => f.write_str("/"),
            Token::SlashSlash => f.write_str("//"),
            Token::Percent => f.write_str("%"),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
            Token::Comma => f.write_str(","),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, ExprError> {
    let mut chars = input.char_indices().peekable();
    let mut tokens = Vec::new();

    while let Some(&(pos, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let token = match c {
            '0'..='9' | '.' => read_number(&mut chars)?,
            c if c.is_alphabetic() || c == '_' => {
                let mut name = String::new();
                while let Some(&(_, nc)) = chars.peek() {
                    if nc.is_alphanumeric() || nc == '_' {
                        name.push(nc);
                        chars.next();
                    } else {
                        break;
                    }
                }
                Token::Ident(name)
            }
            _ => {
                chars.next();
                match c {
                    '+' => Token::Plus,
                    '-' => Token::Minus,
                    '*' if next_is(&mut chars, '*') => Token::StarStar,
                    '*' => Token::Star,
                    '/' if next_is(&mut chars, '/') => Token::SlashSlash,
                    '/' => Token::Slash,
                    '%' => Token::Percent,
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    ',' => Token::Comma,
                    other => return Err(ExprError::UnexpectedChar(other, pos)),
                }
            }
        };
        if tokens.len() == MAX_TOKENS {
            return Err(ExprError::TooLong);
        }
        tokens.push(token);
    }

    Ok(tokens)
}

fn next_is(chars: &mut Peekable<CharIndices<'_>>, expected: char) -> bool {
    if chars.peek().map(|&(_, c)| c) == Some(expected) {
        chars.next();
        true
    } else {
        false
    }
}

fn read_number(chars: &mut Peekable<CharIndices<'_>>) -> Result<Token, ExprError> {
    let mut text = String::new();
    let mut is_float = false;

    while let Some(&(_, c)) = chars.peek() {
        if c.is_ascii_digit() || c == '_' {
            text.push(c);
        } else if c == '.' && !is_float {
            is_float = true;
            text.push(c);
        } else {
            break;
        }
        chars.next();
    }

    // Exponent only when followed by digits; "2e" leaves `e` as a name.
    if matches!(chars.peek(), Some(&(_, 'e' | 'E'))) {
        let mut lookahead = chars.clone();
        lookahead.next();
        let mut exponent = String::from("e");
        if let Some(&(_, sign @ ('+' | '-'))) = lookahead.peek() {
            exponent.push(sign);
            lookahead.next();
        }
        if lookahead.peek().is_some_and(|&(_, c)| c.is_ascii_digit()) {
            while let Some(&(_, c)) = lookahead.peek() {
                if !c.is_ascii_digit() {
                    break;
                }
                exponent.push(c);
                lookahead.next();
            }
            *chars = lookahead;
            text.push_str(&exponent);
            is_float = true;
        }
    }

    let clean: String = text.chars().filter(|&c| c != '_').collect();
    if clean == "." || text.starts_with('_') || text.ends_with('_') {
        return Err(ExprError::InvalidNumber(text));
    }

    if is_float {
        clean
            .parse::<f64>()
            .map(|f| Token::Num(Number::Float(f)))
            .map_err(|_| ExprError::InvalidNumber(text))
    } else {
        clean
            .parse::<i64>()
            .map(|i| Token::Num(Number::Int(i)))
            .map_err(|_| ExprError::Overflow)
    }
}

// ---------------------------------------------------------------------------
// Parser

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Num(Number),
    Name(String),
    Neg(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), ExprError> {
        match self.advance() {
            Some(t) if t == expected => Ok(()),
            Some(t) => Err(ExprError::UnexpectedToken(t.to_string())),
            None => Err(ExprError::UnexpectedEnd),
        }
    }

    fn enter(&mut self) -> Result<(), ExprError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExprError::TooDeep);
        }
        Ok(())
    }

    // expression := term (("+" | "-") term)*
    fn expression(&mut self) -> Result<Expr, ExprError> {
        self.enter()?;
        let mut lhs = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.term()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        self.depth -= 1;
        Ok(lhs)
    }

    // term := factor (("*" | "/" | "//" | "%") factor)*
    fn term(&mut self) -> Result<Expr, ExprError> {
        let mut lhs = self.factor()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                Some(Token::SlashSlash) => BinOp::FloorDiv,
                Some(Token::Percent) => BinOp::Mod,
                _ => break,
            };
            self.advance();
            let rhs = self.factor()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    // factor := ("+" | "-") factor | power
    fn factor(&mut self) -> Result<Expr, ExprError> {
        match self.peek() {
            Some(Token::Plus) => {
                self.advance();
                self.enter()?;
                let inner = self.factor()?;
                self.depth -= 1;
                Ok(inner)
            }
            Some(Token::Minus) => {
                self.advance();
                self.enter()?;
                let inner = self.factor()?;
                self.depth -= 1;
                Ok(Expr::Neg(Box::new(inner)))
            }
            _ => self.power(),
        }
    }

    // power := atom ("**" factor)?
    fn power(&mut self) -> Result<Expr, ExprError> {
        let base = self.atom()?;
        if self.peek() == Some(&Token::StarStar) {
            self.advance();
            self.enter()?;
            let exponent = self.factor()?;
            self.depth -= 1;
            return Ok(Expr::Binary(BinOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn atom(&mut self) -> Result<Expr, ExprError> {
        match self.advance() {
            Some(Token::Num(n)) => Ok(Expr::Num(n)),
            Some(Token::Ident(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    self.advance();
                    let args = self.arguments()?;
                    Ok(Expr::Call(name, args))
                } else {
                    Ok(Expr::Name(name))
                }
            }
            Some(Token::LParen) => {
                let inner = self.expression()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(other) => Err(ExprError::UnexpectedToken(other.to_string())),
            None => Err(ExprError::UnexpectedEnd),
        }
    }

    fn arguments(&mut self) -> Result<Vec<Expr>, ExprError> {
        let mut args = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            match self.advance() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => return Ok(args),
                Some(other) => return Err(ExprError::UnexpectedToken(other.to_string())),
                None => return Err(ExprError::UnexpectedEnd),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluation

const FUNCTIONS: &[&str] = &["abs", "round", "min", "max", "sum", "sqrt", "sin", "cos", "tan"];

fn eval(expr: &Expr) -> Result<Number, ExprError> {
    match expr {
        Expr::Num(n) => Ok(*n),
        Expr::Name(name) => constant(name),
        Expr::Neg(inner) => match eval(inner)? {
            Number::Int(i) => i.checked_neg().map(Number::Int).ok_or(ExprError::Overflow),
            Number::Float(f) => Ok(Number::Float(-f)),
        },
        Expr::Binary(op, lhs, rhs) => binary(*op, eval(lhs)?, eval(rhs)?),
        Expr::Call(name, args) => {
            let values = args.iter().map(eval).collect::<Result<Vec<_>, _>>()?;
            call(name, &values)
        }
    }
}

fn constant(name: &str) -> Result<Number, ExprError> {
    match name {
        "pi" => Ok(Number::Float(std::f64::consts::PI)),
        "e" => Ok(Number::Float(std::f64::consts::E)),
        _ if FUNCTIONS.contains(&name) => Err(ExprError::NotAValue(name.to_string())),
        _ => Err(ExprError::UnknownName(name.to_string())),
    }
}

fn binary(op: BinOp, lhs: Number, rhs: Number) -> Result<Number, ExprError> {
    use Number::{Float, Int};

    match (op, lhs, rhs) {
        (BinOp::Add, Int(a), Int(b)) => a.checked_add(b).map(Int).ok_or(ExprError::Overflow),
        (BinOp::Sub, Int(a), Int(b)) => a.checked_sub(b).map(Int).ok_or(ExprError::Overflow),
        (BinOp::Mul, Int(a), Int(b)) => a.checked_mul(b).map(Int).ok_or(ExprError::Overflow),
        (BinOp::Add, a, b) => Ok(Float(a.as_f64() + b.as_f64())),
        (BinOp::Sub, a, b) => Ok(Float(a.as_f64() - b.as_f64())),
        (BinOp::Mul, a, b) => Ok(Float(a.as_f64() * b.as_f64())),

        (BinOp::Div, a, b) => {
            let divisor = b.as_f64();
            if divisor == 0.0 {
                return Err(ExprError::DivisionByZero);
            }
            Ok(Float(a.as_f64() / divisor))
        }

        (BinOp::FloorDiv, Int(a), Int(b)) => {
            if b == 0 {
                return Err(ExprError::DivisionByZero);
            }
            let q = a.checked_div(b).ok_or(ExprError::Overflow)?;
            if a % b != 0 && ((a < 0) != (b < 0)) {
                Ok(Int(q - 1))
            } else {
                Ok(Int(q))
            }
        }
        (BinOp::FloorDiv, a, b) => {
            let divisor = b.as_f64();
            if divisor == 0.0 {
                return Err(ExprError::DivisionByZero);
            }
            Ok(Float((a.as_f64() / divisor).floor()))
        }

        // Remainder takes the sign of the divisor.
        (BinOp::Mod, Int(a), Int(b)) => {
            if b == 0 {
                return Err(ExprError::DivisionByZero);
            }
            let r = a.checked_rem(b).ok_or(ExprError::Overflow)?;
            if r != 0 && ((r < 0) != (b < 0)) {
                Ok(Int(r + b))
            } else {
                Ok(Int(r))
            }
        }
        (BinOp::Mod, a, b) => {
            let divisor = b.as_f64();
            if divisor == 0.0 {
                return Err(ExprError::DivisionByZero);
            }
            let r = a.as_f64() % divisor;
            if r != 0.0 && ((r < 0.0) != (divisor < 0.0)) {
                Ok(Float(r + divisor))
            } else {
                Ok(Float(r))
            }
        }

        (BinOp::Pow, Int(a), Int(b)) if b >= 0 => {
            let exp = u32::try_from(b).map_err(|_| ExprError::Overflow)?;
            a.checked_pow(exp).map(Int).ok_or(ExprError::Overflow)
        }
        (BinOp::Pow, a, b) => {
            let (base, exp) = (a.as_f64(), b.as_f64());
            if base == 0.0 && exp < 0.0 {
                return Err(ExprError::DivisionByZero);
            }
            let result = base.powf(exp);
            if result.is_nan() {
                return Err(ExprError::Domain("**"));
            }
            Ok(Float(result))
        }
    }
}

fn call(name: &str, args: &[Number]) -> Result<Number, ExprError> {
    let arity = |expected: &'static str| ExprError::Arity {
        name: name.to_string(),
        expected,
        got: args.len(),
    };

    match name {
        "abs" => match args {
            [Number::Int(i)] => i.checked_abs().map(Number::Int).ok_or(ExprError::Overflow),
            [Number::Float(f)] => Ok(Number::Float(f.abs())),
            _ => Err(arity("1")),
        },
        "round" => match args {
            [Number::Int(i)] => Ok(Number::Int(*i)),
            [Number::Float(f)] => float_to_int(f.round_ties_even()),
            [Number::Int(i), Number::Int(_)] => Ok(Number::Int(*i)),
            [Number::Float(f), Number::Int(digits)] => {
                let digits = i32::try_from(*digits).map_err(|_| ExprError::Overflow)?;
                let scale = 10f64.powi(digits);
                Ok(Number::Float((f * scale).round_ties_even() / scale))
            }
            [_, Number::Float(_)] => Err(ExprError::Domain("round")),
            _ => Err(arity("1 or 2")),
        },
        "min" | "max" => {
            let (first, rest) = args.split_first().ok_or_else(|| arity("at least 1"))?;
            let wanted = if name == "min" {
                Ordering::Less
            } else {
                Ordering::Greater
            };
            let mut best = *first;
            for candidate in rest {
                if candidate.partial_cmp_num(&best) == Some(wanted) {
                    best = *candidate;
                }
            }
            Ok(best)
        }
        "sum" => args
            .iter()
            .try_fold(Number::Int(0), |total, x| binary(BinOp::Add, total, *x)),
        "sqrt" => match args {
            [x] if x.as_f64() < 0.0 => Err(ExprError::Domain("sqrt")),
            [x] => Ok(Number::Float(x.as_f64().sqrt())),
            _ => Err(arity("1")),
        },
        "sin" | "cos" | "tan" => match args {
            [x] => {
                let x = x.as_f64();
                Ok(Number::Float(match name {
                    "sin" => x.sin(),
                    "cos" => x.cos(),
                    _ => x.tan(),
                }))
            }
            _ => Err(arity("1")),
        },
        "pi" | "e" => Err(ExprError::NotCallable(name.to_string())),
        _ => Err(ExprError::UnknownName(name.to_string())),
    }
}

fn float_to_int(f: f64) -> Result<Number, ExprError> {
    if !f.is_finite() {
        return Err(ExprError::NotFinite);
    }
    if f < i64::MIN as f64 || f >= i64::MAX as f64 {
        return Err(ExprError::Overflow);
    }
    Ok(Number::Int(f as i64))
}
