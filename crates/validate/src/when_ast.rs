// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The restricted `when` predicate grammar (§4.3 "Job gating — when").
//!
//! Parsed once at validation time and reused by the run executor for
//! evaluation, rather than re-parsed per job (§9 "parse once at load").
//! Accepted node set: `BoolOp {And, Or}`, `Not`, `Compare {Eq, NotEq, Lt,
//! LtE, Gt, GtE}`, `Name`/`Attribute` (only rooted at `jobs`), and
//! constants (`true`/`false`, numbers, quoted strings). Everything else is
//! rejected at parse time.

use serde_json::Value;
use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Compare(Box<Expr>, CompareOp, Box<Expr>),
    /// A dotted attribute path rooted at an allowed name, e.g. `jobs.a.outputs.k`.
    Attribute(Vec<String>),
    Constant(Value),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhenParseError(pub String);

impl fmt::Display for WhenParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid `when` expression: {}", self.0)
    }
}

impl std::error::Error for WhenParseError {}

/// Parse a `when` expression string, rejecting anything outside the
/// restricted AST, and requiring the only reachable root name to be `jobs`.
pub fn parse(src: &str) -> Result<Expr, WhenParseError> {
    let mut p = Parser::new(src);
    let expr = p.parse_or()?;
    p.skip_ws();
    if p.peek().is_some() {
        return Err(WhenParseError(format!("unexpected trailing input in `{src}`")));
    }
    validate_roots(&expr)?;
    Ok(expr)
}

fn validate_roots(expr: &Expr) -> Result<(), WhenParseError> {
    match expr {
        Expr::Or(a, b) | Expr::And(a, b) => {
            validate_roots(a)?;
            validate_roots(b)
        }
        Expr::Not(a) => validate_roots(a),
        Expr::Compare(a, _, b) => {
            validate_roots(a)?;
            validate_roots(b)
        }
        Expr::Attribute(parts) => {
            if parts.first().map(String::as_str) != Some("jobs") {
                return Err(WhenParseError(format!(
                    "the only allowed root name is `jobs`, got `{}`",
                    parts.first().cloned().unwrap_or_default()
                )));
            }
            Ok(())
        }
        Expr::Constant(_) => Ok(()),
    }
}

struct Parser<'a> {
    src: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, chars: src.char_indices().peekable() }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn rest(&mut self) -> &'a str {
        match self.chars.peek() {
            Some((idx, _)) => &self.src[*idx..],
            None => "",
        }
    }

    fn consume_keyword(&mut self, kw: &str) -> bool {
        self.skip_ws();
        let rest = self.rest();
        if rest.starts_with(kw) {
            let after = rest.as_bytes().get(kw.len()).copied();
            let boundary = after.is_none() || !(after.unwrap() as char).is_alphanumeric();
            if boundary {
                for _ in 0..kw.chars().count() {
                    self.chars.next();
                }
                return true;
            }
        }
        false
    }

    fn consume_op(&mut self, op: &str) -> bool {
        self.skip_ws();
        if self.rest().starts_with(op) {
            for _ in 0..op.chars().count() {
                self.chars.next();
            }
            true
        } else {
            false
        }
    }

    fn parse_or(&mut self) -> Result<Expr, WhenParseError> {
        let mut left = self.parse_and()?;
        loop {
            let save = self.rest();
            if self.consume_keyword("or") {
                let right = self.parse_and()?;
                left = Expr::Or(Box::new(left), Box::new(right));
            } else {
                let _ = save;
                break;
            }
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, WhenParseError> {
        let mut left = self.parse_not()?;
        loop {
            if self.consume_keyword("and") {
                let right = self.parse_not()?;
                left = Expr::And(Box::new(left), Box::new(right));
            } else {
                break;
            }
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, WhenParseError> {
        if self.consume_keyword("not") {
            let inner = self.parse_not()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_compare()
    }

    fn parse_compare(&mut self) -> Result<Expr, WhenParseError> {
        let left = self.parse_atom()?;
        self.skip_ws();
        let op = if self.consume_op("==") {
            Some(CompareOp::Eq)
        } else if self.consume_op("!=") {
            Some(CompareOp::NotEq)
        } else if self.consume_op("<=") {
            Some(CompareOp::LtE)
        } else if self.consume_op(">=") {
            Some(CompareOp::GtE)
        } else if self.consume_op("<") {
            Some(CompareOp::Lt)
        } else if self.consume_op(">") {
            Some(CompareOp::Gt)
        } else {
            None
        };
        match op {
            Some(op) => {
                let right = self.parse_atom()?;
                Ok(Expr::Compare(Box::new(left), op, Box::new(right)))
            }
            None => Ok(left),
        }
    }

    fn parse_atom(&mut self) -> Result<Expr, WhenParseError> {
        self.skip_ws();
        match self.peek() {
            Some('(') => {
                self.chars.next();
                let inner = self.parse_or()?;
                self.skip_ws();
                if self.peek() != Some(')') {
                    return Err(WhenParseError("unbalanced parentheses".to_string()));
                }
                self.chars.next();
                Ok(inner)
            }
            Some('"') | Some('\'') => self.parse_string(),
            Some(c) if c.is_ascii_digit() || c == '-' => self.parse_number(),
            Some(c) if c.is_alphabetic() || c == '_' => self.parse_ident_or_bool(),
            other => Err(WhenParseError(format!("unexpected character {other:?}"))),
        }
    }

    fn parse_string(&mut self) -> Result<Expr, WhenParseError> {
        let quote = self.peek().expect("checked by caller");
        self.chars.next();
        let mut s = String::new();
        loop {
            match self.chars.next() {
                Some((_, c)) if c == quote => break,
                Some((_, c)) => s.push(c),
                None => return Err(WhenParseError("unterminated string literal".to_string())),
            }
        }
        Ok(Expr::Constant(Value::String(s)))
    }

    fn parse_number(&mut self) -> Result<Expr, WhenParseError> {
        let mut s = String::new();
        if self.peek() == Some('-') {
            s.push('-');
            self.chars.next();
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '.') {
            s.push(self.chars.next().expect("checked by peek").1);
        }
        let n: f64 = s
            .parse()
            .map_err(|_| WhenParseError(format!("invalid number literal `{s}`")))?;
        let value = serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null);
        Ok(Expr::Constant(value))
    }

    fn parse_ident_or_bool(&mut self) -> Result<Expr, WhenParseError> {
        let mut parts = vec![self.parse_ident()?];
        while self.peek() == Some('.') {
            self.chars.next();
            parts.push(self.parse_ident()?);
        }
        if parts.len() == 1 {
            match parts[0].as_str() {
                "true" | "True" => return Ok(Expr::Constant(Value::Bool(true))),
                "false" | "False" => return Ok(Expr::Constant(Value::Bool(false))),
                _ => {}
            }
        }
        Ok(Expr::Attribute(parts))
    }

    fn parse_ident(&mut self) -> Result<String, WhenParseError> {
        self.skip_ws();
        let mut s = String::new();
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            s.push(self.chars.next().expect("checked by peek").1);
        }
        if s.is_empty() {
            return Err(WhenParseError("expected identifier".to_string()));
        }
        Ok(s)
    }
}

/// Evaluate a parsed expression against the current `jobs.<id>.outputs.*` map.
pub fn evaluate(expr: &Expr, jobs_outputs: &Value) -> bool {
    eval_value(expr, jobs_outputs)
        .as_ref()
        .map(is_truthy)
        .unwrap_or(false)
}

fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn eval_value(expr: &Expr, jobs_outputs: &Value) -> Option<Value> {
    match expr {
        Expr::Constant(v) => Some(v.clone()),
        Expr::Attribute(parts) => {
            // parts[0] == "jobs"; the context map is already the `jobs` subtree.
            let mut cur = jobs_outputs;
            for seg in &parts[1..] {
                cur = cur.get(seg)?;
            }
            Some(cur.clone())
        }
        Expr::Not(inner) => Some(Value::Bool(!eval_value(inner, jobs_outputs).as_ref().map(is_truthy).unwrap_or(false))),
        Expr::And(a, b) => {
            let left = eval_value(a, jobs_outputs).as_ref().map(is_truthy).unwrap_or(false);
            if !left {
                return Some(Value::Bool(false));
            }
            Some(Value::Bool(eval_value(b, jobs_outputs).as_ref().map(is_truthy).unwrap_or(false)))
        }
        Expr::Or(a, b) => {
            let left = eval_value(a, jobs_outputs).as_ref().map(is_truthy).unwrap_or(false);
            if left {
                return Some(Value::Bool(true));
            }
            Some(Value::Bool(eval_value(b, jobs_outputs).as_ref().map(is_truthy).unwrap_or(false)))
        }
        Expr::Compare(a, op, b) => {
            let left = eval_value(a, jobs_outputs)?;
            let right = eval_value(b, jobs_outputs)?;
            Some(Value::Bool(compare(&left, *op, &right)))
        }
    }
}

fn compare(left: &Value, op: CompareOp, right: &Value) -> bool {
    match op {
        CompareOp::Eq => left == right,
        CompareOp::NotEq => left != right,
        CompareOp::Lt | CompareOp::LtE | CompareOp::Gt | CompareOp::GtE => {
            let (Some(l), Some(r)) = (left.as_f64(), right.as_f64()) else {
                return false;
            };
            match op {
                CompareOp::Lt => l < r,
                CompareOp::LtE => l <= r,
                CompareOp::Gt => l > r,
                CompareOp::GtE => l >= r,
                _ => unreachable!(),
            }
        }
    }
}

#[cfg(test)]
#[path = "when_ast_tests.rs"]
mod tests;
