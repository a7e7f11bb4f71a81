/*
 * Copyright 2020 Nikhil Marathe <nsm.nikhil@gmail.com>
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! The expression language evaluated inside `{...}` template segments:
//! field access (`a.b.c`), calls with positional/keyword args, arithmetic,
//! string concatenation via `+`, comparisons, and a ternary `cond ? a : b`.
//! No identifier resolves outside the Config chain plus the fixed helper
//! namespace in [`call_builtin`].

use crate::config::Config;
use crate::error::EvalError;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Int(i64),
    Float(f64),
    Str(String),
    Ident(String),
    Dot,
    Comma,
    LParen,
    RParen,
    Plus,
    Minus,
    Star,
    Slash,
    Bang,
    Eq,
    EqEq,
    NotEq,
    Lt,
    Gt,
    Le,
    Ge,
    Question,
    Colon,
    Eof,
}

fn lex(src: &str) -> Result<Vec<Token>, EvalError> {
    let mut out = Vec::new();
    let chars: Vec<char> = src.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '.' => {
                out.push(Token::Dot);
                i += 1;
            }
            ',' => {
                out.push(Token::Comma);
                i += 1;
            }
            '(' => {
                out.push(Token::LParen);
                i += 1;
            }
            ')' => {
                out.push(Token::RParen);
                i += 1;
            }
            '+' => {
                out.push(Token::Plus);
                i += 1;
            }
            '-' => {
                out.push(Token::Minus);
                i += 1;
            }
            '*' => {
                out.push(Token::Star);
                i += 1;
            }
            '/' => {
                out.push(Token::Slash);
                i += 1;
            }
            '?' => {
                out.push(Token::Question);
                i += 1;
            }
            ':' => {
                out.push(Token::Colon);
                i += 1;
            }
            '=' => {
                if chars.get(i + 1) == Some(&'=') {
                    out.push(Token::EqEq);
                    i += 2;
                } else {
                    out.push(Token::Eq);
                    i += 1;
                }
            }
            '!' => {
                if chars.get(i + 1) == Some(&'=') {
                    out.push(Token::NotEq);
                    i += 2;
                } else {
                    out.push(Token::Bang);
                    i += 1;
                }
            }
            '<' => {
                if chars.get(i + 1) == Some(&'=') {
                    out.push(Token::Le);
                    i += 2;
                } else {
                    out.push(Token::Lt);
                    i += 1;
                }
            }
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    out.push(Token::Ge);
                    i += 2;
                } else {
                    out.push(Token::Gt);
                    i += 1;
                }
            }
            '\'' | '"' => {
                let quote = c;
                i += 1;
                let mut s = String::new();
                loop {
                    match chars.get(i) {
                        None => return Err(EvalError::Syntax("unterminated string literal".into())),
                        Some(&q) if q == quote => {
                            i += 1;
                            break;
                        }
                        Some('\\') => {
                            i += 1;
                            match chars.get(i) {
                                Some('n') => s.push('\n'),
                                Some('t') => s.push('\t'),
                                Some(&other) => s.push(other),
                                None => return Err(EvalError::Syntax("unterminated escape".into())),
                            }
                            i += 1;
                        }
                        Some(&other) => {
                            s.push(other);
                            i += 1;
                        }
                    }
                }
                out.push(Token::Str(s));
            }
            _ if c.is_ascii_digit() => {
                let start = i;
                let mut is_float = false;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    if chars[i] == '.' {
                        if is_float {
                            break;
                        }
                        is_float = true;
                    }
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                if is_float {
                    let v: f64 = text
                        .parse()
                        .map_err(|_| EvalError::Syntax(format!("bad number literal '{}'", text)))?;
                    out.push(Token::Float(v));
                } else {
                    let v: i64 = text
                        .parse()
                        .map_err(|_| EvalError::Syntax(format!("bad number literal '{}'", text)))?;
                    out.push(Token::Int(v));
                }
            }
            _ if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                out.push(Token::Ident(text));
            }
            other => {
                return Err(EvalError::Syntax(format!("unexpected character '{}'", other)));
            }
        }
    }
    out.push(Token::Eof);
    Ok(out)
}

#[derive(Debug, Clone)]
enum UnOp {
    Neg,
    Not,
}

#[derive(Debug, Clone)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

#[derive(Debug, Clone)]
enum Expr {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Var(String),
    Field(Box<Expr>, String),
    Call(Box<Expr>, Vec<Expr>, Vec<(String, Expr)>),
    Unary(UnOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Ternary(Box<Expr>, Box<Expr>, Box<Expr>),
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        t
    }

    fn expect(&mut self, tok: &Token) -> Result<(), EvalError> {
        if self.peek() == tok {
            self.advance();
            Ok(())
        } else {
            Err(EvalError::Syntax(format!(
                "expected {:?}, found {:?}",
                tok,
                self.peek()
            )))
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, EvalError> {
        self.parse_ternary()
    }

    fn parse_ternary(&mut self) -> Result<Expr, EvalError> {
        let cond = self.parse_comparison()?;
        if *self.peek() == Token::Question {
            self.advance();
            let then_branch = self.parse_ternary()?;
            self.expect(&Token::Colon)?;
            let else_branch = self.parse_ternary()?;
            Ok(Expr::Ternary(
                Box::new(cond),
                Box::new(then_branch),
                Box::new(else_branch),
            ))
        } else {
            Ok(cond)
        }
    }

    fn parse_comparison(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Token::EqEq => BinOp::Eq,
                Token::NotEq => BinOp::Ne,
                Token::Lt => BinOp::Lt,
                Token::Gt => BinOp::Gt,
                Token::Le => BinOp::Le,
                Token::Ge => BinOp::Ge,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, EvalError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, EvalError> {
        match self.peek() {
            Token::Minus => {
                self.advance();
                Ok(Expr::Unary(UnOp::Neg, Box::new(self.parse_unary()?)))
            }
            Token::Bang => {
                self.advance();
                Ok(Expr::Unary(UnOp::Not, Box::new(self.parse_unary()?)))
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> Result<Expr, EvalError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Token::Dot => {
                    self.advance();
                    let name = match self.advance() {
                        Token::Ident(s) => s,
                        other => {
                            return Err(EvalError::Syntax(format!(
                                "expected field name after '.', found {:?}",
                                other
                            )))
                        }
                    };
                    expr = Expr::Field(Box::new(expr), name);
                }
                Token::LParen => {
                    self.advance();
                    let (args, kwargs) = self.parse_args()?;
                    self.expect(&Token::RParen)?;
                    expr = Expr::Call(Box::new(expr), args, kwargs);
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_args(&mut self) -> Result<(Vec<Expr>, Vec<(String, Expr)>), EvalError> {
        let mut args = Vec::new();
        let mut kwargs = Vec::new();
        if *self.peek() == Token::RParen {
            return Ok((args, kwargs));
        }
        loop {
            let is_kwarg = matches!(
                (self.tokens.get(self.pos), self.tokens.get(self.pos + 1)),
                (Some(Token::Ident(_)), Some(Token::Eq))
            );
            if is_kwarg {
                let name = match self.advance() {
                    Token::Ident(s) => s,
                    _ => unreachable!(),
                };
                self.advance(); // '='
                let value = self.parse_expr()?;
                kwargs.push((name, value));
            } else {
                args.push(self.parse_expr()?);
            }
            if *self.peek() == Token::Comma {
                self.advance();
                continue;
            }
            break;
        }
        Ok((args, kwargs))
    }

    fn parse_primary(&mut self) -> Result<Expr, EvalError> {
        match self.advance() {
            Token::Int(i) => Ok(Expr::Int(i)),
            Token::Float(x) => Ok(Expr::Float(x)),
            Token::Str(s) => Ok(Expr::Str(s)),
            Token::Ident(name) => match name.as_str() {
                "true" => Ok(Expr::Bool(true)),
                "false" => Ok(Expr::Bool(false)),
                "none" | "None" | "null" => Ok(Expr::Null),
                _ => Ok(Expr::Var(name)),
            },
            Token::LParen => {
                let inner = self.parse_expr()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            other => Err(EvalError::Syntax(format!("unexpected token {:?}", other))),
        }
    }
}

fn parse(src: &str) -> Result<Expr, EvalError> {
    let tokens = lex(src)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_expr()?;
    if *parser.peek() != Token::Eof {
        return Err(EvalError::Syntax(format!(
            "trailing input starting at {:?}",
            parser.peek()
        )));
    }
    Ok(expr)
}

/// Parses and evaluates `src` as an expression against `scope`, which
/// bindings resolve against by walking its parent chain, and the fixed
/// builtin namespace for calls whose callee doesn't resolve in `scope`.
pub fn eval_str(src: &str, scope: &Config) -> Result<Value, EvalError> {
    let expr = parse(src)?;
    eval(&expr, scope)
}

fn eval(expr: &Expr, scope: &Config) -> Result<Value, EvalError> {
    match expr {
        Expr::Null => Ok(Value::Null),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Int(i) => Ok(Value::Int(*i)),
        Expr::Float(x) => Ok(Value::Float(*x)),
        Expr::Str(s) => Ok(Value::Str(s.clone())),
        Expr::Var(name) => scope.get(name).ok_or_else(|| EvalError::NameError(name.clone())),
        Expr::Field(base, name) => {
            let v = eval(base, scope)?;
            match v {
                Value::Config(c) => c.get(name).ok_or_else(|| EvalError::NameError(name.clone())),
                other => Err(EvalError::TypeError(format!(
                    "cannot access field '{}' on a {}",
                    name,
                    other.type_name()
                ))),
            }
        }
        Expr::Unary(UnOp::Neg, inner) => match eval(inner, scope)? {
            Value::Int(i) => Ok(Value::Int(-i)),
            Value::Float(x) => Ok(Value::Float(-x)),
            other => Err(EvalError::TypeError(format!("cannot negate a {}", other.type_name()))),
        },
        Expr::Unary(UnOp::Not, inner) => Ok(Value::Bool(!eval(inner, scope)?.is_truthy())),
        Expr::Binary(op, l, r) => eval_binary(op, &eval(l, scope)?, &eval(r, scope)?),
        Expr::Ternary(cond, a, b) => {
            if eval(cond, scope)?.is_truthy() {
                eval(a, scope)
            } else {
                eval(b, scope)
            }
        }
        Expr::Call(callee, args, kwargs) => {
            let arg_vals = args
                .iter()
                .map(|a| eval(a, scope))
                .collect::<Result<Vec<_>, _>>()?;
            let kwarg_vals = kwargs
                .iter()
                .map(|(k, e)| Ok((k.clone(), eval(e, scope)?)))
                .collect::<Result<Vec<_>, EvalError>>()?;

            if let Expr::Var(name) = callee.as_ref() {
                match scope.get(name) {
                    Some(Value::Callable(c)) => return c.call(&arg_vals, &kwarg_vals),
                    Some(other) => {
                        return Err(EvalError::NotCallable(format!(
                            "{} ({})",
                            name,
                            other.type_name()
                        )))
                    }
                    None => return call_builtin(name, &arg_vals),
                }
            }

            match eval(callee, scope)? {
                Value::Callable(c) => c.call(&arg_vals, &kwarg_vals),
                other => Err(EvalError::NotCallable(other.type_name().to_string())),
            }
        }
    }
}

fn scalar_to_string(v: &Value) -> Result<String, EvalError> {
    match v {
        Value::Null => Ok(String::new()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Int(i) => Ok(i.to_string()),
        Value::Float(x) => Ok(x.to_string()),
        Value::Str(s) => Ok(s.clone()),
        other => Err(EvalError::TypeError(format!(
            "cannot use a {} in a string expression",
            other.type_name()
        ))),
    }
}

fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Int(i) => Some(*i as f64),
        Value::Float(x) => Some(*x),
        _ => None,
    }
}

fn eval_binary(op: &BinOp, l: &Value, r: &Value) -> Result<Value, EvalError> {
    use BinOp::*;
    match op {
        Add => match (l, r) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a + b)),
            (Value::Str(_), _) | (_, Value::Str(_)) => {
                Ok(Value::Str(format!("{}{}", scalar_to_string(l)?, scalar_to_string(r)?)))
            }
            _ => match (as_f64(l), as_f64(r)) {
                (Some(a), Some(b)) => Ok(Value::Float(a + b)),
                _ => Err(EvalError::TypeError(format!(
                    "cannot add {} and {}",
                    l.type_name(),
                    r.type_name()
                ))),
            },
        },
        Sub | Mul | Div => {
            if let (Value::Int(x), Value::Int(y)) = (l, r) {
                return match op {
                    Sub => Ok(Value::Int(x - y)),
                    Mul => Ok(Value::Int(x * y)),
                    Div => {
                        if *y == 0 {
                            Err(EvalError::DivisionByZero)
                        } else {
                            Ok(Value::Int(x / y))
                        }
                    }
                    _ => unreachable!(),
                };
            }
            let (a, b) = match (as_f64(l), as_f64(r)) {
                (Some(a), Some(b)) => (a, b),
                _ => {
                    return Err(EvalError::TypeError(format!(
                        "cannot apply arithmetic to {} and {}",
                        l.type_name(),
                        r.type_name()
                    )))
                }
            };
            if matches!(op, Div) && b == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            let result = match op {
                Sub => a - b,
                Mul => a * b,
                Div => a / b,
                _ => unreachable!(),
            };
            Ok(Value::Float(result))
        }
        Eq => Ok(Value::Bool(values_equal(l, r))),
        Ne => Ok(Value::Bool(!values_equal(l, r))),
        Lt | Gt | Le | Ge => {
            let ordering = match (l, r) {
                (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
                _ => match (as_f64(l), as_f64(r)) {
                    (Some(a), Some(b)) => a.partial_cmp(&b),
                    _ => None,
                },
            };
            let ordering = ordering.ok_or_else(|| {
                EvalError::TypeError(format!("cannot compare {} and {}", l.type_name(), r.type_name()))
            })?;
            use std::cmp::Ordering::*;
            Ok(Value::Bool(match op {
                Lt => ordering == Less,
                Gt => ordering == Greater,
                Le => ordering != Greater,
                Ge => ordering != Less,
                _ => unreachable!(),
            }))
        }
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Str(x), Value::Str(y)) => x == y,
        (Value::List(x), Value::List(y)) => {
            x.len() == y.len() && x.iter().zip(y.iter()).all(|(a, b)| values_equal(a, b))
        }
        _ => match (as_f64(a), as_f64(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
    }
}

/// The fixed helper namespace: `hancho-paths` functions plus `len`. An
/// unresolved name here is a `NameError`, same as a missing Config key, so
/// the enclosing template segment passes through literally.
fn call_builtin(name: &str, args: &[Value]) -> Result<Value, EvalError> {
    fn arg_str<'a>(args: &'a [Value], i: usize, func: &str) -> Result<&'a str, EvalError> {
        args.get(i)
            .ok_or_else(|| EvalError::Arity(func.to_string(), i + 1, args.len()))?
            .as_str()
            .ok_or_else(|| EvalError::TypeError(format!("{} expects a string argument", func)))
    }

    match name {
        "ext" => Ok(Value::Str(hancho_paths::ext(arg_str(args, 0, "ext")?))),
        "stem" => Ok(Value::Str(hancho_paths::stem(arg_str(args, 0, "stem")?))),
        "swap_ext" => Ok(Value::Str(hancho_paths::swap_ext(
            arg_str(args, 0, "swap_ext")?,
            arg_str(args, 1, "swap_ext")?,
        ))),
        "join_path" => Ok(Value::Str(hancho_paths::join_path(
            arg_str(args, 0, "join_path")?,
            arg_str(args, 1, "join_path")?,
        ))),
        "rel_path" => Ok(Value::Str(hancho_paths::rel_path(
            arg_str(args, 0, "rel_path")?,
            arg_str(args, 1, "rel_path")?,
        ))),
        "abs_path" => hancho_paths::abs_path(arg_str(args, 0, "abs_path")?)
            .map(Value::Str)
            .map_err(|e| EvalError::Callable(format!("abs_path: {}", e))),
        "glob" => Ok(Value::List(
            hancho_paths::glob(arg_str(args, 0, "glob")?)
                .into_iter()
                .map(Value::Str)
                .collect(),
        )),
        "flatten" => {
            let v = args
                .get(0)
                .ok_or_else(|| EvalError::Arity("flatten".to_string(), 1, args.len()))?;
            Ok(Value::List(flatten_value(v)))
        }
        "len" => match args.get(0) {
            Some(Value::Str(s)) => Ok(Value::Int(s.chars().count() as i64)),
            Some(Value::List(items)) => Ok(Value::Int(items.len() as i64)),
            Some(other) => Err(EvalError::TypeError(format!("len() of a {}", other.type_name()))),
            None => Err(EvalError::Arity("len".to_string(), 1, 0)),
        },
        _ => Err(EvalError::NameError(name.to_string())),
    }
}

fn flatten_value(v: &Value) -> Vec<Value> {
    match v {
        Value::List(items) => items.iter().flat_map(flatten_value).collect(),
        Value::Null => Vec::new(),
        other => vec![other.clone()],
    }
}
