//! Arithmetic evaluation for value expressions.
//!
//! Expressions such as `J*100`, `round(L/2)` or `FILE` are compiled once
//! from the configuration and evaluated against every parameter set.
//!
//! Supports:
//! - Integer and float literals (`3`, `2.5`, `1e-6`)
//! - `+`, `-`, `*`, `/` (true division), `//` (floor division), `%`, `**`
//! - Unary `+` and `-`, parentheses for grouping
//! - Names bound by the parameter set (parameters, `ACC`, `FILE`, `RELPATH`,
//!   `ABSPATH`)
//! - The functions `round`, `int`, `float`, `abs`, `min`, `max`
//!
//! Does NOT support:
//! - Attribute access, indexing, comparisons or any other general code
//! - Names outside the binding (there is no global namespace)

use std::fmt;

use pspace_types::{ParameterSet, Value};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lexer::{tokenize, Spanned, Token};

/// Maximum nesting depth of parentheses, signs and exponents.
/// Prevents stack overflow from pathologically nested inputs like `((((((...`
const MAX_NESTING_DEPTH: usize = 256;

/// Errors from compiling or evaluating an expression.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("{message} at offset {offset} in {expr:?}")]
    Lex {
        expr: String,
        offset: usize,
        message: String,
    },
    #[error("syntax error in {expr:?}: {message}")]
    Syntax { expr: String, message: String },
    #[error("expression {expr:?} is nested too deeply (max {max})")]
    NestingTooDeep { expr: String, max: usize },
    #[error("name {0:?} is not defined")]
    UnknownName(String),
    #[error("unknown function {0:?}")]
    UnknownFunction(String),
    #[error("{function}() takes {expected} argument(s), got {got}")]
    Arity {
        function: &'static str,
        expected: &'static str,
        got: usize,
    },
    #[error("division by zero")]
    DivisionByZero,
    #[error("arithmetic overflow in {0}")]
    Overflow(&'static str),
    #[error("unsupported operand type(s) for {op}: {left} and {right}")]
    OperandTypes {
        op: &'static str,
        left: &'static str,
        right: &'static str,
    },
    #[error("bad operand type for {op}: {operand}")]
    OperandType { op: &'static str, operand: &'static str },
}

/// Something names in an expression can be resolved against.
pub trait Bindings {
    fn lookup(&self, name: &str) -> Option<Value>;
}

impl Bindings for ParameterSet {
    fn lookup(&self, name: &str) -> Option<Value> {
        ParameterSet::lookup(self, name)
    }
}

/// Binding with no names, for constant expressions.
pub struct NoBindings;

impl Bindings for NoBindings {
    fn lookup(&self, _name: &str) -> Option<Value> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
}

impl BinOp {
    fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::FloorDiv => "//",
            BinOp::Mod => "%",
            BinOp::Pow => "**",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Literal(Value),
    Name(String),
    Neg(Box<Node>),
    Pos(Box<Node>),
    Binary(BinOp, Box<Node>, Box<Node>),
    Call(Function, Vec<Node>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Function {
    Round,
    Int,
    Float,
    Abs,
    Min,
    Max,
}

impl Function {
    fn from_name(name: &str) -> Option<Function> {
        match name {
            "round" => Some(Function::Round),
            "int" => Some(Function::Int),
            "float" => Some(Function::Float),
            "abs" => Some(Function::Abs),
            "min" => Some(Function::Min),
            "max" => Some(Function::Max),
            _ => None,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Function::Round => "round",
            Function::Int => "int",
            Function::Float => "float",
            Function::Abs => "abs",
            Function::Min => "min",
            Function::Max => "max",
        }
    }
}

/// A compiled expression. Keeps its source text for display and
/// serializes as that text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Expr {
    source: String,
    root: Node,
}

impl Expr {
    /// Compile an expression.
    pub fn parse(source: &str) -> Result<Expr, EvalError> {
        let tokens = tokenize(source).map_err(|e| EvalError::Lex {
            expr: source.to_string(),
            offset: e.span.start,
            message: e.token.to_string(),
        })?;
        let mut parser = ExprParser {
            source,
            tokens: &tokens,
            pos: 0,
            depth: 0,
        };
        let root = parser.parse_expr()?;
        parser.expect_end()?;
        Ok(Expr {
            source: source.to_string(),
            root,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate against a binding.
    pub fn eval(&self, bindings: &dyn Bindings) -> Result<Value, EvalError> {
        eval_node(&self.root, bindings)
    }
}

impl TryFrom<String> for Expr {
    type Error = EvalError;

    fn try_from(source: String) -> Result<Self, Self::Error> {
        Expr::parse(&source)
    }
}

impl From<Expr> for String {
    fn from(expr: Expr) -> String {
        expr.source
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Compile and evaluate in one step.
///
/// # Example
/// ```
/// use pspace_kernel::arithmetic::{eval_expr, NoBindings};
/// use pspace_types::Value;
///
/// assert_eq!(eval_expr("2 + 3 * 4", &NoBindings), Ok(Value::Int(14)));
/// ```
pub fn eval_expr(source: &str, bindings: &dyn Bindings) -> Result<Value, EvalError> {
    Expr::parse(source)?.eval(bindings)
}

/// Recursive descent parser over the token stream.
struct ExprParser<'a> {
    source: &'a str,
    tokens: &'a [Spanned<Token>],
    pos: usize,
    depth: usize,
}

impl<'a> ExprParser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn advance(&mut self) -> Option<&Token> {
        let tok = self.tokens.get(self.pos).map(|s| &s.token);
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn syntax(&self, message: impl Into<String>) -> EvalError {
        EvalError::Syntax {
            expr: self.source.to_string(),
            message: message.into(),
        }
    }

    fn expect_end(&self) -> Result<(), EvalError> {
        match self.tokens.get(self.pos) {
            None => Ok(()),
            Some(t) => Err(self.syntax(format!(
                "unexpected {:?} at offset {}",
                t.token.to_string(),
                t.span.start
            ))),
        }
    }

    /// Parse an expression: handles + and - (lowest precedence)
    fn parse_expr(&mut self) -> Result<Node, EvalError> {
        let mut left = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_term()?;
            left = Node::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    /// Parse a term: handles * / // % (higher precedence)
    fn parse_term(&mut self) -> Result<Node, EvalError> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                Some(Token::DoubleSlash) => BinOp::FloorDiv,
                Some(Token::Percent) => BinOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Node::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    /// Parse unary operators: + and - prefix
    fn parse_unary(&mut self) -> Result<Node, EvalError> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(EvalError::NestingTooDeep {
                expr: self.source.to_string(),
                max: MAX_NESTING_DEPTH,
            });
        }
        let node = self.parse_signed();
        self.depth -= 1;
        node
    }

    fn parse_signed(&mut self) -> Result<Node, EvalError> {
        match self.peek() {
            Some(Token::Plus) => {
                self.advance();
                Ok(Node::Pos(Box::new(self.parse_unary()?)))
            }
            Some(Token::Minus) => {
                self.advance();
                Ok(Node::Neg(Box::new(self.parse_unary()?)))
            }
            _ => self.parse_power(),
        }
    }

    /// Parse `**`: binds tighter than a unary sign on its left, right-associative.
    fn parse_power(&mut self) -> Result<Node, EvalError> {
        let base = self.parse_primary()?;
        if self.peek() == Some(&Token::DoubleStar) {
            self.advance();
            let exponent = self.parse_unary()?;
            return Ok(Node::Binary(BinOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    /// Parse primary: numbers, names, calls, parenthesized expressions
    fn parse_primary(&mut self) -> Result<Node, EvalError> {
        match self.advance().cloned() {
            Some(Token::Int(n)) => Ok(Node::Literal(Value::Int(n))),
            Some(Token::Float(x)) => Ok(Node::Literal(Value::Float(x))),
            Some(Token::LParen) => {
                let inner = self.parse_expr()?;
                match self.advance() {
                    Some(Token::RParen) => Ok(inner),
                    _ => Err(self.syntax("expected ')'")),
                }
            }
            Some(Token::Ident(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    self.advance();
                    let function = Function::from_name(&name)
                        .ok_or_else(|| EvalError::UnknownFunction(name.clone()))?;
                    let args = self.parse_args()?;
                    Ok(Node::Call(function, args))
                } else {
                    Ok(Node::Name(name))
                }
            }
            Some(other) => Err(self.syntax(format!("unexpected {:?}", other.to_string()))),
            None => Err(self.syntax("unexpected end of expression")),
        }
    }

    /// Arguments after the opening parenthesis, through the closing one.
    fn parse_args(&mut self) -> Result<Vec<Node>, EvalError> {
        let mut args = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.parse_expr()?);
            match self.advance() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => return Ok(args),
                _ => return Err(self.syntax("expected ',' or ')' in argument list")),
            }
        }
    }
}

fn eval_node(node: &Node, bindings: &dyn Bindings) -> Result<Value, EvalError> {
    match node {
        Node::Literal(v) => Ok(v.clone()),
        Node::Name(name) => bindings
            .lookup(name)
            .ok_or_else(|| EvalError::UnknownName(name.clone())),
        Node::Pos(inner) => match eval_node(inner, bindings)? {
            Value::Bool(b) => Ok(Value::Int(b as i64)),
            v @ (Value::Int(_) | Value::Float(_)) => Ok(v),
            Value::String(_) => Err(EvalError::OperandType { op: "unary +", operand: "str" }),
        },
        Node::Neg(inner) => match eval_node(inner, bindings)? {
            Value::Bool(b) => Ok(Value::Int(-(b as i64))),
            Value::Int(i) => i
                .checked_neg()
                .map(Value::Int)
                .ok_or(EvalError::Overflow("negation")),
            Value::Float(x) => Ok(Value::Float(-x)),
            Value::String(_) => Err(EvalError::OperandType { op: "unary -", operand: "str" }),
        },
        Node::Binary(op, l, r) => {
            let left = eval_node(l, bindings)?;
            let right = eval_node(r, bindings)?;
            binary(*op, &left, &right)
        }
        Node::Call(function, args) => {
            let values = args
                .iter()
                .map(|a| eval_node(a, bindings))
                .collect::<Result<Vec<_>, _>>()?;
            call(*function, &values)
        }
    }
}

/// Operand as a number: ints stay ints, everything numeric else becomes float.
enum Num {
    I(i64),
    F(f64),
}

fn num(v: &Value) -> Option<Num> {
    match v {
        Value::Bool(b) => Some(Num::I(*b as i64)),
        Value::Int(i) => Some(Num::I(*i)),
        Value::Float(x) => Some(Num::F(*x)),
        Value::String(_) => None,
    }
}

fn binary(op: BinOp, left: &Value, right: &Value) -> Result<Value, EvalError> {
    let (a, b) = match (num(left), num(right)) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            return Err(EvalError::OperandTypes {
                op: op.symbol(),
                left: left.type_name(),
                right: right.type_name(),
            })
        }
    };

    match (a, b) {
        (Num::I(a), Num::I(b)) => int_binary(op, a, b),
        (a, b) => {
            let a = match a {
                Num::I(i) => i as f64,
                Num::F(x) => x,
            };
            let b = match b {
                Num::I(i) => i as f64,
                Num::F(x) => x,
            };
            float_binary(op, a, b)
        }
    }
}

fn int_binary(op: BinOp, a: i64, b: i64) -> Result<Value, EvalError> {
    match op {
        BinOp::Add => a.checked_add(b).map(Value::Int).ok_or(EvalError::Overflow("addition")),
        BinOp::Sub => a.checked_sub(b).map(Value::Int).ok_or(EvalError::Overflow("subtraction")),
        BinOp::Mul => a
            .checked_mul(b)
            .map(Value::Int)
            .ok_or(EvalError::Overflow("multiplication")),
        BinOp::Div => {
            if b == 0 {
                return Err(EvalError::DivisionByZero);
            }
            Ok(Value::Float(a as f64 / b as f64))
        }
        BinOp::FloorDiv => {
            if b == 0 {
                return Err(EvalError::DivisionByZero);
            }
            let q = a.checked_div(b).ok_or(EvalError::Overflow("division"))?;
            // floor toward negative infinity
            if (a % b != 0) && ((a < 0) != (b < 0)) {
                Ok(Value::Int(q - 1))
            } else {
                Ok(Value::Int(q))
            }
        }
        BinOp::Mod => {
            if b == 0 {
                return Err(EvalError::DivisionByZero);
            }
            let r = a.checked_rem(b).ok_or(EvalError::Overflow("modulo"))?;
            // result takes the sign of the divisor
            if r != 0 && ((r < 0) != (b < 0)) {
                Ok(Value::Int(r + b))
            } else {
                Ok(Value::Int(r))
            }
        }
        BinOp::Pow => {
            if b < 0 {
                return Ok(Value::Float((a as f64).powf(b as f64)));
            }
            let exp = u32::try_from(b).map_err(|_| EvalError::Overflow("power"))?;
            a.checked_pow(exp).map(Value::Int).ok_or(EvalError::Overflow("power"))
        }
    }
}

fn float_binary(op: BinOp, a: f64, b: f64) -> Result<Value, EvalError> {
    let x = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => {
            if b == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            a / b
        }
        BinOp::FloorDiv => {
            if b == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            (a / b).floor()
        }
        BinOp::Mod => {
            if b == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            let r = a % b;
            if r != 0.0 && ((r < 0.0) != (b < 0.0)) {
                r + b
            } else {
                r
            }
        }
        BinOp::Pow => a.powf(b),
    };
    Ok(Value::Float(x))
}

fn call(function: Function, args: &[Value]) -> Result<Value, EvalError> {
    let numeric = |v: &Value| -> Result<Num, EvalError> {
        num(v).ok_or(EvalError::OperandType {
            op: function.name(),
            operand: v.type_name(),
        })
    };

    match function {
        Function::Round => match args {
            [x] => match numeric(x)? {
                Num::I(i) => Ok(Value::Int(i)),
                Num::F(x) => round_to_int(x),
            },
            [x, digits] => {
                let digits = match numeric(digits)? {
                    Num::I(d) => d,
                    Num::F(_) => {
                        return Err(EvalError::OperandType { op: "round", operand: "float" })
                    }
                };
                match numeric(x)? {
                    Num::I(i) => Ok(Value::Int(i)),
                    Num::F(x) => {
                        let scale = 10f64.powi(digits.clamp(-308, 308) as i32);
                        Ok(Value::Float((x * scale).round_ties_even() / scale))
                    }
                }
            }
            _ => Err(EvalError::Arity {
                function: "round",
                expected: "1 or 2",
                got: args.len(),
            }),
        },
        Function::Int => match args {
            [x] => match numeric(x)? {
                Num::I(i) => Ok(Value::Int(i)),
                Num::F(x) => float_to_int(x.trunc()),
            },
            _ => Err(EvalError::Arity { function: "int", expected: "1", got: args.len() }),
        },
        Function::Float => match args {
            [x] => match numeric(x)? {
                Num::I(i) => Ok(Value::Float(i as f64)),
                Num::F(x) => Ok(Value::Float(x)),
            },
            _ => Err(EvalError::Arity { function: "float", expected: "1", got: args.len() }),
        },
        Function::Abs => match args {
            [x] => match numeric(x)? {
                Num::I(i) => i.checked_abs().map(Value::Int).ok_or(EvalError::Overflow("abs")),
                Num::F(x) => Ok(Value::Float(x.abs())),
            },
            _ => Err(EvalError::Arity { function: "abs", expected: "1", got: args.len() }),
        },
        Function::Min | Function::Max => {
            if args.is_empty() {
                return Err(EvalError::Arity {
                    function: function.name(),
                    expected: "at least 1",
                    got: 0,
                });
            }
            let mut best = &args[0];
            let mut best_f = numeric(best).map(as_f64)?;
            for candidate in &args[1..] {
                let f = numeric(candidate).map(as_f64)?;
                let better = match function {
                    Function::Min => f < best_f,
                    _ => f > best_f,
                };
                if better {
                    best = candidate;
                    best_f = f;
                }
            }
            Ok(best.clone())
        }
    }
}

fn as_f64(n: Num) -> f64 {
    match n {
        Num::I(i) => i as f64,
        Num::F(x) => x,
    }
}

fn float_to_int(x: f64) -> Result<Value, EvalError> {
    if !x.is_finite() || x < i64::MIN as f64 || x >= i64::MAX as f64 {
        return Err(EvalError::Overflow("conversion to int"));
    }
    Ok(Value::Int(x as i64))
}

/// Round half to even, as used for datafile values.
pub fn round_to_int(x: f64) -> Result<Value, EvalError> {
    float_to_int(x.round_ties_even())
}
