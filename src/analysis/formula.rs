// src/analysis/formula.rs
//
// Scalar arithmetic formulas over named variables.
//
// Grammar (lowest to highest precedence):
//   expr    := term (('+' | '-') term)*
//   term    := unary (('*' | '/') unary)*
//   unary   := ('+' | '-') unary | primary
//   primary := number | identifier | '(' expr ')'
//
// A formula is parsed once, bound to variable slots once, and the bound tree
// is evaluated per trial.

use logos::Logos;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::ops::Range;
use std::str::FromStr;
use thiserror::Error;

use crate::error::{EvalError, ValidationError};

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
enum Token {
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,

    #[regex(r"[0-9]+(\.[0-9]*)?([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    #[regex(r"\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().parse::<f64>().ok())]
    Number(f64),

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Ident(String),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Plus => write!(f, "'+'"),
            Token::Minus => write!(f, "'-'"),
            Token::Star => write!(f, "'*'"),
            Token::Slash => write!(f, "'/'"),
            Token::LParen => write!(f, "'('"),
            Token::RParen => write!(f, "')'"),
            Token::Number(value) => write!(f, "number {}", value),
            Token::Ident(name) => write!(f, "identifier '{}'", name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormulaError {
    #[error("invalid input '{text}' at position {position}")]
    InvalidInput { position: usize, text: String },

    #[error("unexpected {found} at position {position}, expected {expected}")]
    UnexpectedToken { position: usize, found: String, expected: &'static str },

    #[error("unexpected end of formula, expected {expected}")]
    UnexpectedEnd { expected: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    fn from_token(token: &Token) -> Option<Self> {
        match token {
            Token::Plus => Some(BinaryOp::Add),
            Token::Minus => Some(BinaryOp::Sub),
            Token::Star => Some(BinaryOp::Mul),
            Token::Slash => Some(BinaryOp::Div),
            _ => None,
        }
    }

    /// Left/right binding power. Right > left gives left associativity.
    fn binding_power(self) -> (u8, u8) {
        match self {
            BinaryOp::Add | BinaryOp::Sub => (1, 2),
            BinaryOp::Mul | BinaryOp::Div => (3, 4),
        }
    }

    fn symbol(self) -> char {
        match self {
            BinaryOp::Add => '+',
            BinaryOp::Sub => '-',
            BinaryOp::Mul => '*',
            BinaryOp::Div => '/',
        }
    }

    fn apply(self, lhs: f64, rhs: f64) -> Result<f64, EvalError> {
        let value = match self {
            BinaryOp::Add => lhs + rhs,
            BinaryOp::Sub => lhs - rhs,
            BinaryOp::Mul => lhs * rhs,
            BinaryOp::Div => {
                if rhs == 0.0 {
                    return Err(EvalError::DivisionByZero);
                }
                lhs / rhs
            },
        };
        if value.is_finite() {
            Ok(value)
        } else {
            Err(EvalError::NonFinite)
        }
    }
}

const UNARY_BINDING_POWER: u8 = 5;

/// Expression tree. `V` is the variable reference: a name after parsing,
/// a slot index after binding.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr<V> {
    Number(f64),
    Var(V),
    Neg(Box<Expr<V>>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr<V>>,
        rhs: Box<Expr<V>>,
    },
}

impl<V> Expr<V> {
    fn eval_with<F>(&self, lookup: &F) -> Result<f64, EvalError>
    where
        F: Fn(&V) -> Result<f64, EvalError>,
    {
        match self {
            Expr::Number(value) => Ok(*value),
            Expr::Var(var) => lookup(var),
            Expr::Neg(inner) => Ok(-inner.eval_with(lookup)?),
            Expr::Binary { op, lhs, rhs } => {
                let lhs = lhs.eval_with(lookup)?;
                let rhs = rhs.eval_with(lookup)?;
                op.apply(lhs, rhs)
            },
        }
    }

    fn try_map_vars<W, E, F>(&self, map: &F) -> Result<Expr<W>, E>
    where
        F: Fn(&V) -> Result<W, E>,
    {
        Ok(match self {
            Expr::Number(value) => Expr::Number(*value),
            Expr::Var(var) => Expr::Var(map(var)?),
            Expr::Neg(inner) => Expr::Neg(Box::new(inner.try_map_vars(map)?)),
            Expr::Binary { op, lhs, rhs } => Expr::Binary {
                op: *op,
                lhs: Box::new(lhs.try_map_vars(map)?),
                rhs: Box::new(rhs.try_map_vars(map)?),
            },
        })
    }

    fn collect_vars<'a>(&'a self, out: &mut Vec<&'a V>) {
        match self {
            Expr::Number(_) => {},
            Expr::Var(var) => out.push(var),
            Expr::Neg(inner) => inner.collect_vars(out),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_vars(out);
                rhs.collect_vars(out);
            },
        }
    }
}

impl<V: fmt::Display> fmt::Display for Expr<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Number(value) => write!(f, "{}", value),
            Expr::Var(var) => write!(f, "{}", var),
            Expr::Neg(inner) => write!(f, "(-{})", inner),
            Expr::Binary { op, lhs, rhs } => write!(f, "({} {} {})", lhs, op.symbol(), rhs),
        }
    }
}

struct Parser {
    tokens: Vec<(Token, Range<usize>)>,
    pos: usize,
}

impl Parser {
    fn new(source: &str) -> Result<Self, FormulaError> {
        let mut tokens = Vec::new();
        let mut lexer = Token::lexer(source);
        while let Some(token) = lexer.next() {
            let span = lexer.span();
            match token {
                Ok(token) => tokens.push((token, span)),
                Err(_) => {
                    return Err(FormulaError::InvalidInput {
                        position: span.start,
                        text: lexer.slice().to_string(),
                    });
                },
            }
        }
        Ok(Self { tokens, pos: 0 })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(token, _)| token)
    }

    fn next(&mut self, expected: &'static str) -> Result<(Token, usize), FormulaError> {
        let (token, span) = self.tokens
            .get(self.pos)
            .cloned()
            .ok_or(FormulaError::UnexpectedEnd { expected })?;
        self.pos += 1;
        Ok((token, span.start))
    }

    fn parse(mut self) -> Result<Expr<String>, FormulaError> {
        let expr = self.parse_expr(0)?;
        if let Some((token, span)) = self.tokens.get(self.pos) {
            return Err(FormulaError::UnexpectedToken {
                position: span.start,
                found: token.to_string(),
                expected: "an operator or end of formula",
            });
        }
        Ok(expr)
    }

    fn parse_expr(&mut self, min_bp: u8) -> Result<Expr<String>, FormulaError> {
        let mut lhs = self.parse_prefix()?;

        while let Some(op) = self.peek().and_then(BinaryOp::from_token) {
            let (left_bp, right_bp) = op.binding_power();
            if left_bp < min_bp {
                break;
            }
            self.pos += 1;
            let rhs = self.parse_expr(right_bp)?;
            lhs = Expr::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }

        Ok(lhs)
    }

    fn parse_prefix(&mut self) -> Result<Expr<String>, FormulaError> {
        const OPERAND: &str = "a number, identifier, '(' or unary operator";

        let (token, position) = self.next(OPERAND)?;
        match token {
            Token::Number(value) => Ok(Expr::Number(value)),
            Token::Ident(name) => Ok(Expr::Var(name)),
            Token::Minus => Ok(Expr::Neg(Box::new(self.parse_expr(UNARY_BINDING_POWER)?))),
            Token::Plus => self.parse_expr(UNARY_BINDING_POWER),
            Token::LParen => {
                let inner = self.parse_expr(0)?;
                match self.next("')'")? {
                    (Token::RParen, _) => Ok(inner),
                    (other, position) => Err(FormulaError::UnexpectedToken {
                        position,
                        found: other.to_string(),
                        expected: "')'",
                    }),
                }
            },
            other => Err(FormulaError::UnexpectedToken {
                position,
                found: other.to_string(),
                expected: OPERAND,
            }),
        }
    }
}

/// A parsed formula whose identifiers are still names.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    source: String,
    ast: Expr<String>,
}

impl Formula {
    pub fn parse(source: &str) -> Result<Self, FormulaError> {
        let ast = Parser::new(source)?.parse()?;
        Ok(Self {
            source: source.to_string(),
            ast,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn ast(&self) -> &Expr<String> {
        &self.ast
    }

    /// Distinct identifiers referenced by the formula, sorted.
    pub fn identifiers(&self) -> BTreeSet<&str> {
        let mut vars = Vec::new();
        self.ast.collect_vars(&mut vars);
        vars.into_iter().map(String::as_str).collect()
    }

    /// Resolve every identifier to its index in `slots`.
    pub fn bind(&self, slots: &[&str]) -> Result<CompiledFormula, ValidationError> {
        let ast = self.ast.try_map_vars(&|name: &String| {
            slots.iter()
                .position(|slot| *slot == name.as_str())
                .ok_or_else(|| ValidationError::UnboundIdentifier(name.clone()))
        })?;
        Ok(CompiledFormula {
            ast,
            slots: slots.len(),
        })
    }

    pub fn evaluate(&self, bindings: &HashMap<String, f64>) -> Result<f64, EvalError> {
        self.ast.eval_with(&|name: &String| {
            bindings.get(name)
                .copied()
                .ok_or_else(|| EvalError::UnboundIdentifier(name.clone()))
        })
        .and_then(finite)
    }
}

impl FromStr for Formula {
    type Err = FormulaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Formula::parse(s)
    }
}

/// A formula bound to a fixed variable order, evaluated once per trial.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledFormula {
    ast: Expr<usize>,
    slots: usize,
}

impl CompiledFormula {
    pub fn slots(&self) -> usize {
        self.slots
    }

    pub fn evaluate(&self, values: &[f64]) -> Result<f64, EvalError> {
        self.ast.eval_with(&|slot: &usize| {
            values.get(*slot)
                .copied()
                .ok_or_else(|| EvalError::UnboundIdentifier(format!("#{}", slot)))
        })
        .and_then(finite)
    }
}

/// Leaves and negations never pass through `BinaryOp::apply`, so the final
/// value is checked once more.
fn finite(value: f64) -> Result<f64, EvalError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EvalError::NonFinite)
    }
}

/// Parse and evaluate `formula` against `bindings` in one go.
pub fn evaluate(formula: &str, bindings: &HashMap<String, f64>) -> Result<f64, EvalError> {
    Formula::parse(formula)
        .map_err(|e| EvalError::Syntax(e.to_string()))?
        .evaluate(bindings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn bindings(pairs: &[(&str, f64)]) -> HashMap<String, f64> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    fn shape(source: &str) -> String {
        Formula::parse(source).unwrap().ast().to_string()
    }

    #[test]
    fn test_precedence_and_associativity() {
        assert_eq!(shape("a + b * c"), "(a + (b * c))");
        assert_eq!(shape("(a + b) * c"), "((a + b) * c)");
        assert_eq!(shape("a - b - c"), "((a - b) - c)");
        assert_eq!(shape("a / b / c"), "((a / b) / c)");
        assert_eq!(shape("-a * b"), "((-a) * b)");
        assert_eq!(shape("a * -b"), "(a * (-b))");
        assert_eq!(shape("+a"), "a");

        let none = HashMap::new();
        assert_eq!(evaluate("10 - 4 - 3", &none), Ok(3.0));
        assert_eq!(evaluate("8 / 4 / 2", &none), Ok(1.0));
        assert_eq!(evaluate("2 + 3 * 4", &none), Ok(14.0));
        assert_eq!(evaluate("--2", &none), Ok(2.0));
    }

    #[test]
    fn test_number_literals() {
        let none = HashMap::new();
        assert_eq!(evaluate("1.5", &none), Ok(1.5));
        assert_eq!(evaluate(".25", &none), Ok(0.25));
        assert_eq!(evaluate("2.", &none), Ok(2.0));
        assert_eq!(evaluate("1e3 + 2.5E-1", &none), Ok(1000.25));
    }

    #[test]
    fn test_overlapping_identifiers() {
        let vars = bindings(&[("a", 1.0), ("ab", 10.0), ("a_b2", 100.0)]);
        assert_eq!(evaluate("a + ab + a_b2", &vars), Ok(111.0));
    }

    #[test]
    fn test_eval_errors() {
        let vars = bindings(&[("x", 0.0)]);
        assert_eq!(evaluate("1 / x", &vars), Err(EvalError::DivisionByZero));
        assert_eq!(evaluate("1e308 * 10", &vars), Err(EvalError::NonFinite));
        assert_eq!(
            evaluate("x + y", &vars),
            Err(EvalError::UnboundIdentifier("y".to_string()))
        );
        assert!(matches!(evaluate("x +", &vars), Err(EvalError::Syntax(_))));
    }

    #[test]
    fn test_leaf_values_must_be_finite() {
        let vars = bindings(&[("x", f64::INFINITY), ("y", f64::NAN)]);
        assert_eq!(evaluate("1e400", &vars), Err(EvalError::NonFinite));
        assert_eq!(evaluate("x", &vars), Err(EvalError::NonFinite));
        assert_eq!(evaluate("-x", &vars), Err(EvalError::NonFinite));
        assert_eq!(evaluate("(y)", &vars), Err(EvalError::NonFinite));

        let compiled = Formula::parse("-x").unwrap().bind(&["x"]).unwrap();
        assert_eq!(compiled.evaluate(&[f64::NEG_INFINITY]), Err(EvalError::NonFinite));
        assert_eq!(compiled.evaluate(&[2.5]), Ok(-2.5));
    }

    #[test]
    fn test_syntax_errors() {
        assert_eq!(
            Formula::parse(""),
            Err(FormulaError::UnexpectedEnd { expected: "a number, identifier, '(' or unary operator" })
        );
        assert_eq!(Formula::parse("(a + b"), Err(FormulaError::UnexpectedEnd { expected: "')'" }));
        assert!(matches!(
            Formula::parse("a + b)"),
            Err(FormulaError::UnexpectedToken { position: 5, .. })
        ));
        assert!(matches!(
            Formula::parse("a b"),
            Err(FormulaError::UnexpectedToken { position: 2, .. })
        ));
        assert!(matches!(
            Formula::parse("a $ b"),
            Err(FormulaError::InvalidInput { position: 2, .. })
        ));
        assert!(matches!(
            Formula::parse("a * / b"),
            Err(FormulaError::UnexpectedToken { position: 4, .. })
        ));
    }

    #[test]
    fn test_bind_resolves_slots() {
        let formula = Formula::parse("price * volume - cost").unwrap();
        assert_eq!(
            formula.identifiers().into_iter().collect::<Vec<_>>(),
            vec!["cost", "price", "volume"]
        );

        let compiled = formula.bind(&["volume", "price", "cost"]).unwrap();
        assert_eq!(compiled.slots(), 3);
        assert_eq!(compiled.evaluate(&[10.0, 2.5, 5.0]), Ok(20.0));

        assert_eq!(
            formula.bind(&["price", "volume"]),
            Err(ValidationError::UnboundIdentifier("cost".to_string()))
        );
    }

    proptest! {
        #[test]
        fn prop_matches_native_arithmetic(a in -1e6..1e6f64, b in -1e6..1e6f64, c in -1e6..1e6f64) {
            let vars = bindings(&[("a", a), ("b", b), ("c", c)]);
            let expected = a + b * c - a / 2.0;
            prop_assert_eq!(evaluate("a + b * c - a / 2", &vars), Ok(expected));
        }

        #[test]
        fn prop_display_reparses_to_same_tree(a in 0.0..1e3f64, b in 0.0..1e3f64) {
            let source = format!("-(x + {}) * y / ({} - z)", a, b);
            let first = Formula::parse(&source).unwrap();
            let second = Formula::parse(&first.ast().to_string()).unwrap();
            prop_assert_eq!(first.ast(), second.ast());
        }
    }
}
