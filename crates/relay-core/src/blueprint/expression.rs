//! Sandboxed evaluator for condition expressions.
//!
//! Expressions are checked against a character whitelist, tokenized, and
//! parsed by a recursive-descent parser over a fixed grammar:
//!
//! ```text
//! or         := and ( "||" and )*
//! and        := comparison ( "&&" comparison )*
//! comparison := unary ( ( "==" | "!=" | "===" | "!==" | "<" | "<=" | ">" | ">=" ) unary )?
//! unary      := "!" unary | postfix
//! postfix    := primary ( "." ( ident | integer ) | "[" or "]" )*
//! primary    := number | string | "true" | "false" | "null" | ident | "(" or ")"
//! ```
//!
//! Identifiers are substituted with the current value of the variable of the
//! same name. Nothing is ever compiled or executed; unknown identifiers and
//! type mismatches are errors.

use std::cmp::Ordering;

use serde_json::{Map, Value};

use crate::error::ExecutionError;

/// Longest expression accepted, in characters.
pub const MAX_EXPRESSION_LEN: usize = 4096;

/// Deepest nesting of parentheses, brackets and `!` accepted by the parser.
pub const MAX_NESTING_DEPTH: usize = 64;

fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || c == '_'
        || c.is_whitespace()
        || matches!(c, '.' | '[' | ']' | '"' | '\'' | '<' | '>' | '=' | '!' | '&' | '|' | '(' | ')')
}

/// Reject any expression containing a character outside the whitelist.
pub fn validate(expression: &str) -> Result<(), ExecutionError> {
    match expression.chars().find(|c| !is_allowed(*c)) {
        Some(bad) => Err(ExecutionError::ExpressionValidation(format!(
            "character {:?} is not allowed in '{}'",
            bad, expression
        ))),
        None => Ok(()),
    }
}

/// Validate, substitute and evaluate an expression to a boolean.
pub fn evaluate(expression: &str, variables: &Map<String, Value>) -> Result<bool, ExecutionError> {
    validate(expression)?;
    let len = expression.chars().count();
    if len > MAX_EXPRESSION_LEN {
        return Err(eval_error(format!(
            "expression is {} characters long (limit {})",
            len, MAX_EXPRESSION_LEN
        )));
    }
    let tokens = substitute(tokenize(expression)?, variables)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let ast = parser.parse_or()?;
    if parser.pos != parser.tokens.len() {
        return Err(eval_error(format!(
            "unexpected token {:?} in '{}'",
            parser.tokens[parser.pos], expression
        )));
    }
    Ok(truthy(&ast.eval()?))
}

fn eval_error(msg: impl Into<String>) -> ExecutionError {
    ExecutionError::ExpressionEvaluation(msg.into())
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    /// A variable already replaced by its value.
    Value(Value),
    Dot,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Not,
    And,
    Or,
    Cmp(CmpOp),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

fn tokenize(input: &str) -> Result<Vec<Token>, ExecutionError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            '.' => {
                tokens.push(Token::Dot);
                i += 1;
            }
            '&' if next == Some('&') => {
                tokens.push(Token::And);
                i += 2;
            }
            '|' if next == Some('|') => {
                tokens.push(Token::Or);
                i += 2;
            }
            '=' | '!' if next == Some('=') => {
                let strict = chars.get(i + 2) == Some(&'=');
                tokens.push(Token::Cmp(if c == '=' { CmpOp::Eq } else { CmpOp::Ne }));
                i += if strict { 3 } else { 2 };
            }
            '!' => {
                tokens.push(Token::Not);
                i += 1;
            }
            '<' | '>' => {
                let or_equal = next == Some('=');
                tokens.push(Token::Cmp(match (c, or_equal) {
                    ('<', false) => CmpOp::Lt,
                    ('<', true) => CmpOp::Le,
                    ('>', false) => CmpOp::Gt,
                    _ => CmpOp::Ge,
                }));
                i += if or_equal { 2 } else { 1 };
            }
            '"' | '\'' => {
                let quote = c;
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && chars[end] != quote {
                    end += 1;
                }
                if end >= chars.len() {
                    return Err(eval_error(format!("unterminated string in '{}'", input)));
                }
                tokens.push(Token::Str(chars[start..end].iter().collect()));
                i = end + 1;
            }
            c if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                if i + 1 < chars.len() && chars[i] == '.' && chars[i + 1].is_ascii_digit() {
                    i += 1;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let n = text
                    .parse::<f64>()
                    .map_err(|_| eval_error(format!("invalid number '{}'", text)))?;
                tokens.push(Token::Number(n));
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => {
                return Err(eval_error(format!("unexpected character {:?} in '{}'", other, input)));
            }
        }
    }
    Ok(tokens)
}

/// Replace identifiers naming a known variable with that variable's value.
/// Identifiers directly after a `.` are property names and stay as they are.
fn substitute(tokens: Vec<Token>, variables: &Map<String, Value>) -> Result<Vec<Token>, ExecutionError> {
    let mut out = Vec::with_capacity(tokens.len());
    for token in tokens {
        let after_dot = matches!(out.last(), Some(Token::Dot));
        match token {
            Token::Ident(name) if !after_dot => match name.as_str() {
                "true" => out.push(Token::Value(Value::Bool(true))),
                "false" => out.push(Token::Value(Value::Bool(false))),
                "null" => out.push(Token::Value(Value::Null)),
                _ => match variables.get(&name) {
                    Some(value) => out.push(Token::Value(value.clone())),
                    None => return Err(eval_error(format!("unknown variable '{}'", name))),
                },
            },
            other => out.push(other),
        }
    }
    Ok(out)
}

#[derive(Debug)]
enum Expr {
    Literal(Value),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare(CmpOp, Box<Expr>, Box<Expr>),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
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

    fn expect(&mut self, expected: Token) -> Result<(), ExecutionError> {
        match self.advance() {
            Some(t) if t == expected => Ok(()),
            Some(t) => Err(eval_error(format!("expected {:?}, found {:?}", expected, t))),
            None => Err(eval_error(format!("expected {:?}, found end of expression", expected))),
        }
    }

    /// Run `f` one nesting level deeper, failing once the limit is passed.
    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ExecutionError>,
    ) -> Result<T, ExecutionError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(eval_error(format!(
                "expression nests deeper than {} levels",
                MAX_NESTING_DEPTH
            )));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn parse_or(&mut self) -> Result<Expr, ExecutionError> {
        self.nested(|p| {
            let mut left = p.parse_and()?;
            while p.peek() == Some(&Token::Or) {
                p.pos += 1;
                let right = p.parse_and()?;
                left = Expr::Or(Box::new(left), Box::new(right));
            }
            Ok(left)
        })
    }

    fn parse_and(&mut self) -> Result<Expr, ExecutionError> {
        let mut left = self.parse_comparison()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            let right = self.parse_comparison()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ExecutionError> {
        let left = self.parse_unary()?;
        if let Some(Token::Cmp(op)) = self.peek().cloned() {
            self.pos += 1;
            let right = self.parse_unary()?;
            return Ok(Expr::Compare(op, Box::new(left), Box::new(right)));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExecutionError> {
        if self.peek() == Some(&Token::Not) {
            self.pos += 1;
            let inner = self.nested(|p| p.parse_unary())?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> Result<Expr, ExecutionError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.pos += 1;
                    let key = match self.advance() {
                        Some(Token::Ident(name)) => name,
                        Some(Token::Number(n)) if n.fract() == 0.0 && n >= 0.0 => {
                            format!("{}", n as u64)
                        }
                        other => {
                            return Err(eval_error(format!(
                                "expected property name after '.', found {:?}",
                                other
                            )))
                        }
                    };
                    expr = Expr::Member(Box::new(expr), key);
                }
                Some(Token::LBracket) => {
                    self.pos += 1;
                    let index = self.parse_or()?;
                    self.expect(Token::RBracket)?;
                    expr = Expr::Index(Box::new(expr), Box::new(index));
                }
                _ => return Ok(expr),
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ExecutionError> {
        match self.advance() {
            Some(Token::Number(n)) => Ok(Expr::Literal(number(n))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(Token::Value(v)) => Ok(Expr::Literal(v)),
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => Err(eval_error(format!("unknown variable '{}'", name))),
            Some(other) => Err(eval_error(format!("unexpected token {:?}", other))),
            None => Err(eval_error("unexpected end of expression")),
        }
    }
}

fn number(n: f64) -> Value {
    serde_json::Number::from_f64(n)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

impl Expr {
    fn eval(&self) -> Result<Value, ExecutionError> {
        match self {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Not(inner) => Ok(Value::Bool(!truthy(&inner.eval()?))),
            Expr::And(l, r) => Ok(Value::Bool(truthy(&l.eval()?) && truthy(&r.eval()?))),
            Expr::Or(l, r) => Ok(Value::Bool(truthy(&l.eval()?) || truthy(&r.eval()?))),
            Expr::Compare(op, l, r) => compare(*op, &l.eval()?, &r.eval()?).map(Value::Bool),
            Expr::Member(target, key) => Ok(member(&target.eval()?, key)),
            Expr::Index(target, index) => {
                let target = target.eval()?;
                let key = match index.eval()? {
                    Value::String(s) => s,
                    Value::Number(n) => n.to_string(),
                    other => return Err(eval_error(format!("cannot index with {}", other))),
                };
                Ok(member(&target, &key))
            }
        }
    }
}

/// Property access. Missing keys yield `null`; `length` is available on
/// arrays and strings.
fn member(target: &Value, key: &str) -> Value {
    match target {
        Value::Object(map) => map.get(key).cloned().unwrap_or(Value::Null),
        Value::Array(items) => match key.parse::<f64>() {
            Ok(idx) if idx.fract() == 0.0 && idx >= 0.0 => {
                items.get(idx as usize).cloned().unwrap_or(Value::Null)
            }
            _ if key == "length" => Value::from(items.len()),
            _ => Value::Null,
        },
        Value::String(s) if key == "length" => Value::from(s.chars().count()),
        _ => Value::Null,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0 && !f.is_nan()).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn compare(op: CmpOp, left: &Value, right: &Value) -> Result<bool, ExecutionError> {
    match op {
        CmpOp::Eq => Ok(loosely_equal(left, right)),
        CmpOp::Ne => Ok(!loosely_equal(left, right)),
        _ => {
            let ordering = match (left, right) {
                (Value::String(a), Value::String(b)) => a.cmp(b),
                _ => match (as_number(left), as_number(right)) {
                    (Some(a), Some(b)) => a
                        .partial_cmp(&b)
                        .ok_or_else(|| eval_error("cannot order NaN"))?,
                    _ => {
                        return Err(eval_error(format!("cannot order {} and {}", left, right)));
                    }
                },
            };
            Ok(match op {
                CmpOp::Lt => ordering == Ordering::Less,
                CmpOp::Le => ordering != Ordering::Greater,
                CmpOp::Gt => ordering == Ordering::Greater,
                _ => ordering != Ordering::Less,
            })
        }
    }
}

fn loosely_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(_), Value::String(_))
        | (Value::String(_), Value::Number(_))
        | (Value::Number(_), Value::Number(_)) => {
            match (as_number(left), as_number(right)) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            }
        }
        _ => left == right,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use crate::error::ExecutionError::ExpressionEvaluation;

    fn vars(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_numeric_comparisons() {
        let v = vars(json!({ "score": 5 }));
        assert!(!evaluate("score > 10", &v).unwrap());
        assert!(evaluate("score <= 5", &v).unwrap());
        assert!(evaluate("score == 5.0", &v).unwrap());
        assert!(evaluate("score != 4", &v).unwrap());
        assert!(evaluate("score === 5", &v).unwrap());
    }

    #[test]
    fn test_boolean_logic_and_grouping() {
        let v = vars(json!({ "a": true, "b": false, "n": 3 }));
        assert!(evaluate("a && !b", &v).unwrap());
        assert!(evaluate("b || (n > 2 && a)", &v).unwrap());
        assert!(!evaluate("!(a || b)", &v).unwrap());
        assert!(evaluate("a", &v).unwrap());
        assert!(!evaluate("b", &v).unwrap());
    }

    #[test]
    fn test_strings_and_paths() {
        let v = vars(json!({
            "status": "open",
            "user": { "name": "Ada", "roles": ["admin", "dev"] },
            "rows": [ { "id": 7 } ]
        }));
        assert!(evaluate("status == 'open'", &v).unwrap());
        assert!(evaluate("user.name == \"Ada\"", &v).unwrap());
        assert!(evaluate("user.roles[0] == 'admin'", &v).unwrap());
        assert!(evaluate("user.roles.length == 2", &v).unwrap());
        assert!(evaluate("rows.0.id == 7", &v).unwrap());
        assert!(evaluate("user.missing == null", &v).unwrap());
        // Variable names inside string literals are not substituted.
        assert!(evaluate("'status' != status", &v).unwrap());
    }

    #[test]
    fn test_numeric_string_coercion() {
        let v = vars(json!({ "count": "12" }));
        assert!(evaluate("count > 10", &v).unwrap());
        assert!(evaluate("count == 12", &v).unwrap());
    }

    #[test]
    fn test_rejects_disallowed_characters() {
        let v = vars(json!({ "x": 1 }));
        for expr in [
            "x; process.exit()",
            "require('child_process')",
            "x + 1 > 0",
            "`rm -rf /`",
            "x > 0 ? 1 : 0",
            "{}.constructor",
            "a\\u0028",
        ] {
            let err = evaluate(expr, &v).unwrap_err();
            assert!(matches!(err, ExecutionError::ExpressionValidation(_)), "{}", expr);
        }
    }

    #[test]
    fn test_whitelisted_injection_attempts_fail_closed() {
        let v = vars(json!({ "x": 1 }));
        for expr in [
            "constructor",
            "x.constructor(\"return process\")()",
            "this",
            "x = 2",
            "x & 1",
        ] {
            assert!(evaluate(expr, &v).is_err(), "{}", expr);
        }
        // The variable was not modified by the attempted assignment.
        assert_eq!(v["x"], json!(1));
    }

    #[test]
    fn test_unknown_variable_is_error() {
        let v = vars(json!({}));
        let err = evaluate("missing > 1", &v).unwrap_err();
        assert!(matches!(err, ExecutionError::ExpressionEvaluation(_)));
    }

    #[test]
    fn test_incomparable_types_error() {
        let v = vars(json!({ "obj": { "a": 1 } }));
        assert!(evaluate("obj > 1", &v).is_err());
        assert!(evaluate("(1 > 0", &v).is_err());
    }

    #[test]
    fn test_deep_nesting_fails_closed() {
        let v = vars(json!({ "x": true }));

        let ok = format!("{}1{} == 1", "(".repeat(30), ")".repeat(30));
        assert!(evaluate(&ok, &v).unwrap());

        let too_deep = MAX_NESTING_DEPTH + 1;
        let parens = format!("{}1{}", "(".repeat(too_deep), ")".repeat(too_deep));
        let err = evaluate(&parens, &v).unwrap_err();
        assert!(matches!(err, ExpressionEvaluation(ref m) if m.contains("nests deeper")), "{err}");

        let nots = format!("{}x", "!".repeat(too_deep));
        assert!(matches!(evaluate(&nots, &v), Err(ExpressionEvaluation(_))));

        let brackets = format!("x{}", "[x".repeat(too_deep));
        assert!(matches!(evaluate(&brackets, &v), Err(ExpressionEvaluation(_))));
    }

    #[test]
    fn test_oversized_expression_is_rejected() {
        let v = vars(json!({}));
        let huge = format!("{}1{}", "(".repeat(200_000), ")".repeat(200_000));
        let err = evaluate(&huge, &v).unwrap_err();
        assert!(matches!(err, ExpressionEvaluation(ref m) if m.contains("characters long")), "{err}");

        let long_chain = vec!["1"; 3000].join(" && ");
        assert!(matches!(evaluate(&long_chain, &v), Err(ExpressionEvaluation(_))));
    }
}
