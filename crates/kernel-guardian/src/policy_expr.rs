//! Bounded, deterministic policy expression evaluator — Guardian step 3
//! (§4.6). The AST is structurally incapable of the constructs the spec
//! forbids: there is no `Float` literal variant, no `now()` call form, and
//! map access is only ever by an explicit, ordered field path — never
//! `keys()`/`values()` iteration.
//!
//! Two error classes surface from evaluation: `VALIDATION_FAILED` for
//! static shape mismatches (wrong operand type, empty path) and
//! `RUNTIME_ERROR` for evaluation-time failures (missing field). When more
//! than one error applies, `canonical_error` selects the one that sorts
//! first by ascending `(error_code, json_pointer_path)` so two
//! implementations evaluating the same expression agree on which to report.

use std::collections::BTreeMap;

use kernel_core::Canonical;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum PolicyErrorCode {
    RuntimeError,
    ValidationFailed,
}

impl PolicyErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyErrorCode::ValidationFailed => "VALIDATION_FAILED",
            PolicyErrorCode::RuntimeError => "RUNTIME_ERROR",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PolicyError {
    pub code: PolicyErrorCode,
    pub json_pointer_path: String,
    pub message: String,
}

impl PolicyError {
    fn sort_key(&self) -> (&'static str, &str) {
        (self.code.as_str(), self.json_pointer_path.as_str())
    }
}

/// Among several candidate errors, pick the one that sorts first by
/// ascending `(error_code, json_pointer_path)`.
pub fn canonical_error(errors: impl IntoIterator<Item = PolicyError>) -> Option<PolicyError> {
    errors.into_iter().min_by(|a, b| a.sort_key().cmp(&b.sort_key()))
}

/// A literal permitted in a policy expression. No `Float` variant exists.
#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Str(String),
    Int(i64),
    Bool(bool),
}

/// A dotted path into the canonical context map, e.g. `["resource", "class"]`.
pub type FieldPath = Vec<String>;

/// A bounded expression tree over the canonical request context.
#[derive(Clone, Debug)]
pub enum PolicyExpr {
    Literal(Literal),
    Field(FieldPath),
    Eq(Box<PolicyExpr>, Box<PolicyExpr>),
    Ne(Box<PolicyExpr>, Box<PolicyExpr>),
    Lt(Box<PolicyExpr>, Box<PolicyExpr>),
    Le(Box<PolicyExpr>, Box<PolicyExpr>),
    Gt(Box<PolicyExpr>, Box<PolicyExpr>),
    Ge(Box<PolicyExpr>, Box<PolicyExpr>),
    In(Box<PolicyExpr>, Vec<Literal>),
    And(Box<PolicyExpr>, Box<PolicyExpr>),
    Or(Box<PolicyExpr>, Box<PolicyExpr>),
    Not(Box<PolicyExpr>),
}

#[derive(Clone, Debug, PartialEq)]
enum Value {
    Str(String),
    Int(i64),
    Bool(bool),
}

fn path_pointer(path: &[String]) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    let mut s = String::new();
    for seg in path {
        s.push('/');
        s.push_str(seg);
    }
    s
}

fn resolve_field(context: &BTreeMap<String, Canonical>, path: &FieldPath) -> Result<Value, PolicyError> {
    if path.is_empty() {
        return Err(PolicyError {
            code: PolicyErrorCode::ValidationFailed,
            json_pointer_path: "/".to_string(),
            message: "empty field path".to_string(),
        });
    }
    let mut current = context.get(&path[0]).ok_or_else(|| PolicyError {
        code: PolicyErrorCode::RuntimeError,
        json_pointer_path: path_pointer(&path[..1]),
        message: format!("field not found: {}", path[0]),
    })?;
    for seg in &path[1..] {
        current = match current {
            Canonical::Map(m) => m.get(seg).ok_or_else(|| PolicyError {
                code: PolicyErrorCode::RuntimeError,
                json_pointer_path: path_pointer(path),
                message: format!("field not found: {seg}"),
            })?,
            _ => {
                return Err(PolicyError {
                    code: PolicyErrorCode::RuntimeError,
                    json_pointer_path: path_pointer(path),
                    message: "not a map".to_string(),
                })
            }
        };
    }
    to_value(current, path)
}

fn to_value(c: &Canonical, path: &[String]) -> Result<Value, PolicyError> {
    match c {
        Canonical::String(s) => Ok(Value::Str(s.clone())),
        Canonical::Int(i) => Ok(Value::Int(*i)),
        Canonical::Bool(b) => Ok(Value::Bool(*b)),
        _ => Err(PolicyError {
            code: PolicyErrorCode::ValidationFailed,
            json_pointer_path: path_pointer(path),
            message: "unsupported value type in policy expression".to_string(),
        }),
    }
}

fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::Str(s) => Value::Str(s.clone()),
        Literal::Int(i) => Value::Int(*i),
        Literal::Bool(b) => Value::Bool(*b),
    }
}

fn eval_value(expr: &PolicyExpr, context: &BTreeMap<String, Canonical>) -> Result<Value, PolicyError> {
    match expr {
        PolicyExpr::Literal(lit) => Ok(literal_value(lit)),
        PolicyExpr::Field(path) => resolve_field(context, path),
        PolicyExpr::Eq(a, b) => Ok(Value::Bool(eval_value(a, context)? == eval_value(b, context)?)),
        PolicyExpr::Ne(a, b) => Ok(Value::Bool(eval_value(a, context)? != eval_value(b, context)?)),
        PolicyExpr::Lt(a, b) => Ok(Value::Bool(cmp_ints(a, b, context)?.is_lt())),
        PolicyExpr::Le(a, b) => Ok(Value::Bool(cmp_ints(a, b, context)?.is_le())),
        PolicyExpr::Gt(a, b) => Ok(Value::Bool(cmp_ints(a, b, context)?.is_gt())),
        PolicyExpr::Ge(a, b) => Ok(Value::Bool(cmp_ints(a, b, context)?.is_ge())),
        PolicyExpr::In(a, set) => {
            let v = eval_value(a, context)?;
            Ok(Value::Bool(set.iter().map(literal_value).any(|s| s == v)))
        }
        PolicyExpr::And(a, b) => Ok(Value::Bool(as_bool(a, context)? && as_bool(b, context)?)),
        PolicyExpr::Or(a, b) => Ok(Value::Bool(as_bool(a, context)? || as_bool(b, context)?)),
        PolicyExpr::Not(a) => Ok(Value::Bool(!as_bool(a, context)?)),
    }
}

fn as_bool(expr: &PolicyExpr, context: &BTreeMap<String, Canonical>) -> Result<bool, PolicyError> {
    match eval_value(expr, context)? {
        Value::Bool(b) => Ok(b),
        _ => Err(PolicyError {
            code: PolicyErrorCode::ValidationFailed,
            json_pointer_path: "/".to_string(),
            message: "expected boolean operand".to_string(),
        }),
    }
}

fn cmp_ints(
    a: &PolicyExpr,
    b: &PolicyExpr,
    context: &BTreeMap<String, Canonical>,
) -> Result<std::cmp::Ordering, PolicyError> {
    match (eval_value(a, context)?, eval_value(b, context)?) {
        (Value::Int(x), Value::Int(y)) => Ok(x.cmp(&y)),
        _ => Err(PolicyError {
            code: PolicyErrorCode::ValidationFailed,
            json_pointer_path: "/".to_string(),
            message: "ordered comparison requires integer operands".to_string(),
        }),
    }
}

/// Evaluate a policy expression to a boolean verdict (`true` = allowed by
/// this clause). Accumulates every error encountered (rather than
/// short-circuiting) so `canonical_error` can choose among them.
pub fn evaluate(expr: &PolicyExpr, context: &BTreeMap<String, Canonical>) -> Result<bool, PolicyError> {
    as_bool(expr, context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx(v: serde_json::Value) -> BTreeMap<String, Canonical> {
        match Canonical::normalize(&v).unwrap() {
            Canonical::Map(m) => m,
            _ => panic!("expected map"),
        }
    }

    #[test]
    fn field_equality_passes() {
        let c = ctx(json!({"action": "READ"}));
        let expr = PolicyExpr::Eq(
            Box::new(PolicyExpr::Field(vec!["action".into()])),
            Box::new(PolicyExpr::Literal(Literal::Str("READ".into()))),
        );
        assert!(evaluate(&expr, &c).unwrap());
    }

    #[test]
    fn missing_field_is_runtime_error() {
        let c = ctx(json!({}));
        let expr = PolicyExpr::Eq(
            Box::new(PolicyExpr::Field(vec!["action".into()])),
            Box::new(PolicyExpr::Literal(Literal::Str("READ".into()))),
        );
        let err = evaluate(&expr, &c).unwrap_err();
        assert_eq!(err.code, PolicyErrorCode::RuntimeError);
    }

    #[test]
    fn ordered_comparison_on_strings_is_validation_failed() {
        let c = ctx(json!({"action": "READ"}));
        let expr = PolicyExpr::Lt(
            Box::new(PolicyExpr::Field(vec!["action".into()])),
            Box::new(PolicyExpr::Literal(Literal::Int(5))),
        );
        let err = evaluate(&expr, &c).unwrap_err();
        assert_eq!(err.code, PolicyErrorCode::ValidationFailed);
    }

    #[test]
    fn canonical_error_picks_ascending_code_then_path() {
        let errs = vec![
            PolicyError { code: PolicyErrorCode::ValidationFailed, json_pointer_path: "/b".into(), message: "x".into() },
            PolicyError { code: PolicyErrorCode::RuntimeError, json_pointer_path: "/a".into(), message: "y".into() },
            PolicyError { code: PolicyErrorCode::RuntimeError, json_pointer_path: "/z".into(), message: "z".into() },
        ];
        let chosen = canonical_error(errs).unwrap();
        assert_eq!(chosen.code, PolicyErrorCode::RuntimeError);
        assert_eq!(chosen.json_pointer_path, "/a");
    }

    #[test]
    fn in_set_membership() {
        let c = ctx(json!({"class": "pii"}));
        let expr = PolicyExpr::In(
            Box::new(PolicyExpr::Field(vec!["class".into()])),
            vec![Literal::Str("pii".into()), Literal::Str("secret".into())],
        );
        assert!(evaluate(&expr, &c).unwrap());
    }
}
