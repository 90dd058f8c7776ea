//! Sequence-based evaluation of parsed queries
//!
//! Every sub-expression yields a flat sequence of JSON values. Navigating
//! through an array maps over its items and flattens the results; an empty
//! sequence means "no value".

use super::ast::{BinaryOp, Expr};
use super::parser::number_value;
use super::QueryError;
use serde_json::Value;

pub type Sequence = Vec<Value>;

/// Evaluation scope: the current context item and the document root
#[derive(Clone, Copy)]
pub struct Scope<'a> {
    pub context: &'a Value,
    pub root: &'a Value,
}

impl<'a> Scope<'a> {
    fn with_context(self, context: &'a Value) -> Self {
        Self {
            context,
            root: self.root,
        }
    }
}

pub fn evaluate(expr: &Expr, scope: Scope<'_>) -> Result<Sequence, QueryError> {
    match expr {
        Expr::Literal(value) => Ok(vec![value.clone()]),
        Expr::Name(name) => Ok(lookup(scope.context, name)),
        Expr::Wildcard => Ok(wildcard(scope.context)),
        Expr::Context => Ok(vec![scope.context.clone()]),
        Expr::Root => Ok(vec![scope.root.clone()]),
        Expr::Path(steps) => {
            let mut items = vec![scope.context.clone()];
            for step in steps {
                let mut next = Vec::new();
                for item in &items {
                    next.extend(evaluate(step, scope.with_context(item))?);
                }
                items = next;
                if items.is_empty() {
                    break;
                }
            }
            Ok(items)
        }
        Expr::Filter { base, predicate } => {
            let items = evaluate(base, scope)?;
            apply_predicate(items, predicate, scope)
        }
        Expr::Binary { op, lhs, rhs } => binary(*op, lhs, rhs, scope),
        Expr::Negate(operand) => {
            let values = evaluate(operand, scope)?;
            match single_number(&values, "-")? {
                Some(n) => Ok(vec![number_value(-n)]),
                None => Ok(Vec::new()),
            }
        }
        Expr::Call { name, args } => {
            let mut evaluated = Vec::with_capacity(args.len());
            for arg in args {
                evaluated.push(evaluate(arg, scope)?);
            }
            super::functions::call(name, evaluated)
        }
        Expr::Array(items) => {
            let mut array = Vec::new();
            for item in items {
                array.extend(evaluate(item, scope)?);
            }
            Ok(vec![Value::Array(array)])
        }
    }
}

/// Field lookup; arrays map over their items and array-valued fields are flattened
fn lookup(value: &Value, name: &str) -> Sequence {
    match value {
        Value::Object(map) => match map.get(name) {
            Some(Value::Array(items)) => items.clone(),
            Some(found) => vec![found.clone()],
            None => Vec::new(),
        },
        Value::Array(items) => items.iter().flat_map(|item| lookup(item, name)).collect(),
        _ => Vec::new(),
    }
}

fn wildcard(value: &Value) -> Sequence {
    match value {
        Value::Object(map) => map
            .values()
            .flat_map(|v| match v {
                Value::Array(items) => items.clone(),
                other => vec![other.clone()],
            })
            .collect(),
        Value::Array(items) => items.iter().flat_map(wildcard).collect(),
        _ => Vec::new(),
    }
}

fn apply_predicate(
    items: Sequence,
    predicate: &Expr,
    scope: Scope<'_>,
) -> Result<Sequence, QueryError> {
    if let Expr::Literal(Value::Number(n)) = predicate {
        let index = n.as_f64().unwrap_or_default();
        return Ok(select_index(items, index));
    }

    let len = items.len();
    let mut selected = Vec::new();
    for (position, item) in items.into_iter().enumerate() {
        let result = evaluate(predicate, scope.with_context(&item))?;
        let keep = match result.as_slice() {
            [Value::Number(n)] => {
                let index = normalize_index(n.as_f64().unwrap_or_default(), len);
                index == Some(position)
            }
            values => truthy(values),
        };
        if keep {
            selected.push(item);
        }
    }
    Ok(selected)
}

fn normalize_index(index: f64, len: usize) -> Option<usize> {
    let index = index.floor() as i64;
    let resolved = if index < 0 { len as i64 + index } else { index };
    (0..len as i64).contains(&resolved).then_some(resolved as usize)
}

fn select_index(mut items: Sequence, index: f64) -> Sequence {
    match normalize_index(index, items.len()) {
        Some(i) => vec![items.swap_remove(i)],
        None => Vec::new(),
    }
}

/// JSONata boolean casting of a sequence
pub fn truthy(values: &[Value]) -> bool {
    match values {
        [] => false,
        [single] => truthy_value(single),
        many => many.iter().any(truthy_value),
    }
}

fn truthy_value(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => items.iter().any(truthy_value),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Extract at most one number; empty input yields `None`
pub fn single_number(values: &[Value], operator: &str) -> Result<Option<f64>, QueryError> {
    match values {
        [] => Ok(None),
        [Value::Number(n)] => Ok(n.as_f64()),
        [other] => Err(QueryError::eval(format!(
            "operator '{operator}' expects a number, found {}",
            type_name(other)
        ))),
        _ => Err(QueryError::eval(format!(
            "operator '{operator}' expects a single value, found a sequence"
        ))),
    }
}

fn single<'v>(values: &'v [Value], operator: &str) -> Result<Option<&'v Value>, QueryError> {
    match values {
        [] => Ok(None),
        [value] => Ok(Some(value)),
        _ => Err(QueryError::eval(format!(
            "operator '{operator}' expects a single value, found a sequence"
        ))),
    }
}

pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn binary(op: BinaryOp, lhs: &Expr, rhs: &Expr, scope: Scope<'_>) -> Result<Sequence, QueryError> {
    // and/or short-circuit on the left operand
    if op == BinaryOp::And || op == BinaryOp::Or {
        let left = truthy(&evaluate(lhs, scope)?);
        let result = match op {
            BinaryOp::And => left && truthy(&evaluate(rhs, scope)?),
            _ => left || truthy(&evaluate(rhs, scope)?),
        };
        return Ok(vec![Value::Bool(result)]);
    }

    let left = evaluate(lhs, scope)?;
    let right = evaluate(rhs, scope)?;
    let symbol = symbol(op);

    match op {
        BinaryOp::Add
        | BinaryOp::Subtract
        | BinaryOp::Multiply
        | BinaryOp::Divide
        | BinaryOp::Modulo => {
            let (Some(a), Some(b)) = (single_number(&left, symbol)?, single_number(&right, symbol)?)
            else {
                return Ok(Vec::new());
            };
            let result = match op {
                BinaryOp::Add => a + b,
                BinaryOp::Subtract => a - b,
                BinaryOp::Multiply => a * b,
                BinaryOp::Divide => a / b,
                _ => a % b,
            };
            if !result.is_finite() {
                return Err(QueryError::eval(format!(
                    "operator '{symbol}' produced a non-finite number"
                )));
            }
            Ok(vec![number_value(result)])
        }
        BinaryOp::Concat => {
            let a = single(&left, symbol)?.map(super::functions::stringify);
            let b = single(&right, symbol)?.map(super::functions::stringify);
            Ok(vec![Value::String(format!(
                "{}{}",
                a.unwrap_or_default(),
                b.unwrap_or_default()
            ))])
        }
        BinaryOp::Equal | BinaryOp::NotEqual => {
            let equal = match (single(&left, symbol)?, single(&right, symbol)?) {
                (Some(a), Some(b)) => values_equal(a, b),
                _ => return Ok(vec![Value::Bool(false)]),
            };
            Ok(vec![Value::Bool(if op == BinaryOp::Equal {
                equal
            } else {
                !equal
            })])
        }
        BinaryOp::Less | BinaryOp::LessEq | BinaryOp::Greater | BinaryOp::GreaterEq => {
            let (Some(a), Some(b)) = (single(&left, symbol)?, single(&right, symbol)?) else {
                return Ok(vec![Value::Bool(false)]);
            };
            let ordering = match (a, b) {
                (Value::Number(x), Value::Number(y)) => x
                    .as_f64()
                    .unwrap_or_default()
                    .partial_cmp(&y.as_f64().unwrap_or_default()),
                (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
                _ => {
                    return Err(QueryError::eval(format!(
                        "operator '{symbol}' cannot compare {} with {}",
                        type_name(a),
                        type_name(b)
                    )))
                }
            };
            let Some(ordering) = ordering else {
                return Ok(vec![Value::Bool(false)]);
            };
            let result = match op {
                BinaryOp::Less => ordering.is_lt(),
                BinaryOp::LessEq => ordering.is_le(),
                BinaryOp::Greater => ordering.is_gt(),
                _ => ordering.is_ge(),
            };
            Ok(vec![Value::Bool(result)])
        }
        BinaryOp::In => {
            let Some(needle) = single(&left, symbol)? else {
                return Ok(vec![Value::Bool(false)]);
            };
            let found = right.iter().any(|candidate| match candidate {
                Value::Array(items) => items.iter().any(|item| values_equal(needle, item)),
                other => values_equal(needle, other),
            });
            Ok(vec![Value::Bool(found)])
        }
        BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Subtract => "-",
        BinaryOp::Multiply => "*",
        BinaryOp::Divide => "/",
        BinaryOp::Modulo => "%",
        BinaryOp::Concat => "&",
        BinaryOp::Equal => "=",
        BinaryOp::NotEqual => "!=",
        BinaryOp::Less => "<",
        BinaryOp::LessEq => "<=",
        BinaryOp::Greater => ">",
        BinaryOp::GreaterEq => ">=",
        BinaryOp::And => "and",
        BinaryOp::Or => "or",
        BinaryOp::In => "in",
    }
}
