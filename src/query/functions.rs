//! Built-in `$function` implementations

use super::evaluator::{single_number, truthy, type_name, Sequence};
use super::parser::number_value;
use super::QueryError;
use serde_json::Value;

pub fn call(name: &str, args: Vec<Sequence>) -> Result<Sequence, QueryError> {
    let mut args = args.into_iter();
    let mut next = || args.next().unwrap_or_default();

    match name {
        "number" => to_number(&next()),
        "string" => Ok(match next().as_slice() {
            [] => Vec::new(),
            [value] => vec![Value::String(stringify(value))],
            many => vec![Value::String(stringify(&Value::Array(many.to_vec())))],
        }),
        "round" => {
            let value = next();
            let precision = single_number(&next(), "$round")?.unwrap_or(0.0) as i32;
            unary_math(&value, "$round", |n| round_half_even(n, precision))
        }
        "floor" => unary_math(&next(), "$floor", f64::floor),
        "ceil" => unary_math(&next(), "$ceil", f64::ceil),
        "abs" => unary_math(&next(), "$abs", f64::abs),
        "sum" => Ok(vec![finite(numbers(&next(), "$sum")?.iter().sum(), "$sum")?]),
        "count" => Ok(vec![Value::from(flatten(&next()).len())]),
        "average" => {
            let values = numbers(&next(), "$average")?;
            if values.is_empty() {
                return Ok(Vec::new());
            }
            Ok(vec![finite(
                values.iter().sum::<f64>() / values.len() as f64,
                "$average",
            )?])
        }
        "max" => Ok(numbers(&next(), "$max")?
            .into_iter()
            .reduce(f64::max)
            .map(number_value)
            .into_iter()
            .collect()),
        "min" => Ok(numbers(&next(), "$min")?
            .into_iter()
            .reduce(f64::min)
            .map(number_value)
            .into_iter()
            .collect()),
        "exists" => Ok(vec![Value::Bool(!next().is_empty())]),
        "boolean" => {
            let value = next();
            if value.is_empty() {
                return Ok(Vec::new());
            }
            Ok(vec![Value::Bool(truthy(&value))])
        }
        "not" => {
            let value = next();
            if value.is_empty() {
                return Ok(Vec::new());
            }
            Ok(vec![Value::Bool(!truthy(&value))])
        }
        other => Err(QueryError::eval(format!("unknown function '${other}'"))),
    }
}

fn to_number(values: &[Value]) -> Result<Sequence, QueryError> {
    let value = match values {
        [] => return Ok(Vec::new()),
        [value] => value,
        _ => return Err(QueryError::eval("$number expects a single value")),
    };
    let n = match value {
        Value::Number(n) => n.as_f64().unwrap_or_default(),
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .ok_or_else(|| QueryError::eval(format!("cannot convert '{s}' to a number")))?,
        other => {
            return Err(QueryError::eval(format!(
                "cannot convert {} to a number",
                type_name(other)
            )))
        }
    };
    Ok(vec![number_value(n)])
}

fn unary_math(values: &[Value], name: &str, f: impl Fn(f64) -> f64) -> Result<Sequence, QueryError> {
    single_number(values, name)?
        .map(|n| finite(f(n), name))
        .into_iter()
        .collect()
}

/// Number result of a function; NaN and infinities are errors
fn finite(n: f64, name: &str) -> Result<Value, QueryError> {
    if n.is_finite() {
        Ok(number_value(n))
    } else {
        Err(QueryError::eval(format!(
            "{name} produced a non-finite number"
        )))
    }
}

/// Nested arrays inside a sequence count as their items
fn flatten(values: &[Value]) -> Vec<&Value> {
    values
        .iter()
        .flat_map(|value| match value {
            Value::Array(items) => items.iter().collect::<Vec<_>>(),
            other => vec![other],
        })
        .collect()
}

fn numbers(values: &[Value], name: &str) -> Result<Vec<f64>, QueryError> {
    flatten(values)
        .into_iter()
        .map(|value| match value {
            Value::Number(n) => Ok(n.as_f64().unwrap_or_default()),
            other => Err(QueryError::eval(format!(
                "{name} expects numbers, found {}",
                type_name(other)
            ))),
        })
        .collect()
}

fn round_half_even(value: f64, precision: i32) -> f64 {
    let factor = 10f64.powi(precision);
    let scaled = value * factor;
    let rounded = scaled.round();
    let result = if (scaled - scaled.trunc()).abs() == 0.5 {
        // ties go to the even neighbour
        2.0 * (scaled / 2.0).round()
    } else {
        rounded
    };
    result / factor
}

/// String form used by `$string` and `&`
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
