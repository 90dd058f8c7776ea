//! Declarative value extraction from JSON documents
//!
//! Queries use a JSONata-style subset: dotted paths (`reading.tempC`),
//! index and filter predicates (`sensors[type = 'temp'][0].value`),
//! arithmetic, comparisons and a handful of `$functions` such as `$number`
//! and `$round`. A query either yields a value or nothing; evaluation
//! failures surface as [`QueryError`] from [`Query::evaluate`] and are
//! swallowed by [`evaluate`], which is what the fetch pipeline uses.
//!
//! ```
//! use http_sensor_bridge::query::Query;
//! use serde_json::json;
//!
//! let query = Query::parse("reading.tempC").unwrap();
//! let doc = json!({"reading": {"tempC": 21.5}});
//! assert_eq!(query.evaluate(&doc).unwrap(), Some(json!(21.5)));
//! ```

mod ast;
mod evaluator;
mod functions;
mod parser;
mod tokenizer;

use serde_json::Value;
use std::fmt;
use thiserror::Error;
use tracing::debug;

use crate::error::SensorError;
use evaluator::Scope;

/// Query parse or evaluation failure
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueryError {
    #[error("syntax error at position {position}: {message}")]
    Parse { position: usize, message: String },

    #[error("evaluation failed: {0}")]
    Eval(String),
}

impl QueryError {
    pub(crate) fn parse<S: Into<String>>(position: usize, message: S) -> Self {
        Self::Parse {
            position,
            message: message.into(),
        }
    }

    pub(crate) fn eval<S: Into<String>>(message: S) -> Self {
        Self::Eval(message.into())
    }
}

/// A parsed query, reusable across documents
#[derive(Debug, Clone)]
pub struct Query {
    source: String,
    expr: ast::Expr,
}

impl Query {
    /// Parse an expression once so it can be evaluated on every fetch
    pub fn parse(source: &str) -> Result<Self, QueryError> {
        let tokens = tokenizer::tokenize(source)?;
        let expr = parser::Parser::new(tokens).parse()?;
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    /// Evaluate against a document; `Ok(None)` means the query matched nothing
    pub fn evaluate(&self, document: &Value) -> Result<Option<Value>, QueryError> {
        let scope = Scope {
            context: document,
            root: document,
        };
        let mut values = evaluator::evaluate(&self.expr, scope)?;
        Ok(match values.len() {
            0 => None,
            1 => values.pop(),
            _ => Some(Value::Array(values)),
        })
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Tolerant evaluation: absent expressions and any failure yield `None`
pub fn evaluate(expression: Option<&str>, document: &Value) -> Option<Value> {
    let expression = expression?;
    match Query::parse(expression).and_then(|query| query.evaluate(document)) {
        Ok(value) => value,
        Err(e) => {
            debug!("{}", SensorError::query(expression, e.to_string()));
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    fn document() -> Value {
        json!({
            "reading": {"tempC": 21.5, "rh": 47, "tempF": 70.7},
            "device": {"battery": {"level": "15"}, "name": "Porch"},
            "sensors": [
                {"type": "temp", "value": 19.25, "room": "kitchen"},
                {"type": "humidity", "value": 55, "room": "kitchen"},
                {"type": "temp", "value": 22.0, "room": "bedroom"}
            ],
            "battery level": 88
        })
    }

    #[rstest]
    #[case("reading.tempC", json!(21.5))]
    #[case("reading.rh", json!(47))]
    #[case("$number(device.battery.level)", json!(15))]
    #[case("sensors[0].value", json!(19.25))]
    #[case("sensors[-1].room", json!("bedroom"))]
    #[case("sensors[type = 'humidity'].value", json!(55))]
    #[case("sensors[type = 'temp' and room = 'bedroom'].value", json!(22.0))]
    #[case("sensors[type = 'temp'].value", json!([19.25, 22.0]))]
    #[case("$round((reading.tempF - 32) / 1.8, 1)", json!(21.5))]
    #[case("$count(sensors)", json!(3))]
    #[case("$max(sensors.value)", json!(55))]
    #[case("$average(sensors[type='temp'].value)", json!(20.625))]
    #[case("`battery level`", json!(88))]
    #[case("device.name & ' sensor'", json!("Porch sensor"))]
    #[case("reading.rh > 40", json!(true))]
    #[case("'kitchen' in sensors.room", json!(true))]
    #[case("$.reading.rh", json!(47))]
    fn test_evaluate_matches(#[case] expression: &str, #[case] expected: Value) {
        let query = Query::parse(expression).unwrap();
        assert_eq!(query.evaluate(&document()).unwrap(), Some(expected));
    }

    #[rstest]
    #[case("reading.missing")]
    #[case("nothing.here.at.all")]
    #[case("sensors[5].value")]
    #[case("sensors[type = 'pressure'].value")]
    #[case("reading.missing * 2")]
    fn test_evaluate_absent(#[case] expression: &str) {
        let query = Query::parse(expression).unwrap();
        assert_eq!(query.evaluate(&document()).unwrap(), None);
    }

    #[test]
    fn test_type_mismatch_is_error() {
        let query = Query::parse("device.name * 2").unwrap();
        assert!(matches!(
            query.evaluate(&document()),
            Err(QueryError::Eval(_))
        ));
    }

    #[test]
    fn test_tolerant_evaluate_never_raises() {
        let doc = document();
        assert_eq!(evaluate(None, &doc), None);
        assert_eq!(evaluate(Some("reading..tempC"), &doc), None);
        assert_eq!(evaluate(Some("reading.tempC["), &doc), None);
        assert_eq!(evaluate(Some("$nope(reading)"), &doc), None);
        assert_eq!(evaluate(Some("device.name - 1"), &doc), None);
        assert_eq!(evaluate(Some("$round(reading.tempC, 400)"), &doc), None);
        let nested = format!("{}1{}", "(".repeat(1_000), ")".repeat(1_000));
        assert_eq!(evaluate(Some(&nested), &doc), None);
        assert_eq!(evaluate(Some("reading.tempC"), &doc), Some(json!(21.5)));
    }

    #[test]
    fn test_query_reused_across_documents() {
        let query = Query::parse("reading.tempC").unwrap();
        assert_eq!(
            query.evaluate(&json!({"reading": {"tempC": 1}})).unwrap(),
            Some(json!(1))
        );
        assert_eq!(
            query.evaluate(&json!({"reading": {"tempC": 2}})).unwrap(),
            Some(json!(2))
        );
        assert_eq!(query.evaluate(&json!([1, 2, 3])).unwrap(), None);
        assert_eq!(query.to_string(), "reading.tempC");
    }

    #[test]
    fn test_top_level_array_document() {
        let query = Query::parse("tempC").unwrap();
        let doc = json!([{"tempC": 20}, {"tempC": 21}]);
        assert_eq!(query.evaluate(&doc).unwrap(), Some(json!([20, 21])));
    }
}
