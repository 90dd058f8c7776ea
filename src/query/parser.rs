//! Pratt parser turning tokens into an [`Expr`] tree

use super::ast::{BinaryOp, Expr};
use super::tokenizer::{Spanned, Token};
use super::QueryError;
use serde_json::Value;

const DOT_POWER: u8 = 75;
const PREDICATE_POWER: u8 = 80;
const UNARY_POWER: u8 = 70;

/// Deepest expression tree the parser builds; keeps parsing and evaluation
/// off the end of the stack
const MAX_DEPTH: usize = 128;

pub struct Parser {
    tokens: Vec<Spanned>,
    cursor: usize,
    depth: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Spanned>) -> Self {
        Self {
            tokens,
            cursor: 0,
            depth: 0,
        }
    }

    /// Parse a complete expression, rejecting trailing tokens
    pub fn parse(mut self) -> Result<Expr, QueryError> {
        if matches!(self.peek(), Token::Eof) {
            return Err(QueryError::parse(0, "empty expression"));
        }
        let expr = self.expression(0)?;
        match self.peek() {
            Token::Eof => Ok(expr),
            other => Err(QueryError::parse(
                self.position(),
                format!("unexpected token {other:?}"),
            )),
        }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.cursor.min(self.tokens.len() - 1)].token
    }

    fn position(&self) -> usize {
        self.tokens[self.cursor.min(self.tokens.len() - 1)].position
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.cursor < self.tokens.len() - 1 {
            self.cursor += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), QueryError> {
        if *self.peek() == expected {
            self.advance();
            Ok(())
        } else {
            Err(QueryError::parse(
                self.position(),
                format!("expected {expected:?}, found {:?}", self.peek()),
            ))
        }
    }

    fn expression(&mut self, min_power: u8) -> Result<Expr, QueryError> {
        self.depth += 1;
        let expr = self.nested_expression(min_power);
        self.depth -= 1;
        expr
    }

    fn check_depth(&self, extra: usize) -> Result<(), QueryError> {
        if self.depth + extra > MAX_DEPTH {
            return Err(QueryError::parse(
                self.position(),
                "expression nested too deeply",
            ));
        }
        Ok(())
    }

    fn nested_expression(&mut self, min_power: u8) -> Result<Expr, QueryError> {
        self.check_depth(0)?;
        let mut lhs = self.prefix()?;
        // Left-associative chains deepen the tree without recursing here
        let mut chained = 0;

        loop {
            let power = match self.peek() {
                Token::Dot => DOT_POWER,
                Token::LeftBracket => PREDICATE_POWER,
                Token::Operator(symbol) => match BinaryOp::from_symbol(symbol) {
                    Some(op) => op.binding_power(),
                    None => break,
                },
                Token::Name(word) => match word.as_str() {
                    "and" | "or" | "in" => BinaryOp::from_symbol(word)
                        .map(BinaryOp::binding_power)
                        .unwrap_or(0),
                    _ => break,
                },
                _ => break,
            };
            if power <= min_power {
                break;
            }
            chained += 1;
            self.check_depth(chained)?;

            lhs = match self.advance() {
                Token::Dot => {
                    let rhs = self.expression(DOT_POWER)?;
                    join_path(lhs, rhs)
                }
                Token::LeftBracket => {
                    let predicate = self.expression(0)?;
                    self.expect(Token::RightBracket)?;
                    Expr::Filter {
                        base: Box::new(lhs),
                        predicate: Box::new(predicate),
                    }
                }
                Token::Operator(symbol) => self.binary(lhs, symbol)?,
                Token::Name(word) => self.binary(lhs, &word)?,
                _ => unreachable!("binding power only assigned to infix tokens"),
            };
        }

        Ok(lhs)
    }

    fn binary(&mut self, lhs: Expr, symbol: &str) -> Result<Expr, QueryError> {
        let op = BinaryOp::from_symbol(symbol).ok_or_else(|| {
            QueryError::parse(self.position(), format!("unknown operator '{symbol}'"))
        })?;
        let rhs = self.expression(op.binding_power())?;
        Ok(Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    fn prefix(&mut self) -> Result<Expr, QueryError> {
        let position = self.position();
        match self.advance() {
            Token::Number(n) => Ok(Expr::Literal(number_value(n))),
            Token::String(s) => Ok(Expr::Literal(Value::String(s))),
            Token::Name(name) => Ok(match name.as_str() {
                "true" => Expr::Literal(Value::Bool(true)),
                "false" => Expr::Literal(Value::Bool(false)),
                "null" => Expr::Literal(Value::Null),
                _ => Expr::Name(name),
            }),
            Token::Operator("*") => Ok(Expr::Wildcard),
            Token::Operator("-") => {
                let operand = self.expression(UNARY_POWER)?;
                Ok(match operand {
                    Expr::Literal(Value::Number(n)) => {
                        Expr::Literal(number_value(-n.as_f64().unwrap_or_default()))
                    }
                    other => Expr::Negate(Box::new(other)),
                })
            }
            Token::Variable(name) => match name.as_str() {
                "" => Ok(Expr::Context),
                "$" => Ok(Expr::Root),
                _ if *self.peek() == Token::LeftParen => {
                    self.advance();
                    let args = self.list(Token::RightParen)?;
                    Ok(Expr::Call { name, args })
                }
                _ => Err(QueryError::parse(
                    position,
                    format!("unsupported variable '${name}'"),
                )),
            },
            Token::LeftParen => {
                let inner = self.expression(0)?;
                self.expect(Token::RightParen)?;
                Ok(inner)
            }
            Token::LeftBracket => Ok(Expr::Array(self.list(Token::RightBracket)?)),
            other => Err(QueryError::parse(
                position,
                format!("unexpected token {other:?}"),
            )),
        }
    }

    /// Comma separated expressions up to `close`
    fn list(&mut self, close: Token) -> Result<Vec<Expr>, QueryError> {
        let mut items = Vec::new();
        if *self.peek() == close {
            self.advance();
            return Ok(items);
        }
        loop {
            items.push(self.expression(0)?);
            match self.advance() {
                Token::Comma => continue,
                token if token == close => return Ok(items),
                other => {
                    return Err(QueryError::parse(
                        self.position(),
                        format!("expected ',' or {close:?}, found {other:?}"),
                    ))
                }
            }
        }
    }
}

fn join_path(lhs: Expr, rhs: Expr) -> Expr {
    let mut steps = match lhs {
        Expr::Path(steps) => steps,
        other => vec![other],
    };
    match rhs {
        Expr::Path(more) => steps.extend(more),
        other => steps.push(other),
    }
    Expr::Path(steps)
}

/// Integral values become JSON integers so `47` stays `47`, not `47.0`
pub(crate) fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::super::tokenizer::tokenize;
    use super::*;

    fn parse(input: &str) -> Expr {
        Parser::new(tokenize(input).unwrap()).parse().unwrap()
    }

    #[test]
    fn test_dotted_path() {
        assert_eq!(
            parse("reading.tempC"),
            Expr::Path(vec![
                Expr::Name("reading".into()),
                Expr::Name("tempC".into())
            ])
        );
    }

    #[test]
    fn test_predicate_binds_to_step() {
        assert_eq!(
            parse("sensors[0].value"),
            Expr::Path(vec![
                Expr::Filter {
                    base: Box::new(Expr::Name("sensors".into())),
                    predicate: Box::new(Expr::Literal(Value::from(0))),
                },
                Expr::Name("value".into()),
            ])
        );
    }

    #[test]
    fn test_arithmetic_precedence() {
        let expr = parse("a + b * 2");
        match expr {
            Expr::Binary {
                op: BinaryOp::Add,
                rhs,
                ..
            } => assert!(matches!(
                *rhs,
                Expr::Binary {
                    op: BinaryOp::Multiply,
                    ..
                }
            )),
            other => panic!("unexpected tree {other:?}"),
        }
    }

    #[test]
    fn test_keyword_operators() {
        let expr = parse("type = 'temp' and value > 0");
        assert!(matches!(
            expr,
            Expr::Binary {
                op: BinaryOp::And,
                ..
            }
        ));
    }

    #[test]
    fn test_malformed_expressions() {
        for input in ["", "reading.", "a[0", "$foo", "(a", "a b"] {
            let tokens = tokenize(input).unwrap();
            assert!(
                Parser::new(tokens).parse().is_err(),
                "expected parse failure for '{input}'"
            );
        }
    }

    #[test]
    fn test_nesting_limit() {
        let shallow = format!("{}1{}", "(".repeat(50), ")".repeat(50));
        assert_eq!(parse(&shallow), Expr::Literal(Value::from(1)));

        let parens = format!("{}1{}", "(".repeat(5_000), ")".repeat(5_000));
        let negations = format!("{}1", "-".repeat(50_000));
        let chain = format!("1{}", " + 1".repeat(10_000));
        for input in [parens, negations, chain] {
            let err = Parser::new(tokenize(&input).unwrap()).parse().unwrap_err();
            assert!(
                matches!(&err, QueryError::Parse { message, .. } if message.contains("nested too deeply")),
                "unexpected error {err:?}"
            );
        }
    }
}
