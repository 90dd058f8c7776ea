//! Lexical analysis for query expressions

use super::QueryError;

/// Single lexical token
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Dot,
    LeftBracket,
    RightBracket,
    LeftParen,
    RightParen,
    Comma,
    /// Field name, either bare or backtick-quoted
    Name(String),
    /// `$` prefixed identifier; `$` alone is the empty name, `$$` is `"$"`
    Variable(String),
    String(String),
    Number(f64),
    /// Operator symbol (`=`, `!=`, `<=`, `+`, `*`, `&`, ...)
    Operator(&'static str),
    Eof,
}

/// Token together with its byte offset in the source, for error reporting
#[derive(Debug, Clone)]
pub struct Spanned {
    pub token: Token,
    pub position: usize,
}

/// Convert an expression into a token list terminated by [`Token::Eof`]
pub fn tokenize(input: &str) -> Result<Vec<Spanned>, QueryError> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (position, c) = chars[i];
        let next = chars.get(i + 1).map(|(_, c)| *c);

        let token = match c {
            ' ' | '\t' | '\n' | '\r' => {
                i += 1;
                continue;
            }
            '.' => Token::Dot,
            '[' => Token::LeftBracket,
            ']' => Token::RightBracket,
            '(' => Token::LeftParen,
            ')' => Token::RightParen,
            ',' => Token::Comma,
            '=' => Token::Operator("="),
            '+' => Token::Operator("+"),
            '-' => Token::Operator("-"),
            '*' => Token::Operator("*"),
            '/' => Token::Operator("/"),
            '%' => Token::Operator("%"),
            '&' => Token::Operator("&"),
            '!' if next == Some('=') => {
                i += 1;
                Token::Operator("!=")
            }
            '<' if next == Some('=') => {
                i += 1;
                Token::Operator("<=")
            }
            '>' if next == Some('=') => {
                i += 1;
                Token::Operator(">=")
            }
            '<' => Token::Operator("<"),
            '>' => Token::Operator(">"),
            '\'' | '"' => {
                let (value, end) = read_string(&chars, i, input)?;
                i = end;
                Token::String(value)
            }
            '`' => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && chars[end].1 != '`' {
                    end += 1;
                }
                if end >= chars.len() {
                    return Err(QueryError::parse(position, "unterminated quoted name"));
                }
                let name: String = chars[start..end].iter().map(|(_, c)| *c).collect();
                i = end;
                Token::Name(name)
            }
            '$' => {
                let mut end = i + 1;
                let name = if next == Some('$') {
                    end += 1;
                    "$".to_string()
                } else {
                    let start = end;
                    while end < chars.len() && is_name_char(chars[end].1) {
                        end += 1;
                    }
                    chars[start..end].iter().map(|(_, c)| *c).collect()
                };
                i = end;
                tokens.push(Spanned {
                    token: Token::Variable(name),
                    position,
                });
                continue;
            }
            c if c.is_ascii_digit() => {
                let start = i;
                let mut end = i;
                while end < chars.len() && chars[end].1.is_ascii_digit() {
                    end += 1;
                }
                // A dot followed by a digit continues the number; otherwise it is a path step
                if end + 1 < chars.len() && chars[end].1 == '.' && chars[end + 1].1.is_ascii_digit()
                {
                    end += 1;
                    while end < chars.len() && chars[end].1.is_ascii_digit() {
                        end += 1;
                    }
                }
                if end < chars.len() && matches!(chars[end].1, 'e' | 'E') {
                    let mut exp = end + 1;
                    if exp < chars.len() && matches!(chars[exp].1, '+' | '-') {
                        exp += 1;
                    }
                    if exp < chars.len() && chars[exp].1.is_ascii_digit() {
                        end = exp;
                        while end < chars.len() && chars[end].1.is_ascii_digit() {
                            end += 1;
                        }
                    }
                }
                let text: String = chars[start..end].iter().map(|(_, c)| *c).collect();
                let number = text
                    .parse::<f64>()
                    .map_err(|_| QueryError::parse(position, format!("invalid number '{text}'")))?;
                i = end;
                tokens.push(Spanned {
                    token: Token::Number(number),
                    position,
                });
                continue;
            }
            c if is_name_char(c) => {
                let start = i;
                let mut end = i;
                while end < chars.len() && is_name_char(chars[end].1) {
                    end += 1;
                }
                let name: String = chars[start..end].iter().map(|(_, c)| *c).collect();
                i = end;
                tokens.push(Spanned {
                    token: Token::Name(name),
                    position,
                });
                continue;
            }
            other => {
                return Err(QueryError::parse(
                    position,
                    format!("unexpected character '{other}'"),
                ));
            }
        };

        tokens.push(Spanned { token, position });
        i += 1;
    }

    tokens.push(Spanned {
        token: Token::Eof,
        position: input.len(),
    });
    Ok(tokens)
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Read a quoted string starting at `start`; returns the value and the index of the closing quote
fn read_string(
    chars: &[(usize, char)],
    start: usize,
    input: &str,
) -> Result<(String, usize), QueryError> {
    let quote = chars[start].1;
    let mut value = String::new();
    let mut i = start + 1;

    while i < chars.len() {
        let c = chars[i].1;
        if c == quote {
            return Ok((value, i));
        }
        if c == '\\' {
            i += 1;
            let escaped = chars
                .get(i)
                .map(|(_, c)| *c)
                .ok_or_else(|| QueryError::parse(input.len(), "unterminated escape"))?;
            match escaped {
                'n' => value.push('\n'),
                't' => value.push('\t'),
                'r' => value.push('\r'),
                'u' => {
                    let hex: String = chars
                        .iter()
                        .skip(i + 1)
                        .take(4)
                        .map(|(_, c)| *c)
                        .collect();
                    let code = u32::from_str_radix(&hex, 16)
                        .ok()
                        .and_then(char::from_u32)
                        .ok_or_else(|| {
                            QueryError::parse(chars[i].0, format!("invalid unicode escape '{hex}'"))
                        })?;
                    value.push(code);
                    i += 4;
                }
                other => value.push(other),
            }
        } else {
            value.push(c);
        }
        i += 1;
    }

    Err(QueryError::parse(
        chars[start].0,
        "unterminated string literal",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<Token> {
        tokenize(input)
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn test_path_tokens() {
        assert_eq!(
            kinds("reading.tempC"),
            vec![
                Token::Name("reading".into()),
                Token::Dot,
                Token::Name("tempC".into()),
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_numbers_and_operators() {
        assert_eq!(
            kinds("(a - 32) / 1.8 >= 2e1"),
            vec![
                Token::LeftParen,
                Token::Name("a".into()),
                Token::Operator("-"),
                Token::Number(32.0),
                Token::RightParen,
                Token::Operator("/"),
                Token::Number(1.8),
                Token::Operator(">="),
                Token::Number(20.0),
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_variables_and_quoted_names() {
        assert_eq!(
            kinds("$round(`battery level`, 1) & $$"),
            vec![
                Token::Variable("round".into()),
                Token::LeftParen,
                Token::Name("battery level".into()),
                Token::Comma,
                Token::Number(1.0),
                Token::RightParen,
                Token::Operator("&"),
                Token::Variable("$".into()),
                Token::Eof
            ]
        );
    }

    #[test]
    fn test_unterminated_string_is_error() {
        let err = tokenize("name = 'abc").unwrap_err();
        assert!(err.to_string().contains("unterminated"));
    }
}
