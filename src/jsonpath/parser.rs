//! JSONPath query string parser.

use serde_json::Value as Json;

use super::ast::{CompareOp, FilterExpr, JsonPath, PathRoot, PathSegment};
use super::error::JsonPathError;
use super::functions::FunctionRegistry;

/// Parser for JSONPath query strings.
pub struct Parser<'f> {
    input: Vec<char>,
    position: usize,
    functions: &'f FunctionRegistry,
}

impl<'f> Parser<'f> {
    /// Creates a new parser for the given query string.
    pub fn new(query: &str, functions: &'f FunctionRegistry) -> Self {
        Self {
            input: query.chars().collect(),
            position: 0,
            functions,
        }
    }

    /// Parses the query string into a JsonPath.
    ///
    /// Function calls inside filters are checked against `functions`.
    pub fn parse(query: &str, functions: &'f FunctionRegistry) -> Result<JsonPath, JsonPathError> {
        let mut parser = Parser::new(query, functions);
        parser.parse_path()
    }

    fn parse_path(&mut self) -> Result<JsonPath, JsonPathError> {
        self.skip_whitespace();

        if self.peek() != Some('$') {
            return Err(JsonPathError::InvalidSyntax {
                message: "JSONPath must start with '$'".to_string(),
            });
        }
        self.next();

        let segments = self.parse_segments()?;

        self.skip_whitespace();
        if let Some(ch) = self.peek() {
            return Err(JsonPathError::UnexpectedToken {
                position: self.position,
                found: ch.to_string(),
                expected: "end of query".to_string(),
            });
        }

        Ok(JsonPath::new(PathRoot::Root, segments))
    }

    /// Parses `.name`, `..name` and `[...]` segments until something else shows up.
    fn parse_segments(&mut self) -> Result<Vec<PathSegment>, JsonPathError> {
        let mut segments = Vec::new();
        loop {
            let saved_pos = self.position;
            self.skip_whitespace();
            match self.peek() {
                Some('.') => {
                    self.next();
                    if self.peek() == Some('.') {
                        segments.push(self.parse_recursive_descent()?);
                    } else if self.peek() == Some('*') {
                        self.next();
                        segments.push(PathSegment::Wildcard);
                    } else {
                        let name = self.parse_identifier()?;
                        segments.push(PathSegment::Child(name));
                    }
                }
                Some('[') => {
                    segments.push(self.parse_bracket_expression()?);
                }
                _ => {
                    self.position = saved_pos;
                    break;
                }
            }
        }
        Ok(segments)
    }

    /// Returns the current character without advancing.
    fn peek(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    /// Returns the next character and advances position.
    fn next(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.position += 1;
        Some(ch)
    }

    /// Skips whitespace characters.
    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.next();
            } else {
                break;
            }
        }
    }

    /// Checks if we've reached the end of input.
    fn is_eof(&self) -> bool {
        self.position >= self.input.len()
    }

    fn lookahead(&self, token: &str) -> bool {
        token
            .chars()
            .enumerate()
            .all(|(i, ch)| self.peek_at(i) == Some(ch))
    }

    /// Consumes `keyword` if it is next and is not the prefix of a longer word.
    fn eat_keyword(&mut self, keyword: &str) -> bool {
        let len = keyword.chars().count();
        if self.lookahead(keyword) && !self.peek_at(len).is_some_and(is_identifier_char) {
            self.position += len;
            true
        } else {
            false
        }
    }

    /// Expects a specific character and advances, or returns an error.
    fn expect(&mut self, expected: char) -> Result<(), JsonPathError> {
        self.skip_whitespace();
        let pos = self.position;
        match self.next() {
            Some(ch) if ch == expected => Ok(()),
            Some(ch) => Err(JsonPathError::UnexpectedToken {
                position: pos,
                found: ch.to_string(),
                expected: format!("'{}'", expected),
            }),
            None => Err(JsonPathError::UnexpectedEnd {
                expected: format!("'{}'", expected),
            }),
        }
    }

    /// Parses an identifier (property or function name).
    fn parse_identifier(&mut self) -> Result<String, JsonPathError> {
        self.skip_whitespace();
        let mut name = String::new();
        while let Some(ch) = self.peek() {
            if is_identifier_char(ch) {
                name.push(ch);
                self.next();
            } else {
                break;
            }
        }
        if name.is_empty() {
            match self.peek() {
                Some(ch) => Err(JsonPathError::UnexpectedToken {
                    position: self.position,
                    found: ch.to_string(),
                    expected: "identifier".to_string(),
                }),
                None => Err(JsonPathError::UnexpectedEnd {
                    expected: "identifier".to_string(),
                }),
            }
        } else {
            Ok(name)
        }
    }

    /// Parses recursive descent (..)
    fn parse_recursive_descent(&mut self) -> Result<PathSegment, JsonPathError> {
        self.expect('.')?;
        let selector = match self.peek() {
            Some('[') => self.parse_bracket_expression()?,
            Some('*') => {
                self.next();
                PathSegment::Wildcard
            }
            _ => PathSegment::Child(self.parse_identifier()?),
        };
        Ok(PathSegment::RecursiveDescent(Box::new(selector)))
    }

    /// Parses bracket expression: [index], [start:end:step], ['key'], [*], [?expr]
    /// or a comma separated union of those.
    fn parse_bracket_expression(&mut self) -> Result<PathSegment, JsonPathError> {
        self.expect('[')?;

        let mut selectors = Vec::new();
        loop {
            selectors.push(self.parse_selector()?);
            self.skip_whitespace();
            if self.peek() == Some(',') {
                self.next();
            } else {
                break;
            }
        }
        self.expect(']')?;

        if selectors.len() == 1 {
            Ok(selectors.remove(0))
        } else {
            Ok(PathSegment::Union(selectors))
        }
    }

    fn parse_selector(&mut self) -> Result<PathSegment, JsonPathError> {
        self.skip_whitespace();
        match self.peek() {
            Some('*') => {
                self.next();
                Ok(PathSegment::Wildcard)
            }
            Some('\'') | Some('"') => Ok(PathSegment::Child(self.parse_string_literal()?)),
            Some('?') => {
                self.next();
                let expr = self.parse_or()?;
                Ok(PathSegment::Filter(Box::new(expr)))
            }
            Some(':') => self.parse_slice(None),
            Some('-') | Some('0'..='9') => {
                let idx = self.parse_bracket_number()?;
                self.skip_whitespace();
                if self.peek() == Some(':') {
                    self.parse_slice(Some(idx))
                } else {
                    Ok(PathSegment::Index(idx))
                }
            }
            Some(ch) => Err(JsonPathError::UnexpectedToken {
                position: self.position,
                found: ch.to_string(),
                expected: "a selector".to_string(),
            }),
            None => Err(JsonPathError::UnexpectedEnd {
                expected: "a selector".to_string(),
            }),
        }
    }

    /// Parses a quoted string, single or double quoted.
    fn parse_string_literal(&mut self) -> Result<String, JsonPathError> {
        let quote = match self.next() {
            Some(q @ ('\'' | '"')) => q,
            _ => {
                return Err(JsonPathError::InvalidSyntax {
                    message: "expected a quoted string".to_string(),
                })
            }
        };

        let mut value = String::new();
        loop {
            match self.next() {
                Some(ch) if ch == quote => break,
                Some('\\') => match self.next() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some('r') => value.push('\r'),
                    Some('b') => value.push('\u{8}'),
                    Some('f') => value.push('\u{c}'),
                    Some('/') => value.push('/'),
                    Some('\\') => value.push('\\'),
                    Some('\'') => value.push('\''),
                    Some('"') => value.push('"'),
                    Some('u') => value.push(self.parse_unicode_escape()?),
                    Some(_) | None => {
                        return Err(JsonPathError::InvalidSyntax {
                            message: "invalid escape sequence".to_string(),
                        })
                    }
                },
                Some(ch) => value.push(ch),
                None => {
                    return Err(JsonPathError::UnexpectedEnd {
                        expected: format!("closing quote {}", quote),
                    })
                }
            }
        }
        Ok(value)
    }

    fn parse_unicode_escape(&mut self) -> Result<char, JsonPathError> {
        let mut code = 0u32;
        for _ in 0..4 {
            let digit = self
                .next()
                .and_then(|ch| ch.to_digit(16))
                .ok_or_else(|| JsonPathError::InvalidSyntax {
                    message: "invalid \\u escape".to_string(),
                })?;
            code = code * 16 + digit;
        }
        char::from_u32(code).ok_or_else(|| JsonPathError::InvalidSyntax {
            message: format!("invalid code point \\u{:04x}", code),
        })
    }

    /// Parses a number inside brackets
    fn parse_bracket_number(&mut self) -> Result<isize, JsonPathError> {
        let num_str = self.parse_number_string()?;
        num_str
            .parse::<isize>()
            .map_err(|_| JsonPathError::InvalidSyntax {
                message: format!("invalid number: {}", num_str),
            })
    }

    /// Parses an integer as a string
    fn parse_number_string(&mut self) -> Result<String, JsonPathError> {
        let mut num = String::new();
        if self.peek() == Some('-') {
            num.push('-');
            self.next();
        }
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                num.push(ch);
                self.next();
            } else {
                break;
            }
        }
        if num.is_empty() || num == "-" {
            Err(JsonPathError::InvalidSyntax {
                message: "expected number".to_string(),
            })
        } else {
            Ok(num)
        }
    }

    /// Parses the rest of a slice once its start is known: `:end`, `:end:step`, `:`
    fn parse_slice(&mut self, start: Option<isize>) -> Result<PathSegment, JsonPathError> {
        self.expect(':')?;
        self.skip_whitespace();
        let end = self.parse_optional_number()?;

        self.skip_whitespace();
        let step = if self.peek() == Some(':') {
            self.next();
            self.skip_whitespace();
            self.parse_optional_number()?
        } else {
            None
        };

        Ok(PathSegment::Slice(start, end, step))
    }

    fn parse_optional_number(&mut self) -> Result<Option<isize>, JsonPathError> {
        match self.peek() {
            Some('-') | Some('0'..='9') => Ok(Some(self.parse_bracket_number()?)),
            _ => Ok(None),
        }
    }

    fn parse_or(&mut self) -> Result<FilterExpr, JsonPathError> {
        let mut left = self.parse_and()?;
        loop {
            self.skip_whitespace();
            if !self.lookahead("||") {
                return Ok(left);
            }
            self.position += 2;
            let right = self.parse_and()?;
            left = FilterExpr::Or(Box::new(left), Box::new(right));
        }
    }

    fn parse_and(&mut self) -> Result<FilterExpr, JsonPathError> {
        let mut left = self.parse_not()?;
        loop {
            self.skip_whitespace();
            if !self.lookahead("&&") {
                return Ok(left);
            }
            self.position += 2;
            let right = self.parse_not()?;
            left = FilterExpr::And(Box::new(left), Box::new(right));
        }
    }

    fn parse_not(&mut self) -> Result<FilterExpr, JsonPathError> {
        self.skip_whitespace();
        if self.peek() == Some('!') && self.peek_at(1) != Some('=') {
            self.next();
            let inner = self.parse_not()?;
            return Ok(FilterExpr::Not(Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<FilterExpr, JsonPathError> {
        let left = self.parse_primary()?;
        self.skip_whitespace();

        let op = if self.lookahead("==") {
            self.position += 2;
            CompareOp::Eq
        } else if self.lookahead("!=") {
            self.position += 2;
            CompareOp::Ne
        } else if self.lookahead("<=") {
            self.position += 2;
            CompareOp::Le
        } else if self.lookahead(">=") {
            self.position += 2;
            CompareOp::Ge
        } else if self.lookahead("<") {
            self.position += 1;
            CompareOp::Lt
        } else if self.lookahead(">") {
            self.position += 1;
            CompareOp::Gt
        } else if self.eat_keyword("in") {
            CompareOp::In
        } else if self.eat_keyword("contains") {
            CompareOp::Contains
        } else {
            return Ok(left);
        };

        let right = self.parse_primary()?;
        Ok(FilterExpr::Compare {
            left: Box::new(left),
            op,
            right: Box::new(right),
        })
    }

    fn parse_primary(&mut self) -> Result<FilterExpr, JsonPathError> {
        self.skip_whitespace();
        match self.peek() {
            Some('(') => {
                self.next();
                let expr = self.parse_or()?;
                self.expect(')')?;
                Ok(expr)
            }
            Some('@') => {
                self.next();
                Ok(FilterExpr::Path(JsonPath::new(
                    PathRoot::Current,
                    self.parse_segments()?,
                )))
            }
            Some('$') => {
                self.next();
                Ok(FilterExpr::Path(JsonPath::new(
                    PathRoot::Root,
                    self.parse_segments()?,
                )))
            }
            Some('_') if !self.peek_at(1).is_some_and(is_identifier_char) => {
                self.next();
                Ok(FilterExpr::Path(JsonPath::new(
                    PathRoot::Extra,
                    self.parse_segments()?,
                )))
            }
            Some('[') => self.parse_list_literal(),
            Some(ch) if ch.is_alphabetic() || ch == '_' => self.parse_word(),
            Some(_) => Ok(FilterExpr::Literal(self.parse_literal()?)),
            None => Err(JsonPathError::UnexpectedEnd {
                expected: "filter expression".to_string(),
            }),
        }
    }

    /// Parses `true`, `false`, `null` or a function call.
    fn parse_word(&mut self) -> Result<FilterExpr, JsonPathError> {
        let start = self.position;
        let name = self.parse_identifier()?;
        match name.as_str() {
            "true" => return Ok(FilterExpr::Literal(Json::Bool(true))),
            "false" => return Ok(FilterExpr::Literal(Json::Bool(false))),
            "null" => return Ok(FilterExpr::Literal(Json::Null)),
            _ => {}
        }

        self.skip_whitespace();
        if self.peek() != Some('(') {
            return Err(JsonPathError::InvalidSyntax {
                message: format!("unexpected word '{}' at position {}", name, start),
            });
        }
        if !self.functions.contains(&name) {
            return Err(JsonPathError::UnknownFunction { name });
        }
        self.next();

        let mut args = Vec::new();
        self.skip_whitespace();
        if self.peek() == Some(')') {
            self.next();
            return Ok(FilterExpr::Function { name, args });
        }
        loop {
            args.push(self.parse_or()?);
            self.skip_whitespace();
            if self.peek() == Some(',') {
                self.next();
            } else {
                break;
            }
        }
        self.expect(')')?;
        Ok(FilterExpr::Function { name, args })
    }

    fn parse_list_literal(&mut self) -> Result<FilterExpr, JsonPathError> {
        self.expect('[')?;
        let mut items = Vec::new();
        self.skip_whitespace();
        if self.peek() != Some(']') {
            loop {
                self.skip_whitespace();
                items.push(self.parse_literal()?);
                self.skip_whitespace();
                if self.peek() == Some(',') {
                    self.next();
                } else {
                    break;
                }
            }
        }
        self.expect(']')?;
        Ok(FilterExpr::Literal(Json::Array(items)))
    }

    fn parse_literal(&mut self) -> Result<Json, JsonPathError> {
        match self.peek() {
            Some('\'') | Some('"') => Ok(Json::String(self.parse_string_literal()?)),
            Some('-') | Some('0'..='9') => self.parse_number_literal(),
            _ if self.eat_keyword("true") => Ok(Json::Bool(true)),
            _ if self.eat_keyword("false") => Ok(Json::Bool(false)),
            _ if self.eat_keyword("null") => Ok(Json::Null),
            Some(ch) => Err(JsonPathError::UnexpectedToken {
                position: self.position,
                found: ch.to_string(),
                expected: "a literal".to_string(),
            }),
            None => Err(JsonPathError::UnexpectedEnd {
                expected: "a literal".to_string(),
            }),
        }
    }

    fn parse_number_literal(&mut self) -> Result<Json, JsonPathError> {
        let mut text = self.parse_number_string()?;
        let mut is_float = false;
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            text.push('.');
            self.next();
            while let Some(ch) = self.peek().filter(char::is_ascii_digit) {
                text.push(ch);
                self.next();
            }
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            is_float = true;
            text.push('e');
            self.next();
            if let Some(sign @ ('+' | '-')) = self.peek() {
                text.push(sign);
                self.next();
            }
            while let Some(ch) = self.peek().filter(char::is_ascii_digit) {
                text.push(ch);
                self.next();
            }
        }

        let invalid = || JsonPathError::InvalidSyntax {
            message: format!("invalid number: {}", text),
        };
        if is_float {
            let n: f64 = text.parse().map_err(|_| invalid())?;
            serde_json::Number::from_f64(n)
                .map(Json::Number)
                .ok_or_else(invalid)
        } else {
            text.parse::<i64>().map(Json::from).map_err(|_| invalid())
        }
    }
}

fn is_identifier_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '-'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(query: &str) -> Result<JsonPath, JsonPathError> {
        Parser::parse(query, &FunctionRegistry::standard())
    }

    #[test]
    fn test_parse_root() {
        let path = parse("$").unwrap();
        assert_eq!(path.root, PathRoot::Root);
        assert!(path.segments.is_empty());
    }

    #[test]
    fn test_parse_nested_child() {
        let path = parse("$.store.book").unwrap();
        assert_eq!(path.segments.len(), 2);
        assert_eq!(path.segments[1], PathSegment::Child("book".to_string()));
    }

    #[test]
    fn test_parse_wildcard_dot() {
        let path = parse("$.users.*.name").unwrap();
        assert_eq!(path.segments[1], PathSegment::Wildcard);
        assert_eq!(path.segments[2], PathSegment::Child("name".to_string()));
    }

    #[test]
    fn test_parse_recursive_descent() {
        let path = parse("$..price").unwrap();
        assert_eq!(
            path.segments[0],
            PathSegment::RecursiveDescent(Box::new(PathSegment::Child("price".to_string())))
        );
    }

    #[test]
    fn test_parse_index_union() {
        let path = parse("$[1, 2]").unwrap();
        assert_eq!(
            path.segments[0],
            PathSegment::Union(vec![PathSegment::Index(1), PathSegment::Index(2)])
        );
    }

    #[test]
    fn test_parse_unclosed_union_fails() {
        let err = parse("$[1,2").unwrap_err();
        assert!(matches!(err, JsonPathError::UnexpectedEnd { .. }));
        assert!(err.is_syntax_error());
    }

    #[test]
    fn test_parse_missing_root_fails() {
        assert!(parse(".@").is_err());
        assert!(parse("store.book").is_err());
        assert!(parse("").is_err());
    }

    #[test]
    fn test_parse_trailing_garbage_fails() {
        let err = parse("$.a b").unwrap_err();
        assert!(matches!(err, JsonPathError::UnexpectedToken { position: 4, .. }));
    }

    #[test]
    fn test_parse_slice_with_step() {
        let path = parse("$.items[::-1]").unwrap();
        assert_eq!(path.segments[1], PathSegment::Slice(None, None, Some(-1)));
        let path = parse("$.items[1:3]").unwrap();
        assert_eq!(path.segments[1], PathSegment::Slice(Some(1), Some(3), None));
    }

    #[test]
    fn test_parse_multi_property() {
        let path = parse("$.store['book','music']").unwrap();
        assert_eq!(
            path.segments[1],
            PathSegment::Union(vec![
                PathSegment::Child("book".to_string()),
                PathSegment::Child("music".to_string()),
            ])
        );
    }

    #[test]
    fn test_parse_filter_with_extra_context() {
        let path = parse("$.users[?@.name in _.names].name").unwrap();
        let PathSegment::Filter(expr) = &path.segments[1] else {
            panic!("expected a filter selector");
        };
        let FilterExpr::Compare { left, op, right } = expr.as_ref() else {
            panic!("expected a comparison");
        };
        assert_eq!(*op, CompareOp::In);
        assert!(matches!(left.as_ref(), FilterExpr::Path(p) if p.root == PathRoot::Current));
        assert!(matches!(right.as_ref(), FilterExpr::Path(p) if p.root == PathRoot::Extra));
    }

    #[test]
    fn test_parse_logical_operators() {
        let path = parse("$[?@.a > 1 && !(@.b == 'x') || @.c]").unwrap();
        assert!(matches!(
            &path.segments[0],
            PathSegment::Filter(expr) if matches!(expr.as_ref(), FilterExpr::Or(_, _))
        ));
    }

    #[test]
    fn test_parse_unknown_function_fails() {
        let err = parse("$.users[?mock(@)]").unwrap_err();
        assert_eq!(
            err,
            JsonPathError::UnknownFunction {
                name: "mock".to_string()
            }
        );
    }

    #[test]
    fn test_parse_function_call() {
        let path = parse("$[?length(@.tags) >= 2]").unwrap();
        let PathSegment::Filter(expr) = &path.segments[0] else {
            panic!("expected a filter selector");
        };
        assert!(matches!(
            expr.as_ref(),
            FilterExpr::Compare { left, .. } if matches!(left.as_ref(), FilterExpr::Function { .. })
        ));
    }

    #[test]
    fn test_parse_literals() {
        let path = parse("$[?@.x in [1, 2.5, 'a', true, null]]").unwrap();
        let PathSegment::Filter(expr) = &path.segments[0] else {
            panic!("expected a filter selector");
        };
        let FilterExpr::Compare { right, .. } = expr.as_ref() else {
            panic!("expected a comparison");
        };
        assert_eq!(
            **right,
            FilterExpr::Literal(serde_json::json!([1, 2.5, "a", true, null]))
        );
    }

    #[test]
    fn test_parse_whitespace_handling() {
        let path = parse("$ . store [ 0 ]").unwrap();
        assert_eq!(path.segments.len(), 2);
        assert_eq!(path.segments[0], PathSegment::Child("store".to_string()));
        assert_eq!(path.segments[1], PathSegment::Index(0));
    }
}
