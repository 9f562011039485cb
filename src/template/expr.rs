//! Expressions inside `{{ ... }}` output statements and tag headers.

use serde_json::Value as Json;

use super::context::RenderContext;
use super::error::TemplateError;
use super::value::Value;

/// A lexical token of the expression language.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Word(String),
    Str(String),
    Int(i64),
    Float(f64),
    Dot,
    LBracket,
    RBracket,
    Pipe,
    Colon,
    Comma,
}

impl Token {
    fn describe(&self) -> String {
        match self {
            Token::Word(w) => format!("'{}'", w),
            Token::Str(s) => format!("string '{}'", s),
            Token::Int(n) => n.to_string(),
            Token::Float(n) => n.to_string(),
            Token::Dot => "'.'".to_string(),
            Token::LBracket => "'['".to_string(),
            Token::RBracket => "']'".to_string(),
            Token::Pipe => "'|'".to_string(),
            Token::Colon => "':'".to_string(),
            Token::Comma => "','".to_string(),
        }
    }
}

/// Tokens of one expression or tag header, consumed front to back.
#[derive(Debug, Clone)]
pub struct TokenStream {
    tokens: Vec<Token>,
    position: usize,
}

impl TokenStream {
    /// Tokenizes `source`.
    pub fn new(source: &str) -> Result<Self, TemplateError> {
        Ok(Self {
            tokens: tokenize(source)?,
            position: 0,
        })
    }

    pub fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    pub fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    /// Consumes `token` if it is next.
    pub fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    /// Consumes the word `word` if it is next.
    pub fn eat_word(&mut self, word: &str) -> bool {
        if matches!(self.peek(), Some(Token::Word(w)) if w == word) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    pub fn expect(&mut self, token: &Token) -> Result<(), TemplateError> {
        match self.next() {
            Some(found) if &found == token => Ok(()),
            Some(found) => Err(TemplateError::syntax(format!(
                "expected {}, found {}",
                token.describe(),
                found.describe()
            ))),
            None => Err(TemplateError::syntax(format!(
                "expected {}, found end of expression",
                token.describe()
            ))),
        }
    }

    /// Expects an identifier and returns it.
    pub fn expect_identifier(&mut self) -> Result<String, TemplateError> {
        match self.next() {
            Some(Token::Word(word)) => Ok(word),
            Some(found) => Err(TemplateError::syntax(format!(
                "expected an identifier, found {}",
                found.describe()
            ))),
            None => Err(TemplateError::syntax(
                "expected an identifier, found end of expression",
            )),
        }
    }

    pub fn expect_eof(&self) -> Result<(), TemplateError> {
        match self.peek() {
            None => Ok(()),
            Some(token) => Err(TemplateError::syntax(format!(
                "unexpected {}",
                token.describe()
            ))),
        }
    }
}

fn tokenize(source: &str) -> Result<Vec<Token>, TemplateError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let ch = chars[i];
        match ch {
            c if c.is_whitespace() => i += 1,
            '.' => {
                tokens.push(Token::Dot);
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
            '|' => {
                tokens.push(Token::Pipe);
                i += 1;
            }
            ':' => {
                tokens.push(Token::Colon);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '\'' | '"' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|&c| c == ch)
                    .ok_or_else(|| TemplateError::syntax("unterminated string literal"))?;
                tokens.push(Token::Str(chars[i + 1..i + 1 + end].iter().collect()));
                i += end + 2;
            }
            c if c.is_ascii_digit() || (c == '-' && chars.get(i + 1).is_some_and(char::is_ascii_digit)) => {
                let start = i;
                i += 1;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let is_float = i + 1 < chars.len() && chars[i] == '.' && chars[i + 1].is_ascii_digit();
                if is_float {
                    i += 1;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let invalid = || TemplateError::syntax(format!("invalid number '{}'", text));
                tokens.push(if is_float {
                    Token::Float(text.parse().map_err(|_| invalid())?)
                } else {
                    Token::Int(text.parse().map_err(|_| invalid())?)
                });
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len()
                    && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '-' || chars[i] == '?')
                {
                    i += 1;
                }
                tokens.push(Token::Word(chars[start..i].iter().collect()));
            }
            other => {
                return Err(TemplateError::syntax(format!(
                    "unexpected character '{}'",
                    other
                )))
            }
        }
    }
    Ok(tokens)
}

/// One step of a variable lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum PathItem {
    Key(String),
    Index(i64),
}

/// A literal or a variable, the operands of filters and tags.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    Literal(Json),
    Variable { name: String, path: Vec<PathItem> },
}

impl Expression {
    /// Parses a literal or a variable path from the front of `stream`.
    pub fn parse_primary(stream: &mut TokenStream) -> Result<Expression, TemplateError> {
        let name = match stream.next() {
            Some(Token::Str(s)) => return Ok(Expression::Literal(Json::String(s))),
            Some(Token::Int(n)) => return Ok(Expression::Literal(Json::from(n))),
            Some(Token::Float(n)) => {
                return Ok(Expression::Literal(
                    serde_json::Number::from_f64(n).map_or(Json::Null, Json::Number),
                ))
            }
            Some(Token::Word(word)) => match word.as_str() {
                "true" => return Ok(Expression::Literal(Json::Bool(true))),
                "false" => return Ok(Expression::Literal(Json::Bool(false))),
                "nil" | "null" => return Ok(Expression::Literal(Json::Null)),
                _ => word,
            },
            Some(token) => {
                return Err(TemplateError::syntax(format!(
                    "expected a literal or variable, found {}",
                    token.describe()
                )))
            }
            None => {
                return Err(TemplateError::syntax(
                    "expected a literal or variable, found end of expression",
                ))
            }
        };

        let mut path = Vec::new();
        loop {
            if stream.eat(&Token::Dot) {
                path.push(PathItem::Key(stream.expect_identifier()?));
            } else if stream.eat(&Token::LBracket) {
                match stream.next() {
                    Some(Token::Str(key)) => path.push(PathItem::Key(key)),
                    Some(Token::Int(idx)) => path.push(PathItem::Index(idx)),
                    _ => {
                        return Err(TemplateError::syntax(
                            "expected a string or integer inside brackets",
                        ))
                    }
                }
                stream.expect(&Token::RBracket)?;
            } else {
                break;
            }
        }
        Ok(Expression::Variable { name, path })
    }

    /// Resolves the expression in the current scope.
    pub fn evaluate(&self, ctx: &RenderContext) -> Value {
        match self {
            Expression::Literal(value) => Value::Defined(value.clone()),
            Expression::Variable { name, path } => {
                let Some(mut current) = ctx.resolve(name) else {
                    return Value::undefined(format!("'{}' is undefined", name));
                };
                for item in path {
                    match lookup(current, item) {
                        Some(next) => current = next,
                        None => return Value::undefined(format!("'{}' is undefined", self)),
                    }
                }
                Value::Defined(current.clone())
            }
        }
    }
}

fn lookup<'a>(value: &'a Json, item: &PathItem) -> Option<&'a Json> {
    match (value, item) {
        (Json::Object(props), PathItem::Key(key)) => props.get(key),
        (Json::Array(items), PathItem::Index(idx)) => {
            let idx = if *idx < 0 { items.len() as i64 + idx } else { *idx };
            usize::try_from(idx).ok().and_then(|i| items.get(i))
        }
        (Json::Array(items), PathItem::Key(key)) if key == "first" => items.first(),
        (Json::Array(items), PathItem::Key(key)) if key == "last" => items.last(),
        _ => None,
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expression::Literal(value) => write!(f, "{}", value),
            Expression::Variable { name, path } => {
                write!(f, "{}", name)?;
                for item in path {
                    match item {
                        PathItem::Key(key) => write!(f, ".{}", key)?,
                        PathItem::Index(idx) => write!(f, "[{}]", idx)?,
                    }
                }
                Ok(())
            }
        }
    }
}

/// A filter application: `| name: arg, arg`.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCall {
    pub name: String,
    pub args: Vec<Expression>,
}

/// An expression followed by zero or more filters.
#[derive(Debug, Clone, PartialEq)]
pub struct FilteredExpression {
    pub expression: Expression,
    pub filters: Vec<FilterCall>,
}

impl FilteredExpression {
    pub fn parse(source: &str) -> Result<Self, TemplateError> {
        let mut stream = TokenStream::new(source)?;
        let expression = Expression::parse_primary(&mut stream)?;

        let mut filters = Vec::new();
        while stream.eat(&Token::Pipe) {
            let name = stream.expect_identifier()?;
            let mut args = Vec::new();
            if stream.eat(&Token::Colon) {
                loop {
                    args.push(Expression::parse_primary(&mut stream)?);
                    if !stream.eat(&Token::Comma) {
                        break;
                    }
                }
            }
            filters.push(FilterCall { name, args });
        }
        stream.expect_eof()?;

        Ok(Self {
            expression,
            filters,
        })
    }

    /// Evaluates the expression and pipes it through each filter in turn.
    pub fn evaluate(&self, ctx: &RenderContext) -> Result<Value, TemplateError> {
        let mut value = self.expression.evaluate(ctx);
        for call in &self.filters {
            let filter = ctx
                .environment()
                .filter(&call.name)
                .ok_or_else(|| TemplateError::UnknownFilter(call.name.clone()))?;
            if !filter.accepts_undefined() {
                ctx.environment().undefined_mode().check(&value)?;
            }
            let args: Vec<Value> = call.args.iter().map(|arg| arg.evaluate(ctx)).collect();
            value = filter.apply(value, &args, ctx)?;
        }
        Ok(value)
    }
}
