//! Splits template source into text, output statements and tags, and builds nodes.

use super::error::TemplateError;
use super::expr::FilteredExpression;
use super::node::{Node, OutputNode, TextNode};
use super::tags::TagBlock;
use super::Environment;

#[derive(Debug, PartialEq)]
enum Markup {
    Text(String),
    Output { source: String, line: usize },
    Tag { name: String, header: String, line: usize },
}

/// Splits `source` on `{{ }}` and `{% %}` delimiters, honouring `-` whitespace control.
fn scan(source: &str) -> Result<Vec<Markup>, TemplateError> {
    let mut markup = Vec::new();
    let mut rest = source;
    let mut line = 1;
    let mut trim_next = false;

    while !rest.is_empty() {
        let next_open = [rest.find("{{"), rest.find("{%")]
            .into_iter()
            .flatten()
            .min();
        let Some(open) = next_open else {
            push_text(&mut markup, rest, trim_next, false);
            break;
        };

        let is_output = rest[open..].starts_with("{{");
        let close_delim = if is_output { "}}" } else { "%}" };
        let inner_start = open + 2;
        let trim_before = rest[inner_start..].starts_with('-');

        push_text(&mut markup, &rest[..open], trim_next, trim_before);
        line += rest[..open].matches('\n').count();

        let close = rest[inner_start..].find(close_delim).ok_or_else(|| {
            TemplateError::syntax(format!("unclosed '{}' on line {}", &rest[open..inner_start], line))
        })? + inner_start;

        let mut inner = &rest[inner_start..close];
        if trim_before {
            inner = &inner[1..];
        }
        trim_next = inner.ends_with('-');
        if trim_next {
            inner = &inner[..inner.len() - 1];
        }
        let inner = inner.trim();

        if is_output {
            markup.push(Markup::Output {
                source: inner.to_string(),
                line,
            });
        } else {
            let (name, header) = inner
                .split_once(char::is_whitespace)
                .map(|(name, header)| (name, header.trim()))
                .unwrap_or((inner, ""));
            if name.is_empty() {
                return Err(TemplateError::syntax(format!("empty tag on line {}", line)));
            }
            markup.push(Markup::Tag {
                name: name.to_string(),
                header: header.to_string(),
                line,
            });
        }

        line += rest[open..close].matches('\n').count();
        rest = &rest[close + 2..];
    }
    Ok(markup)
}

fn push_text(markup: &mut Vec<Markup>, text: &str, trim_start: bool, trim_end: bool) {
    let text = if trim_start { text.trim_start() } else { text };
    let text = if trim_end { text.trim_end() } else { text };
    if !text.is_empty() {
        markup.push(Markup::Text(text.to_string()));
    }
}

/// Parses template source into nodes using the tags registered on `env`.
pub(crate) fn parse(env: &Environment, source: &str) -> Result<Vec<Box<dyn Node>>, TemplateError> {
    let mut tokens = scan(source)?.into_iter();
    let (nodes, terminator) = parse_block(env, &mut tokens, None)?;
    if let Some((name, line)) = terminator {
        return Err(TemplateError::syntax(format!("unexpected '{}' on line {}", name, line)));
    }
    Ok(nodes)
}

/// Parses nodes until `end_tag` or `else`, returning the tag that stopped it,
/// or `None` if the input ran out first.
fn parse_block(
    env: &Environment,
    tokens: &mut std::vec::IntoIter<Markup>,
    end_tag: Option<&str>,
) -> Result<(Vec<Box<dyn Node>>, Option<(String, usize)>), TemplateError> {
    let mut nodes: Vec<Box<dyn Node>> = Vec::new();

    while let Some(token) = tokens.next() {
        match token {
            Markup::Text(text) => nodes.push(Box::new(TextNode(text))),
            Markup::Output { source, line } => {
                let expression = FilteredExpression::parse(&source).map_err(|e| e.at_line(line))?;
                nodes.push(Box::new(OutputNode(expression)));
            }
            Markup::Tag { name, line, .. } if name == "else" || Some(name.as_str()) == end_tag => {
                return Ok((nodes, Some((name, line))));
            }
            Markup::Tag { name, header, line } => {
                let Some(tag) = env.tag(&name) else {
                    return Err(TemplateError::syntax(format!("unknown tag '{}' on line {}", name, line)));
                };
                let end = format!("end{}", name);
                let block = parse_tag_block(env, tokens, &name, &end, line)?;
                nodes.push(tag.parse(&header, block).map_err(|e| e.at_line(line))?);
            }
        }
    }

    Ok((nodes, None))
}

fn parse_tag_block(
    env: &Environment,
    tokens: &mut std::vec::IntoIter<Markup>,
    name: &str,
    end: &str,
    line: usize,
) -> Result<TagBlock, TemplateError> {
    let missing_end =
        || TemplateError::syntax(format!("'{}' on line {} is missing '{}'", name, line, end));

    let (body, terminator) = parse_block(env, tokens, Some(end))?;
    let alternative = match terminator {
        None => return Err(missing_end()),
        Some((tag, _)) if tag == "else" => {
            let (alternative, terminator) = parse_block(env, tokens, Some(end))?;
            match terminator {
                None => return Err(missing_end()),
                Some((tag, else_line)) if tag == "else" => {
                    return Err(TemplateError::syntax(format!(
                        "unexpected second 'else' on line {}",
                        else_line
                    )))
                }
                Some(_) => Some(alternative),
            }
        }
        Some(_) => None,
    };
    Ok(TagBlock { body, alternative })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_text_output_and_tags() {
        let markup = scan("a {{ x | upcase }}\n{% for i in xs %}b{% endfor %}").unwrap();
        assert_eq!(
            markup,
            vec![
                Markup::Text("a ".to_string()),
                Markup::Output {
                    source: "x | upcase".to_string(),
                    line: 1
                },
                Markup::Text("\n".to_string()),
                Markup::Tag {
                    name: "for".to_string(),
                    header: "i in xs".to_string(),
                    line: 2
                },
                Markup::Text("b".to_string()),
                Markup::Tag {
                    name: "endfor".to_string(),
                    header: String::new(),
                    line: 2
                },
            ]
        );
    }

    #[test]
    fn test_scan_whitespace_control() {
        let markup = scan("a  {{- x -}}  b").unwrap();
        assert_eq!(
            markup,
            vec![
                Markup::Text("a".to_string()),
                Markup::Output {
                    source: "x".to_string(),
                    line: 1
                },
                Markup::Text("b".to_string()),
            ]
        );
    }

    #[test]
    fn test_scan_unclosed_output_fails() {
        assert!(scan("{{ x ").is_err());
    }

    #[test]
    fn test_parse_missing_end_tag_fails() {
        let env = Environment::new();
        let err = parse(&env, "{% for x in xs %}a").unwrap_err();
        assert!(err.to_string().contains("missing 'endfor'"));
    }

    #[test]
    fn test_parse_unknown_tag_fails() {
        let env = Environment::new();
        assert!(parse(&env, "{% bogus %}").is_err());
    }

    #[test]
    fn test_parse_stray_end_tag_fails() {
        let env = Environment::new();
        assert!(parse(&env, "{% endfor %}").is_err());
        assert!(parse(&env, "{% else %}").is_err());
    }
}
