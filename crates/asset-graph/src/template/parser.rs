// SPDX-License-Identifier: AGPL-3.0-or-later
//! Template parser
//!
//! Splits a body into literal text and `{{ ... }}` actions, honours the
//! `{{-` / `-}}` trim markers, and builds a tree of output actions and
//! `range` blocks.

use std::iter::Peekable;
use std::vec::IntoIter;

pub(crate) type ParseResult<T> = std::result::Result<T, String>;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    /// Literal text copied to the output
    Text(String),

    /// `{{ pipeline }}`
    Output(Pipeline),

    /// `{{ range [$index,] [$value :=] pipeline }} body {{ end }}`
    Range {
        index: Option<String>,
        value: Option<String>,
        pipeline: Pipeline,
        body: Vec<Node>,
    },
}

/// Commands separated by `|`; each result is passed as the last argument
/// of the next command
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Pipeline {
    pub(crate) commands: Vec<Command>,
}

/// A function call or a single operand
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Command {
    pub(crate) args: Vec<Arg>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Arg {
    Function(String),
    Field { base: Base, path: Vec<String> },
    Int(i64),
    Str(String),
    Nested(Pipeline),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Base {
    /// `.`
    Dot,
    /// `$`
    Root,
    /// `$name`
    Variable(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Text(String),
    Action(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Field(String),
    Variable(String),
    Int(i64),
    Str(String),
    LeftParen,
    RightParen,
    Pipe,
    Comma,
    Declare,
}

/// Parse a template body into nodes
pub(crate) fn parse(source: &str) -> ParseResult<Vec<Node>> {
    let mut segments = split(source)?.into_iter().peekable();
    let (nodes, closed) = parse_nodes(&mut segments)?;
    if closed {
        return Err("unexpected {{end}}".to_string());
    }
    Ok(nodes)
}

fn split(source: &str) -> ParseResult<Vec<Segment>> {
    let mut segments = Vec::new();
    let mut rest = source;
    let mut trim_next = false;

    loop {
        let Some(open) = rest.find("{{") else {
            let text = if trim_next { rest.trim_start() } else { rest };
            if !text.is_empty() {
                segments.push(Segment::Text(text.to_string()));
            }
            return Ok(segments);
        };

        let mut text = &rest[..open];
        if trim_next {
            text = text.trim_start();
        }

        let mut after = &rest[open + 2..];
        if let Some(stripped) = after.strip_prefix('-') {
            if stripped.starts_with(char::is_whitespace) {
                text = text.trim_end();
                after = stripped;
            }
        }
        if !text.is_empty() {
            segments.push(Segment::Text(text.to_string()));
        }

        let close = after
            .find("}}")
            .ok_or_else(|| "unclosed action".to_string())?;
        let mut body = &after[..close];
        trim_next = false;
        if let Some(stripped) = body.strip_suffix('-') {
            if stripped.ends_with(char::is_whitespace) {
                body = stripped;
                trim_next = true;
            }
        }

        segments.push(Segment::Action(body.trim().to_string()));
        rest = &after[close + 2..];
    }
}

/// Returns the nodes read and whether an `{{end}}` stopped the read
fn parse_nodes(segments: &mut Peekable<IntoIter<Segment>>) -> ParseResult<(Vec<Node>, bool)> {
    let mut nodes = Vec::new();

    while let Some(segment) = segments.next() {
        let body = match segment {
            Segment::Text(text) => {
                nodes.push(Node::Text(text));
                continue;
            }
            Segment::Action(body) => body,
        };

        if body.starts_with("/*") && body.ends_with("*/") {
            continue;
        }
        if body.is_empty() {
            return Err("empty action".to_string());
        }

        let tokens = lex(&body)?;
        match tokens.first() {
            Some(Token::Ident(word)) if word == "end" => {
                if tokens.len() != 1 {
                    return Err("unexpected arguments to {{end}}".to_string());
                }
                return Ok((nodes, true));
            }
            Some(Token::Ident(word)) if word == "range" => {
                let (index, value, pipeline) = parse_range_header(&tokens[1..])?;
                let (body, closed) = parse_nodes(segments)?;
                if !closed {
                    return Err("unterminated {{range}}".to_string());
                }
                nodes.push(Node::Range {
                    index,
                    value,
                    pipeline,
                    body,
                });
            }
            Some(Token::Ident(word))
                if matches!(
                    word.as_str(),
                    "if" | "else" | "with" | "define" | "template" | "block"
                ) =>
            {
                return Err(format!("unsupported action '{}'", word));
            }
            _ => nodes.push(Node::Output(parse_pipeline(&tokens)?)),
        }
    }

    Ok((nodes, false))
}

type RangeHeader = (Option<String>, Option<String>, Pipeline);

fn parse_range_header(tokens: &[Token]) -> ParseResult<RangeHeader> {
    let Some(declare) = tokens.iter().position(|t| *t == Token::Declare) else {
        return Ok((None, None, parse_pipeline(tokens)?));
    };

    let variable = |token: &Token| match token {
        Token::Variable(name) if name.len() > 1 && !name.contains('.') => {
            Ok(name[1..].to_string())
        }
        other => Err(format!("expected range variable, found {:?}", other)),
    };

    let (index, value) = match &tokens[..declare] {
        [value] => (None, variable(value)?),
        [index, Token::Comma, value] => (Some(variable(index)?), variable(value)?),
        _ => return Err("malformed range declaration".to_string()),
    };

    Ok((index, Some(value), parse_pipeline(&tokens[declare + 1..])?))
}

fn parse_pipeline(tokens: &[Token]) -> ParseResult<Pipeline> {
    let mut commands = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (position, token) in tokens.iter().enumerate() {
        match token {
            Token::LeftParen => depth += 1,
            Token::RightParen => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| "unbalanced ')'".to_string())?;
            }
            Token::Pipe if depth == 0 => {
                commands.push(parse_command(&tokens[start..position])?);
                start = position + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err("unbalanced '('".to_string());
    }
    commands.push(parse_command(&tokens[start..])?);

    Ok(Pipeline { commands })
}

fn parse_command(tokens: &[Token]) -> ParseResult<Command> {
    if tokens.is_empty() {
        return Err("missing command".to_string());
    }

    let mut args = Vec::new();
    let mut position = 0;
    while position < tokens.len() {
        let arg = match &tokens[position] {
            Token::LeftParen => {
                let close = matching_paren(tokens, position)?;
                let nested = parse_pipeline(&tokens[position + 1..close])?;
                position = close;
                Arg::Nested(nested)
            }
            Token::Ident(name) if position == 0 => Arg::Function(name.clone()),
            Token::Ident(name) => {
                return Err(format!("function '{}' must start a command", name));
            }
            Token::Field(text) => parse_field(text, Base::Dot, &text[1..])?,
            Token::Variable(text) => parse_variable(text)?,
            Token::Int(value) => Arg::Int(*value),
            Token::Str(value) => Arg::Str(value.clone()),
            other => return Err(format!("unexpected {:?}", other)),
        };
        args.push(arg);
        position += 1;
    }

    Ok(Command { args })
}

fn matching_paren(tokens: &[Token], open: usize) -> ParseResult<usize> {
    let mut depth = 0usize;
    for (position, token) in tokens.iter().enumerate().skip(open) {
        match token {
            Token::LeftParen => depth += 1,
            Token::RightParen => {
                depth -= 1;
                if depth == 0 {
                    return Ok(position);
                }
            }
            _ => {}
        }
    }
    Err("unbalanced '('".to_string())
}

fn parse_variable(text: &str) -> ParseResult<Arg> {
    let body = &text[1..];
    match body.find('.') {
        None if body.is_empty() => Ok(Arg::Field {
            base: Base::Root,
            path: Vec::new(),
        }),
        None => Ok(Arg::Field {
            base: Base::Variable(body.to_string()),
            path: Vec::new(),
        }),
        Some(0) => parse_field(text, Base::Root, &body[1..]),
        Some(dot) => parse_field(
            text,
            Base::Variable(body[..dot].to_string()),
            &body[dot + 1..],
        ),
    }
}

fn parse_field(text: &str, base: Base, path: &str) -> ParseResult<Arg> {
    if path.is_empty() {
        return Ok(Arg::Field {
            base,
            path: Vec::new(),
        });
    }

    let path: Vec<String> = path.split('.').map(str::to_string).collect();
    if path.iter().any(String::is_empty) {
        return Err(format!("malformed field '{}'", text));
    }
    Ok(Arg::Field { base, path })
}

fn lex(body: &str) -> ParseResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = body.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                tokens.push(Token::LeftParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RightParen);
            }
            '|' => {
                chars.next();
                tokens.push(Token::Pipe);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            ':' => {
                chars.next();
                if chars.next() != Some('=') {
                    return Err("expected ':='".to_string());
                }
                tokens.push(Token::Declare);
            }
            '"' => {
                chars.next();
                tokens.push(Token::Str(lex_string(&mut chars)?));
            }
            '-' | '0'..='9' => {
                let mut literal = String::new();
                literal.push(c);
                chars.next();
                while let Some(&d) = chars.peek() {
                    if !d.is_ascii_digit() {
                        break;
                    }
                    literal.push(d);
                    chars.next();
                }
                let value = literal
                    .parse::<i64>()
                    .map_err(|_| format!("invalid number '{}'", literal))?;
                tokens.push(Token::Int(value));
            }
            '.' | '$' | '_' | 'a'..='z' | 'A'..='Z' => {
                let mut word = String::new();
                while let Some(&d) = chars.peek() {
                    if !(d.is_alphanumeric() || matches!(d, '_' | '.' | '$')) {
                        break;
                    }
                    word.push(d);
                    chars.next();
                }
                tokens.push(match c {
                    '.' => Token::Field(word),
                    '$' => Token::Variable(word),
                    _ => Token::Ident(word),
                });
            }
            other => return Err(format!("unexpected character '{}'", other)),
        }
    }

    Ok(tokens)
}

fn lex_string(chars: &mut Peekable<std::str::Chars<'_>>) -> ParseResult<String> {
    let mut value = String::new();
    loop {
        match chars.next() {
            None => return Err("unterminated string".to_string()),
            Some('"') => return Ok(value),
            Some('\\') => match chars.next() {
                Some('n') => value.push('\n'),
                Some('t') => value.push('\t'),
                Some(escaped @ ('"' | '\\')) => value.push(escaped),
                other => return Err(format!("invalid escape {:?}", other)),
            },
            Some(c) => value.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(path: &[&str]) -> Arg {
        Arg::Field {
            base: Base::Dot,
            path: path.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_parse_text_and_field() {
        let nodes = parse("id: {{ .ClusterId }}\n").unwrap();
        assert_eq!(
            nodes,
            vec![
                Node::Text("id: ".to_string()),
                Node::Output(Pipeline {
                    commands: vec![Command {
                        args: vec![field(&["ClusterId"])]
                    }]
                }),
                Node::Text("\n".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_function_call() {
        let nodes = parse("{{ indent 4 .RootCaCert }}").unwrap();
        let Node::Output(pipeline) = &nodes[0] else {
            panic!("Expected output node");
        };
        assert_eq!(
            pipeline.commands[0].args,
            vec![
                Arg::Function("indent".to_string()),
                Arg::Int(4),
                field(&["RootCaCert"]),
            ]
        );
    }

    #[test]
    fn test_parse_pipe_and_nested() {
        let nodes = parse("{{ .Cert | indent (add 2 2) }}").unwrap();
        let Node::Output(pipeline) = &nodes[0] else {
            panic!("Expected output node");
        };
        assert_eq!(pipeline.commands.len(), 2);
        assert!(matches!(pipeline.commands[1].args[1], Arg::Nested(_)));
    }

    #[test]
    fn test_parse_range_with_index() {
        let nodes = parse("{{ range $i, $h := .Hosts }}{{ $h }}{{ end }}").unwrap();
        match &nodes[0] {
            Node::Range {
                index, value, body, ..
            } => {
                assert_eq!(index.as_deref(), Some("i"));
                assert_eq!(value.as_deref(), Some("h"));
                assert_eq!(body.len(), 1);
            }
            other => panic!("Expected range node, got {:?}", other),
        }
    }

    #[test]
    fn test_trim_markers() {
        let nodes = parse("a  \n{{- .X -}}\n  b").unwrap();
        assert_eq!(nodes[0], Node::Text("a".to_string()));
        assert_eq!(nodes[2], Node::Text("b".to_string()));
    }

    #[test]
    fn test_root_and_variable_fields() {
        assert_eq!(
            parse_variable("$.Domain").unwrap(),
            Arg::Field {
                base: Base::Root,
                path: vec!["Domain".to_string()]
            }
        );
        assert_eq!(
            parse_variable("$item.Name").unwrap(),
            Arg::Field {
                base: Base::Variable("item".to_string()),
                path: vec!["Name".to_string()]
            }
        );
    }

    #[test]
    fn test_malformed_templates() {
        assert!(parse("{{ .X ").is_err());
        assert!(parse("{{ range .Hosts }}x").is_err());
        assert!(parse("x{{ end }}").is_err());
        assert!(parse("{{ if .X }}y{{ end }}").is_err());
        assert!(parse("{{ add (1 2 }}").is_err());
        assert!(parse("{{ .A..B }}").is_err());
        assert!(parse("{{ }}").is_err());
    }

    #[test]
    fn test_comment_skipped() {
        let nodes = parse("{{/* note */}}x").unwrap();
        assert_eq!(nodes, vec![Node::Text("x".to_string())]);
    }
}
