// SPDX-License-Identifier: AGPL-3.0-or-later
//! Template evaluation against a bound-value record

use serde_json::Value;

use super::parser::{Arg, Base, Command, Node, ParseResult, Pipeline};
use super::{add, indent};

struct Scope<'v> {
    root: &'v Value,
    variables: Vec<(String, Value)>,
}

/// Render parsed nodes with `root` as both `$` and the initial `.`
pub(crate) fn render(nodes: &[Node], root: &Value) -> ParseResult<String> {
    let mut scope = Scope {
        root,
        variables: Vec::new(),
    };
    let mut output = String::new();
    render_nodes(nodes, root, &mut scope, &mut output)?;
    Ok(output)
}

fn render_nodes(
    nodes: &[Node],
    dot: &Value,
    scope: &mut Scope<'_>,
    output: &mut String,
) -> ParseResult<()> {
    for node in nodes {
        match node {
            Node::Text(text) => output.push_str(text),
            Node::Output(pipeline) => {
                let value = eval_pipeline(pipeline, dot, scope)?;
                write_value(&value, output)?;
            }
            Node::Range {
                index,
                value,
                pipeline,
                body,
            } => {
                let list = eval_pipeline(pipeline, dot, scope)?;
                let Value::Array(items) = &list else {
                    return Err(format!("cannot range over {}", kind(&list)));
                };

                for (position, item) in items.iter().enumerate() {
                    let depth = scope.variables.len();
                    if let Some(name) = index {
                        scope.variables.push((name.clone(), Value::from(position)));
                    }
                    if let Some(name) = value {
                        scope.variables.push((name.clone(), item.clone()));
                    }
                    let rendered = render_nodes(body, item, scope, output);
                    scope.variables.truncate(depth);
                    rendered?;
                }
            }
        }
    }
    Ok(())
}

fn eval_pipeline(pipeline: &Pipeline, dot: &Value, scope: &Scope<'_>) -> ParseResult<Value> {
    let mut piped = None;
    for command in &pipeline.commands {
        piped = Some(eval_command(command, piped, dot, scope)?);
    }
    piped.ok_or_else(|| "empty pipeline".to_string())
}

fn eval_command(
    command: &Command,
    piped: Option<Value>,
    dot: &Value,
    scope: &Scope<'_>,
) -> ParseResult<Value> {
    match command.args.as_slice() {
        [Arg::Function(name), rest @ ..] => {
            let mut values = rest
                .iter()
                .map(|arg| eval_arg(arg, dot, scope))
                .collect::<ParseResult<Vec<_>>>()?;
            values.extend(piped);
            call(name, values)
        }
        [single] if piped.is_none() => eval_arg(single, dot, scope),
        _ => Err("operands cannot take arguments".to_string()),
    }
}

fn eval_arg(arg: &Arg, dot: &Value, scope: &Scope<'_>) -> ParseResult<Value> {
    match arg {
        Arg::Int(value) => Ok(Value::from(*value)),
        Arg::Str(value) => Ok(Value::String(value.clone())),
        Arg::Nested(pipeline) => eval_pipeline(pipeline, dot, scope),
        Arg::Function(name) => Err(format!("function '{}' used as a value", name)),
        Arg::Field { base, path } => {
            let mut current = match base {
                Base::Dot => dot,
                Base::Root => scope.root,
                Base::Variable(name) => scope
                    .variables
                    .iter()
                    .rev()
                    .find(|(bound, _)| bound == name)
                    .map(|(_, value)| value)
                    .ok_or_else(|| format!("undefined variable '${}'", name))?,
            };
            for key in path {
                current = match current {
                    Value::Object(map) => map
                        .get(key)
                        .ok_or_else(|| format!("no field '{}'", key))?,
                    other => {
                        return Err(format!("cannot read field '{}' of {}", key, kind(other)))
                    }
                };
            }
            Ok(current.clone())
        }
    }
}

fn call(name: &str, values: Vec<Value>) -> ParseResult<Value> {
    match (name, values.as_slice()) {
        ("indent", [width, text]) => {
            let width = usize::try_from(as_int(width)?)
                .map_err(|_| "indent width must not be negative".to_string())?;
            Ok(Value::String(indent(width, as_str(text)?)))
        }
        ("add", [left, right]) => {
            let sum = add(as_int(left)?, as_int(right)?)
                .ok_or_else(|| "integer overflow in add".to_string())?;
            Ok(Value::from(sum))
        }
        ("indent" | "add", _) => Err(format!(
            "wrong number of arguments for '{}': expected 2, got {}",
            name,
            values.len()
        )),
        _ => Err(format!("function '{}' not defined", name)),
    }
}

fn as_int(value: &Value) -> ParseResult<i64> {
    value
        .as_i64()
        .ok_or_else(|| format!("expected integer, found {}", kind(value)))
}

fn as_str(value: &Value) -> ParseResult<&str> {
    value
        .as_str()
        .ok_or_else(|| format!("expected string, found {}", kind(value)))
}

fn write_value(value: &Value, output: &mut String) -> ParseResult<()> {
    match value {
        Value::String(text) => output.push_str(text),
        Value::Number(number) => output.push_str(&number.to_string()),
        Value::Bool(flag) => output.push_str(if *flag { "true" } else { "false" }),
        other => return Err(format!("cannot render {}", kind(other))),
    }
    Ok(())
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "map",
    }
}
