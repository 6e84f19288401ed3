//! Template resolution for step settings.
//!
//! A string value may embed `{{ expr }}` references to the trigger payload,
//! to earlier step outputs or to connection secrets:
//!
//! - `{{trigger.body.id}}`
//! - `{{step_1.items[0]['display name']}}`
//! - `{{loop_1.item}}` / `{{loop_1.index}}` inside a loop body
//! - `{{connections.github}}`
//!
//! A string consisting of a single reference resolves to the referenced JSON
//! value with its type intact. References inside longer strings are
//! interpolated. Nothing here fails: missing values resolve to `null` (or an
//! empty string when interpolated) and malformed expressions stay verbatim.

use enginecore::{Ancestors, ExecutionState};
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};

lazy_static! {
    static ref TEMPLATE_REGEX: Regex = Regex::new(r"\{\{(.*?)\}\}").unwrap();
}

const CONNECTIONS_ROOT: &str = "connections";
const TRIGGER_ROOT: &str = "trigger";

#[derive(Debug, Clone, PartialEq)]
enum PathSegment {
    Key(String),
    Index(usize),
}

impl PathSegment {
    fn as_key(&self) -> String {
        match self {
            PathSegment::Key(k) => k.clone(),
            PathSegment::Index(i) => i.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Expression {
    root: String,
    path: Vec<PathSegment>,
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn read_ident(chars: &[char], pos: &mut usize) -> Option<String> {
    let start = *pos;
    while *pos < chars.len() && is_ident_char(chars[*pos]) {
        *pos += 1;
    }
    if *pos == start {
        return None;
    }
    Some(chars[start..*pos].iter().collect())
}

fn skip_whitespace(chars: &[char], pos: &mut usize) {
    while *pos < chars.len() && chars[*pos].is_whitespace() {
        *pos += 1;
    }
}

/// Parse `root(.key | [index] | ['key'])*`.
fn parse_expression(expr: &str) -> Option<Expression> {
    let chars: Vec<char> = expr.trim().chars().collect();
    let mut pos = 0;
    let root = read_ident(&chars, &mut pos)?;
    let mut path = Vec::new();

    while pos < chars.len() {
        match chars[pos] {
            '.' => {
                pos += 1;
                path.push(PathSegment::Key(read_ident(&chars, &mut pos)?));
            }
            '[' => {
                pos += 1;
                skip_whitespace(&chars, &mut pos);
                let segment = match *chars.get(pos)? {
                    quote @ ('\'' | '"') => {
                        pos += 1;
                        let start = pos;
                        while pos < chars.len() && chars[pos] != quote {
                            pos += 1;
                        }
                        if pos == chars.len() {
                            return None;
                        }
                        let key: String = chars[start..pos].iter().collect();
                        pos += 1;
                        PathSegment::Key(key)
                    }
                    c if c.is_ascii_digit() => {
                        let start = pos;
                        while pos < chars.len() && chars[pos].is_ascii_digit() {
                            pos += 1;
                        }
                        let digits: String = chars[start..pos].iter().collect();
                        PathSegment::Index(digits.parse().ok()?)
                    }
                    _ => return None,
                };
                skip_whitespace(&chars, &mut pos);
                if chars.get(pos) != Some(&']') {
                    return None;
                }
                pos += 1;
                path.push(segment);
            }
            _ => return None,
        }
    }

    Some(Expression { root, path })
}

fn navigate<'v>(mut current: &'v Value, path: &[PathSegment]) -> Option<&'v Value> {
    for segment in path {
        current = match (segment, current) {
            (PathSegment::Key(key), Value::Object(map)) => map.get(key)?,
            (PathSegment::Index(i), Value::Array(items)) => items.get(*i)?,
            (PathSegment::Key(key), Value::Array(items)) => items.get(key.parse::<usize>().ok()?)?,
            (PathSegment::Index(i), Value::Object(map)) => map.get(&i.to_string())?,
            _ => return None,
        };
    }
    Some(current)
}

/// Names of every connection referenced anywhere inside `value`.
pub fn collect_connection_names(value: &Value) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    collect_into(value, &mut names);
    names
}

fn collect_into(value: &Value, names: &mut BTreeSet<String>) {
    match value {
        Value::String(text) => {
            for caps in TEMPLATE_REGEX.captures_iter(text) {
                let Some(expr) = parse_expression(&caps[1]) else {
                    continue;
                };
                if expr.root == CONNECTIONS_ROOT {
                    if let Some(first) = expr.path.first() {
                        names.insert(first.as_key());
                    }
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect_into(item, names)),
        Value::Object(map) => map.values().for_each(|item| collect_into(item, names)),
        _ => {}
    }
}

/// Everything a template may refer to.
pub struct ResolveScope<'a> {
    pub state: &'a ExecutionState,
    pub ancestors: &'a Ancestors,
    /// Connection values by name. Not consulted when censoring.
    pub connections: &'a HashMap<String, Value>,
}

#[derive(Debug, Clone)]
pub struct VariableResolver {
    placeholder: String,
}

impl VariableResolver {
    pub fn new(placeholder: impl Into<String>) -> Self {
        Self {
            placeholder: placeholder.into(),
        }
    }

    /// Resolve every template inside `unresolved`. With `censor_connections`
    /// each connection reference becomes the redaction placeholder.
    pub fn resolve(&self, unresolved: &Value, scope: &ResolveScope<'_>, censor_connections: bool) -> Value {
        match unresolved {
            Value::String(text) => self.resolve_string(text, scope, censor_connections),
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.resolve(item, scope, censor_connections))
                    .collect(),
            ),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(key, item)| (key.clone(), self.resolve(item, scope, censor_connections)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    fn resolve_string(&self, text: &str, scope: &ResolveScope<'_>, censor: bool) -> Value {
        if let Some(caps) = TEMPLATE_REGEX.captures(text) {
            let whole = caps.get(0).map(|m| m.start() == 0 && m.end() == text.len());
            if whole == Some(true) {
                return match parse_expression(&caps[1]) {
                    Some(expr) => self.evaluate(&expr, scope, censor).unwrap_or(Value::Null),
                    None => Value::String(text.to_string()),
                };
            }
        }

        let rendered = TEMPLATE_REGEX.replace_all(text, |caps: &Captures| {
            let Some(expr) = parse_expression(&caps[1]) else {
                return caps[0].to_string();
            };
            match self.evaluate(&expr, scope, censor) {
                None | Some(Value::Null) => String::new(),
                Some(Value::String(s)) => s,
                Some(other) => other.to_string(),
            }
        });
        Value::String(rendered.into_owned())
    }

    fn evaluate(&self, expr: &Expression, scope: &ResolveScope<'_>, censor: bool) -> Option<Value> {
        let (base, path) = if expr.root == CONNECTIONS_ROOT {
            let (name, rest) = expr.path.split_first()?;
            if censor {
                return Some(Value::String(self.placeholder.clone()));
            }
            (scope.connections.get(&name.as_key())?, rest)
        } else {
            let step = scope
                .state
                .lookup_visible(&expr.root, scope.ancestors)
                .or_else(|| {
                    if expr.root == TRIGGER_ROOT {
                        scope.state.trigger_output()
                    } else {
                        None
                    }
                })?;
            (step.output.as_ref()?, expr.path.as_slice())
        };
        navigate(base, path).cloned()
    }
}
