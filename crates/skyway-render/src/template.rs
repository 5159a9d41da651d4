//! the configuration template language.
//!
//! templates interpolate two scopes: `{{ .name }}` looks up `name` in the
//! local scope, `{{ $a.b.c }}` walks the remote scope. `{{ if cond }}`,
//! `{{ else }}`, and `{{ end }}` select between clauses, and `{{-` / `-}}`
//! trim adjacent whitespace. unresolved references never fail expansion;
//! they are collected into the caller's `unresolvable` set.

use std::collections::BTreeSet;

use serde_json::{Map, Value};
use thiserror::Error;

/// hard template errors. unresolved variables are not errors; unbalanced
/// control structure is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    /// an `{{ end }}` with no matching `{{ if }}`.
    #[error("'end' without matching 'if'")]
    UnmatchedEnd,

    /// an `{{ else }}` outside any `{{ if }}`.
    #[error("'else' without matching 'if'")]
    UnmatchedElse,

    /// an `{{ if }}` that was never closed.
    #[error("'if' without matching 'end'")]
    UnterminatedIf,

    /// a directive that is none of `if`/`else`/`end`/`.local`/`$remote`.
    #[error("unrecognized directive: {0:?}")]
    BadDirective(String),
}

/// a parsed reference into one of the two scopes.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Reference {
    /// `.name` in the local scope.
    Local(String),
    /// `$a.b.c` walked through the remote scope.
    Remote(Vec<String>),
}

impl Reference {
    fn parse(text: &str) -> Option<Self> {
        if let Some(name) = text.strip_prefix('.') {
            if name.is_empty() || name.contains(char::is_whitespace) {
                return None;
            }
            return Some(Reference::Local(name.to_string()));
        }
        if let Some(path) = text.strip_prefix('$') {
            if path.is_empty() || path.contains(char::is_whitespace) {
                return None;
            }
            return Some(Reference::Remote(
                path.split('.').map(str::to_string).collect(),
            ));
        }
        None
    }

    /// the form recorded in the unresolvable set.
    fn display(&self) -> String {
        match self {
            Reference::Local(name) => format!(".{name}"),
            Reference::Remote(path) => format!("${}", path.join(".")),
        }
    }
}

/// one node of the parsed template.
#[derive(Debug, Clone)]
enum Node {
    Text(String),
    Variable(Reference),
    If {
        cond: Reference,
        then_clause: Vec<Node>,
        else_clause: Option<Vec<Node>>,
    },
}

/// a raw token: literal text or the inside of a `{{ }}` directive.
#[derive(Debug)]
enum Token {
    Text(String),
    Directive(String),
}

/// split the template on `{{` / `}}`, applying whitespace trimming for
/// `{{-` and `-}}` markers.
fn tokenize(template: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        let mut text = &rest[..open];
        let mut directive_start = &rest[open + 2..];

        // "{{-" trims trailing whitespace from the preceding text
        if let Some(stripped) = directive_start.strip_prefix('-') {
            directive_start = stripped;
            text = text.trim_end();
        }
        if !text.is_empty() {
            tokens.push(Token::Text(text.to_string()));
        }

        let Some(close) = directive_start.find("}}") else {
            // unterminated directive: treat the remainder as text
            tokens.push(Token::Text(format!("{{{{{directive_start}")));
            return tokens;
        };

        let mut inner = &directive_start[..close];
        rest = &directive_start[close + 2..];

        // "-}}" trims leading whitespace from the following text
        if let Some(stripped) = inner.strip_suffix('-') {
            inner = stripped;
            rest = rest.trim_start();
        }
        tokens.push(Token::Directive(inner.trim().to_string()));
    }

    if !rest.is_empty() {
        tokens.push(Token::Text(rest.to_string()));
    }
    tokens
}

/// parse the token stream into a node list.
fn parse(tokens: &mut std::vec::IntoIter<Token>) -> Result<Vec<Node>, TemplateError> {
    let (nodes, terminator) = parse_clause(tokens)?;
    match terminator {
        Terminator::Eof => Ok(nodes),
        Terminator::End => Err(TemplateError::UnmatchedEnd),
        Terminator::Else => Err(TemplateError::UnmatchedElse),
    }
}

enum Terminator {
    Eof,
    End,
    Else,
}

fn parse_clause(
    tokens: &mut std::vec::IntoIter<Token>,
) -> Result<(Vec<Node>, Terminator), TemplateError> {
    let mut nodes = Vec::new();

    while let Some(token) = tokens.next() {
        match token {
            Token::Text(text) => nodes.push(Node::Text(text)),
            Token::Directive(text) => {
                if text == "end" {
                    return Ok((nodes, Terminator::End));
                }
                if text == "else" {
                    return Ok((nodes, Terminator::Else));
                }
                if let Some(cond_text) = text.strip_prefix("if ") {
                    let cond = Reference::parse(cond_text.trim())
                        .ok_or_else(|| TemplateError::BadDirective(text.clone()))?;
                    let (then_clause, term) = parse_clause(tokens)?;
                    let (then_clause, else_clause) = match term {
                        Terminator::End => (then_clause, None),
                        Terminator::Else => {
                            let (else_nodes, term) = parse_clause(tokens)?;
                            match term {
                                Terminator::End => (then_clause, Some(else_nodes)),
                                Terminator::Else => {
                                    return Err(TemplateError::UnmatchedElse);
                                }
                                Terminator::Eof => return Err(TemplateError::UnterminatedIf),
                            }
                        }
                        Terminator::Eof => return Err(TemplateError::UnterminatedIf),
                    };
                    nodes.push(Node::If {
                        cond,
                        then_clause,
                        else_clause,
                    });
                    continue;
                }
                let reference =
                    Reference::parse(&text).ok_or(TemplateError::BadDirective(text))?;
                nodes.push(Node::Variable(reference));
            }
        }
    }

    Ok((nodes, Terminator::Eof))
}

/// resolve a reference against the two scopes.
fn resolve<'a>(
    reference: &Reference,
    local: &'a Map<String, Value>,
    remote: &'a Value,
) -> Option<&'a Value> {
    match reference {
        Reference::Local(name) => local.get(name),
        Reference::Remote(path) => {
            let mut current = remote;
            for segment in path {
                current = current.get(segment)?;
            }
            Some(current)
        }
    }
}

/// textual form of a resolved value.
fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// truthiness for `{{ if }}` conditions.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn expand_nodes(
    nodes: &[Node],
    local: &Map<String, Value>,
    remote: &Value,
    unresolvable: &mut BTreeSet<String>,
    out: &mut String,
) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Variable(reference) => match resolve(reference, local, remote) {
                Some(value) => out.push_str(&render_value(value)),
                None => {
                    unresolvable.insert(reference.display());
                    match reference {
                        // local misses render like an absent property
                        Reference::Local(_) => out.push_str("undefined"),
                        // remote misses are made loudly visible
                        Reference::Remote(_) => {
                            out.push_str(&format!("UNDEFINED[{}]", reference.display()));
                        }
                    }
                }
            },
            Node::If {
                cond,
                then_clause,
                else_clause,
            } => {
                let condition = match resolve(cond, local, remote) {
                    Some(value) => truthy(value),
                    None => {
                        unresolvable.insert(cond.display());
                        false
                    }
                };
                if condition {
                    expand_nodes(then_clause, local, remote, unresolvable, out);
                } else if let Some(else_clause) = else_clause {
                    expand_nodes(else_clause, local, remote, unresolvable, out);
                }
            }
        }
    }
}

/// expand a template against a local and a remote scope.
///
/// unresolved references are recorded in `unresolvable` and rendered as
/// `undefined` (local) or `UNDEFINED[$path]` (remote); structural errors in
/// the template itself are returned as [`TemplateError`].
pub fn expand(
    template: &str,
    local: &Map<String, Value>,
    remote: &Value,
    unresolvable: &mut BTreeSet<String>,
) -> Result<String, TemplateError> {
    let tokens = tokenize(template);
    let nodes = parse(&mut tokens.into_iter())?;
    let mut out = String::new();
    expand_nodes(&nodes, local, remote, unresolvable, &mut out);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn local(value: Value) -> Map<String, Value> {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn plain_text_passes_through() {
        let mut unresolvable = BTreeSet::new();
        let out = expand("hello world", &Map::new(), &Value::Null, &mut unresolvable).unwrap();
        assert_eq!(out, "hello world");
        assert!(unresolvable.is_empty());
    }

    #[test]
    fn local_variable_substitutes() {
        let mut unresolvable = BTreeSet::new();
        let out = expand(
            "name: {{ .name }}",
            &local(json!({"name": "svc"})),
            &Value::Null,
            &mut unresolvable,
        )
        .unwrap();
        assert_eq!(out, "name: svc");
        assert!(unresolvable.is_empty());
    }

    #[test]
    fn remote_path_walks_the_tree() {
        let mut unresolvable = BTreeSet::new();
        let out = expand(
            "host: {{ $site.ingress.host }}",
            &Map::new(),
            &json!({"site": {"ingress": {"host": "ap.example.com"}}}),
            &mut unresolvable,
        )
        .unwrap();
        assert_eq!(out, "host: ap.example.com");
        assert!(unresolvable.is_empty());
    }

    #[test]
    fn if_else_selects_by_remote_condition() {
        let mut unresolvable = BTreeSet::new();
        let out = expand(
            "{{ if $site.prod }}P{{ else }}D{{ end }}-{{ .name }}",
            &local(json!({"name": "svc"})),
            &json!({"site": {"prod": true}}),
            &mut unresolvable,
        )
        .unwrap();
        assert_eq!(out, "P-svc");
        assert!(unresolvable.is_empty());
    }

    #[test]
    fn if_without_else_renders_nothing_when_false() {
        let mut unresolvable = BTreeSet::new();
        let out = expand(
            "a{{ if .flag }}X{{ end }}b",
            &local(json!({"flag": false})),
            &Value::Null,
            &mut unresolvable,
        )
        .unwrap();
        assert_eq!(out, "ab");
    }

    #[test]
    fn missing_local_renders_undefined_and_is_recorded() {
        let mut unresolvable = BTreeSet::new();
        let out = expand("{{ .missing }}", &Map::new(), &Value::Null, &mut unresolvable).unwrap();
        assert_eq!(out, "undefined");
        assert!(unresolvable.contains(".missing"));
    }

    #[test]
    fn missing_remote_renders_loud_marker() {
        let mut unresolvable = BTreeSet::new();
        let out = expand(
            "{{ $a.b.c }}",
            &Map::new(),
            &json!({"a": {}}),
            &mut unresolvable,
        )
        .unwrap();
        assert_eq!(out, "UNDEFINED[$a.b.c]");
        assert!(unresolvable.contains("$a.b.c"));
    }

    #[test]
    fn whitespace_trimming_markers() {
        let mut unresolvable = BTreeSet::new();
        let out = expand(
            "a  {{- .x -}}  b",
            &local(json!({"x": "-"})),
            &Value::Null,
            &mut unresolvable,
        )
        .unwrap();
        assert_eq!(out, "a-b");
    }

    #[test]
    fn unmatched_end_is_an_error() {
        let mut unresolvable = BTreeSet::new();
        let result = expand("{{ end }}", &Map::new(), &Value::Null, &mut unresolvable);
        assert_eq!(result, Err(TemplateError::UnmatchedEnd));
    }

    #[test]
    fn unterminated_if_is_an_error() {
        let mut unresolvable = BTreeSet::new();
        let result = expand(
            "{{ if .x }}body",
            &local(json!({"x": true})),
            &Value::Null,
            &mut unresolvable,
        );
        assert_eq!(result, Err(TemplateError::UnterminatedIf));
    }

    #[test]
    fn nested_if_clauses() {
        let mut unresolvable = BTreeSet::new();
        let out = expand(
            "{{ if .a }}{{ if .b }}AB{{ else }}A{{ end }}{{ end }}",
            &local(json!({"a": true, "b": false})),
            &Value::Null,
            &mut unresolvable,
        )
        .unwrap();
        assert_eq!(out, "A");
    }

    #[test]
    fn unresolved_condition_is_false_and_recorded() {
        let mut unresolvable = BTreeSet::new();
        let out = expand(
            "{{ if $site.prod }}P{{ else }}D{{ end }}",
            &Map::new(),
            &json!({}),
            &mut unresolvable,
        )
        .unwrap();
        assert_eq!(out, "D");
        assert!(unresolvable.contains("$site.prod"));
    }

    #[test]
    fn fully_resolved_expansion_matches_manual_substitution() {
        let mut unresolvable = BTreeSet::new();
        let out = expand(
            "{{ .a }}/{{ .b }}:{{ $cfg.port }}",
            &local(json!({"a": "x", "b": "y"})),
            &json!({"cfg": {"port": 8080}}),
            &mut unresolvable,
        )
        .unwrap();
        assert_eq!(out, "x/y:8080");
        assert!(unresolvable.is_empty());
    }
}
