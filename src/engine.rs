use log::{debug, error};
use std::borrow::Cow;
use thiserror::Error;

use crate::data::{ResumeData, Value};
use crate::helpers::{self, EscapeMode};
use crate::syntax::{self, BlockKind, Call, Node, Path, Template, TemplateError};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    #[error(transparent)]
    Syntax(#[from] TemplateError),
    #[error("'{path}' is not a list and cannot be iterated")]
    NotIterable { path: String },
    #[error("unsupported directive {tag}")]
    Unsupported { tag: String },
}

/// Result of a render that distinguishes real output from the fallbacks.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderOutcome {
    Rendered(String),
    Unchanged { text: String, reason: Unchanged },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Unchanged {
    /// No resume data was supplied.
    NoData,
    /// The template failed to parse or evaluate.
    Failed(RenderError),
}

impl RenderOutcome {
    pub fn text(&self) -> &str {
        match self {
            RenderOutcome::Rendered(text) | RenderOutcome::Unchanged { text, .. } => text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            RenderOutcome::Rendered(text) | RenderOutcome::Unchanged { text, .. } => text,
        }
    }

    pub fn is_rendered(&self) -> bool {
        matches!(self, RenderOutcome::Rendered(_))
    }
}

/// Renders resume templates against [`ResumeData`].
#[derive(Debug, Clone, Default)]
pub struct TemplateEngine {
    escape: EscapeMode,
}

impl TemplateEngine {
    /// Creates an engine with handlebars-compatible HTML escaping.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_escape(escape: EscapeMode) -> Self {
        Self { escape }
    }

    /// Renders `template` with `data`.
    ///
    /// Never fails: without data, or when the template cannot be rendered,
    /// the template text comes back unchanged.
    pub fn render(&self, template: &str, data: Option<&ResumeData>) -> String {
        self.render_outcome(template, data).into_text()
    }

    pub fn render_outcome(&self, template: &str, data: Option<&ResumeData>) -> RenderOutcome {
        let Some(data) = data else {
            return RenderOutcome::Unchanged {
                text: template.to_string(),
                reason: Unchanged::NoData,
            };
        };
        match self.render_string(template, data) {
            Ok(rendered) => RenderOutcome::Rendered(rendered),
            Err(e) => {
                match &e {
                    RenderError::Syntax(syntax_error) => {
                        let line = syntax_error.position().line;
                        let error_line = template.lines().nth(line - 1).unwrap_or("");
                        error!("Failed to render template: {}\n{}", e, error_line);
                    }
                    RenderError::NotIterable { .. } | RenderError::Unsupported { .. } => {
                        error!("Failed to render template: {}", e)
                    }
                }
                RenderOutcome::Unchanged {
                    text: template.to_string(),
                    reason: Unchanged::Failed(e),
                }
            }
        }
    }

    /// Parses and renders a template string, reporting failures.
    pub fn render_string(&self, template: &str, data: &ResumeData) -> Result<String, RenderError> {
        let parsed = syntax::parse(template)?;
        self.render_template(&parsed, data)
    }

    /// Renders an already parsed template.
    pub fn render_template(&self, template: &Template, data: &ResumeData) -> Result<String, RenderError> {
        let mut evaluator = Evaluator {
            escape: self.escape,
            out: String::new(),
        };
        let mut stack = vec![Frame {
            value: Value::Record(data),
            index: None,
        }];
        evaluator.walk(&template.nodes, &mut stack)?;
        Ok(evaluator.out)
    }
}

struct Frame<'a> {
    value: Value<'a>,
    index: Option<usize>,
}

struct Evaluator {
    escape: EscapeMode,
    out: String,
}

impl Evaluator {
    fn walk<'a>(&mut self, nodes: &[Node], stack: &mut Vec<Frame<'a>>) -> Result<(), RenderError> {
        for node in nodes {
            match node {
                Node::Text(text) => self.out.push_str(text),
                Node::Expr(expr) => {
                    let text = evaluate(&expr.call, stack);
                    if expr.raw {
                        self.out.push_str(&text);
                    } else {
                        self.out.push_str(&self.escape.apply(&text));
                    }
                }
                Node::Block {
                    kind,
                    target,
                    body,
                    alternate,
                } => {
                    let value = resolve(stack, target);
                    match kind {
                        BlockKind::If | BlockKind::Unless => {
                            if value.is_truthy() == (*kind == BlockKind::If) {
                                self.walk(body, stack)?;
                            } else if let Some(alternate) = alternate {
                                self.walk(alternate, stack)?;
                            }
                        }
                        BlockKind::Each => match value {
                            Value::List(items) if !items.is_empty() => {
                                for (index, item) in items.into_iter().enumerate() {
                                    stack.push(Frame {
                                        value: item,
                                        index: Some(index),
                                    });
                                    let result = self.walk(body, stack);
                                    stack.pop();
                                    result?;
                                }
                            }
                            Value::List(_) | Value::Missing => {
                                if let Some(alternate) = alternate {
                                    self.walk(alternate, stack)?;
                                }
                            }
                            Value::Text(_) | Value::Record(_) => {
                                return Err(RenderError::NotIterable {
                                    path: target.to_string(),
                                })
                            }
                        },
                    }
                }
                Node::Unknown { tag, .. } => {
                    return Err(RenderError::Unsupported { tag: tag.clone() });
                }
            }
        }
        Ok(())
    }
}

fn resolve<'a>(stack: &[Frame<'a>], path: &Path) -> Value<'a> {
    let Some(frame) = stack
        .len()
        .checked_sub(path.parents + 1)
        .and_then(|depth| stack.get(depth))
    else {
        debug!("'{}' reaches above the outermost scope", path);
        return Value::Missing;
    };
    match path.segments.first() {
        None => frame.value.clone(),
        Some(head) if head == "@index" => frame
            .index
            .map_or(Value::Missing, |index| Value::Text(Cow::Owned(index.to_string()))),
        Some(_) => path
            .segments
            .iter()
            .fold(frame.value.clone(), |value, segment| value.get(segment)),
    }
}

fn evaluate<'a>(call: &Call, stack: &[Frame<'a>]) -> Cow<'a, str> {
    match call {
        Call::Lookup(path) => match resolve(stack, path) {
            Value::Text(text) => text,
            // Lists print the way a JavaScript array stringifies.
            Value::List(items) => Cow::Owned(
                items
                    .iter()
                    .map(Value::display_name)
                    .collect::<Vec<_>>()
                    .join(","),
            ),
            Value::Missing | Value::Record(_) => Cow::Borrowed(""),
        },
        Call::Uppercase(path) => {
            Cow::Owned(helpers::uppercase(resolve(stack, path).as_str().unwrap_or("")))
        }
        Call::Join { list, separator } => Cow::Owned(helpers::join(&resolve(stack, list), separator)),
        Call::FormatDate(path) => Cow::Owned(helpers::format_date(resolve(stack, path).as_str())),
    }
}
