//! Turns a data-driven template into a standalone starter document for
//! users who have no resume data yet.

use log::debug;
use regex::{Captures, Regex};
use std::borrow::Cow;
use std::sync::LazyLock;

use crate::data::ResumeField;
use crate::helpers;
use crate::syntax::{self, BlockKind, Call, Node};

/// Closing directive every normalized document ends with.
pub const END_DOCUMENT: &str = "\\end{document}";

/// Matches any `{{ ... }}` tag, used when the template does not parse.
static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{\{!--.*?--\}\}|\{\{\{.*?\}\}\}|\{\{.*?\}\}").unwrap());

/// A plain or uppercased root placeholder, double- or triple-stash.
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\{\s*(uppercase\s+)?(\w+)\s*\}\}\}|\{\{\s*(uppercase\s+)?(\w+)\s*\}\}").unwrap()
});

/// Two or more `\\` line breaks in a row.
static DOUBLED_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\\\\(?:\s*\\\\)+").unwrap());

static HEADING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\\(?:sub)*section\*?\{").unwrap());

/// Literal stand-in for a root scalar field, if it has one.
pub fn default_value(field: ResumeField) -> Option<&'static str> {
    match field {
        ResumeField::Name => Some("John Doe"),
        ResumeField::Email => Some("john.doe@email.com"),
        ResumeField::Phone => Some("(123) 456-7890"),
        ResumeField::JobRole => Some("Software Engineer"),
        ResumeField::Linkedin => Some("linkedin.com/in/johndoe"),
        ResumeField::Github => Some("github.com/johndoe"),
        ResumeField::Website => Some("johndoe.dev"),
        _ => None,
    }
}

/// Rewrites `template` into complete LaTeX source without any resume data.
///
/// Known scalar placeholders become literal defaults, blocks collapse to what
/// they would show for a user with no data (their `{{else}}` branch, or
/// nothing), any other directive is dropped, and the layout is repaired so
/// the result compiles on its own. Applying it twice changes nothing.
pub fn normalize_to_default(template: &str) -> String {
    let body = match syntax::parse_lenient(template) {
        Ok(parsed) => {
            let mut out = String::new();
            emit_defaults(&parsed.nodes, &mut out);
            out
        }
        Err(e) => {
            debug!("Template does not parse ({}), stripping tags", e);
            let filled = fill_known_defaults(template);
            TAG.replace_all(&filled, "").replace("{{", "")
        }
    };
    finish_document(&body)
}

/// Substitutes the default of every known root placeholder, leaving all
/// other tags in place.
fn fill_known_defaults(template: &str) -> Cow<'_, str> {
    PLACEHOLDER.replace_all(template, |caps: &Captures| {
        let upper = caps.get(1).or_else(|| caps.get(3)).is_some();
        let name = caps.get(2).or_else(|| caps.get(4)).map_or("", |m| m.as_str());
        match ResumeField::from_name(name).and_then(default_value) {
            Some(value) if upper => helpers::uppercase(value),
            Some(value) => value.to_string(),
            None => caps[0].to_string(),
        }
    })
}

fn emit_defaults(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Expr(expr) => {
                let field = match &expr.call {
                    Call::Lookup(path) | Call::Uppercase(path) => {
                        path.root_name().and_then(ResumeField::from_name)
                    }
                    Call::Join { .. } | Call::FormatDate(_) => None,
                };
                match (field.and_then(default_value), &expr.call) {
                    (Some(value), Call::Uppercase(_)) => out.push_str(&helpers::uppercase(value)),
                    (Some(value), _) => out.push_str(value),
                    (None, call) => debug!("Dropping directive without default: {:?}", call),
                }
            }
            // Without data every condition is unset and every list is empty.
            Node::Block {
                kind: BlockKind::Unless,
                body,
                ..
            } => emit_defaults(body, out),
            Node::Block { alternate, .. } => {
                if let Some(alternate) = alternate {
                    emit_defaults(alternate, out);
                }
            }
            Node::Unknown { tag, alternate, .. } => {
                debug!("Dropping unsupported directive {}", tag);
                if let Some(alternate) = alternate {
                    emit_defaults(alternate, out);
                }
            }
        }
    }
}

/// Repairs the layout and terminates the document with exactly one
/// [`END_DOCUMENT`].
fn finish_document(body: &str) -> String {
    let lines: Vec<&str> = body
        .lines()
        .map(str::trim)
        .filter(|line| *line != END_DOCUMENT)
        .collect();
    let repaired = repair_layout(&lines);
    if repaired.is_empty() {
        END_DOCUMENT.to_string()
    } else {
        format!("{}\n\n{}", repaired, END_DOCUMENT)
    }
}

fn is_heading(line: &str) -> bool {
    HEADING.is_match(line)
}

/// Cleans up what removed directives leave behind: trims lines, collapses
/// doubled `\\` breaks, drops empty lines and bare `\\` lines, removes a
/// `\\` that would end the last line before a heading or an `\end{..}`, and
/// puts exactly one blank line before every heading.
fn repair_layout(lines: &[&str]) -> String {
    let lines: Vec<String> = lines
        .iter()
        .map(|line| DOUBLED_BREAK.replace_all(line.trim(), "\\\\").into_owned())
        .filter(|line| !line.is_empty() && line != "\\\\")
        .collect();

    let mut repaired = String::new();
    for (i, line) in lines.iter().enumerate() {
        let dangling = match lines.get(i + 1) {
            None => true,
            Some(next) => is_heading(next) || next.starts_with("\\end{"),
        };
        let line = match line.strip_suffix("\\\\") {
            Some(stripped) if dangling => stripped.trim_end(),
            _ => line.as_str(),
        };
        if i > 0 {
            repaired.push('\n');
            if is_heading(line) {
                repaired.push('\n');
            }
        }
        repaired.push_str(line);
    }
    repaired
}
