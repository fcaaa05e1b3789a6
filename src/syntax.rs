//! Parses resume templates into a small syntax tree.
//!
//! The accepted syntax is the handlebars subset the resume templates use:
//!
//! ```text
//! {{name}}                      escaped placeholder
//! {{{summary}}}                 raw placeholder
//! {{uppercase name}}            helper call
//! {{join skills ", "}}
//! {{formatDate endDate}}
//! {{#if linkedin}}..{{else}}..{{/if}}
//! {{#unless github}}..{{/unless}}
//! {{#each experiences}}{{company}} {{../name}} {{@index}}{{else}}..{{/each}}
//! {{! comment }}  {{!-- comment --}}
//! ```
//!
//! A block tag (`#if`, `else`, `/if`, comments, ...) that sits alone on its
//! line consumes the whole line, including the line break.

use log::debug;
use std::fmt;
use thiserror::Error;

/// A line/column pair, both 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    fn at(source: &str, offset: usize) -> Self {
        let before = &source[..offset];
        let line = before.matches('\n').count() + 1;
        let column = before
            .rfind('\n')
            .map_or(before.chars().count(), |nl| before[nl + 1..].chars().count())
            + 1;
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TemplateError {
    #[error("unterminated tag at {0}")]
    UnterminatedTag(Position),
    #[error("empty tag at {0}")]
    EmptyTag(Position),
    #[error("invalid path '{path}' at {position}")]
    InvalidPath { path: String, position: Position },
    #[error("unknown block helper '{name}' at {position}")]
    UnknownBlock { name: String, position: Position },
    #[error("unknown helper '{name}' at {position}")]
    UnknownHelper { name: String, position: Position },
    #[error("helper '{name}' at {position} expects {expected}")]
    BadArguments {
        name: String,
        expected: &'static str,
        position: Position,
    },
    #[error("'{{{{else}}}}' outside of a block at {0}")]
    StrayElse(Position),
    #[error("closing '{name}' at {position} has no open block")]
    StrayClose { name: String, position: Position },
    #[error("'{found}' at {position} closes '{expected}'")]
    MismatchedClose {
        expected: String,
        found: String,
        position: Position,
    },
    #[error("block '{name}' opened at {position} is never closed")]
    UnclosedBlock { name: String, position: Position },
}

impl TemplateError {
    pub fn position(&self) -> Position {
        match self {
            TemplateError::UnterminatedTag(position)
            | TemplateError::EmptyTag(position)
            | TemplateError::StrayElse(position) => *position,
            TemplateError::InvalidPath { position, .. }
            | TemplateError::UnknownBlock { position, .. }
            | TemplateError::UnknownHelper { position, .. }
            | TemplateError::BadArguments { position, .. }
            | TemplateError::StrayClose { position, .. }
            | TemplateError::MismatchedClose { position, .. }
            | TemplateError::UnclosedBlock { position, .. } => *position,
        }
    }
}

/// A reference to a value: `../` hops, then a dotted field path.
///
/// An empty `segments` list is `this`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Path {
    pub parents: usize,
    pub segments: Vec<String>,
}

impl Path {
    fn parse(raw: &str, position: Position) -> Result<Self, TemplateError> {
        let invalid = || TemplateError::InvalidPath {
            path: raw.to_string(),
            position,
        };
        let mut rest = raw;
        let mut parents = 0;
        while let Some(stripped) = rest.strip_prefix("../") {
            parents += 1;
            rest = stripped;
        }
        let rest = rest
            .strip_prefix("this.")
            .or_else(|| rest.strip_prefix("./"))
            .unwrap_or(rest);
        if rest == "this" || rest == "." {
            return Ok(Self {
                parents,
                segments: Vec::new(),
            });
        }
        let mut segments = Vec::new();
        for segment in rest.split('.') {
            let valid = !segment.is_empty()
                && segment
                    .chars()
                    .enumerate()
                    .all(|(i, c)| c.is_alphanumeric() || c == '_' || c == '-' || (i == 0 && c == '@'));
            if !valid {
                return Err(invalid());
            }
            segments.push(segment.to_string());
        }
        Ok(Self { parents, segments })
    }

    /// The root field name, when the path is a single name in the outermost scope.
    pub fn root_name(&self) -> Option<&str> {
        match self.segments.as_slice() {
            [name] if self.parents == 0 => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for _ in 0..self.parents {
            f.write_str("../")?;
        }
        if self.segments.is_empty() {
            f.write_str("this")
        } else {
            f.write_str(&self.segments.join("."))
        }
    }
}

/// What a `{{ ... }}` tag computes.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Lookup(Path),
    Uppercase(Path),
    Join { list: Path, separator: String },
    FormatDate(Path),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub call: Call,
    /// Triple-stash output is never escaped.
    pub raw: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    If,
    Unless,
    Each,
}

impl BlockKind {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "if" => Some(BlockKind::If),
            "unless" => Some(BlockKind::Unless),
            "each" => Some(BlockKind::Each),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            BlockKind::If => "if",
            BlockKind::Unless => "unless",
            BlockKind::Each => "each",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    Expr(Expr),
    Block {
        kind: BlockKind,
        target: Path,
        body: Vec<Node>,
        alternate: Option<Vec<Node>>,
    },
    /// A directive outside the supported subset, kept by [`parse_lenient`].
    /// Unknown blocks keep their branches; unknown tags have an empty body.
    Unknown {
        tag: String,
        body: Vec<Node>,
        alternate: Option<Vec<Node>>,
    },
}

/// A parsed template.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub nodes: Vec<Node>,
}

impl Template {
    /// True when the template holds nothing but literal text.
    pub fn is_literal(&self) -> bool {
        self.nodes.iter().all(|node| matches!(node, Node::Text(_)))
    }
}

pub fn parse(source: &str) -> Result<Template, TemplateError> {
    let tokens = tokenize(source)?;
    Parser::default().run(source, tokens)
}

/// Like [`parse`], but unknown helpers and blocks, bad arguments, stray
/// `else` and stray or mismatched closing tags become [`Node::Unknown`].
///
/// Unterminated tags and blocks that are never closed are still errors.
pub fn parse_lenient(source: &str) -> Result<Template, TemplateError> {
    let tokens = tokenize(source)?;
    Parser {
        lenient: true,
        ..Parser::default()
    }
    .run(source, tokens)
}

#[derive(Debug, Clone)]
enum TagKind {
    Expr { body: String, raw: bool },
    Open { body: String },
    Else,
    Close { name: String },
    Comment,
}

impl TagKind {
    fn is_block_level(&self) -> bool {
        !matches!(self, TagKind::Expr { .. })
    }

    fn source_text(&self) -> String {
        match self {
            TagKind::Expr { body, raw: true } => format!("{{{{{{{}}}}}}}", body),
            TagKind::Expr { body, raw: false } => format!("{{{{{}}}}}", body),
            TagKind::Open { body } => format!("{{{{#{}}}}}", body),
            TagKind::Else => "{{else}}".to_string(),
            TagKind::Close { name } => format!("{{{{/{}}}}}", name),
            TagKind::Comment => String::new(),
        }
    }
}

#[derive(Debug, Clone)]
enum Token {
    Text(String),
    Tag { kind: TagKind, offset: usize },
}

fn tokenize(source: &str) -> Result<Vec<Token>, TemplateError> {
    let mut tokens = Vec::new();
    let mut cursor = 0;
    while let Some(found) = source[cursor..].find("{{") {
        let start = cursor + found;
        if start > cursor {
            tokens.push(Token::Text(source[cursor..start].to_string()));
        }
        let rest = &source[start..];
        let (open, close) = if rest.starts_with("{{!--") {
            ("{{!--", "--}}")
        } else if rest.starts_with("{{{") {
            ("{{{", "}}}")
        } else {
            ("{{", "}}")
        };
        let body_start = start + open.len();
        let body_len = source[body_start..]
            .find(close)
            .ok_or_else(|| TemplateError::UnterminatedTag(Position::at(source, start)))?;
        let body = &source[body_start..body_start + body_len];
        let kind = classify(open, body).ok_or_else(|| TemplateError::EmptyTag(Position::at(source, start)))?;
        tokens.push(Token::Tag {
            kind,
            offset: start,
        });
        cursor = body_start + body_len + close.len();
    }
    if cursor < source.len() {
        tokens.push(Token::Text(source[cursor..].to_string()));
    }
    strip_standalone(&mut tokens);
    Ok(tokens)
}

fn classify(open: &str, body: &str) -> Option<TagKind> {
    if open == "{{!--" || body.starts_with('!') {
        return Some(TagKind::Comment);
    }
    let body = body.trim();
    if body.is_empty() {
        return None;
    }
    if open == "{{{" {
        return Some(TagKind::Expr {
            body: body.to_string(),
            raw: true,
        });
    }
    if let Some(open_body) = body.strip_prefix('#') {
        let open_body = open_body.trim();
        return (!open_body.is_empty()).then(|| TagKind::Open {
            body: open_body.to_string(),
        });
    }
    if let Some(name) = body.strip_prefix('/') {
        let name = name.trim();
        return (!name.is_empty()).then(|| TagKind::Close {
            name: name.to_string(),
        });
    }
    if body == "else" {
        return Some(TagKind::Else);
    }
    Some(TagKind::Expr {
        body: body.to_string(),
        raw: false,
    })
}

/// Drops the surrounding whitespace and line break of block-level tags that
/// are alone on their line.
fn strip_standalone(tokens: &mut [Token]) {
    // Decide on the untouched text first; neighbouring tags share text tokens.
    let mut cuts: Vec<(usize, usize, usize)> = Vec::new();
    for (i, token) in tokens.iter().enumerate() {
        let Token::Tag { kind, .. } = token else {
            continue;
        };
        if !kind.is_block_level() {
            continue;
        }
        let before = match i.checked_sub(1).map(|p| &tokens[p]) {
            None => Some(None),
            Some(Token::Text(text)) => {
                let tail_start = text.rfind('\n').map_or(0, |nl| nl + 1);
                let at_line_start = tail_start > 0 || i == 1;
                (at_line_start && text[tail_start..].trim().is_empty()).then_some(Some((i - 1, tail_start)))
            }
            Some(Token::Tag { .. }) => None,
        };
        let after = match tokens.get(i + 1) {
            None => Some(None),
            Some(Token::Text(text)) => {
                let head_end = text.find('\n').map(|nl| nl + 1);
                let at_line_end = head_end.is_some() || i + 2 == tokens.len();
                let head = &text[..head_end.unwrap_or(text.len())];
                (at_line_end && head.trim().is_empty())
                    .then_some(Some((i + 1, head_end.unwrap_or(text.len()))))
            }
            Some(Token::Tag { .. }) => None,
        };
        if let (Some(before), Some(after)) = (before, after) {
            if let Some((index, keep)) = before {
                cuts.push((index, 0, keep));
            }
            if let Some((index, drop)) = after {
                cuts.push((index, drop, usize::MAX));
            }
        }
    }
    let mut bounds: Vec<Option<(usize, usize)>> = vec![None; tokens.len()];
    for (index, from, to) in cuts {
        let (start, end) = bounds[index].unwrap_or((0, usize::MAX));
        bounds[index] = Some((start.max(from), end.min(to)));
    }
    for (token, bound) in tokens.iter_mut().zip(bounds) {
        if let (Token::Text(text), Some((start, end))) = (token, bound) {
            let end = end.min(text.len());
            *text = text.get(start..end.max(start)).unwrap_or_default().to_string();
        }
    }
}

/// Splits helper arguments on whitespace, keeping quoted strings whole.
fn split_args(body: &str) -> Vec<Arg> {
    let mut args = Vec::new();
    let mut chars = body.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
        } else if c == '"' || c == '\'' {
            chars.next();
            let literal: String = chars.by_ref().take_while(|&ch| ch != c).collect();
            args.push(Arg::Literal(literal));
        } else {
            let mut word = String::new();
            while let Some(&ch) = chars.peek() {
                if ch.is_whitespace() {
                    break;
                }
                word.push(ch);
                chars.next();
            }
            args.push(Arg::Word(word));
        }
    }
    args
}

#[derive(Debug, Clone, PartialEq)]
enum Arg {
    Word(String),
    Literal(String),
}

fn parse_expr(body: &str, raw: bool, position: Position) -> Result<Expr, TemplateError> {
    let args = split_args(body);
    let path_arg = |arg: Option<&Arg>, name: &str, expected: &'static str| match arg {
        Some(Arg::Word(word)) => Path::parse(word, position),
        _ => Err(TemplateError::BadArguments {
            name: name.to_string(),
            expected,
            position,
        }),
    };
    let call = match args.as_slice() {
        [Arg::Word(word)] => Call::Lookup(Path::parse(word, position)?),
        [Arg::Word(helper), rest @ ..] => match (helper.as_str(), rest) {
            ("uppercase", [arg]) => Call::Uppercase(path_arg(Some(arg), helper, "one field")?),
            ("formatDate", [arg]) => Call::FormatDate(path_arg(Some(arg), helper, "one field")?),
            ("join", [list, Arg::Literal(separator)]) => Call::Join {
                list: path_arg(Some(list), helper, "a list and a quoted separator")?,
                separator: separator.clone(),
            },
            ("uppercase" | "formatDate", _) => {
                return Err(TemplateError::BadArguments {
                    name: helper.clone(),
                    expected: "one field",
                    position,
                })
            }
            ("join", _) => {
                return Err(TemplateError::BadArguments {
                    name: helper.clone(),
                    expected: "a list and a quoted separator",
                    position,
                })
            }
            _ => {
                return Err(TemplateError::UnknownHelper {
                    name: helper.clone(),
                    position,
                })
            }
        },
        _ => {
            return Err(TemplateError::InvalidPath {
                path: body.to_string(),
                position,
            })
        }
    };
    Ok(Expr { call, raw })
}

struct OpenBlock {
    /// `None` for a block the lenient parser does not understand.
    kind: Option<BlockKind>,
    name: String,
    tag: String,
    target: Path,
    position: Position,
    body: Vec<Node>,
    alternate: Option<Vec<Node>>,
}

#[derive(Default)]
struct Parser {
    root: Vec<Node>,
    stack: Vec<OpenBlock>,
    lenient: bool,
}

impl Parser {
    fn push(&mut self, node: Node) {
        let target = match self.stack.last_mut() {
            Some(block) => block.alternate.as_mut().unwrap_or(&mut block.body),
            None => &mut self.root,
        };
        if let (Node::Text(text), Some(Node::Text(prev))) = (&node, target.last_mut()) {
            prev.push_str(text);
            return;
        }
        target.push(node);
    }

    /// Keeps an unsupported tag as [`Node::Unknown`] when lenient, fails otherwise.
    fn reject(&mut self, tag: String, error: TemplateError) -> Result<(), TemplateError> {
        if !self.lenient {
            return Err(error);
        }
        debug!("Keeping unsupported directive {}: {}", tag, error);
        self.push(Node::Unknown {
            tag,
            body: Vec::new(),
            alternate: None,
        });
        Ok(())
    }

    fn open_block(&mut self, body: &str, tag: String, position: Position) -> Result<(), TemplateError> {
        let args = split_args(body);
        let opened = match args.as_slice() {
            [Arg::Word(name), Arg::Word(target)] => match BlockKind::from_name(name) {
                Some(kind) => Path::parse(target, position).map(|target| (Some(kind), name.clone(), target)),
                None => Err(TemplateError::UnknownBlock {
                    name: name.clone(),
                    position,
                }),
            },
            [Arg::Word(name), ..] | [Arg::Literal(name), ..] => Err(match BlockKind::from_name(name) {
                Some(_) => TemplateError::BadArguments {
                    name: name.clone(),
                    expected: "exactly one field",
                    position,
                },
                None => TemplateError::UnknownBlock {
                    name: name.clone(),
                    position,
                },
            }),
            [] => return Err(TemplateError::EmptyTag(position)),
        };
        let (kind, name, target) = match opened {
            Ok(opened) => opened,
            Err(e) if self.lenient => {
                debug!("Keeping unsupported block {}: {}", tag, e);
                let name = match args.first() {
                    Some(Arg::Word(name)) | Some(Arg::Literal(name)) => name.clone(),
                    None => String::new(),
                };
                (None, name, Path::default())
            }
            Err(e) => return Err(e),
        };
        self.stack.push(OpenBlock {
            kind,
            name,
            tag,
            target,
            position,
            body: Vec::new(),
            alternate: None,
        });
        Ok(())
    }

    fn close_block(&mut self, name: String, tag: String, position: Position) -> Result<(), TemplateError> {
        let expected = match self.stack.last() {
            None => return self.reject(tag, TemplateError::StrayClose { name, position }),
            Some(block) => block.name.clone(),
        };
        if expected != name {
            return self.reject(
                tag,
                TemplateError::MismatchedClose {
                    expected,
                    found: name,
                    position,
                },
            );
        }
        let Some(block) = self.stack.pop() else {
            return Ok(());
        };
        let node = match block.kind {
            Some(kind) => Node::Block {
                kind,
                target: block.target,
                body: block.body,
                alternate: block.alternate,
            },
            None => Node::Unknown {
                tag: block.tag,
                body: block.body,
                alternate: block.alternate,
            },
        };
        self.push(node);
        Ok(())
    }

    fn run(mut self, source: &str, tokens: Vec<Token>) -> Result<Template, TemplateError> {
        for token in tokens {
            let (kind, offset) = match token {
                Token::Text(text) => {
                    if !text.is_empty() {
                        self.push(Node::Text(text));
                    }
                    continue;
                }
                Token::Tag { kind, offset } => (kind, offset),
            };
            let position = Position::at(source, offset);
            let tag = kind.source_text();
            match kind {
                TagKind::Comment => {}
                TagKind::Expr { body, raw } => match parse_expr(&body, raw, position) {
                    Ok(expr) => self.push(Node::Expr(expr)),
                    Err(e) => self.reject(tag, e)?,
                },
                TagKind::Open { body } => self.open_block(&body, tag, position)?,
                TagKind::Else => match self.stack.last_mut() {
                    Some(block) if block.alternate.is_none() => block.alternate = Some(Vec::new()),
                    _ => self.reject(tag, TemplateError::StrayElse(position))?,
                },
                TagKind::Close { name } => self.close_block(name, tag, position)?,
            }
        }
        if let Some(block) = self.stack.pop() {
            return Err(TemplateError::UnclosedBlock {
                name: block.name,
                position: block.position,
            });
        }
        Ok(Template { nodes: self.root })
    }
}
