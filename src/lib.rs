//! Resume templates with handlebars-style directives, resolved either against
//! a user's resume data or to standalone default content.

pub mod cache;
pub mod compile;
pub mod config;
pub mod data;
pub mod document;
pub mod engine;
pub mod gallery;
pub mod helpers;
pub mod normalize;
pub mod service;
pub mod source;
pub mod syntax;

pub use cache::{CacheKey, CacheStats, RenderCache};
pub use compile::{CommandCompiler, CompileFailure, DocumentCompiler, FailureCategory};
pub use config::AppConfig;
pub use data::{ResumeData, ResumeField};
pub use document::{DocumentRecord, DocumentStore, TitleFormatter};
pub use engine::{RenderError, RenderOutcome, TemplateEngine, Unchanged};
pub use gallery::BuiltinTemplate;
pub use helpers::EscapeMode;
pub use normalize::normalize_to_default;
pub use service::{spawn_prerender, RenderService};
pub use source::{Credential, FileResumeSource, ResumeSource, TokenDirectorySource};
pub use syntax::TemplateError;

/// Renders `template` with `data`, returning the template unchanged when there
/// is no data or it cannot be rendered.
pub fn render(template: &str, data: Option<&ResumeData>) -> String {
    TemplateEngine::new().render(template, data)
}
