use chrono::{DateTime, Utc};
use heck::ToKebabCase;
use log::{error, info};
use minijinja::{context, Environment, UndefinedBehavior};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use thiserror::Error;
use uuid::Uuid;

use crate::data::ResumeData;
use crate::gallery::BuiltinTemplate;

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Failed to write document: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to serialize document record: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to render document title: {0}")]
    Title(#[from] minijinja::Error),
}

/// Renders document titles from a minijinja template.
///
/// The template sees `template` (id, name, description of the built-in
/// design) and `resume` (the user's data, or none).
pub struct TitleFormatter {
    env: Environment<'static>,
    source: String,
}

impl TitleFormatter {
    pub fn new(source: impl Into<String>) -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        Self {
            env,
            source: source.into(),
        }
    }

    pub fn format(&self, template: &BuiltinTemplate, data: Option<&ResumeData>) -> Result<String, DocumentError> {
        let title = self
            .env
            .render_str(&self.source, context! { template => template, resume => data })
            .map_err(|e| {
                error!("Failed to render title template '{}': {}", self.source, e);
                e
            })?;
        Ok(title.trim().to_string())
    }
}

/// A saved resume document created from a built-in template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub id: Uuid,
    pub title: String,
    pub template_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl DocumentRecord {
    pub fn new(title: impl Into<String>, template_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            template_id: template_id.into(),
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    pub fn from_template(
        template: &BuiltinTemplate,
        content: impl Into<String>,
        titles: &TitleFormatter,
        data: Option<&ResumeData>,
    ) -> Result<Self, DocumentError> {
        let title = titles.format(template, data)?;
        Ok(Self::new(title, template.id, content))
    }

    /// File stem for this record: the kebab-case title followed by the first
    /// eight hex digits of the id, or the full id when the title has no
    /// usable characters.
    pub fn slug(&self) -> String {
        let title = self.title.to_kebab_case();
        if title.is_empty() {
            return self.id.to_string();
        }
        let id = self.id.simple().to_string();
        format!("{}-{}", title, &id[..8])
    }
}

/// Writes document records as `<slug>.tex` plus a `<slug>.json` sidecar.
///
/// Existing files are never overwritten.
pub struct DocumentStore {
    output_dir: PathBuf,
    dry_run: bool,
}

impl DocumentStore {
    pub fn new(output_dir: impl Into<PathBuf>, dry_run: bool) -> Self {
        Self {
            output_dir: output_dir.into(),
            dry_run,
        }
    }

    fn ensure_dir_exists(path: &Path) -> Result<(), DocumentError> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }
        Ok(())
    }

    /// Saves `record` and returns the path of the markup file.
    pub fn save(&self, record: &DocumentRecord) -> Result<PathBuf, DocumentError> {
        let slug = record.slug();
        let tex_path = self.output_dir.join(format!("{}.tex", slug));
        let json_path = self.output_dir.join(format!("{}.json", slug));
        let metadata = serde_json::to_string_pretty(record)?;

        if self.dry_run {
            info!("[DRY RUN] Would write: {:?}", tex_path);
            info!("[DRY RUN] Would write: {:?}", json_path);
            return Ok(tex_path);
        }

        Self::ensure_dir_exists(&self.output_dir)?;
        Self::write_new(&tex_path, record.content.as_bytes()).map_err(|e| {
            error!("Failed to write document markup: {:?}", tex_path);
            e
        })?;
        Self::write_new(&json_path, metadata.as_bytes()).map_err(|e| {
            error!("Failed to write document record: {:?}", json_path);
            e
        })?;
        info!("{:?}", tex_path);
        Ok(tex_path)
    }

    fn write_new(path: &Path, contents: &[u8]) -> Result<(), DocumentError> {
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        file.write_all(contents)?;
        Ok(())
    }

    pub fn load(&self, slug: &str) -> Result<DocumentRecord, DocumentError> {
        let content = fs::read_to_string(self.output_dir.join(format!("{}.json", slug)))?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gallery;
    use tempfile::tempdir;

    #[test]
    fn test_title_from_template_name() {
        let titles = TitleFormatter::new("My {{ template.name }} Resume");
        let modern = gallery::find("modern").unwrap();
        assert_eq!(titles.format(modern, None).unwrap(), "My Modern Resume");
    }

    #[test]
    fn test_title_uses_resume_data() {
        let titles = TitleFormatter::new("{{ resume.name }} - {{ template.id }}");
        let data = ResumeData {
            name: Some("Jane Doe".to_string()),
            ..Default::default()
        };
        let minimal = gallery::find("minimal").unwrap();
        assert_eq!(titles.format(minimal, Some(&data)).unwrap(), "Jane Doe - minimal");
    }

    #[test]
    fn test_title_strict_undefined() {
        let titles = TitleFormatter::new("{{ template.missing }}");
        let minimal = gallery::find("minimal").unwrap();
        assert!(matches!(titles.format(minimal, None), Err(DocumentError::Title(_))));
    }

    #[test]
    fn test_record_from_template() {
        let titles = TitleFormatter::new("My {{ template.name }} Resume");
        let professional = gallery::find("professional").unwrap();
        let record = DocumentRecord::from_template(professional, "body", &titles, None).unwrap();
        assert_eq!(record.title, "My Professional Resume");
        assert_eq!(record.template_id, "professional");
        assert_eq!(record.id.get_version_num(), 4);
        let slug = record.slug();
        assert!(slug.starts_with("my-professional-resume-"), "{}", slug);
        assert_eq!(slug.len(), "my-professional-resume-".len() + 8);
        assert!(record.id.simple().to_string().starts_with(&slug[slug.len() - 8..]));
    }

    #[test]
    fn test_slug_falls_back_to_id() {
        let record = DocumentRecord::new("!!!", "minimal", "");
        assert_eq!(record.slug(), record.id.to_string());
    }

    #[test]
    fn test_save_writes_markup_and_record() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::new(dir.path().join("documents"), false);
        let record = DocumentRecord::new("My Modern Resume", "modern", "\\end{document}");
        let path = store.save(&record).unwrap();
        let slug = record.slug();

        assert_eq!(path, dir.path().join("documents").join(format!("{}.tex", slug)));
        assert_eq!(fs::read_to_string(&path).unwrap(), "\\end{document}");
        let json = fs::read_to_string(dir.path().join("documents").join(format!("{}.json", slug))).unwrap();
        assert!(json.contains("\"templateId\": \"modern\""));
        assert_eq!(store.load(&slug).unwrap(), record);
    }

    #[test]
    fn test_same_title_keeps_both_documents() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::new(dir.path(), false);
        let first = DocumentRecord::new("My Modern Resume", "modern", "first");
        let second = DocumentRecord::new("My Modern Resume", "modern", "second");

        let first_path = store.save(&first).unwrap();
        let second_path = store.save(&second).unwrap();
        assert_ne!(first_path, second_path);
        assert_eq!(fs::read_to_string(&first_path).unwrap(), "first");
        assert_eq!(fs::read_to_string(&second_path).unwrap(), "second");
        assert_eq!(store.load(&first.slug()).unwrap(), first);
        assert_eq!(store.load(&second.slug()).unwrap(), second);
    }

    #[test]
    fn test_save_refuses_to_overwrite() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::new(dir.path(), false);
        let record = DocumentRecord::new("Draft", "minimal", "original");
        let path = store.save(&record).unwrap();

        let mut clash = record.clone();
        clash.content = "replacement".to_string();
        assert!(matches!(store.save(&clash), Err(DocumentError::Io(_))));
        assert_eq!(fs::read_to_string(&path).unwrap(), "original");
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::new(dir.path().join("documents"), true);
        let record = DocumentRecord::new("Draft", "minimal", "x");
        let path = store.save(&record).unwrap();
        assert_eq!(path, dir.path().join("documents").join(format!("{}.tex", record.slug())));
        assert!(!dir.path().join("documents").exists());
    }
}
