use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Fallback for a missing `name` when rendering with data.
pub const DEFAULT_NAME: &str = "Your Name";

/// Fallback for a missing `email` when rendering with data.
pub const DEFAULT_EMAIL: &str = "your.email@example.com";

/// Fallback for a missing `phone` when rendering with data.
pub const DEFAULT_PHONE: &str = "(555) 123-4567";

/// A user's structured resume data, as stored by the resume-info service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResumeData {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub linkedin: Option<String>,
    pub github: Option<String>,
    pub website: Option<String>,
    pub summary: Option<String>,
    pub job_role: Option<String>,
    pub educations: Option<Vec<Education>>,
    pub experiences: Option<Vec<Experience>>,
    pub skills: Option<Vec<Skill>>,
    pub projects: Option<Vec<Project>>,
    pub languages: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Education {
    pub institution: Option<String>,
    pub degree: Option<String>,
    pub start_date: Option<String>,
    /// `None` means the education is ongoing.
    pub end_date: Option<String>,
    pub grade: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Experience {
    pub company: Option<String>,
    pub role: Option<String>,
    pub start_date: Option<String>,
    /// `None` means the position is current.
    pub end_date: Option<String>,
    pub description: Option<String>,
}

/// A skill is stored either as a bare string or as a `{ "name": ... }` record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Skill {
    Plain(String),
    Named {
        #[serde(default)]
        name: String,
    },
}

impl Skill {
    pub fn name(&self) -> &str {
        match self {
            Skill::Plain(name) | Skill::Named { name } => name,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Project {
    pub title: Option<String>,
    pub description: Option<String>,
    pub technologies: Option<Technologies>,
    pub link: Option<String>,
}

/// Project technologies arrive either as a list or as one pre-joined string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Technologies {
    List(Vec<Skill>),
    Text(String),
}

/// Root fields of [`ResumeData`] that templates may refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResumeField {
    Name,
    Email,
    Phone,
    Linkedin,
    Github,
    Website,
    Summary,
    JobRole,
    Educations,
    Experiences,
    Skills,
    Projects,
    Languages,
}

impl ResumeField {
    pub const ALL: [ResumeField; 13] = [
        ResumeField::Name,
        ResumeField::Email,
        ResumeField::Phone,
        ResumeField::Linkedin,
        ResumeField::Github,
        ResumeField::Website,
        ResumeField::Summary,
        ResumeField::JobRole,
        ResumeField::Educations,
        ResumeField::Experiences,
        ResumeField::Skills,
        ResumeField::Projects,
        ResumeField::Languages,
    ];

    /// Resolves the name used in templates, e.g. `jobRole`.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.as_str() == name)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResumeField::Name => "name",
            ResumeField::Email => "email",
            ResumeField::Phone => "phone",
            ResumeField::Linkedin => "linkedin",
            ResumeField::Github => "github",
            ResumeField::Website => "website",
            ResumeField::Summary => "summary",
            ResumeField::JobRole => "jobRole",
            ResumeField::Educations => "educations",
            ResumeField::Experiences => "experiences",
            ResumeField::Skills => "skills",
            ResumeField::Projects => "projects",
            ResumeField::Languages => "languages",
        }
    }

    pub fn is_list(self) -> bool {
        matches!(
            self,
            ResumeField::Educations
                | ResumeField::Experiences
                | ResumeField::Skills
                | ResumeField::Projects
                | ResumeField::Languages
        )
    }
}

impl fmt::Display for ResumeField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A value seen by the template evaluator.
#[derive(Clone)]
pub enum Value<'a> {
    Missing,
    Text(Cow<'a, str>),
    List(Vec<Value<'a>>),
    Record(&'a dyn Scope),
}

impl<'a> Value<'a> {
    /// Handlebars truthiness: empty strings and empty lists are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Missing => false,
            Value::Text(text) => !text.is_empty(),
            Value::List(items) => !items.is_empty(),
            Value::Record(_) => true,
        }
    }

    pub fn get(&self, key: &str) -> Value<'a> {
        match self {
            Value::Record(scope) => scope.lookup(key),
            _ => Value::Missing,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    /// The text a list item contributes when joined: its `name` for records,
    /// the item itself otherwise.
    pub fn display_name(&self) -> Cow<'a, str> {
        match self {
            Value::Text(text) => text.clone(),
            Value::Record(scope) => match scope.lookup("name") {
                Value::Text(name) => name,
                _ => Cow::Borrowed(""),
            },
            Value::Missing | Value::List(_) => Cow::Borrowed(""),
        }
    }
}

impl fmt::Debug for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Missing => f.write_str("Missing"),
            Value::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Value::List(items) => f.debug_tuple("List").field(items).finish(),
            Value::Record(_) => f.write_str("Record(..)"),
        }
    }
}

/// Field lookup for anything a template block can be evaluated against.
pub trait Scope {
    fn lookup(&self, key: &str) -> Value<'_>;
}

fn text(value: &Option<String>) -> Value<'_> {
    match value.as_deref() {
        Some(s) if !s.is_empty() => Value::Text(Cow::Borrowed(s)),
        _ => Value::Missing,
    }
}

fn text_or<'a>(value: &'a Option<String>, fallback: &'static str) -> Value<'a> {
    match value.as_deref() {
        Some(s) if !s.is_empty() => Value::Text(Cow::Borrowed(s)),
        _ => Value::Text(Cow::Borrowed(fallback)),
    }
}

fn list<'a, T: Scope>(items: &'a Option<Vec<T>>) -> Value<'a> {
    match items {
        Some(items) => Value::List(items.iter().map(|item| Value::Record(item)).collect()),
        None => Value::Missing,
    }
}

fn skills(items: &[Skill]) -> Value<'_> {
    Value::List(items.iter().map(Skill::as_value).collect())
}

impl Skill {
    fn as_value(&self) -> Value<'_> {
        match self {
            Skill::Plain(name) => Value::Text(Cow::Borrowed(name)),
            Skill::Named { .. } => Value::Record(self),
        }
    }
}

impl ResumeData {
    /// Looks up a root field with the render-time defaults applied.
    pub fn field(&self, field: ResumeField) -> Value<'_> {
        match field {
            ResumeField::Name => text_or(&self.name, DEFAULT_NAME),
            ResumeField::Email => text_or(&self.email, DEFAULT_EMAIL),
            ResumeField::Phone => text_or(&self.phone, DEFAULT_PHONE),
            ResumeField::Linkedin => text(&self.linkedin),
            ResumeField::Github => text(&self.github),
            ResumeField::Website => text(&self.website),
            ResumeField::Summary => text(&self.summary),
            ResumeField::JobRole => text(&self.job_role),
            ResumeField::Educations => list(&self.educations),
            ResumeField::Experiences => list(&self.experiences),
            ResumeField::Skills => self.skills.as_deref().map_or(Value::Missing, skills),
            ResumeField::Projects => list(&self.projects),
            ResumeField::Languages => match &self.languages {
                Some(languages) => Value::List(
                    languages
                        .iter()
                        .map(|language| Value::Text(Cow::Borrowed(language.as_str())))
                        .collect(),
                ),
                None => Value::Missing,
            },
        }
    }
}

impl Scope for ResumeData {
    fn lookup(&self, key: &str) -> Value<'_> {
        match ResumeField::from_name(key) {
            Some(field) => self.field(field),
            None => Value::Missing,
        }
    }
}

impl Scope for Education {
    fn lookup(&self, key: &str) -> Value<'_> {
        match key {
            "institution" => text(&self.institution),
            "degree" => text(&self.degree),
            "startDate" => text(&self.start_date),
            "endDate" => text(&self.end_date),
            "grade" => text(&self.grade),
            "description" => text(&self.description),
            _ => Value::Missing,
        }
    }
}

impl Scope for Experience {
    fn lookup(&self, key: &str) -> Value<'_> {
        match key {
            "company" => text(&self.company),
            "role" => text(&self.role),
            "startDate" => text(&self.start_date),
            "endDate" => text(&self.end_date),
            "description" => text(&self.description),
            _ => Value::Missing,
        }
    }
}

impl Scope for Project {
    fn lookup(&self, key: &str) -> Value<'_> {
        match key {
            "title" => text(&self.title),
            "description" => text(&self.description),
            "link" => text(&self.link),
            "technologies" => match &self.technologies {
                Some(Technologies::List(items)) => skills(items),
                Some(Technologies::Text(joined)) if !joined.is_empty() => {
                    Value::Text(Cow::Borrowed(joined))
                }
                _ => Value::Missing,
            },
            _ => Value::Missing,
        }
    }
}

impl Scope for Skill {
    fn lookup(&self, key: &str) -> Value<'_> {
        match key {
            "name" if !self.name().is_empty() => Value::Text(Cow::Borrowed(self.name())),
            _ => Value::Missing,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_camel_case() {
        let data: ResumeData = serde_json::from_str(
            r#"{
                "name": "Jane Doe",
                "jobRole": "Engineer",
                "experiences": [{"company": "ABC", "startDate": "2022-06-01", "endDate": null}],
                "skills": ["Rust", {"name": "Go"}]
            }"#,
        )
        .unwrap();
        assert_eq!(data.job_role.as_deref(), Some("Engineer"));
        let experiences = data.experiences.as_ref().unwrap();
        assert_eq!(experiences[0].start_date.as_deref(), Some("2022-06-01"));
        assert!(experiences[0].end_date.is_none());
        assert_eq!(
            data.skills.unwrap(),
            vec![
                Skill::Plain("Rust".to_string()),
                Skill::Named {
                    name: "Go".to_string()
                }
            ]
        );
    }

    #[test]
    fn test_scalar_defaults() {
        let data = ResumeData::default();
        assert_eq!(data.field(ResumeField::Name).as_str(), Some(DEFAULT_NAME));
        assert_eq!(data.field(ResumeField::Email).as_str(), Some(DEFAULT_EMAIL));
        assert_eq!(data.field(ResumeField::Phone).as_str(), Some(DEFAULT_PHONE));
        assert!(!data.field(ResumeField::Linkedin).is_truthy());
    }

    #[test]
    fn test_empty_string_is_missing() {
        let data = ResumeData {
            summary: Some(String::new()),
            name: Some(String::new()),
            ..Default::default()
        };
        assert!(matches!(data.field(ResumeField::Summary), Value::Missing));
        assert_eq!(data.field(ResumeField::Name).as_str(), Some(DEFAULT_NAME));
    }

    #[test]
    fn test_empty_list_is_falsy_but_present() {
        let data = ResumeData {
            skills: Some(Vec::new()),
            ..Default::default()
        };
        let skills = data.field(ResumeField::Skills);
        assert!(matches!(skills, Value::List(ref items) if items.is_empty()));
        assert!(!skills.is_truthy());
        assert!(matches!(data.field(ResumeField::Projects), Value::Missing));
    }

    #[test]
    fn test_field_names_round_trip() {
        for field in ResumeField::ALL {
            assert_eq!(ResumeField::from_name(field.as_str()), Some(field));
        }
        assert_eq!(ResumeField::from_name("jobrole"), None);
        assert!(ResumeField::Languages.is_list());
        assert!(!ResumeField::Summary.is_list());
    }

    #[test]
    fn test_display_name() {
        let named = Skill::Named {
            name: "Docker".to_string(),
        };
        assert_eq!(named.as_value().display_name(), "Docker");
        let plain = Skill::Plain("Git".to_string());
        assert_eq!(plain.as_value().display_name(), "Git");
    }

    #[test]
    fn test_project_technologies_as_text() {
        let project = Project {
            technologies: Some(Technologies::Text("Rust, Tokio".to_string())),
            ..Default::default()
        };
        assert_eq!(project.lookup("technologies").as_str(), Some("Rust, Tokio"));
        assert!(matches!(project.lookup("unknown"), Value::Missing));
    }
}
