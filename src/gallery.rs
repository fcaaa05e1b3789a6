use serde::Serialize;

/// A built-in resume design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BuiltinTemplate {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    #[serde(skip)]
    pub content: &'static str,
}

pub const TEMPLATES: &[BuiltinTemplate] = &[
    BuiltinTemplate {
        id: "professional",
        name: "Professional",
        description: "Clean and professional template suitable for most industries",
        content: include_str!("../templates/professional.tex"),
    },
    BuiltinTemplate {
        id: "modern",
        name: "Modern",
        description: "Contemporary design with a clean layout and modern typography",
        content: include_str!("../templates/modern.tex"),
    },
    BuiltinTemplate {
        id: "creative",
        name: "Creative",
        description: "Distinctive design for creative professionals and designers",
        content: include_str!("../templates/creative.tex"),
    },
    BuiltinTemplate {
        id: "technical",
        name: "Technical",
        description: "Optimized for technical roles with focus on skills and projects",
        content: include_str!("../templates/technical.tex"),
    },
    BuiltinTemplate {
        id: "minimal",
        name: "Minimal",
        description: "Clean, minimalist design with focus on content and readability",
        content: include_str!("../templates/minimal.tex"),
    },
];

pub fn all() -> &'static [BuiltinTemplate] {
    TEMPLATES
}

pub fn find(id: &str) -> Option<&'static BuiltinTemplate> {
    TEMPLATES.iter().find(|template| template.id == id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Education, Experience, Project, ResumeData, Skill, Technologies};
    use crate::engine::TemplateEngine;
    use crate::normalize::{normalize_to_default, END_DOCUMENT};
    use crate::syntax;

    fn complete_resume() -> ResumeData {
        ResumeData {
            name: Some("Jane Doe".to_string()),
            email: Some("jane@example.com".to_string()),
            phone: Some("555-0100".to_string()),
            linkedin: Some("linkedin.com/in/janedoe".to_string()),
            github: Some("github.com/janedoe".to_string()),
            website: Some("janedoe.dev".to_string()),
            summary: Some("Systems engineer.".to_string()),
            job_role: Some("Backend Engineer".to_string()),
            educations: Some(vec![Education {
                institution: Some("State University".to_string()),
                degree: Some("B.Sc. Computer Science".to_string()),
                start_date: Some("2014-09-01".to_string()),
                end_date: Some("2018-06-01".to_string()),
                grade: Some("3.9".to_string()),
                description: Some("Thesis on compilers.".to_string()),
            }]),
            experiences: Some(vec![Experience {
                company: Some("ABC Corp".to_string()),
                role: Some("Engineer".to_string()),
                start_date: Some("2022-06".to_string()),
                end_date: None,
                description: Some("Built services.".to_string()),
            }]),
            skills: Some(vec![Skill::Plain("Rust".to_string())]),
            projects: Some(vec![Project {
                title: Some("Scheduler".to_string()),
                description: Some("Distributed task scheduler.".to_string()),
                technologies: Some(Technologies::List(vec![Skill::Plain("Go".to_string())])),
                link: Some("github.com/janedoe/scheduler".to_string()),
            }]),
            languages: Some(vec!["English".to_string()]),
        }
    }

    #[test]
    fn test_find() {
        assert_eq!(find("modern").map(|t| t.name), Some("Modern"));
        assert!(find("unknown").is_none());
        assert_eq!(find("technical").map(|t| t.name), Some("Technical"));
        let ids: Vec<_> = all().iter().map(|t| t.id).collect();
        assert_eq!(ids, ["professional", "modern", "creative", "technical", "minimal"]);
    }

    #[test]
    fn test_templates_parse() {
        for template in all() {
            assert!(syntax::parse(template.content).is_ok(), "{}", template.id);
        }
    }

    #[test]
    fn test_complete_data_leaves_no_directives() {
        let engine = TemplateEngine::new();
        let data = complete_resume();
        for template in all() {
            let outcome = engine.render_outcome(template.content, Some(&data));
            assert!(outcome.is_rendered(), "{}", template.id);
            let rendered = outcome.text();
            assert!(!rendered.contains("{{"), "{}", template.id);
            assert!(rendered.contains("Jun 2022"), "{}", template.id);
            assert!(rendered.contains("Present"), "{}", template.id);
            assert!(rendered.contains("Engineer"), "{}", template.id);
        }
    }

    #[test]
    fn test_professional_renders_sections() {
        let rendered = TemplateEngine::new().render(find("professional").unwrap().content, Some(&complete_resume()));
        assert!(rendered.contains("\\section*{ Jane Doe }"));
        assert!(rendered.contains("\\textbf{LinkedIn:} linkedin.com/in/janedoe \\\\"));
        assert!(rendered.contains("\\subsection*{ Engineer | ABC Corp | Jun 2022 -- Present }"));
        assert!(rendered.contains("\\textbf{ Scheduler } \\hfill github.com/janedoe/scheduler \\\\"));
        assert!(!rendered.contains("Webpack"));
    }

    #[test]
    fn test_creative_renders_sections() {
        let rendered = TemplateEngine::new().render(find("creative").unwrap().content, Some(&complete_resume()));
        assert!(rendered.contains("\\textcolor{accent}{\\Huge JANE DOE }\\\\"));
        assert!(rendered.contains("\\textit{ Backend Engineer }\\\\"));
        assert!(rendered.contains("jane@example.com | 555-0100 | janedoe.dev | linkedin.com/in/janedoe"));
        assert!(rendered.contains("\\section*{\\textcolor{accent}{PORTFOLIO}}"));
        assert!(rendered.contains("\\section*{\\textcolor{accent}{LANGUAGES}}\nEnglish"));
        assert!(!rendered.contains("Graphic Designer"));
    }

    #[test]
    fn test_technical_renders_sections() {
        let rendered = TemplateEngine::new().render(find("technical").unwrap().content, Some(&complete_resume()));
        assert!(rendered.contains("\\textbf{\\LARGE JANE DOE }\\\\"));
        assert!(rendered.contains("  \\item \\textbf{Skills:} Rust\n  \\item \\textbf{Languages:} English\n"));
        assert!(rendered.contains("  \\item Built with Go\n"));
        assert!(rendered.contains("State University \\hfill GPA: 3.9"));
        assert!(!rendered.contains("Kubernetes"));
    }

    #[test]
    fn test_creative_and_technical_defaults() {
        let creative = normalize_to_default(find("creative").unwrap().content);
        assert!(creative.contains("\\textcolor{accent}{\\Huge JOHN DOE }\\\\"));
        assert!(creative.contains("\\textit{Graphic Designer \\& Illustrator}\\\\"));
        assert!(creative.contains("Art Institute of Design"));
        assert!(!creative.contains("PORTFOLIO"));
        assert!(!creative.contains("LANGUAGES"));

        let technical = normalize_to_default(find("technical").unwrap().content);
        assert!(technical.contains("\\textbf{\\LARGE JOHN DOE }\\\\"));
        assert!(technical.contains("john.doe@email.com | (123) 456-7890\n"));
        assert!(technical.contains("\\item \\textbf{DevOps:} Docker, Kubernetes"));
        assert!(technical.contains("\\textbf{Distributed Task Scheduler}"));
    }

    #[test]
    fn test_normalized_templates_are_standalone() {
        for template in all() {
            let normalized = normalize_to_default(template.content);
            assert!(!normalized.contains("{{"), "{}", template.id);
            assert!(normalized.ends_with(END_DOCUMENT), "{}", template.id);
            assert_eq!(normalized.matches(END_DOCUMENT).count(), 1, "{}", template.id);
            assert!(normalized.contains("John Doe") || normalized.contains("JOHN DOE"), "{}", template.id);
            assert_eq!(normalize_to_default(&normalized), normalized, "{}", template.id);
        }
    }
}
