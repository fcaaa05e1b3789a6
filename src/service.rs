use log::{debug, info, warn};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use crate::cache::{CacheKey, CacheStats, RenderCache};
use crate::config::AppConfig;
use crate::data::ResumeData;
use crate::engine::TemplateEngine;
use crate::gallery::BuiltinTemplate;
use crate::normalize::normalize_to_default;
use crate::source::{fetch_or_none, Credential, ResumeSource};

/// Resolves templates to markup: rendered with the user's data when there is
/// any, normalized to standalone defaults otherwise. Results are cached per
/// template and data snapshot.
#[derive(Debug)]
pub struct RenderService {
    engine: TemplateEngine,
    cache: RenderCache,
}

impl RenderService {
    pub fn new(engine: TemplateEngine, cache: RenderCache) -> Self {
        Self { engine, cache }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            TemplateEngine::with_escape(config.escape),
            RenderCache::new(config.cache.capacity),
        )
    }

    pub fn render_template(&mut self, id: &str, content: &str, data: Option<&ResumeData>) -> String {
        let key = CacheKey::new(id, data);
        if let Some(cached) = self.cache.get(&key) {
            debug!("Cache hit for template '{}'", id);
            return cached.to_string();
        }
        let resolved = match data {
            Some(data) => self.engine.render(content, Some(data)),
            None => normalize_to_default(content),
        };
        self.cache.insert(key, resolved.clone());
        resolved
    }

    /// Fetches the user's data from `source` and resolves `content` with it.
    pub fn resolve(
        &mut self,
        id: &str,
        content: &str,
        source: &dyn ResumeSource,
        credential: Option<&Credential>,
    ) -> String {
        let data = fetch_or_none(source, credential);
        if data.is_none() {
            info!("No resume data, using default content for '{}'", id);
        }
        self.render_template(id, content, data.as_ref())
    }

    /// Renders every template into the cache, `chunk_size` at a time,
    /// yielding the thread between chunks. Returns how many were rendered.
    pub fn prerender(&mut self, templates: &[BuiltinTemplate], data: Option<&ResumeData>, chunk_size: usize) -> usize {
        let mut rendered = 0;
        for chunk in templates.chunks(chunk_size.max(1)) {
            rendered += self.prerender_chunk(chunk, data);
            thread::yield_now();
        }
        rendered
    }

    fn prerender_chunk(&mut self, chunk: &[BuiltinTemplate], data: Option<&ResumeData>) -> usize {
        let mut rendered = 0;
        for template in chunk {
            if self.cache.contains(&CacheKey::new(template.id, data)) {
                continue;
            }
            self.render_template(template.id, template.content, data);
            rendered += 1;
        }
        rendered
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

/// Prerenders on a background thread, holding the lock for one chunk at a
/// time so foreground renders can interleave.
pub fn spawn_prerender(
    service: Arc<Mutex<RenderService>>,
    templates: &'static [BuiltinTemplate],
    data: Option<ResumeData>,
    chunk_size: usize,
) -> JoinHandle<usize> {
    thread::spawn(move || {
        let mut rendered = 0;
        for chunk in templates.chunks(chunk_size.max(1)) {
            let mut guard = service.lock().unwrap_or_else(|e| {
                warn!("Render service lock was poisoned, continuing");
                PoisonError::into_inner(e)
            });
            rendered += guard.prerender_chunk(chunk, data.as_ref());
            drop(guard);
            thread::yield_now();
        }
        debug!("Prerendered {} templates", rendered);
        rendered
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gallery;
    use crate::helpers::EscapeMode;
    use crate::source::SourceError;

    struct StaticSource(Option<ResumeData>);

    impl ResumeSource for StaticSource {
        fn fetch(&self, _credential: Option<&Credential>) -> Result<Option<ResumeData>, SourceError> {
            Ok(self.0.clone())
        }
    }

    struct FailingSource;

    impl ResumeSource for FailingSource {
        fn fetch(&self, _credential: Option<&Credential>) -> Result<Option<ResumeData>, SourceError> {
            Err(SourceError::Io(std::io::Error::other("service unavailable")))
        }
    }

    fn service(capacity: usize) -> RenderService {
        RenderService::new(TemplateEngine::with_escape(EscapeMode::Latex), RenderCache::new(capacity))
    }

    fn jane() -> ResumeData {
        ResumeData {
            name: Some("Jane Doe".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_render_with_and_without_data() {
        let mut service = service(8);
        let template = "Hello {{name}}\n\\end{document}";
        assert_eq!(
            service.render_template("t", template, Some(&jane())),
            "Hello Jane Doe\n\\end{document}"
        );
        assert_eq!(
            service.render_template("t", template, None),
            "Hello John Doe\n\n\\end{document}"
        );
    }

    #[test]
    fn test_render_is_cached() {
        let mut service = service(8);
        let data = jane();
        let first = service.render_template("t", "{{name}}", Some(&data));
        let second = service.render_template("t", "{{name}}", Some(&data));
        assert_eq!(first, second);
        let stats = service.cache_stats();
        assert_eq!((stats.hits, stats.misses, stats.len), (1, 1, 1));
    }

    #[test]
    fn test_changed_data_misses_cache() {
        let mut service = service(8);
        assert_eq!(service.render_template("t", "{{name}}", Some(&jane())), "Jane Doe");
        let janet = ResumeData {
            name: Some("Janet".to_string()),
            ..Default::default()
        };
        assert_eq!(service.render_template("t", "{{name}}", Some(&janet)), "Janet");
    }

    #[test]
    fn test_resolve_uses_source() {
        let mut service = service(8);
        let template = "{{name}}";
        let source = StaticSource(Some(jane()));
        assert_eq!(service.resolve("t", template, &source, None), "Jane Doe");

        let empty = StaticSource(None);
        assert!(service.resolve("t", template, &empty, None).starts_with("John Doe"));
        assert!(service.resolve("u", template, &FailingSource, None).starts_with("John Doe"));
    }

    #[test]
    fn test_prerender_fills_cache() {
        let mut service = service(8);
        let data = jane();
        let count = gallery::all().len();
        assert_eq!(service.prerender(gallery::all(), Some(&data), 2), count);
        assert_eq!(service.cache_stats().len, count);
        // Already cached templates are skipped.
        assert_eq!(service.prerender(gallery::all(), Some(&data), 0), 0);
    }

    #[test]
    fn test_spawn_prerender() {
        let shared = Arc::new(Mutex::new(service(8)));
        let handle = spawn_prerender(Arc::clone(&shared), gallery::all(), None, 2);
        assert_eq!(handle.join().unwrap(), gallery::all().len());

        let mut service = shared.lock().unwrap();
        let modern = gallery::find("modern").unwrap();
        let cached = service.render_template(modern.id, modern.content, None);
        assert_eq!(cached, normalize_to_default(modern.content));
        assert_eq!(service.cache_stats().hits, 1);
    }
}
