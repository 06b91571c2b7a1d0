//! Path-keyed cache of compiled templates

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use handlebars::{Handlebars, Template};
use serde_json::Value;

use crate::error::{MailError, Result};
use crate::metrics::TemplateMetrics;

use super::helpers::HelperTable;
use super::loader::{FsTemplateLoader, TemplateLoader};
use super::source::resolve_path;

/// Name each compiled template is registered under in its own registry
const TEMPLATE_NAME: &str = "template";

/// A compiled template bound to the helpers of the cache that built it.
#[derive(Clone)]
pub struct CompiledTemplate {
    path: PathBuf,
    registry: Arc<Handlebars<'static>>,
}

impl CompiledTemplate {
    /// Source file this template was compiled from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Render against a data context
    pub fn render(&self, data: &Value) -> Result<String> {
        self.registry.render(TEMPLATE_NAME, data).map_err(|source| {
            TemplateMetrics::record_render_error();
            MailError::TemplateRender {
                path: self.path.clone(),
                source,
            }
        })
    }
}

impl fmt::Debug for CompiledTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledTemplate")
            .field("path", &self.path)
            .finish()
    }
}

/// Compiled templates keyed by absolute path.
///
/// Entries are filled lazily and never reloaded: edits to a template file are
/// not picked up until [`TemplateCache::invalidate`] or [`TemplateCache::clear`]
/// is called, or the cache is rebuilt. Failed compilations are not cached.
pub struct TemplateCache {
    base: Handlebars<'static>,
    entries: DashMap<PathBuf, CompiledTemplate>,
    loader: Arc<dyn TemplateLoader>,
}

impl TemplateCache {
    /// Cache reading templates from disk
    pub fn new(helpers: HelperTable) -> Self {
        Self::with_loader(helpers, Arc::new(FsTemplateLoader))
    }

    pub fn with_loader(helpers: HelperTable, loader: Arc<dyn TemplateLoader>) -> Self {
        let mut base = Handlebars::new();
        helpers.install(&mut base);

        Self {
            base,
            entries: DashMap::new(),
            loader,
        }
    }

    /// Applies to templates compiled after this call.
    pub fn with_strict_mode(mut self, strict: bool) -> Self {
        self.base.set_strict_mode(strict);
        self
    }

    /// Return the cached template for `path`, reading and compiling it on first use.
    #[tracing::instrument(name = "template_cache.get_or_compile", skip(self), fields(path = %path.display()))]
    pub async fn get_or_compile(&self, path: &Path) -> Result<CompiledTemplate> {
        let path = resolve_path(path)?;

        let cached = self.entries.get(&path).map(|entry| entry.value().clone());
        if let Some(template) = cached {
            TemplateMetrics::record_cache_hit();
            tracing::debug!(path = %path.display(), "Template cache hit");
            return Ok(template);
        }

        TemplateMetrics::record_cache_miss();

        let source = self.loader.load(&path).await.map_err(|source| {
            TemplateMetrics::record_read_error();
            MailError::TemplateRead {
                path: path.clone(),
                source,
            }
        })?;

        let template = Template::compile(&source).map_err(|source| {
            TemplateMetrics::record_compile_error();
            MailError::TemplateCompile {
                path: path.clone(),
                source,
            }
        })?;

        let mut registry = self.base.clone();
        registry.register_template(TEMPLATE_NAME, template);

        let compiled = CompiledTemplate {
            path: path.clone(),
            registry: Arc::new(registry),
        };

        // A concurrent miss on the same path may have landed first; keep that one.
        let entry = self.entries.entry(path).or_insert(compiled).value().clone();

        tracing::debug!(
            path = %entry.path.display(),
            cached_templates = self.entries.len(),
            "Template compiled and cached"
        );

        Ok(entry)
    }

    /// Drop one entry so the next lookup recompiles from disk.
    pub fn invalidate(&self, path: &Path) -> bool {
        match resolve_path(path) {
            Ok(path) => self.entries.remove(&path).is_some(),
            Err(_) => false,
        }
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn contains(&self, path: &Path) -> bool {
        resolve_path(path)
            .map(|path| self.entries.contains_key(&path))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for TemplateCache {
    fn default() -> Self {
        Self::new(HelperTable::standard())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    /// In-memory loader that counts reads
    #[derive(Default)]
    struct CountingLoader {
        files: Mutex<HashMap<PathBuf, String>>,
        reads: AtomicUsize,
    }

    impl CountingLoader {
        fn with_file(path: &str, contents: &str) -> Self {
            let loader = Self::default();
            loader.put(path, contents);
            loader
        }

        fn put(&self, path: &str, contents: &str) {
            self.files
                .lock()
                .unwrap()
                .insert(PathBuf::from(path), contents.to_string());
        }

        fn reads(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TemplateLoader for CountingLoader {
        async fn load(&self, path: &Path) -> std::io::Result<String> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.files
                .lock()
                .unwrap()
                .get(path)
                .cloned()
                .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "not found"))
        }
    }

    fn cache_with(loader: Arc<CountingLoader>) -> TemplateCache {
        TemplateCache::with_loader(HelperTable::standard(), loader)
    }

    #[tokio::test]
    async fn test_second_lookup_skips_loader() {
        let loader = Arc::new(CountingLoader::with_file("/t/hello.html", "Hello {{name}}"));
        let cache = cache_with(loader.clone());
        let path = Path::new("/t/hello.html");

        let first = cache.get_or_compile(path).await.unwrap();
        let second = cache.get_or_compile(path).await.unwrap();

        assert_eq!(loader.reads(), 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(
            first.render(&json!({"name": "Ada"})).unwrap(),
            second.render(&json!({"name": "Ada"})).unwrap()
        );
    }

    #[tokio::test]
    async fn test_cached_entry_survives_source_change() {
        let loader = Arc::new(CountingLoader::with_file("/t/a.txt", "v1 {{x}}"));
        let cache = cache_with(loader.clone());
        let path = Path::new("/t/a.txt");

        cache.get_or_compile(path).await.unwrap();
        loader.put("/t/a.txt", "v2 {{x}}");

        let template = cache.get_or_compile(path).await.unwrap();
        assert_eq!(template.render(&json!({"x": 1})).unwrap(), "v1 1");
    }

    #[tokio::test]
    async fn test_invalidate_forces_recompile() {
        let loader = Arc::new(CountingLoader::with_file("/t/a.txt", "v1"));
        let cache = cache_with(loader.clone());
        let path = Path::new("/t/a.txt");

        cache.get_or_compile(path).await.unwrap();
        loader.put("/t/a.txt", "v2");

        assert!(cache.invalidate(path));
        assert!(!cache.invalidate(path));

        let template = cache.get_or_compile(path).await.unwrap();
        assert_eq!(template.render(&json!({})).unwrap(), "v2");
        assert_eq!(loader.reads(), 2);
    }

    #[tokio::test]
    async fn test_read_failure() {
        let loader = Arc::new(CountingLoader::default());
        let cache = cache_with(loader);

        let result = cache.get_or_compile(Path::new("/t/missing.html")).await;
        match result {
            Err(MailError::TemplateRead { path, .. }) => {
                assert_eq!(path, PathBuf::from("/t/missing.html"))
            }
            other => panic!("expected TemplateRead, got {:?}", other),
        }
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_compile_failure_is_not_cached() {
        let loader = Arc::new(CountingLoader::with_file("/t/bad.html", "{{#if x}}unclosed"));
        let cache = cache_with(loader.clone());
        let path = Path::new("/t/bad.html");

        let result = cache.get_or_compile(path).await;
        assert!(matches!(result, Err(MailError::TemplateCompile { .. })));
        assert!(!cache.contains(path));

        // Fixed on disk: the next call compiles again from source
        loader.put("/t/bad.html", "{{#if x}}ok{{/if}}");
        let template = cache.get_or_compile(path).await.unwrap();
        assert_eq!(template.render(&json!({"x": true})).unwrap(), "ok");
        assert_eq!(loader.reads(), 2);
    }

    #[tokio::test]
    async fn test_helpers_are_scoped_to_cache() {
        let loader = Arc::new(CountingLoader::with_file("/t/cap.txt", "{{capitalize word}}"));

        let with_helpers = cache_with(loader.clone());
        let template = with_helpers
            .get_or_compile(Path::new("/t/cap.txt"))
            .await
            .unwrap();
        assert_eq!(template.render(&json!({"word": "wORD"})).unwrap(), "Word");

        let bare = TemplateCache::with_loader(HelperTable::empty(), loader);
        let template = bare.get_or_compile(Path::new("/t/cap.txt")).await.unwrap();
        assert!(matches!(
            template.render(&json!({"word": "wORD"})),
            Err(MailError::TemplateRender { .. })
        ));
    }

    #[tokio::test]
    async fn test_strict_mode_rejects_missing_variables() {
        let loader = Arc::new(CountingLoader::with_file("/t/s.txt", "Hi {{name}}"));

        let lenient = cache_with(loader.clone());
        let template = lenient.get_or_compile(Path::new("/t/s.txt")).await.unwrap();
        assert_eq!(template.render(&json!({})).unwrap(), "Hi ");

        let strict = cache_with(loader).with_strict_mode(true);
        let template = strict.get_or_compile(Path::new("/t/s.txt")).await.unwrap();
        assert!(matches!(
            template.render(&json!({})),
            Err(MailError::TemplateRender { .. })
        ));
    }

    #[tokio::test]
    async fn test_clear() {
        let loader = Arc::new(CountingLoader::with_file("/t/a.txt", "a"));
        loader.put("/t/b.txt", "b");
        let cache = cache_with(loader);

        cache.get_or_compile(Path::new("/t/a.txt")).await.unwrap();
        cache.get_or_compile(Path::new("/t/b.txt")).await.unwrap();
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
    }
}
