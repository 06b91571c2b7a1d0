use std::path::{Path, PathBuf};
use std::time::Instant;

use serde_json::Value;

use crate::config::TemplateConfig;
use crate::error::Result;
use crate::metrics::TemplateMetrics;

use super::cache::TemplateCache;
use super::helpers::HelperTable;
use super::source::TemplateSource;

/// HTML and text bodies rendered from one data context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedBodies {
    pub html: String,
    pub text: String,
}

/// Renders HTML/text template pairs through a [`TemplateCache`]
pub struct Renderer {
    cache: TemplateCache,
    template_directory: PathBuf,
}

impl Renderer {
    pub fn new(cache: TemplateCache, template_directory: impl Into<PathBuf>) -> Self {
        Self {
            cache,
            template_directory: template_directory.into(),
        }
    }

    /// Standard helpers, files from disk, strict mode per config
    pub fn from_config(config: &TemplateConfig) -> Self {
        let cache = TemplateCache::new(HelperTable::standard()).with_strict_mode(config.strict_mode);
        Self::new(cache, config.directory.clone())
    }

    pub fn cache(&self) -> &TemplateCache {
        &self.cache
    }

    pub fn template_directory(&self) -> &Path {
        &self.template_directory
    }

    /// Render both bodies of `source` concurrently.
    ///
    /// Fails with the first error from either half; a successful half is
    /// discarded in that case.
    #[tracing::instrument(name = "renderer.render", skip(self, data))]
    pub async fn render(&self, source: &TemplateSource, data: &Value) -> Result<RenderedBodies> {
        let started = Instant::now();
        let (html_path, text_path) = source.resolve(&self.template_directory)?;

        let (html, text) = futures::future::try_join(
            self.render_one(&html_path, data),
            self.render_one(&text_path, data),
        )
        .await?;

        TemplateMetrics::record_render_latency(started.elapsed().as_secs_f64());

        Ok(RenderedBodies { html, text })
    }

    /// Render from loose references; a non-empty `template_name` selects the
    /// template directory layout instead of the two paths.
    pub async fn render_refs(
        &self,
        html: impl Into<PathBuf>,
        text: impl Into<PathBuf>,
        data: &Value,
        template_name: &str,
    ) -> Result<RenderedBodies> {
        let source = TemplateSource::from_refs(html, text, template_name);
        self.render(&source, data).await
    }

    async fn render_one(&self, path: &Path, data: &Value) -> Result<String> {
        let template = self.cache.get_or_compile(path).await?;
        template.render(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MailError;
    use serde_json::json;
    use std::fs;

    fn write_template(root: &Path, name: &str, html: &str, text: &str) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("index.html"), html).unwrap();
        fs::write(dir.join("index.txt"), text).unwrap();
    }

    fn renderer_for(root: &Path) -> Renderer {
        Renderer::new(TemplateCache::default(), root)
    }

    #[tokio::test]
    async fn test_render_named_template() {
        let root = tempfile::tempdir().unwrap();
        write_template(
            root.path(),
            "welcome",
            "<p>Hi {{name}}</p>",
            "Hi {{name}}",
        );
        let renderer = renderer_for(root.path());

        let bodies = renderer
            .render(&TemplateSource::named("welcome"), &json!({"name": "Ada"}))
            .await
            .unwrap();

        assert_eq!(bodies.html, "<p>Hi Ada</p>");
        assert_eq!(bodies.text, "Hi Ada");
        assert_eq!(renderer.cache().len(), 2);
    }

    #[tokio::test]
    async fn test_render_explicit_files() {
        let root = tempfile::tempdir().unwrap();
        let html = root.path().join("body.html");
        let text = root.path().join("body.txt");
        fs::write(&html, "<b>{{n}}</b>").unwrap();
        fs::write(&text, "{{n}}").unwrap();
        let renderer = renderer_for(Path::new("/nonexistent"));

        let bodies = renderer
            .render_refs(&html, &text, &json!({"n": 7}), "")
            .await
            .unwrap();

        assert_eq!(bodies.html, "<b>7</b>");
        assert_eq!(bodies.text, "7");
    }

    #[tokio::test]
    async fn test_render_escapes_values() {
        let root = tempfile::tempdir().unwrap();
        write_template(root.path(), "esc", "{{v}}", "{{{v}}}");
        let renderer = renderer_for(root.path());

        let bodies = renderer
            .render(&TemplateSource::named("esc"), &json!({"v": "<a&b>"}))
            .await
            .unwrap();

        assert_eq!(bodies.html, "&lt;a&amp;b&gt;");
        assert_eq!(bodies.text, "<a&b>");
    }

    #[tokio::test]
    async fn test_malformed_half_fails_whole_render() {
        let root = tempfile::tempdir().unwrap();
        write_template(root.path(), "broken", "<p>{{ok}}</p>", "{{#each items}}");
        let renderer = renderer_for(root.path());

        let result = renderer
            .render(&TemplateSource::named("broken"), &json!({"ok": 1}))
            .await;

        match result {
            Err(MailError::TemplateCompile { path, .. }) => {
                assert!(path.ends_with("broken/index.txt"))
            }
            other => panic!("expected TemplateCompile, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_template_fails() {
        let root = tempfile::tempdir().unwrap();
        let renderer = renderer_for(root.path());

        let result = renderer
            .render(&TemplateSource::named("nope"), &json!({}))
            .await;

        assert!(matches!(result, Err(MailError::TemplateRead { .. })));
    }

    #[tokio::test]
    async fn test_helpers_available_in_templates() {
        let root = tempfile::tempdir().unwrap();
        write_template(
            root.path(),
            "ticket",
            "{{nl2br message}}",
            "{{ticketEvent kind line operator=agent}}",
        );
        let renderer = renderer_for(root.path());

        let bodies = renderer
            .render(
                &TemplateSource::named("ticket"),
                &json!({
                    "message": "line one\nline two",
                    "kind": "agent_solved_ticket",
                    "line": "Solved by %operator%",
                    "agent": "Sam"
                }),
            )
            .await
            .unwrap();

        assert_eq!(bodies.html, "line one<br>\nline two");
        assert_eq!(bodies.text, "Solved by Sam");
    }
}
