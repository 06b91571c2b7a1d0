//! Template source loading

use std::path::Path;

use async_trait::async_trait;

/// Reads template source text.
///
/// The cache only calls this on a miss, so implementations can count calls
/// to observe cache behavior.
#[async_trait]
pub trait TemplateLoader: Send + Sync {
    async fn load(&self, path: &Path) -> std::io::Result<String>;
}

/// Loads templates as UTF-8 files from disk
#[derive(Debug, Clone, Copy, Default)]
pub struct FsTemplateLoader;

#[async_trait]
impl TemplateLoader for FsTemplateLoader {
    async fn load(&self, path: &Path) -> std::io::Result<String> {
        tokio::fs::read_to_string(path).await
    }
}
