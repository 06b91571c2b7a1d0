//! Where the HTML and text bodies of a message come from

use std::path::{Path, PathBuf};

use crate::error::{MailError, Result};

const HTML_FILE: &str = "index.html";
const TEXT_FILE: &str = "index.txt";

/// Source of an HTML/text template pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    /// Explicit file paths, used verbatim
    Files { html: PathBuf, text: PathBuf },
    /// `<template directory>/<name>/index.html` and `index.txt`
    Named(String),
}

impl TemplateSource {
    pub fn files(html: impl Into<PathBuf>, text: impl Into<PathBuf>) -> Self {
        Self::Files {
            html: html.into(),
            text: text.into(),
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// Pick the source from loose references: a non-empty template name
    /// wins over the explicit paths.
    pub fn from_refs(
        html: impl Into<PathBuf>,
        text: impl Into<PathBuf>,
        template_name: &str,
    ) -> Self {
        if template_name.is_empty() {
            Self::files(html, text)
        } else {
            Self::named(template_name)
        }
    }

    /// HTML and text paths before resolution
    pub fn paths(&self, template_directory: &Path) -> (PathBuf, PathBuf) {
        match self {
            Self::Files { html, text } => (html.clone(), text.clone()),
            Self::Named(name) => {
                let dir = template_directory.join(name);
                (dir.join(HTML_FILE), dir.join(TEXT_FILE))
            }
        }
    }

    /// Absolute HTML and text paths
    pub fn resolve(&self, template_directory: &Path) -> Result<(PathBuf, PathBuf)> {
        let (html, text) = self.paths(template_directory);
        Ok((resolve_path(&html)?, resolve_path(&text)?))
    }
}

/// Make `path` absolute against the current directory without touching the filesystem.
pub fn resolve_path(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).map_err(|source| MailError::TemplateRead {
        path: path.to_path_buf(),
        source,
    })
}
