//! Email body templates.
//!
//! This module provides:
//! - Template sources: explicit file pairs or `<directory>/<name>/index.{html,txt}`
//! - A path-keyed cache of compiled handlebars templates
//! - A renderer producing the HTML and text bodies of a message concurrently
//! - Formatting helpers (`nl2br`, `capitalize`, `referrershort`, `ticketEvent`)
//!
//! # Example
//!
//! ```ignore
//! let renderer = Renderer::new(TemplateCache::new(HelperTable::standard()), "./templates");
//!
//! let bodies = renderer
//!     .render(&TemplateSource::named("welcome"), &json!({"name": "Ada"}))
//!     .await?;
//!
//! println!("{}\n{}", bodies.html, bodies.text);
//! ```

mod cache;
pub mod helpers;
mod loader;
mod renderer;
mod source;

pub use cache::{CompiledTemplate, TemplateCache};
pub use helpers::HelperTable;
pub use loader::{FsTemplateLoader, TemplateLoader};
pub use renderer::{RenderedBodies, Renderer};
pub use source::{resolve_path, TemplateSource};
