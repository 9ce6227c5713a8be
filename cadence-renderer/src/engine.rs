//! Tera rendering engine: [`TemplateEngine`] and [`Renderer`].
//!
//! The embedded template renders one `upstream` block per workload group,
//! a default server routing `/<app-id>/` to each upstream, and a dedicated
//! server for every group carrying a vhost label. A user template file,
//! when configured, replaces it; the embedded macros stay importable.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tera::Tera;

use cadence_core::Snapshot;

use crate::context::TemplateContext;
use crate::error::RenderError;

/// Name of the root template every render starts from.
pub const ROOT_TEMPLATE: &str = "nginx.conf";

// ---------------------------------------------------------------------------
// Embedded templates, baked into the binary via include_str!
// ---------------------------------------------------------------------------

const TPLS: &[(&str, &str)] = &[
    ("macros.tera", include_str!("templates/macros.tera")),
    (ROOT_TEMPLATE, include_str!("templates/nginx.conf.tera")),
];

fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RenderError {
    RenderError::Io { path: path.into(), source }
}

fn build_tera(user_template: Option<&Path>) -> Result<Tera, RenderError> {
    let mut templates: HashMap<String, String> = TPLS
        .iter()
        .map(|(name, content)| ((*name).to_string(), (*content).to_string()))
        .collect();
    if let Some(path) = user_template {
        let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        templates.insert(ROOT_TEMPLATE.to_string(), contents);
    }

    let mut tera = Tera::default();
    // Output is a proxy config, not HTML.
    tera.autoescape_on(vec![]);
    tera.add_raw_templates(templates.into_iter().collect::<Vec<_>>())
        .map_err(|source| RenderError::Compile {
            origin: user_template
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "embedded".to_string()),
            source,
        })?;
    Ok(tera)
}

// ---------------------------------------------------------------------------
// TemplateEngine
// ---------------------------------------------------------------------------

/// Compiled template set. Parsing happens once, at construction.
pub struct TemplateEngine {
    tera: Tera,
}

impl TemplateEngine {
    /// Load embedded templates, with `user_template` (if any) as the root.
    ///
    /// Syntax errors in the user template surface here, not at render time.
    pub fn new(user_template: Option<&Path>) -> Result<Self, RenderError> {
        let tera = build_tera(user_template)?;
        Ok(TemplateEngine { tera })
    }

    pub fn render(&self, ctx: &TemplateContext) -> Result<String, RenderError> {
        let tera_ctx = ctx.to_tera_context()?;
        self.tera
            .render(ROOT_TEMPLATE, &tera_ctx)
            .map_err(|source| RenderError::Render { template: ROOT_TEMPLATE, source })
    }
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Snapshot-to-text renderer. Create once and reuse across cycles.
pub struct Renderer {
    engine: TemplateEngine,
}

impl Renderer {
    /// Renderer with the embedded default template.
    pub fn new() -> Result<Self, RenderError> {
        Ok(Renderer { engine: TemplateEngine::new(None)? })
    }

    /// Renderer whose root template is read from `path`.
    pub fn with_template(path: &Path) -> Result<Self, RenderError> {
        Ok(Renderer { engine: TemplateEngine::new(Some(path))? })
    }

    /// `with_template` when a path is given, `new` otherwise.
    pub fn from_optional(path: Option<&Path>) -> Result<Self, RenderError> {
        Ok(Renderer { engine: TemplateEngine::new(path)? })
    }

    /// Render the complete proxy configuration for `snapshot`.
    ///
    /// Pure: the same snapshot always yields the same text.
    pub fn render(&self, snapshot: &Snapshot) -> Result<String, RenderError> {
        let ctx = TemplateContext::from_snapshot(snapshot);
        self.render_with_context(&ctx)
    }

    pub fn render_with_context(&self, ctx: &TemplateContext) -> Result<String, RenderError> {
        self.engine.render(ctx)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
