//! Tera rendering engine: [`Fragment`] enum, [`TemplateEngine`] and [`HtmlRenderer`].
//!
//! | Fragment      | Template                 | Stored on             |
//! |---------------|--------------------------|-----------------------|
//! | Prices        | `html/prices.tera`       | `ContentItem::price`  |
//! | Availability  | `html/availability.tera` | `ContentItem::availability` |
//! | Arrangements  | `html/arrangements.tera` | `ContentItem::arrangements` |

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use tera::Tera;

use twtsync_core::ports::ProductCatalog;
use twtsync_core::settings::DEFAULT_PURCHASE_URL_TEMPLATE;
use twtsync_core::types::{PerformanceId, UpstreamRecord, ONSALE_FIELD};

use crate::context::{
    to_tera_context, ArrangementsCtx, AvailabilityCtx, PerformanceStatus, PriceTableCtx,
};
use crate::error::RenderError;

/// Upstream field carrying the status code.
pub const STATUS_FIELD: &str = "performanceStatus";

// ---------------------------------------------------------------------------
// Embedded templates: baked into the binary at compile time via include_str!
// ---------------------------------------------------------------------------

const TPLS: &[(&str, &str)] = &[
    ("html/prices.tera", include_str!("templates/prices.html.tera")),
    ("html/availability.tera", include_str!("templates/availability.html.tera")),
    ("html/arrangements.tera", include_str!("templates/arrangements.html.tera")),
];

// ---------------------------------------------------------------------------
// Template loading helpers
// ---------------------------------------------------------------------------

fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RenderError {
    RenderError::Io { path: path.into(), source }
}

fn normalize_template_name(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/").to_lowercase()
}

fn collect_template_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), RenderError> {
    let entries = std::fs::read_dir(dir).map_err(|e| io_err(dir, e))?;
    for entry in entries {
        let entry = entry.map_err(|e| io_err(dir, e))?;
        let path = entry.path();
        let meta = entry.metadata().map_err(|e| io_err(&path, e))?;
        if meta.is_dir() {
            collect_template_files(&path, out)?;
        } else if meta.is_file() {
            out.push(path);
        }
    }
    Ok(())
}

fn load_user_templates(dir: &Path) -> Result<Vec<(String, String)>, RenderError> {
    if !dir.exists() {
        return Ok(vec![]);
    }
    let mut files = Vec::new();
    collect_template_files(dir, &mut files)?;
    let mut templates = Vec::new();
    for path in files {
        if path.extension().and_then(|s| s.to_str()) != Some("tera") {
            continue;
        }
        let rel = path.strip_prefix(dir).unwrap_or(path.as_path());
        let name = normalize_template_name(rel);
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        templates.push((name, contents));
    }
    Ok(templates)
}

fn build_tera(user_template_dir: Option<&Path>) -> Result<Tera, RenderError> {
    let mut templates: HashMap<String, String> = HashMap::new();
    for (name, content) in TPLS {
        templates.insert(normalize_template_name(Path::new(name)), (*content).to_string());
    }
    if let Some(dir) = user_template_dir {
        for (name, content) in load_user_templates(dir)? {
            templates.insert(name, content);
        }
    }

    let mut tera = Tera::default();
    tera.add_raw_templates(templates.into_iter().collect::<Vec<_>>())?;
    Ok(tera)
}

// ---------------------------------------------------------------------------
// Fragment
// ---------------------------------------------------------------------------

/// The derived HTML blocks kept on a content item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fragment {
    Prices,
    Availability,
    Arrangements,
}

impl Fragment {
    pub fn all() -> &'static [Fragment] {
        &[Fragment::Prices, Fragment::Availability, Fragment::Arrangements]
    }

    /// Template name; a user override must use the same relative path.
    pub fn template_name(&self) -> &'static str {
        match self {
            Fragment::Prices => "html/prices.tera",
            Fragment::Availability => "html/availability.tera",
            Fragment::Arrangements => "html/arrangements.tera",
        }
    }
}

// ---------------------------------------------------------------------------
// TemplateEngine
// ---------------------------------------------------------------------------

/// Tera-based engine for rendering templates with optional user overrides.
///
/// `user_template_dir` may contain `.tera` files that override embedded defaults.
/// Template names are normalised to lowercase and relative paths.
pub struct TemplateEngine {
    tera: Tera,
}

impl TemplateEngine {
    pub fn new(user_template_dir: Option<&Path>) -> Result<Self, RenderError> {
        let tera = build_tera(user_template_dir)?;
        Ok(TemplateEngine { tera })
    }

    /// Render `fragment` with `ctx`. Surrounding whitespace is trimmed.
    pub fn render<T: Serialize>(&self, fragment: Fragment, ctx: &T) -> Result<String, RenderError> {
        let tera_ctx = to_tera_context(ctx)?;
        let out = self.tera.render(fragment.template_name(), &tera_ctx)?;
        Ok(out.trim().to_string())
    }
}

// ---------------------------------------------------------------------------
// HtmlRenderer
// ---------------------------------------------------------------------------

/// Renders the three HTML blocks from raw upstream values.
///
/// Create once and reuse across a sync pass.
pub struct HtmlRenderer {
    engine: TemplateEngine,
    purchase_url_template: String,
}

impl HtmlRenderer {
    /// Embedded templates and the default purchase URL.
    pub fn new() -> Result<Self, RenderError> {
        Self::with_options(None, DEFAULT_PURCHASE_URL_TEMPLATE)
    }

    pub fn with_options(
        user_template_dir: Option<&Path>,
        purchase_url_template: &str,
    ) -> Result<Self, RenderError> {
        Ok(HtmlRenderer {
            engine: TemplateEngine::new(user_template_dir)?,
            purchase_url_template: purchase_url_template.to_string(),
        })
    }

    /// Price table for the upstream `ranks` array. An empty list yields "".
    pub fn render_prices(&self, ranks: &[Value]) -> Result<String, RenderError> {
        if ranks.is_empty() {
            return Ok(String::new());
        }
        self.engine.render(Fragment::Prices, &PriceTableCtx::from_ranks(ranks))
    }

    /// Status control for a performance.
    pub fn render_availability(
        &self,
        id: &PerformanceId,
        status: &str,
        onsale: bool,
    ) -> Result<String, RenderError> {
        let status = PerformanceStatus::parse(status);
        let ctx = AvailabilityCtx::new(&status, onsale, id, &self.purchase_url_template);
        self.engine.render(Fragment::Availability, &ctx)
    }

    /// Status control read straight from an upstream record.
    pub fn render_availability_for(
        &self,
        id: &PerformanceId,
        record: &UpstreamRecord,
    ) -> Result<String, RenderError> {
        let status = record.get(STATUS_FIELD).and_then(Value::as_str).unwrap_or_default();
        let onsale = record.get(ONSALE_FIELD).and_then(Value::as_bool).unwrap_or(false);
        self.render_availability(id, status, onsale)
    }

    /// Arrangement cards. No arrangements yields "".
    pub fn render_arrangements(
        &self,
        arrangements: &[UpstreamRecord],
        products: &dyn ProductCatalog,
    ) -> Result<String, RenderError> {
        if arrangements.is_empty() {
            return Ok(String::new());
        }
        let ctx = ArrangementsCtx::from_records(arrangements, products);
        self.engine.render(Fragment::Arrangements, &ctx)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
