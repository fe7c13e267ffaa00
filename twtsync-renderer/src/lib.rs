//! # twtsync-renderer
//!
//! Tera-based rendering of the HTML fragments stored on synced performance
//! items: the price table, the availability control and the arrangement cards.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use serde_json::json;
//! use twtsync_renderer::HtmlRenderer;
//!
//! fn show_prices() {
//!     if let Ok(renderer) = HtmlRenderer::new() {
//!         let ranks = vec![json!({ "description": "Rang 1", "prices": [] })];
//!         if let Ok(html) = renderer.render_prices(&ranks) {
//!             println!("{html}");
//!         }
//!     }
//! }
//! ```

pub mod context;
pub mod engine;
pub mod error;

pub use context::{
    ArrangementCtx, ArrangementsCtx, AvailabilityCtx, AvailabilityKind, PerformanceStatus,
    PriceCtx, PriceTableCtx, RankCtx,
};
pub use engine::{HtmlRenderer, TemplateEngine, Fragment};
pub use error::RenderError;
