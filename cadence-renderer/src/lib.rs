//! # cadence-renderer
//!
//! Tera-based renderer turning a [`cadence_core::Snapshot`] into the full
//! text of a reverse-proxy configuration.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use cadence_core::Snapshot;
//! use cadence_renderer::Renderer;
//!
//! fn render(snapshot: &Snapshot) {
//!     if let Ok(renderer) = Renderer::new() {
//!         if let Ok(text) = renderer.render(snapshot) {
//!             println!("{} bytes", text.len());
//!         }
//!     }
//! }
//! ```

pub mod context;
pub mod engine;
pub mod error;

pub use context::TemplateContext;
pub use engine::{Renderer, TemplateEngine};
pub use error::RenderError;
