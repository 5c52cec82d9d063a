//! # summary-forge – chat summary → PDF pipeline
//!
//! This crate renders conversation summaries, written in a small markdown
//! subset, into branded A4 PDFs styled by a YAML configuration. The pipeline
//! stages are:
//!
//! 1. **Configure** – YAML → typed [`config::PdfConfig`] ([`config`])
//! 2. **Convert** – markdown → block list ([`markdown`], [`inline`])
//! 3. **Assemble** – branded header + meta + summary ([`document`])
//! 4. **Style** – named paragraph styles and colours ([`style`], [`fonts`])
//! 5. **Layout** – flex layout with Taffy ([`layout`])
//! 6. **Paginate** – split into A4 pages ([`pagination`]) and add the
//!    watermark, header and footer ([`decoration`])
//! 7. **Render** – emit PDF bytes via printpdf ([`render`])
//!
//! The chat summary use case ([`summary`], [`crypto`]) and the post-chat
//! survey policy ([`survey`]) sit beside the renderer. A C-compatible FFI
//! surface is exposed via the [`ffi`] module.

pub mod config;
pub mod crypto;
pub mod decoration;
pub mod document;
pub mod error;
pub mod ffi;
pub mod fonts;
pub mod inline;
pub mod layout;
pub mod layout_config;
pub mod markdown;
pub mod pagination;
pub mod pipeline;
pub mod render;
pub mod style;
pub mod summary;
pub mod survey;

// Re-exports for convenience
pub use config::PdfConfig;
pub use document::SummaryMeta;
pub use error::{Error, Result};
pub use pipeline::SummaryRenderer;
