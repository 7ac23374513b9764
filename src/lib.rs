//! # invoice-forge – tax invoices as single-page PDFs
//!
//! Two halves:
//!
//! * the **compositor** ([`compose`]) turns an [`InvoiceRecord`] and an
//!   [`OrganizationProfile`] into self-contained HTML with every amount
//!   computed and formatted;
//! * the **page-fitting renderer** ([`fit`]) sizes one tall page from the
//!   number of line items and renders the HTML onto it.
//!
//! The renderer drives a small HTML → PDF engine:
//!
//! 1. **Parse** – HTML string → DOM tree ([`dom`])
//! 2. **Style** – cascade `<style>` sheets and inline styles ([`style`])
//! 3. **Layout** – compute flexbox/grid layout with Taffy ([`layout`])
//! 4. **Paginate** – place boxes on the page ([`pagination`])
//! 5. **Render** – emit PDF bytes via printpdf ([`render`])
//!
//! With the `client` feature, [`client`] talks to the remote invoice
//! service that renders and mails invoices server side.

pub mod amounts;
#[cfg(feature = "client")]
pub mod client;
pub mod compose;
pub mod dom;
pub mod error;
pub mod fit;
pub mod fonts;
pub mod format;
pub mod layout;
pub mod layout_config;
pub mod model;
pub mod pagination;
pub mod pipeline;
pub mod profile;
pub mod render;
pub mod style;

// Re-exports for convenience
pub use compose::{compose, Compositor, RenderedDocument};
pub use error::{InvoiceError, Result, ValidationError};
pub use fit::{render, render_document, HeightPolicy, PageGeometry, RenderOutput};
pub use model::{InvoiceRecord, InvoiceRequest, LineItem};
pub use pipeline::{generate_pdf, generate_pdf_from_html, PipelineConfig};
pub use profile::OrganizationProfile;
