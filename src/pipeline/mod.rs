//! Pipeline stages.
//!
//! ## Data Flow
//!
//! ```text
//! manifest ──▶ fetch ──▶ store ──▶ assemble
//! (lines)     (HTTP/data/file)  (names)  (PDF writer)
//!
//! pdfium: source PDF ──▶ page-range copies (used by crate::split)
//! ```
//!
//! 1. [`manifest`] parses `"<ordinal>. <source>"` lines into entries
//! 2. [`fetch`] retrieves one entry; the only stage with network I/O
//! 3. [`store`] owns artifact naming, staging and directory scans
//! 4. [`assemble`] writes ordered images as pages of one PDF
//! 5. [`pdfium`] binds the pdfium library and wraps a loaded source PDF

pub mod assemble;
pub mod fetch;
pub mod manifest;
pub mod pdfium;
pub mod store;
