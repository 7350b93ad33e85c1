//! Embedded static HTML served at `/`.
//!
//! Kept as `&'static str` so the page ships inside the binary.

pub mod index;

pub(crate) use index::INDEX_HTML;
