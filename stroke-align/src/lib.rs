//! This library scores how similar two glyphs look by aligning their ordered stroke sequences.
//!
//! A [`Taxonomy`](taxonomy::Taxonomy) fixes the stroke categories together with a symmetric
//! substitution cost table and an insertion/deletion cost.
//! An [`Aligner`](align::Aligner) runs the classic edit-distance dynamic programming over
//! two sequences of categories under that table.
#![deny(missing_docs)]

pub mod align;
pub mod errors;
pub mod taxonomy;

pub use align::{Aligner, Normalization};
pub use taxonomy::{StrokeCategory, Taxonomy, TaxonomyConfig};
