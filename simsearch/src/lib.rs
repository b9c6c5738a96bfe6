//! Visual similarity search over glyphs decomposed into stroke sequences.
//!
//! [`ModelBuilder`] aligns every pair of glyphs of a [`GlyphRepository`] and persists the
//! top-k nearest neighbours of each glyph into a [`ModelStore`].
//! [`QueryService`] answers lookups from the stored models, or by aligning on demand.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//!
//! use simsearch::{Glyph, MemoryGlyphRepository, MemoryModelStore, ModelBuilder, QueryService};
//! use stroke_align::{Aligner, Taxonomy};
//!
//! let repo = MemoryGlyphRepository::from_glyphs([
//!     Glyph::new("A", ["s", "h"]),
//!     Glyph::new("B", ["s", "h"]),
//!     Glyph::new("C", ["h", "s", "d"]),
//! ]);
//! let store = MemoryModelStore::new();
//! let aligner = Aligner::new(Arc::new(Taxonomy::cjk()));
//!
//! let report = ModelBuilder::new(aligner.clone(), 2)
//!     .unwrap()
//!     .build(&repo, &store, None)
//!     .unwrap();
//! assert_eq!(report.num_written, 3);
//!
//! let service = QueryService::new(repo, store, aligner);
//! let results = service.query("A", 2, None).unwrap();
//! assert_eq!(results[0].glyph, "B");
//! assert_eq!(results[0].score, 0.);
//! ```
#![deny(missing_docs)]

pub mod accessibility;
pub mod builder;
pub mod errors;
pub mod glyph;
pub mod model;
pub mod query;
pub mod simulate;
pub mod snapshot;
pub mod store;

pub(crate) mod topk;

pub use builder::{BuildReport, ModelBuilder, RetryPolicy};
pub use glyph::{Glyph, GlyphRepository, MemoryGlyphRepository};
pub use model::{GlyphModel, NeighborEntry};
pub use query::QueryService;
pub use snapshot::{Defect, DefectKind};
pub use store::{DirModelStore, MemoryModelStore, ModelStore};
