//! Immutable, resolved view of a glyph collection for one run.
use std::fmt;

use stroke_align::errors::UnknownStrokeError;
use stroke_align::{StrokeCategory, Taxonomy};

use crate::errors::StoreError;
use crate::glyph::Glyph;

/// Reason a glyph is excluded from a build or could not be persisted.
#[derive(Clone, Debug, PartialEq)]
pub enum DefectKind {
    /// A stroke code is not in the taxonomy.
    UnknownStroke(UnknownStrokeError),
    /// The glyph has no stroke.
    EmptySequence,
    /// The repository listed the identifier more than once.
    DuplicateGlyph,
    /// The model could not be written.
    StoreUnavailable(StoreError),
}

impl fmt::Display for DefectKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::UnknownStroke(e) => e.fmt(f),
            Self::EmptySequence => write!(f, "empty stroke sequence"),
            Self::DuplicateGlyph => write!(f, "duplicate glyph identifier"),
            Self::StoreUnavailable(e) => e.fmt(f),
        }
    }
}

/// A problem with a single glyph. It never aborts a build.
#[derive(Clone, Debug, PartialEq)]
pub struct Defect {
    /// Identifier of the glyph.
    pub glyph: String,
    /// What went wrong.
    pub kind: DefectKind,
}

impl fmt::Display for Defect {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}: {}", self.glyph, self.kind)
    }
}

/// Valid glyphs sorted by identifier, so that positions order like identifiers.
#[derive(Clone, Debug, Default)]
pub(crate) struct Snapshot {
    pub ids: Vec<String>,
    pub strokes: Vec<Vec<StrokeCategory>>,
}

impl Snapshot {
    /// Resolves the glyphs, setting aside those that cannot be compared.
    pub fn new(taxonomy: &Taxonomy, mut glyphs: Vec<Glyph>) -> (Self, Vec<Defect>) {
        glyphs.sort_by(|a, b| a.id().cmp(b.id()));

        let mut snapshot = Self::default();
        let mut defects = vec![];
        let mut i = 0;
        while i < glyphs.len() {
            let id = glyphs[i].id();
            let run = glyphs[i..].iter().take_while(|g| g.id() == id).count();
            if run > 1 {
                defects.push(Defect {
                    glyph: id.to_string(),
                    kind: DefectKind::DuplicateGlyph,
                });
            } else {
                match resolve(taxonomy, &glyphs[i]) {
                    Ok(strokes) => {
                        snapshot.ids.push(id.to_string());
                        snapshot.strokes.push(strokes);
                    }
                    Err(kind) => defects.push(Defect {
                        glyph: id.to_string(),
                        kind,
                    }),
                }
            }
            i += run;
        }
        (snapshot, defects)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.ids.binary_search_by(|x| x.as_str().cmp(id)).ok()
    }
}

/// Resolves the strokes of one glyph.
pub(crate) fn resolve(
    taxonomy: &Taxonomy,
    glyph: &Glyph,
) -> Result<Vec<StrokeCategory>, DefectKind> {
    if glyph.strokes().is_empty() {
        return Err(DefectKind::EmptySequence);
    }
    taxonomy
        .resolve_all(glyph.strokes())
        .map_err(DefectKind::UnknownStroke)
}
