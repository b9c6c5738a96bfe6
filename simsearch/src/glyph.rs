//! Glyphs and the repository supplying them.
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

use crate::errors::StoreError;

/// A glyph identified by a unique key, with its ordered stroke codes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Glyph {
    id: String,
    strokes: Vec<String>,
}

impl Glyph {
    /// Creates an instance.
    pub fn new<I, S>(id: &str, strokes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.to_string(),
            strokes: strokes.into_iter().map(Into::into).collect(),
        }
    }

    /// Gets the identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Gets the stroke codes in stroke order.
    pub fn strokes(&self) -> &[String] {
        &self.strokes
    }
}

/// Read-only source of glyphs.
pub trait GlyphRepository {
    /// Lists all glyphs.
    fn list_glyphs(&self) -> Result<Vec<Glyph>, StoreError>;

    /// Gets the glyph with the given identifier, if any.
    fn get_glyph(&self, id: &str) -> Result<Option<Glyph>, StoreError>;
}

/// A repository held in memory, listing glyphs in insertion order.
#[derive(Clone, Debug, Default)]
pub struct MemoryGlyphRepository {
    glyphs: Vec<Glyph>,
    index: HashMap<String, usize>,
}

impl MemoryGlyphRepository {
    /// Creates an empty instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an instance from glyphs. A later glyph replaces an earlier one with the same id.
    pub fn from_glyphs<I>(glyphs: I) -> Self
    where
        I: IntoIterator<Item = Glyph>,
    {
        let mut repo = Self::new();
        for glyph in glyphs {
            repo.insert(glyph);
        }
        repo
    }

    /// Inserts a glyph, returning the one it replaces.
    pub fn insert(&mut self, glyph: Glyph) -> Option<Glyph> {
        if let Some(&i) = self.index.get(glyph.id()) {
            Some(std::mem::replace(&mut self.glyphs[i], glyph))
        } else {
            self.index.insert(glyph.id().to_string(), self.glyphs.len());
            self.glyphs.push(glyph);
            None
        }
    }

    /// Loads glyphs from a stroke file.
    ///
    /// Each line holds a glyph identifier followed by its stroke codes, separated by whitespace.
    /// Empty lines and lines starting with `#` are ignored.
    pub fn load_stroke_file<P>(path: P) -> Result<Self, StoreError>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| StoreError::new(format!("{}: {e}", path.display())))?;
        Self::from_reader(file)
    }

    /// Loads glyphs in the stroke-file format from a reader.
    pub fn from_reader<R>(rdr: R) -> Result<Self, StoreError>
    where
        R: Read,
    {
        let mut repo = Self::new();
        for (i, line) in BufReader::new(rdr).lines().enumerate() {
            let line = line.map_err(StoreError::new)?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut tokens = line.split_whitespace();
            if let Some(id) = tokens.next() {
                if repo.insert(Glyph::new(id, tokens)).is_some() {
                    tracing::warn!(
                        glyph = id,
                        line = i + 1,
                        "duplicate glyph replaces an earlier line"
                    );
                }
            }
        }
        Ok(repo)
    }

    /// Gets the number of glyphs.
    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    /// Checks if the repository is empty.
    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }
}

impl GlyphRepository for MemoryGlyphRepository {
    fn list_glyphs(&self) -> Result<Vec<Glyph>, StoreError> {
        Ok(self.glyphs.clone())
    }

    fn get_glyph(&self, id: &str) -> Result<Option<Glyph>, StoreError> {
        Ok(self.index.get(id).map(|&i| self.glyphs[i].clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_reader() {
        let text = "# glyph strokes\n\
                    A vert horiz\n\
                    \n\
                    B  vert\thoriz\n\
                    C\n";
        let repo = MemoryGlyphRepository::from_reader(text.as_bytes()).unwrap();
        assert_eq!(repo.len(), 3);
        assert_eq!(
            repo.get_glyph("B").unwrap(),
            Some(Glyph::new("B", ["vert", "horiz"]))
        );
        assert_eq!(
            repo.get_glyph("C").unwrap(),
            Some(Glyph::new("C", Vec::<String>::new()))
        );
        assert_eq!(repo.get_glyph("D").unwrap(), None);
    }

    #[test]
    fn test_insert_replaces() {
        let mut repo = MemoryGlyphRepository::from_glyphs([
            Glyph::new("A", ["vert"]),
            Glyph::new("B", ["horiz"]),
        ]);
        let old = repo.insert(Glyph::new("A", ["dot"]));
        assert_eq!(old, Some(Glyph::new("A", ["vert"])));
        let ids: Vec<_> = repo
            .list_glyphs()
            .unwrap()
            .iter()
            .map(|g| g.id().to_string())
            .collect();
        assert_eq!(ids, vec!["A", "B"]);
        assert_eq!(
            repo.get_glyph("A").unwrap().unwrap().strokes().to_vec(),
            vec!["dot".to_string()]
        );
    }

    #[test]
    fn test_missing_file() {
        assert!(MemoryGlyphRepository::load_stroke_file("/nonexistent/strokes.txt").is_err());
    }
}
