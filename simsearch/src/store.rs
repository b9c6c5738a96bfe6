//! Keyed persistence of glyph models.
use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use hashbrown::HashMap;
use tempfile::NamedTempFile;

use crate::errors::StoreError;
use crate::model::GlyphModel;

/// Keyed store of glyph models. Writes replace any prior model of the same glyph.
pub trait ModelStore: Send + Sync {
    /// Stores a model under its glyph identifier.
    fn put_model(&self, model: &GlyphModel) -> Result<(), StoreError>;

    /// Gets the model of a glyph, if any.
    fn get_model(&self, glyph: &str) -> Result<Option<GlyphModel>, StoreError>;
}

/// A store held in memory.
#[derive(Debug, Default)]
pub struct MemoryModelStore {
    models: RwLock<HashMap<String, GlyphModel>>,
    num_writes: AtomicUsize,
}

impl MemoryModelStore {
    /// Creates an empty instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the number of stored models.
    pub fn len(&self) -> usize {
        self.models.read().map_or(0, |m| m.len())
    }

    /// Checks if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Gets the number of successful writes so far.
    pub fn num_writes(&self) -> usize {
        self.num_writes.load(Ordering::Relaxed)
    }

    /// Gets all the models, sorted by glyph identifier.
    pub fn models(&self) -> Vec<GlyphModel> {
        let mut models: Vec<_> = self
            .models
            .read()
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default();
        models.sort_by(|a, b| a.glyph().cmp(b.glyph()));
        models
    }
}

impl ModelStore for MemoryModelStore {
    fn put_model(&self, model: &GlyphModel) -> Result<(), StoreError> {
        let mut models = self
            .models
            .write()
            .map_err(|_| StoreError::new("the in-memory store is poisoned"))?;
        models.insert(model.glyph().to_string(), model.clone());
        self.num_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn get_model(&self, glyph: &str) -> Result<Option<GlyphModel>, StoreError> {
        let models = self
            .models
            .read()
            .map_err(|_| StoreError::new("the in-memory store is poisoned"))?;
        Ok(models.get(glyph).cloned())
    }
}

/// A store keeping one JSON document per glyph in a directory.
///
/// Documents are named after the hexadecimal UTF-8 bytes of the glyph identifier,
/// and are replaced atomically.
#[derive(Clone, Debug)]
pub struct DirModelStore {
    dir: PathBuf,
}

impl DirModelStore {
    /// Opens the directory, creating it if needed.
    pub fn open<P>(dir: P) -> Result<Self, StoreError>
    where
        P: AsRef<Path>,
    {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .map_err(|e| StoreError::new(format!("{}: {e}", dir.display())))?;
        Ok(Self { dir })
    }

    /// Gets the directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn document_path(&self, glyph: &str) -> PathBuf {
        let mut name = String::with_capacity(glyph.len() * 2 + 5);
        for b in glyph.bytes() {
            let _ = write!(name, "{b:02x}");
        }
        name.push_str(".json");
        self.dir.join(name)
    }
}

impl ModelStore for DirModelStore {
    fn put_model(&self, model: &GlyphModel) -> Result<(), StoreError> {
        let path = self.document_path(model.glyph());
        let error = |e: &dyn std::fmt::Display| StoreError::new(format!("{}: {e}", path.display()));

        let temp_file = NamedTempFile::new_in(&self.dir).map_err(|e| error(&e))?;
        {
            let mut writer = BufWriter::new(&temp_file);
            serde_json::to_writer(&mut writer, model).map_err(|e| error(&e))?;
            writer.write_all(b"\n").map_err(|e| error(&e))?;
            writer.flush().map_err(|e| error(&e))?;
        }
        temp_file.persist(&path).map_err(|e| error(&e))?;
        Ok(())
    }

    fn get_model(&self, glyph: &str) -> Result<Option<GlyphModel>, StoreError> {
        let path = self.document_path(glyph);
        let error = |e: &dyn std::fmt::Display| StoreError::new(format!("{}: {e}", path.display()));

        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(error(&e)),
        };
        let model: GlyphModel =
            serde_json::from_reader(BufReader::new(file)).map_err(|e| error(&e))?;
        if model.glyph() != glyph {
            return Err(error(&format!("holds the model of {:?}", model.glyph())));
        }
        model.validate().map_err(|e| error(&e))?;
        Ok(Some(model))
    }
}
