//! Deck export and artifact retrieval.
//!
//! [`ArtifactStore`] owns the export directory. Every export writes a fresh
//! randomly named `.pptx`; download lookups go through [`ArtifactStore::resolve`]
//! so client-supplied filenames can never reach outside the directory.

mod pptx;

pub use pptx::write_pptx;

use crate::error::{DeckError, Result};
use crate::model::Slide;
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

/// Handle to one exported deck file.
#[derive(Debug, Clone)]
pub struct Artifact {
    /// Bare filename, the public identifier used in download URLs.
    pub filename: String,
    /// Full path on disk.
    pub path: PathBuf,
}

/// Export directory with collision-proof artifact naming.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Open a store rooted at `dir`, creating the directory if absent.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Write a deck to a fresh `.pptx` file and return its handle.
    pub fn export_deck(&self, slides: &[Slide]) -> Result<Artifact> {
        let (filename, file) = self.create_fresh()?;
        let path = self.dir.join(&filename);

        if let Err(err) = pptx::write_pptx(file, slides) {
            return Err(self.discard_partial(&path, err));
        }

        info!(filename = %filename, slides = slides.len(), "deck exported");
        Ok(Artifact { filename, path })
    }

    /// Allocate a random artifact name, retrying on the (unlikely)
    /// collision. `create_new` makes the no-overwrite guarantee hard: a
    /// name that already exists fails the open instead of truncating.
    fn create_fresh(&self) -> Result<(String, File)> {
        for _ in 0..16 {
            let filename = format!("deck_{}.pptx", Uuid::new_v4().simple());
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(self.dir.join(&filename))
            {
                Ok(file) => return Ok((filename, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(DeckError::Io(e)),
            }
        }
        Err(DeckError::Other(
            "could not allocate a fresh artifact name".into(),
        ))
    }

    /// Remove a half-written artifact so a failed export leaves nothing
    /// behind, then hand back the error that stopped the write.
    fn discard_partial(&self, path: &Path, err: DeckError) -> DeckError {
        let _ = fs::remove_file(path);
        err
    }

    /// Resolve a client-supplied filename to a path inside the store.
    ///
    /// Separators, parent references, and non-`.pptx` names are rejected
    /// before touching the filesystem; missing files surface as
    /// [`DeckError::ArtifactNotFound`].
    pub fn resolve(&self, filename: &str) -> Result<PathBuf> {
        if !is_artifact_name(filename) {
            return Err(DeckError::ArtifactNotFound(filename.to_string()));
        }
        let path = self.dir.join(filename);
        if !path.is_file() {
            return Err(DeckError::ArtifactNotFound(filename.to_string()));
        }
        Ok(path)
    }

    /// Root directory of the store.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn is_artifact_name(filename: &str) -> bool {
    !filename.contains('/')
        && !filename.contains('\\')
        && !filename.contains("..")
        && filename.ends_with(".pptx")
}
