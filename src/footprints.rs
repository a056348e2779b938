//! Footprint Sources
//!
//! The engine only needs the set of available footprint names and, for
//! dimension checks, each footprint's raw geometry text.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const FOOTPRINT_EXTENSION: &str = "kicad_mod";

/// Vendor prefix a `Footprint` field value carries when it points into the
/// managed footprint library.
pub const FOOTPRINT_PREFIX: &str = "7Sigma:";

pub trait FootprintSource {
    /// Names without extension.
    fn available(&self) -> &BTreeSet<String>;

    fn geometry_text(&self, name: &str) -> io::Result<String>;

    fn contains(&self, name: &str) -> bool {
        self.available().contains(name)
    }
}

/// `*.kicad_mod` files of one directory.
#[derive(Debug, Clone, Default)]
pub struct FootprintDirectory {
    dir: PathBuf,
    names: BTreeSet<String>,
}

impl FootprintDirectory {
    /// A missing directory yields an empty set.
    pub fn scan(dir: &Path) -> io::Result<Self> {
        let mut names = BTreeSet::new();
        if !dir.exists() {
            tracing::warn!(dir = %dir.display(), "footprints directory not found");
            return Ok(Self { dir: dir.to_path_buf(), names });
        }
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().map_or(false, |e| e == FOOTPRINT_EXTENSION) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.insert(stem.to_string());
                }
            }
        }
        Ok(Self { dir: dir.to_path_buf(), names })
    }
}

impl FootprintSource for FootprintDirectory {
    fn available(&self) -> &BTreeSet<String> {
        &self.names
    }

    fn geometry_text(&self, name: &str) -> io::Result<String> {
        fs::read_to_string(self.dir.join(format!("{}.{}", name, FOOTPRINT_EXTENSION)))
    }
}

/// Footprints held in memory, keyed by name.
#[derive(Debug, Clone, Default)]
pub struct InMemoryFootprints {
    texts: BTreeMap<String, String>,
    names: BTreeSet<String>,
}

impl InMemoryFootprints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, geometry: impl Into<String>) {
        let name = name.into();
        self.names.insert(name.clone());
        self.texts.insert(name, geometry.into());
    }

    pub fn with(mut self, name: impl Into<String>, geometry: impl Into<String>) -> Self {
        self.insert(name, geometry);
        self
    }
}

impl FootprintSource for InMemoryFootprints {
    fn available(&self) -> &BTreeSet<String> {
        &self.names
    }

    fn geometry_text(&self, name: &str) -> io::Result<String> {
        self.texts.get(name).cloned().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("footprint '{}' not loaded", name))
        })
    }
}
