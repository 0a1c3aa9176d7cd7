// SPDX-License-Identifier: MIT
// Copyright (c) 2026 StarTuz

//! Where airport layout (`apt.dat`) text comes from.
//!
//! A [`LayoutSource`] lists the layout files to read, in priority order, and
//! opens them one at a time. Not-found is reported separately from other I/O
//! failures as scanners skip missing files silently.

use directories::BaseDirs;
use log::debug;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Cursor};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const SCENERY_PACKS_INI: &str = "Custom Scenery/scenery_packs.ini";
pub const DEFAULT_APT_DAT_DIR: &str = "Resources/default scenery/default apt dat";
/// Location of the layout file inside a scenery pack
pub const APT_DAT_IN_PACK: &str = "Earth nav data/apt.dat";
const SCENERY_LN_BEGIN: &str = "SCENERY_PACK ";
const GLOBAL_AIRPORTS_TAG: &str = "*GLOBAL_AIRPORTS*";
const GLOBAL_AIRPORTS_DIR: &str = "Global Scenery/Global Airports";

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Layout file not found: {0}")]
    NotFound(String),
    #[error("Could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: io::Error,
    },
}

impl SourceError {
    fn from_io(path: &str, source: io::Error) -> Self {
        if source.kind() == io::ErrorKind::NotFound {
            SourceError::NotFound(path.to_string())
        } else {
            SourceError::Io {
                path: path.to_string(),
                source,
            }
        }
    }
}

pub type LayoutReader = Box<dyn BufRead + Send>;

pub trait LayoutSource: Send + Sync {
    /// Logical paths of all layout files, highest priority first.
    fn layout_paths(&self) -> Vec<String>;

    fn open(&self, path: &str) -> Result<LayoutReader, SourceError>;
}

/// Layout files of an X-Plane installation.
///
/// Follows the scenery load order of `scenery_packs.ini`, then the default
/// `apt.dat` shipped in `Resources`.
#[derive(Debug, Clone)]
pub struct XPlaneSource {
    root: PathBuf,
}

impl XPlaneSource {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Locates an X-Plane 12 or 11 installation through the sim's install marker files.
    pub fn try_find_root() -> Option<PathBuf> {
        let dirs = BaseDirs::new()?;
        let marker_dirs = if cfg!(windows) {
            vec![dirs.data_local_dir().to_path_buf()]
        } else {
            vec![dirs.home_dir().join(".x-plane"), dirs.preference_dir().to_path_buf()]
        };
        find_root_in(&marker_dirs)
    }

    /// Resolves one `scenery_packs.ini` entry to its pack directory.
    fn pack_dir(&self, entry: &str) -> PathBuf {
        let entry = entry.trim();
        if entry == GLOBAL_AIRPORTS_TAG {
            return self.root.join(GLOBAL_AIRPORTS_DIR);
        }
        let normalized = entry.replace('\\', "/");
        let pack = Path::new(normalized.trim_end_matches('/'));
        if pack.is_absolute() {
            pack.to_path_buf()
        } else {
            self.root.join(pack)
        }
    }
}

/// First installation listed in a marker file below `marker_dirs` that ships
/// the default `apt.dat` directory. Newer sim versions are preferred per directory.
pub fn find_root_in(marker_dirs: &[PathBuf]) -> Option<PathBuf> {
    const MARKERS: [&str; 2] = ["x-plane_install_12.txt", "x-plane_install_11.txt"];
    for marker in marker_dirs
        .iter()
        .flat_map(|dir| MARKERS.iter().map(move |m| dir.join(m)))
    {
        let Ok(content) = fs::read(&marker) else {
            continue;
        };
        let content = String::from_utf8_lossy(&content);
        let found = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(PathBuf::from)
            .find(|root| root.join(DEFAULT_APT_DAT_DIR).is_dir());
        if let Some(root) = found {
            debug!("X-Plane installation {} listed in {}", root.display(), marker.display());
            return Some(root);
        }
    }
    None
}

impl LayoutSource for XPlaneSource {
    fn layout_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();

        // a missing scenery_packs.ini just leaves the default apt.dat
        if let Ok(content) = fs::read(self.root.join(SCENERY_PACKS_INI)) {
            let content = String::from_utf8_lossy(&content);
            for line in content.lines() {
                // also skips SCENERY_PACK_DISABLED
                let Some(entry) = line.strip_prefix(SCENERY_LN_BEGIN) else {
                    continue;
                };
                if entry.trim().is_empty() {
                    continue;
                }
                let apt_dat = self.pack_dir(entry).join(APT_DAT_IN_PACK);
                paths.push(apt_dat.to_string_lossy().into_owned());
            }
        }

        let default = self.root.join(DEFAULT_APT_DAT_DIR).join(APT_DAT_IN_PACK);
        paths.push(default.to_string_lossy().into_owned());
        paths
    }

    fn open(&self, path: &str) -> Result<LayoutReader, SourceError> {
        let file = File::open(path).map_err(|e| SourceError::from_io(path, e))?;
        Ok(Box::new(BufReader::new(file)))
    }
}

#[derive(Debug, Clone)]
enum MemoryEntry {
    Text(String),
    Missing,
    Broken,
}

/// In-memory layout files, read in insertion order.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: Vec<(String, MemoryEntry)>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.files
            .push((path.into(), MemoryEntry::Text(content.into())));
        self
    }

    /// Lists a path that cannot be found when opened.
    pub fn with_missing(mut self, path: impl Into<String>) -> Self {
        self.files.push((path.into(), MemoryEntry::Missing));
        self
    }

    /// Lists a path whose opening fails with an I/O error other than not-found.
    pub fn with_broken(mut self, path: impl Into<String>) -> Self {
        self.files.push((path.into(), MemoryEntry::Broken));
        self
    }
}

impl LayoutSource for MemorySource {
    fn layout_paths(&self) -> Vec<String> {
        self.files.iter().map(|(p, _)| p.clone()).collect()
    }

    fn open(&self, path: &str) -> Result<LayoutReader, SourceError> {
        match self.files.iter().find(|(p, _)| p == path).map(|(_, e)| e) {
            Some(MemoryEntry::Text(content)) => {
                Ok(Box::new(Cursor::new(content.clone().into_bytes())))
            }
            Some(MemoryEntry::Broken) => Err(SourceError::Io {
                path: path.to_string(),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"),
            }),
            Some(MemoryEntry::Missing) | None => Err(SourceError::NotFound(path.to_string())),
        }
    }
}
