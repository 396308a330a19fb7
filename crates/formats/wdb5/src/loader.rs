//! Backends that turn a file reference into bytes.
//!
//! Archive formats are out of scope here; a backend only has to produce the
//! raw bytes of a file given its path or numeric file-data id.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{Error, Result};
use crate::source::ChunkedBuffer;

/// Reference to a game file by path, numeric id, or both.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GameFile {
    path: String,
    file_data_id: Option<u32>,
}

impl GameFile {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            file_data_id: None,
        }
    }

    /// A file known only by its numeric id.
    pub fn from_id(file_data_id: u32) -> Self {
        Self {
            path: String::new(),
            file_data_id: Some(file_data_id),
        }
    }

    pub fn with_id(mut self, file_data_id: u32) -> Self {
        self.file_data_id = Some(file_data_id);
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn file_data_id(&self) -> Option<u32> {
        self.file_data_id
    }

    /// Name for error messages.
    fn display_name(&self) -> String {
        match (self.path.is_empty(), self.file_data_id) {
            (false, _) => self.path.clone(),
            (true, Some(id)) => format!("#{id}"),
            (true, None) => "<unnamed>".to_string(),
        }
    }
}

/// Produces the bytes of a game file.
pub trait FileLoader {
    fn load(&self, file: &GameFile) -> Result<Vec<u8>>;
}

/// Load `file` into a fresh [`ChunkedBuffer`].
pub fn open_source(loader: &impl FileLoader, file: &GameFile) -> Result<ChunkedBuffer> {
    let data = loader.load(file)?;
    debug!("loaded {} ({} bytes)", file.display_name(), data.len());
    let mut buffer = ChunkedBuffer::new();
    buffer.allocate(data.len()).copy_from_slice(&data);
    Ok(buffer)
}

/// Normalise a game path: backslashes become slashes, case is lowered.
fn normalize(path: &str) -> String {
    path.replace('\\', "/").to_ascii_lowercase()
}

/// Parse a listfile: one `id;path` pair per line. Blank lines and lines
/// without a numeric id are skipped.
pub fn parse_listfile(text: &str) -> HashMap<u32, String> {
    text.lines()
        .filter_map(|line| {
            let (id, path) = line.trim().split_once(';')?;
            Some((id.trim().parse().ok()?, path.trim().to_string()))
        })
        .collect()
}

/// Loose files extracted under a root directory.
#[derive(Debug, Clone)]
pub struct DirectoryLoader {
    root: PathBuf,
    listfile: HashMap<u32, String>,
}

impl DirectoryLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            listfile: HashMap::new(),
        }
    }

    /// Resolve file-data ids through `listfile` (id → game path).
    pub fn with_listfile(mut self, listfile: HashMap<u32, String>) -> Self {
        self.listfile = listfile;
        self
    }

    /// Read and parse a listfile from disk.
    pub fn load_listfile(self, path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(self.with_listfile(parse_listfile(&text)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, file: &GameFile) -> Option<PathBuf> {
        let path = if !file.path.is_empty() {
            file.path.as_str()
        } else {
            self.listfile.get(&file.file_data_id?)?.as_str()
        };
        Some(self.root.join(path.replace('\\', "/")))
    }
}

impl FileLoader for DirectoryLoader {
    fn load(&self, file: &GameFile) -> Result<Vec<u8>> {
        let path = self.resolve(file).ok_or_else(|| Error::FileNotFound {
            name: file.display_name(),
        })?;
        fs::read(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => Error::FileNotFound {
                name: file.display_name(),
            },
            _ => Error::Io(e),
        })
    }
}

/// Files held in memory, keyed by normalised path.
#[derive(Debug, Clone, Default)]
pub struct MemoryLoader {
    files: HashMap<String, Vec<u8>>,
    ids: HashMap<u32, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, file: &GameFile, data: Vec<u8>) {
        let key = normalize(&file.path);
        if let Some(id) = file.file_data_id {
            self.ids.insert(id, key.clone());
        }
        self.files.insert(key, data);
    }
}

impl FileLoader for MemoryLoader {
    fn load(&self, file: &GameFile) -> Result<Vec<u8>> {
        let key = if !file.path.is_empty() {
            Some(normalize(&file.path))
        } else {
            file.file_data_id.and_then(|id| self.ids.get(&id).cloned())
        };
        key.and_then(|k| self.files.get(&k).cloned())
            .ok_or_else(|| Error::FileNotFound {
                name: file.display_name(),
            })
    }
}
