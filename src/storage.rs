use std::fs;
use std::io;
use std::path::PathBuf;
#[cfg(test)]
use std::collections::HashMap;
#[cfg(test)]
use std::sync::{Arc, Mutex};

pub const WORK_DATA_KEY: &str = "workData";
pub const MARKERS_KEY: &str = "mapMarkers";

/// Key-value store holding whole serialized blobs. A write replaces the blob.
pub trait BlobStore: Send + Sync {
    fn read(&self, key: &str) -> io::Result<Option<String>>;
    fn write(&self, key: &str, blob: &str) -> io::Result<()>;
}

/// One `<key>.json` file per key under a data directory.
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    dir: PathBuf,
}

impl FileBlobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileBlobStore { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl BlobStore for FileBlobStore {
    fn read(&self, key: &str) -> io::Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&self, key: &str, blob: &str) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let target = self.path_for(key);
        let staging = self.dir.join(format!(".{}.json.tmp", key));
        fs::write(&staging, blob)?;
        // rename replaces the target in one step, so readers never see half a blob
        fs::rename(&staging, &target).inspect_err(|_| {
            fs::remove_file(&staging).ok();
        })
    }
}

#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    blobs: Arc<Mutex<HashMap<String, String>>>,
}

#[cfg(test)]
impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl BlobStore for MemoryBlobStore {
    fn read(&self, key: &str) -> io::Result<Option<String>> {
        let blobs = self.blobs.lock().map_err(|_| io::Error::other("memory store poisoned"))?;
        Ok(blobs.get(key).cloned())
    }

    fn write(&self, key: &str, blob: &str) -> io::Result<()> {
        let mut blobs = self.blobs.lock().map_err(|_| io::Error::other("memory store poisoned"))?;
        blobs.insert(key.to_string(), blob.to_string());
        Ok(())
    }
}
