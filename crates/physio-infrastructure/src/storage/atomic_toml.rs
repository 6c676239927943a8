//! Atomic TOML documents on disk.
//!
//! One document per file. Writers take an exclusive `fs2` lock on a sibling
//! `.lock` file, write a temporary file, fsync it and rename it over the
//! original, so readers always see either the old or the new document.

use physio_core::error::{PhysioError, Result};
use serde::{Serialize, de::DeserializeOwned};
use std::fs::{self, File, OpenOptions};
use std::io::Write as IoWrite;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

/// A handle to one TOML document.
pub struct AtomicTomlFile<T> {
    path: PathBuf,
    _phantom: PhantomData<fn() -> T>,
}

impl<T> Clone for AtomicTomlFile<T> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            _phantom: PhantomData,
        }
    }
}

impl<T> AtomicTomlFile<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _phantom: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the document.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(T))`: loaded and deserialized
    /// - `Ok(None)`: the file does not exist or is blank
    /// - `Err(_)`: the file could not be read or parsed
    pub fn load(&self) -> Result<Option<T>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(None);
        }
        let data: T = toml::from_str(&content).map_err(|e| {
            PhysioError::storage(format!("{}: {}", self.path.display(), e))
        })?;
        Ok(Some(data))
    }

    /// Replaces the document via temporary file + rename.
    pub fn save(&self, data: &T) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let toml_string = toml::to_string_pretty(data)?;

        let tmp_path = self.temp_path()?;
        let mut tmp_file = File::create(&tmp_path)?;
        tmp_file.write_all(toml_string.as_bytes())?;
        tmp_file.sync_all()?;
        drop(tmp_file);

        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    /// Read-modify-write under the file lock.
    ///
    /// A missing document starts from `T::default()`. If `f` fails nothing is
    /// written and its error is returned.
    pub fn update<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut T) -> Result<R>,
    {
        let _lock = FileLock::acquire(&self.path)?;
        let mut data = self.load()?.unwrap_or_default();
        let out = f(&mut data)?;
        self.save(&data)?;
        Ok(out)
    }

    fn temp_path(&self) -> Result<PathBuf> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| PhysioError::storage("document path has no parent directory"))?;
        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| PhysioError::storage("document path has no file name"))?;
        Ok(parent.join(format!(".{}.tmp", file_name.to_string_lossy())))
    }
}

impl<T> AtomicTomlFile<T>
where
    T: Serialize + DeserializeOwned + Default + Send + 'static,
{
    /// [`load`](Self::load) on the blocking pool, defaulting when absent.
    pub async fn read(&self) -> Result<T> {
        let file = self.clone();
        blocking(move || Ok(file.load()?.unwrap_or_default())).await
    }

    /// [`update`](Self::update) on the blocking pool.
    pub async fn modify<R, F>(&self, f: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut T) -> Result<R> + Send + 'static,
    {
        let file = self.clone();
        blocking(move || file.update(f)).await
    }
}

async fn blocking<R, F>(f: F) -> Result<R>
where
    R: Send + 'static,
    F: FnOnce() -> Result<R> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| PhysioError::storage(format!("storage task failed: {}", e)))?
}

/// Exclusive lock on `<document>.lock`, released when dropped.
///
/// The lock file itself is left in place; deleting it would let a second
/// writer lock a fresh inode while the first still holds the old one.
struct FileLock {
    file: File,
}

impl FileLock {
    fn acquire(path: &Path) -> Result<Self> {
        let lock_path = path.with_extension("lock");
        if let Some(parent) = lock_path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;
        fs2::FileExt::lock_exclusive(&file).map_err(|e| PhysioError::LockTimeout {
            scope: format!("{} ({})", lock_path.display(), e),
        })?;
        Ok(FileLock { file })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
    }
}
