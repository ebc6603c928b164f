//! Persistence of generated images.
//!
//! Objects are addressed by a key (`{kind}_{model}_{uid}.{ext}` when written by the
//! [`ArtifactManager`](crate::manager::ArtifactManager)). Saving a key again replaces its
//! content. Every save returns an [`ImageRef`] carrying the key plus an etag of the stored
//! bytes, and deleting a reference only removes the object while it still holds that
//! content, so deleting a replaced or already removed reference is a no-op.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;
use uuid::Uuid;

use crate::error::StorageError;

/// Default directory (or key prefix) images are stored under.
pub const DEFAULT_NAMESPACE: &str = "qrcode";

/// Hex characters of the SHA-256 digest kept in an etag.
const ETAG_LEN: usize = 16;

/// Image encoding of a stored artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactFormat {
    #[default]
    Png,
    Jpeg,
    Bmp,
}

impl ArtifactFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ArtifactFormat::Png => "png",
            ArtifactFormat::Jpeg => "jpg",
            ArtifactFormat::Bmp => "bmp",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ArtifactFormat::Png => "image/png",
            ArtifactFormat::Jpeg => "image/jpeg",
            ArtifactFormat::Bmp => "image/bmp",
        }
    }

    pub fn image_format(self) -> image::ImageFormat {
        match self {
            ArtifactFormat::Png => image::ImageFormat::Png,
            ArtifactFormat::Jpeg => image::ImageFormat::Jpeg,
            ArtifactFormat::Bmp => image::ImageFormat::Bmp,
        }
    }
}

impl fmt::Display for ArtifactFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Handle to one stored version of an image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageRef {
    key: String,
    etag: String,
}

impl ImageRef {
    pub fn new(key: impl Into<String>, etag: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            etag: etag.into(),
        }
    }

    /// Reference for `bytes` stored under `key`.
    pub fn for_bytes(key: impl Into<String>, bytes: &[u8]) -> Self {
        Self::new(key, etag_of(bytes))
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn etag(&self) -> &str {
        &self.etag
    }

    fn matches(&self, bytes: &[u8]) -> bool {
        self.etag == etag_of(bytes)
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.key, self.etag)
    }
}

/// Short content digest identifying a stored version.
pub fn etag_of(bytes: &[u8]) -> String {
    let mut etag = hex::encode(Sha256::digest(bytes));
    etag.truncate(ETAG_LEN);
    etag
}

/// Storage backend for generated images.
///
/// Implementations must make `save` replace any previous object under the same key, and
/// `delete` tolerate references whose object is absent or was replaced since.
pub trait ArtifactStore {
    /// Writes `bytes` under `key`, replacing any previous content.
    fn save(&self, key: &str, bytes: &[u8], format: ArtifactFormat) -> Result<ImageRef, StorageError>;

    /// Releases the object behind `image` if it still holds that version.
    fn delete(&self, image: &ImageRef) -> Result<(), StorageError>;

    /// Bytes of `image`, or `None` once that version is gone.
    fn load(&self, image: &ImageRef) -> Result<Option<Vec<u8>>, StorageError>;

    fn contains(&self, image: &ImageRef) -> Result<bool, StorageError> {
        Ok(self.load(image)?.is_some())
    }
}

impl<S: ArtifactStore + ?Sized> ArtifactStore for &S {
    fn save(&self, key: &str, bytes: &[u8], format: ArtifactFormat) -> Result<ImageRef, StorageError> {
        (**self).save(key, bytes, format)
    }

    fn delete(&self, image: &ImageRef) -> Result<(), StorageError> {
        (**self).delete(image)
    }

    fn load(&self, image: &ImageRef) -> Result<Option<Vec<u8>>, StorageError> {
        (**self).load(image)
    }
}

impl<S: ArtifactStore + ?Sized> ArtifactStore for Arc<S> {
    fn save(&self, key: &str, bytes: &[u8], format: ArtifactFormat) -> Result<ImageRef, StorageError> {
        (**self).save(key, bytes, format)
    }

    fn delete(&self, image: &ImageRef) -> Result<(), StorageError> {
        (**self).delete(image)
    }

    fn load(&self, image: &ImageRef) -> Result<Option<Vec<u8>>, StorageError> {
        (**self).load(image)
    }
}

/// Rejects keys that are empty or could leave the namespace.
pub(crate) fn validate_key(key: &str) -> Result<(), StorageError> {
    let escapes = key.contains('/') || key.contains('\\') || key.starts_with('.');
    if key.is_empty() || escapes {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    Ok(())
}

// =============================================================================
// Filesystem store
// =============================================================================

/// Stores images as files under `{base}/{namespace}/`.
///
/// Writes go to a hidden temporary file that is then renamed over the final name, so a
/// reader never observes a partially written image and a failed write leaves the
/// previous file intact.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    dir: PathBuf,
}

impl FsArtifactStore {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self::with_namespace(base, DEFAULT_NAMESPACE)
    }

    pub fn with_namespace(base: impl Into<PathBuf>, namespace: &str) -> Self {
        Self {
            dir: base.into().join(namespace),
        }
    }

    /// Directory holding the images.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File path for `image`. Does not validate the key; `load` and `delete` do.
    pub fn path_of(&self, image: &ImageRef) -> PathBuf {
        self.dir.join(image.key())
    }

    fn read(&self, path: &Path) -> Result<Option<Vec<u8>>, StorageError> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

impl ArtifactStore for FsArtifactStore {
    fn save(&self, key: &str, bytes: &[u8], format: ArtifactFormat) -> Result<ImageRef, StorageError> {
        validate_key(key)?;
        fs::create_dir_all(&self.dir).map_err(|source| StorageError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let target = self.dir.join(key);
        let staging = self.dir.join(format!(".{}.{}.tmp", key, Uuid::new_v4().simple()));
        fs::write(&staging, bytes).map_err(|source| StorageError::Io {
            path: staging.clone(),
            source,
        })?;
        if let Err(source) = fs::rename(&staging, &target) {
            let _ = fs::remove_file(&staging);
            return Err(StorageError::Io { path: target, source });
        }

        let image = ImageRef::for_bytes(key, bytes);
        debug!(key, etag = image.etag(), %format, size = bytes.len(), "Stored image");
        Ok(image)
    }

    fn delete(&self, image: &ImageRef) -> Result<(), StorageError> {
        validate_key(image.key())?;
        let path = self.path_of(image);
        match self.read(&path)? {
            None => {
                debug!(image = %image, "Image already absent");
                Ok(())
            }
            Some(bytes) if !image.matches(&bytes) => {
                debug!(image = %image, "Image was replaced, nothing to release");
                Ok(())
            }
            Some(_) => match fs::remove_file(&path) {
                Ok(()) => {
                    debug!(image = %image, "Deleted image");
                    Ok(())
                }
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
                Err(source) => Err(StorageError::Io { path, source }),
            },
        }
    }

    fn load(&self, image: &ImageRef) -> Result<Option<Vec<u8>>, StorageError> {
        validate_key(image.key())?;
        Ok(self.read(&self.path_of(image))?.filter(|bytes| image.matches(bytes)))
    }
}

// =============================================================================
// In-memory store
// =============================================================================

/// Keeps images in a process-local map. Useful for tests and previews.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
    writes: AtomicUsize,
}

impl MemoryArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `save` calls so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    /// Number of objects currently held.
    pub fn len(&self) -> usize {
        self.objects().map(|objects| objects.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects()
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    fn objects(&self) -> Result<MutexGuard<'_, HashMap<String, Vec<u8>>>, StorageError> {
        self.objects
            .lock()
            .map_err(|_| StorageError::Backend("memory store lock poisoned".to_string()))
    }
}

impl ArtifactStore for MemoryArtifactStore {
    fn save(&self, key: &str, bytes: &[u8], format: ArtifactFormat) -> Result<ImageRef, StorageError> {
        validate_key(key)?;
        self.objects()?.insert(key.to_string(), bytes.to_vec());
        self.writes.fetch_add(1, Ordering::Relaxed);
        let image = ImageRef::for_bytes(key, bytes);
        debug!(key, etag = image.etag(), %format, "Stored image in memory");
        Ok(image)
    }

    fn delete(&self, image: &ImageRef) -> Result<(), StorageError> {
        validate_key(image.key())?;
        let mut objects = self.objects()?;
        if objects.get(image.key()).is_some_and(|bytes| image.matches(bytes)) {
            objects.remove(image.key());
            debug!(image = %image, "Deleted image from memory");
        }
        Ok(())
    }

    fn load(&self, image: &ImageRef) -> Result<Option<Vec<u8>>, StorageError> {
        validate_key(image.key())?;
        Ok(self
            .objects()?
            .get(image.key())
            .filter(|bytes| image.matches(bytes))
            .cloned())
    }
}
