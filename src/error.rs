use std::path::PathBuf;

use thiserror::Error;

use crate::qrcode::EcLevel;

/// Errors raised by an [`ArtifactStore`](crate::store::ArtifactStore) backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem error while reading, writing or removing an object
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Key is empty or would escape the store namespace
    #[error("Invalid storage key: {0:?}")]
    InvalidKey(String),

    /// Backend-specific failure (remote stores, poisoned locks, ...)
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Errors surfaced by the artifact pipeline.
#[derive(Debug, Error)]
pub enum QrArtifactError {
    /// Payload does not fit the chosen version and error correction level
    #[error(
        "Payload needs {required_bits} bits, version {version} at level {ec} holds {capacity_bits} bits"
    )]
    CapacityExceeded {
        required_bits: usize,
        capacity_bits: usize,
        version: u8,
        ec: EcLevel,
    },

    /// Every uid candidate collided within the retry budget
    #[error("Uid allocation exhausted after {attempts} attempts")]
    AllocationExhausted { attempts: u32 },

    /// Logo could not be loaded or pasted. Recovered inside the compositor.
    #[error("Logo composite failed: {0}")]
    LogoCompositeFailed(String),

    /// The owner kind never supplied a payload accessor
    #[error("{owner} must implement qr_payload()")]
    NotImplemented { owner: String },

    /// Propagated from the artifact store
    #[error("Storage failure: {0}")]
    StorageFailure(#[from] StorageError),

    /// Bitmap could not be serialised to the requested format
    #[error("Image encoding failed: {0}")]
    ImageEncoding(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Version number outside 1..=40
    #[error("Invalid QR version: {0} (expected 1-40)")]
    InvalidVersion(u8),

    /// The artifact was released by an owner delete
    #[error("Artifact has been released")]
    Released,
}

pub type Result<T, E = QrArtifactError> = std::result::Result<T, E>;
