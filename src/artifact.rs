//! The artifact record and the owner-side contracts.
//!
//! An owner entity holds a [`QrArtifact`] by value and exposes it through [`QrOwner`]. The
//! manager reads the owner's payload, compares its digest with the one captured when the
//! image was last written and drives the artifact through its states:
//!
//! ```text
//! Empty ──save──▶ Generated ──payload changes──▶ Stale ──save──▶ Generated
//!   │                 │                             │
//!   └────────────── delete ─────────────────────────┴──────────▶ Deleted
//! ```

use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::{QrArtifactError, Result};
use crate::store::{ArtifactFormat, ImageRef};

/// SHA-256 digest of a payload, used for change detection.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PayloadDigest([u8; 32]);

impl PayloadDigest {
    pub fn of(payload: &[u8]) -> Self {
        Self(Sha256::digest(payload).into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for PayloadDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for PayloadDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PayloadDigest({})", self.to_hex())
    }
}

impl Serialize for PayloadDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PayloadDigest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        let bytes = hex::decode(&text).map_err(D::Error::custom)?;
        let digest: [u8; 32] = bytes
            .try_into()
            .map_err(|_| D::Error::custom("payload digest must be 32 bytes"))?;
        Ok(Self(digest))
    }
}

/// Lifecycle state of an artifact relative to its owner's current payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactState {
    /// Never generated.
    Empty,
    /// Image matches the current payload.
    Generated,
    /// Image encodes an older payload.
    Stale,
    /// Released by an owner delete.
    Deleted,
}

/// Kind of the entity owning an artifact, e.g. `shop.product`.
///
/// Part of every storage key, so equal uids held by different kinds never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OwnerKind {
    app: String,
    model: String,
}

impl OwnerKind {
    pub fn new(app: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            model: model.into(),
        }
    }

    pub fn app(&self) -> &str {
        &self.app
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl fmt::Display for OwnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.app, self.model)
    }
}

/// QR image state attached to one owner entity.
///
/// Persist it alongside the owner (it is `Serialize`/`Deserialize`); the manager is the
/// only writer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QrArtifact {
    #[serde(default)]
    payload: Vec<u8>,
    #[serde(default)]
    uid: Option<String>,
    #[serde(default)]
    image: Option<ImageRef>,
    #[serde(default)]
    format: ArtifactFormat,
    #[serde(default)]
    last_payload_hash: Option<PayloadDigest>,
    #[serde(default)]
    released: bool,
}

impl QrArtifact {
    pub fn new() -> Self {
        Self::default()
    }

    /// Payload encoded by the current image.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn uid(&self) -> Option<&str> {
        self.uid.as_deref()
    }

    pub fn image(&self) -> Option<&ImageRef> {
        self.image.as_ref()
    }

    pub fn format(&self) -> ArtifactFormat {
        self.format
    }

    pub fn last_payload_hash(&self) -> Option<PayloadDigest> {
        self.last_payload_hash
    }

    pub fn is_generated(&self) -> bool {
        self.image.is_some()
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// State of this artifact for an owner whose payload digests to `current`.
    pub fn state_for(&self, current: &PayloadDigest) -> ArtifactState {
        if self.released {
            return ArtifactState::Deleted;
        }
        match (&self.image, &self.last_payload_hash) {
            (None, _) => ArtifactState::Empty,
            (Some(_), Some(last)) if last == current => ArtifactState::Generated,
            (Some(_), _) => ArtifactState::Stale,
        }
    }

    /// Records a freshly stored image and returns the reference it replaces.
    pub(crate) fn record_generation(
        &mut self,
        payload: Vec<u8>,
        digest: PayloadDigest,
        uid: String,
        image: ImageRef,
        format: ArtifactFormat,
    ) -> Option<ImageRef> {
        self.payload = payload;
        self.last_payload_hash = Some(digest);
        self.uid = Some(uid);
        self.format = format;
        self.image.replace(image)
    }

    /// Drops the uid and digest so the next save allocates a new uid and regenerates.
    pub(crate) fn reset_uid(&mut self) {
        self.uid = None;
        self.last_payload_hash = None;
    }

    pub(crate) fn release(&mut self) -> Option<ImageRef> {
        self.released = true;
        self.image.take()
    }
}

/// An entity that owns a QR artifact.
///
/// Owners supply the payload and hand the manager their artifact from their own save and
/// delete paths.
pub trait QrOwner {
    fn owner_kind(&self) -> OwnerKind;

    /// Bytes to encode. Every owner kind must override this.
    fn qr_payload(&self) -> Result<Vec<u8>> {
        Err(QrArtifactError::NotImplemented {
            owner: self.owner_kind().to_string(),
        })
    }

    /// Format override for this owner kind; `None` uses the configured format.
    fn qr_format(&self) -> Option<ArtifactFormat> {
        None
    }

    fn qr_artifact(&self) -> &QrArtifact;

    fn qr_artifact_mut(&mut self) -> &mut QrArtifact;
}

/// Existence check over the uids already held by artifacts of a kind.
pub trait UidIndex {
    fn uid_exists(&self, kind: &OwnerKind, uid: &str) -> bool;
}

impl<F> UidIndex for F
where
    F: Fn(&OwnerKind, &str) -> bool,
{
    fn uid_exists(&self, kind: &OwnerKind, uid: &str) -> bool {
        self(kind, uid)
    }
}
