//! Orchestration of the artifact lifecycle.
//!
//! [`ArtifactManager`] is called from an owner's own save and delete paths. On save it
//! compares the payload digest with the one recorded at the last generation and, when
//! they differ, encodes, brands and stores a fresh image before releasing the old one.
//! Nothing is committed to the artifact until the new image is stored, so a failed save
//! leaves both the record and the previously stored image intact.

use image::RgbImage;
use tracing::{debug, info, warn};

use crate::artifact::{ArtifactState, OwnerKind, PayloadDigest, QrOwner, UidIndex};
use crate::compositor::LogoCompositor;
use crate::config::QrConfig;
use crate::encoder::{to_bytes, Encoder};
use crate::error::{QrArtifactError, Result};
use crate::store::{ArtifactFormat, ArtifactStore, ImageRef};
use crate::uid::{UidAllocator, UidSource, UuidSource};

/// What a call to [`ArtifactManager::on_save`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Payload unchanged since the last generation; nothing was written.
    Unchanged,
    /// First image for this artifact.
    Generated(ImageRef),
    /// Payload changed; `previous` has been released.
    Regenerated { previous: ImageRef, current: ImageRef },
}

impl SaveOutcome {
    /// Reference written by this save, if any.
    pub fn image(&self) -> Option<&ImageRef> {
        match self {
            SaveOutcome::Unchanged => None,
            SaveOutcome::Generated(image) => Some(image),
            SaveOutcome::Regenerated { current, .. } => Some(current),
        }
    }

    pub fn is_unchanged(&self) -> bool {
        matches!(self, SaveOutcome::Unchanged)
    }
}

/// Drives generation, storage and release of QR artifacts for owner entities.
#[derive(Debug)]
pub struct ArtifactManager<S, G = UuidSource> {
    store: S,
    encoder: Encoder,
    compositor: Option<LogoCompositor>,
    allocator: UidAllocator<G>,
    format: ArtifactFormat,
}

impl<S: ArtifactStore> ArtifactManager<S, UuidSource> {
    pub fn new(config: &QrConfig, store: S) -> Result<Self> {
        Self::with_uid_source(config, store, UuidSource)
    }
}

impl<S: ArtifactStore, G: UidSource> ArtifactManager<S, G> {
    /// Builds a manager drawing uid candidates from `source`.
    pub fn with_uid_source(config: &QrConfig, store: S, source: G) -> Result<Self> {
        config.validate()?;
        let allocator = UidAllocator::with_source(source)
            .with_length(config.uid_length)
            .with_max_attempts(config.max_uid_attempts);
        Ok(Self {
            store,
            encoder: Encoder::new(config.encoder_options()?),
            compositor: config.compositor(),
            allocator,
            format: config.format,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn encoder(&self) -> &Encoder {
        &self.encoder
    }

    pub fn compositor(&self) -> Option<&LogoCompositor> {
        self.compositor.as_ref()
    }

    /// Default format for owners that do not override it.
    pub fn format(&self) -> ArtifactFormat {
        self.format
    }

    /// Storage key for an artifact: `{app}_{model}_{uid}.{ext}`.
    pub fn filename(kind: &OwnerKind, uid: &str, format: ArtifactFormat) -> String {
        format!("{}_{}_{}.{}", kind.app(), kind.model(), uid, format.extension())
    }

    /// Current state of the owner's artifact against its current payload.
    pub fn state<O: QrOwner + ?Sized>(&self, owner: &O) -> Result<ArtifactState> {
        let artifact = owner.qr_artifact();
        if artifact.is_released() {
            return Ok(ArtifactState::Deleted);
        }
        let digest = PayloadDigest::of(&owner.qr_payload()?);
        Ok(artifact.state_for(&digest))
    }

    /// Renders `payload` with the configured encoder and logo without storing it.
    pub fn render(&self, payload: &[u8]) -> Result<RgbImage> {
        let bitmap = self.encoder.encode(payload)?;
        Ok(match &self.compositor {
            Some(compositor) => compositor.apply(bitmap),
            None => bitmap,
        })
    }

    /// Save hook. Generates the image when the artifact is empty or stale.
    ///
    /// # Errors
    ///
    /// * [`QrArtifactError::NotImplemented`] when the owner has no payload accessor.
    /// * [`QrArtifactError::Released`] when the owner was already deleted.
    /// * [`QrArtifactError::CapacityExceeded`], [`QrArtifactError::AllocationExhausted`],
    ///   [`QrArtifactError::ImageEncoding`] or [`QrArtifactError::StorageFailure`] from
    ///   the pipeline. The artifact is left untouched in every case.
    pub fn on_save<O, I>(&self, owner: &mut O, index: &I) -> Result<SaveOutcome>
    where
        O: QrOwner + ?Sized,
        I: UidIndex + ?Sized,
    {
        let kind = owner.owner_kind();
        let payload = owner.qr_payload()?;
        let digest = PayloadDigest::of(&payload);

        let artifact = owner.qr_artifact();
        match artifact.state_for(&digest) {
            ArtifactState::Deleted => return Err(QrArtifactError::Released),
            ArtifactState::Generated => {
                debug!(owner = %kind, uid = artifact.uid(), "Payload unchanged, skipping generation");
                return Ok(SaveOutcome::Unchanged);
            }
            ArtifactState::Empty | ArtifactState::Stale => {}
        }

        let uid = match artifact.uid() {
            Some(uid) => uid.to_string(),
            None => self.allocator.allocate(|candidate| index.uid_exists(&kind, candidate))?,
        };
        let format = owner.qr_format().unwrap_or(self.format);
        let key = Self::filename(&kind, &uid, format);

        let bitmap = self.render(&payload)?;
        let bytes = to_bytes(&bitmap, format)?;
        let current = self.store.save(&key, &bytes, format)?;

        let previous = owner
            .qr_artifact_mut()
            .record_generation(payload, digest, uid, current.clone(), format);

        match previous {
            None => {
                info!(owner = %kind, key = current.key(), etag = current.etag(), "Generated QR artifact");
                Ok(SaveOutcome::Generated(current))
            }
            Some(previous) => {
                if previous != current {
                    if let Err(err) = self.store.delete(&previous) {
                        warn!(owner = %kind, image = %previous, error = %err, "Failed to release old image");
                    }
                }
                info!(
                    owner = %kind,
                    key = current.key(),
                    previous = %previous,
                    etag = current.etag(),
                    "Regenerated QR artifact"
                );
                Ok(SaveOutcome::Regenerated { previous, current })
            }
        }
    }

    /// Delete hook. Releases the stored image and marks the artifact deleted.
    ///
    /// Returns `true` when an image was released. Deleting twice is a no-op.
    pub fn on_delete<O: QrOwner + ?Sized>(&self, owner: &mut O) -> Result<bool> {
        let artifact = owner.qr_artifact();
        if artifact.is_released() {
            debug!(owner = %owner.owner_kind(), "Artifact already released");
            return Ok(false);
        }
        if let Some(image) = artifact.image() {
            self.store.delete(image)?;
        }
        let released = owner.qr_artifact_mut().release();
        if let Some(image) = &released {
            info!(owner = %owner.owner_kind(), image = %image, "Released QR artifact");
        }
        Ok(released.is_some())
    }

    /// Forgets the owner's uid so the next save allocates a new one and regenerates.
    ///
    /// The current image stays in place until that save replaces and releases it.
    pub fn reset_uid<O: QrOwner + ?Sized>(&self, owner: &mut O) {
        debug!(owner = %owner.owner_kind(), uid = owner.qr_artifact().uid(), "Resetting uid");
        owner.qr_artifact_mut().reset_uid();
    }
}
