//! # qrartifact
//!
//! Attach QR-code images to your own entities and keep them in sync with the data they encode.
//!
//! An owner entity holds a [`QrArtifact`] and implements [`QrOwner`]. From its save path it
//! calls [`ArtifactManager::on_save`], which regenerates the image only when the payload
//! digest changed since the last generation, and from its delete path
//! [`ArtifactManager::on_delete`], which releases the stored image. Images are stored
//! through the [`ArtifactStore`] trait under `{app}_{model}_{uid}.{ext}`.
//!
//! ## Features
//!
//! - QR Model 2 encoding (versions 1 to 40, levels L/M/Q/H) with numeric, alphanumeric and
//!   byte segments and automatic mask selection.
//! - Optional logo compositing, centred and alpha-aware, that never fails generation.
//! - Short collision-checked uids with a bounded retry budget.
//! - Change detection by SHA-256 digest: unchanged saves write nothing.
//! - Generate-then-swap regeneration: the old image is released only after the new one
//!   is stored.
//! - Generic linked QR codes attached to any `(kind, id)` pair, with cascade delete.
//! - TOML configuration with defaults for every option.
//!
//! ## Example
//!
//! ```rust
//! use qrartifact::{
//!     ArtifactManager, ArtifactState, MemoryArtifactStore, OwnerKind, QrArtifact, QrConfig,
//!     QrOwner, Result, SaveOutcome,
//! };
//!
//! struct Product {
//!     sku: String,
//!     qr: QrArtifact,
//! }
//!
//! impl QrOwner for Product {
//!     fn owner_kind(&self) -> OwnerKind {
//!         OwnerKind::new("shop", "product")
//!     }
//!
//!     fn qr_payload(&self) -> Result<Vec<u8>> {
//!         Ok(self.sku.as_bytes().to_vec())
//!     }
//!
//!     fn qr_artifact(&self) -> &QrArtifact {
//!         &self.qr
//!     }
//!
//!     fn qr_artifact_mut(&mut self) -> &mut QrArtifact {
//!         &mut self.qr
//!     }
//! }
//!
//! let manager = ArtifactManager::new(&QrConfig::default(), MemoryArtifactStore::new()).unwrap();
//! let no_uids = |_: &OwnerKind, _: &str| false;
//!
//! let mut product = Product { sku: "ABC123".into(), qr: QrArtifact::new() };
//! assert!(matches!(manager.on_save(&mut product, &no_uids).unwrap(), SaveOutcome::Generated(_)));
//! assert_eq!(manager.state(&product).unwrap(), ArtifactState::Generated);
//!
//! product.sku = "XYZ999".into();
//! assert!(matches!(manager.on_save(&mut product, &no_uids).unwrap(), SaveOutcome::Regenerated { .. }));
//!
//! assert!(manager.on_delete(&mut product).unwrap());
//! assert!(manager.store().is_empty());
//! ```
//!
//! ## Modules
//!
//! - [`qrcode`]: QR symbol construction.
//! - [`encoder`]: Rasterising symbols and serialising bitmaps.
//! - [`compositor`]: Logo overlay.
//! - [`uid`]: Short identifier allocation.
//! - [`store`]: Storage backends.
//! - [`artifact`]: The artifact record and owner contracts.
//! - [`manager`]: Lifecycle orchestration.
//! - [`linked`]: QR codes linked to arbitrary entities.
//! - [`config`]: TOML configuration.

#![forbid(unsafe_code)]

pub mod artifact;
pub mod compositor;
pub mod config;
pub mod encoder;
pub mod error;
pub mod linked;
pub mod manager;
pub mod qrcode;
pub mod store;
pub mod uid;

pub use artifact::{ArtifactState, OwnerKind, PayloadDigest, QrArtifact, QrOwner, UidIndex};
pub use compositor::{LogoCompositor, LogoSource};
pub use config::{LogoSetting, QrConfig};
pub use encoder::{Encoder, EncoderOptions};
pub use error::{QrArtifactError, Result, StorageError};
pub use linked::{LinkedQrCode, LinkedQrRegistry, LinkedRef};
pub use manager::{ArtifactManager, SaveOutcome};
pub use qrcode::{EcLevel, QrCode, Version};
pub use store::{ArtifactFormat, ArtifactStore, FsArtifactStore, ImageRef, MemoryArtifactStore};
pub use uid::{UidAllocator, UidSource, UuidSource};
