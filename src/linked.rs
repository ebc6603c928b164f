//! QR codes attached to arbitrary entities through a weak `(kind, id)` reference.
//!
//! A [`LinkedQrCode`] never owns the entity it points at. The [`LinkedQrRegistry`] is the
//! lookup table that resolves those references: it lists the codes linked to an entity
//! and removes them (releasing their images) when the entity goes away.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::artifact::{OwnerKind, QrArtifact, QrOwner, UidIndex};
use crate::error::Result;
use crate::manager::{ArtifactManager, SaveOutcome};
use crate::store::ArtifactStore;
use crate::uid::UidSource;

/// Weak reference to an external entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkedRef {
    pub kind: String,
    pub id: String,
}

impl LinkedRef {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for LinkedRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// A QR code linked to some entity, encoding free-form data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedQrCode {
    id: u64,
    linked: LinkedRef,
    name: Option<String>,
    data: String,
    #[serde(default)]
    artifact: QrArtifact,
}

impl LinkedQrCode {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn linked(&self) -> &LinkedRef {
        &self.linked
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn data(&self) -> &str {
        &self.data
    }

    pub fn artifact(&self) -> &QrArtifact {
        &self.artifact
    }

    pub fn kind() -> OwnerKind {
        OwnerKind::new("qrcodes", "linkedqrcode")
    }
}

impl fmt::Display for LinkedQrCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => f.write_str(name),
            None => write!(f, "QR code #{} for {}", self.id, self.linked),
        }
    }
}

impl QrOwner for LinkedQrCode {
    fn owner_kind(&self) -> OwnerKind {
        Self::kind()
    }

    fn qr_payload(&self) -> Result<Vec<u8>> {
        Ok(self.data.as_bytes().to_vec())
    }

    fn qr_artifact(&self) -> &QrArtifact {
        &self.artifact
    }

    fn qr_artifact_mut(&mut self) -> &mut QrArtifact {
        &mut self.artifact
    }
}

/// In-process table of linked QR codes keyed by id.
#[derive(Debug, Default)]
pub struct LinkedQrRegistry {
    next_id: u64,
    records: BTreeMap<u64, LinkedQrCode>,
}

impl UidIndex for LinkedQrRegistry {
    fn uid_exists(&self, kind: &OwnerKind, uid: &str) -> bool {
        *kind == LinkedQrCode::kind() && self.records.values().any(|r| r.artifact.uid() == Some(uid))
    }
}

impl LinkedQrRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a code linked to `linked` and generates its image.
    ///
    /// Nothing is recorded when generation fails.
    pub fn create<S: ArtifactStore, G: UidSource>(
        &mut self,
        manager: &ArtifactManager<S, G>,
        linked: LinkedRef,
        name: Option<String>,
        data: impl Into<String>,
    ) -> Result<u64> {
        let id = self.next_id + 1;
        let mut record = LinkedQrCode {
            id,
            linked,
            name,
            data: data.into(),
            artifact: QrArtifact::new(),
        };
        manager.on_save(&mut record, &*self)?;
        debug!(id, linked = %record.linked, uid = record.artifact.uid(), "Created linked QR code");
        self.next_id = id;
        self.records.insert(id, record);
        Ok(id)
    }

    /// Replaces the data of code `id` and regenerates its image if it changed.
    ///
    /// Returns `None` for an unknown id. On failure the previous data is restored.
    pub fn update_data<S: ArtifactStore, G: UidSource>(
        &mut self,
        manager: &ArtifactManager<S, G>,
        id: u64,
        data: impl Into<String>,
    ) -> Result<Option<SaveOutcome>> {
        let Some(mut record) = self.records.remove(&id) else {
            return Ok(None);
        };
        let old = std::mem::replace(&mut record.data, data.into());
        let result = manager.on_save(&mut record, &*self);
        if result.is_err() {
            record.data = old;
        }
        self.records.insert(id, record);
        result.map(Some)
    }

    /// Renames code `id`; returns `false` for an unknown id.
    pub fn rename(&mut self, id: u64, name: Option<String>) -> bool {
        match self.records.get_mut(&id) {
            Some(record) => {
                record.name = name;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: u64) -> Option<&LinkedQrCode> {
        self.records.get(&id)
    }

    /// Every code linked to `linked`, in id order.
    pub fn for_linked<'a>(&'a self, linked: &'a LinkedRef) -> impl Iterator<Item = &'a LinkedQrCode> + 'a {
        self.records.values().filter(move |r| r.linked == *linked)
    }

    /// Removes code `id` and releases its image. Returns `false` for an unknown id.
    pub fn delete<S: ArtifactStore, G: UidSource>(&mut self, manager: &ArtifactManager<S, G>, id: u64) -> Result<bool> {
        let Some(mut record) = self.records.remove(&id) else {
            return Ok(false);
        };
        if let Err(err) = manager.on_delete(&mut record) {
            self.records.insert(id, record);
            return Err(err);
        }
        Ok(true)
    }

    /// Cascade for a removed entity: deletes every code linked to it.
    pub fn delete_linked<S: ArtifactStore, G: UidSource>(
        &mut self,
        manager: &ArtifactManager<S, G>,
        linked: &LinkedRef,
    ) -> Result<usize> {
        let ids: Vec<u64> = self.for_linked(linked).map(LinkedQrCode::id).collect();
        for id in &ids {
            self.delete(manager, *id)?;
        }
        if !ids.is_empty() {
            info!(linked = %linked, count = ids.len(), "Deleted linked QR codes");
        }
        Ok(ids.len())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LinkedQrCode> {
        self.records.values()
    }
}
