use std::collections::HashSet;
use std::fs;

use qrartifact::encoder::encode;
use qrartifact::{
    ArtifactManager, ArtifactState, ArtifactStore, EcLevel, FsArtifactStore, LinkedQrRegistry, LinkedRef,
    OwnerKind, PayloadDigest, QrArtifact, QrArtifactError, QrConfig, QrOwner, Result, SaveOutcome, Version,
};

struct Ticket {
    code: String,
    qr: QrArtifact,
}

impl Ticket {
    fn new(code: &str) -> Self {
        Self {
            code: code.to_string(),
            qr: QrArtifact::new(),
        }
    }
}

impl QrOwner for Ticket {
    fn owner_kind(&self) -> OwnerKind {
        OwnerKind::new("events", "ticket")
    }

    fn qr_payload(&self) -> Result<Vec<u8>> {
        Ok(self.code.as_bytes().to_vec())
    }

    fn qr_artifact(&self) -> &QrArtifact {
        &self.qr
    }

    fn qr_artifact_mut(&mut self) -> &mut QrArtifact {
        &mut self.qr
    }
}

/// Uids held by tickets, standing in for a unique column.
fn ticket_uids(tickets: &[&Ticket]) -> HashSet<String> {
    tickets.iter().filter_map(|t| t.qr.uid().map(str::to_string)).collect()
}

fn setup() -> (tempfile::TempDir, ArtifactManager<FsArtifactStore>) {
    let tmp = tempfile::tempdir().unwrap();
    let config = QrConfig::default();
    let store = FsArtifactStore::with_namespace(tmp.path(), &config.namespace);
    let manager = ArtifactManager::new(&config, store).unwrap();
    (tmp, manager)
}

#[test]
fn encode_is_deterministic() {
    let a = encode(b"ABC123", Version::MIN, EcLevel::L, 10, 2).unwrap();
    let b = encode(b"ABC123", Version::MIN, EcLevel::L, 10, 2).unwrap();
    assert_eq!(a.as_raw(), b.as_raw());
}

#[test]
fn oversized_payload_fails_at_version_one() {
    let payload = vec![b'#'; 18];
    assert!(matches!(
        encode(&payload, Version::MIN, EcLevel::L, 10, 2),
        Err(QrArtifactError::CapacityExceeded { .. })
    ));
}

#[test]
fn ticket_lifecycle_on_disk() {
    let (tmp, manager) = setup();
    let none = |_: &OwnerKind, _: &str| false;
    let mut ticket = Ticket::new("ABC123");

    let first = match manager.on_save(&mut ticket, &none).unwrap() {
        SaveOutcome::Generated(image) => image,
        other => panic!("expected Generated, got {:?}", other),
    };
    let uid = ticket.qr.uid().unwrap().to_string();
    let path = tmp.path().join("qrcode").join(format!("events_ticket_{}.png", uid));
    assert_eq!(manager.store().path_of(&first), path);
    assert!(path.exists());
    assert_eq!(&fs::read(&path).unwrap()[1..4], b"PNG");
    assert_eq!(ticket.qr.last_payload_hash(), Some(PayloadDigest::of(b"ABC123")));

    let modified = fs::metadata(&path).unwrap().modified().unwrap();
    assert!(manager.on_save(&mut ticket, &none).unwrap().is_unchanged());
    assert_eq!(fs::metadata(&path).unwrap().modified().unwrap(), modified);

    ticket.code = "XYZ999".to_string();
    assert_eq!(manager.state(&ticket).unwrap(), ArtifactState::Stale);
    let current = match manager.on_save(&mut ticket, &none).unwrap() {
        SaveOutcome::Regenerated { previous, current } => {
            assert_eq!(previous, first);
            current
        }
        other => panic!("expected Regenerated, got {:?}", other),
    };
    assert_ne!(current, first);
    assert_eq!(ticket.qr.uid(), Some(uid.as_str()));
    assert!(!manager.store().contains(&first).unwrap());
    assert!(manager.store().contains(&current).unwrap());
    assert_eq!(ticket.qr.last_payload_hash(), Some(PayloadDigest::of(b"XYZ999")));

    assert!(manager.on_delete(&mut ticket).unwrap());
    assert!(!path.exists());
    assert!(!manager.on_delete(&mut ticket).unwrap());
    assert_eq!(fs::read_dir(tmp.path().join("qrcode")).unwrap().count(), 0);
}

#[test]
fn uids_are_unique_per_kind() {
    let (_tmp, manager) = setup();
    let mut first = Ticket::new("A1");
    let mut second = Ticket::new("A2");

    manager.on_save(&mut first, &|_: &OwnerKind, _: &str| false).unwrap();
    let taken = ticket_uids(&[&first]);
    let index = |_: &OwnerKind, uid: &str| taken.contains(uid);
    manager.on_save(&mut second, &index).unwrap();

    assert_ne!(first.qr.uid(), second.qr.uid());
    assert_ne!(first.qr.image().unwrap().key(), second.qr.image().unwrap().key());
}

#[test]
fn linked_codes_cascade() {
    let (tmp, manager) = setup();
    let mut registry = LinkedQrRegistry::new();
    let venue = LinkedRef::new("events.venue", "3");

    registry.create(&manager, venue.clone(), Some("Gate A".to_string()), "GATE-A").unwrap();
    registry.create(&manager, venue.clone(), Some("Gate B".to_string()), "GATE-B").unwrap();
    let dir = tmp.path().join("qrcode");
    assert_eq!(fs::read_dir(&dir).unwrap().count(), 2);

    assert_eq!(registry.delete_linked(&manager, &venue).unwrap(), 2);
    assert!(registry.is_empty());
    assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);
}

#[test]
fn config_file_drives_manager() {
    let tmp = tempfile::tempdir().unwrap();
    let config_path = tmp.path().join("qr.toml");
    fs::write(
        &config_path,
        "logo = \"none\"\nformat = \"bmp\"\nbox_size = 4\nborder = 4\nnamespace = \"codes\"\n",
    )
    .unwrap();
    let config = QrConfig::from_file(&config_path).unwrap();
    let store = FsArtifactStore::with_namespace(tmp.path(), &config.namespace);
    let manager = ArtifactManager::new(&config, store).unwrap();

    let mut ticket = Ticket::new("ABC123");
    let image = manager
        .on_save(&mut ticket, &|_: &OwnerKind, _: &str| false)
        .unwrap()
        .image()
        .unwrap()
        .clone();
    assert!(image.key().ends_with(".bmp"));
    let bytes = manager.store().load(&image).unwrap().unwrap();
    let decoded = image::load_from_memory(&bytes).unwrap();
    // version 1 is 21 modules, plus 4 + 4 quiet zone, at 4 px each
    assert_eq!((decoded.width(), decoded.height()), (116, 116));
    assert!(tmp.path().join("codes").join(image.key()).exists());
}
