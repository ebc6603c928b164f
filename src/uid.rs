//! Short identifier allocation.
//!
//! Candidates are drawn from a [`UidSource`] and checked against a caller-supplied
//! existence test until one is free. Uniqueness is best effort: the check and the later
//! write of the record are separate steps, so two processes (or threads) allocating at the
//! same time can both see a candidate as free. Callers that need a hard guarantee must
//! serialise allocation or keep a unique constraint in their persistence layer.

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{QrArtifactError, Result};

/// Default uid length in characters.
pub const DEFAULT_UID_LENGTH: usize = 8;

/// Longest uid handed out. Artifact records store uids in at most this many characters.
pub const MAX_UID_LENGTH: usize = 8;

/// Default retry budget before giving up on a free uid.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10_000;

/// Produces uid candidates.
pub trait UidSource {
    fn candidate(&self, length: usize) -> String;
}

/// Random candidates from the hex digits of a v4 UUID.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidSource;

impl UidSource for UuidSource {
    fn candidate(&self, length: usize) -> String {
        let mut uid = Uuid::new_v4().simple().to_string();
        uid.truncate(length.min(MAX_UID_LENGTH));
        uid
    }
}

impl<F> UidSource for F
where
    F: Fn(usize) -> String,
{
    fn candidate(&self, length: usize) -> String {
        self(length)
    }
}

/// Draws candidates until one is free or the attempt budget runs out.
#[derive(Debug, Clone)]
pub struct UidAllocator<G = UuidSource> {
    source: G,
    length: usize,
    max_attempts: u32,
}

impl UidAllocator<UuidSource> {
    pub fn new() -> Self {
        Self::with_source(UuidSource)
    }
}

impl Default for UidAllocator<UuidSource> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G: UidSource> UidAllocator<G> {
    pub fn with_source(source: G) -> Self {
        Self {
            source,
            length: DEFAULT_UID_LENGTH,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Sets the uid length, clamped to `1..=MAX_UID_LENGTH`.
    pub fn with_length(mut self, length: usize) -> Self {
        self.length = length.clamp(1, MAX_UID_LENGTH);
        self
    }

    /// Sets the retry budget (at least one attempt).
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the first candidate for which `exists` is false.
    ///
    /// Candidates longer than the configured length are cut to that many characters
    /// before the check.
    ///
    /// # Errors
    ///
    /// [`QrArtifactError::AllocationExhausted`] when every attempt collided.
    pub fn allocate(&self, mut exists: impl FnMut(&str) -> bool) -> Result<String> {
        for attempt in 1..=self.max_attempts {
            let mut candidate = self.source.candidate(self.length);
            if let Some((cut, _)) = candidate.char_indices().nth(self.length) {
                candidate.truncate(cut);
            }
            if !exists(&candidate) {
                debug!(uid = %candidate, attempt, "Allocated uid");
                return Ok(candidate);
            }
            debug!(uid = %candidate, attempt, "Uid collision, retrying");
        }
        warn!(attempts = self.max_attempts, length = self.length, "Uid allocation exhausted");
        Err(QrArtifactError::AllocationExhausted {
            attempts: self.max_attempts,
        })
    }
}

/// Allocates a random uid of `length` characters with the default retry budget.
pub fn allocate(exists: impl FnMut(&str) -> bool, length: usize) -> Result<String> {
    UidAllocator::new().with_length(length).allocate(exists)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::collections::HashSet;

    #[test]
    fn test_uuid_candidates() {
        let a = UuidSource.candidate(8);
        let b = UuidSource.candidate(8);
        assert_eq!(a.len(), 8);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
        assert_eq!(UuidSource.candidate(32).len(), MAX_UID_LENGTH);
    }

    #[test]
    fn test_fourth_candidate_wins() {
        let counter = Cell::new(0);
        let source = |_: usize| {
            counter.set(counter.get() + 1);
            format!("uid{}", counter.get())
        };
        let checks = Cell::new(0);
        let uid = UidAllocator::with_source(source)
            .allocate(|candidate| {
                checks.set(checks.get() + 1);
                candidate != "uid4"
            })
            .unwrap();
        assert_eq!(uid, "uid4");
        assert_eq!(checks.get(), 4);
    }

    #[test]
    fn test_never_returns_taken_uid() {
        let taken: HashSet<String> = (0..50).map(|_| UuidSource.candidate(2)).collect();
        for _ in 0..20 {
            let uid = allocate(|c| taken.contains(c), 2).unwrap();
            assert!(!taken.contains(&uid));
        }
    }

    #[test]
    fn test_exhaustion() {
        let err = UidAllocator::new()
            .with_max_attempts(5)
            .allocate(|_| true)
            .unwrap_err();
        assert!(matches!(err, QrArtifactError::AllocationExhausted { attempts: 5 }));
    }

    #[test]
    fn test_length_is_clamped() {
        assert_eq!(UidAllocator::new().with_length(0).length(), 1);
        assert_eq!(UidAllocator::new().with_length(100).length(), MAX_UID_LENGTH);
        assert_eq!(allocate(|_| false, 12).unwrap().len(), MAX_UID_LENGTH);
        assert_eq!(allocate(|_| false, 5).unwrap().len(), 5);
    }

    #[test]
    fn test_long_candidates_are_cut() {
        let source = |_: usize| "0123456789abcdef".to_string();
        let uid = UidAllocator::with_source(source).allocate(|_| false).unwrap();
        assert_eq!(uid, "01234567");

        let wide = |_: usize| "ééééééééé".to_string();
        let seen = std::cell::RefCell::new(Vec::new());
        let uid = UidAllocator::with_source(wide)
            .with_length(3)
            .allocate(|c| {
                seen.borrow_mut().push(c.to_string());
                false
            })
            .unwrap();
        assert_eq!(uid, "ééé");
        assert_eq!(*seen.borrow(), vec!["ééé".to_string()]);
    }
}
