//! Integrity chain for audit entries

use crate::entry::AuditEntry;

/// Tracks the head of an audit chain
#[derive(Debug, Default)]
pub struct IntegrityChain {
    last_hash: Option<String>,
    entry_count: u64,
}

impl IntegrityChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume a chain from persisted state
    pub fn from_state(last_hash: Option<String>, entry_count: u64) -> Self {
        Self {
            last_hash,
            entry_count,
        }
    }

    /// Hash the next entry must link to
    pub fn previous_hash(&self) -> Option<String> {
        self.last_hash.clone()
    }

    /// Advance the head to `entry`
    pub fn advance(&mut self, entry: &AuditEntry) {
        self.last_hash = Some(entry.entry_hash.clone());
        self.entry_count += 1;
    }

    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    pub fn head_hash(&self) -> Option<&str> {
        self.last_hash.as_deref()
    }
}

/// Outcome of verifying a sequence of entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainVerification {
    /// Number of entries checked
    pub total_entries: usize,

    /// Entries verified before the first failure
    pub verified_entries: usize,

    /// First broken entry, if any
    pub violation: Option<ChainViolation>,
}

impl ChainVerification {
    pub fn is_valid(&self) -> bool {
        self.violation.is_none()
    }
}

/// Why a chain failed verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainViolation {
    /// Entry content does not match its hash
    TamperedEntry { index: usize, expected: String, found: String },
    /// Entry does not link to its predecessor
    BrokenLink { index: usize, expected: Option<String>, found: Option<String> },
}

/// Verify that `entries` form an intact chain.
///
/// The first entry may carry a previous hash (a chain continued from an
/// earlier segment); every later entry must link to its predecessor.
pub fn verify_chain(entries: &[AuditEntry]) -> ChainVerification {
    for (index, entry) in entries.iter().enumerate() {
        let expected = entry.expected_hash();
        if expected != entry.entry_hash {
            return ChainVerification {
                total_entries: entries.len(),
                verified_entries: index,
                violation: Some(ChainViolation::TamperedEntry {
                    index,
                    expected,
                    found: entry.entry_hash.clone(),
                }),
            };
        }

        if index > 0 {
            let predecessor = Some(entries[index - 1].entry_hash.clone());
            if entry.previous_hash != predecessor {
                return ChainVerification {
                    total_entries: entries.len(),
                    verified_entries: index,
                    violation: Some(ChainViolation::BrokenLink {
                        index,
                        expected: predecessor,
                        found: entry.previous_hash.clone(),
                    }),
                };
            }
        }
    }

    ChainVerification {
        total_entries: entries.len(),
        verified_entries: entries.len(),
        violation: None,
    }
}
