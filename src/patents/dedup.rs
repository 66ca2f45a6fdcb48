//! Run-scoped set of admitted patent identifiers.

use std::collections::HashSet;

/// Identifiers already admitted to the output of the current run.
///
/// `try_admit` performs the membership test and the insertion under one
/// `&mut` borrow, so a rejected attempt is counted exactly once.
#[derive(Debug, Default, Clone)]
pub struct DedupSet {
    seen: HashSet<String>,
    rejected: usize,
}

impl DedupSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_duplicate(&self, identifier: &str) -> bool {
        self.seen.contains(&normalize(identifier))
    }

    /// Admit `identifier` if unseen. Returns `false` and bumps the duplicate
    /// counter otherwise.
    pub fn try_admit(&mut self, identifier: &str) -> bool {
        if self.seen.insert(normalize(identifier)) {
            true
        } else {
            self.rejected += 1;
            false
        }
    }

    /// Number of admission attempts rejected as duplicates.
    pub fn duplicates_removed(&self) -> usize {
        self.rejected
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

fn normalize(identifier: &str) -> String {
    identifier.trim().to_string()
}
