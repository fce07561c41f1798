//! Watermark tracking for incremental polling.
//!
//! Holds the `created_at` of the newest post already processed. Lives only in
//! memory: a restart begins again from [`Watermark::BEGINNING`].

use crate::ingest::types::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Watermark {
    value: Timestamp,
}

impl Default for Watermark {
    fn default() -> Self {
        Self::new()
    }
}

impl Watermark {
    /// Sentinel meaning "no post processed yet". Every real post is newer.
    pub const BEGINNING: Timestamp = 0;

    pub fn new() -> Self {
        Self {
            value: Self::BEGINNING,
        }
    }

    pub fn current(&self) -> Timestamp {
        self.value
    }

    pub fn is_unset(&self) -> bool {
        self.value == Self::BEGINNING
    }

    /// Overwrite the stored value with `newest`.
    pub fn advance(&mut self, newest: Timestamp) {
        self.value = newest;
    }
}
