//! Short-lived pairing codes.

use rand::Rng;
use std::time::Instant;

use super::Registry;

/// Upper bound (exclusive) for generated codes.
const CODE_SPACE: u32 = 10_000;

/// State attached to an issued pairing code.
#[derive(Debug, Clone)]
pub struct PairingSession {
    pub issued_at: Instant,
}

impl PairingSession {
    pub fn new() -> Self {
        Self {
            issued_at: Instant::now(),
        }
    }
}

impl Default for PairingSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry of pairing codes currently in use.
#[derive(Debug, Clone, Default)]
pub struct IdRegistry {
    sessions: Registry<PairingSession>,
}

impl IdRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a fresh code for `session`.
    ///
    /// Codes are drawn at random until one is free; the reservation itself
    /// is atomic, so concurrent callers never receive the same code.
    pub fn allocate(&self, session: PairingSession) -> String {
        let mut rng = rand::thread_rng();
        loop {
            let code = rng.gen_range(0..CODE_SPACE).to_string();
            if self.sessions.insert_if_absent(code.clone(), session.clone()) {
                return code;
            }
        }
    }

    /// Return a code to the pool.
    pub fn release(&self, code: &str) -> Option<PairingSession> {
        self.sessions.remove(code)
    }

    pub fn get(&self, code: &str) -> Option<PairingSession> {
        self.sessions.get(code)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.sessions.contains(code)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
