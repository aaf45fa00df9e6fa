//! Mailboxes shared by two paired clients.

use std::time::{Duration, Instant};

use super::Registry;

/// A named slot two clients meet at to exchange handshake data.
#[derive(Debug, Clone)]
pub struct Mailbox {
    pub created_at: Instant,
}

impl Mailbox {
    pub fn new() -> Self {
        Self {
            created_at: Instant::now(),
        }
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}

/// Mailboxes keyed by the pairing password.
pub type Mailboxes = Registry<Mailbox>;
