//! Record identity generation.
//!
//! Identities are random, fixed-length and alphanumeric. The generator is
//! injected into the index-write stage so tests can seed it.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

/// Characters identities are drawn from, uniformly.
pub const IDENTITY_CHARSET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Source of fresh record identities.
pub trait IdentityGenerator: Send + Sync {
    fn next_identity(&self) -> String;
}

/// Uniform random identities from [`IDENTITY_CHARSET`].
pub struct RandomIdentity {
    rng: Mutex<StdRng>,
    length: usize,
}

impl RandomIdentity {
    /// Seeded from OS entropy.
    pub fn new(length: usize) -> Self {
        Self::with_rng(StdRng::from_entropy(), length)
    }

    /// Deterministic sequence for a given seed.
    pub fn seeded(seed: u64, length: usize) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed), length)
    }

    fn with_rng(rng: StdRng, length: usize) -> Self {
        Self {
            rng: Mutex::new(rng),
            length,
        }
    }
}

impl IdentityGenerator for RandomIdentity {
    fn next_identity(&self) -> String {
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        (0..self.length)
            .map(|_| IDENTITY_CHARSET[rng.gen_range(0..IDENTITY_CHARSET.len())] as char)
            .collect()
    }
}
