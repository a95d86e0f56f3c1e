//! Slave selection policies.
//!
//! A selector is asked once per read call and returns an index into the
//! slice of live slaves it is given. Selectors never own engines.

use crate::db::engine::Engine;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Policy choosing which slave serves a read.
///
/// `select` is only called with a non-empty slice and must return an index
/// below `slaves.len()`. It may be called concurrently from many tasks.
pub trait SlaveSelector: Send + Sync + std::fmt::Debug {
    fn select(&self, slaves: &[Arc<Engine>]) -> usize;
}

/// Uniform random choice. The default policy.
#[derive(Debug, Default)]
pub struct RandomSelector {
    seeded: Option<Mutex<StdRng>>,
}

impl RandomSelector {
    /// Draw from the thread-local generator on every call.
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw from an owned generator seeded with `seed`. Reproducible.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seeded: Some(Mutex::new(StdRng::seed_from_u64(seed))),
        }
    }
}

impl SlaveSelector for RandomSelector {
    fn select(&self, slaves: &[Arc<Engine>]) -> usize {
        let n = slaves.len();
        if n <= 1 {
            return 0;
        }
        match &self.seeded {
            Some(rng) => {
                let mut rng = rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                rng.gen_range(0..n)
            }
            None => rand::thread_rng().gen_range(0..n),
        }
    }
}

/// Rotates through slaves in registration order.
#[derive(Debug, Default)]
pub struct RoundRobinSelector {
    next: AtomicUsize,
}

impl RoundRobinSelector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SlaveSelector for RoundRobinSelector {
    fn select(&self, slaves: &[Arc<Engine>]) -> usize {
        if slaves.is_empty() {
            return 0;
        }
        self.next.fetch_add(1, Ordering::Relaxed) % slaves.len()
    }
}

/// Picks the slave with the fewest borrowed connections; ties go to the
/// earliest registered.
#[derive(Debug, Default, Clone, Copy)]
pub struct LeastConnSelector;

impl SlaveSelector for LeastConnSelector {
    fn select(&self, slaves: &[Arc<Engine>]) -> usize {
        slaves
            .iter()
            .enumerate()
            .min_by_key(|(_, engine)| engine.stats().in_use)
            .map(|(idx, _)| idx)
            .unwrap_or(0)
    }
}
