//! Participant identity for distributed JIT staging.
//!
//! In multi-process runs every peer specializes "the same" templates but
//! must compile its own artifact copy. The rank keys the staged source names
//! so peers sharing a filesystem never collide.
//!
//! Environment variables (launcher convention):
//! - `RANK`: global rank of this process (0..WORLD_SIZE)
//! - `WORLD_SIZE`: total number of cooperating processes

use std::env;

/// Identity of this process among cooperating peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DistributedContext {
    /// Global rank of this process. 0 when no distributed context is active.
    pub rank: usize,
    /// Total number of processes.
    pub world_size: usize,
}

impl DistributedContext {
    /// Read identity from the environment, falling back to single-process
    /// defaults when the launcher variables are not set.
    pub fn from_env() -> Self {
        let rank = env::var("RANK").ok().and_then(|s| s.parse().ok()).unwrap_or(0);

        let world_size = env::var("WORLD_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1);

        Self { rank, world_size }
    }

    /// Single-process identity.
    pub fn single_process() -> Self {
        Self {
            rank: 0,
            world_size: 1,
        }
    }

    /// Whether staged artifact names must carry the rank suffix.
    pub fn is_distributed(&self) -> bool {
        self.world_size > 1
    }
}

impl Default for DistributedContext {
    fn default() -> Self {
        Self::single_process()
    }
}
