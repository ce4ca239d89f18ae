use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use spacetime_core::Hash;

use crate::error::ConsensusError;

/// Configuration for epoch duration. Grounded in the teacher's
/// `BlockHeader::epoch_salt` idea (a per-height derived salt), generalized
/// to the fixed challenge-derivation rule spec'd for proof-of-space-time:
/// `challenge = SHA256(parent_hash || epoch as little-endian u64)`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct EpochConfig {
    pub epoch_duration_secs: i64,
}

impl Default for EpochConfig {
    fn default() -> Self {
        EpochConfig {
            epoch_duration_secs: 1_209_600,
        }
    }
}

impl EpochConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.epoch_duration_secs <= 0 {
            return Err("epoch_duration_secs must be positive".into());
        }
        Ok(())
    }
}

/// The mutable triple an `EpochManager` carries: the epoch currently in
/// force, the challenge that epoch derives, and when the epoch began.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EpochState {
    pub current_epoch: i64,
    pub current_challenge: Hash,
    pub epoch_start_time: i64,
}

/// Tracks the chain's current epoch and challenge, advancing atomically
/// as blocks close out an epoch. Holds its state behind a `Mutex` so
/// concurrent callers always observe a single consistent triple, the
/// same interior-mutability shape `ChainStateManager` uses for its undo
/// log.
pub struct EpochManager {
    config: EpochConfig,
    state: Mutex<EpochState>,
}

impl EpochManager {
    pub fn new(config: EpochConfig, initial_state: EpochState) -> Self {
        EpochManager {
            config,
            state: Mutex::new(initial_state),
        }
    }

    /// `challenge = SHA256(parent_hash || epoch_le_u64)`.
    pub fn derive_challenge(parent_hash: &Hash, epoch: i64) -> Hash {
        let mut buf = Vec::with_capacity(32 + 8);
        buf.extend_from_slice(parent_hash.as_bytes());
        buf.extend_from_slice(&(epoch as u64).to_le_bytes());
        Hash::digest(&buf)
    }

    /// The current `{current_epoch, current_challenge, epoch_start_time}`
    /// triple.
    pub fn current(&self) -> EpochState {
        *self.state.lock().expect("epoch state mutex poisoned")
    }

    /// Advances to the next epoch: increments `current_epoch`, recomputes
    /// `current_challenge` from `parent_hash`, and resets
    /// `epoch_start_time` to `now`. The whole triple is replaced under a
    /// single lock acquisition, so no caller ever observes a
    /// half-advanced state.
    pub fn advance(&self, parent_hash: &Hash, now: i64) -> EpochState {
        let mut state = self.state.lock().expect("epoch state mutex poisoned");
        let next_epoch = state.current_epoch + 1;
        let next_challenge = Self::derive_challenge(parent_hash, next_epoch);
        *state = EpochState {
            current_epoch: next_epoch,
            current_challenge: next_challenge,
            epoch_start_time: now,
        };
        *state
    }

    /// Whether the current epoch has run longer than `epoch_duration_secs`.
    pub fn is_expired(&self, now: i64) -> bool {
        let state = self.current();
        now >= state.epoch_start_time + self.config.epoch_duration_secs
    }

    /// Confirms a header's claimed epoch matches the epoch currently in
    /// force, and that its claimed challenge is exactly the one
    /// `parent_hash` and that epoch imply.
    pub fn validate(
        &self,
        parent_hash: &Hash,
        claimed_epoch: i64,
        claimed_challenge: &Hash,
    ) -> Result<(), ConsensusError> {
        let expected_epoch = self.current().current_epoch;
        if claimed_epoch != expected_epoch {
            return Err(ConsensusError::EpochMismatch {
                expected: expected_epoch,
                actual: claimed_epoch,
            });
        }
        let expected_challenge = Self::derive_challenge(parent_hash, claimed_epoch);
        if &expected_challenge != claimed_challenge {
            return Err(ConsensusError::ChallengeMismatch {
                expected: expected_challenge,
                actual: *claimed_challenge,
            });
        }
        Ok(())
    }
}
