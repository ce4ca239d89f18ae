use num_bigint::BigUint;
use num_traits::{One, Zero};
use serde::{Deserialize, Serialize};

use crate::error::ConsensusError;

/// Configuration for the difficulty/target bijection and the dampened
/// retargeting rule. Grounded in the teacher's `consensus::miner::Miner`
/// config shape, generalized from a leading-zero-bits count to a full
/// 256-bit target the way the data model's `proof_score`/`difficulty`
/// fields require.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct DifficultyConfig {
    pub target_block_time_secs: i64,
    pub adjustment_window_blocks: i64,
    pub min_difficulty: i64,
    pub max_difficulty: i64,
    /// Weight given to "no change" versus the full observed ratio when
    /// retargeting: `dampening_factor - 1` parts no-change averaged
    /// against 1 part full ratio. `1` applies the ratio unweighted.
    pub dampening_factor: i64,
}

impl Default for DifficultyConfig {
    fn default() -> Self {
        DifficultyConfig {
            target_block_time_secs: 30,
            adjustment_window_blocks: 120,
            min_difficulty: 1,
            max_difficulty: i64::MAX / 2,
            dampening_factor: 4,
        }
    }
}

impl DifficultyConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.target_block_time_secs <= 0 {
            return Err("target_block_time_secs must be positive".into());
        }
        if self.adjustment_window_blocks <= 0 {
            return Err("adjustment_window_blocks must be positive".into());
        }
        if self.min_difficulty < 1 {
            return Err("min_difficulty must be at least 1".into());
        }
        if self.max_difficulty < self.min_difficulty {
            return Err("max_difficulty must be >= min_difficulty".into());
        }
        if self.dampening_factor < 1 {
            return Err("dampening_factor must be at least 1".into());
        }
        Ok(())
    }
}

/// Converts between the header's `difficulty` field and the 256-bit
/// target a proof's score is compared against, and derives the next
/// difficulty from how long the previous adjustment window actually took.
pub struct DifficultyAdjuster {
    config: DifficultyConfig,
}

impl DifficultyAdjuster {
    pub fn new(config: DifficultyConfig) -> Self {
        DifficultyAdjuster { config }
    }

    pub fn config(&self) -> &DifficultyConfig {
        &self.config
    }

    /// 2^256 - 1, the maximum possible proof score / target value.
    pub fn max_target() -> BigUint {
        (BigUint::one() << 256) - BigUint::one()
    }

    /// `target = MAX_TARGET / difficulty`. A target that would come out
    /// to zero (difficulty exceeding `MAX_TARGET`, unreachable in
    /// practice but not impossible for adversarial input) is clamped up
    /// to the smallest non-zero value rather than returned as zero.
    pub fn difficulty_to_target(&self, difficulty: i64) -> BigUint {
        let d = difficulty.max(1) as u64;
        let target = Self::max_target() / BigUint::from(d);
        if target.is_zero() {
            BigUint::one()
        } else {
            target
        }
    }

    /// Inverse of `difficulty_to_target`, clamped to the configured
    /// `[min_difficulty, max_difficulty]` range.
    pub fn target_to_difficulty(&self, target: &BigUint) -> i64 {
        if target.is_zero() {
            return self.config.max_difficulty;
        }
        let raw = Self::max_target() / target;
        let clamped = if raw > BigUint::from(self.config.max_difficulty as u64) {
            self.config.max_difficulty
        } else {
            raw.iter_u64_digits().next().unwrap_or(0) as i64
        };
        clamped.clamp(self.config.min_difficulty, self.config.max_difficulty)
    }

    /// Computes the difficulty for the block that follows a just-closed
    /// adjustment window, given how long that window actually took in
    /// wall-clock seconds. Implements the dampened retarget:
    /// `D_new = D_old * expected * dampening / (actual * dampening + expected * (dampening - 1))`,
    /// which for `dampening = 1` is the full unweighted ratio
    /// `D_old * expected / actual`, and for `dampening = k` averages
    /// `k - 1` parts "no change" with 1 part full ratio.
    pub fn next_difficulty(
        &self,
        current_difficulty: i64,
        actual_timespan_secs: i64,
    ) -> Result<i64, ConsensusError> {
        if current_difficulty <= 0 || actual_timespan_secs <= 0 {
            return Err(ConsensusError::InvalidRetargetInput);
        }

        let expected = (self.config.target_block_time_secs * self.config.adjustment_window_blocks)
            .max(1);
        let dampening = self.config.dampening_factor.max(1);

        let numerator = BigUint::from(current_difficulty as u64)
            * BigUint::from(expected as u64)
            * BigUint::from(dampening as u64);
        let denominator = BigUint::from(actual_timespan_secs as u64) * BigUint::from(dampening as u64)
            + BigUint::from(expected as u64) * BigUint::from((dampening - 1) as u64);

        let next = numerator / denominator;
        let unclamped = if next > BigUint::from(self.config.max_difficulty as u64) {
            self.config.max_difficulty
        } else {
            next.iter_u64_digits().next().unwrap_or(0) as i64
        };
        Ok(unclamped.clamp(self.config.min_difficulty, self.config.max_difficulty))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adjuster() -> DifficultyAdjuster {
        DifficultyAdjuster::new(DifficultyConfig::default())
    }

    #[test]
    fn bijection_round_trips_approximately() {
        let a = adjuster();
        let target = a.difficulty_to_target(1000);
        let difficulty = a.target_to_difficulty(&target);
        assert_eq!(difficulty, 1000);
    }

    #[test]
    fn zero_division_target_clamps_to_one() {
        let a = adjuster();
        let target = a.difficulty_to_target(i64::MAX);
        assert!(!target.is_zero());
    }

    #[test]
    fn slower_blocks_lower_difficulty() {
        let a = adjuster();
        let expected = a.config.target_block_time_secs * a.config.adjustment_window_blocks;
        let next = a.next_difficulty(1000, expected * 2).unwrap();
        assert!(next < 1000);
    }

    #[test]
    fn faster_blocks_raise_difficulty() {
        let a = adjuster();
        let expected = a.config.target_block_time_secs * a.config.adjustment_window_blocks;
        let next = a.next_difficulty(1000, expected / 2).unwrap();
        assert!(next > 1000);
    }

    #[test]
    fn dampening_of_one_applies_full_ratio() {
        let mut config = DifficultyConfig::default();
        config.dampening_factor = 1;
        let a = DifficultyAdjuster::new(config);
        let expected = a.config.target_block_time_secs * a.config.adjustment_window_blocks;
        let next = a.next_difficulty(1000, expected * 2).unwrap();
        assert_eq!(next, 500);
    }

    #[test]
    fn higher_dampening_moves_difficulty_less() {
        let mut config = DifficultyConfig::default();
        config.dampening_factor = 1;
        let undamped = DifficultyAdjuster::new(config).next_difficulty(1000, config.target_block_time_secs * config.adjustment_window_blocks * 2).unwrap();

        config.dampening_factor = 4;
        let damped = DifficultyAdjuster::new(config).next_difficulty(1000, config.target_block_time_secs * config.adjustment_window_blocks * 2).unwrap();

        assert!(damped > undamped);
        assert!(damped < 1000);
    }

    #[test]
    fn nonpositive_inputs_are_rejected() {
        let a = adjuster();
        assert!(a.next_difficulty(0, 100).is_err());
        assert!(a.next_difficulty(100, 0).is_err());
        assert!(a.next_difficulty(-1, 100).is_err());
    }

    #[test]
    fn difficulty_never_drops_below_minimum() {
        let a = adjuster();
        let next = a.next_difficulty(1, i64::MAX / 8).unwrap();
        assert!(next >= a.config.min_difficulty);
    }
}
