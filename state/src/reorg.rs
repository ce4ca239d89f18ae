use std::sync::Arc;

use spacetime_core::{Block, Hash};
use tracing::{debug, warn};

use crate::chain_state::{ChainSnapshot, ChainStateManager};
use crate::error::StateError;
use crate::storage::Storage;

/// What happened to the chain as a result of submitting a block.
#[derive(Debug, PartialEq, Eq)]
pub enum ReorgOutcome {
    /// The block extended the existing best chain directly.
    Extended { hash: Hash, height: i64 },
    /// The block was stored but its branch is not (yet) the heaviest.
    SideChainStored { hash: Hash, height: i64 },
    /// The block's branch overtook the previous best chain.
    Reorganized(ChainReorganized),
}

/// Emitted whenever the best chain's tip changes to a different branch
/// than a simple single-block extension, so subscribers (mempool,
/// RPC notifications) can re-derive anything that assumed the old tip.
#[derive(Debug, PartialEq, Eq)]
pub struct ChainReorganized {
    pub common_ancestor: Hash,
    pub old_tip: Hash,
    pub new_tip: Hash,
    pub reverted: usize,
    pub applied: usize,
}

/// Cumulative-difficulty fork choice over a `ChainStateManager`. Blocks
/// that extend the current tip are applied immediately; anything else is
/// recorded as a side chain and only swapped in once its cumulative
/// difficulty exceeds the live chain's, at which point the common
/// ancestor is located, the stale suffix reverted, and the heavier
/// branch reapplied block by block. Grounded in the teacher's
/// `node::chain::ChainState::handle_fork`, generalized from PoW
/// block-count comparison to PoST cumulative-difficulty comparison.
pub struct ChainReorganizer<S: Storage> {
    state: Arc<ChainStateManager<S>>,
    max_reorg_depth: usize,
}

impl<S: Storage> ChainReorganizer<S> {
    pub fn new(state: Arc<ChainStateManager<S>>, max_reorg_depth: usize) -> Self {
        ChainReorganizer {
            state,
            max_reorg_depth,
        }
    }

    pub fn submit_block(&self, block: Block) -> Result<ReorgOutcome, StateError> {
        let best_hash = self
            .state
            .best_hash()?
            .ok_or(StateError::HeightNotFound(0))?;

        if block.header.parent_hash == best_hash {
            let hash = self.state.apply_block(block.clone())?;
            return Ok(ReorgOutcome::Extended {
                hash,
                height: block.header.height,
            });
        }

        let candidate_difficulty = self.state.cumulative_difficulty(&block.header.parent_hash)?
            + big_from_i64(block.header.difficulty);
        let best_difficulty = self.state.cumulative_difficulty(&best_hash)?;
        let hash = self.state.store_side_chain_block(block)?;

        if candidate_difficulty <= best_difficulty {
            debug!(hash = %hash, "block stored as side chain, does not overtake best chain");
            return Ok(ReorgOutcome::SideChainStored {
                hash,
                height: self
                    .state
                    .get_block(&hash)?
                    .map(|b| b.header.height)
                    .unwrap_or_default(),
            });
        }

        let event = self.reorganize_to(hash, best_hash)?;
        warn!(
            old_tip = %event.old_tip,
            new_tip = %event.new_tip,
            common_ancestor = %event.common_ancestor,
            reverted = event.reverted,
            applied = event.applied,
            "chain reorganized to a heavier branch"
        );
        Ok(ReorgOutcome::Reorganized(event))
    }

    /// Walks `new_tip` and `old_tip` back to their common ancestor,
    /// reverts the stale suffix of the live chain, and reapplies the
    /// heavier branch's blocks in order. If reapplying fails partway,
    /// rolls back to the ancestor and re-marks the old branch canonical
    /// before reporting `ReorgFailed`, rather than leaving the chain
    /// half-reverted.
    fn reorganize_to(&self, new_tip: Hash, old_tip: Hash) -> Result<ChainReorganized, StateError> {
        let mut new_cursor = new_tip;
        let mut old_cursor = old_tip;
        let mut new_chain = vec![new_cursor];
        let mut old_chain = vec![old_cursor];
        let mut depth = 0usize;

        let ancestor = loop {
            if new_cursor == old_cursor {
                break new_cursor;
            }
            depth += 1;
            if depth > self.max_reorg_depth {
                return Err(StateError::ReorgTooDeep {
                    requested: depth as i64,
                    available: self.max_reorg_depth as i64,
                });
            }
            if new_cursor == Hash::ZERO || old_cursor == Hash::ZERO {
                return Err(StateError::NoCommonAncestor);
            }

            let new_height = self
                .state
                .get_block(&new_cursor)?
                .ok_or(StateError::BlockNotFound(new_cursor))?
                .header
                .height;
            let old_height = self
                .state
                .get_block(&old_cursor)?
                .ok_or(StateError::BlockNotFound(old_cursor))?
                .header
                .height;

            if new_height >= old_height {
                new_cursor = self
                    .state
                    .get_block(&new_cursor)?
                    .ok_or(StateError::BlockNotFound(new_cursor))?
                    .header
                    .parent_hash;
                new_chain.push(new_cursor);
            }
            if old_height >= new_height {
                old_cursor = self
                    .state
                    .get_block(&old_cursor)?
                    .ok_or(StateError::BlockNotFound(old_cursor))?
                    .header
                    .parent_hash;
                old_chain.push(old_cursor);
            }
        };

        new_chain.retain(|h| *h != ancestor);
        new_chain.reverse();
        old_chain.retain(|h| *h != ancestor);
        old_chain.reverse();

        let ancestor_header = self
            .state
            .get_block(&ancestor)?
            .ok_or(StateError::BlockNotFound(ancestor))?
            .header;
        let snapshot = ChainSnapshot {
            height: ancestor_header.height,
            hash: ancestor,
        };
        let reverted = (self.state.best_height()?.unwrap_or(0) - ancestor_header.height).max(0) as usize;
        self.state.revert(snapshot)?;

        for hash in &new_chain {
            let block = match self.state.get_block(hash)? {
                Some(block) => block,
                None => {
                    self.roll_back_to_old_branch(snapshot, &old_chain)?;
                    return Err(StateError::ReorgFailed {
                        attempted_tip: new_tip,
                        rolled_back_to: old_tip,
                        source: Box::new(StateError::BlockNotFound(*hash)),
                    });
                }
            };
            if let Err(err) = self.state.apply_block(block) {
                self.roll_back_to_old_branch(snapshot, &old_chain)?;
                return Err(StateError::ReorgFailed {
                    attempted_tip: new_tip,
                    rolled_back_to: old_tip,
                    source: Box::new(err),
                });
            }
        }

        Ok(ChainReorganized {
            common_ancestor: ancestor,
            old_tip,
            new_tip,
            reverted,
            applied: new_chain.len(),
        })
    }

    /// Restores `snapshot` and reapplies the blocks of the branch that
    /// was canonical before this reorg attempt, undoing whatever prefix
    /// of the new branch made it into state before the failure.
    fn roll_back_to_old_branch(
        &self,
        snapshot: ChainSnapshot,
        old_chain: &[Hash],
    ) -> Result<(), StateError> {
        self.state.revert(snapshot)?;
        for hash in old_chain {
            let block = self
                .state
                .get_block(hash)?
                .ok_or(StateError::BlockNotFound(*hash))?;
            self.state.apply_block(block)?;
        }
        Ok(())
    }
}

fn big_from_i64(value: i64) -> num_bigint::BigUint {
    num_bigint::BigUint::from(value.max(0) as u64)
}
