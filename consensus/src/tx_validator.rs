use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use spacetime_core::{Hash, Transaction, TRANSACTION_VERSION};

use crate::account_reader::AccountStateReader;
use crate::chain_context::ChainContext;
use crate::error::ConsensusError;
use crate::overlay::StateOverlay;

/// Grounded in the teacher's `node::validator::BlockValidator::apply_block`
/// per-transaction checks, narrowed from four transaction variants to the
/// single transfer shape this data model carries.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct TransactionValidatorConfig {
    pub min_fee: i64,
    pub max_fee: i64,
}

impl Default for TransactionValidatorConfig {
    fn default() -> Self {
        TransactionValidatorConfig {
            min_fee: 1,
            max_fee: 1_000_000,
        }
    }
}

impl TransactionValidatorConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.min_fee < 0 {
            return Err("min_fee must be non-negative".into());
        }
        if self.max_fee < self.min_fee {
            return Err("max_fee must be >= min_fee".into());
        }
        Ok(())
    }
}

pub struct TransactionValidator {
    config: TransactionValidatorConfig,
}

impl TransactionValidator {
    pub fn new(config: TransactionValidatorConfig) -> Self {
        TransactionValidator { config }
    }

    /// Structural checks independent of any chain state: sender and
    /// recipient differ, amount is positive, nonce and fee are
    /// non-negative, and the transaction carries a version this
    /// validator understands.
    fn validate_basic(&self, tx: &Transaction) -> Result<(), ConsensusError> {
        if tx.version != TRANSACTION_VERSION {
            return Err(ConsensusError::UnsupportedVersion(tx.version));
        }
        if tx.sender == tx.recipient {
            return Err(ConsensusError::SelfTransfer);
        }
        if tx.amount <= 0 {
            return Err(ConsensusError::NonPositiveAmount);
        }
        if tx.nonce < 0 {
            return Err(ConsensusError::NegativeNonce);
        }
        if tx.fee < 0 {
            return Err(ConsensusError::NegativeFee);
        }
        Ok(())
    }

    fn validate_fee_bounds(&self, tx: &Transaction) -> Result<(), ConsensusError> {
        if tx.fee < self.config.min_fee {
            return Err(ConsensusError::FeeTooLow {
                fee: tx.fee,
                minimum: self.config.min_fee,
            });
        }
        if tx.fee > self.config.max_fee {
            return Err(ConsensusError::FeeTooHigh {
                fee: tx.fee,
                maximum: self.config.max_fee,
            });
        }
        Ok(())
    }

    fn validate_signature(&self, tx: &Transaction) -> Result<(), ConsensusError> {
        if !tx.is_signed() {
            return Err(ConsensusError::TransactionNotSigned);
        }
        if !tx.verify_signature() {
            return Err(ConsensusError::InvalidTransactionSignature);
        }
        Ok(())
    }

    /// Runs the ordered standalone checks (basic rules, version, fee
    /// bounds, signature) that don't need chain state or in-block
    /// context. Used by the mempool on insertion.
    pub fn validate_standalone(&self, tx: &Transaction) -> Result<(), ConsensusError> {
        self.validate_basic(tx)?;
        self.validate_fee_bounds(tx)?;
        self.validate_signature(tx)?;
        Ok(())
    }

    /// Runs the standalone checks plus the duplicate and nonce/balance
    /// checks against `overlay`, then applies the transfer to the
    /// overlay so the next call in the same block sees its effect.
    /// `seen` accumulates transaction ids across a block to catch an
    /// exact duplicate transaction appearing twice; `chain` is consulted
    /// so a transaction already confirmed in an earlier block is
    /// rejected as a duplicate on replay, not just re-admitted.
    pub fn validate_and_apply<R: ChainContext + ?Sized>(
        &self,
        tx: &Transaction,
        chain: &R,
        overlay: &mut StateOverlay<'_, R>,
        seen: &mut HashSet<Hash>,
    ) -> Result<(), ConsensusError> {
        self.validate_standalone(tx)?;

        let tx_id = tx.id()?;
        if !seen.insert(tx_id) || chain.is_transaction_confirmed(&tx_id) {
            return Err(ConsensusError::DuplicateTransaction);
        }

        let sender_state = overlay.get(&tx.sender);
        if tx.nonce != sender_state.nonce {
            return Err(ConsensusError::InvalidNonce {
                expected: sender_state.nonce,
                actual: tx.nonce,
            });
        }
        let required = tx.amount + tx.fee;
        if sender_state.balance < required {
            return Err(ConsensusError::InsufficientBalance {
                balance: sender_state.balance,
                amount: tx.amount,
                fee: tx.fee,
            });
        }

        overlay.apply_transfer(&tx.sender, &tx.recipient, tx.amount, tx.fee);
        Ok(())
    }
}
