use thiserror::Error;
use spacetime_core::Hash;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConsensusError {
    #[error("core data model error: {0}")]
    Core(#[from] spacetime_core::CoreError),

    // --- epoch errors ---
    #[error("epoch mismatch: expected {expected}, got {actual}")]
    EpochMismatch { expected: i64, actual: i64 },
    #[error("challenge mismatch: expected {expected}, got {actual}")]
    ChallengeMismatch { expected: Hash, actual: Hash },

    // --- proof errors ---
    #[error("proof plot root does not match header plot root")]
    PlotRootMismatch,
    #[error("proof score does not match header proof score")]
    ScoreMismatch,
    #[error("proof score {score} does not meet target {target}")]
    TargetNotMet { score: String, target: String },
    #[error("leaf index {index} out of range for plot with {leaf_count} leaves")]
    LeafIndexOutOfRange { index: i64, leaf_count: i64 },
    #[error("merkle path does not reconstruct the committed plot root")]
    InvalidMerklePath,

    // --- difficulty errors ---
    #[error("difficulty retarget requires a positive current difficulty and timespan")]
    InvalidRetargetInput,

    // --- transaction errors ---
    #[error("transaction sender and recipient must differ")]
    SelfTransfer,
    #[error("transaction amount must be positive")]
    NonPositiveAmount,
    #[error("transaction nonce must be non-negative")]
    NegativeNonce,
    #[error("transaction fee must be non-negative")]
    NegativeFee,
    #[error("transaction fee {fee} below minimum {minimum}")]
    FeeTooLow { fee: i64, minimum: i64 },
    #[error("transaction fee {fee} above maximum {maximum}")]
    FeeTooHigh { fee: i64, maximum: i64 },
    #[error("transaction is unsigned")]
    TransactionNotSigned,
    #[error("transaction signature is invalid")]
    InvalidTransactionSignature,
    #[error("duplicate transaction within block")]
    DuplicateTransaction,
    #[error("transaction nonce {actual} does not match expected {expected}")]
    InvalidNonce { expected: i64, actual: i64 },
    #[error("sender balance {balance} insufficient for amount {amount} plus fee {fee}")]
    InsufficientBalance {
        balance: i64,
        amount: i64,
        fee: i64,
    },

    // --- block errors ---
    #[error("unsupported block version {0}")]
    UnsupportedVersion(u8),
    #[error("block header is not signed")]
    HeaderNotSigned,
    #[error("block header signature is invalid")]
    InvalidHeaderSignature,
    #[error("block timestamp {timestamp} too far in the future (max drift {max_drift}s from {now})")]
    TimestampTooFarInFuture {
        timestamp: i64,
        now: i64,
        max_drift: i64,
    },
    #[error("block timestamp {timestamp} is not after parent timestamp {parent_timestamp}")]
    TimestampNotMonotonic {
        timestamp: i64,
        parent_timestamp: i64,
    },
    #[error("block height {actual} does not follow parent height {expected}")]
    InvalidHeight { expected: i64, actual: i64 },
    #[error("block transaction root {actual} does not match computed root {expected}")]
    InvalidTransactionRoot { expected: Hash, actual: Hash },
    #[error("transaction at index {index} invalid: {source}")]
    InvalidTransactionAt {
        index: usize,
        #[source]
        source: Box<ConsensusError>,
    },
    #[error("block proof invalid: {0}")]
    InvalidProof(Box<ConsensusError>),
    #[error("parent block not found")]
    ParentNotFound,
}
