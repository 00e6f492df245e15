use std::fmt;

/// Error type returned when a block or chain fails validation.
#[derive(Debug)]
pub enum ValidationError {
    /// A block does not carry exactly the configured number of
    /// transactions.
    WrongTransactionCount { expected: usize, got: usize },
    /// A transaction's signature does not verify, or its token is not in
    /// the roster.
    BadSignature { token: String },
    /// The same vote token appears more than once across the chain.
    DuplicateToken { token: String },
    /// The block's Merkle root does not match its transactions.
    MerkleMismatch,
    /// The block's parent hash does not equal the prior block's proof.
    WrongParent,
    /// The stored proof does not match the recomputed header hash.
    ProofMismatch,
    /// The proof does not meet the required difficulty.
    BelowDifficulty { required: usize },
}

/// High-level errors raised by the chain-update path.
#[derive(Debug)]
pub enum ChainError {
    /// Underlying validation failure.
    Validation(ValidationError),
    /// A fetched alternative chain was not longer than the local one.
    NotLonger { fetched: usize, current: usize },
    /// Fetching a peer's chain failed.
    Network(String),
}

impl From<ValidationError> for ChainError {
    fn from(e: ValidationError) -> Self {
        ChainError::Validation(e)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::WrongTransactionCount { expected, got } => {
                write!(f, "invalid block: has {got} transactions, expected {expected}")
            }
            ValidationError::BadSignature { token } => {
                write!(f, "invalid transaction: bad signature for token {token:?}")
            }
            ValidationError::DuplicateToken { token } => {
                write!(f, "invalid chain: duplicate vote token {token:?}")
            }
            ValidationError::MerkleMismatch => {
                write!(f, "invalid block: merkle root does not match transactions")
            }
            ValidationError::WrongParent => {
                write!(f, "invalid block: parent hash does not match prior proof")
            }
            ValidationError::ProofMismatch => {
                write!(f, "invalid block: stored proof does not match header hash")
            }
            ValidationError::BelowDifficulty { required } => {
                write!(f, "invalid block: proof below difficulty {required}")
            }
        }
    }
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainError::Validation(e) => write!(f, "{e}"),
            ChainError::NotLonger { fetched, current } => write!(
                f,
                "fetched chain of length {fetched} does not beat current length {current}"
            ),
            ChainError::Network(msg) => write!(f, "network error: {msg}"),
        }
    }
}

impl std::error::Error for ValidationError {}
impl std::error::Error for ChainError {}
