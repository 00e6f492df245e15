use serde::{Deserialize, Serialize};

/// Consensus configuration parameters.
///
/// These are protocol constants: every node in an election must run with
/// the same block size and proof difficulty or blocks will not validate
/// across the network. The delays are local tuning knobs.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusConfig {
    /// Exact number of transactions sealed into every block.
    pub block_size: usize,
    /// Number of leading hex zeros a block proof must have.
    pub proof_difficulty: usize,
    /// Seconds between the miner's pool-poll ticks.
    pub hashing_delay_secs: u64,
    /// Seconds between gossip rounds (peer sync and key-share spread).
    pub sync_delay_secs: u64,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            block_size: 10,
            proof_difficulty: 4,
            hashing_delay_secs: 3,
            sync_delay_secs: 10,
        }
    }
}
