//! Top-level configuration for a voting-chain node.
//!
//! A node's entire identity lives in one JSON file produced by the
//! election generator: who it is (vote token, DSA keypair), who it talks
//! to (peer endpoints), what election it takes part in (roster, Paillier
//! public key, its own shares of the election private key and their prime
//! moduli, the ballot format), and its local tuning knobs.
//!
//! The file is read once at startup; nothing is persisted back.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::net::SocketAddr;
use std::path::Path;

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::consensus::ConsensusConfig;
use crate::crypto::bigint::hex_big;
use crate::crypto::dsa::{DsaPrivateKey, DsaPublicKey};
use crate::crypto::paillier::PrivateKey;
use crate::election::{BallotFormat, ElectionSecret};

/// Errors raised while loading a configuration file.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "could not read config file: {e}"),
            ConfigError::Parse(e) => write!(f, "could not parse config file: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Configuration for the Prometheus metrics exporter.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Whether to run a `/metrics` HTTP exporter.
    pub enabled: bool,
    /// Address to bind the metrics HTTP server to.
    pub listen_addr: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        // Safe to unwrap: this is a fixed, valid address literal.
        let addr: SocketAddr = "127.0.0.1:9898"
            .parse()
            .expect("hard-coded metrics listen address should parse");
        Self {
            enabled: true,
            listen_addr: addr,
        }
    }
}

/// Everything a node needs to take part in one election.
///
/// Constant after startup; mutable election state (the chain, the pool,
/// the share pool, the reconstructed key) lives in
/// [`crate::state::ChainState`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Configuration {
    /// This node's reachable address, e.g. `"localhost"`.
    pub my_addr: String,
    /// This node's RPC port.
    pub my_port: u16,
    /// Known peer endpoints (`addr:port`).
    pub peers: HashSet<String>,
    /// Whether the periodic peer-discovery round runs.
    pub sync_peers: bool,

    /// This voter's DSA signing key.
    pub private_key: DsaPrivateKey,
    /// This voter's vote token.
    pub my_token: String,
    /// The roster: every vote token and its registered public key.
    pub vote_tokens: HashMap<String, DsaPublicKey>,

    /// The election Paillier key. λ and μ start out zero everywhere and
    /// are only filled in by threshold reconstruction after polling
    /// closes.
    pub election_key: PrivateKey,
    /// This voter's shares of λ and μ.
    pub election_key_share: ElectionSecret,
    /// Prime modulus the λ shares were evaluated under.
    #[serde(with = "hex_big")]
    pub election_lambda_modulus: BigUint,
    /// Prime modulus the μ shares were evaluated under.
    #[serde(with = "hex_big")]
    pub election_mu_modulus: BigUint,
    /// Number of distinct shares needed to reconstruct the election key.
    pub share_threshold: usize,

    /// What the ballot paper looks like.
    pub ballot_format: BallotFormat,

    /// Consensus protocol constants and local tuning.
    #[serde(default)]
    pub consensus: ConsensusConfig,
    /// Metrics exporter settings.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Configuration {
    /// Loads a configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Configuration, ConfigError> {
        let bytes = std::fs::read(path).map_err(ConfigError::Io)?;
        serde_json::from_slice(&bytes).map_err(ConfigError::Parse)
    }

    /// This node's own endpoint, as it appears in peer sets.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.my_addr, self.my_port)
    }
}
