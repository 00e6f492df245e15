//! Chain library crate.
//!
//! This crate provides the core building blocks for a peer-to-peer
//! proof-of-work blockchain tailored to electronic voting:
//!
//! - cryptographic primitives (`crypto`): Paillier encryption with
//!   homomorphic addition, Shamir secret sharing, DSA signatures,
//! - the ballot model (`election`),
//! - strongly-typed ledger types (`types`): transactions, blocks,
//!   Merkle roots, proofs-of-work,
//! - consensus (`consensus`): validation, the miner task, and the
//!   chain-update task implementing the longest-chain rule,
//! - shared node state (`state`) with its locking discipline,
//! - peer networking (`network`): the outbound RPC client and gossip,
//! - homomorphic tallying (`tally`),
//! - Prometheus-based metrics (`metrics`),
//! - and the top-level node configuration (`config`).
//!
//! Higher-level binaries compose these pieces into voter nodes; the
//! RPC routes themselves live with the binary.

pub mod config;
pub mod consensus;
pub mod crypto;
pub mod election;
pub mod metrics;
pub mod network;
pub mod state;
pub mod tally;
pub mod types;

// Re-export top-level configuration types.
pub use config::{ConfigError, Configuration, MetricsConfig};

// Re-export "core" consensus types and tasks.
pub use consensus::{
    BlockValidator, ChainError, ChainUpdater, ConsensusConfig, Miner, MinerHandle, ValidationError,
};

// Re-export the crypto surface.
pub use crypto::{
    CryptoError, DsaParameters, DsaPrivateKey, DsaPublicKey, DsaSignature, PrivateKey, PublicKey,
    Share, divide_secret, interpolate,
};

// Re-export the ballot model.
pub use election::{Ballot, BallotFormat, ElectionError, ElectionSecret, Selection};

// Re-export shared state and networking.
pub use network::{NetworkError, PeerClient};
pub use state::ChainState;

// Re-export metrics registry and exporter.
pub use metrics::{ChainMetrics, MetricsRegistry, run_prometheus_http_server};

// Re-export domain types at the crate root for convenience.
pub use types::*;
