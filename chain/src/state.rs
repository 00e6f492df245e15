//! Shared mutable state of a node.
//!
//! One [`ChainState`] exists per node. Every resource in it sits behind
//! its own `tokio::sync::Mutex`; at any moment at most one task holds a
//! given resource, which serialises all access without a global lock.
//!
//! Tasks that need more than one resource at a time MUST acquire them in
//! this fixed order, and only this order:
//!
//! 1. committed blocks
//! 2. seen-set
//! 3. transaction pool
//! 4. current batch
//! 5. peer set
//! 6. key-share pool
//! 7. election key
//!
//! The current batch holds its place in the order but has no field
//! here: it lives in the miner's own scope and changes hands only
//! through the stop rendezvous, so its slot is never actually locked.
//! The election key is appended at the tail of the order; it backs
//! reconstruction and tallying and is always acquired last.
//!
//! Skipping entries is fine; acquiring out of order is a deadlock
//! waiting to happen.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use num_bigint::BigUint;
use tokio::sync::{Mutex, mpsc};

use crate::config::Configuration;
use crate::crypto::CryptoError;
use crate::crypto::paillier::PrivateKey;
use crate::crypto::shamir::interpolate;
use crate::election::{Ballot, ElectionSecret};
use crate::metrics::MetricsRegistry;
use crate::network::client::{NetworkError, PeerClient};
use crate::network::gossip;
use crate::types::{Block, BlockUpdate, Transaction};

/// Shared state of one chain node.
///
/// Handlers and background tasks share this through an [`Arc`]; the
/// configuration and metrics handles are immutable, everything else is
/// mutex-guarded per the module-level locking order.
pub struct ChainState {
    /// Node configuration, constant after startup.
    pub config: Configuration,
    /// Metrics registry shared with the exporter.
    pub metrics: Arc<MetricsRegistry>,
    /// Outbound RPC client used for gossip and re-broadcasts.
    pub client: PeerClient,

    pub(crate) blocks: Mutex<Vec<Block>>,
    pub(crate) seen: Mutex<HashSet<String>>,
    pub(crate) pool: Mutex<VecDeque<Transaction>>,
    pub(crate) peers: Mutex<HashSet<String>>,
    pub(crate) key_shares: Mutex<HashMap<u64, ElectionSecret>>,
    pub(crate) election_key: Mutex<PrivateKey>,

    update_tx: mpsc::Sender<BlockUpdate>,
}

impl ChainState {
    /// Builds the state for one node and the queue feeding its
    /// chain-update task.
    ///
    /// The node's own endpoint is inserted into the peer set, as the
    /// generator's peer graphs rely on every node knowing itself.
    pub fn new(
        config: Configuration,
        metrics: Arc<MetricsRegistry>,
    ) -> Result<(Arc<ChainState>, mpsc::Receiver<BlockUpdate>), NetworkError> {
        let (update_tx, update_rx) = mpsc::channel(64);

        let mut peers = config.peers.clone();
        peers.insert(config.endpoint());

        let election_key = config.election_key.clone();
        let client = PeerClient::new(Duration::from_secs(2))?;

        let state = Arc::new(ChainState {
            config,
            metrics,
            client,
            blocks: Mutex::new(Vec::new()),
            seen: Mutex::new(HashSet::new()),
            pool: Mutex::new(VecDeque::new()),
            peers: Mutex::new(peers),
            key_shares: Mutex::new(HashMap::new()),
            election_key: Mutex::new(election_key),
            update_tx,
        });

        Ok((state, update_rx))
    }

    /// Ingests a transaction received from a client or peer.
    ///
    /// Fails silently (returning `false`) when the vote token was already
    /// sealed into a block or is already waiting in the pool, or when the
    /// signature does not verify. On success the transaction joins the
    /// pool and is re-broadcast to peers in the background.
    pub async fn add_received_transaction(self: &Arc<Self>, tx: Transaction) -> bool {
        let token = tx.header.vote_token.clone();

        {
            let seen = self.seen.lock().await;
            let mut pool = self.pool.lock().await;

            if seen.contains(&token) {
                tracing::debug!(%token, "dropping transaction: token already in a block");
                self.metrics.chain.transactions_rejected.inc();
                return false;
            }
            if pool.iter().any(|t| t.header.vote_token == token) {
                tracing::debug!(%token, "dropping transaction: token already pooled");
                self.metrics.chain.transactions_rejected.inc();
                return false;
            }
            if !tx.verify_signature(&self.config.vote_tokens) {
                self.metrics.chain.transactions_rejected.inc();
                return false;
            }

            pool.push_back(tx.clone());
            self.metrics.chain.transactions_received.inc();
        }

        tracing::info!(%token, "transaction added to pool");
        let state = self.clone();
        tokio::spawn(async move {
            gossip::broadcast_transaction(state, tx).await;
        });
        true
    }

    /// Queues a block announcement for the chain-update task.
    pub async fn add_received_block_update(&self, update: BlockUpdate) {
        self.metrics.chain.block_updates_received.inc();
        if self.update_tx.send(update).await.is_err() {
            tracing::warn!("chain updater is gone; dropping block update");
        }
    }

    /// Inserts a key share into the pool, keyed by the x-coordinate of
    /// its λ share. Duplicate deliveries are no-ops.
    pub async fn add_received_key_share(&self, share: ElectionSecret) {
        let mut shares = self.key_shares.lock().await;
        shares.entry(share.lambda.x).or_insert(share);
    }

    /// Snapshot of the committed chain.
    pub async fn snapshot_chain(&self) -> Vec<Block> {
        self.blocks.lock().await.clone()
    }

    /// Length of the committed chain.
    pub async fn chain_length(&self) -> usize {
        self.blocks.lock().await.len()
    }

    /// Snapshot of the not-yet-mined transaction pool.
    pub async fn snapshot_pool(&self) -> Vec<Transaction> {
        self.pool.lock().await.iter().cloned().collect()
    }

    /// Snapshot of the known peer endpoints.
    pub async fn snapshot_peers(&self) -> HashSet<String> {
        self.peers.lock().await.clone()
    }

    /// Merges a caller's peer set into ours and returns the union.
    pub async fn merge_peers(&self, incoming: HashSet<String>) -> HashSet<String> {
        let mut peers = self.peers.lock().await;
        peers.extend(incoming);
        peers.clone()
    }

    /// Snapshot of the pooled election key shares.
    pub async fn snapshot_key_shares(&self) -> Vec<ElectionSecret> {
        self.key_shares.lock().await.values().cloned().collect()
    }

    /// All ballots sealed into the committed chain, in chain order.
    pub async fn collect_ballots(&self) -> Vec<Ballot> {
        let blocks = self.blocks.lock().await;
        blocks
            .iter()
            .flat_map(|b| b.transactions.iter().map(|tx| tx.ballot.clone()))
            .collect()
    }

    /// Reconstructs the election private key from the pooled shares.
    ///
    /// Requires at least the configured threshold of distinct shares; λ
    /// and μ are interpolated separately, each under its own recorded
    /// prime modulus, and installed into the local election key.
    pub async fn reconstruct_election_key(&self) -> Result<(), CryptoError> {
        let (lambda_points, mu_points) = {
            let shares = self.key_shares.lock().await;
            if shares.len() < self.config.share_threshold {
                return Err(CryptoError::BelowThreshold {
                    have: shares.len(),
                    need: self.config.share_threshold,
                });
            }
            let lambda = shares.values().map(|s| s.lambda.clone()).collect::<Vec<_>>();
            let mu = shares.values().map(|s| s.mu.clone()).collect::<Vec<_>>();
            (lambda, mu)
        };

        let lambda = interpolate(&lambda_points, &self.config.election_lambda_modulus)?;
        let mu = interpolate(&mu_points, &self.config.election_mu_modulus)?;

        let mut key = self.election_key.lock().await;
        key.lambda = lambda;
        key.mu = mu;
        tracing::info!("election private key reconstructed from shares");
        Ok(())
    }

    /// Tallies the election: collects every sealed ballot, homomorphically
    /// sums the ciphertexts per selection, and decrypts only the sums.
    ///
    /// Fails with an invalid-key error until the election key has been
    /// reconstructed.
    pub async fn tally(&self) -> Result<BTreeMap<String, BigUint>, CryptoError> {
        let ballots = self.collect_ballots().await;
        let key = self.election_key.lock().await.clone();
        crate::tally::tally_ballots(&ballots, &key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::{DummyElection, dummy_election};
    use crate::consensus::ConsensusConfig;
    use crate::types::Hash256;

    fn test_state(election: &DummyElection, voter: usize) -> Arc<ChainState> {
        let metrics = Arc::new(MetricsRegistry::new().expect("metrics"));
        let (state, _updates) =
            ChainState::new(election.configs[voter].clone(), metrics).expect("state");
        state
    }

    #[tokio::test]
    async fn accepted_transactions_join_the_pool_once() {
        let election = dummy_election(&["A", "B"], 1, ConsensusConfig::default());
        let state = test_state(&election, 0);

        assert!(state.add_received_transaction(election.transaction("A")).await);
        assert_eq!(state.snapshot_pool().await.len(), 1);

        // Same token again: silently dropped, pool unchanged.
        assert!(!state.add_received_transaction(election.transaction("A")).await);
        assert_eq!(state.snapshot_pool().await.len(), 1);
    }

    #[tokio::test]
    async fn tokens_already_sealed_into_a_block_are_rejected() {
        let election = dummy_election(&["A", "B"], 1, ConsensusConfig::default());
        let state = test_state(&election, 0);

        state.seen.lock().await.insert("A".to_string());

        assert!(!state.add_received_transaction(election.transaction("A")).await);
        assert!(state.snapshot_pool().await.is_empty());
    }

    #[tokio::test]
    async fn transactions_with_unknown_tokens_are_rejected() {
        let election = dummy_election(&["A", "B"], 1, ConsensusConfig::default());
        let outsider = dummy_election(&["Z"], 1, ConsensusConfig::default());
        let state = test_state(&election, 0);

        assert!(!state.add_received_transaction(outsider.transaction("Z")).await);
        assert!(state.snapshot_pool().await.is_empty());
    }

    #[tokio::test]
    async fn key_share_insertion_is_idempotent_per_coordinate() {
        let election = dummy_election(&["A", "B", "C"], 2, ConsensusConfig::default());
        let state = test_state(&election, 0);

        let share = election.configs[0].election_key_share.clone();
        state.add_received_key_share(share.clone()).await;
        state.add_received_key_share(share).await;
        assert_eq!(state.snapshot_key_shares().await.len(), 1);

        state
            .add_received_key_share(election.configs[1].election_key_share.clone())
            .await;
        assert_eq!(state.snapshot_key_shares().await.len(), 2);
    }

    #[tokio::test]
    async fn reconstruction_needs_the_threshold() {
        let election = dummy_election(&["A", "B", "C"], 2, ConsensusConfig::default());
        let state = test_state(&election, 0);

        state
            .add_received_key_share(election.configs[0].election_key_share.clone())
            .await;
        assert!(matches!(
            state.reconstruct_election_key().await,
            Err(CryptoError::BelowThreshold { have: 1, need: 2 })
        ));

        state
            .add_received_key_share(election.configs[2].election_key_share.clone())
            .await;
        state
            .reconstruct_election_key()
            .await
            .expect("threshold reached");

        let key = state.election_key.lock().await;
        assert_eq!(key.lambda, election.election_key.lambda);
        assert_eq!(key.mu, election.election_key.mu);
    }

    #[tokio::test]
    async fn ballots_are_collected_in_chain_order_and_tallied() {
        let election = dummy_election(&["A", "B", "C", "D"], 2, ConsensusConfig::default());
        let state = test_state(&election, 0);

        // Seal two blocks' worth of votes straight into the chain.
        let first = Block::mine(
            vec![election.transaction("A"), election.transaction("B")],
            Hash256::zero(),
            1_700_000_000,
            1,
        );
        let second = Block::mine(
            vec![election.transaction("C"), election.transaction("D")],
            first.proof,
            1_700_000_001,
            1,
        );
        {
            let mut blocks = state.blocks.lock().await;
            blocks.push(first);
            blocks.push(second);
        }

        let ballots = state.collect_ballots().await;
        assert_eq!(ballots.len(), 4);
        assert_eq!(ballots[0].vote_token, "A");
        assert_eq!(ballots[3].vote_token, "D");

        // Without the key the tally must refuse.
        assert!(matches!(
            state.tally().await,
            Err(CryptoError::InvalidDecryptionKey)
        ));

        // Reconstruct from any two shares, then count. Every dummy
        // ballot votes [1, 0].
        for voter in [1, 3] {
            state
                .add_received_key_share(election.configs[voter].election_key_share.clone())
                .await;
        }
        state
            .reconstruct_election_key()
            .await
            .expect("reconstruct");

        let results = state.tally().await.expect("tally");
        assert_eq!(results["Alice"], BigUint::from(4_u32));
        assert_eq!(results["Bob"], BigUint::from(0_u32));
    }

    #[tokio::test]
    async fn merge_peers_returns_the_union() {
        let election = dummy_election(&["A"], 1, ConsensusConfig::default());
        let state = test_state(&election, 0);

        let before = state.snapshot_peers().await;
        assert!(before.contains(&state.config.endpoint()));

        let merged = state
            .merge_peers(HashSet::from(["localhost:9555".to_string()]))
            .await;
        assert!(merged.contains("localhost:9555"));
        assert!(merged.is_superset(&before));
    }
}
