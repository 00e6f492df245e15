//! The chain-update task.
//!
//! A single consumer of block announcements, and the only task allowed
//! to stop the miner. For each announcement it tries, in order:
//!
//! 1. extending the committed chain with the announced block, validating
//!    the whole result;
//! 2. if that fails and the announcer claims a longer chain, fetching
//!    that entire chain and validating it from genesis;
//! 3. otherwise dropping the announcement without touching state.
//!
//! Adopting a candidate is a stop-the-miner rendezvous: the miner hands
//! back its in-progress batch, the chain and seen-set are swapped, the
//! pool is reconciled (old pool ∪ returned batch ∪ transactions lost to
//! the fork, minus everything sealed in the new chain), the block is
//! re-broadcast, and the miner resumes.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};

use crate::network::gossip;
use crate::state::ChainState;
use crate::types::{Block, BlockUpdate, Transaction};

use super::error::ChainError;
use super::miner::MinerHandle;
use super::validator::BlockValidator;

/// The chain-update task. Construct with [`ChainUpdater::new`], then
/// spawn [`ChainUpdater::run`].
pub struct ChainUpdater {
    state: Arc<ChainState>,
    validator: BlockValidator,
    miner: MinerHandle,
    update_rx: mpsc::Receiver<BlockUpdate>,
    quit: broadcast::Receiver<()>,
}

impl ChainUpdater {
    pub fn new(
        state: Arc<ChainState>,
        miner: MinerHandle,
        update_rx: mpsc::Receiver<BlockUpdate>,
        quit: broadcast::Receiver<()>,
    ) -> ChainUpdater {
        let validator = BlockValidator::new(&state.config.consensus);
        ChainUpdater {
            state,
            validator,
            miner,
            update_rx,
            quit,
        }
    }

    /// Consumes block announcements until the quit signal.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                _ = self.quit.recv() => {
                    tracing::debug!("chain updater quitting");
                    return;
                }
                update = self.update_rx.recv() => {
                    match update {
                        Some(update) => {
                            if let Err(e) = self.process(update).await {
                                tracing::info!("dropping block update: {e}");
                            }
                        }
                        None => return,
                    }
                }
            }
        }
    }

    /// Handles one announcement end to end.
    async fn process(&mut self, update: BlockUpdate) -> Result<(), ChainError> {
        let current = self.state.snapshot_chain().await;
        let roster = &self.state.config.vote_tokens;

        // 1. Does the announced block simply extend our chain?
        let mut extended = current.clone();
        extended.push(update.latest_block.clone());

        let (candidate, new_seen) = match self.validator.validate_chain(&extended, roster) {
            Ok(seen) => (extended, seen),
            Err(extend_err) => {
                // 2. No. If the announcer claims a longer chain, fetch
                //    and validate it whole.
                if update.chain_length as usize <= current.len() {
                    return Err(extend_err.into());
                }
                tracing::info!(
                    peer = %update.peer,
                    claimed = update.chain_length,
                    current = current.len(),
                    "fetching alternative chain"
                );
                let fetched = self
                    .state
                    .client
                    .get_chain(&update.peer)
                    .await
                    .map_err(|e| ChainError::Network(e.to_string()))?;
                if fetched.len() < current.len() {
                    return Err(ChainError::NotLonger {
                        fetched: fetched.len(),
                        current: current.len(),
                    });
                }
                let seen = self.validator.validate_chain(&fetched, roster)?;
                (fetched, seen)
            }
        };

        self.adopt(current, candidate, new_seen, update.latest_block)
            .await;
        Ok(())
    }

    /// Replaces the committed chain with a validated candidate.
    async fn adopt(
        &mut self,
        old_chain: Vec<Block>,
        candidate: Vec<Block>,
        new_seen: HashSet<String>,
        announced: Block,
    ) {
        // Stop the miner first; only then take the state locks, so the
        // miner can finish any commit it is in the middle of.
        let returned_batch = self.miner.stop().await;

        let height = {
            let mut blocks = self.state.blocks.lock().await;
            let mut seen = self.state.seen.lock().await;
            let mut pool = self.state.pool.lock().await;

            let lost = transactions_lost_to_fork(&old_chain, &new_seen);
            let reclaimed: Vec<Transaction> = pool
                .drain(..)
                .chain(returned_batch)
                .chain(lost)
                .collect();

            let mut pooled_tokens = HashSet::new();
            for tx in reclaimed {
                let token = &tx.header.vote_token;
                if new_seen.contains(token) || !pooled_tokens.insert(token.clone()) {
                    continue;
                }
                pool.push_back(tx);
            }

            *blocks = candidate;
            *seen = new_seen;
            blocks.len()
        };

        self.state.metrics.chain.chain_replacements.inc();
        self.state.metrics.chain.chain_height.set(height as i64);
        tracing::info!(height, "committed chain replaced");

        let state = self.state.clone();
        tokio::spawn(async move {
            gossip::broadcast_block_update(state, announced).await;
        });

        self.miner.start().await;
    }
}

/// Transactions present in the old chain whose tokens are absent from
/// the new seen-set: these were "lost" to the fork and go back to the
/// pool.
fn transactions_lost_to_fork(old_chain: &[Block], new_seen: &HashSet<String>) -> Vec<Transaction> {
    old_chain
        .iter()
        .flat_map(|b| b.transactions.iter())
        .filter(|tx| !new_seen.contains(&tx.header.vote_token))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::{DummyElection, dummy_election};
    use crate::consensus::ConsensusConfig;
    use crate::consensus::miner::Miner;
    use crate::metrics::MetricsRegistry;
    use crate::types::Hash256;
    use std::time::Duration;

    fn fast_consensus() -> ConsensusConfig {
        ConsensusConfig {
            block_size: 2,
            proof_difficulty: 1,
            hashing_delay_secs: 0,
            sync_delay_secs: 60,
        }
    }

    /// Mines a chain of the given batches outside any node.
    fn mine_chain(election: &DummyElection, batches: &[&[&str]]) -> Vec<Block> {
        let mut parent = Hash256::zero();
        let mut blocks = Vec::new();
        for batch in batches {
            let txs: Vec<Transaction> =
                batch.iter().map(|t| election.transaction(t)).collect();
            let block = Block::mine(txs, parent, 1_700_000_000, 1);
            parent = block.proof;
            blocks.push(block);
        }
        blocks
    }

    struct TestNode {
        state: Arc<ChainState>,
        miner: MinerHandle,
        _quit_tx: broadcast::Sender<()>,
    }

    fn spawn_node(election: &DummyElection, voter: usize) -> TestNode {
        let metrics = Arc::new(MetricsRegistry::new().expect("metrics"));
        let (state, update_rx) =
            ChainState::new(election.configs[voter].clone(), metrics).expect("state");

        let (quit_tx, _) = broadcast::channel(4);
        let (miner, miner_handle) = Miner::new(state.clone(), quit_tx.subscribe());
        tokio::spawn(miner.run());

        let updater = ChainUpdater::new(
            state.clone(),
            miner_handle.clone(),
            update_rx,
            quit_tx.subscribe(),
        );
        tokio::spawn(updater.run());

        TestNode {
            state,
            miner: miner_handle,
            _quit_tx: quit_tx,
        }
    }

    async fn wait_for_height(state: &Arc<ChainState>, height: usize) {
        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                if state.chain_length().await >= height {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("chain should reach the expected height in time");
    }

    #[tokio::test]
    async fn an_extending_block_is_appended() {
        let election = dummy_election(&["A", "B"], 1, fast_consensus());
        let node = spawn_node(&election, 0);

        let chain = mine_chain(&election, &[&["A", "B"]]);
        node.state
            .add_received_block_update(BlockUpdate {
                latest_block: chain[0].clone(),
                peer: "localhost:9999".to_string(),
                chain_length: 1,
            })
            .await;

        wait_for_height(&node.state, 1).await;
        let committed = node.state.snapshot_chain().await;
        assert_eq!(committed, chain);

        let seen = node.state.seen.lock().await;
        assert!(seen.contains("A") && seen.contains("B"));
    }

    #[tokio::test]
    async fn an_invalid_block_with_no_longer_chain_is_dropped() {
        let election = dummy_election(&["A", "B"], 1, fast_consensus());
        let node = spawn_node(&election, 0);

        // A block whose parent is not our tip and whose announcer does
        // not claim a longer chain.
        let mut chain = mine_chain(&election, &[&["A", "B"]]);
        chain[0].header.parent_hash = Hash256::compute(b"someone else's tip");

        node.state
            .add_received_block_update(BlockUpdate {
                latest_block: chain[0].clone(),
                peer: "localhost:9999".to_string(),
                chain_length: 1,
            })
            .await;

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(node.state.chain_length().await, 0);
    }

    #[tokio::test]
    async fn duplicate_tokens_relative_to_the_chain_are_rejected() {
        let election = dummy_election(&["A", "B"], 1, fast_consensus());
        let node = spawn_node(&election, 0);

        let chain = mine_chain(&election, &[&["A", "B"]]);
        node.state
            .add_received_block_update(BlockUpdate {
                latest_block: chain[0].clone(),
                peer: "localhost:9999".to_string(),
                chain_length: 1,
            })
            .await;
        wait_for_height(&node.state, 1).await;

        // A second block re-using token A on top of the same parent.
        let dup = Block::mine(
            vec![election.transaction("A"), election.transaction("B")],
            chain[0].proof,
            1_700_000_001,
            1,
        );
        node.state
            .add_received_block_update(BlockUpdate {
                latest_block: dup,
                peer: "localhost:9999".to_string(),
                chain_length: 2,
            })
            .await;

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(node.state.chain_length().await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn fork_resolution_adopts_the_longer_chain_and_reclaims_votes() {
        let election = dummy_election(&["A", "B", "C", "D", "E", "F"], 1, fast_consensus());

        // The "remote" node mines the longer chain [G, B1', B2'].
        let remote = spawn_node(&election, 1);
        let longer = mine_chain(&election, &[&["A", "B"], &["C", "D"]]);
        for (i, block) in longer.iter().enumerate() {
            remote
                .state
                .add_received_block_update(BlockUpdate {
                    latest_block: block.clone(),
                    peer: "localhost:9999".to_string(),
                    chain_length: (i + 1) as u32,
                })
                .await;
        }
        wait_for_height(&remote.state, 2).await;

        // Serve the remote chain over the real RPC surface.
        let remote_chain = remote.state.snapshot_chain().await;
        let app = axum_test_router(remote_chain.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let remote_endpoint = format!("127.0.0.1:{}", listener.local_addr().unwrap().port());
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve");
        });

        // The local node holds a conflicting single-block chain [G, B1]
        // sharing token A, plus a pooled vote for F.
        let local = spawn_node(&election, 0);
        let local_chain = mine_chain(&election, &[&["A", "E"]]);
        local
            .state
            .add_received_block_update(BlockUpdate {
                latest_block: local_chain[0].clone(),
                peer: "localhost:9999".to_string(),
                chain_length: 1,
            })
            .await;
        wait_for_height(&local.state, 1).await;
        local
            .state
            .pool
            .lock()
            .await
            .push_back(election.transaction("F"));

        // The fork announcement: B2' on a chain of claimed length 2.
        local
            .state
            .add_received_block_update(BlockUpdate {
                latest_block: longer[1].clone(),
                peer: remote_endpoint,
                chain_length: 2,
            })
            .await;

        wait_for_height(&local.state, 2).await;
        assert_eq!(local.state.snapshot_chain().await, remote_chain);

        // E's vote was lost to the fork and returns to the pool; A is in
        // the new chain and must not; F survives.
        let pool_tokens: Vec<String> = local
            .state
            .snapshot_pool()
            .await
            .iter()
            .map(|tx| tx.header.vote_token.clone())
            .collect();
        assert!(pool_tokens.contains(&"E".to_string()));
        assert!(pool_tokens.contains(&"F".to_string()));
        assert!(!pool_tokens.contains(&"A".to_string()));

        // The miner was resumed after the swap.
        let batch = local.miner.stop().await;
        local.miner.start().await;
        drop(batch);
    }

    /// Minimal axum app serving a fixed chain at `GET /chain`.
    fn axum_test_router(chain: Vec<Block>) -> axum::Router {
        use axum::{Json, Router, extract::State, routing::get};
        use std::sync::Arc as StdArc;

        async fn get_chain(State(chain): State<StdArc<Vec<Block>>>) -> Json<Vec<Block>> {
            Json((*chain).clone())
        }

        Router::new()
            .route("/chain", get(get_chain))
            .with_state(StdArc::new(chain))
    }
}
