//! The miner task.
//!
//! The miner is a two-state machine, *idle* and *mining*, driven by
//! signals rather than by jumping back to a start label:
//!
//! - idle → mining on a start signal;
//! - mining → idle on a stop signal, handing the in-progress batch of
//!   transactions back to the stopper and confirming the halt;
//! - mining → mining on every tick and on every sealed block.
//!
//! While mining, each tick drains exactly one block's worth of
//! transactions from the front of the pool, links the new block to the
//! proof of the current chain tip, and scans nonces. The nonce loop
//! polls the stop channel before every hash attempt, so the chain
//! updater is never left waiting behind a long search.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc, oneshot};

use crate::network::gossip;
use crate::state::ChainState;
use crate::types::transaction::current_unix_timestamp;
use crate::types::{Block, BlockHeader, Hash256, Transaction, block::meets_difficulty};

/// Control handle for the miner task.
///
/// A stop is a rendezvous: the call resolves only once the miner has
/// abandoned its search, and it yields whatever batch the miner was
/// working on so the caller can reconcile it back into the pool.
#[derive(Clone)]
pub struct MinerHandle {
    start_tx: mpsc::Sender<()>,
    stop_tx: mpsc::Sender<oneshot::Sender<Vec<Transaction>>>,
}

impl MinerHandle {
    /// Signals the miner to begin (or resume) mining.
    pub async fn start(&self) {
        let _ = self.start_tx.send(()).await;
    }

    /// Signals the miner to stop and waits for its confirmation.
    ///
    /// Returns the batch of transactions the miner was mining, empty if
    /// it was idle or between batches.
    pub async fn stop(&self) -> Vec<Transaction> {
        let (confirm_tx, confirm_rx) = oneshot::channel();
        if self.stop_tx.send(confirm_tx).await.is_err() {
            return Vec::new();
        }
        confirm_rx.await.unwrap_or_default()
    }
}

/// Outcome of one nonce search.
enum Search {
    Sealed(Block),
    Stopped {
        batch: Vec<Transaction>,
        confirm: oneshot::Sender<Vec<Transaction>>,
    },
    Quit,
}

/// Outcome of a mining session, back in the idle loop.
enum Session {
    Idle,
    Quit,
}

/// The miner task itself. Construct with [`Miner::new`], then spawn
/// [`Miner::run`].
pub struct Miner {
    state: Arc<ChainState>,
    start_rx: mpsc::Receiver<()>,
    stop_rx: mpsc::Receiver<oneshot::Sender<Vec<Transaction>>>,
    quit: broadcast::Receiver<()>,
}

impl Miner {
    /// Builds a miner over the shared state and returns it with its
    /// control handle.
    pub fn new(state: Arc<ChainState>, quit: broadcast::Receiver<()>) -> (Miner, MinerHandle) {
        let (start_tx, start_rx) = mpsc::channel(4);
        let (stop_tx, stop_rx) = mpsc::channel(4);

        (
            Miner {
                state,
                start_rx,
                stop_rx,
                quit,
            },
            MinerHandle { start_tx, stop_tx },
        )
    }

    /// Runs the miner until the quit signal.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                _ = self.quit.recv() => {
                    tracing::debug!("miner quitting");
                    return;
                }
                confirm = self.stop_rx.recv() => {
                    // A stop while idle is answered immediately so the
                    // stop-confirm rendezvous can never hang.
                    match confirm {
                        Some(confirm) => {
                            let _ = confirm.send(Vec::new());
                        }
                        None => return,
                    }
                }
                started = self.start_rx.recv() => {
                    match started {
                        Some(()) => {
                            tracing::debug!("miner starting");
                            if let Session::Quit = self.mine().await {
                                return;
                            }
                            tracing::debug!("miner stopped");
                        }
                        None => return,
                    }
                }
            }
        }
    }

    /// The *mining* state: tick, promote a batch when the pool holds a
    /// full block, seal it, repeat.
    async fn mine(&mut self) -> Session {
        let tick = Duration::from_secs(self.state.config.consensus.hashing_delay_secs);

        loop {
            tokio::select! {
                _ = self.quit.recv() => return Session::Quit,
                confirm = self.stop_rx.recv() => {
                    match confirm {
                        Some(confirm) => {
                            let _ = confirm.send(Vec::new());
                            return Session::Idle;
                        }
                        None => return Session::Quit,
                    }
                }
                _ = tokio::time::sleep(tick) => {}
            }

            let Some(batch) = self.take_batch().await else {
                continue;
            };

            match self.seal(batch).await {
                Search::Sealed(block) => self.commit(block).await,
                Search::Stopped { batch, confirm } => {
                    let _ = confirm.send(batch);
                    return Session::Idle;
                }
                Search::Quit => return Session::Quit,
            }
        }
    }

    /// Removes exactly one block's worth of transactions from the front
    /// of the pool, or nothing if the pool is still short.
    async fn take_batch(&self) -> Option<Vec<Transaction>> {
        let block_size = self.state.config.consensus.block_size;
        let mut pool = self.state.pool.lock().await;
        if pool.len() < block_size {
            return None;
        }
        Some(pool.drain(..block_size).collect())
    }

    /// Nonce search over one batch, with the stop channel polled before
    /// every hash attempt.
    async fn seal(&mut self, batch: Vec<Transaction>) -> Search {
        let difficulty = self.state.config.consensus.proof_difficulty;

        let parent_hash = {
            let blocks = self.state.blocks.lock().await;
            blocks.last().map(|b| b.proof).unwrap_or_else(Hash256::zero)
        };

        let mut header = BlockHeader {
            merkle_root: Block::merkle_root_of(&batch),
            parent_hash,
            timestamp: current_unix_timestamp(),
            nonce: 0,
        };

        let started = Instant::now();
        let mut attempts: u64 = 0;

        loop {
            match self.stop_rx.try_recv() {
                Ok(confirm) => return Search::Stopped { batch, confirm },
                Err(mpsc::error::TryRecvError::Empty) => {}
                Err(mpsc::error::TryRecvError::Disconnected) => return Search::Quit,
            }

            let proof = header.compute_proof();
            if meets_difficulty(&proof, difficulty) {
                self.state
                    .metrics
                    .chain
                    .proof_search_seconds
                    .observe(started.elapsed().as_secs_f64());
                return Search::Sealed(Block {
                    transactions: batch,
                    header,
                    proof,
                });
            }

            header.nonce = header.nonce.wrapping_add(1);
            attempts += 1;
            if attempts % 512 == 0 {
                match self.quit.try_recv() {
                    Err(broadcast::error::TryRecvError::Empty) => {}
                    _ => return Search::Quit,
                }
                tokio::task::yield_now().await;
            }
        }
    }

    /// Appends a sealed block: tokens into the seen-set, block onto the
    /// chain, announcement to the peers in the background.
    async fn commit(&self, block: Block) {
        let height = {
            let mut blocks = self.state.blocks.lock().await;
            let mut seen = self.state.seen.lock().await;

            for tx in &block.transactions {
                seen.insert(tx.header.vote_token.clone());
            }
            blocks.push(block.clone());
            blocks.len()
        };

        self.state.metrics.chain.blocks_mined.inc();
        self.state.metrics.chain.chain_height.set(height as i64);
        tracing::info!(
            height,
            proof = %block.proof.to_hex(),
            "mined block"
        );

        let state = self.state.clone();
        tokio::spawn(async move {
            gossip::broadcast_block_update(state, block).await;
        });
    }
}
