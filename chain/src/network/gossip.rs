//! Periodic gossip tasks and broadcast helpers.
//!
//! Two background loops run on the same cadence: one merges peer sets
//! with every known peer (when peer sync is enabled), the other spreads
//! every locally pooled election key share. Both skip the node's own
//! endpoint and treat per-peer failures as routine: log at debug level,
//! move on.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::election::ElectionSecret;
use crate::state::ChainState;
use crate::types::{Block, BlockUpdate, Transaction};

/// Sends a transaction to every peer except ourselves.
///
/// Called in the background after a transaction is accepted into the
/// pool, so the vote keeps spreading even if the original sender only
/// reached one node.
pub async fn broadcast_transaction(state: Arc<ChainState>, tx: Transaction) {
    let me = state.config.endpoint();
    for peer in state.snapshot_peers().await {
        if peer == me {
            continue;
        }
        let client = state.client.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            if let Err(e) = client.receive_transaction(&peer, &tx).await {
                tracing::debug!(%peer, "skipping peer for transaction broadcast: {e}");
            }
        });
    }
}

/// Announces a block to every peer except ourselves, tagged with our own
/// endpoint and current chain length.
pub async fn broadcast_block_update(state: Arc<ChainState>, block: Block) {
    let update = BlockUpdate {
        latest_block: block,
        peer: state.config.endpoint(),
        chain_length: state.chain_length().await as u32,
    };

    let me = state.config.endpoint();
    for peer in state.snapshot_peers().await {
        if peer == me {
            continue;
        }
        let client = state.client.clone();
        let update = update.clone();
        tokio::spawn(async move {
            if let Err(e) = client.receive_block_update(&peer, &update).await {
                tracing::debug!(%peer, "skipping peer for block broadcast: {e}");
            }
        });
    }
}

/// Sends one key share to every peer except ourselves, immediately.
///
/// The periodic share gossip re-sends the whole pool each round; this
/// is the eager path used when the operator first contributes their
/// share.
pub async fn broadcast_key_share(state: Arc<ChainState>, share: ElectionSecret) {
    let me = state.config.endpoint();
    for peer in state.snapshot_peers().await {
        if peer == me {
            continue;
        }
        let client = state.client.clone();
        let share = share.clone();
        tokio::spawn(async move {
            if let Err(e) = client.receive_key_share(&peer, &share).await {
                tracing::debug!(%peer, "skipping peer for key-share broadcast: {e}");
            }
        });
    }
}

/// Periodic peer discovery: offer our peer set to every known peer and
/// merge whatever comes back.
///
/// Exits immediately when peer sync is disabled in the configuration,
/// and on the quit signal otherwise.
pub async fn run_peer_sync(state: Arc<ChainState>, mut quit: broadcast::Receiver<()>) {
    if !state.config.sync_peers {
        tracing::info!("peer sync disabled by configuration");
        return;
    }

    let delay = Duration::from_secs(state.config.consensus.sync_delay_secs.max(1));
    let me = state.config.endpoint();

    loop {
        tokio::select! {
            _ = quit.recv() => {
                tracing::debug!("peer sync task quitting");
                return;
            }
            _ = tokio::time::sleep(delay) => {}
        }

        let local = state.snapshot_peers().await;
        for peer in &local {
            if *peer == me {
                continue;
            }
            match state.client.get_peers(peer, &local).await {
                Ok(merged) => {
                    state.merge_peers(merged).await;
                }
                Err(e) => {
                    tracing::debug!(%peer, "skipping peer for sync round: {e}");
                }
            }
        }
    }
}

/// Periodic key-share gossip: send every locally pooled share to every
/// peer.
///
/// Delivery is idempotent on the receiving side, so re-sending the same
/// share each round is harmless and heals missed deliveries.
pub async fn run_share_gossip(state: Arc<ChainState>, mut quit: broadcast::Receiver<()>) {
    let delay = Duration::from_secs(state.config.consensus.sync_delay_secs.max(1));
    let me = state.config.endpoint();

    loop {
        tokio::select! {
            _ = quit.recv() => {
                tracing::debug!("key-share gossip task quitting");
                return;
            }
            _ = tokio::time::sleep(delay) => {}
        }

        let shares = state.snapshot_key_shares().await;
        if shares.is_empty() {
            continue;
        }

        for peer in state.snapshot_peers().await {
            if peer == me {
                continue;
            }
            for share in &shares {
                if let Err(e) = state.client.receive_key_share(&peer, share).await {
                    tracing::debug!(%peer, "skipping peer for share gossip: {e}");
                    break;
                }
            }
        }
    }
}
