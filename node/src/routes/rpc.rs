//! Node-to-node RPC handlers.
//!
//! These are the inbound half of the peer protocol; the outbound half is
//! `chain::network::client::PeerClient`. Bodies are plain JSON encodings
//! of the chain types. Rejected transactions and invalid blocks are
//! dropped silently from the caller's perspective: ingress always
//! answers success so a misbehaving peer learns nothing about the
//! roster.

use std::collections::HashSet;

use axum::{Json, extract::State, http::StatusCode};

use chain::{Block, BlockUpdate, ElectionSecret, Transaction};

use crate::state::SharedState;

/// `POST /transactions`
///
/// Ingress for a signed voting transaction, from a voter's own CLI or a
/// gossiping peer. Deduplicated by vote token against both the chain
/// and the pool; accepted transactions are re-broadcast in the
/// background.
pub async fn receive_transaction(
    State(state): State<SharedState>,
    Json(tx): Json<Transaction>,
) -> StatusCode {
    state.chain.add_received_transaction(tx).await;
    StatusCode::OK
}

/// `POST /blocks`
///
/// Ingress for a peer's block announcement. The update is queued for
/// the chain-update task; validation and fork resolution happen there.
pub async fn receive_block_update(
    State(state): State<SharedState>,
    Json(update): Json<BlockUpdate>,
) -> StatusCode {
    state.chain.add_received_block_update(update).await;
    StatusCode::OK
}

/// `POST /key-shares`
///
/// Ingress for another voter's share of the election private key.
/// Idempotent per share coordinate.
pub async fn receive_key_share(
    State(state): State<SharedState>,
    Json(share): Json<ElectionSecret>,
) -> StatusCode {
    state.chain.add_received_key_share(share).await;
    StatusCode::OK
}

/// `GET /chain`
///
/// Returns a snapshot of the committed chain, as fetched by peers
/// resolving a fork.
pub async fn get_chain(State(state): State<SharedState>) -> Json<Vec<Block>> {
    Json(state.chain.snapshot_chain().await)
}

/// `POST /peers`
///
/// Merges the caller's peer set into ours and returns the union.
pub async fn get_peers(
    State(state): State<SharedState>,
    Json(peers): Json<HashSet<String>>,
) -> Json<HashSet<String>> {
    Json(state.chain.merge_peers(peers).await)
}
