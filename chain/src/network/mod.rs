//! Peer networking for the voting chain.
//!
//! - [`client`]: the outbound JSON-over-HTTP client used for every call
//!   to a peer (transaction and block gossip, key-share delivery, chain
//!   and peer-set fetches).
//! - [`gossip`]: the periodic background tasks that keep the peer set
//!   merged across the network and spread election key shares.
//!
//! Outbound failures are never fatal: a peer that cannot be reached is
//! logged and skipped for the round.

pub mod client;
pub mod gossip;

pub use client::{NetworkError, PeerClient};
pub use gossip::{
    broadcast_block_update, broadcast_key_share, broadcast_transaction, run_peer_sync,
    run_share_gossip,
};
