//! JSON-over-HTTP client for peer RPC calls.
//!
//! Every node exposes the same axum routes; this client is the outbound
//! half of that contract. All requests carry a transport-level timeout so
//! a dead peer cannot stall a gossip round.

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use crate::election::ElectionSecret;
use crate::types::{Block, BlockUpdate, Transaction};

/// Errors raised by outbound peer calls.
#[derive(Debug)]
pub enum NetworkError {
    /// Dial, connect, or timeout failures.
    Transport(String),
    /// The peer answered with a non-success HTTP status.
    Service(String),
    /// The peer's response body could not be decoded.
    Protocol(String),
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::Transport(msg) => write!(f, "transport error: {msg}"),
            NetworkError::Service(msg) => write!(f, "peer error: {msg}"),
            NetworkError::Protocol(msg) => write!(f, "protocol error: {msg}"),
        }
    }
}

impl std::error::Error for NetworkError {}

/// Outbound RPC client, cheap to clone and share across tasks.
#[derive(Clone)]
pub struct PeerClient {
    client: reqwest::Client,
}

impl PeerClient {
    /// Constructs a client with the given per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self, NetworkError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NetworkError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    fn endpoint(&self, peer: &str, path: &str) -> String {
        format!(
            "http://{}/{}",
            peer.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    async fn post<T: serde::Serialize>(
        &self,
        peer: &str,
        path: &str,
        body: &T,
    ) -> Result<reqwest::Response, NetworkError> {
        let url = self.endpoint(peer, path);
        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| NetworkError::Transport(format!("HTTP POST {url} failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(NetworkError::Service(format!(
                "peer returned HTTP status {status} for {url}"
            )));
        }
        Ok(resp)
    }

    /// Hands a transaction to a peer.
    pub async fn receive_transaction(
        &self,
        peer: &str,
        tx: &Transaction,
    ) -> Result<(), NetworkError> {
        self.post(peer, "/transactions", tx).await.map(|_| ())
    }

    /// Announces a block to a peer.
    pub async fn receive_block_update(
        &self,
        peer: &str,
        update: &BlockUpdate,
    ) -> Result<(), NetworkError> {
        self.post(peer, "/blocks", update).await.map(|_| ())
    }

    /// Delivers an election key share to a peer.
    pub async fn receive_key_share(
        &self,
        peer: &str,
        share: &ElectionSecret,
    ) -> Result<(), NetworkError> {
        self.post(peer, "/key-shares", share).await.map(|_| ())
    }

    /// Fetches a peer's entire committed chain.
    pub async fn get_chain(&self, peer: &str) -> Result<Vec<Block>, NetworkError> {
        let url = self.endpoint(peer, "/chain");
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| NetworkError::Transport(format!("HTTP GET {url} failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(NetworkError::Service(format!(
                "peer returned HTTP status {status} for {url}"
            )));
        }

        resp.json::<Vec<Block>>()
            .await
            .map_err(|e| NetworkError::Protocol(format!("failed to parse chain response: {e}")))
    }

    /// Sends our peer set to a peer and returns the merged union.
    pub async fn get_peers(
        &self,
        peer: &str,
        local: &HashSet<String>,
    ) -> Result<HashSet<String>, NetworkError> {
        let resp = self.post(peer, "/peers", local).await?;
        resp.json::<HashSet<String>>()
            .await
            .map_err(|e| NetworkError::Protocol(format!("failed to parse peer response: {e}")))
    }
}
