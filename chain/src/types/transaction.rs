//! Signed voting transactions.
//!
//! A transaction is a self-contained voting record: a sealed ballot plus
//! a header binding it to the vote token that authorised it. The header
//! carries the SHA-256 of the canonical ballot bytes and a DSA signature
//! over that hash, so any mutation of the ballot, or any attempt to vote
//! with someone else's token, fails verification.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::crypto::dsa::{DsaPrivateKey, DsaPublicKey, DsaSignature};
use crate::crypto::paillier::PublicKey;
use crate::crypto::CryptoError;
use crate::election::Ballot;
use crate::types::Hash256;

/// Transaction header: everything needed to verify a ballot without
/// decrypting it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionHeader {
    /// Token authorising this vote; at most one transaction per token
    /// ever makes it into the chain.
    pub vote_token: String,
    /// SHA-256 of the canonical ballot bytes.
    pub ballot_hash: Hash256,
    /// DSA signature over `ballot_hash` by the token's registered key.
    pub signature: DsaSignature,
    /// Seconds since the Unix epoch when the transaction was created.
    pub timestamp: u32,
}

/// A signed, sealed voting record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub header: TransactionHeader,
    pub ballot: Ballot,
}

impl Transaction {
    /// Creates a transaction from a plaintext ballot.
    ///
    /// The ballot is sealed under the election public key, hashed, and
    /// the hash signed with the voter's own DSA key. The timestamp is
    /// stamped at creation time.
    pub fn create(
        token: &str,
        ballot: Ballot,
        election_key: &PublicKey,
        signing_key: &DsaPrivateKey,
    ) -> Result<Transaction, CryptoError> {
        let mut ballot = ballot;
        ballot.vote_token = token.to_string();
        let ballot = ballot.encrypt(election_key)?;

        let ballot_hash = ballot.hash();
        let signature = signing_key.sign_hash(ballot_hash.as_bytes())?;

        Ok(Transaction {
            header: TransactionHeader {
                vote_token: token.to_string(),
                ballot_hash,
                signature,
                timestamp: current_unix_timestamp(),
            },
            ballot,
        })
    }

    /// Verifies this transaction against the roster.
    ///
    /// Returns `false` when the token is unknown, when the ballot bytes
    /// no longer match the signed hash, or when the DSA signature does
    /// not verify against the token's registered public key.
    pub fn verify_signature(&self, roster: &HashMap<String, DsaPublicKey>) -> bool {
        let Some(public_key) = roster.get(&self.header.vote_token) else {
            tracing::warn!(
                token = %self.header.vote_token,
                "transaction contains an unknown vote token"
            );
            return false;
        };

        if self.ballot.hash() != self.header.ballot_hash {
            tracing::warn!(
                token = %self.header.vote_token,
                "ballot bytes do not match the signed hash"
            );
            return false;
        }

        let valid = public_key.verify(self.header.ballot_hash.as_bytes(), &self.header.signature);
        if !valid {
            tracing::warn!(token = %self.header.vote_token, "transaction signature invalid");
        }
        valid
    }
}

/// Returns the current wall-clock time as seconds since the Unix epoch.
///
/// On error (system clock before the epoch) this falls back to 0.
pub(crate) fn current_unix_timestamp() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::dsa::create_key_with_sizes;
    use crate::crypto::paillier::generate_keypair;
    use crate::election::BallotFormat;

    fn roster_with(token: &str, key: &DsaPrivateKey) -> HashMap<String, DsaPublicKey> {
        HashMap::from([(token.to_string(), key.public.clone())])
    }

    fn signed_transaction(token: &str) -> (Transaction, DsaPrivateKey) {
        let election_key = generate_keypair(256).expect("election keypair");
        let signing_key = create_key_with_sizes(512, 160).expect("dsa keypair");

        let format = BallotFormat::new(vec!["Alice".to_string(), "Bob".to_string()]);
        let ballot = Ballot::fill(&format, token, &[1, 0]).expect("fill");

        let tx = Transaction::create(token, ballot, &election_key.public, &signing_key)
            .expect("create transaction");
        (tx, signing_key)
    }

    #[test]
    fn created_transactions_verify_against_the_roster() {
        let (tx, key) = signed_transaction("tok-a");
        let roster = roster_with("tok-a", &key);

        assert!(tx.verify_signature(&roster));
        assert_eq!(tx.header.vote_token, "tok-a");
        assert_eq!(tx.ballot.hash(), tx.header.ballot_hash);
        assert!(tx.header.timestamp > 0);
    }

    #[test]
    fn unknown_tokens_fail_verification() {
        let (tx, key) = signed_transaction("tok-a");
        let roster = roster_with("someone-else", &key);
        assert!(!tx.verify_signature(&roster));
    }

    #[test]
    fn tampered_ballots_fail_verification() {
        let (mut tx, key) = signed_transaction("tok-a");
        let roster = roster_with("tok-a", &key);

        tx.ballot.selections[0].vote += 1_u32;
        assert!(!tx.verify_signature(&roster));
    }

    #[test]
    fn signatures_from_a_different_key_fail_verification() {
        let (tx, _) = signed_transaction("tok-a");
        let other = create_key_with_sizes(512, 160).expect("dsa keypair");
        let roster = roster_with("tok-a", &other);
        assert!(!tx.verify_signature(&roster));
    }

    #[test]
    fn transactions_roundtrip_through_json() {
        let (tx, key) = signed_transaction("tok-a");
        let json = serde_json::to_string(&tx).expect("serialize");
        let back: Transaction = serde_json::from_str(&json).expect("deserialize");

        assert_eq!(tx, back);
        assert!(back.verify_signature(&roster_with("tok-a", &key)));
    }
}
