//! Homomorphic tallying of sealed ballots.
//!
//! The count never sees an individual vote: for every selection on the
//! ballot paper, the Paillier ciphertexts of all ballots are multiplied
//! together modulo n² and only the resulting sum is decrypted.

use std::collections::BTreeMap;

use num_bigint::BigUint;

use crate::crypto::CryptoError;
use crate::crypto::paillier::PrivateKey;
use crate::election::Ballot;

/// Tallies `ballots` under a reconstructed election key.
///
/// Returns the decrypted count per selection name. Selections are paired
/// up positionally across ballots, as every ballot is filled from the
/// same format; ballots that are short a position simply do not
/// contribute to it.
pub fn tally_ballots(
    ballots: &[Ballot],
    key: &PrivateKey,
) -> Result<BTreeMap<String, BigUint>, CryptoError> {
    let mut results = BTreeMap::new();

    let Some(first) = ballots.first() else {
        return Ok(results);
    };

    for (position, selection) in first.selections.iter().enumerate() {
        let ciphertexts: Vec<BigUint> = ballots
            .iter()
            .filter_map(|b| b.selections.get(position))
            .map(|s| s.vote.clone())
            .collect();

        let total = key.add_ciphertexts(&ciphertexts)?;
        let count = key.decrypt(&total)?;
        results.insert(selection.name.clone(), count);
    }

    Ok(results)
}
