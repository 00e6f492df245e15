// node/src/bin/generate.rs

//! Election generator tool.
//!
//! Produces one config JSON per voter for a fresh election:
//!
//! - a Paillier keypair for the election, with λ and μ Shamir-split
//!   across the voters under recorded prime moduli,
//! - a DSA keypair and a unique random vote token per voter,
//! - a bounded-degree undirected peer graph so gossip reaches everyone,
//! - the shared ballot format.
//!
//! The completed configuration files are written as `<i>.peer.json` for
//! i in 0..N. The election private key itself is dropped on the floor:
//! after this tool exits, only a threshold of voters can rebuild it.
//!
//! Usage:
//!
//! ```text
//! generate <voters> <threshold> <base-port> [token-len] [degree] \
//!          [dsa-p-bits] [dsa-q-bits] [selection names...]
//! ```

use std::collections::{HashMap, HashSet};

use num_bigint::BigUint;
use rand::Rng;
use rand::distributions::Alphanumeric;

use chain::crypto::dsa::{self, DsaPublicKey};
use chain::crypto::paillier::{self, PrivateKey};
use chain::crypto::shamir::divide_secret;
use chain::{BallotFormat, Configuration, ConsensusConfig, ElectionSecret, MetricsConfig};

/// Everything the generator accumulates before writing config files.
/// Explicit context instead of globals, so the steps stay testable.
struct ElectionBuilder {
    voters: usize,
    threshold: usize,
    base_port: u16,
    token_len: usize,
    degree: usize,
    dsa_p_bits: u64,
    dsa_q_bits: u64,
    format: BallotFormat,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("generation failed: {e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let builder = parse_args()?;

    eprintln!(
        "building election: {} voters, threshold {}, ballot {:?}",
        builder.voters, builder.threshold, builder.format.selections
    );

    let configs = builder.build()?;

    for (i, config) in configs.iter().enumerate() {
        let path = format!("{i}.peer.json");
        let json = serde_json::to_string_pretty(config)
            .map_err(|e| format!("could not serialize configuration: {e}"))?;
        std::fs::write(&path, json).map_err(|e| format!("could not write {path}: {e}"))?;
        eprintln!("wrote {path} (token {})", config.my_token);
    }

    eprintln!("done");
    Ok(())
}

fn parse_args() -> Result<ElectionBuilder, String> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 3 {
        return Err(
            "usage: generate <voters> <threshold> <base-port> [token-len] [degree] \
             [dsa-p-bits] [dsa-q-bits] [selection names...]"
                .to_string(),
        );
    }

    let voters: usize = args[0].parse().map_err(|_| "bad voter count")?;
    let threshold: usize = args[1].parse().map_err(|_| "bad threshold")?;
    let base_port: u16 = args[2].parse().map_err(|_| "bad base port")?;
    let token_len: usize = args.get(3).map_or(Ok(8), |a| a.parse()).map_err(|_| "bad token length")?;
    let degree: usize = args.get(4).map_or(Ok(2), |a| a.parse()).map_err(|_| "bad degree")?;
    let dsa_p_bits: u64 = args.get(5).map_or(Ok(dsa::DEFAULT_P_BITS), |a| a.parse()).map_err(|_| "bad p bits")?;
    let dsa_q_bits: u64 = args.get(6).map_or(Ok(dsa::DEFAULT_Q_BITS), |a| a.parse()).map_err(|_| "bad q bits")?;

    let selections: Vec<String> = if args.len() > 7 {
        args[7..].to_vec()
    } else {
        vec!["Yes".to_string(), "No".to_string()]
    };

    if voters == 0 || threshold == 0 || threshold > voters {
        return Err(format!(
            "cannot split an election key across {voters} voters with threshold {threshold}"
        ));
    }

    Ok(ElectionBuilder {
        voters,
        threshold,
        base_port,
        token_len,
        degree,
        dsa_p_bits,
        dsa_q_bits,
        format: BallotFormat::new(selections),
    })
}

impl ElectionBuilder {
    fn build(&self) -> Result<Vec<Configuration>, String> {
        // The election key; only its public half survives into the
        // configs, the private exponents live on as shares.
        let election_key =
            paillier::generate_keypair(512).map_err(|e| format!("election key: {e}"))?;

        let (lambda_shares, lambda_modulus) =
            divide_secret(&election_key.lambda, self.threshold, self.voters)
                .map_err(|e| format!("lambda shares: {e}"))?;
        let (mu_shares, mu_modulus) = divide_secret(&election_key.mu, self.threshold, self.voters)
            .map_err(|e| format!("mu shares: {e}"))?;

        let public_only = PrivateKey {
            lambda: BigUint::from(0_u32),
            mu: BigUint::from(0_u32),
            public: election_key.public.clone(),
        };

        // One DSA keypair and one unique token per voter.
        let mut roster: HashMap<String, DsaPublicKey> = HashMap::with_capacity(self.voters);
        let mut voter_list = Vec::with_capacity(self.voters);

        for i in 0..self.voters {
            eprintln!("generating keys for voter {i}...");
            let signing_key = dsa::create_key_with_sizes(self.dsa_p_bits, self.dsa_q_bits)
                .map_err(|e| format!("dsa key for voter {i}: {e}"))?;

            let mut token = random_token(self.token_len);
            while roster.contains_key(&token) {
                token = random_token(self.token_len);
            }
            roster.insert(token.clone(), signing_key.public.clone());

            // Every node needs its own exporter port on a shared host.
            let metrics = MetricsConfig {
                listen_addr: format!("127.0.0.1:{}", 9898 + i)
                    .parse()
                    .map_err(|e| format!("metrics address for voter {i}: {e}"))?,
                ..MetricsConfig::default()
            };

            voter_list.push(Configuration {
                my_addr: "localhost".to_string(),
                my_port: self.base_port + i as u16,
                peers: HashSet::new(),
                sync_peers: true,
                private_key: signing_key,
                my_token: token,
                vote_tokens: HashMap::new(),
                election_key: public_only.clone(),
                election_key_share: ElectionSecret {
                    lambda: lambda_shares[i].clone(),
                    mu: mu_shares[i].clone(),
                },
                election_lambda_modulus: lambda_modulus.clone(),
                election_mu_modulus: mu_modulus.clone(),
                share_threshold: self.threshold,
                ballot_format: self.format.clone(),
                consensus: ConsensusConfig::default(),
                metrics,
            });
        }

        for config in &mut voter_list {
            config.vote_tokens = roster.clone();
        }

        connect_undirected(&mut voter_list, self.degree);
        Ok(voter_list)
    }
}

fn random_token(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len).map(|_| rng.sample(Alphanumeric) as char).collect()
}

/// Wires the voters into an undirected peer graph where every node ends
/// up with at least `degree` peers (when enough voters exist), favouring
/// still-unconnected nodes so the mesh stays in one component.
fn connect_undirected(voter_list: &mut [Configuration], degree: usize) {
    let endpoints: Vec<String> = voter_list.iter().map(|c| c.endpoint()).collect();
    let mut unconnected: HashSet<String> = endpoints.iter().cloned().collect();
    let mut connected: HashSet<String> = HashSet::new();

    for (i, me) in endpoints.iter().enumerate() {
        unconnected.remove(me);

        for peer in unconnected.clone() {
            if voter_list[i].peers.len() >= degree {
                break;
            }
            voter_list[i].peers.insert(peer.clone());
            connected.insert(peer.clone());
            unconnected.remove(&peer);
        }
        for peer in &connected {
            if voter_list[i].peers.len() >= degree {
                break;
            }
            if peer != me {
                voter_list[i].peers.insert(peer.clone());
            }
        }

        connected.insert(me.clone());
    }

    // Mirror every edge so the graph is undirected.
    let all: Vec<(String, HashSet<String>)> = voter_list
        .iter()
        .map(|c| (c.endpoint(), c.peers.clone()))
        .collect();
    for config in voter_list.iter_mut() {
        let me = config.endpoint();
        for (other, other_peers) in &all {
            if other_peers.contains(&me) {
                config.peers.insert(other.clone());
            }
        }
    }
}
