//! Operator CLI.
//!
//! A line-oriented loop on stdin for the voter running this node:
//!
//! - `peers`  - print the known peer set
//! - `pool`   - print the not-yet-mined transaction pool
//! - `chain`  - print the committed chain
//! - `v`      - fill in a ballot, seal it, and submit the vote
//! - `b`      - contribute this node's election key share
//! - `r`      - reconstruct the election key from pooled shares
//! - `tally`  - homomorphically count the sealed ballots
//! - `q`      - shut the node down

use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use chain::Transaction;

use crate::state::SharedState;

/// Runs the operator loop until `q` or end of input.
pub async fn run(state: SharedState) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    print_help();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) | Err(_) => break,
        };

        match line.trim() {
            "" => {}
            "peers" => print_peers(&state).await,
            "pool" => print_pool(&state).await,
            "chain" => print_chain(&state).await,
            "v" => vote(&state, &mut lines).await,
            "b" => contribute_share(&state).await,
            "r" => reconstruct(&state).await,
            "tally" => tally(&state).await,
            "q" => {
                println!("shutting down");
                let _ = state.quit.send(());
                return;
            }
            other => {
                println!("unknown command: {other:?}");
                print_help();
            }
        }
    }
}

fn print_help() {
    println!("commands: peers | pool | chain | v (vote) | b (share key) | r (reconstruct) | tally | q (quit)");
}

async fn print_peers(state: &SharedState) {
    println!("Peers:");
    let mut peers: Vec<String> = state.chain.snapshot_peers().await.into_iter().collect();
    peers.sort();
    for peer in peers {
        println!("\t{peer}");
    }
}

async fn print_pool(state: &SharedState) {
    let pool = state.chain.snapshot_pool().await;
    println!("Pool ({} transactions):", pool.len());
    for tx in pool {
        println!(
            "\ttoken={} time={} hash={}",
            tx.header.vote_token,
            tx.header.timestamp,
            tx.header.ballot_hash.to_hex()
        );
    }
}

async fn print_chain(state: &SharedState) {
    let blocks = state.chain.snapshot_chain().await;
    println!("Chain ({} blocks):", blocks.len());
    for (i, block) in blocks.iter().enumerate() {
        println!(
            "Block {i}: proof={} parent={}",
            block.proof.to_hex(),
            block.header.parent_hash.to_hex()
        );
        for tx in &block.transactions {
            println!("\ttoken={}", tx.header.vote_token);
        }
    }
}

/// Interactive ballot fill: one 0/1 answer per selection, then seal,
/// sign, and submit through the same ingress path a peer would use.
async fn vote(state: &SharedState, lines: &mut Lines<BufReader<Stdin>>) {
    let config = &state.chain.config;
    let mut votes = Vec::with_capacity(config.ballot_format.num_selections);

    for name in &config.ballot_format.selections {
        println!("Enter your selection (0 or 1) for {name}: ");
        let answer = match lines.next_line().await {
            Ok(Some(line)) => line,
            _ => return,
        };
        match answer.trim().parse::<u64>() {
            Ok(v @ (0 | 1)) => votes.push(v),
            _ => {
                println!("vote aborted: selections must be 0 or 1");
                return;
            }
        }
    }

    let ballot = match chain::Ballot::fill(&config.ballot_format, &config.my_token, &votes) {
        Ok(ballot) => ballot,
        Err(e) => {
            println!("vote aborted: {e}");
            return;
        }
    };

    let tx = match Transaction::create(
        &config.my_token,
        ballot,
        &config.election_key.public,
        &config.private_key,
    ) {
        Ok(tx) => tx,
        Err(e) => {
            println!("vote aborted: {e}");
            return;
        }
    };

    if state.chain.add_received_transaction(tx).await {
        println!("vote submitted");
    } else {
        println!("vote rejected (already voted?)");
    }
}

async fn contribute_share(state: &SharedState) {
    let share = state.chain.config.election_key_share.clone();
    state.chain.add_received_key_share(share.clone()).await;
    chain::network::gossip::broadcast_key_share(state.chain.clone(), share).await;
    println!("key share broadcast; gossip keeps spreading it");
}

async fn reconstruct(state: &SharedState) {
    match state.chain.reconstruct_election_key().await {
        Ok(()) => println!("election key reconstructed"),
        Err(e) => println!("cannot reconstruct: {e}"),
    }
}

async fn tally(state: &SharedState) {
    match state.chain.tally().await {
        Ok(results) => {
            println!("Tally:");
            for (name, count) in results {
                println!("\t{name}: {count}");
            }
        }
        Err(e) => println!("cannot tally: {e}"),
    }
}
