//! forkscan CLI
//!
//! Locate the first block height at which two chain nodes disagree
//! about the canonical block hash.

use anyhow::Result;
use clap::Parser;
use forkscan::locator::{locate_with_observer, LocateError, SearchResult, Side};
use forkscan::oracle::{BlockHashOracle, RetryingOracle};
use forkscan::rpc::{EthRpcClient, RpcConfig};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "forkscan")]
#[command(about = "Find the first block at which two chain nodes diverge")]
struct Cli {
    /// First block height of the search range (inclusive)
    #[arg(long)]
    start: u64,
    /// Last block height of the search range (inclusive)
    #[arg(long)]
    end: u64,
    /// JSON-RPC endpoint of node A
    #[arg(long, env = "FORKSCAN_NODE_A")]
    node_a: String,
    /// JSON-RPC endpoint of node B
    #[arg(long, env = "FORKSCAN_NODE_B")]
    node_b: String,
    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
    /// Retries per query on transient RPC failures
    #[arg(long, default_value_t = 3)]
    retries: usize,
    /// Base retry delay in milliseconds (doubles per attempt)
    #[arg(long, default_value_t = 500)]
    retry_delay_ms: u64,
    /// Print the final verdict as JSON instead of the human-readable report
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Env files must be loaded before clap parses (env-backed args).
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if !cli.json {
        println!("🔍 Fork divergence scan");
        println!("  Range: [{}, {}]", cli.start, cli.end);
        println!("  Node A: {}", cli.node_a);
        println!("  Node B: {}", cli.node_b);
        println!();
    }

    let timeout = Duration::from_secs(cli.timeout_secs);
    let client_a = EthRpcClient::new(RpcConfig::new(&cli.node_a).with_timeout(timeout));
    let client_b = EthRpcClient::new(RpcConfig::new(&cli.node_b).with_timeout(timeout));

    if !cli.json {
        for (label, client) in [("A", &client_a), ("B", &client_b)] {
            match client.block_number().await {
                Ok(head) => println!("  ✅ Node {} at block {}", label, head),
                Err(e) => println!("  ⚠️ Node {} head query failed: {}", label, e),
            }
        }
        println!();
    }

    let retry_delay = Duration::from_millis(cli.retry_delay_ms);
    let oracle_a = RetryingOracle::new(BlockHashOracle::new(client_a), cli.retries, retry_delay);
    let oracle_b = RetryingOracle::new(BlockHashOracle::new(client_b), cli.retries, retry_delay);

    let show_probes = !cli.json;
    let result = locate_with_observer(&oracle_a, &oracle_b, cli.start, cli.end, |probe| {
        if show_probes {
            let verdict = if probe.matched { "✅ match" } else { "❌ mismatch" };
            println!("  [{}] a={} b={} {}", probe.index, probe.a, probe.b, verdict);
        }
    })
    .await;

    match result {
        Ok(outcome) if cli.json => {
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Ok(SearchResult::NoDivergence) => {
            println!();
            println!("✅ No divergence in range [{}, {}]", cli.start, cli.end);
        }
        Ok(SearchResult::DivergesAt {
            index,
            a,
            b,
            last_agreement,
        }) => {
            println!();
            println!("❌ First divergence at block {}", index);
            if let Some(agreement) = last_agreement {
                println!(
                    "  Last agreement: block {} ({})",
                    agreement.index, agreement.fingerprint
                );
            } else {
                println!("  No agreement anywhere in range (diverged at start)");
            }
            println!("  Node A: {}", a);
            println!("  Node B: {}", b);
        }
        Err(LocateError::OracleUnavailable {
            index,
            side,
            source,
        }) => {
            let url = match side {
                Side::A => &cli.node_a,
                Side::B => &cli.node_b,
            };
            return Err(anyhow::Error::new(source)
                .context(format!("oracle {} ({}) failed at block {}", side, url, index)));
        }
        Err(err @ LocateError::InvalidRange { .. }) => {
            return Err(err.into());
        }
    }

    Ok(())
}
